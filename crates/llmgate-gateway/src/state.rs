//! Shared gateway state.
//!
//! One [`GatewayState`] exists per gateway instance and is handed to every
//! handler through an `Arc`. It owns the engine handle and the busy flag
//! that admits at most one generation at a time.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use llmgate_core::{ChatEngine, EngineError, EngineFactory, GatewayConfig, DEFAULT_CONTEXT_SIZE};

use crate::error::GatewayError;

/// Engine handle shared with the blocking generation thread.
pub type SharedEngine = Arc<Mutex<Box<dyn ChatEngine>>>;

/// Identity of the loaded model file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModel {
    /// File name of the model, used as its API-visible name.
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

impl LoadedModel {
    /// Describe the model at `path`. Missing metadata is reported as zero.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let metadata = fs::metadata(path).ok();
        Self {
            name,
            path: path.to_path_buf(),
            size_bytes: metadata.as_ref().map_or(0, fs::Metadata::len),
            modified: metadata
                .and_then(|m| m.modified().ok())
                .map_or(DateTime::<Utc>::UNIX_EPOCH, DateTime::<Utc>::from),
        }
    }
}

/// Per-instance state shared by all handlers.
pub struct GatewayState {
    model: Option<LoadedModel>,
    engine: Option<SharedEngine>,
    generating: Mutex<bool>,
    context_size: u32,
    show_statistics: bool,
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("model", &self.model)
            .field("generating", &self.is_generating())
            .field("context_size", &self.context_size)
            .finish_non_exhaustive()
    }
}

impl Default for GatewayState {
    fn default() -> Self {
        Self::empty(DEFAULT_CONTEXT_SIZE)
    }
}

impl GatewayState {
    /// State with no model loaded.
    #[must_use]
    pub fn empty(context_size: u32) -> Self {
        Self {
            model: None,
            engine: None,
            generating: Mutex::new(false),
            context_size,
            show_statistics: false,
        }
    }

    /// State serving an already created engine.
    #[must_use]
    pub fn with_engine(model: LoadedModel, engine: Box<dyn ChatEngine>, context_size: u32) -> Self {
        Self {
            model: Some(model),
            engine: Some(Arc::new(Mutex::new(engine))),
            ..Self::empty(context_size)
        }
    }

    /// Create the engine for the configured model, if any.
    ///
    /// # Errors
    ///
    /// Returns the factory's error when the engine cannot be created.
    pub fn load(factory: &dyn EngineFactory, config: &GatewayConfig) -> Result<Self, EngineError> {
        let Some(params) = config.engine_params() else {
            info!("No model configured, starting without an engine");
            return Ok(Self::empty(config.context_size).with_statistics(config.show_statistics));
        };

        debug!(args = ?params.to_args(), "Creating engine");
        let engine = factory.create(&params)?;
        let model = LoadedModel::from_path(&params.model_path);
        info!(
            model = %model.name,
            size_bytes = model.size_bytes,
            context_size = config.context_size,
            "Model loaded"
        );

        Ok(Self::with_engine(model, engine, config.context_size)
            .with_statistics(config.show_statistics))
    }

    /// Ask the engine for statistics after every generation.
    #[must_use]
    pub const fn with_statistics(mut self, enabled: bool) -> Self {
        self.show_statistics = enabled;
        self
    }

    pub const fn model(&self) -> Option<&LoadedModel> {
        self.model.as_ref()
    }

    /// API-visible model name, empty when nothing is loaded.
    pub fn model_name(&self) -> &str {
        self.model.as_ref().map_or("", |m| m.name.as_str())
    }

    pub const fn engine(&self) -> Option<&SharedEngine> {
        self.engine.as_ref()
    }

    pub const fn is_loaded(&self) -> bool {
        self.engine.is_some()
    }

    pub const fn context_size(&self) -> u32 {
        self.context_size
    }

    pub const fn show_statistics(&self) -> bool {
        self.show_statistics
    }

    /// Whether a generation currently holds the slot.
    pub fn is_generating(&self) -> bool {
        *self.flag()
    }

    /// Claim the generation slot, or `None` if it is taken.
    ///
    /// The flag is held only for the check-and-set; the returned guard
    /// clears it when dropped.
    pub fn try_begin_generation(&self) -> Option<GenerationSlot<'_>> {
        let mut generating = self.flag();
        if *generating {
            return None;
        }
        *generating = true;
        Some(GenerationSlot {
            flag: &self.generating,
        })
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        self.generating.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist the engine's conversation to `path`.
    ///
    /// # Errors
    ///
    /// Fails with [`GatewayError::NoModel`] when no engine is loaded, or the
    /// engine's own session error.
    pub fn save_session(&self, path: &Path) -> Result<(), GatewayError> {
        let engine = self.engine.as_ref().ok_or(GatewayError::NoModel)?;
        lock_engine(engine).save_session(path)?;
        Ok(())
    }

    /// Restore the engine's conversation from `path`.
    ///
    /// # Errors
    ///
    /// Fails with [`GatewayError::NoModel`] when no engine is loaded, or the
    /// engine's own session error.
    pub fn load_session(&self, path: &Path) -> Result<(), GatewayError> {
        let engine = self.engine.as_ref().ok_or(GatewayError::NoModel)?;
        lock_engine(engine).load_session(path)?;
        Ok(())
    }
}

/// Lock the engine, recovering it if a previous holder panicked.
pub fn lock_engine(engine: &SharedEngine) -> MutexGuard<'_, Box<dyn ChatEngine>> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The claimed generation slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct GenerationSlot<'a> {
    flag: &'a Mutex<bool>,
}

impl Drop for GenerationSlot<'_> {
    fn drop(&mut self) {
        *self.flag.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}
