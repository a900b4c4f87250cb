//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the gateway expects from infrastructure.
//! They contain no implementation details and use only domain types.

pub mod engine;

pub use engine::{ChatEngine, EngineError, EngineFactory, EngineParams, EngineSink, PrintKind};
