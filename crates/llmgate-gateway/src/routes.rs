//! Request routing.
//!
//! Every endpoint is an exact path literal. `OPTIONS` is answered as a CORS
//! preflight whatever the path; any other method dispatches on the path
//! alone.

/// A resolved endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Preflight,
    // llama.cpp
    Health,
    Props,
    Slots,
    // OpenAI
    Models,
    ChatCompletions,
    Embeddings,
    // Ollama
    OllamaRoot,
    Tags,
    Version,
    Chat,
    Generate,
    Ps,
    NotFound,
}

impl Route {
    /// Resolve a method and a path (without query string).
    pub fn resolve(method: &str, path: &str) -> Self {
        if method.eq_ignore_ascii_case("OPTIONS") {
            return Self::Preflight;
        }
        match path {
            "/" => Self::OllamaRoot,
            "/health" => Self::Health,
            "/props" => Self::Props,
            "/slots" => Self::Slots,
            "/v1/models" => Self::Models,
            "/v1/chat/completions" => Self::ChatCompletions,
            "/v1/embeddings" => Self::Embeddings,
            "/api/tags" => Self::Tags,
            "/api/version" => Self::Version,
            "/api/chat" => Self::Chat,
            "/api/generate" => Self::Generate,
            "/api/ps" => Self::Ps,
            _ => Self::NotFound,
        }
    }
}
