//! Language Model Gateway.

use crate::error::ServiceError;
use async_trait::async_trait;

/// One completion request. Sampling knobs travel with the prompt so a
/// gateway implementation can map them onto whatever its backend supports.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens: 2000,
            temperature: 0.3,
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Stateless request/response interface to the language model.
///
/// May fail or return malformed output; callers must validate the text
/// (see [`crate::parse`]) before trusting it.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ServiceError>;
}
