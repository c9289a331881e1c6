use async_trait::async_trait;

/// Sampling knobs forwarded to the model endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 4096,
        }
    }
}

/// Failures surfaced by the model collaborator. These are soft: the scoring
/// pipeline downgrades to its fallback chain and never propagates them to the
/// caller.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model endpoint unavailable: {0}")]
    Unavailable(String),
    #[error("model response was truncated before completion")]
    Truncated,
    #[error("model returned malformed output: {0}")]
    MalformedOutput(String),
}

/// Opaque model invocation capability. Implementations wrap whichever provider
/// is configured; the pipeline only sees prompt in, raw text out.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn analyze(
        &self,
        prompt: &str,
        system_message: &str,
        options: ModelOptions,
    ) -> Result<String, ModelError>;
}
