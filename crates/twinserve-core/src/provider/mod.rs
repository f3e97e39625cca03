pub mod openai;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::CompletionConfig;
use crate::error::ProviderError;
use crate::types::{CompletionResponse, Message};

/// Ordered stream of text fragments from a streaming completion.
/// The stream is only handed out after the vendor accepted the request,
/// so items are content fragments or mid-stream transport errors.
pub type FragmentStream = BoxStream<'static, Result<String, ProviderError>>;

/// Trait for completion vendors.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send a completion request and wait for the full reply.
    async fn complete(
        &self,
        messages: &[Message],
        max_tokens: u32,
        temperature: f64,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Open a streaming completion. Fails before returning a stream if the
    /// vendor rejects the request (bad credential, rate limit, etc.).
    async fn complete_stream(
        &self,
        messages: &[Message],
        max_tokens: u32,
        temperature: f64,
    ) -> Result<FragmentStream, ProviderError>;

    /// Model identifier used for requests.
    fn model(&self) -> &str;
}

/// Create a provider from config, or None when no credential is set.
pub fn create_provider(config: &CompletionConfig) -> Option<Box<dyn CompletionProvider>> {
    if config.api_key.is_empty() {
        return None;
    }
    Some(Box::new(openai::OpenAiProvider::new(
        config.api_key.clone(),
        config.api_base.clone(),
        config.model.clone(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_requires_key() {
        let config = CompletionConfig::default();
        assert!(create_provider(&config).is_none());

        let mut config = CompletionConfig::default();
        config.api_key = "sk-test".to_string();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model(), "gpt-4o-mini");
    }
}
