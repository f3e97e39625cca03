use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::error::ProviderError;
use crate::types::{CompletionResponse, Message};
use crate::util::http;

use super::{CompletionProvider, FragmentStream};

/// OpenAI-compatible completion provider.
/// Works with the OpenAI API and any compatible endpoint (OpenRouter, vLLM, ...).
pub struct OpenAiProvider {
    api_key: String,
    api_base: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, api_base: Option<String>, model: String) -> Self {
        let base = api_base.unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        Self {
            api_key,
            api_base: base.trim_end_matches('/').to_string(),
            model,
        }
    }

    fn request_body(&self, messages: &[Message], max_tokens: u32, temperature: f64) -> serde_json::Value {
        let msgs: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect();
        json!({
            "model": self.model,
            "messages": msgs,
            "max_tokens": max_tokens,
            "temperature": temperature,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: &[Message],
        max_tokens: u32,
        temperature: f64,
    ) -> Result<CompletionResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = self.request_body(messages, max_tokens, temperature);

        debug!("Completion request to {} with model {}", url, self.model);

        let response = http::client()
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let data: serde_json::Value = response.json().await?;
        parse_completion(&data)
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        max_tokens: u32,
        temperature: f64,
    ) -> Result<FragmentStream, ProviderError> {
        use futures::StreamExt;

        let url = format!("{}/chat/completions", self.api_base);
        let mut body = self.request_body(messages, max_tokens, temperature);
        body["stream"] = json!(true);

        debug!("Streaming completion request to {} with model {}", url, self.model);

        let response = http::client()
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let mut bytes = response.bytes_stream();
        let stream = async_stream::try_stream! {
            let mut buf = String::new();
            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = chunk
                    .map_err(|e| ProviderError::Other(format!("Stream read error: {}", e)))?;
                buf.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim().to_string();
                    buf = buf[pos + 1..].to_string();

                    if !line.starts_with("data:") {
                        continue;
                    }
                    let data = line[5..].trim();
                    if data.is_empty() {
                        continue;
                    }
                    if data == "[DONE]" {
                        break 'outer;
                    }

                    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(data) {
                        if let Some(content) = parse_delta(&parsed) {
                            if !content.is_empty() {
                                yield content;
                            }
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Parse a non-streaming completion response.
fn parse_completion(data: &serde_json::Value) -> Result<CompletionResponse, ProviderError> {
    let choice = data
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| ProviderError::Parse("No choices in response".to_string()))?;

    let content = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Ok(CompletionResponse { content })
}

/// Extract the content fragment from one streamed chunk, if any.
fn parse_delta(data: &serde_json::Value) -> Option<String> {
    data.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
