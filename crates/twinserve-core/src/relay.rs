use serde::Deserialize;
use tracing::warn;

use crate::error::ProviderError;
use crate::provider::{CompletionProvider, FragmentStream};
use crate::types::{ChatTurn, Message, Role};

/// How many history turns are forwarded to the vendor. Chosen for latency;
/// changing it only changes context depth.
pub const HISTORY_LIMIT: usize = 6;

/// Generation parameters for every chat turn.
pub const MAX_TOKENS: u32 = 400;
pub const TEMPERATURE: f64 = 0.7;

/// Reply shown when the vendor returned empty content or failed outright.
pub const FALLBACK_REPLY: &str =
    "Let's cut to the chase - something went wrong. Try asking again.";

/// Soft notice returned (as a success) when the vendor is rate limiting us.
pub const RATE_LIMIT_REPLY: &str =
    "I'm getting a lot of questions right now. Give me 20 seconds and ask again.";

fn default_stream() -> bool {
    true
}

/// A chat turn request from the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatTurn>,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

/// Relays chat turns to the completion vendor under a fixed persona.
pub struct StreamRelay {
    persona: String,
    provider: Box<dyn CompletionProvider>,
}

impl StreamRelay {
    pub fn new(persona: String, provider: Box<dyn CompletionProvider>) -> Self {
        Self { persona, provider }
    }

    /// Construct the vendor message list: persona first, then the last
    /// `HISTORY_LIMIT` turns in order, then the new user message.
    pub fn build_messages(&self, history: &[ChatTurn], message: &str) -> Vec<Message> {
        let skip = history.len().saturating_sub(HISTORY_LIMIT);
        let mut messages = Vec::with_capacity(history.len().min(HISTORY_LIMIT) + 2);
        messages.push(Message::system(&self.persona));
        for turn in &history[skip..] {
            let msg = match turn.role {
                Role::User => Message::user(&turn.text),
                // System turns in client history are untrusted; treat as assistant.
                _ => Message::assistant(&turn.text),
            };
            messages.push(msg);
        }
        messages.push(Message::user(message));
        messages
    }

    /// Open a streaming completion for this request. The returned stream
    /// yields content fragments in vendor order; the caller appends the
    /// terminal sentinel after a clean end of stream.
    pub async fn open_stream(&self, req: &ChatRequest) -> Result<FragmentStream, ProviderError> {
        let messages = self.build_messages(&req.conversation_history, &req.message);
        self.provider
            .complete_stream(&messages, MAX_TOKENS, TEMPERATURE)
            .await
    }

    /// Non-streaming path: wait for the whole reply. Vendor failures are
    /// mapped so the caller always has text to show.
    pub async fn respond(&self, req: &ChatRequest) -> Result<String, ProviderError> {
        let messages = self.build_messages(&req.conversation_history, &req.message);
        let completion = self
            .provider
            .complete(&messages, MAX_TOKENS, TEMPERATURE)
            .await?;
        Ok(completion
            .content
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| {
                warn!("Vendor returned empty content, using fallback reply");
                FALLBACK_REPLY.to_string()
            }))
    }
}

/// Whether a vendor error looks like rate limiting. Those are downgraded to
/// a user-visible retry notice instead of a hard error.
pub fn is_rate_limited(err: &ProviderError) -> bool {
    if let ProviderError::Api { status: 429, .. } = err {
        return true;
    }
    let text = err.to_string();
    text.contains("429") || text.contains("Rate limit")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::types::CompletionResponse;
    use async_trait::async_trait;

    /// Provider fake serving canned fragments.
    struct FakeProvider {
        fragments: Vec<String>,
    }

    impl FakeProvider {
        fn with_fragments(fragments: &[&str]) -> Self {
            Self {
                fragments: fragments.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for FakeProvider {
        async fn complete(
            &self,
            _messages: &[Message],
            _max_tokens: u32,
            _temperature: f64,
        ) -> Result<CompletionResponse, ProviderError> {
            let joined = self.fragments.join("");
            Ok(CompletionResponse {
                content: if joined.is_empty() { None } else { Some(joined) },
            })
        }

        async fn complete_stream(
            &self,
            _messages: &[Message],
            _max_tokens: u32,
            _temperature: f64,
        ) -> Result<FragmentStream, ProviderError> {
            let frags: Vec<Result<String, ProviderError>> =
                self.fragments.iter().cloned().map(Ok).collect();
            Ok(Box::pin(futures::stream::iter(frags)))
        }

        fn model(&self) -> &str {
            "fake"
        }
    }

    fn relay_with(provider: FakeProvider) -> StreamRelay {
        StreamRelay::new("persona text".to_string(), Box::new(provider))
    }

    fn turns(n: usize) -> Vec<ChatTurn> {
        (0..n)
            .map(|i| ChatTurn {
                role: if i % 2 == 0 { Role::User } else { Role::Assistant },
                text: format!("turn {}", i),
            })
            .collect()
    }

    #[test]
    fn test_build_messages_persona_first() {
        let relay = relay_with(FakeProvider::with_fragments(&[]));
        let messages = relay.build_messages(&turns(2), "question");
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "persona text");
        assert_eq!(messages.last().unwrap().role, Role::User);
        assert_eq!(messages.last().unwrap().content, "question");
    }

    #[test]
    fn test_build_messages_truncates_history() {
        let relay = relay_with(FakeProvider::with_fragments(&[]));
        let messages = relay.build_messages(&turns(40), "q");
        // persona + HISTORY_LIMIT turns + new message
        assert_eq!(messages.len(), HISTORY_LIMIT + 2);
        // The retained turns are the most recent ones, order preserved
        assert_eq!(messages[1].content, "turn 34");
        assert_eq!(messages[HISTORY_LIMIT].content, "turn 39");
    }

    #[test]
    fn test_build_messages_short_history() {
        let relay = relay_with(FakeProvider::with_fragments(&[]));
        let messages = relay.build_messages(&turns(2), "q");
        assert_eq!(messages.len(), 4);
    }

    #[tokio::test]
    async fn test_stream_fragments_in_order() {
        use futures::StreamExt;
        let relay = relay_with(FakeProvider::with_fragments(&["Hel", "lo ", "world"]));
        let req = ChatRequest {
            message: "hi".to_string(),
            conversation_history: vec![],
            stream: true,
        };
        let mut stream = relay.open_stream(&req).await.unwrap();
        let mut collected = String::new();
        while let Some(frag) = stream.next().await {
            collected.push_str(&frag.unwrap());
        }
        assert_eq!(collected, "Hello world");
    }

    #[tokio::test]
    async fn test_respond_full_reply() {
        let relay = relay_with(FakeProvider::with_fragments(&["full ", "reply"]));
        let req = ChatRequest {
            message: "hi".to_string(),
            conversation_history: vec![],
            stream: false,
        };
        assert_eq!(relay.respond(&req).await.unwrap(), "full reply");
    }

    #[tokio::test]
    async fn test_respond_empty_content_fallback() {
        let relay = relay_with(FakeProvider::with_fragments(&[]));
        let req = ChatRequest {
            message: "hi".to_string(),
            conversation_history: vec![],
            stream: false,
        };
        assert_eq!(relay.respond(&req).await.unwrap(), FALLBACK_REPLY);
    }

    #[test]
    fn test_rate_limit_detection() {
        assert!(is_rate_limited(&ProviderError::Api {
            status: 429,
            message: "slow down".to_string(),
        }));
        assert!(is_rate_limited(&ProviderError::Other(
            "Rate limit exceeded".to_string()
        )));
        assert!(!is_rate_limited(&ProviderError::Api {
            status: 500,
            message: "boom".to_string(),
        }));
    }

    #[test]
    fn test_chat_request_defaults() {
        let req: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert!(req.stream);
        assert!(req.conversation_history.is_empty());
    }
}
