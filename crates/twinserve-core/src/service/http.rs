use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{self, header::HeaderMap, StatusCode},
    response::sse::{Event, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::analytics::store::FileAnalyticsStore;
use crate::analytics::{Analytics, RecordRequest, RequestMeta};
use crate::config::Config;
use crate::provider;
use crate::relay::{self, ChatRequest, StreamRelay};
use crate::vendor::avatar::AvatarClient;
use crate::vendor::speech::SpeechClient;

/// Terminal sentinel frame closing every successful chat stream.
pub const STREAM_DONE: &str = "[DONE]";

/// Shared application state for the HTTP API.
pub struct AppState {
    pub config: Config,
    pub relay: Option<StreamRelay>,
    pub analytics: Analytics,
    pub speech: Option<SpeechClient>,
    pub avatar: Option<AvatarClient>,
}

impl AppState {
    /// Wire up all subsystems from config.
    pub fn from_config(config: Config) -> Self {
        let relay = provider::create_provider(&config.completion)
            .map(|p| StreamRelay::new(config.persona.system_prompt.clone(), p));
        let analytics = Analytics::new(Box::new(FileAnalyticsStore::new(config.analytics_path())));
        let speech = SpeechClient::from_config(&config.speech);
        let avatar = AvatarClient::from_config(&config.avatar, &config.speech.voice_id);
        Self {
            config,
            relay,
            analytics,
            speech,
            avatar,
        }
    }
}

/// Create the axum Router with all API routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/api/analytics", post(handle_record_event))
        .route("/api/analytics", get(handle_query_analytics))
        .route("/api/tts", post(handle_tts))
        .route("/api/video-avatar", post(handle_video_avatar))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([http::Method::GET, http::Method::POST, http::Method::OPTIONS])
                .allow_headers([http::header::CONTENT_TYPE]),
        )
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// POST /api/chat — relay one chat turn to the completion vendor.
async fn handle_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    if req.message.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Message is required");
    }

    let Some(relay) = state.relay.as_ref() else {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Completion API key not configured",
        );
    };

    info!(
        "Chat request: {} history turns, stream={}",
        req.conversation_history.len(),
        req.stream
    );

    if !req.stream {
        return match relay.respond(&req).await {
            Ok(text) => Json(json!({ "response": text })).into_response(),
            Err(e) if relay::is_rate_limited(&e) => {
                info!("Vendor rate limited, returning soft retry notice");
                Json(json!({ "response": relay::RATE_LIMIT_REPLY })).into_response()
            }
            Err(e) => {
                error!("Completion error: {}", e);
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("API Error: {}", e),
                )
            }
        };
    }

    // Open the vendor stream before committing to an SSE response, so
    // request-level failures can still pick their own status code.
    let fragments = match relay.open_stream(&req).await {
        Ok(s) => s,
        Err(e) if relay::is_rate_limited(&e) => {
            info!("Vendor rate limited, returning soft retry notice");
            return Json(json!({ "response": relay::RATE_LIMIT_REPLY })).into_response();
        }
        Err(e) => {
            error!("Completion error: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("API Error: {}", e),
            );
        }
    };

    let stream = async_stream::stream! {
        let mut fragments = fragments;
        let mut broken = false;
        while let Some(item) = fragments.next().await {
            match item {
                Ok(frag) => {
                    yield Ok(Event::default().data(json!({ "content": frag }).to_string()));
                }
                Err(e) => {
                    // Leave the stream in an error state so the client can
                    // tell a broken reply from a completed one.
                    error!("Stream broke mid-reply: {}", e);
                    broken = true;
                    yield Err(axum::Error::new(e));
                    break;
                }
            }
        }
        if !broken {
            yield Ok(Event::default().data(STREAM_DONE));
        }
    };

    Sse::new(stream).into_response()
}

/// POST /api/analytics — record one interaction event.
async fn handle_record_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RecordRequest>,
) -> Response {
    let meta = meta_from_headers(&headers);

    match state.analytics.record(req, meta) {
        Ok(event_id) => Json(json!({ "success": true, "eventId": event_id })).into_response(),
        Err(e) => {
            error!("Analytics record error: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to record analytics",
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalyticsQuery {
    key: Option<String>,
}

/// GET /api/analytics?key=… — admin metrics, key-gated.
async fn handle_query_analytics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> Response {
    let admin_key = &state.config.analytics.admin_key;
    if admin_key.is_empty() || query.key.as_deref() != Some(admin_key.as_str()) {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    Json(state.analytics.query()).into_response()
}

#[derive(Debug, Deserialize)]
struct SpeakRequest {
    #[serde(default)]
    text: String,
}

/// Response for speech synthesis: audio is returned inline as base64.
#[derive(Debug, Serialize)]
struct SpeakResponse {
    audio: String,
    #[serde(rename = "contentType")]
    content_type: &'static str,
}

/// POST /api/tts — synthesize speech for a reply.
async fn handle_tts(State(state): State<Arc<AppState>>, Json(req): Json<SpeakRequest>) -> Response {
    if req.text.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Text is required");
    }

    let Some(speech) = state.speech.as_ref() else {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Speech API key not configured",
        );
    };

    match speech.synthesize(&req.text).await {
        Ok(audio) => {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(audio);
            Json(SpeakResponse {
                audio: encoded,
                content_type: "audio/mpeg",
            })
            .into_response()
        }
        Err(e) => {
            error!("Speech synthesis error: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Speech synthesis failed: {}", e),
            )
        }
    }
}

/// POST /api/video-avatar — generate a talking-head video for a reply.
async fn handle_video_avatar(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SpeakRequest>,
) -> Response {
    if req.text.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Text is required");
    }

    let Some(avatar) = state.avatar.as_ref() else {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Avatar API key not configured",
        );
    };

    match avatar.generate(&req.text).await {
        Ok(video) => Json(json!({
            "videoUrl": video.video_url,
            "talkId": video.talk_id,
        }))
        .into_response(),
        Err(crate::error::VendorError::Timeout(attempts)) => {
            error!("Video generation timed out after {} polls", attempts);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Video generation timed out",
            )
        }
        Err(e) => {
            error!("Video generation error: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate video")
        }
    }
}

/// GET /health — health check.
async fn handle_health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}

/// Extract request metadata from transport headers. These fields are never
/// trusted from the body.
fn meta_from_headers(headers: &HeaderMap) -> RequestMeta {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        });
    let user_agent = headers
        .get(http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    let referrer = headers
        .get(http::header::REFERER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    RequestMeta {
        ip,
        user_agent,
        referrer,
    }
}

/// Start the HTTP server on the given address.
pub async fn serve(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}
