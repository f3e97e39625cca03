pub mod store;
pub mod topics;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::StoreError;
use crate::util::truncate_chars;

use store::AnalyticsStore;

/// Retained event log length. Insertion at the head, eviction from the tail.
pub const EVENT_LOG_CAP: usize = 1000;

/// Question text is truncated to this many characters before aggregation.
pub const QUESTION_PREVIEW_LEN: usize = 100;

/// The top-questions list keeps at most this many entries.
pub const TOP_QUESTIONS_CAP: usize = 20;

/// Client IPs are truncated to this length before persistence.
pub const IP_TRUNCATE_LEN: usize = 20;

const RECENT_EVENTS_LIMIT: usize = 50;
const TOP_QUESTIONS_QUERY_LIMIT: usize = 10;

/// Kind of interaction being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PageView,
    ChatMessage,
    VoiceInput,
    TtsPlayed,
    VideoAvatar,
}

/// Free-form payload attached to an event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// One persisted interaction event. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<EventData>,
}

/// Per-session rollup, keyed by session id in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub message_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionCount {
    pub question: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicCount {
    pub topic: String,
    pub count: u64,
}

/// All-time aggregate, maintained incrementally on every qualifying event.
/// Top-list counts are never decremented when their backing events age out
/// of the capped log; that approximation is part of the contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Summary {
    pub total_visits: u64,
    pub total_messages: u64,
    pub unique_sessions: u64,
    pub top_questions: Vec<QuestionCount>,
    pub top_topics: Vec<TopicCount>,
}

/// The whole persisted document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsData {
    pub events: Vec<AnalyticsEvent>,
    pub sessions: HashMap<String, SessionInfo>,
    pub summary: Summary,
}

/// Ingest request body from the client. Type and session id default rather
/// than fail: analytics must never block the primary interaction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRequest {
    #[serde(rename = "type", default = "default_event_type")]
    pub event_type: EventType,
    #[serde(default = "default_session_id")]
    pub session_id: String,
    #[serde(default)]
    pub data: Option<EventData>,
}

fn default_event_type() -> EventType {
    EventType::PageView
}

fn default_session_id() -> String {
    "unknown".to_string()
}

/// Request metadata taken from transport headers, never from the body.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// Visit/message/session counts for one time window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowStats {
    pub visits: usize,
    pub messages: usize,
    pub unique_sessions: usize,
}

/// Metrics document returned to the admin dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub today: WindowStats,
    #[serde(rename = "last7Days")]
    pub last_7_days: WindowStats,
    #[serde(rename = "last30Days")]
    pub last_30_days: WindowStats,
    pub all_time: Summary,
    pub recent_events: Vec<AnalyticsEvent>,
    pub top_topics: Vec<TopicCount>,
    pub top_questions: Vec<QuestionCount>,
}

/// Accumulates interaction events and derived metrics over an injected store.
///
/// Each call is one whole read-modify-write (or read-only) cycle against the
/// document. There is deliberately no cross-call lock: concurrent writers
/// race with last-write-wins on the full-document save.
pub struct Analytics {
    store: Box<dyn AnalyticsStore>,
}

impl Analytics {
    pub fn new(store: Box<dyn AnalyticsStore>) -> Self {
        Self { store }
    }

    /// Record one event. Returns the generated event id.
    pub fn record(&self, req: RecordRequest, meta: RequestMeta) -> Result<String, StoreError> {
        self.record_at(req, meta, Utc::now())
    }

    fn record_at(
        &self,
        req: RecordRequest,
        meta: RequestMeta,
        now: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        let mut analytics = self.store.load();

        let event_id = uuid::Uuid::new_v4().to_string();

        let mut data = req.data.unwrap_or_default();
        if req.event_type == EventType::ChatMessage {
            if let Some(ref question) = data.question {
                data.topic = Some(topics::detect_topic(question).to_string());
            }
        }
        let has_data = data.question.is_some()
            || data.response_preview.is_some()
            || data.topic.is_some()
            || data.duration.is_some();

        let event = AnalyticsEvent {
            id: event_id.clone(),
            timestamp: now,
            event_type: req.event_type,
            session_id: req.session_id.clone(),
            user_agent: meta.user_agent.clone(),
            referrer: meta.referrer.clone(),
            ip: meta.ip.as_deref().map(|ip| truncate_chars(ip, IP_TRUNCATE_LEN)),
            data: has_data.then_some(data.clone()),
        };

        // Newest first; evict from the tail past the cap.
        analytics.events.insert(0, event);
        analytics.events.truncate(EVENT_LOG_CAP);

        // Session upsert.
        if !analytics.sessions.contains_key(&req.session_id) {
            analytics.summary.unique_sessions += 1;
        }
        let session = analytics
            .sessions
            .entry(req.session_id.clone())
            .or_insert_with(|| SessionInfo {
                first_seen: now,
                last_seen: now,
                message_count: 0,
                user_agent: meta.user_agent,
                referrer: meta.referrer,
            });
        session.last_seen = now;

        match req.event_type {
            EventType::PageView => {
                analytics.summary.total_visits += 1;
            }
            EventType::ChatMessage => {
                analytics.summary.total_messages += 1;
                session.message_count += 1;

                let preview = data
                    .question
                    .as_deref()
                    .map(|q| truncate_chars(q, QUESTION_PREVIEW_LEN))
                    .unwrap_or_else(|| "Unknown".to_string());
                upsert_question(&mut analytics.summary.top_questions, &preview);

                let topic = data.topic.as_deref().unwrap_or(topics::DEFAULT_TOPIC);
                upsert_topic(&mut analytics.summary.top_topics, topic);
            }
            _ => {}
        }

        self.store.save(&analytics)?;
        Ok(event_id)
    }

    /// Windowed rollups for the admin dashboard. The caller is responsible
    /// for access control.
    pub fn query(&self) -> Metrics {
        self.query_at(Utc::now())
    }

    fn query_at(&self, now: DateTime<Utc>) -> Metrics {
        let analytics = self.store.load();

        let today = now.format("%Y-%m-%d").to_string();
        let last_7 = now - Duration::days(7);
        let last_30 = now - Duration::days(30);

        let today_events: Vec<&AnalyticsEvent> = analytics
            .events
            .iter()
            .filter(|e| e.timestamp.format("%Y-%m-%d").to_string() == today)
            .collect();
        let last_7_events: Vec<&AnalyticsEvent> =
            analytics.events.iter().filter(|e| e.timestamp >= last_7).collect();
        let last_30_events: Vec<&AnalyticsEvent> =
            analytics.events.iter().filter(|e| e.timestamp >= last_30).collect();

        Metrics {
            today: window_stats(&today_events),
            last_7_days: window_stats(&last_7_events),
            last_30_days: window_stats(&last_30_events),
            all_time: analytics.summary.clone(),
            recent_events: analytics
                .events
                .iter()
                .take(RECENT_EVENTS_LIMIT)
                .cloned()
                .collect(),
            top_topics: analytics.summary.top_topics.clone(),
            top_questions: analytics
                .summary
                .top_questions
                .iter()
                .take(TOP_QUESTIONS_QUERY_LIMIT)
                .cloned()
                .collect(),
        }
    }
}

fn window_stats(events: &[&AnalyticsEvent]) -> WindowStats {
    let sessions: HashSet<&str> = events.iter().map(|e| e.session_id.as_str()).collect();
    WindowStats {
        visits: events
            .iter()
            .filter(|e| e.event_type == EventType::PageView)
            .count(),
        messages: events
            .iter()
            .filter(|e| e.event_type == EventType::ChatMessage)
            .count(),
        unique_sessions: sessions.len(),
    }
}

/// Bump the count for a question, inserting it if unseen, then re-sort
/// descending by count (stable, so ties keep first-seen order) and cap.
fn upsert_question(list: &mut Vec<QuestionCount>, question: &str) {
    match list.iter_mut().find(|q| q.question == question) {
        Some(entry) => entry.count += 1,
        None => list.push(QuestionCount {
            question: question.to_string(),
            count: 1,
        }),
    }
    list.sort_by(|a, b| b.count.cmp(&a.count));
    list.truncate(TOP_QUESTIONS_CAP);
}

/// Same as `upsert_question` for topics, but the list is uncapped.
fn upsert_topic(list: &mut Vec<TopicCount>, topic: &str) {
    match list.iter_mut().find(|t| t.topic == topic) {
        Some(entry) => entry.count += 1,
        None => list.push(TopicCount {
            topic: topic.to_string(),
            count: 1,
        }),
    }
    list.sort_by(|a, b| b.count.cmp(&a.count));
}
