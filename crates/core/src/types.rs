use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ingested chat message, as persisted in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Identifier exactly as it was requested.
    pub channel: String,
    pub channel_title: String,
    pub message_id: i64,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub sender_name: Option<String>,
    pub sender_username: Option<String>,
}

/// Serialized result of one successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub parsed_at: DateTime<Utc>,
    pub parse_days: i64,
    pub chats_count: i64,
    pub messages_count: i64,
    pub messages: Vec<MessageRecord>,
}

impl Snapshot {
    pub fn new(parse_days: i64, chats_count: usize, messages: Vec<MessageRecord>) -> Self {
        Self {
            parsed_at: Utc::now(),
            parse_days,
            chats_count: chats_count as i64,
            messages_count: messages.len() as i64,
            messages,
        }
    }
}

/// A channel resolved by the messaging network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEntity {
    pub id: i64,
    pub title: Option<String>,
}

impl ChannelEntity {
    /// Display title, falling back to the identifier that was requested.
    pub fn display_title(&self, requested: &str) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => requested.to_string(),
        }
    }
}

/// A message as delivered by the messaging network, before filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: i64,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub text: Option<String>,
    /// Present only when the sender is a user account (human or bot).
    #[serde(default)]
    pub sender: Option<Sender>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl Sender {
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

/// Why a run stopped before attempting every configured channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    RateLimited,
    SessionInvalid,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::RateLimited => "rate_limited",
            StopReason::SessionInvalid => "session_invalid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunTrigger {
    Scheduled,
    Manual,
}

impl RunTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunTrigger::Scheduled => "scheduled",
            RunTrigger::Manual => "manual",
        }
    }
}
