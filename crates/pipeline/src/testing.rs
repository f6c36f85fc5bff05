//! Scripted in-memory messaging client for pipeline tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use gleaner_core::messaging::{ClientError, MessagingClient};
use gleaner_core::types::{ChannelEntity, RawMessage, Sender};

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    RateLimited(u64),
    Unauthorized,
    Api,
}

impl Failure {
    fn to_error(self) -> ClientError {
        match self {
            Failure::RateLimited(secs) => ClientError::RateLimited {
                wait: Duration::from_secs(secs),
            },
            Failure::Unauthorized => ClientError::Unauthorized("AUTH_KEY_UNREGISTERED".into()),
            Failure::Api => ClientError::Api("CHANNEL_PRIVATE".into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ChannelScript {
    id: i64,
    title: Option<String>,
    /// Newest first.
    messages: Vec<RawMessage>,
    failure: Option<Failure>,
}

#[derive(Default)]
pub struct ScriptedClient {
    channels: Mutex<HashMap<String, ChannelScript>>,
    connected: AtomicBool,
    unauthorized: AtomicBool,
    refuse_connect: AtomicBool,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub history_calls: AtomicUsize,
    resolved: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_now(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    pub fn set_unauthorized(&self) {
        self.unauthorized.store(true, Ordering::SeqCst);
    }

    pub fn refuse_connect(&self) {
        self.refuse_connect.store(true, Ordering::SeqCst);
    }

    /// Register a channel; messages are sorted newest first.
    pub fn channel(&self, name: &str, title: Option<&str>, mut messages: Vec<RawMessage>) {
        messages.sort_by(|a, b| b.date.cmp(&a.date));
        let mut channels = self.channels.lock().unwrap();
        let id = channels.len() as i64 + 1000;
        channels.insert(
            name.to_string(),
            ChannelScript {
                id,
                title: title.map(str::to_string),
                messages,
                failure: None,
            },
        );
    }

    pub fn fail_channel(&self, name: &str, failure: Failure) {
        let mut channels = self.channels.lock().unwrap();
        let id = channels.len() as i64 + 1000;
        channels.entry(name.to_string()).or_insert_with(|| ChannelScript {
            id,
            ..Default::default()
        });
        if let Some(script) = channels.get_mut(name) {
            script.failure = Some(failure);
        }
    }

    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingClient for ScriptedClient {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), ClientError> {
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("connection refused".into()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn is_authorized(&self) -> Result<bool, ClientError> {
        Ok(!self.unauthorized.load(Ordering::SeqCst))
    }

    async fn resolve(&self, channel: &str) -> Result<ChannelEntity, ClientError> {
        self.resolved.lock().unwrap().push(channel.to_string());
        let channels = self.channels.lock().unwrap();
        match channels.get(channel) {
            Some(script) => match script.failure {
                Some(failure) => Err(failure.to_error()),
                None => Ok(ChannelEntity {
                    id: script.id,
                    title: script.title.clone(),
                }),
            },
            None => Err(ClientError::Api(format!("No user has \"{channel}\" as username"))),
        }
    }

    async fn history(
        &self,
        entity: &ChannelEntity,
        offset_id: Option<i64>,
        limit: u32,
    ) -> Result<Vec<RawMessage>, ClientError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let channels = self.channels.lock().unwrap();
        let script = channels
            .values()
            .find(|script| script.id == entity.id)
            .ok_or_else(|| ClientError::Api("CHANNEL_INVALID".into()))?;
        Ok(script
            .messages
            .iter()
            .filter(|m| offset_id.map_or(true, |offset| m.id < offset))
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

pub fn human(first: &str, last: Option<&str>, username: Option<&str>) -> Option<Sender> {
    Some(Sender {
        bot: false,
        first_name: Some(first.to_string()),
        last_name: last.map(str::to_string),
        username: username.map(str::to_string),
    })
}

pub fn bot(username: &str) -> Option<Sender> {
    Some(Sender {
        bot: true,
        first_name: Some("Price".to_string()),
        last_name: None,
        username: Some(username.to_string()),
    })
}

pub fn message(
    id: i64,
    date: DateTime<Utc>,
    text: &str,
    sender: Option<Sender>,
) -> RawMessage {
    RawMessage {
        id,
        date,
        text: Some(text.to_string()),
        sender,
    }
}
