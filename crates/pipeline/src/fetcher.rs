use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{stream, Stream, TryStreamExt};
use tracing::{info, warn};

use gleaner_core::messaging::{ClientError, MessagingClient, HISTORY_PAGE_SIZE};
use gleaner_core::types::{ChannelEntity, MessageRecord, RawMessage};

#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub channel: &'a str,
    pub cutoff: DateTime<Utc>,
    pub min_length: usize,
    pub max_messages: Option<usize>,
}

#[derive(Debug)]
pub enum FetchOutcome {
    Fetched {
        title: String,
        messages: Vec<MessageRecord>,
    },
    /// Channel-local failure; the channel contributes nothing.
    Skipped { title: String, error: String },
    RateLimited { wait: Duration },
    SessionInvalid { reason: String },
}

pub struct ChannelFetcher<'a> {
    client: &'a dyn MessagingClient,
    error_reconnect_delay: Duration,
}

impl<'a> ChannelFetcher<'a> {
    pub fn new(client: &'a dyn MessagingClient, error_reconnect_delay: Duration) -> Self {
        Self {
            client,
            error_reconnect_delay,
        }
    }

    /// Reconnect if needed. An unauthorized session comes back as `Unauthorized`.
    pub async fn ensure_connected(&self) -> Result<(), ClientError> {
        if self.client.is_connected() {
            return Ok(());
        }
        info!("reconnecting to messaging network");
        self.client.connect().await?;
        if !self.client.is_authorized().await? {
            return Err(ClientError::Unauthorized(
                "stored session is not authorized".to_string(),
            ));
        }
        Ok(())
    }

    /// Never fails. The outcome says whether the run may continue.
    pub async fn fetch(&self, request: &FetchRequest<'_>) -> FetchOutcome {
        let mut title = request.channel.to_string();
        match self.collect(request, &mut title).await {
            Ok(messages) => {
                info!(
                    channel = request.channel,
                    title = %title,
                    messages = messages.len(),
                    "channel fetched"
                );
                FetchOutcome::Fetched { title, messages }
            }
            Err(ClientError::RateLimited { wait }) => FetchOutcome::RateLimited { wait },
            Err(ClientError::Unauthorized(reason)) => FetchOutcome::SessionInvalid { reason },
            Err(err) => {
                warn!(channel = request.channel, error = %err, "channel fetch failed");
                self.reset_connection().await;
                FetchOutcome::Skipped {
                    title,
                    error: err.to_string(),
                }
            }
        }
    }

    async fn collect(
        &self,
        request: &FetchRequest<'_>,
        title: &mut String,
    ) -> Result<Vec<MessageRecord>, ClientError> {
        self.ensure_connected().await?;

        let entity = self.client.resolve(request.channel).await?;
        *title = entity.display_title(request.channel);

        let mut messages = Vec::new();
        let cap_reached = |count: usize| request.max_messages.is_some_and(|max| count >= max);
        if cap_reached(0) {
            return Ok(messages);
        }

        let mut history = std::pin::pin!(history(self.client, &entity));
        while let Some(raw) = history.try_next().await? {
            // History arrives newest first, so the first old message ends the walk.
            if raw.date < request.cutoff {
                break;
            }
            if let Some(record) = shape_message(request.channel, title, raw, request.min_length) {
                messages.push(record);
                if cap_reached(messages.len()) {
                    break;
                }
            }
        }
        Ok(messages)
    }

    /// Tear the connection down and bring it back after a short pause.
    async fn reset_connection(&self) {
        self.client.disconnect().await;
        tokio::time::sleep(self.error_reconnect_delay).await;
        if let Err(err) = self.client.connect().await {
            warn!(error = %err, "reconnect after channel failure failed");
        }
    }
}

/// Lazily paged history, newest first. Pages are requested only as consumed.
fn history<'a>(
    client: &'a dyn MessagingClient,
    entity: &'a ChannelEntity,
) -> impl Stream<Item = Result<RawMessage, ClientError>> + Send + 'a {
    stream::try_unfold(
        (None::<i64>, false),
        move |(offset_id, exhausted)| async move {
            if exhausted {
                return Ok::<_, ClientError>(None);
            }
            let page = client.history(entity, offset_id, HISTORY_PAGE_SIZE).await?;
            let Some(last) = page.last() else {
                return Ok(None);
            };
            let next = (Some(last.id), page.len() < HISTORY_PAGE_SIZE as usize);
            let items = page.into_iter().map(Ok::<RawMessage, ClientError>);
            Ok(Some((stream::iter(items), next)))
        },
    )
    .try_flatten()
}

/// Apply the message filters and build a record, or drop the message.
pub fn shape_message(
    channel: &str,
    channel_title: &str,
    raw: RawMessage,
    min_length: usize,
) -> Option<MessageRecord> {
    let text = raw.text.filter(|text| !text.is_empty())?;
    if text.chars().count() < min_length {
        return None;
    }
    if raw.sender.as_ref().is_some_and(|sender| sender.bot) {
        return None;
    }

    let (sender_name, sender_username) = match raw.sender {
        Some(sender) => (Some(sender.display_name()), sender.username),
        None => (None, None),
    };

    Some(MessageRecord {
        channel: channel.to_string(),
        channel_title: channel_title.to_string(),
        message_id: raw.id,
        timestamp: raw.date,
        text,
        sender_name,
        sender_username,
    })
}
