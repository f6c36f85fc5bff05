use std::time::Duration;

use async_trait::async_trait;

use crate::types::{ChannelEntity, RawMessage};

/// Number of messages requested per history page.
pub const HISTORY_PAGE_SIZE: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The stored session is no longer accepted by the network.
    #[error("session not authorized: {0}")]
    Unauthorized(String),

    /// The network demands a pause before any further request.
    #[error("rate limited: retry after {}s", wait.as_secs())]
    RateLimited { wait: Duration },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("api error: {0}")]
    Api(String),
}

#[async_trait]
pub trait MessagingClient: Send + Sync {
    fn is_connected(&self) -> bool;

    async fn connect(&self) -> Result<(), ClientError>;

    async fn disconnect(&self);

    async fn is_authorized(&self) -> Result<bool, ClientError>;

    /// Resolve a handle or numeric id to a channel entity.
    async fn resolve(&self, channel: &str) -> Result<ChannelEntity, ClientError>;

    /// One page of history, newest first, strictly older than `offset_id` when given.
    async fn history(
        &self,
        entity: &ChannelEntity,
        offset_id: Option<i64>,
        limit: u32,
    ) -> Result<Vec<RawMessage>, ClientError>;
}
