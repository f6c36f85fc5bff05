//! Exclusive ownership of the messaging session. A second caller is rejected
//! with [`SessionBusy`] rather than queued.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::info;

use gleaner_core::messaging::MessagingClient;

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("an ingestion run already holds the messaging session")]
pub struct SessionBusy;

#[derive(Clone)]
pub struct SharedSession {
    client: Arc<dyn MessagingClient>,
    permit: Arc<Semaphore>,
}

impl SharedSession {
    pub fn new(client: Arc<dyn MessagingClient>) -> Self {
        Self {
            client,
            permit: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn try_acquire(&self) -> Result<SessionLease, SessionBusy> {
        let permit = self
            .permit
            .clone()
            .try_acquire_owned()
            .map_err(|_| SessionBusy)?;
        Ok(SessionLease {
            client: self.client.clone(),
            _permit: permit,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.permit.available_permits() == 0
    }

    /// Disconnect on process exit. Waits for an in-flight run to release the session.
    pub async fn shutdown(&self) {
        let _permit = self.permit.acquire().await;
        self.client.disconnect().await;
        info!("messaging session closed");
    }
}

pub struct SessionLease {
    client: Arc<dyn MessagingClient>,
    _permit: OwnedSemaphorePermit,
}

impl SessionLease {
    pub fn client(&self) -> &dyn MessagingClient {
        self.client.as_ref()
    }
}
