use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::{header::RETRY_AFTER, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, info, warn};

use gleaner_core::messaging::{ClientError, MessagingClient};
use gleaner_core::types::{ChannelEntity, RawMessage};

/// Wait applied when the gateway rate-limits without saying for how long.
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
    session_token: String,
    connected: AtomicBool,
    connect_budget: Duration,
}

#[derive(Debug, Deserialize)]
struct SessionInfo {
    authorized: bool,
}

#[derive(Debug, Deserialize)]
struct HistoryPage {
    messages: Vec<RawMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    retry_after: Option<u64>,
}

impl GatewayClient {
    pub fn new(base_url: &str, session_token: String) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| ClientError::Api(format!("invalid gateway url {base_url}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Api(format!(
                "invalid gateway url {base_url}: not a base url"
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            base_url,
            session_token,
            connected: AtomicBool::new(false),
            connect_budget: Duration::from_secs(30),
        })
    }

    /// Total time `connect` keeps retrying transport errors.
    pub fn with_connect_budget(mut self, budget: Duration) -> Self {
        self.connect_budget = budget;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        debug!(%url, "gateway request");
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.session_token)
            .query(query)
            .send()
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<T>()
                .await
                .map_err(|err| ClientError::Api(format!("invalid gateway response: {err}")));
        }

        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        let body = resp.text().await.unwrap_or_default();
        Err(classify_status(status, retry_after, &body))
    }

    async fn session_info(&self) -> Result<SessionInfo, ClientError> {
        self.get_json(self.endpoint(&["v1", "session"]), &[]).await
    }
}

/// Map a non-success gateway response to a client error.
pub fn classify_status(status: StatusCode, retry_after: Option<u64>, body: &str) -> ClientError {
    let parsed: GatewayErrorBody = serde_json::from_str(body).unwrap_or_default();
    let detail = parsed
        .message
        .or(parsed.error)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    match status.as_u16() {
        401 | 403 => ClientError::Unauthorized(detail),
        420 | 429 => ClientError::RateLimited {
            wait: retry_after
                .or(parsed.retry_after)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RATE_LIMIT_WAIT),
        },
        code => ClientError::Api(format!("HTTP {code}: {detail}")),
    }
}

#[async_trait]
impl MessagingClient for GatewayClient {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), ClientError> {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(500),
            max_elapsed_time: Some(self.connect_budget),
            ..Default::default()
        };

        loop {
            match self.session_info().await {
                Ok(_) => {
                    self.connected.store(true, Ordering::SeqCst);
                    info!(gateway = %self.base_url, "gateway connected");
                    return Ok(());
                }
                Err(ClientError::Transport(err)) => match backoff.next_backoff() {
                    Some(delay) => {
                        warn!(error = %err, ?delay, "gateway unreachable, retrying");
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(ClientError::Transport(err)),
                },
                Err(err) => return Err(err),
            }
        }
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!(gateway = %self.base_url, "gateway disconnected");
        }
    }

    async fn is_authorized(&self) -> Result<bool, ClientError> {
        match self.session_info().await {
            Ok(info) => Ok(info.authorized),
            Err(ClientError::Unauthorized(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn resolve(&self, channel: &str) -> Result<ChannelEntity, ClientError> {
        self.get_json(self.endpoint(&["v1", "entities", channel]), &[])
            .await
    }

    async fn history(
        &self,
        entity: &ChannelEntity,
        offset_id: Option<i64>,
        limit: u32,
    ) -> Result<Vec<RawMessage>, ClientError> {
        let id = entity.id.to_string();
        let mut query = vec![("limit", limit.to_string())];
        if let Some(offset_id) = offset_id {
            query.push(("offset_id", offset_id.to_string()));
        }
        let page: HistoryPage = self
            .get_json(self.endpoint(&["v1", "entities", &id, "messages"]), &query)
            .await?;
        Ok(page.messages)
    }
}
