use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("channel source {path}: {source}")]
    ChannelSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where the ordered channel list comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSource {
    Inline(Vec<String>),
    File(PathBuf),
}

#[derive(Clone)]
pub struct Settings {
    pub database_url: String,
    pub api_bind: String,
    pub gateway_url: String,
    pub session_token: String,
    pub channel_source: ChannelSource,
    pub parse_days: i64,
    pub min_message_length: usize,
    pub request_delay: Duration,
    pub reconnect_every: usize,
    pub run_interval: Duration,
    pub run_on_start: bool,
    pub preview_max_messages: usize,
    pub preview_timeout: Duration,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_bind", &self.api_bind)
            .field("gateway_url", &self.gateway_url)
            .field("channel_source", &self.channel_source)
            .field("parse_days", &self.parse_days)
            .field("min_message_length", &self.min_message_length)
            .field("request_delay", &self.request_delay)
            .field("reconnect_every", &self.reconnect_every)
            .field("run_interval", &self.run_interval)
            .field("run_on_start", &self.run_on_start)
            .field("preview_max_messages", &self.preview_max_messages)
            .field("preview_timeout", &self.preview_timeout)
            .finish_non_exhaustive()
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());

        let database_url = lookup("GLEANER_DATABASE_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .ok_or(ConfigError::Missing("GLEANER_DATABASE_URL"))?;
        let gateway_url = lookup("GLEANER_GATEWAY_URL")
            .ok_or(ConfigError::Missing("GLEANER_GATEWAY_URL"))?;
        let session_token =
            lookup("GLEANER_SESSION").ok_or(ConfigError::Missing("GLEANER_SESSION"))?;
        let api_bind =
            lookup("GLEANER_API_BIND").unwrap_or_else(|| "0.0.0.0:8000".to_string());

        let channel_source = match lookup("GLEANER_CHANNELS").filter(|v| !v.trim().is_empty()) {
            Some(list) => ChannelSource::Inline(crate::channels::parse_channel_list(
                &list.replace(',', "\n"),
            )),
            None => ChannelSource::File(PathBuf::from(
                lookup("GLEANER_CHANNELS_FILE").unwrap_or_else(|| "crypto.txt".to_string()),
            )),
        };

        let run_on_start = lookup("GLEANER_RUN_ON_START")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            api_bind,
            gateway_url,
            session_token,
            channel_source,
            parse_days: parsed("GLEANER_PARSE_DAYS").unwrap_or(2) as i64,
            min_message_length: parsed("GLEANER_MIN_MESSAGE_LENGTH").unwrap_or(10) as usize,
            request_delay: Duration::from_millis(
                parsed("GLEANER_REQUEST_DELAY_MS").unwrap_or(1500),
            ),
            reconnect_every: parsed("GLEANER_RECONNECT_EVERY").unwrap_or(100) as usize,
            run_interval: Duration::from_secs(
                parsed("GLEANER_RUN_INTERVAL_HOURS")
                    .filter(|hours| *hours > 0)
                    .unwrap_or(6)
                    * 3600,
            ),
            run_on_start,
            preview_max_messages: parsed("GLEANER_PREVIEW_MAX_MESSAGES").unwrap_or(50) as usize,
            preview_timeout: Duration::from_secs(
                parsed("GLEANER_PREVIEW_TIMEOUT_SECS").unwrap_or(120),
            ),
        })
    }
}
