use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{info, warn};

use gleaner_core::channels::normalize_channel;
use gleaner_core::config::Settings;
use gleaner_core::types::MessageRecord;

use crate::orchestrator::{IngestOutcome, Orchestrator, OrchestratorConfig, RunParams};
use crate::session::{SessionBusy, SharedSession};

/// Messages keyed by channel title, newest first within each group.
pub type PreviewGroups = BTreeMap<String, Vec<MessageRecord>>;

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error(transparent)]
    Busy(#[from] SessionBusy),

    #[error("preview did not finish within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("no channels given")]
    Empty,
}

#[derive(Clone)]
pub struct Previewer {
    session: SharedSession,
    config: OrchestratorConfig,
    default_days: i64,
    max_messages: usize,
    timeout: Duration,
}

impl Previewer {
    pub fn new(
        session: SharedSession,
        config: OrchestratorConfig,
        default_days: i64,
        max_messages: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            session,
            config,
            default_days,
            max_messages,
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings, session: SharedSession) -> Self {
        Self::new(
            session,
            OrchestratorConfig::from_settings(settings),
            settings.parse_days,
            settings.preview_max_messages,
            settings.preview_timeout,
        )
    }

    /// Fetch up to `max_messages` per channel from the last `days` days.
    ///
    /// Identifiers are normalized and deduplicated; any length filter is off.
    pub async fn preview(
        &self,
        channels: &[String],
        days: Option<i64>,
    ) -> Result<PreviewGroups, PreviewError> {
        let channels = normalize_all(channels);
        if channels.is_empty() {
            return Err(PreviewError::Empty);
        }

        let lease = self.session.try_acquire()?;
        let params = RunParams {
            channels: &channels,
            cutoff_days: days.unwrap_or(self.default_days),
            max_messages_per_channel: Some(self.max_messages),
            min_length_override: Some(0),
        };
        let orchestrator = Orchestrator::new(&lease, &self.config);

        let outcome = tokio::time::timeout(self.timeout, orchestrator.run(&params))
            .await
            .map_err(|_| {
                warn!(channels = channels.len(), "preview timed out");
                PreviewError::Timeout(self.timeout)
            })?;

        info!(
            channels = outcome.channels_attempted(),
            messages = outcome.messages.len(),
            "preview finished"
        );
        Ok(group_by_title(outcome))
    }
}

fn normalize_all(channels: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(channels.len());
    for channel in channels.iter().filter_map(|raw| normalize_channel(raw)) {
        if !normalized.contains(&channel) {
            normalized.push(channel);
        }
    }
    normalized
}

/// Every attempted channel gets a group, even when it yielded nothing.
pub fn group_by_title(outcome: IngestOutcome) -> PreviewGroups {
    let mut groups = PreviewGroups::new();
    for report in &outcome.channels {
        groups.entry(report.title.clone()).or_default();
    }
    for message in outcome.messages {
        groups
            .entry(message.channel_title.clone())
            .or_default()
            .push(message);
    }
    groups
}
