use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{error, info, warn};

use gleaner_core::config::Settings;
use gleaner_core::types::{MessageRecord, StopReason};

use crate::fetcher::{ChannelFetcher, FetchOutcome, FetchRequest};
use crate::session::SessionLease;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Delay before every channel except the first.
    pub pacing: Duration,
    /// Reconnect after this many channels; `0` disables it.
    pub reconnect_every: usize,
    pub reconnect_pause: Duration,
    pub error_reconnect_delay: Duration,
    pub min_message_length: usize,
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            pacing: settings.request_delay,
            reconnect_every: settings.reconnect_every,
            reconnect_pause: Duration::from_secs(3),
            error_reconnect_delay: Duration::from_secs(2),
            min_message_length: settings.min_message_length,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunParams<'a> {
    pub channels: &'a [String],
    pub cutoff_days: i64,
    pub max_messages_per_channel: Option<usize>,
    pub min_length_override: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Full,
    StoppedEarly(StopReason),
}

impl Completion {
    pub fn stop_reason(&self) -> Option<StopReason> {
        match self {
            Completion::Full => None,
            Completion::StoppedEarly(reason) => Some(*reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Fetched,
    Skipped,
    Stopped,
}

/// What happened to one attempted channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReport {
    pub channel: String,
    pub title: String,
    pub status: ChannelStatus,
    pub messages: usize,
}

#[derive(Debug)]
pub struct IngestOutcome {
    /// Newest first; ties keep the order in which they were collected.
    pub messages: Vec<MessageRecord>,
    pub channels: Vec<ChannelReport>,
    pub completion: Completion,
}

impl IngestOutcome {
    pub fn channels_attempted(&self) -> usize {
        self.channels.len()
    }
}

pub struct Orchestrator<'a> {
    lease: &'a SessionLease,
    config: &'a OrchestratorConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(lease: &'a SessionLease, config: &'a OrchestratorConfig) -> Self {
        Self { lease, config }
    }

    pub async fn run(&self, params: &RunParams<'_>) -> IngestOutcome {
        let client = self.lease.client();
        let fetcher = ChannelFetcher::new(client, self.config.error_reconnect_delay);
        let cutoff = TimeDelta::try_days(params.cutoff_days)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let min_length = params
            .min_length_override
            .unwrap_or(self.config.min_message_length);
        let total = params.channels.len();

        let mut messages: Vec<MessageRecord> = Vec::new();
        let mut reports = Vec::with_capacity(total);
        let mut completion = Completion::Full;

        for (index, channel) in params.channels.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.pacing).await;
            }

            let every = self.config.reconnect_every;
            if index > 0 && every > 0 && index % every == 0 {
                info!(processed = index, "periodic reconnect");
                client.disconnect().await;
                tokio::time::sleep(self.config.reconnect_pause).await;
                if let Err(err) = client.connect().await {
                    error!(error = %err, "periodic reconnect failed");
                }
            }

            info!(channel = %channel, position = index + 1, total, "fetching channel");
            let request = FetchRequest {
                channel: channel.as_str(),
                cutoff,
                min_length,
                max_messages: params.max_messages_per_channel,
            };

            match fetcher.fetch(&request).await {
                FetchOutcome::Fetched {
                    title,
                    messages: fetched,
                } => {
                    reports.push(ChannelReport {
                        channel: channel.clone(),
                        title,
                        status: ChannelStatus::Fetched,
                        messages: fetched.len(),
                    });
                    messages.extend(fetched);
                }
                FetchOutcome::Skipped { title, .. } => {
                    reports.push(ChannelReport {
                        channel: channel.clone(),
                        title,
                        status: ChannelStatus::Skipped,
                        messages: 0,
                    });
                }
                FetchOutcome::RateLimited { wait } => {
                    warn!(
                        channel = %channel,
                        wait_secs = wait.as_secs(),
                        remaining = total - index - 1,
                        "rate limited, stopping run early"
                    );
                    reports.push(stopped(channel));
                    completion = Completion::StoppedEarly(StopReason::RateLimited);
                    break;
                }
                FetchOutcome::SessionInvalid { reason } => {
                    error!(
                        channel = %channel,
                        reason = %reason,
                        "messaging session is no longer valid, refresh the stored session; stopping run"
                    );
                    reports.push(stopped(channel));
                    completion = Completion::StoppedEarly(StopReason::SessionInvalid);
                    break;
                }
            }
        }

        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        info!(
            channels = reports.len(),
            total,
            messages = messages.len(),
            stopped_early = completion != Completion::Full,
            "ingestion finished"
        );

        IngestOutcome {
            messages,
            channels: reports,
            completion,
        }
    }
}

fn stopped(channel: &str) -> ChannelReport {
    ChannelReport {
        channel: channel.to_string(),
        title: channel.to_string(),
        status: ChannelStatus::Stopped,
        messages: 0,
    }
}
