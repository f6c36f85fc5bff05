use crate::config::{ChannelSource, ConfigError};

const LINK_PREFIXES: [&str; 4] = ["https://t.me/", "http://t.me/", "t.me/", "@"];

/// Reduce a user-supplied channel reference to a bare identifier.
pub fn normalize_channel(raw: &str) -> Option<String> {
    let mut value = raw.trim();
    for prefix in LINK_PREFIXES {
        if let Some(rest) = value.strip_prefix(prefix) {
            value = rest;
        }
    }
    let value = value.trim().trim_end_matches('/');
    if value.is_empty() || value.starts_with('#') {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn parse_channel_list(text: &str) -> Vec<String> {
    let mut channels: Vec<String> = Vec::new();
    for line in text.lines() {
        if let Some(channel) = normalize_channel(line) {
            if !channels.contains(&channel) {
                channels.push(channel);
            }
        }
    }
    channels
}

/// Read the channel list at run time so edits apply to the next run.
pub fn load_channels(source: &ChannelSource) -> Result<Vec<String>, ConfigError> {
    match source {
        ChannelSource::Inline(channels) => Ok(channels.clone()),
        ChannelSource::File(path) => std::fs::read_to_string(path)
            .map(|text| parse_channel_list(&text))
            .map_err(|source| ConfigError::ChannelSource {
                path: path.clone(),
                source,
            }),
    }
}
