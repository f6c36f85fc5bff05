//! Tests for channel list parsing and loading

#[cfg(test)]
mod tests {
    use super::super::channels::*;
    use super::super::config::{ChannelSource, ConfigError};
    use std::io::Write;

    // ============================================================
    // Normalization
    // ============================================================

    #[test]
    fn test_normalize_strips_link_prefixes() {
        assert_eq!(normalize_channel("https://t.me/cryptotalk"), Some("cryptotalk".to_string()));
        assert_eq!(normalize_channel("t.me/cryptotalk/"), Some("cryptotalk".to_string()));
        assert_eq!(normalize_channel("@cryptotalk"), Some("cryptotalk".to_string()));
        assert_eq!(normalize_channel("  -1001234567  "), Some("-1001234567".to_string()));
    }

    #[test]
    fn test_normalize_skips_blank_and_comments() {
        assert_eq!(normalize_channel(""), None);
        assert_eq!(normalize_channel("   "), None);
        assert_eq!(normalize_channel("# trading groups"), None);
        assert_eq!(normalize_channel("https://t.me/"), None);
    }

    // ============================================================
    // List parsing
    // ============================================================

    #[test]
    fn test_parse_keeps_order_and_drops_duplicates() {
        let text = "https://t.me/alpha\n\n# comment\n@beta\nalpha\nt.me/gamma\n";
        assert_eq!(parse_channel_list(text), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_parse_empty_text() {
        assert!(parse_channel_list("").is_empty());
        assert!(parse_channel_list("\n# nothing here\n").is_empty());
    }

    // ============================================================
    // Sources
    // ============================================================

    #[test]
    fn test_load_inline_source() {
        let source = ChannelSource::Inline(vec!["alpha".to_string(), "beta".to_string()]);
        assert_eq!(load_channels(&source).unwrap(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_load_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "https://t.me/whales").unwrap();
        writeln!(file, "https://t.me/signals").unwrap();
        writeln!(file, "https://t.me/whales").unwrap();

        let source = ChannelSource::File(file.path().to_path_buf());
        assert_eq!(load_channels(&source).unwrap(), vec!["whales", "signals"]);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let source = ChannelSource::File("/nonexistent/gleaner/channels.txt".into());
        let err = load_channels(&source).unwrap_err();
        assert!(matches!(err, ConfigError::ChannelSource { .. }));
        assert!(err.to_string().contains("/nonexistent/gleaner/channels.txt"));
    }
}
