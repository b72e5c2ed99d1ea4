//! Structured logging setup and log-field sanitisation (spec §6, §9).

/// Strip ASCII control characters and escape line separators before an
/// externally-derived string (cluster name, endpoint, slice id, error
/// message) is written to a log sink. Prevents log-injection via embedded
/// newlines or terminal control sequences.
#[must_use]
pub fn sanitize_log_field(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '\n' => "\\n".to_string(),
            '\r' => "\\r".to_string(),
            c if c.is_control() => String::new(),
            c => c.to_string(),
        })
        .collect()
}

/// Initialize the global `tracing` subscriber from `RUST_LOG`, defaulting to
/// `info` for this crate. Matches the teacher's `main.rs` bootstrap.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tn_control_plane=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::sanitize_log_field;

    #[test]
    fn strips_control_characters() {
        assert_eq!(sanitize_log_field("edge01\x07"), "edge01");
    }

    #[test]
    fn escapes_newlines_and_carriage_returns() {
        assert_eq!(sanitize_log_field("a\nb\rc"), "a\\nb\\rc");
    }

    #[test]
    fn leaves_normal_text_untouched() {
        assert_eq!(sanitize_log_field("edge01-cluster.example"), "edge01-cluster.example");
    }
}
