//! Manager configuration, validated against the hardening requirements in
//! spec §4.H.1.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of history samples returned when `limit <= 0`.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;
/// Above this, a caller-supplied limit is honoured but logged as suspicious.
pub const MAX_HISTORY_LIMIT: usize = 1_000;
/// Hard ceiling on any limit or allocation driven by caller input.
pub const ABSOLUTE_MAX_HISTORY_LIMIT: usize = 10_000;

/// Errors returned by [`ManagerConfig::validate`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `output_directory` contained `..` or escaped `root`.
    #[error("output directory {path} escapes configured root {root}")]
    UnsafeOutputDirectory {
        /// The rejected path.
        path: String,
        /// The root it was checked against.
        root: String,
    },
}

/// Top-level manager configuration (spec §4.K).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Per-request timeout for agent HTTP calls.
    pub agent_request_timeout: Duration,
    /// Timeout for `/ping` health probes.
    pub ping_timeout: Duration,
    /// Interval between topology-discovery cycles.
    pub topology_discovery_interval: Duration,
    /// Interval between fault-detection polling cycles.
    pub fault_detection_interval: Duration,
    /// Retention window for metrics samples.
    pub metrics_retention: Duration,
    /// Interval of the metrics-retention cleanup sweep.
    pub metrics_cleanup_interval: Duration,
    /// Per-agent/global ring-buffer capacity.
    pub max_history_size: usize,
    /// Directory metrics reports may be written under.
    pub output_directory: Option<PathBuf>,
    /// Root directory `output_directory` must not escape.
    pub output_root: PathBuf,
    /// Threshold p95 latency, ms, above which a `HighLatency` fault fires.
    pub high_latency_threshold_ms: f64,
    /// Bounded event-bus queue capacity.
    pub event_bus_capacity: usize,
}

impl ManagerConfig {
    /// Development preset: short intervals for fast feedback, matching the
    /// teacher's `RouterConfig::development()` shape.
    #[must_use]
    pub fn development() -> Self {
        Self {
            agent_request_timeout: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(5),
            topology_discovery_interval: Duration::from_secs(15),
            fault_detection_interval: Duration::from_secs(10),
            metrics_retention: Duration::from_secs(3_600),
            metrics_cleanup_interval: Duration::from_secs(60),
            max_history_size: DEFAULT_HISTORY_LIMIT,
            output_directory: None,
            output_root: PathBuf::from("."),
            high_latency_threshold_ms: 50.0,
            event_bus_capacity: 1_000,
        }
    }

    /// Production preset: longer intervals, full retention window.
    #[must_use]
    pub fn production() -> Self {
        Self {
            agent_request_timeout: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(5),
            topology_discovery_interval: Duration::from_secs(60),
            fault_detection_interval: Duration::from_secs(30),
            metrics_retention: Duration::from_secs(24 * 3_600),
            metrics_cleanup_interval: Duration::from_secs(3_600),
            max_history_size: MAX_HISTORY_LIMIT,
            output_directory: None,
            output_root: PathBuf::from("/var/lib/tn-control-plane"),
            high_latency_threshold_ms: 50.0,
            event_bus_capacity: 1_000,
        }
    }

    /// Validate and clamp this config in place (spec §4.H.1):
    /// - `max_history_size <= 0` resets to [`DEFAULT_HISTORY_LIMIT`].
    /// - `max_history_size > ABSOLUTE_MAX_HISTORY_LIMIT` clamps down.
    /// - `metrics_cleanup_interval < 10s` is raised to 10s.
    /// - `output_directory` escaping `output_root` is rejected.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.max_history_size == 0 {
            self.max_history_size = DEFAULT_HISTORY_LIMIT;
        } else if self.max_history_size > ABSOLUTE_MAX_HISTORY_LIMIT {
            self.max_history_size = ABSOLUTE_MAX_HISTORY_LIMIT;
        }

        let floor = Duration::from_secs(10);
        if self.metrics_cleanup_interval < floor {
            self.metrics_cleanup_interval = floor;
        }

        if let Some(dir) = &self.output_directory {
            validate_output_directory(dir, &self.output_root)?;
        }

        Ok(())
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::production()
    }
}

fn validate_output_directory(path: &Path, root: &Path) -> Result<(), ConfigError> {
    use std::path::Component;

    if path.components().any(|c| c == Component::ParentDir) {
        return Err(ConfigError::UnsafeOutputDirectory {
            path: path.display().to_string(),
            root: root.display().to_string(),
        });
    }

    let candidate = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };

    if candidate.is_absolute() && root.is_absolute() && !candidate.starts_with(root) {
        return Err(ConfigError::UnsafeOutputDirectory {
            path: path.display().to_string(),
            root: root.display().to_string(),
        });
    }

    Ok(())
}

/// Validate a caller-supplied history limit per spec §4.H.1, returning the
/// limit to actually use, clamped by `available` samples.
///
/// 1. `limit <= 0` -> `min(available, DEFAULT_HISTORY_LIMIT)`.
/// 2. `limit > ABSOLUTE_MAX_HISTORY_LIMIT` -> clamp to the absolute max and
///    log a warning.
/// 3. `limit > MAX_HISTORY_LIMIT` (but within the absolute ceiling) -> keep
///    as-is but log a warning.
/// 4. Cap by `available`.
#[must_use]
pub fn resolve_history_limit(limit: i64, available: usize) -> usize {
    let resolved = if limit <= 0 {
        DEFAULT_HISTORY_LIMIT.min(available)
    } else {
        let limit = limit as u64;
        if limit > ABSOLUTE_MAX_HISTORY_LIMIT as u64 {
            tracing::warn!(
                requested = limit,
                clamp = ABSOLUTE_MAX_HISTORY_LIMIT,
                "history limit exceeds absolute maximum, clamping"
            );
            ABSOLUTE_MAX_HISTORY_LIMIT
        } else if limit > MAX_HISTORY_LIMIT as u64 {
            tracing::warn!(requested = limit, "history limit exceeds recommended maximum");
            limit as usize
        } else {
            limit as usize
        }
    };
    resolved.min(available)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_limit_non_positive_uses_default() {
        assert_eq!(resolve_history_limit(0, 500), 100);
        assert_eq!(resolve_history_limit(-100, 500), 100);
        assert_eq!(resolve_history_limit(0, 50), 50);
    }

    #[test]
    fn history_limit_billion_clamps_to_available_or_absolute_max() {
        assert_eq!(resolve_history_limit(1_000_000_000, 500), 500);
        assert_eq!(resolve_history_limit(1_000_000_000, 50_000), ABSOLUTE_MAX_HISTORY_LIMIT);
    }

    #[test]
    fn history_limit_max_i32_never_panics_or_overflows() {
        let result = resolve_history_limit(i64::from(i32::MAX), 10);
        assert_eq!(result, 10);
    }

    #[test]
    fn scenario_s4_memory_exhaustion_attempt() {
        assert_eq!(resolve_history_limit(999_999_999, 500), 500);
    }

    #[test]
    fn output_directory_rejects_traversal() {
        let mut cfg = ManagerConfig::development();
        cfg.output_root = PathBuf::from("/var/lib/tn");
        cfg.output_directory = Some(PathBuf::from("../escape"));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn output_directory_accepts_subdirectory() {
        let mut cfg = ManagerConfig::development();
        cfg.output_root = PathBuf::from("/var/lib/tn");
        cfg.output_directory = Some(PathBuf::from("/var/lib/tn/reports"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn output_directory_accepts_real_subdirectory_of_a_tempdir() {
        let root = tempfile::tempdir().unwrap();
        let reports = root.path().join("reports");
        std::fs::create_dir(&reports).unwrap();

        let mut cfg = ManagerConfig::development();
        cfg.output_root = root.path().to_path_buf();
        cfg.output_directory = Some(reports);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn max_history_size_zero_resets_to_default() {
        let mut cfg = ManagerConfig::development();
        cfg.max_history_size = 0;
        cfg.validate().unwrap();
        assert_eq!(cfg.max_history_size, DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn cleanup_interval_below_floor_is_raised() {
        let mut cfg = ManagerConfig::development();
        cfg.metrics_cleanup_interval = Duration::from_secs(1);
        cfg.validate().unwrap();
        assert_eq!(cfg.metrics_cleanup_interval, Duration::from_secs(10));
    }
}
