//! Performance-test and status records (spec §3, §4.H).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Thesis SLA constants (spec §6, bit-exact).
pub mod thesis {
    /// Throughput targets, Mbps, one per validated scenario.
    pub const THROUGHPUT_TARGETS_MBPS: [f64; 3] = [0.93, 2.77, 4.57];
    /// RTT targets, milliseconds, one per validated scenario.
    pub const RTT_TARGETS_MS: [f64; 3] = [6.3, 15.7, 16.1];
    /// Deployment-time target, milliseconds.
    pub const DEPLOY_TIME_TARGET_MS: f64 = 600_000.0;
    /// Overall compliance percent required for SLA-compliant status.
    pub const SLA_COMPLIANT_THRESHOLD_PERCENT: f64 = 80.0;
    /// Tolerance band applied to throughput/RTT targets.
    pub const TOLERANCE: f64 = 0.10;
}

/// Throughput sub-record of a [`PerformanceMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThroughputMetrics {
    /// Average throughput, Mbps.
    pub avg_mbps: f64,
    /// Peak throughput, Mbps.
    pub peak_mbps: f64,
    /// Minimum throughput, Mbps.
    pub min_mbps: f64,
    /// Standard deviation of throughput samples, Mbps.
    pub std_dev_mbps: f64,
    /// Target throughput for this test, Mbps.
    pub target_mbps: f64,
    /// `avg_mbps / target_mbps`.
    pub achieved_ratio: f64,
    /// Uplink throughput, Mbps.
    pub uplink_mbps: f64,
    /// Downlink throughput, Mbps.
    pub downlink_mbps: f64,
    /// Bidirectional throughput, Mbps.
    pub bidirectional_mbps: f64,
}

/// Latency sub-record of a [`PerformanceMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyMetrics {
    /// Minimum observed latency, ms.
    pub min_ms: f64,
    /// Average observed latency, ms.
    pub avg_ms: f64,
    /// Maximum observed latency, ms.
    pub max_ms: f64,
    /// Standard deviation of latency samples, ms.
    pub std_dev_ms: f64,
    /// 50th percentile latency, ms.
    pub p50_ms: f64,
    /// 95th percentile latency, ms.
    pub p95_ms: f64,
    /// 99th percentile latency, ms.
    pub p99_ms: f64,
    /// Target latency for this test, ms.
    pub target_ms: f64,
    /// Round-trip time, ms.
    pub rtt_ms: f64,
}

/// A single performance-test result for one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// When the test completed.
    pub timestamp: DateTime<Utc>,
    /// Cluster the test ran against.
    pub cluster: String,
    /// Opaque test identifier.
    pub test_id: String,
    /// Test type, e.g. `"throughput"`.
    pub test_type: String,
    /// Test duration in milliseconds.
    pub duration_ms: f64,
    /// Throughput results.
    pub throughput: ThroughputMetrics,
    /// Latency results.
    pub latency: LatencyMetrics,
    /// Packet loss, percent.
    pub packet_loss_percent: f64,
    /// Jitter, ms.
    pub jitter_ms: f64,
    /// Bandwidth utilisation, percent.
    pub bandwidth_utilisation_percent: f64,
    /// Overhead introduced by VXLAN encapsulation, percent.
    pub vxlan_overhead_percent: f64,
    /// Overhead introduced by traffic-control enforcement, percent.
    pub tc_overhead_percent: f64,
    /// Path the test traffic took, e.g. cluster names in order.
    #[serde(default)]
    pub network_path: Vec<String>,
    /// Errors reported by the agent running the test, if any.
    pub errors: Option<Vec<String>>,
}

/// Compliance of a single performance-test run against the thesis SLA
/// targets (spec §4.H `ThesisValidation report`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThesisValidation {
    /// Achieved throughput values, one per target.
    pub throughput_achieved: Vec<f64>,
    /// Whether each throughput target was met.
    pub throughput_passed: Vec<bool>,
    /// Achieved RTT values, one per target.
    pub rtt_achieved: Vec<f64>,
    /// Whether each RTT target was met.
    pub rtt_passed: Vec<bool>,
    /// Achieved deployment time, ms.
    pub deploy_time_achieved_ms: f64,
    /// Whether the deployment-time target was met.
    pub deploy_time_passed: bool,
    /// Number of individual checks that passed.
    pub passed_count: usize,
    /// Total number of individual checks.
    pub total_count: usize,
    /// `passed_count / total_count * 100`.
    pub compliance_percent: f64,
}

impl ThesisValidation {
    /// Validate a network-slice's aggregate results against the fixed
    /// thesis targets, with a 10% tolerance band (spec §4.H, §8 S5).
    #[must_use]
    pub fn evaluate(throughputs: &[f64], rtts: &[f64], deploy_time_ms: f64) -> Self {
        use thesis::{DEPLOY_TIME_TARGET_MS, RTT_TARGETS_MS, THROUGHPUT_TARGETS_MBPS, TOLERANCE};

        let throughput_passed: Vec<bool> = throughputs
            .iter()
            .zip(THROUGHPUT_TARGETS_MBPS.iter())
            .map(|(achieved, target)| *achieved >= target * (1.0 - TOLERANCE))
            .collect();
        let rtt_passed: Vec<bool> = rtts
            .iter()
            .zip(RTT_TARGETS_MS.iter())
            .map(|(achieved, target)| *achieved <= target * (1.0 + TOLERANCE))
            .collect();
        let deploy_time_passed = deploy_time_ms <= DEPLOY_TIME_TARGET_MS;

        let passed_count = throughput_passed.iter().filter(|p| **p).count()
            + rtt_passed.iter().filter(|p| **p).count()
            + usize::from(deploy_time_passed);
        let total_count = throughput_passed.len() + rtt_passed.len() + 1;
        let compliance_percent = if total_count == 0 {
            0.0
        } else {
            (passed_count as f64 / total_count as f64) * 100.0
        };

        Self {
            throughput_achieved: throughputs.to_vec(),
            throughput_passed,
            rtt_achieved: rtts.to_vec(),
            rtt_passed,
            deploy_time_achieved_ms: deploy_time_ms,
            deploy_time_passed,
            passed_count,
            total_count,
            compliance_percent,
        }
    }
}

/// Aggregate performance across every cluster in a single test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPerformance {
    /// Mean of per-cluster average throughput, Mbps.
    pub avg_throughput_mbps: f64,
    /// Max of per-cluster peak throughput, Mbps.
    pub peak_throughput_mbps: f64,
    /// Mean of per-cluster average latency, ms.
    pub avg_latency_ms: f64,
    /// Max of per-cluster max latency, ms.
    pub max_latency_ms: f64,
    /// Mean of per-cluster packet loss, percent.
    pub avg_packet_loss_percent: f64,
    /// Mean of per-cluster jitter, ms.
    pub avg_jitter_ms: f64,
}

impl AggregatedPerformance {
    /// Aggregate a non-empty set of per-cluster metrics per the rule in
    /// spec §4.J ("Aggregation rule").
    #[must_use]
    pub fn aggregate(per_cluster: &[PerformanceMetrics]) -> Self {
        let n = per_cluster.len().max(1) as f64;
        let avg_throughput_mbps =
            per_cluster.iter().map(|m| m.throughput.avg_mbps).sum::<f64>() / n;
        let peak_throughput_mbps = per_cluster
            .iter()
            .map(|m| m.throughput.peak_mbps)
            .fold(0.0_f64, f64::max);
        let avg_latency_ms = per_cluster.iter().map(|m| m.latency.avg_ms).sum::<f64>() / n;
        let max_latency_ms = per_cluster
            .iter()
            .map(|m| m.latency.max_ms)
            .fold(0.0_f64, f64::max);
        let avg_packet_loss_percent =
            per_cluster.iter().map(|m| m.packet_loss_percent).sum::<f64>() / n;
        let avg_jitter_ms = per_cluster.iter().map(|m| m.jitter_ms).sum::<f64>() / n;

        Self {
            avg_throughput_mbps,
            peak_throughput_mbps,
            avg_latency_ms,
            max_latency_ms,
            avg_packet_loss_percent,
            avg_jitter_ms,
        }
    }
}

/// Per-test-run aggregate across every cluster involved (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSliceMetrics {
    /// Slice this run pertains to.
    pub slice_id: String,
    /// Slice/test type label.
    pub slice_type: String,
    /// When the run completed.
    pub timestamp: DateTime<Utc>,
    /// Per-cluster raw results.
    pub per_cluster: HashMap<String, PerformanceMetrics>,
    /// Cross-cluster aggregate.
    pub aggregated: AggregatedPerformance,
    /// `true` when thesis compliance `>= 80%`.
    pub sla_compliant: bool,
    /// Thesis SLA validation detail.
    pub thesis_validation: ThesisValidation,
}

/// VXLAN-specific status reported by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VxlanStatus {
    /// Whether the tunnel is currently up.
    pub tunnel_up: bool,
    /// Peer IPs currently associated.
    #[serde(default)]
    pub peers: Vec<String>,
    /// Packets transmitted.
    pub packets_tx: u64,
    /// Packets received.
    pub packets_rx: u64,
    /// Last heartbeat received from the peer.
    pub last_heartbeat: Option<DateTime<Utc>>,
}

/// Traffic-control status reported by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcStatus {
    /// Whether TC rules are currently active.
    pub rules_active: bool,
    /// Per-queue statistics.
    #[serde(default)]
    pub queue_stats: HashMap<String, serde_json::Value>,
    /// Whether shaping is currently enforced.
    pub shaping_active: bool,
    /// Interfaces under TC management.
    #[serde(default)]
    pub interfaces: Vec<String>,
}

/// Per-agent status snapshot (spec §3 `TNStatus`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TnStatus {
    /// Whether the agent reports itself healthy.
    pub healthy: bool,
    /// When this status was last refreshed.
    pub last_update: DateTime<Utc>,
    /// Number of active connections.
    pub active_connections: u64,
    /// Per-direction bandwidth usage, e.g. `{"uplink": 12.5}`.
    #[serde(default)]
    pub bandwidth_usage: HashMap<String, f64>,
    /// VXLAN status.
    pub vxlan: VxlanStatus,
    /// Traffic-control status.
    pub tc: TcStatus,
    /// Error messages reported alongside this status, if any.
    pub errors: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thesis_validation_matches_scenario_s5() {
        let v = ThesisValidation::evaluate(
            &[0.85, 2.80, 4.60],
            &[6.2, 15.5, 17.8],
            550_000.0,
        );
        assert_eq!(v.throughput_passed, vec![true, true, true]);
        assert_eq!(v.rtt_passed, vec![true, true, false]);
        assert!(v.deploy_time_passed);
        assert_eq!(v.passed_count, 6);
        assert_eq!(v.total_count, 7);
        assert!((v.compliance_percent - 600.0 / 7.0).abs() < 1e-9);
    }
}
