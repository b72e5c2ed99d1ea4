//! Bounded, time-indexed metrics history and reporting (spec §4.H).

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::RwLock;

use crate::config::resolve_history_limit;
use crate::domain::{AggregatedPerformance, ClusterName, NetworkSliceMetrics, SliceId, ThesisValidation};

const MAX_TEST_RESULTS: usize = 1_000;

/// One timestamped snapshot of an agent's raw named metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,
    /// Named metric values as reported by the agent.
    pub values: HashMap<String, f64>,
}

/// Aggregate health for a single cluster, derived from its recorded
/// performance-test history.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterMetrics {
    /// Cluster these metrics describe.
    pub cluster_name: String,
    /// Number of performance-test samples contributing to this summary.
    pub sample_count: usize,
    /// `[0, 100]` composite score: mean of throughput-achieved ratio,
    /// latency-budget ratio, and (1 - packet loss / 100), each clamped to
    /// `[0, 1]` and averaged, then scaled to 100.
    pub health_score: f64,
    /// Mean average throughput across samples, Mbps.
    pub avg_throughput_mbps: f64,
    /// Mean average latency across samples, ms.
    pub avg_latency_ms: f64,
    /// Mean packet loss across samples, percent.
    pub avg_packet_loss_percent: f64,
}

/// Direction of a [`TrendAnalysis`] comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    /// Later half compliance is more than 5% higher than the earlier half.
    Improving,
    /// Later half compliance is more than 5% lower than the earlier half.
    Degrading,
    /// Within +/-5% of the earlier half.
    Stable,
}

/// Compares the first and second half of a slice's recorded test history.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendAnalysis {
    /// Mean compliance percent across the earlier half of the history.
    pub earlier_mean_compliance: f64,
    /// Mean compliance percent across the later half of the history.
    pub later_mean_compliance: f64,
    /// Direction of the trend.
    pub direction: TrendDirection,
    /// `min(data_points / 10, 1.0)`: how much history backs this trend.
    pub confidence: f64,
}

/// Letter-grade summary of recent quality across compliance, cluster health,
/// and trend confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    /// Excellent.
    A,
    /// Good.
    B,
    /// Acceptable.
    C,
    /// Poor.
    D,
    /// Failing.
    F,
}

/// Full quality assessment for a slice.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityAssessment {
    /// Letter grade.
    pub grade: Grade,
    /// The mean of the four underlying `[0, 100]` scores.
    pub score: f64,
}

/// Overview across every tracked slice (spec §4.H `Summary` report).
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Total number of performance-test runs recorded.
    pub total_tests: usize,
    /// Number of distinct slices with at least one recorded run.
    pub tracked_slices: usize,
    /// Number of runs that were SLA-compliant.
    pub sla_compliant_count: usize,
    /// Mean thesis compliance percent across every recorded run.
    pub mean_compliance_percent: f64,
}

/// Bounded, time-indexed store of agent metric samples and performance-test
/// results, plus the derived reports of spec §4.H.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    agent_samples: DashMap<ClusterName, RwLock<Vec<MetricSample>>>,
    test_results: RwLock<Vec<NetworkSliceMetrics>>,
    max_history_size: usize,
    retention: StdDuration,
}

impl MetricsCollector {
    /// Create a collector with the given per-agent ring-buffer capacity and
    /// global retention window.
    #[must_use]
    pub fn new(max_history_size: usize, retention: StdDuration) -> Self {
        Self {
            agent_samples: DashMap::new(),
            test_results: RwLock::new(Vec::new()),
            max_history_size,
            retention,
        }
    }

    /// Record one raw metric sample for `cluster`, capped at
    /// `max_history_size` (oldest dropped first).
    pub fn record_agent_metrics(&self, cluster: ClusterName, values: HashMap<String, f64>) {
        let entry = self
            .agent_samples
            .entry(cluster)
            .or_insert_with(|| RwLock::new(Vec::new()));
        let mut buf = entry.write().expect("agent samples lock poisoned");
        buf.push(MetricSample {
            timestamp: Utc::now(),
            values,
        });
        if buf.len() > self.max_history_size {
            let excess = buf.len() - self.max_history_size;
            buf.drain(0..excess);
        }
    }

    /// Newest-first metric samples for `cluster`, with `limit` hardened by
    /// [`resolve_history_limit`] (spec §4.H `GetMetricsHistory`, invariant 3).
    #[must_use]
    pub fn get_metrics_history(&self, cluster: &ClusterName, limit: i64) -> Vec<MetricSample> {
        let Some(entry) = self.agent_samples.get(cluster) else {
            return Vec::new();
        };
        let buf = entry.value().read().expect("agent samples lock poisoned");
        let resolved = resolve_history_limit(limit, buf.len());
        buf.iter().rev().take(resolved).cloned().collect()
    }

    /// Record a completed performance-test run, capped at
    /// [`MAX_TEST_RESULTS`] globally (oldest dropped first).
    pub fn record_test_result(&self, result: NetworkSliceMetrics) {
        let mut buf = self.test_results.write().expect("test results lock poisoned");
        buf.push(result);
        if buf.len() > MAX_TEST_RESULTS {
            let excess = buf.len() - MAX_TEST_RESULTS;
            buf.drain(0..excess);
        }
    }

    /// Drop any agent sample or test result older than `retention`,
    /// relative to `now` (spec §4.H, hourly cleanup sweep).
    pub fn cleanup_expired(&self, now: DateTime<Utc>) {
        let cutoff = now
            - Duration::seconds(i64::try_from(self.retention.as_secs()).unwrap_or(i64::MAX));

        for entry in &self.agent_samples {
            let mut buf = entry.value().write().expect("agent samples lock poisoned");
            buf.retain(|s| s.timestamp >= cutoff);
        }

        let mut buf = self.test_results.write().expect("test results lock poisoned");
        buf.retain(|r| r.timestamp >= cutoff);
    }

    fn results_for_slice(&self, slice_id: &SliceId) -> Vec<NetworkSliceMetrics> {
        self.test_results
            .read()
            .expect("test results lock poisoned")
            .iter()
            .filter(|r| r.slice_id == slice_id.to_string())
            .cloned()
            .collect()
    }

    /// Cross-slice overview of every recorded test run.
    #[must_use]
    pub fn get_summary(&self) -> Summary {
        let buf = self.test_results.read().expect("test results lock poisoned");
        let total_tests = buf.len();
        let tracked_slices = buf
            .iter()
            .map(|r| r.slice_id.clone())
            .collect::<std::collections::HashSet<_>>()
            .len();
        let sla_compliant_count = buf.iter().filter(|r| r.sla_compliant).count();
        let mean_compliance_percent = if buf.is_empty() {
            0.0
        } else {
            buf.iter().map(|r| r.thesis_validation.compliance_percent).sum::<f64>()
                / buf.len() as f64
        };

        Summary {
            total_tests,
            tracked_slices,
            sla_compliant_count,
            mean_compliance_percent,
        }
    }

    /// The most recent [`ThesisValidation`] recorded for `slice_id`, if any.
    #[must_use]
    pub fn get_thesis_validation_report(&self, slice_id: &SliceId) -> Option<ThesisValidation> {
        self.results_for_slice(slice_id)
            .last()
            .map(|r| r.thesis_validation.clone())
    }

    /// Aggregate health for `cluster_name`, derived from every recorded
    /// per-cluster result across all slices.
    #[must_use]
    pub fn get_cluster_metrics(&self, cluster_name: &str) -> Option<ClusterMetrics> {
        let buf = self.test_results.read().expect("test results lock poisoned");
        let samples: Vec<_> = buf
            .iter()
            .filter_map(|r| r.per_cluster.get(cluster_name))
            .collect();

        if samples.is_empty() {
            return None;
        }

        let n = samples.len() as f64;
        let avg_throughput_mbps = samples.iter().map(|m| m.throughput.avg_mbps).sum::<f64>() / n;
        let avg_latency_ms = samples.iter().map(|m| m.latency.avg_ms).sum::<f64>() / n;
        let avg_packet_loss_percent =
            samples.iter().map(|m| m.packet_loss_percent).sum::<f64>() / n;

        let health_score = samples
            .iter()
            .map(|m| {
                let throughput_score = m.throughput.achieved_ratio.clamp(0.0, 1.0);
                let latency_score = if m.latency.avg_ms > 0.0 {
                    (m.latency.target_ms / m.latency.avg_ms).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                let loss_score = (1.0 - m.packet_loss_percent / 100.0).clamp(0.0, 1.0);
                (throughput_score + latency_score + loss_score) / 3.0
            })
            .sum::<f64>()
            / n
            * 100.0;

        Some(ClusterMetrics {
            cluster_name: cluster_name.to_string(),
            sample_count: samples.len(),
            health_score,
            avg_throughput_mbps,
            avg_latency_ms,
            avg_packet_loss_percent,
        })
    }

    /// Compare the earlier and later half of `slice_id`'s recorded compliance
    /// history (spec §4.H `TrendAnalysis`).
    #[must_use]
    pub fn get_trend_analysis(&self, slice_id: &SliceId) -> Option<TrendAnalysis> {
        let mut results = self.results_for_slice(slice_id);
        if results.is_empty() {
            return None;
        }
        results.sort_by_key(|r| r.timestamp);

        let mid = results.len() / 2;
        let (earlier, later) = results.split_at(mid.max(1).min(results.len()));
        let later = if later.is_empty() { earlier } else { later };

        let mean = |slice: &[NetworkSliceMetrics]| -> f64 {
            slice.iter().map(|r| r.thesis_validation.compliance_percent).sum::<f64>()
                / slice.len() as f64
        };

        let earlier_mean_compliance = mean(earlier);
        let later_mean_compliance = mean(later);

        let delta = if earlier_mean_compliance.abs() < f64::EPSILON {
            0.0
        } else {
            (later_mean_compliance - earlier_mean_compliance) / earlier_mean_compliance
        };

        let direction = if delta > 0.05 {
            TrendDirection::Improving
        } else if delta < -0.05 {
            TrendDirection::Degrading
        } else {
            TrendDirection::Stable
        };

        let confidence = (results.len() as f64 / 10.0).min(1.0);

        Some(TrendAnalysis {
            earlier_mean_compliance,
            later_mean_compliance,
            direction,
            confidence,
        })
    }

    /// Letter-grade quality assessment for `slice_id`, combining compliance,
    /// mean cluster health, and trend confidence (spec §4.H `QualityAssessment`).
    #[must_use]
    pub fn get_quality_assessment(&self, slice_id: &SliceId) -> Option<QualityAssessment> {
        let results = self.results_for_slice(slice_id);
        let latest = results.last()?;

        let compliance_score = latest.thesis_validation.compliance_percent;
        let cluster_health_mean = latest
            .per_cluster
            .keys()
            .filter_map(|c| self.get_cluster_metrics(c))
            .map(|m| m.health_score)
            .collect::<Vec<_>>();
        let cluster_health_score = if cluster_health_mean.is_empty() {
            compliance_score
        } else {
            cluster_health_mean.iter().sum::<f64>() / cluster_health_mean.len() as f64
        };
        let trend_confidence_score = self
            .get_trend_analysis(slice_id)
            .map(|t| t.confidence * 100.0)
            .unwrap_or(0.0);
        let sla_score = if latest.sla_compliant { 100.0 } else { 0.0 };

        let score =
            (compliance_score + cluster_health_score + trend_confidence_score + sla_score) / 4.0;

        let grade = match score {
            s if s >= 90.0 => Grade::A,
            s if s >= 80.0 => Grade::B,
            s if s >= 70.0 => Grade::C,
            s if s >= 60.0 => Grade::D,
            _ => Grade::F,
        };

        Some(QualityAssessment { grade, score })
    }

    /// Rule-based operator guidance for `slice_id`, derived from the latest
    /// recorded run.
    #[must_use]
    pub fn get_recommendations(&self, slice_id: &SliceId) -> Vec<String> {
        let Some(latest) = self.results_for_slice(slice_id).last().cloned() else {
            return Vec::new();
        };

        let mut recommendations = Vec::new();

        if latest.thesis_validation.compliance_percent < 80.0 {
            recommendations.push(
                "compliance below 80%: raise priority on latency-sensitive traffic classes"
                    .to_string(),
            );
        }
        if latest.aggregated.avg_packet_loss_percent > 1.0 {
            recommendations.push(
                "packet loss above 1%: inspect link quality on the affected clusters".to_string(),
            );
        }
        if !latest.thesis_validation.deploy_time_passed {
            recommendations.push(
                "deployment time exceeded target: review agent-side provisioning latency"
                    .to_string(),
            );
        }
        if recommendations.is_empty() {
            recommendations.push("no action needed: all thesis targets met".to_string());
        }

        recommendations
    }

    /// Cross-cluster aggregate for the latest recorded run of `slice_id`.
    #[must_use]
    pub fn get_latest_aggregate(&self, slice_id: &SliceId) -> Option<AggregatedPerformance> {
        self.results_for_slice(slice_id).last().map(|r| r.aggregated.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LatencyMetrics, PerformanceMetrics, ThroughputMetrics};

    fn cluster(name: &str) -> ClusterName {
        ClusterName::try_new(name).unwrap()
    }

    fn perf(cluster_name: &str, avg_mbps: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            timestamp: Utc::now(),
            cluster: cluster_name.to_string(),
            test_id: "t1".to_string(),
            test_type: "throughput".to_string(),
            duration_ms: 1000.0,
            throughput: ThroughputMetrics {
                avg_mbps,
                peak_mbps: avg_mbps * 1.2,
                min_mbps: avg_mbps * 0.8,
                std_dev_mbps: 0.1,
                target_mbps: 1.0,
                achieved_ratio: avg_mbps,
                uplink_mbps: avg_mbps,
                downlink_mbps: avg_mbps,
                bidirectional_mbps: avg_mbps,
            },
            latency: LatencyMetrics {
                min_ms: 1.0,
                avg_ms: 5.0,
                max_ms: 8.0,
                std_dev_ms: 0.5,
                p50_ms: 5.0,
                p95_ms: 7.0,
                p99_ms: 8.0,
                target_ms: 10.0,
                rtt_ms: 5.0,
            },
            packet_loss_percent: 0.1,
            jitter_ms: 0.2,
            bandwidth_utilisation_percent: 50.0,
            vxlan_overhead_percent: 2.0,
            tc_overhead_percent: 1.0,
            network_path: vec![],
            errors: None,
        }
    }

    fn slice_metrics(slice_id: &str, compliance: f64, ts: DateTime<Utc>) -> NetworkSliceMetrics {
        let per_cluster = HashMap::from([("edge01".to_string(), perf("edge01", 0.95))]);
        NetworkSliceMetrics {
            slice_id: slice_id.to_string(),
            slice_type: "throughput".to_string(),
            timestamp: ts,
            per_cluster: per_cluster.clone(),
            aggregated: AggregatedPerformance::aggregate(&per_cluster.into_values().collect::<Vec<_>>()),
            sla_compliant: compliance >= 80.0,
            thesis_validation: ThesisValidation {
                throughput_achieved: vec![0.95],
                throughput_passed: vec![true],
                rtt_achieved: vec![5.0],
                rtt_passed: vec![true],
                deploy_time_achieved_ms: 1000.0,
                deploy_time_passed: true,
                passed_count: 1,
                total_count: 1,
                compliance_percent: compliance,
            },
        }
    }

    #[test]
    fn invariant_agent_history_is_bounded_and_newest_first() {
        let collector = MetricsCollector::new(5, StdDuration::from_secs(3_600));
        let cluster = cluster("edge01");
        for i in 0..10 {
            collector.record_agent_metrics(cluster.clone(), HashMap::from([("cpu".to_string(), i as f64)]));
        }
        let history = collector.get_metrics_history(&cluster, 100);
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].values["cpu"], 9.0);
        assert_eq!(history[4].values["cpu"], 5.0);
    }

    #[test]
    fn scenario_s4_hostile_limit_is_hardened_by_resolve_history_limit() {
        let collector = MetricsCollector::new(500, StdDuration::from_secs(3_600));
        let cluster = cluster("edge01");
        for i in 0..10 {
            collector.record_agent_metrics(cluster.clone(), HashMap::from([("cpu".to_string(), i as f64)]));
        }
        assert_eq!(collector.get_metrics_history(&cluster, 999_999_999).len(), 10);
    }

    #[test]
    fn cleanup_expired_drops_old_samples() {
        let collector = MetricsCollector::new(100, StdDuration::from_secs(60));
        let cluster = cluster("edge01");
        collector.record_agent_metrics(cluster.clone(), HashMap::new());
        collector.cleanup_expired(Utc::now() + Duration::hours(1));
        assert!(collector.get_metrics_history(&cluster, 10).is_empty());
    }

    #[test]
    fn summary_counts_sla_compliant_runs() {
        let collector = MetricsCollector::new(100, StdDuration::from_secs(3_600));
        collector.record_test_result(slice_metrics("s1", 90.0, Utc::now()));
        collector.record_test_result(slice_metrics("s1", 50.0, Utc::now()));

        let summary = collector.get_summary();
        assert_eq!(summary.total_tests, 2);
        assert_eq!(summary.tracked_slices, 1);
        assert_eq!(summary.sla_compliant_count, 1);
        approx::assert_relative_eq!(summary.mean_compliance_percent, 70.0);
    }

    #[test]
    fn trend_analysis_detects_improvement() {
        let collector = MetricsCollector::new(100, StdDuration::from_secs(3_600));
        let base = Utc::now();
        for i in 0..4 {
            collector.record_test_result(slice_metrics("s1", 50.0, base + Duration::seconds(i)));
        }
        for i in 4..8 {
            collector.record_test_result(slice_metrics("s1", 90.0, base + Duration::seconds(i)));
        }

        let slice = SliceId::try_new("s1").unwrap();
        let trend = collector.get_trend_analysis(&slice).unwrap();
        assert_eq!(trend.direction, TrendDirection::Improving);
        approx::assert_relative_eq!(trend.confidence, 0.8);
    }

    #[test]
    fn quality_assessment_grades_high_compliance_as_a_or_b() {
        let collector = MetricsCollector::new(100, StdDuration::from_secs(3_600));
        collector.record_test_result(slice_metrics("s1", 95.0, Utc::now()));
        let slice = SliceId::try_new("s1").unwrap();
        let assessment = collector.get_quality_assessment(&slice).unwrap();
        assert!(matches!(assessment.grade, Grade::A | Grade::B));
    }

    #[test]
    fn recommendations_flag_low_compliance() {
        let collector = MetricsCollector::new(100, StdDuration::from_secs(3_600));
        collector.record_test_result(slice_metrics("s1", 40.0, Utc::now()));
        let slice = SliceId::try_new("s1").unwrap();
        let recs = collector.get_recommendations(&slice);
        assert!(recs.iter().any(|r| r.contains("compliance below 80%")));
    }
}
