//! Validation, derivation, and merge semantics for QoS strategies
//! (spec §4.E).

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::Utc;
use dashmap::DashMap;

use crate::domain::{
    ClusterQosConfig, ComplianceSummary, InterfaceQosConfig, QosStrategy, QosStrategyUpdate,
    QosViolation, Rate, SchedulingAlgorithm, SliceId, TcRule,
};
use crate::error::TnError;

const MAX_VIOLATIONS_PER_SLICE: usize = 1000;
const MAX_COMPLIANCE_SAMPLES_PER_SLICE: usize = 100;

/// A single recorded compliance sample (spec §4.E `GetComplianceSummary`).
#[derive(Debug, Clone)]
struct ComplianceSample {
    percent: f64,
}

/// Validates QoS strategies, derives per-cluster traffic-control configs, and
/// keeps bounded violation/compliance history per slice.
#[derive(Debug, Default)]
pub struct QosManager {
    violations: DashMap<SliceId, RwLock<Vec<QosViolation>>>,
    compliance: DashMap<SliceId, RwLock<Vec<ComplianceSample>>>,
}

impl QosManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a strategy end to end (spec §4.E):
    /// - every bandwidth limit parses against the canonical rate grammar,
    /// - every latency target is `> 0`,
    /// - every traffic class has a unique name and priority `<= 10`,
    /// - every queue has priority `<= 10` and non-negative weight/burst.
    pub fn validate_strategy(&self, strategy: &QosStrategy) -> Result<(), TnError> {
        for (direction, rate) in &strategy.bandwidth_limits {
            Rate::parse(rate).map_err(|e| TnError::InvalidQos {
                field: format!("bandwidth_limits.{direction:?}"),
                reason: e.to_string(),
            })?;
        }

        for (metric, target) in &strategy.latency_targets {
            if *target <= 0.0 {
                return Err(TnError::InvalidQos {
                    field: format!("latency_targets.{metric}"),
                    reason: "latency target must be positive".to_string(),
                });
            }
        }

        let mut seen_names = HashSet::with_capacity(strategy.traffic_classes.len());
        for class in &strategy.traffic_classes {
            if !seen_names.insert(class.name.as_str()) {
                return Err(TnError::InvalidQos {
                    field: "traffic_classes.name".to_string(),
                    reason: format!("duplicate traffic class name {:?}", class.name),
                });
            }
            if class.priority > 10 {
                return Err(TnError::InvalidQos {
                    field: "traffic_classes.priority".to_string(),
                    reason: format!("priority {} exceeds maximum of 10", class.priority),
                });
            }
            if class.latency_budget_ms < 0.0 {
                return Err(TnError::InvalidQos {
                    field: "traffic_classes.latency_budget_ms".to_string(),
                    reason: "latency budget cannot be negative".to_string(),
                });
            }
            if let Some(dscp) = class.selector.dscp {
                if !(0..=63).contains(&dscp) {
                    return Err(TnError::InvalidQos {
                        field: "traffic_classes.selector.dscp".to_string(),
                        reason: format!("dscp {dscp} is outside the valid range [0, 63]"),
                    });
                }
            }
        }

        for queue in &strategy.scheduling.queues {
            if queue.priority > 10 {
                return Err(TnError::InvalidQos {
                    field: "scheduling.queues.priority".to_string(),
                    reason: format!("priority {} exceeds maximum of 10", queue.priority),
                });
            }
            if queue.weight < 0.0 {
                return Err(TnError::InvalidQos {
                    field: "scheduling.queues.weight".to_string(),
                    reason: "queue weight cannot be negative".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Derive the per-cluster enforcement config for a validated strategy
    /// (spec §4.E `GenerateClusterConfig`). Always regenerated, never stored.
    #[must_use]
    pub fn generate_cluster_config(
        &self,
        cluster_name: &str,
        strategy: &QosStrategy,
    ) -> ClusterQosConfig {
        let mut classes = strategy.traffic_classes.clone();
        classes.sort_by(|a, b| b.priority.cmp(&a.priority));

        let tc_rules: Vec<TcRule> = classes
            .into_iter()
            .map(|class| TcRule {
                class_name: class.name,
                priority: class.priority,
                selector: class.selector,
                actions: class.actions,
            })
            .collect();

        let interfaces = vec![InterfaceQosConfig {
            scheduling_algorithm: strategy.scheduling.algorithm,
            bandwidth_limits: strategy.bandwidth_limits.clone(),
            queues: strategy.scheduling.queues.clone(),
        }];

        ClusterQosConfig {
            cluster_name: cluster_name.to_string(),
            tc_rules,
            interfaces,
            cluster_optimisations: HashMap::new(),
            generated_at: Utc::now(),
        }
    }

    /// Merge a partial update into `strategy` and re-validate the result
    /// (spec §4.E `ApplyUpdates`). `ApplyUpdates(strategy, ∅)` is a no-op.
    pub fn apply_updates(
        &self,
        strategy: &QosStrategy,
        update: &QosStrategyUpdate,
    ) -> Result<QosStrategy, TnError> {
        let mut merged = strategy.clone();

        for (direction, rate) in &update.bandwidth_limits {
            merged.bandwidth_limits.insert(*direction, rate.clone());
        }
        for (metric, target) in &update.latency_targets {
            merged.latency_targets.insert(metric.clone(), *target);
        }
        for (name, priority) in &update.priority_changes {
            if let Some(class) = merged.traffic_classes.iter_mut().find(|c| &c.name == name) {
                class.priority = *priority;
            }
        }
        merged.traffic_classes.extend(update.add_classes.iter().cloned());
        if !update.remove_classes.is_empty() {
            merged
                .traffic_classes
                .retain(|c| !update.remove_classes.contains(&c.name));
        }
        if let Some(scheduling) = &update.scheduling {
            merged.scheduling = scheduling.clone();
        }

        self.validate_strategy(&merged)?;
        Ok(merged)
    }

    /// Raise priority (clamped at 10) of any class with a latency budget
    /// under 10ms, switch fair scheduling to priority scheduling, and halve
    /// every queue's burst size (spec §4.E `AdjustForLatency`, fault
    /// recovery path).
    #[must_use]
    pub fn adjust_for_latency(&self, strategy: &QosStrategy) -> QosStrategy {
        let mut adjusted = strategy.clone();

        for class in &mut adjusted.traffic_classes {
            if class.latency_budget_ms > 0.0 && class.latency_budget_ms < 10.0 {
                class.priority = (class.priority + 1).min(10);
            }
        }

        if adjusted.scheduling.algorithm == SchedulingAlgorithm::Fair {
            adjusted.scheduling.algorithm = SchedulingAlgorithm::Priority;
        }

        for queue in &mut adjusted.scheduling.queues {
            queue.burst /= 2;
        }

        adjusted
    }

    /// Record a QoS violation for `slice_id`, capped at
    /// [`MAX_VIOLATIONS_PER_SLICE`] (oldest dropped first).
    pub fn record_violation(&self, slice_id: SliceId, violation: QosViolation) {
        let entry = self
            .violations
            .entry(slice_id)
            .or_insert_with(|| RwLock::new(Vec::new()));
        let mut buf = entry.write().expect("violations lock poisoned");
        buf.push(violation);
        if buf.len() > MAX_VIOLATIONS_PER_SLICE {
            let excess = buf.len() - MAX_VIOLATIONS_PER_SLICE;
            buf.drain(0..excess);
        }
    }

    /// Record a compliance percentage sample for `slice_id`, capped at
    /// [`MAX_COMPLIANCE_SAMPLES_PER_SLICE`] (oldest dropped first).
    pub fn record_compliance(&self, slice_id: SliceId, percent: f64) {
        let entry = self
            .compliance
            .entry(slice_id)
            .or_insert_with(|| RwLock::new(Vec::new()));
        let mut buf = entry.write().expect("compliance lock poisoned");
        buf.push(ComplianceSample { percent });
        if buf.len() > MAX_COMPLIANCE_SAMPLES_PER_SLICE {
            let excess = buf.len() - MAX_COMPLIANCE_SAMPLES_PER_SLICE;
            buf.drain(0..excess);
        }
    }

    /// Latest compliance percent per slice and the overall mean across every
    /// recorded sample (spec §4.E `GetComplianceSummary`).
    #[must_use]
    pub fn get_compliance_summary(&self) -> ComplianceSummary {
        let mut per_slice_latest = HashMap::new();
        let mut all_samples = Vec::new();

        for entry in &self.compliance {
            let buf = entry.value().read().expect("compliance lock poisoned");
            if let Some(latest) = buf.last() {
                per_slice_latest.insert(entry.key().to_string(), latest.percent);
            }
            all_samples.extend(buf.iter().map(|s| s.percent));
        }

        let overall_mean = if all_samples.is_empty() {
            0.0
        } else {
            all_samples.iter().sum::<f64>() / all_samples.len() as f64
        };

        ComplianceSummary {
            per_slice_latest,
            overall_mean,
        }
    }

    /// Violations recorded for `slice_id`, oldest first.
    #[must_use]
    pub fn get_violations(&self, slice_id: &SliceId) -> Vec<QosViolation> {
        self.violations
            .get(slice_id)
            .map(|e| e.value().read().expect("violations lock poisoned").clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Direction, QosKind, SchedulingPolicy, Selector, TrafficClass};

    fn base_strategy() -> QosStrategy {
        QosStrategy {
            kind: QosKind::Urllc,
            bandwidth_limits: HashMap::from([(Direction::Downlink, "100Mbps".to_string())]),
            latency_targets: HashMap::from([("p99".to_string(), 10.0)]),
            traffic_classes: vec![TrafficClass {
                name: "voice".to_string(),
                priority: 9,
                latency_budget_ms: 5.0,
                selector: Selector::default(),
                actions: vec![],
            }],
            scheduling: SchedulingPolicy {
                algorithm: SchedulingAlgorithm::Fair,
                queues: vec![crate::domain::QueueConfig {
                    id: "q0".to_string(),
                    weight: 1.0,
                    priority: 5,
                    burst: 4096,
                }],
            },
        }
    }

    #[test]
    fn scenario_s2_rejects_bad_bandwidth_rate_before_any_io() {
        let manager = QosManager::new();
        let mut strategy = base_strategy();
        strategy
            .bandwidth_limits
            .insert(Direction::Uplink, "100mbps".to_string());

        let err = manager
            .validate_strategy(&strategy)
            .expect_err("lowercase suffix must be rejected");
        assert!(matches!(err, TnError::InvalidQos { .. }));
    }

    #[test]
    fn rejects_duplicate_traffic_class_names() {
        let manager = QosManager::new();
        let mut strategy = base_strategy();
        strategy.traffic_classes.push(strategy.traffic_classes[0].clone());
        assert!(manager.validate_strategy(&strategy).is_err());
    }

    #[test]
    fn rejects_dscp_out_of_range() {
        let manager = QosManager::new();
        for bad in [-1, 64] {
            let mut strategy = base_strategy();
            strategy.traffic_classes[0].selector.dscp = Some(bad);
            let err = manager
                .validate_strategy(&strategy)
                .expect_err("dscp outside [0, 63] must be rejected");
            assert!(matches!(err, TnError::InvalidQos { .. }));
        }
    }

    #[test]
    fn accepts_dscp_at_boundaries() {
        let manager = QosManager::new();
        for boundary in [0, 63] {
            let mut strategy = base_strategy();
            strategy.traffic_classes[0].selector.dscp = Some(boundary);
            assert!(manager.validate_strategy(&strategy).is_ok());
        }
    }

    #[test]
    fn invariant_generate_then_apply_empty_update_is_noop() {
        let manager = QosManager::new();
        let strategy = base_strategy();
        let config_before = manager.generate_cluster_config("edge01", &strategy);

        let unchanged = manager
            .apply_updates(&strategy, &QosStrategyUpdate::default())
            .unwrap();
        assert_eq!(unchanged, strategy);

        let config_after = manager.generate_cluster_config("edge01", &unchanged);
        assert_eq!(config_before.tc_rules, config_after.tc_rules);
    }

    #[test]
    fn apply_updates_merges_per_field_and_revalidates() {
        let manager = QosManager::new();
        let strategy = base_strategy();
        let update = QosStrategyUpdate {
            priority_changes: HashMap::from([("voice".to_string(), 10)]),
            ..Default::default()
        };

        let merged = manager.apply_updates(&strategy, &update).unwrap();
        assert_eq!(merged.traffic_classes[0].priority, 10);
        assert_eq!(merged.bandwidth_limits, strategy.bandwidth_limits);
    }

    #[test]
    fn apply_updates_rejects_invalid_merged_result() {
        let manager = QosManager::new();
        let strategy = base_strategy();
        let update = QosStrategyUpdate {
            bandwidth_limits: HashMap::from([(Direction::Uplink, "bogus".to_string())]),
            ..Default::default()
        };
        assert!(manager.apply_updates(&strategy, &update).is_err());
    }

    #[test]
    fn cluster_config_orders_rules_by_descending_priority() {
        let manager = QosManager::new();
        let mut strategy = base_strategy();
        strategy.traffic_classes.push(TrafficClass {
            name: "bulk".to_string(),
            priority: 1,
            latency_budget_ms: 0.0,
            selector: Selector::default(),
            actions: vec![],
        });

        let config = manager.generate_cluster_config("edge01", &strategy);
        let priorities: Vec<u8> = config.tc_rules.iter().map(|r| r.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(priorities, sorted);
    }

    #[test]
    fn adjust_for_latency_raises_priority_switches_scheduling_halves_burst() {
        let manager = QosManager::new();
        let strategy = base_strategy();
        let adjusted = manager.adjust_for_latency(&strategy);

        assert_eq!(adjusted.traffic_classes[0].priority, 10);
        assert_eq!(adjusted.scheduling.algorithm, SchedulingAlgorithm::Priority);
        assert_eq!(adjusted.scheduling.queues[0].burst, 2048);
    }

    #[test]
    fn adjust_for_latency_clamps_priority_at_ten() {
        let manager = QosManager::new();
        let mut strategy = base_strategy();
        strategy.traffic_classes[0].priority = 10;
        let adjusted = manager.adjust_for_latency(&strategy);
        assert_eq!(adjusted.traffic_classes[0].priority, 10);
    }

    #[test]
    fn violation_ring_buffer_caps_at_limit() {
        let manager = QosManager::new();
        let slice = SliceId::try_new("s1").unwrap();
        for i in 0..(MAX_VIOLATIONS_PER_SLICE + 10) {
            manager.record_violation(
                slice.clone(),
                QosViolation {
                    slice_id: slice.to_string(),
                    cluster_name: "edge01".to_string(),
                    description: format!("violation {i}"),
                    timestamp: Utc::now(),
                },
            );
        }
        assert_eq!(manager.get_violations(&slice).len(), MAX_VIOLATIONS_PER_SLICE);
    }

    #[test]
    fn compliance_summary_reports_latest_and_mean() {
        let manager = QosManager::new();
        let slice = SliceId::try_new("s1").unwrap();
        manager.record_compliance(slice.clone(), 80.0);
        manager.record_compliance(slice.clone(), 90.0);

        let summary = manager.get_compliance_summary();
        assert_eq!(summary.per_slice_latest.get("s1"), Some(&90.0));
        assert!((summary.overall_mean - 85.0).abs() < f64::EPSILON);
    }
}
