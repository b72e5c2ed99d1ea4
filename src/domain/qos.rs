//! QoS strategy, traffic classes, and the derived per-cluster enforcement
//! config (spec §3, §4.E).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three pre-defined QoS strategy kinds plus an escape hatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QosKind {
    /// Ultra-reliable low-latency communication.
    Urllc,
    /// Enhanced mobile broadband.
    Embb,
    /// Massive IoT.
    Miot,
    /// Operator-defined strategy not covered by the above.
    Custom,
}

/// Direction a bandwidth limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards the user equipment / edge.
    Downlink,
    /// Away from the user equipment / edge.
    Uplink,
    /// Applies identically to both directions.
    Bidirectional,
}

/// Scheduling algorithm applied by the cluster's traffic control layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingAlgorithm {
    /// First in, first out.
    Fifo,
    /// Fair queueing across classes.
    Fair,
    /// Strict priority queueing.
    Priority,
    /// Class-based queueing.
    Cbq,
}

/// Protocol matched by a [`Selector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Transmission Control Protocol.
    Tcp,
    /// User Datagram Protocol.
    Udp,
    /// Internet Control Message Protocol.
    Icmp,
    /// Stream Control Transmission Protocol.
    Sctp,
}

/// Selects which packets a [`TrafficClass`] applies to. `None` fields match
/// anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    /// Protocol to match; absent matches any protocol.
    pub protocol: Option<Protocol>,
    /// DSCP mark to match, `[0, 63]`.
    pub dscp: Option<i16>,
    /// Source IP to match.
    pub src_ip: Option<String>,
    /// Destination IP to match.
    pub dst_ip: Option<String>,
    /// Source port to match.
    pub src_port: Option<u16>,
    /// Destination port to match.
    pub dst_port: Option<u16>,
}

/// Kind of enforcement action attached to a [`TrafficClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Mark matching packets (e.g. set DSCP).
    Mark,
    /// Police matching packets to a rate, dropping excess.
    Police,
    /// Shape matching packets to a rate, queueing excess.
    Shape,
    /// Drop matching packets outright.
    Drop,
}

/// A single enforcement action within a [`TrafficClass`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Kind of action to apply.
    pub kind: ActionKind,
    /// Free-form parameters for the action (e.g. `{"rate": "10Mbps"}`).
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

/// A named traffic class within a [`QosStrategy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficClass {
    /// Unique (within the owning strategy) name.
    pub name: String,
    /// Scheduling priority, `[0, 10]`.
    pub priority: u8,
    /// Latency budget in milliseconds; `0` means "no budget set".
    pub latency_budget_ms: f64,
    /// Packet selector.
    #[serde(default)]
    pub selector: Selector,
    /// Actions to take on matching packets.
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// A named queue within a cluster's traffic-control configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Unique queue identifier.
    pub id: String,
    /// Relative scheduling weight, `>= 0`.
    pub weight: f64,
    /// Scheduling priority, `[0, 10]`.
    pub priority: u8,
    /// Burst size in bytes; halved by [`crate::qos_manager::QosManager::adjust_for_latency`].
    pub burst: u64,
}

/// A validated, structured QoS strategy (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QosStrategy {
    /// Strategy kind.
    pub kind: QosKind,
    /// Bandwidth limit per direction, as canonical rate strings.
    #[serde(default)]
    pub bandwidth_limits: HashMap<Direction, String>,
    /// Latency target per named metric, in milliseconds.
    #[serde(default)]
    pub latency_targets: HashMap<String, f64>,
    /// Ordered traffic classes.
    #[serde(default)]
    pub traffic_classes: Vec<TrafficClass>,
    /// Scheduling policy applied across traffic classes.
    pub scheduling: SchedulingPolicy,
}

/// The scheduling portion of a [`QosStrategy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingPolicy {
    /// Scheduling algorithm.
    pub algorithm: SchedulingAlgorithm,
    /// Queues managed under this policy.
    #[serde(default)]
    pub queues: Vec<QueueConfig>,
}

/// A single ordered traffic-control rule within a [`ClusterQosConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcRule {
    /// Name of the originating traffic class.
    pub class_name: String,
    /// Priority this rule was ordered by (descending).
    pub priority: u8,
    /// Selector copied from the traffic class.
    pub selector: Selector,
    /// Actions copied from the traffic class.
    pub actions: Vec<Action>,
}

/// Per-interface derived configuration within a [`ClusterQosConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceQosConfig {
    /// Scheduling algorithm carried from the strategy.
    pub scheduling_algorithm: SchedulingAlgorithm,
    /// Bandwidth limits carried from the strategy.
    pub bandwidth_limits: HashMap<Direction, String>,
    /// Queues carried from the strategy's scheduling policy.
    pub queues: Vec<QueueConfig>,
}

/// The per-cluster derived form of a [`QosStrategy`], ready for an agent to
/// enforce. Always regenerated, never stored (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterQosConfig {
    /// Cluster this config targets.
    pub cluster_name: String,
    /// Traffic-control rules ordered by descending priority.
    pub tc_rules: Vec<TcRule>,
    /// Per-interface configuration (one default entry today).
    pub interfaces: Vec<InterfaceQosConfig>,
    /// Free-form cluster-specific optimisation hints.
    #[serde(default)]
    pub cluster_optimisations: HashMap<String, serde_json::Value>,
    /// When this config was generated.
    pub generated_at: DateTime<Utc>,
}

/// A partial update merged into an existing [`QosStrategy`]
/// (spec §4.E `ApplyUpdates`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QosStrategyUpdate {
    /// Bandwidth changes, overwritten per direction.
    #[serde(default)]
    pub bandwidth_limits: HashMap<Direction, String>,
    /// Latency changes, overwritten per metric.
    #[serde(default)]
    pub latency_targets: HashMap<String, f64>,
    /// Priority changes, looked up by traffic-class name.
    #[serde(default)]
    pub priority_changes: HashMap<String, u8>,
    /// Traffic classes to append.
    #[serde(default)]
    pub add_classes: Vec<TrafficClass>,
    /// Names of traffic classes to remove.
    #[serde(default)]
    pub remove_classes: Vec<String>,
    /// Replacement scheduling policy, if any.
    pub scheduling: Option<SchedulingPolicy>,
}

/// A recorded QoS violation, stored in the manager's ring buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QosViolation {
    /// Slice the violation was observed on.
    pub slice_id: String,
    /// Cluster the violation was observed on.
    pub cluster_name: String,
    /// Human-readable description of the violation.
    pub description: String,
    /// When the violation was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Per-slice compliance summary (spec §4.E `GetComplianceSummary`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    /// Most recent compliance percent recorded per slice.
    pub per_slice_latest: HashMap<String, f64>,
    /// Mean compliance percent across all recorded samples.
    pub overall_mean: f64,
}
