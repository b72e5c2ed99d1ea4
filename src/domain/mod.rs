//! Data model for the transport-network control plane.

pub mod event;
pub mod fault;
pub mod metrics;
pub mod primitives;
pub mod qos;
pub mod rate;
pub mod slice;
pub mod tn_config;
pub mod topology;
pub mod vxlan;

pub use event::{Event, EventKind};
pub use fault::{Fault, FaultKind, Severity};
pub use metrics::{
    AggregatedPerformance, LatencyMetrics, NetworkSliceMetrics, PerformanceMetrics, TcStatus,
    ThesisValidation, ThroughputMetrics, TnStatus, VxlanStatus, thesis,
};
pub use primitives::{ClusterName, Dscp, LatencyMs, Priority, SliceId, Vni, Weight};
pub use qos::{
    Action, ActionKind, ClusterQosConfig, ComplianceSummary, Direction, InterfaceQosConfig,
    Protocol, QosKind, QosStrategy, QosStrategyUpdate, QosViolation, QueueConfig,
    SchedulingAlgorithm, SchedulingPolicy, Selector, TcRule, TrafficClass,
};
pub use rate::{Rate, RateParseError, RateUnit};
pub use slice::SliceState;
pub use tn_config::{BandwidthPolicy, ClassificationFilter, TnConfig, VxlanBaseConfig};
pub use topology::{ConnectivityStatus, Topology, TopologyDiff, TopologyLink, TopologyNode};
pub use vxlan::{DynamicVxlanConfig, RollingUpdateAction, RollingUpdateStep, TunnelConfig, VxlanEndpoint};
