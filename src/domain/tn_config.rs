//! Per-cluster baseline configuration (spec §3 `TNConfig`).

use serde::{Deserialize, Serialize};

/// Static VXLAN parameters baked into a cluster's baseline config, distinct
/// from the dynamic per-slice [`crate::domain::vxlan::DynamicVxlanConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VxlanBaseConfig {
    /// VXLAN Network Identifier.
    pub vni: u32,
    /// Local tunnel endpoint IP.
    pub local_ip: String,
    /// Remote tunnel endpoint IPs known at baseline time.
    pub remote_ips: Vec<String>,
    /// UDP port used for VXLAN encapsulation (default 4789).
    pub port: u16,
    /// Path MTU for the overlay interface.
    pub mtu: u32,
    /// Name of the local VXLAN device.
    pub device_name: String,
    /// Whether the VXLAN device learns remote MAC addresses dynamically.
    pub learning: bool,
}

/// A traffic classification filter used by a [`BandwidthPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationFilter {
    /// Protocol to match, e.g. `"tcp"`.
    pub protocol: Option<String>,
    /// Source CIDR or address to match.
    pub source: Option<String>,
    /// Destination CIDR or address to match.
    pub destination: Option<String>,
}

/// Baseline bandwidth policy applied to a cluster interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandwidthPolicy {
    /// Downlink rate, e.g. `"100Mbps"`.
    pub downlink: String,
    /// Uplink rate, e.g. `"50Mbps"`.
    pub uplink: String,
    /// Latency target in milliseconds.
    pub latency_ms: f64,
    /// Jitter target in milliseconds.
    pub jitter_ms: f64,
    /// Acceptable packet loss, percent.
    pub loss_percent: f64,
    /// Scheduling priority, `[0, 10]`.
    pub priority: u8,
    /// Named queue class, e.g. `"gold"`.
    pub queue_class: String,
    /// Burst size in bytes.
    pub burst: u64,
    /// Filters selecting which traffic this policy applies to.
    pub classification_filters: Vec<ClassificationFilter>,
}

/// Per-cluster baseline configuration. Immutable once registered for a
/// slice; replaced atomically on reconfiguration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TnConfig {
    /// Name of the owning cluster.
    pub cluster_name: String,
    /// CIDR block assigned to this cluster's network.
    pub network_cidr: String,
    /// Baseline VXLAN overlay parameters.
    pub vxlan: VxlanBaseConfig,
    /// Baseline bandwidth policy.
    pub bandwidth_policy: BandwidthPolicy,
    /// QoS class label, e.g. `"URLLC"`.
    pub qos_class: String,
    /// Names of physical/virtual interfaces this config governs.
    pub network_interfaces: Vec<String>,
    /// Port the agent exposes for monitoring scrapes.
    pub monitoring_port: u16,
}
