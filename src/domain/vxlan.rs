//! Dynamic, per-slice VXLAN overlay configuration (spec §3, §4.D).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::primitives::{ClusterName, Vni};

/// One endpoint of a dynamic VXLAN overlay: an IP address hosted by a
/// specific cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VxlanEndpoint {
    /// IP address of the tunnel endpoint.
    pub ip: String,
    /// Cluster hosting this endpoint.
    pub cluster: ClusterName,
}

/// Dynamic VXLAN configuration for a single slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicVxlanConfig {
    /// VXLAN Network Identifier.
    pub vni: Vni,
    /// Endpoint set; must contain at least two distinct clusters.
    pub endpoints: Vec<VxlanEndpoint>,
    /// Optional overlay MTU override.
    pub mtu: Option<u32>,
}

impl DynamicVxlanConfig {
    /// Map from endpoint IP to the cluster hosting it.
    #[must_use]
    pub fn cluster_mapping(&self) -> HashMap<String, ClusterName> {
        self.endpoints
            .iter()
            .map(|e| (e.ip.clone(), e.cluster.clone()))
            .collect()
    }

    /// Set of distinct cluster names among the endpoints.
    #[must_use]
    pub fn clusters(&self) -> HashSet<ClusterName> {
        self.endpoints.iter().map(|e| e.cluster.clone()).collect()
    }
}

/// Per-endpoint tunnel configuration, derived from a [`DynamicVxlanConfig`]
/// and never stored independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// VXLAN Network Identifier.
    pub vni: Vni,
    /// IP address local to the endpoint this config targets.
    pub local_ip: String,
    /// IP addresses of every other endpoint in the overlay.
    pub remote_ips: Vec<String>,
}

/// A single step of a rolling-update plan (spec §4.D).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingUpdateStep {
    /// Cluster this step targets.
    pub cluster: ClusterName,
    /// Action to take against that cluster.
    pub action: RollingUpdateAction,
}

/// Action kind for a [`RollingUpdateStep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollingUpdateAction {
    /// A new endpoint is being added to the overlay.
    Add,
    /// An existing endpoint's config is changing in place.
    Mutate,
    /// An endpoint is leaving the overlay.
    Remove,
}
