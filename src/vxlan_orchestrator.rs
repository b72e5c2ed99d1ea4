//! Synthesise tunnel configs, validate endpoint sets, and plan rolling
//! updates for dynamic VXLAN overlays (spec §4.D).

use std::collections::{HashMap, HashSet};

use crate::domain::{
    ClusterName, DynamicVxlanConfig, RollingUpdateAction, RollingUpdateStep, TunnelConfig,
    VxlanEndpoint,
};
use crate::error::TnError;

/// Stateless orchestrator for VXLAN overlay derivation and planning.
#[derive(Debug, Default, Clone, Copy)]
pub struct VxlanOrchestrator;

impl VxlanOrchestrator {
    /// Construct the orchestrator (stateless; kept as a type for symmetry
    /// with the other components and so call sites read uniformly).
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate an endpoint set (spec §4.D):
    /// - at least two endpoints,
    /// - every IP is unique and parses,
    /// - at least two distinct clusters are represented.
    pub fn validate_endpoints(&self, endpoints: &[VxlanEndpoint]) -> Result<(), TnError> {
        if endpoints.len() < 2 {
            return Err(TnError::InvalidVxlan {
                field: "endpoints".to_string(),
                reason: "at least two endpoints are required".to_string(),
            });
        }

        let mut seen_ips = HashSet::with_capacity(endpoints.len());
        for endpoint in endpoints {
            if endpoint.ip.parse::<std::net::IpAddr>().is_err() {
                return Err(TnError::InvalidVxlan {
                    field: "endpoints.ip".to_string(),
                    reason: format!("{:?} is not a valid IP address", endpoint.ip),
                });
            }
            if !seen_ips.insert(endpoint.ip.as_str()) {
                return Err(TnError::InvalidVxlan {
                    field: "endpoints.ip".to_string(),
                    reason: format!("duplicate endpoint IP {:?}", endpoint.ip),
                });
            }
        }

        let clusters: HashSet<&ClusterName> = endpoints.iter().map(|e| &e.cluster).collect();
        if clusters.len() < 2 {
            return Err(TnError::InvalidVxlan {
                field: "endpoints.cluster".to_string(),
                reason: "endpoints must span at least two distinct clusters".to_string(),
            });
        }

        Ok(())
    }

    /// Validate an entire [`DynamicVxlanConfig`] (VNI range plus endpoints).
    pub fn validate_config(&self, config: &DynamicVxlanConfig) -> Result<(), TnError> {
        self.validate_endpoints(&config.endpoints)
    }

    /// For each endpoint `E`, emit `{vni, localIP=E.ip, remoteIPs=endpoints\{E}.ip}`
    /// (spec §3 "Tunnel Config", §4.D `GenerateTunnelConfigs`).
    #[must_use]
    pub fn generate_tunnel_configs(&self, config: &DynamicVxlanConfig) -> Vec<TunnelConfig> {
        config
            .endpoints
            .iter()
            .map(|endpoint| TunnelConfig {
                vni: config.vni,
                local_ip: endpoint.ip.clone(),
                remote_ips: config
                    .endpoints
                    .iter()
                    .filter(|other| other.ip != endpoint.ip)
                    .map(|other| other.ip.clone())
                    .collect(),
            })
            .collect()
    }

    /// Map each tunnel config to the agent that owns its local endpoint.
    #[must_use]
    pub fn tunnels_by_cluster(
        &self,
        config: &DynamicVxlanConfig,
    ) -> Vec<(ClusterName, TunnelConfig)> {
        let mapping = config.cluster_mapping();
        self.generate_tunnel_configs(config)
            .into_iter()
            .filter_map(|tunnel| {
                mapping
                    .get(&tunnel.local_ip)
                    .cloned()
                    .map(|cluster| (cluster, tunnel))
            })
            .collect()
    }

    /// Plan a rolling update from `current` to `updated`: endpoints present
    /// in both are `Mutate` (ascending cluster-name order), endpoints only in
    /// `updated` are `Add` (first), endpoints only in `current` are `Remove`
    /// (last). This ordering minimises the window where any pair of
    /// endpoints is disconnected, but is best-effort (spec §4.D) — callers
    /// that cannot prove the ordering safe may fall back to a full
    /// reconfiguration (see `SPEC_FULL.md` Open Question 1).
    #[must_use]
    pub fn plan_rolling_update(
        &self,
        current: &DynamicVxlanConfig,
        updated: &DynamicVxlanConfig,
    ) -> Vec<RollingUpdateStep> {
        let current_map: HashMap<&ClusterName, &VxlanEndpoint> =
            current.endpoints.iter().map(|e| (&e.cluster, e)).collect();
        let updated_map: HashMap<&ClusterName, &VxlanEndpoint> =
            updated.endpoints.iter().map(|e| (&e.cluster, e)).collect();

        let mut added: Vec<ClusterName> = updated_map
            .keys()
            .filter(|c| !current_map.contains_key(*c))
            .map(|c| (*c).clone())
            .collect();
        added.sort();

        let mut mutated: Vec<ClusterName> = updated_map
            .keys()
            .filter(|c| current_map.contains_key(*c))
            .map(|c| (*c).clone())
            .collect();
        mutated.sort();

        let mut removed: Vec<ClusterName> = current_map
            .keys()
            .filter(|c| !updated_map.contains_key(*c))
            .map(|c| (*c).clone())
            .collect();
        removed.sort();

        added
            .into_iter()
            .map(|cluster| RollingUpdateStep {
                cluster,
                action: RollingUpdateAction::Add,
            })
            .chain(mutated.into_iter().map(|cluster| RollingUpdateStep {
                cluster,
                action: RollingUpdateAction::Mutate,
            }))
            .chain(removed.into_iter().map(|cluster| RollingUpdateStep {
                cluster,
                action: RollingUpdateAction::Remove,
            }))
            .collect()
    }
}
