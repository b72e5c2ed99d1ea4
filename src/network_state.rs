//! In-memory single-source-of-truth for "what has been configured"
//! (spec §4.C).

use std::collections::HashMap;
use std::sync::RwLock;

use dashmap::DashMap;

use crate::domain::{ClusterName, DynamicVxlanConfig, QosStrategy, SliceId, TnConfig, Topology};

/// One logical write-lock per key family: VXLAN configs, QoS strategies,
/// slice baseline configs, topology, and the slice-node usage index. Readers
/// never block writers in a different family (spec §5 "one read/write lock
/// per key family").
#[derive(Debug, Default)]
pub struct NetworkState {
    vxlan_configs: DashMap<SliceId, DynamicVxlanConfig>,
    qos_strategies: DashMap<SliceId, QosStrategy>,
    slice_configs: DashMap<SliceId, TnConfig>,
    topology: RwLock<Topology>,
}

impl NetworkState {
    /// Create an empty state store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace (or insert) the VXLAN config for `slice_id`. Idempotent.
    pub fn update_vxlan_config(&self, slice_id: SliceId, config: DynamicVxlanConfig) {
        self.vxlan_configs.insert(slice_id, config);
    }

    /// Fetch the VXLAN config for `slice_id`, if any.
    #[must_use]
    pub fn get_vxlan_config(&self, slice_id: &SliceId) -> Option<DynamicVxlanConfig> {
        self.vxlan_configs.get(slice_id).map(|e| e.value().clone())
    }

    /// Every currently-configured slice's VXLAN config.
    #[must_use]
    pub fn get_slice_vxlan_configs(&self) -> HashMap<SliceId, DynamicVxlanConfig> {
        self.vxlan_configs
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Remove a slice's VXLAN config, returning it if present.
    pub fn remove_vxlan_config(&self, slice_id: &SliceId) -> Option<DynamicVxlanConfig> {
        self.vxlan_configs.remove(slice_id).map(|(_, v)| v)
    }

    /// Replace (or insert) the QoS strategy for `slice_id`. Idempotent.
    pub fn update_qos_strategy(&self, slice_id: SliceId, strategy: QosStrategy) {
        self.qos_strategies.insert(slice_id, strategy);
    }

    /// Fetch the QoS strategy for `slice_id`, if any.
    #[must_use]
    pub fn get_qos_strategy(&self, slice_id: &SliceId) -> Option<QosStrategy> {
        self.qos_strategies.get(slice_id).map(|e| e.value().clone())
    }

    /// Every currently-configured slice's QoS strategy.
    #[must_use]
    pub fn get_slice_qos_strategies(&self) -> HashMap<SliceId, QosStrategy> {
        self.qos_strategies
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Replace (or insert) the baseline `TNConfig` for `slice_id`. Idempotent.
    pub fn update_slice_config(&self, slice_id: SliceId, config: TnConfig) {
        self.slice_configs.insert(slice_id, config);
    }

    /// Fetch the baseline `TNConfig` for `slice_id`, if any.
    #[must_use]
    pub fn get_slice_config(&self, slice_id: &SliceId) -> Option<TnConfig> {
        self.slice_configs.get(slice_id).map(|e| e.value().clone())
    }

    /// Replace the stored topology wholesale.
    pub fn update_topology(&self, topology: Topology) {
        let mut guard = self.topology.write().expect("topology lock poisoned");
        *guard = topology;
    }

    /// Current topology snapshot.
    #[must_use]
    pub fn get_topology(&self) -> Topology {
        self.topology.read().expect("topology lock poisoned").clone()
    }

    /// Union of every slice id that currently has a VXLAN config or a QoS
    /// strategy recorded.
    #[must_use]
    pub fn get_active_slices(&self) -> Vec<SliceId> {
        let mut slices: Vec<SliceId> = self.vxlan_configs.iter().map(|e| e.key().clone()).collect();
        for entry in &self.qos_strategies {
            if !slices.contains(entry.key()) {
                slices.push(entry.key().clone());
            }
        }
        for entry in &self.slice_configs {
            if !slices.contains(entry.key()) {
                slices.push(entry.key().clone());
            }
        }
        slices
    }

    /// Whether every cluster in `slice_id`'s VXLAN endpoint set currently
    /// reports a tunnel config at all (existence only; liveness is reported
    /// separately by the fault detector via agent status).
    #[must_use]
    pub fn get_vxlan_status(&self, slice_id: &SliceId) -> Option<DynamicVxlanConfig> {
        self.get_vxlan_config(slice_id)
    }

    /// Every slice whose VXLAN config currently touches `node_name`
    /// (spec §4.C `GetSlicesUsingNode`; used by fault recovery).
    #[must_use]
    pub fn get_slices_using_node(&self, node_name: &ClusterName) -> Vec<SliceId> {
        self.vxlan_configs
            .iter()
            .filter(|e| e.value().clusters().contains(node_name))
            .map(|e| e.key().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SchedulingAlgorithm, SchedulingPolicy, Vni, VxlanEndpoint};

    fn slice(id: &str) -> SliceId {
        SliceId::try_new(id).unwrap()
    }

    fn cluster(name: &str) -> ClusterName {
        ClusterName::try_new(name).unwrap()
    }

    fn vxlan_config(clusters: &[&str]) -> DynamicVxlanConfig {
        DynamicVxlanConfig {
            vni: Vni::try_new(100).unwrap(),
            endpoints: clusters
                .iter()
                .enumerate()
                .map(|(i, c)| VxlanEndpoint {
                    ip: format!("10.0.0.{i}"),
                    cluster: cluster(c),
                })
                .collect(),
            mtu: None,
        }
    }

    fn tn_config(cluster_name: &str) -> TnConfig {
        TnConfig {
            cluster_name: cluster_name.to_string(),
            network_cidr: "10.0.0.0/24".to_string(),
            vxlan: crate::domain::VxlanBaseConfig {
                vni: 100,
                local_ip: "10.0.0.1".to_string(),
                remote_ips: vec![],
                port: 4789,
                mtu: 1450,
                device_name: "vxlan0".to_string(),
                learning: true,
            },
            bandwidth_policy: crate::domain::BandwidthPolicy {
                downlink: "100Mbps".to_string(),
                uplink: "50Mbps".to_string(),
                latency_ms: 10.0,
                jitter_ms: 1.0,
                loss_percent: 0.1,
                priority: 5,
                queue_class: "gold".to_string(),
                burst: 4096,
                classification_filters: vec![],
            },
            qos_class: "URLLC".to_string(),
            network_interfaces: vec!["eth0".to_string()],
            monitoring_port: 9000,
        }
    }

    fn qos_strategy() -> QosStrategy {
        QosStrategy {
            kind: crate::domain::QosKind::Urllc,
            bandwidth_limits: HashMap::new(),
            latency_targets: HashMap::new(),
            traffic_classes: vec![],
            scheduling: SchedulingPolicy {
                algorithm: SchedulingAlgorithm::Fifo,
                queues: vec![],
            },
        }
    }

    #[test]
    fn update_then_get_vxlan_config_round_trips() {
        let state = NetworkState::new();
        let cfg = vxlan_config(&["edge01", "edge02"]);
        state.update_vxlan_config(slice("s1"), cfg.clone());
        assert_eq!(state.get_vxlan_config(&slice("s1")), Some(cfg));
        assert_eq!(state.get_vxlan_config(&slice("missing")), None);
    }

    #[test]
    fn get_slices_using_node_filters_by_cluster_membership() {
        let state = NetworkState::new();
        state.update_vxlan_config(slice("s1"), vxlan_config(&["edge01", "edge02"]));
        state.update_vxlan_config(slice("s2"), vxlan_config(&["edge03", "edge04"]));

        let hits = state.get_slices_using_node(&cluster("edge01"));
        assert_eq!(hits, vec![slice("s1")]);
    }

    #[test]
    fn active_slices_unions_vxlan_and_qos() {
        let state = NetworkState::new();
        state.update_vxlan_config(slice("s1"), vxlan_config(&["edge01", "edge02"]));
        state.update_qos_strategy(slice("s2"), qos_strategy());

        let mut active = state.get_active_slices();
        active.sort();
        assert_eq!(active, vec![slice("s1"), slice("s2")]);
    }

    #[test]
    fn update_then_get_slice_config_round_trips() {
        let state = NetworkState::new();
        let cfg = tn_config("edge01");
        state.update_slice_config(slice("s1"), cfg.clone());
        assert_eq!(state.get_slice_config(&slice("s1")), Some(cfg));
        assert_eq!(state.get_slice_config(&slice("missing")), None);
    }

    #[test]
    fn slice_config_counts_toward_active_slices() {
        let state = NetworkState::new();
        state.update_slice_config(slice("s1"), tn_config("edge01"));
        assert_eq!(state.get_active_slices(), vec![slice("s1")]);
    }

    #[test]
    fn configure_network_slice_twice_is_idempotent_observationally() {
        let state = NetworkState::new();
        let cfg = vxlan_config(&["edge01", "edge02"]);
        state.update_vxlan_config(slice("s1"), cfg.clone());
        state.update_vxlan_config(slice("s1"), cfg.clone());
        assert_eq!(state.get_slice_vxlan_configs().len(), 1);
    }
}
