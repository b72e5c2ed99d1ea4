//! Discovered network topology (spec §3, §4.F).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::primitives::ClusterName;

/// Health/reachability status of a node or link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityStatus {
    /// Healthy and reachable.
    Up,
    /// Unreachable or failed.
    Down,
    /// Reachability unknown (not yet probed).
    Unknown,
}

/// A discovered node, one per registered agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyNode {
    /// Cluster hosting this node.
    pub name: ClusterName,
    /// Node type/role (opaque to the control plane).
    pub node_type: String,
    /// Reported capabilities.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Reported network interfaces.
    #[serde(default)]
    pub interfaces: Vec<String>,
    /// Current connectivity status.
    pub status: ConnectivityStatus,
    /// Opaque metadata reported by the agent.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// When this node was last refreshed.
    pub last_updated: DateTime<Utc>,
}

/// An undirected link between two nodes, keyed by unordered endpoint pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyLink {
    /// One endpoint of the link.
    pub source: ClusterName,
    /// The other endpoint of the link.
    pub target: ClusterName,
    /// Observed bandwidth, Mbps.
    pub bandwidth_mbps: f64,
    /// Observed latency, milliseconds.
    pub latency_ms: f64,
    /// Observed utilisation, percent.
    pub utilisation_percent: f64,
    /// Current connectivity status.
    pub status: ConnectivityStatus,
    /// QoS class label applied to traffic crossing this link.
    pub qos_class: Option<String>,
}

impl TopologyLink {
    /// Canonical key for an unordered endpoint pair: the lexicographically
    /// smaller name first, so `(a, b)` and `(b, a)` hash and compare equal.
    #[must_use]
    pub fn endpoint_key(&self) -> (ClusterName, ClusterName) {
        if self.source <= self.target {
            (self.source.clone(), self.target.clone())
        } else {
            (self.target.clone(), self.source.clone())
        }
    }
}

/// The full discovered topology (spec invariant: every link endpoint exists
/// in the node set; links are unique by unordered endpoint pair).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    /// Discovered nodes, one per cluster.
    pub nodes: Vec<TopologyNode>,
    /// Discovered links between healthy node pairs.
    pub links: Vec<TopologyLink>,
}

/// The result of diffing two topologies, used to emit change events
/// (spec §4.F).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopologyDiff {
    /// Nodes present in the new topology but not the old one.
    pub added_nodes: Vec<ClusterName>,
    /// Nodes present in the old topology but not the new one.
    pub removed_nodes: Vec<ClusterName>,
    /// Links present in the new topology but not the old one.
    pub added_links: Vec<(ClusterName, ClusterName)>,
    /// Links present in the old topology but not the new one.
    pub removed_links: Vec<(ClusterName, ClusterName)>,
}

impl TopologyDiff {
    /// `true` if nothing changed between the two topologies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.added_links.is_empty()
            && self.removed_links.is_empty()
    }

    /// Diff `old` against `new`.
    #[must_use]
    pub fn compute(old: &Topology, new: &Topology) -> Self {
        use std::collections::HashSet;

        let old_nodes: HashSet<_> = old.nodes.iter().map(|n| n.name.clone()).collect();
        let new_nodes: HashSet<_> = new.nodes.iter().map(|n| n.name.clone()).collect();
        let old_links: HashSet<_> = old.links.iter().map(TopologyLink::endpoint_key).collect();
        let new_links: HashSet<_> = new.links.iter().map(TopologyLink::endpoint_key).collect();

        Self {
            added_nodes: new_nodes.difference(&old_nodes).cloned().collect(),
            removed_nodes: old_nodes.difference(&new_nodes).cloned().collect(),
            added_links: new_links.difference(&old_links).cloned().collect(),
            removed_links: old_links.difference(&new_links).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> TopologyNode {
        TopologyNode {
            name: ClusterName::try_new(name).unwrap(),
            node_type: "edge".to_string(),
            capabilities: vec![],
            interfaces: vec![],
            status: ConnectivityStatus::Up,
            metadata: HashMap::new(),
            last_updated: Utc::now(),
        }
    }

    fn link(a: &str, b: &str) -> TopologyLink {
        TopologyLink {
            source: ClusterName::try_new(a).unwrap(),
            target: ClusterName::try_new(b).unwrap(),
            bandwidth_mbps: 100.0,
            latency_ms: 5.0,
            utilisation_percent: 10.0,
            status: ConnectivityStatus::Up,
            qos_class: None,
        }
    }

    #[test]
    fn diff_detects_additions_and_removals() {
        let old = Topology {
            nodes: vec![node("a"), node("b")],
            links: vec![link("a", "b")],
        };
        let new = Topology {
            nodes: vec![node("a"), node("c")],
            links: vec![link("a", "c")],
        };
        let diff = TopologyDiff::compute(&old, &new);
        assert_eq!(diff.added_nodes, vec![ClusterName::try_new("c").unwrap()]);
        assert_eq!(diff.removed_nodes, vec![ClusterName::try_new("b").unwrap()]);
        assert!(!diff.is_empty());
    }

    #[test]
    fn link_endpoint_key_is_order_independent() {
        let l1 = link("b", "a");
        let l2 = link("a", "b");
        assert_eq!(l1.endpoint_key(), l2.endpoint_key());
    }
}
