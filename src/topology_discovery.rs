//! Periodic topology assembly and diffing (spec §4.F).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::agent_client::Agent;
use crate::domain::{ConnectivityStatus, Topology, TopologyDiff, TopologyLink, TopologyNode};

/// Discovers the current network topology from a snapshot of registered
/// agents: one node per agent, one link per pair of healthy agents that both
/// answer a ping probe.
#[derive(Debug, Default, Clone, Copy)]
pub struct TopologyDiscovery;

impl TopologyDiscovery {
    /// Create a new, stateless discoverer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Query every agent's status, build one [`TopologyNode`] per agent, then
    /// pairwise-probe every pair of healthy nodes to build [`TopologyLink`]s.
    /// An agent that fails `get_status` is recorded as `Down` with no
    /// further probing; a failed status query never aborts discovery for the
    /// remaining agents (spec §4.F, best-effort).
    pub async fn discover(&self, agents: &[(crate::domain::ClusterName, Arc<dyn Agent>)]) -> Topology {
        let mut nodes = Vec::with_capacity(agents.len());
        let mut healthy = Vec::new();

        for (cluster, agent) in agents {
            match agent.get_status().await {
                Ok(status) => {
                    let connectivity = if status.healthy {
                        ConnectivityStatus::Up
                    } else {
                        ConnectivityStatus::Down
                    };
                    nodes.push(TopologyNode {
                        name: cluster.clone(),
                        node_type: "agent".to_string(),
                        capabilities: Vec::new(),
                        interfaces: status.tc.interfaces.clone(),
                        status: connectivity,
                        metadata: HashMap::new(),
                        last_updated: Utc::now(),
                    });
                    if status.healthy {
                        healthy.push((cluster.clone(), Arc::clone(agent)));
                    }
                }
                Err(_) => {
                    nodes.push(TopologyNode {
                        name: cluster.clone(),
                        node_type: "agent".to_string(),
                        capabilities: Vec::new(),
                        interfaces: Vec::new(),
                        status: ConnectivityStatus::Down,
                        metadata: HashMap::new(),
                        last_updated: Utc::now(),
                    });
                }
            }
        }

        let mut links = Vec::new();
        for i in 0..healthy.len() {
            for j in (i + 1)..healthy.len() {
                let (source_name, source_agent) = &healthy[i];
                let (target_name, target_agent) = &healthy[j];
                links.push(self.probe_link(source_name.clone(), source_agent, target_name.clone(), target_agent).await);
            }
        }

        Topology { nodes, links }
    }

    async fn probe_link(
        &self,
        source: crate::domain::ClusterName,
        source_agent: &Arc<dyn Agent>,
        target: crate::domain::ClusterName,
        target_agent: &Arc<dyn Agent>,
    ) -> TopologyLink {
        let start = Instant::now();
        let source_ok = source_agent.ping().await.is_ok();
        let source_latency = start.elapsed().as_secs_f64() * 1000.0;

        let start = Instant::now();
        let target_ok = target_agent.ping().await.is_ok();
        let target_latency = start.elapsed().as_secs_f64() * 1000.0;

        let status = if source_ok && target_ok {
            ConnectivityStatus::Up
        } else {
            ConnectivityStatus::Down
        };

        TopologyLink {
            source,
            target,
            bandwidth_mbps: 0.0,
            latency_ms: (source_latency + target_latency) / 2.0,
            utilisation_percent: 0.0,
            status,
            qos_class: None,
        }
    }

    /// Diff `old` against `new`; a thin re-export so callers importing this
    /// module don't also need `crate::domain::TopologyDiff` directly.
    #[must_use]
    pub fn diff(&self, old: &Topology, new: &Topology) -> TopologyDiff {
        TopologyDiff::compute(old, new)
    }
}
