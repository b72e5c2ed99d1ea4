//! Process-wide map of cluster name to agent client (spec §4.B).

use std::sync::Arc;

use dashmap::DashMap;

use crate::agent_client::{Agent, AgentClient};
use crate::domain::ClusterName;
use crate::error::TnError;

/// Concurrent-safe registry of agent clients, keyed by cluster name.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: DashMap<ClusterName, Arc<dyn Agent>>,
}

impl AgentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agents: DashMap::new(),
        }
    }

    /// Construct a client for `(cluster_name, endpoint)`, connect it, and on
    /// success store it under `cluster_name`. Returns the underlying connect
    /// error on failure; nothing is stored in that case.
    pub async fn register(
        &self,
        cluster_name: ClusterName,
        endpoint: impl Into<String>,
    ) -> Result<(), TnError> {
        let client = Arc::new(AgentClient::new(cluster_name.clone(), endpoint));
        client.connect().await?;
        self.agents.insert(cluster_name, client);
        Ok(())
    }

    /// Register an already-constructed agent (used by tests to inject
    /// fakes); the agent is expected to already be connected.
    pub fn register_agent(&self, cluster_name: ClusterName, agent: Arc<dyn Agent>) {
        self.agents.insert(cluster_name, agent);
    }

    /// Look up a single agent by cluster name.
    #[must_use]
    pub fn get(&self, cluster_name: &ClusterName) -> Option<Arc<dyn Agent>> {
        self.agents.get(cluster_name).map(|e| Arc::clone(e.value()))
    }

    /// Remove and stop an agent.
    pub fn deregister(&self, cluster_name: &ClusterName) {
        if let Some((_, agent)) = self.agents.remove(cluster_name) {
            agent.stop();
        }
    }

    /// Immutable snapshot of every `(cluster, client)` pair, safe to iterate
    /// while the registry is mutated concurrently (spec §4.B).
    #[must_use]
    pub fn snapshot(&self) -> Vec<(ClusterName, Arc<dyn Agent>)> {
        self.agents
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect()
    }

    /// Number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// `true` if no agents are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Stop every registered agent client.
    pub fn stop_all(&self) {
        for entry in &self.agents {
            entry.value().stop();
        }
    }
}
