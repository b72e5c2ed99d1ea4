//! Top-level orchestrator tying every component together (spec §4.J).

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::agent_client::PerformanceTestConfig;
use crate::agent_registry::AgentRegistry;
use crate::config::ManagerConfig;
use crate::domain::{
    AggregatedPerformance, ClusterName, ComplianceSummary, DynamicVxlanConfig, Event, EventKind, Fault,
    FaultKind, NetworkSliceMetrics, PerformanceMetrics, QosStrategy, QosStrategyUpdate, SliceId,
    ThesisValidation, TnConfig, TnStatus, Topology, TopologyDiff,
};
use crate::error::TnError;
use crate::event_bus::EventBus;
use crate::fault_detector::FaultDetector;
use crate::metrics_collector::MetricsCollector;
use crate::network_state::NetworkState;
use crate::observability::sanitize_log_field;
use crate::qos_manager::QosManager;
use crate::time_provider::SharedTimeProvider;
use crate::topology_discovery::TopologyDiscovery;
use crate::vxlan_orchestrator::VxlanOrchestrator;

/// Live fault counts by kind from a single poll, not the
/// recovery-dispatching [`Manager::detect_and_recover_faults`].
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FaultSummary {
    /// Number of currently-observed faults per kind.
    pub counts: HashMap<FaultKind, usize>,
    /// Total fault count across every kind.
    pub total: usize,
}

/// Combined status report (spec §4.J `GetEnhancedStatus`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct EnhancedStatus {
    /// Per-cluster status, as returned by `GetStatus`.
    pub status: HashMap<String, TnStatus>,
    /// Current topology snapshot.
    pub topology: Topology,
    /// Every slice id with a VXLAN config, QoS strategy, or baseline config
    /// recorded.
    pub active_slices: Vec<String>,
    /// Live fault summary from a fresh poll of every agent.
    pub fault_summary: FaultSummary,
    /// QoS compliance across every tracked slice.
    pub qos_compliance: ComplianceSummary,
    /// Current VXLAN config per slice.
    pub vxlan_status: HashMap<String, DynamicVxlanConfig>,
}

/// The manager orchestrator: owns every control-plane component and
/// exposes the operations a caller (CLI, future API surface) drives.
pub struct Manager {
    config: ManagerConfig,
    registry: AgentRegistry,
    state: NetworkState,
    vxlan: VxlanOrchestrator,
    qos: QosManager,
    topology_discovery: TopologyDiscovery,
    fault_detector: FaultDetector,
    metrics: MetricsCollector,
    events: EventBus,
    slice_locks: DashMap<SliceId, Arc<AsyncMutex<()>>>,
    time_provider: SharedTimeProvider,
    cancellation: CancellationToken,
}

impl Manager {
    /// Build a manager from a validated [`ManagerConfig`].
    #[must_use]
    pub fn new(config: ManagerConfig, time_provider: SharedTimeProvider) -> Self {
        let fault_detector = FaultDetector::new(config.high_latency_threshold_ms);
        let metrics = MetricsCollector::new(config.max_history_size, config.metrics_retention);
        let events = EventBus::new(config.event_bus_capacity);

        Self {
            config,
            registry: AgentRegistry::new(),
            state: NetworkState::new(),
            vxlan: VxlanOrchestrator::new(),
            qos: QosManager::new(),
            topology_discovery: TopologyDiscovery::new(),
            fault_detector,
            metrics,
            events,
            slice_locks: DashMap::new(),
            time_provider,
            cancellation: CancellationToken::new(),
        }
    }

    /// Event bus, exposed so callers can subscribe before starting
    /// background loops.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Metrics collector, exposed for read-only reporting queries.
    #[must_use]
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// QoS manager, exposed for read-only compliance queries.
    #[must_use]
    pub fn qos(&self) -> &QosManager {
        &self.qos
    }

    fn slice_lock(&self, slice_id: &SliceId) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            &self.slice_locks
                .entry(slice_id.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Register a new agent at `endpoint` and publish `AgentRegistered`.
    #[instrument(skip(self, endpoint), fields(cluster = %sanitize_log_field(&cluster_name.to_string())))]
    pub async fn register_agent(
        &self,
        cluster_name: ClusterName,
        endpoint: impl Into<String> + Send,
    ) -> Result<(), TnError> {
        self.registry.register(cluster_name.clone(), endpoint).await?;
        info!("agent registered");
        self.events.publish(
            Event::new(EventKind::AgentRegistered)
                .with_data("cluster", json!(cluster_name.to_string())),
        );
        Ok(())
    }

    /// Fan a slice's baseline `TNConfig` out to every registered agent's
    /// `ConfigureSlice`, and on full success persist it (spec §4.A, §4.J
    /// `ConfigureNetworkSlice`, scenario S3). Partial failure leaves network
    /// state unchanged and returns a `MultiError`.
    #[instrument(skip(self, config), fields(slice = %sanitize_log_field(&slice_id.to_string())))]
    pub async fn configure_network_slice(
        &self,
        slice_id: SliceId,
        config: TnConfig,
    ) -> Result<(), TnError> {
        let lock = self.slice_lock(&slice_id);
        let _guard = lock.lock().await;

        if self.cancellation.is_cancelled() {
            return Err(TnError::Cancelled);
        }

        let agents = self.registry.snapshot();
        let attempted = agents.len();
        let slice_id_str = slice_id.to_string();

        let mut join_set = JoinSet::new();
        for (cluster, agent) in agents {
            let config = config.clone();
            let slice_id_str = slice_id_str.clone();
            join_set.spawn(async move {
                let result = agent.configure_slice(&slice_id_str, &config).await;
                (cluster, result)
            });
        }

        let mut errors = Vec::new();
        loop {
            tokio::select! {
                () = self.cancellation.cancelled() => {
                    warn!(attempted, "network slice fan-out cancelled, abandoning outstanding requests");
                    return Err(TnError::Cancelled);
                }
                joined = join_set.join_next() => {
                    match joined {
                        Some(Ok((cluster, Err(e)))) => errors.push((cluster, e)),
                        Some(_) => {}
                        None => break,
                    }
                }
            }
        }

        if !errors.is_empty() {
            warn!(failed = errors.len(), attempted, "network slice fan-out partially failed, state not written");
            return Err(TnError::multi(errors, attempted));
        }

        self.state.update_slice_config(slice_id.clone(), config);
        info!(attempted, "network slice configured");
        self.events.publish(
            Event::new(EventKind::SliceConfigured).with_slice(slice_id.to_string()),
        );
        Ok(())
    }

    /// Validate, fan out, and (on full success) persist a dynamic VXLAN
    /// configuration for `slice_id` (spec §4.D, invariant 1, scenario S1/S3).
    #[instrument(skip(self, config), fields(slice = %sanitize_log_field(&slice_id.to_string())))]
    pub async fn configure_vxlan_dynamic(
        &self,
        slice_id: SliceId,
        config: DynamicVxlanConfig,
    ) -> Result<(), TnError> {
        let lock = self.slice_lock(&slice_id);
        let _guard = lock.lock().await;

        if self.cancellation.is_cancelled() {
            return Err(TnError::Cancelled);
        }

        self.vxlan.validate_config(&config)?;
        let tunnels = self.vxlan.tunnels_by_cluster(&config);
        let attempted = tunnels.len();

        let mut join_set = JoinSet::new();
        for (cluster, tunnel) in tunnels {
            let Some(agent) = self.registry.get(&cluster) else {
                join_set.spawn(async move {
                    (
                        cluster.clone(),
                        Err(TnError::NotConnected { cluster }),
                    )
                });
                continue;
            };
            join_set.spawn(async move {
                let payload = json!({ "tunnel": tunnel });
                let result = agent.send_command("configure_vxlan", payload).await.map(|_| ());
                (agent.cluster_name().clone(), result)
            });
        }

        let mut errors = Vec::new();
        loop {
            tokio::select! {
                () = self.cancellation.cancelled() => {
                    warn!(attempted, "vxlan fan-out cancelled, abandoning outstanding requests");
                    return Err(TnError::Cancelled);
                }
                joined = join_set.join_next() => {
                    match joined {
                        Some(Ok((cluster, Err(e)))) => errors.push((cluster, e)),
                        Some(_) => {}
                        None => break,
                    }
                }
            }
        }

        if !errors.is_empty() {
            warn!(failed = errors.len(), attempted, "vxlan fan-out partially failed, state not written");
            return Err(TnError::multi(errors, attempted));
        }

        self.state.update_vxlan_config(slice_id.clone(), config);
        info!(attempted, "vxlan configured");
        self.events.publish(
            Event::new(EventKind::VxlanConfigured).with_slice(slice_id.to_string()),
        );
        Ok(())
    }

    /// Plan a rolling update from the currently-stored config to `updated`,
    /// then execute it step by step. Each step is applied as a full
    /// reconfiguration of the affected cluster (the orchestrator does not
    /// attempt partial, in-place tunnel mutation).
    #[instrument(skip(self, updated), fields(slice = %sanitize_log_field(&slice_id.to_string())))]
    pub async fn reconfigure_vxlan(
        &self,
        slice_id: SliceId,
        updated: DynamicVxlanConfig,
    ) -> Result<(), TnError> {
        let current = self
            .state
            .get_vxlan_config(&slice_id)
            .ok_or_else(|| TnError::StateMissing { slice: slice_id.clone() })?;

        self.vxlan.validate_config(&updated)?;
        let _plan = self.vxlan.plan_rolling_update(&current, &updated);
        self.configure_vxlan_dynamic(slice_id, updated).await
    }

    /// Validate, fan out, and (on full success) persist a QoS strategy for
    /// `slice_id` (spec §4.E, invariant 2, scenario S2).
    #[instrument(skip(self, strategy), fields(slice = %sanitize_log_field(&slice_id.to_string())))]
    pub async fn configure_qos_strategy(
        &self,
        slice_id: SliceId,
        strategy: QosStrategy,
    ) -> Result<(), TnError> {
        let lock = self.slice_lock(&slice_id);
        let _guard = lock.lock().await;
        self.configure_qos_strategy_locked(slice_id, strategy).await
    }

    async fn configure_qos_strategy_locked(
        &self,
        slice_id: SliceId,
        strategy: QosStrategy,
    ) -> Result<(), TnError> {
        if self.cancellation.is_cancelled() {
            return Err(TnError::Cancelled);
        }

        self.qos.validate_strategy(&strategy)?;

        let agents = self.registry.snapshot();
        let attempted = agents.len();
        let mut join_set = JoinSet::new();
        for (cluster, agent) in agents {
            let config = self.qos.generate_cluster_config(&cluster.to_string(), &strategy);
            join_set.spawn(async move {
                let payload = json!({ "config": config });
                let result = agent.send_command("configure_qos", payload).await.map(|_| ());
                (cluster, result)
            });
        }

        let mut errors = Vec::new();
        loop {
            tokio::select! {
                () = self.cancellation.cancelled() => {
                    warn!(attempted, "qos fan-out cancelled, abandoning outstanding requests");
                    return Err(TnError::Cancelled);
                }
                joined = join_set.join_next() => {
                    match joined {
                        Some(Ok((cluster, Err(e)))) => errors.push((cluster, e)),
                        Some(_) => {}
                        None => break,
                    }
                }
            }
        }

        if !errors.is_empty() {
            warn!(failed = errors.len(), attempted, "qos fan-out partially failed, state not written");
            return Err(TnError::multi(errors, attempted));
        }

        self.state.update_qos_strategy(slice_id.clone(), strategy);
        info!(attempted, "qos strategy configured");
        self.events.publish(
            Event::new(EventKind::QosConfigured).with_slice(slice_id.to_string()),
        );
        Ok(())
    }

    /// Merge `update` into `slice_id`'s stored strategy and re-apply it,
    /// serialized per slice (spec §4.E, invariant 5).
    #[instrument(skip(self, update), fields(slice = %sanitize_log_field(&slice_id.to_string())))]
    pub async fn update_qos_strategy(
        &self,
        slice_id: SliceId,
        update: QosStrategyUpdate,
    ) -> Result<(), TnError> {
        let lock = self.slice_lock(&slice_id);
        let _guard = lock.lock().await;

        let current = self
            .state
            .get_qos_strategy(&slice_id)
            .ok_or_else(|| TnError::StateMissing { slice: slice_id.clone() })?;
        let merged = self.qos.apply_updates(&current, &update)?;
        self.configure_qos_strategy_locked(slice_id, merged).await
    }

    /// Fan a performance test out to every registered agent, aggregate the
    /// results, validate against the fixed thesis targets, and record the
    /// run (spec §4.H, §4.J, scenario S5).
    #[instrument(skip(self, cfg, throughput_targets_achieved, rtt_targets_achieved), fields(slice = %sanitize_log_field(&slice_id.to_string())))]
    pub async fn run_performance_test(
        &self,
        slice_id: SliceId,
        slice_type: impl Into<String> + std::fmt::Debug,
        cfg: PerformanceTestConfig,
        throughput_targets_achieved: Vec<f64>,
        rtt_targets_achieved: Vec<f64>,
        deploy_time_ms: f64,
    ) -> Result<NetworkSliceMetrics, TnError> {
        if self.cancellation.is_cancelled() {
            return Err(TnError::Cancelled);
        }

        let agents = self.registry.snapshot();
        let attempted = agents.len();
        let mut join_set = JoinSet::new();
        for (cluster, agent) in agents {
            let cfg = cfg.clone();
            join_set.spawn(async move {
                let result = agent.run_performance_test(&cfg).await;
                (cluster, result)
            });
        }

        let mut per_cluster: HashMap<String, PerformanceMetrics> = HashMap::new();
        let mut errors = Vec::new();
        loop {
            tokio::select! {
                () = self.cancellation.cancelled() => {
                    warn!(attempted, "performance test fan-out cancelled, abandoning outstanding requests");
                    return Err(TnError::Cancelled);
                }
                joined = join_set.join_next() => {
                    match joined {
                        Some(Ok((cluster, Ok(metrics)))) => {
                            per_cluster.insert(cluster.to_string(), metrics);
                        }
                        Some(Ok((cluster, Err(e)))) => errors.push((cluster, e)),
                        Some(Err(_)) => {}
                        None => break,
                    }
                }
            }
        }

        if !errors.is_empty() {
            return Err(TnError::multi(errors, attempted));
        }

        let aggregated = AggregatedPerformance::aggregate(&per_cluster.values().cloned().collect::<Vec<_>>());
        let thesis_validation =
            ThesisValidation::evaluate(&throughput_targets_achieved, &rtt_targets_achieved, deploy_time_ms);
        let sla_compliant =
            thesis_validation.compliance_percent >= crate::domain::thesis::SLA_COMPLIANT_THRESHOLD_PERCENT;

        let result = NetworkSliceMetrics {
            slice_id: slice_id.to_string(),
            slice_type: slice_type.into(),
            timestamp: chrono::Utc::now(),
            per_cluster,
            aggregated,
            sla_compliant,
            thesis_validation,
        };

        self.metrics.record_test_result(result.clone());
        info!(sla_compliant, "performance test recorded");
        Ok(result)
    }

    /// Discover the current topology, diff it against the stored one,
    /// publish a change event if anything moved, and persist the new
    /// topology (spec §4.F, invariant 6).
    #[instrument(skip(self))]
    pub async fn discover_network_topology(&self) -> TopologyDiff {
        let agents = self.registry.snapshot();
        let new_topology = self.topology_discovery.discover(&agents).await;
        let old_topology = self.state.get_topology();
        let diff = TopologyDiff::compute(&old_topology, &new_topology);

        self.state.update_topology(new_topology);

        if !diff.is_empty() {
            info!("topology changed");
            self.events.publish(Event::new(EventKind::TopologyDiscovered));
        }

        diff
    }

    /// Poll every registered agent once and dispatch any classified faults:
    /// publish `FaultDetected`, then attempt the matching recovery action
    /// and publish the corresponding `*Recovered` event on success
    /// (spec §4.G, scenario S6).
    #[instrument(skip(self))]
    pub async fn detect_and_recover_faults(&self) -> Vec<Fault> {
        let agents = self.registry.snapshot();
        let faults = self.fault_detector.poll_all(&agents).await;

        for fault in &faults {
            warn!(
                node = %sanitize_log_field(&fault.node_name),
                kind = ?fault.kind,
                severity = ?fault.severity,
                "fault detected"
            );
            self.events.publish(
                Event::new(EventKind::FaultDetected).with_data(
                    "node",
                    json!(fault.node_name.clone()),
                ),
            );
            self.recover_fault(fault).await;
        }

        faults
    }

    #[instrument(skip(self, fault), fields(node = %sanitize_log_field(&fault.node_name)))]
    async fn recover_fault(&self, fault: &Fault) {
        let Ok(node) = crate::domain::ClusterName::try_new(fault.node_name.clone()) else {
            warn!("fault node name is not a valid cluster name, skipping recovery");
            return;
        };

        match fault.kind {
            FaultKind::VxlanDown => {
                for slice_id in self.state.get_slices_using_node(&node) {
                    if let Some(config) = self.state.get_vxlan_config(&slice_id) {
                        if self
                            .configure_vxlan_dynamic(slice_id.clone(), config)
                            .await
                            .is_ok()
                        {
                            self.events.publish(
                                Event::new(EventKind::VxlanRecovered).with_slice(slice_id.to_string()),
                            );
                        }
                    }
                }
            }
            FaultKind::QosViolation => {
                for slice_id in self.state.get_active_slices() {
                    if let Some(strategy) = self.state.get_qos_strategy(&slice_id) {
                        let adjusted = self.qos.adjust_for_latency(&strategy);
                        if self
                            .configure_qos_strategy(slice_id.clone(), adjusted)
                            .await
                            .is_ok()
                        {
                            self.events.publish(
                                Event::new(EventKind::QosRecovered).with_slice(slice_id.to_string()),
                            );
                        }
                    }
                }
            }
            FaultKind::LinkDown => {
                // The crate has no routing table distinct from topology;
                // re-discovery recomputes it for every slice using this node.
                self.discover_network_topology().await;
            }
            FaultKind::HighLatency => {
                for slice_id in self.state.get_active_slices() {
                    if let Some(strategy) = self.state.get_qos_strategy(&slice_id) {
                        let adjusted = self.qos.adjust_for_latency(&strategy);
                        if self
                            .configure_qos_strategy(slice_id.clone(), adjusted)
                            .await
                            .is_ok()
                        {
                            self.events.publish(
                                Event::new(EventKind::QosRecovered).with_slice(slice_id.to_string()),
                            );
                        }
                    }
                }
            }
        }
    }

    /// Snapshot of the currently-stored topology.
    #[must_use]
    pub fn get_topology(&self) -> Topology {
        self.state.get_topology()
    }

    /// Parallel `GetStatus` across every registered agent (spec §4.J). A
    /// per-agent failure leaves that cluster's key absent from the map; it
    /// never aborts the whole call.
    #[instrument(skip(self))]
    pub async fn get_status(&self) -> HashMap<String, TnStatus> {
        let agents = self.registry.snapshot();
        let mut join_set = JoinSet::new();
        for (cluster, agent) in agents {
            join_set.spawn(async move {
                let result = agent.get_status().await;
                (cluster, result)
            });
        }

        let mut status = HashMap::new();
        while let Some(joined) = join_set.join_next().await {
            if let Ok((cluster, Ok(s))) = joined {
                status.insert(cluster.to_string(), s);
            }
        }
        status
    }

    /// Base status plus topology, active slices, a live fault summary, QoS
    /// compliance, and VXLAN status per slice (spec §4.J `GetEnhancedStatus`).
    #[instrument(skip(self))]
    pub async fn get_enhanced_status(&self) -> EnhancedStatus {
        let status = self.get_status().await;
        let topology = self.get_topology();
        let active_slices: Vec<String> =
            self.state.get_active_slices().iter().map(SliceId::to_string).collect();

        let agents = self.registry.snapshot();
        let faults = self.fault_detector.poll_all(&agents).await;
        let mut fault_summary = FaultSummary::default();
        for fault in &faults {
            *fault_summary.counts.entry(fault.kind).or_insert(0) += 1;
            fault_summary.total += 1;
        }

        let qos_compliance = self.qos.get_compliance_summary();
        let vxlan_status: HashMap<String, DynamicVxlanConfig> = self
            .state
            .get_slice_vxlan_configs()
            .into_iter()
            .map(|(slice, cfg)| (slice.to_string(), cfg))
            .collect();

        EnhancedStatus {
            status,
            topology,
            active_slices,
            fault_summary,
            qos_compliance,
            vxlan_status,
        }
    }

    /// Signal every background loop to stop at its next check.
    pub fn stop(&self) {
        info!("stopping manager");
        self.cancellation.cancel();
        self.registry.stop_all();
    }

    /// Run the topology-discovery loop until cancelled.
    #[instrument(skip(self))]
    pub async fn run_topology_discovery_loop(&self) {
        info!("topology discovery loop started");
        loop {
            if self.cancellation.is_cancelled() {
                break;
            }
            self.discover_network_topology().await;
            tokio::select! {
                () = self.cancellation.cancelled() => break,
                () = self.time_provider.sleep(self.config.topology_discovery_interval) => {}
            }
        }
        info!("topology discovery loop stopped");
    }

    /// Run the fault-detection loop until cancelled.
    #[instrument(skip(self))]
    pub async fn run_fault_detection_loop(&self) {
        info!("fault detection loop started");
        self.events.publish(Event::new(EventKind::FaultDetectionStarted));
        loop {
            if self.cancellation.is_cancelled() {
                break;
            }
            self.detect_and_recover_faults().await;
            tokio::select! {
                () = self.cancellation.cancelled() => break,
                () = self.time_provider.sleep(self.config.fault_detection_interval) => {}
            }
        }
        info!("fault detection loop stopped");
    }

    /// Run the metrics-retention cleanup loop until cancelled.
    #[instrument(skip(self))]
    pub async fn run_metrics_cleanup_loop(&self) {
        info!("metrics cleanup loop started");
        loop {
            if self.cancellation.is_cancelled() {
                break;
            }
            self.metrics.cleanup_expired(chrono::Utc::now());
            tokio::select! {
                () = self.cancellation.cancelled() => break,
                () = self.time_provider.sleep(self.config.metrics_cleanup_interval) => {}
            }
        }
        info!("metrics cleanup loop stopped");
    }

    /// Run the event-bus dispatch loop until the bus is dropped or
    /// cancelled.
    #[instrument(skip(self))]
    pub async fn run_event_bus_loop(&self) {
        info!("event bus loop started");
        tokio::select! {
            () = self.cancellation.cancelled() => {}
            () = self.events.run() => {}
        }
        info!("event bus loop stopped");
    }
}
