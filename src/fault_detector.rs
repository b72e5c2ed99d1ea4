//! Per-agent health polling and fault classification (spec §4.G).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;

use crate::agent_client::Agent;
use crate::domain::{ClusterName, Fault, FaultKind, Severity};

/// Classifies faults from a single poll of an agent's `/ping` and
/// `/api/v1/status` endpoints. Stateless; one call per agent per cycle.
#[derive(Debug, Clone, Copy)]
pub struct FaultDetector {
    high_latency_threshold_ms: f64,
}

impl FaultDetector {
    /// Build a detector that flags `HighLatency` above `high_latency_threshold_ms`.
    #[must_use]
    pub fn new(high_latency_threshold_ms: f64) -> Self {
        Self {
            high_latency_threshold_ms,
        }
    }

    /// Poll one agent. Never returns an `Err`: transport failures are
    /// themselves classified as faults so the caller's loop never aborts on
    /// a single bad agent (spec §4.G, best-effort).
    pub async fn poll(&self, cluster: &ClusterName, agent: &Arc<dyn Agent>) -> Vec<Fault> {
        let mut faults = Vec::new();

        let start = Instant::now();
        let ping_result = agent.ping().await;
        let ping_latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        if ping_result.is_err() {
            faults.push(Fault {
                kind: FaultKind::LinkDown,
                node_name: cluster.to_string(),
                severity: Severity::Critical,
                details: HashMap::from([(
                    "reason".to_string(),
                    json!("ping timed out or was refused"),
                )]),
                timestamp: Utc::now(),
            });
            return faults;
        }

        if ping_latency_ms > self.high_latency_threshold_ms {
            faults.push(Fault {
                kind: FaultKind::HighLatency,
                node_name: cluster.to_string(),
                severity: Severity::Medium,
                details: HashMap::from([
                    ("observed_ms".to_string(), json!(ping_latency_ms)),
                    ("threshold_ms".to_string(), json!(self.high_latency_threshold_ms)),
                ]),
                timestamp: Utc::now(),
            });
        }

        match agent.get_status().await {
            Ok(status) => {
                if !status.vxlan.tunnel_up {
                    faults.push(Fault {
                        kind: FaultKind::VxlanDown,
                        node_name: cluster.to_string(),
                        severity: Severity::Critical,
                        details: HashMap::from([(
                            "peers".to_string(),
                            json!(status.vxlan.peers),
                        )]),
                        timestamp: Utc::now(),
                    });
                }
                if !status.tc.rules_active || !status.tc.shaping_active {
                    faults.push(Fault {
                        kind: FaultKind::QosViolation,
                        node_name: cluster.to_string(),
                        severity: Severity::High,
                        details: HashMap::from([
                            ("rules_active".to_string(), json!(status.tc.rules_active)),
                            ("shaping_active".to_string(), json!(status.tc.shaping_active)),
                        ]),
                        timestamp: Utc::now(),
                    });
                }
            }
            Err(e) => {
                faults.push(Fault {
                    kind: FaultKind::LinkDown,
                    node_name: cluster.to_string(),
                    severity: Severity::High,
                    details: HashMap::from([("reason".to_string(), json!(e.to_string()))]),
                    timestamp: Utc::now(),
                });
            }
        }

        faults
    }

    /// Poll every agent in `agents`, continuing past individual failures.
    pub async fn poll_all(
        &self,
        agents: &[(ClusterName, Arc<dyn Agent>)],
    ) -> Vec<Fault> {
        let mut all_faults = Vec::new();
        for (cluster, agent) in agents {
            all_faults.extend(self.poll(cluster, agent).await);
        }
        all_faults
    }
}

/// Default polling timeout applied to the underlying ping probe (spec §4.G):
/// 5 seconds, matching [`crate::agent_client::AgentClient`]'s default ping
/// timeout.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TcStatus, TnStatus, VxlanStatus};
    use crate::error::TnError;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct FakeAgent {
        cluster: ClusterName,
        ping_ok: bool,
        tunnel_up: bool,
        rules_active: bool,
    }

    #[async_trait]
    impl Agent for FakeAgent {
        fn cluster_name(&self) -> &ClusterName {
            &self.cluster
        }
        fn is_connected(&self) -> bool {
            true
        }
        async fn connect(&self) -> Result<(), TnError> {
            Ok(())
        }
        async fn configure_slice(&self, _: &str, _: &crate::domain::TnConfig) -> Result<(), TnError> {
            Ok(())
        }
        async fn run_performance_test(
            &self,
            _: &crate::agent_client::PerformanceTestConfig,
        ) -> Result<crate::domain::PerformanceMetrics, TnError> {
            unimplemented!()
        }
        async fn get_status(&self) -> Result<TnStatus, TnError> {
            Ok(TnStatus {
                healthy: self.tunnel_up,
                last_update: Utc::now(),
                active_connections: 0,
                bandwidth_usage: HashMap::new(),
                vxlan: VxlanStatus {
                    tunnel_up: self.tunnel_up,
                    peers: vec![],
                    packets_tx: 0,
                    packets_rx: 0,
                    last_heartbeat: None,
                },
                tc: TcStatus {
                    rules_active: self.rules_active,
                    queue_stats: HashMap::new(),
                    shaping_active: self.rules_active,
                    interfaces: vec![],
                },
                errors: None,
            })
        }
        async fn get_metrics(&self) -> Result<HashMap<String, f64>, TnError> {
            Ok(HashMap::new())
        }
        async fn send_command(&self, _: &str, _: serde_json::Value) -> Result<serde_json::Value, TnError> {
            Ok(serde_json::Value::Null)
        }
        async fn ping(&self) -> Result<(), TnError> {
            if self.ping_ok {
                Ok(())
            } else {
                Err(TnError::Unreachable {
                    cluster: self.cluster.clone(),
                    reason: "refused".to_string(),
                })
            }
        }
        fn stop(&self) {}
    }

    fn cluster(name: &str) -> ClusterName {
        ClusterName::try_new(name).unwrap()
    }

    #[tokio::test]
    async fn ping_failure_reports_link_down_only() {
        let detector = FaultDetector::new(50.0);
        let cluster = cluster("edge01");
        let agent: Arc<dyn Agent> = Arc::new(FakeAgent {
            cluster: cluster.clone(),
            ping_ok: false,
            tunnel_up: true,
            rules_active: true,
        });
        let faults = detector.poll(&cluster, &agent).await;
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].kind, FaultKind::LinkDown);
        assert_eq!(faults[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn scenario_s6_vxlan_down_is_classified_critical() {
        let detector = FaultDetector::new(1_000.0);
        let cluster = cluster("edge01");
        let agent: Arc<dyn Agent> = Arc::new(FakeAgent {
            cluster: cluster.clone(),
            ping_ok: true,
            tunnel_up: false,
            rules_active: true,
        });
        let faults = detector.poll(&cluster, &agent).await;
        assert!(faults.iter().any(|f| f.kind == FaultKind::VxlanDown && f.severity == Severity::Critical));
    }

    #[tokio::test]
    async fn qos_violation_reported_when_tc_rules_inactive() {
        let detector = FaultDetector::new(1_000.0);
        let cluster = cluster("edge01");
        let agent: Arc<dyn Agent> = Arc::new(FakeAgent {
            cluster: cluster.clone(),
            ping_ok: true,
            tunnel_up: true,
            rules_active: false,
        });
        let faults = detector.poll(&cluster, &agent).await;
        assert!(faults.iter().any(|f| f.kind == FaultKind::QosViolation));
    }

    #[tokio::test]
    async fn healthy_agent_reports_no_faults() {
        let detector = FaultDetector::new(1_000.0);
        let cluster = cluster("edge01");
        let agent: Arc<dyn Agent> = Arc::new(FakeAgent {
            cluster: cluster.clone(),
            ping_ok: true,
            tunnel_up: true,
            rules_active: true,
        });
        assert!(detector.poll(&cluster, &agent).await.is_empty());
    }
}
