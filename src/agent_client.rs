//! Request/response transport to a single remote TN agent (spec §4.A, §6).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::domain::{ClusterName, PerformanceMetrics, TnConfig, TnStatus};
use crate::error::TnError;

/// Request body for `POST /api/v1/slices/configure`.
#[derive(Debug, Clone, Serialize)]
struct ConfigureSliceRequest<'a> {
    #[serde(rename = "sliceId")]
    slice_id: &'a str,
    config: &'a TnConfig,
}

/// Request body for `POST /api/v1/test/performance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceTestConfig {
    /// Test type, e.g. `"throughput"`.
    pub test_type: String,
    /// Requested test duration in milliseconds.
    pub duration_ms: u64,
    /// Opaque parameters passed through to the agent.
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
}

/// Abstraction over a single agent's HTTP control API, so the manager and
/// its background loops can be exercised against a mock in tests without a
/// running network (teacher pattern: `message_router::traits` defines
/// narrow async traits per collaborator rather than depending on a
/// concrete transport).
#[async_trait]
pub trait Agent: Send + Sync + std::fmt::Debug {
    /// Cluster name this client was registered under.
    fn cluster_name(&self) -> &ClusterName;

    /// `true` after a successful [`Agent::connect`] and before [`Agent::stop`].
    fn is_connected(&self) -> bool;

    /// `GET /health`. Success iff HTTP 200; sets the connected flag.
    async fn connect(&self) -> Result<(), TnError>;

    /// `POST /api/v1/slices/configure`.
    async fn configure_slice(&self, slice_id: &str, config: &TnConfig) -> Result<(), TnError>;

    /// `POST /api/v1/test/performance`.
    async fn run_performance_test(
        &self,
        cfg: &PerformanceTestConfig,
    ) -> Result<PerformanceMetrics, TnError>;

    /// `GET /api/v1/status`.
    async fn get_status(&self) -> Result<TnStatus, TnError>;

    /// `GET /api/v1/metrics`.
    async fn get_metrics(&self) -> Result<HashMap<String, f64>, TnError>;

    /// `POST /api/v1/command/{name}`.
    async fn send_command(&self, name: &str, payload: Value) -> Result<Value, TnError>;

    /// `GET /ping` with a 5-second deadline.
    async fn ping(&self) -> Result<(), TnError>;

    /// Clear the connected flag; no network call.
    fn stop(&self);
}

/// Production [`Agent`] implementation backed by `reqwest`.
#[derive(Debug)]
pub struct AgentClient {
    cluster_name: ClusterName,
    base_url: String,
    request_timeout: Duration,
    ping_timeout: Duration,
    http: reqwest::Client,
    connected: std::sync::atomic::AtomicBool,
}

impl AgentClient {
    /// Build a new client for `cluster_name` at `base_url`, with the default
    /// 30-second request timeout (spec §4.A).
    #[must_use]
    pub fn new(cluster_name: ClusterName, base_url: impl Into<String>) -> Self {
        Self::with_timeouts(
            cluster_name,
            base_url,
            Duration::from_secs(30),
            Duration::from_secs(5),
        )
    }

    /// Build a new client with explicit request/ping timeouts.
    #[must_use]
    pub fn with_timeouts(
        cluster_name: ClusterName,
        base_url: impl Into<String>,
        request_timeout: Duration,
        ping_timeout: Duration,
    ) -> Self {
        Self {
            cluster_name,
            base_url: base_url.into(),
            request_timeout,
            ping_timeout,
            http: reqwest::Client::new(),
            connected: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn require_connected(&self) -> Result<(), TnError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(TnError::NotConnected {
                cluster: self.cluster_name.clone(),
            })
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Agent for AgentClient {
    fn cluster_name(&self) -> &ClusterName {
        &self.cluster_name
    }

    fn is_connected(&self) -> bool {
        self.connected.load(std::sync::atomic::Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), TnError> {
        let resp = self
            .http
            .get(self.url("/health"))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| TnError::Unreachable {
                cluster: self.cluster_name.clone(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            self.connected.store(true, std::sync::atomic::Ordering::SeqCst);
            info!(cluster = %self.cluster_name, "agent connected");
            Ok(())
        } else {
            let status = resp.status().as_u16();
            warn!(cluster = %self.cluster_name, status, "agent health check rejected");
            Err(TnError::HealthRejected {
                cluster: self.cluster_name.clone(),
                status,
            })
        }
    }

    async fn configure_slice(&self, slice_id: &str, config: &TnConfig) -> Result<(), TnError> {
        self.require_connected()?;
        let resp = self
            .http
            .post(self.url("/api/v1/slices/configure"))
            .timeout(self.request_timeout)
            .json(&ConfigureSliceRequest { slice_id, config })
            .send()
            .await
            .map_err(|e| TnError::Unreachable {
                cluster: self.cluster_name.clone(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            Err(TnError::ConfigRejected {
                cluster: self.cluster_name.clone(),
                status,
                body,
            })
        }
    }

    async fn run_performance_test(
        &self,
        cfg: &PerformanceTestConfig,
    ) -> Result<PerformanceMetrics, TnError> {
        self.require_connected()?;
        let resp = self
            .http
            .post(self.url("/api/v1/test/performance"))
            .timeout(self.request_timeout)
            .json(cfg)
            .send()
            .await
            .map_err(|e| TnError::TestFailed {
                cluster: self.cluster_name.clone(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(TnError::TestFailed {
                cluster: self.cluster_name.clone(),
                reason: format!("status {}", resp.status()),
            });
        }

        resp.json::<PerformanceMetrics>()
            .await
            .map_err(|e| TnError::TestFailed {
                cluster: self.cluster_name.clone(),
                reason: format!("unparseable body: {e}"),
            })
    }

    async fn get_status(&self) -> Result<TnStatus, TnError> {
        self.require_connected()?;
        let resp = self
            .http
            .get(self.url("/api/v1/status"))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| TnError::Unreachable {
                cluster: self.cluster_name.clone(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(TnError::Unreachable {
                cluster: self.cluster_name.clone(),
                reason: format!("status {}", resp.status()),
            });
        }

        resp.json::<TnStatus>().await.map_err(|e| TnError::Unreachable {
            cluster: self.cluster_name.clone(),
            reason: format!("unparseable body: {e}"),
        })
    }

    async fn get_metrics(&self) -> Result<HashMap<String, f64>, TnError> {
        self.require_connected()?;
        let resp = self
            .http
            .get(self.url("/api/v1/metrics"))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| TnError::Unreachable {
                cluster: self.cluster_name.clone(),
                reason: e.to_string(),
            })?;

        resp.json::<HashMap<String, f64>>()
            .await
            .map_err(|e| TnError::Unreachable {
                cluster: self.cluster_name.clone(),
                reason: format!("unparseable body: {e}"),
            })
    }

    async fn send_command(&self, name: &str, payload: Value) -> Result<Value, TnError> {
        self.require_connected()?;
        let resp = self
            .http
            .post(self.url(&format!("/api/v1/command/{name}")))
            .timeout(self.request_timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| TnError::Unreachable {
                cluster: self.cluster_name.clone(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TnError::ConfigRejected {
                cluster: self.cluster_name.clone(),
                status,
                body,
            });
        }

        resp.json::<Value>().await.map_err(|e| TnError::Unreachable {
            cluster: self.cluster_name.clone(),
            reason: format!("unparseable body: {e}"),
        })
    }

    async fn ping(&self) -> Result<(), TnError> {
        self.require_connected()?;
        let resp = self
            .http
            .get(self.url("/ping"))
            .timeout(self.ping_timeout)
            .send()
            .await
            .map_err(|e| TnError::Unreachable {
                cluster: self.cluster_name.clone(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(TnError::HealthRejected {
                cluster: self.cluster_name.clone(),
                status: resp.status().as_u16(),
            })
        }
    }

    fn stop(&self) {
        self.connected.store(false, std::sync::atomic::Ordering::SeqCst);
        info!(cluster = %self.cluster_name, "agent stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cluster(name: &str) -> ClusterName {
        ClusterName::try_new(name).unwrap()
    }

    #[tokio::test]
    async fn rejects_operations_before_connect() {
        let client = AgentClient::new(cluster("edge01"), "http://127.0.0.1:1");
        let err = client
            .get_status()
            .await
            .expect_err("must reject unconnected status call");
        assert!(matches!(err, TnError::NotConnected { .. }));
    }

    #[tokio::test]
    async fn connect_succeeds_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = AgentClient::new(cluster("edge01"), server.uri());
        client.connect().await.unwrap();
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn connect_fails_on_non_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = AgentClient::new(cluster("edge01"), server.uri());
        let err = client.connect().await.expect_err("503 must be rejected");
        assert!(matches!(err, TnError::HealthRejected { status: 503, .. }));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn stop_clears_connected_without_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = AgentClient::new(cluster("edge01"), server.uri());
        client.connect().await.unwrap();
        client.stop();
        assert!(!client.is_connected());
    }
}
