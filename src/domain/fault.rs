//! Faults classified by the fault detector (spec §3, §4.G).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a detected fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational only.
    Low,
    /// Degraded but functioning.
    Medium,
    /// Service-impacting.
    High,
    /// Total loss of function.
    Critical,
}

/// The closed set of fault kinds the detector can classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// The VXLAN tunnel on a node is reported down.
    VxlanDown,
    /// A QoS violation was observed on a node.
    QosViolation,
    /// A link to/from a node failed to respond.
    LinkDown,
    /// Observed latency exceeded the configured threshold.
    HighLatency,
}

/// A classified fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    /// Kind of fault.
    pub kind: FaultKind,
    /// Node (cluster name) the fault was observed on.
    pub node_name: String,
    /// Severity assigned by the detector.
    pub severity: Severity,
    /// Free-form structured detail, e.g. `{"p95": 45.0, "threshold": 30.0}`.
    #[serde(default)]
    pub details: HashMap<String, serde_json::Value>,
    /// When the fault was observed.
    pub timestamp: DateTime<Utc>,
}
