//! Events published on the [`crate::event_bus::EventBus`] (spec §3, §4.I).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of event kinds the control plane publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// An agent completed registration.
    AgentRegistered,
    /// A slice's baseline config was successfully applied to every agent.
    SliceConfigured,
    /// A dynamic VXLAN config was successfully applied.
    VxlanConfigured,
    /// A VXLAN tunnel was restarted by fault recovery.
    VxlanRecovered,
    /// A QoS strategy was successfully applied.
    QosConfigured,
    /// A QoS config was re-applied by fault recovery.
    QosRecovered,
    /// A topology discovery cycle published a non-empty diff.
    TopologyDiscovered,
    /// The fault-detection loop started.
    FaultDetectionStarted,
    /// A fault was classified and dispatched to recovery.
    FaultDetected,
}

/// An event published on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique id for this event instance, for log correlation.
    pub id: Uuid,
    /// Kind of event.
    pub kind: EventKind,
    /// Slice the event pertains to, if any.
    pub slice_id: Option<String>,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
    /// Opaque structured payload.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl Event {
    /// Build an event with the given kind and an empty payload, stamped
    /// `now`.
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            slice_id: None,
            timestamp: Utc::now(),
            data: HashMap::new(),
        }
    }

    /// Attach a slice id.
    #[must_use]
    pub fn with_slice(mut self, slice_id: impl Into<String>) -> Self {
        self.slice_id = Some(slice_id.into());
        self
    }

    /// Attach a payload entry.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}
