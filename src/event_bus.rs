//! Bounded, non-blocking event fan-out to independent subscribers
//! (spec §4.I).

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::domain::Event;

/// A subscriber to the [`EventBus`]. A panicking handler is isolated by
/// `tokio::spawn` and never affects other subscribers or the dispatch loop.
#[async_trait]
pub trait EventHandler: Send + Sync + std::fmt::Debug {
    /// Handle one event. Errors should be logged internally; this trait has
    /// no error return because a failing handler must never block or skip
    /// other subscribers.
    async fn handle(&self, event: Event);
}

/// Bounded, single-queue event bus. `publish` never blocks: once the queue
/// is full, further publishes are dropped and logged (spec §4.I).
pub struct EventBus {
    subscribers: RwLock<Vec<Arc<dyn EventHandler>>>,
    sender: mpsc::Sender<Event>,
    receiver: Mutex<mpsc::Receiver<Event>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a bus with a bounded queue of `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            subscribers: RwLock::new(Vec::new()),
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// Register a subscriber. Subscribers are never removed; the manager's
    /// lifetime is the bus's lifetime (spec §4.I).
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) {
        self.subscribers.write().expect("subscribers lock poisoned").push(handler);
    }

    /// Enqueue an event. Non-blocking: a full queue drops the event and logs
    /// a warning rather than applying backpressure to the publisher.
    pub fn publish(&self, event: Event) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("event bus queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("event bus closed, dropping event");
            }
        }
    }

    /// Run the dispatch loop until the bus is dropped (all senders closed).
    /// Intended to be driven by a long-lived background task owned by the
    /// manager.
    pub async fn run(&self) {
        loop {
            let event = {
                let mut receiver = self.receiver.lock().await;
                receiver.recv().await
            };
            match event {
                Some(event) => self.dispatch(event).await,
                None => break,
            }
        }
    }

    /// Dispatch exactly one already-queued event, if any, without blocking.
    /// Returns `true` if an event was dispatched. Used by tests and by
    /// callers that want deterministic, synchronous draining.
    pub async fn run_once(&self) -> bool {
        let event = {
            let mut receiver = self.receiver.lock().await;
            receiver.try_recv().ok()
        };
        match event {
            Some(event) => {
                self.dispatch(event).await;
                true
            }
            None => false,
        }
    }

    async fn dispatch(&self, event: Event) {
        let subscribers: Vec<Arc<dyn EventHandler>> = self
            .subscribers
            .read()
            .expect("subscribers lock poisoned")
            .clone();

        let mut handles = Vec::with_capacity(subscribers.len());
        for subscriber in subscribers {
            let event = event.clone();
            handles.push(tokio::spawn(async move {
                subscriber.handle(event).await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(panic = %e, "event handler panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventKind;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug)]
    struct RecordingHandler {
        seen: Arc<StdMutex<Vec<EventKind>>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(&self, event: Event) {
            self.seen.lock().unwrap().push(event.kind);
        }
    }

    #[derive(Debug)]
    struct PanickingHandler;

    #[async_trait]
    impl EventHandler for PanickingHandler {
        async fn handle(&self, _event: Event) {
            panic!("handler exploded");
        }
    }

    #[tokio::test]
    async fn invariant_fifo_delivery_per_handler() {
        let bus = EventBus::new(16);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        bus.subscribe(Arc::new(RecordingHandler { seen: Arc::clone(&seen) }));

        bus.publish(Event::new(EventKind::AgentRegistered));
        bus.publish(Event::new(EventKind::VxlanConfigured));
        bus.publish(Event::new(EventKind::QosConfigured));

        while bus.run_once().await {}

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                EventKind::AgentRegistered,
                EventKind::VxlanConfigured,
                EventKind::QosConfigured,
            ]
        );
    }

    #[tokio::test]
    async fn invariant_panicking_handler_does_not_affect_others() {
        let bus = EventBus::new(16);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        bus.subscribe(Arc::new(PanickingHandler));
        bus.subscribe(Arc::new(RecordingHandler { seen: Arc::clone(&seen) }));

        bus.publish(Event::new(EventKind::FaultDetected));
        assert!(bus.run_once().await);

        assert_eq!(*seen.lock().unwrap(), vec![EventKind::FaultDetected]);
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let bus = EventBus::new(1);
        bus.publish(Event::new(EventKind::AgentRegistered));
        bus.publish(Event::new(EventKind::VxlanConfigured));

        assert!(bus.run_once().await);
        assert!(!bus.run_once().await);
    }
}
