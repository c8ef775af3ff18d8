//! Domain events emitted after committed block-state transitions.
//!
//! Delivery is best-effort and at-most-once per successful mutation: the
//! service calls [`EventNotifier::notify`] exactly once after the store write
//! and cache invalidation, logs any failure, and never rolls back.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::model::{Edge, UserId};

/// A committed change to one ordered pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockEvent {
    /// `actor_id` started blocking `target_id`.
    Blocked { actor_id: UserId, target_id: UserId },
    /// `actor_id` stopped blocking `target_id`.
    Unblocked { actor_id: UserId, target_id: UserId },
}

impl BlockEvent {
    #[must_use]
    pub const fn edge(&self) -> Edge {
        match *self {
            Self::Blocked {
                actor_id,
                target_id,
            }
            | Self::Unblocked {
                actor_id,
                target_id,
            } => Edge::new(actor_id, target_id),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Blocked { .. } => "user.blocked",
            Self::Unblocked { .. } => "user.unblocked",
        }
    }
}

/// Failure reported by a notifier. Logged by the service, never propagated.
#[derive(Debug, thiserror::Error)]
#[error("{}: {0}", ErrorCode::NotifierFailed)]
pub struct NotifyError(pub String);

/// Sink for [`BlockEvent`]s.
pub trait EventNotifier: Send + Sync {
    /// Deliver one event.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when delivery fails; the mutation stands.
    fn notify(&self, event: &BlockEvent) -> Result<(), NotifyError>;
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl EventNotifier for NullNotifier {
    fn notify(&self, _event: &BlockEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Emits each event as a structured `tracing` record at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl EventNotifier for TracingNotifier {
    fn notify(&self, event: &BlockEvent) -> Result<(), NotifyError> {
        let edge = event.edge();
        tracing::info!(
            event = event.name(),
            actor_id = edge.blocker.get(),
            target_id = edge.blocked.get(),
            "block relationship changed"
        );
        Ok(())
    }
}

/// Keeps every delivered event in memory, in delivery order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<BlockEvent>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events delivered so far.
    #[must_use]
    pub fn events(&self) -> Vec<BlockEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Drain and return the delivered events.
    #[must_use]
    pub fn take(&self) -> Vec<BlockEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

impl EventNotifier for RecordingNotifier {
    fn notify(&self, event: &BlockEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .map_err(|_| NotifyError("recording notifier lock poisoned".into()))?
            .push(*event);
        Ok(())
    }
}

impl<F> EventNotifier for F
where
    F: Fn(&BlockEvent) -> Result<(), NotifyError> + Send + Sync,
{
    fn notify(&self, event: &BlockEvent) -> Result<(), NotifyError> {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = BlockEvent::Blocked {
            actor_id: UserId::new(1),
            target_id: UserId::new(2),
        };
        let json = serde_json::to_value(event).expect("serialize");
        assert_eq!(json["type"], "blocked");
        assert_eq!(json["actor_id"], 1);
        assert_eq!(json["target_id"], 2);
        assert_eq!(event.name(), "user.blocked");
    }

    #[test]
    fn recording_notifier_keeps_order_and_drains() {
        let notifier = RecordingNotifier::new();
        let a = BlockEvent::Blocked {
            actor_id: UserId::new(1),
            target_id: UserId::new(2),
        };
        let b = BlockEvent::Unblocked {
            actor_id: UserId::new(1),
            target_id: UserId::new(2),
        };
        notifier.notify(&a).expect("notify");
        notifier.notify(&b).expect("notify");
        assert_eq!(notifier.events(), vec![a, b]);
        assert_eq!(notifier.take(), vec![a, b]);
        assert!(notifier.events().is_empty());
        assert_eq!(b.edge(), Edge::new(UserId::new(1), UserId::new(2)));
    }

    #[test]
    fn closures_are_notifiers() {
        let failing = |_: &BlockEvent| -> Result<(), NotifyError> {
            Err(NotifyError("transport down".into()))
        };
        let event = BlockEvent::Unblocked {
            actor_id: UserId::new(3),
            target_id: UserId::new(4),
        };
        let err = failing.notify(&event).expect_err("fails");
        assert!(err.to_string().contains("transport down"));
    }
}
