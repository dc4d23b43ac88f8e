//! Events emitted by the service for subscribers.

use std::sync::RwLock;
use std::time::Duration;

use sanka_types::{ActivityId, MemberId, Points, RequestId, VerificationKind, VerificationStatus};

use crate::ErrorClass;

/// Service-level events that observers can subscribe to via the [`EventBus`].
#[derive(Clone, Debug)]
pub enum ServiceEvent {
    /// A member registered and received their starting balance.
    MemberRegistered { member: MemberId, balance: Points },
    ActivityCreated { activity: ActivityId },
    /// A join completed (or an interrupted one was finished).
    Joined {
        member: MemberId,
        activity: ActivityId,
        balance: Points,
    },
    /// A join was refused with no points moved.
    JoinRefused {
        member: MemberId,
        activity: ActivityId,
        code: &'static str,
    },
    /// A new pending verification request was stored.
    VerificationSubmitted {
        request: RequestId,
        member: MemberId,
        kind: VerificationKind,
    },
    /// A request reached its terminal status.
    VerificationResolved {
        request: RequestId,
        status: VerificationStatus,
        awarded: Option<Points>,
    },
    OperationFailed {
        operation: &'static str,
        class: ErrorClass,
    },
    OperationCompleted {
        operation: &'static str,
        elapsed: Duration,
    },
}

type Listener = Box<dyn Fn(&ServiceEvent) + Send + Sync>;

/// Synchronous fan-out event bus for service events.
///
/// Listeners are invoked inline on the emitting task; keep handlers fast to
/// avoid stalling requests.
pub struct EventBus {
    listeners: RwLock<Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: Listener) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    pub fn emit(&self, event: &ServiceEvent) {
        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
        for listener in listeners.iter() {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
