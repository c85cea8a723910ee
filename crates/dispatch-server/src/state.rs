//! Shared application state for the dispatcher API server.
//!
//! [`AppState`] holds the orchestrator (and through it the entity store
//! and event bus), the triage classifier, the random incident generator,
//! and the registry of connected `WebSocket` sessions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dispatch_core::config::BroadcastConfig;
use dispatch_core::scenario::IncidentGenerator;
use dispatch_core::{EntityStore, Orchestrator, TriageClassifier};

use crate::extract::DispatcherId;

/// A connected dispatcher session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Dispatcher identity from `X-Dispatcher-Id`, if sent.
    pub dispatcher: DispatcherId,
    /// Connection time.
    pub connected_at: DateTime<Utc>,
}

/// Registry of live `WebSocket` sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    next_id: AtomicU64,
    sessions: Mutex<BTreeMap<u64, SessionInfo>>,
}

impl SessionRegistry {
    /// Record a new session. It stays registered until the returned
    /// guard is dropped.
    pub fn register(self: &Arc<Self>, dispatcher: DispatcherId) -> SessionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id,
                SessionInfo {
                    dispatcher,
                    connected_at: Utc::now(),
                },
            );
        SessionGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Number of connected sessions.
    pub fn count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// All connected sessions, oldest first.
    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

/// Deregisters its session on drop.
#[derive(Debug)]
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    id: u64,
}

impl SessionGuard {
    /// Session number, unique for the process lifetime.
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug)]
pub struct AppState {
    /// Dispatch orchestration over the entity store.
    pub orchestrator: Arc<Orchestrator>,
    /// Free-text triage classifier.
    pub classifier: Arc<TriageClassifier>,
    /// Random incident generator for demo seeding.
    pub generator: IncidentGenerator,
    /// Connected `WebSocket` sessions.
    pub sessions: Arc<SessionRegistry>,
    /// Interval between `WebSocket` pings.
    pub ping_interval: Duration,
}

impl AppState {
    /// Create the application state.
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        classifier: Arc<TriageClassifier>,
        generator: IncidentGenerator,
        broadcast: &BroadcastConfig,
    ) -> Self {
        Self {
            orchestrator,
            classifier,
            generator,
            sessions: Arc::new(SessionRegistry::default()),
            ping_interval: Duration::from_secs(broadcast.ping_interval_secs.max(1)),
        }
    }

    /// The entity store.
    pub fn store(&self) -> &EntityStore {
        self.orchestrator.store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_deregister_on_drop() {
        let registry = Arc::new(SessionRegistry::default());
        let first = registry.register(DispatcherId(Some("D-7".to_owned())));
        let second = registry.register(DispatcherId::default());
        assert_ne!(first.id(), second.id());
        assert_eq!(registry.count(), 2);

        drop(first);
        assert_eq!(registry.count(), 1);
        assert_eq!(
            registry.list().first().map(|s| s.dispatcher.clone()),
            Some(DispatcherId::default())
        );
        drop(second);
        assert_eq!(registry.count(), 0);
    }
}
