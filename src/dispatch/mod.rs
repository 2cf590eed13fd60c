//! Registry of active dispatch sessions.
//!
//! At most one session exists per request id. A session is removed from the
//! registry by its own controller, inside the same critical section that
//! applies the terminal transition, so a finished request is never found
//! through the registry.
//!
//! Lock order: a map guard is never held while taking a controller lock.
//! Lookups clone the controller handle out of the map and release the guard
//! before calling into it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrics::counter;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::controller::{Collaborators, Controller, Snapshot, SubscriptionId};
use crate::error::{DispatchError, Result};
use crate::escalation::{DeviceSignals, EscalationPolicy};
use crate::request::{CancellationReason, RequestData, RequestId};

pub mod types;

pub use types::{DispatchConfig, RegistryStats, SessionSummary};

use types::Session;

/// Owns every active [`Controller`], keyed by request id.
pub struct Registry {
    sessions: Arc<DashMap<RequestId, Session>>,
    collaborators: Collaborators,
    config: DispatchConfig,
    policy: EscalationPolicy,
    shutdown_token: CancellationToken,
    next_generation: AtomicU64,
    matching_in_flight: Arc<AtomicUsize>,
}

impl Registry {
    pub fn new(collaborators: Collaborators, config: DispatchConfig) -> Self {
        match serde_json::to_value(&config) {
            Ok(snapshot) => tracing::info!(config = %snapshot, "Dispatch registry starting"),
            Err(e) => tracing::warn!(error = %e, "Dispatch registry starting, config not serializable"),
        }
        Self {
            sessions: Arc::new(DashMap::new()),
            collaborators,
            policy: config.escalation_policy(),
            config,
            shutdown_token: CancellationToken::new(),
            next_generation: AtomicU64::new(0),
            matching_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Start a session for `request`, choosing its lifecycle variant from
    /// `signals`. Must be called within a tokio runtime.
    #[tracing::instrument(skip(self, request, signals), fields(request_id = %request.id))]
    pub fn begin(&self, request: RequestData, signals: DeviceSignals) -> Result<Controller> {
        let (controller, generation) = self.prepare(request, signals)?;
        let controller = self.admit(controller, generation)?;
        controller.start();
        Ok(controller)
    }

    /// Build an unstarted controller wired to remove itself on its terminal
    /// transition.
    fn prepare(&self, request: RequestData, signals: DeviceSignals) -> Result<(Controller, u64)> {
        if self.shutdown_token.is_cancelled() {
            return Err(DispatchError::Shutdown);
        }

        let request_id = request.id;
        let variant = self.policy.select_for(&signals);

        if self.sessions.contains_key(&request_id) {
            tracing::warn!("Rejected duplicate dispatch session");
            return Err(DispatchError::DuplicateSession(request_id));
        }

        let controller = Controller::new(
            request,
            signals,
            variant,
            self.collaborators.clone(),
            &self.config,
            &self.shutdown_token,
            self.matching_in_flight.clone(),
        )?;
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let sessions = Arc::downgrade(&self.sessions);
        controller.set_terminal_hook(Box::new(move |request_id| {
            if let Some(sessions) = sessions.upgrade() {
                sessions.remove_if(&request_id, |_, session| session.generation == generation);
            }
        }));
        Ok((controller, generation))
    }

    /// Insert a prepared controller, unless another session holds the id or
    /// shutdown began after it was prepared.
    fn admit(&self, controller: Controller, generation: u64) -> Result<Controller> {
        let request_id = controller.id();

        // The entry decides races between concurrent begins for the same id
        match self.sessions.entry(request_id) {
            Entry::Occupied(_) => {
                tracing::warn!("Rejected duplicate dispatch session");
                return Err(DispatchError::DuplicateSession(request_id));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Session {
                    controller: controller.clone(),
                    generation,
                    began_at: Utc::now(),
                });
            }
        }

        // Shutdown may have collected the sessions before this insert
        if self.shutdown_token.is_cancelled() {
            tracing::info!("Dispatch session admitted during shutdown, cancelling");
            if let Err(e) = controller.cancel_with(CancellationReason::Shutdown) {
                tracing::debug!(error = %e, "Session already finished");
            }
            return Err(DispatchError::Shutdown);
        }

        counter!("roadside_sessions_total", "variant" => controller.variant().as_str())
            .increment(1);
        Ok(controller)
    }

    fn lookup(&self, request_id: RequestId) -> Result<Controller> {
        self.sessions
            .get(&request_id)
            .map(|session| session.controller.clone())
            .ok_or(DispatchError::NotFound(request_id))
    }

    /// Handle on an active session.
    pub fn controller(&self, request_id: RequestId) -> Result<Controller> {
        let controller = self.lookup(request_id)?;
        if controller.is_terminal() {
            return Err(DispatchError::NotFound(request_id));
        }
        Ok(controller)
    }

    /// Current snapshot of an active session.
    pub fn get(&self, request_id: RequestId) -> Result<Snapshot> {
        let snapshot = self.lookup(request_id)?.snapshot();
        if snapshot.stage.is_terminal() {
            return Err(DispatchError::NotFound(request_id));
        }
        Ok(snapshot)
    }

    /// Cancel an active session. The session leaves the registry as part of
    /// the terminal transition.
    pub fn cancel(&self, request_id: RequestId) -> Result<bool> {
        self.lookup(request_id)?.cancel()
    }

    pub fn subscribe<F>(&self, request_id: RequestId, callback: F) -> Result<SubscriptionId>
    where
        F: FnMut(Snapshot) + Send + 'static,
    {
        Ok(self.controller(request_id)?.subscribe(callback))
    }

    pub fn updates(
        &self,
        request_id: RequestId,
    ) -> Result<(SubscriptionId, UnboundedReceiverStream<Snapshot>)> {
        Ok(self.controller(request_id)?.updates())
    }

    pub fn unsubscribe(&self, request_id: RequestId, subscription: SubscriptionId) -> Result<bool> {
        Ok(self.lookup(request_id)?.unsubscribe(subscription))
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn list(&self) -> Vec<SessionSummary> {
        let sessions: Vec<(Controller, chrono::DateTime<Utc>)> = self
            .sessions
            .iter()
            .map(|entry| (entry.controller.clone(), entry.began_at))
            .collect();

        let mut summaries: Vec<SessionSummary> = sessions
            .into_iter()
            .filter_map(|(controller, began_at)| {
                let stage = controller.stage();
                (!stage.is_terminal()).then(|| SessionSummary {
                    request_id: controller.id(),
                    stage,
                    variant: controller.variant(),
                    began_at,
                })
            })
            .collect();
        summaries.sort_by_key(|summary| summary.began_at);
        summaries
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            active_sessions: self.sessions.len(),
            matching_in_flight: self.matching_in_flight.load(Ordering::Relaxed),
        }
    }

    /// Cancel every active session with reason `Shutdown` and refuse new ones.
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
        let controllers: Vec<Controller> = self
            .sessions
            .iter()
            .map(|entry| entry.controller.clone())
            .collect();

        tracing::info!(sessions = controllers.len(), "Shutting down dispatch registry");
        for controller in controllers {
            if let Err(e) = controller.cancel_with(CancellationReason::Shutdown) {
                tracing::debug!(request_id = %controller.id(), error = %e, "Session already finished");
            }
        }
    }
}
