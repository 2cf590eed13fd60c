//! Per-request lifecycle controller.
//!
//! A [`Controller`] owns exactly one [`AnyRequest`] and is the only thing
//! allowed to move it between stages. Every operation validates the current
//! stage, computes the successor on a clone, and swaps it in only if the whole
//! transition succeeded, so a failed operation never leaves a partial update.
//!
//! Operations are serialized in arrival order by an async operation lock.
//! The request itself sits behind a short synchronous lock that is never held
//! across an await, which lets [`Controller::cancel`] and the matching
//! callback cut in while a suspended operation (geocoding) is outstanding.
//!
//! ```text
//! ServiceSelection ─select_service─> LocationConfirm ─confirm_location─> PricingPreview
//!                                                                            │
//!        ┌───────────────────── confirm_pricing ─────────────────────────────┘
//!        v
//! ProviderMatch ──matched──> LiveTracking ─complete_service─> Completed
//!    │      ^
//! exhausted │ retry_matching
//!    v      │
//! MatchFailed
//!
//! any non-terminal stage ──cancel──> Cancelled
//! ```

pub mod subscribers;

pub use subscribers::{Snapshot, SubscriptionId};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, TokioClock};
use crate::directory::ProviderDirectory;
use crate::dispatch::DispatchConfig;
use crate::domain::provider::Provider;
use crate::error::{DispatchError, Result};
use crate::escalation::{DeviceSignals, Variant};
use crate::geocoder::Geocoder;
use crate::matching::{MatchResult, MatchingConfig, MatchingProcess};
use crate::notifier::{LogNotifier, Notifier, dispatched_message};
use crate::pricing::{PricingCalculator, RateCard};
use crate::request::{
    AnyRequest, CancellationReason, Coordinate, Location, Request, RequestData, RequestId,
    ServiceKind, ServiceRequest, Stage, Vehicle,
};

use subscribers::Subscribers;

/// External services a controller talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub geocoder: Arc<dyn Geocoder>,
    pub directory: Arc<dyn ProviderDirectory>,
    pub pricing: Arc<dyn PricingCalculator>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Default rate card, log-only notifier and the tokio clock.
    pub fn new(geocoder: Arc<dyn Geocoder>, directory: Arc<dyn ProviderDirectory>) -> Self {
        Self {
            geocoder,
            directory,
            pricing: Arc::new(RateCard::default()),
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(TokioClock),
        }
    }

    pub fn with_pricing(mut self, pricing: Arc<dyn PricingCalculator>) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

type TerminalHook = Box<dyn FnOnce(RequestId) + Send>;

/// Handle on the matching task for the current run.
struct MatchingHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl MatchingHandle {
    fn stop(self) {
        self.token.cancel();
        self.task.abort();
    }
}

/// Mutable part of a controller, guarded by the slot lock.
struct Slot {
    request: AnyRequest,
    subscribers: Subscribers,
    /// Transitions applied so far.
    sequence: u64,
    started: bool,
    matching: Option<MatchingHandle>,
    contact_notified: bool,
    on_terminal: Option<TerminalHook>,
}

struct Inner {
    id: RequestId,
    variant: Variant,
    signals: DeviceSignals,
    collaborators: Collaborators,
    geocode_timeout: Duration,
    matching_config: MatchingConfig,
    /// Serializes operations in arrival order.
    operations: tokio::sync::Mutex<()>,
    slot: Mutex<Slot>,
    /// Cancelled on the terminal transition; interrupts suspended operations.
    cancellation: CancellationToken,
    matching_in_flight: Arc<AtomicUsize>,
}

/// Lifecycle controller for one service request. Cheap to clone.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("id", &self.inner.id)
            .field("variant", &self.inner.variant)
            .field("stage", &self.stage())
            .finish()
    }
}

impl Controller {
    /// Build a controller without starting it.
    ///
    /// Emergency variants enter at `ProviderMatch`: the preselected kind (or
    /// `Other`) and the reported position are taken as confirmed, and pricing
    /// is estimated immediately.
    pub(crate) fn new(
        data: RequestData,
        signals: DeviceSignals,
        variant: Variant,
        collaborators: Collaborators,
        config: &DispatchConfig,
        parent: &CancellationToken,
        matching_in_flight: Arc<AtomicUsize>,
    ) -> Result<Self> {
        let id = data.id;
        let request: AnyRequest = if variant.is_fast_track() {
            let service_kind = data.preselected_kind.unwrap_or(ServiceKind::Other);
            let position = data.reported_position.ok_or_else(|| {
                DispatchError::Validation(format!(
                    "{variant} request {id} needs a reported position"
                ))
            })?;
            position.validate()?;
            let location = Location::device_fix(position);
            let pricing =
                collaborators
                    .pricing
                    .estimate(service_kind, &location, data.vehicle.as_ref())?;
            Request::new(data)
                .fast_track(service_kind, location, pricing)
                .into()
        } else {
            Request::new(data).into()
        };

        Ok(Self {
            inner: Arc::new(Inner {
                id,
                variant,
                signals,
                collaborators,
                geocode_timeout: config.geocode_timeout(),
                matching_config: MatchingConfig::from(config),
                operations: tokio::sync::Mutex::new(()),
                slot: Mutex::new(Slot {
                    request,
                    subscribers: Subscribers::default(),
                    sequence: 0,
                    started: false,
                    matching: None,
                    contact_notified: false,
                    on_terminal: None,
                }),
                cancellation: parent.child_token(),
                matching_in_flight,
            }),
        })
    }

    /// Build and start a controller that is not tracked by a registry.
    pub fn launch(
        data: RequestData,
        signals: DeviceSignals,
        variant: Variant,
        collaborators: Collaborators,
        config: &DispatchConfig,
    ) -> Result<Self> {
        let controller = Self::new(
            data,
            signals,
            variant,
            collaborators,
            config,
            &CancellationToken::new(),
            Arc::new(AtomicUsize::new(0)),
        )?;
        controller.start();
        Ok(controller)
    }

    /// Run once the terminal transition has been applied, under the slot lock.
    pub(crate) fn set_terminal_hook(&self, hook: TerminalHook) {
        self.inner.slot.lock().on_terminal = Some(hook);
    }

    /// Begin the session: fast-tracked requests start matching right away.
    pub(crate) fn start(&self) {
        let mut slot = self.inner.slot.lock();
        if slot.started || slot.request.is_terminal() {
            return;
        }
        slot.started = true;
        tracing::info!(
            request_id = %self.inner.id,
            variant = %self.inner.variant,
            stage = %slot.request.stage(),
            "Dispatch session started"
        );
        self.launch_matching(&mut slot);
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn id(&self) -> RequestId {
        self.inner.id
    }

    pub fn variant(&self) -> Variant {
        self.inner.variant
    }

    pub fn stage(&self) -> Stage {
        self.inner.slot.lock().request.stage()
    }

    pub fn is_terminal(&self) -> bool {
        self.inner.slot.lock().request.is_terminal()
    }

    /// Current snapshot. Never blocks on an outstanding operation.
    pub fn snapshot(&self) -> Snapshot {
        let slot = self.inner.slot.lock();
        Snapshot::capture(&slot.request, self.inner.variant, slot.sequence)
    }

    /// Full typed request in its current stage.
    pub fn request(&self) -> AnyRequest {
        self.inner.slot.lock().request.clone()
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    #[tracing::instrument(skip(self), fields(request_id = %self.inner.id))]
    pub async fn select_service(&self, service_kind: ServiceKind) -> Result<Snapshot> {
        let _operation = self.inner.operations.lock().await;
        let mut slot = self.inner.slot.lock();
        let AnyRequest::ServiceSelection(request) = &slot.request else {
            return Err(self.rejection(slot.request.stage(), "select_service"));
        };
        let next = request.clone().select_service(service_kind);
        Ok(self.commit(&mut slot, next.into()))
    }

    /// Resolve the position to an address and move to `PricingPreview`.
    ///
    /// `vehicle` and `notes` replace the stored values only when given.
    /// Geocoding failure or timeout leaves the request in `LocationConfirm`.
    #[tracing::instrument(skip(self, vehicle, notes), fields(request_id = %self.inner.id))]
    pub async fn confirm_location(
        &self,
        position: Coordinate,
        vehicle: Option<Vehicle>,
        notes: Option<String>,
    ) -> Result<Snapshot> {
        let _operation = self.inner.operations.lock().await;
        self.expect_stage(Stage::LocationConfirm, "confirm_location")?;
        position.validate()?;
        if let Some(vehicle) = &vehicle {
            crate::pricing::validate_vehicle(vehicle)?;
        }

        let resolved = tokio::select! {
            biased;
            _ = self.inner.cancellation.cancelled() => {
                return Err(DispatchError::RequestCancelled(self.inner.id));
            }
            result = self.inner.collaborators.geocoder.resolve(position) => result,
            _ = self.inner.collaborators.clock.sleep(self.inner.geocode_timeout) => {
                Err(DispatchError::GeocodeTimeout(self.inner.id))
            }
        };
        let location = match resolved {
            Ok(location) => location,
            Err(e) => {
                tracing::warn!(error = %e, "Location could not be confirmed");
                return Err(e);
            }
        };

        let mut slot = self.inner.slot.lock();
        if self.inner.cancellation.is_cancelled() {
            return Err(DispatchError::RequestCancelled(self.inner.id));
        }
        let AnyRequest::LocationConfirm(request) = &slot.request else {
            return Err(self.rejection(slot.request.stage(), "confirm_location"));
        };
        let next = request.clone().confirm_location(location, vehicle, notes);
        Ok(self.commit(&mut slot, next.into()))
    }

    /// Accept the quote and start matching.
    #[tracing::instrument(skip(self), fields(request_id = %self.inner.id))]
    pub async fn confirm_pricing(&self) -> Result<Snapshot> {
        let _operation = self.inner.operations.lock().await;
        let mut slot = self.inner.slot.lock();
        let AnyRequest::PricingPreview(request) = &slot.request else {
            return Err(self.rejection(slot.request.stage(), "confirm_pricing"));
        };
        let pricing = self.inner.collaborators.pricing.estimate(
            request.state.service_kind,
            &request.state.location,
            request.data.vehicle.as_ref(),
        )?;
        let next = request.clone().confirm_pricing(pricing);
        let snapshot = self.commit(&mut slot, next.into());
        self.launch_matching(&mut slot);
        Ok(snapshot)
    }

    /// Start a fresh matching run after a failed one.
    #[tracing::instrument(skip(self), fields(request_id = %self.inner.id))]
    pub async fn retry_matching(&self) -> Result<Snapshot> {
        let _operation = self.inner.operations.lock().await;
        let mut slot = self.inner.slot.lock();
        let AnyRequest::MatchFailed(request) = &slot.request else {
            return Err(self.rejection(slot.request.stage(), "retry_matching"));
        };
        let next = request.clone().retry_matching();
        let snapshot = self.commit(&mut slot, next.into());
        self.launch_matching(&mut slot);
        Ok(snapshot)
    }

    #[tracing::instrument(skip(self), fields(request_id = %self.inner.id))]
    pub async fn complete_service(&self) -> Result<Snapshot> {
        let _operation = self.inner.operations.lock().await;
        let mut slot = self.inner.slot.lock();
        let AnyRequest::LiveTracking(request) = &slot.request else {
            return Err(self.rejection(slot.request.stage(), "complete_service"));
        };
        let next = request.clone().complete();
        Ok(self.commit(&mut slot, next.into()))
    }

    /// Cancel the request.
    ///
    /// Returns `Ok(true)` when this call cancelled it and `Ok(false)` when it
    /// was already cancelled. Does not wait for outstanding operations: they
    /// are interrupted and report [`DispatchError::RequestCancelled`].
    pub fn cancel(&self) -> Result<bool> {
        self.cancel_with(CancellationReason::User)
    }

    pub(crate) fn cancel_with(&self, reason: CancellationReason) -> Result<bool> {
        let mut slot = self.inner.slot.lock();
        if slot.request.stage() == Stage::Cancelled {
            tracing::debug!(request_id = %self.inner.id, "Request already cancelled");
            return Ok(false);
        }
        match slot.request.clone().cancel(reason) {
            Ok(cancelled) => {
                self.inner.cancellation.cancel();
                self.commit(&mut slot, cancelled.into());
                Ok(true)
            }
            Err(request) => Err(DispatchError::AlreadyTerminal {
                request_id: self.inner.id,
                stage: request.stage(),
            }),
        }
    }

    /// Apply the outcome of matching run `match_run`.
    ///
    /// Dropped when the session was cancelled in the meantime, or when the
    /// request has since moved on to a different run.
    pub(crate) fn on_match_resolved(&self, match_run: u32, result: Result<Provider>) {
        let mut slot = self.inner.slot.lock();
        if self.inner.cancellation.is_cancelled() {
            tracing::debug!(request_id = %self.inner.id, "Ignoring match result for finished session");
            return;
        }
        let next: AnyRequest = {
            let AnyRequest::ProviderMatch(request) = &slot.request else {
                tracing::debug!(
                    request_id = %self.inner.id,
                    stage = %slot.request.stage(),
                    "Ignoring match result outside ProviderMatch"
                );
                return;
            };
            if request.state.match_run != match_run {
                tracing::debug!(
                    request_id = %self.inner.id,
                    current_run = request.state.match_run,
                    stale_run = match_run,
                    "Ignoring stale match result"
                );
                return;
            }
            match result {
                Ok(provider) => request.clone().provider_matched(provider).into(),
                Err(e) => {
                    tracing::warn!(request_id = %self.inner.id, error = %e, "Matching failed");
                    request.clone().match_failed().into()
                }
            }
        };

        // May be the matching task itself calling in, so only signal it
        if let Some(matching) = slot.matching.take() {
            matching.token.cancel();
        }
        self.commit(&mut slot, next);

        if slot.request.stage() == Stage::LiveTracking
            && self.inner.variant == Variant::LowBattery
            && !slot.contact_notified
        {
            slot.contact_notified = true;
            self.notify_emergency_contact(&slot.request);
        }
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Register an observer. It first receives the current snapshot, then
    /// every broadcast transition in order. Ends after the terminal snapshot.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(Snapshot) + Send + 'static,
    {
        let mut slot = self.inner.slot.lock();
        let (replay, closed) = self.replay(&slot);
        slot.subscribers.add_callback(callback, replay, closed)
    }

    /// Stream flavour of [`Controller::subscribe`].
    pub fn updates(&self) -> (SubscriptionId, UnboundedReceiverStream<Snapshot>) {
        let mut slot = self.inner.slot.lock();
        let (replay, closed) = self.replay(&slot);
        slot.subscribers.add_stream(replay, closed)
    }

    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        self.inner.slot.lock().subscribers.remove(subscription)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.slot.lock().subscribers.len()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn replay(&self, slot: &Slot) -> (Option<Snapshot>, bool) {
        let snapshot = Snapshot::capture(&slot.request, self.inner.variant, slot.sequence);
        let closed = snapshot.stage.is_terminal();
        let replay = self
            .inner
            .variant
            .broadcasts(snapshot.stage, true)
            .then_some(snapshot);
        (replay, closed)
    }

    fn rejection(&self, stage: Stage, operation: &'static str) -> DispatchError {
        tracing::debug!(request_id = %self.inner.id, stage = %stage, operation, "Operation rejected");
        if stage.is_terminal() {
            DispatchError::AlreadyTerminal {
                request_id: self.inner.id,
                stage,
            }
        } else {
            DispatchError::InvalidTransition {
                request_id: self.inner.id,
                stage,
                operation,
            }
        }
    }

    fn expect_stage(&self, expected: Stage, operation: &'static str) -> Result<()> {
        let stage = self.stage();
        if stage == expected {
            Ok(())
        } else {
            Err(self.rejection(stage, operation))
        }
    }

    /// Swap in the successor, publish, and finish the session if terminal.
    fn commit(&self, slot: &mut Slot, next: AnyRequest) -> Snapshot {
        let from = slot.request.stage();
        slot.request = next;
        slot.sequence += 1;

        let stage = slot.request.stage();
        tracing::info!(
            request_id = %self.inner.id,
            variant = %self.inner.variant,
            from = %from,
            to = %stage,
            sequence = slot.sequence,
            "Stage transition"
        );

        let snapshot = Snapshot::capture(&slot.request, self.inner.variant, slot.sequence);
        if self.inner.variant.broadcasts(stage, false) {
            slot.subscribers.publish(&snapshot);
        } else {
            tracing::trace!(request_id = %self.inner.id, stage = %stage, "Broadcast suppressed");
        }

        if stage.is_terminal() {
            self.finish(slot, stage);
        }
        snapshot
    }

    fn finish(&self, slot: &mut Slot, stage: Stage) {
        self.inner.cancellation.cancel();
        if let Some(matching) = slot.matching.take() {
            matching.stop();
        }
        slot.subscribers.close();
        counter!("roadside_sessions_total", "outcome" => stage.as_str()).increment(1);
        tracing::info!(request_id = %self.inner.id, outcome = %stage, "Dispatch session finished");
        if let Some(hook) = slot.on_terminal.take() {
            hook(self.inner.id);
        }
    }

    /// Spawn a matching run if the request is in `ProviderMatch`.
    fn launch_matching(&self, slot: &mut Slot) {
        let AnyRequest::ProviderMatch(request) = &slot.request else {
            return;
        };
        let match_run = request.state.match_run;
        let token = self.inner.cancellation.child_token();
        let process = MatchingProcess::new(
            self.inner.collaborators.directory.clone(),
            self.inner.collaborators.clock.clone(),
            self.inner.matching_config,
            ServiceRequest::from(&slot.request),
            request.state.location.clone(),
            request.state.service_kind,
            token.clone(),
        );

        let controller = self.clone();
        let in_flight = self.inner.matching_in_flight.clone();
        in_flight.fetch_add(1, Ordering::Relaxed);
        // Dropped with the future, even when aborted before its first poll
        let in_flight = scopeguard::guard(in_flight, |in_flight| {
            in_flight.fetch_sub(1, Ordering::Relaxed);
        });
        let task = tokio::spawn(async move {
            let _in_flight = in_flight;
            let report = process.run().await;
            let result = match report.result {
                MatchResult::Matched(provider) => Ok(provider),
                MatchResult::Exhausted => Err(DispatchError::MatchExhausted(controller.id())),
                MatchResult::Cancelled => return,
            };
            controller.on_match_resolved(match_run, result);
        });

        if let Some(previous) = slot.matching.replace(MatchingHandle { token, task }) {
            previous.stop();
        }
    }

    fn notify_emergency_contact(&self, request: &AnyRequest) {
        let Some(contact) = self.inner.signals.emergency_contact.clone() else {
            tracing::warn!(
                request_id = %self.inner.id,
                "Low-battery request matched but no emergency contact was supplied"
            );
            return;
        };
        let Some(provider) = request.matched_provider() else {
            return;
        };
        let message = dispatched_message(&ServiceRequest::from(request), provider);
        let notifier = self.inner.collaborators.notifier.clone();
        let request_id = self.inner.id;
        tokio::spawn(async move {
            match notifier.notify(&contact, &message).await {
                Ok(()) => {
                    tracing::info!(request_id = %request_id, contact = %contact, "Emergency contact notified")
                }
                Err(e) => {
                    tracing::warn!(request_id = %request_id, error = %e, "Emergency contact notification failed")
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MockDirectory;
    use crate::domain::provider::ProviderId;
    use crate::geocoder::MockGeocoder;

    fn provider(id: &str) -> Provider {
        Provider {
            id: ProviderId::from(id),
            name: "Jo".to_string(),
            vehicle_description: "Tow truck".to_string(),
            rating: 4.2,
            review_count: 8,
            verified: false,
            company_name: "Independent".to_string(),
        }
    }

    /// Fast-tracked controller searching an empty directory.
    fn searching() -> Controller {
        let collaborators = Collaborators::new(
            Arc::new(MockGeocoder::new()),
            Arc::new(MockDirectory::new()),
        );
        Controller::launch(
            RequestData::new().with_position(Coordinate::new(51.5, -0.12)),
            DeviceSignals::default().silent(),
            Variant::Silent,
            collaborators,
            &DispatchConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_match_run_is_ignored() {
        let controller = searching();
        controller.on_match_resolved(2, Ok(provider("stale")));
        assert_eq!(controller.stage(), Stage::ProviderMatch);
        assert_eq!(controller.snapshot().sequence, 0);

        controller.on_match_resolved(1, Ok(provider("current")));
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.stage, Stage::LiveTracking);
        assert_eq!(
            snapshot.request.matched_provider.map(|p| p.id),
            Some(ProviderId::from("current"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_after_cancel_is_ignored() {
        let controller = searching();
        assert!(controller.cancel().unwrap());
        controller.on_match_resolved(1, Ok(provider("late")));
        controller.on_match_resolved(1, Err(DispatchError::MatchExhausted(controller.id())));

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.stage, Stage::Cancelled);
        assert!(snapshot.request.matched_provider.is_none());
        assert_eq!(snapshot.sequence, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_moves_to_match_failed() {
        let controller = searching();
        controller.on_match_resolved(1, Err(DispatchError::MatchExhausted(controller.id())));
        assert_eq!(controller.stage(), Stage::MatchFailed);
        assert!(controller.snapshot().request.pricing.is_some());
        controller.cancel().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_matching_task_runs_releases_in_flight_count() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let controller = Controller::new(
            RequestData::new().with_position(Coordinate::new(51.5, -0.12)),
            DeviceSignals::default().silent(),
            Variant::Silent,
            Collaborators::new(
                Arc::new(MockGeocoder::new()),
                Arc::new(MockDirectory::new()),
            ),
            &DispatchConfig::default(),
            &CancellationToken::new(),
            in_flight.clone(),
        )
        .unwrap();

        controller.start();
        assert_eq!(in_flight.load(Ordering::Relaxed), 1);

        // No await in between: the matching task is aborted before its first poll
        assert!(controller.cancel().unwrap());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(in_flight.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_request_cannot_be_cancelled() {
        let controller = searching();
        controller.on_match_resolved(1, Ok(provider("p")));
        controller.complete_service().await.unwrap();

        assert!(matches!(
            controller.cancel(),
            Err(DispatchError::AlreadyTerminal {
                stage: Stage::Completed,
                ..
            })
        ));
    }
}
