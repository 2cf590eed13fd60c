use futures::StreamExt;
use futures::future::BoxFuture;
use roadside_dispatch::{
    AnyRequest, CancellationReason, Candidate, Clock, Collaborators, Controller, Coordinate,
    DeviceSignals, DispatchConfig, DispatchError, Location, MockDirectory, MockGeocoder,
    MockOffer, OfferResponse, PriceRange, Pricing, PricingCalculator, Provider, ProviderId,
    Registry, RequestData, ServiceKind, Snapshot, Stage, TokioClock, Vehicle,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn provider(id: &str, rating: f32) -> Provider {
    Provider {
        id: ProviderId::from(id),
        name: format!("Driver {id}"),
        vehicle_description: "Flatbed tow truck".to_string(),
        rating,
        review_count: 120,
        verified: true,
        company_name: "Metro Roadside".to_string(),
    }
}

fn candidate(id: &str, distance_km: f64) -> Candidate {
    Candidate {
        provider: provider(id, 4.5),
        distance_km,
    }
}

fn position() -> Coordinate {
    Coordinate::new(40.7128, -74.0060)
}

struct Harness {
    registry: Registry,
    geocoder: Arc<MockGeocoder>,
    directory: Arc<MockDirectory>,
}

fn harness(config: DispatchConfig) -> Harness {
    harness_with(config, |collaborators| collaborators)
}

fn harness_with(
    config: DispatchConfig,
    customize: impl FnOnce(Collaborators) -> Collaborators,
) -> Harness {
    let geocoder = Arc::new(MockGeocoder::new());
    let directory = Arc::new(MockDirectory::new());
    let collaborators = customize(Collaborators::new(geocoder.clone(), directory.clone()));
    Harness {
        registry: Registry::new(collaborators, config),
        geocoder,
        directory,
    }
}

/// Charges the same for everything.
struct FlatRate;

impl PricingCalculator for FlatRate {
    fn estimate(
        &self,
        _service_kind: ServiceKind,
        _location: &Location,
        _vehicle: Option<&Vehicle>,
    ) -> roadside_dispatch::Result<Pricing> {
        Ok(Pricing {
            estimate: PriceRange { low: 99, high: 99 },
            eta_minutes: 45,
        })
    }
}

/// Runs every delay ten times faster and records what was asked for.
#[derive(Default)]
struct FastClock {
    requested: parking_lot::Mutex<Vec<Duration>>,
}

impl Clock for FastClock {
    fn now(&self) -> Instant {
        TokioClock.now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.requested.lock().push(duration);
        TokioClock.sleep(duration / 10)
    }
}

async fn wait_for_stage(controller: &Controller, stage: Stage) {
    for _ in 0..10_000 {
        if controller.stage() == stage {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "request never reached {stage}, still in {}",
        controller.stage()
    );
}

/// Drive a standard request from initiation to `ProviderMatch`.
async fn to_provider_match(harness: &Harness, kind: ServiceKind) -> Controller {
    harness.geocoder.add_address("123 Main St");
    let controller = harness
        .registry
        .begin(RequestData::new(), DeviceSignals::default())
        .unwrap();
    controller.select_service(kind).await.unwrap();
    controller
        .confirm_location(position(), None, None)
        .await
        .unwrap();
    controller.confirm_pricing().await.unwrap();
    controller
}

fn assert_consistent(snapshot: &Snapshot) {
    let request = &snapshot.request;
    assert_eq!(
        request.pricing.is_some(),
        snapshot.stage.has_pricing(),
        "pricing presence wrong in {}",
        snapshot.stage
    );
    assert_eq!(
        request.matched_provider.is_some(),
        snapshot.stage.has_provider(),
        "provider presence wrong in {}",
        snapshot.stage
    );
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_tire_request_reaches_provider_match_with_rate_card_pricing() {
    let harness = harness(DispatchConfig::default());
    harness.geocoder.add_address("123 Main St");

    let controller = harness
        .registry
        .begin(RequestData::new(), DeviceSignals::default())
        .unwrap();
    assert_eq!(controller.stage(), Stage::ServiceSelection);

    let snapshot = controller.select_service(ServiceKind::Tire).await.unwrap();
    assert_eq!(snapshot.stage, Stage::LocationConfirm);
    assert_consistent(&snapshot);

    let snapshot = controller
        .confirm_location(
            position(),
            Some(Vehicle {
                make: "Honda".to_string(),
                model: "Civic".to_string(),
                year: Some(2019),
                plate: Some("KXR-2291".to_string()),
            }),
            Some("Rear driver side".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(snapshot.stage, Stage::PricingPreview);
    let location = snapshot.request.location.clone().unwrap();
    assert_eq!(location.address.as_deref(), Some("123 Main St"));
    assert_eq!(location.coordinate, position());
    assert_eq!(snapshot.request.notes.as_deref(), Some("Rear driver side"));
    assert_consistent(&snapshot);

    let snapshot = controller.confirm_pricing().await.unwrap();
    assert_eq!(snapshot.stage, Stage::ProviderMatch);
    let pricing = snapshot.request.pricing.clone().unwrap();
    assert_eq!(pricing.estimate, PriceRange { low: 55, high: 75 });
    assert_eq!(pricing.estimate.to_string(), "$55–$75");
    assert_eq!(pricing.eta_minutes, 10);
    assert_consistent(&snapshot);

    let snapshot = harness.registry.get(controller.id()).unwrap();
    assert_eq!(snapshot.stage, Stage::ProviderMatch);
    assert!(harness.registry.cancel(controller.id()).unwrap());
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_third_candidate_accepts_after_two_declines() {
    let harness = harness(DispatchConfig::default());
    harness.directory.set_candidates(vec![
        candidate("first", 1.0),
        candidate("second", 2.0),
        candidate("third", 3.0),
    ]);
    harness
        .directory
        .add_offer_response(&ProviderId::from("first"), MockOffer::Decline);
    harness.directory.add_offer_response(
        &ProviderId::from("second"),
        MockOffer::DeclineAfter(Duration::from_secs(5)),
    );
    harness
        .directory
        .add_offer_response(&ProviderId::from("third"), MockOffer::Accept);

    let controller = to_provider_match(&harness, ServiceKind::Tow).await;
    wait_for_stage(&controller, Stage::LiveTracking).await;

    let snapshot = controller.snapshot();
    assert_consistent(&snapshot);
    assert_eq!(
        snapshot.request.matched_provider.unwrap().id,
        ProviderId::from("third")
    );
    assert_eq!(
        harness.directory.offered(),
        vec![
            ProviderId::from("first"),
            ProviderId::from("second"),
            ProviderId::from("third"),
        ]
    );

    let snapshot = controller.complete_service().await.unwrap();
    assert_eq!(snapshot.stage, Stage::Completed);
    assert_consistent(&snapshot);
    assert_eq!(harness.registry.active_sessions(), 0);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_second_begin_for_same_request_is_rejected() {
    let harness = harness(DispatchConfig::default());
    let data = RequestData::new();

    let controller = harness
        .registry
        .begin(data.clone(), DeviceSignals::default())
        .unwrap();
    let duplicate = harness.registry.begin(data.clone(), DeviceSignals::default());
    assert!(matches!(
        duplicate,
        Err(DispatchError::DuplicateSession(id)) if id == data.id
    ));
    assert_eq!(harness.registry.active_sessions(), 1);

    // Once the first session is over the id is free again
    controller.cancel().unwrap();
    let again = harness
        .registry
        .begin(data, DeviceSignals::default())
        .unwrap();
    assert_eq!(again.stage(), Stage::ServiceSelection);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_geocoder_resolving_after_cancel_changes_nothing() {
    let harness = harness(DispatchConfig::default());
    let trigger = harness
        .geocoder
        .add_response_with_trigger(Ok(Location::with_address(position(), "9 Late Ave")));

    let controller = harness
        .registry
        .begin(RequestData::new(), DeviceSignals::default())
        .unwrap();
    controller.select_service(ServiceKind::Lockout).await.unwrap();

    let (_, updates) = controller.updates();
    let pending = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.confirm_location(position(), None, None).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.geocoder.call_count(), 1);

    assert!(controller.cancel().unwrap());
    let _ = trigger.send(());

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(DispatchError::RequestCancelled(_))));
    assert_eq!(controller.stage(), Stage::Cancelled);
    assert!(controller.snapshot().request.location.is_none());

    let stages: Vec<Stage> = updates.map(|s| s.stage).collect().await;
    assert_eq!(stages, vec![Stage::LocationConfirm, Stage::Cancelled]);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_offer_accepted_after_cancel_changes_nothing() {
    let harness = harness(DispatchConfig::default());
    harness.directory.set_candidates(vec![candidate("slow", 0.5)]);
    let trigger = harness
        .directory
        .add_offer_response_with_trigger(&ProviderId::from("slow"), OfferResponse::Accepted);

    let controller = to_provider_match(&harness, ServiceKind::Jumpstart).await;
    let (_, updates) = controller.updates();

    for _ in 0..100 {
        if !harness.directory.offered().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(harness.directory.offered(), vec![ProviderId::from("slow")]);

    assert!(controller.cancel().unwrap());
    let _ = trigger.send(());
    tokio::time::sleep(Duration::from_secs(30)).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.stage, Stage::Cancelled);
    assert!(snapshot.request.matched_provider.is_none());

    let stages: Vec<Stage> = updates.map(|s| s.stage).collect().await;
    assert_eq!(stages, vec![Stage::ProviderMatch, Stage::Cancelled]);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_matching_fails_exactly_at_deadline_then_retries() {
    let harness = harness(DispatchConfig {
        match_deadline_ms: 30_000,
        ..Default::default()
    });
    harness
        .directory
        .set_candidates(vec![candidate("a", 1.0), candidate("b", 2.0)]);
    harness.directory.set_default_offer(OfferResponse::Declined);

    let controller = to_provider_match(&harness, ServiceKind::Fuel).await;
    let started = Instant::now();
    let (_, mut updates) = controller.updates();

    while let Some(snapshot) = updates.next().await {
        if snapshot.stage == Stage::MatchFailed {
            assert_consistent(&snapshot);
            break;
        }
    }
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(30), "failed early: {elapsed:?}");
    assert!(
        elapsed < Duration::from_secs(30) + Duration::from_millis(50),
        "failed late: {elapsed:?}"
    );

    let snapshot = controller.retry_matching().await.unwrap();
    assert_eq!(snapshot.stage, Stage::ProviderMatch);
    let AnyRequest::ProviderMatch(request) = controller.request() else {
        panic!("expected ProviderMatch");
    };
    assert_eq!(request.state.match_run, 2);
    assert!(controller.cancel().unwrap());
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_repeated_cancel_transitions_once() {
    let harness = harness(DispatchConfig::default());
    let controller = harness
        .registry
        .begin(RequestData::new(), DeviceSignals::default())
        .unwrap();
    let (_, updates) = controller.updates();

    let results: Vec<bool> = (0..5).map(|_| controller.cancel().unwrap()).collect();
    assert_eq!(results, vec![true, false, false, false, false]);

    let stages: Vec<Stage> = updates.map(|s| s.stage).collect().await;
    assert_eq!(stages, vec![Stage::ServiceSelection, Stage::Cancelled]);

    let AnyRequest::Cancelled(request) = controller.request() else {
        panic!("expected Cancelled");
    };
    assert_eq!(request.state.reason, CancellationReason::User);
    assert_eq!(request.state.cancelled_from, Stage::ServiceSelection);

    assert!(matches!(
        controller.complete_service().await,
        Err(DispatchError::AlreadyTerminal { stage: Stage::Cancelled, .. })
    ));
    assert!(matches!(
        harness.registry.get(controller.id()),
        Err(DispatchError::NotFound(_))
    ));
    assert_eq!(harness.registry.active_sessions(), 0);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_operation_in_wrong_stage_leaves_request_untouched() {
    let harness = harness(DispatchConfig::default());
    let controller = harness
        .registry
        .begin(RequestData::new(), DeviceSignals::default())
        .unwrap();
    let before = controller.snapshot();

    let error = controller.confirm_pricing().await.unwrap_err();
    assert!(matches!(
        error,
        DispatchError::InvalidTransition {
            stage: Stage::ServiceSelection,
            operation: "confirm_pricing",
            ..
        }
    ));
    assert!(!error.is_retryable());

    let after = controller.snapshot();
    assert_eq!(after.stage, before.stage);
    assert_eq!(after.sequence, before.sequence);
    assert_eq!(after.request, before.request);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_geocoder_timeout_keeps_location_confirm_and_allows_retry() {
    let harness = harness(DispatchConfig::default());
    harness.geocoder.add_hang();

    let controller = harness
        .registry
        .begin(RequestData::new(), DeviceSignals::default())
        .unwrap();
    controller.select_service(ServiceKind::Tow).await.unwrap();

    let started = Instant::now();
    let error = controller
        .confirm_location(position(), None, None)
        .await
        .unwrap_err();
    assert!(matches!(error, DispatchError::GeocodeTimeout(_)));
    assert!(error.is_retryable());
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_millis(10_050));
    assert_eq!(controller.stage(), Stage::LocationConfirm);

    harness.geocoder.add_address("Exit 14 on-ramp");
    let snapshot = controller
        .confirm_location(position(), None, None)
        .await
        .unwrap();
    assert_eq!(snapshot.stage, Stage::PricingPreview);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_unresolvable_and_invalid_positions_are_rejected() {
    let harness = harness(DispatchConfig::default());
    let controller = harness
        .registry
        .begin(RequestData::new(), DeviceSignals::default())
        .unwrap();
    controller.select_service(ServiceKind::Tire).await.unwrap();

    // No response configured: the mock reports the position as unresolvable
    let error = controller
        .confirm_location(position(), None, None)
        .await
        .unwrap_err();
    assert!(matches!(error, DispatchError::Unresolvable(_)));
    assert_eq!(controller.stage(), Stage::LocationConfirm);

    let error = controller
        .confirm_location(Coordinate::new(123.0, 0.0), None, None)
        .await
        .unwrap_err();
    assert!(matches!(error, DispatchError::Validation(_)));
    assert_eq!(harness.geocoder.call_count(), 1);
    assert_eq!(controller.stage(), Stage::LocationConfirm);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_subscribers_see_every_transition_in_order() {
    let harness = harness(DispatchConfig::default());
    harness.geocoder.add_address("500 Harbor Blvd");
    harness.directory.set_candidates(vec![candidate("near", 0.8)]);
    harness.directory.set_default_offer(OfferResponse::Accepted);

    let controller = harness
        .registry
        .begin(RequestData::new(), DeviceSignals::default())
        .unwrap();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = seen.clone();
    harness
        .registry
        .subscribe(controller.id(), move |snapshot: Snapshot| {
            sink.lock().push((snapshot.sequence, snapshot.stage))
        })
        .unwrap();

    controller.select_service(ServiceKind::Tire).await.unwrap();
    controller
        .confirm_location(position(), None, None)
        .await
        .unwrap();
    controller.confirm_pricing().await.unwrap();
    wait_for_stage(&controller, Stage::LiveTracking).await;
    controller.complete_service().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(
        *seen.lock(),
        vec![
            (0, Stage::ServiceSelection),
            (1, Stage::LocationConfirm),
            (2, Stage::PricingPreview),
            (3, Stage::ProviderMatch),
            (4, Stage::LiveTracking),
            (5, Stage::Completed),
        ]
    );
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_unsubscribed_observer_receives_nothing_more() {
    let harness = harness(DispatchConfig::default());
    let controller = harness
        .registry
        .begin(RequestData::new(), DeviceSignals::default())
        .unwrap();

    let (subscription, updates) = harness.registry.updates(controller.id()).unwrap();
    let removed = harness
        .registry
        .unsubscribe(controller.id(), subscription)
        .unwrap();
    assert!(removed);
    controller.select_service(ServiceKind::Other).await.unwrap();

    let stages: Vec<Stage> = updates.map(|s| s.stage).collect().await;
    assert_eq!(stages, vec![Stage::ServiceSelection]);
    assert_eq!(controller.subscriber_count(), 0);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_shutdown_cancels_every_session() {
    let harness = harness(DispatchConfig::default());
    let first = harness
        .registry
        .begin(RequestData::new(), DeviceSignals::default())
        .unwrap();
    let second = to_provider_match(&harness, ServiceKind::Tow).await;
    assert_eq!(harness.registry.list().len(), 2);
    assert_eq!(harness.registry.stats().matching_in_flight, 1);

    harness.registry.shutdown();

    for controller in [&first, &second] {
        let AnyRequest::Cancelled(request) = controller.request() else {
            panic!("expected Cancelled");
        };
        assert_eq!(request.state.reason, CancellationReason::Shutdown);
    }
    assert_eq!(harness.registry.active_sessions(), 0);
    assert!(matches!(
        harness
            .registry
            .begin(RequestData::new(), DeviceSignals::default()),
        Err(DispatchError::Shutdown)
    ));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(harness.registry.stats().matching_in_flight, 0);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_cancel_during_live_tracking_hides_pricing_and_provider() {
    let harness = harness(DispatchConfig::default());
    harness.directory.set_candidates(vec![candidate("close", 0.3)]);
    harness.directory.set_default_offer(OfferResponse::Accepted);

    let controller = harness
        .registry
        .begin(
            RequestData::new().with_position(position()),
            DeviceSignals::default().silent(),
        )
        .unwrap();
    wait_for_stage(&controller, Stage::LiveTracking).await;
    assert_consistent(&controller.snapshot());

    let (_, updates) = controller.updates();
    assert!(controller.cancel().unwrap());

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.stage, Stage::Cancelled);
    assert_consistent(&snapshot);
    let delivered: Vec<Snapshot> = updates.collect().await;
    assert_consistent(delivered.last().unwrap());

    // The typed record still remembers what the request had reached
    let AnyRequest::Cancelled(request) = controller.request() else {
        panic!("expected Cancelled");
    };
    assert_eq!(request.state.cancelled_from, Stage::LiveTracking);
    assert!(request.state.pricing.is_some());
    assert_eq!(
        request.state.provider.map(|p| p.id),
        Some(ProviderId::from("close"))
    );
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_candidate_query_resolving_after_cancel_changes_nothing() {
    let harness = harness(DispatchConfig::default());
    let trigger = harness
        .directory
        .add_query_response_with_trigger(Ok(vec![candidate("late", 1.0)]));
    harness.directory.set_default_offer(OfferResponse::Accepted);

    let controller = to_provider_match(&harness, ServiceKind::Tow).await;
    let (_, updates) = controller.updates();

    for _ in 0..100 {
        if harness.directory.query_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(harness.directory.query_count(), 1);

    assert!(controller.cancel().unwrap());
    let _ = trigger.send(());
    tokio::time::sleep(Duration::from_secs(30)).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.stage, Stage::Cancelled);
    assert!(snapshot.request.matched_provider.is_none());
    assert!(harness.directory.offered().is_empty());

    let stages: Vec<Stage> = updates.map(|s| s.stage).collect().await;
    assert_eq!(stages, vec![Stage::ProviderMatch, Stage::Cancelled]);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_injected_pricing_calculator_sets_the_quote() {
    let harness = harness_with(DispatchConfig::default(), |collaborators| {
        collaborators.with_pricing(Arc::new(FlatRate))
    });

    let controller = to_provider_match(&harness, ServiceKind::Lockout).await;
    let pricing = controller.snapshot().request.pricing.unwrap();
    assert_eq!(pricing.estimate, PriceRange { low: 99, high: 99 });
    assert_eq!(pricing.eta_minutes, 45);
    assert!(controller.cancel().unwrap());
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_geocoder_timeout_is_measured_by_injected_clock() {
    let clock = Arc::new(FastClock::default());
    let harness = harness_with(DispatchConfig::default(), {
        let clock = clock.clone();
        move |collaborators| collaborators.with_clock(clock)
    });
    harness.geocoder.add_hang();

    let controller = harness
        .registry
        .begin(RequestData::new(), DeviceSignals::default())
        .unwrap();
    controller.select_service(ServiceKind::Fuel).await.unwrap();

    let started = Instant::now();
    let error = controller
        .confirm_location(position(), None, None)
        .await
        .unwrap_err();
    assert!(matches!(error, DispatchError::GeocodeTimeout(_)));
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_secs(1) && elapsed < Duration::from_millis(1_050),
        "timed out after {elapsed:?}"
    );
    assert!(clock.requested.lock().contains(&Duration::from_secs(10)));
    assert_eq!(controller.stage(), Stage::LocationConfirm);
}
