//! Stage transitions for service requests using the typestate pattern.
//!
//! Each lifecycle stage is a distinct type parameter on `Request<State>`, and
//! each transition consumes the request and returns the next stage's type:
//!
//! ```text
//! Request<ServiceSelection> ──select_service()──> Request<LocationConfirm>
//!        │                                               │
//!        └──fast_track()──┐                    confirm_location()
//!                         │                              ▼
//!                         │                      Request<PricingPreview>
//!                         │                              │
//!                         │                       confirm_pricing()
//!                         ▼                              ▼
//!                    Request<ProviderMatch> <──retry_matching()── Request<MatchFailed>
//!                         │         └────────match_failed()──────────────^
//!                  provider_matched()
//!                         ▼
//!                  Request<LiveTracking> ──complete()──> Request<Completed>
//!
//! AnyRequest (non-terminal) ──cancel()──> Request<Cancelled>
//! ```
//!
//! Transitions never fail: anything that could fail (geocoding, pricing) has
//! already produced its value before the transition is called, so a request is
//! either fully advanced or left untouched.

use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};

use super::state::{
    AnyRequest, Cancelled, Completed, Entry, LiveTracking, Location, LocationConfirm, MatchFailed,
    Pricing, PricingPreview, ProviderMatch, Request, ServiceKind, ServiceSelection, Stage, Vehicle,
};
use crate::domain::provider::Provider;

/// Reason for cancelling a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancellationReason {
    /// The user (or the presentation layer on their behalf) cancelled.
    User,
    /// The registry is shutting down.
    Shutdown,
}

fn record_transition(to: Stage) {
    counter!("roadside_transitions_total", "stage" => to.as_str()).increment(1);
}

impl Request<ServiceSelection> {
    /// Start a request in its initial stage.
    pub fn new(data: super::state::RequestData) -> Self {
        Request {
            data,
            state: ServiceSelection {},
        }
    }

    pub fn select_service(self, service_kind: ServiceKind) -> Request<LocationConfirm> {
        record_transition(Stage::LocationConfirm);
        Request {
            data: self.data,
            state: LocationConfirm { service_kind },
        }
    }

    /// Jump straight to `ProviderMatch`, skipping selection, location and
    /// pricing confirmation.
    pub fn fast_track(
        self,
        service_kind: ServiceKind,
        location: Location,
        pricing: Pricing,
    ) -> Request<ProviderMatch> {
        record_transition(Stage::ProviderMatch);
        Request {
            data: self.data,
            state: ProviderMatch {
                service_kind,
                location,
                pricing,
                entry: Entry::FastTrack,
                match_run: 1,
                searching_since: Utc::now(),
            },
        }
    }
}

impl Request<LocationConfirm> {
    /// Record the confirmed location. A supplied vehicle or note replaces the
    /// one given at creation; `None` keeps it.
    pub fn confirm_location(
        self,
        location: Location,
        vehicle: Option<Vehicle>,
        notes: Option<String>,
    ) -> Request<PricingPreview> {
        record_transition(Stage::PricingPreview);
        let mut data = self.data;
        if vehicle.is_some() {
            data.vehicle = vehicle;
        }
        if notes.is_some() {
            data.notes = notes;
        }
        Request {
            data,
            state: PricingPreview {
                service_kind: self.state.service_kind,
                location,
            },
        }
    }
}

impl Request<PricingPreview> {
    pub fn confirm_pricing(self, pricing: Pricing) -> Request<ProviderMatch> {
        record_transition(Stage::ProviderMatch);
        Request {
            data: self.data,
            state: ProviderMatch {
                service_kind: self.state.service_kind,
                location: self.state.location,
                pricing,
                entry: Entry::Standard,
                match_run: 1,
                searching_since: Utc::now(),
            },
        }
    }
}

impl Request<ProviderMatch> {
    pub fn provider_matched(self, provider: Provider) -> Request<LiveTracking> {
        record_transition(Stage::LiveTracking);
        Request {
            data: self.data,
            state: LiveTracking {
                service_kind: self.state.service_kind,
                location: self.state.location,
                pricing: self.state.pricing,
                provider,
                matched_at: Utc::now(),
            },
        }
    }

    pub fn match_failed(self) -> Request<MatchFailed> {
        record_transition(Stage::MatchFailed);
        Request {
            data: self.data,
            state: MatchFailed {
                service_kind: self.state.service_kind,
                location: self.state.location,
                pricing: self.state.pricing,
                entry: self.state.entry,
                match_run: self.state.match_run,
                failed_at: Utc::now(),
            },
        }
    }
}

impl Request<MatchFailed> {
    /// Go back to searching; pricing and location are kept.
    pub fn retry_matching(self) -> Request<ProviderMatch> {
        record_transition(Stage::ProviderMatch);
        Request {
            data: self.data,
            state: ProviderMatch {
                service_kind: self.state.service_kind,
                location: self.state.location,
                pricing: self.state.pricing,
                entry: self.state.entry,
                match_run: self.state.match_run + 1,
                searching_since: Utc::now(),
            },
        }
    }
}

impl Request<LiveTracking> {
    pub fn complete(self) -> Request<Completed> {
        record_transition(Stage::Completed);
        Request {
            data: self.data,
            state: Completed {
                service_kind: self.state.service_kind,
                location: self.state.location,
                pricing: self.state.pricing,
                provider: self.state.provider,
                matched_at: self.state.matched_at,
                completed_at: Utc::now(),
            },
        }
    }
}

impl AnyRequest {
    /// Cancel from any non-terminal stage.
    ///
    /// Everything the request had reached (kind, location, pricing, provider)
    /// is kept on the cancelled record. Terminal requests are handed back
    /// unchanged.
    pub fn cancel(
        self,
        reason: CancellationReason,
    ) -> std::result::Result<Request<Cancelled>, Box<Self>> {
        if self.is_terminal() {
            return Err(Box::new(self));
        }

        let state = Cancelled {
            reason,
            cancelled_from: self.stage(),
            cancelled_at: Utc::now(),
            service_kind: self.service_kind(),
            location: self.location().cloned(),
            pricing: self.pricing().cloned(),
            provider: self.matched_provider().cloned(),
        };
        let data = self.data().clone();

        record_transition(Stage::Cancelled);
        Ok(Request { data, state })
    }
}
