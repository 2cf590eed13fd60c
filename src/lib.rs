//! Dispatch and matching engine for roadside-assistance requests.
//!
//! A [`Registry`] owns one [`Controller`] per active request. The controller
//! drives the request through its lifecycle (service selection, location
//! confirmation, pricing, provider matching, live tracking, completion),
//! publishes a [`Snapshot`] to subscribers after every transition, and can
//! cancel the request from any non-terminal stage.
//!
//! Emergency signals (low battery, silent request) fast-track a request
//! straight into provider matching.
//!
//! External services are injected as trait objects through
//! [`Collaborators`]: a [`Geocoder`], a [`ProviderDirectory`], a
//! [`PricingCalculator`], a [`Notifier`] and a [`Clock`].

pub mod clock;
pub mod controller;
pub mod directory;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod escalation;
pub mod geocoder;
pub mod matching;
pub mod notifier;
pub mod pricing;
pub mod request;

// Re-export commonly used types
pub use clock::{Clock, TimerHandle, TokioClock};
pub use controller::{Collaborators, Controller, Snapshot, SubscriptionId};
pub use directory::{
    MockDirectory, MockDirectoryCall, MockOffer, OfferResponse, ProviderDirectory, RosterDirectory,
    RosterEntry,
};
pub use dispatch::{DispatchConfig, Registry, RegistryStats, SessionSummary};
pub use domain::provider::{
    AttemptOutcome, Candidate, MatchAttempt, Provider, ProviderId, rank_candidates,
};
pub use error::{DispatchError, Result};
pub use escalation::{DeviceSignals, EscalationPolicy, Variant, select_variant};
pub use geocoder::{CoordinateGeocoder, Geocoder, MockGeocoder};
pub use matching::{MatchReport, MatchResult, MatchingConfig, MatchingProcess};
pub use notifier::{ContactRef, LogNotifier, MockNotifier, Notifier};
pub use pricing::{PricingCalculator, Rate, RateCard};
pub use request::*;
