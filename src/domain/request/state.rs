//! Core types for the service request lifecycle.
//!
//! This module defines the type-safe request lifecycle using the typestate pattern.
//! Each request progresses through distinct stages, and the data a stage owns
//! (service kind, confirmed location, pricing, matched provider) lives on the
//! stage type itself, so a request can never carry pricing it has not reached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::provider::Provider;
use crate::domain::request::transitions::CancellationReason;
use crate::error::{DispatchError, Result};

/// Named position in the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    ServiceSelection,
    LocationConfirm,
    PricingPreview,
    ProviderMatch,
    /// Sub-state of `ProviderMatch` entered when matching is exhausted.
    MatchFailed,
    LiveTracking,
    Completed,
    Cancelled,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ServiceSelection => "ServiceSelection",
            Stage::LocationConfirm => "LocationConfirm",
            Stage::PricingPreview => "PricingPreview",
            Stage::ProviderMatch => "ProviderMatch",
            Stage::MatchFailed => "MatchFailed",
            Stage::LiveTracking => "LiveTracking",
            Stage::Completed => "Completed",
            Stage::Cancelled => "Cancelled",
        }
    }

    /// Completed and Cancelled accept no further operations.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Completed | Stage::Cancelled)
    }

    /// True for the stages at which pricing has been confirmed.
    pub fn has_pricing(&self) -> bool {
        matches!(
            self,
            Stage::ProviderMatch | Stage::MatchFailed | Stage::LiveTracking | Stage::Completed
        )
    }

    /// True for the stages at which a provider has accepted.
    pub fn has_provider(&self) -> bool {
        matches!(self, Stage::LiveTracking | Stage::Completed)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of help requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Tow,
    Jumpstart,
    Tire,
    Lockout,
    Fuel,
    Other,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Tow => "tow",
            ServiceKind::Jumpstart => "jumpstart",
            ServiceKind::Tire => "tire",
            ServiceKind::Lockout => "lockout",
            ServiceKind::Fuel => "fuel",
            ServiceKind::Other => "other",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Reject NaN, infinities and out-of-range degrees.
    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(DispatchError::Validation(format!(
                "latitude {} is outside [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(DispatchError::Validation(format!(
                "longitude {} is outside [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }

    /// Great-circle distance in kilometres (haversine).
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// A confirmed location: the coordinate plus the address shown to the user.
///
/// `address` is empty for FastTrack requests, whose device fix is accepted
/// without waiting on the geocoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub coordinate: Coordinate,
    pub address: Option<String>,
}

impl Location {
    pub fn with_address(coordinate: Coordinate, address: impl Into<String>) -> Self {
        Self {
            coordinate,
            address: Some(address.into()),
        }
    }

    pub fn device_fix(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            address: None,
        }
    }
}

/// Descriptive vehicle record supplied by the user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Vehicle {
    pub make: String,
    pub model: String,
    pub year: Option<u16>,
    pub plate: Option<String>,
}

/// Price band in whole dollars, rendered as `$55–$75`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub low: u32,
    pub high: u32,
}

impl std::fmt::Display for PriceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}\u{2013}${}", self.low, self.high)
    }
}

/// Quoted price and arrival estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub estimate: PriceRange,
    pub eta_minutes: u32,
}

/// Unique identifier for a service request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        RequestId(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        RequestId(uuid)
    }
}

impl std::ops::Deref for RequestId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Marker trait for valid request states.
pub trait RequestState: Send + Sync {}

/// A service request in a particular lifecycle stage.
///
/// The generic parameter `T` represents the current stage; transitions
/// consume the request and return the next stage's type.
#[derive(Debug, Clone, Serialize)]
pub struct Request<T: RequestState> {
    /// The current state of the request.
    pub state: T,
    /// Caller-supplied data, present in every stage.
    pub data: RequestData,
}

/// Caller-supplied data for a service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestData {
    /// Assigned at creation, immutable.
    pub id: RequestId,

    /// Kind chosen ahead of time; only FastTrack entry reads it (defaulting
    /// to `Other`), the standard flow sets the kind through `select_service`.
    pub preselected_kind: Option<ServiceKind>,

    /// Raw device position, if the client had one when the request was made.
    pub reported_position: Option<Coordinate>,

    pub vehicle: Option<Vehicle>,

    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl RequestData {
    pub fn new() -> Self {
        Self {
            id: RequestId::new(),
            preselected_kind: None,
            reported_position: None,
            vehicle: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_position(mut self, position: Coordinate) -> Self {
        self.reported_position = Some(position);
        self
    }

    pub fn with_vehicle(mut self, vehicle: Vehicle) -> Self {
        self.vehicle = Some(vehicle);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_preselected_kind(mut self, kind: ServiceKind) -> Self {
        self.preselected_kind = Some(kind);
        self
    }
}

impl Default for RequestData {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Request States
// ============================================================================

/// The user has not chosen a service yet.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSelection {}

impl RequestState for ServiceSelection {}

/// Service chosen, waiting for the location to be confirmed.
#[derive(Debug, Clone, Serialize)]
pub struct LocationConfirm {
    pub service_kind: ServiceKind,
}

impl RequestState for LocationConfirm {}

/// Location confirmed, quote shown but not yet accepted.
#[derive(Debug, Clone, Serialize)]
pub struct PricingPreview {
    pub service_kind: ServiceKind,
    pub location: Location,
}

impl RequestState for PricingPreview {}

/// How the request reached `ProviderMatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entry {
    /// Through service selection, location and pricing.
    Standard,
    /// Straight from initiation (emergency variants).
    FastTrack,
}

/// Pricing accepted, the matching process is searching.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderMatch {
    pub service_kind: ServiceKind,
    pub location: Location,
    pub pricing: Pricing,
    pub entry: Entry,
    /// Incremented each time matching is (re)started; 1 for the first run.
    pub match_run: u32,
    pub searching_since: DateTime<Utc>,
}

impl RequestState for ProviderMatch {}

/// Matching ran out of candidates or time; the caller may retry or cancel.
#[derive(Debug, Clone, Serialize)]
pub struct MatchFailed {
    pub service_kind: ServiceKind,
    pub location: Location,
    pub pricing: Pricing,
    pub entry: Entry,
    pub match_run: u32,
    pub failed_at: DateTime<Utc>,
}

impl RequestState for MatchFailed {}

/// A provider accepted and is on the way.
#[derive(Debug, Clone, Serialize)]
pub struct LiveTracking {
    pub service_kind: ServiceKind,
    pub location: Location,
    pub pricing: Pricing,
    pub provider: Provider,
    pub matched_at: DateTime<Utc>,
}

impl RequestState for LiveTracking {}

/// Service delivered.
#[derive(Debug, Clone, Serialize)]
pub struct Completed {
    pub service_kind: ServiceKind,
    pub location: Location,
    pub pricing: Pricing,
    pub provider: Provider,
    pub matched_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RequestState for Completed {}

/// Request was cancelled. Keeps whatever the request had reached.
#[derive(Debug, Clone, Serialize)]
pub struct Cancelled {
    pub reason: CancellationReason,
    pub cancelled_from: Stage,
    pub cancelled_at: DateTime<Utc>,
    pub service_kind: Option<ServiceKind>,
    pub location: Option<Location>,
    pub pricing: Option<Pricing>,
    pub provider: Option<Provider>,
}

impl RequestState for Cancelled {}

// ============================================================================
// Unified Request Representation
// ============================================================================

/// Enum that can hold a request in any stage.
///
/// Controllers hold their request as an `AnyRequest` and dispatch runtime
/// operations on its variant.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "stage", content = "request")]
pub enum AnyRequest {
    ServiceSelection(Request<ServiceSelection>),
    LocationConfirm(Request<LocationConfirm>),
    PricingPreview(Request<PricingPreview>),
    ProviderMatch(Request<ProviderMatch>),
    MatchFailed(Request<MatchFailed>),
    LiveTracking(Request<LiveTracking>),
    Completed(Request<Completed>),
    Cancelled(Request<Cancelled>),
}

impl AnyRequest {
    /// Get the request ID regardless of stage.
    pub fn id(&self) -> RequestId {
        self.data().id
    }

    /// Get the caller-supplied data regardless of stage.
    pub fn data(&self) -> &RequestData {
        match self {
            AnyRequest::ServiceSelection(r) => &r.data,
            AnyRequest::LocationConfirm(r) => &r.data,
            AnyRequest::PricingPreview(r) => &r.data,
            AnyRequest::ProviderMatch(r) => &r.data,
            AnyRequest::MatchFailed(r) => &r.data,
            AnyRequest::LiveTracking(r) => &r.data,
            AnyRequest::Completed(r) => &r.data,
            AnyRequest::Cancelled(r) => &r.data,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            AnyRequest::ServiceSelection(_) => Stage::ServiceSelection,
            AnyRequest::LocationConfirm(_) => Stage::LocationConfirm,
            AnyRequest::PricingPreview(_) => Stage::PricingPreview,
            AnyRequest::ProviderMatch(_) => Stage::ProviderMatch,
            AnyRequest::MatchFailed(_) => Stage::MatchFailed,
            AnyRequest::LiveTracking(_) => Stage::LiveTracking,
            AnyRequest::Completed(_) => Stage::Completed,
            AnyRequest::Cancelled(_) => Stage::Cancelled,
        }
    }

    /// Check if this request is in a terminal stage (Completed or Cancelled).
    pub fn is_terminal(&self) -> bool {
        self.stage().is_terminal()
    }

    pub fn service_kind(&self) -> Option<ServiceKind> {
        match self {
            AnyRequest::ServiceSelection(_) => None,
            AnyRequest::LocationConfirm(r) => Some(r.state.service_kind),
            AnyRequest::PricingPreview(r) => Some(r.state.service_kind),
            AnyRequest::ProviderMatch(r) => Some(r.state.service_kind),
            AnyRequest::MatchFailed(r) => Some(r.state.service_kind),
            AnyRequest::LiveTracking(r) => Some(r.state.service_kind),
            AnyRequest::Completed(r) => Some(r.state.service_kind),
            AnyRequest::Cancelled(r) => r.state.service_kind,
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            AnyRequest::ServiceSelection(_) | AnyRequest::LocationConfirm(_) => None,
            AnyRequest::PricingPreview(r) => Some(&r.state.location),
            AnyRequest::ProviderMatch(r) => Some(&r.state.location),
            AnyRequest::MatchFailed(r) => Some(&r.state.location),
            AnyRequest::LiveTracking(r) => Some(&r.state.location),
            AnyRequest::Completed(r) => Some(&r.state.location),
            AnyRequest::Cancelled(r) => r.state.location.as_ref(),
        }
    }

    pub fn pricing(&self) -> Option<&Pricing> {
        match self {
            AnyRequest::ServiceSelection(_)
            | AnyRequest::LocationConfirm(_)
            | AnyRequest::PricingPreview(_) => None,
            AnyRequest::ProviderMatch(r) => Some(&r.state.pricing),
            AnyRequest::MatchFailed(r) => Some(&r.state.pricing),
            AnyRequest::LiveTracking(r) => Some(&r.state.pricing),
            AnyRequest::Completed(r) => Some(&r.state.pricing),
            // Cancelled keeps what it reached on the typed state only
            AnyRequest::Cancelled(_) => None,
        }
    }

    pub fn matched_provider(&self) -> Option<&Provider> {
        match self {
            AnyRequest::LiveTracking(r) => Some(&r.state.provider),
            AnyRequest::Completed(r) => Some(&r.state.provider),
            _ => None,
        }
    }
}

// Conversion traits for going from typed Request to AnyRequest

impl From<Request<ServiceSelection>> for AnyRequest {
    fn from(r: Request<ServiceSelection>) -> Self {
        AnyRequest::ServiceSelection(r)
    }
}

impl From<Request<LocationConfirm>> for AnyRequest {
    fn from(r: Request<LocationConfirm>) -> Self {
        AnyRequest::LocationConfirm(r)
    }
}

impl From<Request<PricingPreview>> for AnyRequest {
    fn from(r: Request<PricingPreview>) -> Self {
        AnyRequest::PricingPreview(r)
    }
}

impl From<Request<ProviderMatch>> for AnyRequest {
    fn from(r: Request<ProviderMatch>) -> Self {
        AnyRequest::ProviderMatch(r)
    }
}

impl From<Request<MatchFailed>> for AnyRequest {
    fn from(r: Request<MatchFailed>) -> Self {
        AnyRequest::MatchFailed(r)
    }
}

impl From<Request<LiveTracking>> for AnyRequest {
    fn from(r: Request<LiveTracking>) -> Self {
        AnyRequest::LiveTracking(r)
    }
}

impl From<Request<Completed>> for AnyRequest {
    fn from(r: Request<Completed>) -> Self {
        AnyRequest::Completed(r)
    }
}

impl From<Request<Cancelled>> for AnyRequest {
    fn from(r: Request<Cancelled>) -> Self {
        AnyRequest::Cancelled(r)
    }
}

// ============================================================================
// Flat view
// ============================================================================

/// Flat, stage-independent view of a request, as handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceRequest {
    pub id: RequestId,
    pub stage: Stage,
    pub service_kind: Option<ServiceKind>,
    pub reported_position: Option<Coordinate>,
    pub location: Option<Location>,
    pub vehicle: Option<Vehicle>,
    pub notes: Option<String>,
    pub pricing: Option<Pricing>,
    pub matched_provider: Option<Provider>,
    pub created_at: DateTime<Utc>,
}

impl From<&AnyRequest> for ServiceRequest {
    fn from(request: &AnyRequest) -> Self {
        let data = request.data();
        ServiceRequest {
            id: data.id,
            stage: request.stage(),
            service_kind: request.service_kind(),
            reported_position: data.reported_position,
            location: request.location().cloned(),
            vehicle: data.vehicle.clone(),
            notes: data.notes.clone(),
            pricing: request.pricing().cloned(),
            matched_provider: request.matched_provider().cloned(),
            created_at: data.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_range_display_uses_en_dash() {
        let range = PriceRange { low: 55, high: 75 };
        assert_eq!(range.to_string(), "$55\u{2013}$75");
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(37.77, -122.42).validate().is_ok());
        assert!(Coordinate::new(91.0, 0.0).validate().is_err());
        assert!(Coordinate::new(0.0, -180.5).validate().is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).validate().is_err());
    }

    #[test]
    fn test_distance_is_symmetric_and_plausible() {
        let sf = Coordinate::new(37.7749, -122.4194);
        let oakland = Coordinate::new(37.8044, -122.2712);
        let d = sf.distance_km(&oakland);
        assert!((d - oakland.distance_km(&sf)).abs() < 1e-9);
        assert!(d > 12.0 && d < 15.0, "unexpected distance {d}");
    }

    #[test]
    fn test_request_id_display_is_short() {
        let id = RequestId::new();
        assert_eq!(id.to_string().len(), 8);
    }

    #[test]
    fn test_stage_tables() {
        assert!(!Stage::PricingPreview.has_pricing());
        assert!(Stage::MatchFailed.has_pricing());
        assert!(!Stage::MatchFailed.has_provider());
        assert!(Stage::Completed.has_provider());
        assert!(Stage::Cancelled.is_terminal());
        assert!(!Stage::LiveTracking.is_terminal());
    }
}
