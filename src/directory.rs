//! Provider directory abstraction.
//!
//! The directory yields candidates near a location and carries offers to
//! providers. The engine treats it as a stateless external service: it never
//! locks it and never mutates the provider records it returns.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::domain::provider::{Candidate, Provider, ProviderId};
use crate::error::{DispatchError, Result};
use crate::request::{Coordinate, Location, ServiceKind, ServiceRequest};

/// A provider's answer to an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferResponse {
    Accepted,
    Declined,
}

/// Trait for finding and contacting providers.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    /// Providers currently available for `service_kind` near `location`.
    ///
    /// The order of the returned list does not matter; the matching process
    /// ranks candidates itself.
    async fn find_candidates(
        &self,
        location: &Location,
        service_kind: ServiceKind,
    ) -> Result<Vec<Candidate>>;

    /// Offer the job to a provider and wait for the answer.
    ///
    /// The caller bounds this with the acceptance window; an implementation
    /// may simply never answer, which counts as a decline.
    async fn offer(&self, provider: &Provider, request: &ServiceRequest) -> Result<OfferResponse>;
}

// ============================================================================
// In-memory roster
// ============================================================================

/// A provider on the roster, with where it is and what it can do.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub provider: Provider,
    pub position: Coordinate,
    pub services: Vec<ServiceKind>,
    pub available: bool,
}

/// Directory over a fixed roster. Distances are great-circle distances from
/// the request location; an offer is accepted when the provider is still
/// available, and accepting takes the provider off the available list.
#[derive(Debug, Clone, Default)]
pub struct RosterDirectory {
    roster: Arc<Mutex<Vec<RosterEntry>>>,
    max_distance_km: Option<f64>,
}

impl RosterDirectory {
    pub fn new(roster: Vec<RosterEntry>) -> Self {
        Self {
            roster: Arc::new(Mutex::new(roster)),
            max_distance_km: None,
        }
    }

    /// Ignore providers farther away than `km`.
    pub fn with_max_distance_km(mut self, km: f64) -> Self {
        self.max_distance_km = Some(km);
        self
    }

    /// Put a provider back on (or take it off) the available list.
    pub fn set_available(&self, provider_id: &ProviderId, available: bool) {
        if let Some(entry) = self
            .roster
            .lock()
            .iter_mut()
            .find(|entry| &entry.provider.id == provider_id)
        {
            entry.available = available;
        }
    }
}

#[async_trait]
impl ProviderDirectory for RosterDirectory {
    async fn find_candidates(
        &self,
        location: &Location,
        service_kind: ServiceKind,
    ) -> Result<Vec<Candidate>> {
        let candidates: Vec<Candidate> = self
            .roster
            .lock()
            .iter()
            .filter(|entry| entry.available && entry.services.contains(&service_kind))
            .map(|entry| Candidate {
                provider: entry.provider.clone(),
                distance_km: entry.position.distance_km(&location.coordinate),
            })
            .filter(|candidate| {
                self.max_distance_km
                    .is_none_or(|max| candidate.distance_km <= max)
            })
            .collect();

        tracing::debug!(
            service_kind = %service_kind,
            candidates = candidates.len(),
            "Roster query"
        );
        Ok(candidates)
    }

    async fn offer(&self, provider: &Provider, request: &ServiceRequest) -> Result<OfferResponse> {
        let mut roster = self.roster.lock();
        let entry = roster
            .iter_mut()
            .find(|entry| entry.provider.id == provider.id)
            .ok_or_else(|| anyhow::anyhow!("provider {} is not on the roster", provider.id))?;

        if entry.available {
            entry.available = false;
            tracing::debug!(request_id = %request.id, provider_id = %provider.id, "Roster provider accepted");
            Ok(OfferResponse::Accepted)
        } else {
            Ok(OfferResponse::Declined)
        }
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

/// Scripted answer to an offer.
pub enum MockOffer {
    Accept,
    Decline,
    /// Accept after the given delay (measured on the tokio clock).
    AcceptAfter(Duration),
    DeclineAfter(Duration),
    /// Never answer; the acceptance window decides.
    Ignore,
    /// Return an error from `offer`.
    Fail(String),
    /// Answer once the paired sender fires (or is dropped).
    Triggered {
        response: OfferResponse,
        trigger: oneshot::Receiver<()>,
    },
}

enum MockQuery {
    Immediate(Result<Vec<Candidate>>),
    Triggered {
        response: Result<Vec<Candidate>>,
        trigger: oneshot::Receiver<()>,
    },
}

/// Record of a call made to the mock directory.
#[derive(Debug, Clone, PartialEq)]
pub enum MockDirectoryCall {
    FindCandidates { service_kind: ServiceKind },
    Offer { provider_id: ProviderId },
}

/// Mock directory for testing.
///
/// Queued query responses are used first, in FIFO order; once they run out
/// every query returns the default candidate list. Offers follow a per-provider
/// script, falling back to the default offer response.
#[derive(Clone)]
pub struct MockDirectory {
    queries: Arc<Mutex<VecDeque<MockQuery>>>,
    default_candidates: Arc<Mutex<Vec<Candidate>>>,
    offers: Arc<Mutex<HashMap<ProviderId, VecDeque<MockOffer>>>>,
    default_offer: Arc<Mutex<OfferResponse>>,
    calls: Arc<Mutex<Vec<MockDirectoryCall>>>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self {
            queries: Arc::new(Mutex::new(VecDeque::new())),
            default_candidates: Arc::new(Mutex::new(Vec::new())),
            offers: Arc::new(Mutex::new(HashMap::new())),
            default_offer: Arc::new(Mutex::new(OfferResponse::Declined)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Candidates returned by every query once queued responses run out.
    pub fn set_candidates(&self, candidates: Vec<Candidate>) {
        *self.default_candidates.lock() = candidates;
    }

    /// Queue a one-off query response.
    pub fn add_query_response(&self, response: Result<Vec<Candidate>>) {
        self.queries.lock().push_back(MockQuery::Immediate(response));
    }

    /// Queue a query response that waits for the returned trigger.
    pub fn add_query_response_with_trigger(
        &self,
        response: Result<Vec<Candidate>>,
    ) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.queries.lock().push_back(MockQuery::Triggered {
            response,
            trigger: rx,
        });
        tx
    }

    /// Queue the next answer for `provider_id`.
    pub fn add_offer_response(&self, provider_id: &ProviderId, offer: MockOffer) {
        self.offers
            .lock()
            .entry(provider_id.clone())
            .or_default()
            .push_back(offer);
    }

    /// Queue an answer that waits for the returned trigger.
    pub fn add_offer_response_with_trigger(
        &self,
        provider_id: &ProviderId,
        response: OfferResponse,
    ) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.add_offer_response(
            provider_id,
            MockOffer::Triggered {
                response,
                trigger: rx,
            },
        );
        tx
    }

    /// Answer used for providers without a scripted response.
    pub fn set_default_offer(&self, response: OfferResponse) {
        *self.default_offer.lock() = response;
    }

    pub fn get_calls(&self) -> Vec<MockDirectoryCall> {
        self.calls.lock().clone()
    }

    /// Provider ids offered the job, in order.
    pub fn offered(&self) -> Vec<ProviderId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                MockDirectoryCall::Offer { provider_id } => Some(provider_id.clone()),
                MockDirectoryCall::FindCandidates { .. } => None,
            })
            .collect()
    }

    pub fn query_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, MockDirectoryCall::FindCandidates { .. }))
            .count()
    }
}

impl Default for MockDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderDirectory for MockDirectory {
    async fn find_candidates(
        &self,
        _location: &Location,
        service_kind: ServiceKind,
    ) -> Result<Vec<Candidate>> {
        self.calls
            .lock()
            .push(MockDirectoryCall::FindCandidates { service_kind });

        let queued = self.queries.lock().pop_front();
        match queued {
            Some(MockQuery::Immediate(response)) => response,
            Some(MockQuery::Triggered { response, trigger }) => {
                let _ = trigger.await;
                response
            }
            None => Ok(self.default_candidates.lock().clone()),
        }
    }

    async fn offer(&self, provider: &Provider, _request: &ServiceRequest) -> Result<OfferResponse> {
        self.calls.lock().push(MockDirectoryCall::Offer {
            provider_id: provider.id.clone(),
        });

        let scripted = self
            .offers
            .lock()
            .get_mut(&provider.id)
            .and_then(|queue| queue.pop_front());
        let default = *self.default_offer.lock();

        match scripted {
            None => Ok(default),
            Some(MockOffer::Accept) => Ok(OfferResponse::Accepted),
            Some(MockOffer::Decline) => Ok(OfferResponse::Declined),
            Some(MockOffer::AcceptAfter(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(OfferResponse::Accepted)
            }
            Some(MockOffer::DeclineAfter(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(OfferResponse::Declined)
            }
            Some(MockOffer::Ignore) => futures::future::pending().await,
            Some(MockOffer::Fail(message)) => Err(DispatchError::Other(anyhow::anyhow!(message))),
            Some(MockOffer::Triggered { response, trigger }) => {
                let _ = trigger.await;
                Ok(response)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{AnyRequest, Request, RequestData};

    fn provider(id: &str) -> Provider {
        Provider {
            id: ProviderId::from(id),
            name: format!("Driver {id}"),
            vehicle_description: "Tow truck".to_string(),
            rating: 4.5,
            review_count: 30,
            verified: true,
            company_name: "Roadside Co".to_string(),
        }
    }

    fn service_request() -> ServiceRequest {
        let any: AnyRequest = Request::new(RequestData::new()).into();
        ServiceRequest::from(&any)
    }

    fn roster() -> RosterDirectory {
        RosterDirectory::new(vec![
            RosterEntry {
                provider: provider("downtown"),
                position: Coordinate::new(37.7749, -122.4194),
                services: vec![ServiceKind::Tow, ServiceKind::Tire],
                available: true,
            },
            RosterEntry {
                provider: provider("oakland"),
                position: Coordinate::new(37.8044, -122.2712),
                services: vec![ServiceKind::Tow],
                available: true,
            },
            RosterEntry {
                provider: provider("busy"),
                position: Coordinate::new(37.7750, -122.4195),
                services: vec![ServiceKind::Tow],
                available: false,
            },
        ])
    }

    #[tokio::test]
    async fn test_roster_filters_by_service_and_availability() {
        let directory = roster();
        let location = Location::device_fix(Coordinate::new(37.7749, -122.4194));

        let tow = directory
            .find_candidates(&location, ServiceKind::Tow)
            .await
            .unwrap();
        let ids: Vec<&str> = tow.iter().map(|c| c.provider.id.0.as_str()).collect();
        assert_eq!(ids, vec!["downtown", "oakland"]);
        assert!(tow[0].distance_km < 0.01);

        let tire = directory
            .find_candidates(&location, ServiceKind::Tire)
            .await
            .unwrap();
        assert_eq!(tire.len(), 1);
    }

    #[tokio::test]
    async fn test_roster_max_distance() {
        let directory = roster().with_max_distance_km(5.0);
        let location = Location::device_fix(Coordinate::new(37.7749, -122.4194));
        let tow = directory
            .find_candidates(&location, ServiceKind::Tow)
            .await
            .unwrap();
        assert_eq!(tow.len(), 1);
    }

    #[tokio::test]
    async fn test_roster_offer_takes_provider_off_the_list() {
        let directory = roster();
        let request = service_request();
        let downtown = provider("downtown");

        assert_eq!(
            directory.offer(&downtown, &request).await.unwrap(),
            OfferResponse::Accepted
        );
        assert_eq!(
            directory.offer(&downtown, &request).await.unwrap(),
            OfferResponse::Declined
        );

        directory.set_available(&downtown.id, true);
        assert_eq!(
            directory.offer(&downtown, &request).await.unwrap(),
            OfferResponse::Accepted
        );

        assert!(directory.offer(&provider("stranger"), &request).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_scripts_and_records() {
        let mock = MockDirectory::new();
        let request = service_request();
        let a = provider("a");
        mock.add_offer_response(&a.id, MockOffer::Accept);

        assert_eq!(mock.offer(&a, &request).await.unwrap(), OfferResponse::Accepted);
        // Script exhausted, falls back to the default
        assert_eq!(mock.offer(&a, &request).await.unwrap(), OfferResponse::Declined);

        mock.add_offer_response(&a.id, MockOffer::Fail("radio down".to_string()));
        assert!(mock.offer(&a, &request).await.is_err());

        assert_eq!(mock.offered(), vec![a.id.clone(), a.id.clone(), a.id.clone()]);
    }

    #[tokio::test]
    async fn test_mock_queued_queries_before_default() {
        let mock = MockDirectory::new();
        let location = Location::device_fix(Coordinate::new(0.0, 0.0));
        mock.set_candidates(vec![Candidate {
            provider: provider("default"),
            distance_km: 1.0,
        }]);
        mock.add_query_response(Ok(vec![]));

        assert!(
            mock.find_candidates(&location, ServiceKind::Fuel)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            mock.find_candidates(&location, ServiceKind::Fuel)
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(mock.query_count(), 2);
    }
}
