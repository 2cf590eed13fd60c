//! Providers as supplied by the directory, and the matching bookkeeping around them.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Identifier assigned by the provider directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(pub String);

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        ProviderId(id.to_string())
    }
}

/// A candidate or matched responder. The engine only ever references these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub name: String,
    pub vehicle_description: String,
    /// 0.0 to 5.0
    pub rating: f32,
    pub review_count: u32,
    pub verified: bool,
    pub company_name: String,
}

/// A provider together with how far away it is from the request.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub provider: Provider,
    pub distance_km: f64,
}

/// Order candidates by distance ascending, breaking ties by rating descending.
///
/// The sort is stable, so candidates that tie on both keys keep the
/// directory's order.
pub fn rank_candidates(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        a.distance_km
            .total_cmp(&b.distance_km)
            .then_with(|| b.provider.rating.total_cmp(&a.provider.rating))
    });
    candidates
}

/// Resolution of a single matching round.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Pending,
    Matched(Provider),
    /// The outer deadline passed while this round was still running.
    TimedOut,
    /// Every candidate in the round declined or let its window lapse.
    Exhausted,
}

/// One round of provider search: a directory query and the walk of its
/// untried candidates.
#[derive(Debug, Clone)]
pub struct MatchAttempt {
    pub round: u32,
    pub candidates: Vec<Provider>,
    /// Instant after which the whole search is abandoned.
    pub deadline: Instant,
    pub outcome: AttemptOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str, rating: f32) -> Provider {
        Provider {
            id: ProviderId::from(id),
            name: format!("Driver {id}"),
            vehicle_description: "Flatbed".to_string(),
            rating,
            review_count: 10,
            verified: true,
            company_name: "Acme Roadside".to_string(),
        }
    }

    #[test]
    fn test_rank_by_distance_then_rating() {
        let ranked = rank_candidates(vec![
            Candidate {
                provider: provider("far", 5.0),
                distance_km: 9.0,
            },
            Candidate {
                provider: provider("near-low", 3.9),
                distance_km: 2.0,
            },
            Candidate {
                provider: provider("near-high", 4.8),
                distance_km: 2.0,
            },
        ]);

        let order: Vec<&str> = ranked.iter().map(|c| c.provider.id.0.as_str()).collect();
        assert_eq!(order, vec!["near-high", "near-low", "far"]);
    }

    #[test]
    fn test_rank_keeps_directory_order_on_full_tie() {
        let ranked = rank_candidates(vec![
            Candidate {
                provider: provider("a", 4.0),
                distance_km: 1.0,
            },
            Candidate {
                provider: provider("b", 4.0),
                distance_km: 1.0,
            },
        ]);
        assert_eq!(ranked[0].provider.id, ProviderId::from("a"));
        assert_eq!(ranked[1].provider.id, ProviderId::from("b"));
    }
}
