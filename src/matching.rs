//! Provider matching: find one provider willing to take a request.
//!
//! # Algorithm
//!
//! A matching process runs in rounds. Each round queries the directory, ranks
//! the candidates (distance ascending, rating descending) and offers the job to
//! each candidate not yet rejected by this process, one at a time:
//!
//! ```text
//! query ──> rank ──> offer(top untried) ──accepted──> Matched(provider)
//!                        │
//!            declined / window lapsed / offer error
//!                        │
//!                        ├──> next untried candidate
//!                        └──> none left: round Exhausted, sleep requery_interval, query again
//! ```
//!
//! Every offer is bounded by the acceptance window. The whole process is
//! bounded by an outer deadline scheduled on the [`Clock`]; when it fires the
//! process resolves as exhausted, marking the round in progress `TimedOut`.
//!
//! Cancelling the process's token stops the pending acceptance window at once
//! and resolves as [`MatchResult::Cancelled`], which the controller ignores.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::directory::{OfferResponse, ProviderDirectory};
use crate::domain::provider::{AttemptOutcome, MatchAttempt, Provider, ProviderId, rank_candidates};
use crate::request::{Location, ServiceKind, ServiceRequest};

/// Timing parameters for a matching process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingConfig {
    /// How long a candidate has to accept before being treated as declined.
    pub acceptance_window: Duration,
    /// Maximum total search time.
    pub deadline: Duration,
    /// Pause between a round running out of candidates and the next query.
    pub requery_interval: Duration,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            acceptance_window: Duration::from_secs(15),
            deadline: Duration::from_secs(120),
            requery_interval: Duration::from_secs(2),
        }
    }
}

impl From<&crate::dispatch::DispatchConfig> for MatchingConfig {
    fn from(config: &crate::dispatch::DispatchConfig) -> Self {
        MatchingConfig {
            acceptance_window: config.acceptance_window(),
            deadline: config.match_deadline(),
            requery_interval: config.requery_interval(),
        }
    }
}

/// How a matching process ended.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Matched(Provider),
    /// The outer deadline passed without an acceptance.
    Exhausted,
    /// The owning session was cancelled.
    Cancelled,
}

/// Result plus the rounds that led to it.
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub result: MatchResult,
    pub attempts: Vec<MatchAttempt>,
    pub elapsed: Duration,
}

/// One run of the matching algorithm for one request.
pub struct MatchingProcess {
    directory: Arc<dyn ProviderDirectory>,
    clock: Arc<dyn Clock>,
    config: MatchingConfig,
    request: ServiceRequest,
    location: Location,
    service_kind: ServiceKind,
    cancellation: CancellationToken,
}

impl MatchingProcess {
    pub fn new(
        directory: Arc<dyn ProviderDirectory>,
        clock: Arc<dyn Clock>,
        config: MatchingConfig,
        request: ServiceRequest,
        location: Location,
        service_kind: ServiceKind,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            directory,
            clock,
            config,
            request,
            location,
            service_kind,
            cancellation,
        }
    }

    /// Run until a provider accepts, the deadline passes or the token is
    /// cancelled.
    #[tracing::instrument(
        skip(self),
        fields(request_id = %self.request.id, service_kind = %self.service_kind)
    )]
    pub async fn run(self) -> MatchReport {
        let started = self.clock.now();
        let deadline = started + self.config.deadline;

        // Child of the session token, so cancellation also releases it
        let deadline_reached = self.cancellation.child_token();
        let _deadline_timer = {
            let token = deadline_reached.clone();
            self.clock
                .schedule(self.config.deadline, Box::new(move || token.cancel()))
        };

        let mut attempts = Vec::new();
        let result = tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => MatchResult::Cancelled,
            _ = deadline_reached.cancelled() => MatchResult::Exhausted,
            provider = self.search(deadline, &mut attempts) => MatchResult::Matched(provider),
        };

        if result == MatchResult::Exhausted
            && let Some(last) = attempts.last_mut()
            && last.outcome == AttemptOutcome::Pending
        {
            last.outcome = AttemptOutcome::TimedOut;
        }

        let elapsed = self.clock.now() - started;
        match &result {
            MatchResult::Matched(provider) => {
                counter!("roadside_matches_total", "outcome" => "matched").increment(1);
                tracing::info!(
                    provider_id = %provider.id,
                    rounds = attempts.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Provider matched"
                );
            }
            MatchResult::Exhausted => {
                counter!("roadside_matches_total", "outcome" => "exhausted").increment(1);
                tracing::warn!(
                    rounds = attempts.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Matching deadline reached without an acceptance"
                );
            }
            MatchResult::Cancelled => {
                tracing::debug!(rounds = attempts.len(), "Matching cancelled");
            }
        }

        MatchReport {
            result,
            attempts,
            elapsed,
        }
    }

    /// Round loop. Only returns on acceptance; the deadline and cancellation
    /// are handled by the caller dropping this future.
    async fn search(&self, deadline: Instant, attempts: &mut Vec<MatchAttempt>) -> Provider {
        let mut rejected: HashSet<ProviderId> = HashSet::new();
        let mut round = 0u32;

        loop {
            round += 1;
            let candidates = match self
                .directory
                .find_candidates(&self.location, self.service_kind)
                .await
            {
                Ok(candidates) => rank_candidates(candidates),
                Err(e) => {
                    tracing::warn!(round, error = %e, "Provider directory query failed");
                    Vec::new()
                }
            };

            let untried: Vec<Provider> = candidates
                .into_iter()
                .map(|candidate| candidate.provider)
                .filter(|provider| !rejected.contains(&provider.id))
                .collect();

            tracing::debug!(round, candidates = untried.len(), "Starting matching round");
            attempts.push(MatchAttempt {
                round,
                candidates: untried.clone(),
                deadline,
                outcome: AttemptOutcome::Pending,
            });

            for provider in untried {
                match self.offer(&provider).await {
                    OfferResponse::Accepted => {
                        if let Some(attempt) = attempts.last_mut() {
                            attempt.outcome = AttemptOutcome::Matched(provider.clone());
                        }
                        return provider;
                    }
                    OfferResponse::Declined => {
                        rejected.insert(provider.id.clone());
                    }
                }
            }

            if let Some(attempt) = attempts.last_mut() {
                attempt.outcome = AttemptOutcome::Exhausted;
            }
            tracing::debug!(
                round,
                rejected = rejected.len(),
                "Round exhausted, querying again after pause"
            );

            self.clock.sleep(self.config.requery_interval).await;
            // A zero interval must still let the deadline timer run
            tokio::task::yield_now().await;
        }
    }

    /// Offer to one provider, bounded by the acceptance window.
    async fn offer(&self, provider: &Provider) -> OfferResponse {
        let window = self.clock.sleep(self.config.acceptance_window);

        let (response, label) = tokio::select! {
            response = self.directory.offer(provider, &self.request) => match response {
                Ok(OfferResponse::Accepted) => (OfferResponse::Accepted, "accepted"),
                Ok(OfferResponse::Declined) => (OfferResponse::Declined, "declined"),
                Err(e) => {
                    tracing::warn!(provider_id = %provider.id, error = %e, "Offer failed, treating as declined");
                    (OfferResponse::Declined, "error")
                }
            },
            _ = window => (OfferResponse::Declined, "window_lapsed"),
        };

        counter!("roadside_offers_total", "response" => label).increment(1);
        tracing::debug!(provider_id = %provider.id, response = label, "Offer resolved");
        response
    }
}
