//! Configuration and bookkeeping types for the session registry.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::controller::Controller;
use crate::error::Result;
use crate::escalation::{DEFAULT_LOW_BATTERY_THRESHOLD, EscalationPolicy, Variant};
use crate::request::{RequestId, Stage};

/// Configuration for the dispatch engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// How long a provider has to accept an offer (milliseconds)
    pub acceptance_window_ms: u64,

    /// Maximum total time one matching run may search (milliseconds)
    pub match_deadline_ms: u64,

    /// Pause before re-querying the directory after a round ran out of
    /// candidates (milliseconds)
    pub requery_interval_ms: u64,

    /// How long to wait for the geocoder before failing location
    /// confirmation (milliseconds)
    pub geocode_timeout_ms: u64,

    /// Battery percentage below which the low-battery variant is selected
    pub low_battery_threshold: u8,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            acceptance_window_ms: 15_000, // 15 seconds
            match_deadline_ms: 120_000,   // 2 minutes
            requery_interval_ms: 2_000,
            geocode_timeout_ms: 10_000,
            low_battery_threshold: DEFAULT_LOW_BATTERY_THRESHOLD,
        }
    }
}

impl DispatchConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn acceptance_window(&self) -> Duration {
        Duration::from_millis(self.acceptance_window_ms)
    }

    pub fn match_deadline(&self) -> Duration {
        Duration::from_millis(self.match_deadline_ms)
    }

    pub fn requery_interval(&self) -> Duration {
        Duration::from_millis(self.requery_interval_ms)
    }

    pub fn geocode_timeout(&self) -> Duration {
        Duration::from_millis(self.geocode_timeout_ms)
    }

    pub fn escalation_policy(&self) -> EscalationPolicy {
        EscalationPolicy::new(self.low_battery_threshold)
    }
}

/// Registry entry for one active request.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub(crate) controller: Controller,
    /// Distinguishes this session from a later one for the same id.
    pub(crate) generation: u64,
    pub(crate) began_at: DateTime<Utc>,
}

/// Summary of an active session for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub request_id: RequestId,
    pub stage: Stage,
    pub variant: Variant,
    pub began_at: DateTime<Utc>,
}

/// Point-in-time registry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RegistryStats {
    pub active_sessions: usize,
    pub matching_in_flight: usize,
}
