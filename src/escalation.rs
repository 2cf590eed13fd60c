//! Emergency escalation policy: which lifecycle variant governs a request.

use serde::{Deserialize, Serialize};

use crate::domain::request::Stage;
use crate::notifier::ContactRef;

/// Battery percentage below which the low-battery variant is used.
pub const DEFAULT_LOW_BATTERY_THRESHOLD: u8 = 15;

/// Lifecycle variant selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    /// Full forward sequence from service selection.
    Standard,
    /// FastTrack entry plus a one-time message to the emergency contact.
    LowBattery,
    /// FastTrack entry with only start, matched and terminal broadcasts.
    Silent,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Standard => "standard",
            Variant::LowBattery => "low_battery",
            Variant::Silent => "silent",
        }
    }

    /// Emergency variants begin directly at `ProviderMatch`.
    pub fn is_fast_track(&self) -> bool {
        matches!(self, Variant::LowBattery | Variant::Silent)
    }

    /// Whether a transition into `stage` is broadcast to subscribers.
    ///
    /// `initial` is true for the snapshot published when the session starts.
    pub fn broadcasts(&self, stage: Stage, initial: bool) -> bool {
        match self {
            Variant::Standard | Variant::LowBattery => true,
            Variant::Silent => match stage {
                Stage::ProviderMatch => initial,
                Stage::LiveTracking | Stage::Completed | Stage::Cancelled => true,
                Stage::ServiceSelection
                | Stage::LocationConfirm
                | Stage::PricingPreview
                | Stage::MatchFailed => false,
            },
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device and context signals gathered when a request is made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSignals {
    /// Battery charge in percent (0-100).
    pub battery_level: u8,
    pub silent_mode_requested: bool,
    /// Who to tell when a low-battery request is matched.
    pub emergency_contact: Option<ContactRef>,
}

impl Default for DeviceSignals {
    fn default() -> Self {
        Self {
            battery_level: 100,
            silent_mode_requested: false,
            emergency_contact: None,
        }
    }
}

impl DeviceSignals {
    pub fn with_battery(mut self, battery_level: u8) -> Self {
        self.battery_level = battery_level;
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent_mode_requested = true;
        self
    }

    pub fn with_emergency_contact(mut self, contact: ContactRef) -> Self {
        self.emergency_contact = Some(contact);
        self
    }
}

/// Decision table for the lifecycle variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    pub low_battery_threshold: u8,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            low_battery_threshold: DEFAULT_LOW_BATTERY_THRESHOLD,
        }
    }
}

impl EscalationPolicy {
    pub fn new(low_battery_threshold: u8) -> Self {
        Self {
            low_battery_threshold,
        }
    }

    /// Silent intent wins over everything; otherwise a battery strictly below
    /// the threshold selects the low-battery variant.
    pub fn select_variant(&self, battery_level: u8, silent_mode_requested: bool) -> Variant {
        if silent_mode_requested {
            Variant::Silent
        } else if battery_level < self.low_battery_threshold {
            Variant::LowBattery
        } else {
            Variant::Standard
        }
    }

    pub fn select_for(&self, signals: &DeviceSignals) -> Variant {
        self.select_variant(signals.battery_level, signals.silent_mode_requested)
    }
}

/// [`EscalationPolicy::select_variant`] with the default threshold.
pub fn select_variant(battery_level: u8, silent_mode_requested: bool) -> Variant {
    EscalationPolicy::default().select_variant(battery_level, silent_mode_requested)
}
