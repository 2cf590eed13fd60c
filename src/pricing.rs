//! Price and arrival estimates.
//!
//! Pricing is a pure function of the service kind, the confirmed location and
//! the optional vehicle. It only fails on malformed input.

use chrono::Datelike;

use crate::error::{DispatchError, Result};
use crate::request::{Location, PriceRange, Pricing, ServiceKind, Vehicle};

/// Computes the quote shown at `PricingPreview`.
pub trait PricingCalculator: Send + Sync {
    fn estimate(
        &self,
        service_kind: ServiceKind,
        location: &Location,
        vehicle: Option<&Vehicle>,
    ) -> Result<Pricing>;
}

/// One row of the rate card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub estimate: PriceRange,
    pub eta_minutes: u32,
}

/// Flat rate card keyed by service kind.
#[derive(Debug, Clone)]
pub struct RateCard {
    tow: Rate,
    jumpstart: Rate,
    tire: Rate,
    lockout: Rate,
    fuel: Rate,
    other: Rate,
}

const fn rate(low: u32, high: u32, eta_minutes: u32) -> Rate {
    Rate {
        estimate: PriceRange { low, high },
        eta_minutes,
    }
}

impl Default for RateCard {
    fn default() -> Self {
        Self {
            tow: rate(95, 150, 30),
            jumpstart: rate(45, 65, 15),
            tire: rate(55, 75, 10),
            lockout: rate(50, 80, 20),
            fuel: rate(40, 60, 15),
            other: rate(60, 120, 25),
        }
    }
}

impl RateCard {
    /// Override the rate for one service kind.
    pub fn with_rate(mut self, service_kind: ServiceKind, rate: Rate) -> Self {
        *self.rate_mut(service_kind) = rate;
        self
    }

    pub fn rate(&self, service_kind: ServiceKind) -> Rate {
        match service_kind {
            ServiceKind::Tow => self.tow,
            ServiceKind::Jumpstart => self.jumpstart,
            ServiceKind::Tire => self.tire,
            ServiceKind::Lockout => self.lockout,
            ServiceKind::Fuel => self.fuel,
            ServiceKind::Other => self.other,
        }
    }

    fn rate_mut(&mut self, service_kind: ServiceKind) -> &mut Rate {
        match service_kind {
            ServiceKind::Tow => &mut self.tow,
            ServiceKind::Jumpstart => &mut self.jumpstart,
            ServiceKind::Tire => &mut self.tire,
            ServiceKind::Lockout => &mut self.lockout,
            ServiceKind::Fuel => &mut self.fuel,
            ServiceKind::Other => &mut self.other,
        }
    }
}

pub fn validate_vehicle(vehicle: &Vehicle) -> Result<()> {
    // First production automobile
    const EARLIEST_YEAR: u16 = 1886;

    if let Some(year) = vehicle.year {
        let latest = u16::try_from(chrono::Utc::now().year() + 1).unwrap_or(u16::MAX);
        if !(EARLIEST_YEAR..=latest).contains(&year) {
            return Err(DispatchError::Validation(format!(
                "vehicle year {year} is outside {EARLIEST_YEAR}..={latest}"
            )));
        }
    }
    Ok(())
}

impl PricingCalculator for RateCard {
    fn estimate(
        &self,
        service_kind: ServiceKind,
        location: &Location,
        vehicle: Option<&Vehicle>,
    ) -> Result<Pricing> {
        location.coordinate.validate()?;
        if let Some(vehicle) = vehicle {
            validate_vehicle(vehicle)?;
        }

        let rate = self.rate(service_kind);
        if rate.estimate.low > rate.estimate.high {
            return Err(DispatchError::Validation(format!(
                "rate for {service_kind} has low {} above high {}",
                rate.estimate.low, rate.estimate.high
            )));
        }

        Ok(Pricing {
            estimate: rate.estimate,
            eta_minutes: rate.eta_minutes,
        })
    }
}
