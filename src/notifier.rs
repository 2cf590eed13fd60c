//! Outbound status messages to emergency contacts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::provider::Provider;
use crate::error::Result;
use crate::request::ServiceRequest;

/// Opaque reference to an emergency contact (phone number, contact id, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactRef(pub String);

impl std::fmt::Display for ContactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for delivering a status message to a contact.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, contact: &ContactRef, message: &str) -> Result<()>;
}

/// Status message sent when a provider is dispatched to a low-battery request.
pub fn dispatched_message(request: &ServiceRequest, provider: &Provider) -> String {
    let eta = request
        .pricing
        .as_ref()
        .map(|pricing| format!(", ETA {} min", pricing.eta_minutes))
        .unwrap_or_default();
    let place = request
        .location
        .as_ref()
        .map(|location| match &location.address {
            Some(address) => address.clone(),
            None => location.coordinate.to_string(),
        })
        .unwrap_or_else(|| "their last known position".to_string());

    format!(
        "Roadside help is on the way to {place}: {} ({}, {}){eta}. Their phone battery is low, so they may not answer.",
        provider.name, provider.company_name, provider.vehicle_description
    )
}

/// Notifier that only writes the message to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, contact: &ContactRef, message: &str) -> Result<()> {
        tracing::info!(contact = %contact, message = %message, "Emergency contact notified");
        Ok(())
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::sync::Arc;

/// Mock notifier recording every message.
#[derive(Clone, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<(ContactRef, String)>>>,
    fail: Arc<Mutex<bool>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent calls fail (after recording them).
    pub fn fail_deliveries(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub fn sent(&self) -> Vec<(ContactRef, String)> {
        self.sent.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, contact: &ContactRef, message: &str) -> Result<()> {
        self.sent
            .lock()
            .push((contact.clone(), message.to_string()));
        if *self.fail.lock() {
            return Err(anyhow::anyhow!("delivery to {contact} failed").into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::provider::ProviderId;
    use crate::request::{
        AnyRequest, Coordinate, Location, PriceRange, Pricing, Request, RequestData, ServiceKind,
    };

    #[test]
    fn test_dispatched_message_mentions_provider_and_eta() {
        let any: AnyRequest = Request::new(RequestData::new())
            .fast_track(
                ServiceKind::Jumpstart,
                Location::with_address(Coordinate::new(1.0, 2.0), "Route 9 mile 12"),
                Pricing {
                    estimate: PriceRange { low: 45, high: 65 },
                    eta_minutes: 15,
                },
            )
            .into();
        let provider = Provider {
            id: ProviderId::from("p"),
            name: "Alex".to_string(),
            vehicle_description: "White van".to_string(),
            rating: 4.9,
            review_count: 300,
            verified: true,
            company_name: "Volt Assist".to_string(),
        };

        let message = dispatched_message(&ServiceRequest::from(&any), &provider);
        assert!(message.contains("Route 9 mile 12"));
        assert!(message.contains("Alex"));
        assert!(message.contains("ETA 15 min"));
    }

    #[tokio::test]
    async fn test_mock_records_even_when_failing() {
        let mock = MockNotifier::new();
        let contact = ContactRef("+15550100".to_string());
        mock.notify(&contact, "first").await.unwrap();
        mock.fail_deliveries(true);
        assert!(mock.notify(&contact, "second").await.is_err());
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.sent()[1].1, "second");
    }
}
