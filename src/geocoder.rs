//! Geocoder abstraction for confirming a raw device position.
//!
//! The engine never talks to a geolocation service directly; it calls the
//! `Geocoder` trait so that production and test implementations can be swapped.

use async_trait::async_trait;

use crate::error::{DispatchError, Result};
use crate::request::{Coordinate, Location};

/// Trait for resolving a raw position to a confirmed location.
///
/// # Errors
/// Implementations return [`DispatchError::Unresolvable`] when the position
/// cannot be turned into an address (open water, no coverage, ...).
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, position: Coordinate) -> Result<Location>;
}

/// Geocoder that confirms any valid coordinate, using the formatted
/// coordinate as its address.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateGeocoder;

#[async_trait]
impl Geocoder for CoordinateGeocoder {
    async fn resolve(&self, position: Coordinate) -> Result<Location> {
        position
            .validate()
            .map_err(|e| DispatchError::Unresolvable(e.to_string()))?;
        Ok(Location::with_address(position, position.to_string()))
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Mock geocoder for testing.
///
/// Responses are returned in FIFO order. A triggered response blocks until
/// its trigger fires, which lets tests hold a `confirm_location` call at its
/// suspension point.
#[derive(Clone, Default)]
pub struct MockGeocoder {
    responses: Arc<Mutex<VecDeque<MockResolution>>>,
    calls: Arc<Mutex<Vec<Coordinate>>>,
}

enum MockResolution {
    Immediate(Result<Location>),
    Triggered {
        response: Result<Location>,
        trigger: oneshot::Receiver<()>,
    },
    /// Never answers.
    Hang,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a resolved address.
    pub fn add_address(&self, address: &str) {
        self.responses
            .lock()
            .push_back(MockResolution::Immediate(Ok(Location {
                coordinate: Coordinate::new(0.0, 0.0),
                address: Some(address.to_string()),
            })));
    }

    /// Queue an arbitrary response. The coordinate of an `Ok` location is
    /// replaced by the position actually passed to `resolve`.
    pub fn add_response(&self, response: Result<Location>) {
        self.responses
            .lock()
            .push_back(MockResolution::Immediate(response));
    }

    /// Queue a response that waits for the returned trigger before completing.
    pub fn add_response_with_trigger(&self, response: Result<Location>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.responses.lock().push_back(MockResolution::Triggered {
            response,
            trigger: rx,
        });
        tx
    }

    /// Queue a response that never arrives.
    pub fn add_hang(&self) {
        self.responses.lock().push_back(MockResolution::Hang);
    }

    pub fn get_calls(&self) -> Vec<Coordinate> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn resolve(&self, position: Coordinate) -> Result<Location> {
        self.calls.lock().push(position);
        let next = self.responses.lock().pop_front();

        let response = match next {
            Some(MockResolution::Immediate(response)) => response,
            Some(MockResolution::Triggered { response, trigger }) => {
                // Proceed whether the trigger was sent or dropped
                let _ = trigger.await;
                response
            }
            Some(MockResolution::Hang) => futures::future::pending().await,
            None => Err(DispatchError::Unresolvable(format!(
                "no mock geocoder response configured for {position}"
            ))),
        };

        response.map(|location| Location {
            coordinate: position,
            address: location.address,
        })
    }
}
