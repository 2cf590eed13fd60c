//! Request aggregate - domain model and stage transitions.
//!
//! This module contains the core domain logic for service requests:
//! - Request types and stages (typestate pattern)
//! - Stage transition methods
//! - Value objects (RequestData, Location, Pricing, etc.)

pub mod state;
pub mod transitions;

// Re-export commonly used types
pub use state::*;
pub use transitions::CancellationReason;
