//! Core domain types for the dispatch engine.
//!
//! This module contains pure domain types with no runtime dependencies:
//! - Service request typestate machine
//! - Providers and matching rounds

pub mod provider;
pub mod request;
