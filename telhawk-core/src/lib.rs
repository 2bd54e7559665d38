//! Shared building blocks for TelHawk services.
//!
//! Carries the application error type with its HTTP rendering, the common
//! configuration loader, and the tracing bootstrap.

pub mod config;
pub mod error;
pub mod observability;
