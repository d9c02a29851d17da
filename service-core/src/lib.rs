//! Shared plumbing for the onboarding gateway: the transport error type, the
//! base configuration loader, HTTP middleware and observability bootstrap.

pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
