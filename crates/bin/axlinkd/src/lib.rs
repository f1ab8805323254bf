//! Configuration and host runtime of the axlink daemon.
//!
//! Kept in a library target so the integration tests can drive the same
//! [`runtime::Host`] the binary runs.

pub mod config;
pub mod runtime;
