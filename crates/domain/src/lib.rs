//! # axlink-domain
//!
//! Pure domain model for the axlink device integration.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps,
//!   string-backed enumerations
//! - Define **config entries** (the persisted record of one configured device)
//!   and the typed current schema ([`entry::EntryConfig`])
//! - Define **devices** (registry records built from what a session reports)
//! - Define **events** (bus events and raw device events)
//! - The **failure classifier** ([`connection::classify`])
//! - The **migration engine** ([`migration::migrate`])
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

#[macro_use]
mod str_enum;

pub mod error;
pub mod id;
pub mod time;

pub mod connection;
pub mod device;
pub mod entry;
pub mod event;
pub mod migration;
