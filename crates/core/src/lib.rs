//! Display Toggle Core - Shared types library.
//!
//! This crate provides common types used across all Display Toggle components:
//! - `gateway` - Credential-injecting proxy in front of the Smaregi POS API
//! - `console` - Session, token lifecycle, paginated fetch and dirty tracking
//! - `cli` - Command-line front end for operators
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. Both the
//! gateway and the console speak the wire envelopes defined in [`wire`], so
//! a change to the envelope shape is a change in exactly one place.
//!
//! # Modules
//!
//! - [`types`] - Environment, display flag, entity IDs, catalog records and
//!   list-envelope adapters
//! - [`wire`] - Request/response envelopes and transport header names

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;
pub mod wire;

pub use types::*;
