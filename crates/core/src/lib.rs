//! Orchard Core - Shared types library.
//!
//! This crate provides the types shared by every Orchard component:
//! - `storefront` - Cache facade, cart dispatch, and optimistic projection
//! - `cache-proxy` - Remote cache process that owns shared storage
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients,
//! no async runtime. Both the storefront and the proxy depend on it so the
//! freshness rules and the wire format have exactly one definition.
//!
//! # Modules
//!
//! - [`types`] - Cache policies, cache entries, wire messages, cart types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
