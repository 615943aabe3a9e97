//! Orchard Storefront library.
//!
//! The data layer between page rendering and the commerce API:
//!
//! - [`cache`] - Stale-while-revalidate subrequest cache (in-process or remote proxy)
//! - [`shopify`] - Storefront API client and the cached read path
//! - [`cart`] - Cart action registry, cart handler, and identity persistence
//! - [`optimistic`] - Pending mutation overlay for immediate cart feedback
//!
//! The binary in `main.rs` exposes the cart handler over HTTP; everything is
//! also usable as a library so a rendering tier can call it in-process.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod cart;
pub mod config;
pub mod error;
pub mod middleware;
pub mod optimistic;
pub mod routes;
pub mod shopify;
pub mod state;
