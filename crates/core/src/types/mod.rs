//! Core types for Orchard.
//!
//! This module provides type-safe wrappers for cache and cart concepts.

pub mod action;
pub mod cart;
pub mod entry;
pub mod id;
pub mod policy;
pub mod wire;

pub use action::{CartAction, CartActionRequest, CartForm, CartFormError, UnknownActionError};
pub use cart::{Cart, CartActionResult, CartUserError, CartWarning};
pub use entry::{CACHE_CONTROL, CacheEntry, CacheStatus, Clock, ManualClock, SystemClock};
pub use id::CartId;
pub use policy::{
    CacheMode, CachePolicy, Freshness, LONG_MAX_AGE, LONG_STALE_WHILE_REVALIDATE, SHORT_MAX_AGE,
    SHORT_STALE_WHILE_REVALIDATE, ValidationError, build_directive,
};
pub use wire::{CacheMethod, CacheProxyRequest, CacheProxyResponse};
