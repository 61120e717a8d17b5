//! Core type definitions for the backoffice data layer.
//!
//! This crate defines the small, transport-agnostic types every other crate
//! depends on:
//! - Entity identifiers generated on the client (UUID v4, 32-char hex)
//! - The API context threaded through every data-access call
//!
//! Entity shapes themselves live in `backoffice-model`; query descriptors live
//! in `backoffice-criteria`.

mod context;
mod ids;

pub use context::{ApiContext, LIVE_VERSION_ID, SYSTEM_LANGUAGE_ID};
pub use ids::EntityId;
