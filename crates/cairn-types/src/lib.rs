//! Shared type definitions for the Cairn simulation kernel.
//!
//! This crate holds the plain data that crosses the kernel boundary: state
//! payloads, the structured state triples, notification records and the
//! filters used to subscribe to them. Types that external transport layers
//! consume are exported to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Sequence number wrappers for intentions and notifications
//! - [`state`] -- [`StateMap`] payloads with typed, fallible accessors
//! - [`structured`] -- `(type_tag, name, data)` triples and structured state
//! - [`notification`] -- Notification records, scopes, field filters and the
//!   well-known event vocabulary

pub mod ids;
pub mod notification;
pub mod state;
pub mod structured;

// Re-export all public types at crate root for convenience.
pub use ids::{IntentionId, NotificationId};
pub use notification::{ADMIN_ZONE, FieldSpec, Notification, Scope, kinds};
pub use state::{StateKeyError, StateMap};
pub use structured::{StateTriple, StateTripleRef, StructuredState};
