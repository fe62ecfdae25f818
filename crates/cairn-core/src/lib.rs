//! Tick kernel for the Cairn simulation.
//!
//! The kernel owns all persistent simulated state as named state items,
//! advances the world one tick at a time by draining a queue of intentions,
//! and tells interested parties what happened through a notification bus.
//! Every intention batch is guarded by a snapshot of the registry, so a
//! retryable failure rolls the world back as if the batch never ran.
//!
//! # Modules
//!
//! - [`item`] -- The [`StateItem`] capability interface and the inert item.
//! - [`item_type`] -- [`TypeRegistry`] mapping type tags to constructors.
//! - [`codec`] -- Conversion between items and structured state triples.
//! - [`registry`] -- [`StateRegistry`]: items by name, zones, admin counters.
//! - [`intention`] -- The [`Intention`] lifecycle, queue and flush report.
//! - [`notification`] -- Subscriptions and the [`NotificationBus`].
//! - [`engine`] -- The [`Engine`] facade and its tick cycle.
//! - [`config`] -- Configuration loading from `cairn-config.yaml`.
//! - [`runner`] -- Async tick loop with bounds and pacing.
//! - [`error`] -- [`KernelError`].

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod intention;
pub mod item;
pub mod item_type;
pub mod notification;
pub mod registry;
pub mod runner;

#[cfg(test)]
mod test_support;

pub use engine::{Engine, TickSummary};
pub use error::KernelError;
pub use intention::{
    ApplyError, Cancellation, Intention, IntentionFlushReport, Offer, OfferDetails,
};
pub use item::{ADMIN_ITEM, INERT_TYPE, InertItem, StateItem};
pub use item_type::{ItemConstructor, TypeRegistry};
pub use notification::{NotificationBus, NotificationFlushReport, Subscription, Tracker};
pub use registry::StateRegistry;
