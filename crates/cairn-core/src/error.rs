//! Error types for the kernel.
//!
//! Every [`KernelError`] is fatal to the operation that raised it. The only
//! recoverable failure is an explicitly constructed
//! [`ApplyError::Retryable`](crate::intention::ApplyError::Retryable) escaping
//! an intention's apply step.

use cairn_types::{IntentionId, StateKeyError};

/// Fatal kernel errors.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// An item with this name is already registered.
    #[error("duplicate state item name: {name}")]
    DuplicateName {
        /// The contested name.
        name: String,
    },

    /// `finished_init` was called on an already finalized registry.
    #[error("state registry was already finalized")]
    DuplicateFinalization,

    /// No constructor is registered for this type tag.
    #[error("unknown state item type: {type_tag}")]
    UnknownType {
        /// The unresolved tag.
        type_tag: String,
    },

    /// A different constructor is already registered for this type tag.
    #[error("conflicting constructors registered for type {type_tag}")]
    ConflictingType {
        /// The contested tag.
        type_tag: String,
    },

    /// No item with this name is registered.
    #[error("no such state item: {name}")]
    NoSuchItem {
        /// The missing name.
        name: String,
    },

    /// A constructor rejected an item's data, or produced an item whose
    /// identity does not match its triple.
    #[error("invalid data for state item {name}: {reason}")]
    InvalidItemData {
        /// The item being built.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A notification was sent with a malformed field.
    #[error("invalid notification field {field}: {reason}")]
    InvalidNotification {
        /// The offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Intentions kept queueing more intentions past the batch ceiling.
    #[error("intention queue did not settle after {limit} batches")]
    TooManyIntentionLoops {
        /// The batch ceiling that was hit.
        limit: u32,
    },

    /// Notification handlers kept sending more notifications past the wave
    /// ceiling.
    #[error("notification queue did not settle after {limit} waves")]
    TooManyNotificationLoops {
        /// The wave ceiling that was hit.
        limit: u32,
    },

    /// No pending intention has this id.
    #[error("no pending intention with id {id}")]
    UnknownIntention {
        /// The requested id.
        id: IntentionId,
    },

    /// An admin counter would exceed `u64::MAX`.
    #[error("admin counter {counter} overflowed")]
    CounterOverflow {
        /// Which counter.
        counter: &'static str,
    },

    /// Typed state access failed.
    #[error("state access failed: {source}")]
    StateKey {
        /// The underlying accessor error.
        #[from]
        source: StateKeyError,
    },

    /// Structured state JSON could not be read or written.
    #[error("structured state JSON error: {source}")]
    Json {
        /// The underlying serde error.
        #[from]
        source: serde_json::Error,
    },
}
