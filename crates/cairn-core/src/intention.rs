//! Intentions: proposed changes to world state.
//!
//! An intention goes through a strict lifecycle when its batch is drained:
//!
//! 1. **Cancelled?** -- an intention cancelled while pending is dropped with
//!    an `intention_cancelled` notification (unless the cancellation is
//!    silent).
//! 2. **Allowed?** -- if not, it is dropped silently.
//! 3. **Offer** -- the intention's own offer hook runs, then the zone it
//!    happens in may veto it. A cancellation here ends the lifecycle.
//! 4. **Apply** -- the intention mutates state items directly.
//!
//! Errors escaping `offer` or `apply` are fatal unless they were built with
//! [`ApplyError::retryable`]. A retryable error discards the whole batch and
//! rolls the registry back to its pre-batch state.

use std::collections::VecDeque;
use std::fmt;

use cairn_types::{IntentionId, Scope, StateKeyError};
use serde_json::{Map, Value};

use crate::engine::Engine;
use crate::error::KernelError;

/// Maximum number of batches one `flush_intentions` call may run.
pub const MAX_INTENTION_BATCHES: u32 = 20;

/// Info key that suppresses the `intention_cancelled` notification.
pub const SILENT_KEY: &str = "silent";

/// Error escaping an intention's offer or apply step.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// A transient conflict: discard the batch, roll back, carry on.
    #[error("retryable apply failure: {reason}")]
    Retryable {
        /// Human-readable detail, forwarded in the admin warning.
        reason: String,
    },

    /// Anything else. Aborts the tick.
    #[error(transparent)]
    Fatal(#[from] KernelError),
}

impl ApplyError {
    /// Build a retryable error.
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self::Retryable {
            reason: reason.into(),
        }
    }

    /// Whether this error asks for a rollback rather than an abort.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

impl From<StateKeyError> for ApplyError {
    fn from(source: StateKeyError) -> Self {
        Self::Fatal(source.into())
    }
}

/// Why and by whom an intention was cancelled.
#[derive(Debug, Clone, PartialEq)]
pub struct Cancellation {
    /// Human-readable reason.
    pub reason: String,
    /// Name of the item that cancelled it, if any.
    pub by: Option<String>,
    /// Arbitrary extra detail. `"silent": true` suppresses the notification.
    pub info: Map<String, Value>,
}

impl Cancellation {
    /// A cancellation with the given reason and no extra info.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            by: None,
            info: Map::new(),
        }
    }

    /// Record who cancelled.
    #[must_use]
    pub fn by(mut self, canceller: impl Into<String>) -> Self {
        self.by = Some(canceller.into());
        self
    }

    /// Attach extra info.
    #[must_use]
    pub fn with_info(mut self, info: Map<String, Value>) -> Self {
        self.info = info;
        self
    }

    /// Suppress the `intention_cancelled` notification.
    #[must_use]
    pub fn silent(mut self) -> Self {
        self.info.insert(SILENT_KEY.to_owned(), Value::Bool(true));
        self
    }

    /// Whether the info marks this cancellation as silent.
    pub fn is_silent(&self) -> bool {
        self.info.get(SILENT_KEY) == Some(&Value::Bool(true))
    }
}

/// What interceptors get to see of an intention being offered.
#[derive(Debug, Clone, Copy)]
pub struct OfferDetails<'a> {
    /// The intention's id.
    pub id: IntentionId,
    /// The intention's type name.
    pub intention_type: &'a str,
    /// Where the intention happens.
    pub scope: &'a Scope,
}

/// Context handed to [`Intention::offer`].
#[derive(Debug)]
pub struct Offer<'e> {
    engine: &'e mut Engine,
    id: IntentionId,
    cancellation: Option<Cancellation>,
}

impl<'e> Offer<'e> {
    pub(crate) const fn new(engine: &'e mut Engine, id: IntentionId) -> Self {
        Self {
            engine,
            id,
            cancellation: None,
        }
    }

    /// The id of the intention being offered.
    pub const fn id(&self) -> IntentionId {
        self.id
    }

    /// Read access to the engine.
    pub fn engine(&self) -> &Engine {
        &*self.engine
    }

    /// Write access to the engine, e.g. to send notifications.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut *self.engine
    }

    /// Cancel the intention. The first cancellation wins.
    pub fn cancel(&mut self, cancellation: Cancellation) {
        if self.cancellation.is_none() {
            self.cancellation = Some(cancellation);
        }
    }

    /// Whether the intention has been cancelled during this offer.
    pub const fn is_cancelled(&self) -> bool {
        self.cancellation.is_some()
    }

    pub(crate) fn into_cancellation(self) -> Option<Cancellation> {
        self.cancellation
    }
}

/// Capability interface implemented by every intention variant.
pub trait Intention: fmt::Debug {
    /// Type name reported in notifications and logs.
    fn intention_type(&self) -> &str;

    /// Where the intention happens. Its zone gets to intercept the offer.
    fn scope(&self) -> Scope {
        Scope::admin()
    }

    /// Whether the intention may proceed at all. Disallowed intentions are
    /// dropped without a notification.
    fn allowed(&self, _engine: &Engine) -> bool {
        true
    }

    /// Offer phase: inspect the world and possibly cancel.
    fn offer(&mut self, _offer: &mut Offer<'_>) -> Result<(), ApplyError> {
        Ok(())
    }

    /// Commit the change. May queue further intentions.
    fn apply(&mut self, engine: &mut Engine, id: IntentionId) -> Result<(), ApplyError>;
}

/// An intention waiting in the queue together with its assigned id.
#[derive(Debug)]
pub struct QueuedIntention {
    /// Id assigned at queue time.
    pub id: IntentionId,
    /// The intention itself.
    pub intention: Box<dyn Intention>,
    /// Set when cancelled while still pending.
    pub cancellation: Option<Cancellation>,
}

/// FIFO of pending intentions.
#[derive(Debug, Default)]
pub struct IntentionQueue {
    pending: VecDeque<QueuedIntention>,
}

impl IntentionQueue {
    /// Append an intention under an already assigned id.
    pub fn push(&mut self, id: IntentionId, intention: Box<dyn Intention>) {
        self.pending.push_back(QueuedIntention {
            id,
            intention,
            cancellation: None,
        });
    }

    /// Swap out everything pending as one batch.
    pub fn take_batch(&mut self) -> VecDeque<QueuedIntention> {
        std::mem::take(&mut self.pending)
    }

    /// Mark a pending intention cancelled.
    pub fn cancel(&mut self, id: IntentionId, cancellation: Cancellation) -> Result<(), KernelError> {
        let queued = self
            .pending
            .iter_mut()
            .find(|queued| queued.id == id)
            .ok_or(KernelError::UnknownIntention { id })?;
        if queued.cancellation.is_none() {
            queued.cancellation = Some(cancellation);
        }
        Ok(())
    }

    /// Drop everything pending.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Ids of pending intentions in queue order.
    pub fn ids(&self) -> impl Iterator<Item = IntentionId> + '_ {
        self.pending.iter().map(|queued| queued.id)
    }

    /// Number of pending intentions.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// How one intention's lifecycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Applied successfully.
    Applied,
    /// Cancelled before or during the offer phase.
    Cancelled,
    /// `allowed` returned false.
    Disallowed,
}

/// Counters describing one `flush_intentions` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntentionFlushReport {
    /// Batches run.
    pub batches: u32,
    /// Intentions applied (including ones later rolled back).
    pub applied: u32,
    /// Intentions cancelled.
    pub cancelled: u32,
    /// Intentions dropped by `allowed`.
    pub disallowed: u32,
    /// Batches discarded by a retryable error.
    pub rollbacks: u32,
}

impl IntentionFlushReport {
    pub(crate) const fn record(&mut self, outcome: Outcome) {
        let slot = match outcome {
            Outcome::Applied => &mut self.applied,
            Outcome::Cancelled => &mut self.cancelled,
            Outcome::Disallowed => &mut self.disallowed,
        };
        *slot = slot.saturating_add(1);
    }
}
