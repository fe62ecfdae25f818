//! Intention queueing and the batched drain.

use cairn_types::{IntentionId, NotificationId, kinds};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use super::Engine;
use crate::error::KernelError;
use crate::intention::{
    ApplyError, Cancellation, Intention, IntentionFlushReport, MAX_INTENTION_BATCHES, Offer,
    OfferDetails, Outcome, QueuedIntention,
};
use crate::item::counters;

impl Engine {
    /// Assign the next intention id and append the intention to the queue.
    ///
    /// Callable at any time, including from inside an apply step; the
    /// intention then runs in the next batch.
    ///
    /// # Errors
    ///
    /// Returns an error only if the intention counter is corrupt or
    /// exhausted.
    pub fn queue_intention(&mut self, intention: Box<dyn Intention>) -> Result<IntentionId, KernelError> {
        let id = IntentionId::new(self.registry.bump_counter(counters::INTENTION_ID)?);
        debug!(intention_id = %id, intention_type = intention.intention_type(), "Queued intention");
        self.intentions.push(id, intention);
        Ok(id)
    }

    /// Cancel an intention that is still waiting in the queue.
    ///
    /// The intention is dropped when its batch reaches it, with an
    /// `intention_cancelled` notification unless `info` marks the
    /// cancellation silent.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::UnknownIntention`] if the id is not pending.
    pub fn cancel_intention(
        &mut self,
        id: IntentionId,
        reason: &str,
        info: Map<String, Value>,
    ) -> Result<(), KernelError> {
        self.intentions
            .cancel(id, Cancellation::new(reason).with_info(info))
    }

    /// Ask every zone, in registration order, for its next-step intentions
    /// and queue them. Returns how many were queued.
    pub(crate) fn queue_zone_intentions(&mut self) -> Result<u32, KernelError> {
        let proposed: Vec<Box<dyn Intention>> = self
            .registry
            .zones()
            .flat_map(|zone| zone.intentions_for_next_step(&self.registry))
            .collect();
        let mut queued: u32 = 0;
        for intention in proposed {
            self.queue_intention(intention)?;
            queued = queued.saturating_add(1);
        }
        Ok(queued)
    }

    /// Drain the intention queue.
    ///
    /// Each batch takes everything pending and runs it in id order. Before a
    /// batch starts the registry is snapshotted. A retryable error discards
    /// the rest of the batch and every intention it queued, restores the
    /// snapshot while keeping the id counters where they are, drops the
    /// notifications the batch queued, and sends an admin warning. Exactly
    /// [`MAX_INTENTION_BATCHES`] batches may run per call.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::TooManyIntentionLoops`] when the queue is still
    /// not empty after the last allowed batch; the queue is cleared. Returns
    /// any fatal error escaping an intention after restoring the pre-batch
    /// snapshot.
    pub fn flush_intentions(&mut self) -> Result<IntentionFlushReport, KernelError> {
        let mut report = IntentionFlushReport::default();

        'batches: while !self.intentions.is_empty() {
            if report.batches >= MAX_INTENTION_BATCHES {
                error!(
                    limit = MAX_INTENTION_BATCHES,
                    pending = self.intentions.len(),
                    "Intention batch ceiling reached"
                );
                self.intentions.clear();
                return Err(KernelError::TooManyIntentionLoops {
                    limit: MAX_INTENTION_BATCHES,
                });
            }
            report.batches = report.batches.saturating_add(1);

            let snapshot = self.registry.structured_state();
            let last_kept =
                NotificationId::new(self.registry.counter(counters::NOTIFICATION_ID)?);
            let batch = self.intentions.take_batch();
            debug!(batch = report.batches, size = batch.len(), "Draining intention batch");

            for queued in batch {
                let id = queued.id;
                match self.try_apply(queued) {
                    Ok(outcome) => report.record(outcome),
                    Err(ApplyError::Retryable { reason }) => {
                        warn!(intention_id = %id, reason = %reason, "Intention batch rolled back");
                        self.intentions.clear();
                        self.rollback(snapshot, last_kept)?;
                        report.rollbacks = report.rollbacks.saturating_add(1);

                        let mut info = Map::new();
                        info.insert("intention_id".to_owned(), Value::from(id.get()));
                        info.insert("reason".to_owned(), Value::String(reason.clone()));
                        self.admin_warning(&format!("intention batch rolled back: {reason}"), info)?;
                        continue 'batches;
                    }
                    Err(ApplyError::Fatal(err)) => {
                        error!(intention_id = %id, error = %err, "Intention failed");
                        self.intentions.clear();
                        self.rollback(snapshot, last_kept)?;
                        return Err(err);
                    }
                }
            }
        }

        Ok(report)
    }

    /// Run one intention through its lifecycle.
    fn try_apply(&mut self, queued: QueuedIntention) -> Result<Outcome, ApplyError> {
        let QueuedIntention {
            id,
            mut intention,
            cancellation,
        } = queued;

        if let Some(cancellation) = cancellation {
            self.notify_cancelled(id, intention.as_ref(), &cancellation)?;
            return Ok(Outcome::Cancelled);
        }

        if !intention.allowed(self) {
            debug!(intention_id = %id, intention_type = intention.intention_type(), "Intention not allowed");
            return Ok(Outcome::Disallowed);
        }

        // --- Offer ---
        let mut offer = Offer::new(self, id);
        intention.offer(&mut offer)?;
        let mut cancellation = offer.into_cancellation();

        if cancellation.is_none() {
            let scope = intention.scope();
            let details = OfferDetails {
                id,
                intention_type: intention.intention_type(),
                scope: &scope,
            };
            cancellation = self
                .registry
                .get(&scope.zone)
                .and_then(|zone| zone.intercept_offer(&details))
                .map(|cancellation| {
                    if cancellation.by.is_some() {
                        cancellation
                    } else {
                        cancellation.by(scope.zone.clone())
                    }
                });
        }

        if let Some(cancellation) = cancellation {
            self.notify_cancelled(id, intention.as_ref(), &cancellation)?;
            return Ok(Outcome::Cancelled);
        }

        // --- Apply ---
        intention.apply(self, id)?;
        self.notify_applied(id, intention.as_ref())?;
        Ok(Outcome::Applied)
    }

    fn notify_cancelled(
        &mut self,
        id: IntentionId,
        intention: &dyn Intention,
        cancellation: &Cancellation,
    ) -> Result<(), KernelError> {
        if cancellation.is_silent() {
            debug!(intention_id = %id, reason = %cancellation.reason, "Intention cancelled silently");
            return Ok(());
        }
        debug!(intention_id = %id, reason = %cancellation.reason, "Intention cancelled");

        let mut data = Map::new();
        data.insert("intention_id".to_owned(), Value::from(id.get()));
        data.insert(
            "intention_type".to_owned(),
            Value::String(intention.intention_type().to_owned()),
        );
        data.insert("reason".to_owned(), Value::String(cancellation.reason.clone()));
        data.insert(
            "by".to_owned(),
            cancellation.by.clone().map_or(Value::Null, Value::String),
        );
        data.insert("info".to_owned(), Value::Object(cancellation.info.clone()));
        self.send_scoped(kinds::INTENTION_CANCELLED, &intention.scope(), data)?;
        Ok(())
    }

    fn notify_applied(&mut self, id: IntentionId, intention: &dyn Intention) -> Result<(), KernelError> {
        let mut data = Map::new();
        data.insert("intention_id".to_owned(), Value::from(id.get()));
        data.insert(
            "intention_type".to_owned(),
            Value::String(intention.intention_type().to_owned()),
        );
        self.send_scoped(kinds::INTENTION_APPLIED, &intention.scope(), data)?;
        Ok(())
    }
}
