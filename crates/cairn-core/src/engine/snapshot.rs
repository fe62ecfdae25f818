//! Structured state snapshots, dump restore and batch rollback.

use cairn_types::{ADMIN_ZONE, NotificationId, StateTripleRef, StructuredState, kinds};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::Engine;
use crate::error::KernelError;
use crate::item::counters;
use crate::registry::StateRegistry;

impl Engine {
    /// Independent deep copy of every item, in registration order.
    pub fn structured_state(&self) -> StructuredState {
        self.registry.structured_state()
    }

    /// Borrowing view of every item. The engine cannot be mutated while the
    /// view is alive.
    pub fn structured_state_view(&self) -> Vec<StateTripleRef<'_>> {
        self.registry.structured_state_view()
    }

    /// Replace the whole registry with `state`.
    ///
    /// A `load_state_start` notification is sent before the load and a
    /// `load_state_end` after it, then the bus is flushed so handlers reacting
    /// to the load run before this returns. Both bracketing notifications are
    /// numbered by the outgoing registry; the loaded counters are exactly
    /// those of the dump.
    ///
    /// # Errors
    ///
    /// Returns the first decode, duplicate-name or `finished_init` error, in
    /// which case the engine is left untouched. Errors from the final flush
    /// are returned after the new state is in place.
    pub fn load_state_from_dump(&mut self, state: StructuredState) -> Result<(), KernelError> {
        let mark = NotificationId::new(self.registry.counter(counters::NOTIFICATION_ID)?);
        let items = state.len();

        let mut data = Map::new();
        data.insert("items".to_owned(), Value::from(items));
        self.send_notification(kinds::LOAD_STATE_START, ADMIN_ZONE, None, None, data.clone())?;
        let end_id = NotificationId::new(self.registry.bump_counter(counters::NOTIFICATION_ID)?);

        let registry = match StateRegistry::load(&self.types, state).and_then(|mut registry| {
            registry.finalize()?;
            Ok(registry)
        }) {
            Ok(registry) => registry,
            Err(err) => {
                self.bus.discard_after(mark);
                return Err(err);
            }
        };
        self.registry = registry;
        info!(items, "Loaded state from dump");

        self.enqueue_notification(end_id, kinds::LOAD_STATE_END, ADMIN_ZONE, None, None, data);
        self.flush_notifications()?;
        Ok(())
    }

    /// Restore the registry to a pre-batch snapshot.
    ///
    /// The intention and notification id counters keep their current
    /// values so ids are never reused, and pending notifications numbered
    /// after `last_kept` are dropped.
    pub(crate) fn rollback(
        &mut self,
        snapshot: StructuredState,
        last_kept: NotificationId,
    ) -> Result<(), KernelError> {
        let intention_id = self.registry.counter(counters::INTENTION_ID)?;
        let notification_id = self.registry.counter(counters::NOTIFICATION_ID)?;

        let mut registry = StateRegistry::load(&self.types, snapshot)?;
        registry.finalize()?;
        registry.set_counter(counters::INTENTION_ID, intention_id)?;
        registry.set_counter(counters::NOTIFICATION_ID, notification_id)?;
        self.registry = registry;

        let dropped = self.bus.discard_after(last_kept);
        debug!(intention_id, notification_id, dropped, "Registry rolled back");
        Ok(())
    }
}
