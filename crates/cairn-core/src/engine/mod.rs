//! The engine: owner of the registry, the intention queue and the
//! notification bus, and driver of the tick cycle.
//!
//! Each call to [`Engine::advance_one_tick`] runs these phases:
//!
//! 1. **Gather** -- every zone, in registration order, proposes intentions
//!    for the next step. They are queued with fresh ids.
//! 2. **Drain** -- the intention queue is flushed batch by batch, each batch
//!    guarded by a snapshot of the registry (see [`Engine::flush_intentions`]).
//! 3. **Announce** -- a `"tick finished"` notification is sent to the admin
//!    zone.
//! 4. **Deliver** -- the notification bus is flushed wave by wave.
//! 5. **Count** -- the `ticks` counter in the admin item is incremented.
//!
//! The cycle is deterministic given the same starting state and the same
//! item, intention and handler behaviour.

mod intentions;
mod notifications;
mod snapshot;

use cairn_types::{ADMIN_ZONE, StructuredState, kinds};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::KernelError;
use crate::intention::{IntentionFlushReport, IntentionQueue};
use crate::item::{INERT_TYPE, InertItem, StateItem, counters};
use crate::item_type::TypeRegistry;
use crate::notification::{NotificationBus, NotificationFlushReport};
use crate::registry::StateRegistry;

/// Summary of a single tick's execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    /// The tick number that was executed, counting from 1.
    pub tick: u64,
    /// What the intention phase did.
    pub intentions: IntentionFlushReport,
    /// What the delivery phase did.
    pub notifications: NotificationFlushReport,
}

/// The simulation kernel.
#[derive(Debug)]
pub struct Engine {
    /// Constructors for every item type this engine can load.
    types: TypeRegistry,
    /// Live state items.
    registry: StateRegistry,
    /// Intentions waiting for the next batch.
    intentions: IntentionQueue,
    /// Pending notifications and subscriptions.
    bus: NotificationBus,
}

impl Engine {
    /// Create an engine holding only the admin item.
    ///
    /// The built-in inert item type is added to `types`. The registry is not
    /// finalized yet: register the starting items, then call
    /// [`Engine::finished_init`].
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::ConflictingType`] if `types` already maps the
    /// inert type tag to a different constructor.
    pub fn new(mut types: TypeRegistry) -> Result<Self, KernelError> {
        types.register(INERT_TYPE, InertItem::construct)?;
        Ok(Self {
            types,
            registry: StateRegistry::with_admin(),
            intentions: IntentionQueue::default(),
            bus: NotificationBus::default(),
        })
    }

    /// Create a finalized engine from structured state.
    ///
    /// No notifications are sent; use [`Engine::load_state_from_dump`] to
    /// replace the state of a running engine.
    ///
    /// # Errors
    ///
    /// Returns the first decode, duplicate-name or `finished_init` error.
    pub fn from_structured_state(
        types: TypeRegistry,
        state: StructuredState,
    ) -> Result<Self, KernelError> {
        let mut engine = Self::new(types)?;
        let mut registry = StateRegistry::load(&engine.types, state)?;
        registry.finalize()?;
        engine.registry = registry;
        Ok(engine)
    }

    /// The type registry.
    pub const fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Read access to the state registry.
    pub const fn registry(&self) -> &StateRegistry {
        &self.registry
    }

    /// Pending intentions.
    pub const fn intention_queue(&self) -> &IntentionQueue {
        &self.intentions
    }

    /// Pending notifications and live subscriptions.
    pub const fn notification_bus(&self) -> &NotificationBus {
        &self.bus
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    /// Look up an item by name.
    pub fn item_by_name(&self, name: &str) -> Option<&dyn StateItem> {
        self.registry.get(name)
    }

    /// Look up an item by name for modification.
    pub fn item_by_name_mut(&mut self, name: &str) -> Option<&mut (dyn StateItem + 'static)> {
        self.registry.get_mut(name)
    }

    /// Register an item.
    ///
    /// Once the registry is finalized a `"new item"` notification is sent,
    /// scoped to the item's zone (or the admin zone), its location, and with
    /// the item itself as actor.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::DuplicateName`] if the name is taken.
    pub fn register_state_item(&mut self, item: Box<dyn StateItem>) -> Result<(), KernelError> {
        let name = item.name().to_owned();
        let zone = item.zone_name().unwrap_or(ADMIN_ZONE).to_owned();
        let location = item.location_name().map(str::to_owned);
        let type_tag = item.type_tag().to_owned();
        self.registry.insert(item)?;
        debug!(item = %name, type_tag = %type_tag, "Registered state item");

        if self.registry.is_finalized() {
            let mut data = Map::new();
            data.insert("type".to_owned(), Value::String(type_tag));
            self.send_notification(
                kinds::NEW_ITEM,
                &zone,
                location.as_deref(),
                Some(&name),
                data,
            )?;
        }
        Ok(())
    }

    /// Unregister an item and return it.
    ///
    /// The item's container forgets it; nothing else is touched, so other
    /// items still naming it are left dangling.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::NoSuchItem`] if no item has this name.
    pub fn unregister_state_item(&mut self, name: &str) -> Result<Box<dyn StateItem>, KernelError> {
        let item = self.registry.remove(name)?;
        debug!(item = name, "Unregistered state item");
        Ok(item)
    }

    /// Run the post-load hook of every registered item.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::DuplicateFinalization`] on a second call, or the
    /// first error raised by a hook.
    pub fn finished_init(&mut self) -> Result<(), KernelError> {
        self.registry.finalize()
    }

    /// Zones in registration order.
    pub fn zones(&self) -> impl Iterator<Item = &dyn StateItem> {
        self.registry.zones()
    }

    /// Number of completed ticks.
    ///
    /// # Errors
    ///
    /// Returns an error only if the admin counter was corrupted after load.
    pub fn ticks(&self) -> Result<u64, KernelError> {
        self.registry.counter(counters::TICKS)
    }

    // -----------------------------------------------------------------------
    // Tick cycle
    // -----------------------------------------------------------------------

    /// Run one tick.
    ///
    /// # Errors
    ///
    /// Any fatal error aborts the tick. The registry is left as of the last
    /// committed intention batch and the tick counter is not incremented.
    pub fn advance_one_tick(&mut self) -> Result<TickSummary, KernelError> {
        // --- Gather ---
        let gathered = self.queue_zone_intentions()?;

        // --- Drain ---
        let intentions = self.flush_intentions()?;

        // --- Announce ---
        let tick = self.ticks()?.saturating_add(1);
        let mut data = Map::new();
        data.insert("tick".to_owned(), Value::from(tick));
        self.send_notification(kinds::TICK_FINISHED, ADMIN_ZONE, None, None, data)?;

        // --- Deliver ---
        let notifications = self.flush_notifications()?;

        // --- Count ---
        let tick = self.registry.bump_counter(counters::TICKS)?;

        info!(
            tick,
            gathered,
            batches = intentions.batches,
            applied = intentions.applied,
            cancelled = intentions.cancelled,
            rollbacks = intentions.rollbacks,
            waves = notifications.waves,
            deliveries = notifications.deliveries,
            "Tick finished"
        );

        Ok(TickSummary {
            tick,
            intentions,
            notifications,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use cairn_types::{FieldSpec, Notification};

    use super::*;
    use crate::notification::Subscription;
    use crate::test_support::{self, Chamber, Pebble};

    fn recorder(engine: &mut Engine) -> Rc<RefCell<Vec<Notification>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        engine.subscribe(Subscription::new(move |_, notification: &Notification| {
            sink.borrow_mut().push(notification.clone());
            Ok(())
        }));
        seen
    }

    #[test]
    fn new_engine_has_only_admin() {
        let engine = Engine::new(TypeRegistry::new()).unwrap();
        assert_eq!(engine.registry().len(), 1);
        assert!(engine.types().contains(INERT_TYPE));
        assert_eq!(engine.ticks().unwrap(), 0);
        assert!(!engine.registry().is_finalized());
    }

    #[test]
    fn conflicting_inert_constructor_is_rejected() {
        let mut types = TypeRegistry::new();
        types.register(INERT_TYPE, Pebble::construct).unwrap();
        assert!(matches!(
            Engine::new(types),
            Err(KernelError::ConflictingType { .. })
        ));
    }

    #[test]
    fn registration_before_finalize_is_silent() {
        let mut engine = Engine::new(test_support::types()).unwrap();
        engine.register_state_item(Box::new(Chamber::new("cave"))).unwrap();
        assert!(!engine.notification_bus().has_pending());
    }

    #[test]
    fn registration_after_finalize_announces_new_item() {
        let mut engine = Engine::new(test_support::types()).unwrap();
        engine.register_state_item(Box::new(Chamber::new("cave"))).unwrap();
        engine.finished_init().unwrap();
        let seen = recorder(&mut engine);

        engine
            .register_state_item(Box::new(Pebble::new("pebble", "cave")))
            .unwrap();
        engine.flush_notifications().unwrap();

        let seen = seen.borrow();
        let record = seen.first().unwrap();
        assert_eq!(record.notification_type, kinds::NEW_ITEM);
        assert_eq!(record.zone, "cave");
        assert_eq!(record.location.as_deref(), Some("cave"));
        assert_eq!(record.actor.as_deref(), Some("pebble"));
        assert_eq!(
            test_support::contents_of(engine.registry(), "cave"),
            ["pebble"]
        );
    }

    #[test]
    fn tick_sends_tick_finished_and_counts() {
        let mut engine = Engine::new(test_support::types()).unwrap();
        engine.finished_init().unwrap();
        let seen = recorder(&mut engine);

        let summary = engine.advance_one_tick().unwrap();
        assert_eq!(summary.tick, 1);
        assert_eq!(summary.intentions.batches, 0);
        assert_eq!(summary.notifications.records, 1);
        assert_eq!(engine.ticks().unwrap(), 1);

        let seen = seen.borrow();
        let record = seen.first().unwrap();
        assert_eq!(record.notification_type, kinds::TICK_FINISHED);
        assert_eq!(record.data.get("tick"), Some(&Value::from(1_u64)));
    }

    #[test]
    fn zones_propose_intentions_each_tick() {
        let mut engine = Engine::new(test_support::types()).unwrap();
        engine
            .register_state_item(Box::new(Chamber::with_drips("cave", 2)))
            .unwrap();
        engine.finished_init().unwrap();

        let summary = engine.advance_one_tick().unwrap();
        assert_eq!(summary.intentions.applied, 2);
        engine.advance_one_tick().unwrap();
        let drips = engine.item_by_name("cave").unwrap().state().get_u64("drips");
        assert_eq!(drips.unwrap(), 4);
    }

    #[test]
    fn unregister_unknown_item_fails() {
        let mut engine = Engine::new(TypeRegistry::new()).unwrap();
        assert!(matches!(
            engine.unregister_state_item("ghost"),
            Err(KernelError::NoSuchItem { .. })
        ));
    }

    #[test]
    fn from_structured_state_is_finalized_and_quiet() {
        let mut source = Engine::new(test_support::types()).unwrap();
        source.register_state_item(Box::new(Chamber::new("cave"))).unwrap();
        source
            .register_state_item(Box::new(Pebble::new("pebble", "cave")))
            .unwrap();
        source.finished_init().unwrap();

        let engine =
            Engine::from_structured_state(test_support::types(), source.structured_state())
                .unwrap();
        assert!(engine.registry().is_finalized());
        assert!(!engine.notification_bus().has_pending());
        assert_eq!(
            test_support::contents_of(engine.registry(), "cave"),
            ["pebble"]
        );
        let zones: Vec<_> = engine.zones().map(StateItem::name).collect();
        assert_eq!(zones, ["cave"]);
    }

    #[test]
    fn admin_zone_filter_sees_tick_finished_only() {
        let mut engine = Engine::new(test_support::types()).unwrap();
        engine.finished_init().unwrap();
        let count = Rc::new(RefCell::new(0_u32));
        let sink = Rc::clone(&count);
        engine.subscribe(
            Subscription::new(move |_, _| {
                let mut count = sink.borrow_mut();
                *count = count.saturating_add(1);
                Ok(())
            })
            .zones(FieldSpec::only([ADMIN_ZONE])),
        );
        engine
            .send_notification("say", "town", None, None, Map::new())
            .unwrap();
        engine.advance_one_tick().unwrap();
        assert_eq!(*count.borrow(), 1);
    }
}
