//! The state item capability interface.
//!
//! A state item is the unit of persistent simulated state: a unique name, a
//! type tag and a [`StateMap`] payload. Behaviour is attached per type tag
//! through the [`TypeRegistry`](crate::item_type::TypeRegistry), so the tag
//! survives serialization and behaviour is rebound when a dump is loaded.
//!
//! Items are mutated through their payload, normally from inside an
//! intention's apply step.

use std::fmt;

use cairn_types::StateMap;

use crate::error::KernelError;
use crate::intention::{Cancellation, Intention, OfferDetails};
use crate::registry::StateRegistry;

/// Name of the admin item that holds the kernel counters.
pub const ADMIN_ITEM: &str = "admin";

/// Keys of the kernel counters stored in the admin item.
pub mod counters {
    /// Completed ticks.
    pub const TICKS: &str = "ticks";
    /// Last assigned notification id.
    pub const NOTIFICATION_ID: &str = "notification_id";
    /// Last assigned intention id.
    pub const INTENTION_ID: &str = "intention_id";
    /// All counters, in dump order.
    pub const ALL: [&str; 3] = [TICKS, NOTIFICATION_ID, INTENTION_ID];
}

/// Capability interface implemented by every state item variant.
pub trait StateItem: fmt::Debug {
    /// Unique, immutable name.
    fn name(&self) -> &str;

    /// Type tag used to rebuild this item from a structured state triple.
    fn type_tag(&self) -> &str;

    /// The item's data payload.
    fn state(&self) -> &StateMap;

    /// Mutable access to the item's data payload.
    fn state_mut(&mut self) -> &mut StateMap;

    /// Whether this item is a top-level zone.
    fn is_zone(&self) -> bool {
        false
    }

    /// Name of the zone this item lives in. Zones are their own zone.
    fn zone_name(&self) -> Option<&str> {
        self.is_zone().then_some(self.name())
    }

    /// Name of the item that contains this one, if any.
    fn location_name(&self) -> Option<&str> {
        None
    }

    /// Intentions this item wants processed on the next tick.
    ///
    /// The kernel only asks zones; a zone gathers on behalf of whatever it
    /// contains.
    fn intentions_for_next_step(&self, _registry: &StateRegistry) -> Vec<Box<dyn Intention>> {
        Vec::new()
    }

    /// Veto an intention offered in this zone.
    ///
    /// Called during the offer phase on the zone named by the intention's
    /// scope. Returning a [`Cancellation`] cancels the intention.
    fn intercept_offer(&self, _offer: &OfferDetails<'_>) -> Option<Cancellation> {
        None
    }

    /// Post-load hook, run once after every item of a load is registered.
    ///
    /// The item is detached from the registry while its own hook runs, so
    /// `registry` holds every other item.
    fn finished_init(&mut self, _registry: &StateRegistry) -> Result<(), KernelError> {
        Ok(())
    }

    /// Take in an item registered after finalization whose location is this
    /// item. Items present at load time are picked up by `finished_init`.
    fn adopt_item(&mut self, _name: &str) {}

    /// Forget a contained item that is being unregistered.
    fn release_item(&mut self, _name: &str) {}
}

/// Type tag of [`InertItem`].
pub const INERT_TYPE: &str = "InertStateItem";

/// A plain data holder with no behaviour. The admin item is one.
#[derive(Debug, Clone, PartialEq)]
pub struct InertItem {
    name: String,
    state: StateMap,
}

impl InertItem {
    /// Create an inert item.
    pub fn new(name: impl Into<String>, state: StateMap) -> Self {
        Self {
            name: name.into(),
            state,
        }
    }

    /// Constructor registered for [`INERT_TYPE`].
    pub fn construct(name: &str, state: StateMap) -> Result<Box<dyn StateItem>, KernelError> {
        Ok(Box::new(Self::new(name, state)))
    }
}

impl StateItem for InertItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_tag(&self) -> &str {
        INERT_TYPE
    }

    fn state(&self) -> &StateMap {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StateMap {
        &mut self.state
    }
}
