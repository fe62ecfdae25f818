//! The state item registry.
//!
//! Owns every live item, keyed by unique name, together with the
//! registration order (which is also the dump order) and the ordered list of
//! zones. The admin item and its counters live here as ordinary state.

use std::collections::BTreeMap;

use cairn_types::{StateMap, StateTripleRef, StructuredState};
use tracing::{debug, warn};

use crate::codec;
use crate::error::KernelError;
use crate::item::{ADMIN_ITEM, InertItem, StateItem, counters};
use crate::item_type::TypeRegistry;

/// Live state items plus zone and lifecycle bookkeeping.
#[derive(Debug, Default)]
pub struct StateRegistry {
    /// Items by unique name.
    items: BTreeMap<String, Box<dyn StateItem>>,
    /// Item names in registration order.
    order: Vec<String>,
    /// Zone names in registration order.
    zones: Vec<String>,
    /// Whether `finalize` has run.
    finalized: bool,
}

impl StateRegistry {
    /// Create a registry holding only a fresh admin item.
    pub fn with_admin() -> Self {
        let mut registry = Self::default();
        registry.ensure_admin();
        registry
    }

    /// Build a complete replacement registry from structured state.
    ///
    /// Either every triple loads or the error is returned and nothing is
    /// built. The admin item is created if the dump lacks one, and its
    /// counters are filled in where missing. The result is not finalized.
    pub fn load(types: &TypeRegistry, triples: StructuredState) -> Result<Self, KernelError> {
        let mut registry = Self::default();
        for triple in triples {
            let item = codec::decode(types, triple)?;
            registry.insert(item)?;
        }
        registry.ensure_admin();
        debug!(items = registry.len(), zones = registry.zones.len(), "Structured state loaded");
        Ok(registry)
    }

    /// Add an item. Zones are also appended to the zone list.
    ///
    /// Once finalized, the item's container is told to adopt it.
    pub fn insert(&mut self, item: Box<dyn StateItem>) -> Result<(), KernelError> {
        let name = item.name().to_owned();
        if self.items.contains_key(&name) {
            return Err(KernelError::DuplicateName { name });
        }
        if item.is_zone() {
            self.zones.push(name.clone());
        }
        let location = item.location_name().map(str::to_owned);
        self.order.push(name.clone());
        self.items.insert(name.clone(), item);
        if !self.finalized {
            return Ok(());
        }
        if let Some(container) = location.and_then(|location| self.items.get_mut(&location)) {
            container.adopt_item(&name);
        }
        Ok(())
    }

    /// Remove an item, telling its container to forget it.
    ///
    /// Other items still referring to it by name are left alone.
    pub fn remove(&mut self, name: &str) -> Result<Box<dyn StateItem>, KernelError> {
        let item = self
            .items
            .remove(name)
            .ok_or_else(|| KernelError::NoSuchItem {
                name: name.to_owned(),
            })?;
        self.order.retain(|n| n != name);
        self.zones.retain(|n| n != name);
        if let Some(container) = item
            .location_name()
            .and_then(|location| self.items.get_mut(location))
        {
            container.release_item(name);
        }
        Ok(item)
    }

    /// Look up an item by name.
    pub fn get(&self, name: &str) -> Option<&dyn StateItem> {
        self.items.get(name).map(|item| &**item)
    }

    /// Look up an item by name for modification.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn StateItem + 'static)> {
        self.items.get_mut(name).map(|item| &mut **item)
    }

    /// Whether an item with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    /// Number of registered items, admin included.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the registry holds no items at all.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn StateItem> {
        self.order.iter().filter_map(|name| self.get(name))
    }

    /// Zones in registration order.
    pub fn zones(&self) -> impl Iterator<Item = &dyn StateItem> {
        self.zones.iter().filter_map(|name| self.get(name))
    }

    /// Zone names in registration order.
    pub fn zone_names(&self) -> &[String] {
        &self.zones
    }

    /// Whether `finalize` has run.
    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Run every item's post-load hook once.
    ///
    /// Each item is detached while its own hook runs and reinserted
    /// afterwards, even if the hook fails.
    pub fn finalize(&mut self) -> Result<(), KernelError> {
        if self.finalized {
            return Err(KernelError::DuplicateFinalization);
        }
        self.finalized = true;
        for name in self.order.clone() {
            let Some(mut item) = self.items.remove(&name) else {
                continue;
            };
            let result = item.finished_init(self);
            self.items.insert(name, item);
            result?;
        }
        Ok(())
    }

    /// Independent deep copy of every item, in registration order.
    pub fn structured_state(&self) -> StructuredState {
        self.iter().map(codec::encode).collect()
    }

    /// Borrowing view of every item, in registration order.
    pub fn structured_state_view(&self) -> Vec<StateTripleRef<'_>> {
        self.iter().map(codec::encode_ref).collect()
    }

    // -----------------------------------------------------------------------
    // Admin counters
    // -----------------------------------------------------------------------

    /// Read an admin counter.
    pub fn counter(&self, key: &'static str) -> Result<u64, KernelError> {
        Ok(self.admin()?.state().get_u64(key)?)
    }

    /// Increment an admin counter and return the new value.
    pub fn bump_counter(&mut self, key: &'static str) -> Result<u64, KernelError> {
        let next = self
            .counter(key)?
            .checked_add(1)
            .ok_or(KernelError::CounterOverflow { counter: key })?;
        self.set_counter(key, next)?;
        Ok(next)
    }

    /// Overwrite an admin counter.
    pub fn set_counter(&mut self, key: &'static str, value: u64) -> Result<(), KernelError> {
        let admin = self
            .get_mut(ADMIN_ITEM)
            .ok_or_else(|| KernelError::NoSuchItem {
                name: ADMIN_ITEM.to_owned(),
            })?;
        admin.state_mut().set(key, value);
        Ok(())
    }

    fn admin(&self) -> Result<&dyn StateItem, KernelError> {
        self.get(ADMIN_ITEM).ok_or_else(|| KernelError::NoSuchItem {
            name: ADMIN_ITEM.to_owned(),
        })
    }

    /// Create the admin item if missing and make its counters valid,
    /// keeping every value that already is.
    fn ensure_admin(&mut self) {
        if !self.items.contains_key(ADMIN_ITEM) {
            let admin = InertItem::new(ADMIN_ITEM, StateMap::new());
            self.items.insert(ADMIN_ITEM.to_owned(), Box::new(admin));
            self.order.insert(0, ADMIN_ITEM.to_owned());
        }
        let Some(admin) = self.items.get_mut(ADMIN_ITEM) else {
            return;
        };
        let state = admin.state_mut();
        for key in counters::ALL {
            match state.get(key).ok().cloned() {
                Some(value) if value.as_u64().is_some() => {}
                Some(value) => {
                    warn!(counter = key, value = %value, "Invalid admin counter reset to 0");
                    state.set(key, 0_u64);
                }
                None => {
                    state.set(key, 0_u64);
                }
            }
        }
    }
}
