//! Caves: the zones of the starting world.
//!
//! A cave counts up by one every tick. When the count reaches the cave's
//! growth threshold the cave grows a crystal, resets the count and bumps its
//! `grown` counter, all within the same tick. A cave holds at most
//! `capacity` crystals; further growth is cancelled during the offer.
//!
//! Payload keys:
//!
//! | key         | meaning                                  |
//! |-------------|------------------------------------------|
//! | `count`     | ticks since the last growth              |
//! | `grown`     | crystals grown so far                    |
//! | `threshold` | count at which a crystal grows           |
//! | `capacity`  | most crystals the cave can hold          |
//! | `contents`  | names of the crystals in the cave        |

use cairn_core::{Cancellation, Intention, KernelError, OfferDetails, StateItem, StateRegistry};
use cairn_types::StateMap;
use serde_json::Value;

use crate::error::WorldError;
use crate::intentions::{CountIntention, GROW_TYPE};

/// Type tag of [`Cave`].
pub const CAVE_TYPE: &str = "Cave";

/// Default growth threshold.
pub const DEFAULT_THRESHOLD: u64 = 3;

/// Default crystal capacity.
pub const DEFAULT_CAPACITY: u64 = 16;

/// A cave zone.
#[derive(Debug, Clone, PartialEq)]
pub struct Cave {
    name: String,
    state: StateMap,
}

impl Cave {
    /// A fresh cave with zeroed counters and default limits.
    pub fn new(name: &str) -> Self {
        let mut state = StateMap::new();
        state.set("count", 0_u64);
        state.set("grown", 0_u64);
        state.set("threshold", DEFAULT_THRESHOLD);
        state.set("capacity", DEFAULT_CAPACITY);
        state.set("contents", Vec::<Value>::new());
        Self {
            name: name.to_owned(),
            state,
        }
    }

    /// Override the crystal capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.state.set("capacity", capacity);
        self
    }

    /// Constructor registered for [`CAVE_TYPE`].
    ///
    /// Missing counters and limits are filled in with their defaults;
    /// present ones must be non-negative integers.
    pub fn construct(name: &str, mut state: StateMap) -> Result<Box<dyn StateItem>, KernelError> {
        for (key, default) in [
            ("count", 0),
            ("grown", 0),
            ("threshold", DEFAULT_THRESHOLD),
            ("capacity", DEFAULT_CAPACITY),
        ] {
            if !state.has_key(key) {
                state.set(key, default);
            } else if state.get_u64(key).is_err() {
                return Err(KernelError::InvalidItemData {
                    name: name.to_owned(),
                    reason: format!("{key} must be a non-negative integer"),
                });
            }
        }
        if !state.has_key("contents") {
            state.set("contents", Vec::<Value>::new());
        }
        Ok(Box::new(Self {
            name: name.to_owned(),
            state,
        }))
    }

    fn take_contents(&mut self) -> Vec<Value> {
        match self.state.remove("contents") {
            Some(Value::Array(names)) => names,
            _ => Vec::new(),
        }
    }
}

impl StateItem for Cave {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_tag(&self) -> &str {
        CAVE_TYPE
    }

    fn state(&self) -> &StateMap {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StateMap {
        &mut self.state
    }

    fn is_zone(&self) -> bool {
        true
    }

    fn intentions_for_next_step(&self, _registry: &StateRegistry) -> Vec<Box<dyn Intention>> {
        vec![Box::new(CountIntention::new(&self.name))]
    }

    fn intercept_offer(&self, offer: &OfferDetails<'_>) -> Option<Cancellation> {
        if offer.intention_type != GROW_TYPE {
            return None;
        }
        let capacity = self.state.get_u64("capacity").unwrap_or(DEFAULT_CAPACITY);
        let held = self
            .state
            .get_array("contents")
            .map_or(0, |contents| u64::try_from(contents.len()).unwrap_or(u64::MAX));
        (held >= capacity).then(|| Cancellation::new("cave is full"))
    }

    fn finished_init(&mut self, registry: &StateRegistry) -> Result<(), KernelError> {
        let contents: Vec<Value> = registry
            .iter()
            .filter(|item| item.location_name() == Some(self.name.as_str()))
            .map(|item| Value::String(item.name().to_owned()))
            .collect();
        self.state.set("contents", contents);
        Ok(())
    }

    fn adopt_item(&mut self, name: &str) {
        let mut contents = self.take_contents();
        contents.push(Value::String(name.to_owned()));
        self.state.set("contents", contents);
    }

    fn release_item(&mut self, name: &str) {
        let mut contents = self.take_contents();
        contents.retain(|entry| entry.as_str() != Some(name));
        self.state.set("contents", contents);
    }
}

/// Snapshot of a cave's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaveCounters {
    /// Ticks since the last growth.
    pub count: u64,
    /// Crystals grown so far.
    pub grown: u64,
    /// Crystals currently in the cave.
    pub crystals: usize,
}

/// Read a cave's counters out of a registry.
pub fn cave_counters(registry: &StateRegistry, cave: &str) -> Result<CaveCounters, WorldError> {
    let item = registry
        .get(cave)
        .filter(|item| item.type_tag() == CAVE_TYPE)
        .ok_or_else(|| WorldError::CaveNotFound(cave.to_owned()))?;
    let state = item.state();
    let corrupt = |field| WorldError::CorruptCave {
        cave: cave.to_owned(),
        field,
    };
    Ok(CaveCounters {
        count: state.get_u64("count").ok().ok_or_else(|| corrupt("count"))?,
        grown: state.get_u64("grown").ok().ok_or_else(|| corrupt("grown"))?,
        crystals: state.get_array("contents").map_or(0, Vec::len),
    })
}
