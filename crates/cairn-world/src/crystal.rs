//! Crystals: items grown inside caves.

use cairn_core::{KernelError, StateItem};
use cairn_types::StateMap;

/// Type tag of [`Crystal`].
pub const CRYSTAL_TYPE: &str = "Crystal";

/// A crystal located in a cave.
#[derive(Debug, Clone, PartialEq)]
pub struct Crystal {
    name: String,
    state: StateMap,
}

impl Crystal {
    /// The name of the `ordinal`-th crystal grown in `cave`.
    pub fn name_for(cave: &str, ordinal: u64) -> String {
        format!("{cave}-crystal-{ordinal}")
    }

    /// A crystal grown in `cave` during `tick`.
    pub fn new(name: &str, cave: &str, tick: u64) -> Self {
        let mut state = StateMap::new();
        state.set("cave", cave);
        state.set("grown_at", tick);
        Self {
            name: name.to_owned(),
            state,
        }
    }

    /// Constructor registered for [`CRYSTAL_TYPE`].
    pub fn construct(name: &str, state: StateMap) -> Result<Box<dyn StateItem>, KernelError> {
        if state.get_str("cave").is_err() {
            return Err(KernelError::InvalidItemData {
                name: name.to_owned(),
                reason: "crystal is not in a cave".to_owned(),
            });
        }
        Ok(Box::new(Self {
            name: name.to_owned(),
            state,
        }))
    }
}

impl StateItem for Crystal {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_tag(&self) -> &str {
        CRYSTAL_TYPE
    }

    fn state(&self) -> &StateMap {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StateMap {
        &mut self.state
    }

    fn zone_name(&self) -> Option<&str> {
        self.location_name()
    }

    fn location_name(&self) -> Option<&str> {
        self.state.get_str("cave").ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn crystals_live_in_their_cave() {
        let crystal = Crystal::new(&Crystal::name_for("cave1", 2), "cave1", 3);
        assert_eq!(crystal.name(), "cave1-crystal-2");
        assert_eq!(crystal.location_name(), Some("cave1"));
        assert_eq!(crystal.zone_name(), Some("cave1"));
        assert!(!crystal.is_zone());
    }

    #[test]
    fn construct_requires_a_cave() {
        assert!(matches!(
            Crystal::construct("loose", StateMap::new()),
            Err(KernelError::InvalidItemData { .. })
        ));
        let state = Crystal::new("c", "cave1", 1).state().clone();
        assert!(Crystal::construct("c", state).is_ok());
    }
}
