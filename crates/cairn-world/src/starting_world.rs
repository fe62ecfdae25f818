//! Default starting world: two empty caves.

use cairn_core::{Engine, TypeRegistry};
use cairn_types::StructuredState;
use tracing::info;

use crate::cave::{CAVE_TYPE, Cave};
use crate::crystal::{CRYSTAL_TYPE, Crystal};
use crate::error::WorldError;

/// Names of the caves in the starting world, in registration order.
pub const STARTING_CAVES: [&str; 2] = ["cave1", "cave2"];

/// Register every world item type.
pub fn register_types(types: &mut TypeRegistry) -> Result<(), WorldError> {
    types.register(CAVE_TYPE, Cave::construct)?;
    types.register(CRYSTAL_TYPE, Crystal::construct)?;
    Ok(())
}

/// A type registry holding the kernel built-ins and every world type.
pub fn world_types() -> Result<TypeRegistry, WorldError> {
    let mut types = TypeRegistry::with_builtins();
    register_types(&mut types)?;
    Ok(types)
}

/// Build and finalize the starting world.
pub fn create_starting_world() -> Result<Engine, WorldError> {
    let mut engine = Engine::new(world_types()?)?;
    for name in STARTING_CAVES {
        engine.register_state_item(Box::new(Cave::new(name)))?;
    }
    engine.finished_init()?;
    info!(caves = STARTING_CAVES.len(), "Starting world created");
    Ok(engine)
}

/// Rebuild a world from a structured state dump.
pub fn load_world(state: StructuredState) -> Result<Engine, WorldError> {
    let items = state.len();
    let engine = Engine::from_structured_state(world_types()?, state)?;
    info!(items, "World loaded from structured state");
    Ok(engine)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cairn_core::StateItem;

    use super::*;

    #[test]
    fn starting_world_has_two_caves() {
        let engine = create_starting_world().unwrap();
        let zones: Vec<_> = engine.zones().map(StateItem::name).collect();
        assert_eq!(zones, STARTING_CAVES);
        assert!(engine.registry().is_finalized());
        assert_eq!(engine.ticks().unwrap(), 0);
    }

    #[test]
    fn registering_world_types_twice_is_harmless() {
        let mut types = world_types().unwrap();
        assert!(register_types(&mut types).is_ok());
        assert!(types.contains(CAVE_TYPE));
        assert!(types.contains(CRYSTAL_TYPE));
    }

    #[test]
    fn dump_of_starting_world_loads_back() {
        let engine = create_starting_world().unwrap();
        let dump = engine.structured_state();
        let loaded = load_world(dump.clone()).unwrap();
        assert_eq!(loaded.structured_state(), dump);
    }
}
