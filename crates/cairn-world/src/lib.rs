//! Caves, crystals and the starting world for the Cairn simulation.
//!
//! The world is a set of cave zones. Every tick each cave counts up; at its
//! growth threshold it grows a crystal inside itself within the same tick.
//!
//! # Modules
//!
//! - [`cave`] -- The [`Cave`] zone and counter inspection.
//! - [`crystal`] -- [`Crystal`] items that live inside caves.
//! - [`error`] -- Error types for world construction and inspection.
//! - [`intentions`] -- The count and grow intentions caves propose.
//! - [`starting_world`] -- Type registration and the default two-cave world.

pub mod cave;
pub mod crystal;
pub mod error;
pub mod intentions;
pub mod starting_world;

// Re-export primary types at crate root.
pub use cave::{CAVE_TYPE, Cave, CaveCounters, cave_counters};
pub use crystal::{CRYSTAL_TYPE, Crystal};
pub use error::WorldError;
pub use intentions::{CountIntention, GrowIntention};
pub use starting_world::{
    STARTING_CAVES, create_starting_world, load_world, register_types, world_types,
};
