//! Structured state: the canonical serialized form of a whole registry.
//!
//! Every state item serializes to a `(type_tag, name, data)` triple and a
//! registry serializes to an ordered sequence of them. On the wire a triple
//! is a three-element JSON array:
//!
//! ```json
//! [["InertStateItem", "admin", {"ticks": 3}], ["Cave", "cave1", {"count": 0}]]
//! ```

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::state::StateMap;

/// An owned `(type_tag, name, data)` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct StateTriple {
    /// Type tag resolved through the type registry on load.
    pub type_tag: String,
    /// Unique item name.
    pub name: String,
    /// The item's data payload.
    pub data: StateMap,
}

impl StateTriple {
    /// Build a triple from its parts.
    pub fn new(type_tag: impl Into<String>, name: impl Into<String>, data: StateMap) -> Self {
        Self {
            type_tag: type_tag.into(),
            name: name.into(),
            data,
        }
    }

    /// Borrow this triple as a view.
    pub fn as_ref(&self) -> StateTripleRef<'_> {
        StateTripleRef {
            type_tag: &self.type_tag,
            name: &self.name,
            data: &self.data,
        }
    }
}

impl Serialize for StateTriple {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StateTriple {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (type_tag, name, data) = <(String, String, StateMap)>::deserialize(deserializer)?;
        Ok(Self {
            type_tag,
            name,
            data,
        })
    }
}

/// A borrowed triple aliasing a live item's payload.
///
/// Views are only valid while the registry they were taken from is not
/// mutated; the borrow checker enforces this.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateTripleRef<'a> {
    /// Type tag of the item.
    pub type_tag: &'a str,
    /// Unique item name.
    pub name: &'a str,
    /// The live data payload.
    pub data: &'a StateMap,
}

impl StateTripleRef<'_> {
    /// Copy the view into an independent owned triple.
    pub fn to_owned_triple(&self) -> StateTriple {
        StateTriple::new(self.type_tag, self.name, self.data.clone())
    }
}

impl Serialize for StateTripleRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.type_tag, self.name, self.data).serialize(serializer)
    }
}

/// An ordered sequence of owned triples describing a whole registry.
pub type StructuredState = Vec<StateTriple>;
