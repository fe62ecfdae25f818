//! Conversion between live state items and structured state triples.

use cairn_types::{StateTriple, StateTripleRef, StructuredState};

use crate::error::KernelError;
use crate::item::StateItem;
use crate::item_type::TypeRegistry;

/// Copy an item into an independent triple.
pub fn encode(item: &dyn StateItem) -> StateTriple {
    StateTriple::new(item.type_tag(), item.name(), item.state().clone())
}

/// View an item as a triple borrowing its live payload.
pub fn encode_ref(item: &dyn StateItem) -> StateTripleRef<'_> {
    StateTripleRef {
        type_tag: item.type_tag(),
        name: item.name(),
        data: item.state(),
    }
}

/// Rebuild a live item from a triple through the type registry.
pub fn decode(types: &TypeRegistry, triple: StateTriple) -> Result<Box<dyn StateItem>, KernelError> {
    let StateTriple {
        type_tag,
        name,
        data,
    } = triple;
    let constructor = types.resolve(&type_tag)?;
    let item = constructor(&name, data)?;
    if item.name() != name {
        return Err(KernelError::InvalidItemData {
            reason: format!("constructor renamed the item to {}", item.name()),
            name,
        });
    }
    if item.type_tag() != type_tag {
        return Err(KernelError::InvalidItemData {
            reason: format!(
                "constructor for {type_tag} built an item tagged {}",
                item.type_tag()
            ),
            name,
        });
    }
    Ok(item)
}

/// Render structured state as pretty-printed JSON.
pub fn to_json(state: &[StateTriple]) -> Result<String, KernelError> {
    Ok(serde_json::to_string_pretty(state)?)
}

/// Parse structured state from JSON.
pub fn from_json(text: &str) -> Result<StructuredState, KernelError> {
    Ok(serde_json::from_str(text)?)
}
