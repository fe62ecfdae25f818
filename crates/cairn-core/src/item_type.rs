//! Type registry: maps type tags to item constructors.
//!
//! The registry is owned by one engine and handed to it at construction, so
//! two engines in the same process never see each other's types.

use std::collections::BTreeMap;

use cairn_types::StateMap;
use tracing::debug;

use crate::error::KernelError;
use crate::item::{INERT_TYPE, InertItem, StateItem};

/// Builds a state item from its name and data payload.
pub type ItemConstructor = fn(&str, StateMap) -> Result<Box<dyn StateItem>, KernelError>;

/// Constructor table keyed by type tag.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    constructors: BTreeMap<String, ItemConstructor>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the kernel's built-in types.
    pub fn with_builtins() -> Self {
        let mut constructors: BTreeMap<String, ItemConstructor> = BTreeMap::new();
        constructors.insert(INERT_TYPE.to_owned(), InertItem::construct);
        Self { constructors }
    }

    /// Register `constructor` under `type_tag`.
    ///
    /// Registering the same constructor twice is a no-op. Registering a
    /// different constructor for a tag that is already taken is a
    /// configuration error.
    pub fn register(
        &mut self,
        type_tag: &str,
        constructor: ItemConstructor,
    ) -> Result<(), KernelError> {
        if let Some(existing) = self.constructors.get(type_tag) {
            if std::ptr::fn_addr_eq(*existing, constructor) {
                return Ok(());
            }
            return Err(KernelError::ConflictingType {
                type_tag: type_tag.to_owned(),
            });
        }
        debug!(type_tag, "Registered state item type");
        self.constructors.insert(type_tag.to_owned(), constructor);
        Ok(())
    }

    /// Look up the constructor for `type_tag`.
    pub fn resolve(&self, type_tag: &str) -> Result<ItemConstructor, KernelError> {
        self.constructors
            .get(type_tag)
            .copied()
            .ok_or_else(|| KernelError::UnknownType {
                type_tag: type_tag.to_owned(),
            })
    }

    /// Whether `type_tag` is registered.
    pub fn contains(&self, type_tag: &str) -> bool {
        self.constructors.contains_key(type_tag)
    }

    /// Registered tags in sorted order.
    pub fn type_tags(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}
