//! Notification records and subscription filters.
//!
//! A [`Notification`] describes something that already happened. It is
//! numbered when sent, queued, and delivered to every matching subscription
//! when the bus is flushed. Records are never modified after creation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::ids::NotificationId;

/// Zone name reserved for kernel-wide events.
pub const ADMIN_ZONE: &str = "admin";

/// Well-known notification types emitted by the kernel.
pub mod kinds {
    /// A recoverable problem the kernel handled (e.g. a rolled-back batch).
    pub const ADMIN_WARNING: &str = "admin_warning";
    /// Sent once per tick after all intentions have settled.
    pub const TICK_FINISHED: &str = "tick finished";
    /// Sent when an item is registered after initial finalization.
    pub const NEW_ITEM: &str = "new item";
    /// Sent before a structured state dump replaces the registry.
    pub const LOAD_STATE_START: &str = "load_state_start";
    /// Sent after a structured state dump has been loaded and finalized.
    pub const LOAD_STATE_END: &str = "load_state_end";
    /// Sent when an intention is cancelled without the `silent` flag.
    pub const INTENTION_CANCELLED: &str = "intention_cancelled";
    /// Sent after an intention's apply step succeeds.
    pub const INTENTION_APPLIED: &str = "intention_applied";
}

/// A fully-qualified event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Notification {
    /// Sequence number assigned at send time.
    pub id: NotificationId,
    /// Event type, e.g. `"tick finished"`.
    #[serde(rename = "type")]
    pub notification_type: String,
    /// Zone the event happened in (`"admin"` for kernel-wide events).
    pub zone: String,
    /// Location inside the zone, if any.
    pub location: Option<String>,
    /// Item that caused the event, if any.
    pub actor: Option<String>,
    /// Free-form payload.
    #[ts(type = "Record<string, unknown>")]
    pub data: Map<String, Value>,
}

/// Where an event happens: zone plus optional location and actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Scope {
    /// Zone name.
    pub zone: String,
    /// Location name, if any.
    pub location: Option<String>,
    /// Actor name, if any.
    pub actor: Option<String>,
}

impl Scope {
    /// The kernel-wide scope: zone `"admin"`, no location, no actor.
    pub fn admin() -> Self {
        Self {
            zone: ADMIN_ZONE.to_owned(),
            location: None,
            actor: None,
        }
    }

    /// A scope in `zone` with no location or actor.
    pub fn zone(zone: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            location: None,
            actor: None,
        }
    }

    /// Set the location.
    #[must_use]
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the actor.
    #[must_use]
    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// Per-field filter of a subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum FieldSpec {
    /// Match every value, including an absent one.
    #[default]
    All,
    /// Match only the listed values. An absent value never matches.
    Only(BTreeSet<String>),
}

impl FieldSpec {
    /// Match exactly the given values.
    pub fn only<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(values.into_iter().map(Into::into).collect())
    }

    /// Whether `value` passes this filter.
    pub fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Only(allowed) => value.is_some_and(|v| allowed.contains(v)),
        }
    }
}
