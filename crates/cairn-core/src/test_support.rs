//! Item and intention variants shared by the unit tests.

use cairn_types::{ADMIN_ZONE, IntentionId, Scope, StateMap};
use serde_json::{Map, Value};

use crate::engine::Engine;
use crate::error::KernelError;
use crate::intention::{ApplyError, Cancellation, Intention, Offer, OfferDetails};
use crate::item::StateItem;
use crate::item_type::TypeRegistry;
use crate::registry::StateRegistry;

pub const CHAMBER_TYPE: &str = "Chamber";
pub const PEBBLE_TYPE: &str = "Pebble";

pub fn types() -> TypeRegistry {
    let mut types = TypeRegistry::with_builtins();
    let _ = types.register(CHAMBER_TYPE, Chamber::construct);
    let _ = types.register(PEBBLE_TYPE, Pebble::construct);
    types
}

/// Names listed in a chamber's `contents`.
pub fn contents_of(registry: &StateRegistry, chamber: &str) -> Vec<String> {
    registry
        .get(chamber)
        .and_then(|item| item.state().get_array("contents").ok())
        .map(|contents| {
            contents
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// A zone that keeps a `contents` list of the pebbles located in it.
///
/// With `drip_rate` set it proposes that many bumps of its own `drips`
/// counter every tick; with `sealed` set it vetoes every offer in it.
#[derive(Debug)]
pub struct Chamber {
    name: String,
    state: StateMap,
}

impl Chamber {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            state: StateMap::new(),
        }
    }

    pub fn with_drips(name: &str, rate: u64) -> Self {
        let mut chamber = Self::new(name);
        chamber.state.set("drip_rate", rate);
        chamber.state.set("drips", 0_u64);
        chamber
    }

    pub fn sealed(name: &str) -> Self {
        let mut chamber = Self::new(name);
        chamber.state.set("sealed", true);
        chamber
    }

    pub fn construct(name: &str, state: StateMap) -> Result<Box<dyn StateItem>, KernelError> {
        Ok(Box::new(Self {
            name: name.to_owned(),
            state,
        }))
    }

    fn contents_mut(&mut self) -> Vec<Value> {
        self.state
            .remove("contents")
            .and_then(|contents| match contents {
                Value::Array(names) => Some(names),
                _ => None,
            })
            .unwrap_or_default()
    }
}

impl StateItem for Chamber {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_tag(&self) -> &str {
        CHAMBER_TYPE
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
        let rate = self.state.get_u64("drip_rate").unwrap_or(0);
        (0..rate)
            .map(|_| {
                Box::new(Bump::counting(&self.name, "drips").scoped(Scope::zone(&self.name)))
                    as Box<dyn Intention>
            })
            .collect()
    }

    fn intercept_offer(&self, _offer: &OfferDetails<'_>) -> Option<Cancellation> {
        self.state
            .get_bool("sealed")
            .unwrap_or(false)
            .then(|| Cancellation::new("sealed"))
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
        let mut contents = self.contents_mut();
        contents.push(Value::String(name.to_owned()));
        self.state.set("contents", contents);
    }

    fn release_item(&mut self, name: &str) {
        let mut contents = self.contents_mut();
        contents.retain(|entry| entry.as_str() != Some(name));
        self.state.set("contents", contents);
    }
}

/// A small item that lives in a chamber.
#[derive(Debug)]
pub struct Pebble {
    name: String,
    state: StateMap,
}

impl Pebble {
    pub fn new(name: &str, location: &str) -> Self {
        let mut state = StateMap::new();
        state.set("location", location);
        Self {
            name: name.to_owned(),
            state,
        }
    }

    pub fn construct(name: &str, state: StateMap) -> Result<Box<dyn StateItem>, KernelError> {
        if state.get_str("location").is_err() {
            return Err(KernelError::InvalidItemData {
                name: name.to_owned(),
                reason: "pebble needs a location".to_owned(),
            });
        }
        Ok(Box::new(Self {
            name: name.to_owned(),
            state,
        }))
    }
}

impl StateItem for Pebble {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_tag(&self) -> &str {
        PEBBLE_TYPE
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
        self.state.get_str("location").ok()
    }
}

// ---------------------------------------------------------------------------
// Intentions
// ---------------------------------------------------------------------------

fn bump_counter(engine: &mut Engine, target: &str, key: &str) -> Result<(), ApplyError> {
    let item = engine
        .item_by_name_mut(target)
        .ok_or_else(|| KernelError::NoSuchItem {
            name: target.to_owned(),
        })?;
    let next = item.state().get_u64(key).unwrap_or(0).saturating_add(1);
    item.state_mut().set(key, next);
    Ok(())
}

/// Increments a counter on its target.
#[derive(Debug, Clone)]
pub struct Bump {
    target: String,
    key: &'static str,
    scope: Scope,
}

impl Bump {
    pub fn new(target: &str) -> Self {
        Self::counting(target, "hits")
    }

    pub fn counting(target: &str, key: &'static str) -> Self {
        Self {
            target: target.to_owned(),
            key,
            scope: Scope::admin(),
        }
    }

    #[must_use]
    pub fn scoped(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }
}

impl Intention for Bump {
    fn intention_type(&self) -> &str {
        "bump"
    }

    fn scope(&self) -> Scope {
        self.scope.clone()
    }

    fn apply(&mut self, engine: &mut Engine, _id: IntentionId) -> Result<(), ApplyError> {
        bump_counter(engine, &self.target, self.key)
    }
}

/// Bumps its target, then queues itself again `remaining` more times.
#[derive(Debug)]
pub struct Echo {
    target: String,
    remaining: u32,
}

impl Echo {
    pub fn new(target: &str, remaining: u32) -> Self {
        Self {
            target: target.to_owned(),
            remaining,
        }
    }
}

impl Intention for Echo {
    fn intention_type(&self) -> &str {
        "echo"
    }

    fn apply(&mut self, engine: &mut Engine, _id: IntentionId) -> Result<(), ApplyError> {
        bump_counter(engine, &self.target, "hits")?;
        if let Some(remaining) = self.remaining.checked_sub(1) {
            engine.queue_intention(Box::new(Self::new(&self.target, remaining)))?;
        }
        Ok(())
    }
}

/// Never allowed.
#[derive(Debug)]
pub struct Forbidden;

impl Intention for Forbidden {
    fn intention_type(&self) -> &str {
        "forbidden"
    }

    fn allowed(&self, _engine: &Engine) -> bool {
        false
    }

    fn apply(&mut self, _engine: &mut Engine, _id: IntentionId) -> Result<(), ApplyError> {
        Ok(())
    }
}

/// Cancels itself during the offer.
#[derive(Debug)]
pub struct Veto {
    target: String,
    silent: bool,
}

impl Veto {
    pub fn loud(target: &str) -> Self {
        Self {
            target: target.to_owned(),
            silent: false,
        }
    }

    pub fn silent(target: &str) -> Self {
        Self {
            target: target.to_owned(),
            silent: true,
        }
    }
}

impl Intention for Veto {
    fn intention_type(&self) -> &str {
        "veto"
    }

    fn offer(&mut self, offer: &mut Offer<'_>) -> Result<(), ApplyError> {
        let cancellation = Cancellation::new("vetoed").by(self.target.clone());
        offer.cancel(if self.silent {
            cancellation.silent()
        } else {
            cancellation
        });
        Ok(())
    }

    fn apply(&mut self, engine: &mut Engine, _id: IntentionId) -> Result<(), ApplyError> {
        bump_counter(engine, &self.target, "hits")
    }
}

/// Fails during apply, either retryably or fatally.
#[derive(Debug)]
pub struct Flaky {
    retryable: bool,
}

impl Flaky {
    pub const fn retryable() -> Self {
        Self { retryable: true }
    }

    pub const fn fatal() -> Self {
        Self { retryable: false }
    }
}

impl Intention for Flaky {
    fn intention_type(&self) -> &str {
        "flaky"
    }

    fn apply(&mut self, engine: &mut Engine, _id: IntentionId) -> Result<(), ApplyError> {
        if self.retryable {
            return Err(ApplyError::retryable("contention"));
        }
        bump_counter(engine, "missing", "hits")
    }
}

/// Queues another intention when applied, so it runs in the next batch.
#[derive(Debug)]
pub struct Chain {
    then: Option<Box<dyn Intention>>,
}

impl Chain {
    pub fn new(then: Box<dyn Intention>) -> Self {
        Self { then: Some(then) }
    }
}

impl Intention for Chain {
    fn intention_type(&self) -> &str {
        "chain"
    }

    fn apply(&mut self, engine: &mut Engine, _id: IntentionId) -> Result<(), ApplyError> {
        if let Some(then) = self.then.take() {
            engine.queue_intention(then)?;
        }
        Ok(())
    }
}

/// Delivers whatever is pending, then sends a fresh notification.
#[derive(Debug)]
pub struct Announce {
    kind: &'static str,
}

impl Announce {
    pub const fn new(kind: &'static str) -> Self {
        Self { kind }
    }
}

impl Intention for Announce {
    fn intention_type(&self) -> &str {
        "announce"
    }

    fn apply(&mut self, engine: &mut Engine, _id: IntentionId) -> Result<(), ApplyError> {
        engine.flush_notifications()?;
        engine.send_notification(self.kind, ADMIN_ZONE, None, None, Map::new())?;
        Ok(())
    }
}
