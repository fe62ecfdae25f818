//! Intentions proposed by caves.

use cairn_core::{ApplyError, Cancellation, Engine, Intention, KernelError, Offer, StateItem};
use cairn_types::{IntentionId, Scope};
use tracing::debug;

use crate::cave::DEFAULT_THRESHOLD;
use crate::crystal::Crystal;

/// Intention type of [`CountIntention`].
pub const COUNT_TYPE: &str = "count";

/// Intention type of [`GrowIntention`].
pub const GROW_TYPE: &str = "grow";

fn cave_mut<'e>(
    engine: &'e mut Engine,
    cave: &str,
) -> Result<&'e mut (dyn StateItem + 'static), KernelError> {
    engine
        .item_by_name_mut(cave)
        .ok_or_else(|| KernelError::NoSuchItem {
            name: cave.to_owned(),
        })
}

/// Advance a cave's count by one, growing a crystal at the threshold.
#[derive(Debug, Clone)]
pub struct CountIntention {
    cave: String,
}

impl CountIntention {
    /// Count for `cave`.
    pub fn new(cave: &str) -> Self {
        Self {
            cave: cave.to_owned(),
        }
    }
}

impl Intention for CountIntention {
    fn intention_type(&self) -> &str {
        COUNT_TYPE
    }

    fn scope(&self) -> Scope {
        Scope::zone(&self.cave).by(&self.cave)
    }

    fn apply(&mut self, engine: &mut Engine, _id: IntentionId) -> Result<(), ApplyError> {
        let cave = cave_mut(engine, &self.cave)?;
        let count = cave.state().get_u64("count")?.saturating_add(1);
        let threshold = cave.state().get_u64("threshold").unwrap_or(DEFAULT_THRESHOLD);
        cave.state_mut().set("count", count);

        if count >= threshold {
            debug!(cave = %self.cave, count, "Cave ready to grow");
            engine.queue_intention(Box::new(GrowIntention::new(&self.cave)))?;
        }
        Ok(())
    }
}

/// Grow a crystal in a cave, resetting its count.
#[derive(Debug, Clone)]
pub struct GrowIntention {
    cave: String,
}

impl GrowIntention {
    /// Grow in `cave`.
    pub fn new(cave: &str) -> Self {
        Self {
            cave: cave.to_owned(),
        }
    }
}

impl Intention for GrowIntention {
    fn intention_type(&self) -> &str {
        GROW_TYPE
    }

    fn scope(&self) -> Scope {
        Scope::zone(&self.cave).by(&self.cave)
    }

    fn offer(&mut self, offer: &mut Offer<'_>) -> Result<(), ApplyError> {
        if offer.engine().item_by_name(&self.cave).is_none() {
            offer.cancel(Cancellation::new("cave collapsed").silent());
        }
        Ok(())
    }

    fn apply(&mut self, engine: &mut Engine, _id: IntentionId) -> Result<(), ApplyError> {
        let tick = engine.ticks()?.saturating_add(1);
        let cave = cave_mut(engine, &self.cave)?;
        let grown = cave.state().get_u64("grown")?.saturating_add(1);
        cave.state_mut().set("grown", grown);
        cave.state_mut().set("count", 0_u64);

        let name = Crystal::name_for(&self.cave, grown);
        engine.register_state_item(Box::new(Crystal::new(&name, &self.cave, tick)))?;
        debug!(cave = %self.cave, crystal = %name, grown, "Crystal grown");
        Ok(())
    }
}
