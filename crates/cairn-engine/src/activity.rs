//! Activity logging for a running world.
//!
//! Two hooks feed the structured log: a notification subscription that
//! reports new items and cancelled intentions as they are delivered, and a
//! tick callback that reports every cave's counters once a tick completes.

use cairn_core::runner::TickCallback;
use cairn_core::{Engine, Subscription, TickSummary, Tracker};
use cairn_types::{FieldSpec, Notification, kinds};
use cairn_world::{CAVE_TYPE, cave_counters};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Tracker grouping the activity log subscription.
pub const ACTIVITY_TRACKER: &str = "activity-log";

fn data_str<'n>(notification: &'n Notification, key: &str) -> &'n str {
    notification
        .data
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn log_notification(notification: &Notification) {
    match notification.notification_type.as_str() {
        kinds::NEW_ITEM => info!(
            id = %notification.id,
            zone = %notification.zone,
            item = notification.actor.as_deref(),
            item_type = data_str(notification, "type"),
            "New item"
        ),
        kinds::INTENTION_CANCELLED => info!(
            id = %notification.id,
            zone = %notification.zone,
            intention_type = data_str(notification, "intention_type"),
            reason = data_str(notification, "reason"),
            by = data_str(notification, "by"),
            "Intention cancelled"
        ),
        other => debug!(id = %notification.id, kind = other, "Notification"),
    }
}

/// Subscribe the activity log to `engine`. Returns its tracker.
pub fn subscribe_activity_log(engine: &mut Engine) -> Tracker {
    let tracker = Tracker::new(ACTIVITY_TRACKER);
    engine.subscribe(
        Subscription::new(|_, notification: &Notification| {
            log_notification(notification);
            Ok(())
        })
        .tracker(tracker.clone())
        .types(FieldSpec::only([kinds::NEW_ITEM, kinds::INTENTION_CANCELLED])),
    );
    tracker
}

/// Tick callback that logs each cave's counters.
#[derive(Debug, Default)]
pub struct CaveReport {
    ticks_seen: u64,
}

impl CaveReport {
    /// Ticks reported so far.
    pub const fn ticks_seen(&self) -> u64 {
        self.ticks_seen
    }
}

impl TickCallback for CaveReport {
    fn on_tick(&mut self, summary: &TickSummary, engine: &Engine) {
        self.ticks_seen = self.ticks_seen.saturating_add(1);
        let registry = engine.registry();
        for cave in registry.iter().filter(|item| item.type_tag() == CAVE_TYPE) {
            match cave_counters(registry, cave.name()) {
                Ok(counters) => debug!(
                    tick = summary.tick,
                    cave = cave.name(),
                    count = counters.count,
                    grown = counters.grown,
                    crystals = counters.crystals,
                    "Cave counters"
                ),
                Err(e) => warn!(tick = summary.tick, error = %e, "Unreadable cave"),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cairn_core::config::SimulationBounds;
    use cairn_core::runner::run_simulation;
    use cairn_world::create_starting_world;

    use super::*;

    #[test]
    fn activity_log_can_be_removed() {
        let mut engine = create_starting_world().unwrap();
        let tracker = subscribe_activity_log(&mut engine);
        assert_eq!(engine.notification_bus().subscription_count(), 1);
        engine.unsubscribe(&tracker);
        assert_eq!(engine.notification_bus().subscription_count(), 0);
    }

    #[tokio::test]
    async fn cave_report_sees_every_tick() {
        let mut engine = create_starting_world().unwrap();
        subscribe_activity_log(&mut engine);
        let mut report = CaveReport::default();
        let bounds = SimulationBounds {
            max_ticks: 4,
            tick_interval_ms: 0,
        };

        let result = run_simulation(&mut engine, bounds, &mut report).await.unwrap();

        assert_eq!(result.total_ticks, 4);
        assert_eq!(report.ticks_seen(), 4);
        assert_eq!(engine.ticks().unwrap(), 4);
    }
}
