//! Sending notifications and delivering them to subscriptions.

use cairn_types::{ADMIN_ZONE, Notification, NotificationId, Scope, kinds};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use super::Engine;
use crate::error::KernelError;
use crate::item::counters;
use crate::notification::{
    MAX_NOTIFICATION_WAVES, NotificationFlushReport, Subscription, Tracker,
};

impl Engine {
    /// Number and queue a notification. Nothing is delivered until the next
    /// [`Engine::flush_notifications`].
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidNotification`] if the type or zone is
    /// empty.
    pub fn send_notification(
        &mut self,
        notification_type: &str,
        zone: &str,
        location: Option<&str>,
        actor: Option<&str>,
        data: Map<String, Value>,
    ) -> Result<NotificationId, KernelError> {
        if notification_type.is_empty() {
            return Err(KernelError::InvalidNotification {
                field: "type",
                reason: "must not be empty".to_owned(),
            });
        }
        if zone.is_empty() {
            return Err(KernelError::InvalidNotification {
                field: "zone",
                reason: "must not be empty".to_owned(),
            });
        }
        let id = NotificationId::new(self.registry.bump_counter(counters::NOTIFICATION_ID)?);
        self.enqueue_notification(id, notification_type, zone, location, actor, data);
        Ok(id)
    }

    /// [`Engine::send_notification`] with the zone, location and actor taken
    /// from `scope`.
    ///
    /// # Errors
    ///
    /// As [`Engine::send_notification`].
    pub fn send_scoped(
        &mut self,
        notification_type: &str,
        scope: &Scope,
        data: Map<String, Value>,
    ) -> Result<NotificationId, KernelError> {
        self.send_notification(
            notification_type,
            &scope.zone,
            scope.location.as_deref(),
            scope.actor.as_deref(),
            data,
        )
    }

    /// Log a warning and send it to the admin zone as an `admin_warning`.
    ///
    /// # Errors
    ///
    /// As [`Engine::send_notification`].
    pub fn admin_warning(
        &mut self,
        message: &str,
        info: Map<String, Value>,
    ) -> Result<NotificationId, KernelError> {
        warn!(message, "Admin warning");
        let mut data = Map::new();
        data.insert("message".to_owned(), Value::String(message.to_owned()));
        data.insert("info".to_owned(), Value::Object(info));
        self.send_notification(kinds::ADMIN_WARNING, ADMIN_ZONE, None, None, data)
    }

    /// Add a subscription.
    pub fn subscribe(&mut self, subscription: Subscription) {
        self.bus.subscribe(subscription);
    }

    /// Remove every subscription grouped under `tracker`. Idempotent.
    pub fn unsubscribe(&mut self, tracker: &Tracker) {
        self.bus.unsubscribe(tracker);
    }

    /// Deliver pending notifications until none are left.
    ///
    /// Each wave takes the whole pending queue; records sent by handlers
    /// form the next wave. Called from inside a handler this returns at once
    /// and the outer flush picks the new records up.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::TooManyNotificationLoops`] when records are
    /// still pending after [`MAX_NOTIFICATION_WAVES`] waves; the pending
    /// queue is cleared. A handler error aborts the flush and is returned
    /// as is. Nothing is rolled back in either case.
    pub fn flush_notifications(&mut self) -> Result<NotificationFlushReport, KernelError> {
        let mut report = NotificationFlushReport::default();
        if self.bus.is_dispatching() {
            return Ok(report);
        }

        while self.bus.has_pending() {
            if report.waves >= MAX_NOTIFICATION_WAVES {
                error!(
                    limit = MAX_NOTIFICATION_WAVES,
                    pending = self.bus.pending_len(),
                    "Notification wave ceiling reached"
                );
                self.bus.clear_pending();
                return Err(KernelError::TooManyNotificationLoops {
                    limit: MAX_NOTIFICATION_WAVES,
                });
            }
            report.waves = report.waves.saturating_add(1);

            let wave = self.bus.take_wave();
            debug!(wave = report.waves, size = wave.len(), "Delivering notification wave");
            for notification in &wave {
                report.records = report.records.saturating_add(1);
                let delivered = self.dispatch(notification)?;
                report.deliveries = report.deliveries.saturating_add(delivered);
            }
        }

        Ok(report)
    }

    /// Offer one record to every live subscription in registration order.
    fn dispatch(&mut self, notification: &Notification) -> Result<u32, KernelError> {
        let mut subscriptions = self.bus.begin_dispatch();
        let mut delivered: u32 = 0;
        let mut outcome = Ok(());

        for subscription in &mut subscriptions {
            if self.bus.is_detached(subscription.tracked_by()) || !subscription.matches(notification) {
                continue;
            }
            delivered = delivered.saturating_add(1);
            if let Err(err) = subscription.handle(self, notification) {
                error!(
                    notification_id = %notification.id,
                    notification_type = %notification.notification_type,
                    error = %err,
                    "Notification handler failed"
                );
                outcome = Err(err);
                break;
            }
        }

        self.bus.end_dispatch(subscriptions);
        outcome.map(|()| delivered)
    }

    /// Queue a record under an id that has already been assigned.
    pub(crate) fn enqueue_notification(
        &mut self,
        id: NotificationId,
        notification_type: &str,
        zone: &str,
        location: Option<&str>,
        actor: Option<&str>,
        data: Map<String, Value>,
    ) {
        self.bus.enqueue(Notification {
            id,
            notification_type: notification_type.to_owned(),
            zone: zone.to_owned(),
            location: location.map(str::to_owned),
            actor: actor.map(str::to_owned),
            data,
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use cairn_types::FieldSpec;
    use serde_json::json;

    use super::*;
    use crate::item_type::TypeRegistry;

    fn engine() -> Engine {
        let mut engine = Engine::new(TypeRegistry::new()).unwrap();
        engine.finished_init().unwrap();
        engine
    }

    fn counter() -> (Rc<RefCell<u32>>, Rc<RefCell<u32>>) {
        let count = Rc::new(RefCell::new(0_u32));
        (Rc::clone(&count), count)
    }

    fn bump(count: &RefCell<u32>) {
        let mut count = count.borrow_mut();
        *count = count.saturating_add(1);
    }

    #[test]
    fn empty_type_or_zone_is_rejected() {
        let mut engine = engine();
        assert!(matches!(
            engine.send_notification("", "town", None, None, Map::new()),
            Err(KernelError::InvalidNotification { field: "type", .. })
        ));
        assert!(matches!(
            engine.send_notification("say", "", None, None, Map::new()),
            Err(KernelError::InvalidNotification { field: "zone", .. })
        ));
        assert!(!engine.notification_bus().has_pending());
    }

    #[test]
    fn sending_assigns_increasing_ids_without_delivering() {
        let mut engine = engine();
        let (sink, count) = counter();
        engine.subscribe(Subscription::new(move |_, _| {
            bump(&sink);
            Ok(())
        }));
        let first = engine.send_notification("say", "town", None, None, Map::new()).unwrap();
        let second = engine.send_notification("say", "town", None, None, Map::new()).unwrap();
        assert_eq!(first, NotificationId::new(1));
        assert_eq!(second, NotificationId::new(2));
        assert_eq!(*count.borrow(), 0);

        let report = engine.flush_notifications().unwrap();
        assert_eq!(report.waves, 1);
        assert_eq!(report.records, 2);
        assert_eq!(report.deliveries, 2);
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn subscription_matching_is_not_exclusive() {
        let mut engine = engine();
        let (say_sink, say) = counter();
        let (admin_sink, admin) = counter();
        let (big_sink, big) = counter();
        engine.subscribe(
            Subscription::new(move |_, _| {
                bump(&say_sink);
                Ok(())
            })
            .types(FieldSpec::only(["say"])),
        );
        engine.subscribe(
            Subscription::new(move |_, _| {
                bump(&admin_sink);
                Ok(())
            })
            .zones(FieldSpec::only([ADMIN_ZONE])),
        );
        engine.subscribe(
            Subscription::new(move |_, _| {
                bump(&big_sink);
                Ok(())
            })
            .predicate(|n| n.data.get("x").and_then(Value::as_i64).is_some_and(|x| x > 5)),
        );

        let mut big_data = Map::new();
        big_data.insert("x".to_owned(), json!(10));
        engine.send_notification("say", "town", None, None, Map::new()).unwrap();
        engine
            .send_notification(kinds::TICK_FINISHED, ADMIN_ZONE, None, None, Map::new())
            .unwrap();
        engine.send_notification("say", "town", None, None, big_data).unwrap();
        engine.flush_notifications().unwrap();

        assert_eq!(*say.borrow(), 2);
        assert_eq!(*admin.borrow(), 1);
        assert_eq!(*big.borrow(), 1);
    }

    #[test]
    fn handler_sends_form_the_next_wave() {
        let mut engine = engine();
        engine.subscribe(
            Subscription::new(|engine: &mut Engine, _| {
                engine.send_notification("pong", "town", None, None, Map::new())?;
                // A nested flush is a no-op.
                let nested = engine.flush_notifications()?;
                assert_eq!(nested.waves, 0);
                Ok(())
            })
            .types(FieldSpec::only(["ping"])),
        );
        let (sink, pongs) = counter();
        engine.subscribe(
            Subscription::new(move |_, _| {
                bump(&sink);
                Ok(())
            })
            .types(FieldSpec::only(["pong"])),
        );
        engine.send_notification("ping", "town", None, None, Map::new()).unwrap();
        let report = engine.flush_notifications().unwrap();
        assert_eq!(report.waves, 2);
        assert_eq!(*pongs.borrow(), 1);
    }

    #[test]
    fn runaway_handlers_hit_the_wave_ceiling() {
        let mut engine = engine();
        engine.subscribe(Subscription::new(|engine: &mut Engine, _| {
            engine.send_notification("echo", "town", None, None, Map::new())?;
            Ok(())
        }));
        engine.send_notification("echo", "town", None, None, Map::new()).unwrap();
        let err = engine.flush_notifications().unwrap_err();
        assert!(matches!(err, KernelError::TooManyNotificationLoops { limit: 20 }));
        assert!(!engine.notification_bus().has_pending());
    }

    #[test]
    fn handler_errors_propagate() {
        let mut engine = engine();
        engine.subscribe(Subscription::new(|_, _| {
            Err(KernelError::NoSuchItem {
                name: "ghost".to_owned(),
            })
        }));
        engine.send_notification("say", "town", None, None, Map::new()).unwrap();
        assert!(matches!(
            engine.flush_notifications(),
            Err(KernelError::NoSuchItem { .. })
        ));
        assert_eq!(engine.notification_bus().subscription_count(), 1);
    }

    #[test]
    fn unsubscribe_mid_dispatch_skips_later_subscriptions() {
        let mut engine = engine();
        engine.subscribe(Subscription::new(|engine: &mut Engine, _| {
            engine.unsubscribe(&Tracker::from("listener"));
            Ok(())
        }));
        let (sink, count) = counter();
        engine.subscribe(
            Subscription::new(move |_, _| {
                bump(&sink);
                Ok(())
            })
            .tracker("listener"),
        );
        engine.send_notification("say", "town", None, None, Map::new()).unwrap();
        engine.flush_notifications().unwrap();
        assert_eq!(*count.borrow(), 0);
        assert_eq!(engine.notification_bus().subscription_count(), 1);
    }

    #[test]
    fn subscriptions_added_by_handlers_see_later_records() {
        let mut engine = engine();
        let (sink, count) = counter();
        let mut added = false;
        engine.subscribe(Subscription::new(move |engine: &mut Engine, _| {
            if !added {
                added = true;
                let sink = Rc::clone(&sink);
                engine.subscribe(Subscription::new(move |_, _| {
                    bump(&sink);
                    Ok(())
                }));
            }
            Ok(())
        }));
        engine.send_notification("a", "town", None, None, Map::new()).unwrap();
        engine.send_notification("b", "town", None, None, Map::new()).unwrap();
        engine.flush_notifications().unwrap();
        assert_eq!(*count.borrow(), 1);
        assert_eq!(engine.notification_bus().subscription_count(), 2);
    }

    #[test]
    fn admin_warning_goes_to_admin_zone() {
        let mut engine = engine();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        engine.subscribe(
            Subscription::new(move |_, n: &Notification| {
                sink.borrow_mut().push(n.clone());
                Ok(())
            })
            .types(FieldSpec::only([kinds::ADMIN_WARNING])),
        );
        let mut info = Map::new();
        info.insert("item".to_owned(), json!("cave"));
        engine.admin_warning("cave is damp", info).unwrap();
        engine.flush_notifications().unwrap();

        let seen = seen.borrow();
        let record = seen.first().unwrap();
        assert_eq!(record.zone, ADMIN_ZONE);
        assert_eq!(record.data.get("message"), Some(&json!("cave is damp")));
        assert_eq!(record.data.get("info"), Some(&json!({"item": "cave"})));
    }
}
