//! Notification bus: queued event records and the subscriptions they are
//! delivered to.
//!
//! Sending only numbers and queues a record. Delivery happens when the
//! engine flushes the bus: the whole pending queue is taken as one wave and
//! every record is offered to every live subscription in registration
//! order. Records sent by handlers form the next wave.

use std::collections::VecDeque;
use std::fmt;

use cairn_types::{FieldSpec, Notification, NotificationId};

use crate::engine::Engine;
use crate::error::KernelError;

/// Maximum number of waves one `flush_notifications` call may deliver.
pub const MAX_NOTIFICATION_WAVES: u32 = 20;

/// Opaque key grouping subscriptions for bulk removal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tracker(String);

impl Tracker {
    /// Create a tracker.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The tracker's key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Tracker {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for Tracker {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Callback run for every matching notification.
pub type Handler = Box<dyn FnMut(&mut Engine, &Notification) -> Result<(), KernelError>>;

/// Extra filter over the whole record.
pub type Predicate = Box<dyn Fn(&Notification) -> bool>;

/// A standing registration for notifications.
///
/// Built with [`Subscription::new`] and narrowed with the builder methods;
/// every field filter defaults to [`FieldSpec::All`].
pub struct Subscription {
    tracker: Option<Tracker>,
    types: FieldSpec,
    zones: FieldSpec,
    locations: FieldSpec,
    actors: FieldSpec,
    predicate: Option<Predicate>,
    handler: Handler,
}

impl Subscription {
    /// Subscribe `handler` to every notification.
    pub fn new<F>(handler: F) -> Self
    where
        F: FnMut(&mut Engine, &Notification) -> Result<(), KernelError> + 'static,
    {
        Self {
            tracker: None,
            types: FieldSpec::All,
            zones: FieldSpec::All,
            locations: FieldSpec::All,
            actors: FieldSpec::All,
            predicate: None,
            handler: Box::new(handler),
        }
    }

    /// Group this subscription under `tracker` so it can be removed later.
    #[must_use]
    pub fn tracker(mut self, tracker: impl Into<Tracker>) -> Self {
        self.tracker = Some(tracker.into());
        self
    }

    /// Filter on notification type.
    #[must_use]
    pub fn types(mut self, spec: FieldSpec) -> Self {
        self.types = spec;
        self
    }

    /// Filter on zone.
    #[must_use]
    pub fn zones(mut self, spec: FieldSpec) -> Self {
        self.zones = spec;
        self
    }

    /// Filter on location.
    #[must_use]
    pub fn locations(mut self, spec: FieldSpec) -> Self {
        self.locations = spec;
        self
    }

    /// Filter on actor.
    #[must_use]
    pub fn actors(mut self, spec: FieldSpec) -> Self {
        self.actors = spec;
        self
    }

    /// Require `predicate` to hold in addition to the field filters.
    #[must_use]
    pub fn predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Notification) -> bool + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// The tracker this subscription is grouped under, if any.
    pub const fn tracked_by(&self) -> Option<&Tracker> {
        self.tracker.as_ref()
    }

    /// Whether `notification` passes every filter.
    pub fn matches(&self, notification: &Notification) -> bool {
        self.types.matches(Some(&notification.notification_type))
            && self.zones.matches(Some(&notification.zone))
            && self.locations.matches(notification.location.as_deref())
            && self.actors.matches(notification.actor.as_deref())
            && self
                .predicate
                .as_ref()
                .is_none_or(|predicate| predicate(notification))
    }

    pub(crate) fn handle(
        &mut self,
        engine: &mut Engine,
        notification: &Notification,
    ) -> Result<(), KernelError> {
        (self.handler)(engine, notification)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("tracker", &self.tracker)
            .field("types", &self.types)
            .field("zones", &self.zones)
            .field("locations", &self.locations)
            .field("actors", &self.actors)
            .field("predicate", &self.predicate.is_some())
            .finish_non_exhaustive()
    }
}

/// Counters describing one `flush_notifications` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationFlushReport {
    /// Waves delivered.
    pub waves: u32,
    /// Records taken off the queue.
    pub records: u32,
    /// Handler invocations.
    pub deliveries: u32,
}

/// Pending notifications and live subscriptions.
#[derive(Debug, Default)]
pub struct NotificationBus {
    pending: VecDeque<Notification>,
    subscriptions: Vec<Subscription>,
    /// Set while a record is being delivered; `subscriptions` then only
    /// holds subscriptions added by handlers.
    dispatching: bool,
    /// Trackers unsubscribed while a record was being delivered.
    detached: Vec<Tracker>,
}

impl NotificationBus {
    /// Queue a fully numbered record.
    pub fn enqueue(&mut self, notification: Notification) {
        self.pending.push_back(notification);
    }

    /// Take everything pending as one wave.
    pub fn take_wave(&mut self) -> VecDeque<Notification> {
        std::mem::take(&mut self.pending)
    }

    /// Records waiting for the next flush, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &Notification> {
        self.pending.iter()
    }

    /// Number of records waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether any record is waiting.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drop pending records numbered after `last_kept`. Returns how many
    /// were dropped.
    ///
    /// Records are matched by id, not position, so waves delivered since
    /// `last_kept` was assigned do not shift the cut.
    pub(crate) fn discard_after(&mut self, last_kept: NotificationId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|notification| notification.id <= last_kept);
        before.saturating_sub(self.pending.len())
    }

    /// Drop every pending record.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Add a subscription. Never fails.
    pub fn subscribe(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Remove every subscription grouped under `tracker`.
    ///
    /// Idempotent. Takes effect immediately, including for the record
    /// currently being delivered.
    pub fn unsubscribe(&mut self, tracker: &Tracker) {
        self.subscriptions
            .retain(|subscription| subscription.tracked_by() != Some(tracker));
        if self.dispatching && !self.detached.contains(tracker) {
            self.detached.push(tracker.clone());
        }
    }

    /// Number of live subscriptions. Excludes the ones taken out for a
    /// delivery in progress.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether a record is being delivered right now.
    pub const fn is_dispatching(&self) -> bool {
        self.dispatching
    }

    /// Take the subscription list out for delivering one record.
    pub(crate) fn begin_dispatch(&mut self) -> Vec<Subscription> {
        self.dispatching = true;
        std::mem::take(&mut self.subscriptions)
    }

    /// Whether a subscription was unsubscribed during the current delivery.
    pub(crate) fn is_detached(&self, tracker: Option<&Tracker>) -> bool {
        tracker.is_some_and(|tracker| self.detached.contains(tracker))
    }

    /// Put the subscription list back, dropping the ones unsubscribed and
    /// appending the ones added during delivery.
    pub(crate) fn end_dispatch(&mut self, mut taken: Vec<Subscription>) {
        let detached = std::mem::take(&mut self.detached);
        taken.retain(|subscription| {
            subscription
                .tracked_by()
                .is_none_or(|tracker| !detached.contains(tracker))
        });
        taken.append(&mut self.subscriptions);
        self.subscriptions = taken;
        self.dispatching = false;
    }
}
