//! Subscriber registry: who wants which channel.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use arsip_protocol::{Channel, Notification};

/// A subscriber callback.
pub type Callback = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Identifies one subscription within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    channels: HashMap<Channel, Vec<(SubscriberId, Callback)>>,
}

/// Channel → ordered list of callbacks.
///
/// Callbacks run on whichever task dispatches, outside the registry lock,
/// so a callback may subscribe or unsubscribe (itself included) without
/// deadlocking. A dispatch that is already running still delivers to the
/// subscribers it started with.
#[derive(Default)]
pub struct SubscriberRegistry {
    inner: Mutex<Inner>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `callback` to the end of `channel`'s list.
    pub fn subscribe(&self, channel: Channel, callback: Callback) -> SubscriberId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = SubscriberId(inner.next_id);
        tracing::debug!(%channel, subscriber = %id, "subscribed");
        inner.channels.entry(channel).or_default().push((id, callback));
        id
    }

    /// Removes one subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, channel: &Channel, id: SubscriberId) -> bool {
        let mut inner = self.lock();
        let Some(list) = inner.channels.get_mut(channel) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            inner.channels.remove(channel);
        }
        if removed {
            tracing::debug!(%channel, subscriber = %id, "unsubscribed");
        }
        removed
    }

    /// Delivers `notification` to every subscriber of its channel, in
    /// subscription order. Returns how many callbacks completed.
    ///
    /// A panicking callback is logged and skipped; the rest still run.
    pub fn dispatch(&self, notification: &Notification) -> usize {
        let subscribers: Vec<(SubscriberId, Callback)> = match self
            .lock()
            .channels
            .get(&notification.channel)
        {
            Some(list) => list.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        for (id, callback) in subscribers {
            match catch_unwind(AssertUnwindSafe(|| callback(notification))) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::error!(
                    channel = %notification.channel,
                    subscriber = %id,
                    "subscriber panicked, continuing"
                ),
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, channel: &Channel) -> usize {
        self.lock().channels.get(channel).map_or(0, Vec::len)
    }

    /// Drops every subscription.
    pub fn clear(&self) {
        self.lock().channels.clear();
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        let mut map = f.debug_map();
        for (channel, list) in &inner.channels {
            map.entry(&channel.as_str(), &list.len());
        }
        map.finish()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Handle returned by `subscribe`.
///
/// Dropping the handle does **not** unsubscribe; call
/// [`unsubscribe`](Self::unsubscribe). Calling it more than once is
/// harmless, and so is calling it after the client is gone.
pub struct Subscription {
    registry: Weak<SubscriberRegistry>,
    channel: Channel,
    id: SubscriberId,
    active: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(registry: &Arc<SubscriberRegistry>, channel: Channel, id: SubscriberId) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            channel,
            id,
            active: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(&self.channel, self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
