//! Subscriber types for the reactive system.
//!
//! A Subscriber is any computation that can be recorded as depending on an
//! observed property and notified when that property changes. Effects are
//! the only subscribers today.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::dep::Dep;

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. This ID keys the
/// dependency sets, detects re-entry on the active stack, and lets a
/// mutation skip the computation that performed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter so IDs stay unique even across the per-thread
    /// engines.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation the dependency store can hold and notify.
///
/// Dependency sets store subscribers weakly; `notify` receives a strong
/// handle for the duration of the notification.
pub(crate) trait Subscriber {
    fn id(&self) -> SubscriberId;

    fn is_active(&self) -> bool;

    /// Remember that this subscriber now belongs to `dep`, so it can leave
    /// the set again without searching the store.
    fn record_dependency(&self, dep: Rc<Dep>);

    /// One of this subscriber's dependencies changed.
    fn notify(self: Rc<Self>);
}
