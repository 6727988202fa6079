//! Reactive Runtime
//!
//! The runtime owns the dependency store and connects observed reads to the
//! computations that must rerun when those reads go stale.
//!
//! # How It Works
//!
//! 1. When a computation reads an observed property, the runtime records the
//!    (target, key) pair in the store and links the computation to it
//!    ([`Runtime::track`]).
//!
//! 2. When an observed property is written, the runtime classifies the
//!    mutation, resolves every affected dependency set, deduplicates the
//!    subscribers and reruns (or schedules) each one exactly once
//!    ([`Runtime::trigger`]).
//!
//! # Storage
//!
//! The store maps a raw value's identity to its per-key dependency sets.
//! Entries hold the raw value weakly and are dropped together with it, so
//! observing a value never extends its lifetime. Per-key sets are created on
//! first track and are left in place once empty.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::value::{PropertyKey, RawId, RawValue, WeakRaw};

use super::context::ReactiveContext;
use super::dep::Dep;
use super::subscriber::{Subscriber, SubscriberId};

/// How a write changed its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// A key that did not exist was created.
    Add,
    /// An existing key got a different value.
    Set,
    /// A key was deleted.
    Delete,
}

type KeyToDeps = IndexMap<PropertyKey, Rc<Dep>>;

struct TargetEntry {
    raw: WeakRaw,
    deps: KeyToDeps,
}

thread_local! {
    static TARGETS: RefCell<HashMap<RawId, TargetEntry>> = RefCell::new(HashMap::new());
}

/// Drop the store entry of a raw value that is being destroyed.
pub(crate) fn forget_target(id: RawId) {
    // Destructors may run while the store is borrowed or after the
    // thread-local is gone; a stale entry is detected by its dead weak link.
    let removed = TARGETS
        .try_with(|targets| {
            targets
                .try_borrow_mut()
                .ok()
                .and_then(|mut targets| targets.remove(&id))
        })
        .ok()
        .flatten();
    drop(removed);
}

/// The reactive runtime.
///
/// A namespace over the thread-local dependency store.
pub struct Runtime;

impl Runtime {
    /// Subscriber set for `(target, key)`, created if absent.
    pub(crate) fn subscribers(target: &RawValue, key: &PropertyKey) -> Rc<Dep> {
        TARGETS.with(|targets| {
            let mut targets = targets.borrow_mut();
            let entry = targets.entry(target.id()).or_insert_with(|| TargetEntry {
                raw: target.downgrade(),
                deps: IndexMap::new(),
            });
            if !entry.raw.is(target) {
                // Same address, different (newer) raw value.
                *entry = TargetEntry {
                    raw: target.downgrade(),
                    deps: IndexMap::new(),
                };
            }
            entry
                .deps
                .entry(key.clone())
                .or_insert_with(|| Rc::new(Dep::new()))
                .clone()
        })
    }

    /// Run `f` over the existing per-key sets of `target`, without creating
    /// anything. Returns `None` when nothing was ever tracked on `target`.
    fn with_property_map<R>(target: &RawValue, f: impl FnOnce(&KeyToDeps) -> R) -> Option<R> {
        TARGETS.with(|targets| {
            let targets = targets.borrow();
            targets
                .get(&target.id())
                .filter(|entry| entry.raw.is(target))
                .map(|entry| f(&entry.deps))
        })
    }

    /// Number of subscribers currently recorded for `(target, key)`.
    pub fn subscriber_count(target: &RawValue, key: impl Into<PropertyKey>) -> usize {
        let key = key.into();
        Self::with_property_map(target, |deps| deps.get(&key).map_or(0, |dep| dep.len()))
            .unwrap_or(0)
    }

    /// Number of raw values with a live store entry.
    pub fn tracked_target_count() -> usize {
        TARGETS.with(|targets| {
            targets
                .borrow()
                .values()
                .filter(|entry| entry.raw.upgrade().is_some())
                .count()
        })
    }

    /// Record that the current computation read `(target, key)`.
    ///
    /// No-op outside a computation or while tracking is paused. Reading the
    /// same pair twice in one run records it once.
    pub fn track(target: &RawValue, key: &PropertyKey) {
        if !ReactiveContext::should_track() {
            return;
        }
        let Some(subscriber) = ReactiveContext::current() else {
            return;
        };
        // Stopped mid-run by someone else; collect nothing further.
        if !subscriber.is_active() {
            return;
        }

        let dep = Self::subscribers(target, key);
        if dep.insert(&subscriber) {
            trace!(target_id = ?target.id(), %key, subscriber = ?subscriber.id(), "track");
            subscriber.record_dependency(dep);
        }
    }

    /// Notify every computation affected by a `kind` write to
    /// `(target, key)`.
    ///
    /// The computation performing the write is never notified of it.
    pub fn trigger(target: &RawValue, key: &PropertyKey, kind: TriggerKind) {
        let sequence_length = target.length();
        let Some(deps) = Self::with_property_map(target, |map| {
            Self::resolve(map, key, kind, sequence_length)
        }) else {
            return;
        };

        trace!(target_id = ?target.id(), %key, ?kind, sets = deps.len(), "trigger");
        Self::trigger_effects(&deps);
    }

    /// Notify only the computations that read `(target, key)` itself.
    ///
    /// Used for writes that leave the shape of `target` unchanged, such as
    /// deleting a key that was never there.
    pub(crate) fn trigger_key(target: &RawValue, key: &PropertyKey) {
        let Some(dep) = Self::with_property_map(target, |map| map.get(key).cloned()).flatten() else {
            return;
        };

        trace!(target_id = ?target.id(), %key, "trigger key");
        Self::trigger_effects(&[dep]);
    }

    /// Pick the dependency sets a mutation invalidates.
    fn resolve(
        map: &KeyToDeps,
        key: &PropertyKey,
        kind: TriggerKind,
        sequence_length: Option<usize>,
    ) -> SmallVec<[Rc<Dep>; 4]> {
        let mut deps = SmallVec::new();

        if sequence_length.is_some() {
            // Length writes drop every index at or past the new length; index
            // writes past the old end grow the length implicitly.
            let cutoff = if key.is_length() {
                sequence_length
            } else if kind == TriggerKind::Add {
                key.as_index()
            } else {
                None
            };
            if let Some(cutoff) = cutoff {
                deps.extend(
                    map.iter()
                        .filter(|(k, _)| k.is_length() || k.as_index().is_some_and(|i| i >= cutoff))
                        .map(|(_, dep)| dep.clone()),
                );
            }
        }

        deps.extend(map.get(key).cloned());

        match kind {
            TriggerKind::Add => {
                let shape_key = if sequence_length.is_some() && key.is_integer_key() {
                    PropertyKey::length()
                } else {
                    PropertyKey::iterate()
                };
                deps.extend(map.get(&shape_key).cloned());
            }
            TriggerKind::Delete if sequence_length.is_none() => {
                deps.extend(map.get(&PropertyKey::iterate()).cloned());
            }
            TriggerKind::Delete | TriggerKind::Set => {}
        }

        deps
    }

    /// Rerun or schedule each distinct subscriber of `deps` once, in
    /// first-subscription order.
    fn trigger_effects(deps: &[Rc<Dep>]) {
        let current = ReactiveContext::current_subscriber();
        let mut effects: IndexMap<SubscriberId, Rc<dyn Subscriber>> = IndexMap::new();

        for dep in deps {
            for (id, subscriber) in dep.snapshot() {
                if Some(id) == current || effects.contains_key(&id) {
                    continue;
                }
                if let Some(subscriber) = subscriber.upgrade() {
                    effects.insert(id, subscriber);
                }
            }
        }

        for (_, effect) in effects {
            // An earlier effect in this pass may have stopped it.
            if effect.is_active() {
                effect.notify();
            }
        }
    }
}
