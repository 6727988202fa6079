//! Observed Views
//!
//! An [`Observed`] view is a transparent wrapper over exactly one
//! [`RawValue`]. Reading through the view tracks the read for the current
//! computation; writing through it triggers the computations that read the
//! written key.
//!
//! # Identity
//!
//! Views are cached by raw identity: while a view over some raw value is
//! alive, [`observe`] hands back that same view. Object-valued properties
//! are wrapped lazily, on read.
//!
//! # Interceptors
//!
//! Every access goes through one of five interceptors (`get`, `has`,
//! `own_keys`, `set`, `delete`). The `get` and `set` interceptors take an
//! explicit receiver: when a raw value delegates to a view through its
//! prototype link, the view's interceptor runs with the object the access
//! started from, and only the object whose own slot changed fires triggers.
//!
//! # Sequences
//!
//! Views over sequences add `push`, `pop`, `shift`, `unshift` and `splice`.
//! These pause tracking while they run, so the reads they make internally
//! never become dependencies, and they move elements through the view's own
//! interceptors so every slot they touch triggers normally.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::error::{ReactiveError, Result};
use crate::util::{has_changed, is_object};
use crate::value::{
    join_once, ordinary_get, ordinary_has, ordinary_set, PropertyKey, RawId, RawValue, Value, WeakRaw,
};

use super::context::{pause_tracking, untracked};
use super::runtime::{Runtime, TriggerKind};

struct CachedView {
    raw: WeakRaw,
    view: Weak<ViewInner>,
}

thread_local! {
    static VIEWS: RefCell<HashMap<RawId, CachedView>> = RefCell::new(HashMap::new());
}

struct ViewInner {
    target: RawValue,
}

impl Drop for ViewInner {
    fn drop(&mut self) {
        let id = self.target.id();
        // May run during thread teardown or while the cache is borrowed.
        let _ = VIEWS.try_with(|views| {
            if let Ok(mut views) = views.try_borrow_mut() {
                if views.get(&id).is_some_and(|cached| cached.view.strong_count() == 0) {
                    views.remove(&id);
                }
            }
        });
    }
}

/// A tracking, triggering view over a raw record or sequence.
#[derive(Clone)]
pub struct Observed(Rc<ViewInner>);

fn cached_view(raw: &RawValue) -> Option<Observed> {
    VIEWS.with(|views| {
        views
            .borrow()
            .get(&raw.id())
            .filter(|cached| cached.raw.is(raw))
            .and_then(|cached| cached.view.upgrade())
            .map(Observed)
    })
}

/// The view over `raw`, created on first request.
pub fn observe(raw: &RawValue) -> Observed {
    if let Some(view) = cached_view(raw) {
        return view;
    }

    let view = Observed(Rc::new(ViewInner { target: raw.clone() }));
    VIEWS.with(|views| {
        views.borrow_mut().insert(
            raw.id(),
            CachedView {
                raw: raw.downgrade(),
                view: Rc::downgrade(&view.0),
            },
        )
    });
    trace!(target_id = ?raw.id(), "observe");
    view
}

/// Wrap raw objects in their view; views and primitives pass through.
pub fn to_observed(value: Value) -> Value {
    match value {
        Value::Object(raw) => Value::Observed(observe(&raw)),
        other => other,
    }
}

/// Strip every observation layer from `value`.
///
/// A view only answers with its raw value when asked through itself, so a
/// raw object that merely delegates to a view is returned unchanged.
pub fn to_raw(value: &Value) -> Value {
    let marker = PropertyKey::raw_marker();
    let unwrapped = match value {
        Value::Observed(view) => view.intercept_get(&marker, value),
        Value::Object(raw) => ordinary_get(raw, &marker, value),
        _ => return value.clone(),
    };
    match unwrapped {
        Value::Object(raw) if !matches!(value, Value::Object(current) if current.ptr_eq(&raw)) => {
            to_raw(&Value::Object(raw))
        }
        _ => value.clone(),
    }
}

/// Whether `value` is an observed view.
pub fn is_observed(value: &Value) -> bool {
    matches!(value, Value::Observed(_))
}

fn same_raw(target: &RawValue, value: &Value) -> bool {
    matches!(value, Value::Object(raw) if raw.ptr_eq(target))
}

impl Observed {
    pub(crate) fn target(&self) -> &RawValue {
        &self.0.target
    }

    fn receiver(&self) -> Value {
        Value::Observed(self.clone())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The raw value behind this view.
    pub fn raw(&self) -> RawValue {
        match to_raw(&self.receiver()) {
            Value::Object(raw) => raw,
            _ => self.0.target.clone(),
        }
    }

    /// Structural test; not tracked.
    pub fn is_sequence(&self) -> bool {
        self.0.target.is_sequence()
    }

    // ------------------------------------------------------------------
    // Interceptors
    // ------------------------------------------------------------------

    /// Read `key`. Object results come back as views.
    pub fn get(&self, key: impl Into<PropertyKey>) -> Value {
        self.intercept_get(&key.into(), &self.receiver())
    }

    pub(crate) fn intercept_get(&self, key: &PropertyKey, receiver: &Value) -> Value {
        let target = &self.0.target;

        if key.is_raw_marker() {
            let through_self = matches!(
                receiver,
                Value::Observed(view) if cached_view(target).is_some_and(|cached| cached.ptr_eq(view))
            );
            if through_self {
                return Value::Object(target.clone());
            }
            return ordinary_get(target, key, receiver);
        }

        let result = ordinary_get(target, key, receiver);
        if key.is_well_known_symbol() {
            return result;
        }

        Runtime::track(target, key);
        if is_object(&result) {
            to_observed(result)
        } else {
            result
        }
    }

    /// Membership test, following the prototype chain.
    pub fn has(&self, key: impl Into<PropertyKey>) -> bool {
        self.intercept_has(&key.into())
    }

    pub(crate) fn intercept_has(&self, key: &PropertyKey) -> bool {
        let target = &self.0.target;
        let result = ordinary_has(target, key);
        Runtime::track(target, key);
        result
    }

    /// Own keys. Depends on the key set of a record, or on `length` of a
    /// sequence.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let target = &self.0.target;
        let shape_key = if target.is_sequence() {
            PropertyKey::length()
        } else {
            PropertyKey::iterate()
        };
        Runtime::track(target, &shape_key);
        target.own_keys()
    }

    /// Write `key`.
    ///
    /// Creating a key triggers an `Add`; replacing a value with a
    /// same-value-equal one triggers nothing.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Result<bool> {
        self.intercept_set(&key.into(), value.into(), &self.receiver())
    }

    pub(crate) fn intercept_set(&self, key: &PropertyKey, value: Value, receiver: &Value) -> Result<bool> {
        let target = &self.0.target;
        let old_value = untracked(|| ordinary_get(target, key, &Value::Object(target.clone())));
        let had_key = match (target.length(), key.as_index()) {
            (Some(length), Some(index)) => index < length,
            _ => target.has_own(key),
        };

        let written = ordinary_set(target, key, value.clone(), receiver)?;

        // Writes that arrive here through a delegating child belong to the
        // child; only the object whose own slot changed fires.
        if written && same_raw(target, &to_raw(receiver)) {
            if !had_key {
                Runtime::trigger(target, key, TriggerKind::Add);
            } else if has_changed(&value, &old_value) {
                Runtime::trigger(target, key, TriggerKind::Set);
            }
        }
        Ok(written)
    }

    /// Remove an own key and trigger its dependents.
    pub fn delete(&self, key: impl Into<PropertyKey>) -> bool {
        self.intercept_delete(&key.into())
    }

    fn intercept_delete(&self, key: &PropertyKey) -> bool {
        let target = &self.0.target;
        let existed = target.has_own(key);
        let deleted = target.delete_own(key);
        if existed {
            Runtime::trigger(target, key, TriggerKind::Delete);
        } else {
            // Nothing left the key set; enumeration is unaffected.
            Runtime::trigger_key(target, key);
        }
        deleted
    }

    // ------------------------------------------------------------------
    // Sequence reads
    // ------------------------------------------------------------------

    /// The `length` property as an element count. Tracked.
    pub fn len(&self) -> usize {
        match self.get(PropertyKey::length()) {
            Value::Number(n) if n >= 0.0 => n as usize,
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every element, read through the view.
    pub fn to_vec(&self) -> Vec<Value> {
        (0..self.len()).map(|index| self.get(index)).collect()
    }

    /// Elements rendered as strings and joined by `separator`. Holes,
    /// `undefined` and `null` render empty.
    ///
    /// A sequence that contains itself renders empty at the inner
    /// occurrence.
    pub fn join(&self, separator: &str) -> String {
        join_once(self.0.target.id(), || {
            (0..self.len())
                .map(|index| self.get(index).to_join_string())
                .collect::<Vec<_>>()
                .join(separator)
        })
    }

    // ------------------------------------------------------------------
    // Sequence mutators
    // ------------------------------------------------------------------

    fn require_sequence(&self, operation: &'static str) -> Result<usize> {
        self.0
            .target
            .length()
            .ok_or(ReactiveError::NotASequence { operation })
    }

    /// Element at `index` without wrapping, for moving values around.
    fn element(&self, index: usize) -> Value {
        ordinary_get(&self.0.target, &PropertyKey::from(index), &self.receiver())
    }

    /// Move the element at `from` to `to`, or punch a hole at `to` when
    /// `from` is a hole.
    fn move_element(&self, from: usize, to: usize) -> Result<()> {
        if self.has(from) {
            let value = self.element(from);
            self.set(to, value)?;
        } else {
            self.delete(to);
        }
        Ok(())
    }

    /// Append `items`; returns the new length.
    pub fn push<V: Into<Value>>(&self, items: impl IntoIterator<Item = V>) -> Result<usize> {
        let mut length = self.require_sequence("push")?;
        let _paused = pause_tracking();
        for item in items {
            self.set(length, item)?;
            length += 1;
        }
        self.set(PropertyKey::length(), length)?;
        Ok(length)
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Result<Value> {
        let length = self.require_sequence("pop")?;
        let _paused = pause_tracking();
        if length == 0 {
            self.set(PropertyKey::length(), 0)?;
            return Ok(Value::Undefined);
        }
        let last = self.element(length - 1);
        self.delete(length - 1);
        self.set(PropertyKey::length(), length - 1)?;
        Ok(to_observed(last))
    }

    /// Remove and return the first element, shifting the rest down.
    pub fn shift(&self) -> Result<Value> {
        let length = self.require_sequence("shift")?;
        let _paused = pause_tracking();
        if length == 0 {
            self.set(PropertyKey::length(), 0)?;
            return Ok(Value::Undefined);
        }
        let first = self.element(0);
        for index in 1..length {
            self.move_element(index, index - 1)?;
        }
        self.delete(length - 1);
        self.set(PropertyKey::length(), length - 1)?;
        Ok(to_observed(first))
    }

    /// Prepend `items`, shifting existing elements up; returns the new
    /// length.
    pub fn unshift<V: Into<Value>>(&self, items: impl IntoIterator<Item = V>) -> Result<usize> {
        let length = self.require_sequence("unshift")?;
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        let _paused = pause_tracking();
        let count = items.len();
        if count > 0 {
            for index in (0..length).rev() {
                self.move_element(index, index + count)?;
            }
            for (index, item) in items.into_iter().enumerate() {
                self.set(index, item)?;
            }
        }
        self.set(PropertyKey::length(), length + count)?;
        Ok(length + count)
    }

    /// Remove `delete_count` elements starting at `start` and insert `items`
    /// in their place; returns the removed elements.
    ///
    /// `start` and `delete_count` are clamped to the sequence.
    pub fn splice<V: Into<Value>>(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = V>,
    ) -> Result<Vec<Value>> {
        let length = self.require_sequence("splice")?;
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        let _paused = pause_tracking();

        let start = start.min(length);
        let delete_count = delete_count.min(length - start);
        let insert_count = items.len();

        let removed: Vec<Value> = (start..start + delete_count)
            .map(|index| to_observed(self.element(index)))
            .collect();

        let tail = start + delete_count..length;
        if insert_count < delete_count {
            for from in tail {
                self.move_element(from, from - delete_count + insert_count)?;
            }
            for index in (length - delete_count + insert_count..length).rev() {
                self.delete(index);
            }
        } else if insert_count > delete_count {
            for from in tail.rev() {
                self.move_element(from, from - delete_count + insert_count)?;
            }
        }

        for (offset, item) in items.into_iter().enumerate() {
            self.set(start + offset, item)?;
        }
        self.set(PropertyKey::length(), length - delete_count + insert_count)?;
        Ok(removed)
    }
}

impl PartialEq for Observed {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Observed").field(&self.0.target).finish()
    }
}
