//! Raw Values
//!
//! A [`RawValue`] is the caller-owned data an [`Observed`] view wraps: a
//! record of insertion-ordered property slots, or a sequence of elements
//! with holes. Raw values are identity-significant; cloning a `RawValue`
//! clones the handle, not the data.
//!
//! Every raw value may delegate to a prototype. Reads, writes and
//! membership tests that miss an own slot continue along that link, and
//! when the prototype is an observed view the delegated operation runs
//! through the view's interceptors with the original receiver. Writes that
//! land on a data slot always define the slot on the receiver, never on the
//! prototype that owned the inherited slot.
//!
//! Operations on a `RawValue` itself are not tracked and do not trigger
//! anything, except where delegation passes through a view.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::error::{ReactiveError, Result};
use crate::reactive;
use crate::util::MAX_INDEX;

use super::elements::Elements;
use super::key::PropertyKey;
use super::Value;

/// Accessor getter; receives the receiver the read started from.
pub type Getter = Rc<dyn Fn(&Value) -> Value>;

/// Accessor setter; receives the receiver the write started from.
pub type Setter = Rc<dyn Fn(&Value, Value)>;

#[derive(Clone)]
pub(crate) enum Slot {
    Data(Value),
    Accessor {
        get: Option<Getter>,
        set: Option<Setter>,
    },
}

struct RawData {
    /// `Some` for sequences.
    elements: Option<Elements>,
    slots: IndexMap<PropertyKey, Slot>,
    prototype: Option<Value>,
}

impl Drop for RawData {
    fn drop(&mut self) {
        reactive::forget_target(RawId(self as *const Self as usize));
    }
}

/// Stable identity of a live raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawId(usize);

/// Handle to a raw record or sequence.
#[derive(Clone)]
pub struct RawValue(Rc<RefCell<RawData>>);

/// Non-owning handle used by the dependency store and the view cache.
#[derive(Clone)]
pub(crate) struct WeakRaw(Weak<RefCell<RawData>>);

impl WeakRaw {
    pub(crate) fn upgrade(&self) -> Option<RawValue> {
        self.0.upgrade().map(RawValue)
    }

    /// Whether this handle still points at `raw`.
    pub(crate) fn is(&self, raw: &RawValue) -> bool {
        self.0.strong_count() > 0 && std::ptr::eq(self.0.as_ptr(), Rc::as_ptr(&raw.0))
    }
}

impl RawValue {
    fn with_data(elements: Option<Elements>) -> Self {
        Self(Rc::new(RefCell::new(RawData {
            elements,
            slots: IndexMap::new(),
            prototype: None,
        })))
    }

    /// Create an empty record.
    pub fn record() -> Self {
        Self::with_data(None)
    }

    /// Create a record from key/value pairs, in order.
    pub fn record_from<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<PropertyKey>,
        V: Into<Value>,
    {
        let raw = Self::record();
        {
            let mut data = raw.0.borrow_mut();
            for (key, value) in entries {
                data.slots.insert(key.into(), Slot::Data(value.into()));
            }
        }
        raw
    }

    /// Create a dense sequence.
    pub fn sequence<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        let items = items.into_iter().map(|item| Some(item.into())).collect();
        Self::with_data(Some(Elements::from_dense(items)))
    }

    pub fn id(&self) -> RawId {
        RawId(self.0.as_ptr() as usize)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakRaw {
        WeakRaw(Rc::downgrade(&self.0))
    }

    pub fn is_sequence(&self) -> bool {
        self.0.borrow().elements.is_some()
    }

    /// Element count of a sequence, `None` for records.
    pub fn length(&self) -> Option<usize> {
        self.0.borrow().elements.as_ref().map(Elements::len)
    }

    pub fn prototype(&self) -> Option<Value> {
        self.0.borrow().prototype.clone()
    }

    /// Replace the prototype link.
    ///
    /// Passing an observed view makes delegated operations run through that
    /// view's interceptors.
    pub fn set_prototype(&self, prototype: Option<Value>) -> Result<()> {
        if let Some(parent) = &prototype {
            let mut cursor = match parent {
                Value::Object(raw) => Some(raw.clone()),
                Value::Observed(view) => Some(view.target().clone()),
                other => return Err(ReactiveError::InvalidPrototype(other.type_name())),
            };
            while let Some(raw) = cursor {
                if raw.ptr_eq(self) {
                    return Err(ReactiveError::PrototypeCycle);
                }
                cursor = raw.prototype().and_then(|next| match next {
                    Value::Object(raw) => Some(raw),
                    Value::Observed(view) => Some(view.target().clone()),
                    _ => None,
                });
            }
        }
        self.0.borrow_mut().prototype = prototype;
        Ok(())
    }

    /// Install an accessor slot. Either half may be omitted.
    pub fn define_accessor(&self, key: impl Into<PropertyKey>, get: Option<Getter>, set: Option<Setter>) {
        self.0
            .borrow_mut()
            .slots
            .insert(key.into(), Slot::Accessor { get, set });
    }

    /// Read `key`, following the prototype chain.
    pub fn get(&self, key: impl Into<PropertyKey>) -> Value {
        ordinary_get(self, &key.into(), &Value::Object(self.clone()))
    }

    /// Write `key`, following the prototype chain for inherited accessors.
    ///
    /// Returns `Ok(false)` when the write was refused (an inherited accessor
    /// without a setter).
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Result<bool> {
        ordinary_set(self, &key.into(), value.into(), &Value::Object(self.clone()))
    }

    /// Membership test, following the prototype chain.
    pub fn has(&self, key: impl Into<PropertyKey>) -> bool {
        ordinary_has(self, &key.into())
    }

    /// Remove an own slot. Returns `false` only for `length`.
    pub fn delete(&self, key: impl Into<PropertyKey>) -> bool {
        self.delete_own(&key.into())
    }

    pub fn has_own(&self, key: &PropertyKey) -> bool {
        let data = self.0.borrow();
        match (&data.elements, key.as_index()) {
            (Some(elements), Some(index)) => elements.contains(index),
            (Some(_), None) if key.is_length() => true,
            _ => data.slots.contains_key(key),
        }
    }

    /// Own keys: present indices in ascending order, then `length` for
    /// sequences, then named and symbol slots in insertion order.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let data = self.0.borrow();
        let mut keys = Vec::with_capacity(data.slots.len());
        if let Some(elements) = &data.elements {
            keys.extend(elements.indices().map(PropertyKey::from));
            keys.push(PropertyKey::length());
        }
        keys.extend(data.slots.keys().cloned());
        keys
    }

    pub(crate) fn own_slot(&self, key: &PropertyKey) -> Option<Slot> {
        let data = self.0.borrow();
        if let Some(elements) = &data.elements {
            if let Some(index) = key.as_index() {
                return elements.get(index).cloned().map(Slot::Data);
            }
            if key.is_length() {
                return Some(Slot::Data(Value::from(elements.len())));
            }
        }
        data.slots.get(key).cloned()
    }

    /// Define or overwrite an own data slot, growing or truncating sequences
    /// as needed.
    pub(crate) fn define_data(&self, key: &PropertyKey, value: Value) -> Result<bool> {
        let mut data = self.0.borrow_mut();
        if let Some(elements) = data.elements.as_mut() {
            if let Some(index) = key.as_index() {
                elements.set(index, value);
                return Ok(true);
            }
            if key.is_length() {
                let length = validate_length(&value)?;
                elements.set_len(length);
                return Ok(true);
            }
        }
        data.slots.insert(key.clone(), Slot::Data(value));
        Ok(true)
    }

    pub(crate) fn delete_own(&self, key: &PropertyKey) -> bool {
        let mut data = self.0.borrow_mut();
        if let Some(elements) = data.elements.as_mut() {
            if let Some(index) = key.as_index() {
                elements.remove(index);
                return true;
            }
            if key.is_length() {
                return false;
            }
        }
        data.slots.shift_remove(key);
        true
    }
}

impl fmt::Debug for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_sequence() { "sequence" } else { "record" };
        f.debug_struct("RawValue")
            .field("id", &self.id())
            .field("kind", &kind)
            .finish()
    }
}

fn validate_length(value: &Value) -> Result<usize> {
    match value {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= f64::from(MAX_INDEX) + 1.0 => {
            Ok(*n as usize)
        }
        other => Err(ReactiveError::InvalidLength(other.to_string())),
    }
}

/// The raw value a write should land on when `receiver` is the object the
/// write started from.
fn receiver_target(receiver: &Value) -> Option<RawValue> {
    match receiver {
        Value::Object(raw) => Some(raw.clone()),
        Value::Observed(view) => Some(view.target().clone()),
        _ => None,
    }
}

pub(crate) fn ordinary_get(target: &RawValue, key: &PropertyKey, receiver: &Value) -> Value {
    match target.own_slot(key) {
        Some(Slot::Data(value)) => value,
        Some(Slot::Accessor { get, .. }) => get.map(|get| get(receiver)).unwrap_or_default(),
        None => match target.prototype() {
            Some(Value::Observed(parent)) => parent.intercept_get(key, receiver),
            Some(Value::Object(parent)) => ordinary_get(&parent, key, receiver),
            _ => Value::Undefined,
        },
    }
}

pub(crate) fn ordinary_has(target: &RawValue, key: &PropertyKey) -> bool {
    if target.has_own(key) {
        return true;
    }
    match target.prototype() {
        Some(Value::Observed(parent)) => parent.intercept_has(key),
        Some(Value::Object(parent)) => ordinary_has(&parent, key),
        _ => false,
    }
}

pub(crate) fn ordinary_set(
    target: &RawValue,
    key: &PropertyKey,
    value: Value,
    receiver: &Value,
) -> Result<bool> {
    let slot = match target.own_slot(key) {
        Some(slot) => slot,
        None => match target.prototype() {
            Some(Value::Observed(parent)) => return parent.intercept_set(key, value, receiver),
            Some(Value::Object(parent)) => return ordinary_set(&parent, key, value, receiver),
            _ => Slot::Data(Value::Undefined),
        },
    };

    match slot {
        Slot::Accessor { set: Some(set), .. } => {
            set(receiver, value);
            Ok(true)
        }
        Slot::Accessor { set: None, .. } => Ok(false),
        Slot::Data(_) => {
            let Some(owner) = receiver_target(receiver) else {
                return Ok(false);
            };
            if let Some(Slot::Accessor { .. }) = owner.own_slot(key) {
                return Ok(false);
            }
            owner.define_data(key, value)
        }
    }
}
