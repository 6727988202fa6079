//! Observable Data Model
//!
//! Values the engine can observe. Primitives are plain data; objects are
//! [`RawValue`] handles (records and sequences) or [`Observed`] views over
//! them. Views are first-class values: they can be stored in properties and
//! used as prototypes, and reading an object-valued property through a view
//! hands back another view.
//!
//! Equality on [`Value`] is same-value equality (see
//! [`same_value`](crate::util::same_value)): `NaN` equals `NaN`, `+0` and `-0`
//! differ, and objects compare by identity.

mod elements;
mod key;
mod raw;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::reactive::Observed;
use crate::util::same_value;

pub use key::{PropertyKey, Symbol, WellKnownSymbol};
pub use raw::{Getter, RawId, RawValue, Setter};

pub(crate) use raw::{ordinary_get, ordinary_has, ordinary_set, WeakRaw};

/// A dynamically typed value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(RawValue),
    Observed(Observed),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&RawValue> {
        match self {
            Self::Object(raw) => Some(raw),
            _ => None,
        }
    }

    pub fn as_observed(&self) -> Option<&Observed> {
        match self {
            Self::Observed(view) => Some(view),
            _ => None,
        }
    }

    /// Host type name, as `typeof` would report it.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(_) | Self::Observed(_) => "object",
        }
    }

    /// String form used when an element is joined into a sequence string:
    /// `undefined` and `null` become empty.
    pub(crate) fn to_join_string(&self) -> String {
        if self.is_nullish() {
            String::new()
        } else {
            self.to_string()
        }
    }
}

thread_local! {
    /// Sequences whose elements are being joined on this thread.
    static JOINING: RefCell<Vec<RawId>> = const { RefCell::new(Vec::new()) };
}

/// Pops the innermost [`JOINING`] entry on drop.
struct JoinGuard;

impl Drop for JoinGuard {
    fn drop(&mut self) {
        JOINING.with(|joining| {
            joining.borrow_mut().pop();
        });
    }
}

/// Run `render` for the sequence `id` unless that sequence is already being
/// joined further up, in which case it renders empty.
pub(crate) fn join_once(id: RawId, render: impl FnOnce() -> String) -> String {
    let entered = JOINING.with(|joining| {
        let mut joining = joining.borrow_mut();
        if joining.contains(&id) {
            false
        } else {
            joining.push(id);
            true
        }
    });
    if !entered {
        return String::new();
    }

    let _guard = JoinGuard;
    render()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        same_value(self, other)
    }
}

fn format_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == 0.0 {
        f.write_str("0")
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(n) => format_number(f, *n),
            Self::String(s) => f.write_str(s),
            Self::Object(raw) => match raw.length() {
                Some(length) => f.write_str(&join_once(raw.id(), || {
                    (0..length)
                        .map(|index| raw.get(index).to_join_string())
                        .collect::<Vec<_>>()
                        .join(",")
                })),
                None => f.write_str("[object Object]"),
            },
            Self::Observed(view) if view.is_sequence() => f.write_str(&view.join(",")),
            Self::Observed(_) => f.write_str("[object Object]"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(Rc::from(value))
    }
}

impl From<RawValue> for Value {
    fn from(raw: RawValue) -> Self {
        Self::Object(raw)
    }
}

impl From<&RawValue> for Value {
    fn from(raw: &RawValue) -> Self {
        Self::Object(raw.clone())
    }
}

impl From<Observed> for Value {
    fn from(view: Observed) -> Self {
        Self::Observed(view)
    }
}

impl From<&Observed> for Value {
    fn from(view: &Observed) -> Self {
        Self::Observed(view.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Builds fresh raw records and sequences for JSON objects and arrays.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(value) => Self::Bool(value),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::from(s),
            serde_json::Value::Array(items) => {
                Self::Object(RawValue::sequence(items.into_iter().map(Self::from)))
            }
            serde_json::Value::Object(entries) => Self::Object(RawValue::record_from(
                entries.into_iter().map(|(key, value)| (key, Self::from(value))),
            )),
        }
    }
}

/// Serializes a snapshot. Serializing an [`Observed`] value reads through the
/// view, so the reads are tracked like any other.
///
/// Symbol-keyed slots are skipped. Cyclic data recurses without bound.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Undefined | Self::Null => serializer.serialize_unit(),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
                serializer.serialize_i64(*n as i64)
            }
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::String(s) => serializer.serialize_str(s),
            Self::Object(raw) => {
                let receiver = self.clone();
                serialize_object(
                    serializer,
                    raw.length(),
                    raw.own_keys(),
                    |key| ordinary_get(raw, key, &receiver),
                )
            }
            Self::Observed(view) => {
                let length = view.is_sequence().then(|| view.len());
                serialize_object(serializer, length, view.own_keys(), |key| view.get(key))
            }
        }
    }
}

fn serialize_object<S, F>(
    serializer: S,
    length: Option<usize>,
    keys: Vec<PropertyKey>,
    read: F,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    F: Fn(&PropertyKey) -> Value,
{
    if let Some(length) = length {
        let mut seq = serializer.serialize_seq(Some(length))?;
        for index in 0..length {
            seq.serialize_element(&read(&PropertyKey::from(index)))?;
        }
        return seq.end();
    }

    let mut map = serializer.serialize_map(None)?;
    for key in keys {
        if let Some(name) = key.to_property_name() {
            map.serialize_entry(&name, &read(&key))?;
        }
    }
    map.end()
}
