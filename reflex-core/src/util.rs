//! Utility Predicates
//!
//! Pure type and equality tests shared by the data model and the engine.

use crate::value::Value;

/// Largest valid sequence index. `u32::MAX` itself is reserved so that a
/// sequence length always fits in a `u32`.
pub(crate) const MAX_INDEX: u32 = u32::MAX - 1;

/// Whether `value` is object-like: a raw record/sequence or an observed view.
pub fn is_object(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Observed(_))
}

/// Whether `value` is a sequence, raw or observed.
pub fn is_sequence(value: &Value) -> bool {
    match value {
        Value::Object(raw) => raw.is_sequence(),
        Value::Observed(view) => view.is_sequence(),
        _ => false,
    }
}

/// Whether `key` is the canonical spelling of a sequence index.
///
/// `"0"` and `"42"` qualify; `"-1"`, `"01"`, `"1.5"` and `"NaN"` do not.
pub fn is_integer_key(key: &str) -> bool {
    parse_index(key).is_some()
}

pub(crate) fn parse_index(key: &str) -> Option<u32> {
    let bytes = key.as_bytes();
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    key.parse::<u32>().ok().filter(|index| *index <= MAX_INDEX)
}

/// Same-value equality.
///
/// `NaN` equals `NaN`, `+0` and `-0` are distinct, objects compare by
/// identity, and a view never equals its own raw value.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => {
            if a.is_nan() && b.is_nan() {
                true
            } else {
                a == b && a.is_sign_negative() == b.is_sign_negative()
            }
        }
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
        (Value::Observed(a), Value::Observed(b)) => a.ptr_eq(b),
        _ => false,
    }
}

/// Whether a write of `value` over `old_value` is an actual change.
pub fn has_changed(value: &Value, old_value: &Value) -> bool {
    !same_value(value, old_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RawValue;

    #[test]
    fn integer_keys_must_be_canonical() {
        assert!(is_integer_key("0"));
        assert!(is_integer_key("42"));
        assert!(is_integer_key("4294967294"));

        assert!(!is_integer_key(""));
        assert!(!is_integer_key("-1"));
        assert!(!is_integer_key("01"));
        assert!(!is_integer_key("1.5"));
        assert!(!is_integer_key("NaN"));
        assert!(!is_integer_key("length"));
        assert!(!is_integer_key("4294967295"));
    }

    #[test]
    fn same_value_number_semantics() {
        assert!(same_value(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
        assert!(!same_value(&Value::Number(0.0), &Value::Number(-0.0)));
        assert!(same_value(&Value::Number(7.0), &Value::Number(7.0)));
        assert!(has_changed(&Value::Number(1.0), &Value::Number(2.0)));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = RawValue::record();
        let b = RawValue::record();

        assert!(same_value(&Value::Object(a.clone()), &Value::Object(a.clone())));
        assert!(!same_value(&Value::Object(a), &Value::Object(b)));
        assert!(!same_value(&Value::Undefined, &Value::Null));
    }

    #[test]
    fn object_predicates() {
        let list = RawValue::sequence([1, 2]);
        assert!(is_object(&Value::Object(list.clone())));
        assert!(is_sequence(&Value::Object(list)));
        assert!(!is_sequence(&Value::Object(RawValue::record())));
        assert!(!is_object(&Value::from("text")));
    }
}
