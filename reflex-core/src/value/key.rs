//! Property Keys
//!
//! A [`PropertyKey`] names a slot on a record or sequence. Keys spelled as a
//! canonical array index (`"3"`) are normalized to index keys, so `3` and
//! `"3"` address the same slot.
//!
//! Two keys never appear in user data and cannot be built outside the crate:
//! the *iterate* key, which stands for "the key set of this object" in the
//! dependency store, and the *raw marker*, which a view answers with its raw
//! value.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::util::{parse_index, MAX_INDEX};

/// The host's well-known protocol symbols.
///
/// Reads of these through a view are never tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownSymbol {
    AsyncIterator,
    HasInstance,
    IsConcatSpreadable,
    Iterator,
    Match,
    MatchAll,
    Replace,
    Search,
    Species,
    Split,
    ToPrimitive,
    ToStringTag,
    Unscopables,
}

impl WellKnownSymbol {
    /// The symbol's conventional description, e.g. `Symbol.iterator`.
    pub fn description(self) -> &'static str {
        match self {
            Self::AsyncIterator => "Symbol.asyncIterator",
            Self::HasInstance => "Symbol.hasInstance",
            Self::IsConcatSpreadable => "Symbol.isConcatSpreadable",
            Self::Iterator => "Symbol.iterator",
            Self::Match => "Symbol.match",
            Self::MatchAll => "Symbol.matchAll",
            Self::Replace => "Symbol.replace",
            Self::Search => "Symbol.search",
            Self::Species => "Symbol.species",
            Self::Split => "Symbol.split",
            Self::ToPrimitive => "Symbol.toPrimitive",
            Self::ToStringTag => "Symbol.toStringTag",
            Self::Unscopables => "Symbol.unscopables",
        }
    }
}

/// A unique, non-string property name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol(SymbolRepr);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SymbolRepr {
    WellKnown(WellKnownSymbol),
    Custom {
        id: u64,
        description: Option<Rc<str>>,
    },
}

impl Symbol {
    /// Create a fresh symbol, distinct from every other symbol.
    pub fn new(description: impl Into<Rc<str>>) -> Self {
        Self::custom(Some(description.into()))
    }

    /// Create a fresh symbol without a description.
    pub fn anonymous() -> Self {
        Self::custom(None)
    }

    fn custom(description: Option<Rc<str>>) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(SymbolRepr::Custom {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            description,
        })
    }

    pub fn is_well_known(&self) -> bool {
        matches!(self.0, SymbolRepr::WellKnown(_))
    }

    pub fn description(&self) -> Option<&str> {
        match &self.0 {
            SymbolRepr::WellKnown(symbol) => Some(symbol.description()),
            SymbolRepr::Custom { description, .. } => description.as_deref(),
        }
    }
}

impl From<WellKnownSymbol> for Symbol {
    fn from(symbol: WellKnownSymbol) -> Self {
        Self(SymbolRepr::WellKnown(symbol))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description().unwrap_or_default())
    }
}

/// The name of a property slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyKey(KeyRepr);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyRepr {
    Name(Rc<str>),
    Index(u32),
    Symbol(Symbol),
    Iterate,
    RawMarker,
}

impl PropertyKey {
    /// The `"length"` key of sequences.
    pub fn length() -> Self {
        Self(KeyRepr::Name(Rc::from("length")))
    }

    /// Synthetic key standing for the key set of a record.
    pub(crate) fn iterate() -> Self {
        Self(KeyRepr::Iterate)
    }

    /// Key a view answers with its raw value.
    pub(crate) fn raw_marker() -> Self {
        Self(KeyRepr::RawMarker)
    }

    pub fn is_length(&self) -> bool {
        matches!(&self.0, KeyRepr::Name(name) if &**name == "length")
    }

    /// Whether this key is a canonical sequence index.
    pub fn is_integer_key(&self) -> bool {
        matches!(self.0, KeyRepr::Index(_))
    }

    pub fn as_index(&self) -> Option<usize> {
        match self.0 {
            KeyRepr::Index(index) => Some(index as usize),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match &self.0 {
            KeyRepr::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match &self.0 {
            KeyRepr::Symbol(symbol) => Some(symbol),
            _ => None,
        }
    }

    pub(crate) fn is_raw_marker(&self) -> bool {
        matches!(self.0, KeyRepr::RawMarker)
    }

    /// Whether reads of this key bypass tracking.
    pub(crate) fn is_well_known_symbol(&self) -> bool {
        self.as_symbol().is_some_and(Symbol::is_well_known)
    }

    /// String form used by serialization, `None` for symbols and
    /// internal keys.
    pub(crate) fn to_property_name(&self) -> Option<String> {
        match &self.0 {
            KeyRepr::Name(name) => Some(name.to_string()),
            KeyRepr::Index(index) => Some(index.to_string()),
            _ => None,
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        match parse_index(name) {
            Some(index) => Self(KeyRepr::Index(index)),
            None => Self(KeyRepr::Name(Rc::from(name))),
        }
    }
}

impl From<String> for PropertyKey {
    fn from(name: String) -> Self {
        match parse_index(&name) {
            Some(index) => Self(KeyRepr::Index(index)),
            None => Self(KeyRepr::Name(Rc::from(name))),
        }
    }
}

impl From<&String> for PropertyKey {
    fn from(name: &String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<usize> for PropertyKey {
    fn from(index: usize) -> Self {
        match u32::try_from(index) {
            Ok(index) if index <= MAX_INDEX => Self(KeyRepr::Index(index)),
            _ => Self(KeyRepr::Name(Rc::from(index.to_string()))),
        }
    }
}

impl From<u32> for PropertyKey {
    fn from(index: u32) -> Self {
        Self::from(index as usize)
    }
}

impl From<i32> for PropertyKey {
    fn from(index: i32) -> Self {
        match usize::try_from(index) {
            Ok(index) => Self::from(index),
            Err(_) => Self(KeyRepr::Name(Rc::from(index.to_string()))),
        }
    }
}

impl From<Symbol> for PropertyKey {
    fn from(symbol: Symbol) -> Self {
        Self(KeyRepr::Symbol(symbol))
    }
}

impl From<WellKnownSymbol> for PropertyKey {
    fn from(symbol: WellKnownSymbol) -> Self {
        Self(KeyRepr::Symbol(symbol.into()))
    }
}

impl From<&PropertyKey> for PropertyKey {
    fn from(key: &PropertyKey) -> Self {
        key.clone()
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            KeyRepr::Name(name) => f.write_str(name),
            KeyRepr::Index(index) => write!(f, "{index}"),
            KeyRepr::Symbol(symbol) => write!(f, "{symbol}"),
            KeyRepr::Iterate => f.write_str("[[iterate]]"),
            KeyRepr::RawMarker => f.write_str("[[raw]]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_spellings_normalize() {
        assert_eq!(PropertyKey::from("3"), PropertyKey::from(3usize));
        assert_eq!(PropertyKey::from(3), PropertyKey::from(String::from("3")));
        assert!(PropertyKey::from("3").is_integer_key());
        assert_eq!(PropertyKey::from("3").as_index(), Some(3));

        assert!(!PropertyKey::from("03").is_integer_key());
        assert!(!PropertyKey::from(-1).is_integer_key());
        assert_eq!(PropertyKey::from(-1).as_name(), Some("-1"));
    }

    #[test]
    fn length_is_an_ordinary_name() {
        assert!(PropertyKey::length().is_length());
        assert_eq!(PropertyKey::from("length"), PropertyKey::length());
        assert!(!PropertyKey::from("len").is_length());
    }

    #[test]
    fn internal_keys_are_distinct_from_names() {
        assert_ne!(PropertyKey::iterate(), PropertyKey::from("[[iterate]]"));
        assert_ne!(PropertyKey::raw_marker(), PropertyKey::from("[[raw]]"));
        assert!(PropertyKey::raw_marker().is_raw_marker());
        assert_eq!(PropertyKey::iterate().to_property_name(), None);
    }

    #[test]
    fn symbols_are_unique() {
        let a = Symbol::new("tag");
        let b = Symbol::new("tag");

        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert!(!a.is_well_known());
        assert_eq!(a.to_string(), "Symbol(tag)");
    }

    #[test]
    fn well_known_symbols() {
        let iterator = Symbol::from(WellKnownSymbol::Iterator);

        assert!(iterator.is_well_known());
        assert_eq!(iterator, Symbol::from(WellKnownSymbol::Iterator));
        assert_eq!(iterator.description(), Some("Symbol.iterator"));
        assert!(PropertyKey::from(WellKnownSymbol::ToStringTag).is_well_known_symbol());
        assert!(!PropertyKey::from(Symbol::anonymous()).is_well_known_symbol());
    }
}
