//! Reflex Core
//!
//! This crate provides a fine-grained reactive dependency-tracking engine.
//! It implements:
//!
//! - Observed views over plain records and sequences
//! - Effects that rerun when the properties they read change
//! - Per-property dependency tracking with branch pruning
//! - Sequence mutators (`push`, `pop`, `shift`, `unshift`, `splice`)
//!
//! The engine is single-threaded: all state lives in thread-locals, and views
//! and effects are `!Send`.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: The observable data model (values, raw records and sequences,
//!   property keys)
//! - `reactive`: Observed views, effects and the dependency store
//! - `util`: Value predicates shared by both
//!
//! # Example
//!
//! ```rust,ignore
//! use reflex_core::reactive::{effect, observe};
//! use reflex_core::value::RawValue;
//!
//! // Observe a record
//! let counter = observe(&RawValue::record_from([("num", 0)]));
//!
//! // Create an effect that reads it
//! let view = counter.clone();
//! let runner = effect(move || {
//!     println!("Count: {}", view.get("num"));
//! });
//!
//! // Update through the view
//! counter.set("num", 7)?;
//! // Effect automatically runs, prints: "Count: 7"
//! ```

pub mod reactive;
pub mod util;
pub mod value;

mod error;

pub use error::{ReactiveError, Result};
pub use reactive::{effect, effect_with_options, observe, stop, EffectOptions, Observed, Runner};
pub use value::{PropertyKey, RawValue, Value};
