//! Reactive Primitives
//!
//! This module implements the core reactive system: observed views, effects,
//! and the dependency store that connects them.
//!
//! # Concepts
//!
//! ## Observed Views
//!
//! An [`Observed`] view wraps a raw record or sequence. Reading a property
//! through the view inside a running effect registers the effect as a
//! dependent of that property. Writing a property through the view reruns
//! every effect that read it.
//!
//! ## Effects
//!
//! An [`Effect`] is a side-effecting computation that runs whenever its
//! dependencies change. Dependencies are re-collected on every run, so an
//! effect only ever depends on what its latest run actually read.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a view is read, we check if there is an active
//! tracking context and, if so, register the dependency.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod context;
mod dep;
mod effect;
mod observe;
mod runtime;
mod subscriber;

pub use context::{enable_tracking, pause_tracking, untracked, ReactiveContext, TrackingGuard};
pub use effect::{effect, effect_with_options, stop, Effect, EffectOptions, Runner, Scheduler};
pub use observe::{is_observed, observe, to_observed, to_raw, Observed};
pub use runtime::{Runtime, TriggerKind};
pub use subscriber::SubscriberId;

pub(crate) use runtime::forget_target;
