//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when an observed property is
//! read, the current computation is registered as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack of running computations. Running an effect
//! pushes it; the guard returned by [`ReactiveContext::enter`] pops it when
//! dropped, including when the computation panics. The top of the stack is
//! the *current* computation.
//!
//! A thread-local flag additionally enables or disables tracking. Entering a
//! context turns tracking on and the guard restores the previous value, so a
//! pause requested by one computation never leaks into another.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Rc<dyn Subscriber>>> = RefCell::new(Vec::new());
    static SHOULD_TRACK: Cell<bool> = const { Cell::new(true) };
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack and the tracking flag are restored even
/// if the computation panics.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
    previous_should_track: bool,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, observed reads register the subscriber
    /// as a dependent.
    pub(crate) fn enter(subscriber: Rc<dyn Subscriber>) -> Self {
        let subscriber_id = subscriber.id();
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(subscriber));
        let previous_should_track = SHOULD_TRACK.with(|flag| flag.replace(true));

        Self {
            subscriber_id,
            previous_should_track,
        }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|subscriber| subscriber.id()))
    }

    pub(crate) fn current() -> Option<Rc<dyn Subscriber>> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Whether `id` is anywhere on the active stack.
    pub fn is_running(id: SubscriberId) -> bool {
        CONTEXT_STACK.with(|stack| stack.borrow().iter().any(|subscriber| subscriber.id() == id))
    }

    /// Depth of the active stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    /// Whether reads should currently be recorded.
    pub fn should_track() -> bool {
        SHOULD_TRACK.with(Cell::get)
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        // Verify we're popping the right context.
        if let Some(subscriber) = &popped {
            debug_assert_eq!(
                subscriber.id(),
                self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id,
                subscriber.id()
            );
        }
        SHOULD_TRACK.with(|flag| flag.set(self.previous_should_track));

        // The popped subscriber may be the last strong handle; release it
        // after the stack borrow has ended.
        drop(popped);
    }
}

/// Restores the previous tracking state when dropped.
#[must_use = "tracking is restored as soon as the guard is dropped"]
pub struct TrackingGuard {
    previous: bool,
}

impl Drop for TrackingGuard {
    fn drop(&mut self) {
        SHOULD_TRACK.with(|flag| flag.set(self.previous));
    }
}

fn set_tracking(enabled: bool) -> TrackingGuard {
    TrackingGuard {
        previous: SHOULD_TRACK.with(|flag| flag.replace(enabled)),
    }
}

/// Stop recording reads until the guard is dropped.
pub fn pause_tracking() -> TrackingGuard {
    set_tracking(false)
}

/// Record reads again until the guard is dropped, even inside a pause.
pub fn enable_tracking() -> TrackingGuard {
    set_tracking(true)
}

/// Run `f` without recording any of its reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _paused = pause_tracking();
    f()
}
