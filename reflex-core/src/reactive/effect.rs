//! Effect Implementation
//!
//! An Effect is a re-runnable computation whose observed reads are tracked
//! and which reruns when one of those reads later changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies (unless it is lazy).
//!
//! 2. Before every run, the effect leaves all of its dependency sets. Reads
//!    made during the run join it to new ones, so dependencies from branches
//!    not taken this time are dropped.
//!
//! 3. When any dependency changes, the effect reruns synchronously, or its
//!    scheduler is handed a [`Runner`] to decide when.
//!
//! # Ownership
//!
//! A [`Runner`] owns its effect. Dependency sets only hold weak links, so
//! an effect lives exactly as long as some runner handle (or a scheduler
//! that kept one) does. Dropping the last handle unsubscribes it.
//!
//! # Stopping
//!
//! [`stop`] leaves every dependency set and deactivates the effect. An effect
//! that stops itself while running is only marked, and the stop is applied
//! once the run unwinds, so its in-flight dependency collection is never
//! torn down underneath it. A stopped effect can still be run by hand; it
//! then calls its function with tracking paused.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::context::{untracked, ReactiveContext};
use super::dep::Dep;
use super::subscriber::{Subscriber, SubscriberId};

/// Callback that decides when a notified effect reruns.
pub type Scheduler<T> = Rc<dyn Fn(&Runner<T>)>;

/// Configuration for [`effect_with_options`].
pub struct EffectOptions<T: 'static> {
    lazy: bool,
    scheduler: Option<Scheduler<T>>,
}

impl<T: 'static> EffectOptions<T> {
    pub fn new() -> Self {
        Self {
            lazy: false,
            scheduler: None,
        }
    }

    /// Do not run on creation; the first run happens when the runner is
    /// invoked.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Hand the runner to `scheduler` instead of rerunning immediately when
    /// a dependency changes.
    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(&Runner<T>) + 'static,
    {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }
}

impl<T: 'static> Default for EffectOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A tracked, re-runnable computation.
pub struct Effect<T: 'static> {
    id: SubscriberId,
    callback: Box<dyn Fn() -> T>,
    active: Cell<bool>,
    defer_stop: Cell<bool>,
    deps: RefCell<SmallVec<[Rc<Dep>; 4]>>,
    scheduler: Option<Scheduler<T>>,
    lazy: bool,
    run_count: Cell<usize>,
}

impl<T: 'static> Effect<T> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Whether the effect still reacts to changes.
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn has_scheduler(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.run_count.get()
    }

    /// Number of dependency sets the effect currently belongs to.
    pub fn dependency_count(&self) -> usize {
        self.deps.borrow().len()
    }

    /// Stop reacting to changes.
    ///
    /// Deferred until the current run finishes when called from inside the
    /// effect's own function.
    pub fn stop(&self) {
        if ReactiveContext::current_subscriber() == Some(self.id) {
            debug!(effect = ?self.id, "stop deferred until run completes");
            self.defer_stop.set(true);
            return;
        }
        self.deactivate();
    }

    fn deactivate(&self) {
        if self.active.replace(false) {
            self.cleanup();
            debug!(effect = ?self.id, "effect stopped");
        }
    }

    /// Leave every dependency set.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps {
            dep.remove(self.id);
        }
    }

    fn run(self: &Rc<Self>) -> Option<T> {
        if !self.active.get() {
            return Some(untracked(|| (self.callback)()));
        }
        if ReactiveContext::is_running(self.id) {
            trace!(effect = ?self.id, "skipping re-entrant run");
            return None;
        }

        let _guard = RunGuard::enter(self);
        self.run_count.set(self.run_count.get() + 1);
        Some((self.callback)())
    }
}

impl<T: 'static> Subscriber for Effect<T> {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }

    fn record_dependency(&self, dep: Rc<Dep>) {
        self.deps.borrow_mut().push(dep);
    }

    fn notify(self: Rc<Self>) {
        match self.scheduler.clone() {
            Some(scheduler) => scheduler(&Runner { effect: self }),
            None => {
                self.run();
            }
        }
    }
}

impl<T: 'static> Drop for Effect<T> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl<T: 'static> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Keeps an effect on the active stack for the duration of one run.
///
/// On every exit path, panics included, the stack is popped first and a
/// stop requested during the run is applied afterwards.
struct RunGuard<'a, T: 'static> {
    effect: &'a Effect<T>,
    context: Option<ReactiveContext>,
}

impl<'a, T: 'static> RunGuard<'a, T> {
    fn enter(effect: &'a Rc<Effect<T>>) -> Self {
        let context = ReactiveContext::enter(effect.clone());
        effect.cleanup();
        Self {
            effect: &**effect,
            context: Some(context),
        }
    }
}

impl<T: 'static> Drop for RunGuard<'_, T> {
    fn drop(&mut self) {
        drop(self.context.take());
        if self.effect.defer_stop.replace(false) {
            self.effect.deactivate();
        }
    }
}

/// Handle returned by [`effect`]; invoking it runs the effect by hand.
///
/// The runner owns the effect. Once every handle is dropped the effect
/// unsubscribes and never reruns.
#[must_use = "dropping the runner stops the effect"]
pub struct Runner<T: 'static> {
    effect: Rc<Effect<T>>,
}

impl<T: 'static> Runner<T> {
    /// Run the effect now and return its function's result.
    ///
    /// Returns `None` when the effect is already running further up the
    /// stack. A stopped effect still runs, untracked.
    pub fn run(&self) -> Option<T> {
        self.effect.run()
    }

    /// The computation behind this runner.
    pub fn effect(&self) -> &Effect<T> {
        &self.effect
    }

    pub fn stop(&self) {
        self.effect.stop();
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.effect, &other.effect)
    }
}

impl<T: 'static> Clone for Runner<T> {
    fn clone(&self) -> Self {
        Self {
            effect: Rc::clone(&self.effect),
        }
    }
}

impl<T: 'static> fmt::Debug for Runner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Runner").field(&*self.effect).finish()
    }
}

/// Create an effect that runs `f` now and again whenever anything it read
/// changes.
///
/// Keep the returned runner for as long as the effect should react.
#[must_use = "dropping the runner stops the effect"]
pub fn effect<T, F>(f: F) -> Runner<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    effect_with_options(f, EffectOptions::default())
}

/// Create an effect with explicit [`EffectOptions`].
#[must_use = "dropping the runner stops the effect"]
pub fn effect_with_options<T, F>(f: F, options: EffectOptions<T>) -> Runner<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    let runner = Runner {
        effect: Rc::new(Effect {
            id: SubscriberId::new(),
            callback: Box::new(f),
            active: Cell::new(true),
            defer_stop: Cell::new(false),
            deps: RefCell::new(SmallVec::new()),
            scheduler: options.scheduler,
            lazy: options.lazy,
            run_count: Cell::new(0),
        }),
    };
    trace!(effect = ?runner.effect.id, lazy = options.lazy, "effect created");

    if !options.lazy {
        runner.run();
    }
    runner
}

/// Permanently deactivate the effect behind `runner`.
pub fn stop<T: 'static>(runner: &Runner<T>) {
    runner.stop();
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Rc::new(Cell::new(0));
        let counter = run_count.clone();

        let runner = effect(move || counter.set(counter.get() + 1));

        // Effect should have run once on creation
        assert_eq!(run_count.get(), 1);
        assert_eq!(runner.effect().run_count(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let run_count = Rc::new(Cell::new(0));
        let counter = run_count.clone();

        let runner = effect_with_options(
            move || counter.set(counter.get() + 1),
            EffectOptions::new().lazy(true),
        );

        // Effect should not have run
        assert_eq!(run_count.get(), 0);
        assert!(runner.effect().is_lazy());

        // Manually execute
        runner.run();
        assert_eq!(run_count.get(), 1);
        assert_eq!(runner.effect().run_count(), 1);
    }

    #[test]
    fn runner_returns_the_result() {
        let runner = effect(|| 21 * 2);
        assert_eq!(runner.run(), Some(42));
    }

    #[test]
    fn fallible_callbacks_pass_errors_through() {
        let runner = effect(|| -> Result<(), String> { Err("boom".into()) });
        assert_eq!(runner.run(), Some(Err("boom".to_string())));
        assert!(!ReactiveContext::is_active());
    }

    #[test]
    fn panics_restore_the_stack() {
        let runner = effect_with_options(
            || panic!("callback failed"),
            EffectOptions::<()>::new().lazy(true),
        );

        let result = catch_unwind(AssertUnwindSafe(|| runner.run()));

        assert!(result.is_err());
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::should_track());
    }

    #[test]
    fn stopped_effect_runs_untracked() {
        let runner = effect(|| ReactiveContext::should_track());
        assert_eq!(runner.run(), Some(true));

        stop(&runner);

        assert!(!runner.effect().is_active());
        assert_eq!(runner.run(), Some(false));
        assert_eq!(runner.effect().run_count(), 2);
    }

    #[test]
    fn self_stop_is_deferred() {
        let slot: Rc<RefCell<Option<Runner<bool>>>> = Rc::new(RefCell::new(None));
        let inner = slot.clone();

        let runner = effect_with_options(
            move || {
                if let Some(runner) = inner.borrow().as_ref() {
                    runner.stop();
                    // Still active until the run unwinds.
                    return runner.effect().is_active();
                }
                false
            },
            EffectOptions::new().lazy(true),
        );
        *slot.borrow_mut() = Some(runner.clone());

        assert_eq!(runner.run(), Some(true));
        assert!(!runner.effect().is_active());

        // Break the runner <-> closure cycle.
        slot.borrow_mut().take();
    }

    #[test]
    fn re_entrant_run_is_skipped() {
        let slot: Rc<RefCell<Option<Runner<Option<u32>>>>> = Rc::new(RefCell::new(None));
        let inner = slot.clone();

        let runner = effect_with_options(
            move || {
                let nested = inner.borrow().clone();
                nested.map(|runner| runner.run().flatten().unwrap_or(0))
            },
            EffectOptions::new().lazy(true),
        );
        *slot.borrow_mut() = Some(runner.clone());

        // The nested call is skipped and yields `None`, mapped to 0.
        assert_eq!(runner.run(), Some(Some(0)));
        slot.borrow_mut().take();
    }

    #[test]
    fn debug_output_names_the_effect() {
        let runner = effect(|| ());
        let rendered = format!("{runner:?}");
        assert!(rendered.contains("Effect"));
        assert!(rendered.contains("run_count: 1"));
    }
}
