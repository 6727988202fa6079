//! Dependency Sets
//!
//! A [`Dep`] is the set of subscribers that read one (target, key) pair.
//! Members are kept in subscription order and held weakly, so a set never
//! keeps a computation alive on its own.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::subscriber::{Subscriber, SubscriberId};

#[derive(Default)]
pub(crate) struct Dep {
    subscribers: RefCell<IndexMap<SubscriberId, Weak<dyn Subscriber>>>,
}

impl Dep {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add `subscriber` unless it is already a member. Returns whether it
    /// was added.
    pub(crate) fn insert(&self, subscriber: &Rc<dyn Subscriber>) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        if subscribers.contains_key(&subscriber.id()) {
            return false;
        }
        subscribers.insert(subscriber.id(), Rc::downgrade(subscriber));
        true
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        self.subscribers.borrow_mut().shift_remove(&id);
    }

    #[cfg(test)]
    fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.borrow().contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Copy the members out so the set can change while they are notified.
    pub(crate) fn snapshot(&self) -> SmallVec<[(SubscriberId, Weak<dyn Subscriber>); 4]> {
        self.subscribers
            .borrow()
            .iter()
            .map(|(id, subscriber)| (*id, subscriber.clone()))
            .collect()
    }
}
