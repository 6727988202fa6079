//! Sequence Storage
//!
//! Elements are kept in a dense vector while writes stay close to its end.
//! Indices far past the dense part go to an ordered side map, so a sequence
//! with a huge `length` or a lone high index costs only what it stores.
//!
//! Invariants: `dense.len() <= length`; every key of `sparse` is at least
//! `dense.len()` and below `length`.

use std::collections::BTreeMap;

use super::Value;

/// Largest gap past the dense end that is still filled with holes instead
/// of going to the side map.
const MAX_DENSE_GAP: usize = 1024;

#[derive(Default)]
pub(super) struct Elements {
    dense: Vec<Option<Value>>,
    sparse: BTreeMap<usize, Value>,
    length: usize,
}

impl Elements {
    pub(super) fn from_dense(items: Vec<Option<Value>>) -> Self {
        Self {
            length: items.len(),
            dense: items,
            sparse: BTreeMap::new(),
        }
    }

    pub(super) fn len(&self) -> usize {
        self.length
    }

    pub(super) fn get(&self, index: usize) -> Option<&Value> {
        match self.dense.get(index) {
            Some(element) => element.as_ref(),
            None => self.sparse.get(&index),
        }
    }

    pub(super) fn contains(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Store `value` at `index`, growing `length` past it if needed.
    pub(super) fn set(&mut self, index: usize, value: Value) {
        let dense_len = self.dense.len();
        if index < dense_len {
            self.dense[index] = Some(value);
        } else if index - dense_len <= MAX_DENSE_GAP {
            self.dense.resize(index + 1, None);
            self.dense[index] = Some(value);
            self.absorb_sparse();
        } else {
            self.sparse.insert(index, value);
        }
        self.length = self.length.max(index + 1);
    }

    /// Turn `index` into a hole. `length` is unchanged.
    pub(super) fn remove(&mut self, index: usize) {
        match self.dense.get_mut(index) {
            Some(element) => *element = None,
            None => {
                self.sparse.remove(&index);
            }
        }
    }

    /// Truncate or extend with holes.
    pub(super) fn set_len(&mut self, length: usize) {
        if length < self.dense.len() {
            self.dense.truncate(length);
            self.sparse.clear();
        } else {
            drop(self.sparse.split_off(&length));
        }
        self.length = length;
    }

    /// Present indices in ascending order.
    pub(super) fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.dense
            .iter()
            .enumerate()
            .filter(|(_, element)| element.is_some())
            .map(|(index, _)| index)
            .chain(self.sparse.keys().copied())
    }

    /// Move side-map entries the dense part now covers into it.
    fn absorb_sparse(&mut self) {
        let rest = self.sparse.split_off(&self.dense.len());
        for (index, value) in std::mem::replace(&mut self.sparse, rest) {
            self.dense[index] = Some(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_near_the_end_stay_dense() {
        let mut elements = Elements::from_dense(vec![Some(Value::from(1))]);
        elements.set(3, Value::from(4));

        assert_eq!(elements.len(), 4);
        assert_eq!(elements.dense.len(), 4);
        assert!(elements.sparse.is_empty());
        assert!(!elements.contains(1));
    }

    #[test]
    fn far_writes_go_to_the_side_map() {
        let mut elements = Elements::default();
        elements.set(4_000_000_000, Value::from("far"));

        assert_eq!(elements.len(), 4_000_000_001);
        assert!(elements.dense.is_empty());
        assert_eq!(elements.get(4_000_000_000), Some(&Value::from("far")));
        assert_eq!(elements.indices().collect::<Vec<_>>(), [4_000_000_000]);
    }

    #[test]
    fn dense_growth_absorbs_covered_entries() {
        let mut elements = Elements::default();
        elements.set(2000, Value::from("b"));
        elements.set(1500, Value::from("a"));
        assert_eq!(elements.dense.len(), 0);

        for index in 0..1100 {
            elements.set(index, Value::from(index));
        }
        elements.set(1600, Value::from("c"));

        assert_eq!(elements.dense.len(), 1601);
        assert_eq!(elements.sparse.keys().copied().collect::<Vec<_>>(), [2000]);
        assert_eq!(elements.get(1500), Some(&Value::from("a")));
    }

    #[test]
    fn set_len_drops_everything_past_the_end() {
        let mut elements = Elements::from_dense(vec![Some(Value::from(1)), Some(Value::from(2))]);
        elements.set(1_000_000, Value::from(3));

        elements.set_len(10);
        assert_eq!(elements.len(), 10);
        assert!(elements.get(1_000_000).is_none());
        assert_eq!(elements.indices().count(), 2);

        elements.set_len(1);
        assert_eq!(elements.indices().collect::<Vec<_>>(), [0]);

        elements.set_len(u32::MAX as usize);
        assert_eq!(elements.len(), u32::MAX as usize);
        assert_eq!(elements.dense.len(), 1);
    }

    #[test]
    fn remove_leaves_a_hole() {
        let mut elements = Elements::from_dense(vec![Some(Value::from(1)), Some(Value::from(2))]);
        elements.set(5000, Value::from(3));

        elements.remove(0);
        elements.remove(5000);

        assert_eq!(elements.len(), 5001);
        assert_eq!(elements.indices().collect::<Vec<_>>(), [1]);
    }
}
