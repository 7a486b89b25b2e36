//! Typed merge used to combine partial reports.
//!
//! Three shapes, three rules:
//!
//! - sequences concatenate, keeping the order of the sources
//! - keyed maps merge shallowly, the later source winning on shared keys
//! - optional scalars are overwritten by a later source that has a value

use std::collections::BTreeMap;

/// Folds a later source into `self`.
pub trait Merge {
    fn merge(&mut self, other: Self);
}

impl<T> Merge for Vec<T> {
    fn merge(&mut self, other: Self) {
        self.extend(other);
    }
}

impl<K: Ord, V> Merge for BTreeMap<K, V> {
    fn merge(&mut self, other: Self) {
        for (key, value) in other {
            self.insert(key, value);
        }
    }
}

impl<T> Merge for Option<T> {
    fn merge(&mut self, other: Self) {
        if other.is_some() {
            *self = other;
        }
    }
}

/// Merges every source into one value, in order.
pub fn merge_all<T, I>(sources: I) -> T
where
    T: Merge + Default,
    I: IntoIterator<Item = T>,
{
    sources.into_iter().fold(T::default(), |mut acc, next| {
        acc.merge(next);
        acc
    })
}
