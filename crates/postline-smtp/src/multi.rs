//! Per-recipient error aggregation.
//!
//! A [`MultiError`] has one slot per item of a batch (one per recipient of a
//! transaction). Successful items keep an empty slot, so the i-th slot always
//! describes the i-th recipient the caller supplied.

use std::fmt;
use std::sync::Arc;

use crate::error::Error;

/// Errors of a batch operation, in one-to-one correspondence with its items.
///
/// Slots hold `Arc<Error>` because [`MultiError::merge`] may place the same
/// error into several slots.
#[derive(Debug, Clone, Default)]
pub struct MultiError {
    slots: Vec<Option<Arc<Error>>>,
}

impl MultiError {
    /// Creates an aggregator with `size` empty slots.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    /// Records the failure of item `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds for the batch.
    pub fn set(&mut self, index: usize, err: Error) {
        self.slots[index] = Some(Arc::new(err));
    }

    /// Returns the error recorded for item `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Error> {
        self.slots.get(index)?.as_deref()
    }

    /// Returns the batch size.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the batch has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the number of items that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Returns true if every item of a non-empty batch failed.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.failed() == self.len()
    }

    /// Iterates over the slots in batch order.
    pub fn iter(&self) -> impl Iterator<Item = Option<&Error>> {
        self.slots.iter().map(Option::as_deref)
    }

    /// Fills every empty slot with `err`.
    ///
    /// Returns the aggregator itself if it already held at least one error,
    /// otherwise `err` unchanged. Merging `None` into a clean batch yields
    /// `None`.
    #[must_use]
    pub fn merge(self, err: Option<Error>) -> Option<Error> {
        match err {
            Some(err) => Some(self.absorb(err)),
            None if self.failed() == 0 => None,
            None => Some(Error::Multi(self)),
        }
    }

    /// [`merge`](Self::merge) for a known error.
    pub(crate) fn absorb(mut self, err: Error) -> Error {
        if self.failed() == 0 {
            return err;
        }
        let shared = Some(Arc::new(err));
        for slot in self.slots.iter_mut().filter(|slot| slot.is_none()) {
            slot.clone_from(&shared);
        }
        Error::Multi(self)
    }

    /// Converts a fully failed batch into the error reported to callers:
    /// the single error for a one-item batch, the whole batch otherwise.
    pub(crate) fn into_failure(mut self) -> Error {
        if let [slot] = self.slots.as_mut_slice() {
            if let Some(shared) = slot.take() {
                match Arc::try_unwrap(shared) {
                    Ok(err) => return err,
                    Err(shared) => *slot = Some(shared),
                }
            }
        }
        Error::Multi(self)
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut errors = self.slots.iter().flatten();
        let Some(first) = errors.next() else {
            return f.write_str("(0 errors)");
        };
        match errors.count() {
            0 => write!(f, "{first}"),
            1 => write!(f, "{first} (and 1 other error)"),
            others => write!(f, "{first} (and {others} other errors)"),
        }
    }
}

impl std::error::Error for MultiError {}

/// Merges a new error with a previous one.
///
/// A batch `prev` absorbs `new` through [`MultiError::merge`]. Any other
/// `prev` wins over `new`; `new` is returned only when there was no previous
/// error.
#[must_use]
pub fn merge_error(prev: Option<Error>, new: Option<Error>) -> Option<Error> {
    match (prev, new) {
        (Some(Error::Multi(multi)), new) => multi.merge(new),
        (prev, Some(new)) => Some(combine(prev, new)),
        (prev, None) => prev,
    }
}

/// [`merge_error`] for a known new error.
pub(crate) fn combine(prev: Option<Error>, new: Error) -> Error {
    match prev {
        Some(Error::Multi(multi)) => multi.absorb(new),
        Some(prev) => prev,
        None => new,
    }
}
