//! Breakpoint and watchpoint registries
//!
//! A [`Registry`] is an ordered list of records unique by key. Every
//! mutation is announced to observers twice: once before the list changes
//! and once after, so an observer can act on the old and the new state.

pub mod breakpoint;
pub mod watchpoint;

use std::fmt;

use crate::common::{Error, Result};

pub use breakpoint::{Breakpoint, BreakpointKey};
pub use watchpoint::{split_condition, WatchSpecial, Watchpoint, WatchpointKey};

/// A record stored in a registry
pub trait Record: Clone + fmt::Debug {
    type Key: Clone + Eq + fmt::Debug;

    fn key(&self) -> Self::Key;

    /// Reject records that can never be valid
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn set_enabled(&mut self, enabled: bool);

    fn set_ignore_count(&mut self, count: u32);
}

/// A registry mutation as seen by observers
#[derive(Debug)]
pub enum Change<'a, R> {
    AboutToAdd(&'a R),
    Added(&'a R),
    AboutToUpdate { old: &'a R },
    Updated { new: &'a R },
    AboutToRemove(&'a [R]),
    Removed(&'a [R]),
}

/// Handle returned by [`Registry::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(u64);

type Observer<R> = Box<dyn for<'a> FnMut(&Change<'a, R>) + Send>;

/// Ordered collection of unique records with change notification
pub struct Registry<R: Record> {
    records: Vec<R>,
    observers: Vec<(ObserverId, Observer<R>)>,
    next_observer: u64,
}

impl<R: Record> Default for Registry<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            observers: Vec::new(),
            next_observer: 0,
        }
    }
}

impl<R: Record> fmt::Debug for Registry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("records", &self.records)
            .field("observers", &self.observers.len())
            .finish()
    }
}

fn notify<R>(observers: &mut [(ObserverId, Observer<R>)], change: &Change<'_, R>) {
    for (_, observer) in observers.iter_mut() {
        observer(change);
    }
}

impl<R: Record> Registry<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer; observers run synchronously in subscription
    /// order
    pub fn subscribe<F>(&mut self, observer: F) -> ObserverId
    where
        F: for<'a> FnMut(&Change<'a, R>) + Send + 'static,
    {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) {
        self.observers.retain(|(oid, _)| *oid != id);
    }

    fn position(&self, key: &R::Key) -> Option<usize> {
        self.records.iter().position(|r| &r.key() == key)
    }

    /// Append a record
    pub fn add(&mut self, record: R) -> Result<()> {
        record.validate()?;
        if self.contains(&record.key()) {
            return Err(Error::duplicate_key(record.key()));
        }

        notify(&mut self.observers, &Change::AboutToAdd(&record));
        self.records.push(record);
        if let Some(added) = self.records.last() {
            notify(&mut self.observers, &Change::Added(added));
        }
        Ok(())
    }

    /// Replace the record stored under `key`
    ///
    /// The replacement may carry a different key as long as no other record
    /// already uses it.
    pub fn update(&mut self, key: &R::Key, record: R) -> Result<()> {
        let index = self.position(key).ok_or_else(|| Error::not_found(key))?;
        record.validate()?;
        let new_key = record.key();
        if &new_key != key && self.contains(&new_key) {
            return Err(Error::duplicate_key(new_key));
        }

        notify(
            &mut self.observers,
            &Change::AboutToUpdate {
                old: &self.records[index],
            },
        );
        self.records[index] = record;
        notify(
            &mut self.observers,
            &Change::Updated {
                new: &self.records[index],
            },
        );
        Ok(())
    }

    fn modify(&mut self, key: &R::Key, f: impl FnOnce(&mut R)) -> Result<()> {
        let mut record = self.find(key).cloned().ok_or_else(|| Error::not_found(key))?;
        f(&mut record);
        self.update(key, record)
    }

    pub fn set_enabled(&mut self, key: &R::Key, enabled: bool) -> Result<()> {
        self.modify(key, |r| r.set_enabled(enabled))
    }

    pub fn set_ignore_count(&mut self, key: &R::Key, count: u32) -> Result<()> {
        self.modify(key, |r| r.set_ignore_count(count))
    }

    /// Remove the record stored under `key`
    pub fn remove(&mut self, key: &R::Key) -> Result<R> {
        let index = self.position(key).ok_or_else(|| Error::not_found(key))?;

        notify(
            &mut self.observers,
            &Change::AboutToRemove(std::slice::from_ref(&self.records[index])),
        );
        let removed = self.records.remove(index);
        notify(
            &mut self.observers,
            &Change::Removed(std::slice::from_ref(&removed)),
        );
        Ok(removed)
    }

    /// Remove every record with a single notification pair
    pub fn remove_all(&mut self) {
        if self.records.is_empty() {
            return;
        }
        notify(&mut self.observers, &Change::AboutToRemove(&self.records));
        let removed = std::mem::take(&mut self.records);
        notify(&mut self.observers, &Change::Removed(&removed));
    }

    pub fn find(&self, key: &R::Key) -> Option<&R> {
        self.records.iter().find(|r| &r.key() == key)
    }

    pub fn contains(&self, key: &R::Key) -> bool {
        self.position(key).is_some()
    }

    /// Snapshot of all records in insertion order
    pub fn list(&self) -> Vec<R> {
        self.records.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
