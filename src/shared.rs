//! Thread-safe handle for ledgers with more than one writer.
//!
//! Reading the tail, sealing the new entry, appending it and saving the
//! store all happen under one lock, so two writers can never both link to
//! the same parent.

use crate::chain::Verification;
use crate::entry::Entry;
use crate::error::LedgerError;
use crate::kv::KeyValueStore;
use crate::ledger::{Appended, Ledger};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cloneable, lock-guarded [`Ledger`].
#[derive(Debug)]
pub struct SharedLedger<S: KeyValueStore> {
    inner: Arc<Mutex<Ledger<S>>>,
}

impl<S: KeyValueStore> Clone for SharedLedger<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: KeyValueStore> SharedLedger<S> {
    /// Wraps an opened ledger.
    pub fn new(ledger: Ledger<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    // Appends are whole-or-nothing in memory, so a poisoned lock still
    // guards a consistent store.
    fn lock(&self) -> MutexGuard<'_, Ledger<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`Ledger::append_if_absent`].
    pub fn append_if_absent(
        &self,
        subject_id: &str,
        event_type: &str,
        value: i64,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<Appended, LedgerError> {
        self.lock()
            .append_if_absent(subject_id, event_type, value, title, now)
    }

    /// See [`Ledger::on_subject_active`].
    pub fn on_subject_active(&self, subject_id: &str) -> Result<Appended, LedgerError> {
        self.lock().on_subject_active(subject_id)
    }

    /// Snapshot of the subject's chain.
    pub fn get_chain(&self, subject_id: &str) -> Vec<Entry> {
        self.lock().get_chain(subject_id).to_vec()
    }

    /// See [`Ledger::verify`].
    pub fn verify(&self, subject_id: &str) -> Verification {
        self.lock().verify(subject_id)
    }

    /// Runs `f` with exclusive access to the ledger.
    pub fn with<R>(&self, f: impl FnOnce(&mut Ledger<S>) -> R) -> R {
        f(&mut self.lock())
    }
}
