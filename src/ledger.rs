//! The achievement ledger: a per-subject, append-only, hash-linked log.
//!
//! ## Append
//!
//! [`Ledger::append_if_absent`] reads the subject's tail, seals a new entry
//! that embeds the tail's hash, appends it and persists the whole store.
//! Event types listed in [`LedgerConfig::idempotent_types`] are recorded at
//! most once per subject; a repeated call returns the existing entry and
//! touches nothing.
//!
//! ## Persistence
//!
//! The store is loaded once in [`Ledger::open`] and saved after every
//! append.  A failed save does not roll the append back: the entry stands
//! for the session, the failure is kept in [`Ledger::persist_error`] and
//! the next mutation (or [`Ledger::flush`]) writes the whole store again.
//!
//! ## Writers
//!
//! Mutation takes `&mut self`, so a `Ledger` has exactly one writer.  Use
//! [`SharedLedger`](crate::SharedLedger) when several threads append.

use crate::chain::{verify_with, Verification};
use crate::config::{LedgerConfig, WELCOME_EVENT, WELCOME_TITLE, WELCOME_VALUE};
use crate::entry::{build_entry, mint_id, Entry};
use crate::error::LedgerError;
use crate::kv::KeyValueStore;
use crate::report::ChainReport;
use crate::store::{LedgerStore, LoadReport};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, warn};
#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

/// Result of [`Ledger::append_if_absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Appended {
    /// A new entry was sealed and appended.
    Created(Entry),
    /// An idempotent event was already recorded; nothing changed.
    Existing(Entry),
}

impl Appended {
    /// The created or pre-existing entry.
    pub fn entry(&self) -> &Entry {
        match self {
            Self::Created(entry) | Self::Existing(entry) => entry,
        }
    }

    /// True when this call appended a new entry.
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    /// Consumes the outcome and returns the entry.
    pub fn into_entry(self) -> Entry {
        match self {
            Self::Created(entry) | Self::Existing(entry) => entry,
        }
    }
}

/// Hash-linked achievement ledger over a key-value backend.
#[derive(Debug)]
pub struct Ledger<S: KeyValueStore> {
    store: LedgerStore,
    backend: S,
    config: LedgerConfig,
    persist_error: Option<LedgerError>,
}

impl<S: KeyValueStore> Ledger<S> {
    /// Loads the ledger document from `backend`.
    ///
    /// Malformed records are dropped (see [`LoadReport`]).  The raw document
    /// is first copied to `<storage_key>_corrupt` so the next save cannot
    /// erase it; a backend failure on either step is an error.
    pub fn open(backend: S, config: LedgerConfig) -> Result<(Self, LoadReport), LedgerError> {
        let (store, report) = match backend.load(&config.storage_key)? {
            Some(raw) => {
                let (store, mut report) = LedgerStore::from_json(&raw);
                if !report.is_clean() {
                    let key = corrupt_key(&config.storage_key);
                    backend.save(&key, &raw)?;
                    warn!(key = %key, "preserved unreadable achievement document");
                    report.preserved_as = Some(key);
                }
                (store, report)
            }
            None => (LedgerStore::new(), LoadReport::default()),
        };
        debug!(
            subjects = store.subject_count(),
            entries = store.entry_count(),
            algorithm = %config.algorithm,
            "achievement ledger loaded"
        );
        let ledger = Self {
            store,
            backend,
            config,
            persist_error: None,
        };
        Ok((ledger, report))
    }

    /// Ledger configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Read-only view of every chain.
    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Returns the subject's chain in append order; empty if never written.
    pub fn get_chain(&self, subject_id: &str) -> &[Entry] {
        self.store.chain(subject_id)
    }

    /// Records an event for `subject_id`.
    ///
    /// For idempotent event types an existing entry of the same type is
    /// returned unchanged.  Otherwise a new entry linked to the current tail
    /// is appended and the store is persisted.
    pub fn append_if_absent(
        &mut self,
        subject_id: &str,
        event_type: &str,
        value: i64,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<Appended, LedgerError> {
        validate(subject_id, event_type, value)?;

        let chain = self.store.chain(subject_id);
        if self.config.is_idempotent(event_type) {
            if let Some(existing) = chain.iter().find(|entry| entry.event_type == event_type) {
                debug!(subject = subject_id, event_type, "idempotent event already recorded");
                return Ok(Appended::Existing(existing.clone()));
            }
        }

        let mut entry = build_entry(
            subject_id,
            chain.last(),
            event_type,
            value,
            title,
            now,
            self.config.algorithm,
        );
        while chain.iter().any(|existing| existing.id == entry.id) {
            entry.id = mint_id(&entry.timestamp);
        }
        debug!(
            subject = subject_id,
            event_type,
            value,
            hash = %entry.hash,
            prev_hash = %entry.prev_hash,
            "appending achievement"
        );
        self.store.push(entry.clone());
        self.persist();
        Ok(Appended::Created(entry))
    }

    /// Records the welcome achievement, at most once per subject.
    pub fn on_subject_active(&mut self, subject_id: &str) -> Result<Appended, LedgerError> {
        self.on_subject_active_at(subject_id, Utc::now())
    }

    /// [`on_subject_active`](Self::on_subject_active) with an explicit clock.
    pub fn on_subject_active_at(
        &mut self,
        subject_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Appended, LedgerError> {
        self.append_if_absent(subject_id, WELCOME_EVENT, WELCOME_VALUE, WELCOME_TITLE, now)
    }

    /// Verifies the subject's chain with the configured mode.
    pub fn verify(&self, subject_id: &str) -> Verification {
        verify_with(self.store.chain(subject_id), self.config.verify_mode)
    }

    /// Annotates the subject's chain for display.
    pub fn report<'a>(&'a self, subject_id: &'a str) -> ChainReport<'a> {
        ChainReport::build(subject_id, self.store.chain(subject_id), self.config.verify_mode)
    }

    /// Verifies every subject's chain.
    pub fn verify_all(&self) -> BTreeMap<String, Verification> {
        let mode = self.config.verify_mode;
        let chains = self.store.chain_map();
        #[cfg(not(target_arch = "wasm32"))]
        {
            chains
                .par_iter()
                .map(|(subject, chain)| (subject.clone(), verify_with(chain, mode)))
                .collect()
        }
        #[cfg(target_arch = "wasm32")]
        {
            chains
                .iter()
                .map(|(subject, chain)| (subject.clone(), verify_with(chain, mode)))
                .collect()
        }
    }

    /// The outstanding persistence failure, if the last save did not land.
    pub fn persist_error(&self) -> Option<&LedgerError> {
        self.persist_error.as_ref()
    }

    /// Writes the whole store to the backend.
    pub fn flush(&mut self) -> Result<(), LedgerError> {
        let result = self.save();
        self.persist_error = result.clone().err();
        result
    }

    fn persist(&mut self) {
        if let Err(err) = self.flush() {
            warn!(error = %err, "achievement ledger not saved; changes may not persist");
        }
    }

    fn save(&self) -> Result<(), LedgerError> {
        let document = self.store.to_json()?;
        self.backend.save(&self.config.storage_key, &document)?;
        Ok(())
    }
}

fn corrupt_key(storage_key: &str) -> String {
    format!("{storage_key}_corrupt")
}

fn validate(subject_id: &str, event_type: &str, value: i64) -> Result<(), LedgerError> {
    if subject_id.trim().is_empty() {
        return Err(LedgerError::EmptySubject);
    }
    if event_type.trim().is_empty() {
        return Err(LedgerError::EmptyEventType);
    }
    if value < 0 {
        return Err(LedgerError::NegativeValue(value));
    }
    Ok(())
}
