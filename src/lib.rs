#![deny(missing_docs)]

//! # achievement_chain
//!
//! **achievement_chain** is the state layer of Resource Plus, a study-material
//! sharing demo: users sign up, share PDFs, earn points, and keep an
//! append-only, hash-linked history of their achievements.
//!
//! ## The ledger
//!
//! Each user (the *subject*) owns a chain of [`Entry`] records.  Every entry
//! embeds the hash of the entry before it (the first one carries the
//! [`GENESIS`] sentinel) and seals itself by hashing a canonical payload
//! over its own fields.  [`verify_chain`] walks a chain and reports the first
//! broken link; [`verify_chain_strict`] also reseals every entry so edits
//! are pinned to the entry that was changed.
//!
//! The default digest is 32-bit FNV-1a.  It makes casual edits visible; it
//! is not a security boundary, and swapping in [`HashAlgorithm::Blake2b256`]
//! or [`HashAlgorithm::Sha256`] does not change that claim.
//!
//! ## Usage
//!
//! ```rust
//! use achievement_chain::{verify_chain, Ledger, LedgerConfig, MemoryStore, Verification};
//!
//! let (mut ledger, _report) = Ledger::open(MemoryStore::new(), LedgerConfig::default()).unwrap();
//!
//! // Becoming active twice still records a single welcome entry.
//! ledger.on_subject_active("u1").unwrap();
//! ledger.on_subject_active("u1").unwrap();
//! assert_eq!(ledger.get_chain("u1").len(), 1);
//!
//! assert_eq!(verify_chain(ledger.get_chain("u1")), Verification::Valid);
//! ```
//!
//! Around the ledger sit the collaborators of the original application: a
//! demo [`Accounts`] directory, a resource [`Catalog`] and the
//! [`ResourcePlus`] session that wires them together over a
//! [`KeyValueStore`].

pub mod accounts;
mod app;
pub mod catalog;
mod chain;
mod config;
mod digest;
mod entry;
mod error;
mod kv;
mod ledger;
mod report;
mod shared;
mod store;

pub use accounts::{Accounts, Badge, Standing, User};
pub use app::{Profile, ResourcePlus, SESSION_KEY};
pub use catalog::{Catalog, Resource, Upload};
pub use chain::{links_to, verify_chain, verify_chain_strict, verify_with, Verification, VerifyMode};
pub use config::{
    AppConfig, LedgerConfig, ACHIEVEMENTS_KEY, WELCOME_EVENT, WELCOME_TITLE, WELCOME_VALUE,
};
pub use digest::{fnv1a_hex, HashAlgorithm};
pub use entry::{build_entry, canonical_payload, format_timestamp, mint_id, Entry, GENESIS};
pub use error::{AccountError, AppError, CatalogError, ConfigError, LedgerError, StoreError};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use ledger::{Appended, Ledger};
pub use report::{ChainReport, EntryStatus};
pub use shared::SharedLedger;
pub use store::{DroppedRecords, LedgerStore, LoadReport};
