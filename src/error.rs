//! Error taxonomy for the ledger, its persistence boundary and the
//! collaborators layered on top of it.

use thiserror::Error;

/// Failures raised by a [`KeyValueStore`](crate::KeyValueStore) backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("io error: {0}")]
    /// Underlying filesystem failure.
    Io(String),
    #[error("invalid storage key: {0:?}")]
    /// Key cannot be mapped onto the backend (e.g. contains a path separator).
    InvalidKey(String),
    #[error("backend unavailable: {0}")]
    /// Backend refused the operation for a reason other than I/O.
    Unavailable(String),
}

/// Errors surfaced by ledger operations.
///
/// Chain breaks are not errors; see [`Verification`](crate::Verification).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("subject id must not be empty")]
    /// Subject id was empty or whitespace.
    EmptySubject,
    #[error("event type must not be empty")]
    /// Event type tag was empty or whitespace.
    EmptyEventType,
    #[error("event value must be non-negative (got {0})")]
    /// Event magnitude was negative.
    NegativeValue(i64),
    #[error("persistence failure: {0}")]
    /// The durable copy could not be read or written.
    Persistence(#[from] StoreError),
    #[error("encode error: {0}")]
    /// The store could not be serialized.
    Encode(String),
}

/// Errors raised by the account directory.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("please enter your name")]
    /// Sign-up without a display name.
    MissingName,
    #[error("email and password required")]
    /// Sign-up or login without credentials.
    MissingCredentials,
    #[error("email already registered: {0}")]
    /// Another account already uses this email.
    EmailTaken(String),
    #[error("invalid credentials")]
    /// No account matches the email/password pair.
    InvalidCredentials,
    #[error("unknown user: {0}")]
    /// Referenced user id does not exist.
    UnknownUser(String),
}

/// Errors raised by the resource catalog.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("fill all fields and choose a PDF")]
    /// Name, author or file contents missing.
    MissingFields,
    #[error("please upload a PDF file")]
    /// File contents do not carry a PDF header.
    NotPdf,
    #[error("PDF too large ({size} bytes, max {max} bytes)")]
    /// File exceeds the upload limit.
    TooLarge {
        /// Size of the rejected upload.
        size: u64,
        /// Configured upload limit.
        max: u64,
    },
    #[error("unknown subject area: {0}")]
    /// Subject is not one of the catalog's subject areas.
    UnknownSubjectArea(String),
    #[error("unknown resource: {0}")]
    /// Referenced resource id does not exist.
    UnknownResource(String),
}

/// Errors raised while reading configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    /// An environment variable held an unrecognised value.
    InvalidValue {
        /// Environment variable name.
        key: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Top-level error for session-level operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    #[error(transparent)]
    /// Ledger failure.
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    /// Account failure.
    Account(#[from] AccountError),
    #[error(transparent)]
    /// Catalog failure.
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    /// Persistence failure outside the ledger.
    Store(#[from] StoreError),
    #[error("decode error in {key}: {message}")]
    /// A stored document could not be decoded.
    Decode {
        /// Storage key holding the document.
        key: String,
        /// Decoder message.
        message: String,
    },
    #[error("no active session")]
    /// Operation requires a logged-in user.
    NoSession,
    #[error("unknown subject: {0}")]
    /// Ledger event targeted a subject with no account.
    UnknownSubject(String),
}
