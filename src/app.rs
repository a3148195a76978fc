//! Session orchestration for Resource Plus.
//!
//! [`ResourcePlus`] owns the user directory, the resource catalog, the
//! current session and the achievement ledger, all persisted through one
//! [`KeyValueStore`].  Becoming the active session (sign-up, login, or
//! reopening with a stored session) fires the welcome achievement; the
//! ledger's idempotent guard keeps it to one entry per user.

use crate::accounts::{Accounts, Badge, Standing, User, LEADERBOARD_SIZE, USERS_KEY};
use crate::catalog::{Catalog, Resource, Upload, RESOURCES_KEY};
use crate::config::LedgerConfig;
use crate::error::{AppError, LedgerError};
use crate::kv::KeyValueStore;
use crate::ledger::{Appended, Ledger};
use crate::report::ChainReport;
use crate::store::LoadReport;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Storage key holding the active session's user id.
pub const SESSION_KEY: &str = "rp_session";

/// Everything the profile page shows.
#[derive(Debug)]
pub struct Profile<'a> {
    /// The signed-in user.
    pub user: &'a User,
    /// Tier for the user's points.
    pub badge: Badge,
    /// The user's uploads, newest first.
    pub uploads: Vec<&'a Resource>,
    /// Total downloads across the user's uploads.
    pub downloads: u64,
    /// Annotated achievement chain.
    pub achievements: ChainReport<'a>,
}

/// The Resource Plus application state.
#[derive(Debug)]
pub struct ResourcePlus<S: KeyValueStore> {
    backend: Arc<S>,
    accounts: Accounts,
    catalog: Catalog,
    session: Option<String>,
    ledger: Ledger<Arc<S>>,
}

impl<S: KeyValueStore> ResourcePlus<S> {
    /// Loads every document from `backend`.
    ///
    /// If a session is stored, its user is treated as freshly active.
    pub fn open(backend: S, config: LedgerConfig) -> Result<(Self, LoadReport), AppError> {
        let backend = Arc::new(backend);
        let accounts: Accounts = load_document(&*backend, USERS_KEY)?;
        let catalog: Catalog = load_document(&*backend, RESOURCES_KEY)?;
        let stored_session: Option<String> = load_document(&*backend, SESSION_KEY)?;
        let session = stored_session.filter(|id| accounts.find(id).is_some());
        let (ledger, report) = Ledger::open(Arc::clone(&backend), config)?;
        let mut app = Self {
            backend,
            accounts,
            catalog,
            session,
            ledger,
        };
        if let Some(id) = app.session.clone() {
            app.ledger.on_subject_active(&id)?;
        }
        Ok((app, report))
    }

    /// Registers a user and makes them the active session.
    pub fn signup(&mut self, name: &str, email: &str, password: &str) -> Result<&User, AppError> {
        let id = self.accounts.signup(name, email, password, Utc::now())?.id.clone();
        self.save_users()?;
        self.activate(id)
    }

    /// Logs a user in and makes them the active session.
    pub fn login(&mut self, email: &str, password: &str) -> Result<&User, AppError> {
        let id = self.accounts.login(email, password)?.id.clone();
        info!(user = %id, "user logged in");
        self.activate(id)
    }

    /// Clears the active session.
    pub fn logout(&mut self) -> Result<(), AppError> {
        self.session = None;
        self.save_session()
    }

    /// The signed-in user, if any.
    pub fn current_user(&self) -> Option<&User> {
        self.session.as_deref().and_then(|id| self.accounts.find(id))
    }

    /// Uploads a resource as the current user (+1 point to the uploader).
    pub fn upload(&mut self, upload: Upload<'_>) -> Result<Resource, AppError> {
        let user = self.require_user()?.clone();
        let resource = self.catalog.upload(&user, upload, Utc::now())?.clone();
        self.accounts.award(&user.id, 1)?;
        self.save_catalog()?;
        self.save_users()?;
        Ok(resource)
    }

    /// Downloads a resource (+1 point to its uploader).
    pub fn download(&mut self, resource_id: &str) -> Result<Resource, AppError> {
        self.require_user()?;
        let resource = self.catalog.download(resource_id)?.clone();
        if let Err(err) = self.accounts.award(&resource.uploader_id, 1) {
            warn!(error = %err, resource = resource_id, "uploader no longer registered");
        }
        self.save_catalog()?;
        self.save_users()?;
        Ok(resource)
    }

    /// Adds the sample resources, credited to the current user.
    pub fn seed_samples(&mut self) -> Result<usize, AppError> {
        let user = self.require_user()?.clone();
        let count = self
            .catalog
            .seed_samples(&user, Utc::now(), &mut rand::thread_rng());
        self.save_catalog()?;
        Ok(count)
    }

    /// Records an event on the current user's chain.
    pub fn record(&mut self, event_type: &str, value: i64, title: &str) -> Result<Appended, AppError> {
        let id = self.require_user()?.id.clone();
        self.record_for(&id, event_type, value, title)
    }

    /// Records an event on a registered user's chain.
    pub fn record_for(
        &mut self,
        subject_id: &str,
        event_type: &str,
        value: i64,
        title: &str,
    ) -> Result<Appended, AppError> {
        if self.accounts.find(subject_id).is_none() {
            return Err(AppError::UnknownSubject(subject_id.to_string()));
        }
        Ok(self
            .ledger
            .append_if_absent(subject_id, event_type, value, title, Utc::now())?)
    }

    /// Top contributors.
    pub fn leaderboard(&self) -> Vec<Standing> {
        self.accounts.leaderboard(LEADERBOARD_SIZE)
    }

    /// Profile of the current user.
    pub fn profile(&self) -> Result<Profile<'_>, AppError> {
        let user = self.require_user()?;
        let uploads: Vec<&Resource> = self.catalog.uploads_by(&user.id).collect();
        let downloads = uploads.iter().map(|res| res.download_count).sum();
        Ok(Profile {
            user,
            badge: Badge::for_points(user.points),
            uploads,
            downloads,
            achievements: self.ledger.report(&user.id),
        })
    }

    /// Resource catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// User directory.
    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    /// Achievement ledger.
    pub fn ledger(&self) -> &Ledger<Arc<S>> {
        &self.ledger
    }

    /// Set when the last ledger save failed ("changes may not be saved").
    pub fn unsaved_changes(&self) -> Option<&LedgerError> {
        self.ledger.persist_error()
    }

    fn activate(&mut self, id: String) -> Result<&User, AppError> {
        self.ledger.on_subject_active(&id)?;
        self.session = Some(id);
        self.save_session()?;
        self.require_user()
    }

    fn require_user(&self) -> Result<&User, AppError> {
        self.current_user().ok_or(AppError::NoSession)
    }

    fn save_users(&self) -> Result<(), AppError> {
        save_document(&*self.backend, USERS_KEY, &self.accounts)
    }

    fn save_catalog(&self) -> Result<(), AppError> {
        save_document(&*self.backend, RESOURCES_KEY, &self.catalog)
    }

    fn save_session(&self) -> Result<(), AppError> {
        save_document(&*self.backend, SESSION_KEY, &self.session)
    }
}

fn load_document<T: DeserializeOwned + Default>(backend: &impl KeyValueStore, key: &str) -> Result<T, AppError> {
    match backend.load(key)? {
        Some(raw) => serde_json::from_str(&raw).map_err(|err| AppError::Decode {
            key: key.to_string(),
            message: err.to_string(),
        }),
        None => Ok(T::default()),
    }
}

fn save_document<T: Serialize>(backend: &impl KeyValueStore, key: &str, value: &T) -> Result<(), AppError> {
    let raw = serde_json::to_string(value).map_err(|err| AppError::Decode {
        key: key.to_string(),
        message: err.to_string(),
    })?;
    Ok(backend.save(key, &raw)?)
}
