//! Demo user directory: sign-up, login, points and badges.
//!
//! Credentials are demo-only.  Passwords are kept as SHA-256 digests so the
//! stored document does not hold them in clear, but nothing here is meant
//! as real authentication.

use crate::entry::iso_millis;
use crate::error::AccountError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::info;

/// Storage key holding the user list.
pub const USERS_KEY: &str = "rp_users";
/// Number of users shown on the leaderboard.
pub const LEADERBOARD_SIZE: usize = 5;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque user id; also the ledger subject id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Login email, unique across the directory.
    pub email: String,
    /// SHA-256 hex digest of the password.
    pub password_digest: String,
    /// Accumulated contribution points.
    #[serde(default)]
    pub points: u64,
    /// Sign-up time.
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
}

/// Contributor tier derived from points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Badge {
    /// Under 15 points.
    Bronze,
    /// 15 points or more.
    Silver,
    /// 30 points or more.
    Gold,
    /// 50 points or more.
    Platinum,
}

impl Badge {
    /// Tier for a point total.
    pub fn for_points(points: u64) -> Self {
        match points {
            50.. => Self::Platinum,
            30.. => Self::Gold,
            15.. => Self::Silver,
            _ => Self::Bronze,
        }
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Platinum => "Platinum Contributor",
            Self::Gold => "Gold Contributor",
            Self::Silver => "Silver Contributor",
            Self::Bronze => "Bronze Contributor",
        }
    }

    /// Hint towards the next tier.
    pub fn next_label(&self) -> &'static str {
        match self {
            Self::Platinum => "Keep inspiring!",
            Self::Gold => "50 pts → Platinum",
            Self::Silver => "30 pts → Gold",
            Self::Bronze => "15 pts → Silver",
        }
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    /// User id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Point total.
    pub points: u64,
}

/// Ordered list of registered users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Accounts {
    users: Vec<User>,
}

impl Accounts {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// All users in sign-up order.
    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// Looks up a user by id.
    pub fn find(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    /// Registers a user.  The returned user has zero points.
    pub fn signup(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<&User, AccountError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AccountError::MissingName);
        }
        if email.is_empty() || password.is_empty() {
            return Err(AccountError::MissingCredentials);
        }
        if self.users.iter().any(|user| user.email == email) {
            return Err(AccountError::EmailTaken(email.to_string()));
        }
        let user = User {
            id: crate::entry::mint_id(&now),
            name: name.to_string(),
            email: email.to_string(),
            password_digest: password_digest(password),
            points: 0,
            created_at: now,
        };
        info!(user = %user.id, email, "user signed up");
        self.users.push(user);
        Ok(&self.users[self.users.len() - 1])
    }

    /// Returns the user matching `email` and `password` exactly.
    pub fn login(&self, email: &str, password: &str) -> Result<&User, AccountError> {
        if email.is_empty() || password.is_empty() {
            return Err(AccountError::MissingCredentials);
        }
        let digest = password_digest(password);
        self.users
            .iter()
            .find(|user| user.email == email && user.password_digest == digest)
            .ok_or(AccountError::InvalidCredentials)
    }

    /// Adds `points` to a user's total and returns the new total.
    pub fn award(&mut self, user_id: &str, points: u64) -> Result<u64, AccountError> {
        let user = self
            .users
            .iter_mut()
            .find(|user| user.id == user_id)
            .ok_or_else(|| AccountError::UnknownUser(user_id.to_string()))?;
        user.points = user.points.saturating_add(points);
        Ok(user.points)
    }

    /// Top `limit` users by points; ties keep sign-up order.
    pub fn leaderboard(&self, limit: usize) -> Vec<Standing> {
        let mut standings: Vec<Standing> = self
            .users
            .iter()
            .map(|user| Standing {
                id: user.id.clone(),
                name: user.name.clone(),
                points: user.points,
            })
            .collect();
        standings.sort_by(|a, b| b.points.cmp(&a.points));
        standings.truncate(limit);
        standings
    }
}

fn password_digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"rplus-demo-password");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_714_557_600, 0).unwrap()
    }

    #[test]
    fn signup_then_login() {
        let mut accounts = Accounts::new();
        let id = accounts
            .signup(" Ayesha ", "a@example.com", "pw", now())
            .unwrap()
            .id
            .clone();
        let user = accounts.login("a@example.com", "pw").unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.name, "Ayesha");
        assert_eq!(user.points, 0);
        assert_ne!(user.password_digest, "pw");
    }

    #[test]
    fn signup_validation() {
        let mut accounts = Accounts::new();
        assert_eq!(
            accounts.signup("  ", "a@example.com", "pw", now()),
            Err(AccountError::MissingName)
        );
        assert_eq!(
            accounts.signup("A", "", "pw", now()),
            Err(AccountError::MissingCredentials)
        );
        accounts.signup("A", "a@example.com", "pw", now()).unwrap();
        assert_eq!(
            accounts.signup("B", "a@example.com", "other", now()),
            Err(AccountError::EmailTaken("a@example.com".into()))
        );
    }

    #[test]
    fn wrong_password_is_rejected() {
        let mut accounts = Accounts::new();
        accounts.signup("A", "a@example.com", "pw", now()).unwrap();
        assert_eq!(
            accounts.login("a@example.com", "nope"),
            Err(AccountError::InvalidCredentials)
        );
        assert_eq!(
            accounts.login("b@example.com", "pw"),
            Err(AccountError::InvalidCredentials)
        );
    }

    #[test]
    fn award_and_leaderboard() {
        let mut accounts = Accounts::new();
        let mut ids = Vec::new();
        for (i, name) in ["A", "B", "C", "D", "E", "F"].iter().enumerate() {
            let email = format!("{i}@example.com");
            ids.push(accounts.signup(name, &email, "pw", now()).unwrap().id.clone());
        }
        accounts.award(&ids[2], 7).unwrap();
        accounts.award(&ids[4], 3).unwrap();
        assert_eq!(accounts.award(&ids[4], 2).unwrap(), 5);
        assert_eq!(
            accounts.award("ghost", 1),
            Err(AccountError::UnknownUser("ghost".into()))
        );

        let board = accounts.leaderboard(LEADERBOARD_SIZE);
        let names: Vec<&str> = board.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["C", "E", "A", "B", "D"]);
    }

    #[test]
    fn badge_tiers() {
        assert_eq!(Badge::for_points(0), Badge::Bronze);
        assert_eq!(Badge::for_points(15), Badge::Silver);
        assert_eq!(Badge::for_points(29), Badge::Silver);
        assert_eq!(Badge::for_points(30), Badge::Gold);
        assert_eq!(Badge::for_points(50), Badge::Platinum);
        assert_eq!(Badge::Bronze.next_label(), "15 pts → Silver");
    }

    #[test]
    fn stored_document_is_a_plain_array() {
        let mut accounts = Accounts::new();
        accounts.signup("A", "a@example.com", "pw", now()).unwrap();
        let json = serde_json::to_value(&accounts).unwrap();
        assert!(json.is_array());
        assert!(json[0].get("passwordDigest").is_some());
        let back: Accounts = serde_json::from_value(json).unwrap();
        assert_eq!(back, accounts);
    }
}
