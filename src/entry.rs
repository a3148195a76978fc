//! Ledger entries and their construction rule.
//!
//! An [`Entry`] is sealed by hashing a canonical JSON payload over
//! `{userId, prevHash, ts, type, value, title}` in that key order.  The
//! entry's own `id` and `hash` never feed the payload.

use crate::digest::HashAlgorithm;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Sentinel `prev_hash` carried by the first entry of every chain.
pub const GENESIS: &str = "GENESIS";

/// One link in a subject's achievement chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Opaque identifier minted at creation.
    pub id: String,
    /// Subject (user) owning the chain.
    #[serde(rename = "userId")]
    pub subject_id: String,
    /// Hash of the preceding entry, or [`GENESIS`].
    #[serde(rename = "prevHash")]
    pub prev_hash: String,
    /// Digest of the canonical payload.
    pub hash: String,
    /// Creation time, millisecond precision.
    #[serde(rename = "ts", with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    /// Event kind, e.g. `welcome`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Points awarded by the event.
    pub value: i64,
    /// Human-readable label.
    pub title: String,
    /// Digest that sealed this entry; records without one are FNV-1a.
    #[serde(
        rename = "alg",
        default,
        skip_serializing_if = "HashAlgorithm::is_fnv1a"
    )]
    pub algorithm: HashAlgorithm,
}

#[derive(Serialize)]
struct CanonicalPayload<'a> {
    #[serde(rename = "userId")]
    subject_id: &'a str,
    #[serde(rename = "prevHash")]
    prev_hash: &'a str,
    ts: String,
    #[serde(rename = "type")]
    event_type: &'a str,
    value: i64,
    title: &'a str,
}

/// Renders a timestamp the way the payload and durable format expect it.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serializes the hashed fields in their fixed order.
pub fn canonical_payload(
    subject_id: &str,
    prev_hash: &str,
    timestamp: &DateTime<Utc>,
    event_type: &str,
    value: i64,
    title: &str,
) -> String {
    let payload = CanonicalPayload {
        subject_id,
        prev_hash,
        ts: format_timestamp(timestamp),
        event_type,
        value,
        title,
    };
    // A struct of strings and an integer always serializes.
    serde_json::to_string(&payload).unwrap_or_default()
}

impl Entry {
    /// Rebuilds the canonical payload from this entry's stored fields.
    pub fn payload(&self) -> String {
        canonical_payload(
            &self.subject_id,
            &self.prev_hash,
            &self.timestamp,
            &self.event_type,
            self.value,
            &self.title,
        )
    }

    /// Recomputes the digest of this entry's payload with its own algorithm.
    pub fn recompute_hash(&self) -> String {
        self.algorithm.digest_hex(&self.payload())
    }

    /// Returns true when the stored hash matches the recomputed one.
    pub fn seal_matches(&self) -> bool {
        self.hash == self.recompute_hash()
    }

    /// Returns true when this entry opens a chain.
    pub fn is_genesis(&self) -> bool {
        self.prev_hash == GENESIS
    }
}

/// Builds a new entry linked to `prev`, or to [`GENESIS`] when `prev` is `None`.
///
/// Pure apart from minting the id; the caller appends the result.
pub fn build_entry(
    subject_id: &str,
    prev: Option<&Entry>,
    event_type: &str,
    value: i64,
    title: &str,
    now: DateTime<Utc>,
    algorithm: HashAlgorithm,
) -> Entry {
    let timestamp = now.trunc_subsecs(3);
    let prev_hash = prev.map_or_else(|| GENESIS.to_string(), |entry| entry.hash.clone());
    let payload = canonical_payload(
        subject_id,
        &prev_hash,
        &timestamp,
        event_type,
        value,
        title,
    );
    Entry {
        id: mint_id(&timestamp),
        subject_id: subject_id.to_string(),
        hash: algorithm.digest_hex(&payload),
        prev_hash,
        timestamp,
        event_type: event_type.to_string(),
        value,
        title: title.to_string(),
        algorithm,
    }
}

/// Mints an id: a random base-36 segment followed by the millisecond clock in base 36.
pub fn mint_id(now: &DateTime<Utc>) -> String {
    let random: u64 = rand::thread_rng().gen();
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
    format!("{}{}", to_base36(random), to_base36(millis))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Serde adapter keeping timestamps at millisecond precision with a `Z` suffix.
pub(crate) mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
