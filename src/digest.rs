//! Deterministic digests over canonical entry payloads.
//!
//! The default is 32-bit FNV-1a folded over UTF-16 code units, which is
//! what the browser build of Resource Plus wrote into its achievement
//! history.  It is a tamper-*evidence* aid for casual inspection and makes
//! no collision or preimage claims.  BLAKE2b-256 and SHA-256 can be
//! selected instead; they change the digest width, not the guarantees the
//! ledger advertises.

use blake2::digest::{consts::U32, Digest};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

type Blake2b256 = blake2::Blake2b<U32>;

/// Computes the 32-bit FNV-1a digest of `payload` as 8 lowercase hex characters.
///
/// The fold runs over UTF-16 code units so that non-ASCII titles hash the
/// same way they did in the browser build; for ASCII input this is the
/// textbook byte-wise FNV-1a.
pub fn fnv1a_hex(payload: &str) -> String {
    let mut h = FNV_OFFSET_BASIS;
    for unit in payload.encode_utf16() {
        h ^= u32::from(unit);
        h = h.wrapping_mul(FNV_PRIME);
    }
    format!("{h:08x}")
}

/// Digest algorithm used to seal ledger entries.
///
/// Each entry records the algorithm that sealed it, so histories written
/// under one algorithm keep verifying after the configured one changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// 32-bit FNV-1a, 8 hex characters.
    #[default]
    #[serde(rename = "fnv1a")]
    Fnv1a,
    /// BLAKE2b with a 256-bit output, 64 hex characters.
    #[serde(rename = "blake2b")]
    Blake2b256,
    /// SHA-256, 64 hex characters.
    #[serde(rename = "sha256")]
    Sha256,
}

impl HashAlgorithm {
    /// Hashes `payload` and returns the lowercase hex digest.
    pub fn digest_hex(&self, payload: &str) -> String {
        match self {
            Self::Fnv1a => fnv1a_hex(payload),
            Self::Blake2b256 => {
                let mut hasher = Blake2b256::new();
                hasher.update(payload.as_bytes());
                hex::encode(hasher.finalize())
            }
            Self::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(payload.as_bytes());
                hex::encode(hasher.finalize())
            }
        }
    }

    /// Number of hex characters produced by [`digest_hex`](Self::digest_hex).
    pub fn hex_width(&self) -> usize {
        match self {
            Self::Fnv1a => 8,
            Self::Blake2b256 | Self::Sha256 => 64,
        }
    }

    /// True for the default FNV-1a digest.
    pub fn is_fnv1a(&self) -> bool {
        matches!(self, Self::Fnv1a)
    }

    /// Short lowercase name used in configuration, logs and stored entries.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fnv1a => "fnv1a",
            Self::Blake2b256 => "blake2b",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fnv1a" | "fnv" => Ok(Self::Fnv1a),
            "blake2b" | "blake2b256" => Ok(Self::Blake2b256),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(format!("unknown hash algorithm: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn fnv1a_known_vectors() {
        assert_eq!(fnv1a_hex(""), "811c9dc5");
        assert_eq!(fnv1a_hex("a"), "e40c292c");
        assert_eq!(fnv1a_hex("foobar"), "bf9cf968");
    }

    #[test]
    fn fnv1a_is_order_sensitive() {
        assert_ne!(fnv1a_hex("ab"), fnv1a_hex("ba"));
    }

    #[test]
    fn widths_match_algorithm() {
        for algo in [
            HashAlgorithm::Fnv1a,
            HashAlgorithm::Blake2b256,
            HashAlgorithm::Sha256,
        ] {
            let out = algo.digest_hex("payload");
            assert_eq!(out.len(), algo.hex_width());
            assert!(out
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }
    }

    #[test]
    fn sha256_matches_reference() {
        assert_eq!(
            HashAlgorithm::Sha256.digest_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn parses_algorithm_names() {
        assert_eq!("FNV1A".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Fnv1a));
        assert_eq!(
            "blake2b".parse::<HashAlgorithm>(),
            Ok(HashAlgorithm::Blake2b256)
        );
        assert!("md5".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn serialized_names_match_config_names() {
        for algo in [
            HashAlgorithm::Fnv1a,
            HashAlgorithm::Blake2b256,
            HashAlgorithm::Sha256,
        ] {
            let json = serde_json::to_string(&algo).unwrap();
            assert_eq!(json, format!("\"{}\"", algo.name()));
            assert_eq!(serde_json::from_str::<HashAlgorithm>(&json).unwrap(), algo);
        }
    }

    #[test]
    fn no_collisions_over_ten_thousand_payloads() {
        let mut seen = HashSet::new();
        for i in 0..10_000u32 {
            let payload = format!(
                "{{\"userId\":\"u{i}\",\"prevHash\":\"GENESIS\",\"type\":\"welcome\"}}"
            );
            assert!(seen.insert(fnv1a_hex(&payload)), "collision at {i}");
        }
    }

    proptest! {
        #[test]
        fn digest_is_deterministic(payload in ".*") {
            prop_assert_eq!(fnv1a_hex(&payload), fnv1a_hex(&payload));
            prop_assert_eq!(
                HashAlgorithm::Blake2b256.digest_hex(&payload),
                HashAlgorithm::Blake2b256.digest_hex(&payload)
            );
        }

        #[test]
        fn single_character_mutation_changes_digest(
            payload in "[ -~]{1,64}",
            idx in any::<prop::sample::Index>(),
            replacement in "[ -~]",
        ) {
            let chars: Vec<char> = payload.chars().collect();
            let at = idx.index(chars.len());
            let new_char = replacement.chars().next().unwrap();
            prop_assume!(chars[at] != new_char);
            let mut mutated = chars.clone();
            mutated[at] = new_char;
            let mutated: String = mutated.into_iter().collect();
            // FNV-1a over a single substituted unit is injective per position.
            prop_assert_ne!(fnv1a_hex(&payload), fnv1a_hex(&mutated));
        }
    }
}
