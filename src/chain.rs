//! Chain verification.
//!
//! [`verify_chain`] checks linkage only: every entry after the first must
//! carry its predecessor's hash.  A rewritten `value` or `title` therefore
//! only surfaces one entry later, and only if the tamperer left the stored
//! hash alone.  [`verify_chain_strict`] additionally reseals each entry and
//! pins the genesis sentinel, so tampering is reported at the entry that
//! was changed.

use crate::entry::{Entry, GENESIS};
use std::fmt;

/// Outcome of walking a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verification {
    /// Every link (and, in strict mode, every seal) checked out.
    Valid,
    /// `chain[i].prev_hash` does not match `chain[i - 1].hash`; in strict
    /// mode index 0 means the chain does not open with the genesis sentinel.
    BrokenAt(usize),
    /// `chain[i].hash` does not match a recomputation over its own payload.
    ContentTamper(usize),
}

impl Verification {
    /// Returns true for [`Verification::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Index of the first failing entry, if any.
    pub fn failing_index(&self) -> Option<usize> {
        match self {
            Self::Valid => None,
            Self::BrokenAt(idx) | Self::ContentTamper(idx) => Some(*idx),
        }
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => f.write_str("valid"),
            Self::BrokenAt(idx) => write!(f, "broken link at entry {idx}"),
            Self::ContentTamper(idx) => write!(f, "content tampered at entry {idx}"),
        }
    }
}

/// Which checks the ledger runs when it reports on a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VerifyMode {
    /// Prev-hash linkage only.
    Linkage,
    /// Linkage, genesis sentinel and per-entry reseal.
    #[default]
    Strict,
}

impl std::str::FromStr for VerifyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linkage" | "link" => Ok(Self::Linkage),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown verify mode: {other}")),
        }
    }
}

/// Returns true when `entry` correctly follows `prev`.
pub fn links_to(prev: &Entry, entry: &Entry) -> bool {
    entry.prev_hash == prev.hash
}

/// Walks `chain` left to right and reports the first linkage break.
///
/// Empty and single-entry chains are trivially valid.
pub fn verify_chain(chain: &[Entry]) -> Verification {
    chain
        .windows(2)
        .position(|pair| !links_to(&pair[0], &pair[1]))
        .map_or(Verification::Valid, |idx| Verification::BrokenAt(idx + 1))
}

/// Walks `chain` once, checking the genesis sentinel, each entry's seal and
/// each link, and reports the first failure in chain order.
///
/// Each entry is resealed with the algorithm recorded on it.
pub fn verify_chain_strict(chain: &[Entry]) -> Verification {
    for (idx, entry) in chain.iter().enumerate() {
        if idx == 0 && entry.prev_hash != GENESIS {
            return Verification::BrokenAt(0);
        }
        if !entry.seal_matches() {
            return Verification::ContentTamper(idx);
        }
        if idx > 0 && !links_to(&chain[idx - 1], entry) {
            return Verification::BrokenAt(idx);
        }
    }
    Verification::Valid
}

/// Dispatches on `mode`.
pub fn verify_with(chain: &[Entry], mode: VerifyMode) -> Verification {
    match mode {
        VerifyMode::Linkage => verify_chain(chain),
        VerifyMode::Strict => verify_chain_strict(chain),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::HashAlgorithm;
    use crate::entry::build_entry;
    use chrono::{Duration, TimeZone, Utc};

    fn chain_of(n: usize) -> Vec<Entry> {
        let start = Utc.timestamp_opt(1_714_557_600, 0).unwrap();
        let mut chain: Vec<Entry> = Vec::new();
        for i in 0..n {
            let entry = build_entry(
                "u1",
                chain.last(),
                &format!("event-{i}"),
                i as i64,
                &format!("Event {i}"),
                start + Duration::seconds(i as i64),
                HashAlgorithm::Fnv1a,
            );
            chain.push(entry);
        }
        chain
    }

    #[test]
    fn empty_and_single_chains_are_valid() {
        assert_eq!(verify_chain(&[]), Verification::Valid);
        assert_eq!(verify_chain(&chain_of(1)), Verification::Valid);
        assert_eq!(
            verify_chain_strict(&[]),
            Verification::Valid
        );
        assert_eq!(
            verify_chain_strict(&chain_of(1)),
            Verification::Valid
        );
    }

    #[test]
    fn built_chain_verifies() {
        let chain = chain_of(5);
        assert_eq!(verify_chain(&chain), Verification::Valid);
        assert_eq!(
            verify_chain_strict(&chain),
            Verification::Valid
        );
    }

    #[test]
    fn rewritten_hash_breaks_the_next_link() {
        let mut chain = chain_of(3);
        chain[1].hash = "deadbeef".into();
        assert_eq!(verify_chain(&chain), Verification::BrokenAt(2));
        assert_eq!(
            verify_chain_strict(&chain),
            Verification::ContentTamper(1)
        );
    }

    #[test]
    fn rewritten_title_only_caught_by_strict_mode() {
        let mut chain = chain_of(3);
        chain[1].title = "Free points".into();
        assert_eq!(verify_chain(&chain), Verification::Valid);
        assert_eq!(
            verify_chain_strict(&chain),
            Verification::ContentTamper(1)
        );
    }

    #[test]
    fn resealed_tamper_surfaces_as_broken_link() {
        let mut chain = chain_of(3);
        chain[1].value = 1_000;
        chain[1].hash = chain[1].recompute_hash();
        assert_eq!(verify_chain(&chain), Verification::BrokenAt(2));
        assert_eq!(
            verify_chain_strict(&chain),
            Verification::BrokenAt(2)
        );
    }

    #[test]
    fn strict_mode_pins_genesis() {
        let mut chain = chain_of(2);
        chain[0].prev_hash = "cafebabe".into();
        assert_eq!(verify_chain(&chain), Verification::Valid);
        assert_eq!(
            verify_chain_strict(&chain),
            Verification::BrokenAt(0)
        );
    }

    #[test]
    fn forked_siblings_are_reported() {
        let chain = chain_of(2);
        let start = chain[1].timestamp;
        let sibling = build_entry(
            "u1",
            Some(&chain[0]),
            "event-x",
            1,
            "Sibling",
            start,
            HashAlgorithm::Fnv1a,
        );
        let forked = vec![chain[0].clone(), chain[1].clone(), sibling];
        assert_eq!(verify_chain(&forked), Verification::BrokenAt(2));
    }

    #[test]
    fn mixed_algorithms_verify_per_entry() {
        let first = chain_of(1).remove(0);
        let second = build_entry(
            "u1",
            Some(&first),
            "upload",
            1,
            "Upload",
            first.timestamp,
            HashAlgorithm::Blake2b256,
        );
        let mut chain = vec![first, second];
        assert_eq!(verify_chain_strict(&chain), Verification::Valid);
        chain[1].algorithm = HashAlgorithm::Sha256;
        assert_eq!(verify_chain_strict(&chain), Verification::ContentTamper(1));
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("Strict".parse::<VerifyMode>(), Ok(VerifyMode::Strict));
        assert_eq!("linkage".parse::<VerifyMode>(), Ok(VerifyMode::Linkage));
        assert!("none".parse::<VerifyMode>().is_err());
    }
}
