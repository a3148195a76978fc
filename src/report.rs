//! Per-entry annotation of a chain for display.

use crate::chain::{links_to, verify_with, Verification, VerifyMode};
use crate::entry::{format_timestamp, Entry, GENESIS};
use std::fmt;

/// Link and seal status of one entry.
#[derive(Debug, Clone)]
pub struct EntryStatus<'a> {
    /// Position in the chain.
    pub index: usize,
    /// The annotated entry.
    pub entry: &'a Entry,
    /// Whether the entry follows its predecessor (or opens with genesis).
    pub link_ok: bool,
    /// Whether the stored hash matches the payload; always true in linkage mode.
    pub content_ok: bool,
}

impl EntryStatus<'_> {
    /// True when either check failed.
    pub fn flagged(&self) -> bool {
        !(self.link_ok && self.content_ok)
    }
}

/// A subject's chain annotated for the display collaborator.
#[derive(Debug, Clone)]
pub struct ChainReport<'a> {
    /// Subject the chain belongs to.
    pub subject_id: &'a str,
    /// First failure in chain order.
    pub verification: Verification,
    /// One status per entry, in chain order.
    pub entries: Vec<EntryStatus<'a>>,
}

impl<'a> ChainReport<'a> {
    /// Annotates every entry of `chain`.
    ///
    /// Unlike [`verify_with`], which stops at the first failure, every
    /// offending entry is flagged so each one can carry its own warning.
    pub fn build(
        subject_id: &'a str,
        chain: &'a [Entry],
        mode: VerifyMode,
    ) -> Self {
        let strict = mode == VerifyMode::Strict;
        let entries = chain
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let link_ok = match index {
                    0 => !strict || entry.prev_hash == GENESIS,
                    _ => links_to(&chain[index - 1], entry),
                };
                let content_ok = !strict || entry.seal_matches();
                EntryStatus {
                    index,
                    entry,
                    link_ok,
                    content_ok,
                }
            })
            .collect();
        Self {
            subject_id,
            verification: verify_with(chain, mode),
            entries,
        }
    }

    /// Sum of `value` across the chain.
    pub fn total_value(&self) -> i64 {
        self.entries.iter().map(|status| status.entry.value).sum()
    }

    /// Entries carrying a warning.
    pub fn flagged(&self) -> impl Iterator<Item = &EntryStatus<'a>> {
        self.entries.iter().filter(|status| status.flagged())
    }
}

impl fmt::Display for ChainReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Achievement history for {} (hash-chained)", self.subject_id)?;
        if self.entries.is_empty() {
            return writeln!(
                f,
                "  No achievements yet. Upload resources and earn points to unlock more."
            );
        }
        for status in &self.entries {
            let entry = status.entry;
            writeln!(
                f,
                "  [{}] {} (+{} pts) {}",
                status.index,
                entry.title,
                entry.value,
                format_timestamp(&entry.timestamp)
            )?;
            writeln!(f, "      hash:      {}", entry.hash)?;
            writeln!(f, "      prev hash: {}", entry.prev_hash)?;
            if !status.link_ok {
                writeln!(f, "      ! chain link mismatch: possible tampering detected")?;
            }
            if !status.content_ok {
                writeln!(f, "      ! stored hash does not match entry contents")?;
            }
        }
        write!(f, "  chain status: {}", self.verification)
    }
}
