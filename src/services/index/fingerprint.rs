//! Corpus Fingerprint
//!
//! SHA-256 over the sorted, de-duplicated record ids joined with `\n`.
//! Order and duplicates in the input do not affect the result.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

/// Sorted, de-duplicated ids.
pub fn canonical_ids<'a, I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    ids.into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Hex-encoded fingerprint of a set of record ids.
pub fn fingerprint<'a, I>(ids: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let canonical = canonical_ids(ids);
    let mut hasher = Sha256::new();
    hasher.update(canonical.join("\n").as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
