//! Random name suffixes for created resources.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};

/// Characters used in suffixes. Lookalikes (`l`, `O`, `0`) are left out.
const ALPHABET: &[u8] = b"abcdefghijkmnopqrstuvwxyzABCDEFGHIJKLMNPQRSTUVWXYZ123456789";

/// Prefix for every resource name the tool creates.
pub const NAME_PREFIX: &str = "rdsvalidator";

/// Generate a random suffix of `len` characters.
///
/// Entropy sources: nanosecond timestamp and a per-call `RandomState`.
#[must_use]
pub fn random_suffix(len: usize) -> String {
    let state = RandomState::new();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    (0..len)
        .map(|i| {
            let mut hasher = state.build_hasher();
            hasher.write_u128(nanos);
            hasher.write_usize(i);
            #[allow(clippy::cast_possible_truncation)]
            let idx = (hasher.finish() % ALPHABET.len() as u64) as usize;
            char::from(ALPHABET[idx])
        })
        .collect()
}

/// Name for a created keypair or firewall rule.
#[must_use]
pub fn resource_name(suffix: &str) -> String {
    format!("{NAME_PREFIX}-{suffix}")
}
