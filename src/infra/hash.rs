use std::hash::Hasher;

use twox_hash::XxHash64;

/// Hash of an (old, new) line pair. The separator byte keeps `("ab", "c")` and
/// `("a", "bc")` apart.
pub fn hash_pair(old: &str, new: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(old.as_bytes());
    hasher.write_u8(0xff);
    hasher.write(new.as_bytes());
    hasher.finish()
}
