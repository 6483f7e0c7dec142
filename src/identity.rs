//! Stable point identities for indexed images.
//!
//! A point id is a pure function of `(listing_id, image_url)`, which is what
//! turns `/index` into an upsert: indexing the same pair again overwrites the
//! existing point instead of appending a new one.
//!
//! Known limitation: the two keys are joined with a literal `|`, so a listing
//! id that itself contains `|` can produce the same input as a different pair
//! (`"a|b" + "|" + "c"` == `"a" + "|" + "b|c"`).

use sha1::{Digest, Sha1};

/// Separator between listing id and image url in the hashed input.
const KEY_SEPARATOR: &str = "|";

/// Derive the index point id for a listing image.
///
/// SHA-1 over `listing_id|image_url`, first 8 bytes read as a big-endian u64.
pub fn derive_point_id(listing_id: &str, image_url: &str) -> u64 {
    let mut hasher = Sha1::new();
    hasher.update(listing_id.as_bytes());
    hasher.update(KEY_SEPARATOR.as_bytes());
    hasher.update(image_url.as_bytes());
    let digest = hasher.finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(derive_point_id("L1", "http://x/a.jpg"), 11081733584766819331);
        assert_eq!(
            derive_point_id("listing-42", "https://cdn.example.com/img/1.webp"),
            3938142710653519305
        );
    }

    #[test]
    fn test_empty_keys() {
        assert_eq!(derive_point_id("", ""), 4518260662494718438);
    }

    #[test]
    fn test_deterministic() {
        let a = derive_point_id("L1", "http://x/a.jpg");
        let b = derive_point_id("L1", "http://x/a.jpg");
        assert_eq!(a, b);
    }

    #[test]
    fn test_either_key_changes_id() {
        let base = derive_point_id("L1", "http://x/a.jpg");
        assert_ne!(base, derive_point_id("L2", "http://x/a.jpg"));
        assert_ne!(base, derive_point_id("L1", "http://x/b.jpg"));
    }

    #[test]
    fn test_separator_collision_is_possible() {
        // documented limitation, kept as-is
        assert_eq!(derive_point_id("a|b", "c"), derive_point_id("a", "b|c"));
    }
}
