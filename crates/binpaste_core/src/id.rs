//! Paste identifier generation.

use uuid::Uuid;

/// Length of a rendered paste id in hex characters.
pub const PASTE_ID_LEN: usize = 40;

/// Generate a new paste id.
///
/// The id is a blake3 digest of a random UUIDv4, truncated to 20 bytes and
/// rendered as lowercase hex.
///
/// # Returns
/// A [`PASTE_ID_LEN`]-character lowercase hex string.
pub fn generate_paste_id() -> String {
    let seed = Uuid::new_v4();
    let digest = blake3::hash(seed.as_bytes());
    digest.to_hex()[..PASTE_ID_LEN].to_string()
}

/// Check whether `candidate` has the shape of a paste id.
///
/// # Returns
/// `true` when `candidate` is exactly [`PASTE_ID_LEN`] lowercase hex digits.
pub fn is_valid_paste_id(candidate: &str) -> bool {
    candidate.len() == PASTE_ID_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_are_fixed_length_lowercase_hex() {
        for _ in 0..64 {
            let id = generate_paste_id();
            assert_eq!(id.len(), PASTE_ID_LEN);
            assert!(is_valid_paste_id(&id), "invalid id: {}", id);
        }
    }

    #[test]
    fn generated_ids_do_not_repeat() {
        let ids: HashSet<String> = (0..1_000).map(|_| generate_paste_id()).collect();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn validation_rejects_wrong_shapes() {
        assert!(!is_valid_paste_id(""));
        assert!(!is_valid_paste_id(&"a".repeat(39)));
        assert!(!is_valid_paste_id(&"A".repeat(40)));
        assert!(!is_valid_paste_id(&"g".repeat(40)));
        assert!(is_valid_paste_id(&"0f".repeat(20)));
    }
}
