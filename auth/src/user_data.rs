//! Packed auxiliary data.
//!
//! Once a shadow record exists for a ticket, the ticket's auxiliary data is
//! replaced by `<128 lowercase hex hash>;<36 char UUID key>`. Parsing never
//! fails: any deviation from the layout simply leaves the corresponding
//! part absent.

use crate::constants::{AUXILIARY_DATA_LENGTH, AUXILIARY_SEPARATOR, HASH_HEX_LENGTH};
use crate::state::TicketKey;

/// The parts recovered from a ticket's auxiliary data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddedData {
    /// The hash, present only if it sat at the exact offset and consisted
    /// solely of lowercase hex digits.
    pub hash: Option<String>,

    /// The store key, present only if it parsed as a UUID.
    pub key: Option<TicketKey>,
}

impl EmbeddedData {
    /// Split `user_data` into its hash and key parts.
    #[must_use]
    pub fn parse(user_data: &str) -> Self {
        let bytes = user_data.as_bytes();
        if bytes.len() != AUXILIARY_DATA_LENGTH
            || bytes.get(HASH_HEX_LENGTH) != Some(&(AUXILIARY_SEPARATOR as u8))
        {
            return Self::default();
        }

        let parts: Vec<&str> = user_data.split(AUXILIARY_SEPARATOR).collect();
        let [hash, key] = parts.as_slice() else {
            return Self::default();
        };

        Self {
            hash: is_lowercase_hex(hash).then(|| (*hash).to_string()),
            key: key.parse::<TicketKey>().ok(),
        }
    }

    /// True if a well-formed hash was embedded.
    #[must_use]
    pub const fn contains_hash(&self) -> bool {
        self.hash.is_some()
    }

    /// True if a well-formed store key was embedded.
    #[must_use]
    pub const fn contains_key(&self) -> bool {
        self.key.is_some()
    }
}

/// Pack a hash and store key into auxiliary data.
#[must_use]
pub fn pack(hash: &str, key: TicketKey) -> String {
    format!("{hash}{AUXILIARY_SEPARATOR}{key}")
}

// Uppercase hex is deliberately rejected: hashes are always rendered lowercase.
fn is_lowercase_hex(candidate: &str) -> bool {
    candidate
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash() -> String {
        "0123456789abcdef".repeat(8)
    }

    #[test]
    fn test_pack_then_parse() {
        let key = TicketKey::new();
        let packed = pack(&hash(), key);
        assert_eq!(packed.len(), AUXILIARY_DATA_LENGTH);

        let parsed = EmbeddedData::parse(&packed);
        assert_eq!(parsed.hash, Some(hash()));
        assert_eq!(parsed.key, Some(key));
    }

    #[test]
    fn test_uppercase_hash_is_not_a_hash() {
        let packed = pack(&hash().to_uppercase(), TicketKey::new());
        let parsed = EmbeddedData::parse(&packed);
        assert!(!parsed.contains_hash());
        assert!(parsed.contains_key());
    }

    #[test]
    fn test_bad_key_keeps_hash() {
        let packed = format!("{};{}", hash(), "z".repeat(36));
        let parsed = EmbeddedData::parse(&packed);
        assert!(parsed.contains_hash());
        assert!(!parsed.contains_key());
    }

    #[test]
    fn test_wrong_shapes_yield_nothing() {
        let key = TicketKey::new();
        let cases = [
            String::new(),
            "plain user data".to_string(),
            format!("{};{key}", &hash()[1..]),
            format!("{}x;{key}", hash()),
            format!("{}:{key}", hash()),
            format!("{};{key};", hash()),
            format!("{};{}", &hash()[..127], format!(";{key}")),
        ];
        for case in cases {
            assert_eq!(EmbeddedData::parse(&case), EmbeddedData::default(), "{case}");
        }
    }

    #[test]
    fn test_extra_separator_in_key_part() {
        // Right length, separator at the right offset, but three parts.
        let mut key = TicketKey::new().to_string();
        key.replace_range(0..1, ";");
        let packed = format!("{};{key}", hash());
        assert_eq!(packed.len(), AUXILIARY_DATA_LENGTH);
        assert_eq!(EmbeddedData::parse(&packed), EmbeddedData::default());
    }
}
