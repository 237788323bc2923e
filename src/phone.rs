//! Phone number normalization.
//!
//! Inbound handles, contact-list numbers, and CLI filters all arrive in
//! inconsistent formats (`+1 (919) 555-0123`, `tel:9195550123`, …). Every
//! boundary funnels through [`PhoneKey`] so the same contact is always the
//! same key: strip everything that is not a digit, keep the last 10.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical contact identity: the last 10 digits of a phone number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneKey(String);

impl PhoneKey {
    /// Normalize a raw phone string into a canonical key.
    ///
    /// Returns `None` when the input contains no digits at all. Inputs with
    /// fewer than 10 digits keep whatever digits they have, so short codes
    /// still get a stable (if less collision-proof) key.
    pub fn parse(raw: &str) -> Option<Self> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        let tail_start = digits.len().saturating_sub(10);
        Some(Self(digits[tail_start..].to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a phone number for dialing: digits only, preserving a leading
/// `+` when present. Returns `None` for inputs with no digits.
pub fn dialable(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let plus = raw.starts_with('+');
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    Some(if plus { format!("+{digits}") } else { digits })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_formatting() {
        let key = PhoneKey::parse("+1 (919) 555-0123").unwrap();
        assert_eq!(key.as_str(), "9195550123");
    }

    #[test]
    fn strips_protocol_prefix() {
        let key = PhoneKey::parse("tel:+19195550123").unwrap();
        assert_eq!(key.as_str(), "9195550123");
    }

    #[test]
    fn same_key_across_formats() {
        let a = PhoneKey::parse("9195550123").unwrap();
        let b = PhoneKey::parse("+1-919-555-0123").unwrap();
        let c = PhoneKey::parse("tel:19195550123").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn short_numbers_keep_all_digits() {
        let key = PhoneKey::parse("55512").unwrap();
        assert_eq!(key.as_str(), "55512");
    }

    #[test]
    fn no_digits_is_none() {
        assert!(PhoneKey::parse("").is_none());
        assert!(PhoneKey::parse("not a phone").is_none());
    }

    #[test]
    fn serializes_as_bare_string() {
        let key = PhoneKey::parse("+19195550123").unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"9195550123\"");
        let back: PhoneKey = serde_json::from_str("\"9195550123\"").unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn dialable_preserves_plus() {
        assert_eq!(dialable("+1 (919) 555-0123").unwrap(), "+19195550123");
        assert_eq!(dialable("919 555 0123").unwrap(), "9195550123");
        assert!(dialable("n/a").is_none());
    }
}
