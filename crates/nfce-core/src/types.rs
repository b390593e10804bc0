//! Shared identifier types.
//!
//! This module defines newtypes that carry their validation with them:
//! an [`AccessKey`] can only exist with a correct check digit, and a
//! [`JobId`] is always a UUID v4.

use crate::error::CoreError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Number of digits in an NFC-e access key.
pub const ACCESS_KEY_LEN: usize = 44;

/// Strip every non-digit character from a raw access key.
#[must_use]
pub fn normalize_access_key(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Check length, digits, and the modulo-11 check digit of a normalized key.
///
/// Keys made of 44 identical digits are rejected even when the checksum
/// formula accepts them.
#[must_use]
pub fn is_valid_access_key(key: &str) -> bool {
    let bytes = key.as_bytes();
    if bytes.len() != ACCESS_KEY_LEN || !bytes.iter().all(u8::is_ascii_digit) {
        return false;
    }

    if bytes.iter().all(|&b| b == bytes[0]) {
        return false;
    }

    check_digit(&bytes[..ACCESS_KEY_LEN - 1]) == bytes[ACCESS_KEY_LEN - 1] - b'0'
}

/// Weighted sum with weights 2..=9 cycling from the rightmost digit.
fn check_digit(body: &[u8]) -> u8 {
    let sum: u32 = body
        .iter()
        .rev()
        .zip((2u32..=9).cycle())
        .map(|(&digit, weight)| u32::from(digit - b'0') * weight)
        .sum();

    match sum % 11 {
        0 | 1 => 0,
        // remainder is at most 10, so the digit always fits
        #[allow(clippy::cast_possible_truncation)]
        remainder => (11 - remainder) as u8,
    }
}

/// A validated 44-digit NFC-e access key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessKey(String);

impl AccessKey {
    /// Normalize and validate a raw access key.
    ///
    /// # Errors
    /// Returns error if the normalized key is not 44 digits, is a single
    /// repeated digit, or fails the check digit.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let key = normalize_access_key(raw);

        if key.len() != ACCESS_KEY_LEN {
            return Err(CoreError::InvalidAccessKey(format!(
                "expected {ACCESS_KEY_LEN} digits, got {}",
                key.len()
            )));
        }

        if !is_valid_access_key(&key) {
            return Err(CoreError::InvalidAccessKey(format!(
                "check digit mismatch for '{key}'"
            )));
        }

        Ok(Self(key))
    }

    /// Get the inner digit string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// IBGE code of the issuing state (first two digits).
    #[must_use]
    pub fn state_code(&self) -> &str {
        &self.0[..2]
    }

    /// CNPJ of the issuer embedded in the key.
    #[must_use]
    pub fn issuer_cnpj(&self) -> &str {
        &self.0[6..20]
    }

    /// Key split in groups of four digits, as printed on receipts.
    #[must_use]
    pub fn formatted(&self) -> String {
        self.0
            .as_bytes()
            .chunks(4)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccessKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AccessKey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccessKey> for String {
    fn from(key: AccessKey) -> Self {
        key.0
    }
}

/// Newtype for job identifiers with validation.
///
/// Job IDs must be valid UUIDs (v4 format).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Create a new `JobId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is not a valid UUID v4.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Create a new random `JobId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), CoreError> {
        static UUID_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = UUID_REGEX.get_or_init(|| {
            Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
                .expect("valid regex")
        });

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "invalid job ID: must be a valid UUID v4, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State portals with a supported NFC-e lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Portal {
    /// SEFAZ Bahia
    #[default]
    #[serde(rename = "BA")]
    Ba,
}

impl Portal {
    /// Two-letter state code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Ba => "BA",
        }
    }
}

impl fmt::Display for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Portal {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BA" => Ok(Self::Ba),
            other => Err(CoreError::UnsupportedPortal(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_KEY: &str = "29250306057223031484650140003829591141073162";

    #[test]
    fn test_normalize_access_key() {
        let cases = [
            (VALID_KEY, VALID_KEY),
            (
                "2925 0306 0572 2303 1484 6501 4000 3829 5911 4107 3162",
                VALID_KEY,
            ),
            (
                "2925-0306-0572-2303-1484-6501-4000-3829-5911-4107-3162",
                VALID_KEY,
            ),
            (
                "2925 0306-0572 2303 1484.6501.4000.3829 5911 4107 3162",
                VALID_KEY,
            ),
            ("", ""),
        ];

        for (input, expected) in cases {
            assert_eq!(normalize_access_key(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn test_valid_access_key() {
        assert!(is_valid_access_key(VALID_KEY));
    }

    #[test]
    fn test_flipped_check_digit_fails() {
        let mut flipped = VALID_KEY[..43].to_string();
        flipped.push('3');
        assert!(!is_valid_access_key(&flipped));
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(!is_valid_access_key(&VALID_KEY[..43]));
        assert!(!is_valid_access_key(&format!("{VALID_KEY}0")));
        assert!(!is_valid_access_key(""));
    }

    #[test]
    fn test_repeated_digits_rejected() {
        // 44 zeros: weighted sum is 0, remainder 0, check digit 0 -> arithmetically valid
        let zeros = "0".repeat(44);
        assert_eq!(check_digit(&zeros.as_bytes()[..43]), 0);
        assert!(!is_valid_access_key(&zeros));

        for digit in '1'..='9' {
            let key = digit.to_string().repeat(44);
            assert!(!is_valid_access_key(&key), "should reject {key}");
        }
    }

    #[test]
    fn test_non_digit_rejected() {
        let mut key = VALID_KEY.to_string();
        key.replace_range(0..1, "a");
        assert!(!is_valid_access_key(&key));
    }

    #[test]
    fn test_access_key_parse_normalizes() {
        let key = AccessKey::parse("2925.0306.0572.2303.1484.6501.4000.3829.5911.4107.3162")
            .expect("valid key");
        assert_eq!(key.as_str(), VALID_KEY);
        assert_eq!(key.state_code(), "29");
        assert_eq!(key.issuer_cnpj(), "06057223031484");
        assert!(key.formatted().starts_with("2925 0306 0572"));
    }

    #[test]
    fn test_access_key_parse_errors() {
        let err = AccessKey::parse("123").unwrap_err();
        assert!(err.to_string().contains("expected 44 digits"));

        let err = AccessKey::parse(&"7".repeat(44)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAccessKey(_)));
    }

    #[test]
    fn test_access_key_serde() {
        let key = AccessKey::parse(VALID_KEY).expect("valid key");
        let json = serde_json::to_string(&key).expect("serialize key");
        assert_eq!(json, format!("\"{VALID_KEY}\""));

        let bad: Result<AccessKey, _> = serde_json::from_str("\"1234\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_job_id() {
        let id = JobId::generate();
        assert_eq!(JobId::new(id.as_str()).expect("round trip"), id);
        assert!(JobId::new("not-a-uuid").is_err());
        assert_ne!(JobId::generate(), JobId::generate());
    }

    #[test]
    fn test_portal_from_str() {
        assert_eq!("ba".parse::<Portal>().expect("BA"), Portal::Ba);
        assert!(matches!(
            "SP".parse::<Portal>(),
            Err(CoreError::UnsupportedPortal(code)) if code == "SP"
        ));
        assert_eq!(serde_json::to_string(&Portal::Ba).expect("serialize"), "\"BA\"");
    }
}
