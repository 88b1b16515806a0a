//! Credential keys and typed predicate values.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::error::ConfigError;

/// Value type a credential holds in the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Free text or enumerated codes (names, ISO country codes)
    Text,
    /// Integer values
    Number,
    /// Calendar dates
    Date,
}

impl ValueKind {
    /// Human-readable name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
        }
    }

    /// Whether ordering predicates (`gte`, `lt`, `range`, ...) apply
    pub fn is_ordered(&self) -> bool {
        matches!(self, Self::Number | Self::Date)
    }
}

/// Credentials a request may constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Credential {
    /// Given name
    FirstName,
    /// Family name
    LastName,
    /// Full name as printed on the document
    FullName,
    /// Date of birth
    BirthDate,
    /// Age in whole years
    Age,
    /// Nationality (ISO 3166-1 alpha-3)
    Nationality,
    /// Gender marker
    Gender,
    /// Document number
    DocumentNumber,
    /// Document type (passport, id card, ...)
    DocumentType,
    /// Issuing country (ISO 3166-1 alpha-3)
    IssuingCountry,
    /// Document expiry date
    ExpiryDate,
}

impl Credential {
    /// All credentials, in serialization order
    pub const ALL: [Credential; 11] = [
        Self::FirstName,
        Self::LastName,
        Self::FullName,
        Self::BirthDate,
        Self::Age,
        Self::Nationality,
        Self::Gender,
        Self::DocumentNumber,
        Self::DocumentType,
        Self::IssuingCountry,
        Self::ExpiryDate,
    ];

    /// Wire name of the credential
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstName => "firstname",
            Self::LastName => "lastname",
            Self::FullName => "fullname",
            Self::BirthDate => "birthdate",
            Self::Age => "age",
            Self::Nationality => "nationality",
            Self::Gender => "gender",
            Self::DocumentNumber => "document_number",
            Self::DocumentType => "document_type",
            Self::IssuingCountry => "issuing_country",
            Self::ExpiryDate => "expiry_date",
        }
    }

    /// Value type the credential holds
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Age => ValueKind::Number,
            Self::BirthDate | Self::ExpiryDate => ValueKind::Date,
            _ => ValueKind::Text,
        }
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Credential {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for Credential {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownCredential(s.to_string()))
    }
}

impl Serialize for Credential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A value a predicate compares a credential against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CredentialValue {
    /// Text or code value
    Text(String),
    /// Integer value
    Number(i64),
    /// Calendar date, serialized as `YYYY-MM-DD`
    Date(NaiveDate),
}

impl CredentialValue {
    /// Value type of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Text(_) => ValueKind::Text,
            Self::Number(_) => ValueKind::Number,
            Self::Date(_) => ValueKind::Date,
        }
    }

    /// Ordering between two values of the same kind
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for CredentialValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for CredentialValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CredentialValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for CredentialValue {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for CredentialValue {
    fn from(n: i32) -> Self {
        Self::Number(i64::from(n))
    }
}

impl From<u32> for CredentialValue {
    fn from(n: u32) -> Self {
        Self::Number(i64::from(n))
    }
}

impl From<NaiveDate> for CredentialValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_names_roundtrip() {
        for credential in Credential::ALL {
            assert_eq!(credential.as_str().parse::<Credential>().unwrap(), credential);
        }
    }

    #[test]
    fn test_unknown_credential() {
        assert_eq!(
            "shoe_size".parse::<Credential>(),
            Err(ConfigError::UnknownCredential("shoe_size".to_string()))
        );
    }

    #[test]
    fn test_credential_kinds() {
        assert_eq!(Credential::Age.kind(), ValueKind::Number);
        assert_eq!(Credential::BirthDate.kind(), ValueKind::Date);
        assert_eq!(Credential::ExpiryDate.kind(), ValueKind::Date);
        assert_eq!(Credential::Nationality.kind(), ValueKind::Text);
        assert!(!ValueKind::Text.is_ordered());
    }

    #[test]
    fn test_value_serialization() {
        let date = NaiveDate::from_ymd_opt(2030, 1, 31).unwrap();
        assert_eq!(
            serde_json::to_string(&CredentialValue::from(date)).unwrap(),
            "\"2030-01-31\""
        );
        assert_eq!(serde_json::to_string(&CredentialValue::from(18)).unwrap(), "18");
        assert_eq!(
            serde_json::to_string(&CredentialValue::from("PRK")).unwrap(),
            "\"PRK\""
        );
    }

    #[test]
    fn test_compare_requires_same_kind() {
        let a = CredentialValue::from(18);
        let b = CredentialValue::from(25);
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert_eq!(a.compare(&CredentialValue::from("18")), None);
    }
}
