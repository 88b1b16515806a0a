//! Credential constraints carried in the request URL.
//!
//! A [`RequestConfig`] maps each constrained [`Credential`] to a
//! [`CredentialConfig`], a set of optional predicates. Predicates of
//! different kinds on one credential are ANDed; writing a predicate kind that
//! is already present replaces it.
//!
//! Serialized form (flat, keys in a fixed order):
//!
//! ```json
//! {"age":{"range":[18,25]},"nationality":{"out":["PRK"]},"aml":true}
//! ```

use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::credential::{Credential, CredentialValue};
use crate::error::ConfigError;

/// A single comparison requested on a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Equal to
    Eq(CredentialValue),
    /// Greater than or equal to
    Gte(CredentialValue),
    /// Strictly greater than
    Gt(CredentialValue),
    /// Less than or equal to
    Lte(CredentialValue),
    /// Strictly less than
    Lt(CredentialValue),
    /// Inclusive range `[start, end]`
    Range(CredentialValue, CredentialValue),
    /// Member of the list
    In(Vec<CredentialValue>),
    /// Not a member of the list
    Out(Vec<CredentialValue>),
}

impl Predicate {
    /// Wire name of the predicate kind
    pub fn name(&self) -> &'static str {
        match self {
            Self::Eq(_) => "eq",
            Self::Gte(_) => "gte",
            Self::Gt(_) => "gt",
            Self::Lte(_) => "lte",
            Self::Lt(_) => "lt",
            Self::Range(..) => "range",
            Self::In(_) => "in",
            Self::Out(_) => "out",
        }
    }

    /// Predicates that only make sense on ordered (number/date) values
    pub fn requires_order(&self) -> bool {
        matches!(
            self,
            Self::Gte(_) | Self::Gt(_) | Self::Lte(_) | Self::Lt(_) | Self::Range(..)
        )
    }

    fn values(&self) -> Vec<&CredentialValue> {
        match self {
            Self::Eq(v) | Self::Gte(v) | Self::Gt(v) | Self::Lte(v) | Self::Lt(v) => vec![v],
            Self::Range(a, b) => vec![a, b],
            Self::In(vs) | Self::Out(vs) => vs.iter().collect(),
        }
    }

    /// Check the predicate against the credential's value type.
    pub fn validate(&self, credential: Credential) -> Result<(), ConfigError> {
        let kind = credential.kind();

        if self.requires_order() && !kind.is_ordered() {
            return Err(ConfigError::UnsupportedPredicate {
                predicate: self.name(),
                credential: credential.to_string(),
                kind: kind.name(),
            });
        }

        if let Some(bad) = self.values().into_iter().find(|v| v.kind() != kind) {
            return Err(ConfigError::ValueKindMismatch {
                credential: credential.to_string(),
                expected: kind.name(),
                found: bad.kind().name(),
            });
        }

        match self {
            Self::Range(start, end) => {
                if start.compare(end) == Some(std::cmp::Ordering::Greater) {
                    return Err(ConfigError::InvertedRange {
                        credential: credential.to_string(),
                        start: start.to_string(),
                        end: end.to_string(),
                    });
                }
            },
            Self::In(values) | Self::Out(values) if values.is_empty() => {
                return Err(ConfigError::EmptyList {
                    predicate: self.name(),
                    credential: credential.to_string(),
                });
            },
            _ => {},
        }

        Ok(())
    }
}

/// Predicates requested on one credential
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CredentialConfig {
    /// Equal to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eq: Option<CredentialValue>,
    /// Greater than or equal to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<CredentialValue>,
    /// Strictly greater than
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt: Option<CredentialValue>,
    /// Less than or equal to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<CredentialValue>,
    /// Strictly less than
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lt: Option<CredentialValue>,
    /// Inclusive range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<(CredentialValue, CredentialValue)>,
    /// Allowed values
    #[serde(rename = "in", skip_serializing_if = "Option::is_none")]
    pub in_list: Option<Vec<CredentialValue>>,
    /// Excluded values
    #[serde(rename = "out", skip_serializing_if = "Option::is_none")]
    pub out_list: Option<Vec<CredentialValue>>,
}

impl CredentialConfig {
    /// Write a predicate, replacing any previous one of the same kind
    pub fn apply(&mut self, predicate: Predicate) {
        match predicate {
            Predicate::Eq(v) => self.eq = Some(v),
            Predicate::Gte(v) => self.gte = Some(v),
            Predicate::Gt(v) => self.gt = Some(v),
            Predicate::Lte(v) => self.lte = Some(v),
            Predicate::Lt(v) => self.lt = Some(v),
            Predicate::Range(a, b) => self.range = Some((a, b)),
            Predicate::In(vs) => self.in_list = Some(vs),
            Predicate::Out(vs) => self.out_list = Some(vs),
        }
    }

    /// True when no predicate is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Sanctions / anti-money-laundering screening request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmlCheck {
    /// Optional country the screening should be scoped to.
    ///
    /// Kept for callers but not yet part of the wire format.
    pub country_scope: Option<String>,
}

/// Full set of constraints for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestConfig {
    credentials: BTreeMap<Credential, CredentialConfig>,
    aml: Option<AmlCheck>,
}

impl RequestConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and merge a predicate into the credential's entry
    pub fn apply(&mut self, credential: Credential, predicate: Predicate) -> Result<(), ConfigError> {
        predicate.validate(credential)?;
        self.credentials
            .entry(credential)
            .or_default()
            .apply(predicate);
        Ok(())
    }

    /// Request an AML screening
    pub fn set_aml(&mut self, country_scope: Option<String>) {
        self.aml = Some(AmlCheck { country_scope });
    }

    /// Entry for a credential, if any predicate was set on it
    pub fn get(&self, credential: Credential) -> Option<&CredentialConfig> {
        self.credentials.get(&credential)
    }

    /// AML screening request, if set
    pub fn aml(&self) -> Option<&AmlCheck> {
        self.aml.as_ref()
    }

    /// Number of constrained credentials
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// True when nothing has been requested
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty() && self.aml.is_none()
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// URL-safe base64 of the JSON form, as placed in the request URL
    pub fn to_base64(&self) -> Result<String, serde_json::Error> {
        Ok(URL_SAFE.encode(self.to_json()?))
    }
}

impl Serialize for RequestConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.credentials.len() + usize::from(self.aml.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (credential, config) in &self.credentials {
            map.serialize_entry(credential, config)?;
        }
        if self.aml.is_some() {
            map.serialize_entry("aml", &true)?;
        }
        map.end()
    }
}
