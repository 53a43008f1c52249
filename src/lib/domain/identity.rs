use std::collections::HashSet;
use std::fmt;

use alloy_primitives::B256;
use serde::{Deserialize, Deserializer, Serialize};

use crate::crypto::leaf::{hash_identity, normalize_identity};

/// A normalized eligible identity (an email address).
///
/// Only constructible through [`Identity::parse`], so the inner string is
/// always trimmed, lowercased and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identity {0:?}: expected a non-empty email address")]
pub struct InvalidIdentity(pub String);

impl Identity {
    /// Normalize `raw` and validate it looks like an email.
    pub fn parse(raw: &str) -> Result<Self, InvalidIdentity> {
        let normalized = normalize_identity(raw);
        let valid = match normalized.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.is_empty()
                    && !normalized.chars().any(char::is_whitespace)
            }
            None => false,
        };
        if !valid {
            return Err(InvalidIdentity(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The Merkle leaf for this identity.
    pub fn leaf(&self) -> B256 {
        hash_identity(&self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Identity {
    type Err = InvalidIdentity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Parse an administrator-supplied list (newline, comma or semicolon
/// separated). Blank entries are skipped; duplicates after normalization
/// keep their first occurrence.
pub fn parse_identity_list(text: &str) -> Result<Vec<Identity>, InvalidIdentity> {
    let entries = text
        .split(['\n', '\r', ',', ';'])
        .filter(|entry| !entry.trim().is_empty());
    dedup_identities(entries)
}

/// Normalize, validate and deduplicate raw identity strings, preserving order.
pub fn dedup_identities<I, T>(raw: I) -> Result<Vec<Identity>, InvalidIdentity>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for entry in raw {
        let identity = Identity::parse(entry.as_ref())?;
        if seen.insert(identity.clone()) {
            out.push(identity);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        let id = Identity::parse("  Foo@Bar.COM ").unwrap();
        assert_eq!(id.as_str(), "foo@bar.com");
        assert_eq!(id.leaf(), hash_identity("foo@bar.com"));
    }

    #[test]
    fn test_parse_rejects_blank_and_malformed() {
        assert!(Identity::parse("").is_err());
        assert!(Identity::parse("   ").is_err());
        assert!(Identity::parse("no-at-sign").is_err());
        assert!(Identity::parse("@x.com").is_err());
        assert!(Identity::parse("a@").is_err());
        assert!(Identity::parse("a b@x.com").is_err());
    }

    #[test]
    fn test_list_splits_and_dedups() {
        let ids = parse_identity_list("a@x.com, B@x.com\n\n c@x.com;A@X.COM\r\n").unwrap();
        let names: Vec<&str> = ids.iter().map(Identity::as_str).collect();
        assert_eq!(names, vec!["a@x.com", "b@x.com", "c@x.com"]);
    }

    #[test]
    fn test_list_reports_bad_entry() {
        let err = parse_identity_list("a@x.com\nnot-an-email").unwrap_err();
        assert_eq!(err.0, "not-an-email");
    }

    #[test]
    fn test_deserialize_normalizes() {
        let id: Identity = serde_json::from_str("\" Alice@Example.org\"").unwrap();
        assert_eq!(id.as_str(), "alice@example.org");
        assert!(serde_json::from_str::<Identity>("\"\"").is_err());
    }
}
