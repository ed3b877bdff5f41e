//! Scope set normalization.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

/// Scope that every authorize request carries.
pub const OPENID_SCOPE: &str = "openid";

/// Scope requested when refresh tokens are enabled.
pub const OFFLINE_ACCESS_SCOPE: &str = "offline_access";

/// A deduplicated set of scopes.
///
/// Serialization keeps first-seen order so cache keys and authorize URLs are stable.
/// Equality ignores order.
#[derive(Debug, Clone, Default)]
pub struct ScopeSet {
    scopes: Vec<String>,
}

impl ScopeSet {
    /// Merge space-delimited scope strings, dropping blanks and duplicates.
    pub fn from_parts<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut set = Self::default();
        for part in parts {
            set.extend_from_str(part);
        }
        set
    }

    pub fn parse(value: &str) -> Self {
        Self::from_parts([value])
    }

    pub fn extend_from_str(&mut self, value: &str) {
        for scope in value.split_whitespace() {
            self.insert(scope);
        }
    }

    pub fn insert(&mut self, scope: &str) {
        if !self.contains(scope) {
            self.scopes.push(scope.to_string());
        }
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// True when every scope of `other` is also in `self`.
    pub fn is_superset_of(&self, other: &ScopeSet) -> bool {
        other.iter().all(|scope| self.contains(scope))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl PartialEq for ScopeSet {
    fn eq(&self, other: &Self) -> bool {
        let ours: HashSet<&str> = self.iter().collect();
        let theirs: HashSet<&str> = other.iter().collect();
        ours == theirs
    }
}

impl Eq for ScopeSet {}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.scopes.join(" "))
    }
}

impl Serialize for ScopeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ScopeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_deduplicates_in_first_seen_order() {
        let scopes = ScopeSet::from_parts(["openid", "openid profile email", "read:users  email"]);
        assert_eq!(scopes.to_string(), "openid profile email read:users");
        assert_eq!(scopes.len(), 4);
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = ScopeSet::parse("openid profile email");
        let b = ScopeSet::parse("email openid profile profile");
        assert_eq!(a, b);
        assert_ne!(a, ScopeSet::parse("openid profile"));
        assert!(a.is_superset_of(&ScopeSet::parse("profile openid")));
    }

    #[test]
    fn test_blank_parts() {
        let scopes = ScopeSet::from_parts(["", "   ", "openid"]);
        assert_eq!(scopes.to_string(), "openid");
        assert!(ScopeSet::parse("  ").is_empty());
    }

    #[test]
    fn test_serde_as_string() {
        let scopes = ScopeSet::parse("openid offline_access");
        let json = serde_json::to_string(&scopes).unwrap();
        assert_eq!(json, "\"openid offline_access\"");

        let back: ScopeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scopes);
    }
}
