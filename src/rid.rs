//! Record addresses (`#cluster:position`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::OrmError;

/// Physical record address inside the database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    /// Cluster identifier.
    pub cluster: i32,
    /// Position inside the cluster.
    pub position: i64,
}

impl RecordId {
    /// Creates a record id from its parts.
    pub const fn new(cluster: i32, position: i64) -> Self {
        Self { cluster, position }
    }

    /// Returns `true` when `text` parses as a record id.
    pub fn is_valid(text: &str) -> bool {
        text.parse::<RecordId>().is_ok()
    }

    /// Returns `true` when every entry is a record id and there is at least one.
    pub fn all_valid<S: AsRef<str>>(items: &[S]) -> bool {
        !items.is_empty() && items.iter().all(|item| Self::is_valid(item.as_ref()))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.cluster, self.position)
    }
}

impl FromStr for RecordId {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || OrmError::InvalidRecordId(s.to_string());
        let body = s.strip_prefix('#').unwrap_or(s);
        let (cluster, position) = body.split_once(':').ok_or_else(invalid)?;
        if !is_signed_digits(cluster) || !is_signed_digits(position) {
            return Err(invalid());
        }
        Ok(Self {
            cluster: cluster.parse().map_err(|_| invalid())?,
            position: position.parse().map_err(|_| invalid())?,
        })
    }
}

fn is_signed_digits(part: &str) -> bool {
    let digits = part.strip_prefix('-').unwrap_or(part);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_hash() {
        assert_eq!("#12:3".parse::<RecordId>().ok(), Some(RecordId::new(12, 3)));
        assert_eq!("12:3".parse::<RecordId>().ok(), Some(RecordId::new(12, 3)));
        assert_eq!("#-1:-2".parse::<RecordId>().ok(), Some(RecordId::new(-1, -2)));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "#", "#1", "#a:1", "#1:", "User", "#1:2:3", "# 1:2"] {
            assert!(!RecordId::is_valid(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn all_valid_requires_every_entry() {
        assert!(RecordId::all_valid(&["#1:1", "#1:2"]));
        assert!(!RecordId::all_valid(&["#1:1", "User"]));
        assert!(!RecordId::all_valid::<&str>(&[]));
    }

    #[test]
    fn serde_uses_literal_form() {
        let rid = RecordId::new(5, 9);
        let json = serde_json::to_string(&rid).expect("serialize");
        assert_eq!(json, "\"#5:9\"");
        let back: RecordId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, rid);
    }
}
