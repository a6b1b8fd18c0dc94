//! Snapshot records.

use crate::error::Result;
use crate::hash::Hash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time reference to a root tree.
///
/// The snapshot ID is the hash of the encoded record. It is not part of the
/// payload; the repository fills it in when a snapshot is stored or loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub time: DateTime<Utc>,
    /// Root tree. A snapshot without one cannot be compared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<Hash>,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip)]
    id: Option<Hash>,
}

impl Snapshot {
    /// Create a snapshot of `tree` taken at `time`.
    pub fn new(tree: Hash, paths: Vec<String>, time: DateTime<Utc>) -> Self {
        Self {
            time,
            tree: Some(tree),
            paths,
            hostname: String::new(),
            username: String::new(),
            tags: Vec::new(),
            description: String::new(),
            id: None,
        }
    }

    /// ID assigned by the repository, if this record was stored or loaded.
    pub fn id(&self) -> Option<Hash> {
        self.id
    }

    /// Short form of the ID, for human-readable output.
    pub fn short_id(&self) -> String {
        self.id.map(|id| id.short()).unwrap_or_else(|| "new".to_string())
    }

    pub(crate) fn with_id(mut self, id: Hash) -> Self {
        self.id = Some(id);
        self
    }

    /// Whether `desc` names this snapshot by tag or description.
    pub fn matches_label(&self, desc: &str) -> bool {
        self.tags.iter().any(|t| t == desc)
            || (!self.description.is_empty() && self.description == desc)
    }

    /// Canonical payload: JSON of the record without its ID.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_snapshot_encode_excludes_id() {
        let tree = Hash::hash_bytes(b"tree");
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let snapshot = Snapshot::new(tree, vec!["/home".to_string()], time)
            .with_id(Hash::hash_bytes(b"id"));

        let encoded = snapshot.encode().unwrap();
        let decoded = Snapshot::decode(&encoded).unwrap();

        assert_eq!(decoded.tree, Some(tree));
        assert_eq!(decoded.time, time);
        assert_eq!(decoded.id(), None);
        assert_eq!(decoded.short_id(), "new");
    }

    #[test]
    fn test_snapshot_without_tree_decodes() {
        let decoded = Snapshot::decode(br#"{"time":"2024-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(decoded.tree, None);
        assert!(decoded.paths.is_empty());
    }

    #[test]
    fn test_matches_label() {
        let mut snapshot = Snapshot::new(Hash::hash_bytes(b"t"), vec![], Utc::now());
        snapshot.tags = vec!["nightly".to_string()];
        snapshot.description = "before upgrade".to_string();

        assert!(snapshot.matches_label("nightly"));
        assert!(snapshot.matches_label("before upgrade"));
        assert!(!snapshot.matches_label("weekly"));
        assert!(!snapshot.matches_label(""));
    }
}
