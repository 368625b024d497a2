//! Queries, notifications and publish requests exchanged with the store

use crate::path::Path;
use crate::value::{StoreValue, Updates};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time as seconds and nanoseconds since the Unix epoch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    /// Current wall-clock time
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            seconds: elapsed.as_secs() as i64,
            nanos: elapsed.subsec_nanos() as i32,
        }
    }
}

/// A set of updates at one path, stamped with a time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub timestamp: Timestamp,
    pub path: Path,
    pub updates: Updates,
}

impl Notification {
    pub fn new(timestamp: Timestamp, path: Path, updates: Updates) -> Self {
        Self {
            timestamp,
            path,
            updates,
        }
    }
}

/// A path to read and the keys wanted under it; empty `keys` means all keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathQuery {
    pub path: Path,
    pub keys: Vec<String>,
}

/// A read against one dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub dataset: String,
    pub paths: Vec<PathQuery>,
}

impl Query {
    pub fn new(dataset: impl Into<String>, paths: Vec<PathQuery>) -> Self {
        Self {
            dataset: dataset.into(),
            paths,
        }
    }

    /// Query all keys under a single path
    pub fn single(dataset: impl Into<String>, path: Path) -> Self {
        Self::new(
            dataset,
            vec![PathQuery {
                path,
                keys: Vec::new(),
            }],
        )
    }
}

/// One step of a `get` response stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub notifications: Vec<Notification>,
}

/// Precondition for a publish: only apply if `key` currently holds `value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compare {
    pub key: String,
    pub value: StoreValue,
}

/// A write to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    /// Object type tag of the dataset
    pub dtype: String,
    pub dataset: String,
    /// Wait for the store to acknowledge before returning
    pub sync: bool,
    pub compare: Option<Compare>,
    pub notifications: Vec<Notification>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_now_is_recent() {
        let ts = Timestamp::now();
        assert!(ts.seconds > 1_600_000_000);
        assert!(ts.nanos >= 0 && ts.nanos < 1_000_000_000);
    }

    #[test]
    fn test_single_query_wants_all_keys() {
        let query = Query::single("cvp", Path::new(["changecontrol"]));
        assert_eq!(query.dataset, "cvp");
        assert_eq!(query.paths.len(), 1);
        assert!(query.paths[0].keys.is_empty());
    }
}
