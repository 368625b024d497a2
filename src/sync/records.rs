//! Change-control records in the store and the read/publish helpers around them

use crate::store::StoreClient;
use anyhow::{Context, Result};
use ccaction_shared::{
    unfreeze_updates, Notification, Path, PublishRequest, Query, StoreValue, Timestamp, Updates,
    CHANGE_CONTROL, DEVICE_DTYPE, SCHEMA_VERSION,
};
use futures::StreamExt;

/// The two change-control collections that are mirrored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcType {
    Template,
    ActionBundle,
}

impl CcType {
    /// Mirror order
    pub const ALL: [CcType; 2] = [CcType::Template, CcType::ActionBundle];

    pub fn key(self) -> &'static str {
        match self {
            CcType::Template => "template",
            CcType::ActionBundle => "actionBundle",
        }
    }

    /// `/changecontrol/<type>`
    pub fn root(self) -> Path {
        change_control_root().child(self.key())
    }

    /// `/changecontrol/<type>/v1`
    pub fn versioned(self) -> Path {
        self.root().child(SCHEMA_VERSION)
    }

    /// `/changecontrol/<type>/v1/<key>`
    pub fn record_path(self, key: &str) -> Path {
        self.versioned().child(key)
    }
}

/// `/changecontrol`
pub fn change_control_root() -> Path {
    Path::new([CHANGE_CONTROL])
}

/// Read everything under `path`, merged across all notifications and unfrozen
///
/// Notifications are merged in arrival order; a later update to the same key wins.
pub async fn fetch(client: &dyn StoreClient, dataset: &str, path: Path) -> Result<Updates> {
    let mut stream = client
        .get(vec![Query::single(dataset, path.clone())])
        .await
        .with_context(|| format!("reading {}:{}", dataset, path))?;

    let mut merged = Updates::new();
    while let Some(batch) = stream.next().await {
        let batch = batch.with_context(|| format!("reading {}:{}", dataset, path))?;
        for notification in batch.notifications {
            merged.extend(notification.updates);
        }
    }
    Ok(unfreeze_updates(merged))
}

/// Unconditionally write `data` at `path`, stamped now, waiting for the ack
pub async fn publish(
    client: &dyn StoreClient,
    dataset: &str,
    path: Path,
    data: Updates,
) -> Result<()> {
    let notification = Notification::new(Timestamp::now(), path.clone(), data);
    let request = PublishRequest {
        dtype: DEVICE_DTYPE.to_string(),
        dataset: dataset.to_string(),
        sync: true,
        compare: None,
        notifications: vec![notification],
    };
    client
        .publish(request)
        .await
        .with_context(|| format!("publishing {}:{}", dataset, path))
}

/// `{key: value}`
pub fn single(key: &str, value: StoreValue) -> Updates {
    let mut updates = Updates::with_capacity(1);
    updates.insert(key.to_string(), value);
    updates
}

/// `{key: Pointer(target)}`
pub fn pointer(key: &str, target: Path) -> Updates {
    single(key, StoreValue::Pointer(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use ccaction_shared::CVP_DATASET;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_paths() {
        assert_eq!(CcType::Template.root().to_string(), "/changecontrol/template");
        assert_eq!(
            CcType::ActionBundle.record_path("ab1").to_string(),
            "/changecontrol/actionBundle/v1/ab1"
        );
        assert_eq!(CcType::ALL[0], CcType::Template);
    }

    #[tokio::test]
    async fn test_fetch_merges_and_unfreezes() {
        let store = MemoryStore::new();
        let mut nested = Updates::new();
        nested.insert("steps".into(), vec![StoreValue::from("a")].into());
        let t1 = single("t1", nested.clone().into());
        store.seed(CVP_DATASET, CcType::Template.record_path("t1"), t1);
        store.seed(CVP_DATASET, CcType::Template.record_path("t2"), single("t2", "plain".into()));
        store.seed(CVP_DATASET, CcType::ActionBundle.record_path("a1"), single("a1", 1i64.into()));

        let records = fetch(&store, CVP_DATASET, CcType::Template.versioned().wildcard())
            .await
            .expect("fetch failed");

        assert_eq!(records.keys().collect::<Vec<_>>(), vec!["t1", "t2"]);
        assert_eq!(records["t1"], StoreValue::Map(nested));
        assert!(!records.values().any(StoreValue::contains_frozen));
    }

    #[tokio::test]
    async fn test_fetch_later_update_wins() {
        let store = MemoryStore::new();
        store.seed(CVP_DATASET, Path::new(["changecontrol", "x", "1"]), single("k", 1i64.into()));
        store.seed(CVP_DATASET, Path::new(["changecontrol", "x", "2"]), single("k", 2i64.into()));

        let records = fetch(&store, CVP_DATASET, Path::new(["changecontrol", "x"]).wildcard())
            .await
            .expect("fetch failed");
        assert_eq!(records.len(), 1);
        assert_eq!(records["k"], StoreValue::Int(2));
    }

    #[tokio::test]
    async fn test_publish_shape() {
        let store = MemoryStore::new();
        let before = Timestamp::now();
        let update = pointer("template", CcType::Template.root());
        publish(&store, CVP_DATASET, change_control_root(), update)
            .await
            .expect("publish failed");

        let published = store.publishes();
        assert_eq!(published.len(), 1);
        let request = &published[0];
        assert_eq!(request.dtype, "device");
        assert_eq!(request.dataset, "cvp");
        assert!(request.sync);
        assert!(request.compare.is_none());
        assert!(request.notifications[0].timestamp >= before);
        assert_eq!(
            request.notifications[0].updates["template"],
            StoreValue::Pointer(CcType::Template.root())
        );
    }
}
