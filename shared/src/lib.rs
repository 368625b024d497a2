//! Shared store types for change-control actions
//!
//! Paths, values, queries and notifications exchanged with the key-value store,
//! plus the wire messages and frame codec used by the framed store client.

pub mod codec;
pub mod notification;
pub mod path;
pub mod proto;
pub mod value;

pub use notification::{Batch, Compare, Notification, PathQuery, PublishRequest, Query, Timestamp};
pub use path::{Path, PathSegment};
pub use value::{unfreeze_updates, updates_to_json, StoreValue, Updates};

/// Dataset holding change-control configuration
pub const CVP_DATASET: &str = "cvp";

/// Object type tag used for every publish
pub const DEVICE_DTYPE: &str = "device";

/// Root key of the change-control tree
pub const CHANGE_CONTROL: &str = "changecontrol";

/// Schema version segment under each change-control collection
pub const SCHEMA_VERSION: &str = "v1";
