//! Wire messages for the framed store protocol
//!
//! Messages are generated from `proto/store.proto`. Individual store values travel
//! as JSON-encoded [`StoreValue`]s inside `bytes` fields.

use crate::notification::{
    Batch, Compare, Notification, PathQuery, PublishRequest, Query, Timestamp,
};
use crate::path::{Path, PathSegment};
use crate::value::{StoreValue, Updates};
use thiserror::Error;

/// Errors converting between wire messages and store types
#[derive(Error, Debug)]
pub enum WireError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Value encoding error: {0}")]
    Value(#[from] serde_json::Error),
}

// Generated from proto/store.proto
include!(concat!(env!("OUT_DIR"), "/ccaction.store.rs"));

impl StoreFrame {
    /// Build a request frame
    pub fn request(
        request_id: u64,
        bearer_token: impl Into<String>,
        body: store_frame::Body,
    ) -> Self {
        Self {
            request_id,
            bearer_token: bearer_token.into(),
            body: Some(body),
        }
    }

    /// Build a response frame for `request_id`
    pub fn response(request_id: u64, body: store_frame::Body) -> Self {
        Self {
            request_id,
            bearer_token: String::new(),
            body: Some(body),
        }
    }
}

pub fn encode_value(value: &StoreValue) -> Result<Vec<u8>, WireError> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode_value(bytes: &[u8]) -> Result<StoreValue, WireError> {
    Ok(serde_json::from_slice(bytes)?)
}

impl From<&Path> for PathMsg {
    fn from(path: &Path) -> Self {
        Self {
            elements: path
                .segments()
                .iter()
                .map(|segment| match segment {
                    PathSegment::Key(key) => PathElement {
                        key: key.clone(),
                        wildcard: false,
                    },
                    PathSegment::Wildcard => PathElement {
                        key: String::new(),
                        wildcard: true,
                    },
                })
                .collect(),
        }
    }
}

impl From<PathMsg> for Path {
    fn from(msg: PathMsg) -> Self {
        Path::new(msg.elements.into_iter().map(|e| {
            if e.wildcard {
                PathSegment::Wildcard
            } else {
                PathSegment::Key(e.key)
            }
        }))
    }
}

impl From<Timestamp> for TimestampMsg {
    fn from(ts: Timestamp) -> Self {
        Self {
            seconds: ts.seconds,
            nanos: ts.nanos,
        }
    }
}

impl From<TimestampMsg> for Timestamp {
    fn from(msg: TimestampMsg) -> Self {
        Self {
            seconds: msg.seconds,
            nanos: msg.nanos,
        }
    }
}

impl TryFrom<&Notification> for NotificationMsg {
    type Error = WireError;

    fn try_from(notif: &Notification) -> Result<Self, Self::Error> {
        let updates = notif
            .updates
            .iter()
            .map(|(key, value)| {
                Ok(UpdateMsg {
                    key: key.clone(),
                    value: encode_value(value)?,
                })
            })
            .collect::<Result<Vec<_>, WireError>>()?;

        Ok(Self {
            timestamp: Some(notif.timestamp.into()),
            path: Some((&notif.path).into()),
            updates,
        })
    }
}

/// Decoded values come back frozen
impl TryFrom<NotificationMsg> for Notification {
    type Error = WireError;

    fn try_from(msg: NotificationMsg) -> Result<Self, Self::Error> {
        let timestamp = msg.timestamp.ok_or(WireError::MissingField("timestamp"))?;
        let path = msg.path.ok_or(WireError::MissingField("path"))?;

        let mut updates = Updates::with_capacity(msg.updates.len());
        for update in msg.updates {
            updates.insert(update.key, decode_value(&update.value)?.freeze());
        }

        Ok(Notification::new(timestamp.into(), path.into(), updates))
    }
}

impl From<&Query> for QueryMsg {
    fn from(query: &Query) -> Self {
        Self {
            dataset: query.dataset.clone(),
            paths: query
                .paths
                .iter()
                .map(|pq| PathQueryMsg {
                    path: Some((&pq.path).into()),
                    keys: pq.keys.clone(),
                })
                .collect(),
        }
    }
}

impl TryFrom<QueryMsg> for Query {
    type Error = WireError;

    fn try_from(msg: QueryMsg) -> Result<Self, Self::Error> {
        let paths = msg
            .paths
            .into_iter()
            .map(|pq| {
                Ok(PathQuery {
                    path: pq.path.ok_or(WireError::MissingField("path"))?.into(),
                    keys: pq.keys,
                })
            })
            .collect::<Result<Vec<_>, WireError>>()?;
        Ok(Query::new(msg.dataset, paths))
    }
}

impl TryFrom<&Batch> for BatchMsg {
    type Error = WireError;

    fn try_from(batch: &Batch) -> Result<Self, Self::Error> {
        Ok(Self {
            notifications: batch
                .notifications
                .iter()
                .map(NotificationMsg::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl TryFrom<BatchMsg> for Batch {
    type Error = WireError;

    fn try_from(msg: BatchMsg) -> Result<Self, Self::Error> {
        Ok(Self {
            notifications: msg
                .notifications
                .into_iter()
                .map(Notification::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl TryFrom<&PublishRequest> for PublishRequestMsg {
    type Error = WireError;

    fn try_from(req: &PublishRequest) -> Result<Self, Self::Error> {
        let compare = match &req.compare {
            Some(c) => Some(CompareMsg {
                key: c.key.clone(),
                value: encode_value(&c.value)?,
            }),
            None => None,
        };

        Ok(Self {
            dtype: req.dtype.clone(),
            dataset: req.dataset.clone(),
            sync: req.sync,
            compare,
            notifications: req
                .notifications
                .iter()
                .map(NotificationMsg::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl TryFrom<PublishRequestMsg> for PublishRequest {
    type Error = WireError;

    fn try_from(msg: PublishRequestMsg) -> Result<Self, Self::Error> {
        let compare = match msg.compare {
            Some(c) => Some(Compare {
                key: c.key,
                value: decode_value(&c.value)?,
            }),
            None => None,
        };

        Ok(Self {
            dtype: msg.dtype,
            dataset: msg.dataset,
            sync: msg.sync,
            compare,
            notifications: msg
                .notifications
                .into_iter()
                .map(Notification::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}
