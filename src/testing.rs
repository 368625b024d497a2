//! In-memory stand-ins for the host, the store and the login endpoint

use crate::context::{ArgBag, ExecutionContext};
use crate::device::CommandResponse;
use crate::error::UserWarning;
use crate::store::{BatchStream, StoreClient, StoreTarget};
use crate::sync::auth::{Authenticator, Credentials, BAD_CREDENTIALS};
use anyhow::{anyhow, ensure, Result};
use async_trait::async_trait;
use ccaction_shared::{
    Batch, Notification, Path, PublishRequest, Query, StoreValue, Timestamp, Updates,
};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct Record {
    dataset: String,
    path: Path,
    updates: Updates,
}

/// Store that keeps records in insertion order and serves them frozen
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<Record>>,
    queries: Mutex<Vec<Query>>,
    publishes: Mutex<Vec<PublishRequest>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `updates` into the record at `path` without recording a publish
    pub fn seed(&self, dataset: &str, path: Path, updates: Updates) {
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.dataset == dataset && r.path == path) {
            Some(record) => record.updates.extend(updates),
            None => records.push(Record {
                dataset: dataset.to_string(),
                path,
                updates,
            }),
        }
    }

    pub fn read(&self, dataset: &str, path: &Path) -> Option<Updates> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.dataset == dataset && &r.path == path)
            .map(|r| r.updates.clone())
    }

    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().unwrap().clone()
    }

    pub fn publishes(&self) -> Vec<PublishRequest> {
        self.publishes.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn get(&self, queries: Vec<Query>) -> Result<BatchStream> {
        let records = self.records.lock().unwrap();
        let mut batches = Vec::new();
        for query in &queries {
            for path_query in &query.paths {
                for record in records
                    .iter()
                    .filter(|r| r.dataset == query.dataset && path_query.path.matches(&r.path))
                {
                    let updates: Updates = record
                        .updates
                        .iter()
                        .filter(|(k, _)| {
                            path_query.keys.is_empty() || path_query.keys.contains(k)
                        })
                        .map(|(k, v)| (k.clone(), v.clone().freeze()))
                        .collect();
                    let notification =
                        Notification::new(Timestamp::default(), record.path.clone(), updates);
                    batches.push(Ok(Batch {
                        notifications: vec![notification],
                    }));
                }
            }
        }
        drop(records);
        self.queries.lock().unwrap().extend(queries);
        Ok(stream::iter(batches).boxed())
    }

    async fn publish(&self, request: PublishRequest) -> Result<()> {
        for notification in &request.notifications {
            ensure!(
                !notification.updates.values().any(StoreValue::contains_frozen),
                "frozen value published at {}",
                notification.path
            );
            let updates = notification.updates.clone();
            self.seed(&request.dataset, notification.path.clone(), updates);
        }
        self.publishes.lock().unwrap().push(request);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Host stand-in recording everything an action does
pub struct MockContext {
    args: ArgBag,
    device_responses: Option<Vec<CommandResponse>>,
    source: Option<Arc<MemoryStore>>,
    destination: Option<Arc<MemoryStore>>,
    logs: Mutex<Vec<String>>,
    submitted: Mutex<Vec<Vec<String>>>,
    connected: Mutex<Vec<StoreTarget>>,
}

impl MockContext {
    pub fn new(args: ArgBag) -> Self {
        Self {
            args,
            device_responses: None,
            source: None,
            destination: None,
            logs: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            connected: Mutex::new(Vec::new()),
        }
    }

    /// Answer every device batch with `responses`
    pub fn with_device_responses(mut self, responses: Vec<CommandResponse>) -> Self {
        self.device_responses = Some(responses);
        self
    }

    /// `source` is the local store, `destination` is handed out by `connect_store`
    pub fn with_stores(mut self, source: Arc<MemoryStore>, destination: Arc<MemoryStore>) -> Self {
        self.source = Some(source);
        self.destination = Some(destination);
        self
    }

    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().unwrap().clone()
    }

    pub fn submitted_batches(&self) -> Vec<Vec<String>> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn connected_targets(&self) -> Vec<StoreTarget> {
        self.connected.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionContext for MockContext {
    fn args(&self) -> &ArgBag {
        &self.args
    }

    fn alog(&self, message: &str) {
        self.logs.lock().unwrap().push(message.to_string());
    }

    async fn run_device_cmds(&self, cmds: &[String]) -> Result<Vec<CommandResponse>> {
        let responses = self
            .device_responses
            .clone()
            .ok_or_else(|| anyhow!("no device attached"))?;
        self.submitted.lock().unwrap().push(cmds.to_vec());
        Ok(responses)
    }

    fn cv_client(&self) -> Result<Arc<dyn StoreClient>> {
        let source = self.source.clone().ok_or_else(|| anyhow!("no local store"))?;
        Ok(source)
    }

    async fn connect_store(&self, target: &StoreTarget) -> Result<Arc<dyn StoreClient>> {
        self.connected.lock().unwrap().push(target.clone());
        let destination = self
            .destination
            .clone()
            .ok_or_else(|| anyhow!("no store at {}", target.address))?;
        Ok(destination)
    }
}

/// Login endpoint that either always accepts or always rejects
pub struct StubAuthenticator {
    credentials: Option<Credentials>,
    logins: Mutex<Vec<(String, String)>>,
}

impl StubAuthenticator {
    pub fn accepting(token: &str, certificate: &str) -> Self {
        Self {
            credentials: Some(Credentials {
                token: token.to_string(),
                certificate: certificate.to_string(),
            }),
            logins: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            credentials: None,
            logins: Mutex::new(Vec::new()),
        }
    }

    /// `(host, username)` of every login attempt
    pub fn logins(&self) -> Vec<(String, String)> {
        self.logins.lock().unwrap().clone()
    }
}

#[async_trait]
impl Authenticator for StubAuthenticator {
    async fn login(&self, host: &str, username: &str, _password: &str) -> Result<Credentials> {
        self.logins
            .lock()
            .unwrap()
            .push((host.to_string(), username.to_string()));
        self.credentials
            .clone()
            .ok_or_else(|| UserWarning::new(BAD_CREDENTIALS).into())
    }
}
