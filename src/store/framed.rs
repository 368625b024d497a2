//! Store client speaking length-prefixed `StoreFrame`s over TCP or TLS
//!
//! One connection carries one request at a time. A `get` holds the connection until
//! its response stream has seen `Done`.

use super::{BatchStream, StoreClient, StoreTarget};
use crate::transport::{TcpConnector, TlsConnector, TransportConnector, TransportStream};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use ccaction_shared::codec::{self, FrameDecoder};
use ccaction_shared::proto::{
    store_frame::Body, GetRequest, PublishRequestMsg, QueryMsg, StoreFrame,
};
use ccaction_shared::{Batch, PublishRequest, Query};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

const READ_CHUNK: usize = 4096;

struct FrameConnection {
    stream: Box<dyn TransportStream>,
    decoder: FrameDecoder,
}

impl FrameConnection {
    async fn send(&mut self, frame: &StoreFrame) -> Result<()> {
        let bytes = codec::encode(frame)?;
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Next frame body answering `request_id`; leftovers of earlier requests are dropped
    async fn recv(&mut self, request_id: u64) -> Result<Body> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            while let Some(frame) = self.decoder.decode_next()? {
                if frame.request_id < request_id {
                    warn!("Dropping stale store frame for request {}", frame.request_id);
                    continue;
                }
                if frame.request_id != request_id {
                    bail!(
                        "store answered request {} while waiting for {}",
                        frame.request_id,
                        request_id
                    );
                }
                return frame.body.ok_or_else(|| anyhow!("store sent an empty frame"));
            }

            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                bail!("store closed the connection");
            }
            self.decoder.extend(&buf[..n]);
        }
    }
}

pub struct FramedStoreClient {
    conn: Arc<Mutex<FrameConnection>>,
    bearer_token: String,
    next_request_id: AtomicU64,
}

impl FramedStoreClient {
    /// Connect to `target`, reading its token and CA files
    pub async fn connect(target: &StoreTarget) -> Result<Self> {
        let bearer_token = match &target.token_file {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading token file {}", path.display()))?
                .trim()
                .to_string(),
            None => String::new(),
        };

        let (stream, transport): (Box<dyn TransportStream>, &str) = match &target.ca_file {
            Some(path) => {
                let ca_pem = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("reading CA file {}", path.display()))?;
                let connector = TlsConnector::new(target.address.clone(), ca_pem);
                let stream: Box<dyn TransportStream> = Box::new(connector.connect().await?);
                (stream, connector.name())
            }
            None => {
                let connector = TcpConnector::new(target.address.clone());
                let stream: Box<dyn TransportStream> = Box::new(connector.connect().await?);
                (stream, connector.name())
            }
        };

        debug!("Connected to store at {} over {}", target.address, transport);
        Ok(Self::from_stream(stream, bearer_token))
    }

    /// Wrap an already established stream
    pub fn from_stream(stream: Box<dyn TransportStream>, bearer_token: impl Into<String>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(FrameConnection {
                stream,
                decoder: FrameDecoder::new(),
            })),
            bearer_token: bearer_token.into(),
            next_request_id: AtomicU64::new(0),
        }
    }

    fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl StoreClient for FramedStoreClient {
    async fn get(&self, queries: Vec<Query>) -> Result<BatchStream> {
        let request_id = self.next_request_id();
        let frame = StoreFrame::request(
            request_id,
            self.bearer_token.clone(),
            Body::Get(GetRequest {
                queries: queries.iter().map(QueryMsg::from).collect(),
            }),
        );

        let mut conn = self.conn.clone().lock_owned().await;
        conn.send(&frame).await?;
        Ok(batch_stream(conn, request_id))
    }

    async fn publish(&self, request: PublishRequest) -> Result<()> {
        let request_id = self.next_request_id();
        let frame = StoreFrame::request(
            request_id,
            self.bearer_token.clone(),
            Body::Publish(PublishRequestMsg::try_from(&request)?),
        );

        let mut conn = self.conn.lock().await;
        conn.send(&frame).await?;
        match conn.recv(request_id).await? {
            Body::Ack(_) => Ok(()),
            Body::Failure(failure) => Err(anyhow!(
                "store rejected publish to dataset {}: {}",
                request.dataset,
                failure.message
            )),
            other => Err(anyhow!("unexpected reply to publish: {:?}", other)),
        }
    }

    async fn close(&self) -> Result<()> {
        let mut conn = self.conn.lock().await;
        TransportStream::shutdown(conn.stream.as_mut()).await
    }
}

fn batch_stream(conn: OwnedMutexGuard<FrameConnection>, request_id: u64) -> BatchStream {
    stream::unfold(Some(conn), move |state| async move {
        let mut conn = state?;
        match conn.recv(request_id).await {
            Ok(Body::Batch(msg)) => {
                let batch = Batch::try_from(msg).map_err(anyhow::Error::from);
                Some((batch, Some(conn)))
            }
            Ok(Body::Done(_)) => None,
            Ok(Body::Failure(failure)) => {
                Some((Err(anyhow!("store rejected get: {}", failure.message)), None))
            }
            Ok(other) => Some((Err(anyhow!("unexpected reply to get: {:?}", other)), None)),
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed()
}
