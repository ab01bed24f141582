// ABOUTME: Default broker client owning the socket, the reader task, and the correlator
// ABOUTME: Exposes started (handle-returning) and completing forms of every broker operation

use crate::client::error::{BosswaveError, BosswaveResult};
use crate::client::request::set_entity_frame;
use crate::client::router::Router;
use crate::client::types::{
    ListRequest, ListStream, MakeChainRequest, MakeDotRequest, MakeEntityRequest, Message,
    MessageStream, PendingResponse, PublishRequest, QueryRequest, Response, SubscribeRequest,
};
use crate::connection::{FrameReader, FrameWriter};
use crate::frame::{Command, Frame, PayloadObject, RoutingObject};
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Established connection with a broker agent.
///
/// Owns the socket, the pending request tables, and the background reader
/// task. All operations take `&self`: outbound frames are serialized by the
/// writer lock and inbound dispatch is serialized by the single reader.
///
/// Every operation has two forms. The `start_*` form registers the request,
/// writes the frame, and returns immediately with awaitable handles; the
/// plain form drives those handles to completion and translates a non-okay
/// response into [`BosswaveError::RequestFailed`].
#[derive(Debug)]
pub struct BosswaveClient {
    writer: Mutex<FrameWriter>,
    router: Arc<Router>,
    reader_handle: JoinHandle<()>,
    closed: AtomicBool,
}

impl BosswaveClient {
    /// Connect to the broker agent at `addr`.
    ///
    /// The broker must greet with a `helo` frame before anything else; the
    /// greeting is read on the connecting task and the background reader
    /// starts only once it has been validated.
    pub async fn connect(addr: impl ToSocketAddrs) -> BosswaveResult<BosswaveClient> {
        let socket = TcpStream::connect(addr).await?;
        let (read_half, write_half) = socket.into_split();
        let mut reader = FrameReader::new(read_half);

        let greeting = reader
            .read_frame()
            .await
            .map_err(BosswaveError::from)?
            .ok_or(BosswaveError::ConnectionClosed)?;
        if greeting.command() != Command::HELLO {
            return Err(BosswaveError::Handshake(greeting.command().to_string()));
        }
        tracing::debug!("broker greeting accepted");

        let router = Arc::new(Router::new());
        let reader_handle = tokio::spawn(read_loop(reader, Arc::clone(&router)));

        Ok(BosswaveClient {
            writer: Mutex::new(FrameWriter::new(write_half)),
            router,
            reader_handle,
            closed: AtomicBool::new(false),
        })
    }

    /// Tear down the connection. Pending waiters are released with a
    /// connection-closed failure; closing twice is a no-op.
    pub async fn close(&self) -> BosswaveResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.reader_handle.abort();
        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.shutdown().await {
                tracing::debug!(error = %e, "error shutting down socket");
            }
        }
        self.router.fail_all();
        Ok(())
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Write `frame` under the write lock. Registration has already
    /// happened, so a failed write must release the request's table slots.
    async fn send_frame(&self, seq_num: u32, frame: &Frame) -> BosswaveResult<()> {
        if self.is_closed() {
            self.router.deregister(seq_num);
            return Err(BosswaveError::ConnectionClosed);
        }
        let written = {
            let mut writer = self.writer.lock().await;
            writer.write_frame(frame).await
        };
        if let Err(e) = written {
            self.router.deregister(seq_num);
            return Err(BosswaveError::Connection(e));
        }
        Ok(())
    }

    /// Issue a publish (or persist) without waiting for the outcome.
    pub async fn start_publish(&self, request: &PublishRequest) -> BosswaveResult<PendingResponse> {
        let (seq_num, rx) = self.router.register_response();
        self.send_frame(seq_num, &request.to_frame(seq_num)).await?;
        Ok(PendingResponse::new(rx))
    }

    /// Publish and wait for the broker's verdict.
    pub async fn publish(&self, request: &PublishRequest) -> BosswaveResult<()> {
        let response = self.start_publish(request).await?.response().await?;
        okay_or_failed(response).map(|_| ())
    }

    /// Issue a subscribe without waiting for acceptance.
    pub async fn start_subscribe(
        &self,
        request: &SubscribeRequest,
    ) -> BosswaveResult<(PendingResponse, MessageStream)> {
        let (seq_num, rx, results) = self.router.register_streaming();
        self.send_frame(seq_num, &request.to_frame(seq_num)).await?;
        Ok((PendingResponse::new(rx), MessageStream::new(results)))
    }

    /// Subscribe and wait for the broker to accept; matching messages then
    /// arrive on the returned stream.
    pub async fn subscribe(&self, request: &SubscribeRequest) -> BosswaveResult<MessageStream> {
        let (pending, stream) = self.start_subscribe(request).await?;
        okay_or_failed(pending.response().await?)?;
        Ok(stream)
    }

    /// Issue a list without waiting for any children.
    pub async fn start_list(
        &self,
        request: &ListRequest,
    ) -> BosswaveResult<(PendingResponse, ListStream)> {
        let (seq_num, rx, children) = self.router.register_list();
        self.send_frame(seq_num, &request.to_frame(seq_num)).await?;
        Ok((PendingResponse::new(rx), ListStream::new(children)))
    }

    /// List the immediate children of a URI, accumulated in arrival order.
    pub async fn list(&self, request: &ListRequest) -> BosswaveResult<Vec<String>> {
        let (pending, mut stream) = self.start_list(request).await?;
        let mut children = Vec::new();
        loop {
            match stream.next_item().await {
                Some(Some(child)) => children.push(child),
                Some(None) => return Ok(children),
                None => return Err(stream_failure(pending).await),
            }
        }
    }

    /// Issue a query without waiting for any results.
    pub async fn start_query(
        &self,
        request: &QueryRequest,
    ) -> BosswaveResult<(PendingResponse, MessageStream)> {
        let (seq_num, rx, results) = self.router.register_streaming();
        self.send_frame(seq_num, &request.to_frame(seq_num)).await?;
        Ok((PendingResponse::new(rx), MessageStream::new(results)))
    }

    /// Query persisted messages, accumulated in arrival order up to the
    /// finishing result.
    pub async fn query(&self, request: &QueryRequest) -> BosswaveResult<Vec<Message>> {
        let (pending, mut stream) = self.start_query(request).await?;
        let mut results = Vec::new();
        loop {
            match stream.next_event().await {
                Some(event) if event.finished => return Ok(results),
                Some(event) => results.push(event.message),
                None => return Err(stream_failure(pending).await),
            }
        }
    }

    /// Install `entity` as this connection's acting entity, without waiting.
    pub async fn start_set_entity(
        &self,
        entity: impl Into<Bytes>,
    ) -> BosswaveResult<PendingResponse> {
        let (seq_num, rx) = self.router.register_response();
        self.send_frame(seq_num, &set_entity_frame(seq_num, entity.into()))
            .await?;
        Ok(PendingResponse::new(rx))
    }

    /// Install `entity` as this connection's acting entity. Returns the
    /// entity's verifying key.
    pub async fn set_entity(&self, entity: impl Into<Bytes>) -> BosswaveResult<String> {
        let response = self.start_set_entity(entity).await?.response().await?;
        let response = okay_or_failed(response)?;
        require_text(&response, "vk")
    }

    /// Read an entity key file, discard the single leading format marker
    /// byte, and install the remainder as the acting entity.
    pub async fn set_entity_from_file(&self, path: impl AsRef<Path>) -> BosswaveResult<String> {
        let contents = tokio::fs::read(path).await?;
        if contents.is_empty() {
            return Err(BosswaveError::InvalidData(
                "entity key file is empty".to_string(),
            ));
        }
        self.set_entity(Bytes::from(contents).slice(1..)).await
    }

    /// Ask the broker to mint a new entity, without waiting.
    pub async fn start_make_entity(
        &self,
        request: &MakeEntityRequest,
    ) -> BosswaveResult<PendingResponse> {
        let (seq_num, rx) = self.router.register_response();
        self.send_frame(seq_num, &request.to_frame(seq_num)).await?;
        Ok(PendingResponse::new(rx))
    }

    /// Mint a new entity. Returns the verifying key and the raw entity
    /// blob, which arrives as the response's single payload object.
    pub async fn make_entity(&self, request: &MakeEntityRequest) -> BosswaveResult<(String, Bytes)> {
        let response = okay_or_failed(self.start_make_entity(request).await?.response().await?)?;
        let po = single_payload_object(&response)?;
        let vk = require_text(&response, "vk")?;
        Ok((vk, po.content().clone()))
    }

    /// Ask the broker to mint a declaration of trust, without waiting.
    pub async fn start_make_dot(
        &self,
        request: &MakeDotRequest,
    ) -> BosswaveResult<PendingResponse> {
        let (seq_num, rx) = self.router.register_response();
        self.send_frame(seq_num, &request.to_frame(seq_num)).await?;
        Ok(PendingResponse::new(rx))
    }

    /// Mint a declaration of trust. Returns its hash and the raw DOT blob,
    /// which arrives as the response's single payload object.
    pub async fn make_dot(&self, request: &MakeDotRequest) -> BosswaveResult<(String, Bytes)> {
        let response = okay_or_failed(self.start_make_dot(request).await?.response().await?)?;
        let po = single_payload_object(&response)?;
        let hash = require_text(&response, "hash")?;
        Ok((hash, po.content().clone()))
    }

    /// Ask the broker to compose a permission chain, without waiting.
    pub async fn start_make_chain(
        &self,
        request: &MakeChainRequest,
    ) -> BosswaveResult<PendingResponse> {
        let (seq_num, rx) = self.router.register_response();
        self.send_frame(seq_num, &request.to_frame(seq_num)).await?;
        Ok(PendingResponse::new(rx))
    }

    /// Compose a permission chain. Returns its hash and the chain itself,
    /// which arrives as the response's single routing object.
    pub async fn make_chain(
        &self,
        request: &MakeChainRequest,
    ) -> BosswaveResult<(String, RoutingObject)> {
        let response = okay_or_failed(self.start_make_chain(request).await?.response().await?)?;
        let ro = single_routing_object(&response)?.clone();
        let hash = require_text(&response, "hash")?;
        Ok((hash, ro))
    }
}

/// Reader task: the only reader of the socket. Routes every inbound frame,
/// then releases all pending requests once the stream ends.
async fn read_loop(mut reader: FrameReader, router: Arc<Router>) {
    loop {
        match reader.read_frame().await {
            Ok(Some(frame)) => router.dispatch(frame),
            Ok(None) => {
                tracing::debug!("broker closed the connection");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "reader shutting down");
                break;
            }
        }
    }
    router.fail_all();
}

fn okay_or_failed(response: Response) -> BosswaveResult<Response> {
    if response.is_okay() {
        Ok(response)
    } else {
        Err(BosswaveError::RequestFailed(response.reason().to_string()))
    }
}

/// A stream that closed without its completion sentinel was torn down by an
/// error response or by connection loss; recover which from the response.
async fn stream_failure(pending: PendingResponse) -> BosswaveError {
    match pending.response().await {
        Ok(response) if !response.is_okay() => {
            BosswaveError::RequestFailed(response.reason().to_string())
        }
        Ok(_) => BosswaveError::ConnectionClosed,
        Err(e) => e,
    }
}

fn single_payload_object(response: &Response) -> BosswaveResult<&PayloadObject> {
    match response.payload_objects() {
        [po] => Ok(po),
        _ => Err(BosswaveError::ResponseShape(
            "Too few payload objects in response".to_string(),
        )),
    }
}

fn single_routing_object(response: &Response) -> BosswaveResult<&RoutingObject> {
    match response.routing_objects() {
        [ro] => Ok(ro),
        _ => Err(BosswaveError::ResponseShape(
            "Too few routing objects in response".to_string(),
        )),
    }
}

fn require_text(response: &Response, key: &str) -> BosswaveResult<String> {
    response
        .first_text(key)
        .map(|value| value.into_owned())
        .ok_or_else(|| BosswaveError::ResponseShape(format!("response carries no {key}")))
}
