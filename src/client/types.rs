// ABOUTME: Supporting types for broker operations including responses, streamed results, and request options
// ABOUTME: Provides typed request values with builder methods and sensible defaults for each operation

use crate::client::error::{BosswaveError, BosswaveResult};
use crate::frame::{Frame, PayloadObject, RoutingObject};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Terminal record for a single request.
///
/// Carries the broker's status tag and reason text along with the full
/// contents of the `resp` frame, since operations such as make-entity
/// return their artifacts as response payload objects.
#[derive(Debug)]
pub struct Response {
    status: String,
    reason: String,
    kv_pairs: Vec<(String, Bytes)>,
    routing_objects: Vec<RoutingObject>,
    payload_objects: Vec<PayloadObject>,
}

impl Response {
    pub(crate) fn from_frame(frame: Frame) -> Response {
        let status = frame
            .first_text("status")
            .map(Cow::into_owned)
            .unwrap_or_default();
        let reason = frame
            .first_text("reason")
            .map(Cow::into_owned)
            .unwrap_or_default();
        let (kv_pairs, routing_objects, payload_objects) = frame.into_parts();
        Response {
            status,
            reason,
            kv_pairs,
            routing_objects,
            payload_objects,
        }
    }

    /// `true` when the broker reported success. A response without any
    /// status at all counts as a failure.
    pub fn is_okay(&self) -> bool {
        self.status == "okay"
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn kv_pairs(&self) -> &[(String, Bytes)] {
        &self.kv_pairs
    }

    pub fn routing_objects(&self) -> &[RoutingObject] {
        &self.routing_objects
    }

    pub fn payload_objects(&self) -> &[PayloadObject] {
        &self.payload_objects
    }

    /// First value recorded under `key`, if any.
    pub fn first_value(&self, key: &str) -> Option<&Bytes> {
        self.kv_pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// First value under `key` as text, with invalid UTF-8 replaced.
    pub fn first_text(&self, key: &str) -> Option<Cow<'_, str>> {
        self.first_value(key).map(|v| String::from_utf8_lossy(v))
    }
}

/// A streamed, non-terminal record delivered for subscribe and query
/// requests.
#[derive(Debug, Clone)]
pub struct Message {
    pub from: Option<String>,
    pub uri: Option<String>,
    routing_objects: Vec<RoutingObject>,
    payload_objects: Vec<PayloadObject>,
}

impl Message {
    pub(crate) fn from_frame(frame: Frame) -> Message {
        let from = frame.first_text("from").map(Cow::into_owned);
        let uri = frame.first_text("uri").map(Cow::into_owned);
        // The broker echoes the originating request's unpack flag; when it
        // says false the frame's objects are withheld from the caller.
        let unpacked = frame
            .first_text("unpack")
            .is_none_or(|v| !v.eq_ignore_ascii_case("false"));
        let (_, routing_objects, payload_objects) = frame.into_parts();
        if unpacked {
            Message {
                from,
                uri,
                routing_objects,
                payload_objects,
            }
        } else {
            Message {
                from,
                uri,
                routing_objects: Vec::new(),
                payload_objects: Vec::new(),
            }
        }
    }

    pub fn routing_objects(&self) -> &[RoutingObject] {
        &self.routing_objects
    }

    pub fn payload_objects(&self) -> &[PayloadObject] {
        &self.payload_objects
    }
}

/// A streamed result together with the carrying frame's finished flag.
#[derive(Debug)]
pub(crate) struct ResultEvent {
    pub(crate) message: Message,
    pub(crate) finished: bool,
}

/// Awaitable handle for a request's terminal response.
///
/// Returned by the `start_*` operations. Dropping the handle detaches from
/// the response without cancelling the request.
#[derive(Debug)]
pub struct PendingResponse {
    rx: oneshot::Receiver<Response>,
}

impl PendingResponse {
    pub(crate) fn new(rx: oneshot::Receiver<Response>) -> PendingResponse {
        PendingResponse { rx }
    }

    /// Wait for the broker's terminal response.
    pub async fn response(self) -> BosswaveResult<Response> {
        self.rx.await.map_err(|_| BosswaveError::ConnectionClosed)
    }
}

/// Stream of [`Message`] results for a subscribe or query request.
#[derive(Debug)]
pub struct MessageStream {
    rx: mpsc::UnboundedReceiver<ResultEvent>,
}

impl MessageStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<ResultEvent>) -> MessageStream {
        MessageStream { rx }
    }

    /// Next streamed message, or `None` once the stream has terminated.
    pub async fn next(&mut self) -> Option<Message> {
        self.rx.recv().await.map(|event| event.message)
    }

    pub(crate) async fn next_event(&mut self) -> Option<ResultEvent> {
        self.rx.recv().await
    }
}

/// Stream of child URIs for a list request.
#[derive(Debug)]
pub struct ListStream {
    rx: mpsc::UnboundedReceiver<Option<String>>,
}

impl ListStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Option<String>>) -> ListStream {
        ListStream { rx }
    }

    /// Next child URI, or `None` once the listing has ended. A completed
    /// listing and an error teardown both end the stream; the blocking
    /// `list` façade tells them apart through the response.
    pub async fn next(&mut self) -> Option<String> {
        match self.rx.recv().await {
            Some(Some(child)) => Some(child),
            _ => None,
        }
    }

    pub(crate) async fn next_item(&mut self) -> Option<Option<String>> {
        self.rx.recv().await
    }
}

/// How the broker should expand the primary access chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elaborate {
    Full,
    Partial,
}

impl Elaborate {
    pub(crate) fn as_wire(self) -> &'static str {
        match self {
            Elaborate::Full => "full",
            Elaborate::Partial => "partial",
        }
    }
}

impl From<&str> for Elaborate {
    /// Case-insensitive `"full"`; anything else elaborates partially.
    fn from(value: &str) -> Elaborate {
        if value.eq_ignore_ascii_case("full") {
            Elaborate::Full
        } else {
            Elaborate::Partial
        }
    }
}

/// Options shared by the operations that ride on an access chain.
#[derive(Debug, Clone, Default)]
pub(crate) struct ChainOptions {
    pub(crate) primary_access_chain: Option<String>,
    pub(crate) expiry: Option<DateTime<Utc>>,
    pub(crate) expiry_delta: Option<Duration>,
    pub(crate) elaborate_pac: Option<Elaborate>,
    pub(crate) auto_chain: bool,
}

/// Publish (or persist) payload objects to a URI.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub(crate) uri: String,
    pub(crate) persist: bool,
    pub(crate) chain: ChainOptions,
    pub(crate) routing_objects: Vec<RoutingObject>,
    pub(crate) payload_objects: Vec<PayloadObject>,
}

impl PublishRequest {
    pub fn new(uri: impl Into<String>) -> PublishRequest {
        PublishRequest {
            uri: uri.into(),
            persist: false,
            chain: ChainOptions::default(),
            routing_objects: Vec::new(),
            payload_objects: Vec::new(),
        }
    }

    /// Ask the broker to retain the message for future queriers.
    pub fn persist(mut self) -> Self {
        self.persist = true;
        self
    }

    pub fn with_primary_access_chain(mut self, pac: impl Into<String>) -> Self {
        self.chain.primary_access_chain = Some(pac.into());
        self
    }

    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.chain.expiry = Some(expiry);
        self
    }

    pub fn with_expiry_delta(mut self, delta: Duration) -> Self {
        self.chain.expiry_delta = Some(delta);
        self
    }

    pub fn with_elaborate_pac(mut self, elaborate: impl Into<Elaborate>) -> Self {
        self.chain.elaborate_pac = Some(elaborate.into());
        self
    }

    /// Let the broker build the access chain itself.
    pub fn with_auto_chain(mut self) -> Self {
        self.chain.auto_chain = true;
        self
    }

    pub fn with_routing_object(mut self, ro: RoutingObject) -> Self {
        self.routing_objects.push(ro);
        self
    }

    pub fn with_payload_object(mut self, po: PayloadObject) -> Self {
        self.payload_objects.push(po);
        self
    }
}

/// Subscribe to messages published under a URI pattern.
#[derive(Debug, Clone)]
pub struct SubscribeRequest {
    pub(crate) uri: String,
    pub(crate) unpack: bool,
    pub(crate) chain: ChainOptions,
    pub(crate) routing_objects: Vec<RoutingObject>,
}

impl SubscribeRequest {
    pub fn new(uri: impl Into<String>) -> SubscribeRequest {
        SubscribeRequest {
            uri: uri.into(),
            unpack: true,
            chain: ChainOptions::default(),
            routing_objects: Vec::new(),
        }
    }

    /// Whether streamed results should carry the frames' routing and
    /// payload objects. Defaults to true.
    pub fn with_unpack(mut self, unpack: bool) -> Self {
        self.unpack = unpack;
        self
    }

    pub fn with_primary_access_chain(mut self, pac: impl Into<String>) -> Self {
        self.chain.primary_access_chain = Some(pac.into());
        self
    }

    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.chain.expiry = Some(expiry);
        self
    }

    pub fn with_expiry_delta(mut self, delta: Duration) -> Self {
        self.chain.expiry_delta = Some(delta);
        self
    }

    pub fn with_elaborate_pac(mut self, elaborate: impl Into<Elaborate>) -> Self {
        self.chain.elaborate_pac = Some(elaborate.into());
        self
    }

    pub fn with_auto_chain(mut self) -> Self {
        self.chain.auto_chain = true;
        self
    }

    pub fn with_routing_object(mut self, ro: RoutingObject) -> Self {
        self.routing_objects.push(ro);
        self
    }
}

/// List the immediate children persisted under a URI.
#[derive(Debug, Clone)]
pub struct ListRequest {
    pub(crate) uri: String,
    pub(crate) chain: ChainOptions,
    pub(crate) routing_objects: Vec<RoutingObject>,
}

impl ListRequest {
    pub fn new(uri: impl Into<String>) -> ListRequest {
        ListRequest {
            uri: uri.into(),
            chain: ChainOptions::default(),
            routing_objects: Vec::new(),
        }
    }

    pub fn with_primary_access_chain(mut self, pac: impl Into<String>) -> Self {
        self.chain.primary_access_chain = Some(pac.into());
        self
    }

    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.chain.expiry = Some(expiry);
        self
    }

    pub fn with_expiry_delta(mut self, delta: Duration) -> Self {
        self.chain.expiry_delta = Some(delta);
        self
    }

    pub fn with_elaborate_pac(mut self, elaborate: impl Into<Elaborate>) -> Self {
        self.chain.elaborate_pac = Some(elaborate.into());
        self
    }

    pub fn with_auto_chain(mut self) -> Self {
        self.chain.auto_chain = true;
        self
    }

    pub fn with_routing_object(mut self, ro: RoutingObject) -> Self {
        self.routing_objects.push(ro);
        self
    }
}

/// Query messages persisted under a URI pattern.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub(crate) uri: String,
    pub(crate) unpack: bool,
    pub(crate) chain: ChainOptions,
    pub(crate) routing_objects: Vec<RoutingObject>,
}

impl QueryRequest {
    pub fn new(uri: impl Into<String>) -> QueryRequest {
        QueryRequest {
            uri: uri.into(),
            unpack: true,
            chain: ChainOptions::default(),
            routing_objects: Vec::new(),
        }
    }

    /// Whether streamed results should carry the frames' routing and
    /// payload objects. Defaults to true.
    pub fn with_unpack(mut self, unpack: bool) -> Self {
        self.unpack = unpack;
        self
    }

    pub fn with_primary_access_chain(mut self, pac: impl Into<String>) -> Self {
        self.chain.primary_access_chain = Some(pac.into());
        self
    }

    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.chain.expiry = Some(expiry);
        self
    }

    pub fn with_expiry_delta(mut self, delta: Duration) -> Self {
        self.chain.expiry_delta = Some(delta);
        self
    }

    pub fn with_elaborate_pac(mut self, elaborate: impl Into<Elaborate>) -> Self {
        self.chain.elaborate_pac = Some(elaborate.into());
        self
    }

    pub fn with_auto_chain(mut self) -> Self {
        self.chain.auto_chain = true;
        self
    }

    pub fn with_routing_object(mut self, ro: RoutingObject) -> Self {
        self.routing_objects.push(ro);
        self
    }
}

/// Ask the broker to mint a new entity.
#[derive(Debug, Clone, Default)]
pub struct MakeEntityRequest {
    pub(crate) contact: Option<String>,
    pub(crate) comment: Option<String>,
    pub(crate) expiry: Option<DateTime<Utc>>,
    pub(crate) expiry_delta: Option<Duration>,
    pub(crate) revokers: Vec<String>,
    pub(crate) omit_creation_date: bool,
}

impl MakeEntityRequest {
    pub fn new() -> MakeEntityRequest {
        MakeEntityRequest::default()
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn with_expiry_delta(mut self, delta: Duration) -> Self {
        self.expiry_delta = Some(delta);
        self
    }

    /// Add an entity allowed to revoke this one. Repeatable; order is
    /// preserved on the wire.
    pub fn with_revoker(mut self, revoker: impl Into<String>) -> Self {
        self.revokers.push(revoker.into());
        self
    }

    pub fn omit_creation_date(mut self) -> Self {
        self.omit_creation_date = true;
        self
    }
}

/// Ask the broker to mint a declaration of trust from the current entity
/// to another.
#[derive(Debug, Clone)]
pub struct MakeDotRequest {
    pub(crate) to: String,
    pub(crate) uri: String,
    pub(crate) ttl: Option<u32>,
    pub(crate) is_permission: bool,
    pub(crate) contact: Option<String>,
    pub(crate) comment: Option<String>,
    pub(crate) expiry: Option<DateTime<Utc>>,
    pub(crate) expiry_delta: Option<Duration>,
    pub(crate) revokers: Vec<String>,
    pub(crate) omit_creation_date: bool,
    pub(crate) access_permissions: Option<String>,
}

impl MakeDotRequest {
    /// A delegation to the entity `to` (its verifying key) over `uri`.
    pub fn new(to: impl Into<String>, uri: impl Into<String>) -> MakeDotRequest {
        MakeDotRequest {
            to: to.into(),
            uri: uri.into(),
            ttl: None,
            is_permission: false,
            contact: None,
            comment: None,
            expiry: None,
            expiry_delta: None,
            revokers: Vec::new(),
            omit_creation_date: false,
            access_permissions: None,
        }
    }

    /// How many further hops the delegation may be re-delegated.
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Mark this as a permission DOT rather than an access DOT.
    pub fn permission(mut self) -> Self {
        self.is_permission = true;
        self
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn with_expiry_delta(mut self, delta: Duration) -> Self {
        self.expiry_delta = Some(delta);
        self
    }

    pub fn with_revoker(mut self, revoker: impl Into<String>) -> Self {
        self.revokers.push(revoker.into());
        self
    }

    pub fn omit_creation_date(mut self) -> Self {
        self.omit_creation_date = true;
        self
    }

    /// Access permission string, e.g. `"PC"` for publish and consume.
    pub fn with_access_permissions(mut self, permissions: impl Into<String>) -> Self {
        self.access_permissions = Some(permissions.into());
        self
    }
}

/// Ask the broker to compose DOTs into a permission chain.
#[derive(Debug, Clone, Default)]
pub struct MakeChainRequest {
    pub(crate) is_permission: bool,
    pub(crate) unelaborate: bool,
    pub(crate) dots: Vec<String>,
}

impl MakeChainRequest {
    pub fn new() -> MakeChainRequest {
        MakeChainRequest::default()
    }

    /// Mark this as a permission chain rather than an access chain.
    pub fn permission(mut self) -> Self {
        self.is_permission = true;
        self
    }

    /// Return the chain as a hash reference instead of its full DOTs.
    pub fn unelaborate(mut self) -> Self {
        self.unelaborate = true;
        self
    }

    /// Add a DOT hash to the chain. Repeatable; order is preserved.
    pub fn with_dot(mut self, dot: impl Into<String>) -> Self {
        self.dots.push(dot.into());
        self
    }
}
