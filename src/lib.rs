//! Client library for a BOSSWAVE-style publish/subscribe broker.
//!
//! The broker speaks a line-oriented framing protocol over TCP; this crate
//! implements the wire codec, the frame transport, and a multiplexing
//! client that correlates responses and streamed results with their
//! requests by sequence number. The broker itself performs all
//! cryptography; the client only ships bytes.

pub mod client;
pub mod codec;
pub mod connection;
pub mod frame;


// Re-export codec and frame types for direct access
pub use codec::CodecError;
pub use frame::{Command, ENTITY_PO_TYPE, Frame, PayloadObject, RoutingObject};

// Re-export the main client API for easy access
pub use client::{
    BosswaveClient, BosswaveError, BosswaveResult, Elaborate, ListRequest, ListStream,
    MakeChainRequest, MakeDotRequest, MakeEntityRequest, Message, MessageStream, PendingResponse,
    PublishRequest, QueryRequest, Response, SubscribeRequest,
};

/// Error returned by the transport layer.
///
/// The frame reader surfaces both I/O errors and codec errors; a boxed
/// `std::error::Error` keeps that boundary simple, and the client layer
/// downcasts it into [`BosswaveError`]. `CodecError::Incomplete` is handled
/// inside the transport during normal execution when a partial frame is
/// buffered, so it never crosses this boundary.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for transport operations.
pub type Result<T> = std::result::Result<T, Error>;
