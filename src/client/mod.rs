// ABOUTME: Broker client module wiring the correlator, transport, and typed request API
// ABOUTME: Exports the client, its error types, request values, and streaming handles

//! Broker client.
//!
//! This module provides the request/response layer over the frame transport:
//!
//! * **Single multiplexed connection** - one socket, one background reader,
//!   any number of concurrent requests correlated by sequence number
//! * **Dual façade** - `start_*` methods return awaitable handles
//!   immediately; the plain methods drive a request to completion
//! * **Typed requests** - one request value per broker operation, with
//!   builder methods for the optional knobs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bosswave::client::{BosswaveClient, PublishRequest, SubscribeRequest};
//! use bosswave::frame::PayloadObject;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = BosswaveClient::connect("localhost:28589").await?;
//! client.set_entity_from_file("my.key").await?;
//!
//! let mut sub = client
//!     .subscribe(&SubscribeRequest::new("castle/keep/+").with_auto_chain())
//!     .await?;
//!
//! let request = PublishRequest::new("castle/keep/door")
//!     .with_auto_chain()
//!     .with_payload_object(PayloadObject::from_num(64, &b"open"[..]));
//! client.publish(&request).await?;
//!
//! if let Some(message) = sub.next().await {
//!     println!("{:?} -> {} objects", message.uri, message.payload_objects().len());
//! }
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod default;
pub mod error;
pub mod types;

pub(crate) mod request;
pub(crate) mod router;

pub use default::BosswaveClient;
pub use error::{BosswaveError, BosswaveResult};
pub use types::{
    Elaborate, ListRequest, ListStream, MakeChainRequest, MakeDotRequest, MakeEntityRequest,
    Message, MessageStream, PendingResponse, PublishRequest, QueryRequest, Response,
    SubscribeRequest,
};
