//! Provides types representing the broker's protocol frames: the frame
//! itself, its key/value items, and the routing and payload objects it
//! carries.

use crate::codec::CodecError;
use bytes::Bytes;
use core::fmt;
use std::borrow::Cow;

/// Payload object type under which entity blobs travel, dotted `0.0.0.50`.
pub const ENTITY_PO_TYPE: [u8; 4] = [0, 0, 0, 50];

/// A four character ASCII command tag.
///
/// Tags the broker may add in the future still parse; the dispatcher drops
/// inbound frames whose command it does not understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command([u8; 4]);

impl Command {
    pub const PUBLISH: Command = Command(*b"publ");
    pub const PERSIST: Command = Command(*b"pers");
    pub const SUBSCRIBE: Command = Command(*b"subs");
    pub const LIST: Command = Command(*b"list");
    pub const QUERY: Command = Command(*b"quer");
    pub const SET_ENTITY: Command = Command(*b"sete");
    pub const MAKE_ENTITY: Command = Command(*b"make");
    pub const MAKE_DOT: Command = Command(*b"makd");
    pub const MAKE_CHAIN: Command = Command(*b"makc");
    pub const RESPONSE: Command = Command(*b"resp");
    pub const RESULT: Command = Command(*b"rslt");
    pub const HELLO: Command = Command(*b"helo");

    /// Parse a tag from raw header bytes. Must be exactly four ASCII bytes.
    pub fn from_bytes(raw: &[u8]) -> Result<Command, CodecError> {
        let tag: [u8; 4] = raw
            .try_into()
            .map_err(|_| CodecError::InvalidCommand(String::from_utf8_lossy(raw).into_owned()))?;
        if !tag.is_ascii() {
            return Err(CodecError::InvalidCommand(
                String::from_utf8_lossy(raw).into_owned(),
            ));
        }
        Ok(Command(tag))
    }

    pub fn as_str(&self) -> &str {
        // Construction only admits ASCII, which is always valid UTF-8.
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed binary blob the broker uses for routing and authorization
/// decisions. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingObject {
    number: u8,
    content: Bytes,
}

impl RoutingObject {
    pub fn new(number: u8, content: impl Into<Bytes>) -> RoutingObject {
        RoutingObject {
            number,
            content: content.into(),
        }
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }
}

/// A typed binary blob carrying application data. Immutable after
/// construction.
///
/// The type has two equivalent wire forms: a dotted four octet tuple (each
/// octet limited to 0..=254) and a plain number. At least one form must be
/// supplied, and when both are they must agree under big-endian packing of
/// the octets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadObject {
    type_dotted: Option<[u8; 4]>,
    type_num: Option<u32>,
    content: Bytes,
}

impl PayloadObject {
    pub fn new(
        type_dotted: Option<[u8; 4]>,
        type_num: Option<u32>,
        content: impl Into<Bytes>,
    ) -> Result<PayloadObject, CodecError> {
        if type_dotted.is_none() && type_num.is_none() {
            return Err(CodecError::PayloadType(
                "payload object type not specified".to_string(),
            ));
        }
        if let Some(dotted) = type_dotted {
            if dotted.contains(&255) {
                return Err(CodecError::PayloadType(format!(
                    "octet out of range in {}.{}.{}.{}",
                    dotted[0], dotted[1], dotted[2], dotted[3]
                )));
            }
            if let Some(num) = type_num {
                if u32::from_be_bytes(dotted) != num {
                    return Err(CodecError::PayloadType(format!(
                        "dotted form {}.{}.{}.{} does not agree with number {num}",
                        dotted[0], dotted[1], dotted[2], dotted[3]
                    )));
                }
            }
        }
        Ok(PayloadObject {
            type_dotted,
            type_num,
            content: content.into(),
        })
    }

    /// Payload object with only the numeric type form.
    pub fn from_num(type_num: u32, content: impl Into<Bytes>) -> PayloadObject {
        PayloadObject {
            type_dotted: None,
            type_num: Some(type_num),
            content: content.into(),
        }
    }

    /// Payload object with only the dotted type form.
    pub fn from_dotted(
        type_dotted: [u8; 4],
        content: impl Into<Bytes>,
    ) -> Result<PayloadObject, CodecError> {
        PayloadObject::new(Some(type_dotted), None, content)
    }

    /// Entity blob payload object, typed [`ENTITY_PO_TYPE`].
    pub fn entity(content: impl Into<Bytes>) -> PayloadObject {
        PayloadObject {
            type_dotted: Some(ENTITY_PO_TYPE),
            type_num: None,
            content: content.into(),
        }
    }

    pub fn type_dotted(&self) -> Option<[u8; 4]> {
        self.type_dotted
    }

    pub fn type_num(&self) -> Option<u32> {
        self.type_num
    }

    /// The numeric type, derived from the dotted form when only that was
    /// supplied.
    pub fn type_value(&self) -> u32 {
        match (self.type_num, self.type_dotted) {
            (Some(num), _) => num,
            (None, Some(dotted)) => u32::from_be_bytes(dotted),
            (None, None) => 0,
        }
    }

    /// Wire form of the type: dotted part, one colon, numeric part.
    pub(crate) fn type_token(&self) -> String {
        let mut token = String::new();
        if let Some([d0, d1, d2, d3]) = self.type_dotted {
            token.push_str(&format!("{d0}.{d1}.{d2}.{d3}"));
        }
        token.push(':');
        if let Some(num) = self.type_num {
            token.push_str(&num.to_string());
        }
        token
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }
}

/// Unit of protocol exchange with the broker.
///
/// A frame carries a command tag, the sequence number correlating it with a
/// request, and three ordered item lists: key/value pairs (duplicate keys
/// allowed, insertion order preserved), routing objects, and payload
/// objects. Values and object contents are opaque bytes; only keys, tags,
/// and item headers are ASCII.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    command: Command,
    seq_num: u32,
    kv_pairs: Vec<(String, Bytes)>,
    routing_objects: Vec<RoutingObject>,
    payload_objects: Vec<PayloadObject>,
}

impl Frame {
    pub fn new(command: Command, seq_num: u32) -> Frame {
        Frame {
            command,
            seq_num,
            kv_pairs: Vec::new(),
            routing_objects: Vec::new(),
            payload_objects: Vec::new(),
        }
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn seq_num(&self) -> u32 {
        self.seq_num
    }

    pub fn add_kv(&mut self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.kv_pairs.push((key.into(), value.into()));
    }

    pub fn add_routing_object(&mut self, ro: RoutingObject) {
        self.routing_objects.push(ro);
    }

    pub fn add_payload_object(&mut self, po: PayloadObject) {
        self.payload_objects.push(po);
    }

    /// First value recorded under `key`, if any.
    pub fn first_value(&self, key: &str) -> Option<&Bytes> {
        self.kv_pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// First value under `key` as text. Invalid UTF-8 is replaced rather
    /// than rejected; values are not required to be text.
    pub fn first_text(&self, key: &str) -> Option<Cow<'_, str>> {
        self.first_value(key).map(|v| String::from_utf8_lossy(v))
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

    pub(crate) fn into_parts(
        self,
    ) -> (
        Vec<(String, Bytes)>,
        Vec<RoutingObject>,
        Vec<PayloadObject>,
    ) {
        (self.kv_pairs, self.routing_objects, self.payload_objects)
    }
}
