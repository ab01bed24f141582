// Wire codec for the broker's line-oriented frame protocol.
//
// A frame is a header line, zero or more item blocks, and a terminating
// `end` line; every line ends with a single `\n`. Item bodies are
// length-delimited opaque bytes followed by one discarded terminator byte.
// Parsing operates on a cursor over buffered data and reports `Incomplete`
// when more bytes are needed, so the transport can retry once the socket
// delivers the rest.

use crate::frame::{Command, Frame, PayloadObject, RoutingObject};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use thiserror::Error;

/// Codec errors.
///
/// `Incomplete` is an expected runtime condition during buffered reads.
/// Every other variant is fatal for the connection: frames are
/// length-delimited per item but not as a whole, so a reader cannot
/// resynchronize mid-stream.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("incomplete frame: need more data")]
    Incomplete,

    #[error("invalid frame header: {0:?}")]
    InvalidHeader(String),

    #[error("invalid command tag: {0:?}")]
    InvalidCommand(String),

    #[error("negative length: {0}")]
    NegativeLength(i64),

    #[error("invalid item header: {0:?}")]
    InvalidItemHeader(String),

    #[error("invalid payload object type: {0}")]
    PayloadType(String),
}

impl Frame {
    /// Parse one frame from `src`, leaving the cursor just past it.
    ///
    /// Returns `Incomplete` when the buffer does not yet hold the whole
    /// frame; the cursor position is unspecified on any error.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Frame, CodecError> {
        let header = get_line(src)?;
        let (cmd, length, seq) =
            split3(header).ok_or_else(|| CodecError::InvalidHeader(lossy(header)))?;
        let command = Command::from_bytes(cmd)?;

        // The declared frame length is a sender artifact; accept any
        // non-negative value and discard it.
        let declared = parse_i64(length).ok_or_else(|| CodecError::InvalidHeader(lossy(header)))?;
        if declared < 0 {
            return Err(CodecError::NegativeLength(declared));
        }
        let seq_num = parse_u32(seq).ok_or_else(|| CodecError::InvalidHeader(lossy(header)))?;

        let mut frame = Frame::new(command, seq_num);
        loop {
            let line = get_line(src)?;
            if line == b"end" {
                return Ok(frame);
            }
            let (kind, field, len_field) =
                split3(line).ok_or_else(|| CodecError::InvalidItemHeader(lossy(line)))?;
            let body_len =
                parse_i64(len_field).ok_or_else(|| CodecError::InvalidItemHeader(lossy(line)))?;
            if body_len < 0 {
                return Err(CodecError::NegativeLength(body_len));
            }
            let body = get_body(src, body_len as usize)?;
            match kind {
                b"kv" => {
                    let key = ascii_token(field)
                        .ok_or_else(|| CodecError::InvalidItemHeader(lossy(line)))?;
                    frame.add_kv(key, body);
                }
                b"ro" => {
                    let number = parse_u8(field)
                        .ok_or_else(|| CodecError::InvalidItemHeader(lossy(line)))?;
                    frame.add_routing_object(RoutingObject::new(number, body));
                }
                b"po" => {
                    let (dotted, num) = parse_po_type(field)?;
                    frame.add_payload_object(PayloadObject::new(dotted, num, body)?);
                }
                _ => return Err(CodecError::InvalidItemHeader(lossy(line))),
            }
        }
    }

    /// Encode the frame into `buf` as one contiguous byte sequence.
    ///
    /// The frame length field is written as the literal zero placeholder;
    /// receivers ignore it. Item lengths are exact body byte counts and
    /// bodies go out verbatim, no escaping.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(self.command().as_str().as_bytes());
        buf.put_slice(format!(" 0000000000 {:010}\n", self.seq_num()).as_bytes());
        for (key, value) in self.kv_pairs() {
            buf.put_slice(format!("kv {} {}\n", key, value.len()).as_bytes());
            buf.put_slice(value);
            buf.put_u8(b'\n');
        }
        for ro in self.routing_objects() {
            buf.put_slice(format!("ro {} {}\n", ro.number(), ro.content().len()).as_bytes());
            buf.put_slice(ro.content());
            buf.put_u8(b'\n');
        }
        for po in self.payload_objects() {
            buf.put_slice(format!("po {} {}\n", po.type_token(), po.content().len()).as_bytes());
            buf.put_slice(po.content());
            buf.put_u8(b'\n');
        }
        buf.put_slice(b"end\n");
    }

    /// Encoded frame as a frozen byte buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}

/// Read one `\n`-terminated line, excluding the terminator.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], CodecError> {
    let start = src.position() as usize;
    let end = src.get_ref().len();
    for i in start..end {
        if src.get_ref()[i] == b'\n' {
            src.set_position((i + 1) as u64);
            return Ok(&src.get_ref()[start..i]);
        }
    }
    Err(CodecError::Incomplete)
}

/// Read `len` body bytes plus the single terminator byte that follows the
/// body; the terminator is consumed and discarded.
fn get_body(src: &mut Cursor<&[u8]>, len: usize) -> Result<Bytes, CodecError> {
    if src.remaining() <= len {
        return Err(CodecError::Incomplete);
    }
    let start = src.position() as usize;
    let body = Bytes::copy_from_slice(&src.get_ref()[start..start + len]);
    src.advance(len + 1);
    Ok(body)
}

/// Split a header line on single spaces into exactly three fields.
/// Consecutive spaces produce empty fields and therefore fail the count.
fn split3(line: &[u8]) -> Option<(&[u8], &[u8], &[u8])> {
    let mut fields = line.split(|&b| b == b' ');
    match (fields.next(), fields.next(), fields.next(), fields.next()) {
        (Some(a), Some(b), Some(c), None) => Some((a, b, c)),
        _ => None,
    }
}

fn parse_i64(field: &[u8]) -> Option<i64> {
    std::str::from_utf8(field).ok()?.parse().ok()
}

fn parse_u32(field: &[u8]) -> Option<u32> {
    std::str::from_utf8(field).ok()?.parse().ok()
}

fn parse_u8(field: &[u8]) -> Option<u8> {
    std::str::from_utf8(field).ok()?.parse().ok()
}

fn ascii_token(field: &[u8]) -> Option<String> {
    std::str::from_utf8(field)
        .ok()
        .filter(|s| !s.is_empty() && s.is_ascii())
        .map(str::to_owned)
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Parse a payload object type token: `:N`, `d0.d1.d2.d3:`, or both forms
/// joined by the single colon. Agreement between the forms is checked by
/// `PayloadObject` construction.
fn parse_po_type(field: &[u8]) -> Result<(Option<[u8; 4]>, Option<u32>), CodecError> {
    let text =
        std::str::from_utf8(field).map_err(|_| CodecError::PayloadType(lossy(field)))?;
    let mut parts = text.split(':');
    let (dotted_part, num_part) = match (parts.next(), parts.next(), parts.next()) {
        (Some(dotted), Some(num), None) => (dotted, num),
        _ => return Err(CodecError::PayloadType(text.to_string())),
    };

    let dotted = if dotted_part.is_empty() {
        None
    } else {
        let mut octets = [0u8; 4];
        let mut pieces = dotted_part.split('.');
        for slot in &mut octets {
            *slot = pieces
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| CodecError::PayloadType(text.to_string()))?;
        }
        if pieces.next().is_some() {
            return Err(CodecError::PayloadType(text.to_string()));
        }
        Some(octets)
    };

    let num = if num_part.is_empty() {
        None
    } else {
        Some(
            num_part
                .parse()
                .map_err(|_| CodecError::PayloadType(text.to_string()))?,
        )
    };

    if dotted.is_none() && num.is_none() {
        return Err(CodecError::PayloadType(text.to_string()));
    }
    Ok((dotted, num))
}
