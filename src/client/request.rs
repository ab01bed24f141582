// ABOUTME: Converts typed request values into outbound wire frames
// ABOUTME: Applies the option normalization rules shared by every broker operation

use crate::client::types::{
    ChainOptions, ListRequest, MakeChainRequest, MakeDotRequest, MakeEntityRequest,
    PublishRequest, QueryRequest, SubscribeRequest,
};
use crate::frame::{Command, Frame, PayloadObject};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Wire form of an absolute expiry: RFC 3339, UTC, second precision,
/// literal trailing `Z`.
fn rfc3339_utc(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Wire form of a relative expiry: integer milliseconds with an `ms`
/// suffix, no whitespace.
fn delta_ms(delta: &Duration) -> String {
    format!("{}ms", delta.as_millis())
}

fn bool_kv(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

impl ChainOptions {
    fn append_to(&self, frame: &mut Frame) {
        if let Some(pac) = &self.primary_access_chain {
            frame.add_kv("primary_access_chain", pac.clone());
        }
        if let Some(expiry) = &self.expiry {
            frame.add_kv("expiry", rfc3339_utc(expiry));
        }
        if let Some(delta) = &self.expiry_delta {
            frame.add_kv("expirydelta", delta_ms(delta));
        }
        if let Some(elaborate) = self.elaborate_pac {
            frame.add_kv("elaborate_pac", elaborate.as_wire());
        }
        if self.auto_chain {
            frame.add_kv("autochain", "true");
        }
    }
}

impl PublishRequest {
    pub(crate) fn to_frame(&self, seq_num: u32) -> Frame {
        let command = if self.persist {
            Command::PERSIST
        } else {
            Command::PUBLISH
        };
        let mut frame = Frame::new(command, seq_num);
        frame.add_kv("uri", self.uri.clone());
        self.chain.append_to(&mut frame);
        for ro in &self.routing_objects {
            frame.add_routing_object(ro.clone());
        }
        for po in &self.payload_objects {
            frame.add_payload_object(po.clone());
        }
        frame
    }
}

impl SubscribeRequest {
    pub(crate) fn to_frame(&self, seq_num: u32) -> Frame {
        let mut frame = Frame::new(Command::SUBSCRIBE, seq_num);
        frame.add_kv("uri", self.uri.clone());
        self.chain.append_to(&mut frame);
        frame.add_kv("unpack", bool_kv(self.unpack));
        for ro in &self.routing_objects {
            frame.add_routing_object(ro.clone());
        }
        frame
    }
}

impl ListRequest {
    pub(crate) fn to_frame(&self, seq_num: u32) -> Frame {
        let mut frame = Frame::new(Command::LIST, seq_num);
        frame.add_kv("uri", self.uri.clone());
        self.chain.append_to(&mut frame);
        for ro in &self.routing_objects {
            frame.add_routing_object(ro.clone());
        }
        frame
    }
}

impl QueryRequest {
    pub(crate) fn to_frame(&self, seq_num: u32) -> Frame {
        let mut frame = Frame::new(Command::QUERY, seq_num);
        frame.add_kv("uri", self.uri.clone());
        self.chain.append_to(&mut frame);
        frame.add_kv("unpack", bool_kv(self.unpack));
        for ro in &self.routing_objects {
            frame.add_routing_object(ro.clone());
        }
        frame
    }
}

impl MakeEntityRequest {
    pub(crate) fn to_frame(&self, seq_num: u32) -> Frame {
        let mut frame = Frame::new(Command::MAKE_ENTITY, seq_num);
        if let Some(contact) = &self.contact {
            frame.add_kv("contact", contact.clone());
        }
        if let Some(comment) = &self.comment {
            frame.add_kv("comment", comment.clone());
        }
        if let Some(expiry) = &self.expiry {
            frame.add_kv("expiry", rfc3339_utc(expiry));
        }
        if let Some(delta) = &self.expiry_delta {
            frame.add_kv("expirydelta", delta_ms(delta));
        }
        for revoker in &self.revokers {
            frame.add_kv("revoker", revoker.clone());
        }
        frame.add_kv("omitcreationdate", bool_kv(self.omit_creation_date));
        frame
    }
}

impl MakeDotRequest {
    pub(crate) fn to_frame(&self, seq_num: u32) -> Frame {
        let mut frame = Frame::new(Command::MAKE_DOT, seq_num);
        frame.add_kv("to", self.to.clone());
        frame.add_kv("uri", self.uri.clone());
        if let Some(ttl) = self.ttl {
            frame.add_kv("ttl", ttl.to_string());
        }
        if self.is_permission {
            frame.add_kv("ispermission", "true");
        }
        if let Some(contact) = &self.contact {
            frame.add_kv("contact", contact.clone());
        }
        if let Some(comment) = &self.comment {
            frame.add_kv("comment", comment.clone());
        }
        if let Some(expiry) = &self.expiry {
            frame.add_kv("expiry", rfc3339_utc(expiry));
        }
        if let Some(delta) = &self.expiry_delta {
            frame.add_kv("expirydelta", delta_ms(delta));
        }
        for revoker in &self.revokers {
            frame.add_kv("revoker", revoker.clone());
        }
        frame.add_kv("omitcreationdate", bool_kv(self.omit_creation_date));
        if let Some(permissions) = &self.access_permissions {
            frame.add_kv("accesspermissions", permissions.clone());
        }
        frame
    }
}

impl MakeChainRequest {
    pub(crate) fn to_frame(&self, seq_num: u32) -> Frame {
        let mut frame = Frame::new(Command::MAKE_CHAIN, seq_num);
        if self.is_permission {
            frame.add_kv("ispermission", "true");
        }
        if self.unelaborate {
            frame.add_kv("unelaborate", "true");
        }
        for dot in &self.dots {
            frame.add_kv("dot", dot.clone());
        }
        frame
    }
}

/// Frame installing `entity` as the connection's acting entity: a single
/// payload object of the entity type and nothing else.
pub(crate) fn set_entity_frame(seq_num: u32, entity: Bytes) -> Frame {
    let mut frame = Frame::new(Command::SET_ENTITY, seq_num);
    frame.add_payload_object(PayloadObject::entity(entity));
    frame
}
