// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Service constructors whose payload is an arbitrary object.
//!
//! The generated schema cannot express "any serialized object", so these are
//! written by hand and keep the inner object as raw bytes.
use crate::mtp;
use crate::tl::{self, Cursor, Deserializable, Identifiable, Serializable};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

type Result<T> = std::result::Result<T, tl::deserialize::Error>;

/// Consumes the constructor identifier of `T`, failing on anything else.
fn expect_constructor<T: Identifiable>(buf: &mut Cursor) -> Result<()> {
    match u32::deserialize(buf)? {
        id if id == T::CONSTRUCTOR_ID => Ok(()),
        id => Err(tl::deserialize::Error::UnexpectedConstructor { id }),
    }
}

/// `message msg_id:long seqno:int bytes:int body:Object = Message;`
///
/// The unit the server and client exchange, bare (no constructor id).
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub msg_id: i64,
    pub seq_no: i32,
    pub body: Vec<u8>,
}

impl Message {
    /// Bytes taken by `msg_id`, `seqno` and `bytes`.
    pub const SIZE_OVERHEAD: usize = 8 + 4 + 4;

    pub fn constructor_id(&self) -> Result<u32> {
        u32::from_bytes(&self.body)
    }

    /// Content-related messages carry an odd sequence number and must be
    /// acknowledged.
    pub fn requires_ack(&self) -> bool {
        self.seq_no & 1 == 1
    }
}

impl Serializable for Message {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.msg_id.serialize(buf);
        self.seq_no.serialize(buf);
        (self.body.len() as i32).serialize(buf);
        buf.extend(self.body.iter().copied());
    }
}

impl Deserializable for Message {
    fn deserialize(buf: &mut Cursor) -> Result<Self> {
        let msg_id = i64::deserialize(buf)?;
        let seq_no = i32::deserialize(buf)?;
        let len = usize::try_from(i32::deserialize(buf)?)
            .ok()
            .filter(|&len| len <= MessageContainer::MAXIMUM_SIZE)
            .ok_or(tl::deserialize::Error::UnexpectedEof)?;

        Ok(Self {
            msg_id,
            seq_no,
            body: buf.read_slice(len)?.to_vec(),
        })
    }
}

/// `rpc_result#f35c6d01 req_msg_id:long result:Object = RpcResult;`
#[derive(Clone, Debug, PartialEq)]
pub struct RpcResult {
    pub req_msg_id: i64,
    pub result: Vec<u8>,
}

impl RpcResult {
    /// Constructor of the wrapped answer.
    pub fn inner_constructor(&self) -> Result<u32> {
        u32::from_bytes(&self.result)
    }
}

impl Identifiable for RpcResult {
    const CONSTRUCTOR_ID: u32 = 0xf35c_6d01;
}

impl Serializable for RpcResult {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        Self::CONSTRUCTOR_ID.serialize(buf);
        self.req_msg_id.serialize(buf);
        buf.extend(self.result.iter().copied());
    }
}

impl Deserializable for RpcResult {
    fn deserialize(buf: &mut Cursor) -> Result<Self> {
        expect_constructor::<Self>(buf)?;
        let req_msg_id = i64::deserialize(buf)?;
        let mut result = Vec::new();
        buf.read_to_end(&mut result);
        Ok(Self { req_msg_id, result })
    }
}

/// `msg_container#73f1f8dc messages:vector<message> = MessageContainer;`
#[derive(Clone, Debug, PartialEq)]
pub struct MessageContainer {
    pub messages: Vec<Message>,
}

impl MessageContainer {
    /// Bytes taken by the constructor and the message count.
    pub const SIZE_OVERHEAD: usize = 4 + 4;

    /// Largest payload the server accepts in a container, excluding the
    /// container's own overhead. Bigger payloads get the connection closed.
    pub const MAXIMUM_SIZE: usize = 1_044_456 - Self::SIZE_OVERHEAD;

    /// Most messages packed in one container. The server answers
    /// `bad_msg_notification` code 64 above its own limit, which is not
    /// documented, so this stays conservative.
    pub const MAXIMUM_LENGTH: usize = 100;
}

impl Identifiable for MessageContainer {
    const CONSTRUCTOR_ID: u32 = 0x73f1_f8dc;
}

impl Serializable for MessageContainer {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        Self::CONSTRUCTOR_ID.serialize(buf);
        (self.messages.len() as i32).serialize(buf);
        for message in &self.messages {
            message.serialize(buf);
        }
    }
}

impl Deserializable for MessageContainer {
    fn deserialize(buf: &mut Cursor) -> Result<Self> {
        expect_constructor::<Self>(buf)?;
        let count = usize::try_from(i32::deserialize(buf)?)
            .map_err(|_| tl::deserialize::Error::UnexpectedEof)?;

        let messages = (0..count)
            .map(|_| Message::deserialize(buf))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { messages })
    }
}

/// `msg_copy#e06046b2 orig_message:Message = MessageCopy;`
///
/// Superseded by containers, but servers may still send it.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageCopy {
    pub orig_message: Message,
}

impl Identifiable for MessageCopy {
    const CONSTRUCTOR_ID: u32 = 0xe060_46b2;
}

impl Deserializable for MessageCopy {
    fn deserialize(buf: &mut Cursor) -> Result<Self> {
        expect_constructor::<Self>(buf)?;
        let orig_message = Message::deserialize(buf)?;
        Ok(Self { orig_message })
    }
}

/// `gzip_packed#3072cfa1 packed_data:string = Object;`
#[derive(Clone, Debug, PartialEq)]
pub struct GzipPacked {
    pub packed_data: Vec<u8>,
}

impl GzipPacked {
    /// Inflated payloads above this size are rejected.
    pub const MAXIMUM_UNPACKED_SIZE: usize = 16 * 1024 * 1024;

    /// Compresses `unpacked_data`, or `None` if the encoder fails.
    pub fn new(unpacked_data: &[u8]) -> Option<Self> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(unpacked_data).ok()?;
        encoder
            .finish()
            .ok()
            .map(|packed_data| Self { packed_data })
    }

    pub fn decompress(&self) -> std::result::Result<Vec<u8>, mtp::DeserializeError> {
        let limit = Self::MAXIMUM_UNPACKED_SIZE as u64 + 1;
        let mut unpacked = Vec::new();
        GzDecoder::new(self.packed_data.as_slice())
            .take(limit)
            .read_to_end(&mut unpacked)
            .ok()
            .filter(|&len| len <= Self::MAXIMUM_UNPACKED_SIZE)
            .ok_or(mtp::DeserializeError::DecompressionFailed)?;
        Ok(unpacked)
    }
}

impl Identifiable for GzipPacked {
    const CONSTRUCTOR_ID: u32 = 0x3072_cfa1;
}

impl Serializable for GzipPacked {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        Self::CONSTRUCTOR_ID.serialize(buf);
        self.packed_data.serialize(buf);
    }
}

impl Deserializable for GzipPacked {
    fn deserialize(buf: &mut Cursor) -> Result<Self> {
        expect_constructor::<Self>(buf)?;
        let packed_data = Vec::<u8>::deserialize(buf)?;
        Ok(Self { packed_data })
    }
}
