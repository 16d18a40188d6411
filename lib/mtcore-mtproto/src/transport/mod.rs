// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Framing of MTProto messages over a byte stream.
//!
//! A transport only delimits packets. It knows nothing about encryption or
//! message identifiers; those belong to [`crate::mtp`]. See the
//! [transport documentation] for the wire formats.
//!
//! [transport documentation]: https://core.telegram.org/mtproto/mtproto-transports
mod full;
mod intermediate;
mod obfuscated;

use bytes::BytesMut;
use std::fmt;

pub use full::Full;
pub use intermediate::Intermediate;
pub use obfuscated::Obfuscated;

/// Framing failures. Only [`Error::MissingBytes`] is recoverable: read more
/// data and try again. Any other variant means the stream is unusable.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// The buffer does not hold a complete packet yet.
    MissingBytes,

    /// The declared length cannot belong to a valid packet.
    BadLen { got: i32 },

    /// A packet arrived out of order.
    BadSeq { expected: u32, got: u32 },

    /// The packet checksum did not match its contents.
    BadCrc { expected: u32, got: u32 },

    /// The server answered with a negative status code instead of a message.
    ///
    /// `404` means the authorization key is unknown to the server and must be
    /// generated again. `429` means too many connections were opened from the
    /// same address.
    BadStatus { status: u32 },
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBytes => f.write_str("transport needs more bytes"),
            Self::BadLen { got } => write!(f, "transport got invalid packet length {got}"),
            Self::BadSeq { expected, got } => {
                write!(f, "transport expected packet {expected} but got {got}")
            }
            Self::BadCrc { expected, got } => {
                write!(f, "transport checksum mismatch: {got:#010x} != {expected:#010x}")
            }
            Self::BadStatus { status } => write!(f, "transport status error {status}"),
        }
    }
}

/// Byte range of a payload within the buffer passed to [`Transport::unpack`].
#[derive(Clone, Debug, PartialEq)]
pub struct UnpackedOffset {
    pub data_start: usize,
    pub data_end: usize,
    /// Where the following packet, if any, begins.
    pub next_offset: usize,
}

pub trait Transport {
    /// Frames `input` and appends the packet to `output`.
    ///
    /// `input` must be a multiple of four bytes long.
    fn pack(&mut self, input: &[u8], output: &mut BytesMut);

    /// Locates the first packet in `buffer`, possibly rewriting it in place.
    ///
    /// Callers drop `next_offset` bytes from the front of the buffer before
    /// calling this again.
    fn unpack(&mut self, buffer: &mut [u8]) -> Result<UnpackedOffset, Error>;

    /// Forgets all state, as when a new connection is opened.
    fn reset(&mut self);
}

/// Transports that announce themselves with a tag when wrapped by
/// [`Obfuscated`].
pub trait Tagged {
    /// The tag to embed in the obfuscation header. After this call the
    /// transport no longer sends its tag in plain.
    fn init_tag(&mut self) -> [u8; 4];
}

fn read_i32(buffer: &[u8], offset: usize) -> i32 {
    let mut bytes = [0; 4];
    bytes.copy_from_slice(&buffer[offset..offset + 4]);
    i32::from_le_bytes(bytes)
}
