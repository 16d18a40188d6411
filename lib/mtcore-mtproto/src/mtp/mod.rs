// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The [Mobile Transport Protocol]: requests in, payloads out, and the
//! reverse for whatever the server sends.
//!
//! [`Plain`] only carries the key exchange. [`Encrypted`] needs a finished
//! authorization key and tracks the session state.
//!
//! [Mobile Transport Protocol]: https://core.telegram.org/mtproto/description
mod encrypted;
pub mod envelope;
mod plain;

use crate::MsgId;
use crate::tl;
pub use encrypted::{Builder, Encrypted};
pub use envelope::Envelope;
use mtcore_crypto as crypto;
pub use plain::Plain;
use std::fmt;

/// Results from the deserialization of a response.
#[derive(Clone, Debug, PartialEq)]
pub enum Deserialization {
    /// A message that answers no request.
    Update(Vec<u8>),

    /// The answer to `msg_id`.
    RpcResult { msg_id: MsgId, body: Vec<u8> },

    /// `msg_id` was answered with `rpc_error`.
    RpcError {
        msg_id: MsgId,
        error: tl::types::RpcError,
    },

    /// A message, possibly a container, was refused as a whole.
    BadMessage(BadMessage),

    /// The answer to `msg_id` arrived but could not be read.
    Failure {
        msg_id: MsgId,
        error: DeserializeError,
    },

    /// Messages the server confirmed receiving.
    Acks(Vec<MsgId>),

    /// The server forgot the previous session. Nothing sent before
    /// `first_msg_id` will be answered, and updates may be missing.
    NewSession { first_msg_id: MsgId },

    /// Messages to send again.
    ResendRequested(Vec<MsgId>),
}

/// A `bad_msg_notification` or `bad_server_salt`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BadMessage {
    pub msg_id: MsgId,
    pub code: i32,
}

impl BadMessage {
    pub fn description(&self) -> &'static str {
        match self.code {
            16 => "msg_id is in the past for the server",
            17 => "msg_id is in the future for the server",
            18 => "msg_id is not divisible by four",
            19 => "container reused the msg_id of another message",
            20 => "message is too old to be processed",
            32 => "seqno is lower than expected",
            33 => "seqno is higher than expected",
            34 => "seqno should have been even",
            35 => "seqno should have been odd",
            48 => "server salt changed",
            64 => "container is malformed",
            _ => "unknown error code",
        }
    }

    /// Codes after which the session state was fixed and sending again works.
    pub fn retryable(&self) -> bool {
        [16, 17, 32, 33, 48].contains(&self.code)
    }

    pub fn fatal(&self) -> bool {
        !self.retryable()
    }
}

/// Reasons a server payload was rejected.
#[derive(Clone, Debug, PartialEq)]
pub enum DeserializeError {
    /// Encrypted with a key other than ours.
    BadAuthKey { got: i64, expected: i64 },

    /// `msg_key` does not match the decrypted contents.
    BadMessageKey,

    /// Addressed to another session.
    BadSessionId { got: i64, expected: i64 },

    /// Even identifier, or an inner message newer than its container.
    BadMessageId { got: i64 },

    /// Identifier too far from our clock.
    MessageIdOutOfWindow { got: i64, now: i64 },

    /// The padding of the decrypted payload is outside `12..=1024`.
    BadPadding { got: usize },

    /// The inner length disagrees with the decrypted size.
    BadMessageLength { got: i32 },

    /// Non-positive length in a plain message.
    NegativeMessageLength { got: i32 },

    /// Length past the end of a plain message.
    TooLongMessageLength { got: usize, max_length: usize },

    /// The payload ended before the value being read.
    MessageBufferTooSmall,

    /// `gzip_packed` could not be inflated or was too large.
    DecompressionFailed,

    /// A constructor that cannot appear where it did.
    UnexpectedConstructor { id: u32 },

    /// Decryption failed for a reason other than the message key.
    DecryptionError(crypto::Error),
}

impl DeserializeError {
    /// The payload may have been forged or replayed. The connection must not
    /// be used any further.
    pub fn is_security_violation(&self) -> bool {
        matches!(
            self,
            Self::BadAuthKey { .. }
                | Self::BadMessageKey
                | Self::BadSessionId { .. }
                | Self::BadMessageId { .. }
                | Self::MessageIdOutOfWindow { .. }
                | Self::BadPadding { .. }
                | Self::BadMessageLength { .. }
                | Self::DecryptionError(_)
        )
    }
}

impl std::error::Error for DeserializeError {}

impl fmt::Display for DeserializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadAuthKey { got, expected } => {
                write!(f, "payload for auth key {got} instead of {expected}")
            }
            Self::BadMessageKey => f.write_str("payload failed the msg_key check"),
            Self::BadSessionId { got, expected } => {
                write!(f, "payload for session {got} instead of {expected}")
            }
            Self::BadMessageId { got } => write!(f, "invalid server msg_id {got}"),
            Self::MessageIdOutOfWindow { got, now } => {
                write!(f, "server msg_id {got} is too far from {now}")
            }
            Self::BadPadding { got } => write!(f, "invalid padding of {got} bytes"),
            Self::BadMessageLength { got } => write!(f, "invalid inner length {got}"),
            Self::NegativeMessageLength { got } => write!(f, "invalid message length {got}"),
            Self::TooLongMessageLength { got, max_length } => {
                write!(f, "message length {got} exceeds {max_length}")
            }
            Self::MessageBufferTooSmall => f.write_str("payload is truncated"),
            Self::DecompressionFailed => f.write_str("could not inflate gzip_packed"),
            Self::UnexpectedConstructor { id } => {
                write!(f, "unexpected constructor {id:08x} ({})", tl::name_for_id(*id))
            }
            Self::DecryptionError(error) => write!(f, "decryption failed: {error}"),
        }
    }
}

impl From<tl::deserialize::Error> for DeserializeError {
    fn from(error: tl::deserialize::Error) -> Self {
        match error {
            tl::deserialize::Error::UnexpectedEof => Self::MessageBufferTooSmall,
            tl::deserialize::Error::UnexpectedConstructor { id } => {
                Self::UnexpectedConstructor { id }
            }
        }
    }
}

impl From<crypto::Error> for DeserializeError {
    fn from(error: crypto::Error) -> Self {
        match error {
            crypto::Error::MessageKeyMismatch => Self::BadMessageKey,
            error => Self::DecryptionError(error),
        }
    }
}

/// One side of the [Mobile Transport Protocol].
///
/// [Mobile Transport Protocol]: https://core.telegram.org/mtproto/description
pub trait Mtp {
    /// Queues a serialized request and returns the identifier it will be
    /// sent with, or `None` when the next payload cannot take more.
    ///
    /// # Panics
    ///
    /// If the request is not [valid](crate::is_valid_request).
    fn push(&mut self, request: &[u8]) -> Option<MsgId>;

    /// Produces the payload to send, if anything is queued. Processing
    /// server messages can queue acknowledgements on its own.
    ///
    /// The identifier returned is the outermost one: the container when
    /// several messages went out together.
    fn finalize(&mut self) -> Option<(MsgId, Vec<u8>)>;

    fn deserialize(&mut self, payload: &[u8]) -> Result<Vec<Deserialization>, DeserializeError>;

    /// Forgets the session, keeping only what identifies the client.
    fn reset(&mut self);
}
