// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use mtcore_mtproto::{authentication, mtp, tl, transport};
use std::fmt;
use std::io;

/// Failure while reading from the connection. Every variant is fatal to it.
#[derive(Debug)]
pub enum ReadError {
    Io(io::Error),
    Transport(transport::Error),
    Deserialize(mtp::DeserializeError),

    /// The server did not answer a ping in time.
    PingTimeout,
}

impl std::error::Error for ReadError {}

/// Copies an I/O error, keeping its OS code when there is one. The message
/// of custom errors survives but their inner source does not.
fn copy_io_error(error: &io::Error) -> io::Error {
    match error.raw_os_error() {
        Some(code) => io::Error::from_raw_os_error(code),
        None => io::Error::new(error.kind(), error.to_string()),
    }
}

// Every pending request receives its own copy of the error that closed the
// connection.
impl Clone for ReadError {
    fn clone(&self) -> Self {
        match self {
            Self::Io(error) => Self::Io(copy_io_error(error)),
            Self::Transport(error) => Self::Transport(error.clone()),
            Self::Deserialize(error) => Self::Deserialize(error.clone()),
            Self::PingTimeout => Self::PingTimeout,
        }
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("connection lost: ")?;
        match self {
            Self::Io(error) => fmt::Display::fmt(error, f),
            Self::Transport(error) => fmt::Display::fmt(error, f),
            Self::Deserialize(error) => fmt::Display::fmt(error, f),
            Self::PingTimeout => f.write_str("no pong within the ping deadline"),
        }
    }
}

impl ReadError {
    /// Whether the error means the payload may have been tampered with.
    pub fn is_security_violation(&self) -> bool {
        match self {
            Self::Deserialize(err) => err.is_security_violation(),
            _ => false,
        }
    }
}

impl From<io::Error> for ReadError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<transport::Error> for ReadError {
    fn from(error: transport::Error) -> Self {
        Self::Transport(error)
    }
}

impl From<mtp::DeserializeError> for ReadError {
    fn from(error: mtp::DeserializeError) -> Self {
        Self::Deserialize(error)
    }
}

impl From<tl::deserialize::Error> for ReadError {
    fn from(error: tl::deserialize::Error) -> Self {
        Self::Deserialize(error.into())
    }
}

/// An `rpc_error` answer from the server.
#[derive(Clone, Debug, PartialEq)]
pub struct RpcError {
    /// Category of the error, modelled after HTTP status codes.
    pub code: i32,

    /// Upper snake case name, without the embedded number if there was one.
    pub name: String,

    /// Number embedded in the original name, such as seconds to wait.
    pub value: Option<u32>,

    /// Constructor of the request that failed, when known.
    pub caused_by: Option<u32>,
}

impl std::error::Error for RpcError {}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "server returned {} {}", self.code, self.name)?;
        match (self.value, self.caused_by) {
            (Some(value), Some(id)) => write!(f, " ({value}) for request {id:08x}"),
            (Some(value), None) => write!(f, " ({value})"),
            (None, Some(id)) => write!(f, " for request {id:08x}"),
            (None, None) => Ok(()),
        }
    }
}

impl From<tl::types::RpcError> for RpcError {
    /// Errors such as `FLOOD_WAIT_31` carry a number, which is moved out of
    /// the name and into [`RpcError::value`].
    fn from(error: tl::types::RpcError) -> Self {
        let tl::types::RpcError {
            error_code: code,
            error_message: name,
        } = error;

        let number = name
            .split('_')
            .find(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| Some((digits, digits.parse::<u32>().ok()?)));

        match number {
            Some((digits, value)) => Self {
                code,
                name: name.replace(&format!("_{digits}"), ""),
                value: Some(value),
                caused_by: None,
            },
            None => Self {
                code,
                name,
                value: None,
                caused_by: None,
            },
        }
    }
}

impl RpcError {
    /// Compares the error name against `pattern`, which may start or end
    /// with `*` to match a suffix or a prefix.
    ///
    /// ```
    /// use mtcore_mtsender::RpcError;
    ///
    /// let error = RpcError {
    ///     code: 400,
    ///     name: "PHONE_NUMBER_INVALID".into(),
    ///     value: None,
    ///     caused_by: None,
    /// };
    /// assert!(error.is("PHONE_NUMBER_INVALID"));
    /// assert!(error.is("PHONE_*"));
    /// assert!(error.is("*_INVALID"));
    /// assert!(!error.is("PHONE"));
    /// ```
    pub fn is(&self, pattern: &str) -> bool {
        match (pattern.strip_suffix('*'), pattern.strip_prefix('*')) {
            (Some(prefix), _) => self.name.starts_with(prefix),
            (None, Some(suffix)) => self.name.ends_with(suffix),
            (None, None) => self.name == pattern,
        }
    }

    /// Records which request, by constructor id, the server rejected.
    pub fn with_caused_by(mut self, constructor_id: u32) -> Self {
        self.caused_by = Some(constructor_id);
        self
    }

    /// The seconds to wait before the request may be sent again, if this
    /// is a flood-wait error.
    pub fn flood_wait(&self) -> Option<u32> {
        if self.code == 420 || self.is("FLOOD_WAIT") || self.is("FLOOD_PREMIUM_WAIT") {
            self.value
        } else {
            None
        }
    }

    /// The datacenter the request should be sent to instead, if this is
    /// a migration error.
    pub fn migrate_to(&self) -> Option<i32> {
        if self.code == 303 && (self.is("PHONE_MIGRATE") || self.is("NETWORK_MIGRATE") || self.is("USER_MIGRATE")) {
            self.value.map(|dc_id| dc_id as i32)
        } else {
            None
        }
    }

    /// Whether the server failed on its end and the request may succeed
    /// if sent again.
    pub fn is_transient(&self) -> bool {
        self.code >= 500
            || self.is("RPC_CALL_FAIL")
            || self.is("RPC_MCGET_FAIL")
            || self.is("INTERDC_CALL_ERROR")
            || self.is("INTERDC_CALL_RICH_ERROR")
    }
}

/// Final outcome of a request that did not produce a result.
///
/// Transient failures are retried before reaching this point.
#[derive(Debug)]
pub enum InvocationError {
    /// The server answered with `rpc_error`.
    Rpc(RpcError),

    /// The connection failed while the request was in flight.
    Io(io::Error),

    /// The response, or the message it came in, could not be read.
    Deserialize(mtp::DeserializeError),

    /// The transport reported an error, such as an unknown authorization key.
    Transport(transport::Error),

    /// The caller stopped waiting, or the sender went away with the request.
    Dropped,

    /// The sender disconnected before the response arrived.
    Disconnected,

    /// The datacenter is not known to the session.
    InvalidDc,

    /// Generating an authorization key for the connection failed.
    Authentication(authentication::Error),

    /// A message failed the security checks, and the connection was closed.
    Security(mtp::DeserializeError),

    /// The request was retried as many times as configured without success.
    RetriesExhausted { last: Box<InvocationError> },

    /// The serialized request is not padded to 4 bytes or is too large.
    InvalidRequest { len: usize },

    /// The server refused the message the request was sent in.
    BadMessage { code: i32 },
}

impl std::error::Error for InvocationError {}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc(error) => fmt::Display::fmt(error, f),
            Self::Io(error) => write!(f, "i/o failure: {error}"),
            Self::Deserialize(error) => write!(f, "unreadable answer: {error}"),
            Self::Transport(error) => fmt::Display::fmt(error, f),
            Self::Dropped => f.write_str("request dropped before its answer arrived"),
            Self::Disconnected => f.write_str("sender disconnected"),
            Self::InvalidDc => f.write_str("datacenter not present in the session"),
            Self::Authentication(error) => fmt::Display::fmt(error, f),
            Self::Security(error) => write!(f, "connection closed, {error}"),
            Self::RetriesExhausted { last } => write!(f, "gave up retrying after: {last}"),
            Self::InvalidRequest { len } => write!(f, "cannot send a request of {len} bytes"),
            Self::BadMessage { code } => write!(f, "message refused by the server (code {code})"),
        }
    }
}

impl From<ReadError> for InvocationError {
    fn from(error: ReadError) -> Self {
        match error {
            ReadError::Io(e) => Self::Io(e),
            ReadError::Transport(e) => Self::Transport(e),
            ReadError::Deserialize(e) if e.is_security_violation() => Self::Security(e),
            ReadError::Deserialize(e) => Self::Deserialize(e),
            ReadError::PingTimeout => Self::Disconnected,
        }
    }
}

impl From<mtp::DeserializeError> for InvocationError {
    fn from(error: mtp::DeserializeError) -> Self {
        ReadError::Deserialize(error).into()
    }
}

impl From<tl::deserialize::Error> for InvocationError {
    fn from(error: tl::deserialize::Error) -> Self {
        ReadError::from(error).into()
    }
}

impl From<authentication::Error> for InvocationError {
    fn from(error: authentication::Error) -> Self {
        Self::Authentication(error)
    }
}

impl From<AuthorizationError> for InvocationError {
    fn from(error: AuthorizationError) -> Self {
        match error {
            AuthorizationError::Gen(err) => Self::Authentication(err),
            AuthorizationError::Invoke(err) => err,
        }
    }
}

impl InvocationError {
    /// Same as [`RpcError::is`]. Always `false` for errors that did not come
    /// from the server.
    #[inline]
    pub fn is(&self, pattern: &str) -> bool {
        matches!(self, Self::Rpc(rpc) if rpc.is(pattern))
    }
}

/// Key generation failed.
#[derive(Debug)]
pub enum AuthorizationError {
    /// The server's answers did not pass verification.
    Gen(authentication::Error),

    /// A handshake request could not be delivered.
    Invoke(InvocationError),
}

impl std::error::Error for AuthorizationError {}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gen(error) => fmt::Display::fmt(error, f),
            Self::Invoke(error) => write!(f, "key exchange interrupted: {error}"),
        }
    }
}

impl From<authentication::Error> for AuthorizationError {
    fn from(error: authentication::Error) -> Self {
        Self::Gen(error)
    }
}

impl From<InvocationError> for AuthorizationError {
    fn from(error: InvocationError) -> Self {
        Self::Invoke(error)
    }
}

impl From<ReadError> for AuthorizationError {
    fn from(error: ReadError) -> Self {
        Self::Invoke(error.into())
    }
}

impl From<io::Error> for AuthorizationError {
    fn from(error: io::Error) -> Self {
        Self::Invoke(InvocationError::Io(error))
    }
}
