// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A [`Sender`] owns one connection and its authorization key. Requests
//! are enqueued as opaque bytes, packed into messages by the
//! [Mobile Transport Protocol] and matched to their response by message
//! identifier, no matter in which order the answers arrive.
//!
//! The sender is driven by calling [`Sender::step`] in a loop. The
//! [`SenderPool`] does exactly that for one sender per datacenter, and
//! hands out a cloneable [`SenderPoolHandle`] that any task can invoke
//! requests with.
//!
//! [Mobile Transport Protocol]: https://core.telegram.org/mtproto
#![deny(unsafe_code)]

mod configuration;
mod errors;
mod net;
mod reconnection;
mod sender_pool;
mod utils;

pub use configuration::Configuration;
pub use errors::{AuthorizationError, InvocationError, ReadError, RpcError};
pub use net::Connector;
#[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
pub use net::Tcp;
pub use reconnection::{
    DEFAULT_RECONNECTION_POLICY, FixedReconnect, NoReconnect, ReconnectionPolicy,
};
pub use sender_pool::{SenderPool, SenderPoolHandle, SenderPoolRunner};

use bytes::{Buf, BytesMut};
use futures_util::FutureExt as _;
use futures_util::future::{self, select};
use log::{debug, error, info, trace, warn};
use mtcore_crypto::AuthKey;
use mtcore_mtproto::authentication::{self, KeyKind};
use mtcore_mtproto::mtp::{self, BadMessage, Deserialization, Mtp};
use mtcore_mtproto::tl::{self, Deserializable, RemoteCall, Serializable};
use mtcore_mtproto::transport::{self, Transport};
use mtcore_mtproto::{MsgId, is_valid_request};
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{oneshot, watch};
use web_time::Instant;

/// The maximum data that we're willing to send or receive at once.
///
/// Telegram will close the connection with roughly a megabyte of data,
/// so to account for the transports' own overhead, we add a few extra
/// kilobytes to the maximum data size.
const MAXIMUM_DATA: usize = (1024 * 1024) + (8 * 1024);

/// How much free space the read buffer has before every read.
const READ_CHUNK: usize = 64 * 1024;

pub type InvokeResponse = Vec<u8>;

type ResultSender = oneshot::Sender<Result<InvokeResponse, InvocationError>>;

/// The state of the connection of a [`Sender`], observable through
/// [`Sender::connection_state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Something that happened on a connection that no request asked for.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A message from the server not correlated to any request.
    Update(Vec<u8>),

    /// The server created a new session. Updates may have been missed.
    NewSession,

    /// The home datacenter changed, as requested by the server.
    DcMigrated { from: i32, to: i32 },

    /// The connection was lost and is being established again.
    ConnectionLost,
}

// Manages enqueuing requests, matching them to their response, and IO.
pub struct Sender<T: Transport, M: Mtp, C: Connector> {
    connector: Arc<C>,
    addr: SocketAddr,
    connection: Option<Connection<C::Stream>>,
    transport: T,
    mtp: M,
    config: Configuration,

    requests: Vec<Request>,
    events: Vec<Event>,

    keepalive: bool,
    next_ping: Instant,
    pong_deadline: Option<Instant>,

    reconnect_attempts: usize,
    reconnect_deadline: Option<Instant>,
    lost_reason: Option<ReadError>,
    state: watch::Sender<ConnectionState>,

    // Transport-level buffers and positions
    read_buffer: BytesMut,
    write_buffer: BytesMut,
    write_head: usize,
}

struct Connection<S> {
    reader: ReadHalf<S>,
    writer: WriteHalf<S>,
}

struct Request {
    body: Vec<u8>,
    kind: RequestKind,
    state: RequestState,
    retries: usize,
    not_before: Option<Instant>,
}

enum RequestKind {
    Invoke(ResultSender),
    Ping,
    DropAnswer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct MsgIdPair {
    msg_id: MsgId,
    container_msg_id: MsgId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RequestState {
    NotSerialized,
    Serialized(MsgIdPair),
    Sent(MsgIdPair),
    /// The server received it, but has not answered yet.
    Acknowledged(MsgIdPair),
}

impl RequestState {
    fn pair(&self) -> Option<MsgIdPair> {
        match *self {
            Self::NotSerialized => None,
            Self::Serialized(pair) | Self::Sent(pair) | Self::Acknowledged(pair) => Some(pair),
        }
    }
}

impl Request {
    fn new(body: Vec<u8>, kind: RequestKind) -> Self {
        Self {
            body,
            kind,
            state: RequestState::NotSerialized,
            retries: 0,
            not_before: None,
        }
    }

    fn send_again(&mut self, not_before: Option<Instant>) {
        self.retries += 1;
        self.state = RequestState::NotSerialized;
        self.not_before = not_before;
    }
}

enum Outcome {
    Read(io::Result<usize>),
    Write(io::Result<usize>),
    Timer,
}

impl<T: Transport, M: Mtp, C: Connector> Sender<T, M, C> {
    async fn open(
        transport: T,
        mtp: M,
        connector: Arc<C>,
        addr: SocketAddr,
        config: Configuration,
        keepalive: bool,
    ) -> Result<Self, io::Error> {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let stream = connector.connect(addr).await?;

        let mut sender = Self {
            connector,
            addr,
            connection: None,
            transport,
            mtp,
            next_ping: Instant::now() + config.ping_interval,
            config,

            requests: vec![],
            events: vec![],

            keepalive,
            pong_deadline: None,

            reconnect_attempts: 0,
            reconnect_deadline: None,
            lost_reason: None,
            state,

            read_buffer: BytesMut::with_capacity(MAXIMUM_DATA),
            write_buffer: BytesMut::with_capacity(MAXIMUM_DATA),
            write_head: 0,
        };
        sender.attach(stream);
        info!("connected to {addr}");
        Ok(sender)
    }

    /// `enqueue` a Remote Procedure Call and `step` until it is answered.
    pub async fn invoke<R: RemoteCall>(
        &mut self,
        request: &R,
    ) -> Result<R::Return, InvocationError> {
        let body = self.send(request.to_bytes()).await?;
        Ok(R::Return::from_bytes(&body)?)
    }

    /// Like `invoke` but raw data.
    pub async fn send(&mut self, body: Vec<u8>) -> Result<InvokeResponse, InvocationError> {
        let (tx, rx) = oneshot::channel();
        self.enqueue_body(body, tx);
        self.step_until_receive(rx).await
    }

    /// Enqueue a Remote Procedure Call to be sent in future calls to `step`.
    pub fn enqueue<R: RemoteCall>(
        &mut self,
        request: &R,
    ) -> oneshot::Receiver<Result<InvokeResponse, InvocationError>> {
        let (tx, rx) = oneshot::channel();
        self.enqueue_body(request.to_bytes(), tx);
        rx
    }

    /// Enqueue an already-serialized request. The result is sent through `tx`.
    ///
    /// Dropping the receiving end cancels the request.
    pub fn enqueue_body(&mut self, body: Vec<u8>, tx: ResultSender) {
        if !is_valid_request(&body) {
            let len = body.len();
            warn!("refusing to send invalid request of {len} bytes");
            let _ = tx.send(Err(InvocationError::InvalidRequest { len }));
            return;
        }
        self.requests.push(Request::new(body, RequestKind::Invoke(tx)));
    }

    async fn step_until_receive(
        &mut self,
        mut rx: oneshot::Receiver<Result<InvokeResponse, InvocationError>>,
    ) -> Result<InvokeResponse, InvocationError> {
        loop {
            match rx.try_recv() {
                Ok(result) => break result,
                Err(TryRecvError::Closed) => break Err(InvocationError::Dropped),
                Err(TryRecvError::Empty) => {}
            }
            match self.step().await {
                // Keep them for whoever steps next.
                Ok(events) => self.events.extend(events),
                Err(err) => {
                    break match rx.try_recv() {
                        Ok(result) => result,
                        Err(_) => Err(err.into()),
                    };
                }
            }
        }
    }

    /// Whether there is a connection to read from and write to.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// A receiver that observes every change of the connection state.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Step network events, writing and reading at the same time.
    ///
    /// Lost connections are established again according to the
    /// [`ReconnectionPolicy`], keeping every pending request. An error is
    /// returned when giving up, or when the connection can no longer be
    /// trusted. Either way, the pending requests fail.
    ///
    /// Dropping the returned future while connected loses no data.
    pub async fn step(&mut self) -> Result<Vec<Event>, ReadError> {
        if !self.events.is_empty() {
            return Ok(mem::take(&mut self.events));
        }
        if self.connection.is_none() {
            self.try_reconnect().await?;
        }

        self.process_cancellations();
        self.try_fill_write();

        let deadline = self.next_deadline();
        self.read_buffer.reserve(READ_CHUNK);
        let outcome = {
            let Some(connection) = self.connection.as_mut() else {
                return Ok(mem::take(&mut self.events));
            };
            let reader = &mut connection.reader;
            let writer = &mut connection.writer;
            let read_buffer = &mut self.read_buffer;
            let pending_write = &self.write_buffer[self.write_head..];

            let read = pin!(async { Outcome::Read(reader.read_buf(read_buffer).await) });
            let write = pin!(async {
                if pending_write.is_empty() {
                    future::pending().await
                } else {
                    trace!("writing up to {} bytes to the network", pending_write.len());
                    Outcome::Write(writer.write(pending_write).await)
                }
            });
            let timer = pin!(async {
                utils::sleep_until(deadline).await;
                Outcome::Timer
            });

            let io = select(read, write).map(|either| either.factor_first().0);
            select(io, timer).await.factor_first().0
        };

        let mut events = mem::take(&mut self.events);
        let result = match outcome {
            Outcome::Read(Ok(0)) => Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
            Outcome::Read(Ok(n)) => {
                trace!("read {n} bytes from the network");
                self.process_read_buffer(&mut events)
            }
            Outcome::Write(Ok(0)) => Err(io::Error::from(io::ErrorKind::WriteZero).into()),
            Outcome::Write(Ok(n)) => {
                self.on_net_write(n);
                Ok(())
            }
            Outcome::Read(Err(err)) | Outcome::Write(Err(err)) => Err(err.into()),
            Outcome::Timer => self.on_timer(),
        };

        if let Err(err) = result {
            self.on_connection_failure(err, &mut events)?;
        }
        Ok(events)
    }

    /// Close the connection, failing every pending request.
    ///
    /// The authorization key is kept, so a later [`Sender::step`] or
    /// [`Sender::reconnect`] continues with the same key.
    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            info!("disconnected from {}", self.addr);
        }
        self.clear_buffers();
        self.fail_all(|| InvocationError::Disconnected);
        self.lost_reason = None;
        self.state.send_replace(ConnectionState::Disconnected);
    }

    /// Establish a new connection right away, ignoring the reconnection
    /// policy. Requests in flight are sent again over the new connection.
    pub async fn reconnect(&mut self) -> Result<(), io::Error> {
        self.connection = None;
        self.requeue_in_flight();
        self.state.send_replace(ConnectionState::Connecting);
        let stream = self.connector.connect(self.addr).await?;
        self.attach(stream);
        self.transport.reset();
        self.mtp.reset();
        self.reconnect_attempts = 0;
        self.reconnect_deadline = None;
        self.lost_reason = None;
        info!("reconnected to {}", self.addr);
        Ok(())
    }

    async fn try_reconnect(&mut self) -> Result<(), ReadError> {
        loop {
            // Survives the step being dropped while waiting.
            let deadline = match self.reconnect_deadline {
                Some(deadline) => deadline,
                None => {
                    self.reconnect_attempts += 1;
                    let delay = match self
                        .config
                        .reconnection_policy
                        .should_retry(self.reconnect_attempts)
                    {
                        ControlFlow::Continue(delay) => delay,
                        ControlFlow::Break(()) => return Err(self.give_up_reconnecting()),
                    };

                    self.state.send_replace(ConnectionState::Reconnecting);
                    info!(
                        "reconnecting to {} in {:?} (attempt {})",
                        self.addr, delay, self.reconnect_attempts
                    );
                    let deadline = Instant::now() + delay;
                    self.reconnect_deadline = Some(deadline);
                    deadline
                }
            };

            utils::sleep_until(Some(deadline)).await;
            self.reconnect_deadline = None;
            match self.reconnect().await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!("failed to reconnect to {}: {err}", self.addr);
                    self.lost_reason = Some(err.into());
                }
            }
        }
    }

    fn give_up_reconnecting(&mut self) -> ReadError {
        let error = self
            .lost_reason
            .take()
            .unwrap_or_else(|| io::Error::from(io::ErrorKind::NotConnected).into());
        warn!(
            "giving up on reconnecting to {} after {} attempts: {error}",
            self.addr,
            self.reconnect_attempts - 1
        );
        self.reconnect_attempts = 0;
        self.fail_all(|| InvocationError::Disconnected);
        self.state.send_replace(ConnectionState::Disconnected);
        error
    }

    fn attach(&mut self, stream: C::Stream) {
        let (reader, writer) = tokio::io::split(stream);
        self.connection = Some(Connection { reader, writer });
        self.clear_buffers();
        self.pong_deadline = None;
        self.next_ping = Instant::now() + self.config.ping_interval;
        self.state.send_replace(ConnectionState::Connected);
    }

    fn clear_buffers(&mut self) {
        self.read_buffer.clear();
        self.write_buffer.clear();
        self.write_head = 0;
    }

    /// Decide what to do with the connection after `error`.
    ///
    /// Returns the error back if the connection cannot be used again.
    fn on_connection_failure(
        &mut self,
        error: ReadError,
        events: &mut Vec<Event>,
    ) -> Result<(), ReadError> {
        self.connection = None;
        self.clear_buffers();

        let fatal = error.is_security_violation()
            || matches!(
                error,
                ReadError::Transport(transport::Error::BadStatus { .. })
            );
        if fatal {
            if error.is_security_violation() {
                error!("closing connection to {} after security violation: {error}", self.addr);
            } else {
                warn!("server {} closed the connection: {error}", self.addr);
            }
            self.fail_all(|| InvocationError::from(error.clone()));
            self.state.send_replace(ConnectionState::Disconnected);
            return Err(error);
        }

        warn!("lost connection to {}: {error}", self.addr);
        self.requeue_in_flight();
        self.lost_reason = Some(error);
        self.state.send_replace(ConnectionState::Reconnecting);
        events.push(Event::ConnectionLost);
        Ok(())
    }

    fn fail_all(&mut self, error: impl Fn() -> InvocationError) {
        self.pong_deadline = None;
        for request in self.requests.drain(..) {
            if let RequestKind::Invoke(tx) = request.kind {
                let _ = tx.send(Err(error()));
            }
        }
    }

    /// Anything that was sent will not be answered on a new connection.
    fn requeue_in_flight(&mut self) {
        self.pong_deadline = None;
        self.requests
            .retain(|request| matches!(request.kind, RequestKind::Invoke(_)));
        for request in self.requests.iter_mut() {
            request.state = RequestState::NotSerialized;
        }
    }

    /// Forget requests nobody waits for anymore, asking the server not to
    /// answer them if they were already sent.
    fn process_cancellations(&mut self) {
        let mut i = 0;
        while i < self.requests.len() {
            let cancelled =
                matches!(&self.requests[i].kind, RequestKind::Invoke(tx) if tx.is_closed());
            if !cancelled {
                i += 1;
                continue;
            }

            let request = self.requests.remove(i);
            match request.state.pair() {
                None => debug!("request cancelled before being sent"),
                Some(pair) => {
                    debug!(
                        "request {:?} cancelled, asking the server to drop its answer",
                        pair.msg_id
                    );
                    let body = tl::functions::RpcDropAnswer {
                        req_msg_id: pair.msg_id.0,
                    }
                    .to_bytes();
                    self.requests
                        .push(Request::new(body, RequestKind::DropAnswer));
                }
            }
        }
    }

    /// Serialize the requests that are ready into the write buffer,
    /// unless a write is already pending.
    fn try_fill_write(&mut self) {
        if !self.write_buffer.is_empty() {
            return;
        }

        let now = Instant::now();
        let mut pushed = Vec::new();
        for (i, request) in self.requests.iter_mut().enumerate() {
            if request.state != RequestState::NotSerialized
                || request.not_before.is_some_and(|t| t > now)
            {
                continue;
            }
            match self.mtp.push(&request.body) {
                Some(msg_id) => {
                    request.not_before = None;
                    pushed.push((i, msg_id));
                }
                None => break,
            }
        }

        // Even without requests there may be acknowledgements to send.
        let Some((container_msg_id, payload)) = self.mtp.finalize() else {
            return;
        };
        for (i, msg_id) in pushed {
            self.requests[i].state = RequestState::Serialized(MsgIdPair {
                msg_id,
                container_msg_id,
            });
        }

        trace!(
            "serialized payload of {} bytes as {:?}",
            payload.len(),
            container_msg_id
        );
        self.transport.pack(&payload, &mut self.write_buffer);
        self.write_head = 0;
    }

    /// Handle `n` more written bytes.
    fn on_net_write(&mut self, n: usize) {
        trace!("written {n} bytes to the network");
        self.write_head += n;
        if self.write_head < self.write_buffer.len() {
            return;
        }

        self.write_buffer.clear();
        self.write_head = 0;
        for request in self.requests.iter_mut() {
            if let RequestState::Serialized(pair) = request.state {
                request.state = RequestState::Sent(pair);
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        // Delayed requests are only picked up once the write buffer is free.
        let retry = if self.write_buffer.is_empty() {
            self.requests
                .iter()
                .filter(|request| request.state == RequestState::NotSerialized)
                .filter_map(|request| request.not_before)
                .min()
        } else {
            None
        };
        let ping = self.keepalive.then_some(self.next_ping);
        [retry, ping, self.pong_deadline].into_iter().flatten().min()
    }

    fn on_timer(&mut self) -> Result<(), ReadError> {
        let now = Instant::now();
        if self.pong_deadline.is_some_and(|deadline| deadline <= now) {
            return Err(ReadError::PingTimeout);
        }
        if self.keepalive && self.next_ping <= now {
            self.enqueue_ping(now);
        }
        Ok(())
    }

    fn enqueue_ping(&mut self, now: Instant) {
        let ping_id = mtcore_crypto::bigint::generate_random_long();
        trace!("enqueueing keepalive ping {ping_id}");
        let body = tl::functions::PingDelayDisconnect {
            ping_id,
            disconnect_delay: self.config.ping_disconnect_delay as i32,
        }
        .to_bytes();
        self.requests.push(Request::new(body, RequestKind::Ping));
        self.next_ping = now + self.config.ping_interval;
        if self.pong_deadline.is_none() {
            self.pong_deadline = Some(now + self.config.pong_timeout);
        }
    }

    /// Unpack every complete packet in the read buffer.
    fn process_read_buffer(&mut self, events: &mut Vec<Event>) -> Result<(), ReadError> {
        loop {
            let offset = match self.transport.unpack(&mut self.read_buffer[..]) {
                Ok(offset) => offset,
                Err(transport::Error::MissingBytes) => break Ok(()),
                Err(err) => break Err(err.into()),
            };

            let payload = self.read_buffer[offset.data_start..offset.data_end].to_vec();
            self.read_buffer.advance(offset.next_offset);
            self.process_payload(&payload, events)?;
        }
    }

    /// Deserialize a payload and dispatch the results and errors.
    fn process_payload(
        &mut self,
        payload: &[u8],
        events: &mut Vec<Event>,
    ) -> Result<(), ReadError> {
        trace!("deserializing valid transport packet...");
        for result in self.mtp.deserialize(payload)? {
            match result {
                Deserialization::Update(body) => events.push(Event::Update(body)),
                Deserialization::RpcResult { msg_id, body } => self.resolve(msg_id, Ok(body)),
                Deserialization::RpcError { msg_id, error } => {
                    self.process_rpc_error(msg_id, error)
                }
                Deserialization::BadMessage(bad_msg) => self.process_bad_message(bad_msg),
                Deserialization::Failure { msg_id, error } => {
                    self.resolve(msg_id, Err(InvocationError::Deserialize(error)))
                }
                Deserialization::Acks(msg_ids) => self.process_acks(&msg_ids),
                Deserialization::NewSession { first_msg_id } => {
                    self.process_new_session(first_msg_id);
                    events.push(Event::NewSession);
                }
                Deserialization::ResendRequested(msg_ids) => {
                    for request in self.requests.iter_mut() {
                        if request
                            .state
                            .pair()
                            .is_some_and(|pair| msg_ids.contains(&pair.msg_id))
                        {
                            debug!("server asked to resend {:?}", request.state);
                            request.state = RequestState::NotSerialized;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn find_request(&self, msg_id: MsgId) -> Option<usize> {
        self.requests
            .iter()
            .position(|request| request.state.pair().is_some_and(|pair| pair.msg_id == msg_id))
    }

    fn resolve(&mut self, msg_id: MsgId, result: Result<InvokeResponse, InvocationError>) {
        let Some(i) = self.find_request(msg_id) else {
            debug!("got result for unknown request {msg_id:?}, it may have been cancelled");
            return;
        };

        match self.requests.remove(i).kind {
            RequestKind::Invoke(tx) => {
                trace!("got result for request {msg_id:?}");
                // The caller may have gone away in the meantime.
                let _ = tx.send(result);
            }
            RequestKind::Ping => {
                trace!("got pong for {msg_id:?}");
                self.pong_deadline = None;
            }
            RequestKind::DropAnswer => debug!("server dropped the answer for {msg_id:?}"),
        }
    }

    fn retry_delay(&self, error: &RpcError) -> Option<Duration> {
        match error.flood_wait() {
            Some(secs) if secs <= self.config.flood_sleep_threshold => {
                Some(Duration::from_secs(secs.into()))
            }
            Some(_) => None,
            None if error.is_transient() => Some(self.config.retry_delay),
            None => None,
        }
    }

    fn process_rpc_error(&mut self, msg_id: MsgId, error: tl::types::RpcError) {
        let Some(i) = self.find_request(msg_id) else {
            debug!("got rpc error for unknown request {msg_id:?}: {error:?}");
            return;
        };

        let mut error = RpcError::from(error);
        if let Ok(constructor_id) = u32::from_bytes(&self.requests[i].body) {
            error = error.with_caused_by(constructor_id);
        }

        if !matches!(self.requests[i].kind, RequestKind::Invoke(_)) {
            debug!("internal request {msg_id:?} failed: {error}");
            self.resolve(msg_id, Err(InvocationError::Rpc(error)));
            return;
        }

        match self.retry_delay(&error) {
            Some(delay) if self.requests[i].retries < self.config.max_retries => {
                warn!("{error}; sending request again in {delay:?}");
                self.requests[i].send_again(Some(Instant::now() + delay));
            }
            Some(_) => {
                warn!(
                    "{error}; giving up after {} retries",
                    self.config.max_retries
                );
                let last = Box::new(InvocationError::Rpc(error));
                self.resolve(msg_id, Err(InvocationError::RetriesExhausted { last }));
            }
            None => self.resolve(msg_id, Err(InvocationError::Rpc(error))),
        }
    }

    fn process_acks(&mut self, msg_ids: &[MsgId]) {
        trace!("server acknowledged {} messages", msg_ids.len());
        for request in self.requests.iter_mut() {
            match request.state {
                RequestState::Serialized(pair) | RequestState::Sent(pair)
                    if msg_ids.contains(&pair.msg_id) =>
                {
                    request.state = RequestState::Acknowledged(pair);
                }
                _ => {}
            }
        }
    }

    /// The refused message may be the request itself or the container it
    /// was sent in. Requests the server acknowledged on their own were
    /// received even if their container was refused, and are not resent.
    fn process_bad_message(&mut self, bad_msg: BadMessage) {
        let mut i = self.requests.len();
        while i > 0 {
            i -= 1;
            let hit = match self.requests[i].state {
                RequestState::Acknowledged(pair) => pair.msg_id == bad_msg.msg_id,
                state => state.pair().is_some_and(|pair| {
                    pair.msg_id == bad_msg.msg_id || pair.container_msg_id == bad_msg.msg_id
                }),
            };
            if !hit {
                continue;
            }

            let can_retry = self.requests[i].retries < self.config.max_retries;
            match self.requests[i].kind {
                RequestKind::Invoke(_) if bad_msg.retryable() && can_retry => {
                    debug!(
                        "sending request again after bad message: {}",
                        bad_msg.description()
                    );
                    self.requests[i].send_again(None);
                }
                RequestKind::Invoke(_) => {
                    warn!(
                        "request failed with bad message: {} ({})",
                        bad_msg.description(),
                        bad_msg.code
                    );
                    let error = InvocationError::BadMessage { code: bad_msg.code };
                    let error = if bad_msg.retryable() {
                        InvocationError::RetriesExhausted {
                            last: Box::new(error),
                        }
                    } else {
                        error
                    };
                    if let RequestKind::Invoke(tx) = self.requests.remove(i).kind {
                        let _ = tx.send(Err(error));
                    }
                }
                RequestKind::Ping => {
                    self.requests.remove(i);
                    self.pong_deadline = None;
                }
                RequestKind::DropAnswer => {
                    self.requests.remove(i);
                }
            }
        }
    }

    /// Requests sent before the new session began will not be answered.
    fn process_new_session(&mut self, first_msg_id: MsgId) {
        for request in self.requests.iter_mut() {
            if request
                .state
                .pair()
                .is_some_and(|pair| pair.msg_id < first_msg_id)
            {
                debug!("sending {:?} again in the new session", request.state);
                request.state = RequestState::NotSerialized;
            }
        }
    }
}

impl<T: Transport, C: Connector> Sender<T, mtp::Plain, C> {
    async fn generate_auth_key(
        &mut self,
        kind: KeyKind,
    ) -> Result<authentication::Finished, AuthorizationError> {
        for attempt in 1..=authentication::MAX_HANDSHAKE_ATTEMPTS {
            info!("generating new authorization key (attempt {attempt})...");
            match self.try_generate_auth_key(kind).await {
                Err(AuthorizationError::Gen(authentication::Error::DhGenRetry)) => {
                    warn!("server asked to generate the authorization key again");
                }
                result => return result,
            }
        }
        Err(authentication::Error::DhGenRetry.into())
    }

    async fn try_generate_auth_key(
        &mut self,
        kind: KeyKind,
    ) -> Result<authentication::Finished, AuthorizationError> {
        let keys = self.config.rsa_keys.clone();

        let (request, data) = authentication::step1(kind)?;
        debug!("gen auth key: sending step 1");
        let response = self.send(request).await?;
        debug!("gen auth key: starting step 2");
        let (request, data) = authentication::step2(data, &response, &keys)?;
        debug!("gen auth key: sending step 2");
        let response = self.send(request).await?;
        debug!("gen auth key: starting step 3");
        let (request, data) = authentication::step3(data, &response)?;
        debug!("gen auth key: sending step 3");
        let response = self.send(request).await?;
        debug!("gen auth key: completing generation");
        let finished = authentication::create_key(data, &response)?;
        info!("authorization key generated successfully");
        Ok(finished)
    }

    fn into_encrypted(
        self,
        finished: authentication::Finished,
        config: Configuration,
    ) -> Sender<T, mtp::Encrypted, C> {
        let mtp = mtp::Encrypted::build()
            .time_offset(finished.time_offset)
            .first_salt(finished.first_salt)
            .compression_threshold(config.compression_threshold)
            .security_checks(config.security_checks)
            .finish(AuthKey::from_bytes(finished.auth_key));

        Sender {
            connector: self.connector,
            addr: self.addr,
            connection: self.connection,
            transport: self.transport,
            mtp,
            next_ping: Instant::now() + config.ping_interval,
            config,
            requests: self.requests,
            events: self.events,
            keepalive: true,
            pong_deadline: None,
            reconnect_attempts: 0,
            reconnect_deadline: None,
            lost_reason: None,
            state: self.state,
            read_buffer: self.read_buffer,
            write_buffer: self.write_buffer,
            write_head: self.write_head,
        }
    }
}

impl<T: Transport, C: Connector> Sender<T, mtp::Encrypted, C> {
    /// The authorization key used by this connection.
    pub fn auth_key(&self) -> [u8; 256] {
        self.mtp.auth_key().to_bytes()
    }

    /// The salt currently used for outgoing messages.
    pub fn salt(&self) -> i64 {
        self.mtp.salt()
    }

    /// The offset in seconds to add to the local time to get the server's.
    pub fn time_offset(&self) -> i32 {
        self.mtp.time_offset()
    }
}

/// Connect to `addr` and generate a new authorization key for `dc_id`.
///
/// The key is temporary if [`Configuration::temp_key_expires_in`] is set.
pub async fn connect<T: Transport, C: Connector>(
    transport: T,
    connector: Arc<C>,
    addr: SocketAddr,
    dc_id: i32,
    config: Configuration,
) -> Result<Sender<T, mtp::Encrypted, C>, AuthorizationError> {
    // A handshake cannot continue over a different connection.
    let handshake_config = Configuration {
        reconnection_policy: &NoReconnect,
        ..config.clone()
    };
    let mut sender = Sender::open(
        transport,
        mtp::Plain::new(),
        connector,
        addr,
        handshake_config,
        false,
    )
    .await?;

    let kind = match config.temp_key_expires_in {
        Some(expires_in) => KeyKind::Temporary { dc_id, expires_in },
        None => KeyKind::Permanent { dc_id },
    };
    let finished = sender.generate_auth_key(kind).await?;
    Ok(sender.into_encrypted(finished, config))
}

/// Connect to `addr` reusing a previously generated authorization key.
pub async fn connect_with_auth<T: Transport, C: Connector>(
    transport: T,
    connector: Arc<C>,
    addr: SocketAddr,
    auth_key: [u8; 256],
    first_salt: Option<i64>,
    config: Configuration,
) -> Result<Sender<T, mtp::Encrypted, C>, io::Error> {
    let mtp = mtp::Encrypted::build()
        .first_salt(first_salt.unwrap_or(0))
        .compression_threshold(config.compression_threshold)
        .security_checks(config.security_checks)
        .finish(AuthKey::from_bytes(auth_key));

    Sender::open(transport, mtp, connector, addr, config, true).await
}
