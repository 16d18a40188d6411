// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! An in-process server speaking just enough of the protocol to drive a
//! sender through the scenarios under test.
#![allow(dead_code)]

pub mod dh_server {
    include!("../../../includes/dh_server.rs");
}

use bytes::{Buf, BytesMut};
use dh_server::{DhServer, plain_unwrap, plain_wrap};
use mtcore_crypto::{AuthKey, Side};
use mtcore_mtproto::manual_tl::{Message, MessageContainer};
use mtcore_mtproto::mtp::envelope::{self, Envelope};
use mtcore_mtproto::tl::{self, Deserializable, Identifiable, Serializable};
use mtcore_mtproto::transport::{self, Full, Transport};
use mtcore_mtsender::Connector;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

const MSGS_ACK: u32 = 0x62d6b459;

pub fn init_logging() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init();
}

pub fn now_secs() -> i64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// Hands every connection attempt over to a [`MockNetwork`].
pub struct MockConnector {
    streams: mpsc::UnboundedSender<(SocketAddr, DuplexStream)>,
}

pub struct MockNetwork {
    streams: mpsc::UnboundedReceiver<(SocketAddr, DuplexStream)>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, MockNetwork) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { streams: tx }), MockNetwork { streams: rx })
    }
}

impl Connector for MockConnector {
    type Stream = DuplexStream;

    async fn connect(&self, addr: SocketAddr) -> io::Result<DuplexStream> {
        let (client, server) = tokio::io::duplex(1 << 20);
        self.streams
            .send((addr, server))
            .map_err(|_| io::Error::from(io::ErrorKind::ConnectionRefused))?;
        Ok(client)
    }
}

impl MockNetwork {
    pub async fn accept(&mut self) -> MockServer {
        let (addr, stream) = self.streams.recv().await.expect("client to connect");
        MockServer {
            addr,
            stream,
            transport: Full::new(),
            buffer: BytesMut::new(),
            auth_key: None,
            session_id: 0,
            salt: 0,
            client_salt: 0,
            outer_msg_id: 0,
            msg_counter: 0,
        }
    }
}

/// One end of a connection, using the full transport.
pub struct MockServer {
    pub addr: SocketAddr,
    stream: DuplexStream,
    transport: Full,
    buffer: BytesMut,
    pub auth_key: Option<AuthKey>,
    pub session_id: i64,
    pub salt: i64,
    /// Salt of the last message received.
    pub client_salt: i64,
    /// Identifier of the last message received, which may be a container.
    pub outer_msg_id: i64,
    msg_counter: i64,
}

impl MockServer {
    pub fn with_auth_key(mut self, auth_key: Option<AuthKey>) -> Self {
        self.auth_key = auth_key;
        self
    }

    /// `None` once the client closed the connection.
    pub async fn recv_packet(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.transport.unpack(&mut self.buffer[..]) {
                Ok(offset) => {
                    let payload = self.buffer[offset.data_start..offset.data_end].to_vec();
                    self.buffer.advance(offset.next_offset);
                    return Some(payload);
                }
                Err(transport::Error::MissingBytes) => {}
                Err(err) => panic!("client sent a bad packet: {err}"),
            }

            self.buffer.reserve(4096);
            match self.stream.read_buf(&mut self.buffer).await {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }

    pub async fn send_packet(&mut self, payload: &[u8]) {
        let mut packed = BytesMut::new();
        self.transport.pack(payload, &mut packed);
        self.stream.write_all(&packed).await.unwrap();
    }

    /// Write a payload exactly as given.
    pub async fn send_raw(&mut self, payload: &[u8]) {
        self.send_packet(payload).await;
    }

    /// Odd, increasing and within the client's time window.
    pub fn next_msg_id(&mut self) -> i64 {
        self.msg_counter += 1;
        (now_secs() << 32) | (self.msg_counter * 4 + 1)
    }

    /// Generate an authorization key with the client.
    pub async fn handshake(&mut self) -> AuthKey {
        let mut dh = DhServer::new(now_secs() as i32);
        for _ in 0..3 {
            let packet = self.recv_packet().await.expect("handshake request");
            let answer = dh.handle(&plain_unwrap(&packet));
            let msg_id = self.next_msg_id();
            self.send_packet(&plain_wrap(&answer, msg_id)).await;
        }

        let auth_key = dh.auth_key.clone().expect("handshake to complete");
        self.auth_key = Some(auth_key.clone());
        self.salt = dh.first_salt();
        auth_key
    }

    /// Receive the next messages other than acknowledgements.
    pub async fn recv_requests(&mut self) -> Vec<Message> {
        loop {
            let payload = self.recv_packet().await.expect("client to send requests");
            let auth_key = self.auth_key.as_ref().expect("handshake to be done");
            let envelope = envelope::decode(auth_key, &payload, Side::Client).unwrap();
            self.session_id = envelope.session_id;
            self.client_salt = envelope.salt;
            self.outer_msg_id = envelope.msg_id;

            let messages = if u32::from_bytes(&envelope.body) == Ok(MessageContainer::CONSTRUCTOR_ID)
            {
                MessageContainer::from_bytes(&envelope.body)
                    .unwrap()
                    .messages
            } else {
                vec![Message {
                    msg_id: envelope.msg_id,
                    seq_no: envelope.seq_no,
                    body: envelope.body,
                }]
            };

            let messages = messages
                .into_iter()
                .filter(|message| message.constructor_id() != Ok(MSGS_ACK))
                .collect::<Vec<_>>();
            if !messages.is_empty() {
                return messages;
            }
        }
    }

    /// Receive messages until `count` requests have arrived.
    pub async fn recv_n_requests(&mut self, count: usize) -> Vec<Message> {
        let mut requests = Vec::new();
        while requests.len() < count {
            requests.extend(self.recv_requests().await);
        }
        requests
    }

    pub fn encrypt(&mut self, body: Vec<u8>) -> Vec<u8> {
        let msg_id = self.next_msg_id();
        let auth_key = self.auth_key.as_ref().expect("handshake to be done");
        envelope::encode(
            auth_key,
            &Envelope {
                salt: self.salt,
                session_id: self.session_id,
                msg_id,
                seq_no: 1,
                body,
            },
            Side::Server,
        )
    }

    pub async fn send_body(&mut self, body: Vec<u8>) {
        let payload = self.encrypt(body);
        self.send_packet(&payload).await;
    }

    pub async fn send_result(&mut self, req_msg_id: i64, result: &[u8]) {
        self.send_body(rpc_result(req_msg_id, result)).await;
    }

    pub async fn send_error(&mut self, req_msg_id: i64, code: i32, message: &str) {
        let error = tl::enums::RpcError::Error(tl::types::RpcError {
            error_code: code,
            error_message: message.to_string(),
        })
        .to_bytes();
        self.send_result(req_msg_id, &error).await;
    }
}

pub fn rpc_result(req_msg_id: i64, result: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend(0xf35c6d01u32.to_le_bytes());
    body.extend(req_msg_id.to_le_bytes());
    body.extend(result);
    body
}

/// A request body the server will happily echo back.
pub fn request(n: u32) -> Vec<u8> {
    let mut body = 0x1234_5678u32.to_le_bytes().to_vec();
    body.extend(n.to_le_bytes());
    body
}
