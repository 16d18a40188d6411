// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use mtcore_crypto::{AuthKey, rsa};
use mtcore_mtproto::authentication::{self, Finished, KeyKind};
use mtcore_mtproto::mtp::{self, Deserialization, Encrypted, Mtp, Plain};
use mtcore_mtproto::tl::{self, Identifiable};
use mtcore_mtproto::transport::{Full, Intermediate, Obfuscated, Transport};
use mtcore_mtproto::MsgId;

use bytes::BytesMut;

mod dh_server {
    include!("../../includes/dh_server.rs");
}

use dh_server::{DhServer, plain_unwrap, plain_wrap};

fn init_logging() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init();
}

/// Both ends of a connection using the full transport.
struct Link {
    client: Full,
    server: Full,
}

impl Link {
    fn new() -> Self {
        Self {
            client: Full::new(),
            server: Full::new(),
        }
    }

    fn carry(from: &mut Full, to: &mut Full, payload: &[u8]) -> Vec<u8> {
        let mut packed = BytesMut::new();
        from.pack(payload, &mut packed);
        let offset = to.unpack(&mut packed).unwrap();
        assert_eq!(offset.next_offset, packed.len());
        packed[offset.data_start..offset.data_end].to_vec()
    }

    /// Sends `request` through a plain MTP, lets the server answer, and
    /// returns the answer the client would read.
    fn round_trip(&mut self, server: &mut DhServer, request: &[u8]) -> Vec<u8> {
        let mut plain = Plain::new();
        plain.push(request).unwrap();
        let (_, payload) = plain.finalize().unwrap();

        let received = Self::carry(&mut self.client, &mut self.server, &payload);
        let answer = plain_wrap(&server.handle(&plain_unwrap(&received)), 5);
        let received = Self::carry(&mut self.server, &mut self.client, &answer);

        match plain.deserialize(&received).unwrap().pop().unwrap() {
            Deserialization::RpcResult { msg_id, body } => {
                assert_eq!(msg_id, MsgId(0));
                body
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

fn generate_key(kind: KeyKind, server: &mut DhServer) -> Result<Finished, authentication::Error> {
    let keys = vec![dh_server::public_key()];
    let mut link = Link::new();

    let (request, data) = authentication::step1(kind)?;
    let response = link.round_trip(server, &request);

    let (request, data) = authentication::step2(data, &response, &keys)?;
    let response = link.round_trip(server, &request);

    let (request, data) = authentication::step3(data, &response)?;
    let response = link.round_trip(server, &request);

    authentication::create_key(data, &response)
}

#[test]
fn handshake_against_honest_server() {
    init_logging();
    let mut server = DhServer::new(now_secs() as i32 + 1000);
    let finished = generate_key(KeyKind::Permanent { dc_id: 2 }, &mut server).unwrap();

    let client_key = AuthKey::from_bytes(finished.auth_key);
    let server_key = server.auth_key.clone().unwrap();
    assert_eq!(client_key.key_id(), server_key.key_id());
    assert_eq!(finished.first_salt, server.first_salt());
    assert!((999..=1001).contains(&finished.time_offset));
    assert_eq!(
        server.inner_data_id,
        Some(tl::types::PQInnerDataDc::CONSTRUCTOR_ID)
    );
}

#[test]
fn handshake_for_temporary_key() {
    let mut server = DhServer::new(0);
    let kind = KeyKind::Temporary {
        dc_id: 2,
        expires_in: 3600,
    };
    generate_key(kind, &mut server).unwrap();
    assert_eq!(
        server.inner_data_id,
        Some(tl::types::PQInnerDataTempDc::CONSTRUCTOR_ID)
    );
}

#[test]
fn handshake_without_matching_key() {
    let mut server = DhServer::new(0);
    let mut link = Link::new();

    let (request, data) = authentication::step1(KeyKind::Legacy).unwrap();
    let response = link.round_trip(&mut server, &request);
    let error = authentication::step2(data, &response, &rsa::known_keys())
        .err()
        .unwrap();
    assert!(matches!(
        error,
        authentication::Error::UnknownFingerprints { .. }
    ));
}

/// The server's half of an encrypted session, enough to talk to an
/// [`Encrypted`] instance.
struct Peer {
    auth_key: AuthKey,
    session_id: i64,
    salt: i64,
    msg_id: i64,
}

impl Peer {
    fn read(&mut self, payload: &[u8]) -> mtp::envelope::Envelope {
        let envelope =
            mtp::envelope::decode(&self.auth_key, payload, mtcore_crypto::Side::Client).unwrap();
        self.session_id = envelope.session_id;
        self.salt = envelope.salt;
        envelope
    }

    fn write(&mut self, body: Vec<u8>) -> Vec<u8> {
        self.msg_id += 4;
        mtp::envelope::encode(
            &self.auth_key,
            &mtp::envelope::Envelope {
                salt: self.salt,
                session_id: self.session_id,
                msg_id: self.msg_id,
                seq_no: 1,
                body,
            },
            mtcore_crypto::Side::Server,
        )
    }
}

fn rpc_result(req_msg_id: i64, result: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend(0xf35c6d01u32.to_le_bytes());
    body.extend(req_msg_id.to_le_bytes());
    body.extend(result);
    body
}

#[test]
fn encrypted_session_after_handshake() {
    init_logging();
    let mut server = DhServer::new(now_secs() as i32);
    let finished = generate_key(KeyKind::Legacy, &mut server).unwrap();

    let mut client = Encrypted::build()
        .time_offset(finished.time_offset)
        .first_salt(finished.first_salt)
        .finish(AuthKey::from_bytes(finished.auth_key));

    let mut peer = Peer {
        auth_key: server.auth_key.clone().unwrap(),
        session_id: 0,
        salt: 0,
        msg_id: (client.time_offset() as i64 + now_secs()) << 32 | 1,
    };

    let msg_id = client.push(b"Hey!").unwrap();
    let (container_id, payload) = client.finalize().unwrap();
    assert_eq!(container_id, msg_id);

    let envelope = peer.read(&payload);
    assert_eq!(envelope.salt, finished.first_salt);
    assert_eq!(envelope.msg_id, msg_id.0);
    assert_eq!(&envelope.body, b"Hey!");

    let answer = peer.write(rpc_result(msg_id.0, b"Bye!"));
    let results = client.deserialize(&answer).unwrap();
    assert_eq!(
        results,
        vec![Deserialization::RpcResult {
            msg_id,
            body: b"Bye!".to_vec()
        }]
    );
}

fn now_secs() -> i64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

#[test]
fn obfuscated_intermediate_carries_packets() {
    let mut transport = Obfuscated::new(Intermediate::new());
    let mut output = BytesMut::new();
    transport.pack(&[1, 2, 3, 4], &mut output);
    assert_eq!(output.len(), 64 + 4 + 4);
}
