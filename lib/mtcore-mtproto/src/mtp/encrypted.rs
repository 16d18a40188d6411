// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use super::envelope::{self, Envelope};
use super::{BadMessage, Deserialization, DeserializeError, Mtp};
use crate::tl::{self, Deserializable, Identifiable, Serializable};
use crate::utils::{now_parts, now_secs};
use crate::{MsgId, manual_tl};
use log::{debug, error, trace, warn};
use mtcore_crypto::{AuthKey, Side};
use std::collections::VecDeque;
use std::mem;

/// How far in the past a server message may be, in seconds.
pub const MAX_PAST_SKEW: i64 = 300;

/// How far in the future a server message may be, in seconds.
pub const MAX_FUTURE_SKEW: i64 = 300;

/// How many server message identifiers are remembered to detect replays.
pub const RECENT_MSG_IDS_LEN: usize = 500;

/// `salt` and `session_id` precede the first message.
const PLAINTEXT_PREFIX: usize = 8 + 8;

/// Room left after the prefix for the container's own message header
/// (`msg_id`, `seqno`, `bytes`) and the container body header
/// (constructor, count).
const CONTAINER_PREFIX: usize = manual_tl::Message::SIZE_OVERHEAD
    + manual_tl::MessageContainer::SIZE_OVERHEAD;

/// Options for [`Encrypted`], obtained from [`Encrypted::build`].
pub struct Builder {
    time_offset: i32,
    first_salt: i64,
    compression_threshold: Option<usize>,
    security_checks: bool,
}

/// The [Mobile Transport Protocol] once an authorization key exists.
///
/// Outgoing requests are batched into a single plaintext, wrapped in a
/// container when there is more than one, and encrypted on
/// [`Mtp::finalize`]. Incoming payloads are decrypted, validated and
/// broken down into [`Deserialization`] items.
///
/// [Mobile Transport Protocol]: https://core.telegram.org/mtproto/description
pub struct Encrypted {
    auth_key: AuthKey,
    /// Seconds to add to the local clock to obtain the server's.
    time_offset: i32,
    salt: i64,
    /// Random per session. A new one means a new server-side session.
    session_id: i64,
    /// Twice the content-related messages sent so far.
    sequence: i32,
    last_msg_id: i64,

    /// Server messages with odd `seqno` that still need a `msgs_ack`.
    pending_ack: Vec<i64>,
    /// Service messages to send with the next batch, and whether each is
    /// content-related.
    pending_service: Vec<(Vec<u8>, bool)>,

    /// Requests at least this large are sent compressed when it helps.
    compression_threshold: Option<usize>,
    security_checks: bool,
    /// Oldest first.
    recent_msg_ids: VecDeque<i64>,

    /// Items found while processing the current payload.
    results: Vec<Deserialization>,

    /// The plaintext being batched, prefix included.
    buffer: Vec<u8>,
    msg_count: usize,
    last_serialized: MsgId,
}

impl Builder {
    pub fn time_offset(mut self, offset: i32) -> Self {
        self.time_offset = offset;
        self
    }

    /// Salt to use until the server provides another one.
    pub fn first_salt(mut self, first_salt: i64) -> Self {
        self.first_salt = first_salt;
        self
    }

    /// `None` never compresses.
    pub fn compression_threshold(mut self, threshold: Option<usize>) -> Self {
        self.compression_threshold = threshold;
        self
    }

    /// Disabling the checks still verifies the message key, but accepts
    /// any session, message identifier and repeated messages.
    pub fn security_checks(mut self, enabled: bool) -> Self {
        self.security_checks = enabled;
        self
    }

    pub fn finish(self, auth_key: AuthKey) -> Encrypted {
        Encrypted {
            auth_key,
            time_offset: self.time_offset,
            salt: self.first_salt,
            session_id: mtcore_crypto::bigint::generate_random_long(),
            sequence: 0,
            last_msg_id: 0,
            pending_ack: Vec::new(),
            pending_service: Vec::new(),
            compression_threshold: self.compression_threshold,
            security_checks: self.security_checks,
            recent_msg_ids: VecDeque::with_capacity(RECENT_MSG_IDS_LEN),
            results: Vec::new(),
            buffer: Vec::new(),
            msg_count: 0,
            last_serialized: MsgId(0),
        }
    }
}

impl Encrypted {
    pub fn build() -> Builder {
        Builder {
            time_offset: 0,
            first_salt: 0,
            compression_threshold: crate::DEFAULT_COMPRESSION_THRESHOLD,
            security_checks: true,
        }
    }

    pub fn auth_key(&self) -> &AuthKey {
        &self.auth_key
    }

    /// The salt currently used for outgoing messages.
    pub fn salt(&self) -> i64 {
        self.salt
    }

    /// The offset in seconds to add to the local time to get the server's.
    pub fn time_offset(&self) -> i32 {
        self.time_offset
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    /// Adopts the clock of a server message known to be current.
    fn correct_time_offset(&mut self, server_msg_id: i64) {
        self.time_offset = ((server_msg_id >> 32) - now_secs()) as i32;
        debug!("corrected time offset to {}s", self.time_offset);
    }

    /// Server time in the upper half, sub-second precision in the lower
    /// half, divisible by four and strictly increasing.
    fn next_msg_id(&mut self) -> i64 {
        let (secs, nanos) = now_parts();
        let secs = (secs + i64::from(self.time_offset)) as u64;
        let candidate = ((secs << 32) | (u64::from(nanos) << 2)) as i64;

        self.last_msg_id = candidate.max(self.last_msg_id + 4);
        self.last_msg_id
    }

    /// Content-related messages take the next odd number. Others reuse the
    /// current even one.
    fn next_seq_no(&mut self, content_related: bool) -> i32 {
        if !content_related {
            return self.sequence;
        }
        self.sequence += 2;
        self.sequence - 1
    }

    fn write_message(&mut self, body: &[u8], content_related: bool) -> MsgId {
        if self.buffer.is_empty() {
            self.buffer.resize(PLAINTEXT_PREFIX + CONTAINER_PREFIX, 0);
        }

        let msg_id = self.next_msg_id();
        let seq_no = self.next_seq_no(content_related);
        trace!(
            "serializing {} ({} bytes) as msg_id={msg_id} seq_no={seq_no}",
            tl::name_for_id(u32::from_bytes(body).unwrap_or(0)),
            body.len(),
        );
        msg_id.serialize(&mut self.buffer);
        seq_no.serialize(&mut self.buffer);
        (body.len() as i32).serialize(&mut self.buffer);
        self.buffer.extend_from_slice(body);

        self.msg_count += 1;
        self.last_serialized = MsgId(msg_id);
        self.last_serialized
    }

    /// Queued acknowledgements and service answers are written before any
    /// request so they are never held back.
    fn write_service_messages(&mut self) {
        if !self.pending_ack.is_empty() {
            let ack = tl::enums::MsgsAck::Ack(tl::types::MsgsAck {
                msg_ids: mem::take(&mut self.pending_ack),
            });
            self.write_message(&ack.to_bytes(), false);
        }
        for (body, content_related) in mem::take(&mut self.pending_service) {
            self.write_message(&body, content_related);
        }
    }

    /// The batched plaintext and the identifier it goes out with, before
    /// encryption.
    fn finalize_plain(&mut self) -> Option<(MsgId, Vec<u8>)> {
        self.write_service_messages();
        let count = mem::take(&mut self.msg_count);
        if count == 0 {
            return None;
        }

        let msg_id = if count == 1 {
            self.buffer
                .drain(PLAINTEXT_PREFIX..PLAINTEXT_PREFIX + CONTAINER_PREFIX);
            self.last_serialized
        } else {
            let msg_id = self.next_msg_id();
            let seq_no = self.next_seq_no(false);
            let body_len = self.buffer.len() - PLAINTEXT_PREFIX - manual_tl::Message::SIZE_OVERHEAD;

            let mut header = Vec::with_capacity(CONTAINER_PREFIX);
            msg_id.serialize(&mut header);
            seq_no.serialize(&mut header);
            (body_len as i32).serialize(&mut header);
            manual_tl::MessageContainer::CONSTRUCTOR_ID.serialize(&mut header);
            (count as i32).serialize(&mut header);
            self.buffer[PLAINTEXT_PREFIX..PLAINTEXT_PREFIX + CONTAINER_PREFIX]
                .copy_from_slice(&header);

            trace!("wrapped {count} messages in container msg_id={msg_id}");
            MsgId(msg_id)
        };

        self.buffer[..8].copy_from_slice(&self.salt.to_le_bytes());
        self.buffer[8..PLAINTEXT_PREFIX].copy_from_slice(&self.session_id.to_le_bytes());
        Some((msg_id, mem::take(&mut self.buffer)))
    }

    /// Remembers the server message identifier. Returns `false` if it was
    /// already seen.
    fn remember_msg_id(&mut self, msg_id: i64) -> bool {
        if self.recent_msg_ids.contains(&msg_id) {
            return false;
        }
        if self.recent_msg_ids.len() == RECENT_MSG_IDS_LEN {
            self.recent_msg_ids.pop_front();
        }
        self.recent_msg_ids.push_back(msg_id);
        true
    }

    /// Checks which can only be done knowing the state of the session.
    fn validate_envelope(&self, envelope: &Envelope) -> Result<(), DeserializeError> {
        if envelope.session_id != self.session_id {
            return Err(DeserializeError::BadSessionId {
                got: envelope.session_id,
                expected: self.session_id,
            });
        }

        // > server message identifiers modulo 4 yield 1 if the message is a
        // > response to a client message, and 3 otherwise.
        if envelope.msg_id % 2 == 0 {
            return Err(DeserializeError::BadMessageId {
                got: envelope.msg_id,
            });
        }

        // These are exactly how the server tells us our clock is wrong.
        let correction = matches!(
            u32::from_bytes(&envelope.body),
            Ok(tl::types::BadMsgNotification::CONSTRUCTOR_ID)
                | Ok(tl::types::BadServerSalt::CONSTRUCTOR_ID)
        );
        if !correction {
            let now = now_secs() + self.time_offset as i64;
            if !within_time_window(envelope.msg_id, now) {
                return Err(DeserializeError::MessageIdOutOfWindow {
                    got: envelope.msg_id,
                    now,
                });
            }
        }

        Ok(())
    }

    fn process_message(&mut self, message: manual_tl::Message) -> Result<(), DeserializeError> {
        if message.requires_ack() {
            self.pending_ack.push(message.msg_id);
        }

        let constructor_id = message.constructor_id()?;
        trace!(
            "processing {} msg_id={} seq_no={}",
            tl::name_for_id(constructor_id),
            message.msg_id,
            message.seq_no
        );

        match constructor_id {
            manual_tl::RpcResult::CONSTRUCTOR_ID => self.handle_rpc_result(message),
            tl::types::MsgsAck::CONSTRUCTOR_ID => self.handle_ack(message),
            tl::types::BadMsgNotification::CONSTRUCTOR_ID
            | tl::types::BadServerSalt::CONSTRUCTOR_ID => self.handle_bad_notification(message),
            tl::types::MsgsStateReq::CONSTRUCTOR_ID => self.handle_state_req(message),
            tl::types::MsgsStateInfo::CONSTRUCTOR_ID | tl::types::MsgsAllInfo::CONSTRUCTOR_ID => {
                debug!(
                    "ignoring {} msg_id={}",
                    tl::name_for_id(constructor_id),
                    message.msg_id
                );
                Ok(())
            }
            tl::types::MsgDetailedInfo::CONSTRUCTOR_ID
            | tl::types::MsgNewDetailedInfo::CONSTRUCTOR_ID => self.handle_detailed_info(message),
            tl::types::MsgResendReq::CONSTRUCTOR_ID
            | tl::types::MsgResendAnsReq::CONSTRUCTOR_ID => self.handle_msg_resend(message),
            tl::types::FutureSalt::CONSTRUCTOR_ID => {
                warn!("got a lone future_salt which no request asks for");
                Ok(())
            }
            tl::types::FutureSalts::CONSTRUCTOR_ID => self.handle_future_salts(message),
            tl::types::Pong::CONSTRUCTOR_ID => self.handle_pong(message),
            tl::types::DestroySessionOk::CONSTRUCTOR_ID
            | tl::types::DestroySessionNone::CONSTRUCTOR_ID => self.handle_destroy_session(message),
            tl::types::NewSessionCreated::CONSTRUCTOR_ID => {
                self.handle_new_session_created(message)
            }
            manual_tl::MessageContainer::CONSTRUCTOR_ID => self.handle_container(message),
            manual_tl::MessageCopy::CONSTRUCTOR_ID => self.handle_msg_copy(message),
            manual_tl::GzipPacked::CONSTRUCTOR_ID => self.handle_gzip_packed(message),
            tl::types::HttpWait::CONSTRUCTOR_ID => Ok(()),
            _ => self.handle_update(message),
        }
    }

    /// Stores the body of a successful result, unless it is actually an
    /// `rpc_error`.
    fn push_rpc_body(&mut self, msg_id: MsgId, body: Vec<u8>) {
        if u32::from_bytes(&body) == Ok(tl::types::RpcError::CONSTRUCTOR_ID) {
            self.results.push(match tl::enums::RpcError::from_bytes(&body) {
                Ok(tl::enums::RpcError::Error(error)) => Deserialization::RpcError { msg_id, error },
                Err(e) => Deserialization::Failure {
                    msg_id,
                    error: e.into(),
                },
            });
        } else {
            self.results
                .push(Deserialization::RpcResult { msg_id, body });
        }
    }

    /// An answer to one of our requests.
    ///
    /// ```tl
    /// rpc_result#f35c6d01 req_msg_id:long result:Object = RpcResult;
    /// ```
    ///
    /// The result may be an `rpc_error`, a compressed object, or one of the
    /// answers to `rpc_drop_answer` (which serve as acknowledgement only).
    fn handle_rpc_result(&mut self, message: manual_tl::Message) -> Result<(), DeserializeError> {
        let rpc_result = manual_tl::RpcResult::from_bytes(&message.body)?;
        let inner_constructor = rpc_result.inner_constructor();
        let manual_tl::RpcResult { req_msg_id, result } = rpc_result;
        let msg_id = MsgId(req_msg_id);

        // A bad result fails its request, not the whole payload.
        let inner_constructor = match inner_constructor {
            Ok(x) => x,
            Err(e) => {
                self.results.push(Deserialization::Failure {
                    msg_id,
                    error: e.into(),
                });
                return Ok(());
            }
        };

        match inner_constructor {
            tl::types::RpcAnswerUnknown::CONSTRUCTOR_ID
            | tl::types::RpcAnswerDroppedRunning::CONSTRUCTOR_ID
            | tl::types::RpcAnswerDropped::CONSTRUCTOR_ID => {
                debug!(
                    "got {} for msg_id={}",
                    tl::name_for_id(inner_constructor),
                    req_msg_id
                );
            }
            manual_tl::GzipPacked::CONSTRUCTOR_ID => {
                match manual_tl::GzipPacked::from_bytes(&result)
                    .map_err(DeserializeError::from)
                    .and_then(|gzip| gzip.decompress())
                {
                    Ok(body) => self.push_rpc_body(msg_id, body),
                    Err(error) => self
                        .results
                        .push(Deserialization::Failure { msg_id, error }),
                }
            }
            _ => self.push_rpc_body(msg_id, result),
        }

        Ok(())
    }

    /// The server got some of our messages.
    ///
    /// ```tl
    /// msgs_ack#62d6b459 msg_ids:Vector long = MsgsAck;
    /// ```
    fn handle_ack(&mut self, message: manual_tl::Message) -> Result<(), DeserializeError> {
        let tl::enums::MsgsAck::Ack(ack) = tl::enums::MsgsAck::from_bytes(&message.body)?;
        self.results.push(Deserialization::Acks(
            ack.msg_ids.into_iter().map(MsgId).collect(),
        ));
        Ok(())
    }

    /// The server dropped one of our messages.
    ///
    /// ```tl
    /// bad_msg_notification#a7eff811 bad_msg_id:long bad_msg_seqno:int error_code:int = BadMsgNotification;
    /// bad_server_salt#edab447b bad_msg_id:long bad_msg_seqno:int error_code:int new_server_salt:long = BadMsgNotification;
    /// ```
    ///
    /// The state is corrected here (salt, time offset or sequence number),
    /// and the ignored message is reported so that it can be sent again.
    fn handle_bad_notification(
        &mut self,
        message: manual_tl::Message,
    ) -> Result<(), DeserializeError> {
        let bad_msg = match tl::enums::BadMsgNotification::from_bytes(&message.body)? {
            tl::enums::BadMsgNotification::Notification(x) => x,
            tl::enums::BadMsgNotification::BadServerSalt(x) => {
                debug!(
                    "bad server salt for msg_id={}, new salt is {}",
                    x.bad_msg_id, x.new_server_salt
                );
                self.salt = x.new_server_salt;
                self.results.push(Deserialization::BadMessage(BadMessage {
                    msg_id: MsgId(x.bad_msg_id),
                    code: x.error_code,
                }));
                return Ok(());
            }
        };

        let bad_msg = BadMessage {
            msg_id: MsgId(bad_msg.bad_msg_id),
            code: bad_msg.error_code,
        };
        debug!(
            "bad message msg_id={}: {} ({})",
            bad_msg.msg_id.0,
            bad_msg.description(),
            bad_msg.code
        );
        match bad_msg.code {
            16 | 17 => {
                // Sent `msg_id` was too low or too high (our `time_offset` is wrong).
                self.correct_time_offset(message.msg_id);
            }
            32 => {
                // Our seqno was too low.
                self.sequence += 64;
            }
            33 => {
                // Our seqno was too high.
                self.sequence -= 16;
            }
            _ => {}
        }
        self.results.push(Deserialization::BadMessage(bad_msg));

        Ok(())
    }

    /// The server asks what we know about some of its messages.
    ///
    /// ```tl
    /// msgs_state_req#da69fb52 msg_ids:Vector long = MsgsStateReq;
    /// msgs_state_info#04deb57d req_msg_id:long info:string = MsgsStateInfo;
    /// ```
    ///
    /// Answered with one status byte per message: 1 if the identifier is
    /// older than anything remembered, 2 if it falls within the remembered
    /// range but was not received, 3 if it is newer, and 4 if received.
    fn handle_state_req(&mut self, message: manual_tl::Message) -> Result<(), DeserializeError> {
        let tl::enums::MsgsStateReq::Req(req) =
            tl::enums::MsgsStateReq::from_bytes(&message.body)?;

        let oldest = self.recent_msg_ids.iter().copied().min().unwrap_or(0);
        let newest = self.recent_msg_ids.iter().copied().max().unwrap_or(0);
        let info = req
            .msg_ids
            .iter()
            .map(|id| {
                if self.recent_msg_ids.contains(id) {
                    4
                } else if *id < oldest {
                    1
                } else if *id > newest {
                    3
                } else {
                    2
                }
            })
            .collect();

        debug!("answering state request for {} messages", req.msg_ids.len());
        let answer = tl::enums::MsgsStateInfo::Info(tl::types::MsgsStateInfo {
            req_msg_id: message.msg_id,
            info,
        });
        self.pending_service.push((answer.to_bytes(), false));
        Ok(())
    }

    /// The server announces an answer we may have missed.
    ///
    /// ```tl
    /// msg_detailed_info#276d3ec6 msg_id:long answer_msg_id:long bytes:int status:int = MsgDetailedInfo;
    /// msg_new_detailed_info#809db6df answer_msg_id:long bytes:int status:int = MsgDetailedInfo;
    /// ```
    ///
    /// The answer is acknowledged if it was received, and requested again
    /// otherwise.
    fn handle_detailed_info(
        &mut self,
        message: manual_tl::Message,
    ) -> Result<(), DeserializeError> {
        let answer_msg_id = match tl::enums::MsgDetailedInfo::from_bytes(&message.body)? {
            tl::enums::MsgDetailedInfo::Info(x) => x.answer_msg_id,
            tl::enums::MsgDetailedInfo::MsgNewDetailedInfo(x) => x.answer_msg_id,
        };

        if self.recent_msg_ids.contains(&answer_msg_id) {
            self.pending_ack.push(answer_msg_id);
        } else {
            debug!("requesting answer msg_id={} again", answer_msg_id);
            let request = tl::enums::MsgResendReq::Req(tl::types::MsgResendReq {
                msg_ids: vec![answer_msg_id],
            });
            self.pending_service.push((request.to_bytes(), true));
        }
        Ok(())
    }

    /// The server wants some of our messages again.
    ///
    /// ```tl
    /// msg_resend_req#7d861a08 msg_ids:Vector long = MsgResendReq;
    /// msg_resend_ans_req#8610baeb msg_ids:Vector long = MsgResendReq;
    /// ```
    fn handle_msg_resend(&mut self, message: manual_tl::Message) -> Result<(), DeserializeError> {
        let msg_ids = match tl::enums::MsgResendReq::from_bytes(&message.body)? {
            tl::enums::MsgResendReq::Req(x) => x.msg_ids,
            tl::enums::MsgResendReq::AnsReq(x) => x.msg_ids,
        };
        self.results.push(Deserialization::ResendRequested(
            msg_ids.into_iter().map(MsgId).collect(),
        ));
        Ok(())
    }

    /// Answer to `get_future_salts`.
    ///
    /// ```tl
    /// future_salts#ae500895 req_msg_id:long now:int salts:vector future_salt = FutureSalts;
    /// ```
    ///
    /// The response is not wrapped in `rpc_result`, but it is still the
    /// answer to the request with `req_msg_id`.
    fn handle_future_salts(&mut self, message: manual_tl::Message) -> Result<(), DeserializeError> {
        let tl::enums::FutureSalts::Salts(salts) =
            tl::enums::FutureSalts::from_bytes(&message.body)?;

        self.results.push(Deserialization::RpcResult {
            msg_id: MsgId(salts.req_msg_id),
            body: message.body,
        });
        Ok(())
    }

    /// Answer to `ping`, outside of `rpc_result`.
    ///
    /// ```tl
    /// pong#347773c5 msg_id:long ping_id:long = Pong;
    /// ```
    fn handle_pong(&mut self, message: manual_tl::Message) -> Result<(), DeserializeError> {
        let tl::enums::Pong::Pong(pong) = tl::enums::Pong::from_bytes(&message.body)?;

        self.results.push(Deserialization::RpcResult {
            msg_id: MsgId(pong.msg_id),
            body: message.body,
        });
        Ok(())
    }

    /// Answer to `destroy_session`.
    ///
    /// The answer normally comes in `rpc_result`, so a bare one can only
    /// be logged.
    fn handle_destroy_session(
        &mut self,
        message: manual_tl::Message,
    ) -> Result<(), DeserializeError> {
        match tl::enums::DestroySessionRes::from_bytes(&message.body)? {
            tl::enums::DestroySessionRes::Ok(x) => {
                debug!("session {} destroyed", x.session_id)
            }
            tl::enums::DestroySessionRes::None(x) => {
                debug!("session {} did not exist", x.session_id)
            }
        }
        Ok(())
    }

    /// The server started a new session for us.
    ///
    /// ```tl
    /// new_session_created#9ec20908 first_msg_id:long unique_id:long server_salt:long = NewSession
    /// ```
    ///
    /// The server forgot everything about the previous session, including
    /// which of its messages were delivered, so the remembered identifiers
    /// are dropped. Updates may have been lost in the meantime.
    fn handle_new_session_created(
        &mut self,
        message: manual_tl::Message,
    ) -> Result<(), DeserializeError> {
        let tl::enums::NewSession::Created(new_session) =
            tl::enums::NewSession::from_bytes(&message.body)?;

        debug!(
            "new session created (first_msg_id={}, unique_id={})",
            new_session.first_msg_id, new_session.unique_id
        );
        self.salt = new_session.server_salt;
        self.recent_msg_ids.clear();
        self.recent_msg_ids.push_back(message.msg_id);
        self.results.push(Deserialization::NewSession {
            first_msg_id: MsgId(new_session.first_msg_id),
        });
        Ok(())
    }

    /// Several messages in one.
    ///
    /// ```tl
    /// msg_container#73f1f8dc messages:vector message = MessageContainer;
    /// ```
    ///
    /// Inner messages must have a `msg_id` lower than the container's.
    fn handle_container(&mut self, message: manual_tl::Message) -> Result<(), DeserializeError> {
        let container = manual_tl::MessageContainer::from_bytes(&message.body)?;
        for inner_message in container.messages {
            if self.security_checks {
                if inner_message.msg_id % 2 == 0 || inner_message.msg_id >= message.msg_id {
                    return Err(DeserializeError::BadMessageId {
                        got: inner_message.msg_id,
                    });
                }
                if !self.remember_msg_id(inner_message.msg_id) {
                    warn!("ignoring duplicate msg_id={}", inner_message.msg_id);
                    continue;
                }
            }
            self.process_message(inner_message)?;
        }

        Ok(())
    }

    /// A message sent again under a new identifier.
    ///
    /// ```tl
    /// msg_copy#e06046b2 orig_message:Message = MessageCopy;
    /// ```
    ///
    /// Processed as the original message, unless it was already received.
    fn handle_msg_copy(&mut self, message: manual_tl::Message) -> Result<(), DeserializeError> {
        let copy = manual_tl::MessageCopy::from_bytes(&message.body)?;
        if self.remember_msg_id(copy.orig_message.msg_id) {
            self.process_message(copy.orig_message)
        } else {
            self.pending_ack.push(copy.orig_message.msg_id);
            Ok(())
        }
    }

    /// A compressed message.
    ///
    /// ```tl
    /// gzip_packed#3072cfa1 packed_data:string = Object;
    /// ```
    fn handle_gzip_packed(&mut self, message: manual_tl::Message) -> Result<(), DeserializeError> {
        let container = manual_tl::GzipPacked::from_bytes(&message.body)?;
        let body = container.decompress()?;
        // The acknowledgement, if any, was already queued for the outer message.
        self.process_message(manual_tl::Message {
            seq_no: message.seq_no & !1,
            body,
            ..message
        })
    }

    /// Every service message is handled above, so the rest are updates.
    fn handle_update(&mut self, message: manual_tl::Message) -> Result<(), DeserializeError> {
        self.results.push(Deserialization::Update(message.body));
        Ok(())
    }
}

impl Mtp for Encrypted {
    /// Returns `None` once the batch holds as many messages, or as many
    /// bytes, as a container allows. An empty batch takes any valid
    /// request, since a lone message goes out without a container.
    ///
    /// Panics if `request` fails [`crate::is_valid_request`].
    fn push(&mut self, request: &[u8]) -> Option<MsgId> {
        self.write_service_messages();
        if self.msg_count >= manual_tl::MessageContainer::MAXIMUM_LENGTH {
            return None;
        }
        assert!(crate::is_valid_request(request));

        let packed = self
            .compression_threshold
            .filter(|&threshold| request.len() >= threshold)
            .and_then(|_| manual_tl::GzipPacked::new(request))
            .map(|gzip| gzip.to_bytes())
            .filter(|packed| packed.len() < request.len());
        let body = packed.as_deref().unwrap_or(request);

        if self.msg_count > 0
            && self.buffer.len() + manual_tl::Message::SIZE_OVERHEAD + body.len()
                >= manual_tl::MessageContainer::MAXIMUM_SIZE
        {
            return None;
        }

        Some(self.write_message(body, true))
    }

    fn finalize(&mut self) -> Option<(MsgId, Vec<u8>)> {
        self.finalize_plain().map(|(msg_id, plaintext)| {
            let payload = envelope::encrypt_plaintext(&self.auth_key, &plaintext, Side::Client);
            (msg_id, payload)
        })
    }

    fn deserialize(&mut self, payload: &[u8]) -> Result<Vec<Deserialization>, DeserializeError> {
        crate::utils::check_message_buffer(payload)?;

        let envelope = envelope::decode(&self.auth_key, payload, Side::Server).and_then(|envelope| {
            if self.security_checks {
                self.validate_envelope(&envelope)?;
            }
            Ok(envelope)
        });
        let envelope = log_violation(envelope)?;

        if self.security_checks && !self.remember_msg_id(envelope.msg_id) {
            warn!("ignoring duplicate msg_id={}", envelope.msg_id);
            return Ok(Vec::new());
        }

        let Envelope {
            msg_id,
            seq_no,
            body,
            ..
        } = envelope;
        log_violation(self.process_message(manual_tl::Message {
            msg_id,
            seq_no,
            body,
        }))?;

        Ok(mem::take(&mut self.results))
    }

    /// Starts a new session with the same key, salt and time offset.
    fn reset(&mut self) {
        self.session_id = mtcore_crypto::bigint::generate_random_long();
        self.sequence = 0;
        self.last_msg_id = 0;
        self.pending_ack.clear();
        self.pending_service.clear();
        self.recent_msg_ids.clear();
        self.results.clear();
        self.buffer.clear();
        self.msg_count = 0;
    }
}

/// Whether the time encoded in `msg_id` is close enough to `now`, both in
/// seconds since the epoch.
fn within_time_window(msg_id: i64, now: i64) -> bool {
    let skew = (msg_id >> 32) - now;
    (-MAX_PAST_SKEW..=MAX_FUTURE_SKEW).contains(&skew)
}

fn log_violation<T>(result: Result<T, DeserializeError>) -> Result<T, DeserializeError> {
    result.inspect_err(|e| {
        if e.is_security_violation() {
            error!("security violation: {e}");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE_PREFIX_LEN: usize = PLAINTEXT_PREFIX;
    const GZIP_PACKED_HEADER: [u8; 4] = manual_tl::GzipPacked::CONSTRUCTOR_ID.to_le_bytes();
    const MSG_CONTAINER_HEADER: [u8; 4] = manual_tl::MessageContainer::CONSTRUCTOR_ID.to_le_bytes();

    const REQUEST: &[u8] = b"ping";
    const REQUEST_B: &[u8] = b"pong";

    fn auth_key() -> AuthKey {
        AuthKey::from_bytes([0; 256])
    }

    fn uncompressed() -> Encrypted {
        Encrypted::build().compression_threshold(None).finish(auth_key())
    }

    fn contains(haystack: &[u8], needle: [u8; 4]) -> bool {
        haystack.windows(4).any(|w| w == needle)
    }

    /// Checks `msg_id`, `seqno`, `bytes` and the body of a serialized message.
    fn assert_message(buffer: &[u8], msg_id: MsgId, seq_no: i32, body: &[u8]) {
        let message = manual_tl::Message::from_bytes(buffer).unwrap();
        assert_eq!(message.msg_id, msg_id.0);
        assert_eq!(message.seq_no, seq_no);
        assert_eq!(message.body, body);
        assert_eq!(buffer.len(), manual_tl::Message::SIZE_OVERHEAD + body.len());
    }

    fn server_msg_id(offset: i64, counter: i64) -> i64 {
        ((now_secs() + offset) << 32) | (counter << 2) | 1
    }

    /// Encrypts a server message for the given `mtp`.
    fn server_payload(mtp: &Encrypted, msg_id: i64, seq_no: i32, body: Vec<u8>) -> Vec<u8> {
        envelope::encode(
            &mtp.auth_key,
            &Envelope {
                salt: mtp.salt,
                session_id: mtp.session_id,
                msg_id,
                seq_no,
                body,
            },
            Side::Server,
        )
    }

    fn rpc_result(req_msg_id: MsgId, result: &[u8]) -> Vec<u8> {
        manual_tl::RpcResult {
            req_msg_id: req_msg_id.0,
            result: result.to_vec(),
        }
        .to_bytes()
    }

    #[test]
    fn plaintext_starts_with_salt_and_session() {
        let mut mtproto = Encrypted::build().first_salt(-7).finish(auth_key());
        let msg_id = mtproto.push(REQUEST).unwrap();
        let (outer_id, buffer) = mtproto.finalize_plain().unwrap();

        assert_eq!(outer_id, msg_id);
        assert_eq!(&buffer[..8], (-7i64).to_le_bytes());
        assert_eq!(&buffer[8..16], mtproto.session_id().to_le_bytes());
        assert_message(&buffer[MESSAGE_PREFIX_LEN..], msg_id, 1, REQUEST);
    }

    #[test]
    fn several_requests_share_a_container() {
        let mut mtproto = uncompressed();
        let first = mtproto.push(REQUEST).unwrap();
        let second = mtproto.push(REQUEST_B).unwrap();
        let (container_id, buffer) = mtproto.finalize_plain().unwrap();
        assert!(first < second && second < container_id);

        let outer = manual_tl::Message::from_bytes(&buffer[MESSAGE_PREFIX_LEN..]).unwrap();
        assert_eq!(outer.msg_id, container_id.0);
        // Not content-related, and two content-related messages came before.
        assert_eq!(outer.seq_no, 4);

        let container = manual_tl::MessageContainer::from_bytes(&outer.body).unwrap();
        let ids = container.messages.iter().map(|m| m.msg_id).collect::<Vec<_>>();
        let seqs = container.messages.iter().map(|m| m.seq_no).collect::<Vec<_>>();
        assert_eq!(ids, [first.0, second.0]);
        assert_eq!(seqs, [1, 3]);
        assert_eq!(container.messages[1].body, REQUEST_B);
    }

    #[test]
    fn container_bytes_field_covers_its_body() {
        let mut mtproto = uncompressed();
        mtproto.push(REQUEST);
        mtproto.push(REQUEST_B);
        let (_, buffer) = mtproto.finalize_plain().unwrap();
        let buffer = &buffer[MESSAGE_PREFIX_LEN..];

        let declared = i32::from_bytes(&buffer[12..16]).unwrap() as usize;
        assert_eq!(declared, buffer.len() - manual_tl::Message::SIZE_OVERHEAD);
        assert_eq!(&buffer[16..20], MSG_CONTAINER_HEADER);
    }

    #[test]
    fn large_requests_go_alone() {
        let mut mtproto = uncompressed();
        let data = vec![0x7f; 768 * 1024];

        let msg_id = mtproto.push(&data).unwrap();
        assert!(mtproto.push(&data).is_none());

        let (outer_id, buffer) = mtproto.finalize_plain().unwrap();
        assert_eq!(outer_id, msg_id);
        assert_eq!(
            buffer.len(),
            MESSAGE_PREFIX_LEN + manual_tl::Message::SIZE_OVERHEAD + data.len()
        );
        assert!(!contains(&buffer, MSG_CONTAINER_HEADER));
    }

    #[test]
    fn largest_valid_request_can_be_pushed() {
        let largest = manual_tl::MessageContainer::MAXIMUM_SIZE - manual_tl::Message::SIZE_OVERHEAD;
        assert!(crate::is_valid_request(&vec![0; largest]));
        assert!(!crate::is_valid_request(&vec![0; largest + 4]));

        for len in [1_044_392, largest] {
            let mut mtproto = uncompressed();
            let data = vec![0x7f; len];
            let msg_id = mtproto.push(&data).unwrap();
            assert!(mtproto.push(REQUEST).is_none());

            let (outer_id, buffer) = mtproto.finalize_plain().unwrap();
            assert_eq!(outer_id, msg_id);
            assert_message(&buffer[MESSAGE_PREFIX_LEN..], msg_id, 1, &data);
        }
    }

    #[test]
    fn large_request_waits_for_pending_acks() {
        let mut mtproto = uncompressed();
        let payload = server_payload(&mtproto, server_msg_id(0, 1), 1, REQUEST.to_vec());
        mtproto.deserialize(&payload).unwrap();

        let largest = manual_tl::MessageContainer::MAXIMUM_SIZE - manual_tl::Message::SIZE_OVERHEAD;
        let data = vec![0x7f; largest];
        assert!(mtproto.push(&data).is_none());

        // The acknowledgement goes out on its own, then the request fits.
        let (_, buffer) = mtproto.finalize_plain().unwrap();
        assert!(!contains(&buffer, MSG_CONTAINER_HEADER));
        let msg_id = mtproto.push(&data).unwrap();
        assert_eq!(mtproto.finalize_plain().unwrap().0, msg_id);
    }

    #[test]
    fn container_length_is_limited() {
        let mut mtproto = Encrypted::build().finish(auth_key());
        for _ in 0..manual_tl::MessageContainer::MAXIMUM_LENGTH {
            assert!(mtproto.push(REQUEST).is_some());
        }
        assert!(mtproto.push(REQUEST).is_none());

        mtproto.finalize().unwrap();
        assert!(mtproto.push(REQUEST).is_some());
    }

    #[test]
    #[should_panic]
    fn oversized_requests_panic() {
        Encrypted::build()
            .finish(auth_key())
            .push(&vec![0; 2 * 1024 * 1024]);
    }

    #[test]
    #[should_panic]
    fn unpadded_requests_panic() {
        Encrypted::build().finish(auth_key()).push(&[1, 2, 3]);
    }

    #[test]
    fn compression_follows_the_threshold() {
        let compressible = vec![0; 512 * 1024];
        let cases = [
            (None, false),
            (Some(768 * 1024), false),
            (Some(256 * 1024), true),
            (crate::DEFAULT_COMPRESSION_THRESHOLD, true),
        ];
        for (threshold, compressed) in cases {
            let mut mtproto = Encrypted::build()
                .compression_threshold(threshold)
                .finish(auth_key());
            mtproto.push(&compressible);
            let (_, buffer) = mtproto.finalize_plain().unwrap();
            assert_eq!(
                contains(&buffer, GZIP_PACKED_HEADER),
                compressed,
                "threshold {threshold:?}"
            );
        }
    }

    #[test]
    fn incompressible_requests_are_sent_as_is() {
        let mut mtproto = Encrypted::build()
            .compression_threshold(Some(4))
            .finish(auth_key());
        let msg_id = mtproto.push(REQUEST).unwrap();
        let (_, buffer) = mtproto.finalize_plain().unwrap();
        assert_message(&buffer[MESSAGE_PREFIX_LEN..], msg_id, 1, REQUEST);
    }

    #[test]
    fn message_ids_increase() {
        let mut mtproto = uncompressed();
        let ids = (0..50)
            .map(|_| mtproto.push(REQUEST).unwrap())
            .collect::<Vec<_>>();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert!(ids.iter().all(|id| id.0 % 4 == 0));
    }
    #[test]
    fn nothing_to_finalize() {
        let mut mtproto = Encrypted::build().finish(auth_key());
        assert!(mtproto.finalize().is_none());
    }

    #[test]
    fn rpc_result_is_routed_and_acknowledged() {
        let mut mtproto = Encrypted::build().finish(auth_key());
        let msg_id = mtproto.push(REQUEST).unwrap();
        mtproto.finalize().unwrap();

        let payload = server_payload(&mtproto, server_msg_id(0, 1), 1, rpc_result(msg_id, b"Ok!!"));
        assert_eq!(
            mtproto.deserialize(&payload),
            Ok(vec![Deserialization::RpcResult {
                msg_id,
                body: b"Ok!!".to_vec()
            }])
        );

        // The acknowledgement is sent even without other requests.
        let (_, buffer) = mtproto.finalize_plain().unwrap();
        let ack_id = tl::types::MsgsAck::CONSTRUCTOR_ID.to_le_bytes();
        assert_eq!(&buffer[MESSAGE_PREFIX_LEN + 16..MESSAGE_PREFIX_LEN + 20], ack_id);
        // Not content-related.
        assert_eq!(&buffer[MESSAGE_PREFIX_LEN + 8..MESSAGE_PREFIX_LEN + 12], [2, 0, 0, 0]);
    }

    #[test]
    fn rpc_error_is_routed() {
        let mut mtproto = Encrypted::build().finish(auth_key());
        let msg_id = mtproto.push(REQUEST).unwrap();
        mtproto.finalize().unwrap();

        let error = tl::types::RpcError {
            error_code: 420,
            error_message: "FLOOD_WAIT_2".into(),
        };
        let body = tl::enums::RpcError::Error(error.clone()).to_bytes();
        let payload = server_payload(&mtproto, server_msg_id(0, 1), 1, rpc_result(msg_id, &body));
        assert_eq!(
            mtproto.deserialize(&payload),
            Ok(vec![Deserialization::RpcError { msg_id, error }])
        );
    }

    #[test]
    fn container_is_unpacked() {
        let mut mtproto = Encrypted::build().finish(auth_key());
        let first = mtproto.push(REQUEST).unwrap();
        let second = mtproto.push(REQUEST_B).unwrap();
        mtproto.finalize().unwrap();

        let container = manual_tl::MessageContainer {
            messages: vec![
                manual_tl::Message {
                    msg_id: server_msg_id(0, 1),
                    seq_no: 1,
                    body: rpc_result(second, b"two!"),
                },
                manual_tl::Message {
                    msg_id: server_msg_id(0, 2),
                    seq_no: 3,
                    body: rpc_result(first, b"one!"),
                },
                manual_tl::Message {
                    msg_id: server_msg_id(0, 3),
                    seq_no: 4,
                    body: tl::enums::MsgsAck::Ack(tl::types::MsgsAck {
                        msg_ids: vec![first.0],
                    })
                    .to_bytes(),
                },
            ],
        };
        let payload = server_payload(&mtproto, server_msg_id(0, 4), 4, container.to_bytes());
        assert_eq!(
            mtproto.deserialize(&payload),
            Ok(vec![
                Deserialization::RpcResult {
                    msg_id: second,
                    body: b"two!".to_vec()
                },
                Deserialization::RpcResult {
                    msg_id: first,
                    body: b"one!".to_vec()
                },
                Deserialization::Acks(vec![first]),
            ])
        );
    }

    #[test]
    fn compressed_result_is_decompressed() {
        let mut mtproto = Encrypted::build().finish(auth_key());
        let msg_id = mtproto.push(REQUEST).unwrap();
        mtproto.finalize().unwrap();

        let body = vec![7; 1024];
        let gzip = manual_tl::GzipPacked::new(&body).unwrap().to_bytes();
        let payload = server_payload(&mtproto, server_msg_id(0, 1), 1, rpc_result(msg_id, &gzip));
        assert_eq!(
            mtproto.deserialize(&payload),
            Ok(vec![Deserialization::RpcResult { msg_id, body }])
        );
    }

    #[test]
    fn bad_server_salt_updates_salt() {
        let mut mtproto = Encrypted::build().finish(auth_key());
        let msg_id = mtproto.push(REQUEST).unwrap();
        mtproto.finalize().unwrap();

        let body = tl::enums::BadMsgNotification::BadServerSalt(tl::types::BadServerSalt {
            bad_msg_id: msg_id.0,
            bad_msg_seqno: 1,
            error_code: 48,
            new_server_salt: 12345,
        })
        .to_bytes();
        let payload = server_payload(&mtproto, server_msg_id(0, 1), 0, body);
        let result = mtproto.deserialize(&payload).unwrap();
        assert_eq!(
            result,
            vec![Deserialization::BadMessage(BadMessage { msg_id, code: 48 })]
        );
        assert_eq!(mtproto.salt(), 12345);

        mtproto.push(REQUEST);
        let (_, buffer) = mtproto.finalize_plain().unwrap();
        assert_eq!(&buffer[0..8], 12345i64.to_le_bytes());
    }

    #[test]
    fn bad_msg_id_corrects_time_offset() {
        let mut mtproto = Encrypted::build().finish(auth_key());
        let msg_id = mtproto.push(REQUEST).unwrap();
        mtproto.finalize().unwrap();

        // The server is an hour ahead, which is allowed for this message only.
        let body = tl::enums::BadMsgNotification::Notification(tl::types::BadMsgNotification {
            bad_msg_id: msg_id.0,
            bad_msg_seqno: 1,
            error_code: 16,
        })
        .to_bytes();
        let payload = server_payload(&mtproto, server_msg_id(3600, 1), 0, body);
        let result = mtproto.deserialize(&payload).unwrap();
        assert_eq!(result.len(), 1);
        assert!((3599..=3601).contains(&mtproto.time_offset()));

        let next = mtproto.push(REQUEST).unwrap();
        assert!((next.0 >> 32) - now_secs() >= 3599);
    }

    #[test]
    fn wrong_session_is_rejected() {
        let mut mtproto = Encrypted::build().finish(auth_key());
        let payload = envelope::encode(
            &mtproto.auth_key,
            &Envelope {
                salt: 0,
                session_id: mtproto.session_id.wrapping_add(1),
                msg_id: server_msg_id(0, 1),
                seq_no: 1,
                body: REQUEST.to_vec(),
            },
            Side::Server,
        );
        assert!(matches!(
            mtproto.deserialize(&payload),
            Err(DeserializeError::BadSessionId { .. })
        ));
    }

    #[test]
    fn stale_message_is_rejected() {
        let mut mtproto = Encrypted::build().finish(auth_key());
        let payload = server_payload(&mtproto, server_msg_id(-600, 1), 1, REQUEST.to_vec());
        let error = mtproto.deserialize(&payload).unwrap_err();
        assert!(matches!(error, DeserializeError::MessageIdOutOfWindow { .. }));
        assert!(error.is_security_violation());

        let payload = server_payload(&mtproto, server_msg_id(0, 1) - 1, 1, REQUEST.to_vec());
        assert!(matches!(
            mtproto.deserialize(&payload),
            Err(DeserializeError::BadMessageId { .. })
        ));
    }

    #[test]
    fn time_window_edges() {
        let now = 1_700_000_000;
        let at = |offset: i64| ((now + offset) << 32) | 1;

        for offset in [-301, 301, 3600] {
            assert!(!within_time_window(at(offset), now), "offset {offset}");
        }
        for offset in [-300, -299, 0, 299, 300] {
            assert!(within_time_window(at(offset), now), "offset {offset}");
        }
    }

    #[test]
    fn slightly_early_or_late_messages_are_accepted() {
        let mut mtproto = Encrypted::build().finish(auth_key());
        for (i, offset) in [299, -250].into_iter().enumerate() {
            let payload = server_payload(&mtproto, server_msg_id(offset, i as i64), 1, REQUEST.to_vec());
            assert_eq!(
                mtproto.deserialize(&payload),
                Ok(vec![Deserialization::Update(REQUEST.to_vec())])
            );
        }

        let payload = server_payload(&mtproto, server_msg_id(310, 9), 1, REQUEST.to_vec());
        assert!(matches!(
            mtproto.deserialize(&payload),
            Err(DeserializeError::MessageIdOutOfWindow { .. })
        ));
    }

    #[test]
    fn disabled_checks_accept_anything_authentic() {
        let mut mtproto = Encrypted::build()
            .security_checks(false)
            .finish(auth_key());
        let payload = server_payload(&mtproto, server_msg_id(-600, 1), 1, REQUEST.to_vec());
        assert_eq!(
            mtproto.deserialize(&payload),
            Ok(vec![Deserialization::Update(REQUEST.to_vec())])
        );

        let mut tampered = payload.clone();
        *tampered.last_mut().unwrap() ^= 1;
        assert_eq!(
            mtproto.deserialize(&tampered),
            Err(DeserializeError::BadMessageKey)
        );
    }

    #[test]
    fn duplicates_are_ignored() {
        let mut mtproto = Encrypted::build().finish(auth_key());
        let payload = server_payload(&mtproto, server_msg_id(0, 1), 1, REQUEST.to_vec());
        assert_eq!(
            mtproto.deserialize(&payload),
            Ok(vec![Deserialization::Update(REQUEST.to_vec())])
        );
        assert_eq!(mtproto.deserialize(&payload), Ok(vec![]));
    }

    #[test]
    fn state_request_is_answered() {
        let mut mtproto = Encrypted::build().finish(auth_key());
        let known = server_msg_id(0, 1);
        let payload = server_payload(&mtproto, known, 1, REQUEST.to_vec());
        mtproto.deserialize(&payload).unwrap();

        let req_id = server_msg_id(0, 2);
        let body = tl::enums::MsgsStateReq::Req(tl::types::MsgsStateReq {
            msg_ids: vec![known, 4, req_id + 1000],
        })
        .to_bytes();
        let payload = server_payload(&mtproto, req_id, 2, body);
        assert_eq!(mtproto.deserialize(&payload), Ok(vec![]));

        // Acknowledgement for the first message, then the answer.
        let (_, buffer) = mtproto.finalize_plain().unwrap();
        let expected = tl::enums::MsgsStateInfo::Info(tl::types::MsgsStateInfo {
            req_msg_id: req_id,
            info: vec![4, 1, 3],
        })
        .to_bytes();
        assert!(buffer.ends_with(&expected));
        assert_eq!(&buffer[MESSAGE_PREFIX_LEN + 16..MESSAGE_PREFIX_LEN + 20], MSG_CONTAINER_HEADER);
    }

    #[test]
    fn resend_and_new_session_are_reported() {
        let mut mtproto = Encrypted::build().finish(auth_key());
        let container = manual_tl::MessageContainer {
            messages: vec![
                manual_tl::Message {
                    msg_id: server_msg_id(0, 1),
                    seq_no: 1,
                    body: tl::enums::NewSession::Created(tl::types::NewSessionCreated {
                        first_msg_id: 100,
                        unique_id: 200,
                        server_salt: 300,
                    })
                    .to_bytes(),
                },
                manual_tl::Message {
                    msg_id: server_msg_id(0, 2),
                    seq_no: 3,
                    body: tl::enums::MsgResendReq::Req(tl::types::MsgResendReq {
                        msg_ids: vec![100, 104],
                    })
                    .to_bytes(),
                },
            ],
        };
        let payload = server_payload(&mtproto, server_msg_id(0, 3), 4, container.to_bytes());
        assert_eq!(
            mtproto.deserialize(&payload),
            Ok(vec![
                Deserialization::NewSession {
                    first_msg_id: MsgId(100)
                },
                Deserialization::ResendRequested(vec![MsgId(100), MsgId(104)]),
            ])
        );
        assert_eq!(mtproto.salt(), 300);
    }

    #[test]
    fn reset_starts_new_session() {
        let mut mtproto = Encrypted::build().first_salt(5).finish(auth_key());
        let session_id = mtproto.session_id();
        mtproto.push(REQUEST);
        mtproto.reset();

        assert_ne!(mtproto.session_id(), session_id);
        assert!(mtproto.finalize().is_none());
        assert_eq!(mtproto.salt(), 5);
    }
}
