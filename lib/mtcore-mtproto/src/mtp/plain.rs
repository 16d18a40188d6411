// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use super::{Deserialization, DeserializeError, Mtp};
use crate::MsgId;
use crate::tl::{Cursor, Deserializable, Serializable};

/// `auth_key_id`, `message_id` and `message_data_length`.
const HEADER_LEN: usize = 8 + 8 + 4;

/// [Unencrypted messages], used only while generating an authorization key.
///
/// Holds a single request at a time, and every answer is reported as the
/// result of message `0`.
///
/// [Unencrypted messages]: https://core.telegram.org/mtproto/description#unencrypted-message
#[non_exhaustive]
#[derive(Default)]
pub struct Plain {
    request: Option<Vec<u8>>,
}

impl Plain {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Mtp for Plain {
    fn push(&mut self, request: &[u8]) -> Option<MsgId> {
        match self.request {
            Some(_) => None,
            None => {
                self.request = Some(request.to_vec());
                Some(MsgId(0))
            }
        }
    }

    /// The server accepts a zero `message_id` here.
    fn finalize(&mut self) -> Option<(MsgId, Vec<u8>)> {
        let body = self.request.take()?;
        let mut payload = Vec::with_capacity(HEADER_LEN + body.len());
        0i64.serialize(&mut payload);
        0i64.serialize(&mut payload);
        (body.len() as i32).serialize(&mut payload);
        payload.extend(body);
        Some((MsgId(0), payload))
    }

    /// The clock may still be wrong, so the only check on `message_id` is
    /// that it is positive and marks a response (`1` modulo 4).
    fn deserialize(&mut self, payload: &[u8]) -> Result<Vec<Deserialization>, DeserializeError> {
        crate::utils::check_message_buffer(payload)?;
        let mut cursor = Cursor::from_slice(payload);

        match i64::deserialize(&mut cursor)? {
            0 => {}
            got => return Err(DeserializeError::BadAuthKey { got, expected: 0 }),
        }

        let msg_id = i64::deserialize(&mut cursor)?;
        if msg_id <= 0 || msg_id % 4 != 1 {
            return Err(DeserializeError::BadMessageId { got: msg_id });
        }

        let len = i32::deserialize(&mut cursor)?;
        if len <= 0 {
            return Err(DeserializeError::NegativeMessageLength { got: len });
        }
        let body = cursor
            .read_slice(len as usize)
            .map_err(|_| DeserializeError::TooLongMessageLength {
                got: len as usize,
                max_length: payload.len() - HEADER_LEN,
            })?;

        Ok(vec![Deserialization::RpcResult {
            msg_id: MsgId(0),
            body: body.to_vec(),
        }])
    }

    fn reset(&mut self) {
        self.request = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER_MSG_ID: i64 = 0x5f00_0000_0000_0001;

    fn server_message(auth_key_id: i64, msg_id: i64, len: i32, body: &[u8]) -> Vec<u8> {
        let mut payload = Vec::new();
        auth_key_id.serialize(&mut payload);
        msg_id.serialize(&mut payload);
        len.serialize(&mut payload);
        payload.extend_from_slice(body);
        payload
    }

    #[test]
    fn one_request_at_a_time() {
        let mut mtp = Plain::new();
        assert_eq!(mtp.push(b"abcd"), Some(MsgId(0)));
        assert_eq!(mtp.push(b"efgh"), None);

        let (msg_id, payload) = mtp.finalize().unwrap();
        assert_eq!(msg_id, MsgId(0));
        assert_eq!(payload, server_message(0, 0, 4, b"abcd"));
        assert!(mtp.finalize().is_none());

        assert!(mtp.push(b"efgh").is_some());
        mtp.reset();
        assert!(mtp.finalize().is_none());
    }

    #[test]
    fn answers_are_unwrapped() {
        let mut mtp = Plain::new();
        let payload = server_message(0, SERVER_MSG_ID, 4, b"resp");
        assert_eq!(
            mtp.deserialize(&payload),
            Ok(vec![Deserialization::RpcResult {
                msg_id: MsgId(0),
                body: b"resp".to_vec()
            }])
        );
    }

    #[test]
    fn malformed_answers_are_refused() {
        let mut mtp = Plain::new();
        let cases = [
            (
                server_message(1, SERVER_MSG_ID, 4, b"resp"),
                DeserializeError::BadAuthKey {
                    got: 1,
                    expected: 0,
                },
            ),
            (
                server_message(0, SERVER_MSG_ID + 3, 4, b"resp"),
                DeserializeError::BadMessageId {
                    got: SERVER_MSG_ID + 3,
                },
            ),
            (
                server_message(0, SERVER_MSG_ID, 0, b"resp"),
                DeserializeError::NegativeMessageLength { got: 0 },
            ),
            (
                server_message(0, SERVER_MSG_ID, 8, b"resp"),
                DeserializeError::TooLongMessageLength {
                    got: 8,
                    max_length: 4,
                },
            ),
            (vec![0; 8], DeserializeError::MessageBufferTooSmall),
        ];
        for (payload, error) in cases {
            assert_eq!(mtp.deserialize(&payload), Err(error));
        }
    }
}
