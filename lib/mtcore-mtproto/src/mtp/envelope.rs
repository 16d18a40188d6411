// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The encrypted envelope every message travels in once an authorization
//! key exists.
//!
//! ```text
//! auth_key_id (8) | msg_key (16) | AES-IGE(
//!     salt (8) | session_id (8) | msg_id (8) | seq_no (4) | length (4) | body | padding
//! )
//! ```
use super::DeserializeError;
use crate::tl::{Cursor, Deserializable, Serializable};
use mtcore_crypto::{self as crypto, AuthKey, Side};

/// `salt`, `session_id`, `msg_id`, `seq_no` and `length`.
pub const HEADER_LEN: usize = 8 + 8 + 8 + 4 + 4;

/// `auth_key_id` and `msg_key`, in front of the ciphertext.
pub const PREFIX_LEN: usize = 8 + 16;

pub const MIN_PADDING: usize = 12;
pub const MAX_PADDING: usize = 1024;

/// A single decrypted message along with its routing information.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub salt: i64,
    pub session_id: i64,
    pub msg_id: i64,
    pub seq_no: i32,
    pub body: Vec<u8>,
}

impl Envelope {
    fn write_plaintext(&self, buffer: &mut Vec<u8>) {
        self.salt.serialize(buffer);
        self.session_id.serialize(buffer);
        self.msg_id.serialize(buffer);
        self.seq_no.serialize(buffer);
        (self.body.len() as i32).serialize(buffer);
        buffer.extend_from_slice(&self.body);
    }
}

/// Encrypt a whole plaintext (starting with the salt) as sent by `side`.
pub(crate) fn encrypt_plaintext(auth_key: &AuthKey, plaintext: &[u8], side: Side) -> Vec<u8> {
    crypto::encrypt_data_v2(plaintext, auth_key, side)
}

/// Serialize and encrypt the envelope as sent by `side`.
///
/// The body should be padded to 4 bytes, as every serialized object is.
pub fn encode(auth_key: &AuthKey, envelope: &Envelope, side: Side) -> Vec<u8> {
    let mut plaintext = Vec::with_capacity(HEADER_LEN + envelope.body.len());
    envelope.write_plaintext(&mut plaintext);
    encrypt_plaintext(auth_key, &plaintext, side)
}

/// Decrypt and validate a payload that was sent by `side`.
///
/// Everything that can be checked without knowing the session is checked
/// here: the key identifier, the message key, the inner length and the
/// size of the padding.
pub fn decode(auth_key: &AuthKey, payload: &[u8], side: Side) -> Result<Envelope, DeserializeError> {
    if payload.len() < PREFIX_LEN + HEADER_LEN {
        return Err(DeserializeError::MessageBufferTooSmall);
    }

    let mut key_id = [0; 8];
    key_id.copy_from_slice(&payload[..8]);
    if key_id != auth_key.key_id() {
        return Err(DeserializeError::BadAuthKey {
            got: i64::from_le_bytes(key_id),
            expected: auth_key.id(),
        });
    }

    let plaintext = crypto::decrypt_data_v2(payload, auth_key, side)?;

    let mut buffer = Cursor::from_slice(&plaintext);
    let salt = i64::deserialize(&mut buffer)?;
    let session_id = i64::deserialize(&mut buffer)?;
    let msg_id = i64::deserialize(&mut buffer)?;
    let seq_no = i32::deserialize(&mut buffer)?;
    let len = i32::deserialize(&mut buffer)?;

    if len < 0 || len % 4 != 0 || HEADER_LEN + len as usize > plaintext.len() {
        return Err(DeserializeError::BadMessageLength { got: len });
    }

    let padding = plaintext.len() - HEADER_LEN - len as usize;
    if !(MIN_PADDING..=MAX_PADDING).contains(&padding) {
        return Err(DeserializeError::BadPadding { got: padding });
    }

    Ok(Envelope {
        salt,
        session_id,
        msg_id,
        seq_no,
        body: plaintext[HEADER_LEN..HEADER_LEN + len as usize].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_key() -> AuthKey {
        let mut data = [0; 256];
        data.iter_mut()
            .enumerate()
            .for_each(|(i, x)| *x = (i * 7 % 256) as u8);
        AuthKey::from_bytes(data)
    }

    fn envelope() -> Envelope {
        Envelope {
            salt: 0x1122334455667788,
            session_id: -42,
            msg_id: 0x5f00000000000001,
            seq_no: 3,
            body: b"some request body...".to_vec(),
        }
    }

    #[test]
    fn decode_encoded() {
        let auth_key = auth_key();
        let payload = encode(&auth_key, &envelope(), Side::Server);
        assert_eq!(payload.len() % 16, 8);
        assert_eq!(decode(&auth_key, &payload, Side::Server), Ok(envelope()));
    }

    #[test]
    fn wrong_side_is_rejected() {
        let auth_key = auth_key();
        let payload = encode(&auth_key, &envelope(), Side::Client);
        assert_eq!(
            decode(&auth_key, &payload, Side::Server),
            Err(DeserializeError::BadMessageKey)
        );
    }

    #[test]
    fn flipped_bits_are_rejected() {
        let auth_key = auth_key();
        let payload = encode(&auth_key, &envelope(), Side::Server);

        for i in [8, 20, 24, 40, payload.len() - 1] {
            let mut tampered = payload.clone();
            tampered[i] ^= 0x01;
            let error = decode(&auth_key, &tampered, Side::Server).unwrap_err();
            assert_eq!(error, DeserializeError::BadMessageKey);
            assert!(error.is_security_violation());
        }
    }

    #[test]
    fn foreign_key_is_rejected() {
        let payload = encode(&auth_key(), &envelope(), Side::Server);
        let other = AuthKey::from_bytes([1; 256]);
        assert!(matches!(
            decode(&other, &payload, Side::Server),
            Err(DeserializeError::BadAuthKey { .. })
        ));
    }

    #[test]
    fn inconsistent_length_is_rejected() {
        let auth_key = auth_key();
        let mut plaintext = Vec::new();
        envelope().write_plaintext(&mut plaintext);
        plaintext[28..32].copy_from_slice(&1000i32.to_le_bytes());

        let payload = encrypt_plaintext(&auth_key, &plaintext, Side::Server);
        assert_eq!(
            decode(&auth_key, &payload, Side::Server),
            Err(DeserializeError::BadMessageLength { got: 1000 })
        );
    }

    #[test]
    fn short_padding_is_rejected() {
        let auth_key = auth_key();
        let mut plaintext = Vec::new();
        envelope().write_plaintext(&mut plaintext);
        // Claim the body is longer than it is, eating into the padding.
        let len = envelope().body.len() as i32 + 20;
        plaintext[28..32].copy_from_slice(&len.to_le_bytes());
        let padding = crypto::determine_padding_v2_length(plaintext.len()) - 20;

        let payload = encrypt_plaintext(&auth_key, &plaintext, Side::Server);
        assert_eq!(
            decode(&auth_key, &payload, Side::Server),
            Err(DeserializeError::BadPadding { got: padding })
        );
    }
}
