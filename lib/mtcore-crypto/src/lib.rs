// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![deny(unsafe_code)]

//! Cryptographic building blocks for the Mobile Transport Protocol.
//!
//! This crate knows nothing about the wire format of messages. It only
//! deals with byte buffers, big integers and keys.

pub mod aes;
mod auth_key;
pub mod bigint;
pub mod factorize;
pub mod hex;
mod obfuscated;
pub mod prime;
pub mod rsa;
mod sha;
pub mod two_factor_auth;

use std::fmt;

pub use auth_key::AuthKey;
pub use obfuscated::ObfuscatedCipher;
pub use sha::pbkdf2_hmac_sha512;

/// Which end wrote a message. Keys are derived from different parts of the
/// authorization key in each direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

impl Side {
    /// Offset `x` into the authorization key used by key derivation.
    fn key_offset(self) -> usize {
        match self {
            Side::Client => 0,
            Side::Server => 8,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Ciphertext too short, or not a whole number of blocks.
    InvalidBuffer,

    /// The message was encrypted with another authorization key.
    AuthKeyMismatch,

    /// `msg_key` does not match the decrypted content.
    MessageKeyMismatch,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Error::InvalidBuffer => "ciphertext length is not block aligned",
            Error::AuthKeyMismatch => "message uses a different auth key id",
            Error::MessageKeyMismatch => "message key does not match the plaintext",
        })
    }
}

pub(crate) fn fill_random(buffer: &mut [u8]) {
    getrandom::fill(buffer).expect("operating system random source is unavailable");
}

/// Concatenates slices that add up to exactly 32 bytes.
fn join32(parts: &[&[u8]]) -> [u8; 32] {
    let mut out = [0; 32];
    let mut at = 0;
    for part in parts {
        out[at..at + part.len()].copy_from_slice(part);
        at += part.len();
    }
    debug_assert_eq!(at, out.len());
    out
}

/// Middle 16 bytes of `SHA256(auth_key[88 + x..120 + x] + padded_plaintext)`.
fn calc_msg_key(auth_key: &AuthKey, padded_plaintext: &[u8], side: Side) -> [u8; 16] {
    let x = side.key_offset();
    let large = sha256!(&auth_key.data[88 + x..120 + x], padded_plaintext);
    let mut msg_key = [0; 16];
    msg_key.copy_from_slice(&large[8..24]);
    msg_key
}

/// [AES key and IV] of a message, from its `msg_key`.
///
/// [AES key and IV]: https://core.telegram.org/mtproto/description#defining-aes-key-and-initialization-vector
fn calc_key(auth_key: &AuthKey, msg_key: &[u8; 16], side: Side) -> ([u8; 32], [u8; 32]) {
    let x = side.key_offset();
    let a = sha256!(msg_key, &auth_key.data[x..x + 36]);
    let b = sha256!(&auth_key.data[40 + x..76 + x], msg_key);

    let key = join32(&[&a[..8], &b[8..24], &a[24..]]);
    let iv = join32(&[&b[..8], &a[8..24], &b[24..]]);
    (key, iv)
}

/// Random bytes appended to a plaintext of `len` bytes: between 17 and 32,
/// so the total is block aligned and within the 12 to 1024 bytes required.
pub fn determine_padding_v2_length(len: usize) -> usize {
    32 - len % 16
}

fn encrypt_padded_data_v2(padded_plaintext: &[u8], auth_key: &AuthKey, side: Side) -> Vec<u8> {
    let msg_key = calc_msg_key(auth_key, padded_plaintext, side);
    let (key, iv) = calc_key(auth_key, &msg_key, side);

    let mut out = Vec::with_capacity(24 + padded_plaintext.len());
    out.extend(auth_key.key_id);
    out.extend(msg_key);
    out.extend(padded_plaintext);
    aes::ige_encrypt_unchecked(&mut out[24..], &key, &iv);
    out
}

/// Encrypts `plaintext` as written by `side`, after appending random padding.
///
/// The output is `auth_key_id + msg_key + encrypted_data`.
pub fn encrypt_data_v2(plaintext: &[u8], auth_key: &AuthKey, side: Side) -> Vec<u8> {
    let mut padded = plaintext.to_vec();
    padded.resize(plaintext.len() + determine_padding_v2_length(plaintext.len()), 0);
    fill_random(&mut padded[plaintext.len()..]);
    encrypt_padded_data_v2(&padded, auth_key, side)
}

/// Reverses [`encrypt_data_v2`] for a message written by `side`.
///
/// Fails unless the key id is ours and `msg_key` matches the decrypted
/// bytes. The padding is left in place.
pub fn decrypt_data_v2(ciphertext: &[u8], auth_key: &AuthKey, side: Side) -> Result<Vec<u8>, Error> {
    let body_len = ciphertext.len().checked_sub(24).ok_or(Error::InvalidBuffer)?;
    if body_len % 16 != 0 {
        return Err(Error::InvalidBuffer);
    }

    let (key_id, rest) = ciphertext.split_at(8);
    if key_id != auth_key.key_id {
        return Err(Error::AuthKeyMismatch);
    }
    let (msg_key, encrypted) = rest.split_at(16);
    let mut expected = [0; 16];
    expected.copy_from_slice(msg_key);

    let (key, iv) = calc_key(auth_key, &expected, side);
    let mut plaintext = encrypted.to_vec();
    aes::ige_decrypt_unchecked(&mut plaintext, &key, &iv);

    if calc_msg_key(auth_key, &plaintext, side) == expected {
        Ok(plaintext)
    } else {
        Err(Error::MessageKeyMismatch)
    }
}

/// Temporary AES key and IV protecting `server_DH_inner_data` and
/// `client_DH_inner_data` during key generation.
pub fn generate_key_data_from_nonce(
    server_nonce: &[u8; 16],
    new_nonce: &[u8; 32],
) -> ([u8; 32], [u8; 32]) {
    let new_server = sha1!(new_nonce, server_nonce);
    let server_new = sha1!(server_nonce, new_nonce);
    let new_new = sha1!(new_nonce, new_nonce);

    let key = join32(&[&new_server, &server_new[..12]]);
    let iv = join32(&[&server_new[12..], &new_new, &new_nonce[..4]]);
    (key, iv)
}

/// AES-256-IGE over a buffer that must be block aligned.
pub fn encrypt_ige(plaintext: &[u8], key: &[u8; 32], iv: &[u8; 32]) -> Result<Vec<u8>, Error> {
    let mut buffer = plaintext.to_vec();
    aes::ige_encrypt(&mut buffer, key, iv)?;
    Ok(buffer)
}

pub fn decrypt_ige(ciphertext: &[u8], key: &[u8; 32], iv: &[u8; 32]) -> Result<Vec<u8>, Error> {
    let mut buffer = ciphertext.to_vec();
    aes::ige_decrypt(&mut buffer, key, iv)?;
    Ok(buffer)
}
