// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! AES-256 in [Infinite Garble Extension] mode, used by every encrypted
//! message and by the key exchange.
//!
//! Each ciphertext block is `E(p[i] ^ c[i - 1]) ^ p[i - 1]`, where the
//! 32-byte IV supplies `c[-1]` followed by `p[-1]`.
//!
//! [Infinite Garble Extension]: https://mgp25.com/blog/2015/06/21/AESIGE/

#![allow(deprecated)] // generic_array 0.14 re-exports, https://github.com/RustCrypto/block-ciphers/issues/509

use aes::Aes256;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

use crate::Error;

const BLOCK: usize = 16;

/// `c[-1]` and `p[-1]`.
fn split_iv(iv: &[u8; 32]) -> ([u8; BLOCK], [u8; BLOCK]) {
    let mut prev_cipher = [0; BLOCK];
    let mut prev_plain = [0; BLOCK];
    prev_cipher.copy_from_slice(&iv[..BLOCK]);
    prev_plain.copy_from_slice(&iv[BLOCK..]);
    (prev_cipher, prev_plain)
}

fn xor_in_place(block: &mut [u8], with: &[u8; BLOCK]) {
    block.iter_mut().zip(with).for_each(|(b, w)| *b ^= w);
}

fn check_aligned(buffer: &[u8]) -> Result<(), Error> {
    if buffer.len() % BLOCK == 0 {
        Ok(())
    } else {
        Err(Error::InvalidBuffer)
    }
}

/// Encrypts `buffer` in place. Its length must be a multiple of 16.
pub fn ige_encrypt(buffer: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) -> Result<(), Error> {
    check_aligned(buffer)?;
    ige_encrypt_unchecked(buffer, key, iv);
    Ok(())
}

/// Decrypts `buffer` in place. Its length must be a multiple of 16.
pub fn ige_decrypt(buffer: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) -> Result<(), Error> {
    check_aligned(buffer)?;
    ige_decrypt_unchecked(buffer, key, iv);
    Ok(())
}

// A trailing partial block is left untouched; callers check alignment.
pub(crate) fn ige_encrypt_unchecked(buffer: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) {
    debug_assert_eq!(buffer.len() % BLOCK, 0);
    let aes = Aes256::new(GenericArray::from_slice(key));
    let (mut prev_cipher, mut prev_plain) = split_iv(iv);

    for block in buffer.chunks_exact_mut(BLOCK) {
        let mut plain = [0; BLOCK];
        plain.copy_from_slice(block);

        xor_in_place(block, &prev_cipher);
        aes.encrypt_block(GenericArray::from_mut_slice(block));
        xor_in_place(block, &prev_plain);

        prev_cipher.copy_from_slice(block);
        prev_plain = plain;
    }
}

pub(crate) fn ige_decrypt_unchecked(buffer: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) {
    debug_assert_eq!(buffer.len() % BLOCK, 0);
    let aes = Aes256::new(GenericArray::from_slice(key));
    let (mut prev_cipher, mut prev_plain) = split_iv(iv);

    for block in buffer.chunks_exact_mut(BLOCK) {
        let mut cipher = [0; BLOCK];
        cipher.copy_from_slice(block);

        xor_in_place(block, &prev_plain);
        aes.decrypt_block(GenericArray::from_mut_slice(block));
        xor_in_place(block, &prev_cipher);

        prev_plain.copy_from_slice(block);
        prev_cipher = cipher;
    }
}
