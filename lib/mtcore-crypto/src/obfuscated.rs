// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#[allow(deprecated)] // see https://github.com/RustCrypto/block-ciphers/issues/509
use aes::cipher::{KeyIvInit, StreamCipher, generic_array::GenericArray};

type Ctr = ctr::Ctr128BE<aes::Aes256>;

#[allow(deprecated)] // see https://github.com/RustCrypto/block-ciphers/issues/509
fn ctr_from(material: &[u8]) -> Ctr {
    Ctr::new(
        GenericArray::from_slice(&material[8..40]),
        GenericArray::from_slice(&material[40..56]),
    )
}

/// The AES-256-CTR cipher used by Telegram to hide traffic when using the
/// obfuscated transport.
///
/// The counter is a 128-bit big-endian value. Both directions derive their
/// key and IV from the same 64-byte initialization header: one reads it
/// forwards and the other reads it reversed.
pub struct ObfuscatedCipher {
    rx: Ctr,
    tx: Ctr,
}

impl ObfuscatedCipher {
    /// Cipher for the client, the side that generated `init`.
    pub fn new(init: &[u8; 64]) -> Self {
        let init_rev = init.iter().copied().rev().collect::<Vec<_>>();
        Self {
            rx: ctr_from(&init_rev),
            tx: ctr_from(init),
        }
    }

    /// Cipher for the server, the side that received `init`.
    pub fn new_server(init: &[u8; 64]) -> Self {
        let init_rev = init.iter().copied().rev().collect::<Vec<_>>();
        Self {
            rx: ctr_from(init),
            tx: ctr_from(&init_rev),
        }
    }

    pub fn encrypt(&mut self, buffer: &mut [u8]) {
        self.tx.apply_keystream(buffer);
    }

    pub fn decrypt(&mut self, buffer: &mut [u8]) {
        self.rx.apply_keystream(buffer);
    }
}
