// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use super::{Error, Tagged, Transport, UnpackedOffset};
use bytes::BytesMut;
use log::debug;
use mtcore_crypto::ObfuscatedCipher;

/// [Transport obfuscation]: the bytes of a tagged transport, hidden behind
/// AES-256-CTR.
///
/// The connection opens with a random 64-byte header carrying the keys for
/// both directions and, encrypted, the tag of the inner transport. After
/// that every byte in either direction goes through the cipher.
///
/// [Transport obfuscation]: https://core.telegram.org/mtproto/mtproto-transports#transport-obfuscation
pub struct Obfuscated<T: Transport + Tagged> {
    inner: T,
    /// Header not sent yet.
    header: Option<[u8; 64]>,
    cipher: ObfuscatedCipher,
    /// Length of the already decrypted prefix of the read buffer.
    decrypted: usize,
}

/// Header starts that would make the connection look like something else,
/// be it HTTP, TLS or an unobfuscated transport.
const RESERVED_PREFIXES: [&[u8; 4]; 7] = [
    b"HEAD",
    b"POST",
    b"GET ",
    b"OPTI",
    &[0x16, 0x03, 0x01, 0x02],
    &[0xdd; 4],
    &[0xee; 4],
];

fn acceptable_header(header: &[u8; 64]) -> bool {
    // 0xef opens an abridged connection and zero at 4..8 a full one.
    header[0] != 0xef
        && header[4..8] != [0; 4]
        && RESERVED_PREFIXES.iter().all(|prefix| header[..4] != prefix[..])
}

impl<T: Transport + Tagged> Obfuscated<T> {
    pub fn new(mut inner: T) -> Self {
        let (header, cipher) = Self::handshake(&mut inner);
        Self {
            inner,
            header: Some(header),
            cipher,
            decrypted: 0,
        }
    }

    /// A fresh header and the cipher it sets up. Only the last 8 bytes of
    /// the header travel encrypted.
    fn handshake(inner: &mut T) -> ([u8; 64], ObfuscatedCipher) {
        let mut header = crate::utils::random_array::<64>();
        while !acceptable_header(&header) {
            header = crate::utils::random_array();
        }
        header[56..60].copy_from_slice(&inner.init_tag());

        let mut cipher = ObfuscatedCipher::new(&header);
        let mut encrypted = header;
        cipher.encrypt(&mut encrypted);
        header[56..].copy_from_slice(&encrypted[56..]);
        (header, cipher)
    }
}

impl<T: Transport + Tagged> Transport for Obfuscated<T> {
    fn pack(&mut self, input: &[u8], output: &mut BytesMut) {
        if let Some(header) = self.header.take() {
            output.extend_from_slice(&header);
        }
        let start = output.len();
        self.inner.pack(input, output);
        self.cipher.encrypt(&mut output[start..]);
    }

    /// The caller keeps unconsumed bytes at the start of `buffer` between
    /// calls, so only what arrived since the last call is decrypted.
    fn unpack(&mut self, buffer: &mut [u8]) -> Result<UnpackedOffset, Error> {
        let fresh = self.decrypted.min(buffer.len());
        self.cipher.decrypt(&mut buffer[fresh..]);
        self.decrypted = buffer.len();

        let offset = self.inner.unpack(buffer)?;
        self.decrypted -= offset.next_offset;
        Ok(offset)
    }

    fn reset(&mut self) {
        debug!("new obfuscation keys for the next connection");
        self.inner.reset();
        let (header, cipher) = Self::handshake(&mut self.inner);
        self.header = Some(header);
        self.cipher = cipher;
        self.decrypted = 0;
    }
}
