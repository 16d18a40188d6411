// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use crate::sha1;
use std::fmt;

/// A 2048-bit [authorization key] shared with one datacenter.
///
/// Only the first 64 bits of its hashes ever leave the process: the key id
/// prefixes every encrypted message. Equality compares key ids.
///
/// [authorization key]: https://core.telegram.org/mtproto/auth_key
#[derive(Clone)]
pub struct AuthKey {
    pub(crate) data: [u8; 256],
    pub(crate) aux_hash: [u8; 8],
    pub(crate) key_id: [u8; 8],
}

impl AuthKey {
    /// Wraps raw key material, deriving its identifiers from `SHA1(data)`:
    /// the auxiliary hash is the first 8 bytes and the key id the last 8.
    pub fn from_bytes(data: [u8; 256]) -> Self {
        let digest = sha1!(&data);
        let (aux_hash, key_id) = (take8(&digest[..8]), take8(&digest[12..]));
        Self {
            data,
            aux_hash,
            key_id,
        }
    }

    /// The raw key material, suitable for persisting.
    pub fn to_bytes(&self) -> [u8; 256] {
        self.data
    }

    pub fn key_id(&self) -> [u8; 8] {
        self.key_id
    }

    pub fn id(&self) -> i64 {
        i64::from_le_bytes(self.key_id)
    }

    pub fn aux_hash(&self) -> u64 {
        u64::from_le_bytes(self.aux_hash)
    }

    /// Hash the server sends back in `dh_gen_ok` (`number` 1),
    /// `dh_gen_retry` (2) or `dh_gen_fail` (3).
    pub fn calc_new_nonce_hash(&self, new_nonce: &[u8; 32], number: u8) -> [u8; 16] {
        let digest = sha1!(new_nonce, [number], &self.aux_hash);
        let mut hash = [0; 16];
        hash.copy_from_slice(&digest[4..]);
        hash
    }
}

fn take8(bytes: &[u8]) -> [u8; 8] {
    let mut out = [0; 8];
    out.copy_from_slice(bytes);
    out
}

impl PartialEq for AuthKey {
    fn eq(&self, other: &Self) -> bool {
        self.key_id == other.key_id
    }
}

impl Eq for AuthKey {}

// Never print the key material itself.
impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthKey({:016x})", self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting<const N: usize>() -> [u8; N] {
        std::array::from_fn(|i| i as u8)
    }

    #[test]
    fn identifiers_come_from_the_digest() {
        let key = AuthKey::from_bytes(counting());
        assert_eq!(key.aux_hash, [73, 22, 214, 189, 183, 247, 142, 104]);
        assert_eq!(key.key_id(), [50, 209, 88, 110, 164, 87, 223, 200]);
        assert_eq!(key.id(), i64::from_le_bytes(key.key_id()));
    }

    #[test]
    fn persisted_key_is_the_same_key() {
        let key = AuthKey::from_bytes(counting());
        let loaded = AuthKey::from_bytes(key.to_bytes());
        assert_eq!(loaded, key);
        assert_eq!(loaded.aux_hash(), key.aux_hash());
    }

    #[test]
    fn new_nonce_hashes() {
        let key = AuthKey::from_bytes(counting());
        let new_nonce = counting();
        let expected: [(u8, [u8; 16]); 3] = [
            (1, [194, 206, 210, 179, 62, 89, 58, 85, 210, 127, 74, 93, 171, 238, 124, 103]),
            (2, [244, 49, 142, 133, 189, 47, 243, 190, 132, 217, 254, 252, 227, 220, 227, 159]),
            (3, [75, 249, 215, 179, 125, 180, 19, 238, 67, 29, 40, 81, 118, 49, 203, 61]),
        ];
        for (number, hash) in expected {
            assert_eq!(key.calc_new_nonce_hash(&new_nonce, number), hash);
        }
    }

    #[test]
    fn debug_hides_the_key() {
        let key = AuthKey::from_bytes([0; 256]);
        let shown = format!("{key:?}");
        assert!(shown.starts_with("AuthKey("));
        assert!(shown.len() < 30);
    }
}
