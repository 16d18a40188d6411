// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! RSA encryption of the handshake payloads, and the server keys it is
//! performed with.
use num_bigint::BigUint;

use crate::bigint::{mod_exp, to_padded_be};
use crate::sha1;

/// Maximum length of the data that can be encrypted with [`encrypt_hashed`].
///
/// The encrypted block is 255 bytes long, 20 of which are taken by the hash.
pub const MAX_DATA_LEN: usize = 255 - 20;

const PRODUCTION_N: &str = "29379598170669337022986177149456128565388431120058863768162556424047512191330847455146576344487764408661701890505066208632169112269581063774293102577308490531282748465986139880977280302242772832972539403531316010870401287642763009136156734339538042419388722777357134487746169093539093850251243897188928735903389451772730245253062963384108812842079887538976360465290946139638691491496062099570836476454855996319192747663615955633778034897140982517446405334423701359108810182097749467210509584293428076654573384828809574217079944388301239431309115013843331317877374435868468779972014486325557807783825502498215169806323";

const TEST_N: &str = "25342889448840415564971689590713473206898847759084779052582026594546022463853940585885215951168491965708222649399180603818074200620463776135424884632162512403163793083921641631564740959529419359595852941166848940585952337613333022396096584117954892216031229237302943701877588456738335398602461675225081791820393153757504952636234951323237820036543581047826906120927972487366805292115792231423684261262330394324750785450942589751755390156647751460719351439969059949569615302809050721500330239005077889855323917509948255722081644689442127297605422579707142646660768825302832201908302295573257427896031830742328565032949";

const EXPONENT: &str = "65537";

/// RSA public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Key {
    n: BigUint,
    e: BigUint,
    fingerprint: i64,
}

// Bytes serialized the way TL does: length prefix followed by padding to 4.
fn tl_bytes(data: &[u8], buffer: &mut Vec<u8>) {
    let len = if data.len() <= 253 {
        buffer.push(data.len() as u8);
        data.len() + 1
    } else {
        buffer.push(254);
        buffer.extend(&(data.len() as u32).to_le_bytes()[..3]);
        data.len()
    };
    buffer.extend(data);
    buffer.extend(std::iter::repeat_n(0, (4 - (len % 4)) % 4));
}

impl Key {
    /// Create a key from the decimal representation of its modulus and exponent.
    pub fn new(n: &str, e: &str) -> Option<Self> {
        Some(Self::from_parts(
            BigUint::parse_bytes(n.as_bytes(), 10)?,
            BigUint::parse_bytes(e.as_bytes(), 10)?,
        ))
    }

    pub fn from_parts(n: BigUint, e: BigUint) -> Self {
        // sha1(rsa_public_key n:bytes e:bytes)[12..20] as little-endian.
        let fingerprint = {
            let mut buffer = Vec::new();
            tl_bytes(&n.to_bytes_be(), &mut buffer);
            tl_bytes(&e.to_bytes_be(), &mut buffer);
            let sha = sha1!(&buffer);
            let mut id = [0; 8];
            id.copy_from_slice(&sha[12..20]);
            i64::from_le_bytes(id)
        };

        Self { n, e, fingerprint }
    }

    /// The fingerprint the server uses to refer to this key.
    pub fn fingerprint(&self) -> i64 {
        self.fingerprint
    }

    pub fn modulus(&self) -> &BigUint {
        &self.n
    }
}

/// The public keys Telegram uses in production and in the test servers.
pub fn known_keys() -> Vec<Key> {
    [PRODUCTION_N, TEST_N]
        .into_iter()
        .filter_map(|n| Key::new(n, EXPONENT))
        .collect()
}

/// Find the key with the given fingerprint.
pub fn key_for_fingerprint(keys: &[Key], fingerprint: i64) -> Option<&Key> {
    keys.iter().find(|k| k.fingerprint == fingerprint)
}

/// Encrypt the given data, prefixing it with a hash before, using RSA.
///
/// The block is `sha1(data) || data || random padding`, 255 bytes in total.
/// Returns `None` if `data` is longer than [`MAX_DATA_LEN`].
pub fn encrypt_hashed(data: &[u8], key: &Key, random_bytes: &[u8; 256]) -> Option<Vec<u8>> {
    if data.len() > MAX_DATA_LEN {
        return None;
    }

    let to_encrypt = {
        let mut buffer = Vec::with_capacity(255);
        buffer.extend(sha1!(data));
        buffer.extend(data);
        let padding_len = MAX_DATA_LEN - data.len();
        buffer.extend(&random_bytes[..padding_len]);
        buffer
    };

    let payload = BigUint::from_bytes_be(&to_encrypt);
    let encrypted = mod_exp(&payload, &key.e, &key.n);
    to_padded_be(&encrypted, 256)
}

/// Encrypt the data with the key matching `fingerprint`, if any.
pub fn encrypt(
    keys: &[Key],
    fingerprint: i64,
    data: &[u8],
    random_bytes: &[u8; 256],
) -> Option<Vec<u8>> {
    encrypt_hashed(data, key_for_fingerprint(keys, fingerprint)?, random_bytes)
}
