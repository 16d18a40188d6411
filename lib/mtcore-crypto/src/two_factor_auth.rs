// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Secure Remote Password computations for accounts protected by a
//! [two-step verification] password.
//!
//! [two-step verification]: https://core.telegram.org/api/srp
use num_bigint::BigUint;

use crate::bigint::{mod_exp, to_padded_be};
use crate::prime::{self, check_p_and_g, check_public_value};
use crate::{pbkdf2_hmac_sha512, sha256};

/// Iterations used to stretch the password.
pub const PBKDF2_ITERATIONS: u32 = 100000;

/// Compute `(M1, g_a)` for the password check.
///
/// `a` is the secret random exponent. No validation is made on the server
/// parameters, see [`calculate_2fa_checked`] for that.
pub fn calculate_2fa(
    salt1: &[u8],
    salt2: &[u8],
    g: u32,
    p: &[u8],
    g_b: &[u8],
    a: &[u8],
    password: &[u8],
) -> (Vec<u8>, Vec<u8>) {
    // Prepare our parameters
    let g_b = pad_to_256(g_b);
    let a = pad_to_256(a);
    let p = pad_to_256(p);
    let g_for_hash = pad_to_256(&g.to_be_bytes());

    let big_g_b = BigUint::from_bytes_be(&g_b);
    let big_g = BigUint::from(g);
    let big_a = BigUint::from_bytes_be(&a);
    let big_p = BigUint::from_bytes_be(&p);

    // k := H(p | g)
    let big_k = BigUint::from_bytes_be(&sha256!(&p, &g_for_hash));

    // g_a := pow(g, a) mod p
    let g_a = pad_to_256(&mod_exp(&big_g, &big_a, &big_p).to_bytes_be());

    // u := H(g_a | g_b)
    let u = BigUint::from_bytes_be(&sha256!(&g_a, &g_b));

    // x := PH2(password, salt1, salt2)
    let x = BigUint::from_bytes_be(&ph2(password, salt1, salt2));

    // v := pow(g, x) mod p
    let big_v = mod_exp(&big_g, &x, &big_p);

    // k_v := (k * v) mod p
    let k_v = (big_k * big_v) % &big_p;

    // t := (g_b - k_v) mod p, kept positive
    let big_t = if big_g_b >= k_v {
        (big_g_b - k_v) % &big_p
    } else {
        (&big_p - (k_v - big_g_b) % &big_p) % &big_p
    };

    // s_a := pow(t, a + u * x) mod p
    let big_s_a = mod_exp(&big_t, &(big_a + u * x), &big_p);

    // k_a := H(s_a)
    let k_a = sha256!(&pad_to_256(&big_s_a.to_bytes_be()));

    // M1 := H(H(p) xor H(g) | H(salt1) | H(salt2) | g_a | g_b | k_a)
    let p_xor_g = xor(&sha256!(&p), &sha256!(&g_for_hash));
    let m1 = sha256!(&p_xor_g, sha256!(salt1), sha256!(salt2), &g_a, &g_b, k_a).to_vec();

    (m1, g_a)
}

/// Like [`calculate_2fa`], but refusing to work with unsafe parameters
/// (the same checks performed during the key exchange).
pub fn calculate_2fa_checked(
    salt1: &[u8],
    salt2: &[u8],
    g: u32,
    p: &[u8],
    g_b: &[u8],
    a: &[u8],
    password: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), prime::Error> {
    let big_p = BigUint::from_bytes_be(p);
    check_p_and_g(&big_p, g)?;
    check_public_value(&BigUint::from_bytes_be(g_b), &big_p)?;

    let (m1, g_a) = calculate_2fa(salt1, salt2, g, p, g_b, a, password);
    check_public_value(&BigUint::from_bytes_be(&g_a), &big_p)?;
    Ok((m1, g_a))
}

// SH(data, salt) := H(salt | data | salt)
fn sh(data: &[u8], salt: &[u8]) -> [u8; 32] {
    sha256!(salt, data, salt)
}

// PH1(password, salt1, salt2) := SH(SH(password, salt1), salt2)
fn ph1(password: &[u8], salt1: &[u8], salt2: &[u8]) -> [u8; 32] {
    sh(&sh(password, salt1), salt2)
}

// PH2(password, salt1, salt2)
//                      := SH(pbkdf2(sha512, PH1(password, salt1, salt2), salt1, 100000), salt2)
fn ph2(password: &[u8], salt1: &[u8], salt2: &[u8]) -> [u8; 32] {
    let hash1 = ph1(password, salt1, salt2);
    let dk = pbkdf2_hmac_sha512(&hash1, salt1, PBKDF2_ITERATIONS);
    sh(&dk, salt2)
}

fn xor(left: &[u8; 32], right: &[u8; 32]) -> Vec<u8> {
    left.iter().zip(right.iter()).map(|(&x1, &x2)| x1 ^ x2).collect()
}

// Values longer than 256 bytes are left untouched.
fn pad_to_256(data: &[u8]) -> Vec<u8> {
    let value = BigUint::from_bytes_be(data);
    to_padded_be(&value, 256).unwrap_or_else(|| data.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_calculations() {
        let salt1 = [1];
        let salt2 = [2];
        let g = 3;
        let p = pad_to_256(&[4]);
        let g_b = [5];
        let a = [6];
        let password = [7];

        let (m1, g_a) = calculate_2fa(&salt1, &salt2, g, &p, &g_b, &a, &password);

        let expected_m1 = vec![
            113, 194, 128, 151, 4, 153, 170, 134, 32, 95, 223, 56, 223, 136, 52, 244, 208, 194,
            114, 97, 231, 249, 72, 123, 225, 229, 225, 113, 128, 184, 98, 51,
        ];
        let expected_g_a = vec![
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1,
        ];

        assert_eq!(expected_m1, m1);
        assert_eq!(expected_g_a, g_a);
    }

    #[test]
    fn checked_rejects_bad_prime() {
        let p = pad_to_256(&[4]);
        assert_eq!(
            calculate_2fa_checked(&[1], &[2], 3, &p, &[5], &[6], &[7]),
            Err(prime::Error::BadPrime)
        );
    }

    #[test]
    fn checked_rejects_small_g_b() {
        let p = prime::KNOWN_DH_PRIME;
        assert_eq!(
            calculate_2fa_checked(&[1], &[2], 3, &p, &[5], &[6], &[7]),
            Err(prime::Error::BadModExp)
        );
    }

    #[test]
    fn checked_matches_unchecked() {
        let p = prime::KNOWN_DH_PRIME;
        let a = crate::bigint::generate_random_bytes(256);
        let b = crate::bigint::generate_random_bytes(256);
        let g_b = mod_exp(
            &BigUint::from(3u32),
            &BigUint::from_bytes_be(&b),
            &BigUint::from_bytes_be(&p),
        )
        .to_bytes_be();

        let unchecked = calculate_2fa(b"salt1", b"salt2", 3, &p, &g_b, &a, b"hunter2");
        let checked =
            calculate_2fa_checked(b"salt1", b"salt2", 3, &p, &g_b, &a, b"hunter2").unwrap();
        assert_eq!(checked, unchecked);
    }
}
