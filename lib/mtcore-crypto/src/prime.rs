// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Validation of the Diffie-Hellman parameters sent by the server.
//!
//! See <https://core.telegram.org/mtproto/auth_key#presenting-proof-of-work-server-authentication>
//! and <https://core.telegram.org/mtproto/security_guidelines>.
use std::fmt;

use num_bigint::BigUint;

/// The 2048-bit safe prime currently used by Telegram.
pub const KNOWN_DH_PRIME: [u8; 256] = [
    0xc7, 0x1c, 0xae, 0xb9, 0xc6, 0xb1, 0xc9, 0x04, 0x8e, 0x6c, 0x52, 0x2f,
    0x70, 0xf1, 0x3f, 0x73, 0x98, 0x0d, 0x40, 0x23, 0x8e, 0x3e, 0x21, 0xc1,
    0x49, 0x34, 0xd0, 0x37, 0x56, 0x3d, 0x93, 0x0f, 0x48, 0x19, 0x8a, 0x0a,
    0xa7, 0xc1, 0x40, 0x58, 0x22, 0x94, 0x93, 0xd2, 0x25, 0x30, 0xf4, 0xdb,
    0xfa, 0x33, 0x6f, 0x6e, 0x0a, 0xc9, 0x25, 0x13, 0x95, 0x43, 0xae, 0xd4,
    0x4c, 0xce, 0x7c, 0x37, 0x20, 0xfd, 0x51, 0xf6, 0x94, 0x58, 0x70, 0x5a,
    0xc6, 0x8c, 0xd4, 0xfe, 0x6b, 0x6b, 0x13, 0xab, 0xdc, 0x97, 0x46, 0x51,
    0x29, 0x69, 0x32, 0x84, 0x54, 0xf1, 0x8f, 0xaf, 0x8c, 0x59, 0x5f, 0x64,
    0x24, 0x77, 0xfe, 0x96, 0xbb, 0x2a, 0x94, 0x1d, 0x5b, 0xcd, 0x1d, 0x4a,
    0xc8, 0xcc, 0x49, 0x88, 0x07, 0x08, 0xfa, 0x9b, 0x37, 0x8e, 0x3c, 0x4f,
    0x3a, 0x90, 0x60, 0xbe, 0xe6, 0x7c, 0xf9, 0xa4, 0xa4, 0xa6, 0x95, 0x81,
    0x10, 0x51, 0x90, 0x7e, 0x16, 0x27, 0x53, 0xb5, 0x6b, 0x0f, 0x6b, 0x41,
    0x0d, 0xba, 0x74, 0xd8, 0xa8, 0x4b, 0x2a, 0x14, 0xb3, 0x14, 0x4e, 0x0e,
    0xf1, 0x28, 0x47, 0x54, 0xfd, 0x17, 0xed, 0x95, 0x0d, 0x59, 0x65, 0xb4,
    0xb9, 0xdd, 0x46, 0x58, 0x2d, 0xb1, 0x17, 0x8d, 0x16, 0x9c, 0x6b, 0xc4,
    0x65, 0xb0, 0xd6, 0xff, 0x9c, 0xa3, 0x92, 0x8f, 0xef, 0x5b, 0x9a, 0xe4,
    0xe4, 0x18, 0xfc, 0x15, 0xe8, 0x3e, 0xbe, 0xa0, 0xf8, 0x7f, 0xa9, 0xff,
    0x5e, 0xed, 0x70, 0x05, 0x0d, 0xed, 0x28, 0x49, 0xf4, 0x7b, 0xf9, 0x59,
    0xd9, 0x56, 0x85, 0x0c, 0xe9, 0x29, 0x85, 0x1f, 0x0d, 0x81, 0x15, 0xf6,
    0x35, 0xb1, 0x05, 0xee, 0x2e, 0x4e, 0x15, 0xd0, 0x4b, 0x24, 0x54, 0xbf,
    0x6f, 0x4f, 0xad, 0xf0, 0x34, 0xb1, 0x04, 0x03, 0x11, 0x9c, 0xd8, 0xe3,
    0xb9, 0x2f, 0xcc, 0x5b,
];

/// Generators accepted without further checks when paired with [`KNOWN_DH_PRIME`].
pub const KNOWN_GENERATORS: [u32; 4] = [3, 4, 5, 7];

/// Values exchanged with the server must be at least this many bits away
/// from both zero and the prime.
pub const MIN_DIFF_BITS: u64 = 2048 - 64;

/// Maximum size in bytes of a value exchanged with the server.
const MAX_MOD_EXP_SIZE: u64 = 256;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The prime is not a 2048-bit safe prime.
    BadPrime,

    /// The generator is out of range or does not generate the expected subgroup.
    BadGenerator { g: u32 },

    /// A public value is too close to zero or to the prime.
    BadModExp,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::BadPrime => write!(f, "the dh prime is not a 2048-bit safe prime"),
            Error::BadGenerator { g } => write!(f, "bad dh generator: {g}"),
            Error::BadModExp => write!(f, "dh value is outside of the safe range"),
        }
    }
}

pub fn known_dh_prime() -> BigUint {
    BigUint::from_bytes_be(&KNOWN_DH_PRIME)
}

/// Whether `g` generates a cyclic subgroup of prime order `(p - 1) / 2`,
/// judged by quadratic reciprocity.
fn check_generator_residue(p: &BigUint, g: u32) -> bool {
    let rem = |m: u32| (p % m).to_u32_digits().first().copied().unwrap_or(0);
    match g {
        2 => rem(8) == 7,
        3 => rem(3) == 2,
        4 => true,
        5 => matches!(rem(5), 1 | 4),
        6 => matches!(rem(24), 19 | 23),
        7 => matches!(rem(7), 3 | 5 | 6),
        _ => false,
    }
}

/// Check the prime and generator pair.
///
/// The well-known prime is accepted along with any of [`KNOWN_GENERATORS`].
/// Any other prime must be a 2048-bit safe prime, and `g` must satisfy the
/// residue conditions for it.
pub fn check_p_and_g(p: &BigUint, g: u32) -> Result<(), Error> {
    if p == &known_dh_prime() {
        return if KNOWN_GENERATORS.contains(&g) {
            Ok(())
        } else {
            Err(Error::BadGenerator { g })
        };
    }

    if p.bits() != 2048 {
        return Err(Error::BadPrime);
    }
    if !check_generator_residue(p, g) {
        return Err(Error::BadGenerator { g });
    }
    if !glass_pumpkin::safe_prime::check(p) {
        return Err(Error::BadPrime);
    }
    Ok(())
}

/// Check that `1 < value < prime - 1`.
pub fn is_good_large(value: &BigUint, prime: &BigUint) -> bool {
    value > &BigUint::from(1u32) && &(value + 1u32) < prime
}

/// Check that a public value (`g_a`, `g_b`) keeps enough distance from
/// both zero and the prime.
pub fn is_good_mod_exp_first(value: &BigUint, prime: &BigUint) -> bool {
    if value >= prime {
        return false;
    }
    let diff = prime - value;
    diff.bits() >= MIN_DIFF_BITS
        && value.bits() >= MIN_DIFF_BITS
        && value.bits().div_ceil(8) <= MAX_MOD_EXP_SIZE
}

/// Check a public value against the prime, combining every range check.
pub fn check_public_value(value: &BigUint, prime: &BigUint) -> Result<(), Error> {
    if is_good_large(value, prime) && is_good_mod_exp_first(value, prime) {
        Ok(())
    } else {
        Err(Error::BadModExp)
    }
}
