// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Conversions between byte buffers and arbitrary-precision integers,
//! along with the modular arithmetic the key exchange needs.
//!
//! Signed buffers follow two's complement: a buffer of `n` bytes whose
//! most significant bit is set represents `value - 2^(8n)`.
use std::fmt;

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Signed, Zero};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The value needs more bytes than the requested length.
    Overflow { len: usize },

    /// A negative value cannot be written as unsigned.
    NegativeUnsigned,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Overflow { len } => write!(f, "value does not fit in {len} bytes"),
            Error::NegativeUnsigned => write!(f, "cannot write negative value as unsigned"),
        }
    }
}

/// Read an integer from the buffer.
///
/// `little` selects little-endian byte order and `signed` interprets the
/// buffer as two's complement.
pub fn read_bigint_from_buffer(buffer: &[u8], little: bool, signed: bool) -> BigInt {
    let unsigned = if little {
        BigUint::from_bytes_le(buffer)
    } else {
        BigUint::from_bytes_be(buffer)
    };

    let value = BigInt::from_biguint(Sign::Plus, unsigned);
    if signed && !buffer.is_empty() {
        let bits = buffer.len() as u64 * 8;
        if value.bit(bits - 1) {
            return value - (BigInt::one() << bits);
        }
    }
    value
}

/// Write an integer into a buffer of exactly `len` bytes.
///
/// Fails if the value does not fit, or if it is negative and `signed` is false.
pub fn read_buffer_from_bigint(
    value: &BigInt,
    len: usize,
    little: bool,
    signed: bool,
) -> Result<Vec<u8>, Error> {
    if !signed && value.is_negative() {
        return Err(Error::NegativeUnsigned);
    }

    let bits = len as u64 * 8;
    let fits = if signed {
        // -2^(bits-1) <= value < 2^(bits-1)
        bits > 0 && {
            let limit = BigInt::one() << (bits - 1);
            value < &limit && value >= &-limit
        }
    } else {
        value.bits() <= bits
    };
    if !fits {
        return Err(Error::Overflow { len });
    }

    let unsigned = if value.is_negative() {
        (value + (BigInt::one() << bits)).magnitude().clone()
    } else {
        value.magnitude().clone()
    };

    let mut buffer = unsigned.to_bytes_be();
    if buffer == [0] {
        buffer.clear();
    }
    let mut result = vec![0; len - buffer.len()];
    result.append(&mut buffer);
    if little {
        result.reverse();
    }
    Ok(result)
}

/// Modular exponentiation with a Montgomery ladder.
///
/// Every bit of the exponent costs exactly two multiplications, whatever
/// its value. `mod_exp(_, 0, m)` is `1` (unless `m == 1`) and any value
/// modulo one is zero. The modulus must not be zero.
pub fn mod_exp(base: &BigUint, exp: &BigUint, modulus: &BigUint) -> BigUint {
    if modulus.is_zero() {
        debug_assert!(false, "modulus must be non-zero");
        return BigUint::zero();
    }
    if modulus.is_one() {
        return BigUint::zero();
    }

    let mut r0 = BigUint::one();
    let mut r1 = base % modulus;
    for i in (0..exp.bits()).rev() {
        if exp.bit(i) {
            r0 = (&r0 * &r1) % modulus;
            r1 = (&r1 * &r1) % modulus;
        } else {
            r1 = (&r0 * &r1) % modulus;
            r0 = (&r0 * &r0) % modulus;
        }
    }
    r0
}

/// Greatest common divisor.
pub fn gcd(a: &BigUint, b: &BigUint) -> BigUint {
    let mut a = a.clone();
    let mut b = b.clone();
    while !b.is_zero() {
        let r = &a % &b;
        a = b;
        b = r;
    }
    a
}

/// Generate `len` cryptographically secure random bytes.
pub fn generate_random_bytes(len: usize) -> Vec<u8> {
    let mut buffer = vec![0; len];
    crate::fill_random(&mut buffer);
    buffer
}

/// Generate a random 64-bit integer.
pub fn generate_random_long() -> i64 {
    let mut buffer = [0; 8];
    crate::fill_random(&mut buffer);
    i64::from_le_bytes(buffer)
}

/// Generate a random integer in the range `[1, upper)`. `upper` must be greater than one.
pub fn generate_random_below(upper: &BigUint) -> BigUint {
    let len = upper.bits().div_ceil(8) as usize + 8;
    let value = BigUint::from_bytes_be(&generate_random_bytes(len));
    (value % (upper - 1u32)) + 1u32
}

/// Write an unsigned integer as big-endian padded to `len` bytes, or
/// `None` if it does not fit.
pub fn to_padded_be(value: &BigUint, len: usize) -> Option<Vec<u8>> {
    read_buffer_from_bigint(&BigInt::from_biguint(Sign::Plus, value.clone()), len, false, false).ok()
}
