// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use std::fmt;

/// How many different polynomials `x^2 + c` are tried before giving up.
pub const MAX_ATTEMPTS: usize = 5;

/// How many polynomial evaluations a single attempt may perform.
///
/// The `pq` sent by Telegram is the product of two 32-bit primes, which
/// needs around `2^16` evaluations in the worst case.
pub const MAX_ITERATIONS: u64 = 1 << 22;

/// How many steps are accumulated before computing a GCD.
const BATCH_SIZE: u128 = 128;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The input is too small, or prime.
    NoFactorFound { pq: u64 },

    /// Every attempt exceeded the iteration limit.
    IterationLimit { pq: u64 },
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NoFactorFound { pq } => write!(f, "no factor found for {pq}"),
            Error::IterationLimit { pq } => {
                write!(f, "factorization of {pq} exceeded the iteration limit")
            }
        }
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let (na, nb) = (b, a % b);
        a = na;
        b = nb;
    }
    a
}

fn abs_sub(a: u128, b: u128) -> u128 {
    a.max(b) - a.min(b)
}

fn random_below(upper: u64) -> u64 {
    let mut buffer = [0; 8];
    crate::fill_random(&mut buffer);
    u64::from_le_bytes(buffer) % upper
}

/// Factorize the given number into its two prime factors, `p <= q`.
///
/// The algorithm here is a faster variant of [Pollard's rho algorithm],
/// published by [Richard Brent], based on
/// <https://comeoncodeon.wordpress.com/2010/09/18/pollard-rho-brent-integer-factorization/>.
///
/// Every attempt starts from a random point with a random polynomial and is
/// bounded by [`MAX_ITERATIONS`], so malformed input cannot hang the caller.
///
/// Pollard's rho algorithm: <https://en.wikipedia.org/wiki/Pollard%27s_rho_algorithm>
/// Richard Brent: <https://maths-people.anu.edu.au/~brent/pd/rpb051i.pdf>
pub fn factorize(pq: u64) -> Result<(u64, u64), Error> {
    if pq < 4 {
        return Err(Error::NoFactorFound { pq });
    }
    if pq % 2 == 0 {
        return Ok((2, pq / 2));
    }

    let mut exhausted = false;
    for _ in 0..MAX_ATTEMPTS {
        // > Note that this algorithm may not find the factors and will return failure for composite n.
        // > In that case, use a different f(x) and try again [...] We choose f(x) = x*x + c
        let x0 = 1 + random_below(pq - 1);
        let c = 1 + random_below(pq - 1);
        match factorize_with_param(pq, x0, c) {
            Some(p) if p != 1 && p != pq => {
                let q = pq / p;
                return Ok((p.min(q), p.max(q)));
            }
            Some(_) => {}
            None => exhausted = true,
        }
    }

    if exhausted {
        Err(Error::IterationLimit { pq })
    } else {
        Err(Error::NoFactorFound { pq })
    }
}

/// Returns the divisor found (possibly trivial), or `None` if the
/// iteration limit was hit.
#[allow(clippy::many_single_char_names)]
fn factorize_with_param(pq: u64, x0: u64, c: u64) -> Option<u64> {
    let pq = pq as u128;
    let c = c as u128;
    let f = |y: u128| (y * y + c) % pq;

    let mut iterations = 0u64;
    let mut y = x0 as u128;
    let mut g = 1u128;
    let mut r = 1u128;
    let mut q = 1u128;
    let mut x = 0u128;
    let mut ys = 0u128;

    while g == 1 {
        x = y;
        for _ in 0..r {
            y = f(y);
        }

        let mut k = 0;
        while k < r && g == 1 {
            ys = y;
            for _ in 0..BATCH_SIZE.min(r - k) {
                y = f(y);
                q = (q * abs_sub(x, y)) % pq;
            }

            g = gcd(q, pq);
            k += BATCH_SIZE;
        }

        iterations += 2 * r as u64;
        if iterations > MAX_ITERATIONS {
            return None;
        }
        r *= 2;
    }

    // The batch overshot, walk it again one step at a time.
    if g == pq {
        loop {
            ys = f(ys);
            g = gcd(abs_sub(x, ys), pq);
            if g > 1 {
                break;
            }

            iterations += 1;
            if iterations > MAX_ITERATIONS {
                return None;
            }
        }
    }

    Some(g as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factorization_1() {
        let pq = factorize(1470626929934143021);
        assert_eq!(pq, Ok((1206429347, 1218991343)));
    }

    #[test]
    fn test_factorization_2() {
        let pq = factorize(2363612107535801713);
        assert_eq!(pq, Ok((1518968219, 1556064227)));
    }

    #[test]
    fn test_factorization_3() {
        let pq = factorize(2804275833720261793);
        assert_eq!(pq, Ok((1555252417, 1803100129)));
    }

    #[test]
    fn test_factorization_small() {
        assert_eq!(factorize(1000003 * 1000033), Ok((1000003, 1000033)));
    }

    #[test]
    fn test_factorization_even() {
        assert_eq!(factorize(2 * 1000000007), Ok((2, 1000000007)));
        assert_eq!(factorize(4), Ok((2, 2)));
    }

    #[test]
    fn test_factorization_prime() {
        assert_eq!(
            factorize(1000003),
            Err(Error::NoFactorFound { pq: 1000003 })
        );
    }

    #[test]
    fn test_factorization_tiny() {
        assert_eq!(factorize(1), Err(Error::NoFactorFound { pq: 1 }));
        assert_eq!(factorize(3), Err(Error::NoFactorFound { pq: 3 }));
    }
}
