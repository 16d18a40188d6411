// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The [key exchange] that produces an authorization key over plain messages.
//!
//! The exchange is three round trips. Every step takes the state returned by
//! the one before it together with the server's answer, and yields the next
//! request to send. Any error ends the attempt; a new one begins at [`step1`].
//!
//! ```no_run
//! use mtcore_crypto::rsa;
//! use mtcore_mtproto::authentication::{self, Error, KeyKind};
//!
//! fn round_trip(request: &[u8]) -> Result<Vec<u8>, Error> {
//!     unimplemented!()
//! }
//!
//! fn exchange() -> Result<[u8; 256], Error> {
//!     let (request, pending) = authentication::step1(KeyKind::Permanent { dc_id: 2 })?;
//!     let (request, pending) =
//!         authentication::step2(pending, &round_trip(&request)?, &rsa::known_keys())?;
//!     let (request, pending) = authentication::step3(pending, &round_trip(&request)?)?;
//!     let done = authentication::create_key(pending, &round_trip(&request)?)?;
//!     Ok(done.auth_key)
//! }
//! ```
//!
//! [key exchange]: https://core.telegram.org/mtproto/auth_key
use crate::tl::{self, Cursor, Deserializable, RemoteCall, Serializable};
use crate::utils;
use log::{debug, trace};
use mtcore_crypto::bigint::{mod_exp, to_padded_be};
use mtcore_crypto::factorize::{self, factorize};
use mtcore_crypto::{hex, prime, rsa, AuthKey};
use num_bigint::BigUint;
use sha1::{Digest, Sha1};
use std::fmt;

// Dumps every random input and message of the exchange at trace level,
// secrets included. Only flip it locally to capture new test vectors.
const DUMP_EXCHANGE: bool = false;

/// How many times the whole exchange may be started over after the server
/// answers with `dh_gen_retry`.
pub const MAX_HANDSHAKE_ATTEMPTS: usize = 5;

/// Why an authorization key could not be created.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// An answer could not be parsed as the type its request returns.
    InvalidResponse { error: tl::deserialize::Error },

    /// `nonce` in an answer differs from the one chosen in [`step1`].
    InvalidNonce { got: [u8; 16], expected: [u8; 16] },

    /// `pq` was not 8 bytes long.
    InvalidPQSize { size: usize },

    Factorization { error: factorize::Error },

    /// The server offered no RSA key we have.
    UnknownFingerprints { fingerprints: Vec<i64> },

    /// `p_q_inner_data` is too big for an RSA block.
    RsaEncryption,

    /// The server answered `server_DH_params_fail`.
    DhParamsFail,

    /// `server_nonce` in an answer differs from the first one received.
    InvalidServerNonce { got: [u8; 16], expected: [u8; 16] },

    /// `encrypted_answer` is not a whole number of AES blocks.
    EncryptedResponseNotPadded { len: usize },

    /// The decrypted answer is not a `server_DH_inner_data`.
    InvalidDhInnerData { error: tl::deserialize::Error },

    /// `dh_prime` or `g` failed validation.
    InvalidDhPrime { error: prime::Error },

    /// `g_a` or `g_b` (named by `name`) lies outside `(2^1984, dh_prime - 2^1984)`.
    GParameterOutOfRange { name: &'static str },

    /// The server answered `dh_gen_retry`; the caller may begin again.
    DhGenRetry,

    /// The server answered `dh_gen_fail`.
    DhGenFail,

    /// The SHA1 prefixing the decrypted answer does not match its content.
    InvalidAnswerHash { got: [u8; 20], expected: [u8; 20] },

    /// `new_nonce_hash` does not prove the server derived the same key.
    InvalidNewNonceHash { got: [u8; 16], expected: [u8; 16] },
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("key exchange failed: ")?;
        match self {
            Self::InvalidResponse { error } => write!(f, "unreadable answer ({error})"),
            Self::InvalidNonce { got, expected } => write!(
                f,
                "nonce {} instead of {}",
                hex::to_hex(got),
                hex::to_hex(expected)
            ),
            Self::InvalidPQSize { size } => write!(f, "pq is {size} bytes instead of 8"),
            Self::Factorization { error } => write!(f, "{error}"),
            Self::UnknownFingerprints { fingerprints } => {
                write!(f, "no known key among fingerprints {fingerprints:?}")
            }
            Self::RsaEncryption => f.write_str("inner data does not fit an RSA block"),
            Self::DhParamsFail => f.write_str("server refused to send DH parameters"),
            Self::InvalidServerNonce { got, expected } => write!(
                f,
                "server nonce {} instead of {}",
                hex::to_hex(got),
                hex::to_hex(expected)
            ),
            Self::EncryptedResponseNotPadded { len } => {
                write!(f, "encrypted answer of {len} bytes is not block aligned")
            }
            Self::InvalidDhInnerData { error } => write!(f, "unreadable DH inner data ({error})"),
            Self::InvalidDhPrime { error } => write!(f, "{error}"),
            Self::GParameterOutOfRange { name } => write!(f, "{name} outside the safe range"),
            Self::DhGenRetry => f.write_str("server asked to retry"),
            Self::DhGenFail => f.write_str("server rejected the key"),
            Self::InvalidAnswerHash { got, expected } => write!(
                f,
                "answer hash {} instead of {}",
                hex::to_hex(got),
                hex::to_hex(expected)
            ),
            Self::InvalidNewNonceHash { got, expected } => write!(
                f,
                "new nonce hash {} instead of {}",
                hex::to_hex(got),
                hex::to_hex(expected)
            ),
        }
    }
}

impl From<tl::deserialize::Error> for Error {
    fn from(error: tl::deserialize::Error) -> Self {
        Self::InvalidResponse { error }
    }
}

impl Error {
    /// Whether the server failed a check that an honest one always passes,
    /// rather than merely refusing or asking to retry.
    pub fn is_security_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidNonce { .. }
                | Self::InvalidServerNonce { .. }
                | Self::InvalidAnswerHash { .. }
                | Self::InvalidNewNonceHash { .. }
                | Self::InvalidDhPrime { .. }
                | Self::GParameterOutOfRange { .. }
        )
    }
}

/// The kind of authorization key to generate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    /// Permanent and not tied to a datacenter (`p_q_inner_data`).
    Legacy,

    /// Permanent, for `dc_id` (`p_q_inner_data_dc`).
    Permanent { dc_id: i32 },

    /// Forgotten by the server after `expires_in` seconds
    /// (`p_q_inner_data_temp_dc`).
    Temporary { dc_id: i32, expires_in: i32 },
}

/// State between [`step1`] and [`step2`].
pub struct Step1 {
    nonce: [u8; 16],
    kind: KeyKind,
}

/// State between [`step2`] and [`step3`].
pub struct Step2 {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    new_nonce: [u8; 32],
}

/// State between [`step3`] and [`create_key`].
pub struct Step3 {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    new_nonce: [u8; 32],
    gab: BigUint,
    time_offset: i32,
}

fn dump(label: &str, bytes: &[u8]) {
    if DUMP_EXCHANGE {
        trace!("{label} {}", hex::to_hex(bytes));
    }
}

fn dump_request<T>(result: &Result<(Vec<u8>, T), Error>) {
    if let Ok((request, _)) = result {
        dump(">", request);
    }
}

/// Fails with `mismatch(got, expected)` unless both values are equal.
fn ensure_same<const N: usize>(
    got: [u8; N],
    expected: [u8; N],
    mismatch: fn([u8; N], [u8; N]) -> Error,
) -> Result<(), Error> {
    if got == expected {
        Ok(())
    } else {
        Err(mismatch(got, expected))
    }
}

fn nonce_mismatch(got: [u8; 16], expected: [u8; 16]) -> Error {
    Error::InvalidNonce { got, expected }
}

fn server_nonce_mismatch(got: [u8; 16], expected: [u8; 16]) -> Error {
    Error::InvalidServerNonce { got, expected }
}

fn new_nonce_hash_mismatch(got: [u8; 16], expected: [u8; 16]) -> Error {
    Error::InvalidNewNonceHash { got, expected }
}

/// Every answer repeats both nonces, and both must match ours.
fn ensure_nonces(
    got: ([u8; 16], [u8; 16]),
    nonce: [u8; 16],
    server_nonce: [u8; 16],
) -> Result<(), Error> {
    ensure_same(got.0, nonce, nonce_mismatch)?;
    ensure_same(got.1, server_nonce, server_nonce_mismatch)
}

fn ensure_public_value(value: &BigUint, dh_prime: &BigUint, name: &'static str) -> Result<(), Error> {
    prime::check_public_value(value, dh_prime).map_err(|_| Error::GParameterOutOfRange { name })
}

fn split_array<const A: usize, const B: usize>(bytes: &[u8]) -> ([u8; A], [u8; B]) {
    let mut head = [0; A];
    let mut tail = [0; B];
    head.copy_from_slice(&bytes[..A]);
    tail.copy_from_slice(&bytes[A..A + B]);
    (head, tail)
}

/// Starts an exchange by asking the server for `pq` (`req_pq_multi`).
pub fn step1(kind: KeyKind) -> Result<(Vec<u8>, Step1), Error> {
    let nonce = utils::random_array::<16>();
    dump("r", &nonce);
    let result = do_step1(&nonce, kind);
    dump_request(&result);
    result
}

// The `do_step` variants take their randomness and clock as arguments so
// that recorded exchanges can be replayed in tests.
fn do_step1(nonce: &[u8; 16], kind: KeyKind) -> Result<(Vec<u8>, Step1), Error> {
    debug!("requesting pq for a {kind:?} key");
    let nonce = *nonce;
    let request = tl::functions::ReqPqMulti { nonce }.to_bytes();
    Ok((request, Step1 { nonce, kind }))
}

/// Factorizes `pq` and sends `new_nonce` RSA-encrypted with the first of
/// the server's fingerprints present in `keys` (`req_DH_params`).
pub fn step2(data: Step1, response: &[u8], keys: &[rsa::Key]) -> Result<(Vec<u8>, Step2), Error> {
    dump("<", response);
    let random = utils::random_array::<{ 32 + 224 }>();
    dump("r", &random);
    let result = do_step2(data, response, keys, &random);
    dump_request(&result);
    result
}

/// Big-endian without leading zero bytes, the only form of `p` and `q` the
/// server accepts (anything else is answered with -404).
fn trimmed_be_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    bytes[skip..].to_vec()
}

fn do_step2(
    data: Step1,
    response: &[u8],
    keys: &[rsa::Key],
    random: &[u8; 32 + 224],
) -> Result<(Vec<u8>, Step2), Error> {
    let Step1 { nonce, kind } = data;
    let tl::enums::ResPq::Pq(res_pq) =
        <tl::functions::ReqPqMulti as RemoteCall>::Return::from_bytes(response)?;
    ensure_same(res_pq.nonce, nonce, nonce_mismatch)?;

    let pq: [u8; 8] = res_pq
        .pq
        .as_slice()
        .try_into()
        .map_err(|_| Error::InvalidPQSize {
            size: res_pq.pq.len(),
        })?;
    let (p, q) =
        factorize(u64::from_be_bytes(pq)).map_err(|error| Error::Factorization { error })?;
    let (p, q) = (trimmed_be_bytes(p), trimmed_be_bytes(q));

    // The RSA padding takes 224 random bytes; the rest of the block is
    // zero-filled before use.
    let (new_nonce, padding) = split_array::<32, 224>(random);
    let mut rsa_random = [0; 256];
    rsa_random[..224].copy_from_slice(&padding);

    let server_nonce = res_pq.server_nonce;
    let pq = res_pq.pq.clone();
    let inner = match kind {
        KeyKind::Legacy => tl::enums::PQInnerData::Data(tl::types::PQInnerData {
            pq,
            p: p.clone(),
            q: q.clone(),
            nonce,
            server_nonce,
            new_nonce,
        }),
        KeyKind::Permanent { dc_id } => tl::enums::PQInnerData::Dc(tl::types::PQInnerDataDc {
            pq,
            p: p.clone(),
            q: q.clone(),
            nonce,
            server_nonce,
            new_nonce,
            dc: dc_id,
        }),
        KeyKind::Temporary { dc_id, expires_in } => {
            tl::enums::PQInnerData::TempDc(tl::types::PQInnerDataTempDc {
                pq,
                p: p.clone(),
                q: q.clone(),
                nonce,
                server_nonce,
                new_nonce,
                dc: dc_id,
                expires_in,
            })
        }
    };

    let fingerprints = &res_pq.server_public_key_fingerprints;
    let (public_key_fingerprint, key) = fingerprints
        .iter()
        .find_map(|&fp| rsa::key_for_fingerprint(keys, fp).map(|key| (fp, key)))
        .ok_or_else(|| Error::UnknownFingerprints {
            fingerprints: fingerprints.clone(),
        })?;
    debug!("encrypting inner data with key {public_key_fingerprint:016x}");

    let encrypted_data = rsa::encrypt_hashed(&inner.to_bytes(), key, &rsa_random)
        .ok_or(Error::RsaEncryption)?;

    let request = tl::functions::ReqDhParams {
        nonce,
        server_nonce,
        p,
        q,
        public_key_fingerprint,
        encrypted_data,
    }
    .to_bytes();

    Ok((
        request,
        Step2 {
            nonce,
            server_nonce,
            new_nonce,
        },
    ))
}

/// Validates the server's Diffie-Hellman parameters and answers with `g_b`
/// (`set_client_DH_params`). The clock offset is measured here.
pub fn step3(data: Step2, response: &[u8]) -> Result<(Vec<u8>, Step3), Error> {
    dump("<", response);
    let random = utils::random_array::<{ 256 + 16 }>();
    dump("r", &random);
    let result = do_step3(data, response, &random, utils::now_secs() as i32);
    dump_request(&result);
    result
}

fn sha1_of(parts: &[&[u8]]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

fn do_step3(
    data: Step2,
    response: &[u8],
    random: &[u8; 256 + 16],
    now: i32,
) -> Result<(Vec<u8>, Step3), Error> {
    let Step2 {
        nonce,
        server_nonce,
        new_nonce,
    } = data;

    let params = match <tl::functions::ReqDhParams as RemoteCall>::Return::from_bytes(response)? {
        tl::enums::ServerDhParams::Ok(params) => params,
        tl::enums::ServerDhParams::Fail(fail) => {
            // A refusal must still come from the same server.
            ensure_nonces((fail.nonce, fail.server_nonce), nonce, server_nonce)?;
            let (_, expected) = split_array::<4, 16>(&sha1_of(&[&new_nonce]));
            ensure_same(fail.new_nonce_hash, expected, new_nonce_hash_mismatch)?;
            return Err(Error::DhParamsFail);
        }
    };
    ensure_nonces((params.nonce, params.server_nonce), nonce, server_nonce)?;

    let encrypted_len = params.encrypted_answer.len();
    if encrypted_len < 32 || encrypted_len % 16 != 0 {
        return Err(Error::EncryptedResponseNotPadded { len: encrypted_len });
    }

    let (key, iv) = mtcore_crypto::generate_key_data_from_nonce(&server_nonce, &new_nonce);
    let answer = mtcore_crypto::decrypt_ige(&params.encrypted_answer, &key, &iv)
        .map_err(|_| Error::EncryptedResponseNotPadded { len: encrypted_len })?;

    // answer = SHA1(inner) + inner + padding; the cursor tells where inner ends.
    let (got_hash, _) = split_array::<20, 0>(&answer);
    let mut cursor = Cursor::from_slice(&answer[20..]);
    let tl::enums::ServerDhInnerData::Data(inner) =
        tl::enums::ServerDhInnerData::deserialize(&mut cursor)
            .map_err(|error| Error::InvalidDhInnerData { error })?;
    let expected_hash = sha1_of(&[&answer[20..20 + cursor.pos()]]);
    if got_hash != expected_hash {
        return Err(Error::InvalidAnswerHash {
            got: got_hash,
            expected: expected_hash,
        });
    }
    ensure_nonces((inner.nonce, inner.server_nonce), nonce, server_nonce)?;

    let dh_prime = BigUint::from_bytes_be(&inner.dh_prime);
    let g = u32::try_from(inner.g).map_err(|_| Error::InvalidDhPrime {
        error: prime::Error::BadGenerator { g: 0 },
    })?;
    prime::check_p_and_g(&dh_prime, g).map_err(|error| Error::InvalidDhPrime { error })?;

    let g_a = BigUint::from_bytes_be(&inner.g_a);
    ensure_public_value(&g_a, &dh_prime, "g_a")?;

    let (b, padding) = split_array::<256, 16>(random);
    let b = BigUint::from_bytes_be(&b);
    let g_b = mod_exp(&BigUint::from(g), &b, &dh_prime);
    ensure_public_value(&g_b, &dh_prime, "g_b")?;
    let gab = mod_exp(&g_a, &b, &dh_prime);

    let time_offset = inner.server_time.wrapping_sub(now);
    debug!("server clock is {time_offset}s ahead of ours");

    let client_inner = tl::enums::ClientDhInnerData::Data(tl::types::ClientDhInnerData {
        nonce,
        server_nonce,
        retry_id: 0,
        g_b: g_b.to_bytes_be(),
    })
    .to_bytes();

    let mut plaintext = Vec::with_capacity(20 + client_inner.len() + 16);
    plaintext.extend(sha1_of(&[&client_inner]));
    plaintext.extend(&client_inner);
    let unaligned = plaintext.len() % 16;
    if unaligned != 0 {
        plaintext.extend(&padding[..16 - unaligned]);
    }

    let encrypted_data = mtcore_crypto::encrypt_ige(&plaintext, &key, &iv).map_err(|_| {
        Error::EncryptedResponseNotPadded {
            len: plaintext.len(),
        }
    })?;

    let request = tl::functions::SetClientDhParams {
        nonce,
        server_nonce,
        encrypted_data,
    }
    .to_bytes();

    Ok((
        request,
        Step3 {
            nonce,
            server_nonce,
            new_nonce,
            gab,
            time_offset,
        },
    ))
}

/// Outcome of a successful exchange.
#[derive(Clone, Debug, PartialEq)]
pub struct Finished {
    pub auth_key: [u8; 256],
    /// Seconds to add to the local clock to match the server's.
    pub time_offset: i32,
    pub first_salt: i64,
}

/// Derives the key from `g_ab` and checks that the server derived the same.
///
/// `dh_gen_retry` and `dh_gen_fail` are verified like `dh_gen_ok` before
/// being reported as [`Error::DhGenRetry`] and [`Error::DhGenFail`].
pub fn create_key(data: Step3, response: &[u8]) -> Result<Finished, Error> {
    dump("<", response);
    let Step3 {
        nonce,
        server_nonce,
        new_nonce,
        gab,
        time_offset,
    } = data;

    use tl::enums::SetClientDhParamsAnswer as Answer;
    let answer = <tl::functions::SetClientDhParams as RemoteCall>::Return::from_bytes(response)?;
    let (got, hash, number) = match answer {
        Answer::DhGenOk(x) => ((x.nonce, x.server_nonce), x.new_nonce_hash1, 1),
        Answer::DhGenRetry(x) => ((x.nonce, x.server_nonce), x.new_nonce_hash2, 2),
        Answer::DhGenFail(x) => ((x.nonce, x.server_nonce), x.new_nonce_hash3, 3),
    };
    ensure_nonces(got, nonce, server_nonce)?;

    // `g_ab` is below a 2048-bit prime, so it always fits once left-padded.
    let mut key = [0; 256];
    if let Some(bytes) = to_padded_be(&gab, key.len()) {
        key.copy_from_slice(&bytes);
    }
    let auth_key = AuthKey::from_bytes(key);
    ensure_same(
        hash,
        auth_key.calc_new_nonce_hash(&new_nonce, number),
        new_nonce_hash_mismatch,
    )?;

    let mut salt = [0; 8];
    for (i, byte) in salt.iter_mut().enumerate() {
        *byte = new_nonce[i] ^ server_nonce[i];
    }
    let first_salt = i64::from_le_bytes(salt);

    dump("a", &key);
    if DUMP_EXCHANGE {
        trace!("o {time_offset}");
        trace!("s {first_salt}");
    }

    match number {
        1 => {
            debug!("created {auth_key:?}");
            Ok(Finished {
                auth_key: key,
                time_offset,
                first_salt,
            })
        }
        2 => Err(Error::DhGenRetry),
        _ => Err(Error::DhGenFail),
    }
}
