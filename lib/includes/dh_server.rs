// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// The server side of the key exchange, played honestly, for tests.
//
// Include it inside of a module. The including crate needs `mtcore-crypto`,
// `mtcore-mtproto` and `num-bigint` available.
use mtcore_crypto::bigint::{generate_random_bytes, to_padded_be};
use mtcore_crypto::{AuthKey, prime, rsa};
use mtcore_mtproto::tl::{self, Cursor, Deserializable, Identifiable, Serializable};
use num_bigint::BigUint;

// A 2048-bit key generated for these tests only.
const TEST_KEY_N: &str = "21457018973180635837760862517605066475967123609833688813279568071552769320781218112297972060711332876685833291308704605862543486717301347623503077522734512875691745132155822627088301718604166495045089260720281729898815865552744196727038031778956060865729042012145865745113960422376455893235197142076351103535020081696979659800638984596658448412277657816763505761843188545303625712528911958228868006772407228310026223004718592535133902030078435233749511795830297152319872035408750843071574851398431117210358511041979632514329961438958659855111087794688529037359376517453619166174836351415600820490217217439819473124929";
const TEST_KEY_D: &str = "182117991422123818373658845772888875402546843889253237139123849730705218955468705845030241829358666290133737709850419412103694317507650252766736147092803649649870046382374480618854507087196051282006056140434513515361037661377755457671466578834006879420202017474955182884777156185771451098037420240169221986682208526470235090522571962402675174560088892629862752131046181891586313494628071541780272474355519641185360400808385906458239858369303404587375343887554706743085515140760890589579493271875290567491697293596400110821836510388444975431355511631360830011670534405293826251352536712822729505854172245011236767473";

pub const PQ: u64 = 1470626929934143021;
pub const P: u64 = 1206429347;
pub const Q: u64 = 1218991343;

/// The public half of the key the server decrypts with.
pub fn public_key() -> rsa::Key {
    rsa::Key::new(TEST_KEY_N, "65537").unwrap()
}

fn private_exponent() -> BigUint {
    BigUint::parse_bytes(TEST_KEY_D.as_bytes(), 10).unwrap()
}

fn sha1(data: &[u8]) -> [u8; 20] {
    use sha1::{Digest, Sha1};
    Sha1::digest(data).into()
}

fn trimmed(value: u64) -> Vec<u8> {
    BigUint::from(value).to_bytes_be()
}

/// Wrap a body as an unencrypted server message.
pub fn plain_wrap(body: &[u8], msg_id: i64) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(20 + body.len());
    0i64.serialize(&mut buffer);
    msg_id.serialize(&mut buffer);
    (body.len() as i32).serialize(&mut buffer);
    buffer.extend_from_slice(body);
    buffer
}

/// Extract the body out of an unencrypted client message.
pub fn plain_unwrap(message: &[u8]) -> Vec<u8> {
    assert_eq!(&message[..8], &[0; 8]);
    let len = i32::from_le_bytes(message[16..20].try_into().unwrap()) as usize;
    message[20..20 + len].to_vec()
}

#[derive(Default)]
pub struct DhServer {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    new_nonce: [u8; 32],
    a: BigUint,
    pub server_time: i32,
    pub inner_data_id: Option<u32>,
    pub auth_key: Option<AuthKey>,
}

impl DhServer {
    pub fn new(server_time: i32) -> Self {
        Self {
            server_time,
            ..Self::default()
        }
    }

    /// Answer one of the three handshake requests.
    pub fn handle(&mut self, request: &[u8]) -> Vec<u8> {
        let id = u32::from_le_bytes(request[..4].try_into().unwrap());
        if id == tl::functions::ReqPqMulti::CONSTRUCTOR_ID {
            self.res_pq(request)
        } else if id == tl::functions::ReqDhParams::CONSTRUCTOR_ID {
            self.server_dh_params(request)
        } else if id == tl::functions::SetClientDhParams::CONSTRUCTOR_ID {
            self.dh_gen(request)
        } else {
            panic!("unexpected handshake request {id:08x}")
        }
    }

    fn res_pq(&mut self, request: &[u8]) -> Vec<u8> {
        let req = tl::functions::ReqPqMulti::from_bytes(request).unwrap();
        self.nonce = req.nonce;
        self.server_nonce = generate_random_bytes(16).try_into().unwrap();

        tl::enums::ResPq::Pq(tl::types::ResPq {
            nonce: self.nonce,
            server_nonce: self.server_nonce,
            pq: PQ.to_be_bytes().to_vec(),
            server_public_key_fingerprints: vec![1234, public_key().fingerprint()],
        })
        .to_bytes()
    }

    fn server_dh_params(&mut self, request: &[u8]) -> Vec<u8> {
        let req = tl::functions::ReqDhParams::from_bytes(request).unwrap();
        assert_eq!(req.nonce, self.nonce);
        assert_eq!(req.server_nonce, self.server_nonce);
        assert_eq!(req.p, trimmed(P));
        assert_eq!(req.q, trimmed(Q));
        assert_eq!(req.public_key_fingerprint, public_key().fingerprint());

        let key = public_key();
        let decrypted = BigUint::from_bytes_be(&req.encrypted_data)
            .modpow(&private_exponent(), key.modulus());
        let block = to_padded_be(&decrypted, 255).unwrap();

        let mut cursor = Cursor::from_slice(&block[20..]);
        let inner = tl::enums::PQInnerData::deserialize(&mut cursor).unwrap();
        assert_eq!(&block[..20], &sha1(&block[20..20 + cursor.pos()]));

        let (new_nonce, id) = match inner {
            tl::enums::PQInnerData::Data(x) => (x.new_nonce, tl::types::PQInnerData::CONSTRUCTOR_ID),
            tl::enums::PQInnerData::Dc(x) => (x.new_nonce, tl::types::PQInnerDataDc::CONSTRUCTOR_ID),
            tl::enums::PQInnerData::TempDc(x) => {
                (x.new_nonce, tl::types::PQInnerDataTempDc::CONSTRUCTOR_ID)
            }
        };
        self.new_nonce = new_nonce;
        self.inner_data_id = Some(id);

        let p = prime::known_dh_prime();
        self.a = BigUint::from_bytes_be(&generate_random_bytes(256));
        let g_a = BigUint::from(3u32).modpow(&self.a, &p);

        let inner = tl::enums::ServerDhInnerData::Data(tl::types::ServerDhInnerData {
            nonce: self.nonce,
            server_nonce: self.server_nonce,
            g: 3,
            dh_prime: prime::KNOWN_DH_PRIME.to_vec(),
            g_a: to_padded_be(&g_a, 256).unwrap(),
            server_time: self.server_time,
        })
        .to_bytes();

        let mut answer = sha1(&inner).to_vec();
        answer.extend(&inner);
        answer.resize(answer.len().div_ceil(16) * 16, 0);

        let (key, iv) = mtcore_crypto::generate_key_data_from_nonce(&self.server_nonce, &self.new_nonce);
        tl::enums::ServerDhParams::Ok(tl::types::ServerDhParamsOk {
            nonce: self.nonce,
            server_nonce: self.server_nonce,
            encrypted_answer: mtcore_crypto::encrypt_ige(&answer, &key, &iv).unwrap(),
        })
        .to_bytes()
    }

    fn dh_gen(&mut self, request: &[u8]) -> Vec<u8> {
        let req = tl::functions::SetClientDhParams::from_bytes(request).unwrap();
        assert_eq!(req.nonce, self.nonce);
        assert_eq!(req.server_nonce, self.server_nonce);

        let (key, iv) = mtcore_crypto::generate_key_data_from_nonce(&self.server_nonce, &self.new_nonce);
        let plain = mtcore_crypto::decrypt_ige(&req.encrypted_data, &key, &iv).unwrap();

        let mut cursor = Cursor::from_slice(&plain[20..]);
        let tl::enums::ClientDhInnerData::Data(inner) =
            tl::enums::ClientDhInnerData::deserialize(&mut cursor).unwrap();
        assert_eq!(&plain[..20], &sha1(&plain[20..20 + cursor.pos()]));

        let p = prime::known_dh_prime();
        let g_b = BigUint::from_bytes_be(&inner.g_b);
        prime::check_public_value(&g_b, &p).unwrap();

        let gab = g_b.modpow(&self.a, &p);
        let auth_key = AuthKey::from_bytes(to_padded_be(&gab, 256).unwrap().try_into().unwrap());
        let new_nonce_hash1 = auth_key.calc_new_nonce_hash(&self.new_nonce, 1);
        self.auth_key = Some(auth_key);

        tl::enums::SetClientDhParamsAnswer::DhGenOk(tl::types::DhGenOk {
            nonce: self.nonce,
            server_nonce: self.server_nonce,
            new_nonce_hash1,
        })
        .to_bytes()
    }

    /// The salt the client should have derived.
    pub fn first_salt(&self) -> i64 {
        let mut buffer = [0; 8];
        buffer
            .iter_mut()
            .zip(self.new_nonce.iter().zip(&self.server_nonce))
            .for_each(|(x, (a, b))| *x = a ^ b);
        i64::from_le_bytes(buffer)
    }
}
