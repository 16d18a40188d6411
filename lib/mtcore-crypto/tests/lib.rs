// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use mtcore_crypto::bigint::{generate_random_bytes, mod_exp};
use mtcore_crypto::{
    AuthKey, Error, Side, decrypt_data_v2, decrypt_ige, encrypt_data_v2, encrypt_ige,
    factorize::factorize, prime, rsa,
};
use num_bigint::BigUint;

fn get_test_auth_key() -> AuthKey {
    let mut buffer = [0u8; 256];
    buffer
        .iter_mut()
        .enumerate()
        .for_each(|(i, x)| *x = i as u8);

    AuthKey::from_bytes(buffer)
}

#[test]
fn ige_round_trip() {
    for blocks in [1, 2, 7, 64] {
        let plaintext = generate_random_bytes(blocks * 16);
        let key: [u8; 32] = generate_random_bytes(32).try_into().unwrap();
        let iv: [u8; 32] = generate_random_bytes(32).try_into().unwrap();

        let ciphertext = encrypt_ige(&plaintext, &key, &iv).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len());
        assert_eq!(decrypt_ige(&ciphertext, &key, &iv).unwrap(), plaintext);
    }
}

#[test]
fn client_and_server_directions() {
    let auth_key = get_test_auth_key();
    let plaintext = b"some message which is not aligned";

    let from_client = encrypt_data_v2(plaintext, &auth_key, Side::Client);
    let from_server = encrypt_data_v2(plaintext, &auth_key, Side::Server);

    assert!(decrypt_data_v2(&from_client, &auth_key, Side::Client).is_ok());
    assert!(decrypt_data_v2(&from_server, &auth_key, Side::Server).is_ok());
    assert_eq!(
        decrypt_data_v2(&from_client, &auth_key, Side::Server),
        Err(Error::MessageKeyMismatch)
    );
    assert_eq!(
        decrypt_data_v2(&from_server, &auth_key, Side::Client),
        Err(Error::MessageKeyMismatch)
    );
}

#[test]
fn rsa_decrypts_with_private_key() {
    // A prime modulus gives a valid (if insecure) single-prime RSA key.
    let p = prime::known_dh_prime();
    let e = BigUint::from(65537u32);
    let d = e.modinv(&(&p - 1u32)).unwrap();
    let key = rsa::Key::from_parts(p.clone(), e);

    let data = b"payload to protect";
    let random = [0x42; 256];
    let encrypted = rsa::encrypt_hashed(data, &key, &random).unwrap();
    assert_eq!(encrypted.len(), 256);

    let decrypted = mod_exp(&BigUint::from_bytes_be(&encrypted), &d, &p).to_bytes_be();
    assert_eq!(decrypted.len(), 255);
    assert_eq!(&decrypted[20..20 + data.len()], data);
    assert!(decrypted[20 + data.len()..].iter().all(|&b| b == 0x42));
}

#[test]
fn factorize_telegram_sized() {
    let (p, q) = factorize(0x17ED48941A08F981).unwrap();
    assert_eq!((p, q), (0x494C553B, 0x53911073));
}
