//! Digest, MAC and stream cipher helpers for credential and payload handling.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha1::Sha1;

use crate::Error;

pub const MD5_DIGEST_LENGTH: usize = 16;
pub const SHA1_DIGEST_LENGTH: usize = 20;
pub const AES128_KEY_LENGTH: usize = 16;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// MD5 digest of `input`.
pub fn md5(input: &[u8]) -> [u8; MD5_DIGEST_LENGTH] {
    Md5::digest(input).into()
}

/// HMAC-SHA1 of `input` under `key`.
pub fn sha1_hmac(key: &[u8], input: &[u8]) -> Result<[u8; SHA1_DIGEST_LENGTH], Error> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key)
        .map_err(|_| Error::InvalidArgument("invalid HMAC key length"))?;
    mac.update(input);
    Ok(mac.finalize().into_bytes().into())
}

/// Encrypt `input` with AES-128-CTR.
///
/// The 64-bit `iv` fills both halves of the initial counter block,
/// little-endian. The counter then runs big-endian over all 16 bytes.
pub fn encrypt(key: &[u8], iv: u64, input: &[u8]) -> Result<Vec<u8>, Error> {
    let mut out = input.to_vec();
    apply_keystream(key, counter_block(iv), &mut out)?;
    Ok(out)
}

/// Decrypt what [`encrypt`] produced with the same `key` and `iv`.
pub fn decrypt(key: &[u8], iv: u64, input: &[u8]) -> Result<Vec<u8>, Error> {
    // CTR is its own inverse.
    encrypt(key, iv, input)
}

fn counter_block(iv: u64) -> [u8; 16] {
    let half = iv.to_le_bytes();
    let mut block = [0; 16];
    block[..8].copy_from_slice(&half);
    block[8..].copy_from_slice(&half);
    block
}

fn apply_keystream(key: &[u8], block: [u8; 16], data: &mut [u8]) -> Result<(), Error> {
    if key.len() != AES128_KEY_LENGTH {
        return Err(Error::InvalidArgument("AES-128 key must be 16 bytes"));
    }
    let mut cipher = Aes128Ctr::new_from_slices(key, &block)
        .map_err(|_| Error::InvalidArgument("AES-128 key must be 16 bytes"))?;
    cipher.apply_keystream(data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn md5_known_answers() {
        assert_eq!(md5(b"").to_vec(), hex("d41d8cd98f00b204e9800998ecf8427e"));
        assert_eq!(md5(b"abc").to_vec(), hex("900150983cd24fb0d6963f7d28e17f72"));
    }

    #[test]
    fn hmac_sha1_rfc2202() {
        let mac = sha1_hmac(&[0x0b; 20], b"Hi There").unwrap();
        assert_eq!(mac.to_vec(), hex("b617318655057264e28bc0b6fb378c8ef146be00"));

        let mac = sha1_hmac(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(mac.to_vec(), hex("effcdf6ae5eb2fa2d27416d5f184df9c259a7c79"));
    }

    #[test]
    fn aes128_ctr_sp800_38a() {
        // F.5.1 CTR-AES128.Encrypt, first two blocks.
        let key = hex("2b7e151628aed2a6abf7158809cf4f3c");
        let mut block = [0; 16];
        block.copy_from_slice(&hex("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff"));

        let mut data = hex("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51");
        apply_keystream(&key, block, &mut data).unwrap();
        assert_eq!(
            data,
            hex("874d6191b620e3261bef6864990db6ce9806f66b7970fdff8617187bb9fffdff")
        );
    }

    #[test]
    fn iv_is_doubled() {
        let block = counter_block(0x0102_0304_0506_0708);
        assert_eq!(&block[..8], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(&block[..8], &block[8..]);
    }

    #[test]
    fn matches_openssl_ctr() {
        use openssl::symm::{encrypt as ossl_encrypt, Cipher};

        let key = [0x42; 16];
        let iv = 0xdead_beef_0000_0001;
        let plain: Vec<u8> = (0..100u8).collect();

        let ours = encrypt(&key, iv, &plain).unwrap();
        let theirs = ossl_encrypt(Cipher::aes_128_ctr(), &key, Some(&counter_block(iv)), &plain).unwrap();
        assert_eq!(ours, theirs);

        assert_eq!(decrypt(&key, iv, &ours).unwrap(), plain);
    }

    #[test]
    fn wrong_key_length() {
        let err = encrypt(&[0; 32], 1, b"x").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(encrypt(&[0; 16], 1, b"").unwrap(), Vec::<u8>::new());
    }
}
