//! AES-256-CBC with PKCS#7 padding. The key and IV are both derived from
//! a single SHA-256 digest of the password — no salt, no KDF iteration —
//! so the same password always yields the same ciphertext for the same
//! plaintext. That's a deliberate simplicity/security tradeoff inherited
//! from the system this coder was modeled on, not an oversight.

use aes::Aes256;
use cbc::{Decryptor, Encryptor};
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use sha2::{Digest, Sha256};

use crate::error::{BackupError, Result};

type Aes256CbcEnc = Encryptor<Aes256>;
type Aes256CbcDec = Decryptor<Aes256>;

/// `(key, iv)` derived from `password`'s SHA-256 digest: the full 32
/// bytes as the key, the first 16 as the IV.
fn derive_key_iv(password: &str) -> ([u8; 32], [u8; 16]) {
    let digest = Sha256::digest(password.as_bytes());
    let mut key = [0u8; 32];
    let mut iv = [0u8; 16];
    key.copy_from_slice(&digest);
    iv.copy_from_slice(&digest[..16]);
    (key, iv)
}

pub fn encrypt(plaintext: &[u8], password: &str) -> Result<Vec<u8>> {
    if password.is_empty() {
        return Err(BackupError::MissingKey);
    }
    let (key, iv) = derive_key_iv(password);
    let enc = Aes256CbcEnc::new(&key.into(), &iv.into());
    Ok(enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

pub fn decrypt(ciphertext: &[u8], password: &str) -> Result<Vec<u8>> {
    if password.is_empty() {
        return Err(BackupError::MissingKey);
    }
    let (key, iv) = derive_key_iv(password);
    let dec = Aes256CbcDec::new(&key.into(), &iv.into());
    dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|e| BackupError::DecryptionFailed(e.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrips() {
        let plaintext = b"some secret backup payload, longer than one AES block.".to_vec();
        let ciphertext = encrypt(&plaintext, "hunter2").unwrap();
        assert_eq!(decrypt(&ciphertext, "hunter2").unwrap(), plaintext);
    }

    #[test]
    fn empty_key_fails() {
        assert!(matches!(encrypt(b"x", ""), Err(BackupError::MissingKey)));
    }

    #[test]
    fn tampered_ciphertext_fails_or_yields_garbage() {
        let plaintext = b"some payload of substance".to_vec();
        let mut ciphertext = encrypt(&plaintext, "hunter2").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        // PKCS#7 unpadding only fails to reject corrupt padding by chance
        // (~1/256), so either outcome is acceptable: a hard decrypt error,
        // or a successful decrypt that doesn't reproduce the plaintext.
        match decrypt(&ciphertext, "hunter2") {
            Err(BackupError::DecryptionFailed(_)) => {}
            Ok(garbage) => assert_ne!(garbage, plaintext),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn wrong_password_fails_or_yields_garbage() {
        let plaintext = b"some payload of substance".to_vec();
        let ciphertext = encrypt(&plaintext, "hunter2").unwrap();
        match decrypt(&ciphertext, "wrong password") {
            Err(_) => {}
            Ok(garbage) => assert_ne!(garbage, plaintext),
        }
    }
}
