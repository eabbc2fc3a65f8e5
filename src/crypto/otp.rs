//! Result decryption keyed by the per-experiment one-time secret.
//!
//! The OTP travels to the service only inside the uploaded configuration,
//! so the returned archive can be protected symmetrically: the secret is
//! stretched with scrypt and the archive decrypted with AES-256-ECB and
//! PKCS7 padding. ECB with a fixed salt is a compatibility requirement of
//! the existing service protocol and must be reproduced bit-for-bit to
//! interoperate.

use std::fs;
use std::path::Path;

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes256;
use log::debug;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::crypto::replace_file_atomic;
use crate::error::{Error, Result};

const SCRYPT_LOG_N: u8 = 14; // N = 16384
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;
const KDF_SALT: &[u8] = b"simrelay.result.salt";

const BLOCK_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Raw length of the one-time secret in bytes.
pub const SECRET_LEN: usize = 32;

/// Generates a fresh one-time secret, hex-encoded for embedding in the
/// uploaded configuration.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_LEN];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Derives the 256-bit archive key from the OTP.
pub fn derive_key(password: &[u8]) -> Result<[u8; KEY_LEN]> {
    let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN)
        .map_err(|e| Error::Decrypt(format!("invalid scrypt parameters: {}", e)))?;
    let mut key = [0u8; KEY_LEN];
    scrypt::scrypt(password, KDF_SALT, &params, &mut key)
        .map_err(|e| Error::Decrypt(format!("key derivation failed: {}", e)))?;
    Ok(key)
}

/// Encrypts `plaintext` under the OTP: PKCS7 pad, then AES-256-ECB.
pub fn encrypt_bytes(password: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let key = derive_key(password)?;
    let cipher = Aes256::new(GenericArray::from_slice(&key));

    let pad = BLOCK_LEN - plaintext.len() % BLOCK_LEN;
    let mut buf = Vec::with_capacity(plaintext.len() + pad);
    buf.extend_from_slice(plaintext);
    buf.resize(plaintext.len() + pad, pad as u8);

    for block in buf.chunks_mut(BLOCK_LEN) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(buf)
}

/// Decrypts `data` under the OTP and strips the PKCS7 padding.
///
/// A pad length outside `[1, 16]` means the password was wrong or the
/// archive is corrupt; both surface as a decrypt failure the caller must
/// handle rather than a silent empty result.
pub fn decrypt_bytes(password: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() || data.len() % BLOCK_LEN != 0 {
        return Err(Error::Decrypt(format!(
            "ciphertext length {} is not a positive multiple of the {}-byte block size",
            data.len(),
            BLOCK_LEN
        )));
    }

    let key = derive_key(password)?;
    let cipher = Aes256::new(GenericArray::from_slice(&key));

    let mut buf = data.to_vec();
    for block in buf.chunks_mut(BLOCK_LEN) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }

    let pad = buf[buf.len() - 1] as usize;
    if pad == 0 || pad > BLOCK_LEN {
        return Err(Error::Decrypt(format!("invalid padding byte {}", pad)));
    }
    buf.truncate(buf.len() - pad);
    Ok(buf)
}

/// Decrypts `path` in place via an atomic rename, leaving the plaintext
/// archive under the original name.
pub fn decrypt_file(password: &[u8], path: &Path) -> Result<()> {
    let data = fs::read(path)?;
    let plaintext = decrypt_bytes(password, &data)?;
    debug!(
        "Decrypted {} ({} -> {} bytes)",
        path.display(),
        data.len(),
        plaintext.len()
    );
    replace_file_atomic(path, &plaintext)
}
