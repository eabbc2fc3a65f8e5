//! Hybrid encryption for the upload path.
//!
//! The transport package can be several megabytes, far past what the
//! server's RSA key can seal directly, so the bulk bytes are encrypted
//! with a fresh 256-bit AES-GCM key and only that key is wrapped with
//! RSA-OAEP. No pre-shared secret is needed for this direction.
//!
//! Blob layout, in order:
//!
//! ```text
//! IV (16) ‖ wrapped symmetric key (RSA key size) ‖ auth tag (16) ‖ ciphertext
//! ```
//!
//! The wrapped-key field is sized by the server's actual key, never
//! assumed constant.

use std::fs;
use std::path::Path;

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::Aead;
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, KeyInit};
use log::debug;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::crypto::replace_file_atomic;
use crate::error::{Error, Result};

/// AES-GCM with the protocol's 16-byte IV.
type PackageCipher = AesGcm<Aes256, U16>;

pub const IV_LEN: usize = 16;
pub const TAG_LEN: usize = 16;
const SYM_KEY_LEN: usize = 32;

/// Parses a PEM public key in either SubjectPublicKeyInfo or PKCS#1 form.
fn parse_public_key(pem: &str) -> Result<RsaPublicKey> {
    match RsaPublicKey::from_public_key_pem(pem) {
        Ok(key) => Ok(key),
        Err(_) => RsaPublicKey::from_pkcs1_pem(pem)
            .map_err(|e| Error::Encrypt(format!("invalid server public key: {}", e))),
    }
}

fn oaep() -> Oaep {
    Oaep::new_with_mgf_hash::<Sha256, Sha256>()
}

/// Encrypts `plaintext` into the transport blob layout.
pub fn encrypt_blob(public_key_pem: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
    let public_key = parse_public_key(public_key_pem)?;

    let mut key = [0u8; SYM_KEY_LEN];
    OsRng.fill_bytes(&mut key);
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let cipher = PackageCipher::new(GenericArray::from_slice(&key));
    let mut sealed = cipher
        .encrypt(GenericArray::from_slice(&iv), plaintext)
        .map_err(|_| Error::Encrypt("AES-GCM encryption failed".into()))?;
    let tag = sealed.split_off(sealed.len() - TAG_LEN);
    let ciphertext = sealed;

    let wrapped = public_key
        .encrypt(&mut OsRng, oaep(), &key)
        .map_err(|e| Error::Encrypt(format!("RSA key wrapping failed: {}", e)))?;
    debug!(
        "Wrapped symmetric key with {}-byte server key",
        public_key.size()
    );

    let mut blob = Vec::with_capacity(IV_LEN + wrapped.len() + TAG_LEN + ciphertext.len());
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&wrapped);
    blob.extend_from_slice(&tag);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Recovers the plaintext from a transport blob. The inverse of
/// [`encrypt_blob`], keyed by the server-side private key.
pub fn decrypt_blob(private_key: &RsaPrivateKey, blob: &[u8]) -> Result<Vec<u8>> {
    let wrapped_len = private_key.size();
    let header_len = IV_LEN + wrapped_len + TAG_LEN;
    if blob.len() < header_len {
        return Err(Error::Decrypt(format!(
            "blob too short: {} bytes, expected at least {}",
            blob.len(),
            header_len
        )));
    }

    let iv = &blob[..IV_LEN];
    let wrapped = &blob[IV_LEN..IV_LEN + wrapped_len];
    let tag = &blob[IV_LEN + wrapped_len..header_len];
    let ciphertext = &blob[header_len..];

    let key = private_key
        .decrypt(oaep(), wrapped)
        .map_err(|e| Error::Decrypt(format!("RSA key unwrapping failed: {}", e)))?;
    if key.len() != SYM_KEY_LEN {
        return Err(Error::Decrypt(format!(
            "unwrapped key has wrong length: {} (expected {})",
            key.len(),
            SYM_KEY_LEN
        )));
    }

    let cipher = PackageCipher::new(GenericArray::from_slice(&key));
    let mut sealed = ciphertext.to_vec();
    sealed.extend_from_slice(tag);
    cipher
        .decrypt(GenericArray::from_slice(iv), sealed.as_ref())
        .map_err(|_| Error::Decrypt("AES-GCM authentication failed".into()))
}

/// Encrypts `path` in place: the plaintext file is replaced by the blob
/// via an atomic rename, so a crash mid-operation leaves either the old
/// or the new content intact.
pub fn encrypt_file(public_key_pem: &str, path: &Path) -> Result<()> {
    let plaintext = fs::read(path)?;
    let blob = encrypt_blob(public_key_pem, &plaintext)?;
    debug!(
        "Encrypted {} ({} -> {} bytes)",
        path.display(),
        plaintext.len(),
        blob.len()
    );
    replace_file_atomic(path, &blob)
}
