//! Catalog resource sealing.
//!
//! Bundled catalogs are stored as AES-128-CBC ciphertext with PKCS#7
//! padding under a fixed key and an all-zero IV. This keeps casual readers
//! out of the shipped check definitions; it is not a confidentiality
//! boundary, since the key travels with the binary.
//!
//! # Security Guarantees
//! - Key material lives in `Zeroizing` storage and is cleared on drop
//! - Decrypted bytes are returned in `Zeroizing` buffers
//! - Failures never echo key or plaintext bytes

use aes::Aes128;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use zeroize::Zeroizing;

use crate::error::DbAssessError;

type Encryptor = cbc::Encryptor<Aes128>;
type Decryptor = cbc::Decryptor<Aes128>;

/// Key length in bytes (AES-128).
pub const KEY_SIZE: usize = 16;

const BUNDLE_KEY: &[u8; KEY_SIZE] = b"@#Guardium1qa!QA";
const ZERO_IV: [u8; 16] = [0; 16];

/// Symmetric cipher for bundled catalog resources.
///
/// # Example
/// ```rust
/// use dbassess_core::security::BundleCipher;
///
/// let cipher = BundleCipher::default();
/// let sealed = cipher.seal(b"<mysqldump/>");
/// assert_eq!(sealed.len() % 16, 0);
/// assert_eq!(&cipher.unseal(&sealed)?[..], b"<mysqldump/>");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct BundleCipher {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl Default for BundleCipher {
    fn default() -> Self {
        Self::with_key(*BUNDLE_KEY)
    }
}

impl std::fmt::Debug for BundleCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleCipher")
            .field("key", &"<redacted>")
            .finish()
    }
}

impl BundleCipher {
    /// Creates a cipher with an explicit key.
    pub fn with_key(key: [u8; KEY_SIZE]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Encrypts a plaintext resource.
    pub fn seal(&self, plaintext: &[u8]) -> Vec<u8> {
        let key: &[u8; KEY_SIZE] = &self.key;
        Encryptor::new(key.into(), &ZERO_IV.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    /// Decrypts a sealed resource.
    ///
    /// # Errors
    /// Returns error if the ciphertext is not block aligned or its padding
    /// is invalid, which is what a wrong key or a truncated file produces.
    pub fn unseal(&self, ciphertext: &[u8]) -> crate::Result<Zeroizing<Vec<u8>>> {
        let key: &[u8; KEY_SIZE] = &self.key;
        Decryptor::new(key.into(), &ZERO_IV.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| {
                DbAssessError::crypto(format!(
                    "Resource decryption failed ({} bytes, corrupted data or wrong key)",
                    ciphertext.len()
                ))
            })
    }
}

/// Seals a resource with the bundled key.
pub fn seal(plaintext: &[u8]) -> Vec<u8> {
    BundleCipher::default().seal(plaintext)
}

/// Unseals a resource with the bundled key.
pub fn unseal(ciphertext: &[u8]) -> crate::Result<Zeroizing<Vec<u8>>> {
    BundleCipher::default().unseal(ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_round_trip() {
        let plaintext = b"<?xml version=\"1.0\"?>\n<mysqldump></mysqldump>\n";
        let sealed = seal(plaintext);
        assert_ne!(&sealed[..], &plaintext[..]);
        assert_eq!(sealed.len() % 16, 0);
        assert_eq!(&unseal(&sealed).unwrap()[..], &plaintext[..]);
    }

    #[test]
    fn test_bundle_is_deterministic() {
        // Zero IV: identical plaintexts give identical ciphertexts.
        assert_eq!(seal(b"avail_test"), seal(b"avail_test"));
    }

    #[test]
    fn test_bundle_empty_plaintext_pads_to_one_block() {
        let sealed = seal(b"");
        assert_eq!(sealed.len(), 16);
        assert!(unseal(&sealed).unwrap().is_empty());
    }

    #[test]
    fn test_bundle_rejects_unaligned_input() {
        let mut sealed = seal(b"some catalog bytes");
        sealed.pop();
        let err = unseal(&sealed).unwrap_err();
        assert!(err.to_string().contains("decryption failed"));
    }

    #[test]
    fn test_bundle_rejects_empty_input() {
        assert!(unseal(&[]).is_err());
    }

    #[test]
    fn test_bundle_custom_key_round_trip() {
        let cipher = BundleCipher::with_key(*b"0123456789abcdef");
        let sealed = cipher.seal(b"group_desc");
        assert_ne!(sealed, seal(b"group_desc"));
        assert_eq!(&cipher.unseal(&sealed).unwrap()[..], b"group_desc");
    }

    #[test]
    fn test_bundle_debug_redacts_key() {
        let debug = format!("{:?}", BundleCipher::default());
        assert!(!debug.contains("Guardium"));
        assert!(debug.contains("<redacted>"));
    }
}
