use anyhow::{bail, ensure, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

pub trait Cipher: Send + Sync {
    type EncryptionKey;

    fn new_key() -> Self::EncryptionKey;
    fn with_key(key: &Self::EncryptionKey) -> Self;
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

mod xchacha20poly1305cipher {
    use chacha20poly1305::{
        aead::{Aead, AeadCore, KeyInit, OsRng},
        Key, XChaCha20Poly1305,
    };

    use super::*;

    const NONCE_LEN: usize = 24;
    const KEY_LEN: usize = 32;

    pub struct XChaCha20Poly1305Cipher {
        cipher: XChaCha20Poly1305,
    }

    impl XChaCha20Poly1305Cipher {
        /// Parse a key in the format printed by `generate-key`
        pub fn key_from_base64(encoded: &str) -> Result<Key> {
            let Ok(bytes) = STANDARD.decode(encoded.trim()) else {
                bail!("Store key isn't valid base64");
            };
            ensure!(
                bytes.len() == KEY_LEN,
                "Store key must be {KEY_LEN} bytes but was {} bytes",
                bytes.len()
            );
            Ok(Key::clone_from_slice(&bytes))
        }

        pub fn key_to_base64(key: &Key) -> String {
            STANDARD.encode(key.as_slice())
        }
    }

    impl Cipher for XChaCha20Poly1305Cipher {
        type EncryptionKey = Key;

        fn new_key() -> Key {
            XChaCha20Poly1305::generate_key(&mut OsRng)
        }

        fn with_key(key: &Key) -> Self {
            Self {
                cipher: XChaCha20Poly1305::new(key),
            }
        }

        fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
            let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
            let ciphertext = self.cipher.encrypt(&nonce, plaintext)?;

            let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
            result.extend_from_slice(&nonce);
            result.extend_from_slice(&ciphertext);

            Ok(result)
        }

        fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
            if ciphertext.len() < NONCE_LEN {
                bail!("Ciphertext too small for nonce");
            }
            let (nonce, ciphertext) = ciphertext.split_at(NONCE_LEN);

            let plaintext = self.cipher.decrypt(nonce.into(), ciphertext)?;
            Ok(plaintext)
        }
    }
}
pub use xchacha20poly1305cipher::XChaCha20Poly1305Cipher;
