use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use thiserror::Error;

const NONCE_SIZE: usize = 12; // AES-GCM standard nonce size

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid hex key: {0}")]
    InvalidKey(String),
    #[error("Encryption key must be 32 bytes (256 bits) long")]
    KeyLength,
    #[error("Invalid hex ciphertext: {0}")]
    InvalidCiphertext(String),
    #[error("Ciphertext is too short to contain a nonce")]
    Truncated,
    #[error("Encryption failed")]
    Seal,
    #[error("Decryption failed")]
    Open,
    #[error("Decrypted secret is not valid UTF-8")]
    Utf8,
}

/// AES-256-GCM sealing for server SSH keys stored at rest. Output is
/// `hex(nonce || ciphertext)`.
#[derive(Clone)]
pub struct SecretBox {
    cipher: Aes256Gcm,
}

impl SecretBox {
    pub fn from_hex_key(key_hex: &str) -> Result<Self, CryptoError> {
        let key_bytes = hex::decode(key_hex).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        if key_bytes.len() != 32 {
            return Err(CryptoError::KeyLength);
        }
        let cipher = Aes256Gcm::new(key_bytes.as_slice().into());
        Ok(Self { cipher })
    }

    pub fn seal(&self, plain_text: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plain_text.as_bytes())
            .map_err(|_| CryptoError::Seal)?;

        let mut result = nonce.to_vec();
        result.extend_from_slice(&ciphertext);
        Ok(hex::encode(result))
    }

    pub fn open(&self, cipher_hex: &str) -> Result<String, CryptoError> {
        let encrypted_data =
            hex::decode(cipher_hex).map_err(|e| CryptoError::InvalidCiphertext(e.to_string()))?;
        if encrypted_data.len() < NONCE_SIZE {
            return Err(CryptoError::Truncated);
        }

        let (nonce_bytes, ciphertext) = encrypted_data.split_at(NONCE_SIZE);
        let decrypted = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::Open)?;

        String::from_utf8(decrypted).map_err(|_| CryptoError::Utf8)
    }
}
