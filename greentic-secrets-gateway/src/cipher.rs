use crate::errors::{DecryptError, DecryptResult};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use std::env;
use zeroize::Zeroizing;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
pub const CONFIG_KEY_ENV: &str = "GREENTIC_GATEWAY_CONFIG_KEY";

/// Scoped decrypt operation for sensitive configuration fields.
///
/// Encrypted values are base64 text of `nonce || ciphertext`. Plaintext is
/// handed back in a zeroizing buffer so it does not outlive its owner in
/// memory.
pub trait Cipher: Send + Sync {
    fn decrypt(&self, encrypted: &str) -> DecryptResult<Zeroizing<Vec<u8>>>;
}

/// Decrypt and require UTF-8 plaintext.
pub fn decrypt_string(cipher: &dyn Cipher, encrypted: &str) -> DecryptResult<Zeroizing<String>> {
    let bytes = cipher.decrypt(encrypted)?;
    let text = std::str::from_utf8(&bytes).map_err(|_| DecryptError::NotUtf8)?;
    Ok(Zeroizing::new(text.to_string()))
}

/// Cipher used when no key is configured; every decrypt fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCipher;

impl Cipher for NoCipher {
    fn decrypt(&self, _encrypted: &str) -> DecryptResult<Zeroizing<Vec<u8>>> {
        Err(DecryptError::NoKey)
    }
}

/// AES-256-GCM configuration cipher.
#[derive(Clone)]
pub struct AesGcmCipher {
    inner: Aes256Gcm,
}

impl AesGcmCipher {
    pub fn new(key: &[u8]) -> DecryptResult<Self> {
        if key.len() != KEY_LEN {
            return Err(DecryptError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }
        let inner = Aes256Gcm::new_from_slice(key)
            .map_err(|err| DecryptError::InvalidKey(err.to_string()))?;
        Ok(Self { inner })
    }

    pub fn from_base64_key(encoded: &str) -> DecryptResult<Self> {
        let key = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|err| DecryptError::InvalidKey(err.to_string()))?,
        );
        Self::new(&key)
    }

    /// Key from `GREENTIC_GATEWAY_CONFIG_KEY`, when set and valid.
    pub fn from_env() -> Option<Self> {
        let encoded = env::var(CONFIG_KEY_ENV).ok()?;
        if encoded.trim().is_empty() {
            return None;
        }
        match Self::from_base64_key(&encoded) {
            Ok(cipher) => Some(cipher),
            Err(err) => {
                tracing::error!(error = %err, "ignoring invalid {CONFIG_KEY_ENV}");
                None
            }
        }
    }

    /// Produce an encrypted field value with a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> String {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = self
            .inner
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .expect("aes-gcm encryption of in-memory buffers cannot fail");
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        STANDARD.encode(out)
    }
}

impl Cipher for AesGcmCipher {
    fn decrypt(&self, encrypted: &str) -> DecryptResult<Zeroizing<Vec<u8>>> {
        let raw = STANDARD
            .decode(encrypted.trim())
            .map_err(|err| DecryptError::Encoding(err.to_string()))?;
        if raw.len() <= NONCE_LEN {
            return Err(DecryptError::Truncated);
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        self.inner
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| DecryptError::MacMismatch)
    }
}

impl std::fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AesGcmCipher(..)")
    }
}
