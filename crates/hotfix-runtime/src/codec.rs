//! Artifact codec
//!
//! Build artifacts are never stored in plain form. The packager encodes them
//! and the loader decodes them with the same build-time secret.
//!
//! Wire layout:
//!
//! ```text
//! magic "HFXE" (4) | version u8 (1) | nonce (12) | AES-256-GCM ciphertext + tag
//! ```
//!
//! The key is derived from the secret with HKDF-SHA256. The nonce is random
//! per encode, so two encodings of the same input differ while both decode
//! to it.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

/// Magic prefix of encoded artifacts
pub const CODEC_MAGIC: [u8; 4] = *b"HFXE";

/// Current codec version
pub const CODEC_VERSION: u8 = 1;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = CODEC_MAGIC.len() + 1 + NONCE_LEN;

const KDF_SALT: &[u8] = b"hotfix.codec.v1";
const KDF_INFO: &[u8] = b"artifact-key";

const DEFAULT_SECRET: &str = "hotfix-default-codec-secret";

/// Secret compiled into this build (`HOTFIX_CODEC_SECRET` at compile time)
pub fn build_secret() -> &'static [u8] {
    option_env!("HOTFIX_CODEC_SECRET")
        .unwrap_or(DEFAULT_SECRET)
        .as_bytes()
}

/// Codec errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Input shorter than header plus tag
    #[error("Encoded artifact too short: {0} bytes")]
    TooShort(usize),

    /// Input does not start with the codec magic
    #[error("Not an encoded artifact: bad magic {0:?}")]
    BadMagic([u8; 4]),

    /// Unknown codec version
    #[error("Unsupported codec version: {0}")]
    UnsupportedVersion(u8),

    /// Tag check failed: tampered, truncated, or encoded with another secret
    #[error("Artifact failed authentication")]
    Authentication,

    /// Key could not be derived from the secret
    #[error("Key derivation failed")]
    KeyDerivation,

    /// Encryption failed
    #[error("Encryption failed")]
    Encrypt,
}

/// Symmetric artifact codec shared by packager and loader
#[derive(Clone)]
pub struct HotfixCodec {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for HotfixCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotfixCodec").finish_non_exhaustive()
    }
}

impl HotfixCodec {
    /// Codec keyed by an explicit secret
    pub fn new(secret: &[u8]) -> Result<Self, CodecError> {
        let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), secret);
        let mut key = [0u8; 32];
        hk.expand(KDF_INFO, &mut key)
            .map_err(|_| CodecError::KeyDerivation)?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CodecError::KeyDerivation)?;
        Ok(Self { cipher })
    }

    /// Codec keyed by [`build_secret`]
    pub fn from_build_secret() -> Result<Self, CodecError> {
        Self::new(build_secret())
    }

    /// Encode plain bytes
    pub fn encode(&self, plain: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plain)
            .map_err(|_| CodecError::Encrypt)?;

        let mut out = Vec::with_capacity(HEADER_LEN + sealed.len());
        out.extend_from_slice(&CODEC_MAGIC);
        out.push(CODEC_VERSION);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Decode bytes produced by [`encode`](Self::encode)
    pub fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>, CodecError> {
        if encoded.len() < CODEC_MAGIC.len() {
            return Err(CodecError::TooShort(encoded.len()));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&encoded[..4]);
        if magic != CODEC_MAGIC {
            return Err(CodecError::BadMagic(magic));
        }
        if encoded.len() < HEADER_LEN + TAG_LEN {
            return Err(CodecError::TooShort(encoded.len()));
        }
        let version = encoded[4];
        if version != CODEC_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let nonce = Nonce::from_slice(&encoded[5..HEADER_LEN]);
        self.cipher
            .decrypt(nonce, &encoded[HEADER_LEN..])
            .map_err(|_| CodecError::Authentication)
    }
}
