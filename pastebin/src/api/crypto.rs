//! PrivateBin v2 paste encryption
//!
//! Pastes are encrypted client side with AES-256-GCM. The key is derived with
//! PBKDF2-SHA256 from a random master key (carried in the URL fragment)
//! concatenated with the optional paste password. The authenticated data
//! array is sent alongside the ciphertext and its compact JSON form is the
//! GCM additional data.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::io::{Read, Write};

use super::error::ApiError;

pub const KDF_ITERATIONS: u32 = 100_000;
pub const KEY_SIZE_BITS: u32 = 256;
pub const TAG_SIZE_BITS: u32 = 128;

const MASTER_KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const SALT_LEN: usize = 8;

type PasteCipher = AesGcm<Aes256, U16>;

/// Compression applied to the plaintext before encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompressionAlgorithm {
    #[serde(rename = "none")]
    None,
    /// Raw deflate, which PrivateBin labels "zlib" on the wire
    #[default]
    #[serde(rename = "zlib")]
    Gzip,
}

/// Random key shared through the paste URL fragment, base58 encoded
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey([u8; MASTER_KEY_LEN]);

impl MasterKey {
    pub fn generate() -> Self {
        let mut key = [0u8; MASTER_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_base58(encoded: &str) -> Result<Self, ApiError> {
        let decoded = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| ApiError::InvalidUrl(format!("malformed key: {}", e)))?;
        if decoded.is_empty() || decoded.len() > MASTER_KEY_LEN {
            return Err(ApiError::InvalidUrl(format!(
                "key must decode to at most {} bytes, got {}",
                MASTER_KEY_LEN,
                decoded.len()
            )));
        }

        // Leading zero bytes can be lost in base58, pad them back
        let mut key = [0u8; MASTER_KEY_LEN];
        key[MASTER_KEY_LEN - decoded.len()..].copy_from_slice(&decoded);
        Ok(Self(key))
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Cipher parameters, serialized as the positional array
/// `[iv, salt, iterations, key_size, tag_size, "aes", "gcm", compression]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CipherTuple", into = "CipherTuple")]
pub struct CipherParams {
    pub iv: String,
    pub salt: String,
    pub iterations: u32,
    pub key_size: u32,
    pub tag_size: u32,
    pub algorithm: String,
    pub mode: String,
    pub compression: CompressionAlgorithm,
}

type CipherTuple = (
    String,
    String,
    u32,
    u32,
    u32,
    String,
    String,
    CompressionAlgorithm,
);

impl From<CipherTuple> for CipherParams {
    fn from(t: CipherTuple) -> Self {
        Self {
            iv: t.0,
            salt: t.1,
            iterations: t.2,
            key_size: t.3,
            tag_size: t.4,
            algorithm: t.5,
            mode: t.6,
            compression: t.7,
        }
    }
}

impl From<CipherParams> for CipherTuple {
    fn from(p: CipherParams) -> Self {
        (
            p.iv,
            p.salt,
            p.iterations,
            p.key_size,
            p.tag_size,
            p.algorithm,
            p.mode,
            p.compression,
        )
    }
}

/// The `adata` array: `[cipher_params, formatter, open_discussion, burn_after_reading]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "AdataTuple", into = "AdataTuple")]
pub struct AuthenticatedData {
    pub cipher: CipherParams,
    pub formatter: String,
    pub open_discussion: bool,
    pub burn_after_reading: bool,
}

type AdataTuple = (CipherParams, String, u8, u8);

impl From<AdataTuple> for AuthenticatedData {
    fn from(t: AdataTuple) -> Self {
        Self {
            cipher: t.0,
            formatter: t.1,
            open_discussion: t.2 != 0,
            burn_after_reading: t.3 != 0,
        }
    }
}

impl From<AuthenticatedData> for AdataTuple {
    fn from(a: AuthenticatedData) -> Self {
        (
            a.cipher,
            a.formatter,
            u8::from(a.open_discussion),
            u8::from(a.burn_after_reading),
        )
    }
}

/// Paste-level flags covered by the authenticated data
#[derive(Debug, Clone)]
pub struct SealOptions {
    pub formatter: String,
    pub open_discussion: bool,
    pub burn_after_reading: bool,
    pub compression: CompressionAlgorithm,
}

/// Output of [`seal`]: what goes into the `adata` and `ct` request fields
#[derive(Debug, Clone)]
pub struct Sealed {
    pub adata: AuthenticatedData,
    pub ciphertext: String,
}

/// Compress and encrypt `plaintext` under a key derived from `master_key`
/// and `password`
pub fn seal(
    plaintext: &[u8],
    master_key: &MasterKey,
    password: &[u8],
    options: &SealOptions,
) -> Result<Sealed, ApiError> {
    let mut iv = [0u8; IV_LEN];
    let mut salt = [0u8; SALT_LEN];
    let mut rng = rand::thread_rng();
    rng.fill_bytes(&mut iv);
    rng.fill_bytes(&mut salt);

    let adata = AuthenticatedData {
        cipher: CipherParams {
            iv: STANDARD.encode(iv),
            salt: STANDARD.encode(salt),
            iterations: KDF_ITERATIONS,
            key_size: KEY_SIZE_BITS,
            tag_size: TAG_SIZE_BITS,
            algorithm: "aes".to_string(),
            mode: "gcm".to_string(),
            compression: options.compression,
        },
        formatter: options.formatter.clone(),
        open_discussion: options.open_discussion,
        burn_after_reading: options.burn_after_reading,
    };

    let aad = serde_json::to_vec(&adata)
        .map_err(|e| ApiError::CryptoError(format!("failed to encode adata: {}", e)))?;
    let key = derive_key(master_key, password, &salt, KDF_ITERATIONS);
    let compressed = compress(plaintext, options.compression)?;

    let cipher = PasteCipher::new_from_slice(&key)
        .map_err(|e| ApiError::CryptoError(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(
            Nonce::<U16>::from_slice(&iv),
            Payload {
                msg: &compressed,
                aad: &aad,
            },
        )
        .map_err(|_| ApiError::CryptoError("encryption failed".to_string()))?;

    Ok(Sealed {
        adata,
        ciphertext: STANDARD.encode(ciphertext),
    })
}

/// Decrypt and decompress a paste body produced by [`seal`] or a PrivateBin
/// client
pub fn open(
    adata: &AuthenticatedData,
    ciphertext: &str,
    master_key: &MasterKey,
    password: &[u8],
) -> Result<Vec<u8>, ApiError> {
    let params = &adata.cipher;
    if params.algorithm != "aes"
        || params.mode != "gcm"
        || params.key_size != KEY_SIZE_BITS
        || params.tag_size != TAG_SIZE_BITS
    {
        return Err(ApiError::CryptoError(format!(
            "unsupported cipher {}-{} ({} bit key, {} bit tag)",
            params.algorithm, params.mode, params.key_size, params.tag_size
        )));
    }
    // Server supplied, only the count PrivateBin itself uses is accepted
    if params.iterations != KDF_ITERATIONS {
        return Err(ApiError::CryptoError(format!(
            "unsupported key derivation: {} iterations, expected {}",
            params.iterations, KDF_ITERATIONS
        )));
    }

    let iv = decode_base64("iv", &params.iv)?;
    if iv.len() != IV_LEN {
        return Err(ApiError::CryptoError(format!(
            "expected a {} byte iv, got {}",
            IV_LEN,
            iv.len()
        )));
    }
    let salt = decode_base64("salt", &params.salt)?;
    let ciphertext = decode_base64("ciphertext", ciphertext)?;

    let aad = serde_json::to_vec(adata)
        .map_err(|e| ApiError::CryptoError(format!("failed to encode adata: {}", e)))?;
    let key = derive_key(master_key, password, &salt, params.iterations);

    let cipher = PasteCipher::new_from_slice(&key)
        .map_err(|e| ApiError::CryptoError(e.to_string()))?;
    let compressed = cipher
        .decrypt(
            Nonce::<U16>::from_slice(&iv),
            Payload {
                msg: &ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| {
            ApiError::CryptoError("decryption failed, wrong key or password".to_string())
        })?;

    decompress(&compressed, params.compression)
}

fn derive_key(master_key: &MasterKey, password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut material = Vec::with_capacity(MASTER_KEY_LEN + password.len());
    material.extend_from_slice(&master_key.0);
    material.extend_from_slice(password);

    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(&material, salt, iterations, &mut key);
    key
}

fn compress(data: &[u8], algorithm: CompressionAlgorithm) -> Result<Vec<u8>, ApiError> {
    match algorithm {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Gzip => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(data)
                .map_err(|e| ApiError::CompressionError(e.to_string()))?;
            encoder
                .finish()
                .map_err(|e| ApiError::CompressionError(e.to_string()))
        }
    }
}

fn decompress(data: &[u8], algorithm: CompressionAlgorithm) -> Result<Vec<u8>, ApiError> {
    match algorithm {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Gzip => {
            let mut out = Vec::new();
            DeflateDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| ApiError::CompressionError(e.to_string()))?;
            Ok(out)
        }
    }
}

fn decode_base64(field: &str, value: &str) -> Result<Vec<u8>, ApiError> {
    STANDARD
        .decode(value)
        .map_err(|e| ApiError::ParseError(format!("invalid base64 in {}: {}", field, e)))
}
