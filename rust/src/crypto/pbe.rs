//! Password-based encryption of single property values.
//! Ciphertext is `base64(salt || cbc_pkcs7(utf8(plaintext)))` with an 8-byte
//! random salt, which is the layout produced by the encryptor the legacy
//! build task shipped with. The `ENC(...)` envelope is not handled here.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, InnerIvInit, KeyIvInit};
use des::{Des, TdesEde3};
use rand::rngs::OsRng;
use rand::RngCore;
use rc2::Rc2;
use thiserror::Error;
use zeroize::Zeroize;

use super::kdf::{self, ITERATIONS, PKCS12_IV_ID, PKCS12_KEY_ID};

/// Salt length; equal to the block size of every supported cipher.
pub const SALT_LEN: usize = 8;
const BLOCK_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("{0} requires an ASCII password")]
    NonAsciiPassword(Algorithm),
    #[error("unknown algorithm '{0}'")]
    UnknownAlgorithm(String),
    #[error("cipher setup failed: {0}")]
    CipherSetup(String),
    #[error("base64 decoding failed: {0}")]
    Base64DecodeFailed(String),
    #[error("ciphertext is truncated or not block aligned")]
    MalformedCiphertext,
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
}

/// The four password-based cipher suites understood by the codec.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Weakest variant, kept as the default so existing files stay readable.
    #[default]
    Md5AndDes,
    Md5AndTripleDes,
    Sha1AndDesede,
    Sha1AndRc2_40,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::Md5AndDes,
        Algorithm::Md5AndTripleDes,
        Algorithm::Sha1AndDesede,
        Algorithm::Sha1AndRc2_40,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Md5AndDes => "PBEWITHMD5ANDDES",
            Algorithm::Md5AndTripleDes => "PBEWITHMD5ANDTRIPLEDES",
            Algorithm::Sha1AndDesede => "PBEWITHSHA1ANDDESEDE",
            Algorithm::Sha1AndRc2_40 => "PBEWITHSHA1ANDRC2_40",
        }
    }

    /// Case-insensitive lookup that falls back to the default for unknown
    /// names, the way the legacy task treated its attribute.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(algorithm = value, "unknown algorithm, using {}", Algorithm::default());
            Algorithm::default()
        })
    }

    fn uses_pbes1(&self) -> bool {
        matches!(self, Algorithm::Md5AndDes | Algorithm::Md5AndTripleDes)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = CodecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|algo| algo.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| CodecError::UnknownAlgorithm(value.to_string()))
    }
}

impl<'de> serde::Deserialize<'de> for Algorithm {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = <String as serde::Deserialize>::deserialize(deserializer)?;
        Ok(Algorithm::parse_lenient(&name))
    }
}

/// Key and IV for one encryption, wiped when dropped.
struct CipherParams {
    key: Vec<u8>,
    iv: Vec<u8>,
}

impl Drop for CipherParams {
    fn drop(&mut self) {
        self.key.zeroize();
        self.iv.zeroize();
    }
}

/// String encryptor bound to one password and algorithm.
pub struct PbeCodec {
    algorithm: Algorithm,
    password: String,
}

impl PbeCodec {
    pub fn new(password: &str, algorithm: Algorithm) -> Result<Self, CodecError> {
        if password.is_empty() {
            return Err(CodecError::EmptyPassword);
        }
        if algorithm.uses_pbes1() && !password.is_ascii() {
            return Err(CodecError::NonAsciiPassword(algorithm));
        }
        Ok(Self {
            algorithm,
            password: password.to_string(),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Encrypts `plaintext` under a fresh random salt.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CodecError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        self.encrypt_with_salt(plaintext, &salt)
    }

    pub(crate) fn encrypt_with_salt(
        &self,
        plaintext: &str,
        salt: &[u8; SALT_LEN],
    ) -> Result<String, CodecError> {
        let params = self.derive(salt);
        let sealed = self.seal(&params, plaintext.as_bytes())?;

        let mut payload = Vec::with_capacity(SALT_LEN + sealed.len());
        payload.extend_from_slice(salt);
        payload.extend_from_slice(&sealed);
        Ok(STANDARD.encode(payload))
    }

    /// Decrypts text produced by [`PbeCodec::encrypt`]. A wrong password is
    /// only noticed when it corrupts the padding or the UTF-8 encoding, so a
    /// small fraction of wrong passwords decrypt to garbage instead of failing.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CodecError> {
        let payload = STANDARD
            .decode(ciphertext.trim().as_bytes())
            .map_err(|e| CodecError::Base64DecodeFailed(format!("{e}")))?;
        if payload.len() < SALT_LEN + BLOCK_LEN || (payload.len() - SALT_LEN) % BLOCK_LEN != 0 {
            return Err(CodecError::MalformedCiphertext);
        }

        let (salt, sealed) = payload.split_at(SALT_LEN);
        let params = self.derive(salt);
        let mut plain = self.open(&params, sealed)?;
        let text = String::from_utf8(plain.clone())
            .map_err(|e| CodecError::DecryptionFailed(format!("{e}")));
        plain.zeroize();
        text
    }

    fn derive(&self, salt: &[u8]) -> CipherParams {
        let password = self.password.as_bytes();
        match self.algorithm {
            Algorithm::Md5AndDes => {
                let mut derived = kdf::pbkdf1_md5(password, salt, ITERATIONS);
                let params = CipherParams {
                    key: derived[..8].to_vec(),
                    iv: derived[8..].to_vec(),
                };
                derived.zeroize();
                params
            }
            Algorithm::Md5AndTripleDes => {
                let mut salt_block = [0u8; SALT_LEN];
                salt_block.copy_from_slice(salt);
                let mut derived = kdf::md5_triple_des(password, &salt_block, ITERATIONS);
                let params = CipherParams {
                    key: derived[..24].to_vec(),
                    iv: derived[24..].to_vec(),
                };
                derived.zeroize();
                params
            }
            Algorithm::Sha1AndDesede => CipherParams {
                key: kdf::pkcs12_sha1(&self.password, salt, PKCS12_KEY_ID, ITERATIONS, 24),
                iv: kdf::pkcs12_sha1(&self.password, salt, PKCS12_IV_ID, ITERATIONS, BLOCK_LEN),
            },
            Algorithm::Sha1AndRc2_40 => CipherParams {
                key: kdf::pkcs12_sha1(&self.password, salt, PKCS12_KEY_ID, ITERATIONS, 5),
                iv: kdf::pkcs12_sha1(&self.password, salt, PKCS12_IV_ID, ITERATIONS, BLOCK_LEN),
            },
        }
    }

    fn seal(&self, params: &CipherParams, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let sealed = match self.algorithm {
            Algorithm::Md5AndDes => cbc::Encryptor::<Des>::new_from_slices(&params.key, &params.iv)
                .map_err(|e| CodecError::CipherSetup(format!("{e}")))?
                .encrypt_padded_vec_mut::<Pkcs7>(data),
            Algorithm::Md5AndTripleDes | Algorithm::Sha1AndDesede => {
                cbc::Encryptor::<TdesEde3>::new_from_slices(&params.key, &params.iv)
                    .map_err(|e| CodecError::CipherSetup(format!("{e}")))?
                    .encrypt_padded_vec_mut::<Pkcs7>(data)
            }
            Algorithm::Sha1AndRc2_40 => {
                let cipher = Rc2::new_with_eff_key_len(&params.key, 40);
                cbc::Encryptor::<Rc2>::inner_iv_slice_init(cipher, &params.iv)
                    .map_err(|e| CodecError::CipherSetup(format!("{e}")))?
                    .encrypt_padded_vec_mut::<Pkcs7>(data)
            }
        };
        Ok(sealed)
    }

    fn open(&self, params: &CipherParams, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let opened = match self.algorithm {
            Algorithm::Md5AndDes => cbc::Decryptor::<Des>::new_from_slices(&params.key, &params.iv)
                .map_err(|e| CodecError::CipherSetup(format!("{e}")))?
                .decrypt_padded_vec_mut::<Pkcs7>(data),
            Algorithm::Md5AndTripleDes | Algorithm::Sha1AndDesede => {
                cbc::Decryptor::<TdesEde3>::new_from_slices(&params.key, &params.iv)
                    .map_err(|e| CodecError::CipherSetup(format!("{e}")))?
                    .decrypt_padded_vec_mut::<Pkcs7>(data)
            }
            Algorithm::Sha1AndRc2_40 => {
                let cipher = Rc2::new_with_eff_key_len(&params.key, 40);
                cbc::Decryptor::<Rc2>::inner_iv_slice_init(cipher, &params.iv)
                    .map_err(|e| CodecError::CipherSetup(format!("{e}")))?
                    .decrypt_padded_vec_mut::<Pkcs7>(data)
            }
        };
        opened.map_err(|e| CodecError::DecryptionFailed(format!("{e}")))
    }
}

impl fmt::Debug for PbeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PbeCodec")
            .field("algorithm", &self.algorithm)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl Drop for PbeCodec {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}
