//! Encrypts or decrypts one named value without touching any file.

use std::fmt;

use tracing::debug;
use zeroize::Zeroize;

use crate::crypto::{Algorithm, PbeCodec};
use crate::editor::{open_envelope, RunMode};
use crate::error::{EditError, EditResult};

/// A named value passed through the codec. Unlike a file run, the mode
/// defaults to [`RunMode::Encrypt`].
pub struct SecureValue {
    name: String,
    value: String,
    mode: RunMode,
    algorithm: Algorithm,
    password: Option<String>,
}

impl fmt::Debug for SecureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureValue")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl Drop for SecureValue {
    fn drop(&mut self) {
        self.value.zeroize();
        if let Some(password) = self.password.as_mut() {
            password.zeroize();
        }
    }
}

impl SecureValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            mode: RunMode::Encrypt,
            algorithm: Algorithm::default(),
            password: None,
        }
    }

    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Returns `(name, value)` with the value encrypted, decrypted, or
    /// untouched depending on the mode. Encryption yields the bare
    /// ciphertext; decryption accepts it with or without `ENC(...)`.
    pub fn resolve(&self) -> EditResult<(String, String)> {
        if self.name.is_empty() {
            return Err(EditError::Validation("name is mandatory".to_string()));
        }

        let value = match self.mode {
            RunMode::None => self.value.clone(),
            RunMode::Encrypt => self
                .codec()?
                .encrypt(&self.value)
                .map_err(|e| EditError::codec(&self.name, e))?,
            RunMode::Decrypt => {
                let ciphertext = open_envelope(&self.value).unwrap_or(&self.value);
                self.codec()?
                    .decrypt(ciphertext)
                    .map_err(|e| EditError::codec(&self.name, e))?
            }
        };
        debug!(name = %self.name, mode = %self.mode, "resolved value");
        Ok((self.name.clone(), value))
    }

    fn codec(&self) -> EditResult<PbeCodec> {
        let password = self.password.as_deref().filter(|p| !p.is_empty()).ok_or_else(|| {
            EditError::Validation(format!("a password is required for mode {}", self.mode))
        })?;
        PbeCodec::new(password, self.algorithm).map_err(|e| EditError::codec(&self.name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::seal_envelope;

    #[test]
    fn encrypts_by_default() {
        let (name, ciphertext) = SecureValue::new("db.password", "secret")
            .password("XFb3T4Zy")
            .resolve()
            .expect("encrypts");
        assert_eq!(name, "db.password");
        assert!(open_envelope(&ciphertext).is_none());
        let codec = PbeCodec::new("XFb3T4Zy", Algorithm::default()).unwrap();
        assert_eq!(codec.decrypt(&ciphertext).unwrap(), "secret");
    }

    #[test]
    fn decrypts_bare_or_enveloped() {
        let codec = PbeCodec::new("pw", Algorithm::Md5AndTripleDes).unwrap();
        let ciphertext = codec.encrypt("secret").unwrap();
        for input in [ciphertext.clone(), seal_envelope(&ciphertext)] {
            let (_, plain) = SecureValue::new("k", input)
                .mode(RunMode::Decrypt)
                .algorithm(Algorithm::Md5AndTripleDes)
                .password("pw")
                .resolve()
                .expect("decrypts");
            assert_eq!(plain, "secret");
        }
    }

    #[test]
    fn none_mode_passes_value_through() {
        let resolved = SecureValue::new("k", "plain").mode(RunMode::None).resolve().unwrap();
        assert_eq!(resolved, ("k".to_string(), "plain".to_string()));
    }

    #[test]
    fn missing_inputs_are_rejected() {
        assert!(matches!(SecureValue::new("", "v").resolve(), Err(EditError::Validation(_))));
        assert!(matches!(SecureValue::new("k", "v").resolve(), Err(EditError::Validation(_))));
    }

    #[test]
    fn empty_value_is_still_processed() {
        let resolved = SecureValue::new("k", "").mode(RunMode::None).resolve().unwrap();
        assert_eq!(resolved, ("k".to_string(), String::new()));

        let (_, ciphertext) = SecureValue::new("k", "").password("pw").resolve().unwrap();
        let codec = PbeCodec::new("pw", Algorithm::default()).unwrap();
        assert_eq!(codec.decrypt(&ciphertext).unwrap(), "");

        let garbage = SecureValue::new("k", "").mode(RunMode::Decrypt).password("pw").resolve();
        assert!(matches!(garbage, Err(EditError::Decryption { .. })));
    }

    #[test]
    fn wrong_password_never_yields_the_plaintext() {
        let ciphertext = PbeCodec::new("right", Algorithm::Sha1AndDesede)
            .unwrap()
            .encrypt("a longer secret value")
            .unwrap();
        let result = SecureValue::new("k", ciphertext)
            .mode(RunMode::Decrypt)
            .algorithm(Algorithm::Sha1AndDesede)
            .password("wrong")
            .resolve();
        match result {
            Err(EditError::Decryption { key, .. }) => assert_eq!(key, "k"),
            Ok((_, garbage)) => assert_ne!(garbage, "a longer secret value"),
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
}
