//! Applies validated entries to an in-memory property map, decrypting
//! `ENC(...)` values on read and encrypting results on write.

use chrono::NaiveDateTime;
use tracing::debug;

use crate::crypto::PbeCodec;
use crate::entry::resolve::resolve;
use crate::entry::transform::transform;
use crate::entry::{Entry, Operation};
use crate::error::{EditError, EditResult};
use crate::keyword::keyword_enum;
use crate::properties::PropertyMap;

keyword_enum! {
    /// Whether values pass through the codec during a run.
    pub enum RunMode: "mode", default = None {
        Encrypt => "ENCRYPT",
        Decrypt => "DECRYPT",
        None => "NONE",
    }
}

const ENVELOPE_PREFIX: &str = "ENC(";
const ENVELOPE_SUFFIX: &str = ")";

/// Returns the ciphertext inside an `ENC(...)` envelope.
pub fn open_envelope(raw: &str) -> Option<&str> {
    raw.strip_prefix(ENVELOPE_PREFIX)?.strip_suffix(ENVELOPE_SUFFIX)
}

pub fn seal_envelope(ciphertext: &str) -> String {
    format!("{ENVELOPE_PREFIX}{ciphertext}{ENVELOPE_SUFFIX}")
}

/// Per-run settings shared by every entry.
pub struct EntryEditor<'a> {
    codec: Option<&'a PbeCodec>,
    mode: RunMode,
    skip_empty: bool,
    now: NaiveDateTime,
}

impl<'a> EntryEditor<'a> {
    pub fn new(codec: Option<&'a PbeCodec>, mode: RunMode, skip_empty: bool, now: NaiveDateTime) -> Self {
        Self {
            codec,
            mode,
            skip_empty,
            now,
        }
    }

    /// Applies one entry to `props`. The last entry naming a key wins.
    pub fn apply(&self, entry: &Entry, props: &mut PropertyMap) -> EditResult<()> {
        let key = entry.key();
        if entry.operation() == Operation::Delete {
            let removed = props.shift_remove(key).is_some();
            debug!(key, removed, "delete");
            return Ok(());
        }

        let old = self.read_old_value(key, props.get(key).map(String::as_str))?;
        let current = resolve(
            entry.operation(),
            entry.value(),
            entry.default_value(),
            old.as_deref(),
        );
        let new_value = transform(entry, current.as_deref(), self.now)?;

        let stored = if self.mode == RunMode::Encrypt && !new_value.is_empty() {
            let ciphertext = self
                .codec()?
                .encrypt(&new_value)
                .map_err(|e| EditError::codec(key, e))?;
            seal_envelope(&ciphertext)
        } else if new_value.is_empty() && !self.skip_empty {
            return Err(EditError::EmptyValue(key.to_string()));
        } else {
            new_value
        };

        debug!(
            key,
            operation = %entry.operation(),
            kind = %entry.kind(),
            encrypted = self.mode == RunMode::Encrypt && !stored.is_empty(),
            "set"
        );
        props.insert(key.to_string(), stored);
        Ok(())
    }

    fn read_old_value(&self, key: &str, raw: Option<&str>) -> EditResult<Option<String>> {
        if self.mode == RunMode::Decrypt {
            if let Some(ciphertext) = raw.and_then(open_envelope) {
                let plain = self
                    .codec()?
                    .decrypt(ciphertext)
                    .map_err(|e| EditError::codec(key, e))?;
                return Ok(Some(plain));
            }
        }
        if raw.is_none() && !self.skip_empty {
            return Err(EditError::EmptyValue(key.to_string()));
        }
        Ok(raw.map(str::to_string))
    }

    fn codec(&self) -> EditResult<&'a PbeCodec> {
        self.codec.ok_or_else(|| {
            EditError::Configuration(format!("mode {} needs a password", self.mode))
        })
    }
}
