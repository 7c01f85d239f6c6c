//! Job files: JSON descriptions of one property-file edit.
//!
//! Any string in a job may contain `$ENV{VAR_NAME}` placeholders. They are
//! expanded after parsing so passwords and secret values never have to be
//! written into the job itself.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::crypto::Algorithm;
use crate::editor::RunMode;
use crate::entry::EntrySpec;
use crate::file::PropertyFileEdit;

const PLACEHOLDER_OPEN: &str = "$ENV{";

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job file {path} unreadable: {reason}")]
    Io { path: String, reason: String },
    #[error("job file {path} is not valid: {reason}")]
    Parse { path: String, reason: String },
    #[error("environment variable {0} is required but missing")]
    MissingEnvVar(String),
    #[error("invalid job: {0}")]
    Invalid(String),
}

/// On-disk shape of a job.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct JobFile {
    file: String,
    #[serde(default)]
    mode: RunMode,
    #[serde(default)]
    algorithm: Algorithm,
    password: Option<String>,
    /// Variable holding the password, used when `password` is absent.
    password_env: Option<String>,
    comment: Option<String>,
    #[serde(default)]
    skip_empty_values: bool,
    #[serde(default)]
    entries: Vec<EntrySpec>,
}

/// Reads the job at `path` and turns it into a ready-to-run edit. A relative
/// `file` is taken relative to the job's own directory.
pub fn load_job(path: &Path) -> Result<PropertyFileEdit, JobError> {
    let text = fs::read_to_string(path).map_err(|e| JobError::Io {
        path: path.display().to_string(),
        reason: format!("{e}"),
    })?;
    let parse_error = |e: serde_json::Error| JobError::Parse {
        path: path.display().to_string(),
        reason: format!("{e}"),
    };

    let mut value: JsonValue = serde_json::from_str(&text).map_err(parse_error)?;
    resolve_env_placeholders(&mut value)?;
    let job: JobFile = serde_json::from_value(value).map_err(parse_error)?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    job.into_edit(base)
}

impl JobFile {
    fn into_edit(self, base: &Path) -> Result<PropertyFileEdit, JobError> {
        if self.file.trim().is_empty() {
            return Err(JobError::Invalid("\"file\" must not be empty".to_string()));
        }
        let target = PathBuf::from(&self.file);
        let target = if target.is_absolute() {
            target
        } else {
            base.join(target)
        };

        let password = match (self.password, self.password_env) {
            (Some(password), _) => Some(password),
            (None, Some(var)) => {
                Some(env::var(&var).map_err(|_| JobError::MissingEnvVar(var.clone()))?)
            }
            (None, None) => None,
        };

        let mut edit = PropertyFileEdit::new(target)
            .mode(self.mode)
            .algorithm(self.algorithm)
            .skip_empty_values(self.skip_empty_values)
            .entries(self.entries);
        if let Some(password) = password {
            edit = edit.password(password);
        }
        if let Some(comment) = self.comment {
            edit = edit.comment(comment);
        }
        Ok(edit)
    }
}

fn resolve_env_placeholders(value: &mut JsonValue) -> Result<(), JobError> {
    match value {
        JsonValue::String(text) => {
            if text.contains(PLACEHOLDER_OPEN) {
                *text = expand_placeholders(text)?;
            }
        }
        JsonValue::Array(items) => {
            for item in items.iter_mut() {
                resolve_env_placeholders(item)?;
            }
        }
        JsonValue::Object(map) => {
            for val in map.values_mut() {
                resolve_env_placeholders(val)?;
            }
        }
        JsonValue::Null | JsonValue::Bool(_) | JsonValue::Number(_) => {}
    }
    Ok(())
}

/// Replaces every `$ENV{NAME}` in `text`. An unterminated or empty
/// placeholder is kept literally.
fn expand_placeholders(text: &str) -> Result<String, JobError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(PLACEHOLDER_OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + PLACEHOLDER_OPEN.len()..];
        match extract_env_placeholder(after) {
            Some((var, consumed)) => {
                let replacement =
                    env::var(var).map_err(|_| JobError::MissingEnvVar(var.to_string()))?;
                out.push_str(&replacement);
                rest = &after[consumed..];
            }
            None => {
                out.push_str(PLACEHOLDER_OPEN);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Name and consumed length (closing brace included) of the placeholder
/// starting right after `$ENV{`.
fn extract_env_placeholder(after_open: &str) -> Option<(&str, usize)> {
    let end = after_open.find('}')?;
    let inner = &after_open[..end];
    if inner.is_empty() {
        return None;
    }
    Some((inner, end + 1))
}
