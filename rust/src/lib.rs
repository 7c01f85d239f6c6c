//! Typed edits of `.properties` files with optional password-based
//! encryption of individual values.
//!
//! A run is described by a [`file::PropertyFileEdit`] (built directly or
//! loaded from a JSON job with [`config::load_job`]). Each entry assigns,
//! increments, decrements, or deletes one key, interpreting the value as a
//! string, an integer, or a date. Encrypted values are stored as
//! `ENC(<base64>)` and are compatible with the common Java PBE encryptors.

pub mod config;
pub mod crypto;
pub mod editor;
pub mod entry;
pub mod error;
pub mod file;
mod keyword;
pub mod properties;
pub mod single;

pub use editor::RunMode;
pub use error::{EditError, EditResult};
pub use file::{PropertyFileEdit, RunSummary};
pub use single::SecureValue;
