//! Password-based value encryption. `kdf` holds the key derivation schemes and
//! `pbe` binds them to block ciphers behind a single string codec.

pub mod kdf;
pub mod pbe;

pub use pbe::{Algorithm, CodecError, PbeCodec};
