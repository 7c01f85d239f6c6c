//! Key derivation schemes behind the legacy password-based algorithms.
//! Each function is deterministic for a given password, salt, and iteration
//! count so ciphertext written by one run can be read back by the next.

use md5::{Digest, Md5};
use sha1::Sha1;
use zeroize::Zeroize;

/// Iteration count shared by every algorithm variant.
pub const ITERATIONS: usize = 1000;

/// PKCS#12 diversifier for cipher key material.
pub const PKCS12_KEY_ID: u8 = 1;
/// PKCS#12 diversifier for the initialization vector.
pub const PKCS12_IV_ID: u8 = 2;

const SHA1_BLOCK_LEN: usize = 64;

/// PKCS#5 v1.5 PBKDF1 over MD5. The 16-byte output is split by callers into
/// an 8-byte DES key followed by an 8-byte IV.
pub fn pbkdf1_md5(password: &[u8], salt: &[u8], iterations: usize) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(password);
    hasher.update(salt);
    let mut digest: [u8; 16] = hasher.finalize().into();
    for _ in 1..iterations {
        digest = Md5::digest(digest).into();
    }
    digest
}

/// Triple-DES flavour of PBES1: each salt half is hashed independently with
/// the password and the two digests are concatenated into 24 key bytes plus
/// an 8-byte IV.
pub fn md5_triple_des(password: &[u8], salt: &[u8; 8], iterations: usize) -> [u8; 32] {
    let mut salt = *salt;
    if salt[..4] == salt[4..] {
        // Identical halves: the first half is reversed, as SunJCE does since
        // JDK 9. JDK 8 permuted it to [s3, s0, s1, s3] instead.
        salt[..4].reverse();
    }

    let mut output = [0u8; 32];
    for (half, chunk) in salt.chunks(4).enumerate() {
        let mut state = chunk.to_vec();
        for _ in 0..iterations {
            let mut hasher = Md5::new();
            hasher.update(&state);
            hasher.update(password);
            state = hasher.finalize().to_vec();
        }
        output[half * 16..(half + 1) * 16].copy_from_slice(&state);
        state.zeroize();
    }
    output
}

/// RFC 7292 appendix B key derivation with SHA-1. The password is encoded as
/// a big-endian BMPString with a two-byte terminator.
pub fn pkcs12_sha1(password: &str, salt: &[u8], id: u8, iterations: usize, len: usize) -> Vec<u8> {
    let mut pass: Vec<u8> = password
        .encode_utf16()
        .flat_map(u16::to_be_bytes)
        .chain([0, 0])
        .collect();

    let mut input = stretch(salt);
    input.extend(stretch(&pass));
    pass.zeroize();

    let diversifier = [id; SHA1_BLOCK_LEN];
    let mut output = Vec::with_capacity(len + 20);
    while output.len() < len {
        let mut hasher = Sha1::new();
        hasher.update(diversifier);
        hasher.update(&input);
        let mut block: [u8; 20] = hasher.finalize().into();
        for _ in 1..iterations {
            block = Sha1::digest(block).into();
        }
        output.extend_from_slice(&block);

        let filler: Vec<u8> = block.iter().copied().cycle().take(SHA1_BLOCK_LEN).collect();
        for chunk in input.chunks_mut(SHA1_BLOCK_LEN) {
            add_with_carry(chunk, &filler);
        }
        block.zeroize();
    }
    input.zeroize();
    output.truncate(len);
    output
}

/// Repeats `data` up to the next multiple of the SHA-1 block length.
fn stretch(data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    let len = SHA1_BLOCK_LEN * data.len().div_ceil(SHA1_BLOCK_LEN);
    data.iter().copied().cycle().take(len).collect()
}

/// `chunk = (chunk + addend + 1) mod 2^(8 * len)`, big-endian.
fn add_with_carry(chunk: &mut [u8], addend: &[u8]) {
    let mut carry = 1u16;
    for (byte, add) in chunk.iter_mut().zip(addend).rev() {
        let sum = u16::from(*byte) + u16::from(*add) + carry;
        *byte = sum as u8;
        carry = sum >> 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex::ToHex;

    const SALT: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

    #[test]
    fn pbkdf1_matches_reference_digest() {
        let derived = pbkdf1_md5(b"XFb3T4Zy", &SALT, ITERATIONS);
        assert_eq!(derived.encode_hex::<String>(), "69b67f413f7d8f551f3d94bd6ffda4b6");
    }

    #[test]
    fn triple_des_derivation_matches_reference() {
        let derived = md5_triple_des(b"XFb3T4Zy", &SALT, ITERATIONS);
        assert_eq!(
            derived.encode_hex::<String>(),
            "82942ad49190a76e344689971ae201b08a0a83fbc293b6594717142af3facf9b"
        );
    }

    #[test]
    fn triple_des_reverses_identical_salt_halves_like_current_jdks() {
        let salt = [0x0a, 0x0b, 0x0c, 0x0d, 0x0a, 0x0b, 0x0c, 0x0d];
        let derived = md5_triple_des(b"XFb3T4Zy", &salt, ITERATIONS);
        assert_eq!(
            derived.encode_hex::<String>(),
            "70c8ab3351bc80705bc0fa4d6ece6eb4a219ae201fc78dcccb3f4da073301a98"
        );
    }

    #[test]
    fn pkcs12_matches_published_vectors() {
        let salt = hex::decode("0a58cf64530d823f").unwrap();
        let key = pkcs12_sha1("smeg", &salt, PKCS12_KEY_ID, 1, 24);
        assert_eq!(
            key.encode_hex::<String>(),
            "8aaae6297b6cb04642ab5b077851284eb7128f1a2a7fbca3"
        );
        let iv = pkcs12_sha1("smeg", &salt, PKCS12_IV_ID, 1, 8);
        assert_eq!(iv.encode_hex::<String>(), "79993dfe048d3b76");

        let salt = hex::decode("1682c0fc5b3f7ec5").unwrap();
        let key = pkcs12_sha1("queeg", &salt, PKCS12_KEY_ID, 1000, 24);
        assert_eq!(
            key.encode_hex::<String>(),
            "483dd6e919d7de2e8e648ba8f862f3fbfbdc2bcb2c02957f"
        );
    }

    #[test]
    fn pkcs12_short_output_is_a_prefix() {
        let long = pkcs12_sha1("XFb3T4Zy", &SALT, PKCS12_KEY_ID, ITERATIONS, 24);
        let short = pkcs12_sha1("XFb3T4Zy", &SALT, PKCS12_KEY_ID, ITERATIONS, 5);
        assert_eq!(short.encode_hex::<String>(), "3c7607bc44");
        assert_eq!(&long[..5], short.as_slice());
    }
}
