// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! HMAC-extract-and-expand key derivation.
//!
//! The split-then-extract-then-expand construction used here is
//! exactly HKDF's extract/expand pair (RFC 5869): `PRK = HMAC_Salt(IKM)`,
//! then `T_i = HMAC_PRK(T_{i-1} ‖ Info ‖ i)`. The `hkdf` crate already
//! implements this, so the KDF here is a thin wrapper that (a) performs the
//! IKM/Salt split prescribed for extended keys and (b) parses the expanded
//! output into the little-endian `u32` round-key schedule the engines
//! consume.

use hkdf::Hkdf;
use sha2::{Sha256, Sha512};
use sha3::{Sha3_256, Sha3_512};

use crate::description::DigestKind;
use crate::error::{CryptoError, Result};

/// Fixed 32-byte ASCII `Info` constant mixed into every expansion round.
pub const INFO: [u8; 32] = *b"quillcrypt-shx-round-key-expand";

const IKM_LEN: usize = 64;
const SALT_BLOCK: usize = 128;

/// Splits an extended key `K` of length `L = 64 + 128k` into `(IKM, Salt)`.
pub fn split_extended_key(key: &[u8]) -> Result<(&[u8], &[u8])> {
    let len = key.len();
    if len < IKM_LEN + SALT_BLOCK || (len - IKM_LEN) % SALT_BLOCK != 0 {
        return Err(CryptoError::InvalidKeySize {
            expected: "64 + 128*k bytes, k >= 1",
            got: len,
        });
    }
    Ok(key.split_at(IKM_LEN))
}

/// Expands an extended key into `16 * (round_count + 1)` bytes of round-key
/// material, then reinterprets that material as little-endian `u32` words.
pub fn expand_round_keys(key: &[u8], round_count: u32, kdf_engine: DigestKind) -> Result<Vec<u32>> {
    let (ikm, salt) = split_extended_key(key)?;
    let out_len = 16 * (round_count as usize + 1);
    let okm = expand_bytes(kdf_engine, salt, ikm, &INFO, out_len)?;
    Ok(okm
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().expect("chunks_exact(4)")))
        .collect())
}

/// General-purpose HMAC-extract-and-expand, for callers (package keying
/// material, at-rest encryption) that need raw bytes rather than the
/// round-key word schedule `expand_round_keys` produces.
pub fn expand(kdf_engine: DigestKind, ikm: &[u8], salt: &[u8], info: &[u8], out_len: usize) -> Result<Vec<u8>> {
    expand_bytes(kdf_engine, salt, ikm, info, out_len)
}

fn expand_bytes(
    kdf_engine: DigestKind,
    salt: &[u8],
    ikm: &[u8],
    info: &[u8],
    out_len: usize,
) -> Result<Vec<u8>> {
    let mut okm = vec![0u8; out_len];
    match kdf_engine {
        DigestKind::Sha256 => {
            Hkdf::<Sha256>::new(Some(salt), ikm)
                .expand(info, &mut okm)
                .map_err(|_| CryptoError::InvalidArgument("HKDF expand output too long"))?;
        }
        DigestKind::Sha512 => {
            Hkdf::<Sha512>::new(Some(salt), ikm)
                .expand(info, &mut okm)
                .map_err(|_| CryptoError::InvalidArgument("HKDF expand output too long"))?;
        }
        DigestKind::Sha3_256 => {
            Hkdf::<Sha3_256>::new(Some(salt), ikm)
                .expand(info, &mut okm)
                .map_err(|_| CryptoError::InvalidArgument("HKDF expand output too long"))?;
        }
        DigestKind::Sha3_512 => {
            Hkdf::<Sha3_512>::new(Some(salt), ikm)
                .expand(info, &mut okm)
                .map_err(|_| CryptoError::InvalidArgument("HKDF expand output too long"))?;
        }
    }
    Ok(okm)
}
