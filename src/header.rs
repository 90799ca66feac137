// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `MessageHeader`: the 32-byte-plus-MAC prefix that binds a ciphertext to
//! the sub-key that produced it.
//!
//! Layout: `key_id[16] ‖ encrypted_extension[16] ‖ mac[mac_size]`. The
//! extension is carried as 8 UTF-16LE code units (the original file
//! extension, NUL-padded), XOR'd against the owning package's 16-byte
//! `extension_key`.
//!
//! `Compute` here is the byte-array form only: one contiguous HMAC update
//! over `key_id ‖ encrypted_extension ‖ aad`. A stream form (reading in
//! variable-sized blocks) can diverge from this for
//! inputs not aligned to the digest's block size; rather than replicate that
//! ambiguity, only this canonical whole-buffer feed is implemented.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use sha3::{Sha3_256, Sha3_512};

use crate::description::DigestKind;
use crate::error::{CryptoError, Result};

pub const HEADER_LEN: usize = 32;
const EXTENSION_CHARS: usize = 8;

pub struct MessageHeader;

impl MessageHeader {
    /// Builds the fixed header bytes for a message keyed by `key_id`,
    /// masking `extension` with the package's `extension_key` and appending
    /// `mac` verbatim when present.
    pub fn create(key_id: [u8; 16], extension: &str, extension_key: &[u8; 16], mac: Option<&[u8]>) -> Vec<u8> {
        let encrypted_extension = encrypt_extension(extension, extension_key);
        let mut out = Vec::with_capacity(HEADER_LEN + mac.map_or(0, <[u8]>::len));
        out.extend_from_slice(&key_id);
        out.extend_from_slice(&encrypted_extension);
        if let Some(mac) = mac {
            out.extend_from_slice(mac);
        }
        out
    }

    pub fn get_key_id(stream: &[u8]) -> Result<[u8; 16]> {
        if stream.len() < HEADER_LEN {
            return Err(CryptoError::StreamTooSmall);
        }
        let mut key_id = [0u8; 16];
        key_id.copy_from_slice(&stream[0..16]);
        Ok(key_id)
    }

    pub fn get_extension(stream: &[u8], extension_key: &[u8; 16]) -> Result<String> {
        if stream.len() < HEADER_LEN {
            return Err(CryptoError::StreamTooSmall);
        }
        let mut decrypted = [0u8; 16];
        for i in 0..16 {
            decrypted[i] = stream[16 + i] ^ extension_key[i];
        }
        Ok(decode_extension(&decrypted))
    }

    pub fn get_mac(stream: &[u8], mac_size: usize) -> Result<&[u8]> {
        if stream.len() < HEADER_LEN + mac_size {
            return Err(CryptoError::StreamTooSmall);
        }
        Ok(&stream[HEADER_LEN..HEADER_LEN + mac_size])
    }

    pub fn has_header(stream: &[u8]) -> bool {
        stream.len() >= HEADER_LEN
    }

    /// `HMAC_mac_key(key_id ‖ encrypted_extension ‖ aad)` in one pass.
    pub fn compute(
        mac_key: &[u8],
        key_id: &[u8; 16],
        encrypted_extension: &[u8; 16],
        aad: &[u8],
        mac_engine: DigestKind,
    ) -> Result<Vec<u8>> {
        macro_rules! run {
            ($mac_ty:ty) => {{
                let mut mac = <$mac_ty>::new_from_slice(mac_key)
                    .map_err(|_| CryptoError::InvalidArgument("HMAC accepts any key length but rejected this one"))?;
                mac.update(key_id);
                mac.update(encrypted_extension);
                mac.update(aad);
                mac.finalize().into_bytes().to_vec()
            }};
        }
        Ok(match mac_engine {
            DigestKind::Sha256 => run!(Hmac<Sha256>),
            DigestKind::Sha512 => run!(Hmac<Sha512>),
            DigestKind::Sha3_256 => run!(Hmac<Sha3_256>),
            DigestKind::Sha3_512 => run!(Hmac<Sha3_512>),
        })
    }
}

fn encrypt_extension(extension: &str, extension_key: &[u8; 16]) -> [u8; 16] {
    let plain = encode_extension(extension);
    let mut out = [0u8; 16];
    for i in 0..16 {
        out[i] = plain[i] ^ extension_key[i];
    }
    out
}

fn encode_extension(extension: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    for (i, unit) in extension.encode_utf16().take(EXTENSION_CHARS).enumerate() {
        out[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    out
}

fn decode_extension(bytes: &[u8; 16]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}
