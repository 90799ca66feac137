// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `VolumeKey`: one `CipherDescription`-shaped pool of sub-keys, each bound
//! to at most one file by a 32-bit path hash.

use crate::description::{CipherDescription, DESCRIPTION_LEN};
use crate::error::{CryptoError, Result};
use crate::serialize::{read_u32, read_vec, write_u32, Codec};

pub const STATE_UNUSED: u8 = 0;
pub const STATE_ENCRYPTED: u8 = 1;
pub const STATE_DECRYPTED: u8 = 2;

/// Byte length of everything before the keying material: description,
/// subkey_count, and the two per-slot tables.
fn header_len(count: usize) -> usize {
    DESCRIPTION_LEN + 4 + count * 4 + count
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumeKey {
    pub description: CipherDescription,
    pub file_id: Vec<u32>,
    pub state: Vec<u8>,
    pub keying_material: Vec<u8>,
}

impl VolumeKey {
    pub fn subkey_count(&self) -> usize {
        self.file_id.len()
    }

    pub fn subkey_size(&self) -> usize {
        self.description.subkey_size()
    }

    pub fn header_len(&self) -> usize {
        header_len(self.subkey_count())
    }

    pub fn subkey_offset(&self, index: usize) -> usize {
        self.header_len() + index * self.subkey_size()
    }

    pub fn subkey_material(&self, index: usize) -> &[u8] {
        let start = index * self.subkey_size();
        &self.keying_material[start..start + self.subkey_size()]
    }

    pub fn validate(&self) -> Result<()> {
        self.description.validate()?;
        let count = self.subkey_count();
        if self.state.len() != count {
            return Err(CryptoError::InvalidPackage("state table length mismatch"));
        }
        if self.state.iter().any(|&s| s > STATE_DECRYPTED) {
            return Err(CryptoError::InvalidPackage("unrecognized per-file state byte"));
        }
        let subkey_size = self.subkey_size();
        if subkey_size == 0 {
            return Err(CryptoError::InvalidPackage("subkey_size must be nonzero"));
        }
        if self.keying_material.len() != count * subkey_size {
            return Err(CryptoError::InvalidPackage("keying_material length mismatch"));
        }
        Ok(())
    }
}

impl Codec for VolumeKey {
    fn encode<W: std::io::Write>(&self, out: &mut W) -> Result<()> {
        self.description.encode(out)?;
        write_u32(out, self.subkey_count() as u32)?;
        for &id in &self.file_id {
            write_u32(out, id)?;
        }
        out.write_all(&self.state)?;
        out.write_all(&self.keying_material)?;
        Ok(())
    }

    fn decode<R: std::io::Read>(inp: &mut R) -> Result<Self> {
        let description = CipherDescription::decode(inp)?;
        let count = read_u32(inp)? as usize;
        let mut file_id = Vec::with_capacity(count);
        for _ in 0..count {
            file_id.push(read_u32(inp)?);
        }
        let state = read_vec(inp, count)?;
        let subkey_size = description.subkey_size();
        let keying_material = read_vec(inp, subkey_size * count)?;
        let volume = Self {
            description,
            file_id,
            state,
            keying_material,
        };
        volume.validate()?;
        Ok(volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{CipherMode, DigestKind, EngineType, PaddingMode};
    use std::io::Cursor;

    fn sample(count: usize) -> VolumeKey {
        let description = CipherDescription {
            engine_type: EngineType::Shx,
            key_size: 32,
            iv_size: 16,
            cipher_mode: CipherMode::Ctr,
            padding_mode: PaddingMode::None,
            block_size: 16,
            round_count: 32,
            kdf_engine: DigestKind::Sha512,
            mac_size: 0,
            mac_engine: DigestKind::Sha256,
        };
        let subkey_size = description.subkey_size();
        VolumeKey {
            description,
            file_id: vec![0; count],
            state: vec![STATE_UNUSED; count],
            keying_material: vec![0x22; subkey_size * count],
        }
    }

    #[test]
    fn round_trips() {
        let mut v = sample(4);
        v.file_id[1] = 0xdead_beef;
        v.state[1] = STATE_ENCRYPTED;
        let mut buf = Vec::new();
        v.encode(&mut buf).unwrap();
        let mut cur = Cursor::new(buf);
        assert_eq!(VolumeKey::decode(&mut cur).unwrap(), v);
    }

    #[test]
    fn rejects_bad_state_byte() {
        let mut v = sample(1);
        v.state[0] = 9;
        assert!(v.validate().is_err());
    }

    #[test]
    fn subkey_offsets_are_contiguous() {
        let v = sample(3);
        let size = v.subkey_size();
        assert_eq!(v.subkey_offset(1) - v.subkey_offset(0), size);
    }
}
