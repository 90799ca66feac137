// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `PackageKey`: the on-disk structure a `PackageFactory` creates,
//! authenticates, and doles sub-keys out of.

use std::collections::HashSet;

use crate::authority::KeyAuthority;
use crate::description::CipherDescription;
use crate::error::{CryptoError, Result};
use crate::serialize::{read_array, read_i64, read_u32, read_vec, write_bytes, write_i64, write_u32, Codec};

pub const MIN_SUBKEY_COUNT: usize = 1;
pub const MAX_SUBKEY_COUNT: usize = 100_000;

/// Bytes of fixed-layout header preceding the per-subkey tables, i.e.
/// everything up to but not including `subkey_policy[]`.
const FIXED_HEADER_LEN: usize = 8 + 8 + crate::authority::AUTHORITY_LEN + crate::description::DESCRIPTION_LEN + 16 + 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageKey {
    pub policy: u64,
    pub created_on: i64,
    pub authority: KeyAuthority,
    pub description: CipherDescription,
    pub extension_key: [u8; 16],
    pub subkey_policy: Vec<u64>,
    pub subkey_id: Vec<[u8; 16]>,
    pub keying_material: Vec<u8>,
}

impl PackageKey {
    pub fn subkey_count(&self) -> usize {
        self.subkey_policy.len()
    }

    pub fn subkey_size(&self) -> usize {
        self.description.subkey_size()
    }

    /// Byte length of everything before the keying material: the fixed
    /// header plus the two per-subkey tables.
    pub fn header_len(&self) -> usize {
        FIXED_HEADER_LEN + self.subkey_count() * (8 + 16)
    }

    /// Byte offset of sub-key `index`'s keying material within the whole
    /// serialized package.
    pub fn subkey_offset(&self, index: usize) -> usize {
        self.header_len() + index * self.subkey_size()
    }

    pub fn subkey_material(&self, index: usize) -> &[u8] {
        let start = index * self.subkey_size();
        &self.keying_material[start..start + self.subkey_size()]
    }

    pub fn validate(&self) -> Result<()> {
        let count = self.subkey_count();
        if !(MIN_SUBKEY_COUNT..=MAX_SUBKEY_COUNT).contains(&count) {
            return Err(CryptoError::InvalidPackage("subkey_count must be in 1..=100000"));
        }
        if self.subkey_id.len() != count {
            return Err(CryptoError::InvalidPackage("subkey_id table length mismatch"));
        }
        let unique: HashSet<[u8; 16]> = self.subkey_id.iter().copied().collect();
        if unique.len() != count {
            return Err(CryptoError::InvalidPackage("duplicate subkey_id in package"));
        }
        self.description.validate()?;
        if self.description.subkey_size() == 0 {
            return Err(CryptoError::InvalidPackage("subkey_size must be nonzero"));
        }
        if self.keying_material.len() != count * self.subkey_size() {
            return Err(CryptoError::InvalidPackage("keying_material length mismatch"));
        }
        self.authority.validate()?;
        Ok(())
    }
}

impl Codec for PackageKey {
    fn encode<W: std::io::Write>(&self, out: &mut W) -> Result<()> {
        write_i64(out, self.policy as i64)?;
        write_i64(out, self.created_on)?;
        self.authority.encode(out)?;
        self.description.encode(out)?;
        write_bytes(out, &self.extension_key)?;
        write_u32(out, self.subkey_count() as u32)?;
        for &p in &self.subkey_policy {
            write_i64(out, p as i64)?;
        }
        for id in &self.subkey_id {
            write_bytes(out, id)?;
        }
        write_bytes(out, &self.keying_material)?;
        Ok(())
    }

    fn decode<R: std::io::Read>(inp: &mut R) -> Result<Self> {
        let policy = read_i64(inp)? as u64;
        let created_on = read_i64(inp)?;
        let authority = KeyAuthority::decode(inp)?;
        let description = CipherDescription::decode(inp)?;
        let extension_key: [u8; 16] = read_array(inp)?;
        let count = read_u32(inp)? as usize;
        if !(MIN_SUBKEY_COUNT..=MAX_SUBKEY_COUNT).contains(&count) {
            return Err(CryptoError::InvalidPackage("subkey_count must be in 1..=100000"));
        }
        let mut subkey_policy = Vec::with_capacity(count);
        for _ in 0..count {
            subkey_policy.push(read_i64(inp)? as u64);
        }
        let mut subkey_id = Vec::with_capacity(count);
        for _ in 0..count {
            subkey_id.push(read_array(inp)?);
        }
        let subkey_size = description.subkey_size();
        let keying_material = read_vec(inp, subkey_size * count)?;
        let package = Self {
            policy,
            created_on,
            authority,
            description,
            extension_key,
            subkey_policy,
            subkey_id,
            keying_material,
        };
        package.validate()?;
        Ok(package)
    }
}
