// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `KeyAuthority`: the identity + policy record attached to a package.

use crate::error::{CryptoError, Result};
use crate::serialize::{read_array, read_i64, write_i64, Codec};

pub const AUTHORITY_LEN: usize = 144;

/// Fixed-size (144-byte) identity record. `origin_id` must carry at least 8
/// non-zero bytes to be considered valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyAuthority {
    pub domain_id: [u8; 32],
    pub origin_id: [u8; 16],
    pub target_id: [u8; 16],
    pub package_id: [u8; 32],
    pub package_tag: [u8; 32],
    /// Reserved extensibility slot, carried through unchanged.
    pub key_policy: i64,
    /// Expiration timestamp (100-ns ticks) consulted by the `Volatile`
    /// package policy flag during `Authenticate`.
    pub option_flag: i64,
}

impl KeyAuthority {
    pub fn validate(&self) -> Result<()> {
        let nonzero = self.origin_id.iter().filter(|&&b| b != 0).count();
        if nonzero < 8 {
            return Err(CryptoError::InvalidArgument(
                "origin_id must contain at least 8 non-zero bytes",
            ));
        }
        Ok(())
    }
}

impl Codec for KeyAuthority {
    fn encode<W: std::io::Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(&self.domain_id)?;
        out.write_all(&self.origin_id)?;
        out.write_all(&self.target_id)?;
        out.write_all(&self.package_id)?;
        out.write_all(&self.package_tag)?;
        write_i64(out, self.key_policy)?;
        write_i64(out, self.option_flag)?;
        Ok(())
    }

    fn decode<R: std::io::Read>(inp: &mut R) -> Result<Self> {
        Ok(Self {
            domain_id: read_array(inp)?,
            origin_id: read_array(inp)?,
            target_id: read_array(inp)?,
            package_id: read_array(inp)?,
            package_tag: read_array(inp)?,
            key_policy: read_i64(inp)?,
            option_flag: read_i64(inp)?,
        })
    }
}

fn padded<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let n = bytes.len().min(N);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

impl KeyAuthority {
    /// Convenience constructor that zero-pads ASCII/byte identifiers to the
    /// fixed field widths, used throughout tests and simple call sites.
    pub fn from_fields(
        domain_id: &[u8],
        origin_id: &[u8],
        target_id: &[u8],
        package_id: &[u8],
        package_tag: &[u8],
        key_policy: i64,
        option_flag: i64,
    ) -> Self {
        Self {
            domain_id: padded(domain_id),
            origin_id: padded(origin_id),
            target_id: padded(target_id),
            package_id: padded(package_id),
            package_tag: padded(package_tag),
            key_policy,
            option_flag,
        }
    }
}
