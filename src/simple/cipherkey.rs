// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `CipherKey`: the simple `KeyFactory` output format — a `CipherDescription`
//! plus the identifiers and parameters needed to use it once, with no
//! sub-key pool or policy.

use crate::description::CipherDescription;
use crate::error::Result;
use crate::params::KeyParams;
use crate::serialize::{read_array, write_bytes, Codec};

#[derive(Clone, Debug)]
pub struct CipherKey {
    pub description: CipherDescription,
    pub key_id: [u8; 16],
    pub extension_key: [u8; 16],
    pub params: KeyParams,
}

impl CipherKey {
    pub fn new(description: CipherDescription, key_id: [u8; 16], extension_key: [u8; 16], params: KeyParams) -> Self {
        Self {
            description,
            key_id,
            extension_key,
            params,
        }
    }
}

impl Codec for CipherKey {
    /// `CipherDescription(40B) ‖ key_id(16B) ‖ extension_key(16B) ‖
    /// KeyParams(variable)`.
    fn encode<W: std::io::Write>(&self, out: &mut W) -> Result<()> {
        self.description.encode(out)?;
        write_bytes(out, &self.key_id)?;
        write_bytes(out, &self.extension_key)?;
        self.params.encode(out)?;
        Ok(())
    }

    fn decode<R: std::io::Read>(inp: &mut R) -> Result<Self> {
        let description = CipherDescription::decode(inp)?;
        let key_id: [u8; 16] = read_array(inp)?;
        let extension_key: [u8; 16] = read_array(inp)?;
        let params = KeyParams::decode(inp)?;
        Ok(Self {
            description,
            key_id,
            extension_key,
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{CipherMode, DigestKind, EngineType, PaddingMode};
    use std::io::Cursor;

    fn description() -> CipherDescription {
        CipherDescription {
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
        }
    }

    #[test]
    fn round_trips() {
        let key = CipherKey::new(
            description(),
            [0x01; 16],
            [0x02; 16],
            KeyParams::new(vec![0x03; 32]).with_iv(vec![0x04; 16]),
        );
        let mut buf = Vec::new();
        key.encode(&mut buf).unwrap();
        let mut cur = Cursor::new(buf);
        let back = CipherKey::decode(&mut cur).unwrap();
        assert_eq!(back.description, key.description);
        assert_eq!(back.key_id, key.key_id);
        assert_eq!(back.extension_key, key.extension_key);
        assert_eq!(back.params.key(), key.params.key());
        assert_eq!(back.params.iv(), key.params.iv());
    }
}
