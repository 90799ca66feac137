// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `SessionKey`: the packed, single-byte-field carrier format for small key
//! distribution media.
//!
//! Unlike every other fixed-layout structure in this crate, the numeric
//! tags here are single bytes rather than `u32`s (`engine type, 2-byte key
//! size, 1-byte each for IV/cipher/padding/block/rounds/kdf`) — the format
//! trades range for size, which is why `round_count` (max 128 for SHX) and
//! every enum tag fit comfortably in a `u8`.

use crate::description::{CipherDescription, CipherMode, DigestKind, EngineType, PaddingMode};
use crate::error::{CryptoError, Result};
use crate::serialize::{read_vec, Codec};

/// Bytes of fixed-layout header preceding `key` and `iv`.
pub const SESSION_HEADER_LEN: usize = 1 + 2 + 1 + 1 + 1 + 1 + 1 + 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionKey {
    pub engine_type: EngineType,
    pub key_size: u16,
    pub iv_size: u8,
    pub cipher_mode: CipherMode,
    pub padding_mode: PaddingMode,
    pub block_size: u8,
    pub round_count: u8,
    pub kdf_engine: DigestKind,
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
}

impl SessionKey {
    /// Builds a `SessionKey` from a `CipherDescription` and freshly
    /// generated key/IV material, narrowing the `CipherDescription`'s
    /// `u32` fields into this format's single-byte tags.
    pub fn new(description: &CipherDescription, key: Vec<u8>, iv: Vec<u8>) -> Result<Self> {
        if key.len() != description.key_size as usize {
            return Err(CryptoError::InvalidKeySize {
                expected: "description.key_size",
                got: key.len(),
            });
        }
        if iv.len() != description.iv_size as usize {
            return Err(CryptoError::InvalidIv {
                expected: "description.iv_size",
                got: iv.len(),
            });
        }
        Ok(Self {
            engine_type: description.engine_type,
            key_size: narrow_u16(description.key_size)?,
            iv_size: narrow_u8(description.iv_size)?,
            cipher_mode: description.cipher_mode,
            padding_mode: description.padding_mode,
            block_size: narrow_u8(description.block_size)?,
            round_count: narrow_u8(description.round_count)?,
            kdf_engine: description.kdf_engine,
            key,
            iv,
        })
    }

    /// Widens this compact record back into a full `CipherDescription`
    /// (with `mac_size = 0`, `mac_engine` defaulted — the session-key format
    /// carries no authentication fields).
    pub fn description(&self) -> CipherDescription {
        CipherDescription {
            engine_type: self.engine_type,
            key_size: self.key_size as u32,
            iv_size: self.iv_size as u32,
            cipher_mode: self.cipher_mode,
            padding_mode: self.padding_mode,
            block_size: self.block_size as u32,
            round_count: self.round_count as u32,
            kdf_engine: self.kdf_engine,
            mac_size: 0,
            mac_engine: DigestKind::Sha256,
        }
    }
}

fn narrow_u16(v: u32) -> Result<u16> {
    u16::try_from(v).map_err(|_| CryptoError::InvalidArgument("field does not fit in a session-key u16"))
}

fn narrow_u8(v: u32) -> Result<u8> {
    u8::try_from(v).map_err(|_| CryptoError::InvalidArgument("field does not fit in a session-key u8"))
}

impl Codec for SessionKey {
    fn encode<W: std::io::Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(&[self.engine_type.into_u8()])?;
        out.write_all(&self.key_size.to_le_bytes())?;
        out.write_all(&[
            self.iv_size,
            self.cipher_mode.into_u8(),
            self.padding_mode.into_u8(),
            self.block_size,
            self.round_count,
            self.kdf_engine.into_u8(),
        ])?;
        out.write_all(&self.key)?;
        out.write_all(&self.iv)?;
        Ok(())
    }

    fn decode<R: std::io::Read>(inp: &mut R) -> Result<Self> {
        let mut header = [0u8; SESSION_HEADER_LEN];
        read_exact_or_too_small(inp, &mut header)?;
        let engine_type = EngineType::from_u8(header[0])?;
        let key_size = u16::from_le_bytes([header[1], header[2]]);
        let iv_size = header[3];
        let cipher_mode = CipherMode::from_u8(header[4])?;
        let padding_mode = PaddingMode::from_u8(header[5])?;
        let block_size = header[6];
        let round_count = header[7];
        let kdf_engine = DigestKind::from_u8(header[8])?;
        let key = read_vec(inp, key_size as usize)?;
        let iv = read_vec(inp, iv_size as usize)?;
        Ok(Self {
            engine_type,
            key_size,
            iv_size,
            cipher_mode,
            padding_mode,
            block_size,
            round_count,
            kdf_engine,
            key,
            iv,
        })
    }
}

fn read_exact_or_too_small<R: std::io::Read>(inp: &mut R, buf: &mut [u8]) -> Result<()> {
    inp.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            CryptoError::StreamTooSmall
        } else {
            CryptoError::Io(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn description() -> CipherDescription {
        CipherDescription {
            engine_type: EngineType::Shx,
            key_size: 32,
            iv_size: 16,
            cipher_mode: CipherMode::Ctr,
            padding_mode: PaddingMode::None,
            block_size: 16,
            round_count: 64,
            kdf_engine: DigestKind::Sha512,
            mac_size: 0,
            mac_engine: DigestKind::Sha256,
        }
    }

    #[test]
    fn round_trips() {
        let desc = description();
        let session = SessionKey::new(&desc, vec![0x11; 32], vec![0x22; 16]).unwrap();
        let mut buf = Vec::new();
        session.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), SESSION_HEADER_LEN + 32 + 16);
        let mut cur = Cursor::new(buf);
        assert_eq!(SessionKey::decode(&mut cur).unwrap(), session);
    }

    #[test]
    fn widened_description_matches_the_narrowed_fields() {
        let desc = description();
        let session = SessionKey::new(&desc, vec![0u8; 32], vec![0u8; 16]).unwrap();
        let widened = session.description();
        assert_eq!(widened.engine_type, desc.engine_type);
        assert_eq!(widened.key_size, desc.key_size);
        assert_eq!(widened.round_count, desc.round_count);
    }

    #[test]
    fn rejects_round_count_above_255() {
        let mut desc = description();
        desc.round_count = 300;
        assert!(SessionKey::new(&desc, vec![0u8; 32], vec![0u8; 16]).is_err());
    }

    #[test]
    fn truncated_stream_is_stream_too_small() {
        let mut cur = Cursor::new(vec![0u8; 3]);
        assert!(matches!(SessionKey::decode(&mut cur), Err(CryptoError::StreamTooSmall)));
    }
}
