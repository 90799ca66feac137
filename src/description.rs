// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `CipherDescription`: the fixed 40-byte serializable record that selects
//! and sizes a cipher.

use crate::error::{CryptoError, Result};
use crate::serialize::{read_u32, write_u32, Codec};

macro_rules! tagged_enum {
    ($name:ident { $($variant:ident = $val:expr),+ $(,)? }) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        #[repr(u32)]
        pub enum $name {
            $($variant = $val),+
        }

        impl TryFrom<u32> for $name {
            type Error = CryptoError;
            fn try_from(v: u32) -> Result<Self> {
                match v {
                    $($val => Ok(Self::$variant),)+
                    _ => Err(CryptoError::InvalidPackage(stringify!($name))),
                }
            }
        }

        impl From<$name> for u32 {
            fn from(v: $name) -> u32 {
                v as u32
            }
        }

        impl $name {
            /// Narrows the tag to a single byte, for formats (e.g.
            /// `SessionKey`) that pack it into a `u8` slot.
            pub fn into_u8(self) -> u8 {
                self as u32 as u8
            }

            /// Widens a single-byte tag back into this enum.
            pub fn from_u8(v: u8) -> Result<Self> {
                Self::try_from(v as u32)
            }
        }
    };
}

tagged_enum!(EngineType {
    Shx = 0,
    ChaCha = 1,
    Salsa = 2,
});

tagged_enum!(CipherMode {
    None = 0,
    Cbc = 1,
    Cfb = 2,
    Ctr = 3,
    Ofb = 4,
});

tagged_enum!(PaddingMode {
    None = 0,
    Zero = 1,
    X923 = 2,
    Pkcs7 = 3,
    Iso7816 = 4,
});

tagged_enum!(DigestKind {
    Sha256 = 0,
    Sha512 = 1,
    Sha3_256 = 2,
    Sha3_512 = 3,
});

/// Fixed-size serialized record, 40 bytes on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CipherDescription {
    pub engine_type: EngineType,
    pub key_size: u32,
    pub iv_size: u32,
    pub cipher_mode: CipherMode,
    pub padding_mode: PaddingMode,
    pub block_size: u32,
    pub round_count: u32,
    pub kdf_engine: DigestKind,
    pub mac_size: u32,
    pub mac_engine: DigestKind,
}

pub const DESCRIPTION_LEN: usize = 40;

impl CipherDescription {
    /// Total bytes a single sub-key occupies inside a package's keying
    /// material: `key_size + iv_size + mac_size`.
    pub fn subkey_size(&self) -> usize {
        (self.key_size + self.iv_size + self.mac_size) as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size != 16 && self.block_size != 32 {
            return Err(CryptoError::InvalidArgument("block_size must be 16 or 32"));
        }
        if self.key_size == 0 {
            return Err(CryptoError::InvalidArgument("key_size must be nonzero"));
        }
        Ok(())
    }
}

impl Codec for CipherDescription {
    fn encode<W: std::io::Write>(&self, out: &mut W) -> Result<()> {
        write_u32(out, self.engine_type.into())?;
        write_u32(out, self.key_size)?;
        write_u32(out, self.iv_size)?;
        write_u32(out, self.cipher_mode.into())?;
        write_u32(out, self.padding_mode.into())?;
        write_u32(out, self.block_size)?;
        write_u32(out, self.round_count)?;
        write_u32(out, self.kdf_engine.into())?;
        write_u32(out, self.mac_size)?;
        write_u32(out, self.mac_engine.into())?;
        Ok(())
    }

    fn decode<R: std::io::Read>(inp: &mut R) -> Result<Self> {
        Ok(Self {
            engine_type: read_u32(inp)?.try_into()?,
            key_size: read_u32(inp)?,
            iv_size: read_u32(inp)?,
            cipher_mode: read_u32(inp)?.try_into()?,
            padding_mode: read_u32(inp)?.try_into()?,
            block_size: read_u32(inp)?,
            round_count: read_u32(inp)?,
            kdf_engine: read_u32(inp)?.try_into()?,
            mac_size: read_u32(inp)?,
            mac_engine: read_u32(inp)?.try_into()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> CipherDescription {
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
    fn round_trip_is_exactly_40_bytes() {
        let d = sample();
        let mut buf = Vec::new();
        d.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), DESCRIPTION_LEN);
        let mut cur = Cursor::new(buf);
        assert_eq!(CipherDescription::decode(&mut cur).unwrap(), d);
    }

    #[test]
    fn subkey_size_sums_fields() {
        let d = CipherDescription { mac_size: 32, ..sample() };
        assert_eq!(d.subkey_size(), 32 + 16 + 32);
    }

    #[test]
    fn corrupt_tag_is_invalid_package() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 99).unwrap();
        let mut cur = Cursor::new(buf);
        assert!(matches!(
            read_u32(&mut cur).and_then(|v| EngineType::try_from(v)),
            Err(CryptoError::InvalidPackage(_))
        ));
    }
}
