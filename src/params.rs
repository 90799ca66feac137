// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `KeyParams`: the key/IV/IKM bundle every engine, stream cipher, and mode
//! is initialized with.

use zeroize::Zeroize;

use crate::error::Result;
use crate::serialize::{read_len_prefixed, write_len_prefixed, Codec};

/// Owns the byte buffers it was constructed with and zeroizes all of them on
/// drop. Cloning makes a deep copy; no inner buffer is ever
/// shared between instances.
#[derive(Clone)]
pub struct KeyParams {
    key: Vec<u8>,
    iv: Option<Vec<u8>>,
    ikm: Option<Vec<u8>>,
}

impl KeyParams {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            iv: None,
            ikm: None,
        }
    }

    pub fn with_iv(mut self, iv: impl Into<Vec<u8>>) -> Self {
        self.iv = Some(iv.into());
        self
    }

    pub fn with_ikm(mut self, ikm: impl Into<Vec<u8>>) -> Self {
        self.ikm = Some(ikm.into());
        self
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn iv(&self) -> Option<&[u8]> {
        self.iv.as_deref()
    }

    pub fn ikm(&self) -> Option<&[u8]> {
        self.ikm.as_deref()
    }
}

impl Drop for KeyParams {
    fn drop(&mut self) {
        self.key.zeroize();
        if let Some(iv) = self.iv.as_mut() {
            iv.zeroize();
        }
        if let Some(ikm) = self.ikm.as_mut() {
            ikm.zeroize();
        }
    }
}

impl std::fmt::Debug for KeyParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyParams")
            .field("key", &"[REDACTED]")
            .field("iv", &self.iv.as_ref().map(|_| "[REDACTED]"))
            .field("ikm", &self.ikm.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Codec for KeyParams {
    /// `[key_len:u32][key][iv_len:u32][iv][ikm_len:u32][ikm]`, each length 0
    /// when absent.
    fn encode<W: std::io::Write>(&self, out: &mut W) -> Result<()> {
        write_len_prefixed(out, &self.key)?;
        write_len_prefixed(out, self.iv.as_deref().unwrap_or(&[]))?;
        write_len_prefixed(out, self.ikm.as_deref().unwrap_or(&[]))?;
        Ok(())
    }

    fn decode<R: std::io::Read>(inp: &mut R) -> Result<Self> {
        let key = read_len_prefixed(inp)?;
        let iv = read_len_prefixed(inp)?;
        let ikm = read_len_prefixed(inp)?;
        Ok(Self {
            key,
            iv: (!iv.is_empty()).then_some(iv),
            ikm: (!ikm.is_empty()).then_some(ikm),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trip_with_all_fields() {
        let p = KeyParams::new(vec![1u8; 32])
            .with_iv(vec![2u8; 16])
            .with_ikm(vec![3u8; 64]);
        let mut buf = Vec::new();
        p.encode(&mut buf).unwrap();
        let mut cur = Cursor::new(buf);
        let out = KeyParams::decode(&mut cur).unwrap();
        assert_eq!(out.key(), p.key());
        assert_eq!(out.iv(), p.iv());
        assert_eq!(out.ikm(), p.ikm());
    }

    #[test]
    fn round_trip_key_only() {
        let p = KeyParams::new(vec![9u8; 8]);
        let mut buf = Vec::new();
        p.encode(&mut buf).unwrap();
        let mut cur = Cursor::new(buf);
        let out = KeyParams::decode(&mut cur).unwrap();
        assert_eq!(out.key(), p.key());
        assert!(out.iv().is_none());
        assert!(out.ikm().is_none());
    }
}
