// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Shared little-endian binary encoding helpers.
//!
//! Every fixed-layout structure in this crate (`CipherDescription`,
//! `KeyAuthority`, `PackageKey`, `VolumeKey`, `SessionKey`, `CipherKey`,
//! `MessageHeader`) is read and written through the same primitive helpers
//! so that "all integer fields are little-endian on disk" is
//! enforced in one place instead of four.

use std::io::{self, Read, Write};

use crate::error::{CryptoError, Result};

/// Encode/decode a fixed-layout on-disk structure. `decode` must fail with
/// [`CryptoError::StreamTooSmall`] when the stream is shorter than the
/// structure requires.
pub trait Codec: Sized {
    fn encode<W: Write>(&self, out: &mut W) -> Result<()>;
    fn decode<R: Read>(inp: &mut R) -> Result<Self>;
}

pub(crate) fn write_u32<W: Write>(out: &mut W, v: u32) -> Result<()> {
    out.write_all(&v.to_le_bytes()).map_err(Into::into)
}

pub(crate) fn write_i64<W: Write>(out: &mut W, v: i64) -> Result<()> {
    out.write_all(&v.to_le_bytes()).map_err(Into::into)
}

pub(crate) fn write_bytes<W: Write>(out: &mut W, v: &[u8]) -> Result<()> {
    out.write_all(v).map_err(Into::into)
}

pub(crate) fn write_len_prefixed<W: Write>(out: &mut W, v: &[u8]) -> Result<()> {
    write_u32(out, v.len() as u32)?;
    write_bytes(out, v)
}

pub(crate) fn read_u32<R: Read>(inp: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact(inp, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_i64<R: Read>(inp: &mut R) -> Result<i64> {
    let mut buf = [0u8; 8];
    read_exact(inp, &mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

pub(crate) fn read_vec<R: Read>(inp: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    read_exact(inp, &mut buf)?;
    Ok(buf)
}

pub(crate) fn read_array<R: Read, const N: usize>(inp: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    read_exact(inp, &mut buf)?;
    Ok(buf)
}

/// A length-prefixed byte sequence too long to fit in the remainder of a
/// stream is `StreamTooSmall`.
pub(crate) fn read_len_prefixed<R: Read>(inp: &mut R) -> Result<Vec<u8>> {
    let len = read_u32(inp)? as usize;
    read_vec(inp, len)
}

fn read_exact<R: Read>(inp: &mut R, buf: &mut [u8]) -> Result<()> {
    match inp.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(CryptoError::StreamTooSmall),
        Err(e) => Err(e.into()),
    }
}
