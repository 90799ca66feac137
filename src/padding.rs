// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Block padding schemes referenced by `CipherDescription::padding_mode`.

use crate::description::PaddingMode;
use crate::error::{CryptoError, Result};

/// Pad `data` (already holding `data.len() <= block_size` bytes of real
/// content starting at `data[..content_len]`... in practice this operates on
/// the final short block in place) up to `block_size` per `padding_mode`.
pub fn pad(mode: PaddingMode, block: &mut Vec<u8>, content_len: usize, block_size: usize) -> Result<()> {
    if content_len > block_size {
        return Err(CryptoError::InvalidArgument("content_len exceeds block_size"));
    }
    block.truncate(content_len);
    let pad_len = block_size - content_len;
    match mode {
        PaddingMode::None => {
            if pad_len != 0 {
                return Err(CryptoError::InvalidPadding);
            }
        }
        PaddingMode::Zero => block.resize(block_size, 0),
        PaddingMode::Pkcs7 => block.resize(block_size, pad_len as u8),
        PaddingMode::X923 => {
            block.resize(block_size - 1, 0);
            block.push(pad_len as u8);
        }
        PaddingMode::Iso7816 => {
            block.push(0x80);
            block.resize(block_size, 0);
        }
    }
    Ok(())
}

/// Recover the content length of a fully padded final block. `Zero` padding
/// cannot distinguish trailing zero content bytes from padding; callers that
/// select it accept that ambiguity, treating it as the degenerate "no real
/// unpadding" scheme.
pub fn unpad_len(mode: PaddingMode, block: &[u8]) -> Result<usize> {
    let block_size = block.len();
    match mode {
        PaddingMode::None | PaddingMode::Zero => Ok(block_size),
        PaddingMode::Pkcs7 => {
            let pad_len = *block.last().ok_or(CryptoError::InvalidPadding)? as usize;
            if pad_len == 0 || pad_len > block_size {
                return Err(CryptoError::InvalidPadding);
            }
            if !block[block_size - pad_len..].iter().all(|&b| b as usize == pad_len) {
                return Err(CryptoError::InvalidPadding);
            }
            Ok(block_size - pad_len)
        }
        PaddingMode::X923 => {
            let pad_len = *block.last().ok_or(CryptoError::InvalidPadding)? as usize;
            if pad_len == 0 || pad_len > block_size {
                return Err(CryptoError::InvalidPadding);
            }
            let zeros_start = block_size - pad_len;
            if !block[zeros_start..block_size - 1].iter().all(|&b| b == 0) {
                return Err(CryptoError::InvalidPadding);
            }
            Ok(zeros_start)
        }
        PaddingMode::Iso7816 => {
            let idx = block.iter().rposition(|&b| b != 0).ok_or(CryptoError::InvalidPadding)?;
            if block[idx] != 0x80 {
                return Err(CryptoError::InvalidPadding);
            }
            Ok(idx)
        }
    }
}
