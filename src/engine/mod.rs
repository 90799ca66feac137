// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Block cipher engines. SHX is the in-scope exemplar; the
//! `BlockCipher` trait is the capability set every mode in `crate::modes`
//! programs against, so a mode never needs to know which concrete engine it
//! wraps.

pub mod sbox;
pub mod shx;

use crate::description::DigestKind;
use crate::error::Result;
use crate::params::KeyParams;

/// The capability set every block cipher engine exposes:
/// `{encrypt_block, decrypt_block, block_size}`, plus the shared `init` /
/// `transform` entry points.
pub trait BlockCipher {
    fn block_size(&self) -> usize;
    fn init(&mut self, is_encryption: bool, params: &KeyParams, kdf_engine: DigestKind) -> Result<()>;
    fn encrypt_block(&self, input: &[u8], output: &mut [u8]) -> Result<()>;
    fn decrypt_block(&self, input: &[u8], output: &mut [u8]) -> Result<()>;
    fn transform(&self, input: &[u8], output: &mut [u8]) -> Result<()>;
}

impl BlockCipher for shx::Shx {
    fn block_size(&self) -> usize {
        shx::Shx::block_size(self)
    }

    fn init(&mut self, is_encryption: bool, params: &KeyParams, kdf_engine: DigestKind) -> Result<()> {
        shx::Shx::init(self, is_encryption, params, kdf_engine)
    }

    fn encrypt_block(&self, input: &[u8], output: &mut [u8]) -> Result<()> {
        shx::Shx::encrypt_block(self, input, output)
    }

    fn decrypt_block(&self, input: &[u8], output: &mut [u8]) -> Result<()> {
        shx::Shx::decrypt_block(self, input, output)
    }

    fn transform(&self, input: &[u8], output: &mut [u8]) -> Result<()> {
        shx::Shx::transform(self, input, output)
    }
}
