// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! CFB with a configurable feedback segment size `f` (default 8 bytes):
//! `C_i = P_i ⊕ MSB_f(E_K(IV))`, then `IV ← (IV ≪ f) ‖ C_i`. Always uses
//! the engine's forward permutation, even to decrypt.

use crate::description::DigestKind;
use crate::engine::BlockCipher;
use crate::error::{CryptoError, Result};
use crate::modes::Mode;
use crate::params::KeyParams;

pub const DEFAULT_FEEDBACK: usize = 8;

pub struct Cfb<E: BlockCipher> {
    engine: E,
    kdf_engine: DigestKind,
    block_size: usize,
    feedback: usize,
    iv: Vec<u8>,
    is_encryption: bool,
    ready: bool,
}

impl<E: BlockCipher> Cfb<E> {
    pub fn new(engine: E, kdf_engine: DigestKind) -> Self {
        Self::with_feedback(engine, kdf_engine, DEFAULT_FEEDBACK)
    }

    pub fn with_feedback(engine: E, kdf_engine: DigestKind, feedback: usize) -> Self {
        let block_size = engine.block_size();
        Self {
            engine,
            kdf_engine,
            block_size,
            feedback,
            iv: Vec::new(),
            is_encryption: false,
            ready: false,
        }
    }
}

impl<E: BlockCipher> Mode for Cfb<E> {
    fn init(&mut self, is_encryption: bool, params: &KeyParams) -> Result<()> {
        let bs = self.block_size;
        if self.feedback == 0 || self.feedback > bs {
            return Err(CryptoError::InvalidArgument("feedback size must be in 1..=block_size"));
        }
        let iv = params.iv().ok_or(CryptoError::InvalidIv { expected: "block size", got: 0 })?;
        if iv.len() != bs {
            return Err(CryptoError::InvalidIv {
                expected: "exactly one block",
                got: iv.len(),
            });
        }
        self.engine.init(true, params, self.kdf_engine)?;
        self.iv = iv.to_vec();
        self.is_encryption = is_encryption;
        self.ready = true;
        Ok(())
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8]) -> Result<()> {
        if !self.ready {
            return Err(CryptoError::NotInitialized);
        }
        if output.len() < input.len() {
            return Err(CryptoError::InvalidArgument("output shorter than input"));
        }
        let bs = self.block_size;
        let f = self.feedback;
        let mut keystream = vec![0u8; bs];
        let mut offset = 0;
        while offset < input.len() {
            self.engine.encrypt_block(&self.iv, &mut keystream)?;
            let take = f.min(input.len() - offset);
            let segment_in = &input[offset..offset + take];
            let segment_out = &mut output[offset..offset + take];
            for i in 0..take {
                segment_out[i] = segment_in[i] ^ keystream[i];
            }
            let feedback_bytes = if self.is_encryption { &*segment_out } else { segment_in };
            self.iv.copy_within(take.., 0);
            self.iv[bs - take..].copy_from_slice(feedback_bytes);
            offset += take;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::shx::Shx;

    #[test]
    fn round_trip_across_partial_segments() {
        let key = KeyParams::new(vec![0x7au8; 192]).with_iv(vec![0x09u8; 16]);
        let mut enc = Cfb::new(Shx::new(32), DigestKind::Sha512);
        let mut dec = Cfb::new(Shx::new(32), DigestKind::Sha512);
        enc.init(true, &key).unwrap();
        dec.init(false, &key).unwrap();

        let plaintext = b"a message whose length is not a multiple of the feedback size!";
        let mut ct = vec![0u8; plaintext.len()];
        enc.transform(plaintext, &mut ct).unwrap();
        let mut pt = vec![0u8; plaintext.len()];
        dec.transform(&ct, &mut pt).unwrap();
        assert_eq!(&pt, plaintext);
    }

    #[test]
    fn full_block_feedback_round_trips() {
        let key = KeyParams::new(vec![0x7au8; 192]).with_iv(vec![0x09u8; 16]);
        let mut enc = Cfb::with_feedback(Shx::new(32), DigestKind::Sha512, 16);
        let mut dec = Cfb::with_feedback(Shx::new(32), DigestKind::Sha512, 16);
        enc.init(true, &key).unwrap();
        dec.init(false, &key).unwrap();

        let plaintext = vec![0x11u8; 48];
        let mut ct = vec![0u8; plaintext.len()];
        enc.transform(&plaintext, &mut ct).unwrap();
        let mut pt = vec![0u8; plaintext.len()];
        dec.transform(&ct, &mut pt).unwrap();
        assert_eq!(pt, plaintext);
    }
}
