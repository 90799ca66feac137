// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! OFB: `S_0 = IV`, `S_i = E_K(S_{i-1})`, `out_i = in_i ⊕ S_i`. Symmetric
//! for encryption and decryption.

use crate::description::DigestKind;
use crate::engine::BlockCipher;
use crate::error::{CryptoError, Result};
use crate::modes::Mode;
use crate::params::KeyParams;

pub struct Ofb<E: BlockCipher> {
    engine: E,
    kdf_engine: DigestKind,
    block_size: usize,
    state: Vec<u8>,
    ready: bool,
}

impl<E: BlockCipher> Ofb<E> {
    pub fn new(engine: E, kdf_engine: DigestKind) -> Self {
        let block_size = engine.block_size();
        Self {
            engine,
            kdf_engine,
            block_size,
            state: Vec::new(),
            ready: false,
        }
    }
}

impl<E: BlockCipher> Mode for Ofb<E> {
    fn init(&mut self, is_encryption: bool, params: &KeyParams) -> Result<()> {
        let bs = self.block_size;
        let iv = params.iv().ok_or(CryptoError::InvalidIv { expected: "block size", got: 0 })?;
        if iv.len() != bs {
            return Err(CryptoError::InvalidIv {
                expected: "exactly one block",
                got: iv.len(),
            });
        }
        self.engine.init(is_encryption, params, self.kdf_engine)?;
        self.state = iv.to_vec();
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
        let mut next = vec![0u8; bs];
        let mut offset = 0;
        while offset < input.len() {
            self.engine.encrypt_block(&self.state, &mut next)?;
            self.state.copy_from_slice(&next);
            let take = bs.min(input.len() - offset);
            for i in 0..take {
                output[offset + i] = input[offset + i] ^ self.state[i];
            }
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
    fn is_symmetric() {
        let key = KeyParams::new(vec![0x2cu8; 192]).with_iv(vec![0x03u8; 16]);
        let mut enc = Ofb::new(Shx::new(32), DigestKind::Sha512);
        let mut dec = Ofb::new(Shx::new(32), DigestKind::Sha512);
        enc.init(true, &key).unwrap();
        dec.init(false, &key).unwrap();

        let plaintext = b"ofb keystream reused to invert the transform exactly";
        let mut ct = vec![0u8; plaintext.len()];
        enc.transform(plaintext, &mut ct).unwrap();
        let mut pt = vec![0u8; plaintext.len()];
        dec.transform(&ct, &mut pt).unwrap();
        assert_eq!(&pt, plaintext);
    }

    #[test]
    fn handles_non_block_aligned_length() {
        let key = KeyParams::new(vec![0x2cu8; 192]).with_iv(vec![0x03u8; 16]);
        let mut enc = Ofb::new(Shx::new(32), DigestKind::Sha512);
        enc.init(true, &key).unwrap();
        let plaintext = vec![0xaau8; 17];
        let mut ct = vec![0u8; plaintext.len()];
        enc.transform(&plaintext, &mut ct).unwrap();
        assert_ne!(ct, plaintext);
    }
}
