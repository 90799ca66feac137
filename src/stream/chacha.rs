// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The ChaCha keystream generator: `constants(4) ‖ key(8) ‖ counter(2) ‖
//! nonce(2)`.

use crate::error::{CryptoError, Result};
use crate::params::KeyParams;
use crate::stream::core::{
    self, passes_anti_symmetry, quarter_round, BLOCK_BYTES, DEFAULT_ROUNDS, STATE_WORDS,
};
use crate::stream::StreamCipher;

const CONSTANTS: [u32; 4] = [0x6170_7865, 0x3320_646e, 0x7962_2d32, 0x6b20_6574];
const NONCE_WORDS: [usize; 2] = [14, 15];
const COUNTER_WORDS: [usize; 2] = [12, 13];

pub struct ChaCha {
    key_words: [u32; 8],
    nonce: [u8; 8],
    rounds: u32,
    counter: u64,
    keystream: [u8; BLOCK_BYTES],
    pos: usize,
    ready: bool,
}

impl ChaCha {
    pub fn new(rounds: u32) -> Self {
        Self {
            key_words: [0u32; 8],
            nonce: [0u8; 8],
            rounds,
            counter: 0,
            keystream: [0u8; BLOCK_BYTES],
            pos: BLOCK_BYTES,
            ready: false,
        }
    }

    fn double_round(state: &mut [u32; STATE_WORDS]) {
        quarter_round(state, 0, 4, 8, 12);
        quarter_round(state, 1, 5, 9, 13);
        quarter_round(state, 2, 6, 10, 14);
        quarter_round(state, 3, 7, 11, 15);
        quarter_round(state, 0, 5, 10, 15);
        quarter_round(state, 1, 6, 11, 12);
        quarter_round(state, 2, 7, 8, 13);
        quarter_round(state, 3, 4, 9, 14);
    }

    fn build_state(&self, counter: u64) -> [u32; STATE_WORDS] {
        let mut state = [0u32; STATE_WORDS];
        state[0..4].copy_from_slice(&CONSTANTS);
        state[4..12].copy_from_slice(&self.key_words);
        state[COUNTER_WORDS[0]] = counter as u32;
        state[COUNTER_WORDS[1]] = (counter >> 32) as u32;
        state[NONCE_WORDS[0]] = u32::from_le_bytes(self.nonce[0..4].try_into().unwrap());
        state[NONCE_WORDS[1]] = u32::from_le_bytes(self.nonce[4..8].try_into().unwrap());
        state
    }

    fn generate_block(&self, counter: u64) -> [u8; BLOCK_BYTES] {
        let original = self.build_state(counter);
        let mut working = original;
        for _ in 0..self.rounds / 2 {
            Self::double_round(&mut working);
        }
        let mut out = [0u8; BLOCK_BYTES];
        for i in 0..STATE_WORDS {
            let word = working[i].wrapping_add(original[i]);
            out[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    fn refill(&mut self) {
        self.keystream = self.generate_block(self.counter);
        self.counter = self.counter.wrapping_add(1);
        self.pos = 0;
    }

    /// Folds `extra` (the tail of a 48/56-byte key) into the counter+nonce
    /// region via `fold_extended_material`, then reseeds that region through
    /// the core permutation if it fails the anti-symmetry test. Returns the
    /// initial counter and nonce the cipher should start from; unlike the
    /// region used only to decide whether to reseed, these are the actual
    /// folded values, so `extra` always affects the keystream.
    fn derive_initial_state(key_words: &[u32; 8], nonce: &[u8; 8], extra: &[u8], rounds: u32) -> (u64, [u8; 8]) {
        let mut region: [u32; 4] = [
            0,
            0,
            u32::from_le_bytes(nonce[0..4].try_into().unwrap()),
            u32::from_le_bytes(nonce[4..8].try_into().unwrap()),
        ];
        core::fold_extended_material(&mut region, extra);

        let mut region_bytes = [0u8; 16];
        for (i, w) in region.iter().enumerate() {
            region_bytes[i * 4..i * 4 + 4].copy_from_slice(&w.to_le_bytes());
        }
        if !passes_anti_symmetry(&region_bytes) {
            let mut scratch = [0u32; STATE_WORDS];
            scratch[0..4].copy_from_slice(&CONSTANTS);
            scratch[4..12].copy_from_slice(key_words);
            scratch[COUNTER_WORDS[0]] = region[0];
            scratch[COUNTER_WORDS[1]] = region[1];
            scratch[NONCE_WORDS[0]] = region[2];
            scratch[NONCE_WORDS[1]] = region[3];
            core::reseed_mix(&mut scratch, rounds, Self::double_round);
            region[0] = scratch[COUNTER_WORDS[0]];
            region[1] = scratch[COUNTER_WORDS[1]];
            region[2] = scratch[NONCE_WORDS[0]];
            region[3] = scratch[NONCE_WORDS[1]];
        }

        let counter = (region[0] as u64) | ((region[1] as u64) << 32);
        let mut out_nonce = [0u8; 8];
        out_nonce[0..4].copy_from_slice(&region[2].to_le_bytes());
        out_nonce[4..8].copy_from_slice(&region[3].to_le_bytes());
        (counter, out_nonce)
    }
}

impl Default for ChaCha {
    fn default() -> Self {
        Self::new(DEFAULT_ROUNDS)
    }
}

impl StreamCipher for ChaCha {
    fn init(&mut self, params: &KeyParams) -> Result<()> {
        if !core::valid_round_count(self.rounds) {
            return Err(CryptoError::InvalidArgument("unsupported ChaCha round count"));
        }
        let key = params.key();
        if !matches!(key.len(), 16 | 32 | 48 | 56) {
            return Err(CryptoError::InvalidKeySize {
                expected: "16, 32, 48, or 56 bytes",
                got: key.len(),
            });
        }
        let iv = params
            .iv()
            .ok_or(CryptoError::InvalidIv { expected: "8 bytes", got: 0 })?;
        if iv.len() != 8 {
            return Err(CryptoError::InvalidIv {
                expected: "8 bytes",
                got: iv.len(),
            });
        }

        let base = &key[..32.min(key.len())];
        let mut key_bytes = [0u8; 32];
        if base.len() == 16 {
            key_bytes[0..16].copy_from_slice(base);
            key_bytes[16..32].copy_from_slice(base);
        } else {
            key_bytes.copy_from_slice(base);
        }
        let mut key_words = [0u32; 8];
        for (i, w) in key_words.iter_mut().enumerate() {
            *w = u32::from_le_bytes(key_bytes[i * 4..i * 4 + 4].try_into().unwrap());
        }

        let mut nonce = [0u8; 8];
        nonce.copy_from_slice(iv);
        let extra = &key[32.min(key.len())..];

        let (counter, nonce) = Self::derive_initial_state(&key_words, &nonce, extra, self.rounds);
        self.key_words = key_words;
        self.nonce = nonce;
        self.counter = counter;
        self.pos = BLOCK_BYTES;
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
        for i in 0..input.len() {
            if self.pos == BLOCK_BYTES {
                self.refill();
            }
            output[i] = input[i] ^ self.keystream[self.pos];
            self.pos += 1;
        }
        Ok(())
    }

    fn skip(&mut self, n: i64) -> Result<()> {
        if !self.ready {
            return Err(CryptoError::NotInitialized);
        }
        let absolute = (self.counter as i128) * BLOCK_BYTES as i128 + self.pos as i128 + n as i128;
        if absolute < 0 {
            return Err(CryptoError::InvalidArgument("skip would retreat before stream start"));
        }
        self.counter = (absolute / BLOCK_BYTES as i128) as u64;
        self.pos = (absolute % BLOCK_BYTES as i128) as usize;
        if self.pos != 0 {
            self.keystream = self.generate_block(self.counter);
            self.counter = self.counter.wrapping_add(1);
        } else {
            self.pos = BLOCK_BYTES;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_encrypt_recovers_plaintext() {
        let mut enc = ChaCha::new(20);
        let mut dec = ChaCha::new(20);
        let key = KeyParams::new(vec![0x11u8; 32]).with_iv(vec![0x22u8; 8]);
        enc.init(&key).unwrap();
        dec.init(&key).unwrap();

        let plaintext = b"the quick brown fox jumps over the lazy dog, twice over";
        let mut ct = vec![0u8; plaintext.len()];
        enc.transform(plaintext, &mut ct).unwrap();
        let mut pt = vec![0u8; plaintext.len()];
        dec.transform(&ct, &mut pt).unwrap();
        assert_eq!(pt, plaintext);
    }

    #[test]
    fn extended_key_sizes_are_accepted() {
        for len in [16usize, 32, 48, 56] {
            let mut cipher = ChaCha::new(20);
            let key = KeyParams::new(vec![0x33u8; len]).with_iv(vec![0x44u8; 8]);
            assert!(cipher.init(&key).is_ok(), "key length {len} should be accepted");
        }
    }

    #[test]
    fn extended_key_tail_changes_the_keystream() {
        let iv = vec![0x44u8; 8];
        let mut base = vec![0x33u8; 32];
        base.extend(std::iter::repeat(0xaa).take(16));
        let mut other = vec![0x33u8; 32];
        other.extend(std::iter::repeat(0xbb).take(16));

        let mut a = ChaCha::new(20);
        let mut b = ChaCha::new(20);
        a.init(&KeyParams::new(base).with_iv(iv.clone())).unwrap();
        b.init(&KeyParams::new(other).with_iv(iv)).unwrap();

        let mut out_a = [0u8; 32];
        let mut out_b = [0u8; 32];
        a.transform(&[0u8; 32], &mut out_a).unwrap();
        b.transform(&[0u8; 32], &mut out_b).unwrap();
        assert_ne!(out_a, out_b, "different extended-key tails must diverge");
    }

    #[test]
    fn skip_matches_consuming_the_same_number_of_bytes() {
        let key = KeyParams::new(vec![0xabu8; 32]).with_iv(vec![0xcdu8; 8]);
        let mut consumed = ChaCha::new(20);
        consumed.init(&key).unwrap();
        let mut throwaway = vec![0u8; 200];
        consumed.transform(&[0u8; 200], &mut throwaway).unwrap();

        let mut skipped = ChaCha::new(20);
        skipped.init(&key).unwrap();
        skipped.skip(200).unwrap();

        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        consumed.transform(&[0u8; 16], &mut a).unwrap();
        skipped.transform(&[0u8; 16], &mut b).unwrap();
        assert_eq!(a, b);
    }
}
