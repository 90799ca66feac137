// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! SHX: the Serpent-family extended-key block cipher.

use zeroize::Zeroize;

use crate::description::DigestKind;
use crate::engine::sbox;
use crate::error::{CryptoError, Result};
use crate::kdf;
use crate::params::KeyParams;

pub const BLOCK_SIZE: usize = 16;
pub const MIN_KEY_SIZE: usize = 192;
pub const DEFAULT_ROUNDS: u32 = 64;

/// Round counts the engine accepts.
pub const VALID_ROUNDS: [u32; 8] = [32, 40, 48, 56, 64, 80, 96, 128];

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Encrypt,
    Decrypt,
}

/// A keyed SHX permutation on 16-byte blocks. Must be `init`-ed before use;
/// round keys are zeroized on drop.
pub struct Shx {
    round_keys: Vec<u32>,
    rounds: u32,
    direction: Option<Direction>,
}

impl Default for Shx {
    fn default() -> Self {
        Self::new(DEFAULT_ROUNDS)
    }
}

impl Shx {
    pub fn new(rounds: u32) -> Self {
        Self {
            round_keys: Vec::new(),
            rounds,
            direction: None,
        }
    }

    pub fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    /// Expands `params.key()` into the round-key schedule and fixes the
    /// transform direction. Fails when the key is shorter than 192 bytes or
    /// is not of the form `64 + 128k`.
    pub fn init(&mut self, is_encryption: bool, params: &KeyParams, kdf_engine: DigestKind) -> Result<()> {
        if !VALID_ROUNDS.contains(&self.rounds) {
            return Err(CryptoError::InvalidArgument("unsupported SHX round count"));
        }
        let key = params.key();
        if key.len() < MIN_KEY_SIZE {
            return Err(CryptoError::InvalidKeySize {
                expected: "at least 192 bytes",
                got: key.len(),
            });
        }
        if (key.len() - 64) % 128 != 0 {
            return Err(CryptoError::InvalidKeySize {
                expected: "64 + 128*k bytes",
                got: key.len(),
            });
        }
        self.round_keys = kdf::expand_round_keys(key, self.rounds, kdf_engine)?;
        self.direction = Some(if is_encryption {
            Direction::Encrypt
        } else {
            Direction::Decrypt
        });
        Ok(())
    }

    pub fn encrypt_block(&self, input: &[u8], output: &mut [u8]) -> Result<()> {
        self.require_len(input, output)?;
        let mut state = load(input);
        self.forward(&mut state);
        store(&state, output);
        Ok(())
    }

    pub fn decrypt_block(&self, input: &[u8], output: &mut [u8]) -> Result<()> {
        self.require_len(input, output)?;
        let mut state = load(input);
        self.backward(&mut state);
        store(&state, output);
        Ok(())
    }

    /// Dispatches on the direction fixed at `init`.
    pub fn transform(&self, input: &[u8], output: &mut [u8]) -> Result<()> {
        match self.direction {
            Some(Direction::Encrypt) => self.encrypt_block(input, output),
            Some(Direction::Decrypt) => self.decrypt_block(input, output),
            None => Err(CryptoError::NotInitialized),
        }
    }

    fn require_len(&self, input: &[u8], output: &[u8]) -> Result<()> {
        if self.direction.is_none() {
            return Err(CryptoError::NotInitialized);
        }
        if input.len() < BLOCK_SIZE || output.len() < BLOCK_SIZE {
            return Err(CryptoError::InvalidArgument("block buffers must be >= 16 bytes"));
        }
        Ok(())
    }

    fn round_key(&self, round: u32) -> [u32; 4] {
        let base = round as usize * 4;
        [
            self.round_keys[base],
            self.round_keys[base + 1],
            self.round_keys[base + 2],
            self.round_keys[base + 3],
        ]
    }

    fn forward(&self, state: &mut [u32; 4]) {
        let r = self.rounds;
        for round in 0..r {
            xor_key(state, &self.round_key(round));
            sbox::apply((round % 8) as usize, state);
            if round != r - 1 {
                linear_transform(state);
            }
        }
        xor_key(state, &self.round_key(r));
    }

    fn backward(&self, state: &mut [u32; 4]) {
        let r = self.rounds;
        xor_key(state, &self.round_key(r));
        for round in (0..r).rev() {
            if round != r - 1 {
                inverse_linear_transform(state);
            }
            sbox::apply_inverse((round % 8) as usize, state);
            xor_key(state, &self.round_key(round));
        }
    }
}

impl Drop for Shx {
    fn drop(&mut self) {
        self.round_keys.zeroize();
    }
}

fn xor_key(state: &mut [u32; 4], key: &[u32; 4]) {
    for i in 0..4 {
        state[i] ^= key[i];
    }
}

fn load(bytes: &[u8]) -> [u32; 4] {
    let mut state = [0u32; 4];
    for (i, word) in state.iter_mut().enumerate() {
        *word = u32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().expect("4 bytes"));
    }
    state
}

fn store(state: &[u32; 4], bytes: &mut [u8]) {
    for (i, word) in state.iter().enumerate() {
        bytes[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
}

/// Standard Serpent linear transformation over the 4-word state.
fn linear_transform(state: &mut [u32; 4]) {
    let [mut x0, mut x1, mut x2, mut x3] = *state;
    x0 = x0.rotate_left(13);
    x2 = x2.rotate_left(3);
    x1 ^= x0 ^ x2;
    x3 ^= x2 ^ (x0 << 3);
    x1 = x1.rotate_left(1);
    x3 = x3.rotate_left(7);
    x0 ^= x1 ^ x3;
    x2 ^= x3 ^ (x1 << 7);
    x0 = x0.rotate_left(5);
    x2 = x2.rotate_left(22);
    *state = [x0, x1, x2, x3];
}

fn inverse_linear_transform(state: &mut [u32; 4]) {
    let [mut x0, mut x1, mut x2, mut x3] = *state;
    x2 = x2.rotate_right(22);
    x0 = x0.rotate_right(5);
    x2 ^= x3 ^ (x1 << 7);
    x0 ^= x1 ^ x3;
    x3 = x3.rotate_right(7);
    x1 = x1.rotate_right(1);
    x3 ^= x2 ^ (x0 << 3);
    x1 ^= x0 ^ x2;
    x2 = x2.rotate_right(3);
    x0 = x0.rotate_right(13);
    *state = [x0, x1, x2, x3];
}
