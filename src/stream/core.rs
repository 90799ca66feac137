// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Shared keystream-generation plumbing for the ChaCha and Salsa engines
//!: the add-rotate-xor quarter round, extended-key folding
//! into the nonce slots, the reseed anti-symmetry test, and the counter
//! carry used by `skip`.

pub const STATE_WORDS: usize = 16;
pub const BLOCK_BYTES: usize = STATE_WORDS * 4;

pub const MIN_ROUNDS: u32 = 8;
pub const MAX_ROUNDS: u32 = 30;
pub const DEFAULT_ROUNDS: u32 = 20;

pub fn valid_round_count(rounds: u32) -> bool {
    (MIN_ROUNDS..=MAX_ROUNDS).contains(&rounds) && rounds % 2 == 0
}

#[inline]
pub fn quarter_round(state: &mut [u32; STATE_WORDS], a: usize, b: usize, c: usize, d: usize) {
    state[a] = state[a].wrapping_add(state[b]);
    state[d] ^= state[a];
    state[d] = state[d].rotate_left(16);

    state[c] = state[c].wrapping_add(state[d]);
    state[b] ^= state[c];
    state[b] = state[b].rotate_left(12);

    state[a] = state[a].wrapping_add(state[b]);
    state[d] ^= state[a];
    state[d] = state[d].rotate_left(8);

    state[c] = state[c].wrapping_add(state[d]);
    state[b] ^= state[c];
    state[b] = state[b].rotate_left(7);
}

/// Folds extended key material (the bytes of a 48/56-byte key beyond the
/// base 32) into the 4 words that carry the counter and nonce, repeating the
/// extra bytes cyclically if they overrun that 16-byte region. This crate's
/// own scheme for "extra material lives in the nonce slots"; see
/// `DESIGN.md` for why no external interoperability is implied.
pub fn fold_extended_material(nonce_words: &mut [u32; 4], extra: &[u8]) {
    if extra.is_empty() {
        return;
    }
    let mut bytes = [0u8; 16];
    for (i, w) in nonce_words.iter().enumerate() {
        bytes[i * 4..i * 4 + 4].copy_from_slice(&w.to_le_bytes());
    }
    for (i, &b) in extra.iter().enumerate() {
        bytes[i % 16] ^= b;
    }
    for (i, word) in nonce_words.iter_mut().enumerate() {
        *word = u32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().expect("4 bytes"));
    }
}

/// The reseed test: the 16-byte nonce region must not contain a
/// byte value that repeats more than twice, and no two equal bytes may sit
/// closer than 5 index positions apart.
pub fn passes_anti_symmetry(region: &[u8; 16]) -> bool {
    for value in 0u8..=255 {
        let positions: Vec<usize> = region
            .iter()
            .enumerate()
            .filter(|(_, &b)| b == value)
            .map(|(i, _)| i)
            .collect();
        if positions.len() > 2 {
            return false;
        }
        for w in positions.windows(2) {
            if w[1] - w[0] < 5 {
                return false;
            }
        }
    }
    true
}

/// Runs one pass of the core permutation (without the final feed-forward
/// addition) over the whole state, used to remix a nonce region that fails
/// the anti-symmetry test.
pub fn reseed_mix(state: &mut [u32; STATE_WORDS], rounds: u32, double_round: impl Fn(&mut [u32; STATE_WORDS])) {
    for _ in 0..rounds / 2 {
        double_round(state);
    }
}
