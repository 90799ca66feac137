// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! CTR/SIC: `keystream_i = E_K(counter_i)`, `out_i = in_i ⊕ keystream_i`,
//! `counter ← counter + 1`. Always uses the forward
//! permutation. Input at least 1024 bytes on a host with more than one
//! worker triggers the parallel decomposition; the post-transform counter
//! is identical to the sequential result either way.

use crate::description::DigestKind;
use crate::engine::BlockCipher;
use crate::error::{CryptoError, Result};
use crate::exec::{worker_count, Execution};
use crate::modes::{add_counter, Mode, PARALLEL_THRESHOLD};
use crate::params::KeyParams;

pub struct Ctr<E: BlockCipher> {
    engine: E,
    kdf_engine: DigestKind,
    block_size: usize,
    counter: Vec<u8>,
    keystream: Vec<u8>,
    pos: usize,
    execution: Execution,
    ready: bool,
}

impl<E: BlockCipher> Ctr<E> {
    pub fn new(engine: E, kdf_engine: DigestKind, execution: Execution) -> Self {
        let block_size = engine.block_size();
        Self {
            engine,
            kdf_engine,
            block_size,
            counter: Vec::new(),
            keystream: Vec::new(),
            pos: 0,
            execution,
            ready: false,
        }
    }

    /// Counter state as of the last completed transform; exposed for the
    /// scenario-2-style equivalence test between sequential and parallel
    /// runs.
    pub fn counter(&self) -> &[u8] {
        &self.counter
    }

    fn refill(&mut self) -> Result<()> {
        self.engine.encrypt_block(&self.counter, &mut self.keystream)?;
        add_counter(&mut self.counter, 1);
        self.pos = 0;
        Ok(())
    }

    fn transform_parallel_prefix(&mut self, input: &[u8], output: &mut [u8], workers: usize) -> Result<()>
    where
        E: Sync,
    {
        let bs = self.block_size;
        let total_blocks = input.len() / bs;
        let workers = workers.min(total_blocks);
        let blocks_per_chunk = total_blocks.div_ceil(workers);
        let chunk_bytes = blocks_per_chunk * bs;
        let base_counter = self.counter.clone();
        let engine = &self.engine;

        let last_counter = std::thread::scope(|scope| -> Result<Vec<u8>> {
            let mut handles = Vec::new();
            for (i, (in_chunk, out_chunk)) in input.chunks(chunk_bytes).zip(output.chunks_mut(chunk_bytes)).enumerate() {
                let mut counter_w = base_counter.clone();
                add_counter(&mut counter_w, (i * blocks_per_chunk) as u64);
                handles.push(scope.spawn(move || -> Result<Vec<u8>> {
                    let mut counter = counter_w;
                    let mut keystream = vec![0u8; bs];
                    for (b_in, b_out) in in_chunk.chunks(bs).zip(out_chunk.chunks_mut(bs)) {
                        engine.encrypt_block(&counter, &mut keystream)?;
                        for j in 0..b_in.len() {
                            b_out[j] = b_in[j] ^ keystream[j];
                        }
                        add_counter(&mut counter, 1);
                    }
                    Ok(counter)
                }));
            }
            let mut last = base_counter;
            for handle in handles {
                match handle.join() {
                    Ok(Ok(counter)) => last = counter,
                    Ok(Err(e)) => return Err(e),
                    Err(_) => return Err(CryptoError::PoisonedLock),
                }
            }
            Ok(last)
        })?;

        self.counter = last_counter;
        self.pos = bs;
        Ok(())
    }
}

impl<E: BlockCipher + Sync> Mode for Ctr<E> {
    fn init(&mut self, is_encryption: bool, params: &KeyParams) -> Result<()> {
        let bs = self.block_size;
        let iv = params.iv().ok_or(CryptoError::InvalidIv { expected: "block size", got: 0 })?;
        if iv.len() != bs {
            return Err(CryptoError::InvalidIv {
                expected: "block size (16 or 32 bytes)",
                got: iv.len(),
            });
        }
        self.engine.init(is_encryption, params, self.kdf_engine)?;
        self.counter = iv.to_vec();
        self.keystream = vec![0u8; bs];
        self.pos = bs;
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
        let mut offset = 0;

        if self.pos == bs
            && self.execution.is_parallel()
            && input.len() >= PARALLEL_THRESHOLD
            && worker_count() > 1
        {
            let total_blocks = input.len() / bs;
            let workers = worker_count().min(total_blocks);
            if workers > 1 {
                let aligned = total_blocks * bs;
                self.transform_parallel_prefix(&input[..aligned], &mut output[..aligned], workers)?;
                offset = aligned;
            }
        }

        while offset < input.len() {
            if self.pos == bs {
                self.refill()?;
            }
            let take = (bs - self.pos).min(input.len() - offset);
            for i in 0..take {
                output[offset + i] = input[offset + i] ^ self.keystream[self.pos + i];
            }
            self.pos += take;
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
    fn round_trip_short_input() {
        let key = KeyParams::new(vec![0x01u8; 192]).with_iv((0u8..16).collect::<Vec<_>>());
        let mut enc = Ctr::new(Shx::new(64), DigestKind::Sha512, Execution::linear());
        let mut dec = Ctr::new(Shx::new(64), DigestKind::Sha512, Execution::linear());
        enc.init(true, &key).unwrap();
        dec.init(false, &key).unwrap();

        let plaintext = b"short message, not a multiple of the block size at all";
        let mut ct = vec![0u8; plaintext.len()];
        enc.transform(plaintext, &mut ct).unwrap();
        let mut pt = vec![0u8; plaintext.len()];
        dec.transform(&ct, &mut pt).unwrap();
        assert_eq!(&pt, plaintext);
    }

    #[test]
    fn parallel_and_sequential_agree_on_output_and_counter() {
        let key = KeyParams::new(vec![0x01u8; 192]).with_iv((0u8..16).collect::<Vec<_>>());
        let plaintext = vec![0u8; 4096];

        let mut seq = Ctr::new(Shx::new(64), DigestKind::Sha512, Execution::linear());
        seq.init(true, &key).unwrap();
        let mut ct_seq = vec![0u8; plaintext.len()];
        seq.transform(&plaintext, &mut ct_seq).unwrap();

        let mut par = Ctr::new(Shx::new(64), DigestKind::Sha512, Execution::parallel());
        par.init(true, &key).unwrap();
        let mut ct_par = vec![0u8; plaintext.len()];
        par.transform(&plaintext, &mut ct_par).unwrap();

        assert_eq!(ct_seq, ct_par);
        assert_eq!(seq.counter(), par.counter());
    }

    #[test]
    fn counter_advances_by_ceil_blocks_processed() {
        let key = KeyParams::new(vec![0x01u8; 192]).with_iv(vec![0u8; 16]);
        let mut ctr = Ctr::new(Shx::new(32), DigestKind::Sha512, Execution::linear());
        ctr.init(true, &key).unwrap();
        let mut out = vec![0u8; 17];
        ctr.transform(&[0u8; 17], &mut out).unwrap();
        let mut expected = vec![0u8; 16];
        add_counter(&mut expected, 2);
        assert_eq!(ctr.counter(), expected);
    }

    proptest::proptest! {
        #[test]
        fn parallel_and_sequential_agree_over_arbitrary_lengths(
            plaintext in proptest::collection::vec(proptest::num::u8::ANY, 0..6000),
        ) {
            let key = KeyParams::new(vec![0x07u8; 192]).with_iv(vec![0x03u8; 16]);

            let mut seq = Ctr::new(Shx::new(32), DigestKind::Sha256, Execution::linear());
            seq.init(true, &key).unwrap();
            let mut ct_seq = vec![0u8; plaintext.len()];
            seq.transform(&plaintext, &mut ct_seq).unwrap();

            let mut par = Ctr::new(Shx::new(32), DigestKind::Sha256, Execution::parallel());
            par.init(true, &key).unwrap();
            let mut ct_par = vec![0u8; plaintext.len()];
            par.transform(&plaintext, &mut ct_par).unwrap();

            proptest::prop_assert_eq!(ct_seq, ct_par);
        }
    }
}
