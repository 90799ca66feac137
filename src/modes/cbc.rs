// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! CBC: `C_i = E_K(P_i ⊕ C_{i-1})`, `C_0 = IV`. Encryption is an inherently
//! sequential chain; decryption depends only on ciphertext, so it supports
//! a worker-parallel decomposition.

use crate::description::DigestKind;
use crate::engine::BlockCipher;
use crate::error::{CryptoError, Result};
use crate::exec::{worker_count, Execution};
use crate::modes::{Mode, PARALLEL_THRESHOLD};
use crate::params::KeyParams;

pub struct Cbc<E: BlockCipher> {
    engine: E,
    kdf_engine: DigestKind,
    block_size: usize,
    iv: Vec<u8>,
    is_encryption: bool,
    execution: Execution,
    ready: bool,
}

impl<E: BlockCipher> Cbc<E> {
    pub fn new(engine: E, kdf_engine: DigestKind, execution: Execution) -> Self {
        let block_size = engine.block_size();
        Self {
            engine,
            kdf_engine,
            block_size,
            iv: Vec::new(),
            is_encryption: false,
            execution,
            ready: false,
        }
    }

    fn encrypt(&mut self, input: &[u8], output: &mut [u8]) -> Result<()> {
        let bs = self.block_size;
        let mut fed = vec![0u8; bs];
        for (chunk_in, chunk_out) in input.chunks(bs).zip(output.chunks_mut(bs)) {
            for i in 0..bs {
                fed[i] = chunk_in[i] ^ self.iv[i];
            }
            self.engine.encrypt_block(&fed, chunk_out)?;
            self.iv.copy_from_slice(chunk_out);
        }
        Ok(())
    }

    fn decrypt_sequential(&mut self, input: &[u8], output: &mut [u8]) -> Result<()> {
        let bs = self.block_size;
        for (chunk_in, chunk_out) in input.chunks(bs).zip(output.chunks_mut(bs)) {
            self.engine.decrypt_block(chunk_in, chunk_out)?;
            for i in 0..bs {
                chunk_out[i] ^= self.iv[i];
            }
            self.iv.copy_from_slice(chunk_in);
        }
        Ok(())
    }

    fn decrypt(&mut self, input: &[u8], output: &mut [u8]) -> Result<()>
    where
        E: Sync,
    {
        let bs = self.block_size;
        let total_blocks = input.len() / bs;
        let workers = worker_count();
        if total_blocks < 2 || input.len() < PARALLEL_THRESHOLD || !self.execution.is_parallel() || workers < 2 {
            return self.decrypt_sequential(input, output);
        }

        let workers = workers.min(total_blocks);
        let blocks_per_chunk = total_blocks.div_ceil(workers);
        let chunk_bytes = blocks_per_chunk * bs;
        let class_iv = self.iv.clone();
        let engine = &self.engine;

        std::thread::scope(|scope| -> Result<()> {
            let mut handles = Vec::new();
            for (i, (in_chunk, out_chunk)) in input.chunks(chunk_bytes).zip(output.chunks_mut(chunk_bytes)).enumerate() {
                let start_byte = i * chunk_bytes;
                let iv_w = if start_byte == 0 {
                    class_iv.clone()
                } else {
                    input[start_byte - bs..start_byte].to_vec()
                };
                handles.push(scope.spawn(move || -> Result<()> {
                    let mut iv = iv_w;
                    for (b_in, b_out) in in_chunk.chunks(bs).zip(out_chunk.chunks_mut(bs)) {
                        engine.decrypt_block(b_in, b_out)?;
                        for j in 0..bs {
                            b_out[j] ^= iv[j];
                        }
                        iv.copy_from_slice(b_in);
                    }
                    Ok(())
                }));
            }
            let mut first_err = None;
            for handle in handles {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => first_err.get_or_insert(e),
                    Err(_) => { first_err.get_or_insert(CryptoError::PoisonedLock); }
                };
            }
            if let Some(e) = first_err {
                return Err(e);
            }
            Ok(())
        })?;

        self.iv = input[input.len() - bs..].to_vec();
        Ok(())
    }
}

impl<E: BlockCipher + Sync> Mode for Cbc<E> {
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
        self.iv = iv.to_vec();
        self.is_encryption = is_encryption;
        self.ready = true;
        Ok(())
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8]) -> Result<()> {
        if !self.ready {
            return Err(CryptoError::NotInitialized);
        }
        let bs = self.block_size;
        if input.is_empty() || input.len() % bs != 0 {
            return Err(CryptoError::InvalidArgument("CBC input must be a nonzero multiple of the block size"));
        }
        if output.len() < input.len() {
            return Err(CryptoError::InvalidArgument("output shorter than input"));
        }
        if self.is_encryption {
            self.encrypt(input, output)
        } else {
            self.decrypt(input, output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::shx::Shx;

    fn engine_pair() -> (Cbc<Shx>, Cbc<Shx>) {
        let enc = Cbc::new(Shx::new(32), DigestKind::Sha512, Execution::linear());
        let dec = Cbc::new(Shx::new(32), DigestKind::Sha512, Execution::linear());
        (enc, dec)
    }

    #[test]
    fn round_trip_multi_block() {
        let (mut enc, mut dec) = engine_pair();
        let key = KeyParams::new(vec![0x5au8; 192]).with_iv(vec![0x11u8; 16]);
        enc.init(true, &key).unwrap();
        dec.init(false, &key).unwrap();

        let plaintext = vec![0x42u8; 16 * 8];
        let mut ct = vec![0u8; plaintext.len()];
        enc.transform(&plaintext, &mut ct).unwrap();
        let mut pt = vec![0u8; plaintext.len()];
        dec.transform(&ct, &mut pt).unwrap();
        assert_eq!(pt, plaintext);
    }

    #[test]
    fn parallel_decrypt_matches_sequential() {
        let key = KeyParams::new(vec![0x5au8; 192]).with_iv(vec![0x11u8; 16]);
        let mut enc = Cbc::new(Shx::new(32), DigestKind::Sha512, Execution::linear());
        enc.init(true, &key).unwrap();
        let plaintext: Vec<u8> = (0..4096u32).map(|i| i as u8).collect();
        let mut ct = vec![0u8; plaintext.len()];
        enc.transform(&plaintext, &mut ct).unwrap();

        let mut dec_seq = Cbc::new(Shx::new(32), DigestKind::Sha512, Execution::linear());
        dec_seq.init(false, &key).unwrap();
        let mut pt_seq = vec![0u8; ct.len()];
        dec_seq.transform(&ct, &mut pt_seq).unwrap();

        let mut dec_par = Cbc::new(Shx::new(32), DigestKind::Sha512, Execution::parallel());
        dec_par.init(false, &key).unwrap();
        let mut pt_par = vec![0u8; ct.len()];
        dec_par.transform(&ct, &mut pt_par).unwrap();

        assert_eq!(pt_seq, plaintext);
        assert_eq!(pt_par, plaintext);
        assert_eq!(dec_seq.iv, dec_par.iv);
    }
}
