// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `VolumeCipher`: drives a `VolumeFactory`'s sub-key pool across a batch of
//! on-disk files. CTR always, and CBC/CFB only while
//! decrypting, run the batch across the worker pool since each file's
//! transform is independent; every other combination runs file-by-file.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::description::{CipherDescription, CipherMode, EngineType};
use crate::engine::shx::Shx;
use crate::error::{CryptoError, Result};
use crate::exec::pool::parallel_for;
use crate::exec::worker_count;
use crate::modes::{cbc::Cbc, cfb::Cfb, ctr::Ctr, ofb::Ofb, Mode};
use crate::padding;
use crate::params::KeyParams;
use crate::stream::{chacha::ChaCha, salsa::Salsa, StreamCipher};
use crate::volume::factory::VolumeFactory;
use crate::volume::key::{STATE_DECRYPTED, STATE_ENCRYPTED, STATE_UNUSED};

/// Per-file result of a batch transform: a skipped file carries a
/// human-readable reason instead of aborting the whole batch.
#[derive(Clone, Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub skipped: bool,
    pub error: Option<String>,
}

pub struct VolumeCipher<'f, S> {
    factory: &'f mut VolumeFactory<S>,
}

impl<'f, S: Read + Write + Seek> VolumeCipher<'f, S> {
    pub fn new(factory: &'f mut VolumeFactory<S>) -> Self {
        Self { factory }
    }

    /// Assigns the next unused sub-key to each path, marks it `Encrypted`,
    /// and transforms every file in place.
    pub fn encrypt_paths(&mut self, paths: &[PathBuf]) -> Result<Vec<FileOutcome>> {
        let available = self.factory.volume().subkey_count();
        if paths.len() > available {
            return Err(CryptoError::InvalidArgument(
                "subkey_count must be at least the number of paths to encrypt",
            ));
        }

        let mut assignments = Vec::with_capacity(paths.len());
        for path in paths {
            let idx = self
                .factory
                .volume()
                .state
                .iter()
                .position(|&s| s == STATE_UNUSED)
                .ok_or(CryptoError::PackageFull)?;
            self.factory.volume_mut().state[idx] = STATE_ENCRYPTED;
            self.factory.volume_mut().file_id[idx] = hash_path(path);
            assignments.push((path.clone(), idx));
        }

        let outcomes = transform_files(self.factory, &assignments, true)?;
        self.factory.persist()?;
        Ok(outcomes)
    }

    /// Looks each path's sub-key up by file hash and transforms every match
    /// in place; paths with no matching `Encrypted` sub-key are skipped.
    pub fn decrypt_paths(&mut self, paths: &[PathBuf]) -> Result<Vec<FileOutcome>> {
        let mut assignments = Vec::new();
        let mut outcomes: Vec<Option<FileOutcome>> = vec![None; paths.len()];

        for (i, path) in paths.iter().enumerate() {
            let hash = hash_path(path);
            let found = self
                .factory
                .volume()
                .file_id
                .iter()
                .zip(self.factory.volume().state.iter())
                .position(|(&id, &st)| id == hash && st == STATE_ENCRYPTED);
            match found {
                Some(idx) => assignments.push((i, path.clone(), idx)),
                None => {
                    log::warn!("volume decrypt: no matching sub-key for {}, skipping", path.display());
                    outcomes[i] = Some(FileOutcome {
                        path: path.clone(),
                        skipped: true,
                        error: Some("no matching sub-key for this path".to_string()),
                    })
                }
            }
        }

        let batch: Vec<(PathBuf, usize)> = assignments.iter().map(|(_, p, idx)| (p.clone(), *idx)).collect();
        let results = transform_files(self.factory, &batch, false)?;
        for ((i, _, idx), outcome) in assignments.iter().zip(results.into_iter()) {
            if outcome.error.is_none() {
                self.factory.volume_mut().state[*idx] = STATE_DECRYPTED;
            }
            outcomes[*i] = Some(outcome);
        }

        self.factory.persist()?;
        Ok(outcomes.into_iter().map(|o| o.expect("every path gets an outcome")).collect())
    }
}

fn transform_files<S>(factory: &VolumeFactory<S>, assignments: &[(PathBuf, usize)], is_encryption: bool) -> Result<Vec<FileOutcome>> {
    let volume = factory.volume();
    let parallel_capable = matches!(volume.description.cipher_mode, CipherMode::Ctr)
        || (!is_encryption && matches!(volume.description.cipher_mode, CipherMode::Cbc | CipherMode::Cfb));
    let use_parallel = parallel_capable && factory.execution().is_parallel() && worker_count() > 1 && assignments.len() > 1;

    if !use_parallel {
        return Ok(assignments
            .iter()
            .map(|(path, idx)| transform_one_file(volume, *idx, path, is_encryption))
            .collect());
    }

    let slots: Vec<std::sync::Mutex<Option<FileOutcome>>> = (0..assignments.len()).map(|_| std::sync::Mutex::new(None)).collect();
    parallel_for(assignments.len(), worker_count(), |start, end| {
        for i in start..end {
            let (path, idx) = &assignments[i];
            let outcome = transform_one_file(volume, *idx, path, is_encryption);
            *slots[i].lock().expect("worker panic poisons the outcome slot") = Some(outcome);
        }
    })?;
    Ok(slots
        .into_iter()
        .map(|m| m.into_inner().expect("lock released").expect("every slot filled"))
        .collect())
}

fn transform_one_file(volume: &crate::volume::key::VolumeKey, idx: usize, path: &Path, is_encryption: bool) -> FileOutcome {
    match transform_one_file_inner(volume, idx, path, is_encryption) {
        Ok(()) => FileOutcome {
            path: path.to_path_buf(),
            skipped: false,
            error: None,
        },
        Err(e) => {
            log::warn!("volume transform: {} failed, skipping: {e}", path.display());
            FileOutcome {
                path: path.to_path_buf(),
                skipped: true,
                error: Some(e.to_string()),
            }
        }
    }
}

fn transform_one_file_inner(volume: &crate::volume::key::VolumeKey, idx: usize, path: &Path, is_encryption: bool) -> Result<()> {
    let desc = &volume.description;
    let params = build_params(desc, volume.subkey_material(idx));
    let mut engine = Engine::build(desc, is_encryption, &params)?;
    let is_stream = matches!(desc.engine_type, EngineType::ChaCha | EngineType::Salsa);
    let block_size = desc.block_size as usize;

    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    let output = if is_encryption {
        if !is_stream {
            let content_len = data.len() % block_size;
            let tail_start = data.len() - content_len;
            let mut last = data[tail_start..].to_vec();
            padding::pad(desc.padding_mode, &mut last, content_len, block_size)?;
            data.truncate(tail_start);
            data.extend_from_slice(&last);
        }
        let mut out = vec![0u8; data.len()];
        engine.transform(&data, &mut out)?;
        out
    } else {
        let mut out = vec![0u8; data.len()];
        engine.transform(&data, &mut out)?;
        if !is_stream && !out.is_empty() {
            let tail_start = out.len() - block_size;
            let content_len = padding::unpad_len(desc.padding_mode, &out[tail_start..])?;
            out.truncate(tail_start + content_len);
        }
        out
    };

    file.seek(SeekFrom::Start(0))?;
    file.write_all(&output)?;
    file.set_len(output.len() as u64)?;
    Ok(())
}

fn build_params(desc: &CipherDescription, material: &[u8]) -> KeyParams {
    let key_size = desc.key_size as usize;
    let iv_size = desc.iv_size as usize;
    let key = material[..key_size].to_vec();
    let iv = material[key_size..key_size + iv_size].to_vec();
    let mac = material[key_size + iv_size..].to_vec();
    let mut params = KeyParams::new(key).with_iv(iv);
    if !mac.is_empty() {
        params = params.with_ikm(mac);
    }
    params
}

/// FNV-1a over the path's lossy UTF-8 bytes. Not a cryptographic hash: this
/// is strictly a locator tying a sub-key to a path, never used as a security
/// boundary.
fn hash_path(path: &Path) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET;
    for byte in path.to_string_lossy().as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

enum Engine {
    Cbc(Cbc<Shx>),
    Cfb(Cfb<Shx>),
    Ctr(Ctr<Shx>),
    Ofb(Ofb<Shx>),
    ChaCha(ChaCha),
    Salsa(Salsa),
}

impl Engine {
    fn build(desc: &CipherDescription, is_encryption: bool, params: &KeyParams) -> Result<Self> {
        let execution = crate::exec::Execution::linear();
        let mut engine = match (desc.engine_type, desc.cipher_mode) {
            (EngineType::Shx, CipherMode::Cbc) => Engine::Cbc(Cbc::new(Shx::new(desc.round_count), desc.kdf_engine, execution)),
            (EngineType::Shx, CipherMode::Cfb) => Engine::Cfb(Cfb::new(Shx::new(desc.round_count), desc.kdf_engine)),
            (EngineType::Shx, CipherMode::Ctr) => Engine::Ctr(Ctr::new(Shx::new(desc.round_count), desc.kdf_engine, execution)),
            (EngineType::Shx, CipherMode::Ofb) => Engine::Ofb(Ofb::new(Shx::new(desc.round_count), desc.kdf_engine)),
            (EngineType::Shx, CipherMode::None) => {
                return Err(CryptoError::InvalidArgument("the SHX engine requires a block mode"))
            }
            (EngineType::ChaCha, _) => Engine::ChaCha(ChaCha::new(desc.round_count)),
            (EngineType::Salsa, _) => Engine::Salsa(Salsa::new(desc.round_count)),
        };
        engine.init(is_encryption, params)?;
        Ok(engine)
    }

    fn init(&mut self, is_encryption: bool, params: &KeyParams) -> Result<()> {
        match self {
            Engine::Cbc(m) => m.init(is_encryption, params),
            Engine::Cfb(m) => m.init(is_encryption, params),
            Engine::Ctr(m) => m.init(is_encryption, params),
            Engine::Ofb(m) => m.init(is_encryption, params),
            Engine::ChaCha(c) => c.init(params),
            Engine::Salsa(c) => c.init(params),
        }
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8]) -> Result<()> {
        match self {
            Engine::Cbc(m) => m.transform(input, output),
            Engine::Cfb(m) => m.transform(input, output),
            Engine::Ctr(m) => m.transform(input, output),
            Engine::Ofb(m) => m.transform(input, output),
            Engine::ChaCha(c) => c.transform(input, output),
            Engine::Salsa(c) => c.transform(input, output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{DigestKind, PaddingMode};
    use crate::exec::Execution;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn description(cipher_mode: CipherMode) -> CipherDescription {
        CipherDescription {
            engine_type: EngineType::Shx,
            key_size: 32,
            iv_size: 16,
            cipher_mode,
            padding_mode: PaddingMode::Pkcs7,
            block_size: 16,
            round_count: 32,
            kdf_engine: DigestKind::Sha512,
            mac_size: 0,
            mac_engine: DigestKind::Sha256,
        }
    }

    #[test]
    fn encrypt_then_decrypt_round_trips_file_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, b"quarterly figures, confidential").unwrap();
        let paths = vec![path.clone()];

        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let mut factory = VolumeFactory::create(Cursor::new(Vec::new()), description(CipherMode::Ctr), 1, Execution::linear(), &mut rng).unwrap();

        {
            let mut cipher = VolumeCipher::new(&mut factory);
            let outcomes = cipher.encrypt_paths(&paths).unwrap();
            assert!(!outcomes[0].skipped);
        }
        let encrypted = std::fs::read(&path).unwrap();
        assert_ne!(encrypted, b"quarterly figures, confidential");

        {
            let mut cipher = VolumeCipher::new(&mut factory);
            let outcomes = cipher.decrypt_paths(&paths).unwrap();
            assert!(!outcomes[0].skipped);
        }
        let recovered = std::fs::read(&path).unwrap();
        assert_eq!(recovered, b"quarterly figures, confidential");
    }

    #[test]
    fn decrypt_skips_a_path_with_no_matching_subkey() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("untracked.bin");
        std::fs::write(&path, b"never encrypted by this volume").unwrap();

        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let mut factory = VolumeFactory::create(Cursor::new(Vec::new()), description(CipherMode::Ctr), 1, Execution::linear(), &mut rng).unwrap();
        let mut cipher = VolumeCipher::new(&mut factory);
        let outcomes = cipher.decrypt_paths(&[path]).unwrap();
        assert!(outcomes[0].skipped);
        assert!(outcomes[0].error.is_some());
    }

    #[test]
    fn encrypt_refuses_more_paths_than_subkeys() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        let mut rng = ChaCha20Rng::seed_from_u64(13);
        let mut factory = VolumeFactory::create(Cursor::new(Vec::new()), description(CipherMode::Ctr), 1, Execution::linear(), &mut rng).unwrap();
        let mut cipher = VolumeCipher::new(&mut factory);
        assert!(cipher.encrypt_paths(&[a, b]).is_err());
    }
}
