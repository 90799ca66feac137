// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `VolumeFactory`: owns the `VolumeKey` metadata stream for a directory
//! volume, independent of the content files it indexes.

use std::io::{Read, Seek, SeekFrom, Write};

use rand::{CryptoRng, RngCore};

use crate::description::CipherDescription;
use crate::error::{CryptoError, Result};
use crate::exec::Execution;
use crate::kdf;
use crate::serialize::{write_u32, Codec};
use crate::volume::key::{VolumeKey, STATE_UNUSED};

const KEYING_MATERIAL_INFO: &[u8] = b"quillcrypt-volume-keying-material";

pub struct VolumeFactory<S> {
    stream: S,
    volume: VolumeKey,
    execution: Execution,
}

impl<S> VolumeFactory<S> {
    pub fn volume(&self) -> &VolumeKey {
        &self.volume
    }

    pub fn execution(&self) -> Execution {
        self.execution
    }
}

impl<S: Read + Write + Seek> VolumeFactory<S> {
    /// Allocates a fresh, all-`Unused` sub-key pool and writes the full
    /// volume header plus keying material.
    pub fn create<R: RngCore + CryptoRng>(
        mut stream: S,
        description: CipherDescription,
        subkey_count: u32,
        execution: Execution,
        rng: &mut R,
    ) -> Result<Self> {
        description.validate()?;
        let count = subkey_count as usize;
        if count == 0 {
            return Err(CryptoError::InvalidArgument("subkey_count must be nonzero"));
        }
        let subkey_size = description.subkey_size();
        if subkey_size == 0 {
            return Err(CryptoError::InvalidArgument("subkey_size must be nonzero"));
        }

        let mut ikm = [0u8; 64];
        let mut salt = [0u8; 128];
        rng.fill_bytes(&mut ikm);
        rng.fill_bytes(&mut salt);
        let keying_material = kdf::expand(description.kdf_engine, &ikm, &salt, KEYING_MATERIAL_INFO, count * subkey_size)?;

        let volume = VolumeKey {
            description,
            file_id: vec![0u32; count],
            state: vec![STATE_UNUSED; count],
            keying_material,
        };
        volume.validate()?;

        write_header(&mut stream, &volume)?;
        stream.write_all(&volume.keying_material)?;

        Ok(Self {
            stream,
            volume,
            execution,
        })
    }

    pub fn open(mut stream: S, execution: Execution) -> Result<Self> {
        stream.seek(SeekFrom::Start(0))?;
        let volume = VolumeKey::decode(&mut stream)?;
        Ok(Self {
            stream,
            volume,
            execution,
        })
    }

    pub fn volume_mut(&mut self) -> &mut VolumeKey {
        &mut self.volume
    }

    /// Rewrites description, `file_id[]`, and `state[]` at the stream
    /// origin; the keying material region is left untouched on disk.
    pub fn persist(&mut self) -> Result<()> {
        write_header(&mut self.stream, &self.volume)
    }
}

fn write_header<S: Write + Seek>(stream: &mut S, volume: &VolumeKey) -> Result<()> {
    stream.seek(SeekFrom::Start(0))?;
    volume.description.encode(stream)?;
    write_u32(stream, volume.subkey_count() as u32)?;
    for &id in &volume.file_id {
        write_u32(stream, id)?;
    }
    stream.write_all(&volume.state)?;
    Ok(())
}
