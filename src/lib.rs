// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `quillcrypt`: an extended-key block cipher (SHX, Serpent-family) driven
//! by an HMAC-extract-and-expand key schedule, companion ChaCha/Salsa
//! stream ciphers, four block-cipher modes (CBC, CFB, CTR, OFB) with a
//! parallel counter-mode decomposition, and a keyed-package subsystem for
//! policy-governed, authenticated, encrypted-at-rest key material.
//!
//! Crate layout mirrors the two subsystems described in the crate-level
//! design document (`DESIGN.md`):
//!
//! - The symmetric cipher core: [`engine`], [`kdf`], [`stream`], [`modes`],
//!   [`params`], [`description`], [`padding`].
//! - The keyed-package subsystem: [`authority`], [`package`], [`volume`],
//!   [`simple`], [`header`].
//! - Shared plumbing: [`serialize`], [`error`], [`exec`], [`policy`].

pub mod authority;
pub mod description;
pub mod engine;
pub mod error;
pub mod exec;
pub mod header;
pub mod kdf;
pub mod modes;
pub mod package;
pub mod padding;
pub mod params;
pub mod policy;
pub mod serialize;
pub mod simple;
pub mod stream;
pub mod volume;

pub use authority::KeyAuthority;
pub use description::{CipherDescription, CipherMode, DigestKind, EngineType, PaddingMode};
pub use engine::BlockCipher;
pub use error::{CryptoError, Result};
pub use exec::Execution;
pub use header::MessageHeader;
pub use modes::Mode;
pub use package::{AccessScope, PackageFactory, PackageKey, PackageSpec};
pub use params::KeyParams;
pub use simple::{CipherKey, SessionKey};
pub use stream::StreamCipher;
pub use volume::{VolumeCipher, VolumeFactory, VolumeKey};

/// Full-crate integration checks that combine public types across module
/// boundaries. Per-module unit tests (notably `package::factory`'s, which
/// already cover the NextKey-exhaustion, PostOverwrite-erasure, and
/// DomainRestrict-denial cases with the private stream access only a module
/// test can use) are the primary coverage for those flows.
#[cfg(test)]
mod end_to_end_tests {
    use crate::description::{DigestKind, PaddingMode};
    use crate::engine::shx::Shx;
    use crate::exec::Execution;
    use crate::header::MessageHeader;
    use crate::modes::cbc::Cbc;
    use crate::modes::ctr::Ctr;
    use crate::modes::Mode;
    use crate::padding::{pad, unpad_len};
    use crate::params::KeyParams;

    #[test]
    fn shx64_cbc_x923_single_block_round_trips() {
        let key = KeyParams::new(vec![0u8; 192]).with_iv(vec![0u8; 16]);
        let plaintext = b"ABCDEFGHIJKLMNO\x01".to_vec();

        let mut padded = plaintext.clone();
        pad(PaddingMode::X923, &mut padded, plaintext.len(), 16).unwrap();
        assert_eq!(padded.len(), 16);

        let mut enc = Cbc::new(Shx::new(64), DigestKind::Sha512, Execution::linear());
        enc.init(true, &key).unwrap();
        let mut ct = vec![0u8; 16];
        enc.transform(&padded, &mut ct).unwrap();

        let mut dec = Cbc::new(Shx::new(64), DigestKind::Sha512, Execution::linear());
        dec.init(false, &key).unwrap();
        let mut pt = vec![0u8; 16];
        dec.transform(&ct, &mut pt).unwrap();

        let content_len = unpad_len(PaddingMode::X923, &pt).unwrap();
        assert_eq!(&pt[..content_len], &plaintext[..]);
    }

    #[test]
    fn ctr_parallel_matches_sequential_over_4096_bytes() {
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
    }

    #[test]
    fn message_header_extension_round_trips_through_xor_mask() {
        let extension_key = [0xA5u8; 16];
        let header = MessageHeader::create([0x03u8; 16], ".dat", &extension_key, None);
        assert_eq!(MessageHeader::get_extension(&header, &extension_key).unwrap(), ".dat");
    }
}
