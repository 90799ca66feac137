// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The crate's exhaustive error taxonomy.
//!
//! Cryptographic primitives only ever fail at initialization or parameter
//! boundaries: the transform hot path (block/stream
//! encryption, mode XOR loops) is infallible once a cipher has been
//! initialized. Package- and volume-level operations surface richer context
//! (an offending sub-key index or field) through the `*_at` variants.

use displaydoc::Display;

/// Every failure this crate can produce, named by kind rather than by type
/// hierarchy.
#[derive(Debug, Display)]
pub enum CryptoError {
    /// key length {got} is invalid for this primitive (expected {expected})
    InvalidKeySize { expected: &'static str, got: usize },
    /// IV length {got} is invalid for this mode (expected {expected})
    InvalidIv { expected: &'static str, got: usize },
    /// padding is malformed or does not match the expected scheme
    InvalidPadding,
    /// the primitive was used before `init` was called
    NotInitialized,
    /// an argument was null, empty, or otherwise out of range: {0}
    InvalidArgument(&'static str),
    /// the package's structure violates an invariant: {0}
    InvalidPackage(&'static str),
    /// the package or volume file failed an integrity or framing check
    CorruptPackage,
    /// the backing stream is smaller than the structure being read requires
    StreamTooSmall,
    /// authentication did not grant sufficient access for this operation
    AccessDenied,
    /// every sub-key in the package has already been expired
    AlreadyExpired,
    /// sub-key {0} is locked and cannot be extracted
    SubkeyLocked(usize),
    /// sub-key {0} has been erased and cannot be extracted
    SubkeyErased(usize),
    /// the package has no remaining unused sub-keys
    PackageFull,
    /// the current access scope is insufficient for this operation
    InsufficientPermissions,
    /// the requested primitive or tag is not supported by this build
    UnsupportedPrimitive(&'static str),
    /// I/O error while reading or writing a backing stream: {0}
    Io(std::io::Error),
    /// a worker thread in the parallel execution pool panicked
    PoisonedLock,
}

impl std::error::Error for CryptoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CryptoError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CryptoError {
    fn from(e: std::io::Error) -> Self {
        CryptoError::Io(e)
    }
}

pub type Result<T> = core::result::Result<T, CryptoError>;
