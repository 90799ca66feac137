// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The keyed-package subsystem: `PackageKey`'s on-disk layout and the
//! `PackageFactory` that creates, authenticates, and doles sub-keys out of
//! it.

pub mod factory;
pub mod key;

pub use factory::{AccessScope, PackageFactory, PackageSpec};
pub use key::PackageKey;
