// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Minimal single-use key envelopes: `SessionKey` and `CipherKey`.
//! Both are lighter cousins of `PackageKey` — no
//! sub-key pool, no policy, just enough to carry one cipher's parameters
//! across a file or a wire message.

pub mod cipherkey;
pub mod session;

pub use cipherkey::CipherKey;
pub use session::SessionKey;
