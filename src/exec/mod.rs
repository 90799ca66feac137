// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The execution policy threaded through mode and volume constructors.
//!
//! The reference this crate is modeled on exposes a process-wide
//! `ForceLinear` toggle; that global-mutable-state approach is a design
//! smell, so this crate offers an
//! explicit execution policy instead. `Execution` is that policy: callers
//! pass it in rather than mutating global state, and `ScopedLinear` recovers
//! the old "install for the duration of this call, then restore" ergonomics
//! for call sites (e.g. a passphrase-derived PRNG) that need determinism
//! without reaching for a process global.

use std::cell::Cell;

pub mod pool;

thread_local! {
    static LINEAR_OVERRIDE: Cell<bool> = const { Cell::new(false) };
}

/// Whether a mode/volume operation may fan work out across the thread pool.
///
/// Default is `Execution::default_for_host()`, which is parallel whenever
/// more than one logical processor is available.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Execution {
    parallel: bool,
}

impl Execution {
    /// The host's natural default: parallel iff more than one CPU is visible
    /// and no `ScopedLinear` guard is currently active on this thread.
    pub fn default_for_host() -> Self {
        if LINEAR_OVERRIDE.with(|c| c.get()) {
            return Self { parallel: false };
        }
        Self {
            parallel: available_parallelism() > 1,
        }
    }

    /// An execution policy that never uses the thread pool.
    pub fn linear() -> Self {
        Self { parallel: false }
    }

    /// An execution policy that always uses the thread pool (subject to the
    /// size/threshold heuristics each mode applies on top).
    pub fn parallel() -> Self {
        Self { parallel: true }
    }

    pub fn is_parallel(self) -> bool {
        self.parallel
    }
}

impl Default for Execution {
    fn default() -> Self {
        Self::default_for_host()
    }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Number of workers the parallel mode/volume paths should use: the logical
/// processor count, rounded down to an even number, floored
/// at 2 so a caller that explicitly asks for parallel work always gets more
/// than one worker.
pub(crate) fn worker_count() -> usize {
    let n = available_parallelism();
    let even = n - (n % 2);
    even.max(2)
}

/// RAII guard that forces `Execution::default_for_host()` to return a linear
/// policy on the current thread for as long as the guard is alive, then
/// restores whatever was in effect before. Stands in for a finalizer-style
/// "install, use, dispose" pattern without touching global mutable state.
pub struct ScopedLinear {
    previous: bool,
}

impl ScopedLinear {
    pub fn acquire() -> Self {
        let previous = LINEAR_OVERRIDE.with(|c| c.replace(true));
        Self { previous }
    }
}

impl Drop for ScopedLinear {
    fn drop(&mut self) {
        LINEAR_OVERRIDE.with(|c| c.set(self.previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_linear_restores_previous_value_on_drop() {
        assert!(Execution::default_for_host().is_parallel() || available_parallelism() == 1);
        {
            let _guard = ScopedLinear::acquire();
            assert!(!Execution::default_for_host().is_parallel());
            {
                let _inner = ScopedLinear::acquire();
                assert!(!Execution::default_for_host().is_parallel());
            }
            assert!(!Execution::default_for_host().is_parallel());
        }
    }

    #[test]
    fn worker_count_is_even_and_at_least_two() {
        let n = worker_count();
        assert!(n >= 2);
        assert_eq!(n % 2, 0);
    }
}
