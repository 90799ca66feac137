// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A minimal scoped work splitter for the parallel mode and volume paths.
//!
//! This crate's parallel work is always "partition a fixed range, run an
//! independent closure over each chunk, join" — `std::thread::scope` covers
//! that without pulling in a general-purpose data-parallelism crate.

use crate::error::{CryptoError, Result};

/// Splits `[0, total)` into up to `workers` contiguous chunks and runs `f`
/// over each chunk on its own scoped thread, joining before returning. `f`
/// receives `(start, end)` with `end` exclusive. A chunk count smaller than
/// `workers` is used when `total` does not divide evenly or is itself small;
/// `total == 0` runs nothing.
pub fn parallel_for<F>(total: usize, workers: usize, f: F) -> Result<()>
where
    F: Fn(usize, usize) + Sync,
{
    if total == 0 {
        return Ok(());
    }
    let workers = workers.max(1).min(total);
    let chunk = total.div_ceil(workers);

    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        let mut start = 0;
        while start < total {
            let end = (start + chunk).min(total);
            let f = &f;
            handles.push(scope.spawn(move || f(start, end)));
            start = end;
        }
        let mut poisoned = false;
        for handle in handles {
            if handle.join().is_err() {
                poisoned = true;
            }
        }
        if poisoned {
            Err(CryptoError::PoisonedLock)
        } else {
            Ok(())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn covers_every_index_exactly_once() {
        let seen: Mutex<Vec<usize>> = Mutex::new(Vec::new());
        parallel_for(17, 4, |start, end| {
            let mut seen = seen.lock().unwrap();
            seen.extend(start..end);
        })
        .unwrap();
        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, (0..17).collect::<Vec<_>>());
    }

    #[test]
    fn zero_length_runs_nothing() {
        let calls = AtomicUsize::new(0);
        parallel_for(0, 4, |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fewer_items_than_workers_still_covers_all() {
        let seen: Mutex<Vec<usize>> = Mutex::new(Vec::new());
        parallel_for(3, 8, |start, end| {
            seen.lock().unwrap().extend(start..end);
        })
        .unwrap();
        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }
}
