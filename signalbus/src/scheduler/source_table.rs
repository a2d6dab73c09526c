/*
 *   Copyright (c) 2026 signalbus contributors
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! A reader-preferring counting semaphore guarding the source table.
//!
//! Sources are registered once, at startup; every packet operation afterward looks one
//! up. A `std::sync::RwLock` would work, but every lookup would pay for a lock the
//! writer path almost never contends — this hand-rolled semaphore keeps the read path
//! to two atomic operations with no kernel round-trip in the uncontended case (see
//! Design Notes in `SPEC_FULL.md`).

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use super::packet::SourceId;
use super::source::Source;

/// The table's backing storage: kept sorted by [`SourceId`] so lookup is a binary
/// search, per §3/§4.C.2 ("ordered sequence of `(source_id, source)` pairs, sorted
/// by `source_id` for binary-lookup").
pub(crate) type SourceEntries = Vec<(SourceId, Arc<Source>)>;

pub(crate) struct SourceTable {
    sources: UnsafeCell<SourceEntries>,
    readers: AtomicI64,
    writer_waiting: AtomicBool,
    spin_max: u32,
}

// SAFETY: all access to `sources` goes through `with_read`/`with_write`, which
// establish the reader/writer exclusion invariants below.
unsafe impl Send for SourceTable {}
unsafe impl Sync for SourceTable {}

impl SourceTable {
    pub(crate) fn new(spin_max: u32) -> Self {
        Self {
            sources: UnsafeCell::new(Vec::new()),
            readers: AtomicI64::new(0),
            writer_waiting: AtomicBool::new(false),
            spin_max,
        }
    }

    fn read_lock(&self) {
        loop {
            while self.writer_waiting.load(Ordering::Acquire) {
                std::thread::yield_now();
            }
            self.readers.fetch_add(1, Ordering::AcqRel);
            if !self.writer_waiting.load(Ordering::Acquire) {
                return;
            }
            // A writer announced itself between our check and our increment; back off
            // and let it proceed rather than starve it.
            self.readers.fetch_sub(1, Ordering::AcqRel);
        }
    }

    fn read_unlock(&self) {
        self.readers.fetch_sub(1, Ordering::AcqRel);
    }

    fn write_lock(&self) {
        while self
            .writer_waiting
            .compare_exchange_weak(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            std::thread::yield_now();
        }
        let mut cycles_left = self.spin_max;
        while self.readers.load(Ordering::Acquire) != 0 {
            cycles_left -= 1;
            if cycles_left == 0 {
                std::thread::yield_now();
                cycles_left = self.spin_max;
            }
        }
    }

    fn write_unlock(&self) {
        self.writer_waiting.store(false, Ordering::Release);
    }

    /// Runs `f` with shared access to the source table. Many readers may run
    /// concurrently.
    pub(crate) fn with_read<R>(&self, f: impl FnOnce(&SourceEntries) -> R) -> R {
        self.read_lock();
        // SAFETY: `read_lock` guarantees no writer holds `write_lock` concurrently.
        let result = f(unsafe { &*self.sources.get() });
        self.read_unlock();
        result
    }

    /// Runs `f` with exclusive access to the source table, blocking new readers until
    /// every in-flight reader has released and then running `f` alone.
    pub(crate) fn with_write<R>(&self, f: impl FnOnce(&mut SourceEntries) -> R) -> R {
        self.write_lock();
        // SAFETY: `write_lock` guarantees no reader or other writer holds access.
        let result = f(unsafe { &mut *self.sources.get() });
        self.write_unlock();
        result
    }

    /// Binary-searches the (read-locked) table for `id`.
    pub(crate) fn find(&self, id: SourceId) -> Option<Arc<Source>> {
        self.with_read(|sources| {
            sources
                .binary_search_by_key(&id, |(sid, _)| *sid)
                .ok()
                .map(|pos| Arc::clone(&sources[pos].1))
        })
    }

    /// Inserts a newly-constructed source at its sorted position.
    ///
    /// # Panics
    ///
    /// Panics if `id` is already registered — a programmer error (double
    /// registration), per §4.C.2.
    pub(crate) fn insert(&self, id: SourceId, source: Arc<Source>) {
        self.with_write(|sources| {
            match sources.binary_search_by_key(&id, |(sid, _)| *sid) {
                Ok(_) => panic!("source {} is already registered", id.0),
                Err(pos) => sources.insert(pos, (id, source)),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn concurrent_readers_see_writer_registered_entries() {
        let table = Arc::new(SourceTable::new(16));
        table.insert(SourceId(0), Arc::new(Source::new(SourceId(0), 8, 2)));

        let seen = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let table = Arc::clone(&table);
            let seen = Arc::clone(&seen);
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    table.with_read(|sources| {
                        if sources.len() == 1 {
                            seen.fetch_add(1, Ordering::Relaxed);
                        }
                    });
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(seen.load(Ordering::Relaxed), 1600);
    }

    #[test]
    fn writer_gets_exclusive_access() {
        let table = SourceTable::new(16);
        for i in 0..5 {
            table.insert(SourceId(i), Arc::new(Source::new(SourceId(i), 4, 1)));
        }
        table.with_read(|sources| assert_eq!(sources.len(), 5));
    }

    #[test]
    fn lookup_finds_registered_source_by_id() {
        let table = SourceTable::new(16);
        table.insert(SourceId(7), Arc::new(Source::new(SourceId(7), 4, 1)));
        assert!(table.find(SourceId(7)).is_some());
        assert!(table.find(SourceId(8)).is_none());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_source_id_panics() {
        let table = SourceTable::new(16);
        table.insert(SourceId(1), Arc::new(Source::new(SourceId(1), 4, 1)));
        table.insert(SourceId(1), Arc::new(Source::new(SourceId(1), 4, 1)));
    }
}
