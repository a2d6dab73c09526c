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

//! A hand-rolled test-and-set spinlock, held for microsecond-scale bookkeeping only —
//! it must never wrap a call into user sink code. `std::sync::Mutex` would be a
//! correct drop-in replacement; this is a spinlock specifically for the
//! cache-friendly, low-contention access pattern a per-source lock sees (see Design
//! Notes in `SPEC_FULL.md`).

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

/// Cycles to busy-spin before yielding the thread to the scheduler. Lowered to 4 when
/// the scheduler has a single worker, since there is no other thread to make progress
/// while this one spins.
pub const SPIN_MAX_DEFAULT: u32 = 256;
pub const SPIN_MAX_SINGLE_WORKER: u32 = 4;

pub struct SpinLock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is only ever granted through `lock()`, which enforces
// exclusive access via `locked`.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub fn new(data: T) -> Self {
        Self { locked: AtomicBool::new(false), data: UnsafeCell::new(data) }
    }

    /// Spins up to `spin_max` cycles before yielding the thread, then keeps
    /// alternating spin-bursts and yields until the lock is acquired.
    pub fn lock(&self, spin_max: u32) -> SpinLockGuard<'_, T> {
        let mut cycles_left = spin_max;
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            cycles_left -= 1;
            if cycles_left == 0 {
                std::thread::yield_now();
                cycles_left = spin_max;
            }
        }
        SpinLockGuard { lock: self }
    }
}

pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: holding the guard implies `locked` is true and was set by us.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: see `Deref`.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn mutual_exclusion_under_contention() {
        let lock = Arc::new(SpinLock::new(0_i64));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    *lock.lock(SPIN_MAX_DEFAULT) += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.lock(SPIN_MAX_DEFAULT), 8000);
    }
}
