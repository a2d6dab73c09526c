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

//! A single registered source: its packet pool and the list of callbacks subscribed to
//! it.
//!
//! The packet buffer is one contiguous allocation, sliced by pointer arithmetic into
//! fixed-size packet slots — no per-packet allocation on the hot path. A LIFO free list
//! hands out the most-recently-released slot first, keeping the working set small and
//! cache-warm, exactly as the original pool does.

use std::sync::Arc;

use super::packet::{AcquiredPacket, Packet, SourceId, Timestamp};
use super::spinlock::SpinLock;

pub type SinkCallback = Arc<dyn Fn(SourceId, Packet, Timestamp) + Send + Sync>;

#[derive(Clone)]
pub(crate) struct Subscription {
    pub(crate) callback: SinkCallback,
    pub(crate) ui: bool,
}

struct Bookkeeping {
    free: Vec<usize>,
    in_use: Vec<bool>,
    refcounts: Vec<u32>,
    subscriptions: Vec<Subscription>,
}

pub(crate) struct Source {
    id: SourceId,
    packet_size: usize,
    capacity: usize,
    // Never resized after construction; `base_ptr` is derived once and relied on for
    // the lifetime of the source.
    buffer: Vec<u8>,
    base_ptr: *mut u8,
    state: SpinLock<Bookkeeping>,
}

// SAFETY: `base_ptr` always points inside `buffer`, which is never reallocated (no
// push/resize) after `new`. All cross-thread access to packet slots is mediated either
// by `state`'s spinlock (bookkeeping) or by the acquire/submit/release protocol
// (ownership of byte ranges).
unsafe impl Send for Source {}
unsafe impl Sync for Source {}

impl Source {
    pub(crate) fn new(id: SourceId, packet_size: usize, capacity: usize) -> Self {
        // `packet_size` of zero is explicitly permitted (a signal-only, payload-less
        // packet) — `usize` already rules out negative sizes, so there is nothing left
        // to assert here.
        assert!(capacity > 0, "a source's pool must hold at least one packet");
        let mut buffer = vec![0_u8; packet_size * capacity];
        let base_ptr = buffer.as_mut_ptr();
        Self {
            id,
            packet_size,
            capacity,
            buffer,
            base_ptr,
            state: SpinLock::new(Bookkeeping {
                // Reversed so the first LIFO pop yields index 0, matching the original
                // pool's `[N-1, N-2, … , 0]` initial free list.
                free: (0..capacity).rev().collect(),
                in_use: vec![false; capacity],
                refcounts: vec![0; capacity],
                subscriptions: Vec::new(),
            }),
        }
    }

    pub(crate) fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// Pops a free slot and marks it in-use, or returns `None` if the pool is
    /// exhausted (every slot awaiting delivery or release).
    pub(crate) fn acquire(&self, spin_max: u32) -> Option<AcquiredPacket> {
        let mut state = self.state.lock(spin_max);
        let index = state.free.pop()?;
        state.in_use[index] = true;
        state.refcounts[index] = 0;
        drop(state);
        // SAFETY: `index < capacity`, so the offset stays within `buffer`.
        let ptr = unsafe { self.base_ptr.add(index * self.packet_size) };
        Some(AcquiredPacket { source: self.id, index, ptr, len: self.packet_size })
    }

    /// Snapshots the current subscriber list and arms the slot's refcount for fan-out
    /// delivery. A slot with zero subscribers is returned to the free list immediately
    /// — there is nothing to deliver and nobody will call `release`.
    pub(crate) fn begin_delivery(&self, index: usize, spin_max: u32) -> Vec<Subscription> {
        let mut state = self.state.lock(spin_max);
        let subs = state.subscriptions.clone();
        state.refcounts[index] = subs.len() as u32;
        if subs.is_empty() {
            state.in_use[index] = false;
            state.free.push(index);
        }
        subs
    }

    /// Drops one outstanding reference to `index`; once the last reference is
    /// released, the slot returns to the free list.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not currently in use, or has no outstanding references —
    /// both are programmer errors (a double-release or a release of an unacquired
    /// slot), not runtime conditions.
    pub(crate) fn release(&self, index: usize, spin_max: u32) {
        let mut state = self.state.lock(spin_max);
        assert!(state.in_use[index], "released a packet slot that was not in use");
        assert!(state.refcounts[index] > 0, "released a packet slot with no outstanding references");
        state.refcounts[index] -= 1;
        if state.refcounts[index] == 0 {
            state.in_use[index] = false;
            state.free.push(index);
        }
    }

    /// # Panics
    ///
    /// Panics if `callback` is already subscribed (compared by `Arc` identity) — a
    /// double-subscribe is a programmer error in the collaborator, not a runtime
    /// condition to recover from.
    pub(crate) fn subscribe(&self, callback: SinkCallback, ui: bool, spin_max: u32) {
        let mut state = self.state.lock(spin_max);
        assert!(
            !state.subscriptions.iter().any(|s| Arc::ptr_eq(&s.callback, &callback)),
            "callback already subscribed to this source"
        );
        state.subscriptions.push(Subscription { callback, ui });
    }

    /// Removes `callback` from this source's subscriber list. Returns whether a
    /// subscription was actually removed.
    pub(crate) fn unsubscribe(&self, callback: &SinkCallback, spin_max: u32) -> bool {
        let mut state = self.state.lock(spin_max);
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| !Arc::ptr_eq(&s.callback, callback));
        state.subscriptions.len() != before
    }

    pub(crate) fn as_packet(self_arc: &Arc<Self>, index: usize, spin_max: u32) -> Packet {
        // SAFETY: `index < capacity`; caller holds an outstanding reference (tracked by
        // `refcounts`) so the byte range stays valid until `release` drops it.
        let ptr = unsafe { self_arc.base_ptr.add(index * self_arc.packet_size) };
        Packet {
            source: self_arc.id,
            index,
            ptr,
            len: self_arc.packet_size,
            source_handle: Arc::clone(self_arc),
            spin_max,
        }
    }
}
