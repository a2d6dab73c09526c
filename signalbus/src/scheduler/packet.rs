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

//! Packet handle types. A packet is a fixed-size slice of a source's pre-allocated
//! buffer; no allocation or copy happens on the acquire/submit/release path.

use std::slice;
use std::sync::Arc;

use super::source::Source;

/// Identifies a registered source within a [`crate::scheduler::Scheduler`]. Caller-
/// chosen at [`crate::scheduler::Scheduler::register_source`] time, not assigned by
/// the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub usize);

/// Monotonic per-packet timestamp, assigned by the producer at submission time. Total
/// order; used as the dispatch queues' sort key.
pub type Timestamp = u64;

/// A packet slot freshly handed out by [`crate::scheduler::Scheduler::acquire_packet`],
/// exclusively owned by the caller until it is handed back via
/// [`crate::scheduler::Scheduler::submit_packet`].
///
/// Unlike [`Packet`], this handle allows mutation: the producer is expected to fill the
/// buffer before submitting it.
#[derive(Debug)]
pub struct AcquiredPacket {
    pub(crate) source: SourceId,
    pub(crate) index: usize,
    pub(crate) ptr: *mut u8,
    pub(crate) len: usize,
}

// SAFETY: an `AcquiredPacket` is uniquely owned — the free-list bookkeeping in
// `Source` guarantees no other handle aliases `ptr` until this one is submitted.
unsafe impl Send for AcquiredPacket {}

impl AcquiredPacket {
    #[must_use]
    pub fn source_id(&self) -> SourceId {
        self.source
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr`/`len` describe a packet slot owned exclusively by this handle
        // for its whole lifetime; the backing buffer outlives every packet index
        // derived from it (see `Source`).
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }

    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: see `as_slice`; exclusive access additionally follows from `&mut
        // self`.
        unsafe { slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

/// A packet delivered to a sink callback. Read-only: once submitted, a packet may be
/// fanned out to multiple subscribers concurrently, so no handle may mutate it.
///
/// A `Packet` carries the handle to the [`Source`] it came from, so the sink that
/// receives one can call [`Self::release`] directly — no need to route back through
/// the scheduler. A `Packet` that is never released leaks its pool slot permanently;
/// there is no `Drop`-based safety net, matching the explicit acquire/submit/release
/// discipline this type mirrors.
#[derive(Clone)]
pub struct Packet {
    pub(crate) source: SourceId,
    pub(crate) index: usize,
    pub(crate) ptr: *const u8,
    pub(crate) len: usize,
    pub(crate) source_handle: Arc<Source>,
    pub(crate) spin_max: u32,
}

// SAFETY: `Packet` is read-only and the underlying bytes are not written again until
// every outstanding reference has been released (tracked by `Source`'s refcount).
unsafe impl Send for Packet {}
unsafe impl Sync for Packet {}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("source", &self.source)
            .field("index", &self.index)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl Packet {
    #[must_use]
    pub fn source_id(&self) -> SourceId {
        self.source
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: see `AcquiredPacket::as_slice`; this packet's refcount keeps the slot
        // from being recycled into the free list while any `Packet` handle exists.
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }

    /// Drops this handle's reference to its packet slot. Once every subscriber that
    /// received this packet has released it, the slot returns to its source's free
    /// list.
    pub fn release(self) {
        self.source_handle.release(self.index, self.spin_max);
    }
}
