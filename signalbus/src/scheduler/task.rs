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

//! A single dispatch task: a packet ready for delivery to one subscriber, ordered by
//! timestamp so the earliest-submitted packet across all sources dispatches first.
//!
//! `std::collections::BinaryHeap` is a max-heap; [`Task`]'s `Ord` impl is reversed so
//! that wrapping tasks directly in a `BinaryHeap<Task>` yields min-first ordering,
//! mirroring the original's reversed `operator<` over a `std::priority_queue`.

use std::cmp::Ordering;

use super::packet::{Packet, SourceId, Timestamp};
use super::source::SinkCallback;

pub(crate) struct Task {
    pub(crate) source: SourceId,
    pub(crate) packet: Packet,
    pub(crate) timestamp: Timestamp,
    pub(crate) callback: SinkCallback,
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
    }
}

impl Eq for Task {}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: `BinaryHeap` pops the greatest element, and the earliest timestamp
        // should pop first.
        other.timestamp.cmp(&self.timestamp)
    }
}
