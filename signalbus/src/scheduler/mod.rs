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

//! Routes timestamped packets from registered sources to subscribed sinks.
//!
//! A source is a pre-allocated pool of fixed-size packet slots; a sink subscribes to
//! zero or more sources and receives every packet submitted to them, in roughly
//! timestamp order, on either a worker thread or the UI thread depending on how it
//! subscribed. See `SPEC_FULL.md` §4.C for the full contract.

mod dispatch;
mod packet;
mod source;
mod source_table;
mod spinlock;
mod task;

pub use packet::{AcquiredPacket, Packet, SourceId, Timestamp};
pub use source::SinkCallback;

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use source::Source;
use source_table::SourceTable;
use spinlock::{SPIN_MAX_DEFAULT, SPIN_MAX_SINGLE_WORKER};
use task::Task;

pub(crate) struct SchedulerCore {
    sources: SourceTable,
    worker_queue: Mutex<BinaryHeap<Task>>,
    worker_cv: Condvar,
    ui_queue: Mutex<BinaryHeap<Task>>,
    shutdown: AtomicBool,
    spin_max: u32,
}

impl SchedulerCore {
    fn get_source(&self, id: SourceId) -> Arc<Source> {
        self.sources
            .find(id)
            .unwrap_or_else(|| panic!("source {} was never registered", id.0))
    }
}

/// Owns the worker thread pool and every registered source's packet pool.
pub struct Scheduler {
    core: Arc<SchedulerCore>,
    workers: Mutex<Option<Vec<JoinHandle<()>>>>,
    worker_count: usize,
}

impl Scheduler {
    /// Spins up `worker_count` dispatch threads. `worker_count` of zero means
    /// "autodetect": it resolves to `std::thread::available_parallelism()`, falling
    /// back to one thread if the platform can't report it — matching the original
    /// `Scheduler::Scheduler`'s `if (workers == 0) workers = hardware_concurrency();`.
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        let worker_count = if worker_count == 0 {
            std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1)
        } else {
            worker_count
        };
        let spin_max = if worker_count == 1 { SPIN_MAX_SINGLE_WORKER } else { SPIN_MAX_DEFAULT };

        let core = Arc::new(SchedulerCore {
            sources: SourceTable::new(spin_max),
            worker_queue: Mutex::new(BinaryHeap::new()),
            worker_cv: Condvar::new(),
            ui_queue: Mutex::new(BinaryHeap::new()),
            shutdown: AtomicBool::new(false),
            spin_max,
        });

        let workers = (0..worker_count)
            .map(|index| {
                let core = Arc::clone(&core);
                std::thread::Builder::new()
                    .name(format!("signalbus-worker-{index}"))
                    .spawn(move || dispatch::worker_loop(core))
                    .expect("failed to spawn scheduler worker thread")
            })
            .collect();

        Self { core, workers: Mutex::new(Some(workers)), worker_count }
    }

    /// The number of worker threads actually spawned — the requested count, or the
    /// autodetected one if `worker_count` was `0`.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Registers `source_id` with a pool of `capacity` packets, each `packet_size`
    /// bytes.
    ///
    /// # Panics
    ///
    /// Panics if `source_id` is already registered.
    pub fn register_source(&self, source_id: SourceId, packet_size: usize, capacity: usize) {
        self.core.sources.insert(source_id, Arc::new(Source::new(source_id, packet_size, capacity)));
    }

    /// The packet size a source was registered with.
    #[must_use]
    pub fn get_packet_size(&self, source_id: SourceId) -> usize {
        self.core.get_source(source_id).packet_size()
    }

    /// Subscribes `callback` to `source_id`. When `on_ui` is true, packets for this
    /// subscription are only ever dispatched by [`Self::dispatch_ui_step`], never by a
    /// worker thread.
    ///
    /// # Panics
    ///
    /// Panics if `source_id` was never registered, or `callback` is already subscribed
    /// to this source.
    pub fn subscribe(&self, source_id: SourceId, callback: SinkCallback, on_ui: bool) {
        self.core.get_source(source_id).subscribe(callback, on_ui, self.core.spin_max);
    }

    /// Removes `callback`'s subscription to `source_id`. Returns whether a
    /// subscription was actually removed.
    ///
    /// # Panics
    ///
    /// Panics if `source_id` was never registered.
    pub fn unsubscribe(&self, source_id: SourceId, callback: &SinkCallback) -> bool {
        self.core.get_source(source_id).unsubscribe(callback, self.core.spin_max)
    }

    /// Acquires a free packet slot from `source_id`'s pool, or `None` if the pool is
    /// fully checked out.
    ///
    /// # Panics
    ///
    /// Panics if `source_id` was never registered.
    pub fn acquire_packet(&self, source_id: SourceId) -> Option<AcquiredPacket> {
        self.core.get_source(source_id).acquire(self.core.spin_max)
    }

    /// Hands a filled packet to the scheduler for delivery at `timestamp`. Every
    /// current subscriber of the packet's source receives its own read-only [`Packet`]
    /// handle, dispatched on a worker thread or the UI thread per how it subscribed.
    ///
    /// A source with no current subscribers gets its slot back immediately; nothing is
    /// enqueued.
    pub fn submit_packet(&self, packet: AcquiredPacket, timestamp: Timestamp) {
        let source = self.core.get_source(packet.source_id());
        let subs = source.begin_delivery(packet.index, self.core.spin_max);
        if subs.is_empty() {
            return;
        }

        let mut worker_tasks = Vec::new();
        let mut ui_tasks = Vec::new();
        for sub in subs {
            let task = Task {
                source: packet.source,
                packet: Source::as_packet(&source, packet.index, self.core.spin_max),
                timestamp,
                callback: sub.callback,
            };
            if sub.ui {
                ui_tasks.push(task);
            } else {
                worker_tasks.push(task);
            }
        }

        if !ui_tasks.is_empty() {
            let mut guard = self.core.ui_queue.lock().unwrap();
            guard.extend(ui_tasks);
        }
        if !worker_tasks.is_empty() {
            let mut guard = self.core.worker_queue.lock().unwrap();
            guard.extend(worker_tasks);
            drop(guard);
            self.core.worker_cv.notify_all();
        }
    }

    /// Dispatches at most one pending UI-bound packet without blocking. Intended to be
    /// called once per frame from the UI thread's render loop. Returns whether a
    /// packet was dispatched.
    pub fn dispatch_ui_step(&self) -> bool {
        dispatch::dispatch_ui_step(&self.core)
    }

    /// Signals every worker thread to finish its queued work and stop. Idempotent.
    /// Does not block; call [`Self::join_workers`] (or drop this `Scheduler`) to wait
    /// for workers to actually exit.
    pub fn shutdown(&self) {
        self.core.shutdown.store(true, Ordering::Release);
        self.core.worker_cv.notify_all();
    }

    /// Blocks until every worker thread has exited. Safe to call more than once.
    pub fn join_workers(&self) {
        if let Some(handles) = self.workers.lock().unwrap().take() {
            for handle in handles {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
        self.join_workers();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn single_sink_receives_submitted_packet() {
        let scheduler = Scheduler::new(2);
        let source_id = SourceId(1);
        scheduler.register_source(source_id, 8, 4);

        let received = Arc::new(Mutex::new(None));
        let received_clone = Arc::clone(&received);
        let cb: SinkCallback = Arc::new(move |_src, packet, ts| {
            *received_clone.lock().unwrap() = Some((packet.as_slice().to_vec(), ts));
            packet.release();
        });
        scheduler.subscribe(source_id, cb, false);

        let mut packet = scheduler.acquire_packet(source_id).unwrap();
        packet.as_mut_slice().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        scheduler.submit_packet(packet, 100);

        wait_until(|| received.lock().unwrap().is_some());
        let (bytes, ts) = received.lock().unwrap().take().unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(ts, 100);
    }

    #[test]
    fn multiple_sinks_each_get_their_own_packet_and_release_independently() {
        let scheduler = Scheduler::new(2);
        let source_id = SourceId(1);
        scheduler.register_source(source_id, 4, 2);

        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            let cb: SinkCallback = Arc::new(move |_src, packet, _ts| {
                hits.fetch_add(1, Ordering::SeqCst);
                packet.release();
            });
            scheduler.subscribe(source_id, cb, false);
        }

        let packet = scheduler.acquire_packet(source_id).unwrap();
        scheduler.submit_packet(packet, 1);

        wait_until(|| hits.load(Ordering::SeqCst) == 3);

        // the slot must be free again now that all three sinks released it.
        wait_until(|| scheduler.acquire_packet(source_id).is_some());
    }

    #[test]
    fn unsubscribed_sink_receives_nothing() {
        let scheduler = Scheduler::new(1);
        let source_id = SourceId(1);
        scheduler.register_source(source_id, 4, 2);

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        let cb: SinkCallback = Arc::new(move |_src, packet, _ts| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            packet.release();
        });
        scheduler.subscribe(source_id, Arc::clone(&cb), false);
        assert!(scheduler.unsubscribe(source_id, &cb));

        let packet = scheduler.acquire_packet(source_id).unwrap();
        scheduler.submit_packet(packet, 1);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn packet_with_no_subscribers_frees_its_slot_immediately() {
        let scheduler = Scheduler::new(1);
        let source_id = SourceId(1);
        scheduler.register_source(source_id, 4, 1);
        let packet = scheduler.acquire_packet(source_id).unwrap();
        scheduler.submit_packet(packet, 1);
        assert!(scheduler.acquire_packet(source_id).is_some());
    }

    #[test]
    fn ui_subscription_only_dispatches_via_single_step() {
        let scheduler = Scheduler::new(1);
        let source_id = SourceId(1);
        scheduler.register_source(source_id, 4, 1);

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        let cb: SinkCallback = Arc::new(move |_src, packet, _ts| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            packet.release();
        });
        scheduler.subscribe(source_id, cb, true);

        let packet = scheduler.acquire_packet(source_id).unwrap();
        scheduler.submit_packet(packet, 1);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(hits.load(Ordering::SeqCst), 0, "worker threads must not touch UI-bound tasks");

        assert!(scheduler.dispatch_ui_step());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!scheduler.dispatch_ui_step());
    }

    #[test]
    fn shutdown_mid_queue_stops_dispatch_without_draining() {
        let scheduler = Scheduler::new(1);
        let source_id = SourceId(1);
        scheduler.register_source(source_id, 4, 3);

        let started = Arc::new(AtomicBool::new(false));
        let release_first = Arc::new(AtomicBool::new(false));
        let hits = Arc::new(AtomicUsize::new(0));

        let started_clone = Arc::clone(&started);
        let release_first_clone = Arc::clone(&release_first);
        let hits_clone = Arc::clone(&hits);
        let cb: SinkCallback = Arc::new(move |_src, packet, _ts| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            started_clone.store(true, Ordering::SeqCst);
            while !release_first_clone.load(Ordering::SeqCst) {
                std::thread::yield_now();
            }
            packet.release();
        });
        scheduler.subscribe(source_id, cb, false);

        let first = scheduler.acquire_packet(source_id).unwrap();
        scheduler.submit_packet(first, 1);
        wait_until(|| started.load(Ordering::SeqCst));

        // These two queue up behind the first task, which the single worker is still
        // blocked inside.
        let second = scheduler.acquire_packet(source_id).unwrap();
        scheduler.submit_packet(second, 2);
        let third = scheduler.acquire_packet(source_id).unwrap();
        scheduler.submit_packet(third, 3);

        scheduler.shutdown();
        release_first.store(true, Ordering::SeqCst);
        scheduler.join_workers();

        assert_eq!(
            hits.load(Ordering::SeqCst),
            1,
            "worker must exit on shutdown rather than draining the two queued tasks"
        );
    }

    #[test]
    #[should_panic(expected = "never registered")]
    fn operating_on_unregistered_source_panics() {
        let scheduler = Scheduler::new(1);
        let _ = scheduler.get_packet_size(SourceId(99));
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_source_id_registration_panics() {
        let scheduler = Scheduler::new(1);
        scheduler.register_source(SourceId(1), 4, 1);
        scheduler.register_source(SourceId(1), 4, 1);
    }

    #[test]
    fn source_ids_need_not_be_registered_in_order() {
        let scheduler = Scheduler::new(1);
        scheduler.register_source(SourceId(3), 4, 1);
        scheduler.register_source(SourceId(1), 4, 1);
        scheduler.register_source(SourceId(2), 4, 1);
        assert_eq!(scheduler.get_packet_size(SourceId(1)), 4);
        assert_eq!(scheduler.get_packet_size(SourceId(2)), 4);
        assert_eq!(scheduler.get_packet_size(SourceId(3)), 4);
    }

    /// S8 (autodetect branch) — a requested worker count of `0` resolves to
    /// `available_parallelism()`, not a hardcoded default, and never to zero workers.
    #[test]
    fn zero_worker_count_autodetects_from_hardware() {
        let expected =
            std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1);
        let scheduler = Scheduler::new(0);
        assert_eq!(scheduler.worker_count(), expected);
        assert!(scheduler.worker_count() >= 1);
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !condition() {
            assert!(std::time::Instant::now() < deadline, "condition never became true");
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}
