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

//! The two dispatch loops: a blocking worker loop (run on each of the scheduler's
//! background threads) and a non-blocking single-step function for the UI thread,
//! which must never block on queue contents since it owns the render loop.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::task::Task;
use super::SchedulerCore;

fn run_task(_core: &SchedulerCore, task: Task) {
    // The sink owns the packet from here: it releases the slot itself (immediately,
    // or later, if it holds onto the packet past this call) via `Packet::release`.
    (task.callback)(task.source, task.packet, task.timestamp);
}

/// Body of a scheduler worker thread: pops the earliest-timestamp task, blocking on
/// the condvar when the queue is empty, until shutdown is requested. Shutdown is
/// re-checked before every pop attempt (not only when the queue is empty), so a
/// shutdown published mid-queue stops this loop immediately rather than draining
/// whatever is still pending.
pub(crate) fn worker_loop(core: Arc<SchedulerCore>) {
    'dispatch: loop {
        let mut guard = core.worker_queue.lock().unwrap();
        let task = loop {
            if core.shutdown.load(Ordering::Acquire) {
                break 'dispatch;
            }
            if let Some(task) = guard.pop() {
                break task;
            }
            guard = core.worker_cv.wait(guard).unwrap();
        };
        drop(guard);
        run_task(&core, task);
    }
}

/// Dispatches at most one pending UI-bound task without blocking. Returns whether a
/// task was dispatched, so a render loop can keep draining until the queue is dry for
/// this frame.
pub(crate) fn dispatch_ui_step(core: &SchedulerCore) -> bool {
    let mut guard = core.ui_queue.lock().unwrap();
    let Some(task) = guard.pop() else {
        return false;
    };
    drop(guard);
    run_task(core, task);
    true
}
