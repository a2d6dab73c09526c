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

//! The process-lifetime module: owns the [`Scheduler`](crate::scheduler::Scheduler),
//! arbitrates the publish-once quit decision, and translates `SIGTERM`/`SIGINT` into
//! that same quit path on a dedicated background thread.
//!
//! Grounded in the original `Core` class's `Quit`/`WaitForQuit`/signal-handling triad,
//! reworked around `std::sync::{Mutex, Condvar}` the way the teacher's
//! `resilient_reactor_thread` module parks a worker and wakes it on state change.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::cli::CliParameters;
use crate::error::StartupError;
use crate::log::Log;
use crate::module_center::{Module, ModuleCenter};
use crate::scheduler::Scheduler;

/// Exit code reserved for a clean, explicitly requested shutdown.
pub const EXIT_OK: i32 = 0;
/// Exit code used when `-h` was handled and the process should stop before doing work.
pub const EXIT_HELP: i32 = 100;
/// Exit code published when `SIGTERM` triggers the quit path.
pub const EXIT_SIGTERM: i32 = 101;
/// Exit code published when `SIGINT` triggers the quit path.
pub const EXIT_SIGINT: i32 = 102;
/// Exit code for startup failures that prevented the scheduler or signal thread from
/// coming up at all.
pub const EXIT_STARTUP_FAILURE: i32 = 200;

/// A callback invoked, in registration order, the moment a quit is published —
/// synchronously, before any thread parked in [`CoreController::wait_for_quit`] wakes.
pub type QuitObserver = Arc<dyn Fn(i32) + Send + Sync>;

struct QuitState {
    published: bool,
    exit_code: i32,
}

/// Per-process configuration passed to every [`Module::new`]; `argv` is a leaked slice
/// so that `Copy` config can carry a reference through the registry (see
/// `ModuleRegistry<C: Copy>` in [`crate::module_center`]).
#[derive(Debug, Clone, Copy)]
pub struct CoreConfig<'a> {
    pub args: &'a [String],
}

pub struct CoreController {
    scheduler: Arc<Scheduler>,
    quit: Mutex<QuitState>,
    quit_cv: Condvar,
    observers: Mutex<Vec<QuitObserver>>,
    signal_thread: Mutex<Option<JoinHandle<()>>>,
    signal_shutdown: Arc<AtomicBool>,
    log: Log,
}

impl Module for CoreController {
    type Config = CoreConfig<'static>;

    fn new(config: Self::Config) -> Self {
        let cli = CliParameters::new(config.args);
        let log = Log::new("CoreController", cli);
        // Absent, `-j0`, or an unparsable/negative suffix all fall through to `0`,
        // which `Scheduler::new` resolves via `available_parallelism()`.
        let worker_count = cli.get_num_param("-j").filter(|n| *n > 0).unwrap_or(0) as usize;

        let scheduler = Arc::new(Scheduler::new(worker_count));
        let controller = Self {
            scheduler,
            quit: Mutex::new(QuitState { published: false, exit_code: EXIT_OK }),
            quit_cv: Condvar::new(),
            observers: Mutex::new(Vec::new()),
            signal_thread: Mutex::new(None),
            signal_shutdown: Arc::new(AtomicBool::new(false)),
            log,
        };
        controller.log.message("constructed");
        controller
    }

    fn initialize(&self, _center: &ModuleCenter) {
        self.log.message("initialized");
    }
}

impl CoreController {
    #[must_use]
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Installs `SIGTERM`/`SIGINT` handling on a dedicated background thread that
    /// publishes [`EXIT_SIGTERM`]/[`EXIT_SIGINT`] through the same quit path as an
    /// explicit [`Self::quit`] call.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::SignalHandlerInstall`] if registering the signals with
    /// the OS fails, and [`StartupError::WorkerSpawn`] if the background thread itself
    /// fails to spawn.
    pub fn install_signal_handling(self: &Arc<Self>) -> Result<(), StartupError> {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([SIGTERM, SIGINT])
            .map_err(|source| StartupError::SignalHandlerInstall { source })?;

        let controller = Arc::clone(self);
        let shutdown = Arc::clone(&self.signal_shutdown);
        let handle = std::thread::Builder::new()
            .name("signalbus-signals".to_string())
            .spawn(move || {
                for signal in signals.forever() {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }
                    let code = match signal {
                        SIGTERM => EXIT_SIGTERM,
                        SIGINT => EXIT_SIGINT,
                        _ => continue,
                    };
                    controller.quit(code);
                    break;
                }
            })
            .map_err(|source| StartupError::WorkerSpawn { index: 0, source })?;

        *self.signal_thread.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Publishes `exit_code` as the process's quit decision and wakes every thread
    /// parked in [`Self::wait_for_quit`]. Only the first call wins; subsequent calls
    /// are observed but do not change the published code — matching the original
    /// `Core::Quit`'s "first writer wins" contract.
    pub fn quit(&self, exit_code: i32) {
        let mut state = self.quit.lock().unwrap();
        if state.published {
            self.log.message_with("quit already published, ignoring request for code ", exit_code, "");
            return;
        }
        state.published = true;
        state.exit_code = exit_code;
        self.log.message_with("quit published with code ", exit_code, "");

        for observer in self.observers.lock().unwrap().iter() {
            observer(exit_code);
        }

        self.scheduler.shutdown();
        self.quit_cv.notify_all();
    }

    /// Blocks the calling thread until [`Self::quit`] has published, then returns the
    /// published exit code.
    #[must_use]
    pub fn wait_for_quit(&self) -> i32 {
        let mut state = self.quit.lock().unwrap();
        while !state.published {
            state = self.quit_cv.wait(state).unwrap();
        }
        state.exit_code
    }

    /// True once a quit decision has been published, without blocking.
    #[must_use]
    pub fn quit_requested(&self) -> bool {
        self.quit.lock().unwrap().published
    }

    /// Registers a callback run synchronously, in registration order, the instant a
    /// quit is published — before any waiter wakes.
    pub fn register_quit_observer(&self, observer: QuitObserver) {
        self.observers.lock().unwrap().push(observer);
    }

    /// Stops the signal-handling thread and joins it. Safe to call even if
    /// [`Self::install_signal_handling`] was never called.
    pub fn stop_signal_handling(&self) {
        self.signal_shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.signal_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    /// Resets the published quit state. Test-only: production code publishes a quit
    /// decision exactly once per process lifetime, but a single test binary exercises
    /// many `CoreController` scenarios and needs a clean slate between them.
    #[cfg(test)]
    pub fn reset_quit_state_for_test(&self) {
        let mut state = self.quit.lock().unwrap();
        state.published = false;
        state.exit_code = EXIT_OK;
    }
}

impl Drop for CoreController {
    fn drop(&mut self) {
        self.stop_signal_handling();
    }
}

impl std::fmt::Debug for CoreController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreController")
            .field("quit_requested", &self.quit_requested())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Vec<String> {
        vec!["prog".to_string()]
    }

    /// S8 — an explicit `-jN` is honored verbatim; absence or `-j0` autodetects from
    /// hardware instead of falling back to a hardcoded default.
    #[test]
    fn worker_count_honors_explicit_j_flag_and_autodetects_otherwise() {
        let explicit = vec!["prog".to_string(), "-j3".to_string()];
        let controller = CoreController::new(CoreConfig { args: leak(&explicit) });
        assert_eq!(controller.scheduler().worker_count(), 3);

        let expected_auto =
            std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1);

        let absent = args();
        let controller = CoreController::new(CoreConfig { args: leak(&absent) });
        assert_eq!(controller.scheduler().worker_count(), expected_auto);

        let zero = vec!["prog".to_string(), "-j0".to_string()];
        let controller = CoreController::new(CoreConfig { args: leak(&zero) });
        assert_eq!(controller.scheduler().worker_count(), expected_auto);
    }

    #[test]
    fn first_quit_call_wins() {
        let owned = args();
        let controller = CoreController::new(CoreConfig { args: leak(&owned) });
        controller.quit(EXIT_SIGTERM);
        controller.quit(EXIT_SIGINT);
        assert_eq!(controller.wait_for_quit(), EXIT_SIGTERM);
    }

    #[test]
    fn observers_fire_before_waiters_observe_completion() {
        let owned = args();
        let controller = CoreController::new(CoreConfig { args: leak(&owned) });
        let seen = Arc::new(AtomicI32::new(-1));
        let seen_clone = Arc::clone(&seen);
        controller.register_quit_observer(Arc::new(move |code| {
            seen_clone.store(code, Ordering::SeqCst);
        }));

        controller.quit(42);
        assert_eq!(seen.load(Ordering::SeqCst), 42);
        assert_eq!(controller.wait_for_quit(), 42);
    }

    #[test]
    fn multiple_observers_fire_in_registration_order() {
        let owned = args();
        let controller = CoreController::new(CoreConfig { args: leak(&owned) });
        let order = Arc::new(Mutex::new(Vec::new()));
        for id in 0..3 {
            let order = Arc::clone(&order);
            controller.register_quit_observer(Arc::new(move |_code| {
                order.lock().unwrap().push(id);
            }));
        }
        controller.quit(EXIT_OK);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn not_requested_until_quit_called() {
        let owned = args();
        let controller = CoreController::new(CoreConfig { args: leak(&owned) });
        assert!(!controller.quit_requested());
        controller.quit(EXIT_OK);
        assert!(controller.quit_requested());
    }

    #[test]
    fn waiting_thread_wakes_on_quit() {
        let owned = args();
        let controller = Arc::new(CoreController::new(CoreConfig { args: leak(&owned) }));
        let waiter = {
            let controller = Arc::clone(&controller);
            std::thread::spawn(move || controller.wait_for_quit())
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        controller.quit(EXIT_SIGINT);
        assert_eq!(waiter.join().unwrap(), EXIT_SIGINT);
    }

    // Leaks the backing `Vec<String>` so `&'static [String]` can sit inside the `Copy`
    // `CoreConfig` used across these short-lived tests; acceptable only in test code.
    fn leak(owned: &[String]) -> &'static [String] {
        Box::leak(owned.to_vec().into_boxed_slice())
    }
}
