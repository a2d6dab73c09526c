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

//! The narrow band of recoverable failures this crate surfaces through [`Result`]
//! instead of assertion (§7 of `SPEC_FULL.md`): resource acquisition at startup.
//! Everything else in the error taxonomy — double registration, releasing a packet
//! that isn't in use, and so on — stays a violated-precondition assertion, matching
//! the teacher's `assert`-heavy style in the surrounding logic.

/// Failures that can occur while standing up the [`crate::core_controller::CoreController`]
/// or [`crate::scheduler::Scheduler`].
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum StartupError {
    /// A worker thread failed to spawn (OS resource limits).
    #[error("failed to spawn worker thread {index}")]
    #[diagnostic(
        code(signalbus::startup::worker_spawn),
        help("check `ulimit -u` / the system thread limit and retry with a lower -jN")
    )]
    WorkerSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    /// Installing the SIGTERM/SIGINT handlers failed.
    #[error("failed to install signal handlers")]
    #[diagnostic(
        code(signalbus::startup::signal_handler),
        help("another component in this process may already own these signals")
    )]
    SignalHandlerInstall {
        #[source]
        source: std::io::Error,
    },
}
