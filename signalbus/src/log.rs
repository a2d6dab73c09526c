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

//! Per-label conditional logging, gated by `-v`/`-v<label>` and backed by [`tracing`]
//! instead of `printf`.
//!
//! The verbosity gate is computed once at construction from [`CliParameters`], not
//! re-evaluated per call — the hot dispatch path should never touch `argv` again after
//! startup.

use crate::cli::CliParameters;

/// The literal flag recognized globally; `-v<label>` is this prefix plus a label.
pub const VERBOSE_FLAG: &str = "-v";

/// A label-scoped, conditionally-active logger.
#[derive(Debug, Clone, Copy)]
pub struct Log {
    label: &'static str,
    verbose: bool,
}

impl Log {
    /// `verbose` is true if `-v` is present globally, or `-v<label>` is present for
    /// this specific `label`.
    #[must_use]
    pub fn new(label: &'static str, cli: CliParameters<'_>) -> Self {
        let verbose = cli.has_param(VERBOSE_FLAG)
            || cli.has_param(&format!("{VERBOSE_FLAG}{label}"));
        Self { label, verbose }
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Logs `msg` at `INFO`, tagged with this logger's label, only if verbose.
    pub fn message(&self, msg: &str) {
        if self.verbose {
            tracing::info!(target: "signalbus", label = self.label, "{msg}");
        }
    }

    /// Logs `msg` followed by `value` and `suffix`, only if verbose.
    pub fn message_with(&self, msg: &str, value: impl std::fmt::Display, suffix: &str) {
        if self.verbose {
            tracing::info!(target: "signalbus", label = self.label, "{msg}{value}{suffix}");
        }
    }

    /// Unconditional console output, for help text and fatal-error messages printed
    /// just before an abort.
    pub fn print(msg: &str) {
        println!("{msg}");
    }

    /// Help text for the verbose-logging flags, printed as part of `-h`.
    pub fn print_help_for_verbose() {
        Self::print(" -v             Set verbose status information mode globally.");
        Self::print(" -v<Label>      Set verbose mode only in the component tagged <Label>.");
    }
}

/// Installs the process-wide `tracing` subscriber. Call once, from the entry point,
/// before any [`Log`] is used.
pub fn install_global_subscriber() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
