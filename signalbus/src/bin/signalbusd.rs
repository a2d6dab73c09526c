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

//! Process entry point: parses the core-owned CLI flags, wires up the module
//! center, installs signal handling, pumps the UI dispatch loop, and exits with
//! whatever code [`CoreController::wait_for_quit`] publishes.

use std::process::ExitCode;
use std::time::Duration;

use signalbus::cli::CliParameters;
use signalbus::core_controller::{CoreConfig, CoreController, EXIT_HELP, EXIT_STARTUP_FAILURE};
use signalbus::log::Log;
use signalbus::module_center::{ModuleCenter, ModuleRegistry};

fn print_help() {
    Log::print("signalbusd — real-time packet dispatcher");
    Log::print("");
    Log::print("USAGE:");
    Log::print("    signalbusd [-jN] [-v] [-v<Label>]");
    Log::print("");
    Log::print("FLAGS:");
    Log::print(" -h             Print this help and exit.");
    Log::print(" -jN            Request N worker threads (0 = autodetect; default 0).");
    Log::print_help_for_verbose();
}

fn main() -> ExitCode {
    signalbus::log::install_global_subscriber();

    // Leaked once, for the life of the process: `CoreConfig` must be `Copy` (every
    // module's `new` gets the same value), which rules out an owning `Vec<String>`.
    let args: &'static [String] = Vec::leak(std::env::args().collect());
    let cli = CliParameters::new(args);
    if cli.has_param("-h") {
        print_help();
        return ExitCode::from(u8::try_from(EXIT_HELP).unwrap_or(u8::MAX));
    }

    let mut registry = ModuleRegistry::new();
    signalbus::register_modules(&mut registry);
    let center = ModuleCenter::new(&registry, CoreConfig { args });

    let controller = center.get_arc::<CoreController>();
    if let Err(err) = controller.install_signal_handling() {
        tracing::error!(target: "signalbus", "failed to install signal handling: {err}");
        return ExitCode::from(u8::try_from(EXIT_STARTUP_FAILURE).unwrap_or(u8::MAX));
    }

    let scheduler = controller.scheduler().clone();
    while !controller.quit_requested() {
        scheduler.dispatch_ui_step();
        std::thread::sleep(Duration::from_millis(1));
    }

    let exit_code = controller.wait_for_quit();
    ExitCode::from(u8::try_from(exit_code.clamp(0, i32::from(u8::MAX))).unwrap_or(u8::MAX))
}
