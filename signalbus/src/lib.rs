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

//! Real-time packet dispatcher: registers sources and sinks, pools fixed-size
//! timestamped packets, and fans submissions out to a worker-thread pool plus a
//! dedicated UI thread in earliest-timestamp-first order.
//!
//! The three components that make up the core are [`module_center`] (module
//! lifecycle host), [`core_controller`] (the process-lifetime module owning the
//! scheduler and the quit path), and [`scheduler`] (the dispatcher itself). [`cli`]
//! and [`log`] are the ambient argv-scanning and structured-logging layers every
//! other module depends on. See `SPEC_FULL.md` for the full design.

pub mod cli;
pub mod core_controller;
pub mod error;
pub mod log;
pub mod module_center;
pub mod scheduler;

use module_center::ModuleRegistry;

use crate::core_controller::{CoreConfig, CoreController};
use crate::module_center::Module;

/// Appends every core module type to `registry`, in the order their two-phase
/// init may depend on. Called once, at program entry, before the first
/// [`module_center::ModuleCenter::new`] — see Design Notes §9 on why this crate
/// uses an explicit bootstrap function instead of the original's static-initializer
/// side effect.
pub fn register_modules(registry: &mut ModuleRegistry<CoreConfig<'static>>) {
    registry.register::<CoreController>();
}
