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

//! Owns the lifetime of every stateful subsystem ("module") in the process and offers
//! type-keyed lookup between them.
//!
//! Modules are registered once, at program entry, via [`register_modules`] — a plain
//! function call rather than the original's compile-unit static-initializer trick (see
//! Design Notes in `SPEC_FULL.md`). Each registered type gets a two-phase lifecycle:
//! every module is *constructed* first, then every module is *initialized* (in the same
//! order) with a reference to the [`ModuleCenter`] so that initializers may look up
//! sibling modules that are guaranteed to already exist.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// A stateful subsystem with a two-phase lifecycle.
///
/// `new` receives whatever the module needs to bootstrap (commonly, the process
/// `argv`); `initialize` runs only after every module's `new` has returned, so it may
/// call [`ModuleCenter::get`] to reach siblings.
pub trait Module: Any + Send + Sync {
    /// Per-process configuration, shared identically across every module's `new`.
    type Config: Copy;

    fn new(config: Self::Config) -> Self;

    /// Second phase of construction; the default does nothing.
    fn initialize(&self, _center: &ModuleCenter) {}
}

type ConstructFn<C> = fn(C) -> Arc<dyn Any + Send + Sync>;
type InitFn = fn(&(dyn Any + Send + Sync), &ModuleCenter);

/// One registered module type: how to build it, and how to run its second phase.
struct ModuleInitRecord<C> {
    type_id: TypeId,
    construct: ConstructFn<C>,
    init: InitFn,
}

/// Append-only list of registered module types, built once by [`register_modules`]
/// before the first [`ModuleCenter`] is constructed.
///
/// Recommended capacity mirrors the original's compile-time constant (`kMaxModulesNum
/// = 64`); `Vec` here has no fixed ceiling, but callers should treat 64 as a sanity
/// bound on how many module types a single process realistically wires up.
pub struct ModuleRegistry<C> {
    records: Vec<ModuleInitRecord<C>>,
}

impl<C> Default for ModuleRegistry<C> {
    fn default() -> Self {
        Self { records: Vec::new() }
    }
}

impl<C> std::fmt::Debug for ModuleRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry").field("len", &self.records.len()).finish()
    }
}

impl<C: Copy> ModuleRegistry<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers module type `T`. Calling this twice for the same `T` is a programmer
    /// error: the resulting `ModuleCenter` would construct two instances under the
    /// same key and silently keep only the last one.
    pub fn register<T: Module<Config = C>>(&mut self) {
        let type_id = TypeId::of::<T>();
        assert!(
            !self.records.iter().any(|r| r.type_id == type_id),
            "module type registered twice"
        );
        self.records.push(ModuleInitRecord {
            type_id,
            construct: |cfg| Arc::new(T::new(cfg)),
            init: |instance, center| {
                instance
                    .downcast_ref::<T>()
                    .expect("registry/type_id mismatch")
                    .initialize(center);
            },
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Owns one instance of every module type in `registry`, keyed by [`TypeId`].
///
/// Instances are stored behind `Arc` rather than `Box` so that a module whose API
/// needs to hand a `'static`-bound clone of itself to a background thread (see
/// [`crate::core_controller::CoreController::install_signal_handling`]) can get one
/// via [`Self::get_arc`] without `ModuleCenter` itself needing a `'static` lifetime.
pub struct ModuleCenter {
    instances: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for ModuleCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCenter").field("module_count", &self.instances.len()).finish()
    }
}

impl ModuleCenter {
    /// Constructs every module in `registry` (phase one), then initializes every
    /// module in the same order (phase two). Phase two may freely call [`Self::get`]
    /// for any type registered in `registry`, since every instance already exists by
    /// the time any initializer runs.
    #[must_use]
    pub fn new<C: Copy>(registry: &ModuleRegistry<C>, config: C) -> Self {
        let mut instances = HashMap::with_capacity(registry.records.len());
        for record in &registry.records {
            let instance = (record.construct)(config);
            let previous = instances.insert(record.type_id, instance);
            assert!(previous.is_none(), "duplicate module type in registry");
        }

        let center = Self { instances };
        for record in &registry.records {
            let instance = center
                .instances
                .get(&record.type_id)
                .expect("just inserted");
            (record.init)(instance.as_ref(), &center);
        }
        center
    }

    /// Retrieves the single instance of module type `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` was never registered — a programmer error, never a runtime
    /// condition a correctly wired process can hit.
    #[must_use]
    pub fn get<T: Module>(&self) -> &T {
        self.instances
            .get(&TypeId::of::<T>())
            .and_then(|b| b.downcast_ref::<T>())
            .expect("module type not registered with ModuleCenter")
    }

    /// Like [`Self::get`], but returns an owning, clonable, `'static` handle.
    ///
    /// # Panics
    ///
    /// Panics if `T` was never registered.
    #[must_use]
    pub fn get_arc<T: Module>(&self) -> Arc<T> {
        self.instances
            .get(&TypeId::of::<T>())
            .cloned()
            .expect("module type not registered with ModuleCenter")
            .downcast::<T>()
            .unwrap_or_else(|_| panic!("registry/type_id mismatch"))
    }

    /// The type-stable identifier [`Self::get`] looks modules up by.
    #[must_use]
    pub fn id_of<T: Module>() -> TypeId {
        TypeId::of::<T>()
    }
}
