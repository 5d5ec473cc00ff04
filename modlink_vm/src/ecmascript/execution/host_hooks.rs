// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt::Debug;

use super::{DynamicModuleExports, HostError, ModuleExecutionContext};
use crate::ecmascript::scripts_and_modules::module::{ModuleDescriptor, ModuleKey};

/// Outcome of a successful call to [`HostHooks::evaluate_dynamic_module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicModuleCompletion {
    /// The module set all of its exports.
    Completed,
    /// The module continues asynchronously. The host reports completion
    /// through [`ModuleGraph::finish_dynamic_module`], after which the
    /// interrupted evaluation resumes.
    ///
    /// [`ModuleGraph::finish_dynamic_module`]: super::ModuleGraph::finish_dynamic_module
    Pending,
}

/// The operations a module graph needs from its embedder.
pub trait HostHooks: Debug {
    /// ### [16.2.1.10 HostLoadImportedModule ( referrer, moduleRequest, hostDefined, payload )](https://tc39.es/ecma262/#sec-HostLoadImportedModule)
    ///
    /// Maps `specifier`, as written in `referrer`, to the key of the module
    /// it refers to. The entry module has no referrer.
    ///
    /// Must be idempotent: the same referrer and specifier must always yield
    /// the same key.
    fn resolve_module_specifier(
        &self,
        referrer: Option<&ModuleKey>,
        specifier: &str,
    ) -> Result<ModuleKey, HostError>;

    /// Produces the descriptor for a module the graph has not seen before.
    /// Called at most once per key.
    fn load_module_descriptor(&self, key: &ModuleKey) -> Result<ModuleDescriptor, HostError>;

    /// Runs the body of a source module. The body initializes and assigns
    /// its local bindings through `context`, and may read its imports.
    fn execute_source_module(
        &self,
        key: &ModuleKey,
        context: &mut ModuleExecutionContext<'_, '_>,
    ) -> Result<(), HostError>;

    /// Evaluates a dynamic module, setting its exports through `exports`.
    ///
    /// Every export an importer resolved against this module must be set
    /// before the module completes, or evaluation fails.
    fn evaluate_dynamic_module(
        &self,
        key: &ModuleKey,
        exports: &mut DynamicModuleExports<'_, '_>,
    ) -> Result<DynamicModuleCompletion, HostError>;
}
