// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dynamic modules are modules whose export names are not known until the
//! host has evaluated them, e.g. CommonJS modules or JSON documents loaded
//! through a host specific loader.
//!
//! Before evaluation a dynamic module resolves every name it is asked for.
//! Each such name gets an uninitialized placeholder binding in the module's
//! environment, and evaluating the module must initialize all of them. After
//! evaluation only the bindings the module actually created resolve.

use ahash::AHashSet;

use super::abstract_module_records::{ResolveExportResult, ResolvedBinding, ResolvedBindingName};
use crate::ecmascript::{
    execution::{ModuleErrorKind, environments::ModuleEnvironmentRecord},
    scripts_and_modules::module::{ModuleIdentifier, ModuleKind, ModuleRecord, ModuleStatus},
    types::{Identifier, Value},
};

#[derive(Debug, Default)]
pub(crate) struct DynamicModuleRecord {
    /// Names that importers resolved against this module before it was
    /// evaluated.
    placeholders: AHashSet<Identifier>,
}

impl DynamicModuleRecord {
    /// Forgets the placeholders created by a link that failed.
    pub(crate) fn clear_placeholders(&mut self) {
        self.placeholders.clear();
    }

    /// Checks that evaluation initialized every placeholder. Names are
    /// checked in code unit order so the reported name does not depend on
    /// hashing.
    pub(crate) fn validate_placeholders(
        &self,
        env: Option<&ModuleEnvironmentRecord>,
    ) -> Result<(), ModuleErrorKind> {
        let mut names: Vec<&Identifier> = self.placeholders.iter().collect();
        names.sort_by(|a, b| a.code_unit_cmp(b));
        for name in names {
            let initialized = env
                .and_then(|env| env.get_local(name.as_str()))
                .is_some_and(|binding| binding.is_initialized());
            if !initialized {
                return Err(ModuleErrorKind::UninitializedExport(name.clone()));
            }
        }
        Ok(())
    }
}

/// ResolveExport ( exportName \[ , resolveSet \] ) of a dynamic module.
///
/// A dynamic module has no re-exports, so resolution never needs the
/// resolve set. Resolving a name does not create its placeholder: that only
/// happens through [`create_placeholder_binding`] once the whole resolution
/// chain has succeeded.
pub(super) fn resolve_export(
    record: &ModuleRecord,
    module: ModuleIdentifier,
    export_name: &Identifier,
) -> ResolveExportResult {
    let resolved = ResolveExportResult::Resolved(ResolvedBinding {
        module,
        binding_name: ResolvedBindingName::Binding(export_name.clone()),
    });
    match record.status() {
        ModuleStatus::Evaluated => {
            let exists = record
                .environment
                .as_ref()
                .is_some_and(|env| env.has_binding(export_name.as_str()));
            if exists {
                resolved
            } else {
                ResolveExportResult::NotFound
            }
        }
        ModuleStatus::Errored => ResolveExportResult::NotFound,
        _ => resolved,
    }
}

/// GetExportedNames ( \[ exportStarSet \] ) of a dynamic module.
///
/// The names are unknown until the module has been evaluated. Until then the
/// module is added to `pending` and contributes nothing.
pub(super) fn get_exported_names(
    record: &ModuleRecord,
    module: ModuleIdentifier,
    pending: &mut AHashSet<ModuleIdentifier>,
) -> Vec<Identifier> {
    if record.status() != ModuleStatus::Evaluated {
        pending.insert(module);
        return Vec::new();
    }
    record
        .environment
        .as_ref()
        .map(|env| env.local_names().cloned().collect())
        .unwrap_or_default()
}

/// Creates the uninitialized placeholder binding for `name` in a dynamic
/// module that has not been evaluated yet. Does nothing for evaluated
/// modules, whose resolvable names already have bindings.
///
/// Returns true if `name` was not a placeholder before.
pub(crate) fn create_placeholder_binding(record: &mut ModuleRecord, name: &Identifier) -> bool {
    if matches!(
        record.status(),
        ModuleStatus::Evaluated | ModuleStatus::Errored
    ) {
        return false;
    }
    let ModuleKind::Dynamic(dynamic) = &mut record.kind else {
        return false;
    };
    record
        .environment
        .get_or_insert_with(ModuleEnvironmentRecord::default)
        .declare_if_absent(name);
    dynamic.placeholders.insert(name.clone())
}

/// Takes back a placeholder created by a link that failed. The binding is
/// kept if the module has initialized it in the meantime.
pub(crate) fn remove_placeholder_binding(record: &mut ModuleRecord, name: &Identifier) {
    let ModuleKind::Dynamic(dynamic) = &mut record.kind else {
        return;
    };
    if !dynamic.placeholders.remove(name) {
        return;
    }
    if let Some(env) = record.environment.as_mut() {
        env.remove_uninitialized(name.as_str());
    }
}

/// Initializes or overwrites the export binding `name` of a dynamic module.
pub(crate) fn set_export_binding(record: &mut ModuleRecord, name: Identifier, value: Value) {
    let env = record
        .environment
        .get_or_insert_with(ModuleEnvironmentRecord::default);
    env.declare_if_absent(&name);
    if let Some(binding) = env.get_local_mut(name.as_str()) {
        binding.rebind(value);
    }
}
