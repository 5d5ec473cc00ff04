// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ## [16.2.1.4 Abstract Module Records](https://tc39.es/ecma262/#sec-abstract-module-records)
//!
//! Operations every module variant supports. The variant set is closed, so
//! the per-variant behaviour is selected by matching on
//! [`ModuleKind`](crate::ecmascript::scripts_and_modules::module::ModuleKind).

use ahash::AHashSet;

use super::{dynamic_module_records, source_text_module_records};
use crate::{
    ecmascript::{
        execution::ModuleErrorKind,
        scripts_and_modules::module::{ModuleIdentifier, ModuleKey, ModuleKind},
        types::Identifier,
    },
    heap::Heap,
};

/// Lifecycle of a module record. A module moves through these in order
/// exactly once, and may divert to errored at any step. Errored is terminal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    #[default]
    Unlinked,
    Instantiating,
    Instantiated,
    Evaluating,
    Evaluated,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ResolvedBindingName {
    Binding(Identifier),
    /// The export is the namespace object of the resolved module.
    Namespace,
}

/// ### [ResolvedBinding Record](https://tc39.es/ecma262/#resolvedbinding-record)
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedBinding {
    /// \[\[Module]]
    pub(crate) module: ModuleIdentifier,
    /// \[\[BindingName]]
    pub(crate) binding_name: ResolvedBindingName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ResolveExportResult {
    Resolved(ResolvedBinding),
    /// Star exports provided the name from two different bindings.
    Ambiguous,
    /// A `(module, exportName)` pair was revisited while following named
    /// re-exports.
    Circular,
    NotFound,
}

impl ResolveExportResult {
    /// Turns a failed resolution of `name` requested from `target` into the
    /// matching error.
    pub(crate) fn into_binding(
        self,
        name: &Identifier,
        target: &ModuleKey,
    ) -> Result<ResolvedBinding, ModuleErrorKind> {
        let (name, target) = (name.clone(), target.clone());
        match self {
            ResolveExportResult::Resolved(binding) => Ok(binding),
            ResolveExportResult::Ambiguous => {
                Err(ModuleErrorKind::AmbiguousExport { name, target })
            }
            ResolveExportResult::Circular => Err(ModuleErrorKind::CircularExport { name, target }),
            ResolveExportResult::NotFound => {
                Err(ModuleErrorKind::UnresolvedExport { name, target })
            }
        }
    }
}

/// `(module, exportName)` pairs visited by the current resolution chain.
pub(crate) type ResolveSet = Vec<(ModuleIdentifier, Identifier)>;

/// ### ResolveExport ( exportName \[ , resolveSet \] )
///
/// Resolves an exported name to the module and local binding that actually
/// define it. Source modules follow their named and star re-exports; dynamic
/// modules are always terminal resolution targets and, until they have been
/// evaluated, claim every name they are asked for.
///
/// Each time this operation is called with a specific exportName, resolveSet
/// pair as arguments it returns the same result, as long as no dynamic
/// module it passes through finishes evaluating in between.
pub(crate) fn resolve_export(
    heap: &Heap,
    module: ModuleIdentifier,
    export_name: &Identifier,
    resolve_set: &mut ResolveSet,
) -> ResolveExportResult {
    match &heap.modules[module].kind {
        ModuleKind::SourceText(_) => {
            source_text_module_records::resolve_export(heap, module, export_name, resolve_set)
        }
        ModuleKind::Dynamic(_) => {
            dynamic_module_records::resolve_export(&heap.modules[module], module, export_name)
        }
    }
}

/// ### GetExportedNames ( \[ exportStarSet \] )
///
/// Returns the names a module currently exports. Dynamic modules that have
/// not finished evaluating contribute no names; they are added to `pending`
/// instead, as the full list is not known until they do.
///
/// > NOTE: GetExportedNames does not filter out or throw an exception for
/// > names that have ambiguous star export bindings.
pub(crate) fn get_exported_names(
    heap: &Heap,
    module: ModuleIdentifier,
    export_star_set: &mut Vec<ModuleIdentifier>,
    pending: &mut AHashSet<ModuleIdentifier>,
) -> Vec<Identifier> {
    match &heap.modules[module].kind {
        ModuleKind::SourceText(_) => source_text_module_records::get_exported_names(
            heap,
            module,
            export_star_set,
            pending,
        ),
        ModuleKind::Dynamic(_) => {
            dynamic_module_records::get_exported_names(&heap.modules[module], module, pending)
        }
    }
}
