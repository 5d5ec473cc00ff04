// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ## [16.2.1.7 Source Text Module Records](https://tc39.es/ecma262/#sec-source-text-module-records)

use ahash::AHashSet;

use super::abstract_module_records::{
    ResolveExportResult, ResolveSet, ResolvedBinding, ResolvedBindingName,
    get_exported_names as abstract_get_exported_names, resolve_export as abstract_resolve_export,
};
use crate::{
    ecmascript::{
        execution::{ModuleErrorKind, environments::ModuleEnvironmentRecord},
        scripts_and_modules::module::{ModuleIdentifier, ModuleKind},
        types::Identifier,
    },
    heap::Heap,
};

/// ### \[\[ImportName]]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportName {
    /// `import { name } from "x"` or `import name from "x"` (as `default`).
    Name(Identifier),
    /// `import * as ns from "x"`
    NamespaceObject,
}

/// ### [ImportEntry Record](https://tc39.es/ecma262/#importentry-record)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    /// \[\[ModuleRequest]]
    pub module_request: Identifier,
    /// \[\[ImportName]]
    pub import_name: ImportName,
    /// \[\[LocalName]]
    ///
    /// The name that is used to locally access the imported value from
    /// within the importing module.
    pub local_name: Identifier,
}

/// An export of a binding declared by the module itself, e.g.
/// `export { local as exported }`.
///
/// The local name refers to a binding of the module itself; a name with no
/// matching declaration is declared as a mutable binding. Re-exports of
/// imported bindings are expressed as [`IndirectExportEntry`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalExportEntry {
    /// \[\[ExportName]]
    pub export_name: Identifier,
    /// \[\[LocalName]]
    pub local_name: Identifier,
}

/// ### \[\[ImportName]] of an indirect export
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportImportName {
    /// `export { name as exported } from "x"`
    Name(Identifier),
    /// `export * as exported from "x"`
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndirectExportEntry {
    /// \[\[ExportName]]
    pub export_name: Identifier,
    /// \[\[ModuleRequest]]
    pub module_request: Identifier,
    /// \[\[ImportName]]
    pub import_name: ExportImportName,
}

/// A top level binding declared by the module body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: Identifier,
    /// `let` and `var` style bindings are mutable, `const` style bindings are
    /// not.
    pub mutable: bool,
}

/// The declared shape of a source module: what it requests, imports,
/// declares and exports.
///
/// Descriptors are usually assembled with the builder methods:
///
/// ```
/// use modlink_vm::ecmascript::SourceModuleDescriptor;
///
/// // import { readFile } from "fs";
/// // export const answer = 42;
/// // export * from "./util";
/// let descriptor = SourceModuleDescriptor::new()
///     .import("readFile", "fs", "readFile")
///     .declare("answer", false)
///     .export("answer", "answer")
///     .export_star_from("./util");
/// assert_eq!(descriptor.requested_modules.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceModuleDescriptor {
    /// Module specifiers in source order. Specifiers referred to by entries
    /// but missing from this list are requested after it.
    pub requested_modules: Vec<Identifier>,
    pub import_entries: Vec<ImportEntry>,
    pub local_export_entries: Vec<LocalExportEntry>,
    pub indirect_export_entries: Vec<IndirectExportEntry>,
    /// Module specifiers of `export * from "x"` entries.
    pub star_export_entries: Vec<Identifier>,
    pub declarations: Vec<Declaration>,
}

impl SourceModuleDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// `import "specifier"`
    pub fn request(mut self, specifier: &str) -> Self {
        if !self.requested_modules.iter().any(|s| s == specifier) {
            self.requested_modules.push(specifier.into());
        }
        self
    }

    pub fn declare(mut self, name: &str, mutable: bool) -> Self {
        self.declarations.push(Declaration {
            name: name.into(),
            mutable,
        });
        self
    }

    /// `import { import_name as local_name } from "specifier"`
    pub fn import(self, local_name: &str, specifier: &str, import_name: &str) -> Self {
        let mut this = self.request(specifier);
        this.import_entries.push(ImportEntry {
            module_request: specifier.into(),
            import_name: ImportName::Name(import_name.into()),
            local_name: local_name.into(),
        });
        this
    }

    /// `import * as local_name from "specifier"`
    pub fn import_namespace(self, local_name: &str, specifier: &str) -> Self {
        let mut this = self.request(specifier);
        this.import_entries.push(ImportEntry {
            module_request: specifier.into(),
            import_name: ImportName::NamespaceObject,
            local_name: local_name.into(),
        });
        this
    }

    /// `export { local_name as export_name }`
    pub fn export(mut self, export_name: &str, local_name: &str) -> Self {
        self.local_export_entries.push(LocalExportEntry {
            export_name: export_name.into(),
            local_name: local_name.into(),
        });
        self
    }

    /// `export { import_name as export_name } from "specifier"`
    pub fn export_from(self, export_name: &str, specifier: &str, import_name: &str) -> Self {
        let mut this = self.request(specifier);
        this.indirect_export_entries.push(IndirectExportEntry {
            export_name: export_name.into(),
            module_request: specifier.into(),
            import_name: ExportImportName::Name(import_name.into()),
        });
        this
    }

    /// `export * as export_name from "specifier"`
    pub fn export_namespace_from(self, export_name: &str, specifier: &str) -> Self {
        let mut this = self.request(specifier);
        this.indirect_export_entries.push(IndirectExportEntry {
            export_name: export_name.into(),
            module_request: specifier.into(),
            import_name: ExportImportName::All,
        });
        this
    }

    /// `export * from "specifier"`
    pub fn export_star_from(self, specifier: &str) -> Self {
        let mut this = self.request(specifier);
        this.star_export_entries.push(specifier.into());
        this
    }
}

#[derive(Debug)]
pub(crate) struct SourceTextModuleRecord {
    /// \[\[RequestedModules]], deduplicated and in declaration order.
    requested_modules: Box<[Identifier]>,
    /// \[\[ImportEntries]]
    import_entries: Box<[ImportEntry]>,
    /// \[\[LocalExportEntries]]
    local_export_entries: Box<[LocalExportEntry]>,
    /// \[\[IndirectExportEntries]]
    indirect_export_entries: Box<[IndirectExportEntry]>,
    /// \[\[StarExportEntries]]
    star_export_entries: Box<[Identifier]>,
    declarations: Box<[Declaration]>,
}

impl SourceTextModuleRecord {
    pub(crate) fn new(descriptor: SourceModuleDescriptor) -> Self {
        let SourceModuleDescriptor {
            requested_modules,
            import_entries,
            local_export_entries,
            indirect_export_entries,
            star_export_entries,
            declarations,
        } = descriptor;
        let mut requests: Vec<Identifier> = Vec::with_capacity(requested_modules.len());
        let referenced = import_entries
            .iter()
            .map(|entry| &entry.module_request)
            .chain(indirect_export_entries.iter().map(|entry| &entry.module_request))
            .chain(star_export_entries.iter());
        for specifier in requested_modules.iter().chain(referenced) {
            if !requests.contains(specifier) {
                requests.push(specifier.clone());
            }
        }
        Self {
            requested_modules: requests.into_boxed_slice(),
            import_entries: import_entries.into_boxed_slice(),
            local_export_entries: local_export_entries.into_boxed_slice(),
            indirect_export_entries: indirect_export_entries.into_boxed_slice(),
            star_export_entries: star_export_entries.into_boxed_slice(),
            declarations: declarations.into_boxed_slice(),
        }
    }

    pub(crate) fn requested_modules(&self) -> &[Identifier] {
        &self.requested_modules
    }

    pub(crate) fn import_entries(&self) -> &[ImportEntry] {
        &self.import_entries
    }

    pub(crate) fn indirect_export_entries(&self) -> &[IndirectExportEntry] {
        &self.indirect_export_entries
    }

    /// ### [16.2.1.7.3.4 InitializeEnvironment ( )](https://tc39.es/ecma262/#sec-source-text-module-record-initialize-environment)
    ///
    /// The first half of environment initialization: creates the module's
    /// environment and declares every local binding as uninitialized. Import
    /// bindings are added once every module in the link has an environment.
    pub(crate) fn create_environment(&self) -> Result<ModuleEnvironmentRecord, ModuleErrorKind> {
        let mut env = ModuleEnvironmentRecord::default();
        for declaration in self.declarations.iter() {
            env.declare(declaration.name.clone(), declaration.mutable)?;
        }
        // Exported names without an explicit declaration are mutable.
        for entry in self.local_export_entries.iter() {
            if !env.has_binding(entry.local_name.as_str()) {
                env.declare(entry.local_name.clone(), true)?;
            }
        }
        Ok(env)
    }

    /// Checks that the body initialized every local export, returning the
    /// first one that it did not.
    pub(crate) fn validate_exports(
        &self,
        env: Option<&ModuleEnvironmentRecord>,
    ) -> Result<(), ModuleErrorKind> {
        for entry in self.local_export_entries.iter() {
            let initialized = env
                .and_then(|env| env.get_local(entry.local_name.as_str()))
                .is_some_and(|binding| binding.is_initialized());
            if !initialized {
                return Err(ModuleErrorKind::UninitializedExport(
                    entry.export_name.clone(),
                ));
            }
        }
        Ok(())
    }
}

fn source_text(heap: &Heap, module: ModuleIdentifier) -> &SourceTextModuleRecord {
    match &heap.modules[module].kind {
        ModuleKind::SourceText(record) => record,
        ModuleKind::Dynamic(_) => unreachable!("expected a source text module"),
    }
}

/// ### [16.2.1.7.2.2 ResolveExport ( exportName \[ , resolveSet \] )](https://tc39.es/ecma262/#sec-resolveexport)
pub(super) fn resolve_export(
    heap: &Heap,
    module: ModuleIdentifier,
    export_name: &Identifier,
    resolve_set: &mut ResolveSet,
) -> ResolveExportResult {
    // 2. For each Record { [[Module]], [[ExportName]] } r of resolveSet, do
    //   a. If module and r.[[Module]] are the same Module Record and
    //      exportName is r.[[ExportName]], then
    if resolve_set
        .iter()
        .any(|(m, name)| *m == module && name == export_name)
    {
        // i. Assert: This is a circular import request.
        // ii. Return null.
        return ResolveExportResult::Circular;
    }
    // 3. Append the Record { [[Module]]: module, [[ExportName]]: exportName }
    //    to resolveSet.
    resolve_set.push((module, export_name.clone()));
    let module_record = &heap.modules[module];
    let record = source_text(heap, module);
    // 4. For each ExportEntry Record e of module.[[LocalExportEntries]], do
    for e in record.local_export_entries.iter() {
        // a. If exportName is e.[[ExportName]], then
        if e.export_name == *export_name {
            // i. Assert: module provides the direct binding for this export.
            // ii. Return ResolvedBinding Record { [[Module]]: module,
            //     [[BindingName]]: e.[[LocalName]] }.
            return ResolveExportResult::Resolved(ResolvedBinding {
                module,
                binding_name: ResolvedBindingName::Binding(e.local_name.clone()),
            });
        }
    }
    // 5. For each ExportEntry Record e of module.[[IndirectExportEntries]], do
    for e in record.indirect_export_entries.iter() {
        // a. If exportName is e.[[ExportName]], then
        if e.export_name == *export_name {
            // i. Let importedModule be GetImportedModule(module,
            //    e.[[ModuleRequest]]).
            let Some(imported_module) = module_record.loaded_module(&e.module_request) else {
                // The module failed to load.
                return ResolveExportResult::NotFound;
            };
            return match &e.import_name {
                // ii. If e.[[ImportName]] is all, then
                ExportImportName::All => {
                    // 1. Assert: module does not provide the direct binding
                    //    for this export.
                    // 2. Return ResolvedBinding Record { [[Module]]:
                    //    importedModule, [[BindingName]]: namespace }.
                    ResolveExportResult::Resolved(ResolvedBinding {
                        module: imported_module,
                        binding_name: ResolvedBindingName::Namespace,
                    })
                }
                // iii. Else,
                // 1. Assert: module imports a specific binding for this
                //    export.
                // 2. Return importedModule.ResolveExport(e.[[ImportName]],
                //    resolveSet).
                ExportImportName::Name(import_name) => {
                    abstract_resolve_export(heap, imported_module, import_name, resolve_set)
                }
            };
        }
    }
    // 6. If exportName is "default", then
    if export_name.is_default() {
        // a. Assert: A default export was not explicitly defined by this
        //    module.
        // b. Return null.
        // c. NOTE: A default export cannot be provided by an export * from
        //    "mod" declaration.
        return ResolveExportResult::NotFound;
    }
    // 7. Let starResolution be null.
    let mut star_resolution: Option<ResolvedBinding> = None;
    // 8. For each ExportEntry Record e of module.[[StarExportEntries]], do
    for request in record.star_export_entries.iter() {
        // a. Let importedModule be GetImportedModule(module,
        //    e.[[ModuleRequest]]).
        let Some(imported_module) = module_record.loaded_module(request) else {
            continue;
        };
        // b. Let resolution be importedModule.ResolveExport(exportName,
        //    resolveSet).
        match abstract_resolve_export(heap, imported_module, export_name, resolve_set) {
            // c. If resolution is ambiguous, return ambiguous.
            ResolveExportResult::Ambiguous => return ResolveExportResult::Ambiguous,
            // A circular star branch contributes nothing; the name may
            // still be provided by a sibling branch.
            ResolveExportResult::NotFound | ResolveExportResult::Circular => {}
            // d. If resolution is not null, then
            ResolveExportResult::Resolved(resolution) => match &star_resolution {
                // i. If starResolution is null, set starResolution to
                //    resolution.
                None => star_resolution = Some(resolution),
                // ii. Else,
                // 1. Assert: There is more than one * import that includes
                //    the requested name.
                // 2. If resolution.[[Module]] and starResolution.[[Module]]
                //    are not the same Module Record, return ambiguous.
                // 3. If resolution.[[BindingName]] is not
                //    starResolution.[[BindingName]], return ambiguous.
                Some(existing) if *existing != resolution => {
                    return ResolveExportResult::Ambiguous;
                }
                Some(_) => {}
            },
        }
    }
    // 9. Return starResolution.
    star_resolution.map_or(ResolveExportResult::NotFound, ResolveExportResult::Resolved)
}

/// ### [16.2.1.7.2.1 GetExportedNames ( \[ exportStarSet \] )](https://tc39.es/ecma262/#sec-getexportednames)
pub(super) fn get_exported_names(
    heap: &Heap,
    module: ModuleIdentifier,
    export_star_set: &mut Vec<ModuleIdentifier>,
    pending: &mut AHashSet<ModuleIdentifier>,
) -> Vec<Identifier> {
    // 2. If exportStarSet contains module, then
    if export_star_set.contains(&module) {
        // a. Assert: We've reached the starting point of an export * circularity.
        // b. Return a new empty List.
        return Vec::new();
    }
    // 3. Append module to exportStarSet.
    export_star_set.push(module);
    let module_record = &heap.modules[module];
    let record = source_text(heap, module);
    // 4. Let exportedNames be a new empty List.
    // 5. For each ExportEntry Record e of module.[[LocalExportEntries]], do
    //   a. Assert: module provides the direct binding for this export.
    //   b. Append e.[[ExportName]] to exportedNames.
    // 6. For each ExportEntry Record e of module.[[IndirectExportEntries]], do
    //   a. Assert: module imports a specific binding for this export.
    //   b. Append e.[[ExportName]] to exportedNames.
    let mut exported_names: Vec<Identifier> = record
        .local_export_entries
        .iter()
        .map(|e| e.export_name.clone())
        .chain(record.indirect_export_entries.iter().map(|e| e.export_name.clone()))
        .collect();
    // 7. For each ExportEntry Record e of module.[[StarExportEntries]], do
    for request in record.star_export_entries.iter() {
        // a. Let requestedModule be GetImportedModule(module,
        //    e.[[ModuleRequest]]).
        let Some(requested_module) = module_record.loaded_module(request) else {
            continue;
        };
        // b. Let starNames be requestedModule.GetExportedNames(exportStarSet).
        let star_names =
            abstract_get_exported_names(heap, requested_module, export_star_set, pending);
        // c. For each element n of starNames, do
        for n in star_names {
            // i. If n is not "default", then
            //   1. If exportedNames does not contain n, then
            if !n.is_default() && !exported_names.contains(&n) {
                // a. Append n to exportedNames.
                exported_names.push(n);
            }
        }
    }
    // 8. Return exportedNames.
    exported_names
}
