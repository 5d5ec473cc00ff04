// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::{
    marker::PhantomData,
    ops::{Index, IndexMut},
};

pub mod module_semantics;

pub use module_semantics::{
    abstract_module_records::ModuleStatus,
    source_text_module_records::{
        Declaration, ExportImportName, ImportEntry, ImportName, IndirectExportEntry,
        LocalExportEntry, SourceModuleDescriptor,
    },
};

use module_semantics::{
    dynamic_module_records::DynamicModuleRecord,
    source_text_module_records::SourceTextModuleRecord,
};

use crate::ecmascript::{
    builtins::module::Namespace,
    execution::{ModuleError, environments::ModuleEnvironmentRecord},
    types::Identifier,
};

/// The host's resolved identity of a module, e.g. a normalized path or URL.
pub type ModuleKey = Identifier;

/// The static shape of a module, as supplied by the host's loader.
#[derive(Debug, Clone)]
pub enum ModuleDescriptor {
    /// A module whose imports and exports are declared up front.
    Source(SourceModuleDescriptor),
    /// A module whose exports are only known once the host has evaluated it.
    /// Dynamic modules have no dependencies of their own.
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleIdentifier(u32, PhantomData<ModuleRecord>);

impl ModuleIdentifier {
    /// Creates a module identifier from a usize.
    ///
    /// ## Panics
    /// If the given index is greater than `u32::MAX`.
    pub(crate) const fn from_index(value: usize) -> Self {
        assert!(value <= u32::MAX as usize);
        Self(value as u32, PhantomData)
    }

    pub(crate) fn last(modules: &[ModuleRecord]) -> Self {
        let index = modules.len() - 1;
        Self::from_index(index)
    }

    pub(crate) const fn into_index(self) -> usize {
        self.0 as usize
    }

    pub const fn into_u32(self) -> u32 {
        self.0
    }
}

impl Index<ModuleIdentifier> for Vec<ModuleRecord> {
    type Output = ModuleRecord;

    fn index(&self, index: ModuleIdentifier) -> &Self::Output {
        self.get(index.into_index())
            .expect("ModuleIdentifier out of bounds")
    }
}

impl IndexMut<ModuleIdentifier> for Vec<ModuleRecord> {
    fn index_mut(&mut self, index: ModuleIdentifier) -> &mut Self::Output {
        self.get_mut(index.into_index())
            .expect("ModuleIdentifier out of bounds")
    }
}

#[derive(Debug)]
pub(crate) enum ModuleKind {
    SourceText(SourceTextModuleRecord),
    Dynamic(DynamicModuleRecord),
}

/// ### [16.2.1.4 Abstract Module Records](https://tc39.es/ecma262/#sec-abstract-module-records)
///
/// Fields shared by every module variant. Variant specific data lives in
/// [`ModuleKind`].
#[derive(Debug)]
pub(crate) struct ModuleRecord {
    /// The host's key for this module.
    pub(crate) key: ModuleKey,
    status: ModuleStatus,
    /// The first error this module failed with, set when status becomes
    /// errored.
    error: Option<ModuleError>,
    /// ### \[\[Environment]]
    ///
    /// The Environment Record containing the top level bindings for this
    /// module. This field is set when the module is instantiated and
    /// dropped again if that link fails.
    pub(crate) environment: Option<ModuleEnvironmentRecord>,
    /// ### \[\[Namespace]]
    ///
    /// The module namespace object if one has been created for this module.
    pub(crate) namespace: Option<Namespace>,
    /// ### \[\[LoadedModules]]
    ///
    /// Maps the specifiers requested by this module to the resolved modules.
    loaded_modules: Vec<(Identifier, ModuleIdentifier)>,
    /// Outgoing graph edges in declaration order, without duplicates.
    edges: Vec<ModuleIdentifier>,
    /// Modules that have an edge to this module.
    importers: Vec<ModuleIdentifier>,
    pub(crate) kind: ModuleKind,
}

impl ModuleRecord {
    pub(crate) fn new(key: ModuleKey, descriptor: ModuleDescriptor) -> Self {
        let kind = match descriptor {
            ModuleDescriptor::Source(descriptor) => {
                ModuleKind::SourceText(SourceTextModuleRecord::new(descriptor))
            }
            ModuleDescriptor::Dynamic => ModuleKind::Dynamic(DynamicModuleRecord::default()),
        };
        Self {
            key,
            status: ModuleStatus::Unlinked,
            error: None,
            environment: None,
            namespace: None,
            loaded_modules: Vec::new(),
            edges: Vec::new(),
            importers: Vec::new(),
            kind,
        }
    }

    pub(crate) fn is_dynamic(&self) -> bool {
        matches!(self.kind, ModuleKind::Dynamic(_))
    }

    /// ### \[\[RequestedModules]]
    ///
    /// Dynamic modules never request other modules.
    pub(crate) fn requested_modules(&self) -> &[Identifier] {
        match &self.kind {
            ModuleKind::SourceText(record) => record.requested_modules(),
            ModuleKind::Dynamic(_) => &[],
        }
    }

    pub(crate) fn edges(&self) -> &[ModuleIdentifier] {
        &self.edges
    }

    pub(crate) fn importers(&self) -> &[ModuleIdentifier] {
        &self.importers
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.loaded_modules.len() == self.requested_modules().len()
    }

    pub(crate) fn has_loaded(&self, specifier: &Identifier) -> bool {
        self.loaded_modules
            .iter()
            .any(|(loaded, _)| loaded == specifier)
    }

    /// Records that `specifier` resolved to `module`.
    pub(crate) fn insert_loaded_module(&mut self, specifier: Identifier, module: ModuleIdentifier) {
        debug_assert!(!self.is_dynamic());
        if !self.edges.contains(&module) {
            self.edges.push(module);
        }
        self.loaded_modules.push((specifier, module));
    }

    pub(crate) fn add_importer(&mut self, importer: ModuleIdentifier) {
        if !self.importers.contains(&importer) {
            self.importers.push(importer);
        }
    }

    /// The module `specifier` resolved to, if it has been loaded.
    pub(crate) fn loaded_module(&self, specifier: &Identifier) -> Option<ModuleIdentifier> {
        self.loaded_modules
            .iter()
            .find(|(loaded, _)| loaded == specifier)
            .map(|(_, module)| *module)
    }

    /// ### [16.2.1.9 GetImportedModule ( referrer, request )](https://tc39.es/ecma262/#sec-GetImportedModule)
    ///
    /// ## Panics
    /// If `specifier` was not loaded. Linking refuses modules whose requests
    /// are not all loaded.
    pub(crate) fn get_imported_module(&self, specifier: &Identifier) -> ModuleIdentifier {
        self.loaded_module(specifier)
            .expect("module request was not loaded")
    }

    pub(crate) fn status(&self) -> ModuleStatus {
        self.status
    }

    pub(crate) fn error(&self) -> Option<&ModuleError> {
        self.error.as_ref()
    }

    /// Set module.\[\[Status]] to instantiating.
    pub(crate) fn set_instantiating(&mut self) {
        debug_assert_eq!(self.status, ModuleStatus::Unlinked);
        self.status = ModuleStatus::Instantiating;
    }

    /// Set module.\[\[Status]] to instantiated.
    pub(crate) fn set_instantiated(&mut self) {
        debug_assert_eq!(self.status, ModuleStatus::Instantiating);
        self.status = ModuleStatus::Instantiated;
    }

    /// Set module.\[\[Status]] back to unlinked after a failed link that did
    /// not involve this module, dropping its half-built environment along
    /// with any placeholders the failed link created.
    pub(crate) fn reset_unlinked(&mut self) {
        debug_assert_eq!(self.status, ModuleStatus::Instantiating);
        self.status = ModuleStatus::Unlinked;
        self.environment = None;
        if let ModuleKind::Dynamic(record) = &mut self.kind {
            record.clear_placeholders();
        }
    }

    /// Set module.\[\[Status]] to evaluating.
    pub(crate) fn set_evaluating(&mut self) {
        debug_assert_eq!(self.status, ModuleStatus::Instantiated);
        self.status = ModuleStatus::Evaluating;
    }

    /// Set module.\[\[Status]] to evaluated.
    pub(crate) fn set_evaluated(&mut self) {
        debug_assert_eq!(self.status, ModuleStatus::Evaluating);
        self.status = ModuleStatus::Evaluated;
    }

    /// Set module.\[\[Status]] to errored and record the error. Errored is
    /// terminal.
    pub(crate) fn set_errored(&mut self, error: ModuleError) {
        debug_assert!(
            !matches!(self.status, ModuleStatus::Evaluated | ModuleStatus::Errored),
            "Attempted to fail a module that already settled"
        );
        self.status = ModuleStatus::Errored;
        self.error = Some(error);
    }
}
