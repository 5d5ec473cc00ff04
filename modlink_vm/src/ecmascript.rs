// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod builtins;
pub mod execution;
pub mod scripts_and_modules;
pub mod types;

pub use builtins::module::Namespace;
pub use execution::{
    DynamicModuleCompletion, DynamicModuleExports, EvaluationStatus, HostError, HostHooks,
    ModuleError, ModuleErrorKind, ModuleExecutionContext, ModuleGraph, ModuleResult, Options,
    PendingNamespaceAccess,
};
pub use scripts_and_modules::module::{
    Declaration, ExportImportName, ImportEntry, ImportName, IndirectExportEntry,
    LocalExportEntry, ModuleDescriptor, ModuleIdentifier, ModuleKey, ModuleStatus,
    SourceModuleDescriptor,
};
pub use types::{HostObject, Identifier, Value};
