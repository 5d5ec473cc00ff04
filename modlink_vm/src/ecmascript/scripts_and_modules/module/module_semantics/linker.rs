// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [16.2.1.6.1.1 Link ( )](https://tc39.es/ecma262/#sec-moduledeclarationlinking)
//!
//! Linking walks the modules reachable from the entry in depth-first
//! post-order, twice. The first pass gives every module an environment with
//! its local bindings declared. The second pass checks that every indirect
//! export resolves and turns every import into a binding, which needs the
//! environments of all modules in the graph, including ones later in the
//! order when the graph is cyclic.
//!
//! A failed link leaves no trace on the modules it did not fail: they go
//! back to unlinked, and placeholders it created on dynamic modules linked
//! earlier are removed again.

use tracing::{debug, instrument};

use super::{
    abstract_module_records::{ResolvedBindingName, resolve_export},
    dynamic_module_records::{create_placeholder_binding, remove_placeholder_binding},
    source_text_module_records::ImportName,
};
use crate::ecmascript::{
    builtins::module::{Namespace, get_module_namespace},
    execution::{
        ModuleError, ModuleErrorKind, ModuleGraph, ModuleResult,
        environments::ModuleEnvironmentRecord,
    },
    scripts_and_modules::module::{ModuleIdentifier, ModuleKind, ModuleStatus},
    types::{Identifier, Value},
};

#[instrument(level = "debug", skip_all, fields(module = %graph.key(module)))]
pub(crate) fn link(graph: &mut ModuleGraph, module: ModuleIdentifier) -> ModuleResult<()> {
    if let Some(error) = graph.heap.modules[module].error() {
        return Err(error.clone());
    }
    let order = graph.topological_order(module);
    if let Some(&unloaded) = order.iter().find(|&&m| {
        let record = &graph.heap.modules[m];
        record.status() == ModuleStatus::Unlinked && !record.is_loaded()
    }) {
        return Err(ModuleError::new(
            graph.key(unloaded).clone(),
            ModuleErrorKind::InvalidModuleState("module requests have not all been loaded"),
        ));
    }
    let mut link = LinkState {
        instantiating: Vec::with_capacity(order.len()),
        placeholders: Vec::new(),
    };

    for &m in &order {
        let record = &mut graph.heap.modules[m];
        match record.status() {
            ModuleStatus::Unlinked => {}
            ModuleStatus::Errored => {
                // A dependency failed in an earlier link or evaluation.
                let Some(error) = record.error().cloned() else {
                    unreachable!("errored module without an error")
                };
                return Err(fail_link(graph, &link, m, error));
            }
            _ => continue,
        }
        record.set_instantiating();
        link.instantiating.push(m);
        let environment = match &record.kind {
            ModuleKind::SourceText(source) => source.create_environment(),
            ModuleKind::Dynamic(_) => Ok(ModuleEnvironmentRecord::default()),
        };
        match environment {
            Ok(environment) => record.environment = Some(environment),
            Err(kind) => {
                let error = ModuleError::new(record.key.clone(), kind);
                return Err(fail_link(graph, &link, m, error));
            }
        }
    }

    for index in 0..link.instantiating.len() {
        let m = link.instantiating[index];
        if let Err(kind) = initialize_environment(graph, &mut link, m) {
            let error = ModuleError::new(graph.key(m).clone(), kind);
            return Err(fail_link(graph, &link, m, error));
        }
    }
    for &m in &link.instantiating {
        graph.heap.modules[m].set_instantiated();
    }
    debug!(linked = link.instantiating.len(), "link completed");
    Ok(())
}

/// What a single link has changed so far.
struct LinkState {
    /// Modules moved to instantiating, in link order.
    instantiating: Vec<ModuleIdentifier>,
    /// Placeholders created on dynamic modules, in creation order.
    placeholders: Vec<(ModuleIdentifier, Identifier)>,
}

/// Marks `failed` and its importers as errored, returns every other module
/// of this link to unlinked and removes the placeholders it created.
fn fail_link(
    graph: &mut ModuleGraph,
    link: &LinkState,
    failed: ModuleIdentifier,
    error: ModuleError,
) -> ModuleError {
    graph.propagate_failure(failed, &error);
    for (m, name) in &link.placeholders {
        remove_placeholder_binding(&mut graph.heap.modules[*m], name);
    }
    for &m in &link.instantiating {
        let record = &mut graph.heap.modules[m];
        if record.status() == ModuleStatus::Instantiating {
            record.reset_unlinked();
        }
    }
    error
}

/// ### [16.2.1.7.3.4 InitializeEnvironment ( )](https://tc39.es/ecma262/#sec-source-text-module-record-initialize-environment)
///
/// The second half of environment initialization for source modules;
/// dynamic modules have nothing to wire.
fn initialize_environment(
    graph: &mut ModuleGraph,
    link: &mut LinkState,
    module: ModuleIdentifier,
) -> Result<(), ModuleErrorKind> {
    let record = &graph.heap.modules[module];
    let ModuleKind::SourceText(source) = &record.kind else {
        return Ok(());
    };
    let module_key = record.key.clone();
    let indirect_export_entries = source.indirect_export_entries().to_vec();
    let import_entries = source.import_entries().to_vec();

    // 1. For each ExportEntry Record e of module.[[IndirectExportEntries]], do
    for e in indirect_export_entries {
        // a. Assert: e.[[ExportName]] is not null.
        // b. Let resolution be module.ResolveExport(e.[[ExportName]]).
        // c. If resolution is either null or AMBIGUOUS, throw a SyntaxError
        //    exception.
        let resolution = resolve_export(&graph.heap, module, &e.export_name, &mut Vec::new())
            .into_binding(&e.export_name, &module_key)?;
        materialize(graph, link, resolution.module, resolution.binding_name);
    }

    // 7. For each ImportEntry Record in of module.[[ImportEntries]], do
    for entry in import_entries {
        // a. Let importedModule be GetImportedModule(module,
        //    in.[[ModuleRequest]]).
        let imported_module =
            graph.heap.modules[module].get_imported_module(&entry.module_request);
        let value = match &entry.import_name {
            // b. If in.[[ImportName]] is NAMESPACE-OBJECT, then
            ImportName::NamespaceObject => {
                // i. Let namespace be GetModuleNamespace(importedModule).
                // ii. Perform ! env.CreateImmutableBinding(in.[[LocalName]], true).
                // iii. Perform ! env.InitializeBinding(in.[[LocalName]], namespace).
                Some(get_module_namespace(graph, imported_module))
            }
            // c. Else,
            ImportName::Name(import_name) => {
                // i. Let resolution be importedModule.ResolveExport(in.[[ImportName]]).
                // ii. If resolution is either null or AMBIGUOUS, throw a
                //     SyntaxError exception.
                let target_key = graph.key(imported_module).clone();
                let resolution =
                    resolve_export(&graph.heap, imported_module, import_name, &mut Vec::new())
                        .into_binding(import_name, &target_key)?;
                match materialize(graph, link, resolution.module, resolution.binding_name) {
                    // iii. If resolution.[[BindingName]] is NAMESPACE, then
                    //   1. Let namespace be GetModuleNamespace(resolution.[[Module]]).
                    //   2. Perform ! env.CreateImmutableBinding(in.[[LocalName]], true).
                    //   3. Perform ! env.InitializeBinding(in.[[LocalName]], namespace).
                    Materialized::Namespace(namespace) => Some(namespace),
                    // iv. Else,
                    //   1. Perform CreateImportBinding(env, in.[[LocalName]],
                    //      resolution.[[Module]], resolution.[[BindingName]]).
                    Materialized::Binding(binding_name) => {
                        environment(graph, module).create_import_binding(
                            entry.local_name.clone(),
                            resolution.module,
                            binding_name,
                        )?;
                        None
                    }
                }
            }
        };
        if let Some(namespace) = value {
            environment(graph, module)
                .declare_initialized(entry.local_name.clone(), Value::Namespace(namespace))?;
        }
    }
    Ok(())
}

enum Materialized {
    Binding(Identifier),
    Namespace(Namespace),
}

/// Creates whatever a successful resolution refers to: the namespace of
/// the target module, or the placeholder of a dynamic module's export.
fn materialize(
    graph: &mut ModuleGraph,
    link: &mut LinkState,
    target: ModuleIdentifier,
    binding_name: ResolvedBindingName,
) -> Materialized {
    match binding_name {
        ResolvedBindingName::Namespace => {
            Materialized::Namespace(get_module_namespace(graph, target))
        }
        ResolvedBindingName::Binding(name) => {
            if create_placeholder_binding(&mut graph.heap.modules[target], &name) {
                link.placeholders.push((target, name.clone()));
            }
            Materialized::Binding(name)
        }
    }
}

fn environment<'a>(
    graph: &'a mut ModuleGraph,
    module: ModuleIdentifier,
) -> &'a mut ModuleEnvironmentRecord {
    graph.heap.modules[module]
        .environment
        .get_or_insert_with(ModuleEnvironmentRecord::default)
}
