// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ## [10.4.6 Module Namespace Exotic Objects](https://tc39.es/ecma262/#sec-module-namespace-exotic-objects)
//!
//! A namespace whose module star-exports from a dynamic module that has not
//! been evaluated yet cannot know its export names. Such a namespace starts
//! out pending, exposes no names, and is finalized exactly once: when the
//! last dynamic module it waits on finishes evaluating.
//!
//! Finalizing a namespace also creates the namespaces of the modules its
//! `export * as name` exports refer to, so that reading such an export
//! always yields a namespace.

use std::{
    marker::PhantomData,
    ops::{Index, IndexMut},
};

use ahash::AHashSet;
use tracing::debug;

pub(crate) mod data;

use data::NamespaceHeapData;

use crate::{
    ecmascript::{
        execution::{ModuleError, ModuleErrorKind, ModuleGraph, ModuleResult},
        scripts_and_modules::module::{
            ModuleIdentifier,
            module_semantics::abstract_module_records::{
                ResolveExportResult, ResolvedBinding, ResolvedBindingName, get_exported_names,
                resolve_export,
            },
        },
        types::{Identifier, Value},
    },
    heap::{CreateHeapData, Heap},
};

/// A module namespace object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Namespace(u32, PhantomData<NamespaceHeapData>);

impl Namespace {
    pub(crate) const fn from_index(value: usize) -> Self {
        assert!(value <= u32::MAX as usize);
        Self(value as u32, PhantomData)
    }

    pub(crate) fn last(namespaces: &[NamespaceHeapData]) -> Self {
        Self::from_index(namespaces.len() - 1)
    }

    pub(crate) const fn into_index(self) -> usize {
        self.0 as usize
    }
}

impl Index<Namespace> for Vec<NamespaceHeapData> {
    type Output = NamespaceHeapData;

    fn index(&self, index: Namespace) -> &Self::Output {
        self.get(index.into_index())
            .expect("Namespace out of bounds")
    }
}

impl IndexMut<Namespace> for Vec<NamespaceHeapData> {
    fn index_mut(&mut self, index: Namespace) -> &mut Self::Output {
        self.get_mut(index.into_index())
            .expect("Namespace out of bounds")
    }
}

/// ### [16.2.1.11 GetModuleNamespace ( module )](https://tc39.es/ecma262/#sec-getmodulenamespace)
///
/// Returns the namespace of `module`, creating it on first request. Each
/// module has at most one namespace.
pub(crate) fn get_module_namespace(
    graph: &mut ModuleGraph,
    module: ModuleIdentifier,
) -> Namespace {
    // 3. Let namespace be module.[[Namespace]].
    // 4. If namespace is EMPTY, then
    if let Some(namespace) = graph.heap.modules[module].namespace {
        return namespace;
    }
    // a. Let exportedNames be module.GetExportedNames().
    let mut pending = AHashSet::default();
    let exported_names = get_exported_names(&graph.heap, module, &mut Vec::new(), &mut pending);
    let mut targets = Vec::new();
    let namespace = if pending.is_empty() {
        // b. Let unambiguousNames be a new empty List.
        // c. For each element name of exportedNames, do
        //   i. Let resolution be module.ResolveExport(name).
        //   ii. If resolution is a ResolvedBinding Record, append name to
        //       unambiguousNames.
        // d. Set namespace to ModuleNamespaceCreate(module, unambiguousNames).
        let exports;
        (exports, targets) = resolvable_exports(&graph.heap, module, exported_names);
        graph
            .heap
            .create(NamespaceHeapData::finalized(module, exports))
    } else {
        let namespace = graph
            .heap
            .create(NamespaceHeapData::pending(module, pending.clone()));
        debug!(
            module = %graph.heap.modules[module].key,
            waiting_on = pending.len(),
            "deferred namespace finalization"
        );
        for dependency in pending {
            graph
                .deferred_namespaces
                .entry(dependency)
                .or_default()
                .push(namespace);
        }
        namespace
    };
    graph.heap.modules[module].namespace = Some(namespace);
    // A cycle of namespace re-exports ends at the namespace just stored.
    for target in targets {
        get_module_namespace(graph, target);
    }
    // 5. Return namespace.
    namespace
}

/// Finalizes every pending namespace that only waited on `evaluated`.
pub(crate) fn finalize_deferred_namespaces(
    graph: &mut ModuleGraph,
    evaluated: ModuleIdentifier,
) {
    let Some(namespaces) = graph.deferred_namespaces.remove(&evaluated) else {
        return;
    };
    for namespace in namespaces {
        if !graph.heap.namespaces[namespace].resolve_dependency(evaluated) {
            continue;
        }
        let module = graph.heap.namespaces[namespace].module();
        let mut pending = AHashSet::default();
        let exported_names =
            get_exported_names(&graph.heap, module, &mut Vec::new(), &mut pending);
        debug_assert!(pending.is_empty());
        let (exports, targets) = resolvable_exports(&graph.heap, module, exported_names);
        debug!(
            module = %graph.heap.modules[module].key,
            exports = exports.len(),
            "finalized namespace"
        );
        graph.heap.namespaces[namespace].finalize(exports);
        for target in targets {
            get_module_namespace(graph, target);
        }
    }
}

/// Filters `exported_names` down to the names that resolve, sorted by UTF-16
/// code units. Also returns the modules whose namespaces those names resolve
/// to.
fn resolvable_exports(
    heap: &Heap,
    module: ModuleIdentifier,
    exported_names: Vec<Identifier>,
) -> (Box<[Identifier]>, Vec<ModuleIdentifier>) {
    let mut names = Vec::with_capacity(exported_names.len());
    let mut targets = Vec::new();
    for name in exported_names {
        match resolve_export(heap, module, &name, &mut Vec::new()) {
            ResolveExportResult::Resolved(ResolvedBinding {
                module: target,
                binding_name: ResolvedBindingName::Namespace,
            }) => {
                if !targets.contains(&target) {
                    targets.push(target);
                }
                names.push(name);
            }
            ResolveExportResult::Resolved(_) => names.push(name),
            _ => {}
        }
    }
    names.sort_by(|a, b| a.code_unit_cmp(b));
    names.dedup();
    (names.into_boxed_slice(), targets)
}

/// ### [10.4.6.8 \[\[Get\]\] ( P, Receiver )](https://tc39.es/ecma262/#sec-module-namespace-exotic-objects-get-p-receiver)
///
/// Reads the current value of the export `name`. Names the namespace does
/// not expose read as undefined.
pub(crate) fn namespace_get(
    heap: &Heap,
    namespace: Namespace,
    name: &Identifier,
) -> ModuleResult<Value> {
    let data = &heap.namespaces[namespace];
    // 2. Let exports be O.[[Exports]].
    // 3. If exports does not contain P, return undefined.
    if !data.has_export(name) {
        return Ok(Value::Undefined);
    }
    // 4. Let m be O.[[Module]].
    // 5. Let binding be m.ResolveExport(P).
    // 6. Assert: binding is a ResolvedBinding Record.
    let ResolveExportResult::Resolved(ResolvedBinding {
        module: target,
        binding_name,
    }) = resolve_export(heap, data.module(), name, &mut Vec::new())
    else {
        return Ok(Value::Undefined);
    };
    // 7. Let targetModule be binding.[[Module]].
    let target_record = &heap.modules[target];
    match binding_name {
        // 9. If binding.[[BindingName]] is NAMESPACE, then
        //   a. Return GetModuleNamespace(targetModule).
        ResolvedBindingName::Namespace => {
            Ok(target_record.namespace.map_or(Value::Undefined, Value::Namespace))
        }
        // 10. Let targetEnv be targetModule.[[Environment]].
        // 11. If targetEnv is EMPTY, throw a ReferenceError exception.
        // 12. Return ? targetEnv.GetBindingValue(binding.[[BindingName]], true).
        ResolvedBindingName::Binding(binding_name) => {
            let error = |kind: ModuleErrorKind| ModuleError::new(target_record.key.clone(), kind);
            let Some(binding) = target_record
                .environment
                .as_ref()
                .and_then(|env| env.get_local(binding_name.as_str()))
            else {
                return Err(error(ModuleErrorKind::UninitializedBinding(binding_name)));
            };
            binding.read(&binding_name).cloned().map_err(error)
        }
    }
}
