// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};
use tracing::{debug, warn};

use super::{
    HostError, HostHooks, ModuleError, ModuleErrorKind, ModuleResult, environments::BindingSlot,
};
use crate::{
    ecmascript::{
        builtins::module::{Namespace, get_module_namespace, namespace_get},
        scripts_and_modules::module::{
            ModuleDescriptor, ModuleIdentifier, ModuleKey, ModuleRecord, ModuleStatus,
            module_semantics::{evaluator, linker},
        },
        types::{Identifier, Value},
    },
    heap::{CreateHeapData, Heap},
};

/// What reading the export names of a namespace that is still waiting on a
/// dynamic module does.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PendingNamespaceAccess {
    /// The namespace reports no export names until it is finalized.
    #[default]
    EmptySet,
    /// Reading the export names fails with
    /// [`ModuleErrorKind::NamespaceNotReady`].
    Throw,
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub pending_namespace_access: PendingNamespaceAccess,
    /// Log the order in which modules are evaluated at info level.
    pub trace_evaluation_order: bool,
}

/// Result of [`ModuleGraph::evaluate`] and
/// [`ModuleGraph::finish_dynamic_module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationStatus {
    /// Every module reachable from the entry has been evaluated.
    Completed,
    /// Evaluation is waiting for the given dynamic module to finish.
    Suspended(ModuleIdentifier),
}

/// A depth-first evaluation that can be suspended on a dynamic module.
#[derive(Debug)]
pub(crate) struct EvaluationState {
    pub(crate) order: Vec<ModuleIdentifier>,
    /// Index of the next module in `order` to evaluate.
    pub(crate) cursor: usize,
    pub(crate) suspended: Option<ModuleIdentifier>,
    /// \[\[CycleRoot]] of every module that is part of a cycle.
    pub(crate) cycle_roots: AHashMap<ModuleIdentifier, ModuleIdentifier>,
    /// Cycle members that finished executing and stay evaluating until
    /// their cycle root does.
    pub(crate) settling: Vec<ModuleIdentifier>,
}

/// A graph of modules sharing one host.
///
/// Modules are added with [`load`](Self::load), which pulls in everything
/// the entry module transitively requests. The graph is then linked and
/// evaluated from that entry. Loading further entries into an existing graph
/// reuses every module it already knows.
///
/// ```
/// # use modlink_vm::ecmascript::*;
/// # #[derive(Debug)]
/// # struct Host;
/// # impl HostHooks for Host {
/// #     fn resolve_module_specifier(&self, _: Option<&ModuleKey>, specifier: &str) -> Result<ModuleKey, HostError> {
/// #         Ok(specifier.into())
/// #     }
/// #     fn load_module_descriptor(&self, key: &ModuleKey) -> Result<ModuleDescriptor, HostError> {
/// #         Ok(match key.as_str() {
/// #             "main" => ModuleDescriptor::Source(SourceModuleDescriptor::new().import("x", "dep", "x")),
/// #             _ => ModuleDescriptor::Dynamic,
/// #         })
/// #     }
/// #     fn execute_source_module(&self, _: &ModuleKey, _: &mut ModuleExecutionContext<'_, '_>) -> Result<(), HostError> {
/// #         Ok(())
/// #     }
/// #     fn evaluate_dynamic_module(&self, _: &ModuleKey, exports: &mut DynamicModuleExports<'_, '_>) -> Result<DynamicModuleCompletion, HostError> {
/// #         exports.set_export_binding("x", 1.0);
/// #         Ok(DynamicModuleCompletion::Completed)
/// #     }
/// # }
/// let host = Host;
/// let mut graph = ModuleGraph::new(Options::default(), &host);
/// let main = graph.load("main")?;
/// assert_eq!(graph.evaluate(main)?, EvaluationStatus::Completed);
/// assert_eq!(graph.status(main), ModuleStatus::Evaluated);
/// # Ok::<(), ModuleError>(())
/// ```
#[derive(Debug)]
pub struct ModuleGraph<'h> {
    pub(crate) options: Options,
    pub(crate) host_hooks: &'h dyn HostHooks,
    pub(crate) heap: Heap,
    module_map: AHashMap<ModuleKey, ModuleIdentifier>,
    /// Pending namespaces, keyed by the dynamic modules they wait on.
    pub(crate) deferred_namespaces: AHashMap<ModuleIdentifier, Vec<Namespace>>,
    pub(crate) evaluation: Option<EvaluationState>,
}

impl<'h> ModuleGraph<'h> {
    pub fn new(options: Options, host_hooks: &'h dyn HostHooks) -> Self {
        Self {
            options,
            host_hooks,
            heap: Heap::default(),
            module_map: AHashMap::default(),
            deferred_namespaces: AHashMap::default(),
            evaluation: None,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// ### [16.2.1.6.1.1 LoadRequestedModules ( \[ hostDefined \] )](https://tc39.es/ecma262/#sec-LoadRequestedModules)
    ///
    /// Resolves `specifier` as an entry point and loads it together with
    /// every module it transitively requests, breadth first. Modules already
    /// in the graph are reused.
    ///
    /// A request that cannot be resolved or loaded fails the module making
    /// it along with every module importing that one.
    pub fn load(&mut self, specifier: &str) -> ModuleResult<ModuleIdentifier> {
        let entry = self.add_module(None, &Identifier::from(specifier))?;
        let mut queue = VecDeque::from([entry]);
        while let Some(module) = queue.pop_front() {
            let record = &self.heap.modules[module];
            if record.is_loaded() || record.status() == ModuleStatus::Errored {
                continue;
            }
            let requests = record.requested_modules().to_vec();
            for specifier in requests {
                if self.heap.modules[module].has_loaded(&specifier) {
                    continue;
                }
                let required = match self.add_module(Some(module), &specifier) {
                    Ok(required) => required,
                    Err(error) => {
                        self.propagate_failure(module, &error);
                        return Err(error);
                    }
                };
                self.heap.modules[module].insert_loaded_module(specifier, required);
                self.heap.modules[required].add_importer(module);
                queue.push_back(required);
            }
        }
        Ok(entry)
    }

    /// Resolves `specifier` in the context of `referrer` and returns the
    /// module it refers to, creating it from the host's descriptor if the
    /// graph does not know it yet.
    fn add_module(
        &mut self,
        referrer: Option<ModuleIdentifier>,
        specifier: &Identifier,
    ) -> ModuleResult<ModuleIdentifier> {
        let referrer_key = referrer.map(|module| self.heap.modules[module].key.clone());
        let resolution_error = |error: HostError| {
            ModuleError::new(
                referrer_key.clone().unwrap_or_else(|| specifier.clone()),
                ModuleErrorKind::Resolution {
                    specifier: specifier.clone(),
                    reason: error.to_string(),
                },
            )
        };
        let key = self
            .host_hooks
            .resolve_module_specifier(referrer_key.as_ref(), specifier.as_str())
            .map_err(resolution_error)?;
        if let Some(&module) = self.module_map.get(&key) {
            return Ok(module);
        }
        let descriptor = self
            .host_hooks
            .load_module_descriptor(&key)
            .map_err(resolution_error)?;
        let dynamic = matches!(descriptor, ModuleDescriptor::Dynamic);
        let module = self.heap.create(ModuleRecord::new(key.clone(), descriptor));
        debug!(module = %key, dynamic, "added module to graph");
        self.module_map.insert(key, module);
        Ok(module)
    }

    /// Looks up a module by its key.
    pub fn module(&self, key: &str) -> Option<ModuleIdentifier> {
        self.module_map.get(key).copied()
    }

    pub fn key(&self, module: ModuleIdentifier) -> &ModuleKey {
        &self.heap.modules[module].key
    }

    pub fn status(&self, module: ModuleIdentifier) -> ModuleStatus {
        self.heap.modules[module].status()
    }

    /// The error `module` failed with, if it is errored.
    pub fn evaluation_error(&self, module: ModuleIdentifier) -> Option<&ModuleError> {
        self.heap.modules[module].error()
    }

    /// The modules `module` has edges to, in declaration order.
    pub fn dependencies(&self, module: ModuleIdentifier) -> &[ModuleIdentifier] {
        self.heap.modules[module].edges()
    }

    pub fn is_dynamic(&self, module: ModuleIdentifier) -> bool {
        self.heap.modules[module].is_dynamic()
    }

    /// The depth-first post-order of the modules reachable from `entry`:
    /// every module appears exactly once, after the modules it depends on
    /// unless a cycle makes that impossible. Edges are followed in
    /// declaration order.
    pub fn topological_order(&self, entry: ModuleIdentifier) -> Vec<ModuleIdentifier> {
        let mut order = Vec::new();
        let mut visited = AHashSet::default();
        visited.insert(entry);
        // Each frame holds a module and the index of its next edge.
        let mut stack = vec![(entry, 0usize)];
        while let Some((module, next_edge)) = stack.last_mut() {
            let module = *module;
            if let Some(&dependency) = self.heap.modules[module].edges().get(*next_edge) {
                *next_edge += 1;
                if visited.insert(dependency) {
                    stack.push((dependency, 0));
                }
            } else {
                order.push(module);
                stack.pop();
            }
        }
        order
    }

    /// ### [16.2.1.6.1.1 Link ( )](https://tc39.es/ecma262/#sec-moduledeclarationlinking)
    ///
    /// Links every module reachable from `module` that is not linked yet. On
    /// failure the failing module and every module importing it become
    /// errored, and all other modules of this link go back to unlinked.
    pub fn link(&mut self, module: ModuleIdentifier) -> ModuleResult<()> {
        linker::link(self, module)
    }

    /// ### [16.2.1.6.1.3 Evaluate ( )](https://tc39.es/ecma262/#sec-moduleevaluation)
    ///
    /// Evaluates every module reachable from `module` in dependency order,
    /// linking first if needed. Each module is evaluated at most once.
    ///
    /// If a dynamic module continues asynchronously the evaluation is
    /// suspended; the host resumes it with
    /// [`finish_dynamic_module`](Self::finish_dynamic_module). Calling this
    /// while suspended returns the suspension again.
    pub fn evaluate(&mut self, module: ModuleIdentifier) -> ModuleResult<EvaluationStatus> {
        evaluator::evaluate(self, module)
    }

    /// Completes a dynamic module the current evaluation is suspended on
    /// and continues evaluating the rest of the graph.
    pub fn finish_dynamic_module(
        &mut self,
        module: ModuleIdentifier,
        result: Result<(), HostError>,
    ) -> ModuleResult<EvaluationStatus> {
        evaluator::finish_dynamic_module(self, module, result)
    }

    /// Initializes or rebinds the export `name` of a dynamic module that is
    /// being evaluated or has been evaluated. An evaluated module can only
    /// rebind exports it already has.
    pub fn set_export_binding(
        &mut self,
        module: ModuleIdentifier,
        name: &str,
        value: impl Into<Value>,
    ) -> ModuleResult<()> {
        evaluator::set_export_binding(self, module, name.into(), value.into())
    }

    /// ### [16.2.1.11 GetModuleNamespace ( module )](https://tc39.es/ecma262/#sec-getmodulenamespace)
    pub fn module_namespace(&mut self, module: ModuleIdentifier) -> Namespace {
        get_module_namespace(self, module)
    }

    /// ### [10.4.6.11 \[\[OwnPropertyKeys\]\] ( )](https://tc39.es/ecma262/#sec-module-namespace-exotic-objects-ownpropertykeys)
    ///
    /// The namespace's export names, sorted by UTF-16 code units. A namespace
    /// still waiting on a dynamic module reports no names, or fails with
    /// [`ModuleErrorKind::NamespaceNotReady`] under
    /// [`PendingNamespaceAccess::Throw`].
    pub fn namespace_export_names(&self, namespace: Namespace) -> ModuleResult<&[Identifier]> {
        let data = &self.heap.namespaces[namespace];
        if !data.is_finalized()
            && self.options.pending_namespace_access == PendingNamespaceAccess::Throw
        {
            return Err(ModuleError::new(
                self.key(data.module()).clone(),
                ModuleErrorKind::NamespaceNotReady,
            ));
        }
        Ok(data.exports())
    }

    /// ### [10.4.6.8 \[\[Get\]\] ( P, Receiver )](https://tc39.es/ecma262/#sec-module-namespace-exotic-objects-get-p-receiver)
    pub fn namespace_get(&self, namespace: Namespace, name: &str) -> ModuleResult<Value> {
        namespace_get(&self.heap, namespace, &Identifier::from(name))
    }

    /// ### [10.4.6.7 \[\[HasProperty\]\] ( P )](https://tc39.es/ecma262/#sec-module-namespace-exotic-objects-hasproperty-p)
    pub fn namespace_has(&self, namespace: Namespace, name: &str) -> bool {
        self.heap.namespaces[namespace].has_export(&Identifier::from(name))
    }

    pub fn namespace_is_finalized(&self, namespace: Namespace) -> bool {
        self.heap.namespaces[namespace].is_finalized()
    }

    /// The module whose exports `namespace` exposes.
    pub fn namespace_module(&self, namespace: Namespace) -> ModuleIdentifier {
        self.heap.namespaces[namespace].module()
    }

    /// Reads a top level binding of `module`, following import bindings.
    pub fn get_binding_value(&self, module: ModuleIdentifier, name: &str) -> ModuleResult<Value> {
        get_binding_value(&self.heap, module, &Identifier::from(name))
    }

    /// Marks `origin` and every module that transitively imports it as
    /// errored with `error`. Modules that already settled keep their state.
    pub(crate) fn propagate_failure(&mut self, origin: ModuleIdentifier, error: &ModuleError) {
        let mut queue = vec![origin];
        let mut visited = AHashSet::default();
        while let Some(module) = queue.pop() {
            if !visited.insert(module) {
                continue;
            }
            let record = &mut self.heap.modules[module];
            match record.status() {
                ModuleStatus::Evaluated => continue,
                ModuleStatus::Errored => {}
                _ => {
                    warn!(module = %record.key, %error, "module errored");
                    record.set_errored(error.clone());
                }
            }
            queue.extend_from_slice(record.importers());
        }
    }
}

/// ### [9.1.1.5.1 GetBindingValue ( N, S )](https://tc39.es/ecma262/#sec-module-environment-records-getbindingvalue-n-s)
pub(crate) fn get_binding_value(
    heap: &Heap,
    module: ModuleIdentifier,
    name: &Identifier,
) -> ModuleResult<Value> {
    let record = &heap.modules[module];
    let Some(env) = record.environment.as_ref() else {
        return Err(ModuleError::new(
            record.key.clone(),
            ModuleErrorKind::UndeclaredBinding(name.clone()),
        ));
    };
    match env.get(name.as_str()) {
        Some(BindingSlot::Local(binding)) => binding
            .read(name)
            .cloned()
            .map_err(|kind| ModuleError::new(record.key.clone(), kind)),
        // 2. If the binding for N is an indirection, then
        Some(BindingSlot::Import {
            module: target,
            binding_name,
        }) => {
            // a. Let indirection be the indirection values provided when
            //    this binding for N was created.
            // b. Let M and N2 be indirection.
            // c. Let targetEnv be M.[[Environment]].
            let target_record = &heap.modules[*target];
            // d. If targetEnv is EMPTY, throw a ReferenceError exception.
            // e. Return ? targetEnv.GetBindingValue(N2, true).
            target_record
                .environment
                .as_ref()
                .and_then(|env| env.get_local(binding_name.as_str()))
                .ok_or_else(|| ModuleErrorKind::UninitializedBinding(binding_name.clone()))
                .and_then(|binding| binding.read(binding_name).cloned())
                .map_err(|kind| ModuleError::new(target_record.key.clone(), kind))
        }
        None => Err(ModuleError::new(
            record.key.clone(),
            ModuleErrorKind::UndeclaredBinding(name.clone()),
        )),
    }
}
