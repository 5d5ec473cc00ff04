// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::{
    ModuleError, ModuleErrorKind, ModuleGraph, ModuleResult,
    environments::{Binding, BindingSlot},
    module_graph::get_binding_value,
};
use crate::ecmascript::{
    builtins::module::Namespace,
    scripts_and_modules::module::{
        ModuleIdentifier, ModuleKey, module_semantics::dynamic_module_records,
    },
    types::{Identifier, Value},
};

/// The view a source module body has of its own environment while the host
/// executes it.
#[derive(Debug)]
pub struct ModuleExecutionContext<'a, 'h> {
    graph: &'a mut ModuleGraph<'h>,
    module: ModuleIdentifier,
}

impl<'a, 'h> ModuleExecutionContext<'a, 'h> {
    pub(crate) fn new(graph: &'a mut ModuleGraph<'h>, module: ModuleIdentifier) -> Self {
        Self { graph, module }
    }

    pub fn module(&self) -> ModuleIdentifier {
        self.module
    }

    pub fn key(&self) -> &ModuleKey {
        self.graph.key(self.module)
    }

    /// ### [9.1.1.1.4 InitializeBinding ( N, V )](https://tc39.es/ecma262/#sec-declarative-environment-records-initializebinding-n-v)
    pub fn initialize_binding(&mut self, name: &str, value: Value) -> ModuleResult<()> {
        let name = Identifier::from(name);
        self.with_local_binding(&name, |binding| binding.initialize(&name, value))
    }

    /// ### [9.1.1.1.5 SetMutableBinding ( N, V, S )](https://tc39.es/ecma262/#sec-declarative-environment-records-setmutablebinding-n-v-s)
    pub fn set_mutable_binding(&mut self, name: &str, value: Value) -> ModuleResult<()> {
        let name = Identifier::from(name);
        self.with_local_binding(&name, |binding| binding.set(&name, value))
    }

    /// ### [9.1.1.5.1 GetBindingValue ( N, S )](https://tc39.es/ecma262/#sec-module-environment-records-getbindingvalue-n-s)
    ///
    /// Import bindings are followed to the binding they refer to, so the
    /// current value of the exporting module's binding is returned.
    pub fn get_binding_value(&self, name: &str) -> ModuleResult<Value> {
        get_binding_value(&self.graph.heap, self.module, &Identifier::from(name))
    }

    /// See [`ModuleGraph::namespace_export_names`].
    pub fn namespace_export_names(&self, namespace: Namespace) -> ModuleResult<&[Identifier]> {
        self.graph.namespace_export_names(namespace)
    }

    /// See [`ModuleGraph::namespace_get`].
    pub fn namespace_get(&self, namespace: Namespace, name: &str) -> ModuleResult<Value> {
        self.graph.namespace_get(namespace, name)
    }

    fn with_local_binding(
        &mut self,
        name: &Identifier,
        f: impl FnOnce(&mut Binding) -> Result<(), ModuleErrorKind>,
    ) -> ModuleResult<()> {
        let record = &mut self.graph.heap.modules[self.module];
        let result = match record.environment.as_mut() {
            // Import bindings are immutable.
            Some(env) if matches!(env.get(name.as_str()), Some(BindingSlot::Import { .. })) => {
                Err(ModuleErrorKind::AlreadyInitialized(name.clone()))
            }
            Some(env) => match env.get_local_mut(name.as_str()) {
                Some(binding) => f(binding),
                None => Err(ModuleErrorKind::UndeclaredBinding(name.clone())),
            },
            None => Err(ModuleErrorKind::UndeclaredBinding(name.clone())),
        };
        result.map_err(|kind| ModuleError::new(record.key.clone(), kind))
    }
}

/// The handle a host uses to set the exports of a dynamic module.
///
/// Exports can also be set after the evaluate hook returns, through
/// [`ModuleGraph::set_export_binding`], using the identifier from
/// [`DynamicModuleExports::module`].
#[derive(Debug)]
pub struct DynamicModuleExports<'a, 'h> {
    graph: &'a mut ModuleGraph<'h>,
    module: ModuleIdentifier,
}

impl<'a, 'h> DynamicModuleExports<'a, 'h> {
    pub(crate) fn new(graph: &'a mut ModuleGraph<'h>, module: ModuleIdentifier) -> Self {
        Self { graph, module }
    }

    pub fn module(&self) -> ModuleIdentifier {
        self.module
    }

    pub fn key(&self) -> &ModuleKey {
        self.graph.key(self.module)
    }

    /// Creates the export `name` if needed and sets its value. Setting an
    /// export again replaces its value, and importers observe the change.
    pub fn set_export_binding(&mut self, name: &str, value: impl Into<Value>) {
        dynamic_module_records::set_export_binding(
            &mut self.graph.heap.modules[self.module],
            name.into(),
            value.into(),
        );
    }
}
