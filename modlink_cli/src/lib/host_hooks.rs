// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cell::RefCell;

use modlink_vm::ecmascript::{
    DynamicModuleCompletion, DynamicModuleExports, EvaluationStatus, HostError, HostHooks,
    ModuleDescriptor, ModuleError, ModuleExecutionContext, ModuleGraph, ModuleIdentifier,
    ModuleKey, ModuleResult,
};
use tracing::debug;

use crate::{
    fixture::{Fixture, ModuleFixture, Statement, json_to_value},
    fmt::format_value,
};

/// Host hooks that serve modules out of a [`Fixture`] and collect what the
/// module bodies print.
#[derive(Debug)]
pub struct FixtureHostHooks {
    fixture: Fixture,
    output: RefCell<Vec<String>>,
}

impl FixtureHostHooks {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture,
            output: RefCell::new(Vec::new()),
        }
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    /// Takes the lines printed so far.
    pub fn take_output(&self) -> Vec<String> {
        self.output.take()
    }

    fn print(&self, key: &ModuleKey, line: String) {
        self.output.borrow_mut().push(format!("[{key}] {line}"));
    }

    fn run_statement(
        &self,
        key: &ModuleKey,
        context: &mut ModuleExecutionContext<'_, '_>,
        statement: &Statement,
    ) -> Result<(), HostError> {
        match statement {
            Statement::Init { name, value } => context
                .initialize_binding(name, json_to_value(value)?)
                .map_err(module_error),
            Statement::Set { name, value } => context
                .set_mutable_binding(name, json_to_value(value)?)
                .map_err(module_error),
            Statement::Print { name } => {
                let value = context.get_binding_value(name).map_err(module_error)?;
                self.print(key, format!("{name} = {}", format_value(&value)));
                Ok(())
            }
            Statement::PrintNamespace { name } => {
                let value = context.get_binding_value(name).map_err(module_error)?;
                let Some(namespace) = value.as_namespace() else {
                    return Err(HostError::new(format!("'{name}' is not a module namespace")));
                };
                let names = context
                    .namespace_export_names(namespace)
                    .map_err(module_error)?
                    .iter()
                    .map(|name| name.to_string())
                    .collect::<Vec<_>>();
                self.print(key, format!("{name} = [{}]", names.join(", ")));
                Ok(())
            }
            Statement::Throw { message } => Err(HostError::new(message.clone())),
        }
    }
}

impl HostHooks for FixtureHostHooks {
    fn resolve_module_specifier(
        &self,
        referrer: Option<&ModuleKey>,
        specifier: &str,
    ) -> Result<ModuleKey, HostError> {
        self.fixture
            .resolve(referrer.map(|key| key.as_str()), specifier)
            .map(ModuleKey::from)
    }

    fn load_module_descriptor(&self, key: &ModuleKey) -> Result<ModuleDescriptor, HostError> {
        self.fixture
            .module(key.as_str())
            .map(ModuleFixture::descriptor)
            .ok_or_else(|| HostError::new(format!("no module '{key}' in fixture")))
    }

    fn execute_source_module(
        &self,
        key: &ModuleKey,
        context: &mut ModuleExecutionContext<'_, '_>,
    ) -> Result<(), HostError> {
        let Some(ModuleFixture::Source(source)) = self.fixture.module(key.as_str()) else {
            return Err(HostError::new(format!("'{key}' is not a source module")));
        };
        for statement in &source.body {
            self.run_statement(key, context, statement)?;
        }
        Ok(())
    }

    fn evaluate_dynamic_module(
        &self,
        key: &ModuleKey,
        exports: &mut DynamicModuleExports<'_, '_>,
    ) -> Result<DynamicModuleCompletion, HostError> {
        let Some(dynamic) = self.fixture.dynamic(key.as_str()) else {
            return Err(HostError::new(format!("'{key}' is not a dynamic module")));
        };
        for (name, value) in &dynamic.exports {
            exports.set_export_binding(name, json_to_value(value)?);
        }
        if dynamic.is_async {
            return Ok(DynamicModuleCompletion::Pending);
        }
        if let Some(message) = &dynamic.error {
            return Err(HostError::new(message.clone()));
        }
        Ok(DynamicModuleCompletion::Completed)
    }
}

fn module_error(error: ModuleError) -> HostError {
    HostError::new(error.to_string())
}

/// Loads, links and evaluates the fixture's entry module, completing every
/// asynchronous dynamic module as soon as it suspends.
pub fn evaluate_entry(
    graph: &mut ModuleGraph,
    host: &FixtureHostHooks,
) -> ModuleResult<ModuleIdentifier> {
    let entry = graph.load(&host.fixture().entry)?;
    graph.link(entry)?;
    let mut status = graph.evaluate(entry)?;
    while let EvaluationStatus::Suspended(module) = status {
        let key = graph.key(module).clone();
        debug!(module = %key, "completing asynchronous module");
        let dynamic = host.fixture().dynamic(key.as_str()).cloned().unwrap_or_default();
        let mut result = Ok(());
        for (name, value) in &dynamic.deferred_exports {
            match json_to_value(value) {
                Ok(value) => graph.set_export_binding(module, name, value)?,
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
        if let Some(message) = dynamic.error {
            result = result.and(Err(HostError::new(message)));
        }
        status = graph.finish_dynamic_module(module, result)?;
    }
    Ok(entry)
}
