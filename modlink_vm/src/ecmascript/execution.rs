// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub(crate) mod environments;
mod errors;
mod execution_context;
mod host_hooks;
mod module_graph;

pub use errors::{HostError, ModuleError, ModuleErrorKind, ModuleResult};
pub use execution_context::{DynamicModuleExports, ModuleExecutionContext};
pub use host_hooks::{DynamicModuleCompletion, HostHooks};
pub(crate) use module_graph::EvaluationState;
pub use module_graph::{EvaluationStatus, ModuleGraph, Options, PendingNamespaceAccess};
