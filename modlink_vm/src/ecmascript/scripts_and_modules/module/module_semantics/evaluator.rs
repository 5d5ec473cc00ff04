// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [16.2.1.6.1.3 Evaluate ( )](https://tc39.es/ecma262/#sec-moduleevaluation)
//!
//! Modules are evaluated one by one in the depth-first post-order of the
//! graph. The walk is kept in [`EvaluationState`] so that it can stop on a
//! dynamic module that completes asynchronously and continue from the same
//! place once the host reports that it finished.
//!
//! The modules of a cycle settle together: a member that finishes executing
//! stays evaluating until the cycle's root has finished as well, so that a
//! failure anywhere in the cycle fails every member.

use ahash::{AHashMap, AHashSet};
use tracing::{debug, info, instrument};

use super::{dynamic_module_records, linker};
use crate::ecmascript::{
    builtins::module::finalize_deferred_namespaces,
    execution::{
        DynamicModuleCompletion, DynamicModuleExports, EvaluationState, EvaluationStatus,
        HostError, ModuleError, ModuleErrorKind, ModuleExecutionContext, ModuleGraph,
        ModuleResult,
    },
    scripts_and_modules::module::{ModuleIdentifier, ModuleKind, ModuleStatus},
    types::{Identifier, Value},
};

#[instrument(level = "debug", skip_all, fields(module = %graph.key(module)))]
pub(crate) fn evaluate(
    graph: &mut ModuleGraph,
    module: ModuleIdentifier,
) -> ModuleResult<EvaluationStatus> {
    if let Some(state) = &graph.evaluation {
        return match state.suspended {
            Some(suspended) => Ok(EvaluationStatus::Suspended(suspended)),
            None => Err(invalid_state(
                graph,
                module,
                "module graph is already being evaluated",
            )),
        };
    }
    match graph.heap.modules[module].status() {
        ModuleStatus::Evaluated => return Ok(EvaluationStatus::Completed),
        ModuleStatus::Errored => {
            let Some(error) = graph.heap.modules[module].error() else {
                unreachable!("errored module without an error")
            };
            return Err(error.clone());
        }
        ModuleStatus::Unlinked => linker::link(graph, module)?,
        ModuleStatus::Instantiated => {}
        ModuleStatus::Instantiating | ModuleStatus::Evaluating => {
            return Err(invalid_state(
                graph,
                module,
                "module is in the middle of being linked or evaluated",
            ));
        }
    }
    let order = graph.topological_order(module);
    if graph.options.trace_evaluation_order {
        let keys: Vec<&str> = order.iter().map(|&m| graph.key(m).as_str()).collect();
        info!(order = ?keys, "evaluation order");
    }
    let cycle_roots = cycle_roots(graph, module);
    graph.evaluation = Some(EvaluationState {
        order,
        cursor: 0,
        suspended: None,
        cycle_roots,
        settling: Vec::new(),
    });
    resume(graph)
}

/// Finds the cycles among the modules reachable from `entry`, walking edges
/// in the same order as [`ModuleGraph::topological_order`]. Every module that
/// is part of a cycle is mapped to the cycle's root: the member the walk
/// entered first, which is the last member in evaluation order.
fn cycle_roots(
    graph: &ModuleGraph,
    entry: ModuleIdentifier,
) -> AHashMap<ModuleIdentifier, ModuleIdentifier> {
    // [[DFSIndex]] and [[DFSAncestorIndex]] of every visited module.
    let mut dfs: AHashMap<ModuleIdentifier, (u32, u32)> = AHashMap::default();
    let mut stack = vec![entry];
    let mut on_stack = AHashSet::from_iter([entry]);
    let mut roots = AHashMap::default();
    dfs.insert(entry, (0, 0));
    let mut frames = vec![(entry, 0usize)];
    while let Some((module, next_edge)) = frames.last_mut() {
        let module = *module;
        if let Some(&required) = graph.heap.modules[module].edges().get(*next_edge) {
            *next_edge += 1;
            match dfs.get(&required).copied() {
                Some((index, _)) => {
                    if on_stack.contains(&required)
                        && let Some(indices) = dfs.get_mut(&module)
                    {
                        indices.1 = indices.1.min(index);
                    }
                }
                None => {
                    let index = dfs.len() as u32;
                    dfs.insert(required, (index, index));
                    stack.push(required);
                    on_stack.insert(required);
                    frames.push((required, 0));
                }
            }
            continue;
        }
        frames.pop();
        let (index, ancestor_index) = dfs[&module];
        if let Some((parent, _)) = frames.last()
            && let Some(indices) = dfs.get_mut(parent)
        {
            indices.1 = indices.1.min(ancestor_index);
        }
        if ancestor_index == index {
            let position = stack
                .iter()
                .rposition(|&m| m == module)
                .unwrap_or(stack.len());
            let members = stack.split_off(position);
            for &m in &members {
                on_stack.remove(&m);
            }
            if members.len() > 1 {
                for m in members {
                    roots.insert(m, module);
                }
            }
        }
    }
    roots
}

/// Evaluates modules from the evaluation cursor until every module is done,
/// a module fails, or a dynamic module suspends.
fn resume(graph: &mut ModuleGraph) -> ModuleResult<EvaluationStatus> {
    loop {
        let Some(state) = graph.evaluation.as_mut() else {
            return Ok(EvaluationStatus::Completed);
        };
        let Some(&module) = state.order.get(state.cursor) else {
            debug_assert!(state.settling.is_empty());
            graph.evaluation = None;
            return Ok(EvaluationStatus::Completed);
        };
        state.cursor += 1;
        match graph.heap.modules[module].status() {
            ModuleStatus::Instantiated => {}
            // Already evaluated through another entry.
            ModuleStatus::Evaluated => continue,
            ModuleStatus::Errored => {
                let Some(error) = graph.heap.modules[module].error().cloned() else {
                    unreachable!("errored module without an error")
                };
                return Err(abort(graph, module, error));
            }
            _ => {
                let error = invalid_state(graph, module, "module is not linked");
                return Err(abort(graph, module, error));
            }
        }
        match execute_module(graph, module) {
            Ok(DynamicModuleCompletion::Completed) => {}
            Ok(DynamicModuleCompletion::Pending) => {
                debug!(module = %graph.key(module), "evaluation suspended");
                if let Some(state) = graph.evaluation.as_mut() {
                    state.suspended = Some(module);
                }
                return Ok(EvaluationStatus::Suspended(module));
            }
            Err(error) => return Err(abort(graph, module, error)),
        }
    }
}

/// Runs the body of a single module.
fn execute_module(
    graph: &mut ModuleGraph,
    module: ModuleIdentifier,
) -> ModuleResult<DynamicModuleCompletion> {
    let host_hooks = graph.host_hooks;
    let record = &mut graph.heap.modules[module];
    let key = record.key.clone();
    let dynamic = record.is_dynamic();
    record.set_evaluating();
    debug!(module = %key, dynamic, "evaluating module");
    let host_error =
        |error: HostError| ModuleError::new(key.clone(), ModuleErrorKind::Host(error));
    if dynamic {
        let completion = host_hooks
            .evaluate_dynamic_module(&key, &mut DynamicModuleExports::new(graph, module))
            .map_err(host_error)?;
        if completion == DynamicModuleCompletion::Pending {
            return Ok(completion);
        }
    } else {
        host_hooks
            .execute_source_module(&key, &mut ModuleExecutionContext::new(graph, module))
            .map_err(host_error)?;
    }
    complete_module(graph, module)?;
    Ok(DynamicModuleCompletion::Completed)
}

/// Checks that the module initialized all of its exports, marks it evaluated
/// and finalizes the namespaces that waited on it. A cycle member is only
/// marked once its cycle root completes, together with the rest of the
/// cycle.
fn complete_module(graph: &mut ModuleGraph, module: ModuleIdentifier) -> ModuleResult<()> {
    let record = &graph.heap.modules[module];
    let env = record.environment.as_ref();
    let validation = match &record.kind {
        ModuleKind::SourceText(source) => source.validate_exports(env),
        ModuleKind::Dynamic(dynamic) => dynamic.validate_placeholders(env),
    };
    validation.map_err(|kind| ModuleError::new(record.key.clone(), kind))?;

    let cycle_root = graph
        .evaluation
        .as_ref()
        .and_then(|state| state.cycle_roots.get(&module).copied());
    if let Some(root) = cycle_root.filter(|&root| root != module) {
        debug!(
            module = %graph.key(module),
            cycle_root = %graph.key(root),
            "waiting on cycle root"
        );
        if let Some(state) = graph.evaluation.as_mut() {
            state.settling.push(module);
        }
        return Ok(());
    }
    let mut settled = Vec::new();
    if cycle_root.is_some()
        && let Some(state) = graph.evaluation.as_mut()
    {
        let EvaluationState {
            cycle_roots,
            settling,
            ..
        } = state;
        settling.retain(|m| {
            let member = cycle_roots.get(m) == Some(&module);
            if member {
                settled.push(*m);
            }
            !member
        });
    }
    settled.push(module);
    for m in settled {
        graph.heap.modules[m].set_evaluated();
        finalize_deferred_namespaces(graph, m);
    }
    Ok(())
}

/// Ends the current evaluation after `module` failed with `error`.
fn abort(graph: &mut ModuleGraph, module: ModuleIdentifier, error: ModuleError) -> ModuleError {
    graph.evaluation = None;
    graph.propagate_failure(module, &error);
    error
}

pub(crate) fn finish_dynamic_module(
    graph: &mut ModuleGraph,
    module: ModuleIdentifier,
    result: Result<(), HostError>,
) -> ModuleResult<EvaluationStatus> {
    let Some(state) = graph
        .evaluation
        .as_mut()
        .filter(|state| state.suspended == Some(module))
    else {
        return Err(invalid_state(
            graph,
            module,
            "module is not awaiting asynchronous completion",
        ));
    };
    state.suspended = None;
    debug!(module = %graph.key(module), ok = result.is_ok(), "dynamic module finished");
    let key = graph.key(module).clone();
    let outcome = result
        .map_err(|error| ModuleError::new(key, ModuleErrorKind::Host(error)))
        .and_then(|()| complete_module(graph, module));
    if let Err(error) = outcome {
        return Err(abort(graph, module, error));
    }
    resume(graph)
}

pub(crate) fn set_export_binding(
    graph: &mut ModuleGraph,
    module: ModuleIdentifier,
    name: Identifier,
    value: Value,
) -> ModuleResult<()> {
    let record = &graph.heap.modules[module];
    if !record.is_dynamic() {
        return Err(invalid_state(
            graph,
            module,
            "only dynamic modules have their exports set by the host",
        ));
    }
    match record.status() {
        ModuleStatus::Evaluating => {}
        ModuleStatus::Evaluated => {
            let exists = record
                .environment
                .as_ref()
                .is_some_and(|env| env.has_binding(name.as_str()));
            if !exists {
                return Err(invalid_state(
                    graph,
                    module,
                    "cannot add exports to an evaluated dynamic module",
                ));
            }
        }
        _ => {
            return Err(invalid_state(
                graph,
                module,
                "dynamic module is not being evaluated",
            ));
        }
    }
    dynamic_module_records::set_export_binding(&mut graph.heap.modules[module], name, value);
    Ok(())
}

fn invalid_state(
    graph: &ModuleGraph,
    module: ModuleIdentifier,
    reason: &'static str,
) -> ModuleError {
    ModuleError::new(
        graph.key(module).clone(),
        ModuleErrorKind::InvalidModuleState(reason),
    )
}
