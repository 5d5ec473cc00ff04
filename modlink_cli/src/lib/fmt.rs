// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Formatting values, module graphs and errors.

use console::style;
use modlink_vm::ecmascript::{ModuleError, ModuleGraph, ModuleIdentifier, ModuleStatus, Value};

pub fn format_value(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".into(),
        Value::Null => "null".into(),
        Value::Boolean(value) => value.to_string(),
        Value::Number(number) => format_number(*number),
        Value::String(value) => format!("{:?}", value.as_str()),
        Value::Namespace(_) => "[object Module]".into(),
        Value::HostObject(object) => format!("[object HostObject#{}]", object.0),
    }
}

fn format_number(number: f64) -> String {
    if number.is_nan() {
        "NaN".into()
    } else if number.is_infinite() {
        if number > 0.0 { "Infinity" } else { "-Infinity" }.into()
    } else if number.fract() == 0.0 && number.abs() < 1e21 {
        // Integral values print without a fractional part, and -0 prints as 0.
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

fn format_status(status: ModuleStatus) -> String {
    let name = match status {
        ModuleStatus::Unlinked => "unlinked",
        ModuleStatus::Instantiating => "instantiating",
        ModuleStatus::Instantiated => "instantiated",
        ModuleStatus::Evaluating => "evaluating",
        ModuleStatus::Evaluated => "evaluated",
        ModuleStatus::Errored => "errored",
    };
    match status {
        ModuleStatus::Evaluated => style(name).green().to_string(),
        ModuleStatus::Errored => style(name).red().to_string(),
        _ => style(name).yellow().to_string(),
    }
}

/// Prints every module reachable from `entry` in evaluation order, with its
/// kind, status and dependencies.
pub fn print_graph(graph: &ModuleGraph, entry: ModuleIdentifier) {
    for module in graph.topological_order(entry) {
        let kind = if graph.is_dynamic(module) {
            "dynamic"
        } else {
            "source"
        };
        println!(
            "{} {} {}",
            style(graph.key(module)).bold(),
            style(kind).dim(),
            format_status(graph.status(module))
        );
        for &dependency in graph.dependencies(module) {
            println!("  {} {}", style("->").dim(), graph.key(dependency));
        }
    }
}

/// Prints the namespace of every module reachable from `entry`.
pub fn print_namespaces(graph: &mut ModuleGraph, entry: ModuleIdentifier) {
    for module in graph.topological_order(entry) {
        if graph.status(module) != ModuleStatus::Evaluated {
            continue;
        }
        let namespace = graph.module_namespace(module);
        let Ok(names) = graph.namespace_export_names(namespace) else {
            continue;
        };
        let entries: Vec<String> = names
            .iter()
            .map(|name| {
                let value = graph
                    .namespace_get(namespace, name.as_str())
                    .map(|value| format_value(&value))
                    .unwrap_or_else(|_| "<uninitialized>".into());
                format!("{name}: {value}")
            })
            .collect();
        println!(
            "{} {{ {} }}",
            style(graph.key(module)).bold(),
            entries.join(", ")
        );
    }
}

/// Prints an uncaught module error and exits the program.
pub fn exit_with_module_error(error: &ModuleError) -> ! {
    eprintln!("{} {error}", style("Uncaught exception:").red().bold());
    std::process::exit(1);
}
