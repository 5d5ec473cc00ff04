// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::{cell::RefCell, collections::HashMap};

use modlink_vm::ecmascript::{
    DynamicModuleCompletion, DynamicModuleExports, EvaluationStatus, HostError, HostHooks,
    ModuleDescriptor, ModuleErrorKind, ModuleExecutionContext, ModuleGraph, ModuleKey,
    ModuleStatus, Options, PendingNamespaceAccess, SourceModuleDescriptor, Value,
};

/// A step of a source module body.
#[derive(Debug, Clone)]
enum Op {
    /// Initialize a local binding; failing fails the body.
    Init(&'static str, Value),
    /// Assign a binding and record the error if that fails.
    Set(&'static str, Value),
    /// Record the value of a binding.
    Read(&'static str),
    /// Record the export names of the namespace held by a binding.
    ReadNamespaceNames(&'static str),
    Throw(&'static str),
}

#[derive(Debug, Clone, Default)]
struct Dynamic {
    exports: Vec<(&'static str, Value)>,
    pending: bool,
}

#[derive(Debug, Default)]
struct TestHost {
    sources: HashMap<&'static str, (SourceModuleDescriptor, Vec<Op>)>,
    dynamics: HashMap<&'static str, Dynamic>,
    evaluated: RefCell<Vec<String>>,
    observed: RefCell<Vec<String>>,
}

impl TestHost {
    fn source(
        mut self,
        key: &'static str,
        descriptor: SourceModuleDescriptor,
        body: Vec<Op>,
    ) -> Self {
        self.sources.insert(key, (descriptor, body));
        self
    }

    fn dynamic(mut self, key: &'static str, exports: Vec<(&'static str, Value)>) -> Self {
        self.dynamics.insert(
            key,
            Dynamic {
                exports,
                pending: false,
            },
        );
        self
    }

    fn pending_dynamic(
        mut self,
        key: &'static str,
        exports: Vec<(&'static str, Value)>,
    ) -> Self {
        self.dynamics.insert(
            key,
            Dynamic {
                exports,
                pending: true,
            },
        );
        self
    }

    fn evaluated(&self) -> Vec<String> {
        self.evaluated.borrow().clone()
    }

    fn observed(&self) -> Vec<String> {
        self.observed.borrow().clone()
    }

    fn observe(&self, observation: String) {
        self.observed.borrow_mut().push(observation);
    }
}

impl HostHooks for TestHost {
    fn resolve_module_specifier(
        &self,
        _referrer: Option<&ModuleKey>,
        specifier: &str,
    ) -> Result<ModuleKey, HostError> {
        Ok(specifier.into())
    }

    fn load_module_descriptor(&self, key: &ModuleKey) -> Result<ModuleDescriptor, HostError> {
        if let Some((descriptor, _)) = self.sources.get(key.as_str()) {
            return Ok(ModuleDescriptor::Source(descriptor.clone()));
        }
        if self.dynamics.contains_key(key.as_str()) {
            return Ok(ModuleDescriptor::Dynamic);
        }
        Err(HostError::new(format!("no module named '{key}'")))
    }

    fn execute_source_module(
        &self,
        key: &ModuleKey,
        context: &mut ModuleExecutionContext<'_, '_>,
    ) -> Result<(), HostError> {
        self.evaluated.borrow_mut().push(key.to_string());
        let (_, body) = &self.sources[key.as_str()];
        for op in body {
            match op {
                Op::Init(name, value) => context
                    .initialize_binding(name, value.clone())
                    .map_err(|error| HostError::new(error.to_string()))?,
                Op::Set(name, value) => {
                    if let Err(error) = context.set_mutable_binding(name, value.clone()) {
                        self.observe(format!("{key}: {}", error.kind()));
                    }
                }
                Op::Read(name) => {
                    let observation = match context.get_binding_value(name) {
                        Ok(value) => format!("{key}: {name} = {value:?}"),
                        Err(error) => format!("{key}: {}", error.kind()),
                    };
                    self.observe(observation);
                }
                Op::ReadNamespaceNames(local) => {
                    let namespace = context
                        .get_binding_value(local)
                        .ok()
                        .and_then(|value| value.as_namespace())
                        .ok_or_else(|| HostError::new("not a namespace"))?;
                    let observation = match context.namespace_export_names(namespace) {
                        Ok(names) => {
                            let names: Vec<&str> = names.iter().map(|name| name.as_str()).collect();
                            format!("{key}: {local} = {names:?}")
                        }
                        Err(error) => format!("{key}: {}", error.kind()),
                    };
                    self.observe(observation);
                }
                Op::Throw(message) => return Err(HostError::new(*message)),
            }
        }
        Ok(())
    }

    fn evaluate_dynamic_module(
        &self,
        key: &ModuleKey,
        exports: &mut DynamicModuleExports<'_, '_>,
    ) -> Result<DynamicModuleCompletion, HostError> {
        self.evaluated.borrow_mut().push(key.to_string());
        let dynamic = &self.dynamics[key.as_str()];
        for (name, value) in &dynamic.exports {
            exports.set_export_binding(name, value.clone());
        }
        Ok(if dynamic.pending {
            DynamicModuleCompletion::Pending
        } else {
            DynamicModuleCompletion::Completed
        })
    }
}

fn host_fn(id: u32) -> Value {
    Value::HostObject(modlink_vm::ecmascript::HostObject(id))
}

#[test]
fn dynamic_module_provides_requested_import() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new().import("readFile", "fs", "readFile"),
            vec![Op::Read("readFile")],
        )
        .dynamic("fs", vec![("readFile", host_fn(1))]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    assert_eq!(graph.evaluate(main), Ok(EvaluationStatus::Completed));

    let fs = graph.module("fs").unwrap();
    assert_eq!(graph.status(main), ModuleStatus::Evaluated);
    assert_eq!(graph.status(fs), ModuleStatus::Evaluated);
    assert_eq!(host.evaluated(), ["fs", "main"]);
    assert_eq!(host.observed(), ["main: readFile = HostObject(HostObject(1))"]);

    let namespace = graph.module_namespace(fs);
    assert!(graph.namespace_is_finalized(namespace));
    assert_eq!(graph.namespace_export_names(namespace).unwrap(), ["readFile"]);
    assert_eq!(graph.namespace_get(namespace, "readFile"), Ok(host_fn(1)));
    assert_eq!(graph.namespace_get(namespace, "writeFile"), Ok(Value::Undefined));
}

#[test]
fn dynamic_module_must_set_every_resolved_export() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new()
                .import("readFile", "fs", "readFile")
                .import("missing", "fs", "missing"),
            vec![],
        )
        .dynamic("fs", vec![("readFile", host_fn(1))]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    let error = graph.evaluate(main).unwrap_err();
    assert_eq!(error.kind(), &ModuleErrorKind::UninitializedExport("missing".into()));
    assert_eq!(error.module(), "fs");

    let fs = graph.module("fs").unwrap();
    assert_eq!(graph.status(fs), ModuleStatus::Errored);
    assert_eq!(graph.status(main), ModuleStatus::Errored);
    assert_eq!(graph.evaluation_error(main), Some(&error));
    // The importer never ran.
    assert_eq!(host.evaluated(), ["fs"]);
    // Errors are sticky.
    assert_eq!(graph.evaluate(main), Err(error));
}

#[test]
fn namespace_star_exporting_dynamic_module_is_finalized_atomically() {
    let host = TestHost::default()
        .source(
            "main2",
            SourceModuleDescriptor::new().import_namespace("lib", "./lib"),
            vec![Op::ReadNamespaceNames("lib")],
        )
        .source(
            "./lib",
            SourceModuleDescriptor::new().export_star_from("dynamic"),
            vec![],
        )
        .pending_dynamic("dynamic", vec![("first", Value::Number(1.0))]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main2 = graph.load("main2").unwrap();
    graph.link(main2).unwrap();

    let lib = graph.module("./lib").unwrap();
    let dynamic = graph.module("dynamic").unwrap();
    let namespace = graph.module_namespace(lib);
    assert!(!graph.namespace_is_finalized(namespace));
    assert!(graph.namespace_export_names(namespace).unwrap().is_empty());

    assert_eq!(graph.evaluate(main2), Ok(EvaluationStatus::Suspended(dynamic)));
    // One binding set, but the module has not finished.
    assert!(graph.namespace_export_names(namespace).unwrap().is_empty());
    assert!(!graph.namespace_has(namespace, "first"));

    graph.set_export_binding(dynamic, "second", 2.0).unwrap();
    assert_eq!(
        graph.finish_dynamic_module(dynamic, Ok(())),
        Ok(EvaluationStatus::Completed)
    );
    assert!(graph.namespace_is_finalized(namespace));
    assert_eq!(graph.namespace_export_names(namespace).unwrap(), ["first", "second"]);
    assert_eq!(graph.namespace_get(namespace, "second"), Ok(Value::Number(2.0)));
    assert_eq!(host.observed(), [r#"main2: lib = ["first", "second"]"#]);
}

fn cyclic_namespace_host() -> TestHost {
    TestHost::default()
        .source(
            "a",
            SourceModuleDescriptor::new()
                .request("b")
                .export_star_from("dyn")
                .declare("own", false)
                .export("own", "own"),
            vec![Op::Init("own", Value::Boolean(true))],
        )
        .source(
            "b",
            SourceModuleDescriptor::new().import_namespace("a", "a"),
            vec![Op::ReadNamespaceNames("a")],
        )
        .dynamic("dyn", vec![("fromDyn", Value::Null)])
}

#[test]
fn cyclic_namespace_read_before_dynamic_evaluation_is_empty() {
    let host = cyclic_namespace_host();
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let a = graph.load("a").unwrap();
    assert_eq!(graph.evaluate(a), Ok(EvaluationStatus::Completed));
    assert_eq!(host.evaluated(), ["b", "dyn", "a"]);
    assert_eq!(host.observed(), ["b: a = []"]);
    let b = graph.module("b").unwrap();
    assert_eq!(graph.status(a), ModuleStatus::Evaluated);
    assert_eq!(graph.status(b), ModuleStatus::Evaluated);

    let namespace = graph.module_namespace(a);
    assert_eq!(graph.namespace_export_names(namespace).unwrap(), ["fromDyn", "own"]);
    assert_eq!(graph.namespace_get(namespace, "own"), Ok(Value::Boolean(true)));
}

#[test]
fn cyclic_namespace_read_can_be_made_to_throw() {
    let host = cyclic_namespace_host();
    let options = Options {
        pending_namespace_access: PendingNamespaceAccess::Throw,
        ..Default::default()
    };
    let mut graph = ModuleGraph::new(options, &host);
    let a = graph.load("a").unwrap();
    assert_eq!(graph.evaluate(a), Ok(EvaluationStatus::Completed));
    assert_eq!(
        host.observed(),
        [format!("b: {}", ModuleErrorKind::NamespaceNotReady)]
    );
    let namespace = graph.module_namespace(a);
    assert_eq!(graph.namespace_export_names(namespace).unwrap(), ["fromDyn", "own"]);
}

#[test]
fn shared_dependency_is_evaluated_once() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new().request("left").request("right"),
            vec![],
        )
        .source("left", SourceModuleDescriptor::new().request("shared"), vec![])
        .source("right", SourceModuleDescriptor::new().request("shared"), vec![])
        .source("shared", SourceModuleDescriptor::new(), vec![]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    let order: Vec<&str> = graph
        .topological_order(main)
        .into_iter()
        .map(|module| graph.key(module).as_str())
        .collect();
    assert_eq!(order, ["shared", "left", "right", "main"]);

    assert_eq!(graph.evaluate(main), Ok(EvaluationStatus::Completed));
    assert_eq!(graph.evaluate(main), Ok(EvaluationStatus::Completed));
    let right = graph.module("right").unwrap();
    assert_eq!(graph.evaluate(right), Ok(EvaluationStatus::Completed));
    assert_eq!(host.evaluated(), ["shared", "left", "right", "main"]);
}

fn ambiguous_star_host(first: &'static str, second: &'static str) -> TestHost {
    TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new().import("x", "hub", "x"),
            vec![],
        )
        .source(
            "hub",
            SourceModuleDescriptor::new()
                .export_star_from(first)
                .export_star_from(second),
            vec![],
        )
        .source(
            "one",
            SourceModuleDescriptor::new().declare("x", false).export("x", "x"),
            vec![Op::Init("x", Value::Number(1.0))],
        )
        .source(
            "two",
            SourceModuleDescriptor::new().declare("x", false).export("x", "x"),
            vec![Op::Init("x", Value::Number(2.0))],
        )
}

#[test]
fn conflicting_star_exports_are_ambiguous() {
    for (first, second) in [("one", "two"), ("two", "one")] {
        let host = ambiguous_star_host(first, second);
        let mut graph = ModuleGraph::new(Options::default(), &host);
        let main = graph.load("main").unwrap();
        let error = graph.link(main).unwrap_err();
        assert_eq!(
            error.kind(),
            &ModuleErrorKind::AmbiguousExport {
                name: "x".into(),
                target: "hub".into()
            }
        );
        assert_eq!(error.module(), "main");
        assert_eq!(graph.status(main), ModuleStatus::Errored);
        // Modules not importing the failed one are left unlinked.
        let hub = graph.module("hub").unwrap();
        assert_eq!(graph.status(hub), ModuleStatus::Unlinked);
        // The namespace of the hub leaves the ambiguous name out.
        let namespace = graph.module_namespace(hub);
        assert!(graph.namespace_export_names(namespace).unwrap().is_empty());
    }
}

#[test]
fn same_binding_through_two_stars_is_not_ambiguous() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new().import("x", "hub", "x"),
            vec![Op::Read("x")],
        )
        .source(
            "hub",
            SourceModuleDescriptor::new()
                .export_star_from("one")
                .export_star_from("relay"),
            vec![],
        )
        .source("relay", SourceModuleDescriptor::new().export_star_from("one"), vec![])
        .source(
            "one",
            SourceModuleDescriptor::new().declare("x", false).export("x", "x"),
            vec![Op::Init("x", Value::Number(1.0))],
        );
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    assert_eq!(graph.evaluate(main), Ok(EvaluationStatus::Completed));
    assert_eq!(host.observed(), ["main: x = Number(1.0)"]);
}

#[test]
fn circular_star_branch_does_not_hide_sibling_export() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new().import("x", "a", "x"),
            vec![Op::Read("x")],
        )
        .source(
            "a",
            SourceModuleDescriptor::new()
                .export_star_from("b")
                .export_star_from("c"),
            vec![],
        )
        .source("b", SourceModuleDescriptor::new().export_star_from("a"), vec![])
        .dynamic("c", vec![("x", Value::from("from c"))]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    assert_eq!(graph.evaluate(main), Ok(EvaluationStatus::Completed));
    assert_eq!(host.observed(), [r#"main: x = String("from c")"#]);
}

#[test]
fn circular_indirect_export_fails_to_link() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new().import("x", "a", "x"),
            vec![],
        )
        .source("a", SourceModuleDescriptor::new().export_from("x", "b", "x"), vec![])
        .source("b", SourceModuleDescriptor::new().export_from("x", "a", "x"), vec![]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    let error = graph.evaluate(main).unwrap_err();
    assert_eq!(
        error.kind(),
        &ModuleErrorKind::CircularExport {
            name: "x".into(),
            target: "b".into()
        }
    );
    for key in ["main", "a", "b"] {
        let module = graph.module(key).unwrap();
        assert_eq!(graph.status(module), ModuleStatus::Errored);
    }
    assert!(host.evaluated().is_empty());
}

#[test]
fn default_export_is_not_forwarded_by_star() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new().import("value", "hub", "default"),
            vec![],
        )
        .source("hub", SourceModuleDescriptor::new().export_star_from("lib"), vec![])
        .source(
            "lib",
            SourceModuleDescriptor::new()
                .declare("value", false)
                .export("default", "value"),
            vec![Op::Init("value", Value::Null)],
        );
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    let error = graph.link(main).unwrap_err();
    assert_eq!(
        error.kind(),
        &ModuleErrorKind::UnresolvedExport {
            name: "default".into(),
            target: "hub".into()
        }
    );
    let lib = graph.module("lib").unwrap();
    assert_eq!(graph.status(lib), ModuleStatus::Unlinked);
}

#[test]
fn import_colliding_with_declaration_is_a_duplicate_binding() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new()
                .declare("x", true)
                .import("x", "dep", "x"),
            vec![],
        )
        .dynamic("dep", vec![("x", Value::Null)]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    let error = graph.link(main).unwrap_err();
    assert_eq!(error.kind(), &ModuleErrorKind::DuplicateBinding("x".into()));
    assert_eq!(error.module(), "main");
    let dep = graph.module("dep").unwrap();
    assert_eq!(graph.status(dep), ModuleStatus::Unlinked);
}

#[test]
fn unknown_module_fails_to_load() {
    let host = TestHost::default().source(
        "main",
        SourceModuleDescriptor::new().import("x", "nowhere", "x"),
        vec![],
    );
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let error = graph.load("main").unwrap_err();
    assert!(matches!(
        error.kind(),
        ModuleErrorKind::Resolution { specifier, .. } if specifier == "nowhere"
    ));
    assert_eq!(error.module(), "main");
}

#[test]
fn host_error_fails_importers_but_not_evaluated_modules() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new().request("ok").request("broken"),
            vec![],
        )
        .source("ok", SourceModuleDescriptor::new(), vec![])
        .source("broken", SourceModuleDescriptor::new(), vec![Op::Throw("boom")]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    let error = graph.evaluate(main).unwrap_err();
    assert_eq!(error.kind(), &ModuleErrorKind::Host(HostError::new("boom")));
    assert_eq!(error.module(), "broken");
    assert_eq!(graph.status(main), ModuleStatus::Errored);
    let ok = graph.module("ok").unwrap();
    assert_eq!(graph.status(ok), ModuleStatus::Evaluated);
    assert_eq!(host.evaluated(), ["ok", "broken"]);
}

#[test]
fn later_entry_importing_errored_module_fails() {
    let host = TestHost::default()
        .source("first", SourceModuleDescriptor::new().request("broken"), vec![])
        .source("second", SourceModuleDescriptor::new().request("broken"), vec![])
        .source("broken", SourceModuleDescriptor::new(), vec![Op::Throw("boom")]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let first = graph.load("first").unwrap();
    let error = graph.evaluate(first).unwrap_err();
    let second = graph.load("second").unwrap();
    assert_eq!(graph.evaluate(second), Err(error));
    assert_eq!(graph.status(second), ModuleStatus::Errored);
    assert_eq!(host.evaluated(), ["broken"]);
}

#[test]
fn source_module_must_initialize_its_exports() {
    let host = TestHost::default().source(
        "main",
        SourceModuleDescriptor::new()
            .declare("answer", false)
            .export("answer", "answer"),
        vec![],
    );
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    let error = graph.evaluate(main).unwrap_err();
    assert_eq!(error.kind(), &ModuleErrorKind::UninitializedExport("answer".into()));
}

#[test]
fn imports_observe_live_bindings() {
    let host = TestHost::default()
        .source(
            "counter",
            SourceModuleDescriptor::new().declare("count", true).export("count", "count"),
            vec![
                Op::Init("count", Value::Number(0.0)),
                Op::Set("count", Value::Number(1.0)),
            ],
        )
        .source(
            "main",
            SourceModuleDescriptor::new().import("count", "counter", "count"),
            vec![
                Op::Read("count"),
                Op::Set("count", Value::Number(5.0)),
                Op::Read("undeclared"),
            ],
        );
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    assert_eq!(graph.evaluate(main), Ok(EvaluationStatus::Completed));
    assert_eq!(
        host.observed(),
        [
            "main: count = Number(1.0)".to_string(),
            format!("main: {}", ModuleErrorKind::AlreadyInitialized("count".into())),
            format!("main: {}", ModuleErrorKind::UndeclaredBinding("undeclared".into())),
        ]
    );
}

#[test]
fn dynamic_exports_can_be_rebound_after_evaluation() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new().import("state", "dyn", "state"),
            vec![],
        )
        .dynamic("dyn", vec![("state", Value::from("initial"))]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    graph.evaluate(main).unwrap();
    let dynamic = graph.module("dyn").unwrap();
    assert_eq!(graph.get_binding_value(main, "state"), Ok(Value::from("initial")));

    graph.set_export_binding(dynamic, "state", "updated").unwrap();
    assert_eq!(graph.get_binding_value(main, "state"), Ok(Value::from("updated")));

    let error = graph.set_export_binding(dynamic, "other", true).unwrap_err();
    assert!(matches!(error.kind(), ModuleErrorKind::InvalidModuleState(_)));
    let error = graph.set_export_binding(main, "state", true).unwrap_err();
    assert!(matches!(error.kind(), ModuleErrorKind::InvalidModuleState(_)));
}

#[test]
fn suspended_evaluation_resumes_in_order() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new()
                .import("value", "slow", "value")
                .request("after"),
            vec![Op::Read("value")],
        )
        .pending_dynamic("slow", vec![])
        .source("after", SourceModuleDescriptor::new(), vec![]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    let slow = graph.module("slow").unwrap();
    let after = graph.module("after").unwrap();

    assert_eq!(graph.evaluate(main), Ok(EvaluationStatus::Suspended(slow)));
    assert_eq!(graph.status(slow), ModuleStatus::Evaluating);
    assert_eq!(graph.evaluate(main), Ok(EvaluationStatus::Suspended(slow)));
    assert!(graph.finish_dynamic_module(after, Ok(())).is_err());
    assert_eq!(host.evaluated(), ["slow"]);

    graph.set_export_binding(slow, "value", 42.0).unwrap();
    assert_eq!(
        graph.finish_dynamic_module(slow, Ok(())),
        Ok(EvaluationStatus::Completed)
    );
    assert_eq!(host.evaluated(), ["slow", "after", "main"]);
    assert_eq!(host.observed(), ["main: value = Number(42.0)"]);
}

#[test]
fn suspended_dynamic_module_can_fail() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new().import("value", "slow", "value"),
            vec![],
        )
        .pending_dynamic("slow", vec![]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    let slow = graph.module("slow").unwrap();
    assert_eq!(graph.evaluate(main), Ok(EvaluationStatus::Suspended(slow)));
    let error = graph
        .finish_dynamic_module(slow, Err(HostError::new("network down")))
        .unwrap_err();
    assert_eq!(error.kind(), &ModuleErrorKind::Host(HostError::new("network down")));
    assert_eq!(error.module(), "slow");
    assert_eq!(graph.status(main), ModuleStatus::Errored);
    assert_eq!(graph.status(slow), ModuleStatus::Errored);
}

#[test]
fn namespace_exports_are_sorted_by_code_units() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new().import_namespace("ns", "lib"),
            vec![Op::ReadNamespaceNames("ns")],
        )
        .dynamic(
            "lib",
            vec![
                ("\u{FF61}", Value::Null),
                ("\u{1F600}", Value::Null),
                ("b", Value::Null),
            ],
        );
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    graph.evaluate(main).unwrap();
    assert_eq!(host.observed(), [r#"main: ns = ["b", "😀", "｡"]"#]);
}

#[test]
fn export_star_as_namespace_is_resolvable() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new().import("utils", "hub", "utils"),
            vec![Op::ReadNamespaceNames("utils")],
        )
        .source(
            "hub",
            SourceModuleDescriptor::new().export_namespace_from("utils", "utils"),
            vec![],
        )
        .source(
            "utils",
            SourceModuleDescriptor::new().declare("helper", false).export("helper", "helper"),
            vec![Op::Init("helper", host_fn(7))],
        );
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    graph.evaluate(main).unwrap();
    assert_eq!(host.observed(), [r#"main: utils = ["helper"]"#]);

    let hub = graph.module("hub").unwrap();
    let utils = graph.module("utils").unwrap();
    let hub_namespace = graph.module_namespace(hub);
    let value = graph.namespace_get(hub_namespace, "utils").unwrap();
    let utils_namespace = value.as_namespace().unwrap();
    assert_eq!(graph.namespace_module(utils_namespace), utils);
    assert_eq!(graph.namespace_get(utils_namespace, "helper"), Ok(host_fn(7)));
}

#[test]
fn unresolvable_request_fails_the_requesting_module() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new()
                .import("x", "a", "x")
                .export_star_from("nowhere"),
            vec![],
        )
        .source(
            "a",
            SourceModuleDescriptor::new()
                .request("b")
                .declare("x", false)
                .export("x", "x"),
            vec![Op::Init("x", Value::Number(1.0))],
        )
        .source("b", SourceModuleDescriptor::new(), vec![]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let error = graph.load("main").unwrap_err();
    assert!(matches!(
        error.kind(),
        ModuleErrorKind::Resolution { specifier, .. } if specifier == "nowhere"
    ));

    let main = graph.module("main").unwrap();
    assert_eq!(graph.status(main), ModuleStatus::Errored);
    assert_eq!(graph.evaluation_error(main), Some(&error));
    assert_eq!(graph.link(main), Err(error.clone()));
    assert_eq!(graph.evaluate(main), Err(error));
    let namespace = graph.module_namespace(main);
    assert!(graph.namespace_export_names(namespace).unwrap().is_empty());

    // `a` was added before the failure but its own requests were not loaded.
    let a = graph.module("a").unwrap();
    assert!(graph.module("b").is_none());
    let error = graph.link(a).unwrap_err();
    assert!(matches!(error.kind(), ModuleErrorKind::InvalidModuleState(_)));
    assert_eq!(graph.status(a), ModuleStatus::Unlinked);

    assert_eq!(graph.load("a"), Ok(a));
    assert_eq!(graph.evaluate(a), Ok(EvaluationStatus::Completed));
    assert_eq!(host.evaluated(), ["b", "a"]);
}

#[test]
fn failed_link_removes_the_placeholders_it_created() {
    let host = TestHost::default()
        .source(
            "main1",
            SourceModuleDescriptor::new().import("a", "dep", "a"),
            vec![Op::Read("a")],
        )
        .source(
            "main2",
            SourceModuleDescriptor::new()
                .import("b", "dep", "b")
                .import("zzz", "lib", "zzz"),
            vec![],
        )
        .source("lib", SourceModuleDescriptor::new(), vec![])
        .dynamic("dep", vec![("a", Value::Number(1.0))]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main1 = graph.load("main1").unwrap();
    graph.link(main1).unwrap();

    let main2 = graph.load("main2").unwrap();
    let error = graph.link(main2).unwrap_err();
    assert_eq!(
        error.kind(),
        &ModuleErrorKind::UnresolvedExport {
            name: "zzz".into(),
            target: "lib".into()
        }
    );
    assert_eq!(graph.status(main2), ModuleStatus::Errored);
    let lib = graph.module("lib").unwrap();
    assert_eq!(graph.status(lib), ModuleStatus::Unlinked);

    // `dep` only has to provide what the successfully linked entry asked for.
    assert_eq!(graph.evaluate(main1), Ok(EvaluationStatus::Completed));
    let dep = graph.module("dep").unwrap();
    assert_eq!(graph.status(dep), ModuleStatus::Evaluated);
    assert_eq!(host.observed(), ["main1: a = Number(1.0)"]);
    let namespace = graph.module_namespace(dep);
    assert_eq!(graph.namespace_export_names(namespace).unwrap(), ["a"]);
}

#[test]
fn failure_inside_cycle_fails_every_member() {
    let host = TestHost::default()
        .source(
            "a",
            SourceModuleDescriptor::new().request("b"),
            vec![Op::Throw("boom")],
        )
        .source("b", SourceModuleDescriptor::new().request("a"), vec![]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let a = graph.load("a").unwrap();
    let error = graph.evaluate(a).unwrap_err();
    assert_eq!(error.module(), "a");
    assert_eq!(host.evaluated(), ["b", "a"]);

    let b = graph.module("b").unwrap();
    assert_eq!(graph.status(a), ModuleStatus::Errored);
    assert_eq!(graph.status(b), ModuleStatus::Errored);
    assert_eq!(graph.evaluation_error(b), Some(&error));
    assert_eq!(graph.evaluate(b), Err(error));
}

#[test]
fn cycle_member_fails_with_later_dependency_of_cycle_root() {
    let host = TestHost::default()
        .source(
            "a",
            SourceModuleDescriptor::new().request("b").request("c"),
            vec![],
        )
        .source("b", SourceModuleDescriptor::new().request("a"), vec![])
        .source("c", SourceModuleDescriptor::new(), vec![Op::Throw("boom")]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let a = graph.load("a").unwrap();
    let error = graph.evaluate(a).unwrap_err();
    assert_eq!(error.module(), "c");
    // `b` ran before `c` failed.
    assert_eq!(host.evaluated(), ["b", "c"]);
    for key in ["a", "b", "c"] {
        let module = graph.module(key).unwrap();
        assert_eq!(graph.status(module), ModuleStatus::Errored, "{key}");
    }
}

#[test]
fn placeholder_through_star_export_must_be_set() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new()
                .import("present", "hub", "present")
                .import("missing", "hub", "missing"),
            vec![],
        )
        .source("hub", SourceModuleDescriptor::new().export_star_from("dyn"), vec![])
        .dynamic("dyn", vec![("present", Value::Null)]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    let error = graph.evaluate(main).unwrap_err();
    assert_eq!(error.kind(), &ModuleErrorKind::UninitializedExport("missing".into()));
    assert_eq!(error.module(), "dyn");
    for key in ["dyn", "hub", "main"] {
        let module = graph.module(key).unwrap();
        assert_eq!(graph.status(module), ModuleStatus::Errored, "{key}");
    }
    assert_eq!(host.evaluated(), ["dyn"]);
}

#[test]
fn dynamic_module_reached_by_two_paths_is_evaluated_once() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new().request("left").request("right"),
            vec![],
        )
        .source(
            "left",
            SourceModuleDescriptor::new().import("readFile", "fs", "readFile"),
            vec![Op::Read("readFile")],
        )
        .source(
            "right",
            SourceModuleDescriptor::new().import_namespace("fs", "fs"),
            vec![Op::ReadNamespaceNames("fs")],
        )
        .dynamic("fs", vec![("readFile", host_fn(1))]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    assert_eq!(graph.evaluate(main), Ok(EvaluationStatus::Completed));
    assert_eq!(host.evaluated(), ["fs", "left", "right", "main"]);
    assert_eq!(
        host.observed(),
        [
            "left: readFile = HostObject(HostObject(1))",
            r#"right: fs = ["readFile"]"#,
        ]
    );
}

fn two_dynamic_modules_host() -> TestHost {
    TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new().import_namespace("lib", "lib"),
            vec![Op::ReadNamespaceNames("lib")],
        )
        .source(
            "lib",
            SourceModuleDescriptor::new()
                .export_star_from("first")
                .export_star_from("second"),
            vec![],
        )
        .pending_dynamic("first", vec![("one", Value::Number(1.0))])
        .pending_dynamic("second", vec![("two", Value::Number(2.0))])
}

#[test]
fn namespace_waits_for_every_dynamic_module() {
    let host = two_dynamic_modules_host();
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    graph.link(main).unwrap();
    let lib = graph.module("lib").unwrap();
    let first = graph.module("first").unwrap();
    let second = graph.module("second").unwrap();
    let namespace = graph.module_namespace(lib);

    assert_eq!(graph.evaluate(main), Ok(EvaluationStatus::Suspended(first)));
    assert_eq!(
        graph.finish_dynamic_module(first, Ok(())),
        Ok(EvaluationStatus::Suspended(second))
    );
    assert_eq!(graph.status(first), ModuleStatus::Evaluated);
    assert!(!graph.namespace_is_finalized(namespace));
    assert!(graph.namespace_export_names(namespace).unwrap().is_empty());
    assert!(!graph.namespace_has(namespace, "one"));
    assert_eq!(graph.namespace_get(namespace, "one"), Ok(Value::Undefined));

    assert_eq!(
        graph.finish_dynamic_module(second, Ok(())),
        Ok(EvaluationStatus::Completed)
    );
    assert!(graph.namespace_is_finalized(namespace));
    assert_eq!(graph.namespace_export_names(namespace).unwrap(), ["one", "two"]);
    assert_eq!(host.observed(), [r#"main: lib = ["one", "two"]"#]);
}

#[test]
fn namespace_waiting_on_failed_dynamic_module_stays_empty() {
    let host = two_dynamic_modules_host();
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    graph.link(main).unwrap();
    let lib = graph.module("lib").unwrap();
    let first = graph.module("first").unwrap();
    let second = graph.module("second").unwrap();
    let namespace = graph.module_namespace(lib);

    assert_eq!(graph.evaluate(main), Ok(EvaluationStatus::Suspended(first)));
    let error = graph
        .finish_dynamic_module(first, Err(HostError::new("offline")))
        .unwrap_err();
    assert_eq!(error.module(), "first");
    assert_eq!(graph.status(lib), ModuleStatus::Errored);
    assert_eq!(graph.status(second), ModuleStatus::Instantiated);
    assert!(!graph.namespace_is_finalized(namespace));
    assert!(graph.namespace_export_names(namespace).unwrap().is_empty());
    assert_eq!(host.evaluated(), ["first"]);
    assert!(host.observed().is_empty());
}

#[test]
fn namespace_export_of_unlinked_module_is_a_namespace() {
    let host = TestHost::default()
        .source(
            "hub",
            SourceModuleDescriptor::new().export_namespace_from("utils", "utils"),
            vec![],
        )
        .source(
            "utils",
            SourceModuleDescriptor::new().declare("helper", false).export("helper", "helper"),
            vec![],
        );
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let hub = graph.load("hub").unwrap();
    let namespace = graph.module_namespace(hub);
    assert_eq!(graph.status(hub), ModuleStatus::Unlinked);
    assert_eq!(graph.namespace_export_names(namespace).unwrap(), ["utils"]);

    let value = graph.namespace_get(namespace, "utils").unwrap();
    let utils_namespace = value.as_namespace().unwrap();
    assert_eq!(graph.namespace_module(utils_namespace), graph.module("utils").unwrap());
    assert_eq!(graph.namespace_export_names(utils_namespace).unwrap(), ["helper"]);
}

#[test]
fn star_exports_of_source_and_unevaluated_dynamic_module_are_ambiguous() {
    let host = TestHost::default()
        .source(
            "main",
            SourceModuleDescriptor::new().import("x", "hub", "x"),
            vec![],
        )
        .source(
            "main2",
            SourceModuleDescriptor::new().import("x", "hub", "x"),
            vec![Op::Read("x")],
        )
        .source(
            "hub",
            SourceModuleDescriptor::new()
                .export_star_from("local")
                .export_star_from("cjs"),
            vec![],
        )
        .source(
            "local",
            SourceModuleDescriptor::new().declare("x", false).export("x", "x"),
            vec![Op::Init("x", Value::Number(1.0))],
        )
        .dynamic("cjs", vec![("y", Value::Null)]);
    let mut graph = ModuleGraph::new(Options::default(), &host);
    let main = graph.load("main").unwrap();
    let error = graph.link(main).unwrap_err();
    // Before evaluation the dynamic module claims `x` as well.
    assert_eq!(
        error.kind(),
        &ModuleErrorKind::AmbiguousExport {
            name: "x".into(),
            target: "hub".into()
        }
    );

    // Once it has been evaluated only the names it set take part.
    let cjs = graph.module("cjs").unwrap();
    assert_eq!(graph.evaluate(cjs), Ok(EvaluationStatus::Completed));
    let main2 = graph.load("main2").unwrap();
    assert_eq!(graph.evaluate(main2), Ok(EvaluationStatus::Completed));
    assert_eq!(host.observed(), ["main2: x = Number(1.0)"]);
    assert_eq!(host.evaluated(), ["cjs", "local", "hub", "main2"]);
}
