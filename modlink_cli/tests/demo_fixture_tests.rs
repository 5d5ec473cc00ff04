// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use modlink_cli::{Fixture, FixtureError, FixtureHostHooks, evaluate_entry};
use modlink_vm::ecmascript::{ModuleGraph, ModuleStatus, Options};

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../demos")
        .join(name)
}

#[test]
fn mixed_graph_demo_evaluates() {
    let fixture = Fixture::from_path(&demo("mixed_graph.json")).unwrap();
    let host_hooks = FixtureHostHooks::new(fixture);
    let mut graph = ModuleGraph::new(Options::default(), &host_hooks);
    let entry = evaluate_entry(&mut graph, &host_hooks).unwrap();

    assert_eq!(
        host_hooks.take_output(),
        [
            r#"[app/main.js] readFile = "native""#,
            "[app/main.js] version = 2",
            "[app/main.js] config = [name, ready, version]",
        ]
    );
    for module in graph.topological_order(entry) {
        assert_eq!(graph.status(module), ModuleStatus::Evaluated);
    }
    let order: Vec<String> = graph
        .topological_order(entry)
        .into_iter()
        .map(|module| graph.key(module).to_string())
        .collect();
    assert_eq!(order, ["fs", "lib/legacy.cjs", "app/config.js", "app/main.js"]);
}

#[test]
fn missing_fixture_is_an_io_error() {
    let error = Fixture::from_path(&demo("does_not_exist.json")).unwrap_err();
    assert!(matches!(error, FixtureError::Io { .. }));
}
