// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use clap::{Parser as ClapParser, Subcommand};
use modlink_cli::{
    Fixture, FixtureHostHooks, evaluate_entry, exit_with_module_error, print_graph,
    print_namespaces,
};
use modlink_vm::ecmascript::{ModuleGraph, Options, PendingNamespaceAccess};
use tracing_subscriber::EnvFilter;

/// A module linker for graphs of source and dynamic modules
#[derive(Debug, ClapParser)] // requires `derive` feature
#[command(name = "modlink")]
#[command(about = "A module linker for graphs of source and dynamic modules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Links and evaluates the entry module of a fixture
    Eval {
        /// The fixture describing the module graph
        path: PathBuf,

        #[arg(short, long)]
        verbose: bool,

        /// Reading the export names of a namespace that still waits on a
        /// dynamic module fails instead of yielding no names
        #[arg(long)]
        throw_on_pending_namespace: bool,
    },

    /// Loads and links the entry module of a fixture and prints the graph
    Graph {
        /// The fixture describing the module graph
        path: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    match args.command {
        Command::Eval {
            path,
            verbose,
            throw_on_pending_namespace,
        } => {
            init_tracing(verbose);
            let host_hooks = FixtureHostHooks::new(Fixture::from_path(&path)?);
            let options = Options {
                pending_namespace_access: if throw_on_pending_namespace {
                    PendingNamespaceAccess::Throw
                } else {
                    PendingNamespaceAccess::EmptySet
                },
                trace_evaluation_order: verbose,
            };
            let mut graph = ModuleGraph::new(options, &host_hooks);
            let result = evaluate_entry(&mut graph, &host_hooks);
            for line in host_hooks.take_output() {
                println!("{line}");
            }
            match result {
                Ok(entry) => {
                    if verbose {
                        print_namespaces(&mut graph, entry);
                    }
                }
                Err(error) => exit_with_module_error(&error),
            }
        }
        Command::Graph { path } => {
            init_tracing(false);
            let host_hooks = FixtureHostHooks::new(Fixture::from_path(&path)?);
            let mut graph = ModuleGraph::new(Options::default(), &host_hooks);
            let entry = match graph.load(&host_hooks.fixture().entry) {
                Ok(entry) => entry,
                Err(error) => exit_with_module_error(&error),
            };
            let linked = graph.link(entry);
            print_graph(&graph, entry);
            if let Err(error) = linked {
                exit_with_module_error(&error);
            }
        }
    }
    Ok(())
}
