// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Utilities for the modlink cli program.
//!
//! The program evaluates module graphs described by JSON fixtures, with the
//! host side of module execution driven by [`FixtureHostHooks`].

mod fixture;
mod fmt;
mod host_hooks;

pub use fixture::{
    DeclarationFixture, DynamicFixture, ExportFixture, Fixture, FixtureError, ImportFixture,
    ModuleFixture, ReexportFixture, SourceFixture, Statement, json_to_value,
};
pub use fmt::{exit_with_module_error, format_value, print_graph, print_namespaces};
pub use host_hooks::{FixtureHostHooks, evaluate_entry};
