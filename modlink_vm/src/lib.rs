// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Module linking and evaluation engine.
//!
//! A [`ModuleGraph`](ecmascript::execution::ModuleGraph) hosts two kinds of
//! module records in one dependency graph: source modules, whose import and
//! export declarations are known before execution, and dynamic modules, whose
//! export names are only known once the host has evaluated them. The graph is
//! linked (instantiated) and then evaluated in dependency order, and module
//! namespace objects only become observable once every dynamic module they
//! depend on has finished evaluating.

pub mod ecmascript;
pub(crate) mod heap;
