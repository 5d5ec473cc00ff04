// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::ecmascript::{
    builtins::module::{Namespace, data::NamespaceHeapData},
    scripts_and_modules::module::{ModuleIdentifier, ModuleRecord},
};

/// Arena storage for every module record and namespace object of a graph.
///
/// Records are never removed: the whole heap is dropped together with its
/// graph. All cross-references between records are expressed as typed
/// indices into these vectors.
#[derive(Debug, Default)]
pub(crate) struct Heap {
    pub(crate) modules: Vec<ModuleRecord>,
    pub(crate) namespaces: Vec<NamespaceHeapData>,
}

pub(crate) trait CreateHeapData<T, F> {
    /// Moves the given data into the heap and returns its handle.
    fn create(&mut self, data: T) -> F;
}

impl CreateHeapData<ModuleRecord, ModuleIdentifier> for Heap {
    fn create(&mut self, data: ModuleRecord) -> ModuleIdentifier {
        self.modules.push(data);
        ModuleIdentifier::last(&self.modules)
    }
}

impl CreateHeapData<NamespaceHeapData, Namespace> for Heap {
    fn create(&mut self, data: NamespaceHeapData) -> Namespace {
        self.namespaces.push(data);
        Namespace::last(&self.namespaces)
    }
}
