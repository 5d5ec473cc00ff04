// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use ahash::AHashSet;

use crate::ecmascript::{scripts_and_modules::module::ModuleIdentifier, types::Identifier};

#[derive(Debug)]
pub(crate) enum NamespaceState {
    /// Waiting for the listed dynamic modules to finish evaluating. The set
    /// is never empty.
    Pending(AHashSet<ModuleIdentifier>),
    /// \[\[Exports]]
    ///
    /// The resolvable export names, sorted by UTF-16 code units. Never
    /// changes once set.
    Finalized(Box<[Identifier]>),
}

#[derive(Debug)]
pub(crate) struct NamespaceHeapData {
    /// \[\[Module]]
    module: ModuleIdentifier,
    state: NamespaceState,
}

impl NamespaceHeapData {
    pub(crate) fn pending(
        module: ModuleIdentifier,
        dependencies: AHashSet<ModuleIdentifier>,
    ) -> Self {
        debug_assert!(!dependencies.is_empty());
        Self {
            module,
            state: NamespaceState::Pending(dependencies),
        }
    }

    pub(crate) fn finalized(module: ModuleIdentifier, exports: Box<[Identifier]>) -> Self {
        Self {
            module,
            state: NamespaceState::Finalized(exports),
        }
    }

    pub(crate) fn module(&self) -> ModuleIdentifier {
        self.module
    }

    pub(crate) fn is_finalized(&self) -> bool {
        matches!(self.state, NamespaceState::Finalized(_))
    }

    /// The namespace's export names; empty while pending.
    pub(crate) fn exports(&self) -> &[Identifier] {
        match &self.state {
            NamespaceState::Pending(_) => &[],
            NamespaceState::Finalized(exports) => exports,
        }
    }

    pub(crate) fn has_export(&self, name: &Identifier) -> bool {
        self.exports()
            .binary_search_by(|export| export.code_unit_cmp(name))
            .is_ok()
    }

    /// Marks `dependency` as evaluated. Returns true if the namespace no
    /// longer waits on any module and is ready to be finalized.
    pub(crate) fn resolve_dependency(&mut self, dependency: ModuleIdentifier) -> bool {
        match &mut self.state {
            NamespaceState::Pending(dependencies) => {
                dependencies.remove(&dependency);
                dependencies.is_empty()
            }
            NamespaceState::Finalized(_) => false,
        }
    }

    pub(crate) fn finalize(&mut self, exports: Box<[Identifier]>) {
        debug_assert!(
            matches!(&self.state, NamespaceState::Pending(deps) if deps.is_empty()),
            "Attempted to finalize a namespace twice"
        );
        self.state = NamespaceState::Finalized(exports);
    }
}
