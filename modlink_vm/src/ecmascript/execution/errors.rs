// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::ecmascript::{scripts_and_modules::module::ModuleKey, types::Identifier};

pub type ModuleResult<T> = Result<T, ModuleError>;

/// An error raised while building, linking or evaluating a module graph.
///
/// Every error is attributed to the module it originated in. Errors are
/// contagious upwards: an importer of a failed module stores a clone of the
/// same error, so the caller always sees the first failure in traversal order
/// together with the module that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (in module '{module}')")]
pub struct ModuleError {
    module: ModuleKey,
    kind: ModuleErrorKind,
}

impl ModuleError {
    pub(crate) fn new(module: ModuleKey, kind: ModuleErrorKind) -> Self {
        Self { module, kind }
    }

    /// The key of the module this error originated in.
    pub fn module(&self) -> &ModuleKey {
        &self.module
    }

    pub fn kind(&self) -> &ModuleErrorKind {
        &self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleErrorKind {
    /// A module specifier could not be mapped to a module, or the module's
    /// descriptor could not be loaded. Aborts graph construction.
    #[error("cannot resolve module '{specifier}': {reason}")]
    Resolution { specifier: Identifier, reason: String },
    #[error("duplicate binding '{0}'")]
    DuplicateBinding(Identifier),
    /// A binding was initialized twice, or an immutable binding was assigned.
    #[error("binding '{0}' is immutable or already initialized")]
    AlreadyInitialized(Identifier),
    #[error("export '{name}' of module '{target}' is ambiguous")]
    AmbiguousExport { name: Identifier, target: ModuleKey },
    #[error("export '{name}' of module '{target}' is circular")]
    CircularExport { name: Identifier, target: ModuleKey },
    #[error("module '{target}' does not provide an export named '{name}'")]
    UnresolvedExport { name: Identifier, target: ModuleKey },
    /// A dynamic module finished evaluating without setting an export that
    /// some importer resolved, or a source module left one of its own exports
    /// uninitialized.
    #[error("export '{0}' was never initialized")]
    UninitializedExport(Identifier),
    /// A binding was read before it was initialized.
    #[error("binding '{0}' accessed before initialization")]
    UninitializedBinding(Identifier),
    /// A module body referred to a name its environment does not declare.
    #[error("binding '{0}' is not declared")]
    UndeclaredBinding(Identifier),
    /// A host hook failed while executing a module body.
    #[error(transparent)]
    Host(HostError),
    /// A namespace's export names were read before it was finalized while
    /// [`PendingNamespaceAccess::Throw`] is in effect.
    ///
    /// [`PendingNamespaceAccess::Throw`]: super::PendingNamespaceAccess::Throw
    #[error("module namespace is not finalized yet")]
    NamespaceNotReady,
    /// The host drove a module through an operation its current status does
    /// not allow.
    #[error("{0}")]
    InvalidModuleState(&'static str),
}

/// An error returned by a host hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HostError {
    message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
