// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use ahash::AHashMap;

use crate::ecmascript::{
    execution::ModuleErrorKind,
    scripts_and_modules::module::ModuleIdentifier,
    types::{Identifier, Value},
};

/// ### [9.1.1.5 Module Environment Records](https://tc39.es/ecma262/#sec-module-environment-records)
///
/// The top level bindings of a single module. In addition to normal mutable
/// and immutable bindings, a module environment holds import bindings which
/// provide indirect access to a binding that lives in another module's
/// environment.
///
/// Environments are owned by their module record and live exactly as long as
/// it does.
#[derive(Debug, Default)]
pub(crate) struct ModuleEnvironmentRecord {
    bindings: AHashMap<Identifier, BindingSlot>,
}

#[derive(Debug, Clone)]
pub(crate) enum BindingSlot {
    /// A binding stored in this environment.
    Local(Binding),
    /// ### [CreateImportBinding ( envRec, N, M, N2 )](https://tc39.es/ecma262/#sec-createimportbinding)
    ///
    /// An immutable indirection to the binding `binding_name` in `module`'s
    /// environment. Reads always observe the target's current value.
    Import {
        module: ModuleIdentifier,
        binding_name: Identifier,
    },
}

/// A single named storage cell with an initialization state.
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    /// `None` while the binding is uninitialized.
    value: Option<Value>,
    mutable: bool,
}

impl Binding {
    pub(crate) fn new(mutable: bool) -> Self {
        Self {
            value: None,
            mutable,
        }
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.value.is_some()
    }

    /// Transitions the binding from uninitialized to initialized.
    pub(crate) fn initialize(
        &mut self,
        name: &Identifier,
        value: Value,
    ) -> Result<(), ModuleErrorKind> {
        if self.value.is_some() {
            return Err(ModuleErrorKind::AlreadyInitialized(name.clone()));
        }
        self.value = Some(value);
        Ok(())
    }

    /// Assigns a new value to an initialized mutable binding.
    pub(crate) fn set(&mut self, name: &Identifier, value: Value) -> Result<(), ModuleErrorKind> {
        if !self.mutable {
            return Err(ModuleErrorKind::AlreadyInitialized(name.clone()));
        }
        let Some(slot) = self.value.as_mut() else {
            return Err(ModuleErrorKind::UninitializedBinding(name.clone()));
        };
        *slot = value;
        Ok(())
    }

    /// Initializes the binding, or overwrites its value if it was already
    /// initialized. Only dynamic module exports are rebound this way.
    pub(crate) fn rebind(&mut self, value: Value) {
        debug_assert!(self.mutable);
        self.value = Some(value);
    }

    pub(crate) fn read(&self, name: &Identifier) -> Result<&Value, ModuleErrorKind> {
        self.value
            .as_ref()
            .ok_or_else(|| ModuleErrorKind::UninitializedBinding(name.clone()))
    }
}

impl ModuleEnvironmentRecord {
    pub(crate) fn has_binding(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&BindingSlot> {
        self.bindings.get(name)
    }

    /// Returns the binding stored in this environment, ignoring import
    /// bindings.
    pub(crate) fn get_local(&self, name: &str) -> Option<&Binding> {
        match self.bindings.get(name) {
            Some(BindingSlot::Local(binding)) => Some(binding),
            _ => None,
        }
    }

    pub(crate) fn get_local_mut(&mut self, name: &str) -> Option<&mut Binding> {
        match self.bindings.get_mut(name) {
            Some(BindingSlot::Local(binding)) => Some(binding),
            _ => None,
        }
    }

    /// Names of all bindings stored in this environment, excluding import
    /// bindings.
    pub(crate) fn local_names(&self) -> impl Iterator<Item = &Identifier> {
        self.bindings.iter().filter_map(|(name, slot)| match slot {
            BindingSlot::Local(_) => Some(name),
            BindingSlot::Import { .. } => None,
        })
    }

    /// Creates an uninitialized binding.
    pub(crate) fn declare(
        &mut self,
        name: Identifier,
        mutable: bool,
    ) -> Result<(), ModuleErrorKind> {
        self.insert(name, BindingSlot::Local(Binding::new(mutable)))
    }

    /// Creates an immutable binding that is initialized right away. Used for
    /// namespace imports.
    pub(crate) fn declare_initialized(
        &mut self,
        name: Identifier,
        value: Value,
    ) -> Result<(), ModuleErrorKind> {
        self.insert(
            name,
            BindingSlot::Local(Binding {
                value: Some(value),
                mutable: false,
            }),
        )
    }

    pub(crate) fn create_import_binding(
        &mut self,
        name: Identifier,
        module: ModuleIdentifier,
        binding_name: Identifier,
    ) -> Result<(), ModuleErrorKind> {
        self.insert(
            name,
            BindingSlot::Import {
                module,
                binding_name,
            },
        )
    }

    /// Creates a mutable binding for `name` unless one already exists.
    /// Returns true if a new binding was created.
    pub(crate) fn declare_if_absent(&mut self, name: &Identifier) -> bool {
        if self.bindings.contains_key(name.as_str()) {
            return false;
        }
        self.bindings
            .insert(name.clone(), BindingSlot::Local(Binding::new(true)));
        true
    }

    /// Removes the local binding `name` if it was never initialized.
    pub(crate) fn remove_uninitialized(&mut self, name: &str) -> bool {
        let uninitialized = matches!(
            self.bindings.get(name),
            Some(BindingSlot::Local(binding)) if !binding.is_initialized()
        );
        if uninitialized {
            self.bindings.remove(name);
        }
        uninitialized
    }

    fn insert(&mut self, name: Identifier, slot: BindingSlot) -> Result<(), ModuleErrorKind> {
        if self.bindings.contains_key(name.as_str()) {
            return Err(ModuleErrorKind::DuplicateBinding(name));
        }
        self.bindings.insert(name, slot);
        Ok(())
    }
}
