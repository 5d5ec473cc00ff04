// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::Identifier;
use crate::ecmascript::builtins::module::Namespace;

/// A value stored in a module binding.
///
/// The engine never interprets values: they are produced by the host while
/// executing module bodies and handed back to the host when bindings are
/// read. Namespace objects are the only values the engine creates itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(Identifier),
    /// A module namespace object.
    Namespace(Namespace),
    /// An opaque handle to a host-owned object, such as a function.
    HostObject(HostObject),
}

/// Opaque handle to an object owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostObject(pub u32);

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_namespace(&self) -> Option<Namespace> {
        match self {
            Value::Namespace(namespace) => Some(*namespace),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<Namespace> for Value {
    fn from(value: Namespace) -> Self {
        Value::Namespace(value)
    }
}

impl From<HostObject> for Value {
    fn from(value: HostObject) -> Self {
        Value::HostObject(value)
    }
}
