// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::{borrow::Borrow, cmp::Ordering, fmt, rc::Rc};

/// An immutable binding or export name.
///
/// Identifiers are reference counted so that export entries, bindings and
/// namespace export lists can share the same string data. Equality and
/// hashing are by content, which allows lookups by `&str`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Rc<str>);

impl Identifier {
    pub fn new(value: &str) -> Self {
        Self(Rc::from(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is the `"default"` export name, which is never
    /// provided through an `export *` declaration.
    pub(crate) fn is_default(&self) -> bool {
        &*self.0 == "default"
    }

    /// Compares two identifiers by their UTF-16 code units.
    ///
    /// This is the order in which module namespace objects list their export
    /// names. It differs from the `Ord` implementation (UTF-8 byte order) for
    /// strings containing code points outside of the Basic Multilingual Plane.
    pub fn code_unit_cmp(&self, other: &Self) -> Ordering {
        self.0.encode_utf16().cmp(other.0.encode_utf16())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(Rc::from(value))
    }
}

impl PartialEq<str> for Identifier {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Identifier {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}
