// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON description of a module graph.
//!
//! A fixture names an entry module and lists every module by key. Source
//! modules declare their imports and exports and carry a small body of
//! statements; dynamic modules list the exports they set when evaluated.
//!
//! ```json
//! {
//!   "entry": "main.js",
//!   "modules": {
//!     "main.js": {
//!       "kind": "source",
//!       "imports": [{ "local": "x", "from": "./dep.cjs", "name": "x" }],
//!       "body": [{ "op": "print", "name": "x" }]
//!     },
//!     "dep.cjs": { "kind": "dynamic", "exports": { "x": 1 } }
//!   }
//! }
//! ```

use std::{collections::BTreeMap, fs, path::Path};

use modlink_vm::ecmascript::{HostError, ModuleDescriptor, SourceModuleDescriptor, Value};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("cannot read fixture '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid fixture '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    /// Specifier of the module to evaluate.
    pub entry: String,
    pub modules: BTreeMap<String, ModuleFixture>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModuleFixture {
    Source(SourceFixture),
    Dynamic(DynamicFixture),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceFixture {
    /// `import "specifier"`
    pub requests: Vec<String>,
    pub declarations: Vec<DeclarationFixture>,
    pub imports: Vec<ImportFixture>,
    pub exports: Vec<ExportFixture>,
    pub reexports: Vec<ReexportFixture>,
    /// `export * from "specifier"`
    pub star_exports: Vec<String>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclarationFixture {
    pub name: String,
    #[serde(default)]
    pub mutable: bool,
}

/// `import { name as local } from "from"`, or `import * as local from
/// "from"` when `name` is absent.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportFixture {
    pub local: String,
    pub from: String,
    pub name: Option<String>,
}

/// `export { local as name }`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportFixture {
    pub name: String,
    /// Defaults to `name`.
    pub local: Option<String>,
}

/// `export { import as name } from "from"`, or `export * as name from
/// "from"` when `import` is absent.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReexportFixture {
    pub name: String,
    pub from: String,
    pub import: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DynamicFixture {
    /// Exports set while the module is evaluated.
    pub exports: BTreeMap<String, serde_json::Value>,
    /// Exports set after the module suspended. Only used by `async` modules.
    pub deferred_exports: BTreeMap<String, serde_json::Value>,
    /// The module completes asynchronously.
    #[serde(rename = "async")]
    pub is_async: bool,
    /// The module fails with this message; after suspending if `async`.
    pub error: Option<String>,
}

/// A step of a source module body.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Statement {
    /// Initializes a declared binding.
    Init {
        name: String,
        #[serde(default)]
        value: serde_json::Value,
    },
    /// Assigns a mutable binding.
    Set {
        name: String,
        value: serde_json::Value,
    },
    /// Prints the current value of a binding.
    Print { name: String },
    /// Prints the exports of the namespace held by a binding.
    PrintNamespace { name: String },
    Throw { message: String },
}

impl Fixture {
    pub fn from_path(path: &Path) -> Result<Self, FixtureError> {
        let display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| FixtureError::Json {
            path: display,
            source,
        })
    }

    /// Maps a specifier to a module key. Relative specifiers are resolved
    /// against the directory of the referrer; anything else is taken as a
    /// key as is.
    pub fn resolve(&self, referrer: Option<&str>, specifier: &str) -> Result<String, HostError> {
        let key = if specifier.starts_with("./") || specifier.starts_with("../") {
            let mut segments: Vec<&str> = referrer
                .map(|referrer| referrer.split('/').collect())
                .unwrap_or_default();
            // Drop the referrer's own file name.
            segments.pop();
            for segment in specifier.split('/') {
                match segment {
                    "." | "" => {}
                    ".." => {
                        if segments.pop().is_none() {
                            return Err(HostError::new(format!(
                                "'{specifier}' escapes the fixture root"
                            )));
                        }
                    }
                    segment => segments.push(segment),
                }
            }
            segments.join("/")
        } else {
            specifier.to_owned()
        };
        if self.modules.contains_key(&key) {
            Ok(key)
        } else {
            Err(HostError::new(format!("no module '{key}' in fixture")))
        }
    }

    pub fn module(&self, key: &str) -> Option<&ModuleFixture> {
        self.modules.get(key)
    }

    pub fn dynamic(&self, key: &str) -> Option<&DynamicFixture> {
        match self.modules.get(key) {
            Some(ModuleFixture::Dynamic(dynamic)) => Some(dynamic),
            _ => None,
        }
    }
}

impl ModuleFixture {
    pub fn descriptor(&self) -> ModuleDescriptor {
        match self {
            ModuleFixture::Source(source) => ModuleDescriptor::Source(source.descriptor()),
            ModuleFixture::Dynamic(_) => ModuleDescriptor::Dynamic,
        }
    }
}

impl SourceFixture {
    pub fn descriptor(&self) -> SourceModuleDescriptor {
        let mut descriptor = SourceModuleDescriptor::new();
        for specifier in &self.requests {
            descriptor = descriptor.request(specifier);
        }
        for declaration in &self.declarations {
            descriptor = descriptor.declare(&declaration.name, declaration.mutable);
        }
        for import in &self.imports {
            descriptor = match &import.name {
                Some(name) => descriptor.import(&import.local, &import.from, name),
                None => descriptor.import_namespace(&import.local, &import.from),
            };
        }
        for export in &self.exports {
            let local = export.local.as_deref().unwrap_or(&export.name);
            descriptor = descriptor.export(&export.name, local);
        }
        for reexport in &self.reexports {
            descriptor = match &reexport.import {
                Some(import) => descriptor.export_from(&reexport.name, &reexport.from, import),
                None => descriptor.export_namespace_from(&reexport.name, &reexport.from),
            };
        }
        for specifier in &self.star_exports {
            descriptor = descriptor.export_star_from(specifier);
        }
        descriptor
    }
}

/// Converts a JSON literal into a binding value. Only primitives can be
/// stored in bindings.
pub fn json_to_value(value: &serde_json::Value) -> Result<Value, HostError> {
    match value {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(value) => Ok(Value::Boolean(*value)),
        serde_json::Value::Number(number) => number
            .as_f64()
            .map(Value::Number)
            .ok_or_else(|| HostError::new(format!("number {number} is out of range"))),
        serde_json::Value::String(value) => Ok(Value::from(value.as_str())),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => Err(HostError::new(
            format!("cannot store {value} in a binding"),
        )),
    }
}
