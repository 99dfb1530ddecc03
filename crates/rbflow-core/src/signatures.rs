//! Declared signature side table
//!
//! A table lists namespace declarations, method overloads, constant and
//! variable types and type aliases. Paths are absolute; a leading `Object`
//! segment is accepted and ignored. Tables load from JSON or TOML and can be
//! assembled in code with the builder methods.

use crate::entity::ModuleKind;
use crate::error::{CoreError, Result};
use crate::name::Name;
use crate::types::{MethodSig, SigType};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDecl {
    pub path: Vec<Name>,
    pub kind: ModuleKind,
    #[serde(default)]
    pub superclass: Option<Vec<Name>>,
    #[serde(default)]
    pub includes: Vec<Vec<Name>>,
    #[serde(default)]
    pub type_params: Vec<Name>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub path: Vec<Name>,
    pub name: Name,
    #[serde(default)]
    pub singleton: bool,
    pub overloads: Vec<MethodSig>,
}

/// Constant declared inside the namespace at `path`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstDecl {
    #[serde(default)]
    pub path: Vec<Name>,
    pub name: Name,
    pub ty: SigType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IvarDecl {
    pub path: Vec<Name>,
    #[serde(default)]
    pub singleton: bool,
    pub name: Name,
    pub ty: SigType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalDecl {
    pub name: Name,
    pub ty: SigType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasDecl {
    pub name: Name,
    pub ty: SigType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureTable {
    pub modules: Vec<ModuleDecl>,
    pub methods: Vec<MethodDecl>,
    pub constants: Vec<ConstDecl>,
    pub ivars: Vec<IvarDecl>,
    pub globals: Vec<GlobalDecl>,
    pub aliases: Vec<AliasDecl>,
}

fn split_path(path: &str) -> Vec<Name> {
    path.split("::")
        .filter(|seg| !seg.is_empty())
        .map(Name::new)
        .collect()
}

fn show_path(path: &[Name]) -> String {
    if path.is_empty() {
        return "Object".to_string();
    }
    path.iter()
        .map(Name::as_str)
        .collect::<Vec<_>>()
        .join("::")
}

impl SignatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a file; `.toml` files are parsed as TOML, anything else as JSON
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Number of declarations of every kind
    pub fn len(&self) -> usize {
        self.modules.len()
            + self.methods.len()
            + self.constants.len()
            + self.ivars.len()
            + self.globals.len()
            + self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn class(mut self, path: &str, superclass: Option<&str>) -> Self {
        self.modules.push(ModuleDecl {
            path: split_path(path),
            kind: ModuleKind::Class,
            superclass: superclass.map(split_path),
            includes: Vec::new(),
            type_params: Vec::new(),
        });
        self
    }

    pub fn generic_class(mut self, path: &str, superclass: Option<&str>, params: &[&str]) -> Self {
        self = self.class(path, superclass);
        if let Some(decl) = self.modules.last_mut() {
            decl.type_params = params.iter().map(|p| Name::new(p)).collect();
        }
        self
    }

    pub fn module(mut self, path: &str) -> Self {
        self.modules.push(ModuleDecl {
            path: split_path(path),
            kind: ModuleKind::Module,
            superclass: None,
            includes: Vec::new(),
            type_params: Vec::new(),
        });
        self
    }

    /// Add an include to the most recent declaration of `path`
    pub fn include(mut self, path: &str, module: &str) -> Self {
        let target = split_path(path);
        if let Some(decl) = self.modules.iter_mut().rev().find(|m| m.path == target) {
            decl.includes.push(split_path(module));
        }
        self
    }

    pub fn method(self, path: &str, name: &str, sig: MethodSig) -> Self {
        self.overloads(path, name, false, vec![sig])
    }

    pub fn singleton_method(self, path: &str, name: &str, sig: MethodSig) -> Self {
        self.overloads(path, name, true, vec![sig])
    }

    pub fn overloads(mut self, path: &str, name: &str, singleton: bool, sigs: Vec<MethodSig>) -> Self {
        self.methods.push(MethodDecl {
            path: split_path(path),
            name: Name::new(name),
            singleton,
            overloads: sigs,
        });
        self
    }

    pub fn constant(mut self, path: &str, name: &str, ty: SigType) -> Self {
        self.constants.push(ConstDecl {
            path: split_path(path),
            name: Name::new(name),
            ty,
        });
        self
    }

    pub fn ivar(mut self, path: &str, name: &str, ty: SigType) -> Self {
        self.ivars.push(IvarDecl {
            path: split_path(path),
            singleton: false,
            name: Name::new(name),
            ty,
        });
        self
    }

    pub fn global(mut self, name: &str, ty: SigType) -> Self {
        self.globals.push(GlobalDecl {
            name: Name::new(name),
            ty,
        });
        self
    }

    pub fn alias(mut self, name: &str, ty: SigType) -> Self {
        self.aliases.push(AliasDecl {
            name: Name::new(name),
            ty,
        });
        self
    }

    /// Reject declarations the loader cannot place
    pub fn validate(&self) -> Result<()> {
        let invalid = |target: String, detail: &str| CoreError::InvalidSignature {
            target,
            detail: detail.to_string(),
        };
        for m in &self.modules {
            if m.path.is_empty() || m.path.iter().all(|seg| seg == "Object") {
                return Err(invalid(show_path(&m.path), "namespace path is empty"));
            }
            if m.kind == ModuleKind::Module && m.superclass.is_some() {
                return Err(invalid(show_path(&m.path), "a module cannot have a superclass"));
            }
        }
        for m in &self.methods {
            let target = format!("{}#{}", show_path(&m.path), m.name);
            if m.name.as_str().is_empty() {
                return Err(invalid(target, "method name is empty"));
            }
            if m.overloads.is_empty() {
                return Err(invalid(target, "no overloads given"));
            }
        }
        for c in &self.constants {
            if c.name.as_str().is_empty() {
                return Err(invalid(show_path(&c.path), "constant name is empty"));
            }
        }
        for v in &self.ivars {
            if !v.name.as_str().starts_with('@') {
                return Err(invalid(
                    format!("{}#{}", show_path(&v.path), v.name),
                    "instance variable names start with `@`",
                ));
            }
        }
        for g in &self.globals {
            if !g.name.as_str().starts_with('$') {
                return Err(invalid(g.name.to_string(), "global names start with `$`"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builder_collects_declarations() {
        let table = SignatureTable::new()
            .class("Point", None)
            .method("Point", "x", MethodSig::new(vec![], SigType::named("Integer")))
            .constant("Point", "ORIGIN", SigType::named("Point"))
            .global("$debug", SigType::Bool);
        assert_eq!(table.len(), 4);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_include_attaches_to_declaration() {
        let table = SignatureTable::new()
            .module("Walkable")
            .class("Dog", None)
            .include("Dog", "Walkable");
        assert_eq!(table.modules[1].includes, vec![split_path("Walkable")]);
    }

    #[test]
    fn test_validate_rejects_missing_overloads() {
        let table = SignatureTable::new().overloads("Foo", "bar", false, vec![]);
        let err = table.validate().unwrap_err();
        assert!(matches!(err, CoreError::InvalidSignature { .. }));
        assert!(err.to_string().contains("Foo#bar"));
    }

    #[test]
    fn test_validate_rejects_bad_variable_names() {
        let table = SignatureTable::new().ivar("Foo", "name", SigType::Any);
        assert!(table.validate().is_err());
        let table = SignatureTable::new().global("debug", SigType::Any);
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "modules": [{ "path": ["Greeter"], "kind": "class" }],
            "methods": [{
                "path": ["Greeter"],
                "name": "greet",
                "overloads": [{
                    "required": [{ "instance": { "path": ["String"] } }],
                    "ret": { "instance": { "path": ["String"] } }
                }]
            }]
        }"#;
        let table = SignatureTable::from_json(json).unwrap();
        assert_eq!(table.methods[0].overloads[0].required.len(), 1);
        assert_eq!(table.methods[0].overloads[0].ret, SigType::named("String"));
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[[modules]]
path = ["Config"]
kind = "module"

[[globals]]
name = "$verbose"
ty = "bool"
"#
        )
        .unwrap();
        let table = SignatureTable::from_file(file.path()).unwrap();
        assert_eq!(table.modules[0].kind, ModuleKind::Module);
        assert_eq!(table.globals[0].ty, SigType::Bool);
    }
}
