//! Serializable program summary: what the analysis exports to tooling

use crate::entity::{ModuleEntity, ModuleKind, ValueEntity};
use crate::genv::{Genv, MethodDef};
use crate::types::{MethodSig, Type};
use serde::Serialize;
use std::fmt;

/// Where a method's or variable's type comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    Declared,
    Inferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordSummary {
    pub name: String,
    pub ty: String,
    pub required: bool,
}

/// One signature in printable form; empty positions show as `untyped`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureSummary {
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub rest: Option<String>,
    pub keywords: Vec<KeywordSummary>,
    pub block: Option<String>,
    pub ret: String,
}

impl SignatureSummary {
    /// Every type position of the signature
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.required
            .iter()
            .chain(&self.optional)
            .chain(&self.rest)
            .chain(self.keywords.iter().map(|k| &k.ty))
            .chain(std::iter::once(&self.ret))
            .map(String::as_str)
    }
}

impl fmt::Display for SignatureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.required.clone();
        parts.extend(self.optional.iter().map(|t| format!("?{t}")));
        if let Some(rest) = &self.rest {
            parts.push(format!("*{rest}"));
        }
        for kw in &self.keywords {
            let prefix = if kw.required { "" } else { "?" };
            parts.push(format!("{prefix}{}: {}", kw.name, kw.ty));
        }
        write!(f, "({})", parts.join(", "))?;
        if let Some(block) = &self.block {
            write!(f, " {block}")?;
        }
        write!(f, " -> {}", self.ret)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodSummary {
    pub name: String,
    pub singleton: bool,
    pub kind: SummaryKind,
    pub signatures: Vec<SignatureSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableSummary {
    pub name: String,
    pub singleton: bool,
    pub ty: String,
    pub kind: SummaryKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSummary {
    pub name: String,
    pub kind: ModuleKind,
    pub superclass: Option<String>,
    pub includes: Vec<String>,
    pub constants: Vec<VariableSummary>,
    pub ivars: Vec<VariableSummary>,
    pub methods: Vec<MethodSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgramSummary {
    pub modules: Vec<ModuleSummary>,
    pub globals: Vec<VariableSummary>,
}

impl ProgramSummary {
    pub fn module(&self, name: &str) -> Option<&ModuleSummary> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl ModuleSummary {
    pub fn method(&self, singleton: bool, name: &str) -> Option<&MethodSummary> {
        self.methods
            .iter()
            .find(|m| m.singleton == singleton && m.name == name)
    }
}

pub(crate) fn build(genv: &Genv) -> ProgramSummary {
    let entities = genv.entities();
    let mut modules = Vec::new();
    for module in entities.modules() {
        let Some(kind) = module.kind() else {
            continue;
        };
        if module.is_builtin() && !module.has_node_contributions() {
            continue;
        }
        modules.push(ModuleSummary {
            name: entities.qualified_name(module.id),
            kind,
            superclass: entities
                .superclass_of(module.id)
                .map(|s| entities.qualified_name(s)),
            includes: entities
                .includes_of(module.id)
                .into_iter()
                .map(|m| entities.qualified_name(m))
                .collect(),
            constants: module
                .consts()
                .filter(|(_, v)| v.exists())
                .map(|(name, v)| variable(genv, name.as_str(), false, v))
                .collect(),
            ivars: [false, true]
                .into_iter()
                .flat_map(|singleton| {
                    module
                        .ivars(singleton)
                        .filter(|(_, v)| v.exists())
                        .map(move |(name, v)| variable(genv, name.as_str(), singleton, v))
                })
                .collect(),
            methods: methods(genv, module),
        });
    }
    let globals = entities
        .globals()
        .map(|(name, v)| variable(genv, name.as_str(), false, v))
        .collect();
    ProgramSummary { modules, globals }
}

fn variable(genv: &Genv, name: &str, singleton: bool, value: &ValueEntity) -> VariableSummary {
    VariableSummary {
        name: name.to_string(),
        singleton,
        ty: value
            .read_vertex()
            .map(|v| genv.show_vertex(v))
            .unwrap_or_else(|| "untyped".to_string()),
        kind: if value.is_declared() {
            SummaryKind::Declared
        } else {
            SummaryKind::Inferred
        },
    }
}

fn methods(genv: &Genv, module: &ModuleEntity) -> Vec<MethodSummary> {
    let mut out = Vec::new();
    for singleton in [false, true] {
        for (name, entity) in module.methods(singleton) {
            // builtin namespaces only show what the program itself adds
            if module.is_builtin() && entity.defs().next().is_none() {
                continue;
            }
            let (kind, signatures) = if entity.is_declared() {
                let sigs: Vec<_> = entity.overloads().map(declared_signature).collect();
                (SummaryKind::Declared, sigs)
            } else {
                let sigs: Vec<_> = entity
                    .defs()
                    .filter_map(|id| genv.method_defs.get(id))
                    .map(|def| inferred_signature(genv, def))
                    .collect();
                (SummaryKind::Inferred, sigs)
            };
            if signatures.is_empty() {
                continue;
            }
            out.push(MethodSummary {
                name: name.to_string(),
                singleton,
                kind,
                signatures,
            });
        }
    }
    out
}

fn declared_signature(sig: &MethodSig) -> SignatureSummary {
    SignatureSummary {
        required: sig.required.iter().map(|t| t.to_string()).collect(),
        optional: sig.optional.iter().map(|t| t.to_string()).collect(),
        rest: sig.rest.as_ref().map(|t| t.to_string()),
        keywords: sig
            .keywords
            .iter()
            .map(|k| KeywordSummary {
                name: k.name.to_string(),
                ty: k.ty.to_string(),
                required: k.required,
            })
            .collect(),
        block: sig.block.as_ref().map(|b| b.to_string()),
        ret: sig.ret.to_string(),
    }
}

fn inferred_signature(genv: &Genv, def: &MethodDef) -> SignatureSummary {
    SignatureSummary {
        required: def.required.iter().map(|v| genv.show_vertex(*v)).collect(),
        optional: def.optional.iter().map(|v| genv.show_vertex(*v)).collect(),
        rest: def.rest.map(|v| genv.show_vertex(v)),
        keywords: def
            .keywords
            .iter()
            .map(|(name, (v, required))| KeywordSummary {
                name: name.to_string(),
                ty: genv.show_vertex(*v),
                required: *required,
            })
            .collect(),
        block: block_signature(genv, def),
        ret: genv.show_vertex(def.ret),
    }
}

/// `{ (A) -> R }` for each closure passed as the method's block
fn block_signature(genv: &Genv, def: &MethodDef) -> Option<String> {
    let shown: Vec<String> = genv
        .graph()
        .types(def.block)
        .filter_map(|ty| match ty {
            Type::Proc(id) => genv.procs.get(*id),
            _ => None,
        })
        .map(|data| {
            let params: Vec<String> = data.params.iter().map(|v| genv.show_vertex(*v)).collect();
            format!("{{ ({}) -> {} }}", params.join(", "), genv.show_vertex(data.ret))
        })
        .collect();
    if shown.is_empty() {
        None
    } else {
        Some(shown.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(required: &[&str], ret: &str) -> SignatureSummary {
        SignatureSummary {
            required: required.iter().map(|s| s.to_string()).collect(),
            optional: Vec::new(),
            rest: None,
            keywords: vec![KeywordSummary {
                name: "key".to_string(),
                ty: "Symbol".to_string(),
                required: false,
            }],
            block: None,
            ret: ret.to_string(),
        }
    }

    #[test]
    fn test_signature_display() {
        let s = sig(&["Integer", "String"], "nil");
        assert_eq!(s.to_string(), "(Integer, String, ?key: Symbol) -> nil");
    }

    #[test]
    fn test_signature_types_cover_every_position() {
        let s = sig(&["Integer"], "untyped");
        let types: Vec<&str> = s.types().collect();
        assert_eq!(types, vec!["Integer", "Symbol", "untyped"]);
    }

    #[test]
    fn test_empty_summary_serializes() {
        let json = ProgramSummary::default().to_json().unwrap();
        assert!(json.contains("\"modules\": []"));
    }
}
