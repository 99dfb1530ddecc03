//! Declared type descriptors
//!
//! Signatures arrive from an external side table and refer to namespaces by
//! absolute path. They are converted into [`Type`] lazily, at check time,
//! so forward references and later declarations resolve naturally.

use super::{ArrayType, Elems, LitValue, Type};
use crate::ids::ModId;
use crate::name::Name;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigType {
    #[default]
    Any,
    Bot,
    Void,
    Nil,
    Bool,
    #[serde(rename = "self")]
    SelfType,
    Instance {
        path: Vec<Name>,
        #[serde(default)]
        args: Vec<SigType>,
    },
    Singleton(Vec<Name>),
    Tuple(Vec<SigType>),
    Record(Vec<(Name, SigType)>),
    Union(Vec<SigType>),
    Optional(Box<SigType>),
    Var(Name),
    Alias(Name),
    Symbol(Option<Name>),
    Literal(LitValue),
}

impl SigType {
    /// `Integer`, `Foo::Bar`
    pub fn named(path: &str) -> SigType {
        SigType::Instance {
            path: path.split("::").map(Name::new).collect(),
            args: Vec::new(),
        }
    }

    /// `Array[T]`, `Hash[K, V]`
    pub fn generic(path: &str, args: Vec<SigType>) -> SigType {
        SigType::Instance {
            path: path.split("::").map(Name::new).collect(),
            args,
        }
    }

    pub fn var(name: &str) -> SigType {
        SigType::Var(Name::new(name))
    }

    pub fn optional(inner: SigType) -> SigType {
        SigType::Optional(Box::new(inner))
    }
}

fn write_path(f: &mut fmt::Formatter<'_>, path: &[Name]) -> fmt::Result {
    for (i, seg) in path.iter().enumerate() {
        if i > 0 {
            f.write_str("::")?;
        }
        write!(f, "{seg}")?;
    }
    Ok(())
}

fn write_sig_list(f: &mut fmt::Formatter<'_>, types: &[SigType]) -> fmt::Result {
    for (i, t) in types.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{t}")?;
    }
    Ok(())
}

impl fmt::Display for SigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigType::Any => f.write_str("untyped"),
            SigType::Bot => f.write_str("bot"),
            SigType::Void => f.write_str("void"),
            SigType::Nil => f.write_str("nil"),
            SigType::Bool => f.write_str("bool"),
            SigType::SelfType => f.write_str("self"),
            SigType::Instance { path, args } => {
                write_path(f, path)?;
                if !args.is_empty() {
                    f.write_str("[")?;
                    write_sig_list(f, args)?;
                    f.write_str("]")?;
                }
                Ok(())
            }
            SigType::Singleton(path) => {
                f.write_str("singleton(")?;
                write_path(f, path)?;
                f.write_str(")")
            }
            SigType::Tuple(ts) => {
                f.write_str("[")?;
                write_sig_list(f, ts)?;
                f.write_str("]")
            }
            SigType::Record(fields) => {
                f.write_str("{ ")?;
                for (i, (n, t)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{n}: {t}")?;
                }
                f.write_str(" }")
            }
            SigType::Union(ts) => {
                for (i, t) in ts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{t}")?;
                }
                Ok(())
            }
            SigType::Optional(inner) => write!(f, "{inner}?"),
            SigType::Var(n) | SigType::Alias(n) => write!(f, "{n}"),
            SigType::Symbol(Some(s)) => write!(f, ":{s}"),
            SigType::Symbol(None) => f.write_str("Symbol"),
            SigType::Literal(LitValue::Int(i)) => write!(f, "{i}"),
            SigType::Literal(LitValue::Str(s)) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigKeyword {
    pub name: Name,
    pub ty: SigType,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockSig {
    pub params: Vec<SigType>,
    pub ret: SigType,
    pub required: bool,
}

impl fmt::Display for BlockSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.required {
            f.write_str("?")?;
        }
        f.write_str("{ (")?;
        write_sig_list(f, &self.params)?;
        write!(f, ") -> {} }}", self.ret)
    }
}

/// One overload of a declared method
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodSig {
    pub type_params: Vec<Name>,
    pub required: Vec<SigType>,
    pub optional: Vec<SigType>,
    pub rest: Option<SigType>,
    pub keywords: Vec<SigKeyword>,
    pub block: Option<BlockSig>,
    pub ret: SigType,
}

impl MethodSig {
    pub fn new(required: Vec<SigType>, ret: SigType) -> Self {
        Self {
            required,
            ret,
            ..Default::default()
        }
    }

    pub fn with_type_params(mut self, params: &[&str]) -> Self {
        self.type_params = params.iter().map(|p| Name::new(p)).collect();
        self
    }

    pub fn with_optional(mut self, ty: SigType) -> Self {
        self.optional.push(ty);
        self
    }

    pub fn with_rest(mut self, ty: SigType) -> Self {
        self.rest = Some(ty);
        self
    }

    pub fn with_keyword(mut self, name: &str, ty: SigType, required: bool) -> Self {
        self.keywords.push(SigKeyword {
            name: Name::new(name),
            ty,
            required,
        });
        self
    }

    pub fn with_block(mut self, params: Vec<SigType>, ret: SigType, required: bool) -> Self {
        self.block = Some(BlockSig {
            params,
            ret,
            required,
        });
        self
    }

    /// Whether `count` positional arguments fit this overload
    pub fn accepts_positional(&self, count: usize) -> bool {
        count >= self.required.len()
            && (self.rest.is_some() || count <= self.required.len() + self.optional.len())
    }

    /// Formal type of the positional argument at `index`
    pub fn positional(&self, index: usize) -> Option<&SigType> {
        let optional_end = self.required.len() + self.optional.len();
        if index < self.required.len() {
            self.required.get(index)
        } else if index < optional_end {
            self.optional.get(index - self.required.len())
        } else {
            self.rest.as_ref()
        }
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.type_params.is_empty() {
            f.write_str("[")?;
            for (i, p) in self.type_params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{p}")?;
            }
            f.write_str("] ")?;
        }
        let mut parts: Vec<String> = self.required.iter().map(|t| t.to_string()).collect();
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

/// Lookups a signature conversion needs from the environment
pub trait SigResolver {
    /// Namespace at an absolute path
    fn resolve_path(&self, path: &[Name]) -> Option<ModId>;
    fn alias(&self, name: &Name) -> Option<&SigType>;
}

/// Convert a declared descriptor into a lattice type
///
/// `self_type` stands in for `self`. Aliases that expand into themselves
/// truncate to `Any` at the point of recursion.
pub fn sig_to_type<R: SigResolver + ?Sized>(
    sig: &SigType,
    resolver: &R,
    self_type: &Type,
    depth: usize,
) -> Type {
    let mut expanding = Vec::new();
    convert(sig, resolver, self_type, depth, &mut expanding)
}

fn convert<R: SigResolver + ?Sized>(
    sig: &SigType,
    resolver: &R,
    self_type: &Type,
    depth: usize,
    expanding: &mut Vec<Name>,
) -> Type {
    if depth == 0 {
        return Type::Any;
    }
    let inner = depth - 1;
    match sig {
        SigType::Any | SigType::Void => Type::Any,
        SigType::Bot => Type::Bot,
        SigType::Nil => Type::nil(),
        SigType::Bool => Type::bool(),
        SigType::SelfType => self_type.clone(),
        SigType::Instance { path, args } => {
            let Some(module) = resolver.resolve_path(path) else {
                return Type::Any;
            };
            let args: Vec<Type> = args
                .iter()
                .map(|a| convert(a, resolver, self_type, inner, expanding))
                .collect();
            match (module, args.as_slice()) {
                (ModId::ARRAY, [elem]) => Type::Array(Box::new(ArrayType {
                    base: ModId::ARRAY,
                    elems: Elems::Seq(elem.clone()),
                })),
                (ModId::HASH, [k, v]) => Type::hash_of(k.clone(), v.clone()),
                _ => Type::Instance(module, args),
            }
        }
        SigType::Singleton(path) => resolver
            .resolve_path(path)
            .map(Type::Singleton)
            .unwrap_or(Type::Any),
        SigType::Tuple(ts) => Type::tuple(
            ts.iter()
                .map(|t| convert(t, resolver, self_type, inner, expanding))
                .collect(),
        ),
        SigType::Record(fields) => Type::Record(
            fields
                .iter()
                .map(|(n, t)| (n.clone(), convert(t, resolver, self_type, inner, expanding)))
                .collect(),
        ),
        SigType::Union(ts) => Type::union_all(
            ts.iter()
                .map(|t| convert(t, resolver, self_type, depth, expanding))
                .collect::<Vec<_>>(),
        ),
        SigType::Optional(t) => convert(t, resolver, self_type, depth, expanding).union(&Type::nil()),
        SigType::Var(n) => Type::Var(n.clone()),
        SigType::Alias(name) => {
            if expanding.contains(name) {
                return Type::Any;
            }
            let Some(target) = resolver.alias(name) else {
                return Type::Any;
            };
            expanding.push(name.clone());
            let ty = convert(target, resolver, self_type, inner, expanding);
            expanding.pop();
            ty
        }
        SigType::Symbol(s) => Type::Symbol(s.clone()),
        SigType::Literal(v) => Type::Literal(v.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Env {
        aliases: HashMap<Name, SigType>,
    }

    impl SigResolver for Env {
        fn resolve_path(&self, path: &[Name]) -> Option<ModId> {
            match path.iter().map(Name::as_str).collect::<Vec<_>>().as_slice() {
                ["Integer"] => Some(ModId::INTEGER),
                ["String"] => Some(ModId::STRING),
                ["Array"] => Some(ModId::ARRAY),
                _ => None,
            }
        }

        fn alias(&self, name: &Name) -> Option<&SigType> {
            self.aliases.get(name)
        }
    }

    #[test]
    fn test_self_referential_alias_truncates() {
        // type tree = Integer | Array[tree]
        let mut aliases = HashMap::new();
        aliases.insert(
            Name::new("tree"),
            SigType::Union(vec![
                SigType::named("Integer"),
                SigType::generic("Array", vec![SigType::Alias(Name::new("tree"))]),
            ]),
        );
        let env = Env { aliases };
        let ty = sig_to_type(&SigType::Alias(Name::new("tree")), &env, &Type::Any, 8);
        assert_eq!(
            ty,
            Type::integer().union(&Type::array_of(Type::Any))
        );
    }

    #[test]
    fn test_unknown_path_is_any() {
        let env = Env {
            aliases: HashMap::new(),
        };
        assert_eq!(
            sig_to_type(&SigType::named("Missing"), &env, &Type::Any, 5),
            Type::Any
        );
    }

    #[test]
    fn test_display() {
        let sig = MethodSig::new(vec![SigType::named("Integer")], SigType::named("String"))
            .with_optional(SigType::Nil)
            .with_keyword("base", SigType::named("Integer"), false)
            .with_block(vec![SigType::var("Elem")], SigType::Void, true);
        assert_eq!(
            sig.to_string(),
            "(Integer, ?nil, ?base: Integer) { (Elem) -> void } -> String"
        );
    }

    #[test]
    fn test_arity() {
        let sig = MethodSig::new(vec![SigType::Any], SigType::Any).with_optional(SigType::Any);
        assert!(!sig.accepts_positional(0));
        assert!(sig.accepts_positional(2));
        assert!(!sig.accepts_positional(3));
        assert!(sig.clone().with_rest(SigType::Any).accepts_positional(7));
    }
}
