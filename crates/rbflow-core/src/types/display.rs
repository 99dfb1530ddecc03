//! Rendering types in signature notation

use super::{Elems, LitValue, Type};
use crate::ids::ModId;
use std::fmt;

/// Resolves namespace ids to printable paths
pub trait TypeNames {
    fn module_name(&self, id: ModId) -> String;
}

pub struct TypeDisplay<'a, N: TypeNames + ?Sized> {
    ty: &'a Type,
    names: &'a N,
}

impl Type {
    pub fn display<'a, N: TypeNames + ?Sized>(&'a self, names: &'a N) -> TypeDisplay<'a, N> {
        TypeDisplay { ty: self, names }
    }
}

impl<N: TypeNames + ?Sized> fmt::Display for TypeDisplay<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type(f, self.ty, self.names)
    }
}

fn write_list<N: TypeNames + ?Sized>(
    f: &mut fmt::Formatter<'_>,
    types: &[Type],
    names: &N,
) -> fmt::Result {
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_type(f, ty, names)?;
    }
    Ok(())
}

fn write_type<N: TypeNames + ?Sized>(
    f: &mut fmt::Formatter<'_>,
    ty: &Type,
    names: &N,
) -> fmt::Result {
    match ty {
        Type::Any => f.write_str("untyped"),
        Type::Bot => f.write_str("bot"),
        Type::Instance(m, _) if *m == ModId::NIL_CLASS => f.write_str("nil"),
        Type::Instance(m, _) if *m == ModId::TRUE_CLASS => f.write_str("true"),
        Type::Instance(m, _) if *m == ModId::FALSE_CLASS => f.write_str("false"),
        Type::Instance(m, args) => {
            f.write_str(&names.module_name(*m))?;
            if !args.is_empty() {
                f.write_str("[")?;
                write_list(f, args, names)?;
                f.write_str("]")?;
            }
            Ok(())
        }
        Type::Singleton(m) => write!(f, "singleton({})", names.module_name(*m)),
        Type::Array(a) => match &a.elems {
            Elems::Tuple(ts) if !ts.is_empty() => {
                f.write_str("[")?;
                write_list(f, ts, names)?;
                f.write_str("]")
            }
            elems => {
                let elem = elems.squash();
                write!(f, "{}[", names.module_name(a.base))?;
                if elem.is_bot() {
                    f.write_str("untyped")?;
                } else {
                    write_type(f, &elem, names)?;
                }
                f.write_str("]")
            }
        },
        Type::Hash(h) => {
            let all_symbols = !h.pairs.is_empty()
                && h.pairs
                    .iter()
                    .all(|(k, _)| matches!(k, Type::Symbol(Some(_))));
            if all_symbols {
                f.write_str("{ ")?;
                for (i, (k, v)) in h.pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if let Type::Symbol(Some(name)) = k {
                        write!(f, "{name}: ")?;
                    }
                    write_type(f, v, names)?;
                }
                f.write_str(" }")
            } else if h.pairs.is_empty() {
                write!(f, "{}[untyped, untyped]", names.module_name(h.base))
            } else {
                write!(f, "{}[", names.module_name(h.base))?;
                write_type(f, &h.key_type(), names)?;
                f.write_str(", ")?;
                write_type(f, &h.value_type(), names)?;
                f.write_str("]")
            }
        }
        Type::Record(fields) => {
            f.write_str("{ ")?;
            for (i, (name, t)) in fields.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{name}: ")?;
                write_type(f, t, names)?;
            }
            f.write_str(" }")
        }
        Type::Symbol(Some(s)) => write!(f, ":{s}"),
        Type::Symbol(None) => f.write_str("Symbol"),
        Type::Literal(LitValue::Int(i)) => write!(f, "{i}"),
        Type::Literal(LitValue::Str(s)) => write!(f, "{s:?}"),
        Type::Proc(_) => f.write_str("Proc"),
        Type::Var(n) => write!(f, "{n}"),
        Type::Local(_) => f.write_str("untyped"),
        Type::Union(u) => {
            let has_true = u.members.contains(&Type::true_());
            let has_false = u.members.contains(&Type::false_());
            let mut parts = Vec::new();
            let mut has_nil = false;
            for m in &u.members {
                if m.is_nil() {
                    has_nil = true;
                } else if has_true && has_false && (*m == Type::true_() || *m == Type::false_()) {
                    continue;
                } else {
                    parts.push(m.display(names).to_string());
                }
            }
            if has_true && has_false {
                parts.push("bool".to_string());
            }
            for a in &u.arrays {
                parts.push(Type::Array(Box::new(a.clone())).display(names).to_string());
            }
            for h in &u.hashes {
                parts.push(Type::Hash(Box::new(h.clone())).display(names).to_string());
            }
            if has_nil {
                parts.push("nil".to_string());
            }
            f.write_str(&parts.join(" | "))
        }
    }
}
