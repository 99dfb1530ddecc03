//! Built-in namespaces and their declared methods
//!
//! Namespaces are declared in the order of the reserved [`ModId`]
//! constants, so the loader allocates exactly those identities.

use super::{EntityTable, ModuleKind, Origin};
use crate::ids::ModId;
use crate::name::Name;
use crate::signatures::SignatureTable;
use crate::types::{MethodSig, SigType};

/// Signature batch number used for the core library
pub(crate) const CORE_BATCH: u32 = 0;

fn ty(path: &str) -> SigType {
    SigType::named(path)
}

fn var(name: &str) -> SigType {
    SigType::var(name)
}

fn array_of(elem: SigType) -> SigType {
    SigType::generic("Array", vec![elem])
}

fn hash_of(key: SigType, value: SigType) -> SigType {
    SigType::generic("Hash", vec![key, value])
}

fn sig(required: Vec<SigType>, ret: SigType) -> MethodSig {
    MethodSig::new(required, ret)
}

fn nullary(ret: SigType) -> MethodSig {
    MethodSig::new(Vec::new(), ret)
}

fn variadic(rest: SigType, ret: SigType) -> MethodSig {
    MethodSig::new(Vec::new(), ret).with_rest(rest)
}

/// Declare `names` on `path`, all sharing one signature
fn many(table: SignatureTable, path: &str, names: &[&str], s: MethodSig) -> SignatureTable {
    names
        .iter()
        .fold(table, |t, name| t.method(path, name, s.clone()))
}

/// Object itself cannot be declared through a table path, so its
/// superclass and mixin are attached directly
pub(crate) fn declare_object(entities: &mut EntityTable) {
    if let Some(object) = entities.module_mut(ModId::OBJECT) {
        let origin = Origin::Decl(CORE_BATCH);
        object.builtin = true;
        object.decl_kinds.insert(origin, ModuleKind::Class);
        object
            .declared_superclass
            .insert(origin, vec![Name::new("BasicObject")]);
        object
            .declared_includes
            .insert(origin, vec![vec![Name::new("Kernel")]]);
    }
}

pub(crate) fn core_table() -> SignatureTable {
    let table = SignatureTable::new()
        .class("BasicObject", None)
        .module("Kernel")
        .class("Module", Some("Object"))
        .class("Class", Some("Module"))
        .class("NilClass", Some("Object"))
        .class("TrueClass", Some("Object"))
        .class("FalseClass", Some("Object"))
        .class("Numeric", Some("Object"))
        .class("Integer", Some("Numeric"))
        .class("Float", Some("Numeric"))
        .class("String", Some("Object"))
        .class("Symbol", Some("Object"))
        .generic_class("Array", Some("Object"), &["Elem"])
        .generic_class("Hash", Some("Object"), &["K", "V"])
        .class("Proc", Some("Object"))
        .module("Comparable")
        .module("Enumerable")
        .include("Numeric", "Comparable")
        .include("String", "Comparable")
        .include("Array", "Enumerable")
        .include("Hash", "Enumerable");

    let table = basic_object(table);
    let table = kernel(table);
    let table = module_and_class(table);
    let table = singletons(table);
    let table = numbers(table);
    let table = strings(table);
    let table = arrays(table);
    let table = hashes(table);
    mixins(table)
}

fn basic_object(t: SignatureTable) -> SignatureTable {
    let t = t.method("BasicObject", "initialize", nullary(SigType::Void));
    let t = many(t, "BasicObject", &["==", "!=", "equal?"], sig(vec![SigType::Any], SigType::Bool));
    t.method("BasicObject", "!", nullary(SigType::Bool))
}

fn kernel(t: SignatureTable) -> SignatureTable {
    let t = many(t, "Kernel", &["puts", "print"], variadic(SigType::Any, SigType::Nil));
    let t = t.method("Kernel", "p", variadic(SigType::Any, SigType::Any));
    let t = many(t, "Kernel", &["require", "require_relative"], sig(vec![ty("String")], SigType::Bool));
    let t = t.method("Kernel", "raise", variadic(SigType::Any, SigType::Bot));
    let t = t.method(
        "Kernel",
        "loop",
        nullary(SigType::Nil).with_block(vec![], SigType::Void, true),
    );
    let t = many(t, "Kernel", &["to_s", "inspect"], nullary(ty("String")));
    let t = many(
        t,
        "Kernel",
        &["nil?", "frozen?"],
        nullary(SigType::Bool),
    );
    let t = many(
        t,
        "Kernel",
        &["is_a?", "kind_of?", "instance_of?"],
        sig(vec![ty("Module")], SigType::Bool),
    );
    let t = t.method("Kernel", "respond_to?", sig(vec![ty("Symbol")], SigType::Bool));
    let t = many(t, "Kernel", &["dup", "clone", "freeze", "itself"], nullary(SigType::SelfType));
    let t = many(t, "Kernel", &["hash", "object_id"], nullary(ty("Integer")));
    let t = t.method("Kernel", "class", nullary(SigType::Any));
    let t = many(
        t,
        "Kernel",
        &["lambda", "proc"],
        nullary(ty("Proc")).with_block(vec![], SigType::Any, true),
    );
    let t = t.method("Kernel", "Integer", sig(vec![SigType::Any], ty("Integer")));
    let t = t.method("Kernel", "Float", sig(vec![SigType::Any], ty("Float")));
    let t = t.method("Kernel", "String", sig(vec![SigType::Any], ty("String")));
    let t = t.method("Kernel", "Array", sig(vec![SigType::Any], array_of(SigType::Any)));
    let t = t.method(
        "Kernel",
        "format",
        sig(vec![ty("String")], ty("String")).with_rest(SigType::Any),
    );
    let t = t.method(
        "Kernel",
        "rand",
        nullary(ty("Float")).with_optional(ty("Integer")),
    );
    t.method("Kernel", "sleep", nullary(ty("Integer")).with_optional(ty("Numeric")))
}

fn module_and_class(t: SignatureTable) -> SignatureTable {
    let t = t.method("Module", "name", nullary(SigType::optional(ty("String"))));
    let t = many(
        t,
        "Module",
        &["attr_reader", "attr_writer", "attr_accessor"],
        variadic(ty("Symbol"), SigType::Nil),
    );
    let t = many(
        t,
        "Module",
        &["include", "extend", "prepend"],
        variadic(ty("Module"), SigType::SelfType),
    );
    let t = many(
        t,
        "Module",
        &["private", "public", "protected", "module_function", "private_constant"],
        variadic(SigType::Any, SigType::Nil),
    );
    let t = t.method("Module", "===", sig(vec![SigType::Any], SigType::Bool));
    let t = t.method("Module", "instance_methods", nullary(array_of(ty("Symbol"))));
    let t = t.method("Class", "new", variadic(SigType::Any, SigType::Any));
    let t = t.method("Class", "allocate", nullary(SigType::Any));
    t.method("Class", "superclass", nullary(SigType::optional(ty("Class"))))
}

fn singletons(t: SignatureTable) -> SignatureTable {
    let t = t.method("NilClass", "to_s", nullary(ty("String")));
    let t = t.method("NilClass", "to_a", nullary(array_of(SigType::Any)));
    let t = t.method("NilClass", "to_i", nullary(ty("Integer")));
    let t = many(t, "NilClass", &["&", "|"], sig(vec![SigType::Any], SigType::Bool));
    let t = many(t, "TrueClass", &["&", "|", "^"], sig(vec![SigType::Any], SigType::Bool));
    many(t, "FalseClass", &["&", "|", "^"], sig(vec![SigType::Any], SigType::Bool))
}

fn numbers(t: SignatureTable) -> SignatureTable {
    let arith = vec![
        sig(vec![ty("Integer")], ty("Integer")),
        sig(vec![ty("Float")], ty("Float")),
    ];
    let t = ["+", "-", "*", "/", "%", "**"]
        .iter()
        .fold(t, |t, op| t.overloads("Integer", op, false, arith.clone()));
    let t = t.method("Integer", "<=>", sig(vec![ty("Numeric")], ty("Integer")));
    let t = many(t, "Integer", &["to_i", "abs", "succ", "pred", "-@"], nullary(ty("Integer")));
    let t = t.method("Integer", "to_f", nullary(ty("Float")));
    let t = t.method("Integer", "to_s", nullary(ty("String")));
    let t = many(t, "Integer", &["zero?", "even?", "odd?", "positive?", "negative?"], nullary(SigType::Bool));
    let t = t.method(
        "Integer",
        "times",
        nullary(ty("Integer")).with_block(vec![ty("Integer")], SigType::Void, false),
    );
    let t = many(
        t,
        "Integer",
        &["upto", "downto"],
        sig(vec![ty("Integer")], ty("Integer")).with_block(vec![ty("Integer")], SigType::Void, false),
    );
    let t = many(t, "Float", &["+", "-", "*", "/", "%", "**"], sig(vec![ty("Numeric")], ty("Float")));
    let t = many(t, "Float", &["round", "floor", "ceil", "to_i"], nullary(ty("Integer")));
    let t = many(t, "Float", &["to_f", "abs", "-@"], nullary(ty("Float")));
    let t = t.method("Float", "to_s", nullary(ty("String")));
    t.method("Float", "nan?", nullary(SigType::Bool))
}

fn strings(t: SignatureTable) -> SignatureTable {
    let string = || ty("String");
    let t = many(t, "String", &["+", "<<", "concat"], sig(vec![string()], string()));
    let t = t.method("String", "*", sig(vec![ty("Integer")], string()));
    let t = t.method("String", "%", sig(vec![SigType::Any], string()));
    let t = many(t, "String", &["length", "size", "to_i", "ord"], nullary(ty("Integer")));
    let t = many(
        t,
        "String",
        &[
            "upcase", "downcase", "capitalize", "strip", "chomp", "reverse", "to_s", "dup",
            "freeze", "succ",
        ],
        nullary(string()),
    );
    let t = t.method("String", "to_sym", nullary(ty("Symbol")));
    let t = t.method("String", "to_f", nullary(ty("Float")));
    let t = t.method(
        "String",
        "split",
        nullary(array_of(string())).with_optional(string()),
    );
    let t = t.method("String", "chars", nullary(array_of(string())));
    let t = many(t, "String", &["include?", "start_with?", "end_with?"], variadic(string(), SigType::Bool));
    let t = t.method("String", "empty?", nullary(SigType::Bool));
    let t = many(
        t,
        "String",
        &["gsub", "sub"],
        sig(vec![SigType::Any], string()).with_optional(string()),
    );
    let t = t.method("String", "=~", sig(vec![SigType::Any], SigType::optional(ty("Integer"))));
    let t = t.method("String", "[]", sig(vec![SigType::Any], SigType::optional(string())));
    let t = t.method(
        "String",
        "each_char",
        nullary(string()).with_block(vec![string()], SigType::Void, false),
    );
    let t = many(t, "Symbol", &["to_s", "id2name"], nullary(string()));
    let t = t.method("Symbol", "to_sym", nullary(SigType::SelfType));
    let t = t.method("Symbol", "to_proc", nullary(ty("Proc")));
    many(t, "Symbol", &["length", "size"], nullary(ty("Integer")))
}

fn arrays(t: SignatureTable) -> SignatureTable {
    let elem = || var("Elem");
    let self_array = || array_of(var("Elem"));
    let block = |params: Vec<SigType>, ret: SigType| (params, ret);
    let with = |s: MethodSig, (params, ret): (Vec<SigType>, SigType)| s.with_block(params, ret, false);

    let t = t.singleton_method(
        "Array",
        "new",
        nullary(array_of(var("U")))
            .with_type_params(&["U"])
            .with_optional(ty("Integer"))
            .with_optional(var("U")),
    );
    let t = many(t, "Array", &["[]", "at", "fetch"], sig(vec![ty("Integer")], SigType::optional(elem())));
    let t = many(t, "Array", &["first", "last", "pop", "shift", "min", "max", "sample"], nullary(SigType::optional(elem())));
    let t = many(t, "Array", &["push", "append", "unshift", "prepend"], variadic(elem(), SigType::SelfType));
    let t = t.method("Array", "<<", sig(vec![elem()], SigType::SelfType));
    let t = t.method("Array", "[]=", sig(vec![ty("Integer"), elem()], elem()));
    let t = t.method(
        "Array",
        "insert",
        sig(vec![ty("Integer")], SigType::SelfType).with_rest(elem()),
    );
    let t = many(t, "Array", &["length", "size", "count"], nullary(ty("Integer")));
    let t = many(t, "Array", &["empty?", "any?", "all?", "none?"], nullary(SigType::Bool));
    let t = t.method("Array", "include?", sig(vec![SigType::Any], SigType::Bool));
    let t = t.method("Array", "index", sig(vec![SigType::Any], SigType::optional(ty("Integer"))));
    let t = t.method("Array", "join", nullary(ty("String")).with_optional(ty("String")));
    let t = many(
        t,
        "Array",
        &["sort", "reverse", "compact", "uniq", "to_a", "shuffle"],
        nullary(self_array()),
    );
    let t = many(t, "Array", &["+", "-", "&", "|"], sig(vec![self_array()], self_array()));
    let t = t.method("Array", "concat", variadic(self_array(), SigType::SelfType));
    let t = t.method("Array", "flatten", nullary(array_of(SigType::Any)));
    let t = t.method("Array", "sum", nullary(SigType::Any));
    let t = many(
        t,
        "Array",
        &["each", "each_entry"],
        with(nullary(SigType::SelfType), block(vec![elem()], SigType::Void)),
    );
    let t = t.method(
        "Array",
        "each_with_index",
        with(nullary(SigType::SelfType), block(vec![elem(), ty("Integer")], SigType::Void)),
    );
    let t = many(
        t,
        "Array",
        &["map", "collect", "flat_map"],
        with(
            nullary(array_of(var("U"))).with_type_params(&["U"]),
            block(vec![elem()], var("U")),
        ),
    );
    let t = many(
        t,
        "Array",
        &["select", "filter", "reject", "sort_by"],
        with(nullary(self_array()), block(vec![elem()], SigType::Any)),
    );
    let t = many(
        t,
        "Array",
        &["find", "detect", "min_by", "max_by"],
        with(nullary(SigType::optional(elem())), block(vec![elem()], SigType::Any)),
    );
    let t = many(
        t,
        "Array",
        &["inject", "reduce"],
        with(
            sig(vec![var("U")], var("U")).with_type_params(&["U"]),
            block(vec![var("U"), elem()], var("U")),
        ),
    );
    let t = t.method("Array", "zip", variadic(SigType::Any, array_of(array_of(SigType::Any))));
    t.method(
        "Array",
        "group_by",
        with(
            nullary(hash_of(var("U"), self_array())).with_type_params(&["U"]),
            block(vec![elem()], var("U")),
        ),
    )
}

fn hashes(t: SignatureTable) -> SignatureTable {
    let k = || var("K");
    let v = || var("V");
    let self_hash = || hash_of(var("K"), var("V"));
    let t = t.singleton_method(
        "Hash",
        "new",
        nullary(hash_of(SigType::Any, SigType::Any)).with_optional(SigType::Any),
    );
    let t = t.method("Hash", "[]", sig(vec![k()], SigType::optional(v())));
    let t = many(t, "Hash", &["[]=", "store"], sig(vec![k(), v()], v()));
    let t = t.method("Hash", "fetch", sig(vec![k()], v()).with_optional(v()));
    let t = t.method("Hash", "delete", sig(vec![k()], SigType::optional(v())));
    let t = many(t, "Hash", &["key?", "has_key?", "include?", "member?"], sig(vec![k()], SigType::Bool));
    let t = t.method("Hash", "keys", nullary(array_of(k())));
    let t = t.method("Hash", "values", nullary(array_of(v())));
    let t = many(t, "Hash", &["size", "length", "count"], nullary(ty("Integer")));
    let t = many(t, "Hash", &["empty?", "any?"], nullary(SigType::Bool));
    let t = t.method("Hash", "merge", variadic(self_hash(), self_hash()));
    let t = t.method("Hash", "to_a", nullary(array_of(SigType::Tuple(vec![k(), v()]))));
    let t = t.method("Hash", "dig", variadic(SigType::Any, SigType::Any));
    let t = many(
        t,
        "Hash",
        &["each", "each_pair"],
        nullary(SigType::SelfType).with_block(vec![k(), v()], SigType::Void, false),
    );
    let t = many(
        t,
        "Hash",
        &["map", "collect", "flat_map"],
        nullary(array_of(var("U")))
            .with_type_params(&["U"])
            .with_block(vec![k(), v()], var("U"), false),
    );
    let t = many(
        t,
        "Hash",
        &["select", "filter", "reject"],
        nullary(self_hash()).with_block(vec![k(), v()], SigType::Any, false),
    );
    t.method(
        "Hash",
        "transform_values",
        nullary(hash_of(k(), var("U")))
            .with_type_params(&["U"])
            .with_block(vec![v()], var("U"), false),
    )
}

fn mixins(t: SignatureTable) -> SignatureTable {
    let t = many(
        t,
        "Comparable",
        &["<", ">", "<=", ">="],
        sig(vec![SigType::Any], SigType::Bool),
    );
    let t = t.method(
        "Comparable",
        "between?",
        sig(vec![SigType::Any, SigType::Any], SigType::Bool),
    );
    let t = t.method(
        "Comparable",
        "clamp",
        sig(vec![SigType::Any, SigType::Any], SigType::SelfType),
    );
    let t = t.method("Enumerable", "to_a", nullary(array_of(SigType::Any)));
    let t = t.method("Enumerable", "include?", sig(vec![SigType::Any], SigType::Bool));
    let t = t.method("Enumerable", "first", nullary(SigType::Any));
    let t = t.method("Enumerable", "count", nullary(ty("Integer")));
    let t = t.method("Enumerable", "sort", nullary(array_of(SigType::Any)));
    let t = t.method("Proc", "call", variadic(SigType::Any, SigType::Any));
    let t = t.method("Proc", "arity", nullary(ty("Integer")));
    t.method("Proc", "lambda?", nullary(SigType::Bool))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_table_is_valid() {
        core_table().validate().unwrap();
    }

    #[test]
    fn test_declaration_order_matches_reserved_ids() {
        let table = core_table();
        let names: Vec<&str> = table
            .modules
            .iter()
            .map(|m| m.path[0].as_str())
            .collect();
        assert_eq!(names[ModId::BASIC_OBJECT.0 as usize - 1], "BasicObject");
        assert_eq!(names[ModId::INTEGER.0 as usize - 1], "Integer");
        assert_eq!(names[ModId::ARRAY.0 as usize - 1], "Array");
        assert_eq!(names[ModId::ENUMERABLE.0 as usize - 1], "Enumerable");
    }
}
