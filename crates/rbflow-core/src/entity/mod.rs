//! Namespace, method and variable entity tables
//!
//! Entities are created on first reference and never deleted. What changes
//! across edits is the set of contributions (declarations from signature
//! tables, definitions from syntax nodes) each entity holds, and every
//! lookup recomputes over the current contributions.

pub mod core;

use crate::arena::Arena;
use crate::ast::{ConstPath, NodeId};
use crate::graph::Graph;
use crate::ids::{MethodDefId, ModId, VertexId};
use crate::name::Name;
use crate::types::{Hierarchy, MethodSig, SigResolver, SigType, TypeNames};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Ancestor walks stop after this many superclass hops
const MAX_HIERARCHY_DEPTH: usize = 64;

/// `Object::Foo` names the same namespace as `Foo`
fn strip_object(path: &[Name]) -> &[Name] {
    match path.split_first() {
        Some((first, rest)) if first == "Object" => rest,
        _ => path,
    }
}

/// Who contributed a fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// A syntax node of installed tree generation `tree`
    Node { tree: u32, node: NodeId },
    /// Entry of signature batch `batch`
    Decl(u32),
}

impl Origin {
    pub fn is_decl(&self) -> bool {
        matches!(self, Origin::Decl(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Class,
    Module,
}

/// Lexical namespace chain, innermost first
#[derive(Debug)]
pub struct CRef {
    pub module: ModId,
    /// Inside `class << self`
    pub singleton: bool,
    pub outer: Option<Rc<CRef>>,
}

impl CRef {
    pub fn top() -> Rc<CRef> {
        Rc::new(CRef {
            module: ModId::OBJECT,
            singleton: false,
            outer: None,
        })
    }

    pub fn push(self: &Rc<Self>, module: ModId, singleton: bool) -> Rc<CRef> {
        Rc::new(CRef {
            module,
            singleton,
            outer: Some(Rc::clone(self)),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CRef> {
        std::iter::successors(Some(self), |c| c.outer.as_deref())
    }
}

/// A constant path together with the lexical scope it appeared in
#[derive(Debug, Clone)]
pub struct ConstRef {
    pub cref: Rc<CRef>,
    pub path: ConstPath,
}

/// Constant or variable: declared types and inferred definitions
#[derive(Debug)]
pub struct ValueEntity {
    pub(crate) decls: IndexMap<Origin, VertexId>,
    pub(crate) defs: IndexSet<Origin>,
    /// Receives one source per declaration
    pub decl_vertex: VertexId,
    /// Receives the right-hand side of every definition
    pub def_vertex: VertexId,
}

impl ValueEntity {
    fn new(graph: &mut Graph) -> Self {
        Self {
            decls: IndexMap::new(),
            defs: IndexSet::new(),
            decl_vertex: graph.new_vertex("value-decl"),
            def_vertex: graph.new_vertex("value-def"),
        }
    }

    pub fn is_declared(&self) -> bool {
        !self.decls.is_empty()
    }

    pub fn exists(&self) -> bool {
        !self.decls.is_empty() || !self.defs.is_empty()
    }

    /// Vertex a reader should observe: declarations win over definitions
    pub fn read_vertex(&self) -> Option<VertexId> {
        if self.is_declared() {
            Some(self.decl_vertex)
        } else if !self.defs.is_empty() {
            Some(self.def_vertex)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct MethodEntity {
    pub(crate) decls: IndexMap<Origin, Vec<MethodSig>>,
    pub(crate) defs: IndexSet<MethodDefId>,
}

impl MethodEntity {
    pub fn is_declared(&self) -> bool {
        !self.decls.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty() && self.defs.is_empty()
    }

    /// All declared overloads in declaration order
    pub fn overloads(&self) -> impl Iterator<Item = &MethodSig> {
        self.decls.values().flatten()
    }

    pub fn defs(&self) -> impl Iterator<Item = MethodDefId> + '_ {
        self.defs.iter().copied()
    }
}

#[derive(Debug)]
pub struct ModuleEntity {
    pub id: ModId,
    pub name: Name,
    /// Lexical owner; `None` only for `Object`
    pub parent: Option<ModId>,
    pub(crate) builtin: bool,
    pub(crate) class_defs: IndexSet<Origin>,
    pub(crate) module_defs: IndexSet<Origin>,
    pub(crate) decl_kinds: IndexMap<Origin, ModuleKind>,
    pub(crate) superclass_refs: IndexMap<Origin, ConstRef>,
    pub(crate) declared_superclass: IndexMap<Origin, Vec<Name>>,
    pub(crate) includes: IndexMap<Origin, Vec<ConstRef>>,
    pub(crate) declared_includes: IndexMap<Origin, Vec<Vec<Name>>>,
    pub(crate) children: IndexMap<Name, ModId>,
    /// `[instance, singleton]`
    pub(crate) methods: [IndexMap<Name, MethodEntity>; 2],
    pub(crate) consts: IndexMap<Name, ValueEntity>,
    /// `[instance, singleton]`
    pub(crate) ivars: [IndexMap<Name, ValueEntity>; 2],
    pub(crate) type_params: Vec<Name>,
}

impl ModuleEntity {
    fn new(id: ModId, name: Name, parent: Option<ModId>) -> Self {
        Self {
            id,
            name,
            parent,
            builtin: false,
            class_defs: IndexSet::new(),
            module_defs: IndexSet::new(),
            decl_kinds: IndexMap::new(),
            superclass_refs: IndexMap::new(),
            declared_superclass: IndexMap::new(),
            includes: IndexMap::new(),
            declared_includes: IndexMap::new(),
            children: IndexMap::new(),
            methods: [IndexMap::new(), IndexMap::new()],
            consts: IndexMap::new(),
            ivars: [IndexMap::new(), IndexMap::new()],
            type_params: Vec::new(),
        }
    }

    pub fn kind(&self) -> Option<ModuleKind> {
        if !self.class_defs.is_empty() {
            Some(ModuleKind::Class)
        } else if !self.module_defs.is_empty() {
            Some(ModuleKind::Module)
        } else {
            self.decl_kinds.values().next().copied()
        }
    }

    pub fn exists(&self) -> bool {
        self.kind().is_some()
    }

    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    /// Whether any syntax node currently contributes to this namespace
    pub fn has_node_contributions(&self) -> bool {
        let is_node = |o: &Origin| !o.is_decl();
        self.class_defs.iter().any(is_node)
            || self.module_defs.iter().any(is_node)
            || self.methods.iter().any(|t| t.values().any(|m| !m.defs.is_empty()))
            || self.consts.values().any(|c| c.defs.iter().any(is_node))
            || self
                .ivars
                .iter()
                .any(|t| t.values().any(|v| v.defs.iter().any(is_node)))
    }

    pub fn method(&self, singleton: bool, name: &str) -> Option<&MethodEntity> {
        self.methods[usize::from(singleton)].get(name)
    }

    pub fn methods(&self, singleton: bool) -> impl Iterator<Item = (&Name, &MethodEntity)> {
        self.methods[usize::from(singleton)].iter()
    }

    pub fn consts(&self) -> impl Iterator<Item = (&Name, &ValueEntity)> {
        self.consts.iter()
    }

    pub fn ivars(&self, singleton: bool) -> impl Iterator<Item = (&Name, &ValueEntity)> {
        self.ivars[usize::from(singleton)].iter()
    }

    pub fn type_params(&self) -> &[Name] {
        &self.type_params
    }
}

/// A method found by lookup
#[derive(Debug, Clone, Copy)]
pub struct MethodHit<'a> {
    pub owner: ModId,
    pub singleton: bool,
    pub entity: &'a MethodEntity,
}

/// Outcome of constant lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstResolution {
    Module(ModId),
    Value { owner: ModId, name: Name },
    Missing,
}

/// All namespaces of one session plus global variables and type aliases
#[derive(Debug, Default)]
pub struct EntityTable {
    modules: Arena<ModId, ModuleEntity>,
    pub(crate) globals: IndexMap<Name, ValueEntity>,
    pub(crate) aliases: IndexMap<Name, SigType>,
}

impl EntityTable {
    pub fn new() -> Self {
        let mut table = Self::default();
        table
            .modules
            .alloc(ModuleEntity::new(ModId::OBJECT, Name::new("Object"), None));
        table
    }

    pub fn module(&self, id: ModId) -> Option<&ModuleEntity> {
        self.modules.get(id)
    }

    pub(crate) fn module_mut(&mut self, id: ModId) -> Option<&mut ModuleEntity> {
        self.modules.get_mut(id)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleEntity> {
        self.modules.iter().map(|(_, m)| m)
    }

    pub fn kind(&self, id: ModId) -> Option<ModuleKind> {
        self.module(id).and_then(ModuleEntity::kind)
    }

    pub fn exists(&self, id: ModId) -> bool {
        self.kind(id).is_some()
    }

    /// Child namespace of `parent`, created if missing
    pub fn ensure_child(&mut self, parent: ModId, name: &Name) -> ModId {
        if let Some(&child) = self.module(parent).and_then(|m| m.children.get(name)) {
            return child;
        }
        let id = self.modules.next_id();
        self.modules
            .alloc(ModuleEntity::new(id, name.clone(), Some(parent)));
        if let Some(p) = self.module_mut(parent) {
            p.children.insert(name.clone(), id);
        }
        id
    }

    /// Create every segment of an absolute path
    pub fn ensure_path(&mut self, path: &[Name]) -> ModId {
        strip_object(path)
            .iter()
            .fold(ModId::OBJECT, |parent, seg| self.ensure_child(parent, seg))
    }

    fn existing_child(&self, parent: ModId, name: &Name) -> Option<ModId> {
        self.module(parent)
            .and_then(|m| m.children.get(name))
            .copied()
            .filter(|c| self.exists(*c))
    }

    /// Existing namespace at an absolute path
    pub fn lookup_path(&self, path: &[Name]) -> Option<ModId> {
        strip_object(path).iter().try_fold(ModId::OBJECT, |parent, seg| {
            self.existing_child(parent, seg)
        })
    }

    pub fn path_of(&self, id: ModId) -> Vec<Name> {
        let mut segments = Vec::new();
        let mut cur = Some(id);
        while let Some(m) = cur.and_then(|c| self.module(c)) {
            if m.parent.is_none() {
                break;
            }
            segments.push(m.name.clone());
            cur = m.parent;
        }
        segments.reverse();
        segments
    }

    pub fn qualified_name(&self, id: ModId) -> String {
        if id == ModId::OBJECT {
            return "Object".to_string();
        }
        self.path_of(id)
            .iter()
            .map(Name::as_str)
            .collect::<Vec<_>>()
            .join("::")
    }

    /// Namespace named by a class header, superclass or include reference:
    /// lexical scopes innermost first, then the top level
    pub fn resolve_lexical(&self, cref: &CRef, path: &ConstPath) -> Option<ModId> {
        let (first, rest) = path.segments.split_first()?;
        let head = if path.absolute {
            self.existing_child(ModId::OBJECT, first)
        } else {
            cref.iter()
                .find_map(|c| self.existing_child(c.module, first))
                .or_else(|| self.existing_child(ModId::OBJECT, first))
        }?;
        rest.iter()
            .try_fold(head, |parent, seg| self.existing_child(parent, seg))
    }

    pub fn superclass_of(&self, id: ModId) -> Option<ModId> {
        if id == ModId::BASIC_OBJECT || self.kind(id) != Some(ModuleKind::Class) {
            return None;
        }
        let module = self.module(id)?;
        let from_nodes = module
            .superclass_refs
            .values()
            .filter_map(|r| self.resolve_lexical(&r.cref, &r.path))
            .find(|s| *s != id);
        let declared = || {
            module
                .declared_superclass
                .values()
                .filter_map(|p| self.lookup_path(p))
                .find(|s| *s != id)
        };
        from_nodes.or_else(declared).or(Some(ModId::OBJECT))
    }

    /// Included namespaces in inclusion order, declarations first
    pub fn includes_of(&self, id: ModId) -> Vec<ModId> {
        let Some(module) = self.module(id) else {
            return Vec::new();
        };
        let mut out = IndexSet::new();
        for paths in module.declared_includes.values() {
            out.extend(paths.iter().filter_map(|p| self.lookup_path(p)));
        }
        for refs in module.includes.values() {
            out.extend(
                refs.iter()
                    .filter_map(|r| self.resolve_lexical(&r.cref, &r.path)),
            );
        }
        out.shift_remove(&id);
        out.into_iter().collect()
    }

    fn push_with_includes(&self, id: ModId, out: &mut IndexSet<ModId>, depth: usize) {
        if depth > MAX_HIERARCHY_DEPTH || !out.insert(id) {
            return;
        }
        // the most recent include is consulted first
        for inc in self.includes_of(id).into_iter().rev() {
            self.push_with_includes(inc, out, depth + 1);
        }
    }

    /// Instance-side method resolution order
    pub fn ancestors(&self, id: ModId) -> Vec<ModId> {
        let mut out = IndexSet::new();
        let mut cur = Some(id);
        let mut hops = 0;
        while let Some(c) = cur {
            if out.contains(&c) || hops > MAX_HIERARCHY_DEPTH {
                break;
            }
            self.push_with_includes(c, &mut out, 0);
            cur = self.superclass_of(c);
            hops += 1;
        }
        out.into_iter().collect()
    }

    /// `(namespace, singleton?)` pairs consulted for a method call
    pub fn method_chain(&self, id: ModId, singleton: bool) -> Vec<(ModId, bool)> {
        if !singleton {
            return self.ancestors(id).into_iter().map(|a| (a, false)).collect();
        }
        let mut chain = Vec::new();
        let root = if self.kind(id) == Some(ModuleKind::Module) {
            chain.push((id, true));
            ModId::MODULE
        } else {
            let mut cur = Some(id);
            while let Some(c) = cur {
                if chain.contains(&(c, true)) || chain.len() > MAX_HIERARCHY_DEPTH {
                    break;
                }
                chain.push((c, true));
                cur = self.superclass_of(c);
            }
            ModId::CLASS
        };
        chain.extend(self.ancestors(root).into_iter().map(|a| (a, false)));
        chain
    }

    pub fn resolve_method(&self, id: ModId, singleton: bool, name: &str) -> Option<MethodHit<'_>> {
        self.first_hit(self.method_chain(id, singleton), name)
    }

    /// Lookup continuing after `owner` in the chain, for `super`
    pub fn resolve_super(&self, owner: ModId, singleton: bool, name: &str) -> Option<MethodHit<'_>> {
        let chain: Vec<(ModId, bool)> = self
            .method_chain(owner, singleton)
            .into_iter()
            .skip_while(|&(m, s)| !(m == owner && s == singleton))
            .skip(1)
            .collect();
        self.first_hit(chain, name)
    }

    fn first_hit(&self, chain: Vec<(ModId, bool)>, name: &str) -> Option<MethodHit<'_>> {
        chain.into_iter().find_map(|(owner, singleton)| {
            self.module(owner)
                .and_then(|m| m.method(singleton, name))
                .filter(|e| !e.is_empty())
                .map(|entity| MethodHit {
                    owner,
                    singleton,
                    entity,
                })
        })
    }

    fn const_own(&self, owner: ModId, name: &Name) -> ConstResolution {
        if let Some(child) = self.existing_child(owner, name) {
            return ConstResolution::Module(child);
        }
        match self.module(owner).and_then(|m| m.consts.get(name)) {
            Some(value) if value.exists() => ConstResolution::Value {
                owner,
                name: name.clone(),
            },
            _ => ConstResolution::Missing,
        }
    }

    fn const_in_ancestors(&self, id: ModId, name: &Name) -> ConstResolution {
        self.ancestors(id)
            .into_iter()
            .map(|a| self.const_own(a, name))
            .find(|r| *r != ConstResolution::Missing)
            .unwrap_or(ConstResolution::Missing)
    }

    /// Constant read: lexical scopes, then ancestors of the innermost
    /// scope, then the top level; later segments look inside the namespace
    /// found so far
    pub fn resolve_const(&self, cref: &CRef, path: &ConstPath) -> ConstResolution {
        let Some((first, rest)) = path.segments.split_first() else {
            return ConstResolution::Missing;
        };
        let mut found = if path.absolute {
            self.const_own(ModId::OBJECT, first)
        } else {
            let lexical = cref
                .iter()
                .filter(|c| c.outer.is_some())
                .map(|c| self.const_own(c.module, first))
                .find(|r| *r != ConstResolution::Missing);
            match lexical {
                Some(r) => r,
                None => match self.const_in_ancestors(cref.module, first) {
                    ConstResolution::Missing => self.const_own(ModId::OBJECT, first),
                    r => r,
                },
            }
        };
        for seg in rest {
            found = match found {
                ConstResolution::Module(m) => self.const_in_ancestors(m, seg),
                _ => ConstResolution::Missing,
            };
        }
        found
    }

    /// Instance variable as seen from `id`, searching superclasses too
    pub fn resolve_ivar(&self, id: ModId, singleton: bool, name: &str) -> Option<&ValueEntity> {
        let side = usize::from(singleton);
        self.ancestors(id).into_iter().find_map(|a| {
            self.module(a)
                .and_then(|m| m.ivars[side].get(name))
                .filter(|v| v.exists())
        })
    }

    pub fn globals(&self) -> impl Iterator<Item = (&Name, &ValueEntity)> {
        self.globals.iter().filter(|(_, v)| v.exists())
    }

    pub fn global(&self, name: &str) -> Option<&ValueEntity> {
        self.globals.get(name).filter(|v| v.exists())
    }

    pub fn const_value(&self, owner: ModId, name: &str) -> Option<&ValueEntity> {
        self.module(owner).and_then(|m| m.consts.get(name))
    }

    pub(crate) fn ensure_const(
        &mut self,
        graph: &mut Graph,
        owner: ModId,
        name: &Name,
    ) -> Option<&mut ValueEntity> {
        let module = self.modules.get_mut(owner)?;
        Some(
            module
                .consts
                .entry(name.clone())
                .or_insert_with(|| ValueEntity::new(graph)),
        )
    }

    pub(crate) fn ensure_ivar(
        &mut self,
        graph: &mut Graph,
        owner: ModId,
        singleton: bool,
        name: &Name,
    ) -> Option<&mut ValueEntity> {
        let module = self.modules.get_mut(owner)?;
        Some(
            module.ivars[usize::from(singleton)]
                .entry(name.clone())
                .or_insert_with(|| ValueEntity::new(graph)),
        )
    }

    pub(crate) fn ensure_global(&mut self, graph: &mut Graph, name: &Name) -> &mut ValueEntity {
        self.globals
            .entry(name.clone())
            .or_insert_with(|| ValueEntity::new(graph))
    }

    pub(crate) fn method_entry(
        &mut self,
        owner: ModId,
        singleton: bool,
        name: &Name,
    ) -> Option<&mut MethodEntity> {
        let module = self.modules.get_mut(owner)?;
        Some(
            module.methods[usize::from(singleton)]
                .entry(name.clone())
                .or_default(),
        )
    }
}

impl Hierarchy for EntityTable {
    fn is_subclass_of(&self, sub: ModId, sup: ModId) -> bool {
        sub == sup || self.ancestors(sub).contains(&sup)
    }
}

impl TypeNames for EntityTable {
    fn module_name(&self, id: ModId) -> String {
        self.qualified_name(id)
    }
}

impl SigResolver for EntityTable {
    fn resolve_path(&self, path: &[Name]) -> Option<ModId> {
        self.lookup_path(path)
    }

    fn alias(&self, name: &Name) -> Option<&SigType> {
        self.aliases.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::path;

    fn class_at(table: &mut EntityTable, segments: &[&str], origin: u32) -> ModId {
        let id = table.ensure_path(&path(segments));
        table
            .module_mut(id)
            .unwrap()
            .class_defs
            .insert(Origin::Decl(origin));
        id
    }

    fn set_super(table: &mut EntityTable, id: ModId, sup: &str) {
        table.module_mut(id).unwrap().superclass_refs.insert(
            Origin::Decl(0),
            ConstRef {
                cref: CRef::top(),
                path: ConstPath::parse(sup),
            },
        );
    }

    #[test]
    fn test_lazy_creation_does_not_imply_existence() {
        let mut table = EntityTable::new();
        let a = table.ensure_path(&path(&["A"]));
        assert!(!table.exists(a));
        assert_eq!(table.lookup_path(&path(&["A"])), None);
        class_at(&mut table, &["A"], 1);
        assert_eq!(table.lookup_path(&path(&["A"])), Some(a));
        assert_eq!(table.qualified_name(a), "A");
    }

    #[test]
    fn test_superclass_chain() {
        let mut table = EntityTable::new();
        let a = class_at(&mut table, &["A"], 1);
        let b = class_at(&mut table, &["B"], 2);
        set_super(&mut table, b, "A");
        assert_eq!(table.superclass_of(b), Some(a));
        let ancestors = table.ancestors(b);
        assert_eq!(&ancestors[..2], &[b, a]);
    }

    /// A table with the core namespaces in their reserved slots
    fn core_entities() -> EntityTable {
        crate::genv::Genv::new(crate::config::AnalysisConfig::default()).entities
    }

    #[test]
    fn test_cyclic_superclass_terminates() {
        let mut table = core_entities();
        let a = class_at(&mut table, &["A"], 1);
        let b = class_at(&mut table, &["B"], 2);
        set_super(&mut table, a, "B");
        set_super(&mut table, b, "A");
        assert!(a > ModId::ENUMERABLE);
        let ancestors = table.ancestors(a);
        assert_eq!(ancestors, vec![a, b]);
    }

    #[test]
    fn test_later_include_is_searched_first() {
        let mut table = EntityTable::new();
        let c = class_at(&mut table, &["C"], 1);
        let m1 = table.ensure_path(&path(&["M1"]));
        let m2 = table.ensure_path(&path(&["M2"]));
        for m in [m1, m2] {
            table
                .module_mut(m)
                .unwrap()
                .module_defs
                .insert(Origin::Decl(9));
        }
        table.module_mut(c).unwrap().declared_includes.insert(
            Origin::Decl(1),
            vec![path(&["M1"]), path(&["M2"])],
        );
        let ancestors = table.ancestors(c);
        assert_eq!(&ancestors[..3], &[c, m2, m1]);
    }

    #[test]
    fn test_lexical_constant_before_ancestors() {
        let mut table = EntityTable::new();
        let outer = class_at(&mut table, &["Outer"], 1);
        let inner = class_at(&mut table, &["Outer", "Inner"], 2);
        let cref = CRef::top().push(outer, false);
        assert_eq!(
            table.resolve_const(&cref, &ConstPath::parse("Inner")),
            ConstResolution::Module(inner)
        );
        assert_eq!(
            table.resolve_const(&CRef::top(), &ConstPath::parse("Outer::Inner")),
            ConstResolution::Module(inner)
        );
        assert_eq!(
            table.resolve_const(&CRef::top(), &ConstPath::parse("Inner")),
            ConstResolution::Missing
        );
    }
}
