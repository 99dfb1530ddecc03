//! Identity handles for graph and entity objects

use crate::arena::arena_id;

arena_id!(
    /// A flow-graph vertex (mutable accumulator or immutable source)
    VertexId
);
arena_id!(
    /// A demand box
    BoxId
);
arena_id!(
    /// A namespace entity (class or module)
    ModId
);
arena_id!(
    /// An inferred method definition record
    MethodDefId
);
arena_id!(
    /// A block closure installed at a call site
    ProcId
);
arena_id!(
    /// A scope-local mutable container (array or hash literal)
    ContainerId
);

impl ModId {
    pub const OBJECT: ModId = ModId(0);
    pub const BASIC_OBJECT: ModId = ModId(1);
    pub const KERNEL: ModId = ModId(2);
    pub const MODULE: ModId = ModId(3);
    pub const CLASS: ModId = ModId(4);
    pub const NIL_CLASS: ModId = ModId(5);
    pub const TRUE_CLASS: ModId = ModId(6);
    pub const FALSE_CLASS: ModId = ModId(7);
    pub const NUMERIC: ModId = ModId(8);
    pub const INTEGER: ModId = ModId(9);
    pub const FLOAT: ModId = ModId(10);
    pub const STRING: ModId = ModId(11);
    pub const SYMBOL: ModId = ModId(12);
    pub const ARRAY: ModId = ModId(13);
    pub const HASH: ModId = ModId(14);
    pub const PROC: ModId = ModId(15);
    pub const COMPARABLE: ModId = ModId(16);
    pub const ENUMERABLE: ModId = ModId(17);
}
