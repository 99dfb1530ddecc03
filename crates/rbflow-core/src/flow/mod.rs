//! Intra-scope control flow for local variables

pub mod cfg;
mod unassigned;
pub mod worklist;

pub use cfg::{BasicBlock, BlockId, Cfg, CfgBuilder, CfgEvent};
pub use unassigned::maybe_unassigned;
pub use worklist::{FixpointResult, ForwardAnalysis, WorklistSolver};
