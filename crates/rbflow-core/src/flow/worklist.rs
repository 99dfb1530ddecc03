//! Location-keyed worklist solver for forward analyses

use super::cfg::{BasicBlock, BlockId, Cfg};
use std::collections::{HashMap, HashSet, VecDeque};

/// A forward dataflow analysis over a [`Cfg`]
pub trait ForwardAnalysis {
    /// The type of facts being propagated
    type Fact: Clone + PartialEq;

    /// Fact on entry to the scope
    fn initial_fact(&self) -> Self::Fact;

    /// Bottom element for the lattice
    fn bottom(&self) -> Self::Fact;

    /// Merge facts arriving from several predecessors
    fn join(&self, facts: &[Self::Fact]) -> Self::Fact;

    /// Compute output fact from input fact for a block
    fn transfer(&self, block: &BasicBlock, input: &Self::Fact) -> Self::Fact;
}

/// Result of fixpoint computation
#[derive(Debug)]
pub struct FixpointResult<F> {
    /// Facts at entry of each block
    pub in_facts: HashMap<BlockId, F>,
    /// Facts at exit of each block
    pub out_facts: HashMap<BlockId, F>,
    /// Number of block visits until the fixpoint
    pub iterations: usize,
}

/// Worklist-based fixpoint solver
pub struct WorklistSolver;

impl WorklistSolver {
    /// Visit blocks until no block's output grows. A block is requeued only
    /// when a predecessor's output changed.
    pub fn solve<A: ForwardAnalysis>(analysis: &A, cfg: &Cfg) -> FixpointResult<A::Fact> {
        let mut in_facts: HashMap<BlockId, A::Fact> = HashMap::new();
        let mut out_facts: HashMap<BlockId, A::Fact> = HashMap::new();

        for &block_id in cfg.blocks.keys() {
            in_facts.insert(block_id, analysis.bottom());
            out_facts.insert(block_id, analysis.bottom());
        }
        in_facts.insert(cfg.entry, analysis.initial_fact());

        let mut worklist: VecDeque<BlockId> = cfg.reverse_postorder().into_iter().collect();
        let mut in_worklist: HashSet<BlockId> = worklist.iter().copied().collect();
        let mut visited: HashSet<BlockId> = HashSet::new();
        let mut iterations = 0;

        while let Some(block_id) = worklist.pop_front() {
            in_worklist.remove(&block_id);
            iterations += 1;

            let Some(block) = cfg.blocks.get(&block_id) else {
                continue;
            };

            let pred_facts: Vec<A::Fact> = block
                .predecessors
                .iter()
                .filter_map(|pred| out_facts.get(pred).cloned())
                .collect();
            let new_in = if block_id == cfg.entry {
                let mut all = pred_facts;
                all.push(analysis.initial_fact());
                analysis.join(&all)
            } else if pred_facts.is_empty() {
                analysis.bottom()
            } else {
                analysis.join(&pred_facts)
            };

            let new_out = analysis.transfer(block, &new_in);
            let first_visit = visited.insert(block_id);
            let changed = out_facts.get(&block_id) != Some(&new_out);
            in_facts.insert(block_id, new_in);

            if changed || first_visit {
                out_facts.insert(block_id, new_out);
                for &succ in &block.successors {
                    if in_worklist.insert(succ) {
                        worklist.push_back(succ);
                    }
                }
            }
        }

        FixpointResult {
            in_facts,
            out_facts,
            iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::cfg::CfgEvent;
    use crate::name::Name;
    use std::collections::BTreeSet;

    /// Names written anywhere on some path to the block
    struct Written;

    impl ForwardAnalysis for Written {
        type Fact = BTreeSet<Name>;

        fn initial_fact(&self) -> Self::Fact {
            BTreeSet::new()
        }

        fn bottom(&self) -> Self::Fact {
            BTreeSet::new()
        }

        fn join(&self, facts: &[Self::Fact]) -> Self::Fact {
            facts.iter().flatten().cloned().collect()
        }

        fn transfer(&self, block: &BasicBlock, input: &Self::Fact) -> Self::Fact {
            let mut out = input.clone();
            for event in &block.events {
                if let CfgEvent::Write(name) = event {
                    out.insert(name.clone());
                }
            }
            out
        }
    }

    #[test]
    fn test_loop_reaches_fixpoint() {
        let mut cfg = Cfg::new();
        let header = cfg.new_block();
        let body = cfg.new_block();
        cfg.add_edge(cfg.entry, header);
        cfg.add_edge(header, body);
        cfg.add_edge(body, header);
        cfg.add_edge(header, cfg.exit);
        cfg.add_event(body, CfgEvent::Write(Name::new("x")));

        let result = WorklistSolver::solve(&Written, &cfg);
        assert!(result.in_facts[&header].contains("x"));
        assert!(result.out_facts[&cfg.exit].contains("x"));
        assert!(result.iterations < 20);
    }
}
