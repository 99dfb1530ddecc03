//! Fixpoint driver
//!
//! Pops boxes from the deduplicated run queue until it is empty. Each run
//! may queue further boxes; termination follows from monotone growth within
//! a generation and the depth bound on types.

use crate::error::{CoreError, Result};
use crate::genv::{Genv, RunStats};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Cooperative cancellation flag, polled by the driver between box runs
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Genv {
    /// Drain the run queue. On cancellation or timeout the box about to run
    /// goes back to the head of the queue and nothing of it has been
    /// committed, so a later call continues where this one stopped.
    #[tracing::instrument(level = "debug", skip_all, fields(queued = self.queue_len()))]
    pub(crate) fn run_all(
        &mut self,
        token: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<RunStats> {
        let interval = self.config.poll_interval();
        let mut stats = RunStats::default();
        // boxes touched by edits made outside a box run
        for notified in self.graph.drain_notified() {
            self.add_run(notified);
        }
        while let Some(id) = self.pop_run() {
            if stats.boxes_run % interval == 0 {
                let expired = deadline.is_some_and(|d| Instant::now() >= d);
                if token.is_cancelled() || expired {
                    self.push_front_run(id);
                    debug!(processed = stats.boxes_run, expired, "pass interrupted");
                    return Err(CoreError::Cancelled {
                        processed: stats.boxes_run,
                    });
                }
            }
            stats.max_queue_len = stats.max_queue_len.max(self.queue_len() + 1);
            self.run_box(id);
            stats.boxes_run += 1;
        }
        debug!(
            boxes_run = stats.boxes_run,
            max_queue_len = stats.max_queue_len,
            "fixpoint reached"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::BoxKind;
    use crate::config::AnalysisConfig;
    use crate::graph::Target;
    use crate::ids::VertexId;
    use crate::name::Name;
    use crate::types::Type;
    use proptest::prelude::*;

    fn genv_with_boxes(n: usize) -> Genv {
        let mut genv = Genv::new(AnalysisConfig::default());
        // drop the bootstrap's own queue entries
        while genv.pop_run().is_some() {}
        for _ in 0..n {
            let out = genv.graph.new_vertex("out");
            genv.new_box(BoxKind::UnknownCall { name: Name::new("send") }, out);
        }
        genv
    }

    #[test]
    fn test_run_all_drains_queue() {
        let mut genv = genv_with_boxes(3);
        let stats = genv.run_all(&CancellationToken::new(), None).unwrap();
        assert_eq!(stats.boxes_run, 3);
        assert_eq!(genv.queue_len(), 0);
    }

    #[test]
    fn test_cancelled_pass_keeps_pending_work() {
        let mut genv = genv_with_boxes(2);
        let token = CancellationToken::new();
        token.cancel();
        let err = genv.run_all(&token, None).unwrap_err();
        assert!(matches!(err, CoreError::Cancelled { processed: 0 }));
        assert_eq!(genv.queue_len(), 2);

        token.reset();
        let stats = genv.run_all(&token, None).unwrap();
        assert_eq!(stats.boxes_run, 2);
    }

    #[test]
    fn test_expired_deadline_interrupts() {
        let mut genv = genv_with_boxes(1);
        let err = genv
            .run_all(&CancellationToken::new(), Some(Instant::now()))
            .unwrap_err();
        assert!(err.is_resumable());
        let outputs: Vec<Type> = genv
            .boxes
            .iter()
            .map(|(_, b)| genv.graph.union_of(b.output))
            .collect();
        assert_eq!(outputs, vec![Type::Bot]);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Literal(u8, usize),
        Edge(usize, usize),
        Escape(usize, usize),
    }

    fn literal(tag: u8) -> Type {
        match tag % 4 {
            0 => Type::integer(),
            1 => Type::string(),
            2 => Type::float(),
            _ => Type::nil(),
        }
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (any::<u8>(), 0..6usize).prop_map(|(t, v)| Step::Literal(t, v)),
            (0..6usize, 0..6usize).prop_map(|(a, b)| Step::Edge(a, b)),
            (0..6usize, 0..6usize).prop_map(|(a, b)| Step::Escape(a, b)),
        ]
    }

    proptest! {
        #[test]
        fn prop_type_sets_only_grow_while_edges_are_added(
            steps in prop::collection::vec(step(), 1..24)
        ) {
            let mut genv = genv_with_boxes(0);
            let vertices: Vec<VertexId> = (0..6).map(|_| genv.graph.new_vertex("v")).collect();
            let token = CancellationToken::new();
            let mut before: Vec<Vec<Type>> = vec![Vec::new(); vertices.len()];
            for step in steps {
                match step {
                    Step::Literal(tag, v) => {
                        let source = genv.graph.new_source(literal(tag), "lit");
                        genv.graph.add_edge(source, Target::Vertex(vertices[v]));
                    }
                    Step::Edge(a, b) => {
                        if a != b {
                            genv.graph.add_edge(vertices[a], Target::Vertex(vertices[b]));
                        }
                    }
                    Step::Escape(a, b) => {
                        let out = genv.graph.new_vertex("escape");
                        genv.new_box(BoxKind::Escape { input: vertices[a] }, out);
                        genv.graph.add_edge(out, Target::Vertex(vertices[b]));
                    }
                }
                genv.run_all(&token, None).unwrap();
                for (i, v) in vertices.iter().enumerate() {
                    let now: Vec<Type> = genv.graph.types(*v).cloned().collect();
                    prop_assert!(
                        before[i].iter().all(|t| now.contains(t)),
                        "vertex {} shrank from {:?} to {:?}",
                        i,
                        before[i],
                        now
                    );
                    before[i] = now;
                }
            }
            prop_assert!(genv.graph.check_integrity().is_ok());
        }
    }
}
