//! Elaboration and per-tick metrics.
//!
//! [`ElaborationMetrics`] summarizes the graph a design elaborated into;
//! [`TickMetrics`] captures the most recent successful cycle.

/// Counts and timing collected during one elaboration.
///
/// Durations are in microseconds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElaborationMetrics {
    /// Number of scheduled update blocks.
    pub blocks: usize,
    /// Number of resolved nets.
    pub nets: usize,
    /// Inferred writer → reader edges, sequential ones included.
    pub inferred_edges: usize,
    /// Inferred edges classified sequential and removed from ordering.
    pub sequential_edges: usize,
    /// Explicit constraints.
    pub explicit_edges: usize,
    /// Dependency levels in the schedule.
    pub batches: usize,
    /// Wall-clock time for the whole elaboration, in microseconds.
    pub elapsed_us: u64,
}

/// Metrics from a single tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickMetrics {
    /// Cycle number the tick completed.
    pub cycle: u64,
    /// Update blocks run.
    pub blocks_run: usize,
    /// Wall-clock time for the tick, in microseconds.
    pub elapsed_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let e = ElaborationMetrics::default();
        assert_eq!(e.blocks, 0);
        assert_eq!(e.nets, 0);
        assert_eq!(e.inferred_edges, 0);
        assert_eq!(e.sequential_edges, 0);
        assert_eq!(e.explicit_edges, 0);
        assert_eq!(e.batches, 0);
        assert_eq!(e.elapsed_us, 0);

        let t = TickMetrics::default();
        assert_eq!(t.cycle, 0);
        assert_eq!(t.blocks_run, 0);
        assert_eq!(t.elapsed_us, 0);
    }
}
