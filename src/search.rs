//! Pruned enumeration of section pairs in one nesting order.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::analysis::AnalysisOracle;
use crate::errors::{Rejection, RejectionKind};
use crate::evaluator::{CandidateEvaluator, FeasibilityReport};
use crate::section::Section;
use crate::strength::StrengthChecker;

/// Which role is enumerated in the outer loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum SearchDirection {
    /// Rafters outer, columns inner.
    RafterFirst,
    /// Columns outer, rafters inner.
    ColumnFirst,
}

impl fmt::Display for SearchDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RafterFirst => f.write_str("rafter-first"),
            Self::ColumnFirst => f.write_str("column-first"),
        }
    }
}

impl SearchDirection {
    /// Order `(outer, inner)` as `(rafter, column)`.
    fn assign<'a>(
        self,
        outer: &'a Arc<Section>,
        inner: &'a Arc<Section>,
    ) -> (&'a Arc<Section>, &'a Arc<Section>) {
        match self {
            Self::RafterFirst => (outer, inner),
            Self::ColumnFirst => (inner, outer),
        }
    }

    /// Outer-loop section of a report.
    fn outer_of(self, report: &FeasibilityReport) -> &Section {
        match self {
            Self::RafterFirst => &report.rafter,
            Self::ColumnFirst => &report.column,
        }
    }

    /// Inner-loop section of a report.
    fn inner_of(self, report: &FeasibilityReport) -> &Section {
        match self {
            Self::RafterFirst => &report.column,
            Self::ColumnFirst => &report.rafter,
        }
    }
}

/// Counters collected during one directional search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    /// Batches dispatched to the pool.
    pub batches: usize,
    /// Pairs handed to the evaluator.
    pub evaluations: usize,
    /// Outer candidates skipped by pruning.
    pub outer_skips: usize,
    /// Inner candidates skipped by pruning.
    pub inner_skips: usize,
    /// Pairs that passed every check.
    pub feasible: usize,
    /// Pairs rejected by the flange-fit rule.
    pub flange_fit: usize,
    /// Pairs whose analysis failed.
    pub analysis_failures: usize,
    /// Pairs rejected on deflection.
    pub deflection: usize,
    /// Pairs rejected on strength.
    pub strength: usize,
}

impl SearchStats {
    /// Count a rejection under its kind.
    fn record(&mut self, rejection: &Rejection) {
        match rejection.kind() {
            RejectionKind::FlangeFit => self.flange_fit += 1,
            RejectionKind::Analysis => self.analysis_failures += 1,
            RejectionKind::Deflection => self.deflection += 1,
            RejectionKind::Strength => self.strength += 1,
        }
    }
}

/// Result of one directional search.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DirectionalOutcome {
    /// Nesting order that produced the result.
    pub direction: SearchDirection,
    /// Lightest feasible pair found, if any.
    pub best: Option<FeasibilityReport>,
    /// Counters.
    pub stats: SearchStats,
}

/// Enumerates section pairs on a dedicated worker pool.
///
/// With pruning enabled the search applies a mass and depth heuristic taken
/// over from the manual design procedure. It is not exact: a lighter pair that
/// the heuristic skips is never evaluated. Disable pruning for an exhaustive
/// enumeration.
pub struct DirectionalSearch<'e, O, S> {
    /// Evaluator shared with the other direction.
    evaluator: &'e CandidateEvaluator<O, S>,
    /// Pool the batches run on, possibly shared with the other direction.
    pool: Arc<ThreadPool>,
    /// Whether the mass and depth heuristic is applied.
    pruning: bool,
}

impl<'e, O: AnalysisOracle, S: StrengthChecker> DirectionalSearch<'e, O, S> {
    /// Create a search with `workers` threads; zero uses the available
    /// parallelism.
    ///
    /// # Errors
    ///
    /// Returns the pool builder error when the threads cannot be spawned.
    pub fn new(
        evaluator: &'e CandidateEvaluator<O, S>,
        workers: usize,
        pruning: bool,
    ) -> Result<Self, ThreadPoolBuildError> {
        Ok(Self::with_pool(evaluator, Arc::new(worker_pool(workers)?), pruning))
    }

    /// Create a search that runs its batches on an existing pool.
    #[must_use]
    pub fn with_pool(
        evaluator: &'e CandidateEvaluator<O, S>,
        pool: Arc<ThreadPool>,
        pruning: bool,
    ) -> Self {
        Self {
            evaluator,
            pool,
            pruning,
        }
    }

    /// Find the lightest feasible pair enumerating `direction`'s outer role
    /// first.
    ///
    /// Candidate lists must be in ascending order of mass. Each surviving
    /// outer section forms one batch with its surviving inner partners; the
    /// pruning bounds are those known when the batch is dispatched. Within
    /// equal weights the pair enumerated first wins.
    pub fn search(
        &self,
        direction: SearchDirection,
        rafters: &[Arc<Section>],
        columns: &[Arc<Section>],
    ) -> DirectionalOutcome {
        let span = info_span!("directional_search", %direction);
        let _guard = span.enter();
        let (outer_candidates, inner_candidates) = match direction {
            SearchDirection::RafterFirst => (rafters, columns),
            SearchDirection::ColumnFirst => (columns, rafters),
        };

        let mut stats = SearchStats::default();
        let mut best: Option<FeasibilityReport> = None;
        for outer in outer_candidates {
            if let Some(current) = best.as_ref().filter(|_| self.pruning) {
                if !improves(outer, direction.outer_of(current)) {
                    stats.outer_skips += 1;
                    continue;
                }
            }

            let mut batch = Vec::with_capacity(inner_candidates.len());
            for inner in inner_candidates {
                if let Some(current) = best.as_ref().filter(|_| self.pruning) {
                    if !improves(inner, direction.inner_of(current)) {
                        stats.inner_skips += 1;
                        continue;
                    }
                }
                batch.push(inner);
            }

            if !batch.is_empty() {
                stats.batches += 1;
                stats.evaluations += batch.len();
                debug!(outer = %outer.designation, size = batch.len(), "dispatching batch");
                let results: Vec<Result<FeasibilityReport, Rejection>> = self.pool.install(|| {
                    batch
                        .par_iter()
                        .map(|inner| {
                            let (rafter, column) = direction.assign(outer, inner);
                            self.evaluator.evaluate(rafter, column)
                        })
                        .collect()
                });
                for result in results {
                    match result {
                        Ok(report) => {
                            stats.feasible += 1;
                            if best.as_ref().map_or(true, |current| report.weight < current.weight) {
                                best = Some(report);
                            }
                        }
                        Err(rejection) => stats.record(&rejection),
                    }
                }
            }

            if let Some(current) = best.as_ref().filter(|_| self.pruning) {
                if outer.mass >= direction.outer_of(current).mass {
                    break;
                }
            }
        }

        info!(
            batches = stats.batches,
            evaluations = stats.evaluations,
            feasible = stats.feasible,
            best = ?best.as_ref().map(|report| report.weight),
            "directional search finished"
        );
        DirectionalOutcome {
            direction,
            best,
            stats,
        }
    }
}

/// Build the named worker pool; zero threads uses the available parallelism.
///
/// # Errors
///
/// Returns the pool builder error when the threads cannot be spawned.
pub fn worker_pool(workers: usize) -> Result<ThreadPool, ThreadPoolBuildError> {
    ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|index| format!("portalx-worker-{index}"))
        .build()
}

/// Whether `candidate` could still beat `incumbent`: lighter and deeper.
fn improves(candidate: &Section, incumbent: &Section) -> bool {
    candidate.mass < incumbent.mass && candidate.height > incumbent.height
}
