//! Runs both directional searches and re-analyzes the winning design.

use std::sync::Arc;

use tracing::{info, warn};

use crate::analysis::{AnalysisOracle, AnalysisResults, SectionAssignment};
use crate::catalog::SectionCatalog;
use crate::config::{DesignConfig, ProjectConfig};
use crate::errors::SearchError;
use crate::evaluator::{CandidateEvaluator, FeasibilityReport};
use crate::loads::{LoadCombination, LoadGenerator, WIND_CASES};
use crate::search::{worker_pool, DirectionalOutcome, DirectionalSearch, SearchDirection};
use crate::section::Section;
use crate::solver::StiffnessSolver;
use crate::strength::{LimitStateChecker, StrengthChecker};

/// The lightest accepted design with its full analysis results.
#[derive(Clone, Debug)]
pub struct SelectedDesign {
    /// Report of the winning pair.
    pub report: FeasibilityReport,
    /// Rafter section, freshly looked up in the catalog.
    pub rafter: Arc<Section>,
    /// Column section, freshly looked up in the catalog.
    pub column: Arc<Section>,
    /// Results of every serviceability combination.
    pub serviceability: AnalysisResults,
    /// Results of every ultimate combination.
    pub ultimate: AnalysisResults,
    /// Outcome of the rafter-first search.
    pub rafter_first: DirectionalOutcome,
    /// Outcome of the column-first search.
    pub column_first: DirectionalOutcome,
}

/// Drives a complete lightest-section search.
#[derive(Debug)]
pub struct SearchOrchestrator<O, S> {
    /// Source of both candidate lists.
    catalog: SectionCatalog,
    /// Evaluator shared by both directions.
    evaluator: CandidateEvaluator<O, S>,
    /// Families, flags and pool size.
    config: DesignConfig,
}

impl SearchOrchestrator<StiffnessSolver, LimitStateChecker> {
    /// Set up a search over a generated portal frame with the built-in
    /// solver and strength checker.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for invalid settings and
    /// [`SearchError::Frame`] when the geometry cannot be built.
    pub fn from_project(project: &ProjectConfig, catalog: SectionCatalog) -> Result<Self, SearchError> {
        project.validate()?;
        let frame = project.geometry.build()?;
        let loads = project.loads.generate(&frame, &project.wind);
        let combinations = LoadCombination::standard_set(&WIND_CASES);
        let limits = project.design.deflection_limits(frame.characteristic_spans());
        let evaluator = CandidateEvaluator::new(
            frame,
            loads,
            &combinations,
            limits,
            StiffnessSolver::with_self_weight(),
            LimitStateChecker::default(),
        );
        Ok(Self::new(catalog, evaluator, project.design.clone()))
    }
}

impl<O: AnalysisOracle, S: StrengthChecker> SearchOrchestrator<O, S> {
    /// Combine a catalog, an evaluator and the search settings.
    ///
    /// The evaluator's flange tolerance and strength flag are taken from
    /// `config`.
    pub fn new(catalog: SectionCatalog, evaluator: CandidateEvaluator<O, S>, config: DesignConfig) -> Self {
        let evaluator = evaluator
            .with_flange_tolerance(config.flange_tolerance)
            .with_strength_checks(config.strength_aware);
        Self {
            catalog,
            evaluator,
            config,
        }
    }

    /// Evaluator shared by both searches.
    #[must_use]
    pub fn evaluator(&self) -> &CandidateEvaluator<O, S> {
        &self.evaluator
    }

    /// Search both nesting orders and return the lighter result.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Catalog`] when a configured family is missing,
    /// [`SearchError::NoFeasibleDesign`] when every pair is rejected and
    /// [`SearchError::Analysis`] when the final re-analysis fails.
    pub fn run(&self) -> Result<SelectedDesign, SearchError> {
        self.config.validate()?;
        let config = &self.config;
        let rafters = self
            .catalog
            .candidates(&config.rafter_family, config.preferred_only)?;
        let columns = self
            .catalog
            .candidates(&config.column_family, config.preferred_only)?;
        info!(
            rafters = rafters.len(),
            columns = columns.len(),
            pruning = config.pruning,
            "starting section search"
        );

        // Both directions draw on one pool of `workers` threads.
        let pool = Arc::new(worker_pool(config.workers)?);
        let rafter_search =
            DirectionalSearch::with_pool(&self.evaluator, Arc::clone(&pool), config.pruning);
        let column_search =
            DirectionalSearch::with_pool(&self.evaluator, Arc::clone(&pool), config.pruning);
        let (rafter_first, column_first) = pool.install(|| {
            rayon::join(
                || rafter_search.search(SearchDirection::RafterFirst, &rafters, &columns),
                || column_search.search(SearchDirection::ColumnFirst, &rafters, &columns),
            )
        });

        let winner = match (&rafter_first.best, &column_first.best) {
            (Some(a), Some(b)) => {
                if b.weight < a.weight {
                    b
                } else {
                    a
                }
            }
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => {
                warn!("no section pair satisfies the design criteria");
                return Err(SearchError::NoFeasibleDesign);
            }
        };
        let report = winner.clone();

        let rafter = self
            .catalog
            .lookup(&config.rafter_family, &report.rafter.designation)?;
        let column = self
            .catalog
            .lookup(&config.column_family, &report.column.designation)?;
        let sections = SectionAssignment::new(Arc::clone(&rafter), Arc::clone(&column));
        let serviceability = self
            .evaluator
            .analyze(&sections, self.evaluator.serviceability())?;
        let ultimate = self.evaluator.analyze(&sections, self.evaluator.ultimate())?;
        info!(
            rafter = %rafter.designation,
            column = %column.designation,
            weight = report.weight,
            "selected design"
        );

        Ok(SelectedDesign {
            report,
            rafter,
            column,
            serviceability,
            ultimate,
            rafter_first,
            column_first,
        })
    }
}
