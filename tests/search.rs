#![warn(clippy::pedantic)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use portalx::{
    AnalysisError, AnalysisOracle, AnalysisResults, CandidateEvaluator, DeflectionLimits,
    DesignConfig, DirectionalSearch, Displacement, FrameTopology, LimitState, LimitStateChecker,
    LoadCombination, LoadRecord, MemberRole, PortalGeometry, Rejection, SearchDirection,
    SearchError, SearchOrchestrator, Section, SectionAssignment, SectionCatalog,
};

const LIMIT: f64 = 10.0;

/// Reports one displacement per candidate, decided by the two sections.
struct StubOracle<F> {
    response: F,
    calls: Arc<AtomicUsize>,
}

impl<F> StubOracle<F>
where
    F: Fn(&Section, &Section) -> Result<f64, AnalysisError> + Send + Sync,
{
    /// The oracle and a handle on its call counter.
    fn new(response: F) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                response,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl<F> AnalysisOracle for StubOracle<F>
where
    F: Fn(&Section, &Section) -> Result<f64, AnalysisError> + Send + Sync,
{
    fn analyze(
        &self,
        frame: &FrameTopology,
        sections: &SectionAssignment,
        _loads: &[LoadRecord],
        combinations: &[LoadCombination],
    ) -> Result<AnalysisResults, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let sag = (self.response)(&sections.rafter, &sections.column)?;
        let mut results = AnalysisResults::new();
        for combination in combinations {
            for (_, node) in frame.nodes() {
                results.insert_displacement(
                    &node.name,
                    &combination.name,
                    Displacement::new(sag / 2.0, -sag, 0.0),
                );
            }
        }
        Ok(results)
    }
}

fn section(designation: &str, family: &str, mass: f64, height: f64) -> Section {
    Section {
        designation: designation.to_string(),
        family: family.to_string(),
        mass,
        height,
        flange_width: 150.0,
        area: mass / 8.0,
        ix: height / 2.0,
        iy: 5.0,
        preferred: true,
        ..Section::default()
    }
}

fn catalog(rafters: &[(&str, f64, f64)], columns: &[(&str, f64, f64)]) -> SectionCatalog {
    let mut catalog = SectionCatalog::new();
    for (designation, mass, height) in rafters {
        catalog
            .insert(section(designation, "Rafters", *mass, *height))
            .expect("rafter inserts");
    }
    for (designation, mass, height) in columns {
        catalog
            .insert(section(designation, "Columns", *mass, *height))
            .expect("column inserts");
    }
    catalog
}

fn scenario_catalog() -> SectionCatalog {
    catalog(
        &[("R1", 10.0, 200.0), ("R2", 15.0, 250.0)],
        &[("C1", 20.0, 200.0), ("C2", 25.0, 300.0)],
    )
}

fn config(pruning: bool) -> DesignConfig {
    DesignConfig {
        rafter_family: "Rafters".to_string(),
        column_family: "Columns".to_string(),
        workers: 2,
        pruning,
        strength_aware: false,
        ..DesignConfig::default()
    }
}

fn evaluator<O: AnalysisOracle>(oracle: O) -> CandidateEvaluator<O, LimitStateChecker> {
    let frame = PortalGeometry::default().build().expect("geometry builds");
    let combinations = vec![
        LoadCombination::new("SLS: D", LimitState::Serviceability).with_factor("D", 1.0),
        LoadCombination::new("ULS: 1.2D", LimitState::Ultimate).with_factor("D", 1.2),
    ];
    CandidateEvaluator::new(
        frame,
        Vec::new(),
        &combinations,
        DeflectionLimits {
            vertical: LIMIT,
            horizontal: LIMIT,
        },
        oracle,
        LimitStateChecker::default(),
    )
    .with_strength_checks(false)
}

fn role_lengths() -> (f64, f64) {
    let frame = PortalGeometry::default().build().expect("geometry builds");
    (
        frame.role_length_m(MemberRole::Rafter),
        frame.role_length_m(MemberRole::Column),
    )
}

#[test]
fn both_directions_converge_to_the_lightest_pair() {
    // R1 only works with columns at least 150 mm deep, which both are.
    let (oracle, _) = StubOracle::new(|rafter, column| {
        Ok(if rafter.designation == "R1" && column.height < 150.0 {
            2.0 * LIMIT
        } else {
            1.0
        })
    });
    let orchestrator = SearchOrchestrator::new(scenario_catalog(), evaluator(oracle), config(true));
    let design = orchestrator.run().expect("a design is found");

    let (rafter_length, column_length) = role_lengths();
    assert_eq!(design.rafter.designation, "R1");
    assert_eq!(design.column.designation, "C1");
    assert!((design.report.weight - (rafter_length * 10.0 + column_length * 20.0)).abs() < 1.0e-9);
    for outcome in [&design.rafter_first, &design.column_first] {
        let best = outcome.best.as_ref().expect("direction finds a pair");
        assert_eq!(
            (best.rafter.designation.as_str(), best.column.designation.as_str()),
            ("R1", "C1")
        );
    }
    assert!(design.serviceability.displacement("N7", "SLS: D").is_some());
    assert!(design.ultimate.displacement("N7", "ULS: 1.2D").is_some());
}

#[test]
fn flange_fit_rejection_makes_no_analysis_call() {
    let (oracle, calls) = StubOracle::new(|_, _| Ok(1.0));
    let evaluator = evaluator(oracle);
    let rafter = Arc::new(Section {
        flange_width: 200.0,
        ..section("R", "Rafters", 10.0, 200.0)
    });
    let column = Arc::new(section("C", "Columns", 20.0, 200.0));

    let rejection = evaluator
        .evaluate(&rafter, &column)
        .expect_err("flange too wide");
    assert!(matches!(rejection, Rejection::FlangeFit { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn accepted_reports_stay_within_limits() {
    // Deflection falls with column depth; only the deeper column passes.
    let (oracle, calls) = StubOracle::new(|_, column| {
        Ok(if column.designation == "C1" { 2.0 * LIMIT } else { LIMIT })
    });
    let evaluator = evaluator(oracle);
    let catalog = scenario_catalog();
    let rafters = catalog.sections_of("Rafters").expect("family");
    let columns = catalog.sections_of("Columns").expect("family");
    let search = DirectionalSearch::new(&evaluator, 1, false).expect("pool builds");
    let outcome = search.search(SearchDirection::RafterFirst, rafters, columns);

    // Exactly at the limit is still acceptable.
    let best = outcome.best.expect("deep column passes");
    assert_eq!(best.column.designation, "C2");
    assert!(best.vertical.value <= LIMIT);
    assert!(best.horizontal.value <= LIMIT);
    assert_eq!(outcome.stats.evaluations, 4);
    assert_eq!(outcome.stats.deflection, 2);
    assert_eq!(outcome.stats.feasible, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn repeated_searches_are_identical() {
    let (oracle, _) = StubOracle::new(|rafter, column| {
        Ok(if rafter.designation == "R1" && column.designation == "C1" { 50.0 } else { 3.0 })
    });
    let evaluator = evaluator(oracle);
    let catalog = scenario_catalog();
    let rafters = catalog.sections_of("Rafters").expect("family");
    let columns = catalog.sections_of("Columns").expect("family");
    let search = DirectionalSearch::new(&evaluator, 4, true).expect("pool builds");

    let first = search.search(SearchDirection::ColumnFirst, rafters, columns);
    let second = search.search(SearchDirection::ColumnFirst, rafters, columns);
    assert_eq!(first, second);
    assert!(first.best.is_some());
}

#[test]
fn pruning_never_costs_more_than_exhaustive_enumeration() {
    let rafters = [("R0", 10.0, 200.0), ("R1", 20.0, 250.0), ("R2", 30.0, 300.0)];
    let columns = [("C0", 15.0, 200.0), ("C1", 25.0, 250.0), ("C2", 35.0, 300.0)];
    let index = |designation: &str| -> u32 {
        designation[1..].parse().expect("numbered designation")
    };
    // A pair is stiff enough when its combined index reaches two.
    let response = move |rafter: &Section, column: &Section| {
        let combined = index(&rafter.designation) + index(&column.designation);
        Ok::<f64, AnalysisError>(if combined >= 2 { 1.0 } else { 3.0 * LIMIT })
    };

    let mut selections = Vec::new();
    let mut calls = Vec::new();
    for pruning in [true, false] {
        let (oracle, calls_made) = StubOracle::new(response);
        let orchestrator = SearchOrchestrator::new(
            catalog(&rafters, &columns),
            evaluator(oracle),
            config(pruning),
        );
        let design = orchestrator.run().expect("a design is found");
        // Two re-analysis calls follow the search.
        calls.push(calls_made.load(Ordering::SeqCst) - 2);
        selections.push((
            design.rafter.designation.clone(),
            design.column.designation.clone(),
            design.report.weight,
        ));
    }

    assert!(calls[0] <= calls[1], "pruned {} exhaustive {}", calls[0], calls[1]);
    assert_eq!(calls[1], 2 * 9);
    assert_eq!(selections[0], selections[1]);
    assert_eq!((selections[0].0.as_str(), selections[0].1.as_str()), ("R0", "C2"));
}

#[test]
fn excessive_deflection_everywhere_means_no_feasible_design() {
    let (oracle, calls) = StubOracle::new(|_, _| Ok(LIMIT * 100.0));
    let orchestrator = SearchOrchestrator::new(scenario_catalog(), evaluator(oracle), config(true));
    let error = orchestrator.run().expect_err("nothing passes");
    assert!(matches!(error, SearchError::NoFeasibleDesign));
    assert_eq!(calls.load(Ordering::SeqCst), 8);
}

#[test]
fn failing_analysis_excludes_only_that_candidate() {
    let (oracle, _) = StubOracle::new(|rafter, column| {
        if rafter.designation == "R1" && column.designation == "C1" {
            Err(AnalysisError::SingularStiffness)
        } else {
            Ok(1.0)
        }
    });
    let orchestrator = SearchOrchestrator::new(scenario_catalog(), evaluator(oracle), config(true));
    let design = orchestrator.run().expect("other pairs remain");

    let (rafter_length, column_length) = role_lengths();
    let brute_force = [("R1", 10.0, "C2", 25.0), ("R2", 15.0, "C1", 20.0), ("R2", 15.0, "C2", 25.0)]
        .into_iter()
        .map(|(r, rm, c, cm)| (r, c, rafter_length * rm + column_length * cm))
        .min_by(|a, b| a.2.total_cmp(&b.2))
        .expect("candidates exist");
    assert_eq!(design.rafter.designation, brute_force.0);
    assert_eq!(design.column.designation, brute_force.1);
    assert!((design.report.weight - brute_force.2).abs() < 1.0e-9);
    assert_eq!(design.rafter_first.stats.analysis_failures, 1);
}

#[test]
fn unknown_family_aborts_before_searching() {
    let (oracle, calls) = StubOracle::new(|_, _| Ok(1.0));
    let orchestrator = SearchOrchestrator::new(
        scenario_catalog(),
        evaluator(oracle),
        DesignConfig {
            column_family: "Channels".to_string(),
            ..config(true)
        },
    );
    let error = orchestrator.run().expect_err("family is missing");
    assert!(matches!(error, SearchError::Catalog(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

fn expected_weight(rafter_mass: f64, column_mass: f64) -> f64 {
    let (rafter_length, column_length) = role_lengths();
    rafter_length * rafter_mass + column_length * column_mass
}

#[test]
fn shallow_columns_rule_out_the_light_rafter() {
    let (oracle, _) = StubOracle::new(|rafter, column| {
        Ok(if rafter.designation == "R1" && column.height < 150.0 {
            2.0 * LIMIT
        } else {
            1.0
        })
    });
    let shallow = catalog(
        &[("R1", 10.0, 200.0), ("R2", 15.0, 250.0)],
        &[("C1", 20.0, 140.0), ("C2", 25.0, 300.0)],
    );
    let orchestrator = SearchOrchestrator::new(shallow, evaluator(oracle), config(false));
    let design = orchestrator.run().expect("a design is found");

    // R1 + C2 (10 and 25 kg/m) against R2 + C1 (15 and 20 kg/m).
    let (rafter, column, weight) = [("R1", 10.0, "C2", 25.0), ("R2", 15.0, "C1", 20.0)]
        .into_iter()
        .map(|(r, rm, c, cm)| (r, c, expected_weight(rm, cm)))
        .min_by(|a, b| a.2.total_cmp(&b.2))
        .expect("candidates exist");
    assert_eq!(design.rafter.designation, rafter);
    assert_eq!(design.column.designation, column);
    assert!((design.report.weight - weight).abs() < 1.0e-9);
}

#[test]
fn panicking_analysis_excludes_only_that_candidate() {
    let (oracle, _) = StubOracle::new(|_rafter, column| {
        assert!(column.designation != "C1", "solver blew up on {}", column.designation);
        Ok(1.0)
    });
    let orchestrator = SearchOrchestrator::new(scenario_catalog(), evaluator(oracle), config(true));
    let design = orchestrator.run().expect("pairs without C1 remain");

    assert_eq!(design.rafter.designation, "R1");
    assert_eq!(design.column.designation, "C2");
    assert!((design.report.weight - expected_weight(10.0, 25.0)).abs() < 1.0e-9);
    assert!(design.rafter_first.stats.analysis_failures >= 1);
}

#[test]
fn panic_is_reported_as_an_analysis_rejection() {
    let (oracle, _) = StubOracle::new(|_, _| -> Result<f64, AnalysisError> {
        panic!("stiffness assembly failed")
    });
    let evaluator = evaluator(oracle);
    let rafter = Arc::new(section("R", "Rafters", 10.0, 200.0));
    let column = Arc::new(section("C", "Columns", 20.0, 200.0));

    let rejection = evaluator
        .evaluate(&rafter, &column)
        .expect_err("panic becomes a rejection");
    assert!(matches!(
        rejection,
        Rejection::Analysis(AnalysisError::Panicked(ref message)) if message.contains("stiffness assembly")
    ));
}

/// Records the identity of every worker thread that runs an analysis.
struct ThreadRecorder {
    threads: Arc<Mutex<HashSet<ThreadId>>>,
}

impl AnalysisOracle for ThreadRecorder {
    fn analyze(
        &self,
        frame: &FrameTopology,
        _sections: &SectionAssignment,
        _loads: &[LoadRecord],
        combinations: &[LoadCombination],
    ) -> Result<AnalysisResults, AnalysisError> {
        let current = thread::current();
        if current
            .name()
            .is_some_and(|name| name.starts_with("portalx-worker-"))
        {
            self.threads
                .lock()
                .expect("thread set lock")
                .insert(current.id());
        }
        let mut results = AnalysisResults::new();
        for combination in combinations {
            for (_, node) in frame.nodes() {
                results.insert_displacement(&node.name, &combination.name, Displacement::default());
            }
        }
        Ok(results)
    }
}

#[test]
fn both_directions_share_the_configured_worker_count() {
    let threads = Arc::new(Mutex::new(HashSet::new()));
    let oracle = ThreadRecorder {
        threads: Arc::clone(&threads),
    };
    let sizes = [("S0", 10.0, 200.0), ("S1", 20.0, 250.0), ("S2", 30.0, 300.0), ("S3", 40.0, 350.0)];
    let orchestrator = SearchOrchestrator::new(
        catalog(&sizes, &sizes),
        evaluator(oracle),
        config(false),
    );
    let design = orchestrator.run().expect("every pair passes");
    assert_eq!(design.rafter_first.stats.evaluations, 16);
    assert_eq!(design.column_first.stats.evaluations, 16);

    let used = threads.lock().expect("thread set lock").len();
    assert!((1..=2).contains(&used), "{used} worker threads used");
}
