#![warn(clippy::pedantic)]

use std::sync::Arc;

use approx::assert_relative_eq;
use portalx::{
    point, AnalysisOracle, FrameTopology, LimitState, LoadCombination, LoadDirection,
    LoadGenerator, LoadRecord, Material, MemberRole, NodeLoad, PortalGeometry,
    PortalLoadGenerator, ProjectConfig, SearchOrchestrator, Section, SectionAssignment,
    SectionCatalog, StiffnessSolver, Support, WindParameters,
};

const TABLE: &str = "\
Designation,family,m,h,b,tw,tf,A,Ix,Iy,Zex,Zey,Zplx,Zply,rx,ry,J,Cw,preferred
406x178x60,I-Sections,60.1,406.4,177.9,7.9,12.8,7.65,216.0,12.0,1060.0,135.0,1200.0,209.0,168.0,39.6,461.0,299.0,yes
457x191x82,I-Sections,82.0,460.0,191.3,9.9,16.0,10.4,371.0,18.7,1610.0,196.0,1830.0,304.0,189.0,42.3,691.0,593.0,yes
457x152x52,I-Sections,52.3,449.8,152.4,7.6,10.9,6.66,214.0,6.45,950.0,84.6,1100.0,133.0,179.0,31.1,214.0,313.0,no
";

#[derive(Debug, Clone)]
struct PortalSetup {
    frame: FrameTopology,
    sections: SectionAssignment,
    loads: Vec<LoadRecord>,
}

fn catalog() -> SectionCatalog {
    SectionCatalog::from_csv_reader(TABLE.as_bytes()).expect("section table loads")
}

fn build_portal() -> PortalSetup {
    let frame = PortalGeometry::default()
        .build()
        .expect("default portal geometry builds");
    let section = catalog()
        .lookup("I-Sections", "457x191x82")
        .expect("section is in the table");
    let loads = PortalLoadGenerator::default().generate(&frame, &WindParameters::default());
    PortalSetup {
        frame,
        sections: SectionAssignment::new(Arc::clone(&section), section),
        loads,
    }
}

#[test]
fn builds_expected_topology() {
    let setup = build_portal();

    assert_eq!(setup.frame.node_count(), 13);
    assert_eq!(setup.frame.member_count(), 12);
    let spans = setup.frame.characteristic_spans();
    assert_relative_eq!(spans.span, 12_000.0);
    assert_relative_eq!(spans.eaves_height, 4_000.0);
    assert_relative_eq!(setup.frame.role_length(MemberRole::Column), 8_000.0, epsilon = 1.0e-9);
}

#[test]
fn symmetric_gravity_load_gives_symmetric_response() {
    let setup = build_portal();
    let dead = [LoadCombination::new("D", LimitState::Serviceability).with_factor("D", 1.0)];

    let results = StiffnessSolver::with_self_weight()
        .analyze(&setup.frame, &setup.sections, &setup.loads, &dead)
        .expect("portal analysis succeeds");

    let left = results.displacement("N3", "D").expect("left eaves displacement");
    let right = results.displacement("N11", "D").expect("right eaves displacement");
    let apex = results.displacement("N7", "D").expect("apex displacement");

    // Eaves spread outwards by the same amount; the apex drops straight down.
    assert!(left.x < 0.0);
    assert_relative_eq!(left.x, -right.x, max_relative = 1.0e-6);
    assert_relative_eq!(left.y, right.y, max_relative = 1.0e-6);
    assert!(apex.y < 0.0);
    assert!(apex.x.abs() < 1.0e-6 * apex.y.abs());

    let base = results.displacement("N1", "D").expect("base displacement");
    assert_relative_eq!(base.x, 0.0);
    assert_relative_eq!(base.y, 0.0);
}

#[test]
fn column_shortening_matches_closed_form_solution() {
    let mut frame = FrameTopology::new();
    frame
        .add_material("steel", Material::steel_s355())
        .expect("material registers");
    frame.add_node("base", point(0.0, 0.0)).expect("base node added");
    frame.add_node("top", point(0.0, 4_000.0)).expect("top node added");
    frame
        .add_member("column", "base", "top", MemberRole::Column, "steel")
        .expect("column added");
    frame
        .set_support("base", Support::FIXED)
        .expect("base support assignment succeeds");
    frame
        .set_support(
            "top",
            Support {
                dx: true,
                dy: false,
                rz: true,
            },
        )
        .expect("top guide assignment succeeds");

    let load = -250_000.0;
    let loads = [LoadRecord::Node(NodeLoad {
        node: "top".to_string(),
        direction: LoadDirection::GlobalY,
        magnitude: load,
        case: "P".to_string(),
    })];
    let combination = [LoadCombination::new("P", LimitState::Ultimate).with_factor("P", 1.0)];
    let section = catalog()
        .lookup("I-Sections", "406x178x60")
        .expect("section is in the table");
    let sections = SectionAssignment::new(Arc::clone(&section), Arc::clone(&section));

    let results = StiffnessSolver::without_self_weight()
        .analyze(&frame, &sections, &loads, &combination)
        .expect("column analysis succeeds");

    let top = results.displacement("top", "P").expect("top displacement available");
    let expected = load * 4_000.0 / (200_000.0 * section.properties().area);
    assert_relative_eq!(top.y, expected, max_relative = 1.0e-9);

    let forces = results
        .member_forces("column", "P")
        .expect("column forces available");
    assert_relative_eq!(forces.max_compression(), -load, max_relative = 1.0e-9);
    assert_relative_eq!(forces.max_abs_moment(), 0.0, epsilon = 1.0e-3);
}

#[test]
fn stiffness_solver_search_selects_a_valid_design() {
    let project = ProjectConfig::default();
    let orchestrator =
        SearchOrchestrator::from_project(&project, catalog()).expect("project is valid");
    let design = orchestrator.run().expect("a preferred pair satisfies the criteria");

    let limits = orchestrator.evaluator().limits();
    assert!(design.report.vertical.value <= limits.vertical);
    assert!(design.report.horizontal.value <= limits.horizontal);
    assert!(design.rafter.flange_width <= design.column.flange_width + project.design.flange_tolerance);
    assert!(design.rafter.preferred && design.column.preferred);

    let strength = design
        .report
        .strength
        .as_ref()
        .expect("strength was checked");
    assert!(strength.ratios.governing() <= 1.0);

    let evaluator = orchestrator.evaluator();
    assert_eq!(
        evaluator.loads(),
        PortalLoadGenerator::default()
            .generate(evaluator.frame(), &WindParameters::default())
            .as_slice()
    );

    let frame = evaluator.frame();
    let expected_weight: f64 = [
        (MemberRole::Rafter, &design.rafter),
        (MemberRole::Column, &design.column),
    ]
    .iter()
    .map(|(role, section): &(MemberRole, &Arc<Section>)| section.mass * frame.role_length_m(*role))
    .sum();
    assert_relative_eq!(design.report.weight, expected_weight, epsilon = 1.0e-9);

    let json = design.report.to_json().expect("report serializes");
    assert!(json.contains(&design.rafter.designation));

    let apex = design
        .serviceability
        .displacement("N7", "SLS: D + L")
        .expect("re-analysis covers serviceability");
    assert!(apex.y < 0.0);
    assert!(design
        .ultimate
        .member_forces("M1", "ULS: 1.2D + 1.6L")
        .is_some());
}
