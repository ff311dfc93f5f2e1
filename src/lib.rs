#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_doc_code_examples)]
#![warn(clippy::missing_docs_in_private_items)]

//! Lightest-section search for single-span steel portal frames.
//!
//! Given a portal frame topology, its load records and a catalog of rolled
//! steel sections, `portalx` finds the lightest rafter/column pair whose frame
//! satisfies the serviceability deflection limits and, optionally, the
//! ultimate limit state strength checks.
//!
//! The search enumerates pairs in two nesting orders (rafters outer and
//! columns outer) on a `rayon` worker pool, prunes with a mass and depth
//! heuristic and keeps the lighter of the two directional results.
//!
//! ```
//! use portalx::{ProjectConfig, SearchOrchestrator, SectionCatalog};
//!
//! let table = "\
//! Designation,family,m,h,b,tw,tf,A,Ix,Iy,Zex,Zey,Zplx,Zply,rx,ry,J,Cw,preferred
//! 406x178x60,I-Sections,60.1,406.4,177.9,7.9,12.8,7.65,216.0,12.0,1060.0,135.0,1200.0,209.0,168.0,39.6,461.0,299.0,yes
//! 457x191x82,I-Sections,82.0,460.0,191.3,9.9,16.0,10.4,371.0,18.7,1610.0,196.0,1830.0,304.0,189.0,42.3,691.0,593.0,yes
//! ";
//! let catalog = SectionCatalog::from_csv_reader(table.as_bytes()).expect("table loads");
//! let orchestrator = SearchOrchestrator::from_project(&ProjectConfig::default(), catalog)
//!     .expect("project is valid");
//! match orchestrator.run() {
//!     Ok(design) => println!("{} / {}", design.rafter.designation, design.column.designation),
//!     Err(error) => println!("{error}"),
//! }
//! ```
//!
//! Units throughout are millimetres, newtons and megapascals; section tables
//! use the customary catalog units and are converted by
//! [`Section::properties`].

pub mod analysis;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod evaluator;
pub mod frame;
pub mod geometry;
pub mod loads;
pub mod orchestrator;
pub mod portal;
pub mod search;
pub mod section;
pub mod solver;
pub mod strength;

pub use analysis::{AnalysisOracle, AnalysisResults, MemberForces, SectionAssignment};
pub use catalog::SectionCatalog;
pub use config::{DeflectionLimits, DesignConfig, ProjectConfig};
pub use errors::{
    AnalysisError, CatalogError, ConfigError, DeflectionAxis, FrameEditError, Rejection,
    RejectionKind, SearchError,
};
pub use evaluator::{CandidateEvaluator, DeflectionExtreme, FeasibilityReport, StrengthSummary};
pub use frame::{FrameTopology, Material, MemberRole, Support};
pub use geometry::{point, Displacement, InternalForces, Point};
pub use loads::{
    LimitState, LoadCombination, LoadDirection, LoadGenerator, LoadRecord, MemberLoad, NodeLoad,
    PortalLoadGenerator, WindParameters,
};
pub use orchestrator::{SearchOrchestrator, SelectedDesign};
pub use portal::{PortalGeometry, RoofShape};
pub use search::{worker_pool, DirectionalOutcome, DirectionalSearch, SearchDirection, SearchStats};
pub use section::{Section, SectionProperties};
pub use solver::StiffnessSolver;
pub use strength::{LimitStateChecker, MemberContext, StrengthChecker, StrengthRatios};
