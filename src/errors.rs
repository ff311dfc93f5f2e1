//! Error types produced while loading catalogs, building frames and searching.

use std::path::PathBuf;

use thiserror::Error;

use crate::strength::StrengthRatios;

/// Error returned by the section catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Returned when a designation is not present in a family.
    #[error("section '{designation}' not found in '{family}'")]
    NotFound {
        /// Family that was searched.
        family: String,
        /// Designation that could not be found.
        designation: String,
    },
    /// Returned when a section family is not present in the catalog.
    #[error("section family '{0}' is not present in the catalog")]
    UnknownFamily(String),
    /// Returned when a table row cannot be read into a section.
    #[error("row {row} of the section table is malformed: {reason}")]
    MalformedRow {
        /// One-based data row number (the header row is not counted).
        row: usize,
        /// Description of the problem.
        reason: String,
    },
    /// Returned when a parsed section carries physically meaningless values.
    #[error("section '{designation}' has invalid {property} ({value})")]
    InvalidSection {
        /// Designation of the offending section.
        designation: String,
        /// Name of the rejected property.
        property: &'static str,
        /// Rejected value.
        value: f64,
    },
    /// Returned when a family already holds the designation.
    #[error("section '{designation}' appears more than once in '{family}'")]
    DuplicateSection {
        /// Family holding the duplicate.
        family: String,
        /// Repeated designation.
        designation: String,
    },
    /// Returned when the table cannot be opened.
    #[error("cannot read section table {path}: {source}")]
    Io {
        /// Path of the table.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Returned when the CSV reader itself fails (bad quoting, bad header).
    #[error("section table cannot be parsed: {0}")]
    Csv(#[from] csv::Error),
}

/// Error returned when a frame analysis fails.
///
/// Every variant is recoverable from the point of view of the search: the
/// candidate that triggered it is marked infeasible.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AnalysisError {
    /// Returned when a load record refers to a node that does not exist.
    #[error("load refers to unknown node '{0}'")]
    UnknownNode(String),
    /// Returned when a load record refers to a member that does not exist.
    #[error("load refers to unknown member '{0}'")]
    UnknownMember(String),
    /// Returned when a member references a material that is not defined.
    #[error("member '{member}' uses undefined material '{material}'")]
    MissingMaterial {
        /// Name of the member.
        member: String,
        /// Name of the missing material.
        material: String,
    },
    /// Returned when no section has been assigned to a member's role.
    #[error("member '{0}' has no assigned section")]
    MissingSection(String),
    /// Returned when a member spans zero distance.
    #[error("member '{0}' has zero length")]
    ZeroLengthMember(String),
    /// Returned when the stiffness of a member is not physically meaningful.
    #[error("member '{member}' has invalid stiffness properties: {reason}")]
    InvalidMember {
        /// Name of the member.
        member: String,
        /// Description of the invalid property.
        reason: String,
    },
    /// Returned when the stiffness matrix cannot be inverted.
    #[error("stiffness matrix is singular; check supports and connectivity")]
    SingularStiffness,
    /// Returned when the solve produced NaN or infinite displacements.
    #[error("solution for combination '{0}' is not finite")]
    NonFinite(String),
    /// Returned when the results lack the forces a strength check needs.
    #[error("no forces for member '{member}' under '{combination}'")]
    MissingForces {
        /// Name of the member.
        member: String,
        /// Name of the ultimate combination.
        combination: String,
    },
    /// Returned when the analysis or the strength checker panicked.
    #[error("evaluation panicked: {0}")]
    Panicked(String),
}

/// Error returned when editing a [`FrameTopology`](crate::FrameTopology).
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FrameEditError {
    /// Returned when a node cannot be found in the frame.
    #[error("node '{0}' does not exist in this frame")]
    UnknownNode(String),
    /// Returned when a member cannot be found in the frame.
    #[error("member '{0}' does not exist in this frame")]
    UnknownMember(String),
    /// Returned when a node, member or material name is already taken.
    #[error("name '{0}' is already used in this frame")]
    DuplicateName(String),
    /// Returned when generated portal geometry is not buildable.
    #[error("invalid frame geometry: {0}")]
    InvalidGeometry(String),
    /// Returned when a material property is zero or negative.
    #[error("material '{material}' has non-positive {property} ({value})")]
    InvalidMaterial {
        /// Name of the material.
        material: String,
        /// Name of the rejected property.
        property: &'static str,
        /// Rejected value.
        value: f64,
    },
}

/// Error returned when configuration cannot be loaded or is inconsistent.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Returned when the configuration file cannot be read.
    #[error("cannot read configuration {path}: {source}")]
    Io {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Returned when the TOML document does not match the schema.
    #[error("configuration cannot be parsed: {0}")]
    Parse(#[from] toml::de::Error),
    /// Returned when a value is out of range.
    #[error("configuration value '{field}' is invalid: {reason}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// Why the value is rejected.
        reason: String,
    },
}

/// Which deflection component exceeded its limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum DeflectionAxis {
    /// Displacement along the global X axis (sway).
    Horizontal,
    /// Displacement along the global Y axis.
    Vertical,
}

/// Reason a candidate pair was discarded by the evaluator.
///
/// These are ordinary outcomes of the search rather than failures; none of
/// them aborts the surrounding run.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Rejection {
    /// The rafter flange is wider than the column flange plus the tolerance.
    #[error("rafter flange {rafter_width} mm exceeds column flange {column_width} mm + {tolerance} mm")]
    FlangeFit {
        /// Rafter flange width.
        rafter_width: f64,
        /// Column flange width.
        column_width: f64,
        /// Permitted excess.
        tolerance: f64,
    },
    /// The analysis could not be completed.
    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
    /// A serviceability displacement exceeded its limit.
    #[error("{axis:?} deflection {value:.2} mm under '{combination}' exceeds limit {limit:.2} mm")]
    Deflection {
        /// Component that failed.
        axis: DeflectionAxis,
        /// Worst absolute displacement.
        value: f64,
        /// Configured limit.
        limit: f64,
        /// Combination that produced the worst displacement.
        combination: String,
    },
    /// An ultimate limit state ratio exceeded one.
    #[error("member '{member}' fails strength under '{combination}' (governing ratio {:.3})", .ratios.governing())]
    Strength {
        /// Member that failed.
        member: String,
        /// Ultimate combination that produced the failure.
        combination: String,
        /// Ratios reported by the strength checker.
        ratios: StrengthRatios,
    },
}

impl Rejection {
    /// Category of the rejection, used for search statistics.
    #[must_use]
    pub fn kind(&self) -> RejectionKind {
        match self {
            Self::FlangeFit { .. } => RejectionKind::FlangeFit,
            Self::Analysis(_) => RejectionKind::Analysis,
            Self::Deflection { .. } => RejectionKind::Deflection,
            Self::Strength { .. } => RejectionKind::Strength,
        }
    }
}

/// Category of a [`Rejection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum RejectionKind {
    /// Flange-fit rule.
    FlangeFit,
    /// Analysis failure.
    Analysis,
    /// Serviceability deflection.
    Deflection,
    /// Ultimate strength.
    Strength,
}

/// Error returned by the search orchestrator.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Neither search direction produced an acceptable pair.
    #[error("no acceptable design found: every candidate pair was rejected")]
    NoFeasibleDesign,
    /// The catalog could not supply the requested sections.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The frame described by the configuration cannot be built.
    #[error("frame cannot be built: {0}")]
    Frame(#[from] FrameEditError),
    /// The final re-analysis of the selected frame failed.
    #[error("re-analysis of the selected design failed: {0}")]
    Analysis(#[from] AnalysisError),
    /// The worker pool could not be created.
    #[error("worker pool cannot be created: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
