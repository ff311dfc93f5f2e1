//! Load records, load combinations and the portal frame load generator.
//!
//! Forces are in N, line loads in N/mm and moments in N.mm. Member line loads
//! are trapezoidal over the full member length and measured per unit length
//! of the member.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::frame::{FrameTopology, MemberRole};

/// Label of the dead load case.
pub const DEAD: &str = "D";
/// Label of the live load case.
pub const LIVE: &str = "L";
/// Labels of the six wind load cases.
pub const WIND_CASES: [&str; 6] = ["W0_0.2U", "W0_0.3U", "W0_0.2D", "W0_0.3D", "W90_0.2", "W90_0.3"];

/// Direction a load acts in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadDirection {
    /// Global X force.
    #[serde(rename = "FX")]
    GlobalX,
    /// Global Y force.
    #[serde(rename = "FY")]
    GlobalY,
    /// Force along the member axis (member loads only).
    #[serde(rename = "Fx")]
    LocalX,
    /// Force normal to the member axis (member loads only).
    #[serde(rename = "Fy")]
    LocalY,
    /// In-plane moment (node loads only).
    #[serde(rename = "MZ")]
    Moment,
}

/// Concentrated load at a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeLoad {
    /// Loaded node.
    pub node: String,
    /// Direction of the load.
    pub direction: LoadDirection,
    /// Magnitude in N or N.mm.
    pub magnitude: f64,
    /// Load case label.
    pub case: String,
}

/// Trapezoidal line load along the full length of a member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemberLoad {
    /// Loaded member.
    pub member: String,
    /// Direction of the load.
    pub direction: LoadDirection,
    /// Intensity at the start node in N/mm.
    pub w1: f64,
    /// Intensity at the end node in N/mm.
    pub w2: f64,
    /// Load case label.
    pub case: String,
}

/// A load belonging to one load case.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LoadRecord {
    /// Load applied at a node.
    Node(NodeLoad),
    /// Load applied along a member.
    Member(MemberLoad),
}

impl LoadRecord {
    /// Case label of the record.
    #[must_use]
    pub fn case(&self) -> &str {
        match self {
            Self::Node(load) => &load.case,
            Self::Member(load) => &load.case,
        }
    }
}

/// Limit state a combination is checked against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitState {
    /// Deflection checks under service loads.
    Serviceability,
    /// Strength checks under factored loads.
    Ultimate,
}

/// A named set of factors applied to load cases.
///
/// # Examples
/// ```
/// use portalx::{LimitState, LoadCombination};
///
/// let combo = LoadCombination::new("1.2D + 1.6L", LimitState::Ultimate)
///     .with_factor("D", 1.2)
///     .with_factor("L", 1.6);
/// assert_eq!(combo.factor("L"), 1.6);
/// assert_eq!(combo.factor("W90_0.2"), 0.0);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadCombination {
    /// Combination name used in reports.
    pub name: String,
    /// Limit state the combination belongs to.
    pub limit_state: LimitState,
    /// Factor per load case label.
    pub factors: BTreeMap<String, f64>,
}

impl LoadCombination {
    /// Create a combination without factors.
    pub fn new(name: impl Into<String>, limit_state: LimitState) -> Self {
        Self {
            name: name.into(),
            limit_state,
            factors: BTreeMap::new(),
        }
    }

    /// Add a load factor (builder pattern).
    #[must_use]
    pub fn with_factor(mut self, case: impl Into<String>, factor: f64) -> Self {
        self.factors.insert(case.into(), factor);
        self
    }

    /// Factor applied to `case`; cases not in the combination contribute zero.
    #[must_use]
    pub fn factor(&self, case: &str) -> f64 {
        self.factors.get(case).copied().unwrap_or(0.0)
    }

    /// Default serviceability and ultimate combinations for the given wind cases.
    ///
    /// Dead load enters the ultimate combinations at 1.2 when it adds to the
    /// load effect and at 0.9 against uplift.
    #[must_use]
    pub fn standard_set<S: AsRef<str>>(wind_cases: &[S]) -> Vec<Self> {
        let mut combinations = vec![
            Self::new("SLS: D + L", LimitState::Serviceability)
                .with_factor(DEAD, 1.0)
                .with_factor(LIVE, 1.0),
            Self::new("ULS: 1.2D + 1.6L", LimitState::Ultimate)
                .with_factor(DEAD, 1.2)
                .with_factor(LIVE, 1.6),
        ];
        for case in wind_cases {
            let case = case.as_ref();
            combinations.push(
                Self::new(format!("SLS: D + {case}"), LimitState::Serviceability)
                    .with_factor(DEAD, 1.0)
                    .with_factor(case, 1.0),
            );
            combinations.push(
                Self::new(format!("ULS: 1.2D + 0.5L + 1.3{case}"), LimitState::Ultimate)
                    .with_factor(DEAD, 1.2)
                    .with_factor(LIVE, 0.5)
                    .with_factor(case, 1.3),
            );
            if !case.ends_with('D') {
                combinations.push(
                    Self::new(format!("ULS: 0.9D + 1.3{case}"), LimitState::Ultimate)
                        .with_factor(DEAD, 0.9)
                        .with_factor(case, 1.3),
                );
            }
        }
        combinations
    }
}

/// Keep only the combinations of one limit state.
#[must_use]
pub fn combinations_for(combinations: &[LoadCombination], state: LimitState) -> Vec<LoadCombination> {
    combinations
        .iter()
        .filter(|combination| combination.limit_state == state)
        .cloned()
        .collect()
}

/// Site wind parameters.
///
/// The pressure model only reads the wind speed and the topographic factor.
/// Return period, terrain category and altitude are site metadata carried
/// from the project file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindParameters {
    /// Fundamental basic wind speed (3 s gust) in m/s.
    pub basic_wind_speed: f64,
    /// Return period in years. Not used by [`Self::peak_pressure`].
    pub return_period: u32,
    /// Terrain category label. Not used by [`Self::peak_pressure`].
    pub terrain_category: String,
    /// Topographic multiplier applied to the wind speed.
    pub topographic_factor: f64,
    /// Site altitude in metres. Not used by [`Self::peak_pressure`].
    pub altitude: f64,
}

impl Default for WindParameters {
    fn default() -> Self {
        Self {
            basic_wind_speed: 36.0,
            return_period: 50,
            terrain_category: "C".to_string(),
            topographic_factor: 1.0,
            altitude: 1_450.0,
        }
    }
}

impl WindParameters {
    /// Peak wind pressure `0.613 (kt V)^2` in N/mm^2.
    #[must_use]
    pub fn peak_pressure(&self) -> f64 {
        let speed = self.topographic_factor * self.basic_wind_speed;
        0.613 * speed * speed * 1.0e-6
    }
}

/// Produces the load records for a frame.
pub trait LoadGenerator {
    /// Generate dead, live and wind records for `frame`.
    fn generate(&self, frame: &FrameTopology, wind: &WindParameters) -> Vec<LoadRecord>;
}

/// Load generator for single-span portal frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalLoadGenerator {
    /// Distance between adjacent frames in mm.
    pub rafter_spacing: f64,
    /// Roof dead load in kPa (excluding member self weight).
    pub dead_pressure: f64,
    /// Roof live load in kPa.
    pub live_pressure: f64,
    /// Horizontal live load at the left eaves in N.
    pub eaves_live_load: f64,
    /// Vertical live load at the apex in N (negative is downward).
    pub apex_live_load: f64,
}

impl Default for PortalLoadGenerator {
    fn default() -> Self {
        Self {
            rafter_spacing: 5_000.0,
            dead_pressure: 0.15,
            live_pressure: 0.25,
            eaves_live_load: 10_000.0,
            apex_live_load: -10_000.0,
        }
    }
}

impl PortalLoadGenerator {
    /// Sign that makes a local Fy load on `member` point away from the roof.
    fn outward_sign(frame: &FrameTopology, member: petgraph::graph::EdgeIndex) -> f64 {
        let Some((start, end)) = frame.endpoints(member) else {
            return 1.0;
        };
        let (Some(start), Some(end)) = (frame.node(start), frame.node(end)) else {
            return 1.0;
        };
        // Local y is the member axis rotated a quarter turn anticlockwise, so
        // its global y component has the sign of the axis' x component.
        if end.position.x >= start.position.x {
            1.0
        } else {
            -1.0
        }
    }

    /// Nodal live loads: horizontal at the left eaves, vertical at the apex.
    fn nodal_live_loads(&self, frame: &FrameTopology) -> Vec<LoadRecord> {
        let mut records = Vec::new();
        let column_tops: Vec<_> = frame
            .members()
            .filter(|(_, member, _, _)| member.role == MemberRole::Column)
            .flat_map(|(_, _, start, end)| [start, end])
            .filter_map(|index| frame.node(index))
            .collect();
        let eaves = column_tops.iter().copied().min_by(|a, b| {
            a.position
                .x
                .total_cmp(&b.position.x)
                .then(b.position.y.total_cmp(&a.position.y))
        });
        if let Some(eaves) = eaves {
            records.push(LoadRecord::Node(NodeLoad {
                node: eaves.name.clone(),
                direction: LoadDirection::GlobalX,
                magnitude: self.eaves_live_load,
                case: LIVE.to_string(),
            }));
        }
        let apex = frame
            .nodes()
            .map(|(_, node)| node)
            .max_by(|a, b| a.position.y.total_cmp(&b.position.y));
        if let Some(apex) = apex {
            records.push(LoadRecord::Node(NodeLoad {
                node: apex.name.clone(),
                direction: LoadDirection::GlobalY,
                magnitude: self.apex_live_load,
                case: LIVE.to_string(),
            }));
        }
        records
    }
}

impl LoadGenerator for PortalLoadGenerator {
    fn generate(&self, frame: &FrameTopology, wind: &WindParameters) -> Vec<LoadRecord> {
        let mut records = Vec::new();
        let dead = self.dead_pressure * 1.0e-3 * self.rafter_spacing;
        let live = self.live_pressure * 1.0e-3 * self.rafter_spacing;
        let pressure = wind.peak_pressure() * self.rafter_spacing;

        for (index, member, _, _) in frame.members() {
            let uniform = |direction, w: f64, case: &str| {
                LoadRecord::Member(MemberLoad {
                    member: member.name.clone(),
                    direction,
                    w1: w,
                    w2: w,
                    case: case.to_string(),
                })
            };
            match member.role {
                MemberRole::Rafter => {
                    let outward = Self::outward_sign(frame, index);
                    records.push(uniform(LoadDirection::GlobalY, -dead, DEAD));
                    records.push(uniform(LoadDirection::GlobalY, -live, LIVE));
                    for (case, coefficient) in wind_coefficients() {
                        let sign = if case.ends_with('D') { -outward } else { outward };
                        records.push(uniform(
                            LoadDirection::LocalY,
                            sign * coefficient * pressure,
                            case,
                        ));
                    }
                }
                MemberRole::Column => {
                    for (case, coefficient) in wind_coefficients() {
                        if case.starts_with("W0_") {
                            records.push(uniform(
                                LoadDirection::GlobalX,
                                coefficient * pressure,
                                case,
                            ));
                        }
                    }
                }
            }
        }
        records.extend(self.nodal_live_loads(frame));
        debug!(records = records.len(), "portal loads generated");
        records
    }
}

/// Pressure coefficient of each wind case.
fn wind_coefficients() -> impl Iterator<Item = (&'static str, f64)> {
    WIND_CASES
        .into_iter()
        .zip([0.2, 0.3, 0.2, 0.3, 0.2, 0.3])
}
