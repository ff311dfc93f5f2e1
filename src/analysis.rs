//! Interface to the structural analysis step and the results it returns.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::AnalysisError;
use crate::frame::{FrameTopology, MemberRole};
use crate::geometry::{Displacement, InternalForces};
use crate::loads::{LoadCombination, LoadRecord};
use crate::section::Section;

/// Sections assigned to the two member roles of one candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct SectionAssignment {
    /// Section of every rafter-role member.
    pub rafter: Arc<Section>,
    /// Section of every column-role member.
    pub column: Arc<Section>,
}

impl SectionAssignment {
    /// Pair a rafter and a column section.
    #[must_use]
    pub fn new(rafter: Arc<Section>, column: Arc<Section>) -> Self {
        Self { rafter, column }
    }

    /// Section used by members of `role`.
    #[must_use]
    pub fn section_for(&self, role: MemberRole) -> &Section {
        match role {
            MemberRole::Rafter => &self.rafter,
            MemberRole::Column => &self.column,
        }
    }
}

/// Solves a frame for a set of load combinations.
///
/// Implementations must not keep state between calls; the search invokes
/// `analyze` from several worker threads at once.
pub trait AnalysisOracle: Send + Sync {
    /// Analyze `frame` with `sections` under each of `combinations`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError`] when the system cannot be solved.
    fn analyze(
        &self,
        frame: &FrameTopology,
        sections: &SectionAssignment,
        loads: &[LoadRecord],
        combinations: &[LoadCombination],
    ) -> Result<AnalysisResults, AnalysisError>;
}

/// Local end forces of a member and the line load acting along it.
///
/// End forces are the forces the nodes exert on the member in member axes:
/// `[Fx, Fy, Mz]` at the start node followed by the same at the end node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MemberForces {
    /// Member length in mm.
    length: f64,
    /// Local end forces, start node first.
    end_forces: [f64; 6],
    /// Trapezoidal load along the axis, start and end intensity.
    axial_load: (f64, f64),
    /// Trapezoidal load normal to the axis, start and end intensity.
    transverse_load: (f64, f64),
}

/// Stations used when scanning a member for extreme values.
const STATIONS: usize = 40;

impl MemberForces {
    /// Forces of an unloaded span between the two end force sets.
    #[must_use]
    pub fn from_end_forces(length: f64, end_forces: [f64; 6]) -> Self {
        Self {
            length,
            end_forces,
            axial_load: (0.0, 0.0),
            transverse_load: (0.0, 0.0),
        }
    }

    /// Add a trapezoidal load along the member axis in N/mm.
    #[must_use]
    pub fn with_axial_load(mut self, w1: f64, w2: f64) -> Self {
        self.axial_load = (w1, w2);
        self
    }

    /// Add a trapezoidal load normal to the member axis in N/mm.
    #[must_use]
    pub fn with_transverse_load(mut self, w1: f64, w2: f64) -> Self {
        self.transverse_load = (w1, w2);
        self
    }

    /// Member length in mm.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.length
    }

    /// End forces in member axes.
    #[must_use]
    pub fn end_forces(&self) -> [f64; 6] {
        self.end_forces
    }

    /// Internal forces at `position` mm from the start node.
    ///
    /// Positions outside the member are clamped to its ends.
    #[must_use]
    pub fn at(&self, position: f64) -> InternalForces {
        let x = position.clamp(0.0, self.length);
        let [fx, fy, mz, ..] = self.end_forces;
        let (a1, a2) = self.axial_load;
        let (p1, p2) = self.transverse_load;
        let (a_slope, p_slope) = if self.length > 0.0 {
            ((a2 - a1) / self.length, (p2 - p1) / self.length)
        } else {
            (0.0, 0.0)
        };
        let axial_resultant = a1 * x + a_slope * x * x / 2.0;
        let shear_resultant = p1 * x + p_slope * x * x / 2.0;
        let moment_of_load = p1 * x * x / 2.0 + p_slope * x * x * x / 6.0;
        InternalForces {
            axial: -fx - axial_resultant,
            shear: fy + shear_resultant,
            moment: -mz + fy * x + moment_of_load,
        }
    }

    /// Axial force and bending moment at `position`.
    #[must_use]
    pub fn force_query(&self, position: f64) -> (f64, f64) {
        let forces = self.at(position);
        (forces.axial, forces.moment)
    }

    /// Bending moments at the start and end node.
    #[must_use]
    pub fn end_moments(&self) -> (f64, f64) {
        (self.at(0.0).moment, self.at(self.length).moment)
    }

    /// Largest absolute bending moment along the member.
    #[must_use]
    pub fn max_abs_moment(&self) -> f64 {
        self.stations()
            .map(|x| self.at(x).moment.abs())
            .fold(0.0, f64::max)
    }

    /// Largest compressive axial force as a positive number, zero if none.
    #[must_use]
    pub fn max_compression(&self) -> f64 {
        self.stations()
            .map(|x| -self.at(x).axial)
            .fold(0.0, f64::max)
    }

    /// Largest tensile axial force, zero if none.
    #[must_use]
    pub fn max_tension(&self) -> f64 {
        self.stations().map(|x| self.at(x).axial).fold(0.0, f64::max)
    }

    /// Evenly spaced positions from end to end.
    fn stations(&self) -> impl Iterator<Item = f64> + '_ {
        (0..=STATIONS).map(move |i| self.length * i as f64 / STATIONS as f64)
    }
}

/// Displacements and member forces per load combination.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalysisResults {
    /// Node name to combination name to displacement.
    displacements: BTreeMap<String, BTreeMap<String, Displacement>>,
    /// Member name to combination name to forces.
    forces: BTreeMap<String, BTreeMap<String, MemberForces>>,
}

impl AnalysisResults {
    /// Create an empty result set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the displacement of `node` under `combination`.
    pub fn insert_displacement(&mut self, node: &str, combination: &str, displacement: Displacement) {
        self.displacements
            .entry(node.to_string())
            .or_default()
            .insert(combination.to_string(), displacement);
    }

    /// Record the forces of `member` under `combination`.
    pub fn insert_member_forces(&mut self, member: &str, combination: &str, forces: MemberForces) {
        self.forces
            .entry(member.to_string())
            .or_default()
            .insert(combination.to_string(), forces);
    }

    /// Displacement of `node` under `combination`.
    #[must_use]
    pub fn displacement(&self, node: &str, combination: &str) -> Option<Displacement> {
        self.displacements.get(node)?.get(combination).copied()
    }

    /// Forces of `member` under `combination`.
    #[must_use]
    pub fn member_forces(&self, member: &str, combination: &str) -> Option<&MemberForces> {
        self.forces.get(member)?.get(combination)
    }

    /// Iterate over `(node, combination, displacement)` in name order.
    pub fn displacements(&self) -> impl Iterator<Item = (&str, &str, Displacement)> {
        self.displacements.iter().flat_map(|(node, per_combination)| {
            per_combination
                .iter()
                .map(move |(combination, d)| (node.as_str(), combination.as_str(), *d))
        })
    }

    /// Iterate over `(member, combination, forces)` in name order.
    pub fn member_results(&self) -> impl Iterator<Item = (&str, &str, &MemberForces)> {
        self.forces.iter().flat_map(|(member, per_combination)| {
            per_combination
                .iter()
                .map(move |(combination, f)| (member.as_str(), combination.as_str(), f))
        })
    }

    /// Fold another result set into this one.
    pub fn merge(&mut self, other: Self) {
        for (node, per_combination) in other.displacements {
            self.displacements.entry(node).or_default().extend(per_combination);
        }
        for (member, per_combination) in other.forces {
            self.forces.entry(member).or_default().extend(per_combination);
        }
    }
}
