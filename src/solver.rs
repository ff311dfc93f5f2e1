//! Direct stiffness solver for planar frames.
//!
//! Each node carries three degrees of freedom (ux, uy, rz). Members are
//! Euler-Bernoulli beam-columns whose axial and flexural stiffness come from
//! the material modulus and the section assigned to the member's role. See
//! <https://en.wikipedia.org/wiki/Direct_stiffness_method>.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector, SMatrix, SVector};
use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::analysis::{AnalysisOracle, AnalysisResults, MemberForces, SectionAssignment};
use crate::errors::AnalysisError;
use crate::frame::FrameTopology;
use crate::geometry::Displacement;
use crate::loads::{LoadCombination, LoadDirection, LoadRecord, DEAD};

/// Six by six matrix in member end coordinates.
type Matrix6 = SMatrix<f64, 6, 6>;
/// Six component vector in member end coordinates.
type Vector6 = SVector<f64, 6>;

/// Smallest pivot, relative to the largest diagonal term, accepted by the solve.
const PIVOT_TOLERANCE: f64 = 1.0e-12;

/// Member self weight added to a load case.
#[derive(Clone, Debug, PartialEq)]
pub struct SelfWeight {
    /// Case the self weight belongs to.
    pub case: String,
    /// Gravitational acceleration in m/s^2.
    pub gravity: f64,
}

impl Default for SelfWeight {
    fn default() -> Self {
        Self {
            case: DEAD.to_string(),
            gravity: 9.81,
        }
    }
}

/// Linear-elastic solver; holds configuration only, no solver state.
#[derive(Clone, Debug, Default)]
pub struct StiffnessSolver {
    /// Self weight of the assigned sections, if it should be included.
    pub self_weight: Option<SelfWeight>,
}

/// Geometry and stiffness of one member, prepared once per analysis.
struct PreparedMember {
    /// Graph index of the member.
    index: EdgeIndex,
    /// Member name used in the results.
    name: String,
    /// Global DOF numbers, start node first.
    dofs: [usize; 6],
    /// Length in mm.
    length: f64,
    /// Direction cosine.
    cos: f64,
    /// Direction sine.
    sin: f64,
    /// Stiffness in member axes.
    local_stiffness: Matrix6,
    /// Global to local rotation.
    transform: Matrix6,
    /// Downward self weight in N/mm.
    self_weight: f64,
}

/// Factored line loads on one member in member axes.
#[derive(Clone, Copy, Default)]
struct LocalLineLoad {
    /// Along the axis, start and end intensity.
    axial: (f64, f64),
    /// Normal to the axis, start and end intensity.
    transverse: (f64, f64),
}

impl LocalLineLoad {
    /// Superpose another trapezoid.
    fn add(&mut self, axial: (f64, f64), transverse: (f64, f64)) {
        self.axial.0 += axial.0;
        self.axial.1 += axial.1;
        self.transverse.0 += transverse.0;
        self.transverse.1 += transverse.1;
    }
}

impl StiffnessSolver {
    /// Solver that ignores member self weight.
    #[must_use]
    pub fn without_self_weight() -> Self {
        Self { self_weight: None }
    }

    /// Solver that adds self weight to the dead load case.
    #[must_use]
    pub fn with_self_weight() -> Self {
        Self {
            self_weight: Some(SelfWeight::default()),
        }
    }

    /// Construct a mapping from graph indices to the first degree of freedom.
    fn node_index_map(frame: &FrameTopology) -> HashMap<NodeIndex, usize> {
        frame
            .nodes()
            .enumerate()
            .map(|(idx, (node, _))| (node, idx * 3))
            .collect()
    }

    /// Compute member geometry, stiffness and transformation matrices.
    fn prepare_members(
        &self,
        frame: &FrameTopology,
        sections: &SectionAssignment,
        index_map: &HashMap<NodeIndex, usize>,
    ) -> Result<Vec<PreparedMember>, AnalysisError> {
        let mut prepared = Vec::with_capacity(frame.member_count());
        for (index, member, start, end) in frame.members() {
            let material = frame
                .material(&member.material)
                .ok_or_else(|| AnalysisError::MissingMaterial {
                    member: member.name.clone(),
                    material: member.material.clone(),
                })?;
            let section = sections.section_for(member.role);
            let properties = section.properties();
            if !(properties.area > 0.0 && properties.ix > 0.0) {
                return Err(AnalysisError::InvalidMember {
                    member: member.name.clone(),
                    reason: format!("section '{}' has no area or inertia", section.designation),
                });
            }
            let (Some(start_node), Some(end_node)) = (frame.node(start), frame.node(end)) else {
                return Err(AnalysisError::UnknownMember(member.name.clone()));
            };
            let delta = end_node.position.to_vector() - start_node.position.to_vector();
            let length = delta.norm();
            if length == 0.0 {
                return Err(AnalysisError::ZeroLengthMember(member.name.clone()));
            }
            let cos = delta.x / length;
            let sin = delta.y / length;
            let start_idx = index_map[&start];
            let end_idx = index_map[&end];
            let self_weight = self
                .self_weight
                .as_ref()
                .map_or(0.0, |weight| section.mass * weight.gravity / 1_000.0);
            prepared.push(PreparedMember {
                index,
                name: member.name.clone(),
                dofs: [
                    start_idx,
                    start_idx + 1,
                    start_idx + 2,
                    end_idx,
                    end_idx + 1,
                    end_idx + 2,
                ],
                length,
                cos,
                sin,
                local_stiffness: local_stiffness(
                    material.elastic_modulus,
                    properties.area,
                    properties.ix,
                    length,
                ),
                transform: transformation(cos, sin),
                self_weight,
            });
        }
        Ok(prepared)
    }

    /// Assemble the global stiffness matrix including rotational springs.
    fn build_stiffness_matrix(
        frame: &FrameTopology,
        members: &[PreparedMember],
        index_map: &HashMap<NodeIndex, usize>,
    ) -> DMatrix<f64> {
        let dof = frame.node_count() * 3;
        let mut matrix = DMatrix::zeros(dof, dof);
        for member in members {
            let global = member.transform.transpose() * member.local_stiffness * member.transform;
            for (row_local, global_row) in member.dofs.iter().enumerate() {
                for (col_local, global_col) in member.dofs.iter().enumerate() {
                    matrix[(*global_row, *global_col)] += global[(row_local, col_local)];
                }
            }
        }
        for (index, node) in frame.nodes() {
            if let Some(stiffness) = node.rotational_spring {
                let rz = index_map[&index] + 2;
                matrix[(rz, rz)] += stiffness;
            }
        }
        matrix
    }

    /// Determine the indices corresponding to unconstrained degrees of freedom.
    fn collect_free_dofs(frame: &FrameTopology, index_map: &HashMap<NodeIndex, usize>) -> Vec<usize> {
        let mut free = Vec::new();
        for (index, node) in frame.nodes() {
            let base = index_map[&index];
            for (axis, fixed) in node.support.as_array().into_iter().enumerate() {
                if !fixed {
                    free.push(base + axis);
                }
            }
        }
        free
    }

    /// Assemble the nodal load vector and member line loads for a combination.
    fn build_load_vector(
        &self,
        frame: &FrameTopology,
        members: &[PreparedMember],
        index_map: &HashMap<NodeIndex, usize>,
        loads: &[LoadRecord],
        combination: &LoadCombination,
    ) -> Result<(DVector<f64>, HashMap<EdgeIndex, LocalLineLoad>), AnalysisError> {
        let mut vector = DVector::zeros(frame.node_count() * 3);
        let mut line_loads: HashMap<EdgeIndex, LocalLineLoad> = HashMap::new();
        let by_index: HashMap<EdgeIndex, &PreparedMember> =
            members.iter().map(|member| (member.index, member)).collect();

        for record in loads {
            let factor = combination.factor(record.case());
            if factor == 0.0 {
                continue;
            }
            match record {
                LoadRecord::Node(load) => {
                    let node = frame
                        .node_index(&load.node)
                        .ok_or_else(|| AnalysisError::UnknownNode(load.node.clone()))?;
                    let axis = match load.direction {
                        LoadDirection::GlobalX | LoadDirection::LocalX => 0,
                        LoadDirection::GlobalY | LoadDirection::LocalY => 1,
                        LoadDirection::Moment => 2,
                    };
                    vector[index_map[&node] + axis] += factor * load.magnitude;
                }
                LoadRecord::Member(load) => {
                    let index = frame
                        .member_index(&load.member)
                        .ok_or_else(|| AnalysisError::UnknownMember(load.member.clone()))?;
                    let member = by_index[&index];
                    let (w1, w2) = (factor * load.w1, factor * load.w2);
                    let (axial, transverse) = match load.direction {
                        LoadDirection::LocalX => ((w1, w2), (0.0, 0.0)),
                        LoadDirection::LocalY => ((0.0, 0.0), (w1, w2)),
                        LoadDirection::GlobalX => (
                            (member.cos * w1, member.cos * w2),
                            (-member.sin * w1, -member.sin * w2),
                        ),
                        LoadDirection::GlobalY => (
                            (member.sin * w1, member.sin * w2),
                            (member.cos * w1, member.cos * w2),
                        ),
                        LoadDirection::Moment => {
                            return Err(AnalysisError::InvalidMember {
                                member: load.member.clone(),
                                reason: "distributed moments are not supported".to_string(),
                            })
                        }
                    };
                    line_loads.entry(index).or_default().add(axial, transverse);
                }
            }
        }

        if let Some(weight) = &self.self_weight {
            let factor = combination.factor(&weight.case);
            if factor != 0.0 {
                for member in members {
                    let w = -factor * member.self_weight;
                    line_loads.entry(member.index).or_default().add(
                        (member.sin * w, member.sin * w),
                        (member.cos * w, member.cos * w),
                    );
                }
            }
        }

        for member in members {
            if let Some(load) = line_loads.get(&member.index) {
                let equivalent = member.transform.transpose() * equivalent_nodal_loads(member.length, load);
                for (local, global) in member.dofs.iter().enumerate() {
                    vector[*global] += equivalent[local];
                }
            }
        }
        Ok((vector, line_loads))
    }
}

impl AnalysisOracle for StiffnessSolver {
    fn analyze(
        &self,
        frame: &FrameTopology,
        sections: &SectionAssignment,
        loads: &[LoadRecord],
        combinations: &[LoadCombination],
    ) -> Result<AnalysisResults, AnalysisError> {
        let index_map = Self::node_index_map(frame);
        let members = self.prepare_members(frame, sections, &index_map)?;
        let stiffness = Self::build_stiffness_matrix(frame, &members, &index_map);
        let free_dofs = Self::collect_free_dofs(frame, &index_map);

        let free_len = free_dofs.len();
        let mut k_ff = DMatrix::zeros(free_len, free_len);
        for (row_idx, &row) in free_dofs.iter().enumerate() {
            for (col_idx, &col) in free_dofs.iter().enumerate() {
                k_ff[(row_idx, col_idx)] = stiffness[(row, col)];
            }
        }
        let scale = (0..free_len)
            .map(|i| k_ff[(i, i)].abs())
            .fold(0.0, f64::max);
        let lu = k_ff.lu();
        if free_len > 0 {
            let upper = lu.u();
            let singular = scale == 0.0
                || (0..free_len).any(|i| upper[(i, i)].abs() <= PIVOT_TOLERANCE * scale);
            if singular {
                return Err(AnalysisError::SingularStiffness);
            }
        }

        let mut results = AnalysisResults::new();
        for combination in combinations {
            let (load, line_loads) =
                self.build_load_vector(frame, &members, &index_map, loads, combination)?;
            let mut displacements = DVector::zeros(load.len());
            if free_len > 0 {
                let f_f = DVector::from_iterator(free_len, free_dofs.iter().map(|&dof| load[dof]));
                let solution = lu.solve(&f_f).ok_or(AnalysisError::SingularStiffness)?;
                if solution.iter().any(|value| !value.is_finite()) {
                    return Err(AnalysisError::NonFinite(combination.name.clone()));
                }
                for (idx, &dof) in free_dofs.iter().enumerate() {
                    displacements[dof] = solution[idx];
                }
            }

            for (index, node) in frame.nodes() {
                let base = index_map[&index];
                results.insert_displacement(
                    &node.name,
                    &combination.name,
                    Displacement::new(displacements[base], displacements[base + 1], displacements[base + 2]),
                );
            }

            for member in &members {
                let global = Vector6::from_iterator(member.dofs.iter().map(|&dof| displacements[dof]));
                let line = line_loads.get(&member.index).copied().unwrap_or_default();
                let fixed_end = -equivalent_nodal_loads(member.length, &line);
                let end = member.local_stiffness * (member.transform * global) + fixed_end;
                let forces = MemberForces::from_end_forces(
                    member.length,
                    [end[0], end[1], end[2], end[3], end[4], end[5]],
                )
                .with_axial_load(line.axial.0, line.axial.1)
                .with_transverse_load(line.transverse.0, line.transverse.1);
                results.insert_member_forces(&member.name, &combination.name, forces);
            }
        }
        Ok(results)
    }
}

/// Beam-column stiffness in member axes.
fn local_stiffness(elastic_modulus: f64, area: f64, inertia: f64, length: f64) -> Matrix6 {
    let ea = elastic_modulus * area / length;
    let ei = elastic_modulus * inertia;
    let k1 = 12.0 * ei / length.powi(3);
    let k2 = 6.0 * ei / length.powi(2);
    let k3 = 4.0 * ei / length;
    let k4 = 2.0 * ei / length;
    Matrix6::from_row_slice(&[
        ea, 0.0, 0.0, -ea, 0.0, 0.0, //
        0.0, k1, k2, 0.0, -k1, k2, //
        0.0, k2, k3, 0.0, -k2, k4, //
        -ea, 0.0, 0.0, ea, 0.0, 0.0, //
        0.0, -k1, -k2, 0.0, k1, -k2, //
        0.0, k2, k4, 0.0, -k2, k3,
    ])
}

/// Rotation from global to member axes for both ends.
fn transformation(cos: f64, sin: f64) -> Matrix6 {
    let mut transform = Matrix6::zeros();
    for block in [0, 3] {
        transform[(block, block)] = cos;
        transform[(block, block + 1)] = sin;
        transform[(block + 1, block)] = -sin;
        transform[(block + 1, block + 1)] = cos;
        transform[(block + 2, block + 2)] = 1.0;
    }
    transform
}

/// Nodal loads equivalent to a trapezoidal line load, in member axes.
///
/// The transverse trapezoid is split into a uniform part and a triangle
/// rising towards the end node.
fn equivalent_nodal_loads(length: f64, load: &LocalLineLoad) -> Vector6 {
    let l = length;
    let (a1, a2) = load.axial;
    let (uniform, peak) = (load.transverse.0, load.transverse.1 - load.transverse.0);
    Vector6::from_column_slice(&[
        l * (2.0 * a1 + a2) / 6.0,
        uniform * l / 2.0 + 3.0 * peak * l / 20.0,
        uniform * l * l / 12.0 + peak * l * l / 30.0,
        l * (a1 + 2.0 * a2) / 6.0,
        uniform * l / 2.0 + 7.0 * peak * l / 20.0,
        -uniform * l * l / 12.0 - peak * l * l / 20.0,
    ])
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use approx::assert_relative_eq;

    use super::*;
    use crate::frame::{Material, MemberRole, Support};
    use crate::geometry::point;
    use crate::loads::{LimitState, MemberLoad, NodeLoad};
    use crate::section::Section;

    fn beam_section() -> Arc<Section> {
        Arc::new(Section {
            designation: "test".to_string(),
            family: "I-Sections".to_string(),
            mass: 40.0,
            height: 300.0,
            flange_width: 150.0,
            area: 5.0,
            ix: 100.0,
            iy: 10.0,
            ..Section::default()
        })
    }

    fn sections() -> SectionAssignment {
        SectionAssignment::new(beam_section(), beam_section())
    }

    fn beam(length: f64, start: Support, end: Support) -> FrameTopology {
        let mut frame = FrameTopology::new();
        frame.add_material("S355", Material::steel_s355()).expect("material");
        frame.add_node("A", point(0.0, 0.0)).expect("node");
        frame.add_node("B", point(length, 0.0)).expect("node");
        frame
            .add_member("M1", "A", "B", MemberRole::Rafter, "S355")
            .expect("member");
        frame.set_support("A", start).expect("support");
        frame.set_support("B", end).expect("support");
        frame
    }

    fn combo() -> Vec<LoadCombination> {
        vec![LoadCombination::new("C", LimitState::Serviceability).with_factor("P", 1.0)]
    }

    #[test]
    fn cantilever_tip_deflection_matches_closed_form() {
        let length = 3_000.0;
        let load = -10_000.0;
        let frame = beam(length, Support::FIXED, Support::default());
        let loads = [LoadRecord::Node(NodeLoad {
            node: "B".to_string(),
            direction: LoadDirection::GlobalY,
            magnitude: load,
            case: "P".to_string(),
        })];
        let results = StiffnessSolver::without_self_weight()
            .analyze(&frame, &sections(), &loads, &combo())
            .expect("analysis succeeds");

        let ei = 200_000.0 * 100.0e6;
        let tip = results.displacement("B", "C").expect("tip displacement");
        assert_relative_eq!(tip.y, load * length.powi(3) / (3.0 * ei), epsilon = 1.0e-9);
        assert_relative_eq!(tip.x, 0.0, epsilon = 1.0e-12);

        let forces = results.member_forces("M1", "C").expect("forces");
        // Hogging moment PL at the root.
        assert_relative_eq!(forces.at(0.0).moment, load * length, epsilon = 1.0e-3);
        assert_relative_eq!(forces.at(length).moment, 0.0, epsilon = 1.0e-3);
    }

    #[test]
    fn fixed_beam_under_uniform_load_has_textbook_moments() {
        let length = 6_000.0;
        let w = -10.0;
        let frame = beam(length, Support::FIXED, Support::FIXED);
        let loads = [LoadRecord::Member(MemberLoad {
            member: "M1".to_string(),
            direction: LoadDirection::GlobalY,
            w1: w,
            w2: w,
            case: "P".to_string(),
        })];
        let results = StiffnessSolver::without_self_weight()
            .analyze(&frame, &sections(), &loads, &combo())
            .expect("analysis succeeds");
        let forces = results.member_forces("M1", "C").expect("forces");
        assert_relative_eq!(forces.at(0.0).moment, w * length * length / 12.0, epsilon = 1.0e-3);
        assert_relative_eq!(forces.at(length / 2.0).moment, -w * length * length / 24.0, epsilon = 1.0e-3);
    }

    #[test]
    fn simply_supported_beam_deflects_five_over_384() {
        let length = 6_000.0;
        let w = -5.0;
        // Two members so the mid-span node reports a displacement.
        let mut split = FrameTopology::new();
        split.add_material("S355", Material::steel_s355()).expect("material");
        for (name, x) in [("A", 0.0), ("C", length / 2.0), ("B", length)] {
            split.add_node(name, point(x, 0.0)).expect("node");
        }
        split.add_member("M1", "A", "C", MemberRole::Rafter, "S355").expect("member");
        split.add_member("M2", "C", "B", MemberRole::Rafter, "S355").expect("member");
        split.set_support("A", Support::PINNED).expect("support");
        split
            .set_support(
                "B",
                Support {
                    dx: false,
                    dy: true,
                    rz: false,
                },
            )
            .expect("support");
        let loads: Vec<_> = ["M1", "M2"]
            .iter()
            .map(|member| {
                LoadRecord::Member(MemberLoad {
                    member: (*member).to_string(),
                    direction: LoadDirection::GlobalY,
                    w1: w,
                    w2: w,
                    case: "P".to_string(),
                })
            })
            .collect();
        let results = StiffnessSolver::without_self_weight()
            .analyze(&split, &sections(), &loads, &combo())
            .expect("analysis succeeds");
        let ei = 200_000.0 * 100.0e6;
        let mid = results.displacement("C", "C").expect("mid-span displacement");
        assert_relative_eq!(mid.y, 5.0 * w * length.powi(4) / (384.0 * ei), epsilon = 1.0e-9);
        let forces = results.member_forces("M1", "C").expect("forces");
        assert_relative_eq!(forces.at(length / 2.0).moment, -w * length * length / 8.0, epsilon = 1.0e-2);
    }

    #[test]
    fn unsupported_frame_is_singular() {
        let frame = beam(2_000.0, Support::default(), Support::default());
        let error = StiffnessSolver::without_self_weight()
            .analyze(&frame, &sections(), &[], &combo())
            .expect_err("mechanism detected");
        assert_eq!(error, AnalysisError::SingularStiffness);
    }

    #[test]
    fn self_weight_joins_the_dead_case() {
        let length = 3_000.0;
        let frame = beam(length, Support::FIXED, Support::default());
        let dead = vec![LoadCombination::new("D only", LimitState::Serviceability).with_factor(DEAD, 1.0)];
        let results = StiffnessSolver::with_self_weight()
            .analyze(&frame, &sections(), &[], &dead)
            .expect("analysis succeeds");
        let w = 40.0 * 9.81 / 1_000.0;
        let ei = 200_000.0 * 100.0e6;
        let tip = results.displacement("B", "D only").expect("tip");
        assert_relative_eq!(tip.y, -w * length.powi(4) / (8.0 * ei), epsilon = 1.0e-9);
    }

    #[test]
    fn unknown_load_targets_are_reported() {
        let frame = beam(2_000.0, Support::FIXED, Support::default());
        let loads = [LoadRecord::Node(NodeLoad {
            node: "Z".to_string(),
            direction: LoadDirection::GlobalX,
            magnitude: 1.0,
            case: "P".to_string(),
        })];
        let error = StiffnessSolver::without_self_weight()
            .analyze(&frame, &sections(), &loads, &combo())
            .expect_err("unknown node rejected");
        assert_eq!(error, AnalysisError::UnknownNode("Z".to_string()));
    }

    #[test]
    fn transformation_is_orthogonal() {
        let angle: f64 = 0.3;
        let t = transformation(angle.cos(), angle.sin());
        let product = t.transpose() * t;
        assert_relative_eq!(product, Matrix6::identity(), epsilon = 1.0e-12);
    }
}
