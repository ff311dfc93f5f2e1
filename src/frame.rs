//! Planar frame topology: nodes, members, materials and supports.
//!
//! The topology is fixed for a whole search run. Only the sections assigned to
//! the two member roles change between candidates, so sections are not stored
//! here but passed to the analysis as a [`SectionAssignment`](crate::SectionAssignment).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::errors::FrameEditError;
use crate::geometry::Point;

/// Member roles whose section varies during the search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    /// Roof member.
    Rafter,
    /// Vertical support.
    Column,
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rafter => f.write_str("rafter"),
            Self::Column => f.write_str("column"),
        }
    }
}

/// Linear-elastic material, stresses and moduli in MPa.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Young's modulus.
    pub elastic_modulus: f64,
    /// Shear modulus.
    pub shear_modulus: f64,
    /// Poisson's ratio.
    pub poisson_ratio: f64,
    /// Density in kg/m^3.
    pub density: f64,
    /// Yield strength.
    pub yield_strength: f64,
}

impl Material {
    /// Grade S355 structural steel.
    #[must_use]
    pub const fn steel_s355() -> Self {
        Self {
            elastic_modulus: 200_000.0,
            shear_modulus: 77_000.0,
            poisson_ratio: 0.3,
            density: 7_850.0,
            yield_strength: 355.0,
        }
    }
}

/// Restrained degrees of freedom at a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Support {
    /// Translation along X is fixed.
    pub dx: bool,
    /// Translation along Y is fixed.
    pub dy: bool,
    /// Rotation is fixed.
    pub rz: bool,
}

impl Support {
    /// Both translations fixed, rotation free.
    pub const PINNED: Self = Self {
        dx: true,
        dy: true,
        rz: false,
    };
    /// All three degrees of freedom fixed.
    pub const FIXED: Self = Self {
        dx: true,
        dy: true,
        rz: true,
    };

    /// Restraints in degree-of-freedom order (ux, uy, rz).
    #[must_use]
    pub const fn as_array(self) -> [bool; 3] {
        [self.dx, self.dy, self.rz]
    }
}

/// A node of the frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Node {
    /// Unique name, e.g. `N1`.
    pub name: String,
    /// Position in mm.
    pub position: Point,
    /// Restrained degrees of freedom.
    pub support: Support,
    /// Rotational spring stiffness to ground in N.mm/rad.
    pub rotational_spring: Option<f64>,
}

/// A member connecting two nodes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Member {
    /// Unique name, e.g. `M1`.
    pub name: String,
    /// Role deciding which section is assigned.
    pub role: MemberRole,
    /// Name of the member's material.
    pub material: String,
}

/// Characteristic dimensions used to derive deflection limits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CharacteristicSpans {
    /// Horizontal extent of the frame in mm.
    pub span: f64,
    /// Height of the tallest column in mm.
    pub eaves_height: f64,
}

/// Container for a planar frame model.
#[derive(Clone, Debug, Default)]
pub struct FrameTopology {
    /// Underlying graph storage for nodes and members.
    graph: UnGraph<Node, Member>,
    /// Lookup from node name to graph index.
    node_names: HashMap<String, NodeIndex>,
    /// Lookup from member name to graph index.
    member_names: HashMap<String, EdgeIndex>,
    /// Materials keyed by name.
    materials: BTreeMap<String, Material>,
}

impl FrameTopology {
    /// Create an empty frame.
    ///
    /// # Examples
    /// ```
    /// use portalx::FrameTopology;
    ///
    /// let frame = FrameTopology::new();
    /// assert_eq!(frame.node_count(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the number of nodes in the frame.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Return the number of members in the frame.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Register a material.
    ///
    /// # Errors
    ///
    /// Returns [`FrameEditError::DuplicateName`] when the name is taken and
    /// [`FrameEditError::InvalidMaterial`] when a modulus or the yield strength
    /// is not strictly positive.
    pub fn add_material(&mut self, name: &str, material: Material) -> Result<(), FrameEditError> {
        if self.materials.contains_key(name) {
            return Err(FrameEditError::DuplicateName(name.to_string()));
        }
        for (property, value) in [
            ("elastic modulus", material.elastic_modulus),
            ("shear modulus", material.shear_modulus),
            ("yield strength", material.yield_strength),
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(FrameEditError::InvalidMaterial {
                    material: name.to_string(),
                    property,
                    value,
                });
            }
        }
        self.materials.insert(name.to_string(), material);
        Ok(())
    }

    /// Add a free node.
    ///
    /// # Errors
    ///
    /// Returns [`FrameEditError::DuplicateName`] when the name is taken.
    pub fn add_node(&mut self, name: &str, position: Point) -> Result<NodeIndex, FrameEditError> {
        if self.node_names.contains_key(name) {
            return Err(FrameEditError::DuplicateName(name.to_string()));
        }
        let index = self.graph.add_node(Node {
            name: name.to_string(),
            position,
            support: Support::default(),
            rotational_spring: None,
        });
        self.node_names.insert(name.to_string(), index);
        Ok(index)
    }

    /// Connect two nodes with a new member.
    ///
    /// # Errors
    ///
    /// Returns [`FrameEditError::UnknownNode`] when either end is missing and
    /// [`FrameEditError::DuplicateName`] when the member name is taken.
    pub fn add_member(
        &mut self,
        name: &str,
        start: &str,
        end: &str,
        role: MemberRole,
        material: &str,
    ) -> Result<EdgeIndex, FrameEditError> {
        if self.member_names.contains_key(name) {
            return Err(FrameEditError::DuplicateName(name.to_string()));
        }
        let start = self.require_node(start)?;
        let end = self.require_node(end)?;
        let index = self.graph.add_edge(
            start,
            end,
            Member {
                name: name.to_string(),
                role,
                material: material.to_string(),
            },
        );
        self.member_names.insert(name.to_string(), index);
        Ok(index)
    }

    /// Set the restraint state for a node.
    ///
    /// # Errors
    ///
    /// Returns [`FrameEditError::UnknownNode`] when the node is missing.
    pub fn set_support(&mut self, node: &str, support: Support) -> Result<(), FrameEditError> {
        let index = self.require_node(node)?;
        self.graph[index].support = support;
        Ok(())
    }

    /// Attach a rotational spring to ground at a node.
    ///
    /// # Errors
    ///
    /// Returns [`FrameEditError::UnknownNode`] when the node is missing.
    pub fn set_rotational_spring(&mut self, node: &str, stiffness: f64) -> Result<(), FrameEditError> {
        let index = self.require_node(node)?;
        self.graph[index].rotational_spring = Some(stiffness);
        Ok(())
    }

    /// Graph index of a named node.
    #[must_use]
    pub fn node_index(&self, name: &str) -> Option<NodeIndex> {
        self.node_names.get(name).copied()
    }

    /// Graph index of a named member.
    #[must_use]
    pub fn member_index(&self, name: &str) -> Option<EdgeIndex> {
        self.member_names.get(name).copied()
    }

    /// Node stored at `index`.
    #[must_use]
    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.graph.node_weight(index)
    }

    /// Member stored at `index`.
    #[must_use]
    pub fn member(&self, index: EdgeIndex) -> Option<&Member> {
        self.graph.edge_weight(index)
    }

    /// Material registered under `name`.
    #[must_use]
    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    /// Iterate over nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.graph
            .node_indices()
            .map(move |index| (index, &self.graph[index]))
    }

    /// Iterate over members in insertion order together with their end nodes.
    pub fn members(&self) -> impl Iterator<Item = (EdgeIndex, &Member, NodeIndex, NodeIndex)> {
        self.graph
            .edge_references()
            .map(|edge| (edge.id(), edge.weight(), edge.source(), edge.target()))
    }

    /// End nodes of a member.
    #[must_use]
    pub fn endpoints(&self, member: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(member)
    }

    /// Length of a member in mm.
    #[must_use]
    pub fn member_length(&self, member: EdgeIndex) -> Option<f64> {
        let (start, end) = self.graph.edge_endpoints(member)?;
        Some(self.graph[start].position.distance_to(self.graph[end].position))
    }

    /// Total length of all members with `role` in mm.
    #[must_use]
    pub fn role_length(&self, role: MemberRole) -> f64 {
        self.members()
            .filter(|(_, member, _, _)| member.role == role)
            .filter_map(|(index, _, _, _)| self.member_length(index))
            .sum()
    }

    /// Total length of all members with `role` in metres.
    #[must_use]
    pub fn role_length_m(&self, role: MemberRole) -> f64 {
        self.role_length(role) / 1_000.0
    }

    /// Length in mm of the straight run of same-role members containing `member`.
    ///
    /// Intermediate nodes of a column or rafter split it into several members;
    /// this walks through nodes that join exactly two collinear members of the
    /// same role and sums their lengths.
    #[must_use]
    pub fn straight_run_length(&self, member: EdgeIndex) -> Option<f64> {
        let role = self.graph.edge_weight(member)?.role;
        let direction = self.unit_direction(member)?;
        let mut visited = HashSet::from([member]);
        let mut stack = vec![member];
        let mut total = 0.0;
        while let Some(current) = stack.pop() {
            total += self.member_length(current)?;
            let (start, end) = self.graph.edge_endpoints(current)?;
            for node in [start, end] {
                let joined: Vec<EdgeIndex> = self.graph.edges(node).map(|edge| edge.id()).collect();
                if joined.len() != 2 {
                    continue;
                }
                for next in joined {
                    if visited.contains(&next) || self.graph[next].role != role {
                        continue;
                    }
                    let Some(other) = self.unit_direction(next) else {
                        continue;
                    };
                    if (direction.x * other.y - direction.y * other.x).abs() < 1.0e-6 {
                        visited.insert(next);
                        stack.push(next);
                    }
                }
            }
        }
        Some(total)
    }

    /// Unit vector from the start to the end of a member.
    fn unit_direction(&self, member: EdgeIndex) -> Option<nalgebra::Vector2<f64>> {
        let (start, end) = self.graph.edge_endpoints(member)?;
        let delta = self.graph[end].position.to_vector() - self.graph[start].position.to_vector();
        let length = delta.norm();
        (length > 0.0).then(|| delta / length)
    }

    /// Horizontal extent of the frame and height of the tallest column.
    #[must_use]
    pub fn characteristic_spans(&self) -> CharacteristicSpans {
        let (min_x, max_x) = self
            .graph
            .node_weights()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), node| {
                (lo.min(node.position.x), hi.max(node.position.x))
            });
        let span = if min_x.is_finite() { max_x - min_x } else { 0.0 };
        let base = self
            .graph
            .node_weights()
            .map(|node| node.position.y)
            .fold(f64::INFINITY, f64::min);
        let eaves_height = self
            .members()
            .filter(|(_, member, _, _)| member.role == MemberRole::Column)
            .flat_map(|(_, _, start, end)| [start, end])
            .map(|node| self.graph[node].position.y - base)
            .fold(0.0, f64::max);
        CharacteristicSpans { span, eaves_height }
    }

    /// Fetch a node index or fail with the caller's name.
    fn require_node(&self, name: &str) -> Result<NodeIndex, FrameEditError> {
        self.node_index(name)
            .ok_or_else(|| FrameEditError::UnknownNode(name.to_string()))
    }
}
