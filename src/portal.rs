//! Generation of single-span portal frame topologies.

use serde::{Deserialize, Serialize};

use crate::errors::FrameEditError;
use crate::frame::{FrameTopology, Material, MemberRole, Support};
use crate::geometry::{point, Point};

/// Roof profile of the portal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoofShape {
    /// Single slope rising from the left eaves to the right column.
    MonoPitched,
    /// Two slopes meeting at a central apex.
    DuoPitched,
}

/// Geometry of a portal frame in millimetres.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalGeometry {
    /// Roof profile.
    pub roof: RoofShape,
    /// Height of the left eaves above the base.
    pub eaves_height: f64,
    /// Height of the highest roof point above the base.
    pub apex_height: f64,
    /// Distance between the two columns.
    pub gable_width: f64,
    /// Members per column, split at the bracing points.
    pub column_segments: usize,
    /// Members per roof slope, split at the bracing points.
    pub rafter_segments: usize,
    /// Name under which the material is registered.
    pub material_name: String,
    /// Material of every member.
    pub material: Material,
    /// Optional rotational stiffness of the base connections in N.mm/rad.
    pub base_spring: Option<f64>,
}

impl Default for PortalGeometry {
    fn default() -> Self {
        Self {
            roof: RoofShape::DuoPitched,
            eaves_height: 4_000.0,
            apex_height: 6_000.0,
            gable_width: 12_000.0,
            column_segments: 2,
            rafter_segments: 4,
            material_name: "Steel_S355".to_string(),
            material: Material::steel_s355(),
            base_spring: None,
        }
    }
}

impl PortalGeometry {
    /// Roof pitch in degrees.
    #[must_use]
    pub fn roof_pitch(&self) -> f64 {
        let run = match self.roof {
            RoofShape::DuoPitched => self.gable_width / 2.0,
            RoofShape::MonoPitched => self.gable_width,
        };
        (self.apex_height - self.eaves_height).atan2(run).to_degrees()
    }

    /// Build the frame: left column, roof, right column, pinned bases.
    ///
    /// Nodes are named `N1..` and members `M1..` in order from the left base
    /// to the right base. A member is a column when it is vertical and a rafter
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`FrameEditError::InvalidGeometry`] when a dimension is not
    /// positive, a segment count is zero or the apex is below the eaves.
    ///
    /// # Examples
    /// ```
    /// use portalx::PortalGeometry;
    ///
    /// let frame = PortalGeometry::default().build().expect("valid geometry");
    /// assert_eq!(frame.member_count(), 2 * 2 + 2 * 4);
    /// ```
    pub fn build(&self) -> Result<FrameTopology, FrameEditError> {
        self.validate()?;
        let positions = self.node_positions();
        let mut frame = FrameTopology::new();
        frame.add_material(&self.material_name, self.material)?;
        let names: Vec<String> = (1..=positions.len()).map(|i| format!("N{i}")).collect();
        for (name, position) in names.iter().zip(&positions) {
            frame.add_node(name, *position)?;
        }
        for (index, pair) in positions.windows(2).enumerate() {
            let role = if (pair[0].x - pair[1].x).abs() < f64::EPSILON {
                MemberRole::Column
            } else {
                MemberRole::Rafter
            };
            frame.add_member(
                &format!("M{}", index + 1),
                &names[index],
                &names[index + 1],
                role,
                &self.material_name,
            )?;
        }
        for base in [names.first(), names.last()].into_iter().flatten() {
            frame.set_support(base, Support::PINNED)?;
            if let Some(stiffness) = self.base_spring {
                frame.set_rotational_spring(base, stiffness)?;
            }
        }
        Ok(frame)
    }

    /// Reject dimensions that cannot form a portal.
    fn validate(&self) -> Result<(), FrameEditError> {
        let invalid = |reason: &str| Err(FrameEditError::InvalidGeometry(reason.to_string()));
        if !(self.eaves_height > 0.0 && self.gable_width > 0.0) {
            return invalid("eaves height and gable width must be positive");
        }
        if self.apex_height < self.eaves_height {
            return invalid("apex must not be lower than the eaves");
        }
        if self.column_segments == 0 || self.rafter_segments == 0 {
            return invalid("columns and rafters need at least one segment");
        }
        Ok(())
    }

    /// Node positions from the left base to the right base.
    fn node_positions(&self) -> Vec<Point> {
        let mut nodes = column_points(0.0, 0.0, self.eaves_height, self.column_segments);
        let rise = self.apex_height - self.eaves_height;
        match self.roof {
            RoofShape::DuoPitched => {
                let n = 2 * self.rafter_segments;
                let half = self.rafter_segments as f64;
                for i in 1..n {
                    let x = i as f64 * self.gable_width / n as f64;
                    let y = self.eaves_height + rise * (1.0 - (i as f64 - half).abs() / half);
                    nodes.push(point(x, y));
                }
                nodes.extend(column_points(
                    self.gable_width,
                    self.eaves_height,
                    0.0,
                    self.column_segments,
                ));
            }
            RoofShape::MonoPitched => {
                let n = self.rafter_segments;
                for i in 1..n {
                    let x = i as f64 * self.gable_width / n as f64;
                    nodes.push(point(x, self.eaves_height + rise * i as f64 / n as f64));
                }
                nodes.extend(column_points(
                    self.gable_width,
                    self.apex_height,
                    0.0,
                    self.column_segments,
                ));
            }
        }
        nodes
    }
}

/// Points of a vertical column from `from` to `to`, both ends included.
fn column_points(x: f64, from: f64, to: f64, segments: usize) -> Vec<Point> {
    let step = (to - from) / segments as f64;
    (0..=segments)
        .map(|i| point(x, from + step * i as f64))
        .collect()
}
