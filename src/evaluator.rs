//! Feasibility check and weight of one rafter/column section pair.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Serialize, Serializer};
use tracing::{debug, trace};

use crate::analysis::{AnalysisOracle, AnalysisResults, SectionAssignment};
use crate::config::DeflectionLimits;
use crate::errors::{AnalysisError, DeflectionAxis, Rejection};
use crate::frame::{FrameTopology, Material, MemberRole};
use crate::loads::{combinations_for, LimitState, LoadCombination, LoadRecord};
use crate::section::Section;
use crate::strength::{MemberContext, StrengthChecker, StrengthRatios};

/// Worst absolute displacement along one axis.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DeflectionExtreme {
    /// Absolute displacement in mm.
    pub value: f64,
    /// Node where it occurs.
    pub node: String,
    /// Serviceability combination that produces it.
    pub combination: String,
}

/// Highest strength ratio found over all members and ultimate combinations.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StrengthSummary {
    /// Governing member.
    pub member: String,
    /// Governing combination.
    pub combination: String,
    /// Ratios of that member under that combination.
    pub ratios: StrengthRatios,
}

/// An accepted section pair together with the values that made it pass.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeasibilityReport {
    /// Rafter section.
    #[serde(serialize_with = "designation")]
    pub rafter: Arc<Section>,
    /// Column section.
    #[serde(serialize_with = "designation")]
    pub column: Arc<Section>,
    /// Steel weight of the frame in kg.
    pub weight: f64,
    /// Worst sway.
    pub horizontal: DeflectionExtreme,
    /// Worst vertical displacement.
    pub vertical: DeflectionExtreme,
    /// Governing strength result, `None` when strength was not checked.
    pub strength: Option<StrengthSummary>,
}

impl FeasibilityReport {
    /// Render the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if a value cannot be represented.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Serialize a section as its designation only.
fn designation<S: Serializer>(section: &Arc<Section>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&section.designation)
}

/// Member data the strength checks need, computed once per topology.
#[derive(Clone, Debug)]
struct MemberCheck {
    /// Member name.
    name: String,
    /// Registered material, `None` if the name is undefined.
    material: Option<Material>,
    /// Material name as referenced by the member.
    material_name: String,
    /// Role and effective lengths.
    context: MemberContext,
}

/// Evaluates section pairs against a fixed frame, load set and criteria.
///
/// The evaluator holds no mutable state, so one instance is shared by every
/// worker of both search directions.
#[derive(Debug)]
pub struct CandidateEvaluator<O, S> {
    /// Frame shared by every candidate.
    frame: FrameTopology,
    /// Load records of every case.
    loads: Vec<LoadRecord>,
    /// Combinations checked against the deflection limits.
    serviceability: Vec<LoadCombination>,
    /// Combinations checked for strength.
    ultimate: Vec<LoadCombination>,
    /// Deflection limits in mm.
    limits: DeflectionLimits,
    /// Permitted excess of rafter flange over column flange in mm.
    flange_tolerance: f64,
    /// Whether ultimate checks run.
    strength_aware: bool,
    /// Analysis backend.
    oracle: O,
    /// Strength backend.
    checker: S,
    /// Per-member strength check data.
    members: Vec<MemberCheck>,
    /// Total rafter length in m.
    rafter_length_m: f64,
    /// Total column length in m.
    column_length_m: f64,
}

impl<O: AnalysisOracle, S: StrengthChecker> CandidateEvaluator<O, S> {
    /// Create an evaluator with the default 3.5 mm flange tolerance and
    /// strength checks enabled.
    pub fn new(
        frame: FrameTopology,
        loads: Vec<LoadRecord>,
        combinations: &[LoadCombination],
        limits: DeflectionLimits,
        oracle: O,
        checker: S,
    ) -> Self {
        let members = frame
            .members()
            .map(|(index, member, _, _)| {
                let length = frame.member_length(index).unwrap_or(0.0);
                MemberCheck {
                    name: member.name.clone(),
                    material: frame.material(&member.material).copied(),
                    material_name: member.material.clone(),
                    context: MemberContext {
                        role: member.role,
                        major_length: frame.straight_run_length(index).unwrap_or(length),
                        minor_length: length,
                    },
                }
            })
            .collect();
        let rafter_length_m = frame.role_length_m(MemberRole::Rafter);
        let column_length_m = frame.role_length_m(MemberRole::Column);
        Self {
            serviceability: combinations_for(combinations, LimitState::Serviceability),
            ultimate: combinations_for(combinations, LimitState::Ultimate),
            frame,
            loads,
            limits,
            flange_tolerance: 3.5,
            strength_aware: true,
            oracle,
            checker,
            members,
            rafter_length_m,
            column_length_m,
        }
    }

    /// Set the permitted excess of rafter flange over column flange in mm.
    #[must_use]
    pub fn with_flange_tolerance(mut self, tolerance: f64) -> Self {
        self.flange_tolerance = tolerance;
        self
    }

    /// Enable or disable the ultimate limit state checks.
    #[must_use]
    pub fn with_strength_checks(mut self, enabled: bool) -> Self {
        self.strength_aware = enabled;
        self
    }

    /// Frame the evaluator analyzes.
    #[must_use]
    pub fn frame(&self) -> &FrameTopology {
        &self.frame
    }

    /// Load records applied to every candidate.
    #[must_use]
    pub fn loads(&self) -> &[LoadRecord] {
        &self.loads
    }

    /// Serviceability combinations.
    #[must_use]
    pub fn serviceability(&self) -> &[LoadCombination] {
        &self.serviceability
    }

    /// Ultimate combinations.
    #[must_use]
    pub fn ultimate(&self) -> &[LoadCombination] {
        &self.ultimate
    }

    /// Deflection limits in force.
    #[must_use]
    pub fn limits(&self) -> DeflectionLimits {
        self.limits
    }

    /// Steel weight in kg of the frame built from a section pair.
    #[must_use]
    pub fn weight(&self, rafter: &Section, column: &Section) -> f64 {
        rafter.mass * self.rafter_length_m + column.mass * self.column_length_m
    }

    /// Run `combinations` on the frame with the given sections.
    ///
    /// # Errors
    ///
    /// Propagates the oracle's [`AnalysisError`].
    pub fn analyze(
        &self,
        sections: &SectionAssignment,
        combinations: &[LoadCombination],
    ) -> Result<AnalysisResults, AnalysisError> {
        self.oracle
            .analyze(&self.frame, sections, &self.loads, combinations)
    }

    /// Check one rafter/column pair.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] explaining why the pair is infeasible. A
    /// flange-fit rejection is decided before any analysis is run. A panic in
    /// the oracle or the strength checker is contained here and reported as
    /// [`AnalysisError::Panicked`].
    pub fn evaluate(
        &self,
        rafter: &Arc<Section>,
        column: &Arc<Section>,
    ) -> Result<FeasibilityReport, Rejection> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.check(rafter, column)))
            .unwrap_or_else(|payload| {
                Err(Rejection::Analysis(AnalysisError::Panicked(panic_message(
                    &*payload,
                ))))
            });
        match &result {
            Ok(report) => debug!(
                rafter = %rafter.designation,
                column = %column.designation,
                weight = report.weight,
                "candidate accepted"
            ),
            Err(rejection) => trace!(
                rafter = %rafter.designation,
                column = %column.designation,
                %rejection,
                "candidate rejected"
            ),
        }
        result
    }

    /// Run the checks in order, stopping at the first rejection.
    fn check(
        &self,
        rafter: &Arc<Section>,
        column: &Arc<Section>,
    ) -> Result<FeasibilityReport, Rejection> {
        if rafter.flange_width > column.flange_width + self.flange_tolerance {
            return Err(Rejection::FlangeFit {
                rafter_width: rafter.flange_width,
                column_width: column.flange_width,
                tolerance: self.flange_tolerance,
            });
        }
        let sections = SectionAssignment::new(Arc::clone(rafter), Arc::clone(column));
        let results = self.analyze(&sections, &self.serviceability)?;
        let (horizontal, vertical) = worst_displacements(&results);
        for (axis, extreme, limit) in [
            (DeflectionAxis::Horizontal, &horizontal, self.limits.horizontal),
            (DeflectionAxis::Vertical, &vertical, self.limits.vertical),
        ] {
            if extreme.value > limit {
                return Err(Rejection::Deflection {
                    axis,
                    value: extreme.value,
                    limit,
                    combination: extreme.combination.clone(),
                });
            }
        }

        let strength = if self.strength_aware && !self.ultimate.is_empty() {
            self.check_strength(&sections)?
        } else {
            None
        };

        Ok(FeasibilityReport {
            weight: self.weight(rafter, column),
            rafter: Arc::clone(rafter),
            column: Arc::clone(column),
            horizontal,
            vertical,
            strength,
        })
    }

    /// Ultimate checks of every member; the governing summary on success.
    fn check_strength(
        &self,
        sections: &SectionAssignment,
    ) -> Result<Option<StrengthSummary>, Rejection> {
        let results = self.analyze(sections, &self.ultimate)?;
        let mut governing: Option<StrengthSummary> = None;
        for member in &self.members {
            let material = member.material.ok_or_else(|| AnalysisError::MissingMaterial {
                member: member.name.clone(),
                material: member.material_name.clone(),
            })?;
            let section = sections.section_for(member.context.role);
            for combination in &self.ultimate {
                let forces = results
                    .member_forces(&member.name, &combination.name)
                    .ok_or_else(|| AnalysisError::MissingForces {
                        member: member.name.clone(),
                        combination: combination.name.clone(),
                    })?;
                let ratios = self
                    .checker
                    .ratios(section, forces, &material, &member.context);
                if !ratios.passes() {
                    return Err(Rejection::Strength {
                        member: member.name.clone(),
                        combination: combination.name.clone(),
                        ratios,
                    });
                }
                if governing
                    .as_ref()
                    .map_or(true, |summary| ratios.governing() > summary.ratios.governing())
                {
                    governing = Some(StrengthSummary {
                        member: member.name.clone(),
                        combination: combination.name.clone(),
                        ratios,
                    });
                }
            }
        }
        Ok(governing)
    }
}

/// Text of a panic payload raised with a string message.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Largest absolute X and Y displacements over every node and combination.
fn worst_displacements(results: &AnalysisResults) -> (DeflectionExtreme, DeflectionExtreme) {
    let mut horizontal = DeflectionExtreme::default();
    let mut vertical = DeflectionExtreme::default();
    for (node, combination, displacement) in results.displacements() {
        for (extreme, value) in [
            (&mut horizontal, displacement.x.abs()),
            (&mut vertical, displacement.y.abs()),
        ] {
            // NaN always replaces the current extreme so the limit check fails.
            if value > extreme.value || value.is_nan() {
                *extreme = DeflectionExtreme {
                    value,
                    node: node.to_string(),
                    combination: combination.to_string(),
                };
            }
        }
    }
    (horizontal, vertical)
}
