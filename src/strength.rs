//! Ultimate limit state checks of steel I-section members under combined
//! axial force and major-axis bending.
//!
//! Forces are in N, moments in N.mm, lengths in mm and stresses in MPa.

use std::f64::consts::PI;

use serde::Serialize;

use crate::analysis::MemberForces;
use crate::frame::{Material, MemberRole};
use crate::section::Section;

/// Utilisation ratios of one member under one combination.
///
/// A member passes when every ratio is at most one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct StrengthRatios {
    /// Cross-sectional strength.
    pub css: f64,
    /// Overall member strength.
    pub oms: f64,
    /// Lateral-torsional buckling: interaction ratio and bending-only ratio.
    pub ltb: (f64, f64),
}

impl StrengthRatios {
    /// The largest of the four ratios.
    #[must_use]
    pub fn governing(&self) -> f64 {
        [self.css, self.oms, self.ltb.0, self.ltb.1]
            .into_iter()
            .fold(f64::NEG_INFINITY, |worst, ratio| {
                if ratio.is_nan() {
                    f64::INFINITY
                } else {
                    worst.max(ratio)
                }
            })
    }

    /// Whether every ratio is at most one.
    #[must_use]
    pub fn passes(&self) -> bool {
        self.governing() <= 1.0
    }

    /// Element-wise maximum.
    fn max(self, other: Self) -> Self {
        Self {
            css: self.css.max(other.css),
            oms: self.oms.max(other.oms),
            ltb: (self.ltb.0.max(other.ltb.0), self.ltb.1.max(other.ltb.1)),
        }
    }
}

/// Member information the checks need beyond the section and forces.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MemberContext {
    /// Role of the member.
    pub role: MemberRole,
    /// Effective length for major-axis buckling in mm.
    pub major_length: f64,
    /// Unbraced length for minor-axis and lateral-torsional buckling in mm.
    pub minor_length: f64,
}

/// Computes strength ratios for a member.
pub trait StrengthChecker: Send + Sync {
    /// Ratios of `section` under `forces`.
    fn ratios(
        &self,
        section: &Section,
        forces: &MemberForces,
        material: &Material,
        context: &MemberContext,
    ) -> StrengthRatios;
}

/// Local buckling class of a cross-section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SectionClass {
    /// Reaches the plastic moment and rotates.
    Plastic = 1,
    /// Reaches the plastic moment.
    Compact = 2,
    /// Reaches the yield moment.
    NonCompact = 3,
    /// Buckles locally before yield.
    Slender = 4,
}

impl SectionClass {
    /// Classify a section from its flange and web slenderness.
    ///
    /// Web limits shrink with the axial load `compression`.
    #[must_use]
    pub fn classify(section: &Section, compression: f64, yield_strength: f64) -> Self {
        let root_fy = yield_strength.sqrt();
        let flange_ratio = section.flange_width / (2.0 * section.flange_thickness);
        let flange = [145.0, 170.0, 200.0]
            .iter()
            .position(|limit| flange_ratio < limit / root_fy)
            .unwrap_or(3);

        let squash = 0.9 * section.properties().area * yield_strength;
        let load_ratio = if squash > 0.0 { compression / squash } else { 0.0 };
        let web_ratio = (section.height - 2.0 * section.flange_thickness) / section.web_thickness;
        let web = [(1_100.0, 0.39), (1_700.0, 0.61), (1_900.0, 0.65)]
            .iter()
            .position(|(limit, coefficient)| {
                web_ratio < limit / root_fy * (1.0 - coefficient * load_ratio)
            })
            .unwrap_or(3);

        match flange.max(web) {
            0 => Self::Plastic,
            1 => Self::Compact,
            2 => Self::NonCompact,
            _ => Self::Slender,
        }
    }

    /// Classes 1 and 2 resist bending with the plastic modulus.
    fn uses_plastic_modulus(self) -> bool {
        self <= Self::Compact
    }
}

/// Moment gradient factor for lateral-torsional buckling.
///
/// `k` is the ratio of the smaller to the larger end moment, positive in
/// double curvature. When the span moment exceeds both end moments by ten
/// percent the distribution is treated as uniform.
#[must_use]
pub fn moment_gradient_factor(span_moment: f64, start_moment: f64, end_moment: f64) -> f64 {
    let span = span_moment.abs();
    if span > 1.1 * start_moment.abs() && span > 1.1 * end_moment.abs() {
        return 1.0;
    }
    let (small, large) = if start_moment.abs() <= end_moment.abs() {
        (start_moment, end_moment)
    } else {
        (end_moment, start_moment)
    };
    let k = if large == 0.0 { 0.0 } else { -small / large };
    (1.75 + 1.05 * k + 0.3 * k * k).min(2.5)
}

/// Elastic critical moment of a doubly symmetric I-section.
#[must_use]
pub fn critical_moment(section: &Section, material: &Material, length: f64, gradient: f64) -> f64 {
    let properties = section.properties();
    let e = material.elastic_modulus;
    let torsion = e * properties.iy * material.shear_modulus * properties.j;
    let warping = (PI * e / length).powi(2) * properties.iy * properties.cw;
    gradient * PI / length * (torsion + warping).sqrt()
}

/// Checker for combined axial force and bending in hot-rolled I-sections.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LimitStateChecker {
    /// Resistance factor applied to every resistance.
    pub resistance_factor: f64,
    /// Exponent of the column curve.
    pub column_curve_exponent: f64,
}

impl Default for LimitStateChecker {
    fn default() -> Self {
        Self {
            resistance_factor: 0.9,
            column_curve_exponent: 1.34,
        }
    }
}

impl LimitStateChecker {
    /// Factored compressive resistance at slenderness `lambda`.
    fn compressive_resistance(&self, squash: f64, lambda: f64) -> f64 {
        let n = self.column_curve_exponent;
        self.resistance_factor * squash * (1.0 + lambda.powf(2.0 * n)).powf(-1.0 / n)
    }

    /// Factored moment resistance including lateral-torsional buckling.
    fn ltb_resistance(&self, plastic_moment: f64, critical: f64) -> f64 {
        let phi = self.resistance_factor;
        if critical > 0.67 * plastic_moment {
            (1.15 * phi * plastic_moment * (1.0 - 0.28 * plastic_moment / critical))
                .min(phi * plastic_moment)
        } else {
            phi * critical
        }
    }
}

impl StrengthChecker for LimitStateChecker {
    fn ratios(
        &self,
        section: &Section,
        forces: &MemberForces,
        material: &Material,
        context: &MemberContext,
    ) -> StrengthRatios {
        let phi = self.resistance_factor;
        let properties = section.properties();
        let fy = material.yield_strength;
        let e = material.elastic_modulus;

        let compression = forces.max_compression();
        let tension = forces.max_tension();
        let moment = forces.max_abs_moment();
        let (start_moment, end_moment) = forces.end_moments();

        let class = SectionClass::classify(section, compression, fy);
        let (modulus, coefficient) = if class.uses_plastic_modulus() {
            (properties.zplx, 0.85)
        } else {
            (properties.zex, 1.0)
        };
        let squash = properties.area * fy;
        let moment_resistance = phi * fy * modulus;

        let span_moment = forces.at(forces.length() / 2.0).moment;
        let gradient = moment_gradient_factor(span_moment, start_moment, end_moment);
        let critical = critical_moment(section, material, context.minor_length, gradient);
        let ltb_resistance = self.ltb_resistance(fy * modulus, critical);

        let euler_major = PI * PI * e * properties.ix / context.major_length.powi(2);
        let slenderness = |length: f64, radius: f64| length / radius * (fy / (PI * PI * e)).sqrt();
        let lambda = slenderness(context.major_length, properties.rx)
            .max(slenderness(context.minor_length, properties.ry));

        let bending_only = StrengthRatios {
            css: moment / moment_resistance,
            oms: moment / moment_resistance,
            ltb: (moment / ltb_resistance, moment / ltb_resistance),
        };

        let mut ratios = bending_only;
        if compression > 0.0 {
            let amplified = if compression >= euler_major {
                f64::INFINITY
            } else {
                coefficient * (1.0 / (1.0 - compression / euler_major)).max(1.0) * moment
            };
            let member_resistance = self.compressive_resistance(squash, lambda);
            ratios = ratios.max(StrengthRatios {
                css: compression / (phi * squash) + amplified / moment_resistance,
                oms: compression / member_resistance + amplified / moment_resistance,
                ltb: (
                    compression / member_resistance + amplified / ltb_resistance,
                    moment / ltb_resistance,
                ),
            });
        }
        if tension > 0.0 {
            let axial = tension / (phi * squash);
            ratios = ratios.max(StrengthRatios {
                css: axial + bending_only.css,
                oms: axial + bending_only.oms,
                ltb: (axial + bending_only.ltb.0, bending_only.ltb.1),
            });
        }
        ratios
    }
}
