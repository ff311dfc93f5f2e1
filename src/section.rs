//! Typed rows of the steel section tables.

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::CatalogError;

/// A rolled steel section as listed in the section tables.
///
/// Values are held in the units of the tables: mass in kg/m, dimensions and
/// radii of gyration in mm, area in 10^3 mm^2, second moments of area in
/// 10^6 mm^4, section moduli in 10^3 mm^3, the torsion constant in
/// 10^3 mm^4 and the warping constant in 10^9 mm^6. Use
/// [`Section::properties`] for base units.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Designation, e.g. `254x146x31`.
    #[serde(rename = "Designation")]
    pub designation: String,
    /// Family the section belongs to, e.g. `I-Sections`.
    #[serde(default, rename = "family")]
    pub family: String,
    /// Mass per unit length.
    #[serde(rename = "m")]
    pub mass: f64,
    /// Overall depth.
    #[serde(rename = "h")]
    pub height: f64,
    /// Flange width.
    #[serde(rename = "b")]
    pub flange_width: f64,
    /// Web thickness.
    #[serde(rename = "tw")]
    pub web_thickness: f64,
    /// Flange thickness.
    #[serde(rename = "tf")]
    pub flange_thickness: f64,
    /// Cross-sectional area.
    #[serde(rename = "A")]
    pub area: f64,
    /// Strong-axis second moment of area.
    #[serde(rename = "Ix")]
    pub ix: f64,
    /// Weak-axis second moment of area.
    #[serde(rename = "Iy")]
    pub iy: f64,
    /// Strong-axis elastic section modulus.
    #[serde(rename = "Zex")]
    pub zex: f64,
    /// Weak-axis elastic section modulus.
    #[serde(rename = "Zey")]
    pub zey: f64,
    /// Strong-axis plastic section modulus.
    #[serde(rename = "Zplx")]
    pub zplx: f64,
    /// Weak-axis plastic section modulus.
    #[serde(rename = "Zply")]
    pub zply: f64,
    /// Strong-axis radius of gyration.
    #[serde(rename = "rx")]
    pub rx: f64,
    /// Weak-axis radius of gyration.
    #[serde(rename = "ry")]
    pub ry: f64,
    /// St Venant torsion constant.
    #[serde(rename = "J")]
    pub torsion_constant: f64,
    /// Warping constant.
    #[serde(rename = "Cw")]
    pub warping_constant: f64,
    /// Whether the section is commercially favoured.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub preferred: bool,
}

/// Section properties converted to millimetre based units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SectionProperties {
    /// Area in mm^2.
    pub area: f64,
    /// Strong-axis second moment of area in mm^4.
    pub ix: f64,
    /// Weak-axis second moment of area in mm^4.
    pub iy: f64,
    /// Strong-axis elastic modulus in mm^3.
    pub zex: f64,
    /// Weak-axis elastic modulus in mm^3.
    pub zey: f64,
    /// Strong-axis plastic modulus in mm^3.
    pub zplx: f64,
    /// Weak-axis plastic modulus in mm^3.
    pub zply: f64,
    /// Strong-axis radius of gyration in mm.
    pub rx: f64,
    /// Weak-axis radius of gyration in mm.
    pub ry: f64,
    /// Torsion constant in mm^4.
    pub j: f64,
    /// Warping constant in mm^6.
    pub cw: f64,
}

impl Section {
    /// Convert the tabulated values to base units.
    #[must_use]
    pub fn properties(&self) -> SectionProperties {
        SectionProperties {
            area: self.area * 1.0e3,
            ix: self.ix * 1.0e6,
            iy: self.iy * 1.0e6,
            zex: self.zex * 1.0e3,
            zey: self.zey * 1.0e3,
            zplx: self.zplx * 1.0e3,
            zply: self.zply * 1.0e3,
            rx: self.rx,
            ry: self.ry,
            j: self.torsion_constant * 1.0e3,
            cw: self.warping_constant * 1.0e9,
        }
    }

    /// Check the values the search and the solver depend on.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidSection`] for the first non-finite or
    /// non-positive value among mass, depth, flange width, area and the two
    /// second moments of area.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let required = [
            ("mass", self.mass),
            ("depth", self.height),
            ("flange width", self.flange_width),
            ("area", self.area),
            ("Ix", self.ix),
            ("Iy", self.iy),
        ];
        for (property, value) in required {
            if !value.is_finite() || value <= 0.0 {
                return Err(CatalogError::InvalidSection {
                    designation: self.designation.clone(),
                    property,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Accept the spellings the source tables use for the preferred column.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected a yes/no flag, found '{other}'"
        ))),
    }
}
