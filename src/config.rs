//! Run configuration loaded from TOML.
//!
//! Every key is optional; missing keys take the defaults of the original
//! design office workflow (span/300 vertically, height/175 horizontally and a
//! 3.5 mm flange tolerance).
//!
//! ```toml
//! [design]
//! vertical_divisor = 300.0
//! workers = 4
//!
//! [geometry]
//! roof = "MonoPitched"
//! gable_width = 15000.0
//!
//! [wind]
//! basic_wind_speed = 40.0
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::frame::CharacteristicSpans;
use crate::loads::{PortalLoadGenerator, WindParameters};
use crate::portal::PortalGeometry;

/// Settings of the section search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DesignConfig {
    /// Vertical deflection limit is `span / vertical_divisor`.
    pub vertical_divisor: f64,
    /// Horizontal deflection limit is `eaves_height / horizontal_divisor`.
    pub horizontal_divisor: f64,
    /// Permitted excess of rafter flange over column flange width in mm.
    pub flange_tolerance: f64,
    /// Worker threads shared by both directional searches; zero uses every
    /// available core.
    pub workers: usize,
    /// Restrict candidates to preferred sections.
    pub preferred_only: bool,
    /// Catalog family searched for rafters.
    pub rafter_family: String,
    /// Catalog family searched for columns.
    pub column_family: String,
    /// Skip candidates that cannot beat the current best.
    pub pruning: bool,
    /// Check ultimate limit state strength as well as deflection.
    pub strength_aware: bool,
}

impl Default for DesignConfig {
    fn default() -> Self {
        Self {
            vertical_divisor: 300.0,
            horizontal_divisor: 175.0,
            flange_tolerance: 3.5,
            workers: 0,
            preferred_only: true,
            rafter_family: "I-Sections".to_string(),
            column_family: "I-Sections".to_string(),
            pruning: true,
            strength_aware: true,
        }
    }
}

impl DesignConfig {
    /// Parse and validate a TOML document holding only design keys.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for out of range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("vertical_divisor", self.vertical_divisor),
            ("horizontal_divisor", self.horizontal_divisor),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be a positive number, found {value}"),
                });
            }
        }
        if !self.flange_tolerance.is_finite() || self.flange_tolerance < 0.0 {
            return Err(ConfigError::Invalid {
                field: "flange_tolerance",
                reason: format!("must not be negative, found {}", self.flange_tolerance),
            });
        }
        for (field, family) in [
            ("rafter_family", &self.rafter_family),
            ("column_family", &self.column_family),
        ] {
            if family.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must name a catalog family".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Deflection limits for a frame with the given spans.
    #[must_use]
    pub fn deflection_limits(&self, spans: CharacteristicSpans) -> DeflectionLimits {
        DeflectionLimits {
            vertical: spans.span / self.vertical_divisor,
            horizontal: spans.eaves_height / self.horizontal_divisor,
        }
    }
}

/// Largest accepted absolute displacements in mm.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeflectionLimits {
    /// Limit on displacement along global Y.
    pub vertical: f64,
    /// Limit on displacement along global X.
    pub horizontal: f64,
}

/// Complete description of a portal frame design run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Search settings.
    pub design: DesignConfig,
    /// Frame geometry.
    pub geometry: PortalGeometry,
    /// Site wind parameters.
    pub wind: WindParameters,
    /// Roof loads and frame spacing.
    pub loads: PortalLoadGenerator,
}

impl ProjectConfig {
    /// Parse and validate a project document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for out of range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a project document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise
    /// the errors of [`ProjectConfig::from_toml_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Check value ranges of every section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.design.validate()?;
        if !self.loads.rafter_spacing.is_finite() || self.loads.rafter_spacing <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "loads.rafter_spacing",
                reason: format!("must be positive, found {}", self.loads.rafter_spacing),
            });
        }
        if !self.wind.basic_wind_speed.is_finite() || self.wind.basic_wind_speed < 0.0 {
            return Err(ConfigError::Invalid {
                field: "wind.basic_wind_speed",
                reason: format!("must not be negative, found {}", self.wind.basic_wind_speed),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::RoofShape;

    #[test]
    fn missing_keys_take_defaults() {
        let config = DesignConfig::from_toml_str("workers = 2\n").expect("valid config");
        assert_eq!(config.workers, 2);
        assert_eq!(config.vertical_divisor, 300.0);
        assert!(config.pruning);
    }

    #[test]
    fn non_positive_divisors_are_rejected() {
        let error = DesignConfig::from_toml_str("horizontal_divisor = 0.0\n")
            .expect_err("zero divisor rejected");
        assert!(matches!(
            error,
            ConfigError::Invalid {
                field: "horizontal_divisor",
                ..
            }
        ));
        let error = DesignConfig::from_toml_str("vertical_divisor = \"tall\"\n")
            .expect_err("wrong type rejected");
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn project_sections_are_parsed() {
        let source = r#"
            [design]
            preferred_only = false
            column_family = "H-Sections"

            [geometry]
            roof = "MonoPitched"
            gable_width = 15000.0

            [wind]
            basic_wind_speed = 40.0
        "#;
        let project = ProjectConfig::from_toml_str(source).expect("valid project");
        assert!(!project.design.preferred_only);
        assert_eq!(project.design.column_family, "H-Sections");
        assert_eq!(project.geometry.roof, RoofShape::MonoPitched);
        assert_eq!(project.geometry.eaves_height, 4_000.0);
        assert_eq!(project.wind.basic_wind_speed, 40.0);
        assert_eq!(project.loads, PortalLoadGenerator::default());
    }

    #[test]
    fn limits_scale_with_frame_spans() {
        let limits = DesignConfig::default().deflection_limits(CharacteristicSpans {
            span: 12_000.0,
            eaves_height: 3_500.0,
        });
        assert!((limits.vertical - 40.0).abs() < 1.0e-12);
        assert!((limits.horizontal - 20.0).abs() < 1.0e-12);
    }
}
