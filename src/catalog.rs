//! Section catalog: families of sections kept in ascending order of mass.
//!
//! The ordering is what the directional search relies on for its pruning
//! bounds, so every way of adding a section goes through [`SectionCatalog::insert`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::errors::CatalogError;
use crate::section::Section;

/// Mapping from family name to a mass-ascending sequence of sections.
#[derive(Clone, Debug, Default)]
pub struct SectionCatalog {
    /// Sections per family, sorted by mass with ties in insertion order.
    families: BTreeMap<String, Vec<Arc<Section>>>,
}

impl SectionCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a table whose rows carry their own `family` column.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::MalformedRow`] for the first row that does not
    /// match the schema or has no family, and any error from [`Self::insert`].
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        Self::read_table(reader, None)
    }

    /// Load a table and place rows without a `family` value in `family`.
    ///
    /// # Errors
    ///
    /// As for [`Self::from_csv_reader`].
    pub fn from_csv_reader_with_family<R: Read>(
        reader: R,
        family: &str,
    ) -> Result<Self, CatalogError> {
        Self::read_table(reader, Some(family))
    }

    /// Load a table from disk.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] when the file cannot be opened, otherwise as
    /// for [`Self::from_csv_reader`].
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_csv_reader(file)
    }

    /// Parse every row once against the typed schema.
    fn read_table<R: Read>(reader: R, default_family: Option<&str>) -> Result<Self, CatalogError> {
        let mut csv = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut catalog = Self::new();
        for (index, record) in csv.deserialize::<Section>().enumerate() {
            let row = index + 1;
            let mut section = record.map_err(|error| CatalogError::MalformedRow {
                row,
                reason: error.to_string(),
            })?;
            if section.family.is_empty() {
                match default_family {
                    Some(family) => section.family = family.to_string(),
                    None => {
                        return Err(CatalogError::MalformedRow {
                            row,
                            reason: "missing section family".to_string(),
                        })
                    }
                }
            }
            section.validate().map_err(|error| CatalogError::MalformedRow {
                row,
                reason: error.to_string(),
            })?;
            catalog.insert(section)?;
        }
        debug!(
            families = catalog.families.len(),
            sections = catalog.len(),
            "section catalog loaded"
        );
        Ok(catalog)
    }

    /// Add a section to its family, keeping the family sorted by mass.
    ///
    /// Sections of equal mass keep the order in which they were inserted.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidSection`] when the section fails
    /// [`Section::validate`] and [`CatalogError::DuplicateSection`] when the
    /// family already holds the designation.
    ///
    /// # Examples
    /// ```
    /// use portalx::{Section, SectionCatalog};
    ///
    /// let mut catalog = SectionCatalog::new();
    /// for (designation, mass) in [("heavy", 40.0), ("light", 20.0)] {
    ///     catalog
    ///         .insert(Section {
    ///             designation: designation.to_string(),
    ///             family: "I-Sections".to_string(),
    ///             mass,
    ///             height: 300.0,
    ///             flange_width: 150.0,
    ///             area: 3.0,
    ///             ix: 50.0,
    ///             iy: 5.0,
    ///             ..Section::default()
    ///         })
    ///         .expect("valid section");
    /// }
    /// let family = catalog.sections_of("I-Sections").expect("family exists");
    /// assert_eq!(family[0].designation, "light");
    /// ```
    pub fn insert(&mut self, section: Section) -> Result<(), CatalogError> {
        section.validate()?;
        let family = self.families.entry(section.family.clone()).or_default();
        if family
            .iter()
            .any(|existing| existing.designation == section.designation)
        {
            return Err(CatalogError::DuplicateSection {
                family: section.family,
                designation: section.designation,
            });
        }
        let position = family.partition_point(|existing| existing.mass <= section.mass);
        family.insert(position, Arc::new(section));
        Ok(())
    }

    /// Sections of `family` in ascending order of mass.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownFamily`] when the family is absent.
    pub fn sections_of(&self, family: &str) -> Result<&[Arc<Section>], CatalogError> {
        self.families
            .get(family)
            .map(Vec::as_slice)
            .ok_or_else(|| CatalogError::UnknownFamily(family.to_string()))
    }

    /// Find a section by family and designation.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownFamily`] when the family is absent and
    /// [`CatalogError::NotFound`] when the designation is not in it.
    pub fn lookup(&self, family: &str, designation: &str) -> Result<Arc<Section>, CatalogError> {
        self.sections_of(family)?
            .iter()
            .find(|section| section.designation == designation)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound {
                family: family.to_string(),
                designation: designation.to_string(),
            })
    }

    /// Preferred sections of `family`, still in ascending order of mass.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownFamily`] when the family is absent.
    pub fn filter_preferred(&self, family: &str) -> Result<Vec<Arc<Section>>, CatalogError> {
        Ok(self
            .sections_of(family)?
            .iter()
            .filter(|section| section.preferred)
            .cloned()
            .collect())
    }

    /// The candidate list for one member role.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownFamily`] when the family is absent.
    pub fn candidates(
        &self,
        family: &str,
        preferred_only: bool,
    ) -> Result<Vec<Arc<Section>>, CatalogError> {
        if preferred_only {
            self.filter_preferred(family)
        } else {
            Ok(self.sections_of(family)?.to_vec())
        }
    }

    /// Names of the families held by the catalog.
    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.families.keys().map(String::as_str)
    }

    /// Total number of sections across all families.
    #[must_use]
    pub fn len(&self) -> usize {
        self.families.values().map(Vec::len).sum()
    }

    /// Whether the catalog holds no sections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
