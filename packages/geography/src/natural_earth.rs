//! Natural Earth admin1 boundaries, used when UNMAP has no shapes.

use std::path::PathBuf;
use std::sync::OnceLock;

use climada_hdx_geography_models::{AdminLevel, AdminRegions};

use crate::shapes::{BoundaryFeature, FieldNames, load_features, regions_for};
use crate::{BoundaryProvider, GeoError};

const FIELDS: FieldNames = FieldNames {
    iso3: "adm0_a3",
    admin1: "name",
    admin2: None,
};

/// Provider over a Natural Earth "admin 1 states provinces" `GeoJSON` file.
pub struct NaturalEarthProvider {
    path: PathBuf,
    loaded: OnceLock<Vec<BoundaryFeature>>,
}

impl NaturalEarthProvider {
    /// Creates a provider reading `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loaded: OnceLock::new(),
        }
    }

    fn features(&self) -> Result<&[BoundaryFeature], GeoError> {
        if let Some(features) = self.loaded.get() {
            return Ok(features);
        }
        let features = load_features(&self.path, FIELDS)?;
        Ok(self.loaded.get_or_init(|| features))
    }
}

impl BoundaryProvider for NaturalEarthProvider {
    fn name(&self) -> &str {
        "natural-earth"
    }

    fn regions(&self, iso3: &str, level: AdminLevel) -> Result<AdminRegions, GeoError> {
        let not_found = || GeoError::NotFound {
            iso3: iso3.to_string(),
            level,
        };
        if level != AdminLevel::Admin1 {
            return Err(not_found());
        }
        let regions = regions_for(self.features()?, iso3, level);
        if regions.is_empty() {
            return Err(not_found());
        }
        Ok(regions)
    }
}
