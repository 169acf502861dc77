//! OCHA/UNMAP admin boundaries published on HDX.
//!
//! Reads `polbnda_adm1_1m_ocha.geojson` and `polbnda_adm2_1m_ocha.geojson`
//! from the boundary directory. Each file is parsed once per provider.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use climada_hdx_geography_models::{AdminLevel, AdminRegions};

use crate::shapes::{BoundaryFeature, FieldNames, load_features, regions_for};
use crate::{BoundaryProvider, GeoError};

/// File name of the boundaries at `level`.
#[must_use]
pub fn file_name(level: AdminLevel) -> String {
    format!("polbnda_adm{level}_1m_ocha.geojson")
}

const fn fields(level: AdminLevel) -> FieldNames {
    FieldNames {
        iso3: "alpha_3",
        admin1: "ADM1_REF",
        admin2: match level {
            AdminLevel::Admin1 => None,
            AdminLevel::Admin2 => Some("ADM2_REF"),
        },
    }
}

/// Provider over the UNMAP files in one directory.
pub struct UnmapProvider {
    boundary_dir: PathBuf,
    loaded: Mutex<BTreeMap<AdminLevel, Arc<Vec<BoundaryFeature>>>>,
}

impl UnmapProvider {
    /// Creates a provider reading from `boundary_dir`.
    #[must_use]
    pub fn new(boundary_dir: impl Into<PathBuf>) -> Self {
        Self {
            boundary_dir: boundary_dir.into(),
            loaded: Mutex::new(BTreeMap::new()),
        }
    }

    /// Directory the files are read from.
    #[must_use]
    pub fn boundary_dir(&self) -> &Path {
        &self.boundary_dir
    }

    fn features(&self, level: AdminLevel) -> Result<Arc<Vec<BoundaryFeature>>, GeoError> {
        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(features) = loaded.get(&level) {
            return Ok(Arc::clone(features));
        }
        let path = self.boundary_dir.join(file_name(level));
        let features = Arc::new(load_features(&path, fields(level))?);
        loaded.insert(level, Arc::clone(&features));
        Ok(features)
    }
}

impl BoundaryProvider for UnmapProvider {
    fn name(&self) -> &str {
        "unmap"
    }

    fn regions(&self, iso3: &str, level: AdminLevel) -> Result<AdminRegions, GeoError> {
        let features = self.features(level)?;
        let regions = regions_for(&features, iso3, level);
        if regions.is_empty() {
            return Err(GeoError::NotFound {
                iso3: iso3.to_string(),
                level,
            });
        }
        Ok(regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::tests::{collection, square_feature};

    #[test]
    fn reads_admin2_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(file_name(AdminLevel::Admin2)),
            collection(&[
                square_feature(r#"{"alpha_3":"HTI","ADM1_REF":"Sud","ADM2_REF":"Cayes"}"#, 0.0, 0.0),
                square_feature(r#"{"alpha_3":"HTI","ADM1_REF":"Nord","ADM2_REF":"Cap"}"#, 1.0, 0.0),
            ]),
        )
        .unwrap();

        let provider = UnmapProvider::new(dir.path());
        let regions = provider.regions("HTI", AdminLevel::Admin2).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions.level, AdminLevel::Admin2);

        let err = provider.regions("AFG", AdminLevel::Admin2).unwrap_err();
        assert!(matches!(err, GeoError::NotFound { .. }));
    }

    #[test]
    fn missing_file_is_a_lookup_miss() {
        let dir = tempfile::tempdir().unwrap();
        let provider = UnmapProvider::new(dir.path());
        let err = provider.regions("HTI", AdminLevel::Admin1).unwrap_err();
        assert!(err.is_lookup_miss());
    }

    #[test]
    fn file_names() {
        assert_eq!(file_name(AdminLevel::Admin1), "polbnda_adm1_1m_ocha.geojson");
        assert_eq!(file_name(AdminLevel::Admin2), "polbnda_adm2_1m_ocha.geojson");
    }
}
