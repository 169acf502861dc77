//! `GeoJSON` boundary file parsing.

use std::path::Path;

use climada_hdx_geography_models::{AdminLevel, AdminRegions, Region};
use geo::MultiPolygon;
use geojson::{Feature, GeoJson};

use crate::GeoError;

/// Property names identifying a feature's country and regions.
#[derive(Debug, Clone, Copy)]
pub struct FieldNames {
    /// ISO 3166-1 alpha-3 country code property.
    pub iso3: &'static str,
    /// Admin1 name property.
    pub admin1: &'static str,
    /// Admin2 name property, for admin2 files.
    pub admin2: Option<&'static str>,
}

/// One boundary feature with its names resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryFeature {
    /// Country code.
    pub iso3: String,
    /// Admin1 name.
    pub admin1: String,
    /// Admin2 name for admin2 features.
    pub admin2: Option<String>,
    /// Shape.
    pub geometry: MultiPolygon<f64>,
}

/// Reads every usable feature of a `GeoJSON` feature collection.
///
/// Features without the named properties or without a polygonal geometry
/// are skipped.
///
/// # Errors
///
/// Returns [`GeoError`] if the file cannot be read or is not a feature
/// collection.
pub fn load_features(path: &Path, fields: FieldNames) -> Result<Vec<BoundaryFeature>, GeoError> {
    log::info!("Loading boundaries from {}", path.display());
    let text = std::fs::read_to_string(path)?;
    parse_features(&text, fields)
}

/// Parses a `GeoJSON` feature collection. See [`load_features`].
///
/// # Errors
///
/// Returns [`GeoError`] if the text is not a feature collection.
pub fn parse_features(text: &str, fields: FieldNames) -> Result<Vec<BoundaryFeature>, GeoError> {
    let geojson: GeoJson = text.parse()?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(GeoError::Conversion {
            message: "boundary file is not a FeatureCollection".to_string(),
        });
    };

    let total = collection.features.len();
    let features: Vec<BoundaryFeature> = collection
        .features
        .into_iter()
        .filter_map(|f| to_boundary_feature(f, fields))
        .collect();

    if features.len() < total {
        log::debug!(
            "Skipped {} of {total} features without names or polygon geometry",
            total - features.len()
        );
    }

    Ok(features)
}

fn to_boundary_feature(feature: Feature, fields: FieldNames) -> Option<BoundaryFeature> {
    let iso3 = string_property(&feature, fields.iso3)?;
    let admin1 = string_property(&feature, fields.admin1)?;
    let admin2 = match fields.admin2 {
        Some(key) => Some(string_property(&feature, key)?),
        None => None,
    };
    let geometry = to_multipolygon(feature.geometry?)?;

    Some(BoundaryFeature {
        iso3,
        admin1,
        admin2,
        geometry,
    })
}

fn string_property(feature: &Feature, key: &str) -> Option<String> {
    feature
        .property(key)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Builds the ordered regions of `iso3` at `level`.
///
/// Features sharing a name pair are merged into one multi-part region at
/// the position of the first one seen.
#[must_use]
pub fn regions_for(features: &[BoundaryFeature], iso3: &str, level: AdminLevel) -> AdminRegions {
    let mut regions: Vec<Region> = Vec::new();

    for feature in features.iter().filter(|f| f.iso3 == iso3) {
        let region = match (level, &feature.admin2) {
            (AdminLevel::Admin2, Some(admin2)) => {
                Region::admin2(&feature.admin1, admin2, feature.geometry.clone())
            }
            (AdminLevel::Admin2, None) => continue,
            (AdminLevel::Admin1, _) => Region::admin1(&feature.admin1, feature.geometry.clone()),
        };

        let identity = region.identity();
        match regions.iter().position(|r| r.identity() == identity) {
            Some(i) => regions[i].geometry.0.extend(region.geometry.0),
            None => regions.push(region),
        }
    }

    AdminRegions { level, regions }
}
