#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Indicator taxonomy, point data, and the canonical output row types.
//!
//! Every hazard or exposure dataset the pipeline handles is identified by an
//! [`Indicator`]. How its values are filtered, corrected, and reduced is
//! described once in the [`policy`] table rather than scattered through the
//! aggregation code.

pub mod policy;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// A published indicator family.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Indicator {
    /// Asset exposure (`LitPop`), modelled value per grid cell.
    Litpop,
    /// Crop production in USD for four crops, irrigated and rain-fed.
    CropProduction,
    /// Seismic intensity.
    Earthquake,
    /// Flood extent from the Dartmouth Flood Observatory archive.
    Flood,
    /// Wildfire brightness.
    Wildfire,
    /// Modelled river flood depth.
    RiverFlood,
    /// Tropical cyclone wind speed.
    TropicalCyclone,
    /// European winter storm wind gusts.
    StormEurope,
}

/// Reduction label written to the `aggregation` column.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Aggregation {
    /// Detail rows, not reduced.
    None,
    /// Maximum of the region's values.
    Max,
    /// Sum (or nonzero-cell count) of the region's values.
    Sum,
}

/// A single grid value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Indicator value at this location.
    pub value: f64,
}

impl Point {
    /// Creates a point.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64, value: f64) -> Self {
        Self {
            latitude,
            longitude,
            value,
        }
    }
}

/// An ordered collection of points sharing one grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointSet {
    points: Vec<Point>,
}

impl PointSet {
    /// Wraps a list of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Builds a point set from parallel coordinate and value columns.
    ///
    /// Returns `None` when the columns differ in length.
    #[must_use]
    pub fn from_columns(latitudes: &[f64], longitudes: &[f64], values: &[f64]) -> Option<Self> {
        if latitudes.len() != longitudes.len() || latitudes.len() != values.len() {
            return None;
        }
        Some(Self {
            points: latitudes
                .iter()
                .zip(longitudes)
                .zip(values)
                .map(|((&lat, &lon), &value)| Point::new(lat, lon, value))
                .collect(),
        })
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Borrow the points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Iterates the points.
    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    /// Keeps only the points matching `keep`. Changes cardinality, so any
    /// index-aligned mask computed before this call no longer applies.
    pub fn retain(&mut self, keep: impl FnMut(&Point) -> bool) {
        self.points.retain(keep);
    }

    /// Applies `f` to every value in place.
    pub fn map_values(&mut self, mut f: impl FnMut(f64) -> f64) {
        for point in &mut self.points {
            point.value = f(point.value);
        }
    }
}

impl FromIterator<Point> for PointSet {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PointSet {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Points that fell inside one region, tagged with the indicator key they
/// were filtered for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredRows {
    /// Indicator key attached to every row.
    pub indicator: String,
    /// Points inside the region, in grid order.
    pub points: Vec<Point>,
}

impl FilteredRows {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether no point fell inside the region.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Mean latitude and longitude of the rows, or `None` when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_location(&self) -> Option<(f64, f64)> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let (lat, lon) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(lat, lon), p| (lat + p.latitude, lon + p.longitude));
        Some((lat / n, lon / n))
    }
}

/// A row of a detail or summary CSV.
///
/// Field order is the canonical column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    /// Country display name.
    pub country_name: String,
    /// Admin1 region name.
    pub region_name: String,
    /// Latitude of the grid cell (detail) or mean of the region's cells
    /// (summary).
    pub latitude: f64,
    /// Longitude, as for `latitude`.
    pub longitude: f64,
    /// `none` for detail rows, the reduction used for summary rows.
    pub aggregation: Aggregation,
    /// Indicator key.
    pub indicator: String,
    /// Value.
    pub value: f64,
}

/// One region's aggregate for one hazard event.
///
/// Only emitted when `value > 0`. Field order is the timeseries CSV column
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Country display name.
    pub country_name: String,
    /// Admin1 region name.
    pub admin1_name: String,
    /// Admin2 region name, empty when the country only has admin1 shapes.
    pub admin2_name: String,
    /// Mean latitude of the region's contributing cells (4 decimals).
    pub latitude: f64,
    /// Mean longitude of the region's contributing cells (4 decimals).
    pub longitude: f64,
    /// Reduction used.
    pub aggregation: Aggregation,
    /// Timeseries indicator key.
    pub indicator: String,
    /// ISO-8601 timestamp of the event (`YYYY-MM-DDT00:00:00`).
    pub event_date: String,
    /// Aggregate value, always strictly positive.
    pub value: f64,
}

/// Rounds half to even at `decimals` places.
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
