#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Hazard and exposure data sources.
//!
//! The aggregation pipeline only sees the [`HazardSource`] trait: a point
//! grid for exposure snapshots, or an event series (shared centroids plus
//! one intensity vector and ordinal date per event) for hazards. The
//! [`file::FileSource`] implementation reads exports laid out on disk;
//! [`climada::ClimadaClient`] browses the public CLIMADA data catalogue.

pub mod climada;
pub mod file;
pub mod progress;
pub mod retry;

use std::collections::BTreeMap;

use async_trait::async_trait;
use climada_hdx_indicator_models::{Point, PointSet};

/// Errors that can occur during data source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The source has no dataset for this request.
    #[error("No {data_type} data for {request}")]
    NoData {
        /// Data type requested.
        data_type: String,
        /// Rendered request properties.
        request: String,
    },

    /// The source returned data with an impossible type or shape.
    #[error("Malformed upstream data: {message}")]
    Malformed {
        /// Description of what went wrong.
        message: String,
    },

    /// Unexpected response from a remote service.
    #[error("Normalization error: {message}")]
    Normalization {
        /// Description of what went wrong.
        message: String,
    },
}

/// Request for one dataset: a CLIMADA data type plus property filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    /// CLIMADA data type (`"litpop"`, `"earthquake"`, ...).
    pub data_type: String,
    /// Property filters, e.g. `country_iso3alpha = "HTI"`.
    pub properties: BTreeMap<String, String>,
}

impl DataRequest {
    /// Creates a request with no property filters.
    #[must_use]
    pub fn new(data_type: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Adds a property filter.
    #[must_use]
    pub fn with(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(property.into(), value.into());
        self
    }

    /// Renders the properties as `key=value, ...` for log and error
    /// messages.
    #[must_use]
    pub fn describe(&self) -> String {
        self.properties
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Builds the [`SourceError::NoData`] for this request.
    #[must_use]
    pub fn no_data(&self) -> SourceError {
        SourceError::NoData {
            data_type: self.data_type.clone(),
            request: self.describe(),
        }
    }
}

/// A snapshot grid of exposure values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExposureGrid {
    /// Grid values.
    pub points: PointSet,
    /// ISO 3166 numeric country code per point, present for global grids.
    pub region_ids: Option<Vec<u32>>,
}

impl ExposureGrid {
    /// Points whose `region_id` equals `region_id`, or every point when the
    /// grid has no region column.
    #[must_use]
    pub fn for_region_id(&self, region_id: u32) -> PointSet {
        match &self.region_ids {
            None => self.points.clone(),
            Some(ids) => self
                .points
                .iter()
                .zip(ids)
                .filter(|(_, id)| **id == region_id)
                .map(|(p, _)| *p)
                .collect(),
        }
    }
}

/// One hazard event over the series' centroids.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardEvent {
    /// Upstream event identifier (e.g. `DFO_4515`, or a river flood
    /// scenario name carrying its climate model).
    pub name: String,
    /// Proleptic Gregorian ordinal of the event date (day 1 = 0001-01-01).
    pub date: i64,
    /// Intensity per centroid, index-aligned with [`EventSeries::centroids`].
    pub intensity: Vec<f64>,
}

impl HazardEvent {
    /// Whether every intensity is exactly zero.
    #[must_use]
    pub fn all_zero(&self) -> bool {
        self.intensity.iter().all(|v| *v == 0.0)
    }
}

/// Hazard events sharing one centroid grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventSeries {
    /// Centroid coordinates as `(latitude, longitude)`.
    pub centroids: Vec<(f64, f64)>,
    /// Events in upstream order.
    pub events: Vec<HazardEvent>,
}

impl EventSeries {
    /// Point set for one event's intensities on the shared grid.
    #[must_use]
    pub fn event_points(&self, event: &HazardEvent) -> PointSet {
        self.centroids
            .iter()
            .zip(&event.intensity)
            .map(|(&(lat, lon), &value)| Point::new(lat, lon, value))
            .collect()
    }

    /// Per-centroid maximum intensity over all events. Centroids with no
    /// events get `0.0`.
    #[must_use]
    pub fn max_intensity(&self) -> PointSet {
        self.centroids
            .iter()
            .enumerate()
            .map(|(i, &(lat, lon))| {
                let value = self
                    .events
                    .iter()
                    .filter_map(|e| e.intensity.get(i).copied())
                    .fold(0.0_f64, f64::max);
                Point::new(lat, lon, value)
            })
            .collect()
    }

    /// Checks that every event has one intensity per centroid.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Malformed`] naming the first event whose
    /// intensity vector has the wrong length.
    pub fn validate(&self) -> Result<(), SourceError> {
        for event in &self.events {
            if event.intensity.len() != self.centroids.len() {
                return Err(SourceError::Malformed {
                    message: format!(
                        "event {} has {} intensities for {} centroids",
                        event.name,
                        event.intensity.len(),
                        self.centroids.len()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Supplier of hazard and exposure data.
#[async_trait]
pub trait HazardSource: Send + Sync {
    /// Fetches a single snapshot grid.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NoData`] when no dataset matches, or another
    /// [`SourceError`] if retrieval or decoding fails.
    async fn point_grid(&self, request: &DataRequest) -> Result<ExposureGrid, SourceError>;

    /// Fetches a per-event series.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NoData`] when no dataset matches, and
    /// [`SourceError::Malformed`] when the date or intensity arrays have
    /// the wrong type or shape.
    async fn event_series(&self, request: &DataRequest) -> Result<EventSeries, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> EventSeries {
        EventSeries {
            centroids: vec![(1.0, 2.0), (3.0, 4.0)],
            events: vec![
                HazardEvent {
                    name: "a".to_string(),
                    date: 700_000,
                    intensity: vec![0.5, 0.0],
                },
                HazardEvent {
                    name: "b".to_string(),
                    date: 700_001,
                    intensity: vec![0.2, 3.0],
                },
            ],
        }
    }

    #[test]
    fn max_intensity_is_per_centroid() {
        let max = series().max_intensity();
        assert_eq!(
            max.points(),
            &[Point::new(1.0, 2.0, 0.5), Point::new(3.0, 4.0, 3.0)]
        );
    }

    #[test]
    fn all_zero_events() {
        let mut s = series();
        assert!(!s.events[0].all_zero());
        s.events[0].intensity = vec![0.0, 0.0];
        assert!(s.events[0].all_zero());
    }

    #[test]
    fn event_points_follow_centroids() {
        let s = series();
        let points = s.event_points(&s.events[1]);
        assert_eq!(points.points()[1], Point::new(3.0, 4.0, 3.0));
    }

    #[test]
    fn validate_rejects_ragged_events() {
        let mut s = series();
        assert!(s.validate().is_ok());
        s.events[0].intensity.pop();
        assert!(matches!(s.validate(), Err(SourceError::Malformed { .. })));
    }

    #[test]
    fn region_filter_on_global_grid() {
        let grid = ExposureGrid {
            points: PointSet::new(vec![
                Point::new(0.0, 0.0, 1.0),
                Point::new(1.0, 1.0, 2.0),
                Point::new(2.0, 2.0, 3.0),
            ]),
            region_ids: Some(vec![332, 4, 332]),
        };
        let haiti = grid.for_region_id(332);
        assert_eq!(haiti.len(), 2);
        assert!((haiti.iter().map(|p| p.value).sum::<f64>() - 4.0).abs() < 1e-12);

        let local = ExposureGrid {
            region_ids: None,
            ..grid
        };
        assert_eq!(local.for_region_id(332).len(), 3);
    }

    #[test]
    fn request_describes_sorted_properties() {
        let request = DataRequest::new("litpop")
            .with("fin_mode", "pc")
            .with("country_iso3num", "332");
        assert_eq!(request.describe(), "country_iso3num=332, fin_mode=pc");
        assert!(request.no_data().to_string().contains("No litpop data"));
    }
}
