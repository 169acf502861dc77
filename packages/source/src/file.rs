//! File-backed [`HazardSource`].
//!
//! Each dataset is one JSON document at
//! `{root}/{data_type}/{property values joined by '_'}.json`, with property
//! values ordered by property name. A request without properties reads
//! `{root}/{data_type}/{data_type}.json`.
//!
//! Snapshot grids are column-oriented:
//!
//! ```json
//! { "latitude": [..], "longitude": [..], "value": [..], "region_id": [..] }
//! ```
//!
//! Event series carry one row of intensities per event:
//!
//! ```json
//! { "latitude": [..], "longitude": [..],
//!   "event_name": [..], "date": [..], "intensity": [[..], ..] }
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use climada_hdx_indicator_models::PointSet;
use serde::Deserialize;

use crate::{DataRequest, EventSeries, ExposureGrid, HazardEvent, HazardSource, SourceError};

#[derive(Deserialize)]
struct RawGrid {
    latitude: Vec<f64>,
    longitude: Vec<f64>,
    value: Vec<f64>,
    #[serde(default)]
    region_id: Option<Vec<u32>>,
}

#[derive(Deserialize)]
struct RawSeries {
    latitude: Vec<f64>,
    longitude: Vec<f64>,
    event_name: Vec<String>,
    date: serde_json::Value,
    intensity: Vec<Vec<f64>>,
}

/// Reads datasets exported to a local directory.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    /// Creates a source rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the document answering `request`.
    #[must_use]
    pub fn path_for(&self, request: &DataRequest) -> PathBuf {
        let stem = if request.properties.is_empty() {
            request.data_type.clone()
        } else {
            request
                .properties
                .values()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("_")
        };
        self.root
            .join(&request.data_type)
            .join(format!("{stem}.json"))
    }

    async fn read(&self, request: &DataRequest) -> Result<String, SourceError> {
        let path = self.path_for(request);
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No dataset file at {}", path.display());
                Err(request.no_data())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl HazardSource for FileSource {
    async fn point_grid(&self, request: &DataRequest) -> Result<ExposureGrid, SourceError> {
        let body = self.read(request).await?;
        parse_grid(&body, &self.path_for(request))
    }

    async fn event_series(&self, request: &DataRequest) -> Result<EventSeries, SourceError> {
        let body = self.read(request).await?;
        parse_series(&body, &self.path_for(request))
    }
}

fn parse_grid(body: &str, path: &Path) -> Result<ExposureGrid, SourceError> {
    let raw: RawGrid = serde_json::from_str(body)?;

    let points = PointSet::from_columns(&raw.latitude, &raw.longitude, &raw.value).ok_or_else(
        || SourceError::Malformed {
            message: format!(
                "{}: latitude, longitude and value columns differ in length",
                path.display()
            ),
        },
    )?;

    let id_count = raw.region_id.as_ref().map_or(points.len(), Vec::len);
    if id_count != points.len() {
        return Err(SourceError::Malformed {
            message: format!(
                "{}: {id_count} region ids for {} points",
                path.display(),
                points.len()
            ),
        });
    }

    Ok(ExposureGrid {
        points,
        region_ids: raw.region_id,
    })
}

fn parse_series(body: &str, path: &Path) -> Result<EventSeries, SourceError> {
    let raw: RawSeries = serde_json::from_str(body)?;

    if raw.latitude.len() != raw.longitude.len() {
        return Err(SourceError::Malformed {
            message: format!(
                "{}: {} latitudes for {} longitudes",
                path.display(),
                raw.latitude.len(),
                raw.longitude.len()
            ),
        });
    }

    let dates = parse_dates(&raw.date, raw.event_name.len()).map_err(|message| {
        SourceError::Malformed {
            message: format!("{}: {message}", path.display()),
        }
    })?;

    if raw.intensity.len() != raw.event_name.len() {
        return Err(SourceError::Malformed {
            message: format!(
                "{}: {} intensity rows for {} events",
                path.display(),
                raw.intensity.len(),
                raw.event_name.len()
            ),
        });
    }

    let series = EventSeries {
        centroids: raw.latitude.into_iter().zip(raw.longitude).collect(),
        events: raw
            .event_name
            .into_iter()
            .zip(dates)
            .zip(raw.intensity)
            .map(|((name, date), intensity)| HazardEvent {
                name,
                date,
                intensity,
            })
            .collect(),
    };
    series.validate()?;

    Ok(series)
}

/// The date column must be a flat array of integer ordinals, one per event.
fn parse_dates(value: &serde_json::Value, events: usize) -> Result<Vec<i64>, String> {
    let array = value
        .as_array()
        .ok_or_else(|| format!("event date column is not an array: {value}"))?;

    if array.len() != events {
        return Err(format!(
            "event date column has {} entries for {events} events",
            array.len()
        ));
    }

    array
        .iter()
        .map(|d| {
            d.as_i64()
                .ok_or_else(|| format!("event date {d} is not an integer ordinal"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, data_type: &str, stem: &str, body: &str) {
        let folder = dir.join(data_type);
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join(format!("{stem}.json")), body).unwrap();
    }

    #[test]
    fn path_joins_values_in_property_order() {
        let source = FileSource::new("/data");
        let request = DataRequest::new("litpop")
            .with("fin_mode", "pc")
            .with("exponents", "(1,1)")
            .with("country_iso3num", "332");
        assert_eq!(
            source.path_for(&request),
            PathBuf::from("/data/litpop/332_(1,1)_pc.json")
        );
        assert_eq!(
            source.path_for(&DataRequest::new("flood")),
            PathBuf::from("/data/flood/flood.json")
        );
    }

    #[tokio::test]
    async fn reads_point_grid() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "crop_production",
            "mai_noirr",
            r#"{"latitude":[1.0,2.0],"longitude":[3.0,4.0],"value":[5.0,6.0],"region_id":[332,4]}"#,
        );
        let source = FileSource::new(dir.path());
        let request = DataRequest::new("crop_production")
            .with("crop", "mai")
            .with("irrigation_status", "noirr");
        let grid = source.point_grid(&request).await.unwrap();
        assert_eq!(grid.points.len(), 2);
        assert_eq!(grid.region_ids, Some(vec![332, 4]));
    }

    #[tokio::test]
    async fn missing_file_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(dir.path());
        let err = source
            .point_grid(&DataRequest::new("litpop").with("country_iso3num", "760"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NoData { .. }));
    }

    #[tokio::test]
    async fn reads_event_series() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "earthquake",
            "HTI",
            r#"{"latitude":[18.5,19.0],"longitude":[-72.3,-72.0],
                "event_name":["ev1","ev2"],"date":[696908,737000],
                "intensity":[[0.0,0.0],[5.2,6.1]]}"#,
        );
        let source = FileSource::new(dir.path());
        let series = source
            .event_series(&DataRequest::new("earthquake").with("country_iso3alpha", "HTI"))
            .await
            .unwrap();
        assert_eq!(series.centroids.len(), 2);
        assert_eq!(series.events[1].date, 737_000);
        assert_eq!(series.events[1].intensity, vec![5.2, 6.1]);
    }

    #[tokio::test]
    async fn non_integer_dates_are_malformed() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "flood",
            "COL",
            r#"{"latitude":[1.0],"longitude":[1.0],
                "event_name":["DFO_1"],"date":[[1, 2]],"intensity":[[1.0]]}"#,
        );
        let source = FileSource::new(dir.path());
        let err = source
            .event_series(&DataRequest::new("flood").with("country_iso3alpha", "COL"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }), "{err}");
    }

    #[test]
    fn date_column_shape_is_checked() {
        assert!(parse_dates(&serde_json::json!(737_000), 1).is_err());
        assert!(parse_dates(&serde_json::json!([1, 2]), 1).is_err());
        assert!(parse_dates(&serde_json::json!([1.5]), 1).is_err());
        assert_eq!(parse_dates(&serde_json::json!([1, 2]), 2).unwrap(), vec![1, 2]);
    }

    #[test]
    fn ragged_grid_is_malformed() {
        let err = parse_grid(
            r#"{"latitude":[1.0],"longitude":[1.0,2.0],"value":[1.0]}"#,
            Path::new("x.json"),
        )
        .unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }
}
