//! CSV writers.
//!
//! Every file starts with the column header followed by one HXL tag row.
//! Summary and timeseries files hold rows for many countries; writing a
//! country's rows replaces whatever that country had before, so reruns
//! never duplicate rows.

use std::path::{Path, PathBuf};

use climada_hdx_indicator_models::{EventRecord, IndicatorRow};
use serde::Serialize;

use crate::PublishError;

/// Columns of detail and summary files.
pub const DETAIL_COLUMNS: &[&str] = &[
    "country_name",
    "region_name",
    "latitude",
    "longitude",
    "aggregation",
    "indicator",
    "value",
];

/// HXL tags of detail and summary files.
pub const DETAIL_HXL: &[&str] = &[
    "#country",
    "#adm1+name",
    "#geo+lat",
    "#geo+lon",
    "",
    "#indicator+name",
    "#indicator+num",
];

/// Columns of timeseries files.
pub const TIMESERIES_COLUMNS: &[&str] = &[
    "country_name",
    "admin1_name",
    "admin2_name",
    "latitude",
    "longitude",
    "aggregation",
    "indicator",
    "event_date",
    "value",
];

/// HXL tags of timeseries files.
pub const TIMESERIES_HXL: &[&str] = &[
    "#country",
    "#adm1+name",
    "#adm2+name",
    "#geo+lat",
    "#geo+lon",
    "",
    "#indicator+name",
    "#date",
    "#indicator+num",
];

/// What a write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// The file did not exist and was created.
    Created,
    /// Previous rows were replaced.
    Replaced,
    /// Rows were added to an existing file that had none for the country.
    Appended,
    /// No rows were given and nothing needed removing; the file was not
    /// touched.
    Empty,
}

/// Writes `rows` to `path`, replacing any existing file and creating
/// parent directories as needed.
///
/// # Errors
///
/// Returns [`PublishError`] if the file cannot be written or a row fails
/// to serialize.
pub fn write_rows<T: Serialize>(
    path: &Path,
    columns: &[&str],
    hxl: &[&str],
    rows: &[T],
) -> Result<WriteStatus, PublishError> {
    if rows.is_empty() {
        log::info!("No rows to write to {}", path.display());
        return Ok(WriteStatus::Empty);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let status = if path.is_file() {
        WriteStatus::Replaced
    } else {
        WriteStatus::Created
    };

    write_file(path, columns, hxl, &[], rows)?;
    log::info!("{status:?} {} ({} rows)", path.display(), rows.len());
    Ok(status)
}

/// Replaces `country`'s rows in a shared file with `rows`, keeping every
/// other country's rows in place.
///
/// The new content is written to a sibling file and renamed over `path`,
/// so an interrupted write leaves the previous file intact.
///
/// # Errors
///
/// Returns [`PublishError`] if the existing file cannot be read, or the
/// new one cannot be written.
pub fn replace_country_rows<T: Serialize>(
    path: &Path,
    columns: &[&str],
    hxl: &[&str],
    country: &str,
    rows: &[T],
) -> Result<WriteStatus, PublishError> {
    if !path.is_file() {
        return write_rows(path, columns, hxl, rows);
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut kept = Vec::new();
    let mut dropped = 0_usize;
    for record in reader.records() {
        let record = record?;
        match record.get(0) {
            Some(tag) if tag.starts_with('#') => {}
            Some(name) if name == country => dropped += 1,
            _ => kept.push(record),
        }
    }

    if rows.is_empty() && dropped == 0 {
        log::info!("No {country} rows to write to {}", path.display());
        return Ok(WriteStatus::Empty);
    }

    let mut staging = path.as_os_str().to_owned();
    staging.push(".partial");
    let staging = PathBuf::from(staging);
    write_file(&staging, columns, hxl, &kept, rows)?;
    std::fs::rename(&staging, path)?;

    let status = if dropped > 0 {
        WriteStatus::Replaced
    } else {
        WriteStatus::Appended
    };
    log::info!(
        "{status:?} {} ({} {country} rows, {dropped} removed, {} kept)",
        path.display(),
        rows.len(),
        kept.len()
    );
    Ok(status)
}

fn write_file<T: Serialize>(
    path: &Path,
    columns: &[&str],
    hxl: &[&str],
    kept: &[csv::StringRecord],
    rows: &[T],
) -> Result<(), PublishError> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    csv.write_record(columns)?;
    csv.write_record(hxl)?;
    for record in kept {
        csv.write_record(record)?;
    }
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes a country's detail file, replacing any previous run.
///
/// # Errors
///
/// See [`write_rows`].
pub fn write_detail(path: &Path, rows: &[IndicatorRow]) -> Result<WriteStatus, PublishError> {
    write_rows(path, DETAIL_COLUMNS, DETAIL_HXL, rows)
}

/// Writes `country`'s summary rows into the indicator's summary file.
///
/// # Errors
///
/// See [`replace_country_rows`].
pub fn write_summary(
    path: &Path,
    country: &str,
    rows: &[IndicatorRow],
) -> Result<WriteStatus, PublishError> {
    replace_country_rows(path, DETAIL_COLUMNS, DETAIL_HXL, country, rows)
}

/// Writes `country`'s event records into the indicator's timeseries file.
///
/// # Errors
///
/// See [`replace_country_rows`].
pub fn write_timeseries(
    path: &Path,
    country: &str,
    records: &[EventRecord],
) -> Result<WriteStatus, PublishError> {
    replace_country_rows(path, TIMESERIES_COLUMNS, TIMESERIES_HXL, country, records)
}

#[cfg(test)]
mod tests {
    use climada_hdx_indicator_models::Aggregation;

    use super::*;

    fn row(region: &str, value: f64) -> IndicatorRow {
        IndicatorRow {
            country_name: "Haiti".to_string(),
            region_name: region.to_string(),
            latitude: 19.1,
            longitude: -72.25,
            aggregation: Aggregation::Sum,
            indicator: "litpop".to_string(),
            value,
        }
    }

    fn record(date: &str) -> EventRecord {
        EventRecord {
            country_name: "Haiti".to_string(),
            admin1_name: "Nord".to_string(),
            admin2_name: "Cap-Haïtien".to_string(),
            latitude: 19.7,
            longitude: -72.2,
            aggregation: Aggregation::Max,
            indicator: "earthquake.date.max_intensity".to_string(),
            event_date: date.to_string(),
            value: 6.5,
        }
    }

    #[test]
    fn detail_file_has_header_then_hxl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("litpop").join("haiti-admin1-litpop.csv");

        assert_eq!(
            write_detail(&path, &[row("Centre", 10.0)]).unwrap(),
            WriteStatus::Created
        );
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "country_name,region_name,latitude,longitude,aggregation,indicator,value"
        );
        assert_eq!(
            lines[1],
            "#country,#adm1+name,#geo+lat,#geo+lon,,#indicator+name,#indicator+num"
        );
        assert_eq!(lines[2], "Haiti,Centre,19.1,-72.25,sum,litpop,10.0");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn detail_rewrite_replaces_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detail.csv");
        write_detail(&path, &[row("Centre", 1.0), row("Nord", 2.0)]).unwrap();
        assert_eq!(
            write_detail(&path, &[row("Sud", 3.0)]).unwrap(),
            WriteStatus::Replaced
        );
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("Sud"));
        assert!(!text.contains("Nord"));
    }

    #[test]
    fn summary_adds_countries_without_repeating_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin1-summaries-litpop.csv");
        write_summary(&path, "Haiti", &[row("Centre", 1.0)]).unwrap();
        let mut chad = row("Lac", 2.0);
        chad.country_name = "Chad".to_string();
        assert_eq!(
            write_summary(&path, "Chad", &[chad]).unwrap(),
            WriteStatus::Appended
        );
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert_eq!(text.matches("#country").count(), 1);
        assert_eq!(text.matches("country_name").count(), 1);
        assert!(!dir.path().join("admin1-summaries-litpop.csv.partial").exists());
    }

    #[test]
    fn rewriting_a_country_replaces_its_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin1-summaries-litpop.csv");
        let mut chad = row("Lac", 2.0);
        chad.country_name = "Chad".to_string();
        write_summary(&path, "Haiti", &[row("Centre", 1.0), row("Nord", 2.0)]).unwrap();
        write_summary(&path, "Chad", &[chad]).unwrap();

        assert_eq!(
            write_summary(&path, "Haiti", &[row("Centre", 5.0)]).unwrap(),
            WriteStatus::Replaced
        );
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "Chad,Lac,19.1,-72.25,sum,litpop,2.0");
        assert_eq!(lines[3], "Haiti,Centre,19.1,-72.25,sum,litpop,5.0");
    }

    #[test]
    fn empty_rows_clear_a_country() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin1-timeseries-earthquake.csv");
        write_timeseries(&path, "Haiti", &[record("2010-01-12T00:00:00")]).unwrap();
        assert_eq!(
            write_timeseries(&path, "Haiti", &[]).unwrap(),
            WriteStatus::Replaced
        );
        assert_eq!(
            write_timeseries(&path, "Haiti", &[]).unwrap(),
            WriteStatus::Empty
        );
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn timeseries_columns_and_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin1-timeseries-earthquake.csv");
        write_timeseries(&path, "Haiti", &[record("2010-01-12T00:00:00")]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], TIMESERIES_COLUMNS.join(","));
        assert_eq!(lines[1], TIMESERIES_HXL.join(","));
        assert_eq!(
            lines[2],
            "Haiti,Nord,Cap-Haïtien,19.7,-72.2,max,earthquake.date.max_intensity,2010-01-12T00:00:00,6.5"
        );
    }

    #[test]
    fn empty_rows_do_not_create_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.csv");
        assert_eq!(write_detail(&path, &[]).unwrap(), WriteStatus::Empty);
        assert!(!path.exists());
    }
}
