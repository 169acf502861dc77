//! Summary rows: one reduced row per region and indicator key.
//!
//! Reductions run on the full-precision snapshot values, before detail
//! rounding, so shallow extents are still counted.

use climada_hdx_indicator_models::{FilteredRows, IndicatorRow, Point, round_to};

use crate::AggregateError;
use crate::aggregator::aggregate;
use crate::snapshot::RegionRows;

/// Reduces each region's detail rows.
///
/// Rows are grouped by indicator key in first-seen order, so crop
/// production yields one row per region and crop/irrigation key. The
/// location is the mean of the detail rows, rounded to 4 decimals. Regions
/// with no rows are logged and skipped.
///
/// # Errors
///
/// Returns [`AggregateError::UnknownIndicator`] if a row carries a key
/// with no policy.
pub fn summarize(
    country_name: &str,
    regions: &[RegionRows],
) -> Result<Vec<IndicatorRow>, AggregateError> {
    let mut summary = Vec::new();

    for region in regions {
        if region.rows.is_empty() {
            log::info!("{country_name} {}: no detail rows, skipping summary", region.region_name);
            continue;
        }

        let mut groups: Vec<FilteredRows> = Vec::new();
        for row in &region.rows {
            let point = Point::new(row.latitude, row.longitude, row.value);
            match groups.iter_mut().find(|g| g.indicator == row.indicator) {
                Some(group) => group.points.push(point),
                None => groups.push(FilteredRows {
                    indicator: row.indicator.clone(),
                    points: vec![point],
                }),
            }
        }

        for group in groups {
            let Some((latitude, longitude)) = group.mean_location() else {
                continue;
            };
            let (value, aggregation) = aggregate(&group.indicator, &group)?;
            log::debug!(
                "{country_name} {}: {} {aggregation} = {value}",
                region.region_name,
                group.indicator
            );
            summary.push(IndicatorRow {
                country_name: country_name.to_string(),
                region_name: region.region_name.clone(),
                latitude: round_to(latitude, 4),
                longitude: round_to(longitude, 4),
                aggregation,
                indicator: group.indicator,
                value,
            });
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use climada_hdx_geography_models::countries::by_name;
    use climada_hdx_indicator_models::{Aggregation, Indicator};
    use climada_hdx_source::ExposureGrid;

    use super::*;
    use crate::snapshot::tests::{FakeSource, centre_points, haiti_regions};
    use crate::snapshot::{ExposureMemo, build_snapshot};

    fn row(region: &str, indicator: &str, lat: f64, lon: f64, value: f64) -> IndicatorRow {
        IndicatorRow {
            country_name: "Haiti".to_string(),
            region_name: region.to_string(),
            latitude: lat,
            longitude: lon,
            aggregation: Aggregation::None,
            indicator: indicator.to_string(),
            value,
        }
    }

    #[tokio::test]
    async fn haiti_centre_summary_is_the_sum() {
        let points = centre_points();
        let expected: f64 = points.iter().map(|p| p.value).sum();
        let source = FakeSource {
            grid: Some(ExposureGrid {
                points,
                region_ids: None,
            }),
            ..FakeSource::default()
        };
        let snapshot = build_snapshot(
            &source,
            &mut ExposureMemo::new(),
            by_name("Haiti").unwrap(),
            Indicator::Litpop,
            &haiti_regions(),
        )
        .await
        .unwrap();

        let summary = summarize("Haiti", &snapshot).unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].region_name, "Centre");
        assert_eq!(summary[0].aggregation, Aggregation::Sum);
        assert!((summary[0].value - expected).abs() < 1e-9);
    }

    #[test]
    fn groups_by_indicator_key() {
        let regions = vec![RegionRows {
            region_name: "Sud".to_string(),
            rows: vec![
                row("Sud", "crop-production.mai.noirr.USD", 18.0, -73.0, 10.0),
                row("Sud", "crop-production.mai.firr.USD", 18.0, -73.0, 1.0),
                row("Sud", "crop-production.mai.noirr.USD", 18.2, -73.4, 5.0),
            ],
        }];
        let summary = summarize("Haiti", &regions).unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].indicator, "crop-production.mai.noirr.USD");
        assert!((summary[0].value - 15.0).abs() < 1e-12);
        assert!((summary[0].latitude - 18.1).abs() < 1e-12);
        assert!((summary[0].longitude - -73.2).abs() < 1e-12);
        assert_eq!(summary[1].indicator, "crop-production.mai.firr.USD");
    }

    #[test]
    fn max_indicators_summarize_with_max() {
        let regions = vec![RegionRows {
            region_name: "Nord".to_string(),
            rows: vec![
                row("Nord", "earthquake.max_intensity", 19.7, -72.2, 5.5),
                row("Nord", "earthquake.max_intensity", 19.7, -72.1, 7.25),
            ],
        }];
        let summary = summarize("Haiti", &regions).unwrap();
        assert_eq!(summary[0].aggregation, Aggregation::Max);
        assert!((summary[0].value - 7.25).abs() < 1e-12);
        assert!((summary[0].latitude - 19.7).abs() < 1e-12);
        assert!((summary[0].longitude - -72.15).abs() < 1e-12);
    }

    #[test]
    fn shallow_extents_still_count() {
        let regions = vec![RegionRows {
            region_name: "Artibonite".to_string(),
            rows: vec![
                row("Artibonite", "flood.max_intensity", 19.0, -72.5, 0.3),
                row("Artibonite", "flood.max_intensity", 19.1, -72.5, 0.4),
                row("Artibonite", "flood.max_intensity", 19.2, -72.5, 1.7),
            ],
        }];
        let summary = summarize("Haiti", &regions).unwrap();
        assert_eq!(summary[0].aggregation, Aggregation::Sum);
        assert!((summary[0].value - 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_regions_are_skipped() {
        let regions = vec![RegionRows {
            region_name: "Nippes".to_string(),
            rows: vec![],
        }];
        assert!(summarize("Haiti", &regions).unwrap().is_empty());
    }
}
