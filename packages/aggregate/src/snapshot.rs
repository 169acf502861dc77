//! Per-region detail rows for one country and indicator.
//!
//! Every input grid is indexed once and then filtered against each admin1
//! region in order. Exposure grids are snapshots; hazard grids are the
//! per-centroid maximum intensity over the whole event set.

use std::collections::BTreeMap;

use climada_hdx_geography_models::countries::Country;
use climada_hdx_geography_models::{AdminRegions, Region};
use climada_hdx_indicator_models::policy::{
    CROPS, IRRIGATION_STATUSES, IndicatorKind, IndicatorPolicy, crop_production_key,
};
use climada_hdx_indicator_models::{
    Aggregation, FilteredRows, Indicator, IndicatorRow, Point, PointSet, round_to,
};
use climada_hdx_source::{DataRequest, ExposureGrid, HazardSource};
use climada_hdx_spatial::{CachePolicy, ContainmentCache, SpatialGrid, filter_points};

use crate::AggregateError;
use crate::aggregator::prefilter;

/// Detail rows of one region, across all of the indicator's keys.
///
/// Values are kept at full precision; [`detail_file_rows`] rounds them for
/// output.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionRows {
    /// Admin1 region name.
    pub region_name: String,
    /// Rows in key order, then grid order.
    pub rows: Vec<IndicatorRow>,
}

/// Flattens a snapshot into detail file rows, rounding values to the
/// indicator's detail precision.
#[must_use]
pub fn detail_file_rows(policy: &IndicatorPolicy, snapshot: &[RegionRows]) -> Vec<IndicatorRow> {
    snapshot
        .iter()
        .flat_map(|r| &r.rows)
        .map(|row| IndicatorRow {
            value: round_to(row.value, policy.value_decimals),
            ..row.clone()
        })
        .collect()
}

/// Global exposure grids fetched once per batch.
///
/// Crop production is published as global grids; every country filters the
/// same eight grids by its ISO numeric code.
#[derive(Debug, Default)]
pub struct ExposureMemo {
    grids: BTreeMap<String, ExposureGrid>,
}

impl ExposureMemo {
    /// Creates an empty memo.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of grids held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.grids.len()
    }

    /// Whether no grid has been fetched yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    /// Returns the grid for `request`, fetching it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::Source`] if the fetch fails.
    pub async fn get_or_fetch(
        &mut self,
        source: &dyn HazardSource,
        request: &DataRequest,
    ) -> Result<&ExposureGrid, AggregateError> {
        let key = format!("{}:{}", request.data_type, request.describe());
        if !self.grids.contains_key(&key) {
            log::info!("Fetching global {} grid ({})", request.data_type, request.describe());
            let grid = source.point_grid(request).await?;
            self.grids.insert(key.clone(), grid);
        }
        Ok(&self.grids[&key])
    }
}

/// Request for a country's `LitPop` exposure.
#[must_use]
pub fn litpop_request(country: &Country) -> DataRequest {
    DataRequest::new(Indicator::Litpop.policy().data_type)
        .with("country_iso3num", country.iso_numeric.to_string())
        .with("exponents", "(1,1)")
        .with("fin_mode", "pc")
}

/// Request for one global crop production grid.
#[must_use]
pub fn crop_production_request(crop: &str, irrigation_status: &str) -> DataRequest {
    DataRequest::new(Indicator::CropProduction.policy().data_type)
        .with("crop", crop)
        .with("irrigation_status", irrigation_status)
        .with("unit", "USD")
        .with("spatial_coverage", "global")
}

/// Request for a country's hazard event set.
#[must_use]
pub fn hazard_request(policy: &IndicatorPolicy, country: &Country) -> DataRequest {
    DataRequest::new(policy.data_type).with("country_iso3alpha", country.iso3)
}

/// Fetches the keyed point sets the indicator's detail rows are built from.
async fn fetch_inputs(
    source: &dyn HazardSource,
    memo: &mut ExposureMemo,
    country: &Country,
    policy: &IndicatorPolicy,
) -> Result<Vec<(String, PointSet)>, AggregateError> {
    match (policy.indicator, policy.kind) {
        (Indicator::CropProduction, _) => {
            let mut inputs = Vec::with_capacity(CROPS.len() * IRRIGATION_STATUSES.len());
            for crop in CROPS {
                for status in IRRIGATION_STATUSES {
                    let request = crop_production_request(crop, status);
                    let grid = memo.get_or_fetch(source, &request).await?;
                    inputs.push((
                        crop_production_key(crop, status),
                        grid.for_region_id(u32::from(country.iso_numeric)),
                    ));
                }
            }
            Ok(inputs)
        }
        (_, IndicatorKind::Exposure) => {
            let grid = source.point_grid(&litpop_request(country)).await?;
            Ok(vec![(policy.detail_key.to_string(), grid.points)])
        }
        (_, IndicatorKind::Hazard) => {
            let series = source.event_series(&hazard_request(policy, country)).await?;
            series.validate()?;
            let points: PointSet = series
                .max_intensity()
                .iter()
                .map(|p| Point::new(round_to(p.latitude, 5), round_to(p.longitude, 5), p.value))
                .collect();
            Ok(vec![(policy.detail_key.to_string(), points)])
        }
    }
}

/// Builds the detail rows of every admin1 region of `country`.
///
/// # Errors
///
/// Returns [`AggregateError`] if fetching or filtering fails.
pub async fn build_snapshot(
    source: &dyn HazardSource,
    memo: &mut ExposureMemo,
    country: &Country,
    indicator: Indicator,
    regions: &AdminRegions,
) -> Result<Vec<RegionRows>, AggregateError> {
    let policy = indicator.policy();
    log::info!(
        "Building {indicator} snapshot for {} over {} regions",
        country.name,
        regions.len()
    );

    let inputs = fetch_inputs(source, memo, country, policy).await?;
    snapshot_from_inputs(country, policy, regions, inputs)
}

/// Filters already-fetched inputs against each region.
///
/// # Errors
///
/// Returns [`AggregateError`] if filtering fails.
pub fn snapshot_from_inputs(
    country: &Country,
    policy: &IndicatorPolicy,
    regions: &AdminRegions,
    inputs: Vec<(String, PointSet)>,
) -> Result<Vec<RegionRows>, AggregateError> {
    let mut cache = ContainmentCache::new();
    let prepared: Vec<(String, PointSet, SpatialGrid)> = inputs
        .into_iter()
        .map(|(key, mut points)| {
            prefilter(policy, &mut points);
            let grid = SpatialGrid::new(&points);
            (key, points, grid)
        })
        .collect();

    let mut out = Vec::with_capacity(regions.len());
    for (i, region) in regions.iter().enumerate() {
        let mut rows = Vec::new();
        for (key, points, grid) in &prepared {
            // Each grid meets each region once, so masks are not kept.
            let filtered =
                filter_points(&mut cache, grid, points, region, key, &CachePolicy::Disabled)?;
            rows.extend(detail_rows(country, policy, region, filtered));
        }
        log::info!(
            "{} of {} {}: {} rows",
            i + 1,
            regions.len(),
            region.admin1_name(),
            rows.len()
        );
        out.push(RegionRows {
            region_name: region.admin1_name().to_string(),
            rows,
        });
    }

    Ok(out)
}

fn detail_rows(
    country: &Country,
    policy: &IndicatorPolicy,
    region: &Region,
    filtered: FilteredRows,
) -> Vec<IndicatorRow> {
    let row = |latitude: f64, longitude: f64, value: f64| IndicatorRow {
        country_name: country.name.to_string(),
        region_name: region.admin1_name().to_string(),
        latitude,
        longitude,
        aggregation: Aggregation::None,
        indicator: filtered.indicator.clone(),
        value,
    };

    if filtered.is_empty() {
        if !policy.centroid_fallback {
            return Vec::new();
        }
        return region.centroid().map_or_else(Vec::new, |centroid| {
            log::info!(
                "No {} cells in {}, using centroid",
                filtered.indicator,
                region.identity()
            );
            vec![row(round_to(centroid.y(), 2), round_to(centroid.x(), 2), 0.0)]
        });
    }

    filtered
        .points
        .iter()
        .map(|p| row(p.latitude, p.longitude, p.value))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use async_trait::async_trait;
    use climada_hdx_geography_models::AdminLevel;
    use climada_hdx_geography_models::countries::by_name;
    use climada_hdx_source::{EventSeries, HazardEvent, SourceError};
    use geo::{MultiPolygon, polygon};

    use super::*;

    pub(crate) fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
            (x: x, y: y),
        ]])
    }

    /// Haiti's ten departments as a 5×2 grid of 1° squares starting at
    /// (-75, 17); Centre is the square at (-72, 18).
    pub(crate) fn haiti_regions() -> AdminRegions {
        let names = [
            "Artibonite",
            "Centre",
            "Grand'Anse",
            "Nippes",
            "Nord",
            "Nord-Est",
            "Nord-Ouest",
            "Ouest",
            "Sud",
            "Sud-Est",
        ];
        let origins = [
            (-75.0, 17.0),
            (-72.0, 18.0),
            (-74.0, 17.0),
            (-73.0, 17.0),
            (-72.0, 17.0),
            (-71.0, 17.0),
            (-75.0, 18.0),
            (-74.0, 18.0),
            (-73.0, 18.0),
            (-71.0, 18.0),
        ];
        AdminRegions {
            level: AdminLevel::Admin1,
            regions: names
                .iter()
                .zip(origins)
                .map(|(n, (x, y))| Region::admin1(*n, square(x, y, 1.0)))
                .collect(),
        }
    }

    /// 176 points on a 16×11 lattice strictly inside Centre.
    pub(crate) fn centre_points() -> PointSet {
        (0..176)
            .map(|i| {
                let row = f64::from(i / 16);
                let col = f64::from(i % 16);
                Point::new(18.05 + row * 0.08, -71.95 + col * 0.06, f64::from(i + 1) * 10.0)
            })
            .collect()
    }

    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub(crate) grid: Option<ExposureGrid>,
        pub(crate) series: Option<EventSeries>,
        pub(crate) grid_calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl HazardSource for FakeSource {
        async fn point_grid(&self, request: &DataRequest) -> Result<ExposureGrid, SourceError> {
            self.grid_calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.grid.clone().ok_or_else(|| request.no_data())
        }

        async fn event_series(&self, request: &DataRequest) -> Result<EventSeries, SourceError> {
            self.series.clone().ok_or_else(|| request.no_data())
        }
    }

    fn haiti() -> &'static Country {
        by_name("Haiti").unwrap()
    }

    #[tokio::test]
    async fn haiti_centre_gets_all_points() {
        let source = FakeSource {
            grid: Some(ExposureGrid {
                points: centre_points(),
                region_ids: None,
            }),
            ..FakeSource::default()
        };
        let mut memo = ExposureMemo::new();
        let snapshot = build_snapshot(
            &source,
            &mut memo,
            haiti(),
            Indicator::Litpop,
            &haiti_regions(),
        )
        .await
        .unwrap();

        assert_eq!(snapshot.len(), 10);
        let centre = snapshot.iter().find(|r| r.region_name == "Centre").unwrap();
        assert_eq!(centre.rows.len(), 176);
        assert!(centre.rows.iter().all(|r| r.aggregation == Aggregation::None));
        assert!(centre.rows.iter().all(|r| r.indicator == "litpop"));
        assert!(centre.rows.iter().all(|r| r.country_name == "Haiti"));
        assert!(
            snapshot
                .iter()
                .filter(|r| r.region_name != "Centre")
                .all(|r| r.rows.is_empty())
        );
    }

    #[tokio::test]
    async fn no_data_propagates() {
        let source = FakeSource::default();
        let err = build_snapshot(
            &source,
            &mut ExposureMemo::new(),
            haiti(),
            Indicator::Litpop,
            &haiti_regions(),
        )
        .await
        .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn crop_production_uses_memo_and_centroid_fallback() {
        let mut points = centre_points();
        points.retain(|p| p.value <= 50.0);
        let n = points.len();
        let source = FakeSource {
            grid: Some(ExposureGrid {
                points,
                region_ids: Some(vec![332; n]),
            }),
            ..FakeSource::default()
        };
        let mut memo = ExposureMemo::new();
        let regions = haiti_regions();

        let first = build_snapshot(&source, &mut memo, haiti(), Indicator::CropProduction, &regions)
            .await
            .unwrap();
        build_snapshot(&source, &mut memo, haiti(), Indicator::CropProduction, &regions)
            .await
            .unwrap();
        assert_eq!(memo.len(), 8);
        assert_eq!(
            source.grid_calls.load(std::sync::atomic::Ordering::SeqCst),
            8
        );

        let centre = first.iter().find(|r| r.region_name == "Centre").unwrap();
        assert_eq!(centre.rows.len(), 8 * 5);

        let nord = first.iter().find(|r| r.region_name == "Nord").unwrap();
        assert_eq!(nord.rows.len(), 8);
        assert!(nord.rows.iter().all(|r| r.value == 0.0));
        assert!((nord.rows[0].latitude - 17.5).abs() < 1e-9);
        assert!((nord.rows[0].longitude - -71.5).abs() < 1e-9);
        assert_eq!(nord.rows[0].indicator, "crop-production.mai.noirr.USD");
    }

    #[tokio::test]
    async fn other_countries_cells_are_excluded() {
        let mut ids = vec![332; 176];
        ids[0] = 214;
        let source = FakeSource {
            grid: Some(ExposureGrid {
                points: centre_points(),
                region_ids: Some(ids),
            }),
            ..FakeSource::default()
        };
        let snapshot = build_snapshot(
            &source,
            &mut ExposureMemo::new(),
            haiti(),
            Indicator::CropProduction,
            &haiti_regions(),
        )
        .await
        .unwrap();
        let centre = snapshot.iter().find(|r| r.region_name == "Centre").unwrap();
        assert_eq!(centre.rows.len(), 8 * 175);
    }

    #[tokio::test]
    async fn hazard_snapshot_uses_max_over_events() {
        let source = FakeSource {
            series: Some(EventSeries {
                centroids: vec![(18.512_345_6, -71.5), (17.5, -71.5)],
                events: vec![
                    HazardEvent {
                        name: "a".to_string(),
                        date: 730_000,
                        intensity: vec![4.0, 0.0],
                    },
                    HazardEvent {
                        name: "b".to_string(),
                        date: 730_001,
                        intensity: vec![6.123, 2.0],
                    },
                ],
            }),
            ..FakeSource::default()
        };
        let snapshot = build_snapshot(
            &source,
            &mut ExposureMemo::new(),
            haiti(),
            Indicator::Earthquake,
            &haiti_regions(),
        )
        .await
        .unwrap();

        let centre = snapshot.iter().find(|r| r.region_name == "Centre").unwrap();
        assert_eq!(centre.rows.len(), 1);
        assert!((centre.rows[0].value - 6.123).abs() < 1e-12);
        assert!((centre.rows[0].latitude - 18.512_35).abs() < 1e-12);
        assert_eq!(centre.rows[0].indicator, "earthquake.max_intensity");

        let detail = detail_file_rows(Indicator::Earthquake.policy(), &snapshot);
        assert_eq!(detail.len(), 2);
        assert!((detail[0].value - 6.12).abs() < 1e-12);
    }

    #[test]
    fn extent_detail_values_are_whole_numbers() {
        let rows = vec![RegionRows {
            region_name: "Centre".to_string(),
            rows: [0.3, 2.5, 450.75]
                .iter()
                .map(|&value| IndicatorRow {
                    country_name: "Haiti".to_string(),
                    region_name: "Centre".to_string(),
                    latitude: 18.5,
                    longitude: -71.5,
                    aggregation: Aggregation::None,
                    indicator: "wildfire".to_string(),
                    value,
                })
                .collect(),
        }];
        let values: Vec<f64> = detail_file_rows(Indicator::Wildfire.policy(), &rows)
            .iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(values, vec![0.0, 2.0, 451.0]);
        assert!((rows[0].rows[0].value - 0.3).abs() < 1e-12);
    }

    #[test]
    fn exposure_requests() {
        let request = litpop_request(haiti());
        assert_eq!(request.properties["country_iso3num"], "332");
        assert_eq!(request.properties["exponents"], "(1,1)");
        assert_eq!(request.properties["fin_mode"], "pc");

        let hazard = hazard_request(Indicator::RiverFlood.policy(), haiti());
        assert_eq!(hazard.data_type, "river_flood");
        assert_eq!(hazard.properties["country_iso3alpha"], "HTI");
    }
}
