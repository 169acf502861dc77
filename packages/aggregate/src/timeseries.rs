//! Per-event, per-region hazard records.
//!
//! A run moves through fetch, optional date replacement, then nested loops
//! over events and regions. Each region's filtered rows are reduced and an
//! [`EventRecord`] is emitted only when the aggregate is strictly positive.
//!
//! For indicators without a zero filter every event shares the centroid
//! grid, so one R-tree and one containment mask per region serve the whole
//! event set. Zero-filtered indicators build a grid per event and bypass the
//! mask cache.

use std::sync::Arc;

use chrono::NaiveDate;
use climada_hdx_geography_models::AdminRegions;
use climada_hdx_geography_models::countries::Country;
use climada_hdx_indicator_models::policy::{
    FLOOD_DATE_SHIM_COUNTRIES, IndicatorPolicy, UnknownIndicator,
};
use climada_hdx_indicator_models::{EventRecord, Indicator, Point, PointSet, round_to};
use climada_hdx_source::progress::{ProgressCallback, null_progress};
use climada_hdx_source::{EventSeries, HazardEvent, HazardSource};
use climada_hdx_spatial::{CacheStats, ContainmentCache, SpatialGrid, filter_points};

use crate::AggregateError;
use crate::aggregator::{aggregate, cache_policy, prefilter};
use crate::shim::DateShim;
use crate::snapshot::hazard_request;

/// Knobs for one timeseries run.
#[derive(Clone)]
pub struct TimeseriesOptions {
    /// Stop after the first event that reaches the region loop.
    pub test_run: bool,
    /// Progress over events.
    pub progress: Arc<dyn ProgressCallback>,
}

impl Default for TimeseriesOptions {
    fn default() -> Self {
        Self {
            test_run: false,
            progress: null_progress(),
        }
    }
}

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Every intensity was zero; no spatial work was done.
    AllZero,
    /// The event belongs to a different climate model.
    OtherModel,
    /// Regions were reduced; carries the number of records emitted.
    Reduced(usize),
}

/// Result of one country/indicator timeseries run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeseriesOutput {
    /// Emitted records, in event then region order.
    pub records: Vec<EventRecord>,
    /// Containment cache counters for the run.
    pub cache_stats: CacheStats,
    /// Events that reached the region loop.
    pub events_reduced: usize,
}

/// Whether `country`'s flood dates must come from the date table.
#[must_use]
pub fn needs_date_shim(indicator: Indicator, country: &Country) -> bool {
    indicator == Indicator::Flood && FLOOD_DATE_SHIM_COUNTRIES.contains(&country.name)
}

/// Fetches the hazard series for `country` and reduces it to event records.
///
/// # Errors
///
/// Returns [`AggregateError`] if the fetch fails, the series is malformed,
/// dates need replacing but no table is available or it lacks an event, or
/// the indicator has no timeseries.
pub async fn build_timeseries(
    source: &dyn HazardSource,
    country: &Country,
    indicator: Indicator,
    regions: &AdminRegions,
    shim: Option<&DateShim>,
    options: &TimeseriesOptions,
) -> Result<TimeseriesOutput, AggregateError> {
    let policy = indicator.policy();
    log::info!("Creating timeseries summary for {indicator} in {}", country.name);
    log::info!(
        "Found {} admin{} regions for {}",
        regions.len(),
        regions.level,
        country.name
    );

    let mut series = source
        .event_series(&hazard_request(policy, country))
        .await?;
    series.validate()?;

    if needs_date_shim(indicator, country) {
        let shim = shim.ok_or_else(|| AggregateError::ShimUnavailable {
            country: country.name.to_string(),
        })?;
        shim.apply(&mut series)?;
    }

    reduce_events(&series, policy, country.name, regions, options)
}

/// Reduces every event of `series` over `regions`.
///
/// # Errors
///
/// Returns [`AggregateError`] if an event date is not a valid ordinal or
/// the indicator has no timeseries key.
pub fn reduce_events(
    series: &EventSeries,
    policy: &IndicatorPolicy,
    country_name: &str,
    regions: &AdminRegions,
    options: &TimeseriesOptions,
) -> Result<TimeseriesOutput, AggregateError> {
    let key = policy.timeseries_key.ok_or_else(|| UnknownIndicator {
        key: format!("{}.date", policy.indicator),
    })?;

    let mut cache = ContainmentCache::new();
    let shared_grid = (!policy.zero_filter).then(|| {
        let centroids: PointSet = series
            .centroids
            .iter()
            .map(|&(lat, lon)| Point::new(lat, lon, 0.0))
            .collect();
        SpatialGrid::new(&centroids)
    });

    let n_events = series.events.len();
    options.progress.set_total(n_events as u64);

    let mut output = TimeseriesOutput::default();
    for (i, event) in series.events.iter().enumerate() {
        options.progress.inc(1);

        let outcome = if event.all_zero() {
            EventOutcome::AllZero
        } else if policy.event_model.is_some_and(|m| !event.name.contains(m)) {
            EventOutcome::OtherModel
        } else {
            log::info!("Processing event {i} of {n_events} ({})", event.name);
            let mut points = series.event_points(event);
            prefilter(policy, &mut points);
            let before = output.records.len();
            reduce_event(
                &mut cache,
                shared_grid.as_ref(),
                &points,
                event,
                policy,
                key,
                country_name,
                regions,
                &mut output.records,
            )?;
            EventOutcome::Reduced(output.records.len() - before)
        };

        log::debug!("Event {i} ({}): {outcome:?}", event.name);

        if let EventOutcome::Reduced(_) = outcome {
            output.events_reduced += 1;
            if options.test_run {
                log::info!("Test run, stopping after first event");
                break;
            }
        }
    }

    output.cache_stats = cache.stats();
    log::info!(
        "{country_name} {}: {} records from {} events, cache hits {} misses {}",
        policy.indicator,
        output.records.len(),
        output.events_reduced,
        output.cache_stats.hits,
        output.cache_stats.misses
    );
    options
        .progress
        .finish(format!("{country_name}: {} records", output.records.len()));

    Ok(output)
}

#[allow(clippy::too_many_arguments)]
fn reduce_event(
    cache: &mut ContainmentCache,
    shared_grid: Option<&SpatialGrid>,
    points: &PointSet,
    event: &HazardEvent,
    policy: &IndicatorPolicy,
    key: &str,
    country_name: &str,
    regions: &AdminRegions,
    records: &mut Vec<EventRecord>,
) -> Result<(), AggregateError> {
    let event_grid;
    let grid = match shared_grid {
        Some(grid) => grid,
        None => {
            event_grid = SpatialGrid::new(points);
            &event_grid
        }
    };

    for region in regions {
        let rows = filter_points(
            cache,
            grid,
            points,
            region,
            key,
            &cache_policy(policy, region),
        )?;
        let (value, aggregation) = aggregate(key, &rows)?;
        if value <= 0.0 {
            continue;
        }
        let Some((latitude, longitude)) = rows.mean_location() else {
            continue;
        };
        let event_date = format_event_date(event)?;
        log::info!(
            "{}: event on {} {aggregation} {value:0.2}",
            region.identity(),
            &event_date[..10]
        );
        records.push(EventRecord {
            country_name: country_name.to_string(),
            admin1_name: region.admin1_name().to_string(),
            admin2_name: region.admin2_name().to_string(),
            latitude: round_to(latitude, 4),
            longitude: round_to(longitude, 4),
            aggregation,
            indicator: key.to_string(),
            event_date,
            value,
        });
    }

    Ok(())
}

/// Formats a proleptic Gregorian ordinal (day 1 = 0001-01-01) as
/// `YYYY-MM-DDT00:00:00`.
///
/// # Errors
///
/// Returns [`AggregateError::InvalidDate`] if the ordinal is out of range.
pub fn format_event_date(event: &HazardEvent) -> Result<String, AggregateError> {
    let invalid = || AggregateError::InvalidDate {
        event: event.name.clone(),
        ordinal: event.date,
    };
    let days = i32::try_from(event.date).map_err(|_| invalid())?;
    if days < 1 {
        return Err(invalid());
    }
    let date = NaiveDate::from_num_days_from_ce_opt(days).ok_or_else(invalid)?;
    Ok(date.format("%Y-%m-%dT00:00:00").to_string())
}
