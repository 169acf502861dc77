//! Batch run over countries for one indicator.
//!
//! Countries are processed one at a time: admin1 snapshot, summary, then
//! (for hazards) the event timeseries over the finest boundaries
//! available. Nothing is written until all three succeed; the timeseries
//! goes out first and the detail file last, since the detail file and the
//! summary rows mark a country as done. A country with no upstream data is
//! recorded and skipped; any other failure is recorded as fatal and the
//! batch moves on. The cancel flag is only checked between countries.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use climada_hdx_aggregate::AggregateError;
use climada_hdx_aggregate::shim::DateShim;
use climada_hdx_aggregate::snapshot::{ExposureMemo, build_snapshot, detail_file_rows};
use climada_hdx_aggregate::summary::summarize;
use climada_hdx_aggregate::timeseries::{TimeseriesOptions, build_timeseries};
use climada_hdx_geography::{GeoError, ProviderChain, best_admin_regions};
use climada_hdx_geography_models::AdminLevel;
use climada_hdx_geography_models::countries::Country;
use climada_hdx_indicator_models::Indicator;
use climada_hdx_publish::PublishError;
use climada_hdx_publish::paths::OutputPaths;
use climada_hdx_publish::writer::{write_detail, write_summary, write_timeseries};
use climada_hdx_source::HazardSource;
use climada_hdx_source::progress::ProgressCallback;

/// Failure while processing one country.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Aggregation failed.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// Boundary lookup failed.
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// Writing output failed.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl PipelineError {
    /// Whether the country should be recorded as having no data rather
    /// than as a failure.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Aggregate(e) => e.is_recoverable(),
            Self::Geo(_) | Self::Publish(_) => false,
        }
    }
}

/// Outcome for one country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountryStatus {
    /// Output written.
    Processed {
        /// Detail rows written.
        detail_rows: usize,
        /// Event records written.
        event_records: usize,
    },
    /// No boundaries from any provider.
    NoBoundaries,
    /// The source has no data for this country.
    NoData(String),
    /// Processing failed.
    Failed(String),
    /// The batch was cancelled before this country.
    Cancelled,
}

impl CountryStatus {
    /// Whether this outcome should fail the run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for CountryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processed {
                detail_rows,
                event_records,
            } => write!(f, "processed ({detail_rows} rows, {event_records} events)"),
            Self::NoBoundaries => write!(f, "no boundaries"),
            Self::NoData(reason) => write!(f, "no data: {reason}"),
            Self::Failed(reason) => write!(f, "FAILED: {reason}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Per-country outcomes of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// `(country name, status)` in processing order.
    pub countries: Vec<(String, CountryStatus)>,
}

impl RunReport {
    /// Whether any country failed.
    #[must_use]
    pub fn has_fatal(&self) -> bool {
        self.countries.iter().any(|(_, s)| s.is_fatal())
    }

    /// Number of countries with the given outcome.
    #[must_use]
    pub fn count(&self, predicate: impl Fn(&CountryStatus) -> bool) -> usize {
        self.countries.iter().filter(|(_, s)| predicate(s)).count()
    }
}

/// Everything one batch needs.
pub struct Pipeline<'a> {
    /// Hazard and exposure data.
    pub source: &'a dyn HazardSource,
    /// Boundary providers, in preference order.
    pub boundaries: &'a ProviderChain,
    /// Output layout.
    pub paths: OutputPaths,
    /// Flood event date table, if configured.
    pub shim: Option<DateShim>,
}

/// Batch options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Indicator to run.
    pub indicator: Indicator,
    /// Stop each timeseries after its first event.
    pub test_run: bool,
}

impl Pipeline<'_> {
    /// Runs `countries` in order, stopping early when `cancel` is set.
    ///
    /// `countries_progress` advances once per country; `events_progress`
    /// makes a progress sink for each country's timeseries.
    #[allow(clippy::future_not_send)]
    pub async fn run_batch(
        &self,
        countries: &[&'static Country],
        options: RunOptions,
        cancel: &AtomicBool,
        countries_progress: &dyn ProgressCallback,
        events_progress: &dyn Fn(&Country) -> Arc<dyn ProgressCallback>,
    ) -> RunReport {
        let start = Instant::now();
        let mut memo = ExposureMemo::new();
        let mut report = RunReport::default();
        countries_progress.set_total(countries.len() as u64);

        for (i, country) in countries.iter().enumerate() {
            if cancel.load(Ordering::SeqCst) {
                log::warn!("Cancelled, skipping {} remaining countries", countries.len() - i);
                for rest in &countries[i..] {
                    report
                        .countries
                        .push((rest.name.to_string(), CountryStatus::Cancelled));
                }
                break;
            }

            countries_progress.set_message(country.name.to_string());
            let t0 = Instant::now();
            let status = match self
                .run_country(country, options, &mut memo, events_progress(*country))
                .await
            {
                Ok(status) => status,
                Err(e) if e.is_recoverable() => CountryStatus::NoData(e.to_string()),
                Err(e) => CountryStatus::Failed(e.to_string()),
            };

            let line = format!(
                "{}/{} {} {}: {status} in {:.1}s",
                i + 1,
                countries.len(),
                country.name,
                options.indicator,
                t0.elapsed().as_secs_f64()
            );
            if status.is_fatal() {
                log::error!("{line}");
            } else {
                log::info!("{line}");
            }
            report.countries.push((country.name.to_string(), status));
            countries_progress.inc(1);
        }

        countries_progress.finish(format!(
            "{}: {} processed, {} without data, {} failed in {:.1}s",
            options.indicator,
            report.count(|s| matches!(s, CountryStatus::Processed { .. })),
            report.count(|s| matches!(s, CountryStatus::NoData(_) | CountryStatus::NoBoundaries)),
            report.count(CountryStatus::is_fatal),
            start.elapsed().as_secs_f64()
        ));
        report
    }

    async fn run_country(
        &self,
        country: &Country,
        options: RunOptions,
        memo: &mut ExposureMemo,
        events_progress: Arc<dyn ProgressCallback>,
    ) -> Result<CountryStatus, PipelineError> {
        let indicator = options.indicator;
        let admin1 = self.boundaries.regions(country.iso3, AdminLevel::Admin1)?;
        if admin1.is_empty() {
            return Ok(CountryStatus::NoBoundaries);
        }
        log::debug!("{} admin1 regions: {}", country.name, admin1.admin1_names().join(", "));

        let snapshot = build_snapshot(self.source, memo, country, indicator, &admin1).await?;
        let summary = summarize(country.name, &snapshot)?;
        let detail = detail_file_rows(indicator.policy(), &snapshot);

        let records = if indicator.policy().has_timeseries() {
            let regions = best_admin_regions(self.boundaries, country.iso3)?;
            let timeseries_options = TimeseriesOptions {
                test_run: options.test_run,
                progress: events_progress,
            };
            let output = build_timeseries(
                self.source,
                country,
                indicator,
                &regions,
                self.shim.as_ref(),
                &timeseries_options,
            )
            .await?;
            write_timeseries(&self.paths.timeseries(indicator), country.name, &output.records)?;
            output.records.len()
        } else {
            0
        };

        write_summary(&self.paths.summary(indicator), country.name, &summary)?;
        write_detail(&self.paths.detail(indicator, country), &detail)?;

        Ok(CountryStatus::Processed {
            detail_rows: detail.len(),
            event_records: records,
        })
    }
}
