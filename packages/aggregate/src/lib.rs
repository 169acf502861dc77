#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial aggregation of hazard and exposure indicators to admin regions.
//!
//! - [`aggregator`]: per-indicator cleaning and reduction of filtered values.
//! - [`snapshot`]: detail rows per admin1 region for one country.
//! - [`summary`]: one reduced row per region from the detail rows.
//! - [`timeseries`]: per-event, per-region records for hazard indicators.
//! - [`shim`]: replacement of malformed flood event dates.

pub mod aggregator;
pub mod shim;
pub mod snapshot;
pub mod summary;
pub mod timeseries;

use climada_hdx_indicator_models::policy::UnknownIndicator;
use climada_hdx_source::SourceError;
use climada_hdx_spatial::SpatialError;

/// Errors that can occur while aggregating one country/indicator.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// The indicator key has no policy.
    #[error(transparent)]
    UnknownIndicator(#[from] UnknownIndicator),

    /// Fetching the data failed.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Containment filtering failed.
    #[error("Spatial error: {0}")]
    Spatial(#[from] SpatialError),

    /// The flood date table has no entry for an event.
    #[error("No replacement date for event {event} in the flood date table")]
    MissingShimDate {
        /// Upstream event identifier.
        event: String,
    },

    /// Flood dates for this country must be replaced but no date table was
    /// configured.
    #[error("Flood event dates for {country} need the flood date table")]
    ShimUnavailable {
        /// Country display name.
        country: String,
    },

    /// An event date ordinal does not map to a calendar date.
    #[error("Event {event} has invalid date ordinal {ordinal}")]
    InvalidDate {
        /// Upstream event identifier.
        event: String,
        /// Offending ordinal.
        ordinal: i64,
    },

    /// Reading the flood date table failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing the flood date table failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl AggregateError {
    /// Whether the batch should record this as an exclusion and move on.
    ///
    /// Only "the source has no data for this country" is recoverable.
    /// Malformed data, missing reference dates and unknown indicators mean
    /// the output would be wrong and are fatal for the country.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Source(SourceError::NoData { .. }))
    }
}
