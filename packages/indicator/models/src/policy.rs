//! Per-indicator aggregation policy table.
//!
//! Each [`Indicator`] has exactly one [`IndicatorPolicy`] describing where
//! its data comes from, how raw values are cleaned before spatial
//! filtering, and how filtered values are reduced to a single number per
//! region. Adding an indicator means adding a row here.

use strum::IntoEnumIterator as _;

use crate::{Aggregation, Indicator};

/// Crops available in the global crop production grids.
pub const CROPS: &[&str] = &["mai", "whe", "soy", "ric"];

/// Irrigation statuses available in the global crop production grids.
pub const IRRIGATION_STATUSES: &[&str] = &["noirr", "firr"];

/// Countries whose flood event dates are malformed upstream and must be
/// replaced from the reference date table.
pub const FLOOD_DATE_SHIM_COUNTRIES: &[&str] = &["Colombia", "Nigeria", "Sudan", "Venezuela"];

/// Whether the indicator is an exposure snapshot or a per-event hazard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorKind {
    /// Single snapshot grid per country.
    Exposure,
    /// Event set over a shared centroid grid.
    Hazard,
}

/// Reduction applied to a region's filtered values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    /// Maximum value, 2 decimals, 0.0 when empty.
    Max,
    /// Sum of values, whole units.
    Sum,
    /// Number of cells with a nonzero value (affected-cell extent).
    NonzeroCount,
}

impl Reducer {
    /// Label written to the `aggregation` column.
    #[must_use]
    pub const fn aggregation(self) -> Aggregation {
        match self {
            Self::Max => Aggregation::Max,
            Self::Sum | Self::NonzeroCount => Aggregation::Sum,
        }
    }
}

/// Data-quality patch applied to raw values before spatial filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Values at or above `threshold` are halved, repeated `passes` times
    /// in sequence. Compensates a grid-line artifact in upstream wildfire
    /// data.
    HalveAbove {
        /// Values `>= threshold` are halved on each pass.
        threshold: f64,
        /// Number of sequential passes.
        passes: u32,
    },
}

/// How one indicator is fetched, cleaned, and reduced.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPolicy {
    /// Indicator this row describes.
    pub indicator: Indicator,
    /// Data type name on the CLIMADA data API.
    pub data_type: &'static str,
    /// Exposure snapshot or hazard event set.
    pub kind: IndicatorKind,
    /// Key written to detail and summary rows.
    pub detail_key: &'static str,
    /// Key written to timeseries rows. `None` for snapshot-only indicators.
    pub timeseries_key: Option<&'static str>,
    /// Reduction applied per region.
    pub reducer: Reducer,
    /// Drop exactly-zero values before spatial filtering.
    pub zero_filter: bool,
    /// Optional value correction applied before spatial filtering.
    pub correction: Option<Correction>,
    /// Only events whose name contains this model identifier are reduced.
    pub event_model: Option<&'static str>,
    /// Substitute a zero-valued row at the region centroid when no cell
    /// falls inside a region.
    pub centroid_fallback: bool,
    /// Decimal places for values in the detail file: 2 for intensity
    /// hazards (seismic, cyclone, storm), 0 for extents and exposures.
    pub value_decimals: i32,
}

impl IndicatorPolicy {
    /// Whether the indicator produces a timeseries file.
    #[must_use]
    pub const fn has_timeseries(&self) -> bool {
        self.timeseries_key.is_some()
    }
}

const POLICIES: &[IndicatorPolicy] = &[
    IndicatorPolicy {
        indicator: Indicator::Litpop,
        data_type: "litpop",
        kind: IndicatorKind::Exposure,
        detail_key: "litpop",
        timeseries_key: None,
        reducer: Reducer::Sum,
        zero_filter: false,
        correction: None,
        event_model: None,
        centroid_fallback: false,
        value_decimals: 0,
    },
    IndicatorPolicy {
        indicator: Indicator::CropProduction,
        data_type: "crop_production",
        kind: IndicatorKind::Exposure,
        detail_key: "crop-production",
        timeseries_key: None,
        reducer: Reducer::Sum,
        zero_filter: false,
        correction: None,
        event_model: None,
        centroid_fallback: true,
        value_decimals: 0,
    },
    IndicatorPolicy {
        indicator: Indicator::Earthquake,
        data_type: "earthquake",
        kind: IndicatorKind::Hazard,
        detail_key: "earthquake.max_intensity",
        timeseries_key: Some("earthquake.date.max_intensity"),
        reducer: Reducer::Max,
        zero_filter: false,
        correction: None,
        event_model: None,
        centroid_fallback: false,
        value_decimals: 2,
    },
    IndicatorPolicy {
        indicator: Indicator::Flood,
        data_type: "flood",
        kind: IndicatorKind::Hazard,
        detail_key: "flood.max_intensity",
        timeseries_key: Some("flood.date"),
        reducer: Reducer::NonzeroCount,
        zero_filter: true,
        correction: None,
        event_model: None,
        centroid_fallback: false,
        value_decimals: 0,
    },
    IndicatorPolicy {
        indicator: Indicator::Wildfire,
        data_type: "wildfire",
        kind: IndicatorKind::Hazard,
        detail_key: "wildfire",
        timeseries_key: Some("wildfire.date"),
        reducer: Reducer::NonzeroCount,
        zero_filter: false,
        correction: Some(Correction::HalveAbove {
            threshold: 600.0,
            passes: 2,
        }),
        event_model: None,
        centroid_fallback: false,
        value_decimals: 0,
    },
    IndicatorPolicy {
        indicator: Indicator::RiverFlood,
        data_type: "river_flood",
        kind: IndicatorKind::Hazard,
        detail_key: "river-flood",
        timeseries_key: Some("river-flood.clm40_gswp3"),
        reducer: Reducer::NonzeroCount,
        zero_filter: false,
        correction: None,
        event_model: Some("clm40_gswp3"),
        centroid_fallback: false,
        value_decimals: 0,
    },
    IndicatorPolicy {
        indicator: Indicator::TropicalCyclone,
        data_type: "tropical_cyclone",
        kind: IndicatorKind::Hazard,
        detail_key: "tropical-cyclone",
        timeseries_key: Some("tropical-cyclone.date.max_intensity"),
        reducer: Reducer::Max,
        zero_filter: false,
        correction: None,
        event_model: None,
        centroid_fallback: false,
        value_decimals: 2,
    },
    IndicatorPolicy {
        indicator: Indicator::StormEurope,
        data_type: "storm_europe",
        kind: IndicatorKind::Hazard,
        detail_key: "storm-europe",
        timeseries_key: Some("storm-europe.date.max_intensity"),
        reducer: Reducer::Max,
        zero_filter: false,
        correction: None,
        event_model: None,
        centroid_fallback: false,
        value_decimals: 2,
    },
];

/// Error for an indicator key that has no policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Indicator {key} is not implemented")]
pub struct UnknownIndicator {
    /// The key that failed to resolve.
    pub key: String,
}

impl Indicator {
    /// Returns this indicator's policy.
    ///
    /// # Panics
    ///
    /// Panics if the policy table is missing a row for a variant, which
    /// the `every_indicator_has_a_policy` test rules out.
    #[must_use]
    pub fn policy(self) -> &'static IndicatorPolicy {
        POLICIES
            .iter()
            .find(|p| p.indicator == self)
            .unwrap_or_else(|| panic!("No policy for indicator {self}"))
    }

    /// All indicators in declaration order.
    #[must_use]
    pub fn all() -> Vec<Self> {
        Self::iter().collect()
    }
}

/// Resolves an indicator key (`"earthquake.date.max_intensity"`,
/// `"crop-production.mai.noirr.USD"`, `"litpop"`) to its family policy.
///
/// # Errors
///
/// Returns [`UnknownIndicator`] when the key's family is not in the table.
pub fn policy_for_key(key: &str) -> Result<&'static IndicatorPolicy, UnknownIndicator> {
    let family = key.split('.').next().unwrap_or_default();
    family
        .parse::<Indicator>()
        .map(Indicator::policy)
        .map_err(|_| UnknownIndicator {
            key: key.to_string(),
        })
}

/// Key of one crop production sub-indicator.
#[must_use]
pub fn crop_production_key(crop: &str, irrigation_status: &str) -> String {
    format!("crop-production.{crop}.{irrigation_status}.USD")
}

/// Countries for which the data source is known to have no data for an
/// indicator. These are recorded as exclusions rather than failures.
#[must_use]
pub const fn known_no_data(indicator: Indicator) -> &'static [&'static str] {
    match indicator {
        Indicator::Litpop => &["Syrian Arab Republic"],
        Indicator::Earthquake => &["Burkina Faso", "Chad", "Niger", "Nigeria"],
        Indicator::Flood => &[
            "Burkina Faso",
            "Cameroon",
            "South Sudan",
            "State of Palestine",
        ],
        Indicator::TropicalCyclone => &[
            "Afghanistan",
            "Burkina Faso",
            "Burundi",
            "Cameroon",
            "Central African Republic",
            "Chad",
            "DR Congo",
            "Mali",
            "Niger",
            "Nigeria",
            "South Sudan",
            "State of Palestine",
            "Sudan",
            "Syrian Arab Republic",
            "Ukraine",
        ],
        Indicator::CropProduction
        | Indicator::Wildfire
        | Indicator::RiverFlood
        | Indicator::StormEurope => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_indicator_has_a_policy() {
        for indicator in Indicator::all() {
            assert_eq!(indicator.policy().indicator, indicator);
        }
        assert_eq!(POLICIES.len(), Indicator::all().len());
    }

    #[test]
    fn keys_resolve_to_family() {
        assert_eq!(
            policy_for_key("earthquake.date.max_intensity").unwrap().indicator,
            Indicator::Earthquake
        );
        assert_eq!(
            policy_for_key("crop-production.mai.noirr.USD").unwrap().indicator,
            Indicator::CropProduction
        );
        assert_eq!(
            policy_for_key("river-flood.clm40_gswp3").unwrap().indicator,
            Indicator::RiverFlood
        );
        assert_eq!(policy_for_key("litpop").unwrap().indicator, Indicator::Litpop);
    }

    #[test]
    fn unknown_key_is_an_error() {
        let err = policy_for_key("relative-cropyield").unwrap_err();
        assert_eq!(err.key, "relative-cropyield");
        assert!(policy_for_key("").is_err());
    }

    #[test]
    fn extent_indicators_count_but_label_sum() {
        for indicator in [Indicator::Flood, Indicator::Wildfire, Indicator::RiverFlood] {
            let policy = indicator.policy();
            assert_eq!(policy.reducer, Reducer::NonzeroCount);
            assert_eq!(policy.reducer.aggregation(), Aggregation::Sum);
        }
    }

    #[test]
    fn only_flood_drops_zeros() {
        let zero_filtered: Vec<Indicator> = Indicator::all()
            .into_iter()
            .filter(|i| i.policy().zero_filter)
            .collect();
        assert_eq!(zero_filtered, vec![Indicator::Flood]);
    }

    #[test]
    fn exposures_have_no_timeseries() {
        for indicator in Indicator::all() {
            let policy = indicator.policy();
            assert_eq!(
                policy.has_timeseries(),
                policy.kind == IndicatorKind::Hazard,
                "{indicator}"
            );
        }
    }

    #[test]
    fn only_intensities_keep_two_decimals() {
        for indicator in Indicator::all() {
            let policy = indicator.policy();
            let expected = if policy.reducer == Reducer::Max { 2 } else { 0 };
            assert_eq!(policy.value_decimals, expected, "{indicator}");
        }
    }

    #[test]
    fn crop_keys() {
        assert_eq!(
            crop_production_key("whe", "firr"),
            "crop-production.whe.firr.USD"
        );
        assert_eq!(CROPS.len() * IRRIGATION_STATUSES.len(), 8);
    }

    #[test]
    fn no_data_tables() {
        assert!(known_no_data(Indicator::Litpop).contains(&"Syrian Arab Republic"));
        assert_eq!(known_no_data(Indicator::TropicalCyclone).len(), 15);
        assert!(known_no_data(Indicator::Wildfire).is_empty());
    }
}
