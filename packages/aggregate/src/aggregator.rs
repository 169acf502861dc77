//! Indicator-specific cleaning and reduction.
//!
//! Cleaning ([`prefilter`]) runs on a whole point set before containment
//! testing. Reduction ([`aggregate`]) runs on the rows that fell inside one
//! region. Both are driven by the indicator's
//! [`IndicatorPolicy`](climada_hdx_indicator_models::policy::IndicatorPolicy).

use climada_hdx_geography_models::Region;
use climada_hdx_indicator_models::policy::{Correction, IndicatorPolicy, Reducer, policy_for_key};
use climada_hdx_indicator_models::{Aggregation, FilteredRows, PointSet, round_to};
use climada_hdx_spatial::CachePolicy;

use crate::AggregateError;

/// Applies the policy's zero filter and value correction to `points`.
///
/// The zero filter changes the number of points, so any grid built before
/// this call no longer matches.
pub fn prefilter(policy: &IndicatorPolicy, points: &mut PointSet) {
    if policy.zero_filter {
        points.retain(|p| p.value != 0.0);
    }
    if let Some(correction) = policy.correction {
        points.map_values(|v| correct(correction, v));
    }
}

/// Applies one correction to a single value.
#[must_use]
pub fn correct(correction: Correction, value: f64) -> f64 {
    match correction {
        Correction::HalveAbove { threshold, passes } => {
            (0..passes).fold(value, |v, _| if v >= threshold { v / 2.0 } else { v })
        }
    }
}

/// Containment cache use for `region` under `policy`.
///
/// Zero-filtered indicators get a fresh grid per event, so their masks are
/// never reused and are not stored.
#[must_use]
pub fn cache_policy(policy: &IndicatorPolicy, region: &Region) -> CachePolicy {
    if policy.zero_filter {
        CachePolicy::Disabled
    } else {
        CachePolicy::keyed(region.identity())
    }
}

/// Reduces a slice of values with `reducer`. Empty input yields `0.0`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn reduce(reducer: Reducer, values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    match reducer {
        Reducer::Max => round_to(values.iter().copied().fold(f64::MIN, f64::max), 2),
        Reducer::Sum => round_to(values.iter().sum(), 0),
        Reducer::NonzeroCount => values.iter().filter(|v| **v != 0.0).count() as f64,
    }
}

/// Reduces one region's filtered rows to a value and its aggregation label.
///
/// # Errors
///
/// Returns [`AggregateError::UnknownIndicator`] if `indicator_key` has no
/// policy.
pub fn aggregate(
    indicator_key: &str,
    rows: &FilteredRows,
) -> Result<(f64, Aggregation), AggregateError> {
    let policy = policy_for_key(indicator_key)?;
    let values: Vec<f64> = rows.points.iter().map(|p| p.value).collect();
    Ok((reduce(policy.reducer, &values), policy.reducer.aggregation()))
}

#[cfg(test)]
mod tests {
    use climada_hdx_indicator_models::{Indicator, Point};

    use super::*;

    fn rows(key: &str, values: &[f64]) -> FilteredRows {
        FilteredRows {
            indicator: key.to_string(),
            points: values.iter().map(|&v| Point::new(0.0, 0.0, v)).collect(),
        }
    }

    #[test]
    fn wildfire_double_halving() {
        let Some(correction) = Indicator::Wildfire.policy().correction else {
            panic!("wildfire has a correction");
        };
        assert!((correct(correction, 1200.0) - 300.0).abs() < 1e-12);
        assert!((correct(correction, 500.0) - 500.0).abs() < 1e-12);
        assert!((correct(correction, 700.0) - 350.0).abs() < 1e-12);
        assert!((correct(correction, 600.0) - 300.0).abs() < 1e-12);
    }

    #[test]
    fn flood_prefilter_drops_exact_zeros() {
        let mut points = PointSet::new(vec![
            Point::new(1.0, 1.0, 0.0),
            Point::new(2.0, 2.0, 0.5),
            Point::new(3.0, 3.0, 0.0),
        ]);
        prefilter(Indicator::Flood.policy(), &mut points);
        assert_eq!(points.points(), &[Point::new(2.0, 2.0, 0.5)]);

        let mut untouched = PointSet::new(vec![Point::new(1.0, 1.0, 0.0)]);
        prefilter(Indicator::Earthquake.policy(), &mut untouched);
        assert_eq!(untouched.len(), 1);
    }

    #[test]
    fn max_rounds_to_two_decimals() {
        let (value, aggregation) =
            aggregate("earthquake.date.max_intensity", &rows("e", &[4.1, 6.236, 5.0])).unwrap();
        assert!((value - 6.24).abs() < 1e-12);
        assert_eq!(aggregation, Aggregation::Max);
    }

    #[test]
    fn extent_counts_nonzero_cells() {
        let (value, aggregation) =
            aggregate("wildfire.date", &rows("w", &[0.0, 341.0, 12.5, 0.0])).unwrap();
        assert!((value - 2.0).abs() < 1e-12);
        assert_eq!(aggregation, Aggregation::Sum);
    }

    #[test]
    fn monetary_sums_to_whole_units() {
        let (value, aggregation) = aggregate("litpop", &rows("l", &[1.2, 2.2, 3.3])).unwrap();
        assert!((value - 7.0).abs() < 1e-12);
        assert_eq!(aggregation, Aggregation::Sum);
    }

    #[test]
    fn empty_rows_reduce_to_zero() {
        for key in ["earthquake.max_intensity", "flood.date", "crop-production.mai.firr.USD"] {
            let (value, _) = aggregate(key, &rows(key, &[])).unwrap();
            assert!(value.abs() < f64::EPSILON, "{key}");
        }
    }

    #[test]
    fn single_row_is_unchanged() {
        let (max, _) = aggregate("tropical-cyclone", &rows("t", &[33.25])).unwrap();
        assert!((max - 33.25).abs() < 1e-12);
        let (sum, _) = aggregate("litpop", &rows("l", &[14_002.0])).unwrap();
        assert!((sum - 14_002.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_key_fails() {
        let err = aggregate("relative-cropyield", &rows("r", &[1.0])).unwrap_err();
        assert!(matches!(err, AggregateError::UnknownIndicator(_)));
        assert!(err.to_string().contains("not implemented"));
    }

    #[test]
    fn flood_never_caches() {
        use geo::{MultiPolygon, polygon};
        let region = Region::admin1(
            "Centre",
            MultiPolygon(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0)]]),
        );
        assert_eq!(
            cache_policy(Indicator::Flood.policy(), &region),
            CachePolicy::Disabled
        );
        assert_eq!(
            cache_policy(Indicator::Earthquake.policy(), &region),
            CachePolicy::keyed("Centre-")
        );
    }
}
