//! Which countries still need a run.
//!
//! A country is done for an indicator once its detail file exists and it
//! appears in the summary file. A run writes the timeseries first and the
//! detail file last, so a country interrupted part way is picked up again.
//! A hazard with no material events leaves no timeseries rows and still
//! counts as done. Countries the upstream source has no data for are
//! always treated as done.

use std::collections::BTreeSet;
use std::path::Path;

use climada_hdx_geography_models::countries::{COUNTRIES, Country};
use climada_hdx_indicator_models::Indicator;
use climada_hdx_indicator_models::policy::known_no_data;

use crate::PublishError;
use crate::paths::OutputPaths;

/// Country names in the first column of an output file, skipping the HXL
/// row. A missing file yields an empty set.
///
/// # Errors
///
/// Returns [`PublishError`] if the file exists but cannot be read.
pub fn countries_in_file(path: &Path) -> Result<BTreeSet<String>, PublishError> {
    if !path.is_file() {
        return Ok(BTreeSet::new());
    }
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut countries = BTreeSet::new();
    for record in reader.records() {
        let record = record?;
        if let Some(country) = record.get(0) {
            if !country.starts_with("#country") && !country.is_empty() {
                countries.insert(country.to_string());
            }
        }
    }
    Ok(countries)
}

/// Countries that still need processing for `indicator`, in table order.
///
/// With `force`, every country not known to lack data is returned.
///
/// # Errors
///
/// Returns [`PublishError`] if an existing summary file cannot be read.
pub fn countries_to_process(
    paths: &OutputPaths,
    indicator: Indicator,
    force: bool,
) -> Result<Vec<&'static Country>, PublishError> {
    let excluded = known_no_data(indicator);
    let candidates = COUNTRIES.iter().filter(|c| !excluded.contains(&c.name));
    if force {
        return Ok(candidates.collect());
    }

    let summarized = countries_in_file(&paths.summary(indicator))?;
    let pending: Vec<&'static Country> = candidates
        .filter(|c| !paths.detail(indicator, c).is_file() || !summarized.contains(c.name))
        .collect();

    log::info!(
        "{indicator}: {} of {} countries need processing ({} known without data)",
        pending.len(),
        COUNTRIES.len(),
        excluded.len()
    );
    Ok(pending)
}
