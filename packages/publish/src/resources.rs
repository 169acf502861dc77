//! Expanding a dataset definition into concrete uploads.

use std::path::PathBuf;

use climada_hdx_geography_models::countries::Country;
use climada_hdx_indicator_models::Indicator;
use climada_hdx_indicator_models::policy::known_no_data;
use serde::Deserialize;

use crate::PublishError;
use crate::paths::OutputPaths;
use crate::registry::DatasetDefinition;

/// A file ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledResource {
    /// Resource name on HDX (the file name).
    pub name: String,
    /// Resource description.
    pub description: String,
    /// File format.
    pub format: String,
    /// Local file to upload.
    pub path: PathBuf,
}

/// Expands `dataset`'s resources over `countries`.
///
/// Per-country templates produce one resource per country not listed in
/// `skip_country`. Only files that exist are returned; missing files are
/// logged.
#[must_use]
pub fn compile_resources(
    dataset: &DatasetDefinition,
    paths: &OutputPaths,
    countries: &[Country],
) -> Vec<CompiledResource> {
    let dir = paths.indicator_dir(dataset.indicator);
    let mut compiled = Vec::new();

    for resource in &dataset.resources {
        if !resource.is_per_country() {
            let path = dir.join(&resource.filename_template);
            if path.is_file() {
                compiled.push(CompiledResource {
                    name: resource.filename_template.clone(),
                    description: resource.description.clone(),
                    format: resource.format.clone(),
                    path,
                });
            } else {
                log::info!("Resource file {} does not exist", path.display());
            }
            continue;
        }

        for country in countries {
            if dataset.skip_country.iter().any(|c| c == country.iso3) {
                log::info!("Skipping {} for {}", country.name, dataset.name);
                continue;
            }
            let name = resource
                .filename_template
                .replace("{country}", &country.slug());
            let path = dir.join(&name);
            if !path.is_file() {
                log::info!("Detail file for {} does not exist", country.name);
                continue;
            }
            compiled.push(CompiledResource {
                name,
                description: resource.description.replace("{country}", country.name),
                format: resource.format.clone(),
                path,
            });
        }
    }

    compiled
}

#[derive(Deserialize)]
struct EventDate {
    event_date: String,
}

/// The dataset's time coverage as an HDX date range, `[start TO end]`.
///
/// Exposures use the reference year of their upstream grids. Hazards use
/// the earliest and latest `event_date` in the timeseries file.
///
/// # Errors
///
/// Returns [`PublishError`] if the timeseries file cannot be read or has
/// no events.
pub fn dataset_date(indicator: Indicator, paths: &OutputPaths) -> Result<String, PublishError> {
    match indicator {
        Indicator::Litpop => return Ok(year_range(2020)),
        Indicator::CropProduction => return Ok(year_range(2018)),
        _ => {}
    }

    let path = paths.timeseries(indicator);
    let mut reader = csv::Reader::from_path(&path)?;
    let mut range: Option<(String, String)> = None;
    for row in reader.deserialize::<EventDate>() {
        let date = row?.event_date;
        if date.starts_with('#') {
            continue;
        }
        range = Some(match range {
            None => (date.clone(), date),
            Some((start, end)) => (
                if date < start { date.clone() } else { start },
                if date > end { date } else { end },
            ),
        });
    }

    let (start, end) = range.ok_or_else(|| PublishError::Definition {
        message: format!("{} has no events", path.display()),
    })?;
    Ok(format!("[{start} TO {end}]"))
}

fn year_range(year: i32) -> String {
    format!("[{year}-01-01T00:00:00 TO {year}-12-31T23:59:59]")
}

/// HDX country groups for a dataset: every country with data, lower-case
/// ISO3. Storm Europe only covers Ukraine.
#[must_use]
pub fn country_groups(indicator: Indicator, countries: &[Country]) -> Vec<String> {
    if indicator == Indicator::StormEurope {
        return vec!["ukr".to_string()];
    }
    let excluded = known_no_data(indicator);
    countries
        .iter()
        .filter(|c| !excluded.contains(&c.name))
        .map(|c| c.iso3.to_lowercase())
        .collect()
}
