//! CLIMADA data API catalogue client.
//!
//! Lists the data types the API publishes and the property values available
//! for a data type's active datasets. Used by the `info` command to decide
//! which property filters a request should carry.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{SourceError, retry};

/// Default base URL of the public API.
pub const DEFAULT_API_URL: &str = "https://climada.ethz.ch/data-api/v2/";

/// Number of property values shown before truncating.
pub const PROPERTY_VALUE_PREVIEW: usize = 10;

/// One property a data type's datasets are tagged with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PropertyInfo {
    /// Property name, e.g. `country_iso3alpha`.
    pub property: String,
    /// Whether every dataset carries it.
    #[serde(default)]
    pub mandatory: bool,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
}

/// Literature reference of a data type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyReference {
    /// Citation.
    pub key_reference: String,
}

/// A data type published by the API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataTypeInfo {
    /// Name, e.g. `litpop`.
    pub data_type: String,
    /// `exposures` or `hazard`.
    pub data_type_group: String,
    /// Publication status.
    #[serde(default)]
    pub status: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Properties datasets of this type carry.
    #[serde(default)]
    pub properties: Vec<PropertyInfo>,
    /// Literature references.
    #[serde(default)]
    pub key_reference: Vec<KeyReference>,
    /// Version notes as published.
    #[serde(default)]
    pub version_notes: serde_json::Value,
}

/// One dataset of a data type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetInfo {
    /// Dataset identifier.
    pub uuid: String,
    /// Dataset name.
    pub name: String,
    /// Dataset version.
    #[serde(default)]
    pub version: String,
    /// Property values of this dataset.
    #[serde(default)]
    pub properties: BTreeMap<String, Option<String>>,
}

/// Client for the catalogue endpoints.
pub struct ClimadaClient {
    client: reqwest::Client,
    base_url: String,
}

impl ClimadaClient {
    /// Creates a client against `base_url` (with or without trailing `/`).
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Lists every published data type.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request or decoding fails.
    pub async fn data_types(&self) -> Result<Vec<DataTypeInfo>, SourceError> {
        let url = format!("{}/data_type/", self.base_url);
        log::debug!("Listing CLIMADA data types from {url}");
        let body = retry::send_json(|| self.client.get(&url)).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Lists the active datasets of `data_type`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request or decoding fails.
    pub async fn datasets(&self, data_type: &str) -> Result<Vec<DatasetInfo>, SourceError> {
        let url = format!("{}/dataset/", self.base_url);
        let body = retry::send_json(|| {
            self.client
                .get(&url)
                .query(&[("data_type", data_type), ("status", "active")])
        })
        .await?;
        let datasets: Vec<DatasetInfo> = serde_json::from_value(body)?;
        log::info!("{} active {data_type} datasets", datasets.len());
        Ok(datasets)
    }
}

/// Distinct values of every property across the datasets matching `known`,
/// in first-seen order.
#[must_use]
pub fn property_values(
    datasets: &[DatasetInfo],
    known: &BTreeMap<String, String>,
) -> BTreeMap<String, Vec<String>> {
    let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();

    let matching = datasets.iter().filter(|d| {
        known
            .iter()
            .all(|(k, v)| d.properties.get(k).and_then(Option::as_deref) == Some(v.as_str()))
    });

    for dataset in matching {
        for (property, value) in &dataset.properties {
            let Some(value) = value else {
                continue;
            };
            let entry = values.entry(property.clone()).or_default();
            if !entry.contains(value) {
                entry.push(value.clone());
            }
        }
    }

    values
}

/// Renders one property's values, truncated after
/// [`PROPERTY_VALUE_PREVIEW`] entries.
#[must_use]
pub fn format_property_values(property: &str, values: &[String]) -> String {
    if values.len() > PROPERTY_VALUE_PREVIEW {
        format!(
            "{property}: [{}]... {} entries",
            values[..PROPERTY_VALUE_PREVIEW].join(", "),
            values.len()
        )
    } else {
        format!("{property}: [{}]", values.join(", "))
    }
}
