//! Dataset registry, loaded from embedded TOML definitions.
//!
//! Each `.toml` file in `packages/publish/datasets/` describes one HDX
//! dataset and is baked into the binary at compile time via
//! [`include_str!`].

use climada_hdx_indicator_models::Indicator;
use serde::Deserialize;

/// A file attached to a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceDefinition {
    /// File name inside the indicator's output directory. `{country}` is
    /// replaced by each country's slug.
    pub filename_template: String,
    /// Resource description. `{country}` is replaced by the country name.
    pub description: String,
    /// File format shown on HDX.
    pub format: String,
}

impl ResourceDefinition {
    /// Whether this resource expands to one file per country.
    #[must_use]
    pub fn is_per_country(&self) -> bool {
        self.filename_template.contains("{country}")
    }
}

/// One published dataset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetDefinition {
    /// HDX dataset name (`climada-{indicator}-dataset`).
    pub name: String,
    /// Indicator whose output directory the resources live in.
    pub indicator: Indicator,
    /// Dataset title.
    pub title: String,
    /// Dataset description.
    pub notes: String,
    /// Known limitations.
    pub caveats: String,
    /// Free-text methodology.
    pub methodology: String,
    /// HDX tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// ISO3 codes of countries whose files are withheld.
    #[serde(default)]
    pub skip_country: Vec<String>,
    /// Resources, in upload order.
    pub resources: Vec<ResourceDefinition>,
}

/// Parses a [`DatasetDefinition`] from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or missing required fields.
pub fn parse_dataset_toml(toml_str: &str) -> Result<DatasetDefinition, String> {
    toml::de::from_str(toml_str).map_err(|e| e.to_string())
}

/// TOML definitions embedded at compile time.
const DATASET_TOMLS: &[(&str, &str)] = &[
    // ── Exposures ────────────────────────────────────────────────────
    ("litpop", include_str!("../datasets/litpop.toml")),
    (
        "crop-production",
        include_str!("../datasets/crop-production.toml"),
    ),
    // ── Hazards ──────────────────────────────────────────────────────
    ("earthquake", include_str!("../datasets/earthquake.toml")),
    ("flood", include_str!("../datasets/flood.toml")),
    ("wildfire", include_str!("../datasets/wildfire.toml")),
    ("river-flood", include_str!("../datasets/river-flood.toml")),
    (
        "tropical-cyclone",
        include_str!("../datasets/tropical-cyclone.toml"),
    ),
    ("storm-europe", include_str!("../datasets/storm-europe.toml")),
];

/// Returns all dataset definitions, parsed from embedded TOML.
///
/// # Panics
///
/// Panics if any TOML definition is malformed. The definitions are
/// embedded, so the registry tests rule this out.
#[must_use]
pub fn all_datasets() -> Vec<DatasetDefinition> {
    DATASET_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_dataset_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// The dataset publishing `indicator`.
#[must_use]
pub fn dataset_for(indicator: Indicator) -> Option<DatasetDefinition> {
    all_datasets().into_iter().find(|d| d.indicator == indicator)
}
