//! Output file layout.

use std::path::{Path, PathBuf};

use climada_hdx_geography_models::countries::Country;
use climada_hdx_indicator_models::Indicator;

/// Resolves output file paths under one output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    root: PathBuf,
}

impl OutputPaths {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Output directory root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/{indicator}`.
    #[must_use]
    pub fn indicator_dir(&self, indicator: Indicator) -> PathBuf {
        self.root.join(indicator.as_ref())
    }

    /// `{root}/{indicator}/{country-slug}-admin1-{indicator}.csv`
    #[must_use]
    pub fn detail(&self, indicator: Indicator, country: &Country) -> PathBuf {
        self.indicator_dir(indicator)
            .join(format!("{}-admin1-{indicator}.csv", country.slug()))
    }

    /// `{root}/{indicator}/admin1-summaries-{indicator}.csv`
    #[must_use]
    pub fn summary(&self, indicator: Indicator) -> PathBuf {
        self.indicator_dir(indicator)
            .join(format!("admin1-summaries-{indicator}.csv"))
    }

    /// `{root}/{indicator}/admin1-timeseries-{indicator}.csv`
    #[must_use]
    pub fn timeseries(&self, indicator: Indicator) -> PathBuf {
        self.indicator_dir(indicator)
            .join(format!("admin1-timeseries-{indicator}.csv"))
    }
}
