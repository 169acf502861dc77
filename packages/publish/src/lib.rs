#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Output files and dataset publishing.
//!
//! Aggregated rows are written to CSV files carrying an HXL tag row under
//! the column header ([`writer`]), laid out per indicator ([`paths`]).
//! [`incremental`] decides which countries still need a run. Each indicator
//! is published as one HDX dataset described by an embedded TOML definition
//! ([`registry`]); [`resources`] turns a definition into the files to upload
//! and [`hdx`] pushes them to the catalogue.

pub mod hdx;
pub mod incremental;
pub mod paths;
pub mod registry;
pub mod resources;
pub mod writer;

use climada_hdx_source::SourceError;

/// Errors that can occur while writing or publishing output.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read or write failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Catalogue request failed after retries.
    #[error("Catalogue request failed: {0}")]
    Source(#[from] SourceError),

    /// A dataset definition is missing or inconsistent.
    #[error("Dataset definition error: {message}")]
    Definition {
        /// Description of what went wrong.
        message: String,
    },

    /// The catalogue rejected a write.
    #[error("HDX rejected {action}: {message}")]
    Rejected {
        /// CKAN action that failed.
        action: String,
        /// Error message from the catalogue.
        message: String,
    },

    /// Publishing needs an API key and none was provided.
    #[error("HDX_API_KEY is not set")]
    MissingApiKey,
}
