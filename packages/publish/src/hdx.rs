//! Publishing datasets to HDX.
//!
//! HDX is a CKAN instance: a dataset is created with `package_create` or
//! updated with `package_update`, then each file is attached with a
//! multipart `resource_create`. [`DatasetSink`] hides the catalogue so the
//! publish flow can run against a dry-run client or a test fake.

use async_trait::async_trait;
use climada_hdx_geography_models::countries::Country;
use climada_hdx_indicator_models::Indicator;
use climada_hdx_source::retry;
use serde::Serialize;

use crate::PublishError;
use crate::paths::OutputPaths;
use crate::registry::{DatasetDefinition, dataset_for};
use crate::resources::{CompiledResource, compile_resources, country_groups, dataset_date};

/// Default HDX site.
pub const DEFAULT_HDX_URL: &str = "https://data.humdata.org";

/// A CKAN `{ "name": ... }` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameRef {
    /// Referenced name.
    pub name: String,
}

impl NameRef {
    fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Dataset metadata as sent to `package_create`/`package_update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetPayload {
    /// Dataset name.
    pub name: String,
    /// Dataset title.
    pub title: String,
    /// Description.
    pub notes: String,
    /// Known limitations.
    pub caveats: String,
    /// Always `"Other"`; the text is in `methodology_other`.
    pub methodology: String,
    /// Methodology text.
    pub methodology_other: String,
    /// Time coverage, `[start TO end]`.
    pub dataset_date: String,
    /// Tags.
    pub tags: Vec<NameRef>,
    /// Country groups.
    pub groups: Vec<NameRef>,
    /// Owning organisation.
    pub owner_org: String,
    /// Licence identifier.
    pub license_id: String,
    /// Expected update frequency in days.
    pub data_update_frequency: String,
}

impl DatasetPayload {
    /// Builds the payload for `dataset`.
    #[must_use]
    pub fn new(
        dataset: &DatasetDefinition,
        dataset_date: String,
        groups: Vec<String>,
        owner_org: &str,
    ) -> Self {
        Self {
            name: dataset.name.clone(),
            title: dataset.title.clone(),
            notes: dataset.notes.trim().to_string(),
            caveats: dataset.caveats.trim().to_string(),
            methodology: "Other".to_string(),
            methodology_other: dataset.methodology.trim().to_string(),
            dataset_date,
            tags: dataset.tags.iter().map(NameRef::new).collect(),
            groups: groups.into_iter().map(NameRef::new).collect(),
            owner_org: owner_org.to_string(),
            license_id: "cc-by".to_string(),
            data_update_frequency: "365".to_string(),
        }
    }
}

/// What a publish did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Dataset name.
    pub dataset: String,
    /// Whether the dataset was new on the catalogue.
    pub created: bool,
    /// Resources uploaded (or that would have been, in dry-run mode).
    pub resources: usize,
    /// Whether no write was made.
    pub dry_run: bool,
}

/// Destination for published datasets.
#[async_trait]
pub trait DatasetSink: Send + Sync {
    /// Creates or updates `dataset` and attaches `resources`.
    async fn publish(
        &self,
        dataset: &DatasetPayload,
        resources: &[CompiledResource],
    ) -> Result<PublishReport, PublishError>;
}

/// CKAN client for HDX.
pub struct HdxClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    dry_run: bool,
}

impl HdxClient {
    /// Creates a client. Without `dry_run`, an API key is required.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::MissingApiKey`] if writes are enabled and no
    /// key is given.
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: Option<String>,
        dry_run: bool,
    ) -> Result<Self, PublishError> {
        if !dry_run && api_key.is_none() {
            return Err(PublishError::MissingApiKey);
        }
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            dry_run,
        })
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/api/3/action/{action}", self.base_url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(reqwest::header::AUTHORIZATION, key),
            None => request,
        }
    }

    /// Whether a dataset named `name` exists.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the request fails with anything other
    /// than "not found".
    pub async fn package_exists(&self, name: &str) -> Result<bool, PublishError> {
        let url = self.action_url("package_show");
        let status =
            retry::send_status(|| self.authorized(self.client.get(&url).query(&[("id", name)])))
                .await?;
        match status {
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(PublishError::Rejected {
                action: "package_show".to_string(),
                message: format!("HTTP {status}"),
            }),
        }
    }

    async fn post_package(
        &self,
        action: &str,
        dataset: &DatasetPayload,
    ) -> Result<String, PublishError> {
        let url = self.action_url(action);
        let body = retry::send_json(|| self.authorized(self.client.post(&url).json(dataset))).await?;
        check_success(action, &body)?;
        body.pointer("/result/id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PublishError::Rejected {
                action: action.to_string(),
                message: "response has no package id".to_string(),
            })
    }

    async fn upload(&self, package_id: &str, resource: &CompiledResource) -> Result<(), PublishError> {
        let bytes = tokio::fs::read(&resource.path).await?;
        let url = self.action_url("resource_create");
        log::info!("Uploading {} ({} bytes)", resource.name, bytes.len());

        let body = retry::send_json(|| {
            let form = reqwest::multipart::Form::new()
                .text("package_id", package_id.to_string())
                .text("name", resource.name.clone())
                .text("description", resource.description.clone())
                .text("format", resource.format.clone())
                .part(
                    "upload",
                    reqwest::multipart::Part::bytes(bytes.clone()).file_name(resource.name.clone()),
                );
            self.authorized(self.client.post(&url).multipart(form))
        })
        .await?;
        check_success("resource_create", &body)
    }
}

fn check_success(action: &str, body: &serde_json::Value) -> Result<(), PublishError> {
    if body.get("success").and_then(serde_json::Value::as_bool) == Some(true) {
        return Ok(());
    }
    Err(PublishError::Rejected {
        action: action.to_string(),
        message: body
            .get("error")
            .map_or_else(|| "unknown error".to_string(), ToString::to_string),
    })
}

#[async_trait]
impl DatasetSink for HdxClient {
    async fn publish(
        &self,
        dataset: &DatasetPayload,
        resources: &[CompiledResource],
    ) -> Result<PublishReport, PublishError> {
        if self.dry_run {
            log::info!("Dry run: would create or update {} on {}", dataset.name, self.base_url);
            for resource in resources {
                log::info!("Dry run: would upload {}", resource.path.display());
            }
            return Ok(PublishReport {
                dataset: dataset.name.clone(),
                created: false,
                resources: resources.len(),
                dry_run: true,
            });
        }

        let exists = self.package_exists(&dataset.name).await?;
        let action = if exists { "package_update" } else { "package_create" };
        log::info!("{action} {} on {}", dataset.name, self.base_url);
        let package_id = self.post_package(action, dataset).await?;

        for resource in resources {
            self.upload(&package_id, resource).await?;
        }

        Ok(PublishReport {
            dataset: dataset.name.clone(),
            created: !exists,
            resources: resources.len(),
            dry_run: false,
        })
    }
}

/// Publishes `indicator`'s dataset from the files under `paths`.
///
/// # Errors
///
/// Returns [`PublishError`] if the indicator has no dataset definition, no
/// files exist, the date range cannot be computed, or the sink fails.
pub async fn publish_indicator(
    sink: &dyn DatasetSink,
    indicator: Indicator,
    paths: &OutputPaths,
    countries: &[Country],
    owner_org: &str,
) -> Result<PublishReport, PublishError> {
    let definition = dataset_for(indicator).ok_or_else(|| PublishError::Definition {
        message: format!("No dataset definition for {indicator}"),
    })?;

    let date = dataset_date(indicator, paths)?;
    let resources = compile_resources(&definition, paths, countries);
    if resources.is_empty() {
        return Err(PublishError::Definition {
            message: format!("No output files for {} under {}", definition.name, paths.root().display()),
        });
    }

    let payload = DatasetPayload::new(
        &definition,
        date,
        country_groups(indicator, countries),
        owner_org,
    );
    log::info!("Dataset: {} ({})", payload.title, payload.dataset_date);
    log::info!("{} resources", resources.len());

    sink.publish(&payload, &resources).await
}
