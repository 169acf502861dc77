//! Download of the UNMAP boundary files from HDX.

use std::path::{Path, PathBuf};

use climada_hdx_source::retry;

use crate::GeoError;

/// HDX package holding the UNMAP boundaries.
pub const UNMAP_PACKAGE: &str = "unmap-international-boundaries-geojson";

/// Resource name prefixes of the files the providers read.
const RESOURCE_PREFIXES: &[&str] = &["polbnda_adm1", "polbnda_adm2"];

/// A downloadable resource of a catalogue package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageResource {
    /// Resource (and local file) name.
    pub name: String,
    /// Download URL.
    pub url: String,
}

/// Picks the admin boundary resources out of a `package_show` response.
///
/// # Errors
///
/// Returns [`GeoError::Conversion`] if the response has no resource list.
pub fn boundary_resources(body: &serde_json::Value) -> Result<Vec<PackageResource>, GeoError> {
    let resources = body
        .pointer("/result/resources")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| GeoError::Conversion {
            message: format!("No resources in {UNMAP_PACKAGE} package response"),
        })?;

    Ok(resources
        .iter()
        .filter_map(|r| {
            let name = r.get("name")?.as_str()?;
            let url = r.get("url")?.as_str()?;
            RESOURCE_PREFIXES
                .iter()
                .any(|p| name.starts_with(p))
                .then(|| PackageResource {
                    name: name.to_string(),
                    url: url.to_string(),
                })
        })
        .collect())
}

/// Downloads the admin1/admin2 boundary files into `boundary_dir`,
/// skipping files already present. Returns the paths written.
///
/// # Errors
///
/// Returns [`GeoError`] if the catalogue request, a download, or a file
/// write fails.
pub async fn download_boundaries(
    client: &reqwest::Client,
    hdx_url: &str,
    boundary_dir: &Path,
) -> Result<Vec<PathBuf>, GeoError> {
    let url = format!("{}/api/3/action/package_show", hdx_url.trim_end_matches('/'));
    let body = retry::send_json(|| client.get(&url).query(&[("id", UNMAP_PACKAGE)])).await?;
    let resources = boundary_resources(&body)?;

    tokio::fs::create_dir_all(boundary_dir).await?;

    let mut written = Vec::new();
    for resource in resources {
        let path = boundary_dir.join(&resource.name);
        if tokio::fs::try_exists(&path).await? {
            log::info!("{} already present, skipping", path.display());
            continue;
        }
        log::info!("Downloading {} from {}", resource.name, resource.url);
        let bytes = retry::send_bytes(|| client.get(&resource.url)).await?;
        tokio::fs::write(&path, &bytes).await?;
        log::info!("Wrote {} ({} bytes)", path.display(), bytes.len());
        written.push(path);
    }

    Ok(written)
}
