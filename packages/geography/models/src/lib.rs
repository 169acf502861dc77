#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Administrative region types.
//!
//! A [`Region`] is a named admin1 or admin2 boundary made of one or more
//! polygon parts. Regions for a country travel together as [`AdminRegions`],
//! which keeps names and shapes in a single list so that they can never get
//! out of step.

pub mod countries;

use geo::{Centroid, MultiPoint, MultiPolygon, Point};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Administrative subdivision level.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum AdminLevel {
    /// First-level subdivision (province, department, state).
    #[strum(serialize = "1")]
    #[serde(rename = "1")]
    Admin1,
    /// Second-level subdivision (district, municipality).
    #[strum(serialize = "2")]
    #[serde(rename = "2")]
    Admin2,
}

/// A named admin boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Region name (`ADM1_REF` for admin1, `ADM2_REF` for admin2).
    pub name: String,
    /// Name of the enclosing admin1 region. `None` for admin1 regions.
    pub parent_admin1_name: Option<String>,
    /// One or more polygon parts.
    pub geometry: MultiPolygon<f64>,
}

impl Region {
    /// Creates an admin1 region.
    #[must_use]
    pub fn admin1(name: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            name: name.into(),
            parent_admin1_name: None,
            geometry,
        }
    }

    /// Creates an admin2 region inside `admin1_name`.
    #[must_use]
    pub fn admin2(
        admin1_name: impl Into<String>,
        name: impl Into<String>,
        geometry: MultiPolygon<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            parent_admin1_name: Some(admin1_name.into()),
            geometry,
        }
    }

    /// Name of the admin1 region this region belongs to (itself for admin1).
    #[must_use]
    pub fn admin1_name(&self) -> &str {
        self.parent_admin1_name.as_deref().unwrap_or(&self.name)
    }

    /// Admin2 name, or the empty string for admin1 regions.
    #[must_use]
    pub fn admin2_name(&self) -> &str {
        if self.parent_admin1_name.is_some() {
            &self.name
        } else {
            ""
        }
    }

    /// Identity of the region within one country: `"{admin1}-{admin2}"`.
    #[must_use]
    pub fn identity(&self) -> String {
        format!("{}-{}", self.admin1_name(), self.admin2_name())
    }

    /// Mean of the centroids of the polygon parts. Parts are not weighted
    /// by area, so a small island moves the point as much as the mainland.
    #[must_use]
    pub fn centroid(&self) -> Option<Point<f64>> {
        let parts: MultiPoint<f64> = self
            .geometry
            .iter()
            .filter_map(Centroid::centroid)
            .collect();
        parts.centroid()
    }
}

/// The ordered admin regions of one country at one level.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminRegions {
    /// Level the regions were taken from.
    pub level: AdminLevel,
    /// Regions in source order.
    pub regions: Vec<Region>,
}

impl AdminRegions {
    /// Creates an empty set at `level`.
    #[must_use]
    pub const fn empty(level: AdminLevel) -> Self {
        Self {
            level,
            regions: Vec::new(),
        }
    }

    /// Number of regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether no regions were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Admin1 names, index-aligned with [`Self::regions`].
    #[must_use]
    pub fn admin1_names(&self) -> Vec<&str> {
        self.regions.iter().map(Region::admin1_name).collect()
    }

    /// Admin2 names (empty strings at admin1 level), index-aligned with
    /// [`Self::regions`].
    #[must_use]
    pub fn admin2_names(&self) -> Vec<&str> {
        self.regions.iter().map(Region::admin2_name).collect()
    }

    /// Iterates the regions in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.regions.iter()
    }
}

impl<'a> IntoIterator for &'a AdminRegions {
    type Item = &'a Region;
    type IntoIter = std::slice::Iter<'a, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}
