#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry containment filter for gridded indicator data.
//!
//! Builds an R-tree over a point grid once, then answers "which points lie
//! inside this region" by querying each polygon part's bounding box and
//! running an exact point-in-polygon test on the candidates. A point
//! belongs to a region when it lies strictly inside any of its parts.
//!
//! Hazard event sets reuse one centroid grid for hundreds of events, so the
//! resulting boolean masks are memoised in a [`ContainmentCache`] owned by
//! the caller's run.

pub mod cache;

use climada_hdx_geography_models::Region;
use climada_hdx_indicator_models::{FilteredRows, PointSet};
use geo::{BoundingRect, Contains, Polygon};
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};
use sha2::{Digest, Sha256};

pub use cache::{CachePolicy, CacheStats, ContainmentCache};

/// Errors raised by the containment filter.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// The values passed in are not aligned with the grid's points.
    #[error("Point set has {points} points but the grid was built for {grid}")]
    GridMismatch {
        /// Length of the grid.
        grid: usize,
        /// Length of the point set passed in.
        points: usize,
    },
}

/// Identity of a point grid: its length and coordinate ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridFingerprint(pub(crate) String);

impl std::fmt::Display for GridFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// R-tree over the coordinates of a [`PointSet`].
///
/// Values are not part of the grid; any point set with the same
/// coordinates in the same order can be filtered against it.
pub struct SpatialGrid {
    tree: RTree<IndexedPoint>,
    len: usize,
    fingerprint: GridFingerprint,
}

impl SpatialGrid {
    /// Indexes the coordinates of `points`.
    #[must_use]
    pub fn new(points: &PointSet) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((points.len() as u64).to_le_bytes());

        let entries: Vec<IndexedPoint> = points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                hasher.update(p.longitude.to_bits().to_le_bytes());
                hasher.update(p.latitude.to_bits().to_le_bytes());
                GeomWithData::new([p.longitude, p.latitude], i)
            })
            .collect();

        let digest = hasher.finalize();

        Self {
            tree: RTree::bulk_load(entries),
            len: points.len(),
            fingerprint: GridFingerprint(hex::encode(&digest[..16])),
        }
    }

    /// Number of indexed points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the grid has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fingerprint of the coordinate sequence.
    #[must_use]
    pub const fn fingerprint(&self) -> &GridFingerprint {
        &self.fingerprint
    }

    /// Computes the containment mask of `region` over this grid.
    ///
    /// `mask[i]` is `true` when point `i` lies inside any polygon part.
    #[must_use]
    pub fn containment_mask(&self, region: &Region) -> Vec<bool> {
        let mut mask = vec![false; self.len];

        for polygon in &region.geometry {
            let Some(envelope) = compute_envelope(polygon) else {
                continue;
            };
            for entry in self.tree.locate_in_envelope(&envelope) {
                let i = entry.data;
                if mask[i] {
                    continue;
                }
                let [lon, lat] = *entry.geom();
                if polygon.contains(&geo::Point::new(lon, lat)) {
                    mask[i] = true;
                }
            }
        }

        mask
    }
}

/// Returns the points of `points` that fall inside `region`, tagged with
/// `indicator_key`.
///
/// `grid` must have been built from a point set with the same coordinates
/// as `points`. With [`CachePolicy::Enabled`] the mask is looked up (and
/// stored on a miss) under the given key and the grid's fingerprint. An
/// empty result is valid and only logged.
///
/// # Errors
///
/// Returns [`SpatialError::GridMismatch`] if `points` and `grid` differ in
/// length.
pub fn filter_points(
    cache: &mut ContainmentCache,
    grid: &SpatialGrid,
    points: &PointSet,
    region: &Region,
    indicator_key: &str,
    policy: &CachePolicy,
) -> Result<FilteredRows, SpatialError> {
    if points.len() != grid.len() {
        return Err(SpatialError::GridMismatch {
            grid: grid.len(),
            points: points.len(),
        });
    }

    let mask = cache.get_or_compute(policy, grid.fingerprint(), || {
        grid.containment_mask(region)
    });

    let rows = FilteredRows {
        indicator: indicator_key.to_string(),
        points: points
            .iter()
            .zip(mask.iter())
            .filter(|(_, inside)| **inside)
            .map(|(p, _)| *p)
            .collect(),
    };

    if rows.is_empty() {
        log::debug!(
            "No rows inside geometry filter for {} ({indicator_key})",
            region.identity()
        );
    }

    Ok(rows)
}

/// Bounding box of one polygon part as an R-tree envelope.
fn compute_envelope(polygon: &Polygon<f64>) -> Option<AABB<[f64; 2]>> {
    polygon
        .bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
