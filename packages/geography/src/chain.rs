//! Ordered provider fallback.

use climada_hdx_geography_models::{AdminLevel, AdminRegions};

use crate::{BoundaryProvider, GeoError};

/// Tries each provider in order until one returns regions.
///
/// A provider that has no shapes for the request (empty result, unknown
/// country, or a missing boundary file) passes the request on. Any other
/// error stops the chain.
pub struct ProviderChain {
    providers: Vec<Box<dyn BoundaryProvider>>,
}

impl ProviderChain {
    /// Creates a chain trying `providers` in order.
    #[must_use]
    pub fn new(providers: Vec<Box<dyn BoundaryProvider>>) -> Self {
        Self { providers }
    }

    /// Regions of `iso3` at `level` from the first provider that has them.
    ///
    /// Returns an empty [`AdminRegions`] when no provider does.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if a provider fails for a reason other than a
    /// lookup miss.
    pub fn regions(&self, iso3: &str, level: AdminLevel) -> Result<AdminRegions, GeoError> {
        for provider in &self.providers {
            match provider.regions(iso3, level) {
                Ok(regions) if !regions.is_empty() => {
                    log::info!(
                        "{iso3} admin{level}: {} regions from {}",
                        regions.len(),
                        provider.name()
                    );
                    return Ok(regions);
                }
                Ok(_) => {
                    log::debug!("{iso3} admin{level}: {} returned no regions", provider.name());
                }
                Err(e) if e.is_lookup_miss() => {
                    log::debug!("{iso3} admin{level}: {} has no data ({e})", provider.name());
                }
                Err(e) => return Err(e),
            }
        }

        log::warn!("{iso3} admin{level}: no provider has boundaries");
        Ok(AdminRegions::empty(level))
    }
}

/// Admin2 regions of `iso3` when any provider has them, else admin1.
///
/// # Errors
///
/// Returns [`GeoError`] if a provider fails for a reason other than a
/// lookup miss.
pub fn best_admin_regions(chain: &ProviderChain, iso3: &str) -> Result<AdminRegions, GeoError> {
    let admin2 = chain.regions(iso3, AdminLevel::Admin2)?;
    if !admin2.is_empty() {
        return Ok(admin2);
    }
    log::info!("{iso3}: no admin2 boundaries, falling back to admin1");
    chain.regions(iso3, AdminLevel::Admin1)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use climada_hdx_geography_models::Region;
    use geo::{MultiPolygon, polygon};

    use super::*;

    struct Fixed {
        name: &'static str,
        level: AdminLevel,
        names: Vec<&'static str>,
        calls: AtomicUsize,
        fail_hard: bool,
    }

    impl Fixed {
        fn new(name: &'static str, level: AdminLevel, names: Vec<&'static str>) -> Self {
            Self {
                name,
                level,
                names,
                calls: AtomicUsize::new(0),
                fail_hard: false,
            }
        }
    }

    fn unit() -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]])
    }

    impl BoundaryProvider for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn regions(&self, iso3: &str, level: AdminLevel) -> Result<AdminRegions, GeoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_hard {
                return Err(GeoError::Conversion {
                    message: "corrupt".to_string(),
                });
            }
            if level != self.level {
                return Err(GeoError::NotFound {
                    iso3: iso3.to_string(),
                    level,
                });
            }
            let regions = self
                .names
                .iter()
                .map(|n| match level {
                    AdminLevel::Admin1 => Region::admin1(*n, unit()),
                    AdminLevel::Admin2 => Region::admin2("Parent", *n, unit()),
                })
                .collect();
            Ok(AdminRegions { level, regions })
        }
    }

    #[test]
    fn falls_through_empty_and_missing() {
        let chain = ProviderChain::new(vec![
            Box::new(Fixed::new("empty", AdminLevel::Admin1, vec![])),
            Box::new(Fixed::new("other-level", AdminLevel::Admin2, vec!["X"])),
            Box::new(Fixed::new("good", AdminLevel::Admin1, vec!["Centre", "Nord"])),
        ]);
        let regions = chain.regions("HTI", AdminLevel::Admin1).unwrap();
        assert_eq!(regions.admin1_names(), vec!["Centre", "Nord"]);
    }

    #[test]
    fn hard_errors_stop_the_chain() {
        let mut broken = Fixed::new("broken", AdminLevel::Admin1, vec![]);
        broken.fail_hard = true;
        let chain = ProviderChain::new(vec![
            Box::new(broken),
            Box::new(Fixed::new("good", AdminLevel::Admin1, vec!["Centre"])),
        ]);
        assert!(chain.regions("HTI", AdminLevel::Admin1).is_err());
    }

    #[test]
    fn exhausted_chain_returns_empty_regions() {
        let chain = ProviderChain::new(vec![Box::new(Fixed::new(
            "empty",
            AdminLevel::Admin1,
            vec![],
        ))]);
        let regions = chain.regions("XXX", AdminLevel::Admin1).unwrap();
        assert!(regions.is_empty());
        assert_eq!(regions.admin1_names().len(), regions.admin2_names().len());
        assert_eq!(regions.admin1_names().len(), regions.len());
    }

    #[test]
    fn prefers_admin2() {
        let chain = ProviderChain::new(vec![
            Box::new(Fixed::new("adm2", AdminLevel::Admin2, vec!["Cayes"])),
            Box::new(Fixed::new("adm1", AdminLevel::Admin1, vec!["Sud"])),
        ]);
        let regions = best_admin_regions(&chain, "HTI").unwrap();
        assert_eq!(regions.level, AdminLevel::Admin2);
        assert_eq!(regions.admin2_names(), vec!["Cayes"]);
    }

    #[test]
    fn falls_back_to_admin1() {
        let chain = ProviderChain::new(vec![Box::new(Fixed::new(
            "adm1",
            AdminLevel::Admin1,
            vec!["Sud"],
        ))]);
        let regions = best_admin_regions(&chain, "HTI").unwrap();
        assert_eq!(regions.level, AdminLevel::Admin1);
        assert_eq!(regions.admin2_names(), vec![""]);
    }
}
