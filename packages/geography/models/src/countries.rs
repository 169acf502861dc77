//! Country reference table.
//!
//! Maps the country names used in output files to ISO 3166-1 alpha-3 and
//! numeric codes. The hazard data API is queried by alpha-3 code, while the
//! global crop production grids tag each cell with the numeric code.

/// A country covered by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Country {
    /// Display name as written to the `country_name` column.
    pub name: &'static str,
    /// ISO 3166-1 alpha-3 code (e.g. `"HTI"`).
    pub iso3: &'static str,
    /// ISO 3166-1 numeric code (e.g. `332`).
    pub iso_numeric: u16,
}

impl Country {
    /// Lower-case name with spaces replaced by `-`, used in file names.
    #[must_use]
    pub fn slug(&self) -> String {
        self.name.to_lowercase().replace(' ', "-")
    }
}

/// Countries with a humanitarian response plan, in output order.
pub const COUNTRIES: &[Country] = &[
    Country { name: "Afghanistan", iso3: "AFG", iso_numeric: 4 },
    Country { name: "Burkina Faso", iso3: "BFA", iso_numeric: 854 },
    Country { name: "Burundi", iso3: "BDI", iso_numeric: 108 },
    Country { name: "Cameroon", iso3: "CMR", iso_numeric: 120 },
    Country { name: "Central African Republic", iso3: "CAF", iso_numeric: 140 },
    Country { name: "Chad", iso3: "TCD", iso_numeric: 148 },
    Country { name: "Colombia", iso3: "COL", iso_numeric: 170 },
    Country { name: "DR Congo", iso3: "COD", iso_numeric: 180 },
    Country { name: "El Salvador", iso3: "SLV", iso_numeric: 222 },
    Country { name: "Ethiopia", iso3: "ETH", iso_numeric: 231 },
    Country { name: "Guatemala", iso3: "GTM", iso_numeric: 320 },
    Country { name: "Haiti", iso3: "HTI", iso_numeric: 332 },
    Country { name: "Honduras", iso3: "HND", iso_numeric: 340 },
    Country { name: "Mali", iso3: "MLI", iso_numeric: 466 },
    Country { name: "Mozambique", iso3: "MOZ", iso_numeric: 508 },
    Country { name: "Myanmar", iso3: "MMR", iso_numeric: 104 },
    Country { name: "Niger", iso3: "NER", iso_numeric: 562 },
    Country { name: "Nigeria", iso3: "NGA", iso_numeric: 566 },
    Country { name: "Somalia", iso3: "SOM", iso_numeric: 706 },
    Country { name: "South Sudan", iso3: "SSD", iso_numeric: 728 },
    Country { name: "State of Palestine", iso3: "PSE", iso_numeric: 275 },
    Country { name: "Sudan", iso3: "SDN", iso_numeric: 729 },
    Country { name: "Syrian Arab Republic", iso3: "SYR", iso_numeric: 760 },
    Country { name: "Ukraine", iso3: "UKR", iso_numeric: 804 },
    Country { name: "Venezuela", iso3: "VEN", iso_numeric: 862 },
    Country { name: "Yemen", iso3: "YEM", iso_numeric: 887 },
];

/// Looks up a country by display name (case-insensitive).
#[must_use]
pub fn by_name(name: &str) -> Option<&'static Country> {
    COUNTRIES
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
}

/// Looks up a country by ISO alpha-3 code (case-insensitive).
#[must_use]
pub fn by_iso3(iso3: &str) -> Option<&'static Country> {
    COUNTRIES
        .iter()
        .find(|c| c.iso3.eq_ignore_ascii_case(iso3.trim()))
}

/// Resolves either a display name or an alpha-3 code.
#[must_use]
pub fn resolve(name_or_iso3: &str) -> Option<&'static Country> {
    by_name(name_or_iso3).or_else(|| by_iso3(name_or_iso3))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        let mut iso3: Vec<&str> = COUNTRIES.iter().map(|c| c.iso3).collect();
        iso3.sort_unstable();
        iso3.dedup();
        assert_eq!(iso3.len(), COUNTRIES.len());

        let mut numeric: Vec<u16> = COUNTRIES.iter().map(|c| c.iso_numeric).collect();
        numeric.sort_unstable();
        numeric.dedup();
        assert_eq!(numeric.len(), COUNTRIES.len());
    }

    #[test]
    fn lookups_are_case_insensitive() {
        assert_eq!(by_name("haiti").map(|c| c.iso3), Some("HTI"));
        assert_eq!(by_iso3("hti").map(|c| c.name), Some("Haiti"));
        assert_eq!(resolve("DR Congo").map(|c| c.iso_numeric), Some(180));
        assert_eq!(resolve("pse").map(|c| c.name), Some("State of Palestine"));
    }

    #[test]
    fn unknown_country() {
        assert!(by_name("Atlantis").is_none());
        assert!(by_iso3("XXX").is_none());
    }

    #[test]
    fn slug_replaces_spaces() {
        let country = by_name("Central African Republic").unwrap();
        assert_eq!(country.slug(), "central-african-republic");
    }
}
