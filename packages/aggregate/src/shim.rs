//! Flood event date replacement.
//!
//! Upstream flood event sets for a few countries carry malformed event
//! dates. A reference table exported from the Dartmouth Flood Observatory
//! archive maps each DFO event number to its ordinal date; event `N` in the
//! hazard set is named `DFO_N`.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use climada_hdx_source::EventSeries;
use serde::Deserialize;

use crate::AggregateError;

#[derive(Deserialize)]
struct DateRow {
    id: String,
    date: i64,
}

/// Lookup from event name to ordinal date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateShim {
    dates: BTreeMap<String, i64>,
}

impl DateShim {
    /// Reads a CSV with at least `id` and `date` columns.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::Csv`] if a row is missing a column or the
    /// date is not an integer.
    pub fn from_reader(reader: impl Read) -> Result<Self, AggregateError> {
        let mut csv = csv::Reader::from_reader(reader);
        let mut dates = BTreeMap::new();
        for row in csv.deserialize::<DateRow>() {
            let row = row?;
            dates.insert(format!("DFO_{}", row.id.trim()), row.date);
        }
        Ok(Self { dates })
    }

    /// Reads the table from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError`] if the file cannot be opened or parsed.
    pub fn load(path: &Path) -> Result<Self, AggregateError> {
        let shim = Self::from_reader(std::fs::File::open(path)?)?;
        log::info!("Loaded {} flood event dates from {}", shim.len(), path.display());
        Ok(shim)
    }

    /// Number of events in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Replaces every event's date with the table's.
    ///
    /// All events are resolved before any date is written, so a failure
    /// leaves `series` unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::MissingShimDate`] for the first event the
    /// table does not cover.
    pub fn apply(&self, series: &mut EventSeries) -> Result<(), AggregateError> {
        let dates = series
            .events
            .iter()
            .map(|e| {
                self.dates
                    .get(&e.name)
                    .copied()
                    .ok_or_else(|| AggregateError::MissingShimDate {
                        event: e.name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (event, date) in series.events.iter_mut().zip(dates) {
            event.date = date;
        }
        log::info!("Replaced {} flood event dates", series.events.len());
        Ok(())
    }
}
