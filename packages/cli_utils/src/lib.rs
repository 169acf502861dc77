#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Logger and progress bars for the `climada_hdx` binary.
//!
//! A batch shows one persistent bar over countries, prefixed with the
//! indicator, and a short-lived bar over the current country's hazard
//! events. Event bars disappear when the country finishes so the terminal
//! keeps only the per-country status lines.
//!
//! [`init_logger`] installs `pretty_env_logger` behind
//! `indicatif-log-bridge` so log lines are suspended while bars redraw.

use std::sync::Arc;
use std::time::Duration;

use climada_hdx_source::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;

pub use indicatif::MultiProgress;

const COUNTRIES_TEMPLATE: &str =
    "{prefix:.bold} {wide_bar:.green/dim} {pos}/{len} countries [{elapsed_precise}] {msg}";
const FETCH_TEMPLATE: &str = "{spinner:.cyan} {prefix}: fetching events";
const EVENTS_TEMPLATE: &str =
    "  {prefix} {wide_bar:.cyan/dim} {pos}/{len} events ({per_sec}, {eta} left)";

/// What happens to a bar when its work is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnFinish {
    /// Leave the bar on screen with the final message.
    Keep,
    /// Remove the bar; the final message goes to the debug log.
    Clear,
}

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style applied by `set_total()`.
    counting: ProgressStyle,
    on_finish: OnFinish,
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

impl IndicatifProgress {
    fn countries(multi: &MultiProgress, indicator: &str, total: u64) -> Self {
        let counting = style(COUNTRIES_TEMPLATE);
        let bar = multi.add(ProgressBar::new(total).with_style(counting.clone()));
        bar.set_prefix(indicator.to_string());
        Self {
            bar,
            counting,
            on_finish: OnFinish::Keep,
        }
    }

    fn events(multi: &MultiProgress, country: &str) -> Self {
        let bar = multi.add(ProgressBar::new_spinner().with_style(style(FETCH_TEMPLATE)));
        bar.set_prefix(country.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        Self {
            bar,
            counting: style(EVENTS_TEMPLATE),
            on_finish: OnFinish::Clear,
        }
    }

    /// Bar over the countries of one indicator's batch.
    #[must_use]
    pub fn countries_bar(
        multi: &MultiProgress,
        indicator: &str,
        total: u64,
    ) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::countries(multi, indicator, total))
    }

    /// Bar over one country's hazard events. Spins while the event set is
    /// fetched and starts counting on `set_total()`.
    #[must_use]
    pub fn events_bar(multi: &MultiProgress, country: &str) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::events(multi, country))
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.disable_steady_tick();
        self.bar.set_style(self.counting.clone());
        self.bar.set_length(total);
        self.bar.set_position(0);
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        match self.on_finish {
            OnFinish::Keep => self.bar.finish_with_message(msg),
            OnFinish::Clear => {
                self.bar.finish_and_clear();
                log::debug!("{msg}");
            }
        }
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge`.
///
/// Logs at `info` unless `RUST_LOG` says otherwise; HTTP client internals
/// are held at `warn`. Returns the [`MultiProgress`] that all progress bars
/// must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("hyper_util", LevelFilter::Warn)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // already set in tests

    log::set_max_level(level);

    multi
}
