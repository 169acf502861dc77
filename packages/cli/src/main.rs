#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch runner for the CLIMADA to HDX indicator pipeline.
//!
//! Uses `indicatif-log-bridge` (via [`climada_hdx_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod config;
mod pipeline;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use climada_hdx_aggregate::shim::DateShim;
use climada_hdx_cli_utils::IndicatifProgress;
use climada_hdx_geography::natural_earth::NaturalEarthProvider;
use climada_hdx_geography::unmap::UnmapProvider;
use climada_hdx_geography::{ProviderChain, download};
use climada_hdx_geography_models::countries::{COUNTRIES, Country, resolve};
use climada_hdx_indicator_models::Indicator;
use climada_hdx_indicator_models::policy::{FLOOD_DATE_SHIM_COUNTRIES, known_no_data};
use climada_hdx_publish::hdx::{HdxClient, publish_indicator};
use climada_hdx_publish::incremental::countries_to_process;
use climada_hdx_publish::paths::OutputPaths;
use climada_hdx_source::climada::{ClimadaClient, format_property_values, property_values};
use climada_hdx_source::file::FileSource;
use climada_hdx_source::retry::build_client;

use crate::config::Config;
use crate::pipeline::{Pipeline, RunOptions};

#[derive(Parser)]
#[command(name = "climada_hdx", about = "CLIMADA hazard and exposure indicators for HDX")]
struct Cli {
    /// Config file (default: `climada_hdx.toml` in the working directory)
    #[arg(long, global = true, env = "CLIMADA_HDX_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List CLIMADA data types, or describe one
    Info {
        /// Data type to describe (e.g., "`river_flood`")
        #[arg(long)]
        data_type: Option<String>,
        /// Only count datasets with this property value, as `key=value`.
        /// May be repeated.
        #[arg(long = "property")]
        properties: Vec<String>,
    },
    /// List countries, or those still needing a run for an indicator
    Countries {
        /// Indicator to check existing output for
        #[arg(long)]
        indicator: Option<Indicator>,
    },
    /// Compute indicator files for a batch of countries
    Run {
        /// Indicator to compute (e.g., "earthquake", "crop-production")
        #[arg(long)]
        indicator: Indicator,
        /// Comma-separated country names or ISO3 codes. Defaults to every
        /// country that still needs processing.
        #[arg(long)]
        countries: Option<String>,
        /// Process countries even if their output already exists
        #[arg(long)]
        force: bool,
        /// Stop each hazard timeseries after its first event
        #[arg(long)]
        test_run: bool,
    },
    /// Create or update an indicator's dataset on HDX
    Publish {
        /// Indicator whose dataset to publish
        #[arg(long)]
        indicator: Indicator,
        /// Compute everything but write nothing to HDX
        #[arg(long)]
        dry_run: bool,
    },
    /// Download the UNMAP admin boundary files from HDX
    Boundaries,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = climada_hdx_cli_utils::init_logger();
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Info {
            data_type,
            properties,
        } => info(&config, data_type.as_deref(), &properties).await?,
        Commands::Countries { indicator } => list_countries(&config, indicator)?,
        Commands::Run {
            indicator,
            countries,
            force,
            test_run,
        } => {
            let countries = match countries {
                Some(list) => parse_countries(&list)?,
                None => countries_to_process(&OutputPaths::new(&config.output_dir), indicator, force)?,
            };
            run(&config, &multi, indicator, &countries, test_run).await?;
        }
        Commands::Publish { indicator, dry_run } => {
            let client = build_client(&config.user_agent, config.request_timeout())?;
            let api_key = std::env::var("HDX_API_KEY").ok();
            let hdx = HdxClient::new(client, &config.hdx_url, api_key, dry_run)?;
            let report = publish_indicator(
                &hdx,
                indicator,
                &OutputPaths::new(&config.output_dir),
                COUNTRIES,
                &config.hdx_owner_org,
            )
            .await?;
            log::info!(
                "{}: {} resources{}",
                report.dataset,
                report.resources,
                if report.dry_run { " (dry run)" } else { "" }
            );
        }
        Commands::Boundaries => {
            let client = build_client(&config.user_agent, config.request_timeout())?;
            let written =
                download::download_boundaries(&client, &config.hdx_url, &config.boundary_dir)
                    .await?;
            log::info!(
                "{} boundary files downloaded to {}",
                written.len(),
                config.boundary_dir.display()
            );
        }
    }

    Ok(())
}

fn parse_countries(list: &str) -> Result<Vec<&'static Country>, String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| resolve(s).ok_or_else(|| format!("Unknown country: {s}")))
        .collect()
}

#[allow(clippy::future_not_send)]
async fn run(
    config: &Config,
    multi: &climada_hdx_cli_utils::MultiProgress,
    indicator: Indicator,
    countries: &[&'static Country],
    test_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if countries.is_empty() {
        log::info!("{indicator}: nothing to do");
        return Ok(());
    }

    let shim = match &config.flood_date_table {
        Some(path) if indicator == Indicator::Flood => Some(DateShim::load(path)?),
        _ => None,
    };
    if indicator == Indicator::Flood && shim.is_none() {
        log::warn!(
            "No flood_date_table configured; {} will fail",
            FLOOD_DATE_SHIM_COUNTRIES.join(", ")
        );
    }

    let source = FileSource::new(&config.source_dir);
    let chain = ProviderChain::new(vec![
        Box::new(UnmapProvider::new(&config.boundary_dir)),
        Box::new(NaturalEarthProvider::new(&config.natural_earth_path)),
    ]);
    let pipeline = Pipeline {
        source: &source,
        boundaries: &chain,
        paths: OutputPaths::new(&config.output_dir),
        shim,
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Ctrl-C received, stopping after the current country");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let countries_bar = IndicatifProgress::countries_bar(multi, indicator.as_ref(), countries.len() as u64);
    let events_bar = |country: &Country| IndicatifProgress::events_bar(multi, country.name);

    let report = pipeline
        .run_batch(
            countries,
            RunOptions {
                indicator,
                test_run,
            },
            &cancel,
            countries_bar.as_ref(),
            &events_bar,
        )
        .await;

    for (country, status) in &report.countries {
        log::info!("{country}: {status}");
    }
    if report.has_fatal() {
        let failed = report.count(pipeline::CountryStatus::is_fatal);
        return Err(format!("{failed} of {} countries failed", report.countries.len()).into());
    }
    Ok(())
}

fn list_countries(
    config: &Config,
    indicator: Option<Indicator>,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(indicator) = indicator else {
        println!("{:<26} {:<5} NUMERIC", "NAME", "ISO3");
        println!("{}", "-".repeat(42));
        for country in COUNTRIES {
            println!("{:<26} {:<5} {}", country.name, country.iso3, country.iso_numeric);
        }
        return Ok(());
    };

    let pending = countries_to_process(&OutputPaths::new(&config.output_dir), indicator, false)?;
    println!("{indicator}: {} countries to process", pending.len());
    for country in &pending {
        println!("  {}", country.name);
    }
    let excluded = known_no_data(indicator);
    if !excluded.is_empty() {
        println!("Known to have no data: {}", excluded.join(", "));
    }
    Ok(())
}

async fn info(
    config: &Config,
    data_type: Option<&str>,
    properties: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let client = build_client(&config.user_agent, config.request_timeout())?;
    let climada = ClimadaClient::new(client, &config.climada_api_url);
    let data_types = climada.data_types().await?;

    let Some(data_type) = data_type else {
        println!("{:<24} GROUP", "DATA TYPE");
        println!("{}", "-".repeat(40));
        for info in &data_types {
            println!("{:<24} {}", info.data_type, info.data_type_group);
        }
        return Ok(());
    };

    let info = data_types
        .iter()
        .find(|d| d.data_type == data_type)
        .ok_or_else(|| format!("Unknown data type: {data_type}"))?;

    let known: BTreeMap<String, String> = properties
        .iter()
        .map(|p| {
            p.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| format!("Expected key=value, got {p}"))
        })
        .collect::<Result<_, _>>()?;

    println!("{} ({})", info.data_type, info.data_type_group);
    println!("{}", info.description);
    println!();
    println!("Properties:");
    for property in &info.properties {
        let mandatory = if property.mandatory { "*" } else { " " };
        println!("  {mandatory} {}: {}", property.property, property.description);
    }

    let datasets = climada.datasets(data_type).await?;
    println!();
    println!("Values over {} datasets:", datasets.len());
    for (property, values) in property_values(&datasets, &known) {
        println!("  {}", format_property_values(&property, &values));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_country_lists() {
        let countries = parse_countries("Haiti, SDN,,State of Palestine").unwrap();
        let names: Vec<&str> = countries.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Haiti", "Sudan", "State of Palestine"]);
        assert!(parse_countries("Atlantis").is_err());
    }

    #[test]
    fn indicator_argument_is_kebab_case() {
        let cli = Cli::try_parse_from([
            "climada_hdx",
            "run",
            "--indicator",
            "tropical-cyclone",
            "--test-run",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Run {
                indicator: Indicator::TropicalCyclone,
                test_run: true,
                force: false,
                ..
            }
        ));
    }
}
