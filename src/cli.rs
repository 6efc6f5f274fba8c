use crate::app::{build_orchestrator, ZoneResolver};
use crate::config::{Config, ZoneConfig};
use crate::datasources::OpenMeteoClient;
use crate::db::Database;
use crate::logic::quality::quality_report;
use crate::logic::{CacheStore, DataOrigin, FetchState};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cacaowatch",
    version,
    about = "Weather suitability dashboard for Ecuadorian cacao zones"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config.yaml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override SQLite data directory
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Re-run interactive setup
    Init,
    /// Validate config and test the weather provider
    Check,
    /// Print the quality index for a zone
    Report {
        /// Zone key or part of its name (defaults to the last selected zone)
        #[arg(conflicts_with = "place")]
        zone: Option<String>,
        /// Search any place by name instead of a configured zone
        #[arg(long, value_name = "TEXT")]
        place: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Drop every cached weather snapshot
    ClearCache,
}

impl Cli {
    /// Filter directive for `-v` flags; `RUST_LOG` takes precedence.
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "cacaowatch=debug,warn",
            _ => "cacaowatch=trace,info",
        }
    }
}

pub fn run_init() -> anyhow::Result<()> {
    let (_, path) = Config::setup_interactive()?;
    println!("Run `cacaowatch check` to verify {}", path.display());
    Ok(())
}

pub async fn run_check(config: &Config, db: &Database) -> anyhow::Result<()> {
    config.validate()?;
    println!("Config OK: {} zones", config.zones.len());

    let Some(target) = config.zones.iter().find_map(ZoneConfig::coordinates) else {
        bail!("no zone with coordinates to test the provider against");
    };

    let client = OpenMeteoClient::new(config.provider.clone())?;
    if client.test_connection(target).await {
        println!("Open-Meteo ({}): OK", config.provider.base_url);
    } else {
        println!("Open-Meteo ({}): OFFLINE", config.provider.base_url);
    }

    match &config.geocoding {
        Some(_) => println!("Geocoding: configured"),
        None => println!("Geocoding: not configured"),
    }

    let cached = db.cached_zones()?;
    println!("Cache: {} zones in {}", cached.len(), db.path().display());
    for (key, fetched_at) in cached {
        println!(
            "  {:<24} {}",
            key,
            fetched_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}

pub fn run_clear_cache(db: &Database) -> anyhow::Result<()> {
    let removed = CacheStore::clear(db)?;
    println!("Removed {} cached snapshots from {}", removed, db.path().display());
    Ok(())
}

/// Find a zone by exact key, then by case-insensitive name fragment.
pub fn find_zone<'a>(config: &'a Config, query: &str) -> Option<&'a ZoneConfig> {
    config.find_zone(query).or_else(|| {
        let needle = query.to_lowercase();
        config
            .zones
            .iter()
            .find(|z| z.name.to_lowercase().contains(&needle))
    })
}

/// What `report` should score.
pub enum ReportTarget<'a> {
    /// A configured zone by key or name fragment; `None` means the last one used
    Zone(Option<&'a str>),
    /// Free-text geocoded place
    Place(&'a str),
}

#[derive(Serialize)]
struct JsonReport<'a> {
    zone: &'a str,
    fetched_at: chrono::DateTime<chrono::Utc>,
    origin: &'static str,
    warning: Option<String>,
    report: crate::models::QualityReport,
}

pub async fn run_report(
    config: &Config,
    db: &Database,
    target: ReportTarget<'_>,
    json: bool,
) -> anyhow::Result<()> {
    let mut resolver = ZoneResolver::new(config)?;
    let zone = match target {
        ReportTarget::Place(text) => resolver.search(text).await?,
        ReportTarget::Zone(query) => {
            let zone_config = match query {
                Some(q) => find_zone(config, q).with_context(|| format!("unknown zone '{}'", q))?,
                None => {
                    let remembered = db.last_zone()?;
                    remembered
                        .as_deref()
                        .or(config.default_zone.as_deref())
                        .and_then(|key| config.find_zone(key))
                        .or_else(|| config.zones.first())
                        .context("no zones configured")?
                }
            };
            resolver.resolve(zone_config).await?
        }
    };
    let orchestrator = build_orchestrator(config, db)?;

    match orchestrator.select(Some(zone)).await {
        FetchState::Ready {
            zone,
            snapshot,
            fetched_at,
            origin,
            warning,
        } => {
            let report = quality_report(&snapshot);
            if json {
                let out = JsonReport {
                    zone: &zone.key,
                    fetched_at,
                    origin: origin.as_str(),
                    warning: warning.map(|w| w.to_string()),
                    report,
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }

            if let Some(w) = &warning {
                eprintln!("warning: {}", w);
            }
            println!("{}", zone.display_name());
            println!(
                "Datos: {} ({})",
                fetched_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
                if origin == DataOrigin::Network { "nuevos" } else { origin.as_str() }
            );
            println!();
            println!("Índice de calidad: {} ({})", report.overall, report.rating);
            println!();
            println!("{:<20} {:>12} {:>14} {:>5} {:>7}", "Métrica", "Valor", "Óptimo", "Peso", "Puntaje");
            for m in &report.metrics {
                println!(
                    "{:<20} {:>12} {:>14} {:>4.0}% {:>7}",
                    m.label,
                    format!("{:.1} {}", m.value, m.unit),
                    m.optimal.to_string(),
                    m.weight * 100.0,
                    m.score
                );
            }
            for id in &report.missing {
                println!("{:<20} {:>12}", id.as_str(), "N/A");
            }
            Ok(())
        }
        FetchState::Failed { error, .. } => bail!(error),
        other => bail!("unexpected fetch state: {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_report_subcommand() {
        let cli = Cli::parse_from(["cacaowatch", "-vv", "report", "mera", "--json"]);
        assert_eq!(cli.verbose, 2);
        match &cli.command {
            Some(Commands::Report { zone, place, json }) => {
                assert_eq!(zone.as_deref(), Some("mera"));
                assert_eq!(place.as_deref(), None);
                assert!(*json);
            }
            _ => panic!("expected report"),
        }
        assert_eq!(cli.log_directive(), "cacaowatch=trace,info");
    }

    #[test]
    fn report_place_excludes_zone() {
        let cli = Cli::parse_from(["cacaowatch", "report", "--place", "Quevedo, Los Ríos"]);
        match &cli.command {
            Some(Commands::Report { zone, place, .. }) => {
                assert!(zone.is_none());
                assert_eq!(place.as_deref(), Some("Quevedo, Los Ríos"));
            }
            _ => panic!("expected report"),
        }

        assert!(Cli::try_parse_from(["cacaowatch", "report", "mera", "--place", "quevedo"]).is_err());
    }

    #[tokio::test]
    async fn report_place_rejects_short_query() {
        let config = Config {
            geocoding: Some(crate::config::GeocodingConfig {
                api_key: "k".into(),
                // Never contacted: the query is refused before any request
                base_url: "http://127.0.0.1:9".into(),
            }),
            ..Config::default()
        };
        let db = Database::open_in_memory().unwrap();
        let err = run_report(&config, &db, ReportTarget::Place("ab"), true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("at least 3"));
    }

    #[test]
    fn no_subcommand_runs_tui() {
        let cli = Cli::parse_from(["cacaowatch", "--data-dir", "/tmp/cw"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/cw")));
        assert_eq!(cli.log_directive(), "warn");
    }

    #[test]
    fn find_zone_by_key_or_name() {
        let config = Config::default();
        assert_eq!(find_zone(&config, "mera,pastaza").unwrap().key, "mera,pastaza");
        assert_eq!(find_zone(&config, "naranjal").unwrap().key, "naranjal,guayas");
        assert_eq!(find_zone(&config, "MANABÍ").unwrap().key, "jipijapa,manabi");
        assert!(find_zone(&config, "quito").is_none());
    }
}
