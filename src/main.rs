// src/main.rs
use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::{fs::File, path::PathBuf, sync::Arc};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opsdash_core::{
    aggregation::Grouping,
    config::AppConfig,
    exhaustivity::DayStatus,
    import::{read_observations_json, read_punch_csv},
    period::{MonthKey, ReportingPeriod},
    scorecard::ScorecardDefinition,
    sep_catalogue::sep_2025,
    service::AnalyticsService,
    store::{InMemoryObservationStore, InMemoryRecordStore},
};

#[derive(Parser, Debug)]
#[command(name = "opsdash", version)]
#[command(about = "Operations dashboard analytics: productivity, exhaustivity, SEP scorecard")]
struct Cli {
    /// Punch export (CSV)
    #[arg(long, global = true)]
    records: Option<PathBuf>,
    /// CSV field delimiter
    #[arg(long, global = true, default_value_t = ',')]
    delimiter: char,
    /// KPI observations (JSON array of {date, kpi_id, value})
    #[arg(long, global = true)]
    observations: Option<PathBuf>,
    /// Scorecard definition (JSON); overrides OPSDASH_SCORECARD_CONFIG_PATH
    #[arg(long, global = true)]
    scorecard: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct PeriodArgs {
    /// First day, inclusive (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,
    /// Last day, inclusive (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,
    /// Calendar month (YYYY-MM)
    #[arg(long, conflicts_with_all = ["from", "quarter", "week"])]
    month: Option<MonthKey>,
    /// Calendar quarter (YYYY-Qn)
    #[arg(long, conflicts_with_all = ["from", "week"])]
    quarter: Option<String>,
    /// ISO week (YYYY-Www)
    #[arg(long, conflicts_with = "from")]
    week: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sum/sum productivity at the requested grouping
    Productivity {
        #[command(flatten)]
        period: PeriodArgs,
        #[arg(long, default_value = "global")]
        grouping: Grouping,
    },
    /// Technicians ranked by productivity
    TopTechnicians {
        #[command(flatten)]
        period: PeriodArgs,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Productivity over the rolling window ending at a reference date
    Rolling {
        #[arg(long)]
        reference: NaiveDate,
        #[arg(long, default_value = "global")]
        grouping: Grouping,
    },
    /// Technician x day completeness matrix
    Exhaustivity {
        #[command(flatten)]
        period: PeriodArgs,
        #[arg(long)]
        team: Option<String>,
        /// Print per-technician and per-team completion rates instead of the matrix
        #[arg(long, conflicts_with = "anomalies")]
        summary: bool,
        /// Print anomalies instead of the matrix
        #[arg(long)]
        anomalies: bool,
        /// Restrict anomalies to these statuses
        #[arg(long = "status", requires = "anomalies")]
        statuses: Vec<DayStatus>,
    },
    /// Team whose trend best tracks the global trend
    Driver {
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// SEP scorecard from the observations of a period
    Scorecard {
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// Every dashboard panel at once
    Dashboard {
        #[command(flatten)]
        period: PeriodArgs,
    },
    Teams,
    Technicians {
        #[arg(long)]
        team: Option<String>,
    },
}

// --- Period Parsing ---

fn parse_quarter(raw: &str) -> Result<ReportingPeriod> {
    let (year, quarter) = raw
        .trim()
        .split_once("-Q")
        .ok_or_else(|| anyhow!("Expected a quarter like 2025-Q2, got '{}'", raw))?;
    let year: i32 = year.parse().with_context(|| format!("Invalid year in '{}'", raw))?;
    let quarter: u32 = quarter
        .parse()
        .with_context(|| format!("Invalid quarter in '{}'", raw))?;
    Ok(ReportingPeriod::quarter(year, quarter)?)
}

fn parse_week(raw: &str) -> Result<ReportingPeriod> {
    let (year, week) = raw
        .trim()
        .split_once("-W")
        .ok_or_else(|| anyhow!("Expected an ISO week like 2025-W06, got '{}'", raw))?;
    let year: i32 = year.parse().with_context(|| format!("Invalid year in '{}'", raw))?;
    let week: u32 = week.parse().with_context(|| format!("Invalid week in '{}'", raw))?;
    Ok(ReportingPeriod::iso_week(year, week)?)
}

impl PeriodArgs {
    fn resolve(&self) -> Result<Option<ReportingPeriod>> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            return Ok(Some(ReportingPeriod::new(from, to)?));
        }
        if let Some(month) = self.month {
            return Ok(Some(ReportingPeriod::for_month_key(month)?));
        }
        if let Some(quarter) = &self.quarter {
            return parse_quarter(quarter).map(Some);
        }
        if let Some(week) = &self.week {
            return parse_week(week).map(Some);
        }
        Ok(None)
    }

    fn require(&self, command: &str) -> Result<ReportingPeriod> {
        match self.resolve()? {
            Some(period) => Ok(period),
            None => bail!(
                "The {} command needs a period (--from/--to, --month, --quarter or --week)",
                command
            ),
        }
    }
}

// --- Wiring ---

fn load_scorecard(cli: &Cli, config: &AppConfig) -> Result<ScorecardDefinition> {
    match cli.scorecard.as_ref().or(config.scorecard_config_path.as_ref()) {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read scorecard file {}", path.display()))?;
            let definition = ScorecardDefinition::from_json_str(&json)
                .with_context(|| format!("Invalid scorecard file {}", path.display()))?;
            info!("Using scorecard '{}' from {}", definition.name(), path.display());
            Ok(definition)
        }
        None => sep_2025().context("Built-in SEP 2025 catalogue failed validation"),
    }
}

async fn build_service(cli: &Cli, config: &AppConfig) -> Result<AnalyticsService> {
    let records = InMemoryRecordStore::default();
    if let Some(path) = &cli.records {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let delimiter = u8::try_from(cli.delimiter)
            .map_err(|_| anyhow!("Delimiter must be a single-byte character"))?;
        let import = read_punch_csv(file, delimiter)
            .with_context(|| format!("Failed to read punch rows from {}", path.display()))?;
        records.replace_rows(import.rows).await;
    }

    let observations = InMemoryObservationStore::new();
    if let Some(path) = &cli.observations {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let entries = read_observations_json(file)
            .with_context(|| format!("Failed to read observations from {}", path.display()))?;
        observations.record_all(entries).await;
    }

    let settings = config
        .analytics_settings()
        .context("Invalid analytics settings")?;

    Ok(AnalyticsService::new(
        Arc::new(records),
        Arc::new(observations),
        Arc::new(load_scorecard(cli, config)?),
        settings,
    ))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize result")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("Failed to read OPSDASH_* configuration")?;

    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let service = build_service(&cli, &config).await?;

    match &cli.command {
        Command::Productivity { period, grouping } => {
            let period = period.resolve()?;
            print_json(&service.get_productivity(period.as_ref(), *grouping).await?)
        }
        Command::TopTechnicians { period, limit } => {
            let period = period.resolve()?;
            print_json(&service.get_top_technicians(period.as_ref(), *limit).await?)
        }
        Command::Rolling {
            reference,
            grouping,
        } => print_json(&service.get_rolling_productivity(*reference, *grouping).await?),
        Command::Exhaustivity {
            period,
            team,
            summary,
            anomalies,
            statuses,
        } => {
            let period = period.require("exhaustivity")?;
            if *anomalies {
                print_json(
                    &service
                        .get_exhaustivity_anomalies(&period, team.as_deref(), statuses)
                        .await?,
                )
            } else {
                let matrix = service
                    .get_exhaustivity_matrix(&period, team.as_deref())
                    .await?;
                if *summary {
                    print_json(&serde_json::json!({
                        "period": matrix.period,
                        "global": matrix.summary(),
                        "by_team": matrix.summary_by_team(),
                        "by_team_month": matrix.summary_by_team_month(),
                        "by_technician": matrix.summary_by_technician(),
                    }))
                } else {
                    print_json(&matrix)
                }
            }
        }
        Command::Driver { period } => {
            let period = period.resolve()?;
            print_json(&service.get_driver_team(period.as_ref()).await?)
        }
        Command::Scorecard { period } => {
            let period = period.require("scorecard")?;
            print_json(&service.scorecard_for_period(&period).await?)
        }
        Command::Dashboard { period } => {
            let period = period.resolve()?;
            print_json(&service.get_dashboard(period.as_ref()).await?)
        }
        Command::Teams => print_json(&service.list_teams().await?),
        Command::Technicians { team } => {
            print_json(&service.list_technicians(team.as_deref()).await?)
        }
    }
}
