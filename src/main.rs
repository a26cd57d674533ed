// Regional Stats - CLI
// Offline ingest, synthetic samples, and quick queries against the cache/sources

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use regional_stats::sources::synthetic::BASE_YEAR;
use regional_stats::validation::split_codes;
use regional_stats::{init_tracing, Dataset, Settings, StatsService};

#[derive(Parser)]
#[command(name = "regional-stats", version, about = "Census and real-estate statistics pipeline")]
struct Cli {
    /// Cache directory (overrides settings)
    #[arg(long, global = true, env = "REGIONAL_STATS_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Secrets file
    #[arg(long, global = true, default_value = "secrets.json")]
    secrets: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum DatasetArg {
    Population,
    Realestate,
}

impl From<DatasetArg> for Dataset {
    fn from(arg: DatasetArg) -> Self {
        match arg {
            DatasetArg::Population => Dataset::Population,
            DatasetArg::Realestate => Dataset::RealEstate,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Convert a downloaded census CSV into the population cache
    Convert {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        year: i32,
    },

    /// Write synthetic population snapshots (default year 2020)
    GenerateSample {
        #[arg(long, conflicts_with = "all_years")]
        year: Option<i32>,
        /// Every census year
        #[arg(long)]
        all_years: bool,
    },

    /// List available years
    Years {
        #[arg(long, value_enum, default_value = "population")]
        dataset: DatasetArg,
    },

    /// Time series for one region code
    Series {
        code: String,
        #[arg(long, value_enum, default_value = "population")]
        dataset: DatasetArg,
    },

    /// Unit-price summary for comma-separated region codes
    Summary {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        codes: String,
        #[arg(long, value_enum, default_value = "realestate")]
        dataset: DatasetArg,
    },

    /// Show source configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.secrets);
    if let Some(dir) = cli.cache_dir {
        settings = settings.with_cache_dir(dir);
    }
    settings.log_status();

    let service = StatsService::from_settings(settings).context("Failed to build service")?;

    match cli.command {
        Command::Convert { csv, year } => run_convert(&service, &csv, year),
        Command::GenerateSample { year, all_years } => run_generate(&service, year, all_years),
        Command::Years { dataset } => {
            let years = service.available_years(dataset.into())?;
            println!("{:?}", years);
            Ok(())
        }
        Command::Series { code, dataset } => {
            let series = service.time_series(dataset.into(), &code).await?;
            println!("📈 {} {} ({})", series.prefecture, series.municipality, series.code);
            for point in &series.points {
                println!("   {}: {}", point.year, point.value);
            }
            if series.contains_synthetic {
                println!("   ⚠️  includes synthetic placeholder data");
            }
            Ok(())
        }
        Command::Summary { year, codes, dataset } => {
            let codes = split_codes(&codes);
            let stats = service.summary(dataset.into(), year, &codes).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Command::Status => {
            for status in service.source_status() {
                let mark = if status.configured { "✓" } else { "✗" };
                println!("{} {} ({})", mark, status.name, status.dataset.name());
            }
            println!("Synthetic data: {:?}", service.settings().synthetic_mode);
            Ok(())
        }
    }
}

fn run_convert(service: &StatsService, csv: &Path, year: i32) -> Result<()> {
    println!("📂 Converting {} for {}", csv.display(), year);
    let report = service.import_census_file(csv, year)?;
    println!("✓ {}", report.summary());
    if report.confidence == regional_stats::EncodingConfidence::Degraded {
        println!("⚠️  Encoding could not be detected exactly; some characters were replaced");
    }
    Ok(())
}

/// Years to write: every census year, the given one, or the base year
fn sample_years(year: Option<i32>, all_years: bool, census_years: Vec<i32>) -> Vec<i32> {
    if all_years {
        census_years
    } else {
        vec![year.unwrap_or(BASE_YEAR)]
    }
}

fn run_generate(service: &StatsService, year: Option<i32>, all_years: bool) -> Result<()> {
    for year in sample_years(year, all_years, service.settings().census_years()) {
        let count = service.write_synthetic_population(year)?;
        println!("✓ {}: {} synthetic records written", year, count);
    }
    Ok(())
}
