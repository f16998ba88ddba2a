use anyhow::{bail, Context, Result};
use azure_carbon::azure::client::AzureClient;
use azure_carbon::azure::error::CarbonError;
use azure_carbon::azure::http::format_azure_error;
use azure_carbon::azure::scope::Scope;
use azure_carbon::carbon::{CarbonQuery, CarbonRetriever, Timeframe};
use azure_carbon::config::Config;
use azure_carbon::output::{write_items, OutputFormat};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, ValueEnum};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use uuid::Uuid;

/// Version injected at compile time via AZURE_CARBON_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("AZURE_CARBON_VERSION") {
    Some(v) => v,
    None => "dev",
};

/// Per-resource carbon emissions for an Azure subscription
#[derive(Parser, Debug)]
#[command(name = "azure-carbon", version, about, long_about = None)]
struct Args {
    /// Subscription to query (defaults to config, AZURE_SUBSCRIPTION_ID, then `az account show`)
    #[arg(short, long)]
    subscription: Option<Uuid>,

    /// Restrict the query to one resource group
    #[arg(short = 'g', long)]
    resource_group: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// JMESPath query applied to json output
    #[arg(long)]
    query: Option<String>,

    /// Reporting period
    #[arg(short, long, value_enum, default_value = "month")]
    timeframe: TimeframeMode,

    /// Year of the reported month
    #[arg(long)]
    year: Option<i32>,

    /// Reported month (1-12)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    month: Option<u32>,

    /// First day of a custom range (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day of a custom range (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Filter as name=value1;value2 (repeatable; dimension names or tag keys)
    #[arg(long = "filter")]
    filters: Vec<String>,

    /// Rows per emissions page
    #[arg(long)]
    page_size: Option<u32>,

    /// Omit the header line in table, text, markdown and csv output
    #[arg(long)]
    skip_header: bool,

    /// Management API base address
    #[arg(long)]
    carbon_api_address: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TimeframeMode {
    Month,
    Custom,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&PathBuf>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let (non_blocking, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("azure-carbon {} started with log level: {:?}", VERSION, level);

    Ok(Some(guard))
}

fn resolve_timeframe(args: &Args, today: NaiveDate) -> Result<Timeframe> {
    match args.timeframe {
        TimeframeMode::Custom => {
            let (Some(from), Some(to)) = (args.from, args.to) else {
                bail!("--timeframe custom requires both --from and --to");
            };
            Timeframe::custom(from, to)
                .with_context(|| format!("--from {} is after --to {}", from, to))
        }
        TimeframeMode::Month => {
            if args.from.is_some() || args.to.is_some() {
                bail!("--from and --to require --timeframe custom");
            }

            let previous = Timeframe::previous_month(today);
            let Timeframe::Month(default) = previous else {
                return Ok(previous);
            };
            if args.year.is_none() && args.month.is_none() {
                return Ok(previous);
            }

            let year = args.year.unwrap_or(default.year());
            let month = args.month.unwrap_or(default.month());
            Timeframe::month(year, month)
                .with_context(|| format!("Invalid month {}-{:02}", year, month))
        }
    }
}

/// Compile `--query`, which only applies to json output
fn compile_query(args: &Args) -> Result<Option<jmespath::Expression<'static>>> {
    let Some(query) = args.query.as_deref() else {
        return Ok(None);
    };
    if args.output != OutputFormat::Json {
        bail!("--query requires --output json");
    }
    let expression = jmespath::compile(query)
        .map_err(|e| anyhow::anyhow!("Invalid --query expression: {}", e))?;
    Ok(Some(expression))
}

async fn run(args: &Args) -> Result<()> {
    let config = Config::load();
    let timeframe = resolve_timeframe(args, Utc::now().date_naive())?;
    let output_query = compile_query(args)?;

    let Some(subscription_id) = config.effective_subscription(args.subscription).await else {
        bail!(
            "No Azure subscription configured. Use --subscription, set AZURE_SUBSCRIPTION_ID or run 'az login'"
        );
    };

    let scope = match args.resource_group.as_deref() {
        Some(rg) if !rg.trim().is_empty() => Scope::resource_group(subscription_id, rg.trim()),
        Some(_) => bail!("--resource-group must not be empty"),
        None => Scope::subscription(subscription_id),
    };

    let address = config.effective_api_address(args.carbon_api_address.as_deref());
    tracing::info!("Using scope {} against {}", scope, address);

    let client = AzureClient::new(&address, config.retry_policy())?;
    let retriever = CarbonRetriever::new(client);

    let query = CarbonQuery {
        scope,
        timeframe,
        filters: args.filters.clone(),
        page_size: config.effective_page_size(args.page_size),
    };

    let items = retriever.retrieve_carbon_for_resources(&query).await?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_items(
        &mut out,
        &items,
        args.output,
        args.skip_header,
        output_query.as_ref(),
    )
    .context("Failed to write output")?;
    out.flush()?;

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_guard = match setup_logging(args.log_level, args.log_file.as_ref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(2);
        }
    };

    let result = run(&args).await;

    if let Err(err) = result {
        match err.downcast_ref::<CarbonError>() {
            Some(carbon_err) => {
                tracing::error!("Query failed: {:?}", carbon_err);
                eprintln!("Error: {}", format_azure_error(carbon_err));
            }
            None => eprintln!("Error: {err:#}"),
        }
        drop(log_guard);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("azure-carbon").chain(args.iter().copied())).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_is_previous_month() {
        let args = parse(&[]);
        let timeframe = resolve_timeframe(&args, date(2024, 1, 15)).unwrap();
        assert_eq!(timeframe, Timeframe::Month(date(2023, 12, 1)));
    }

    #[test]
    fn test_explicit_month() {
        let args = parse(&["--year", "2023", "--month", "6"]);
        let timeframe = resolve_timeframe(&args, date(2024, 1, 15)).unwrap();
        assert_eq!(timeframe, Timeframe::Month(date(2023, 6, 1)));
    }

    #[test]
    fn test_month_out_of_range_rejected() {
        let result = Args::try_parse_from(["azure-carbon", "--month", "13"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_requires_both_dates() {
        let args = parse(&["-t", "custom", "--from", "2024-01-01"]);
        assert!(resolve_timeframe(&args, date(2024, 3, 1)).is_err());
    }

    #[test]
    fn test_custom_rejects_reversed_range() {
        let args = parse(&["-t", "custom", "--from", "2024-02-01", "--to", "2024-01-01"]);
        assert!(resolve_timeframe(&args, date(2024, 3, 1)).is_err());
    }

    #[test]
    fn test_custom_range() {
        let args = parse(&["-t", "custom", "--from", "2024-01-01", "--to", "2024-01-31"]);
        assert_eq!(
            resolve_timeframe(&args, date(2024, 3, 1)).unwrap(),
            Timeframe::Custom {
                from: date(2024, 1, 1),
                to: date(2024, 1, 31)
            }
        );
    }

    #[test]
    fn test_repeated_filters_and_output() {
        let args = parse(&[
            "--filter",
            "ResourceType=microsoft.web/sites",
            "--filter",
            "env=prod;dev",
            "-o",
            "csv",
            "--skip-header",
        ]);
        assert_eq!(args.filters.len(), 2);
        assert_eq!(args.output, OutputFormat::Csv);
        assert!(args.skip_header);
    }

    #[test]
    fn test_table_is_default_output() {
        assert_eq!(parse(&[]).output, OutputFormat::Table);
    }

    #[test]
    fn test_query_compiles_for_json() {
        let args = parse(&["-o", "json", "--query", "[].resourceId"]);
        assert!(compile_query(&args).unwrap().is_some());
        assert!(compile_query(&parse(&[])).unwrap().is_none());
    }

    #[test]
    fn test_query_rejected_for_other_formats() {
        let args = parse(&["-o", "csv", "--query", "[].resourceId"]);
        assert!(compile_query(&args).is_err());
    }

    #[test]
    fn test_invalid_query_rejected() {
        let args = parse(&["-o", "json", "--query", "[?"]);
        assert!(compile_query(&args).is_err());
    }
}
