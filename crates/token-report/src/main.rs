//! token-report - Usage-billing report generator

mod cli;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use token_report_core::config::default_config_path;
use token_report_core::{
    export_usage_to_json, load_config, render_report, save_report, ApiClient, DateRange,
    PartialConfig, ReportError, StatsSummary, UsageBreakdown,
};

#[derive(Parser)]
#[command(
    name = "token-report",
    version,
    about = "Fetch API usage for a date range and render it as an HTML report",
    long_about = "Logs in to the usage-billing API, downloads usage statistics and every usage\n\
                  record for a date range, and writes a self-contained HTML report with\n\
                  per-model and per-API-key breakdowns.\n\
                  \n\
                  Examples:\n\
                    token-report                                     # Last 7 days\n\
                    token-report --start 2026-02-01 --end 2026-02-27 # Explicit range\n\
                    token-report --days 30                           # Last 30 days\n\
                    token-report --output my-report.html --open      # Custom path, open in browser\n\
                    token-report save-config                         # Store credentials\n\
                  \n\
                  Environment Variables:\n\
                    TOKEN_REPORT_EMAIL       Email for authentication\n\
                    TOKEN_REPORT_PASSWORD    Password for authentication\n\
                    TOKEN_REPORT_BASE_URL    API base URL [default: https://subus.imds.ai]\n\
                    TOKEN_REPORT_TIMEZONE    Timezone [default: Asia/Shanghai]\n\
                  \n\
                  Configuration File:\n\
                    ~/.token-report.json     JSON with email, password, baseUrl, timezone"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Start date (YYYY-MM-DD) [default: `--days` ago]
    #[arg(long, short = 's')]
    start: Option<NaiveDate>,

    /// End date (YYYY-MM-DD) [default: today]
    #[arg(long, short = 'e')]
    end: Option<NaiveDate>,

    /// Number of days to look back when --start is not given
    #[arg(long, short = 'd', default_value = "7")]
    days: u32,

    /// Output HTML file path
    #[arg(long, short = 'o', default_value = "token-report.html")]
    output: PathBuf,

    /// Also write stats, breakdowns and raw records as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Open the report in the default browser when done
    #[arg(long)]
    open: bool,

    /// Skip the terminal summary tables
    #[arg(long)]
    no_summary: bool,

    /// Path to the credentials file (default: ~/.token-report.json)
    #[arg(long, env = "TOKEN_REPORT_CONFIG")]
    config: Option<PathBuf>,

    /// API base URL (overrides env and config file)
    #[arg(long)]
    base_url: Option<String>,

    /// Login email (overrides env and config file)
    #[arg(long)]
    email: Option<String>,

    /// IANA timezone sent to the API (overrides env and config file)
    #[arg(long)]
    timezone: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Disable ANSI colors (log-friendly)
    #[arg(long, env = "TOKEN_REPORT_NO_COLOR")]
    no_color: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the current configuration and save it to the credentials file
    SaveConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!();
        eprintln!("Error: {:#}", e);
        if e
            .downcast_ref::<ReportError>()
            .is_some_and(ReportError::is_credentials_problem)
        {
            eprintln!("Hint: check TOKEN_REPORT_EMAIL / TOKEN_REPORT_PASSWORD or ~/.token-report.json");
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose {
        "token_report=debug,token_report_core=debug"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().or_else(default_config_path);
    let overrides = PartialConfig {
        base_url: cli.base_url.clone(),
        email: cli.email.clone(),
        password: None,
        timezone: cli.timezone.clone(),
    };

    match cli.command {
        Some(Command::SaveConfig) => run_save_config(overrides, config_path),
        None => run_report(&cli, overrides, config_path.as_deref()).await,
    }
}

fn run_save_config(overrides: PartialConfig, config_path: Option<PathBuf>) -> Result<()> {
    let path = config_path.context("Could not determine home directory for config file")?;
    let config = load_config(overrides, Some(&path))?;
    config.save(&path)?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

async fn run_report(cli: &Cli, overrides: PartialConfig, config_path: Option<&Path>) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    let today = chrono::Local::now().date_naive();
    let range = DateRange::resolve(cli.start, cli.end, cli.days, today)?;

    println!("Token Usage Report");
    println!("Date range: {}", range);
    println!();

    let config = load_config(overrides, config_path)?;
    tracing::debug!(?config, "Resolved configuration");

    let mut client = ApiClient::new(config)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .context("Invalid progress template")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    spinner.set_message("Authenticating...");
    client.login().await?;
    spinner.println("✓ Authenticated");

    spinner.set_message("Fetching usage statistics...");
    let stats_response = client.fetch_stats(&range).await?;
    let stats = StatsSummary::from_response(&stats_response);

    spinner.set_message("Fetching usage records...");
    let mut on_progress = |fetched: usize, total: Option<u64>| match total {
        Some(total) => spinner.set_message(format!("Fetched {} / {} records", fetched, total)),
        None => spinner.set_message(format!("Fetched {} records", fetched)),
    };
    let fetched = client
        .fetch_all_usage(&range, Some(&mut on_progress))
        .await?;
    spinner.finish_with_message(format!(
        "✓ Fetched {} records ({} pages)",
        fetched.records.len(),
        fetched.pages
    ));

    let breakdown = UsageBreakdown::from_records(&fetched.records);
    let html = render_report(
        &stats,
        &breakdown,
        fetched.records.len(),
        &range,
        chrono::Local::now().naive_local(),
    )?;

    let output_path = std::path::absolute(&cli.output).unwrap_or_else(|_| cli.output.clone());
    save_report(&html, &output_path)?;

    if let Some(json_path) = &cli.json {
        export_usage_to_json(&stats, &breakdown, &fetched.records, &range, json_path)?;
        println!("Raw usage written to {}", json_path.display());
    }

    if !cli.no_summary {
        println!();
        println!("{}", cli::format_summary(&stats, fetched.records.len()));
        println!();
        println!("{}", cli::format_model_table(&breakdown, cli.no_color));
        println!("{}", cli::format_key_table(&breakdown, cli.no_color));
    }

    println!();
    println!("Report generated: {}", output_path.display());

    if cli.open {
        if let Err(e) = open::that(&output_path) {
            tracing::warn!(error = %e, "Could not open report in browser");
        }
    }

    Ok(())
}
