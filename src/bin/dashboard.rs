//! CLI tool for building the project dashboard

use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use project_dashboard::{
    load_layout, normalize_layout, render_markdown, run_dashboard, write_index, DashboardConfig, DashboardError,
    DashboardReport, GitCli, Registry,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "dashboard")]
#[command(about = "Compute status badges for a portfolio of repositories and render them as a Markdown table", long_about = None)]
#[command(version)]
struct Cli {
    /// Dashboard layout (YAML) with the table columns and project categories
    layout: PathBuf,

    /// Path to settings file (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// GitHub access token; GitHub badges are only available with a token
    #[arg(long, env = "GITHUB_ACCESS_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// GitLab access token; GitLab badges are only available with a token
    #[arg(long, env = "GITLAB_ACCESS_TOKEN", hide_env_values = true)]
    gitlab_token: Option<String>,

    /// Directory for index.md and the badges/ tree
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Skip TLS certificate verification for API calls and clones
    #[arg(long)]
    insecure: bool,

    /// Stop waiting for badges after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Maximum number of badges computed at the same time
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let config = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{} Failed to load config: {}", "Error:".red().bold(), e);
            process::exit(1);
        }
    };

    let mut layout = match load_layout(&cli.layout) {
        Ok(layout) => layout,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            process::exit(1);
        }
    };
    normalize_layout(&mut layout, &config.network);

    let fetcher = Arc::new(GitCli::new(config.network.insecure_tls));
    let registry = match Registry::with_defaults(&config, fetcher) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("{} Failed to set up badge providers: {}", "Error:".red().bold(), e);
            process::exit(1);
        }
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Computing badges...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let report = run_dashboard(&layout, &registry, &config.scheduler).await;

    spinner.finish_and_clear();

    let markdown = render_markdown(&layout, &report);
    match write_index(&config.artifact_root(), &markdown) {
        Ok(path) => {
            display_summary(&report);
            println!("\nDashboard written to: {}", path.display().to_string().cyan());
        }
        Err(e) => {
            eprintln!("{} Failed to write dashboard: {}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Settings file (if any) with command line overrides applied
fn load_config(cli: &Cli) -> project_dashboard::Result<DashboardConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading settings from {}", path.display());
            DashboardConfig::from_toml_file(path)?
        }
        None => DashboardConfig::default(),
    };

    if let Some(token) = cli.github_token.clone().filter(|t| !t.is_empty()) {
        config.network.github_token = Some(token);
    }
    if let Some(token) = cli.gitlab_token.clone().filter(|t| !t.is_empty()) {
        config.network.gitlab_token = Some(token);
    }
    if let Some(output) = &cli.output {
        config.output_dir = output.clone();
    }
    if cli.insecure {
        config.network.insecure_tls = true;
    }
    if let Some(deadline) = cli.deadline_secs {
        config.scheduler.deadline_secs = deadline;
    }
    if let Some(limit) = cli.max_concurrency {
        config.scheduler.max_concurrency = Some(limit);
    }
    config.scheduler.validate().map_err(DashboardError::config)?;

    Ok(config)
}

fn display_summary(report: &DashboardReport) {
    let summary = &report.summary;

    println!("\n{}", "=== Dashboard Summary ===".bold());
    println!("Scheduled: {}", report.scheduled);
    println!("  {} {}", "●".green(), format!("Computed: {}", summary.badges).green());
    println!("  {} {}", "●".red(), format!("Errors: {}", summary.errors).red());
    println!("  {} Not applicable: {}", "●".dimmed(), summary.inapplicable);

    if report.timed_out {
        println!(
            "  {} {}",
            "●".yellow(),
            format!("Timed out: {} unfinished", report.scheduled.saturating_sub(summary.settled)).yellow()
        );
    }
}
