//! Questrunner CLI
//!
//! Runs the dashboard workflow once right away and then every day at a fixed
//! local time until interrupted.
//!
//! Usage:
//!   questrunner                    # run now, then daily at 10:00
//!   questrunner --time 07:30       # run now, then daily at 07:30
//!   questrunner --once --nosearch  # single run without the search phase

use anyhow::{Context, Result};
use chrono::{Local, NaiveTime, Timelike};
use clap::{Parser, ValueEnum};
use questrunner::config::BrowserKind;
use questrunner::RunnerConfig;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn, Level};

mod summary;

#[derive(ValueEnum, Clone, Copy, Debug)]
#[clap(rename_all = "lower")]
enum Browser {
    Edge,
    Chrome,
}

#[derive(Parser, Debug)]
#[command(name = "questrunner")]
#[command(about = "Works off the daily task lists of a rewards dashboard")]
struct Cli {
    /// Skip the desktop and mobile searches
    #[clap(long)]
    nosearch: bool,

    /// Local time of the daily run (HH:MM)
    #[clap(long, default_value = "10:00", value_parser = parse_time)]
    time: NaiveTime,

    /// Run once and exit instead of scheduling daily runs
    #[clap(long)]
    once: bool,

    /// YAML file with runner settings
    #[clap(long, short = 'c', env = "QUESTRUNNER_CONFIG")]
    config: Option<PathBuf>,

    /// Browser profile directory holding the login session
    #[clap(long, env = "QUESTRUNNER_PROFILE_DIR")]
    profile_dir: Option<PathBuf>,

    /// URL of a running WebDriver server
    #[clap(long, env = "QUESTRUNNER_WEBDRIVER_URL")]
    webdriver_url: Option<String>,

    /// WebDriver executable to start before each run
    #[clap(long, env = "QUESTRUNNER_DRIVER_PATH")]
    driver_path: Option<PathBuf>,

    #[clap(long, value_enum)]
    browser: Option<Browser>,

    #[clap(long)]
    headless: bool,

    /// Seed for waits, samples and search terms
    #[clap(long)]
    seed: Option<u64>,

    /// Print the effective configuration as YAML and exit
    #[clap(long)]
    print_config: bool,

    /// Verbose output
    #[clap(long, short)]
    verbose: bool,
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| format!("expected HH:MM, got '{value}': {e}"))
}

fn init_logging(verbose: bool) -> Result<()> {
    use tracing_appender::rolling;
    use tracing_subscriber::filter::Directive;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if verbose {
        Level::DEBUG
    } else {
        env::var("LOG_LEVEL")
            .map(|level| match level.to_lowercase().as_str() {
                "error" => Level::ERROR,
                "warn" => Level::WARN,
                "debug" => Level::DEBUG,
                _ => Level::INFO,
            })
            .unwrap_or(Level::INFO)
    };

    let log_dir = match env::var("QUESTRUNNER_LOG_DIR") {
        Ok(custom_dir) => PathBuf::from(custom_dir),
        Err(_) => dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("questrunner")
            .join("logs"),
    };
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let file_appender = rolling::daily(&log_dir, "questrunner.log");

    let filter = || -> Result<EnvFilter> {
        Ok(EnvFilter::from_default_env()
            .add_directive(log_level.into())
            .add_directive("hyper=warn".parse::<Directive>()?)
            .add_directive("reqwest=warn".parse::<Directive>()?))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter()?),
        )
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true)
                .with_filter(filter()?),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    info!(log_dir = %log_dir.display(), "logging initialized");
    Ok(())
}

fn load_config(cli: &Cli) -> Result<RunnerConfig> {
    let mut config = match &cli.config {
        Some(path) => RunnerConfig::from_yaml_file(path)?,
        None => RunnerConfig::default(),
    };
    if let Some(dir) = &cli.profile_dir {
        config.browser.profile_dir = dir.clone();
    }
    if let Some(url) = &cli.webdriver_url {
        config.browser.webdriver_url = url.clone();
    }
    if let Some(path) = &cli.driver_path {
        config.browser.driver_binary = Some(path.clone());
    }
    if let Some(browser) = cli.browser {
        config.browser.kind = match browser {
            Browser::Edge => BrowserKind::Edge,
            Browser::Chrome => BrowserKind::Chrome,
        };
    }
    if cli.headless {
        config.browser.headless = true;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    config.validate()?;
    Ok(config)
}

/// One full run. Errors are reported, never propagated: the schedule goes on.
async fn run_once(config: RunnerConfig, skip_search: bool) -> bool {
    info!(at = %Local::now().format("%Y-%m-%d %H:%M:%S"), "starting run");
    match questrunner::run_workflow(config, skip_search).await {
        Ok(run) => {
            summary::display(&run);
            run.success
        }
        Err(e) => {
            error!(error = %e, "run could not start");
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    if cli.print_config {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    init_logging(cli.verbose)?;

    let running = Arc::new(Mutex::new(()));
    let first = {
        let _guard = running.lock().await;
        run_once(config.clone(), cli.nosearch).await
    };
    if cli.once {
        std::process::exit(if first { 0 } else { 1 });
    }

    let scheduler = JobScheduler::new().await?;
    let schedule = format!("0 {} {} * * *", cli.time.minute(), cli.time.hour());
    let skip_search = cli.nosearch;
    let job = Job::new_async_tz(schedule.as_str(), Local, move |_id, _scheduler| {
        let config = config.clone();
        let running = running.clone();
        Box::pin(async move {
            // Previous run still going
            let Ok(_guard) = running.try_lock() else {
                warn!("previous run still in progress, skipping this one");
                return;
            };
            run_once(config, skip_search).await;
        })
    })
    .context("Failed to create daily job")?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    info!(time = %cli.time.format("%H:%M"), "scheduled daily run, press Ctrl+C to exit");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("shutting down");
    let mut scheduler = scheduler;
    if let Err(e) = scheduler.shutdown().await {
        warn!(error = %e, "scheduler did not shut down cleanly");
    }
    Ok(())
}
