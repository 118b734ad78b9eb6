use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use chrono::NaiveDate;
use clap::{ArgAction, Parser};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use ghpush_core::{
    CachingGeocoder, DateRange, Geocoder, HttpArchive, HttpGeocoder, PipelineConfig, Progress,
    format_duration, format_hour_counts, format_summary_readable, get_output_path, load_config,
    run_to_file,
};

#[derive(Parser)]
#[command(name = "ghpush")]
#[command(
    about = "Extract push events from GitHub Archive hourly dumps and geocode actor locations"
)]
struct Cli {
    /// TOML config file. Defaults to $GHPUSH_CONFIG, then the user config dir.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// First archive day (YYYY-MM-DD)
    #[arg(short, long)]
    date: Option<NaiveDate>,

    /// Last archive day, inclusive. Defaults to --date.
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// First hour of each day to fetch
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..24))]
    start_hour: Option<u8>,

    /// Stop before this hour of each day
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=24))]
    end_hour: Option<u8>,

    /// Event type to keep; repeat for several. Defaults to PushEvent.
    #[arg(short = 't', long = "event-type")]
    event_types: Vec<String>,

    /// Geocode actor locations
    #[arg(long, overrides_with = "no_enrich")]
    enrich: bool,

    /// Leave geo fields at "NA" without calling the geocoder
    #[arg(long, overrides_with = "enrich")]
    no_enrich: bool,

    /// Output NDJSON file. Defaults to data/<date>-<types>.json
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Archive base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Geocoder name search URL
    #[arg(long)]
    geocoder_url: Option<String>,

    /// Abort on the first failed hour or malformed line
    #[arg(long)]
    strict: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Command line flags win over the config file
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(date) = self.date {
            config.date_range = DateRange::single(date);
        }
        if let Some(end) = self.end_date {
            config.date_range.end = Some(end);
        }
        if let Some(start) = self.start_hour {
            config.hours.start = start;
        }
        if let Some(end) = self.end_hour {
            config.hours.end = end;
        }
        if !self.event_types.is_empty() {
            config.accepted_event_types = self.event_types.clone();
        }
        if self.enrich {
            config.enrichment_enabled = true;
        } else if self.no_enrich {
            config.enrichment_enabled = false;
        }
        if let Some(output) = &self.output {
            config.output_path = Some(output.clone());
        }
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(url) = &self.geocoder_url {
            config.geocoder_url = url.clone();
        }
        if self.strict {
            config.strict = true;
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "warn,ghpush=info,ghpush_core=info",
        _ => "warn,ghpush=debug,ghpush_core=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

type Sources = (HttpArchive, Option<CachingGeocoder<HttpGeocoder>>);

/// HTTP clients for the run; the geocoder only when enrichment is on
fn build_sources(config: &PipelineConfig) -> Result<Sources, reqwest::Error> {
    let archive = HttpArchive::new(&config.base_url, config.archive_timeout())?;
    let geocoder = if config.enrichment_enabled {
        Some(CachingGeocoder::new(HttpGeocoder::new(
            &config.geocoder_url,
            config.geocoder_timeout(),
        )?))
    } else {
        None
    };
    Ok((archive, geocoder))
}

fn fail(error: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", style("Error:").red().bold(), error);
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    // Picks up GHPUSH_CONFIG / RUST_LOG from a local .env
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(cli.config.as_deref()).unwrap_or_else(|e| fail(e));
    cli.apply(&mut config);
    if let Err(e) = config.validate() {
        fail(e);
    }
    tracing::debug!(?config, "resolved configuration");

    let output = get_output_path(&config);
    let hours = config.hour_ids();

    println!(
        "\n{}  {}\n",
        style("ghpush").cyan().bold(),
        style("GitHub Archive Extractor").dim()
    );
    println!(
        "{} {} hours, keeping {}",
        style("•").dim(),
        hours.len(),
        style(config.accepted_event_types.join(", ")).yellow()
    );
    println!(
        "{} Geocoding {}",
        style("•").dim(),
        if config.enrichment_enabled {
            style("enabled").green()
        } else {
            style("disabled").dim()
        }
    );
    println!("{}", style("─".repeat(60)).dim());

    let (archive, geocoder) = build_sources(&config).unwrap_or_else(|e| fail(e));

    let mut spinner: Option<ProgressBar> = None;
    let outcome = run_to_file(
        &config,
        &archive,
        geocoder.as_ref().map(|g| g as &dyn Geocoder),
        |progress| match progress {
            Progress::HourStarted {
                location,
                index,
                total,
                ..
            } => {
                spinner = Some(create_spinner(&format!(
                    "[{}/{}] Fetching {}...",
                    index + 1,
                    total,
                    location
                )));
            }
            Progress::HourFinished {
                hour,
                summary,
                elapsed,
            } => {
                if let Some(pb) = spinner.take() {
                    pb.finish_with_message(format!(
                        "{} {}: {} {}",
                        style("✓").green().bold(),
                        hour,
                        format_hour_counts(summary),
                        style(format!("[{}]", format_duration(elapsed))).dim()
                    ));
                }
            }
            Progress::HourFailed {
                hour,
                error,
                elapsed,
            } => {
                if let Some(pb) = spinner.take() {
                    pb.finish_with_message(format!(
                        "{} {}: {} {}",
                        style("✗").red().bold(),
                        hour,
                        style(error).red(),
                        style(format!("[{}]", format_duration(elapsed))).dim()
                    ));
                }
            }
        },
    )
    .await;

    let summary = outcome.unwrap_or_else(|e| fail(e));

    println!("{}", style("─".repeat(60)).dim());
    println!("{}", format_summary_readable(&summary));
    if let Some(geocoder) = &geocoder {
        println!(
            "{} {} distinct locations looked up",
            style("•").dim(),
            geocoder.cached_places()
        );
    }
    println!(
        "{} {}\n",
        style("Saved:").dim(),
        style(output.display()).cyan()
    );

    Ok(())
}
