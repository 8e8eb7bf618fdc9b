//! Run command - extract a directory of invoices and export the batch.

use std::env;
use std::path::PathBuf;
use std::time::Instant;

use chrono::Local;
use clap::{Args, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use facturai_core::{
    ExportFormat, Exporter, ExtractionGateway, FacturaiConfig, GeminiGateway, MockGateway,
    MockResponseSet, Normalizer, Pipeline, RecordStatus, build_requests,
};

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Directory containing invoice PDFs
    #[arg(short, long)]
    input_dir: Option<PathBuf>,

    /// Directory the export is written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Replay extraction responses from a JSON array file instead of calling the service
    #[arg(long, value_name = "FILE")]
    mock: Option<PathBuf>,

    /// Export format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Number of extractions in flight
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Model identifier for the extraction service
    #[arg(long)]
    model: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Descend into sub-directories of the input directory
    #[arg(short, long)]
    recursive: bool,
}

/// Export format.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// One row per line item
    Csv,
    /// Array of records
    Json,
}

impl From<OutputFormat> for ExportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Csv => ExportFormat::Csv,
            OutputFormat::Json => ExportFormat::Json,
        }
    }
}

impl RunArgs {
    /// Flags take precedence over file values.
    fn apply(&self, config: &mut FacturaiConfig) {
        if let Some(dir) = &self.input_dir {
            config.input.dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.export.dir = dir.clone();
        }
        if let Some(format) = self.format {
            config.export.format = format.into();
        }
        if let Some(jobs) = self.jobs {
            config.gateway.jobs = jobs;
        }
        if let Some(model) = &self.model {
            config.gateway.model = model.clone();
        }
        if let Some(timeout) = self.timeout {
            config.gateway.timeout_secs = timeout;
        }
        if self.recursive {
            config.input.recursive = true;
        }
    }
}

pub async fn run(args: RunArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let started_at = Local::now();

    let mut config = super::config::load(config_path)?;
    args.apply(&mut config);
    config.validate()?;

    let gateway = create_gateway(&args, &config)?;

    let requests = build_requests(&config.input.dir, &config.input)?;
    if requests.is_empty() {
        println!(
            "{} No invoices found in {}",
            style("⚠").yellow(),
            config.input.dir.display()
        );
    } else {
        println!(
            "{} Found {} invoices in {}",
            style("ℹ").blue(),
            requests.len(),
            config.input.dir.display()
        );
    }

    let pb = ProgressBar::new(requests.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let pipeline = Pipeline::new(gateway, Normalizer::from_config(&config.normalize))
        .with_jobs(config.gateway.jobs);
    let outcome = pipeline
        .run(requests, |record| {
            pb.set_message(record.source_file.clone());
            pb.inc(1);
        })
        .await;
    pb.finish_and_clear();

    let exporter = Exporter::from_config(&config.export);
    let export_path = exporter.export(&outcome.records, &config.export.dir, &started_at)?;
    debug!("Export written to {}", export_path.display());

    let stats = outcome.stats;
    println!();
    println!(
        "{} Processed {} invoices in {:?}",
        style("✓").green(),
        stats.total,
        start.elapsed()
    );
    println!(
        "   {} ok, {} with warnings, {} failed",
        style(stats.ok).green(),
        style(stats.with_warnings).yellow(),
        style(stats.failed).red()
    );

    let without_amounts = outcome
        .records
        .iter()
        .filter(|r| r.status != RecordStatus::Failed && !r.has_financials())
        .count();
    if without_amounts > 0 {
        println!(
            "   {} extracted without any amounts",
            style(without_amounts).yellow()
        );
    }

    let failed: Vec<_> = outcome
        .records
        .iter()
        .filter(|r| r.status == RecordStatus::Failed)
        .collect();
    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for record in failed {
            println!("  - {}: {}", record.source_file, record.error);
        }
    }

    if !outcome.issues.is_empty() {
        println!();
        println!("{}", style("Batch issues:").yellow());
        for issue in &outcome.issues {
            println!("  - {}", issue);
        }
    }

    println!();
    println!(
        "{} Exported to {}",
        style("✓").green(),
        export_path.display()
    );

    Ok(())
}

fn create_gateway(
    args: &RunArgs,
    config: &FacturaiConfig,
) -> anyhow::Result<Box<dyn ExtractionGateway>> {
    if let Some(path) = &args.mock {
        let responses = MockResponseSet::from_file(path)?;
        println!(
            "{} Mock mode: {} responses from {}",
            style("ℹ").blue(),
            responses.len(),
            path.display()
        );
        return Ok(Box::new(MockGateway::new(responses)));
    }

    let key_var = &config.gateway.api_key_env;
    let api_key = env::var(key_var)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "{} is not set. Export your API key or use --mock <FILE>.",
                key_var
            )
        })?;

    let gateway = GeminiGateway::new(&config.gateway, api_key)?;
    println!(
        "{} Live mode: {}",
        style("ℹ").blue(),
        config.gateway.model
    );
    Ok(Box::new(gateway))
}
