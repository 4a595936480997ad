//! Batch processing command for multiple settlement files.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error};

use haulsheet_core::{ExtractionOutput, SettlementEngine};

use super::process::{self, csv_rows, OutputFormat, CSV_HEADER};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Settlement type hint applied to every file
    #[arg(short = 't', long = "type")]
    settlement_type: Option<String>,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
struct FileResult {
    path: PathBuf,
    output: Option<ExtractionOutput>,
    error: Option<String>,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = process::load_config(config_path)?;
    let engine = SettlementEngine::new(config);

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(ext.to_lowercase().as_str(), "txt" | "text")
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let result =
            match process::process_file(&engine, &path, args.settlement_type.as_deref()) {
                Ok(output) => FileResult {
                    path,
                    output: Some(output),
                    error: None,
                },
                Err(e) => {
                    if !args.continue_on_error {
                        pb.abandon();
                        return Err(e.context(format!("failed processing {}", path.display())));
                    }
                    error!("Failed to process {}: {}", path.display(), e);
                    FileResult {
                        path,
                        output: None,
                        error: Some(e.to_string()),
                    }
                }
            };

        if let (Some(output_dir), Some(output)) = (&args.output_dir, &result.output) {
            let stem = result
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("settlement");
            let (ext, content) = match args.format {
                OutputFormat::Json => ("json", process::format_output(output, args.format, true)?),
                OutputFormat::Csv => ("csv", process::format_output(output, args.format, false)?),
                OutputFormat::Text => ("txt", process::format_output(output, args.format, false)?),
            };
            fs::write(output_dir.join(format!("{stem}.{ext}")), content)?;
        }

        results.push(result);
        pb.inc(1);
    }
    pb.finish_with_message("done");

    if args.summary {
        write_summary_csv(&args, &results)?;
    }

    print_summary(&results);
    debug!("Batch finished in {:?}", start.elapsed());

    Ok(())
}

fn write_summary_csv(args: &BatchArgs, results: &[FileResult]) -> anyhow::Result<()> {
    let dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let path = dir.join("summary.csv");

    let mut wtr = csv::Writer::from_path(&path)?;
    wtr.write_record(CSV_HEADER)?;
    for result in results {
        if let Some(output) = &result.output {
            for row in csv_rows(output) {
                wtr.write_record(&row)?;
            }
        }
    }
    wtr.flush()?;

    println!("{} Summary written to {}", style("✓").green(), path.display());
    Ok(())
}

fn print_summary(results: &[FileResult]) {
    let succeeded = results.iter().filter(|r| r.output.is_some()).count();
    let failed = results.len() - succeeded;
    let settlements: usize = results
        .iter()
        .filter_map(|r| r.output.as_ref())
        .map(|o| o.settlements.len())
        .sum();
    let invalid = results
        .iter()
        .filter_map(|r| r.output.as_ref())
        .filter(|o| o.validation.as_ref().is_some_and(|v| !v.is_valid))
        .count();

    println!();
    println!(
        "{} Processed {} file(s): {} succeeded, {} failed, {} settlement(s) extracted",
        style("ℹ").blue(),
        results.len(),
        succeeded,
        failed,
        settlements
    );
    if invalid > 0 {
        println!(
            "{} {} file(s) failed validation",
            style("✗").red(),
            invalid
        );
    }
    for result in results.iter().filter(|r| r.error.is_some()) {
        println!(
            "  {} {}: {}",
            style("✗").red(),
            result.path.display(),
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
}
