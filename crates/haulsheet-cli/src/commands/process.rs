//! Process command - extract settlements from a single statement file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use haulsheet_core::{EngineConfig, ExtractionOutput, RawDocument, SettlementEngine};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input statement text file
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Settlement type hint (e.g. "NBM Transport LLC")
    #[arg(short = 't', long = "type")]
    settlement_type: Option<String>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output (one row per settlement)
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;
    let engine = SettlementEngine::new(config);

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let result = process_file(&engine, &args.input, args.settlement_type.as_deref())?;

    let output = format_output(&result, args.format, args.pretty)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if let Some(validation) = &result.validation {
        if !validation.is_valid {
            eprintln!(
                "{} Validation failed: {} error(s), {} warning(s)",
                style("✗").red(),
                validation.summary.error_count,
                validation.summary.warning_count
            );
        } else if validation.summary.warning_count > 0 {
            eprintln!(
                "{} Validation passed with {} warning(s)",
                style("ℹ").blue(),
                validation.summary.warning_count
            );
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

pub fn load_config(config_path: Option<&str>) -> anyhow::Result<EngineConfig> {
    Ok(if let Some(path) = config_path {
        EngineConfig::from_file(Path::new(path))?
    } else {
        EngineConfig::default()
    })
}

pub fn process_file(
    engine: &SettlementEngine,
    path: &Path,
    settlement_type: Option<&str>,
) -> anyhow::Result<ExtractionOutput> {
    let text = fs::read_to_string(path)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");
    let doc = RawDocument::from_text(file_name, &text);

    Ok(engine.process(&doc, settlement_type)?)
}

pub fn format_output(
    result: &ExtractionOutput,
    format: OutputFormat,
    pretty: bool,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => {
            if pretty {
                Ok(serde_json::to_string_pretty(result)?)
            } else {
                Ok(serde_json::to_string(result)?)
            }
        }
        OutputFormat::Csv => format_csv(result),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

pub const CSV_HEADER: [&str; 12] = [
    "source_file",
    "settlement_type",
    "license_plate",
    "settlement_date",
    "week_start",
    "week_end",
    "gross_revenue",
    "total_expenses",
    "net_profit",
    "driver_pay",
    "blocks_delivered",
    "is_valid",
];

pub fn csv_rows(result: &ExtractionOutput) -> Vec<Vec<String>> {
    let is_valid = result
        .validation
        .as_ref()
        .map_or(String::new(), |v| v.is_valid.to_string());

    result
        .settlements
        .iter()
        .map(|s| {
            vec![
                result.source_file.clone(),
                result.settlement_type.clone().unwrap_or_default(),
                s.metadata.license_plate.clone().unwrap_or_default(),
                s.metadata
                    .settlement_date
                    .map_or(String::new(), |d| d.to_string()),
                s.metadata
                    .week_start
                    .map_or(String::new(), |d| d.to_string()),
                s.metadata.week_end.map_or(String::new(), |d| d.to_string()),
                s.revenue.gross_revenue.to_string(),
                s.expenses.total_expenses.to_string(),
                s.revenue.net_profit.to_string(),
                s.driver_pay.driver_pay.to_string(),
                s.metrics.blocks_delivered.to_string(),
                is_valid.clone(),
            ]
        })
        .collect()
}

fn format_csv(result: &ExtractionOutput) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(CSV_HEADER)?;
    for row in csv_rows(result) {
        wtr.write_record(&row)?;
    }
    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(result: &ExtractionOutput) -> String {
    let mut output = String::new();

    output.push_str(&format!("File: {}\n", result.source_file));
    if let Some(settlement_type) = &result.settlement_type {
        output.push_str(&format!("Type: {}\n", settlement_type));
    }
    output.push('\n');

    for (idx, s) in result.settlements.iter().enumerate() {
        output.push_str(&format!(
            "Settlement {} ({})\n",
            idx + 1,
            s.metadata.license_plate.as_deref().unwrap_or("unknown")
        ));
        if let Some(date) = s.metadata.settlement_date {
            output.push_str(&format!("  Date:     {}\n", date));
        }
        if let Some(driver) = &s.metadata.driver_name {
            output.push_str(&format!("  Driver:   {}\n", driver));
        }
        output.push_str(&format!("  Gross:    {:.2}\n", s.revenue.gross_revenue));
        output.push_str(&format!("  Expenses: {:.2}\n", s.expenses.total_expenses));
        output.push_str(&format!("  Net:      {:.2}\n", s.revenue.net_profit));
        output.push_str(&format!("  Blocks:   {}\n", s.metrics.blocks_delivered));
        output.push('\n');
    }

    if let Some(validation) = &result.validation {
        output.push_str(&format!(
            "Validation: {} ({} errors, {} warnings)\n",
            if validation.is_valid { "passed" } else { "FAILED" },
            validation.summary.error_count,
            validation.summary.warning_count
        ));
        for issue in validation.errors.iter().chain(&validation.warnings) {
            output.push_str(&format!("  - {}\n", issue.message));
        }
    }

    output
}
