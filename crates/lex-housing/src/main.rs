//! CLI entry point for the feature-encoding pipeline.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use lex_housing::config::DEFAULT_UNSEEN_CODE_SPACE;
use lex_housing::{
    FeaturePipeline, FittedPipeline, PipelineConfig, RawRecord, detect_target_column,
    normalize_city_column, split_features_target,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    author = "Lex Machina Team",
    version,
    about = "Feature encoding for real-estate price prediction",
    long_about = "Fits, applies and inspects the preprocessing bundle that turns raw \
                  property listings into a model-ready numeric matrix.\n\n\
                  EXAMPLES:\n  \
                  # Fit on a training set and save the bundle\n  \
                  lex-housing fit -i train.csv -o models/preprocessor.json\n\n  \
                  # Transform new listings\n  \
                  lex-housing transform -b models/preprocessor.json -i rows.json \
                  -o features.csv\n\n  \
                  # Show the fitted schema\n  \
                  lex-housing inspect -b models/preprocessor.json"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit the pipeline on a training CSV and save the bundle
    Fit {
        /// Training data (CSV)
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the fitted bundle
        #[arg(short, long, default_value = "models/preprocessor.json")]
        output: PathBuf,

        /// Target column; detected from the column names if omitted
        #[arg(short, long)]
        target: Option<String>,

        /// Also write the transformed training matrix (CSV, target appended)
        #[arg(long)]
        matrix: Option<PathBuf>,

        /// Share of unset cities at which the city is derived from ADDRESS
        #[arg(long, default_value = "0.8")]
        city_threshold: f64,

        /// Width of the code range reserved for unseen labels
        #[arg(long, default_value_t = DEFAULT_UNSEEN_CODE_SPACE)]
        unseen_code_space: u64,

        /// Do not copy the previous bundle to backup/ before overwriting
        #[arg(long)]
        no_backup: bool,
    },

    /// Transform rows (CSV, or JSON records) with a saved bundle
    Transform {
        /// Fitted bundle
        #[arg(short, long)]
        bundle: PathBuf,

        /// Input rows: `.json` for an array of records, otherwise CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV of encoded features
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the schema and fitted statistics of a bundle
    Inspect {
        /// Fitted bundle
        #[arg(short, long)]
        bundle: PathBuf,

        /// Output JSON to stdout instead of a human-readable summary
        #[arg(long)]
        json: bool,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only carries JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    let json_output = matches!(args.command, Command::Inspect { json: true, .. });
    init_logging(&args.log_level, args.quiet, json_output);

    match args.command {
        Command::Fit {
            input,
            output,
            target,
            matrix,
            city_threshold,
            unseen_code_space,
            no_backup,
        } => {
            let config = PipelineConfig::builder()
                .city_extraction_threshold(city_threshold)
                .unseen_code_space(unseen_code_space)
                .keep_backup(!no_backup)
                .build()?;
            run_fit(&input, &output, target, matrix.as_deref(), config)
        }
        Command::Transform {
            bundle,
            input,
            output,
        } => run_transform(&bundle, &input, &output),
        Command::Inspect { bundle, json } => run_inspect(&bundle, json),
    }
}

fn run_fit(
    input: &Path,
    output: &Path,
    target: Option<String>,
    matrix_path: Option<&Path>,
    config: PipelineConfig,
) -> Result<()> {
    let mut data = load_csv(input)?;
    info!("Dataset loaded: {:?}", data.shape());

    let target = match target {
        Some(t) => t,
        None => detect_target_column(&data)?,
    };
    info!("Target column: '{}'", target);

    normalize_city_column(&mut data)?;
    let (features, y) = split_features_target(&data, &target)?;

    let mut pipeline = FeaturePipeline::new(config);
    let mut matrix = pipeline.fit_transform(&features)?;
    pipeline.save(output)?;

    if let Some(path) = matrix_path {
        matrix.with_column(Series::new(target.as_str().into(), y))?;
        write_csv(&mut matrix, path)?;
        info!("Training matrix written to {}", path.display());
    }

    let fitted = pipeline.fitted()?;
    println!();
    println!("{}", "=".repeat(60));
    println!("PIPELINE FITTED");
    println!("{}", "=".repeat(60));
    println!("  Rows:        {}", matrix.height());
    println!("  Features:    {}", fitted.feature_names().len());
    println!(
        "  Categorical: {}",
        fitted.schema().categorical_in_order().join(", ")
    );
    println!("  Bundle:      {}", output.display());
    println!();
    Ok(())
}

fn run_transform(bundle: &Path, input: &Path, output: &Path) -> Result<()> {
    let fitted = FittedPipeline::load(bundle)?;

    let is_json = input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let mut matrix = if is_json {
        let records = load_records(input)?;
        debug!("Loaded {} records", records.len());
        fitted.transform_records(&records)?
    } else {
        fitted.transform(&load_csv(input)?)?
    };

    write_csv(&mut matrix, output)?;
    info!(
        "Wrote {} rows x {} features to {}",
        matrix.height(),
        matrix.width(),
        output.display()
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct ColumnReport {
    name: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fill_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    std: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    known_labels: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct InspectReport {
    bundle: String,
    fitted_at: Option<String>,
    num_features: usize,
    columns: Vec<ColumnReport>,
}

fn build_inspect_report(bundle: &Path, fitted: &FittedPipeline) -> InspectReport {
    let scaler: BTreeMap<&str, (f64, f64)> = fitted
        .scaler()
        .params()
        .iter()
        .map(|p| (p.column.as_str(), (p.mean, p.std)))
        .collect();

    let columns = fitted
        .feature_names()
        .iter()
        .map(|name| {
            let categorical = fitted.schema().categorical_columns().contains(name);
            let stats = scaler.get(name.as_str());
            ColumnReport {
                name: name.clone(),
                kind: if categorical { "categorical" } else { "numeric" },
                fill_value: fitted.imputer().fill_value(name),
                mean: stats.map(|s| s.0),
                std: stats.map(|s| s.1),
                known_labels: fitted
                    .known_labels(name)
                    .map(|labels| labels.into_iter().map(str::to_string).collect()),
            }
        })
        .collect();

    InspectReport {
        bundle: bundle.display().to_string(),
        fitted_at: fitted.fitted_at().map(|t| t.to_rfc3339()),
        num_features: fitted.feature_names().len(),
        columns,
    }
}

fn run_inspect(bundle: &Path, json: bool) -> Result<()> {
    let fitted = FittedPipeline::load(bundle)?;
    let report = build_inspect_report(bundle, &fitted);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!("Bundle:   {}", report.bundle);
    if let Some(ref at) = report.fitted_at {
        println!("Fitted:   {}", at);
    }
    println!("Features: {}", report.num_features);
    println!();
    println!(
        "{:<28} {:<12} {:>12} {:>12} {:>12}",
        "Column", "Kind", "Fill", "Mean", "Std"
    );
    println!("{}", "-".repeat(80));
    for col in &report.columns {
        let fmt = |v: Option<f64>| v.map(|x| format!("{:.4}", x)).unwrap_or_default();
        println!(
            "{:<28} {:<12} {:>12} {:>12} {:>12}",
            truncate_str(&col.name, 27),
            col.kind,
            fmt(col.fill_value),
            fmt(col.mean),
            fmt(col.std)
        );
        if let Some(ref labels) = col.known_labels {
            println!("    {} labels: {}", labels.len(), summarize_labels(labels, 8));
        }
    }
    println!();
    Ok(())
}

fn load_csv(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(anyhow!("Input file not found: {}", path.display()));
    }
    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("reading {}", path.display()))
}

/// Accepts either a JSON array of records or a single record object.
fn load_records(path: &Path) -> Result<Vec<RawRecord>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_reader(std::io::BufReader::new(file))?;
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::Object(map) => Ok(map),
                other => Err(anyhow!("expected a JSON object per record, got {}", other)),
            })
            .collect(),
        serde_json::Value::Object(map) => Ok(vec![map]),
        other => Err(anyhow!("expected JSON records, got {}", other)),
    }
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;
    Ok(())
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn summarize_labels(labels: &[String], limit: usize) -> String {
    let shown = labels
        .iter()
        .take(limit)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if labels.len() > limit {
        format!("{}, ... (+{})", shown, labels.len() - limit)
    } else {
        shown
    }
}
