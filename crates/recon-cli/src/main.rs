//! Table Recon CLI
//!
//! Command-line tool for comparing a reference CSV dataset against a
//! candidate dataset and exporting the discrepancies.

use clap::{Parser, Subcommand};
use recon_core::{
    build_report, diff_keys, parse_csv, AttributeFilter, FilterMode, FilterOptions, FilterConfig,
    ReconConfig, ReconciliationReport,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default export name, matching the download offered by the web front end
const DEFAULT_OUTPUT: &str = "discrepant_data.csv";

/// How `compare` prints its summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SummaryFormat {
    Text,
    Json,
}

impl FromStr for SummaryFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(SummaryFormat::Text),
            "json" => Ok(SummaryFormat::Json),
            other => Err(format!("unknown format '{other}'. Supported formats: text, json")),
        }
    }
}

#[derive(Parser)]
#[command(name = "recon")]
#[command(about = "Reconcile a reference CSV dataset against a candidate", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two datasets and report discrepancies
    Compare {
        /// Reference dataset (CSV)
        #[arg(short, long)]
        reference: PathBuf,

        /// Candidate dataset (CSV)
        #[arg(short, long)]
        candidate: PathBuf,

        /// Key column shared by both datasets
        #[arg(short, long, required_unless_present = "config")]
        key: Option<String>,

        /// Run configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Attribute filter spec (CSV with Attribute and Include/Exclude columns)
        #[arg(short, long)]
        filter: Option<PathBuf>,

        /// How to read the filter spec (inclusive or exclusive)
        #[arg(long, default_value = "exclusive")]
        filter_mode: FilterMode,

        /// Write the paired discrepancies as CSV
        #[arg(short, long, num_args = 0..=1, default_missing_value = DEFAULT_OUTPUT)]
        output: Option<PathBuf>,

        /// Output format for the summary (text or json)
        #[arg(long, default_value = "text")]
        format: SummaryFormat,

        /// Leave out the differing-fields column
        #[arg(long)]
        no_differing_fields: bool,
    },

    /// List keys present in only one dataset
    Keys {
        /// Reference dataset (CSV)
        #[arg(short, long)]
        reference: PathBuf,

        /// Candidate dataset (CSV)
        #[arg(short, long)]
        candidate: PathBuf,

        /// Key column shared by both datasets
        #[arg(short, long)]
        key: String,
    },

    /// Parse and preview a single CSV file
    Inspect {
        /// Path to CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Key column (defaults to the first column)
        #[arg(short, long)]
        key: Option<String>,

        /// Maximum number of rows to display
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Create a run configuration template
    CreateConfig {
        /// Output path for the config file
        #[arg(short, long)]
        output: PathBuf,

        /// Key column shared by both datasets
        #[arg(short, long)]
        key: String,

        /// Attribute filter spec to reference from the config
        #[arg(short, long)]
        filter: Option<PathBuf>,

        /// How to read the filter spec (inclusive or exclusive)
        #[arg(long, default_value = "exclusive")]
        filter_mode: FilterMode,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        tracing::debug!(kind = e.kind(), "command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "recon=debug,recon_core=debug"
    } else {
        "recon=info,recon_core=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> recon_core::Result<()> {
    match cli.command {
        Commands::Compare {
            reference,
            candidate,
            key,
            config,
            filter,
            filter_mode,
            output,
            format,
            no_differing_fields,
        } => {
            let (config, base_dir) = resolve_config(config.as_deref(), key, no_differing_fields)?;
            let attribute_filter = match filter {
                Some(path) => Some(AttributeFilter::load(path, FilterOptions::new(filter_mode))?),
                None => config.load_filter(base_dir.as_deref())?,
            };
            cmd_compare(
                &reference,
                &candidate,
                &config,
                attribute_filter.as_ref(),
                output.as_deref(),
                format,
            )
        }
        Commands::Keys {
            reference,
            candidate,
            key,
        } => cmd_keys(&reference, &candidate, &key),
        Commands::Inspect { file, key, limit } => cmd_inspect(&file, key.as_deref(), limit),
        Commands::CreateConfig {
            output,
            key,
            filter,
            filter_mode,
        } => cmd_create_config(&output, &key, filter, filter_mode),
    }
}

/// Load the config file if given and apply command-line overrides. Also
/// returns the directory relative filter paths are resolved against.
fn resolve_config(
    path: Option<&Path>,
    key: Option<String>,
    no_differing_fields: bool,
) -> recon_core::Result<(ReconConfig, Option<PathBuf>)> {
    let (mut config, base_dir) = match (path, key.as_deref()) {
        (Some(path), _) => (
            ReconConfig::load(path)?,
            path.parent().map(Path::to_path_buf),
        ),
        (None, Some(key)) => (ReconConfig::new(key), None),
        // clap requires one of the two
        (None, None) => unreachable!("--key or --config is required"),
    };

    if let Some(key) = key {
        config.key_column = key;
    }
    if no_differing_fields {
        config.differing_fields = false;
    }
    Ok((config, base_dir))
}

fn cmd_compare(
    reference_path: &Path,
    candidate_path: &Path,
    config: &ReconConfig,
    filter: Option<&AttributeFilter>,
    output: Option<&Path>,
    format: SummaryFormat,
) -> recon_core::Result<()> {
    tracing::info!(path = %reference_path.display(), "loading reference data");
    let reference = parse_csv(reference_path, &config.key_column)?;
    tracing::info!(path = %candidate_path.display(), "loading candidate data");
    let candidate = parse_csv(candidate_path, &config.key_column)?;

    let report = build_report(&reference, &candidate, filter, config)?;

    if let Some(output) = output {
        report.save_csv(output)?;
        tracing::info!(path = %output.display(), rows = report.rows.len(), "wrote discrepancies");
    }

    match format {
        SummaryFormat::Json => println!("{}", serde_json::to_string_pretty(&report.summary())?),
        SummaryFormat::Text => print_summary(&report),
    }

    Ok(())
}

fn print_summary(report: &ReconciliationReport) {
    println!("Data upload statistics:");
    println!("  Filled rows in reference dataset: {}", report.reference_filled_rows);
    println!("  Filled rows in candidate dataset: {}", report.candidate_filled_rows);
    println!("  Difference between datasets: {} rows", report.filled_row_difference());
    println!();
    println!("Dataset statistics:");
    println!("  Identical rows: {}", report.identical_count);
    println!("  Discrepant rows: {}", report.discrepant_count);
    println!("  Discrepant keys: {}", report.discrepant_key_count());
    println!("  Processing time: {:.2} seconds", report.elapsed.as_secs_f64());

    if !report.duplicate_keys.is_empty() {
        println!();
        println!("Keys repeated within a dataset ({}):", report.duplicate_keys.len());
        for dup in &report.duplicate_keys {
            println!("  {} {} ({} rows)", dup.origin, dup.key, dup.count);
        }
    }

    if report.unkeyed_rows > 0 {
        println!();
        println!("Rows without a key: {}", report.unkeyed_rows);
    }

    if !report.unique_keys.is_empty() {
        println!();
        println!("Keys present in only one dataset ({}):", report.unique_keys.len());
        for key in &report.unique_keys {
            println!("  {}", key);
        }
    }

    println!();
    if report.has_discrepancies() {
        println!(
            "{} discrepant rows across {} keys",
            report.discrepant_count,
            report.discrepant_key_count()
        );
    } else {
        println!("No discrepant records found between the datasets.");
    }
}

fn cmd_keys(reference_path: &Path, candidate_path: &Path, key: &str) -> recon_core::Result<()> {
    let reference = parse_csv(reference_path, key)?;
    let candidate = parse_csv(candidate_path, key)?;
    let diff = diff_keys(&reference, &candidate);

    println!("Only in reference ({}):", diff.reference_only.len());
    for key in &diff.reference_only {
        println!("  {}", key);
    }
    println!();
    println!("Only in candidate ({}):", diff.candidate_only.len());
    for key in &diff.candidate_only {
        println!("  {}", key);
    }

    Ok(())
}

fn cmd_inspect(file: &Path, key: Option<&str>, limit: usize) -> recon_core::Result<()> {
    let key = match key {
        Some(key) => key.to_string(),
        None => first_column(file)?,
    };
    let table = parse_csv(file, &key)?;

    println!("File: {}", file.display());
    println!("Key column: {}", table.key_column());
    println!("Columns: {}", table.column_count());
    println!("Rows: {} ({} filled)", table.row_count(), table.filled_row_count());

    let mut key_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for key in table.keys() {
        *key_counts.entry(key).or_insert(0) += 1;
    }
    let duplicates: Vec<(&str, usize)> = key_counts.into_iter().filter(|(_, n)| *n > 1).collect();
    if !duplicates.is_empty() {
        println!("Duplicate keys: {}", duplicates.len());
        for (key, count) in &duplicates {
            println!("  {} ({} rows)", key, count);
        }
    }
    println!();

    // Print header
    let header = table.column_names();
    println!("{}", header.join("\t"));
    println!("{}", "-".repeat(header.len() * 12));

    for row in table.rows.iter().take(limit) {
        let values: Vec<String> = row.cells.iter().map(|c| c.to_string_value()).collect();
        println!("{}", values.join("\t"));
    }

    if table.row_count() > limit {
        println!("... ({} more rows)", table.row_count() - limit);
    }

    Ok(())
}

fn first_column(file: &Path) -> recon_core::Result<String> {
    let mut reader = csv::Reader::from_path(file).map_err(|e| recon_core::Error::Csv {
        path: file.to_path_buf(),
        source: e,
    })?;
    let headers = reader.headers().map_err(|e| recon_core::Error::Csv {
        path: file.to_path_buf(),
        source: e,
    })?;
    headers
        .get(0)
        .map(str::to_string)
        .ok_or_else(|| recon_core::Error::CsvParse {
            path: file.to_path_buf(),
            message: "no columns found in CSV".to_string(),
        })
}

fn cmd_create_config(
    output: &Path,
    key: &str,
    filter: Option<PathBuf>,
    filter_mode: FilterMode,
) -> recon_core::Result<()> {
    let mut config = ReconConfig::new(key);
    config.filter = filter.map(|spec_path| FilterConfig {
        spec_path,
        options: FilterOptions::new(filter_mode),
    });

    config.save(output)?;
    println!("Created config file: {}", output.display());
    println!("Key column: {}", key);
    println!();
    println!("Edit the file to adjust labels or filtering, then run:");
    println!(
        "  recon compare --config {} --reference <csv> --candidate <csv> --output",
        output.display()
    );

    Ok(())
}
