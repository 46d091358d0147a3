//! Exposure Loader CLI
//!
//! Commands:
//! - pack: Write NDJSON exposure results into a record file
//! - batch: Extract labeled batches from a record file as NDJSON
//! - dump: Print every record of a record file as NDJSON
//! - inspect: Summarize a record file

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use exposure_loader::{
    ExposureBatchExtractor, ExposureResult, ExtractorConfig, LoaderError, RecordFile,
    RecordWriter, StoreSummary, LOADER_VERSION,
};

/// Exposure Loader - labeled training batches from simulated exposure records
#[derive(Parser)]
#[command(name = "exposure-loader")]
#[command(version = LOADER_VERSION)]
#[command(about = "Extract labeled exposure batches from record files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write NDJSON exposure results into a record file
    Pack {
        /// Input NDJSON file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Record file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Append to an existing record file instead of replacing it
        #[arg(long)]
        append: bool,
    },

    /// Extract labeled batches as NDJSON (one batch per line)
    Batch {
        /// Record file to read
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Records per batch
        #[arg(long, default_value = "128")]
        batch_size: usize,

        /// Stop after this many batches
        #[arg(long)]
        max_batches: Option<usize>,

        /// JSON configuration file; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Admit UNCONFIRMED exposures
        #[arg(long)]
        include_unconfirmed: bool,

        /// Center windows on the infection onset instead of the test time
        #[arg(long)]
        window_around_onset: bool,

        /// Inclusive days before the anchor
        #[arg(long)]
        days_before: Option<i64>,

        /// Inclusive days after the anchor
        #[arg(long)]
        days_after: Option<i64>,
    },

    /// Print every record as NDJSON
    Dump {
        /// Record file to read
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Summarize a record file
    Inspect {
        /// Record file to read
        #[arg(short, long)]
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "text")]
        format: ReportFormat,
    },
}

#[derive(Clone, ValueEnum)]
enum ReportFormat {
    /// Human-readable report
    Text,
    /// Pretty-printed JSON
    Json,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), LoaderCliError> {
    match cli.command {
        Commands::Pack {
            input,
            output,
            append,
        } => cmd_pack(&input, &output, append),

        Commands::Batch {
            input,
            output,
            batch_size,
            max_batches,
            config,
            include_unconfirmed,
            window_around_onset,
            days_before,
            days_after,
        } => {
            let mut extractor_config = match config {
                Some(path) => ExtractorConfig::from_file(&path)?,
                None => ExtractorConfig::default(),
            };
            if include_unconfirmed {
                extractor_config.include_unconfirmed_exposures = true;
            }
            if window_around_onset {
                extractor_config.window_around_infection_onset = true;
            }
            if let Some(days) = days_before {
                extractor_config.window_days_before_anchor = days;
            }
            if let Some(days) = days_after {
                extractor_config.window_days_after_anchor = days;
            }
            extractor_config.source_path = Some(input);

            cmd_batch(&extractor_config, &output, batch_size, max_batches)
        }

        Commands::Dump { input } => cmd_dump(&input),

        Commands::Inspect { input, format } => cmd_inspect(&input, format),
    }
}

fn cmd_pack(input: &Path, output: &Path, append: bool) -> Result<(), LoaderCliError> {
    let reader: Box<dyn BufRead> = if input.to_string_lossy() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(fs::File::open(input)?))
    };

    let mut writer = if append {
        RecordWriter::append_to(output)?
    } else {
        RecordWriter::create(output)?
    };

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: ExposureResult = serde_json::from_str(trimmed).map_err(|e| {
            LoaderCliError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
        })?;
        writer.append(&record)?;
    }

    let written = writer.finish()?;
    if written == 0 {
        return Err(LoaderCliError::NoRecords);
    }
    log::info!("packed {} records into {}", written, output.display());
    Ok(())
}

fn cmd_batch(
    config: &ExtractorConfig,
    output: &Path,
    batch_size: usize,
    max_batches: Option<usize>,
) -> Result<(), LoaderCliError> {
    let mut extractor = ExposureBatchExtractor::from_config(config)?;
    let mut out: Box<dyn Write> = if output.to_string_lossy() == "-" {
        Box::new(BufWriter::new(io::stdout()))
    } else {
        Box::new(BufWriter::new(fs::File::create(output)?))
    };

    let mut emitted = 0;
    for batch in extractor
        .batches(batch_size)
        .take(max_batches.unwrap_or(usize::MAX))
    {
        let batch = batch?;
        writeln!(out, "{}", serde_json::to_string(&batch)?)?;
        emitted += 1;
    }
    out.flush()?;

    log::info!("wrote {} batches", emitted);
    Ok(())
}

fn cmd_dump(input: &Path) -> Result<(), LoaderCliError> {
    let config = ExtractorConfig::new();
    let mut extractor = ExposureBatchExtractor::open(input, &config)?;
    let mut out = BufWriter::new(io::stdout());

    let mut write_error = None;
    extractor.for_each_record(|record| {
        if write_error.is_some() {
            return;
        }
        let written = serde_json::to_string(record)
            .map_err(LoaderCliError::from)
            .and_then(|line| writeln!(out, "{}", line).map_err(LoaderCliError::from));
        if let Err(e) = written {
            write_error = Some(e);
        }
    })?;

    if let Some(e) = write_error {
        return Err(e);
    }
    out.flush()?;
    Ok(())
}

fn cmd_inspect(input: &Path, format: ReportFormat) -> Result<(), LoaderCliError> {
    let summary = StoreSummary::scan(&RecordFile::new(input))?;

    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        ReportFormat::Text => {
            let fmt_time = |t: Option<chrono::DateTime<chrono::Utc>>| {
                t.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string())
            };

            println!("Record Store Summary");
            println!("====================");
            println!("File:                 {}", input.display());
            println!("Records:              {}", summary.records);
            println!("  positive:           {}", summary.positive);
            println!("  negative:           {}", summary.negative);
            println!("  undetermined:       {}", summary.undetermined);
            println!("  with onset time:    {}", summary.with_infection_onset);
            println!("Exposures:            {}", summary.total_exposures());
            println!("  confirmed:          {}", summary.confirmed_exposures);
            println!("  unconfirmed:        {}", summary.unconfirmed_exposures);
            println!("  with trace:         {}", summary.traced_exposures);
            println!("  missing distance:   {}", summary.exposures_missing_distance);
            println!(
                "Tests administered:   {} .. {}",
                fmt_time(summary.earliest_test),
                fmt_time(summary.latest_test)
            );
        }
    }

    if summary.undetermined > 0 || summary.exposures_missing_distance > 0 {
        log::warn!(
            "{} records have no binary outcome and {} exposures lack a distance; batching may fail",
            summary.undetermined,
            summary.exposures_missing_distance
        );
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum LoaderCliError {
    Io(io::Error),
    Loader(LoaderError),
    Json(serde_json::Error),
    NoRecords,
    ParseError(String),
}

impl From<io::Error> for LoaderCliError {
    fn from(e: io::Error) -> Self {
        LoaderCliError::Io(e)
    }
}

impl From<LoaderError> for LoaderCliError {
    fn from(e: LoaderError) -> Self {
        LoaderCliError::Loader(e)
    }
}

impl From<serde_json::Error> for LoaderCliError {
    fn from(e: serde_json::Error) -> Self {
        LoaderCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<LoaderCliError> for CliError {
    fn from(e: LoaderCliError) -> Self {
        match e {
            LoaderCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            LoaderCliError::Loader(LoaderError::InvalidRecord(e)) => CliError {
                code: "INVALID_RECORD".to_string(),
                message: e.to_string(),
                hint: Some("Run 'exposure-loader inspect' to check the store".to_string()),
            },
            LoaderCliError::Loader(LoaderError::CorruptStore(msg)) => CliError {
                code: "CORRUPT_STORE".to_string(),
                message: msg,
                hint: Some("Regenerate the record file with 'exposure-loader pack'".to_string()),
            },
            LoaderCliError::Loader(LoaderError::InvalidConfig(msg)) => CliError {
                code: "INVALID_CONFIG".to_string(),
                message: msg,
                hint: Some("Check the window flags and configuration file".to_string()),
            },
            LoaderCliError::Loader(e) => CliError {
                code: "LOADER_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            LoaderCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            LoaderCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            LoaderCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Each line must be one exposure result object".to_string()),
            },
        }
    }
}
