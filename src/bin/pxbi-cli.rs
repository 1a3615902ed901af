//! PXBI CLI
//!
//! Command-line interface for decoding PXBI model containers, verifying their
//! layout and extracting the embedded textures.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use tracing::{debug, error, info};

use pxbi_export::{JsonExporter, TextureDumpOptions, TextureDumper};
use pxbi_parsers::logging::{init_with_config, instrument_parse, TracingConfig};
use pxbi_parsers::{
    log_parse_complete, log_parse_error, log_parse_start, HumanReadable, Parser as ParserTrait, PxbiModel,
    PxbiParser,
};

/// PXBI - model container decoder and texture extractor
#[derive(Parser)]
#[command(name = "pxbi")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format for structured data
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the decoded contents of a container
    Info(InfoArgs),

    /// Decode containers without writing anything
    Verify(VerifyArgs),

    /// Decode containers and dump their textures
    Extract(ExtractArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Path to the container
    path: PathBuf,
}

#[derive(Args)]
struct VerifyArgs {
    /// Container file, or a directory of `.bin` containers
    path: PathBuf,

    /// Number of parallel worker threads (directory mode)
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Args)]
struct ExtractArgs {
    /// Container file, or a directory of `.bin` containers
    path: PathBuf,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing files
    #[arg(long)]
    overwrite: bool,

    /// Skip the raw GTF payloads
    #[arg(long)]
    no_gtf: bool,

    /// Skip the DDS conversions
    #[arg(long)]
    no_dds: bool,

    /// Also write a JSON summary of each model
    #[arg(long)]
    summary: bool,

    /// Number of parallel worker threads (directory mode)
    #[arg(long)]
    threads: Option<usize>,
}

fn setup_logging(verbosity: u8) {
    init_with_config(&TracingConfig::for_verbosity(verbosity));
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Info(args) => cmd_info(args, cli.format),
        Commands::Verify(args) => cmd_verify(args),
        Commands::Extract(args) => cmd_extract(args),
    }
}

fn cmd_info(args: InfoArgs, format: OutputFormat) -> Result<()> {
    let path = &args.path;
    if !path.is_file() {
        bail!("File not found: {:?}", path);
    }

    let model = decode(path)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&model.to_json())?),
        OutputFormat::Yaml => print!("{}", model.to_yaml()),
        OutputFormat::Text => {
            println!("File: {:?} ({})", path, format_size(fs::metadata(path)?.len()));
            print!("{}", model.to_readable_string());
        }
    }

    Ok(())
}

fn cmd_verify(args: VerifyArgs) -> Result<()> {
    if !args.path.is_dir() {
        let model = decode(&args.path)?;
        println!(
            "OK: {:?} ({} meshes, {} materials, {} textures, {} bones)",
            args.path,
            model.meshes.len(),
            model.materials.len(),
            model.textures.len(),
            model.skeleton.bone_count()
        );
        return Ok(());
    }

    let files = collect_containers(&args.path)?;
    let failures = run_batch(&files, args.threads, |file| decode(file).map(|_| ()))?;

    println!("Verification complete:");
    println!("  Checked: {}", files.len());
    println!("  Failed:  {}", failures);

    Ok(())
}

fn cmd_extract(args: ExtractArgs) -> Result<()> {
    let dumper = TextureDumper::with_options(TextureDumpOptions {
        write_gtf: !args.no_gtf,
        write_dds: !args.no_dds,
        overwrite: args.overwrite,
    });

    if !args.path.is_dir() {
        let out_dir = args.output.clone().unwrap_or_else(|| args.path.with_extension(""));
        return extract_one(&args.path, &out_dir, &dumper, args.summary);
    }

    let root = args.output.clone().unwrap_or_else(|| PathBuf::from("out"));
    let files = collect_containers(&args.path)?;
    let failures = run_batch(&files, args.threads, |file| {
        let stem = file.file_stem().unwrap_or(file.as_os_str());
        extract_one(file, &root.join(stem), &dumper, args.summary)
    })?;

    println!("Extraction complete:");
    println!("  Containers: {}", files.len());
    println!("  Extracted:  {}", files.len() - failures);
    println!("  Errors:     {}", failures);

    Ok(())
}

/// Decode one container, with logging around the parse
fn decode(path: &Path) -> Result<PxbiModel> {
    let parser = PxbiParser::new();
    log_parse_start!(parser.name(), path);

    let start = Instant::now();
    match instrument_parse(parser.name(), || parser.parse_file(path)) {
        Ok(model) => {
            log_parse_complete!(parser.name(), start.elapsed(), model.meshes.len());
            Ok(model)
        }
        Err(e) => {
            log_parse_error!(parser.name(), e);
            Err(e).with_context(|| format!("Failed to decode {:?}", path))
        }
    }
}

fn extract_one(input: &Path, out_dir: &Path, dumper: &TextureDumper, summary: bool) -> Result<()> {
    let model = decode(input)?;

    let report = dumper
        .dump(&model, out_dir)
        .with_context(|| format!("Failed to dump textures of {:?}", input))?;

    if summary {
        let summary_path = out_dir.join("summary.json");
        JsonExporter::new()
            .export_model(&model, &summary_path)
            .with_context(|| format!("Failed to write {:?}", summary_path))?;
    }

    info!(
        input = %input.display(),
        output = %out_dir.display(),
        files = report.files_written,
        skipped = report.files_skipped,
        size = %format_size(report.bytes_written),
        "Extracted container"
    );
    Ok(())
}

/// List the `.bin` files directly inside a directory
fn collect_containers(dir: &Path) -> Result<Vec<PathBuf>> {
    let parser = PxbiParser::new();
    let mut files = Vec::new();

    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read directory {:?}", dir))? {
        let path = entry?.path();
        if path.is_file() && parser.can_parse(&path) {
            files.push(path);
        } else {
            debug!("Skipping {:?}", path);
        }
    }

    files.sort();
    info!("Found {} containers in {:?}", files.len(), dir);
    Ok(files)
}

/// Run `job` over every file in parallel; failures are logged and counted
fn run_batch<F>(files: &[PathBuf], threads: Option<usize>, job: F) -> Result<usize>
where
    F: Fn(&Path) -> Result<()> + Sync,
{
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build().context("Failed to create thread pool")?;

    let failures = AtomicUsize::new(0);
    pool.install(|| {
        files.par_iter().for_each(|file| {
            if let Err(e) = job(file.as_path()) {
                error!("{:?}: {:#}", file, e);
                failures.fetch_add(1, Ordering::Relaxed);
            }
        });
    });

    Ok(failures.into_inner())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
