use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use zum_ingest::app::{App, IngestOptions, IngestResult};
use zum_ingest::config::ConfigLoader;
use zum_ingest::datasets;
use zum_ingest::domain::{PipelineName, PipelineSpec};
use zum_ingest::error::IngestError;
use zum_ingest::http::{FetchRequest, Fetcher, HttpFetcher};
use zum_ingest::output::{ConsoleOutput, JsonOutput, OutputMode};
use zum_ingest::store::Store;

#[derive(Parser)]
#[command(name = "zum-ingest")]
#[command(about = "Download, verify and extract evaluation datasets into a local cache with provenance")]
#[command(version)]
struct Cli {
    /// Print results as JSON instead of progress lines.
    #[arg(long, global = true)]
    json: bool,

    /// Cache root; defaults to `.cache` in the current directory.
    #[arg(long, global = true, value_name = "DIR")]
    cache_root: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Ingest one or more pipelines (all when none are given)")]
    Ingest(IngestArgs),
    /// List pipelines and their last ingestion.
    ///
    /// Looks for the default provenance file name; use `info --config` for a
    /// pipeline ingested with a custom `[paths].provenance`.
    List,
    #[command(about = "Show the provenance of a pipeline and re-check its files")]
    Info(InfoArgs),
    #[command(about = "Remove a pipeline's cache directory")]
    Clear(PipelineArgs),
}

#[derive(Args)]
struct IngestArgs {
    #[arg(value_enum)]
    pipelines: Vec<PipelineName>,

    /// TOML pipeline config; requires exactly one pipeline.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Re-download even when a verified archive is cached.
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct InfoArgs {
    #[arg(value_enum)]
    pipeline: PipelineName,

    /// TOML pipeline config the pipeline was ingested with.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct PipelineArgs {
    #[arg(value_enum)]
    pipeline: PipelineName,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<IngestError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &IngestError) -> u8 {
    match error {
        IngestError::Config(_)
        | IngestError::ConfigRead(_)
        | IngestError::ConfigParse { .. }
        | IngestError::PipelineMismatch { .. }
        | IngestError::UnknownPipeline(_)
        | IngestError::ProvenanceNotFound(_) => 2,
        IngestError::Http(_) | IngestError::HttpStatus { .. } => 3,
        IngestError::NotFound(_)
        | IngestError::SizeOutOfRange { .. }
        | IngestError::ChecksumMismatch { .. }
        | IngestError::Extraction { .. }
        | IngestError::StructuralMismatch { .. } => 4,
        IngestError::Filesystem(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Console
    };
    let store = Store::new(cli.cache_root.as_deref())?;

    match cli.command {
        Commands::Ingest(args) => run_ingest(args, store, output_mode),
        Commands::List => run_list(store, output_mode),
        Commands::Info(args) => run_info(args, store, output_mode),
        Commands::Clear(args) => run_clear(args, store, output_mode),
    }
}

fn resolve_specs(args: &IngestArgs) -> Result<Vec<PipelineSpec>, IngestError> {
    match &args.config {
        Some(path) => {
            let [name] = args.pipelines.as_slice() else {
                return Err(IngestError::Config(
                    "--config requires exactly one pipeline".to_string(),
                ));
            };
            Ok(vec![ConfigLoader::load(path, *name)?])
        }
        None if args.pipelines.is_empty() => {
            Ok(PipelineName::ALL.into_iter().map(datasets::builtin).collect())
        }
        None => Ok(args.pipelines.iter().copied().map(datasets::builtin).collect()),
    }
}

fn run_ingest(args: IngestArgs, store: Store, output_mode: OutputMode) -> miette::Result<()> {
    let specs = resolve_specs(&args)?;
    let options = IngestOptions { force: args.force };

    let mut results: Vec<IngestResult> = Vec::with_capacity(specs.len());
    for spec in &specs {
        let fetcher = HttpFetcher::with_retries(spec.download.retries)?;
        let app = App::new(store.clone(), fetcher);
        match output_mode {
            OutputMode::Console => {
                let result = app.ingest(spec, &options, &ConsoleOutput)?;
                ConsoleOutput::print_ingest(&result);
                results.push(result);
            }
            OutputMode::Json => results.push(app.ingest(spec, &options, &JsonOutput)?),
        }
    }

    if matches!(output_mode, OutputMode::Json) {
        JsonOutput::print_ingest(&results).into_diagnostic()?;
    }
    Ok(())
}

fn run_list(store: Store, output_mode: OutputMode) -> miette::Result<()> {
    let result = App::new(store, NoFetcher).list()?;
    match output_mode {
        OutputMode::Console => ConsoleOutput::print_list(&result),
        OutputMode::Json => JsonOutput::print_list(&result).into_diagnostic()?,
    }
    Ok(())
}

fn run_info(args: InfoArgs, store: Store, output_mode: OutputMode) -> miette::Result<()> {
    let app = App::new(store, NoFetcher);
    let result = match &args.config {
        Some(path) => app.info_for_spec(&ConfigLoader::load(path, args.pipeline)?)?,
        None => app.info(args.pipeline)?,
    };
    match output_mode {
        OutputMode::Console => ConsoleOutput::print_info(&result),
        OutputMode::Json => JsonOutput::print_info(&result).into_diagnostic()?,
    }
    Ok(())
}

fn run_clear(args: PipelineArgs, store: Store, output_mode: OutputMode) -> miette::Result<()> {
    let result = App::new(store, NoFetcher).clear(args.pipeline)?;
    match output_mode {
        OutputMode::Console => ConsoleOutput::print_clear(&result),
        OutputMode::Json => JsonOutput::print_clear(&result).into_diagnostic()?,
    }
    Ok(())
}

/// Stands in for the transport on commands that never download.
struct NoFetcher;

impl Fetcher for NoFetcher {
    fn fetch(
        &self,
        request: &FetchRequest<'_>,
        _sink: &mut dyn Write,
    ) -> Result<u64, IngestError> {
        Err(IngestError::Http(format!(
            "fetcher not configured for {}",
            request.url
        )))
    }
}
