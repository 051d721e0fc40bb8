use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use lineup_core::{IdentEngine, ReturnStatus};
use lineup_driver::paths::{PartitionPaths, Phase};
use lineup_driver::{controller, enroll, finalize, search, split};
use lineup_null::NullEngine;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Parser)]
#[command(name = "lineup", about = "1:N identification conformance test driver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract enrollment templates into per-partition EDB/manifest files
    #[command(disable_help_flag = true)]
    Enroll(DriverArgs),
    /// Consolidate partition artifacts and freeze the enrollment corpus
    #[command(disable_help_flag = true)]
    Finalize(DriverArgs),
    /// Search probe images against the finalized corpus
    #[command(disable_help_flag = true)]
    Search(DriverArgs),
    /// Internal re-entry point for spawned partition workers
    #[command(hide = true)]
    Worker(WorkerArgs),
}

/// Flag surface shared by the public verbs. `-h` carries the output
/// stem (the short help flag is disabled to make room); `--help` still
/// prints help.
#[derive(Args)]
struct DriverArgs {
    /// Read-only directory of engine configuration data
    #[arg(short = 'c', long = "config-dir", default_value = "config")]
    config_dir: PathBuf,
    /// Enrollment directory the finalized corpus lives in
    #[arg(short = 'e', long = "enroll-dir", default_value = "enroll")]
    enroll_dir: PathBuf,
    /// Directory all partition artifacts are written under
    #[arg(short = 'o', long = "output-dir", default_value = "output")]
    output_dir: PathBuf,
    /// Stem for per-partition report filenames
    #[arg(short = 'h', long = "output-stem", default_value = "stem")]
    output_stem: String,
    /// Input list of `subjectId imagePath` records
    #[arg(short = 'i', long = "input-file")]
    input_file: Option<PathBuf>,
    /// Worker processes to fan out across
    #[arg(short = 't', long = "num-workers", default_value_t = 1)]
    num_workers: usize,
    #[arg(long = "help", action = clap::ArgAction::HelpLong)]
    help: Option<bool>,
}

#[derive(Args)]
struct WorkerArgs {
    #[arg(long, value_enum)]
    phase: WorkerPhase,
    #[arg(long)]
    index: usize,
    #[arg(long)]
    config_dir: PathBuf,
    #[arg(long)]
    enroll_dir: PathBuf,
    #[arg(long)]
    output_dir: PathBuf,
    #[arg(long)]
    output_stem: String,
}

/// The two phases that fan out over partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WorkerPhase {
    Enroll,
    Search,
}

impl WorkerPhase {
    fn as_phase(self) -> Phase {
        match self {
            WorkerPhase::Enroll => Phase::Enroll,
            WorkerPhase::Search => Phase::Search,
        }
    }

    fn flag_value(self) -> &'static str {
        match self {
            WorkerPhase::Enroll => "enroll",
            WorkerPhase::Search => "search",
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Commands::Enroll(args) => run_batch(args, WorkerPhase::Enroll),
        Commands::Search(args) => run_batch(args, WorkerPhase::Search),
        Commands::Finalize(args) => {
            let mut engine = NullEngine::new();
            finalize::run_finalize(&mut engine, &args.output_dir, &args.enroll_dir)?;
            Ok(())
        }
        Commands::Worker(args) => run_worker(args),
    }
}

fn check(status: ReturnStatus, call: &str) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    bail!(
        "{call} returned code {} ({}): {}",
        status.code.as_i32(),
        status.code,
        status.info
    )
}

/// Initialize the engine sessions a phase needs. Search needs both the
/// probe-extraction and identification sessions, in that order.
fn init_sessions(
    engine: &mut dyn IdentEngine,
    phase: WorkerPhase,
    config_dir: &Path,
    enroll_dir: &Path,
) -> Result<()> {
    match phase {
        WorkerPhase::Enroll => check(
            engine.initialize_enrollment_session(config_dir),
            "initialize_enrollment_session",
        ),
        WorkerPhase::Search => {
            check(
                engine.initialize_probe_template_session(config_dir, enroll_dir),
                "initialize_probe_template_session",
            )?;
            check(
                engine.initialize_identification_session(config_dir, enroll_dir),
                "initialize_identification_session",
            )
        }
    }
}

/// Run one partition of a phase in this process.
fn run_partition(
    engine: &mut dyn IdentEngine,
    output_dir: &Path,
    stem: &str,
    phase: WorkerPhase,
    index: usize,
) -> Result<()> {
    let paths = PartitionPaths::new(output_dir, stem, phase.as_phase(), index);
    match phase {
        WorkerPhase::Enroll => {
            enroll::run_enroll_partition(engine, &paths)?;
        }
        WorkerPhase::Search => {
            search::run_search_partition(engine, &paths, search::CANDIDATE_LIST_LENGTH)?;
        }
    }
    Ok(())
}

fn worker_command(exe: &Path, args: &DriverArgs, phase: WorkerPhase, index: usize) -> Command {
    let mut cmd = Command::new(exe);
    cmd.arg("worker")
        .arg("--phase")
        .arg(phase.flag_value())
        .arg("--index")
        .arg(index.to_string())
        .arg("--config-dir")
        .arg(&args.config_dir)
        .arg("--enroll-dir")
        .arg(&args.enroll_dir)
        .arg("--output-dir")
        .arg(&args.output_dir)
        .arg("--output-stem")
        .arg(&args.output_stem);
    cmd
}

/// An enroll or search run: initialize, split, fan out, decide.
fn run_batch(args: DriverArgs, phase: WorkerPhase) -> Result<()> {
    if args.num_workers == 0 {
        bail!("-t numWorkers must be at least 1");
    }
    let input = args
        .input_file
        .clone()
        .with_context(|| format!("-i inputFile is required for {}", phase.flag_value()))?;

    // The engine under test is fixed at build time by the linked
    // provider crate; past this point only the capability set is used.
    let mut engine = NullEngine::new();

    // Fail fast on configuration problems before any work is partitioned.
    init_sessions(&mut engine, phase, &args.config_dir, &args.enroll_dir)?;

    let records = split::read_record_list(&input)?;
    split::write_partitions(&records, args.num_workers, &args.output_dir)?;
    tracing::info!(
        records = records.len(),
        workers = args.num_workers,
        phase = phase.flag_value(),
        "workload split"
    );

    let exe = std::env::current_exe().context("cannot locate worker executable")?;
    let report = controller::run_partitions(
        args.num_workers,
        // Single partition: run in-process; its failure is the run's.
        || {
            match run_partition(&mut engine, &args.output_dir, &args.output_stem, phase, 0) {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(error = %e, "partition 0 failed");
                    false
                }
            }
        },
        // Spawned workers re-initialize their own engine session; the
        // observable artifacts are identical to the in-process path.
        |index| worker_command(&exe, &args, phase, index),
    );

    if !report.success() {
        bail!("{} run failed; see worker reports above", phase.flag_value());
    }
    Ok(())
}

/// Entry point for a spawned partition worker.
fn run_worker(args: WorkerArgs) -> Result<()> {
    let mut engine = NullEngine::new();
    init_sessions(&mut engine, args.phase, &args.config_dir, &args.enroll_dir)?;
    run_partition(
        &mut engine,
        &args.output_dir,
        &args.output_stem,
        args.phase,
        args.index,
    )
}
