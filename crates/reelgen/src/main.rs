use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use reelgen::config::{Config, ServiceMode};
use reelgen::db::{default_database_path, Database};
use reelgen::error::{ConfigError, ReelgenError, StorageError};
use reelgen::job::{VideoInput, VideoJob};
use reelgen::pipeline::{Pipeline, PipelineConfig};
use reelgen::store::{JobStore, SqliteJobStore};
use reelgen::worker::{JobResult, WorkerPool};
use reelgen::{build_collaborators, load_config, logging, JobProgressBroadcaster};

#[derive(Parser, Debug)]
#[command(
    name = "reelgen",
    version,
    about = "Generate short-form videos from a topic",
    after_help = "Examples:\n  \
    reelgen submit input.json --owner alice\n  \
    reelgen run 3f2c9a1e-... --recreate\n  \
    reelgen --dry-run submit input.json"
)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, short, env = "REELGEN_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Use the built-in stub services instead of the configured endpoints
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a job from a JSON input file and run it
    Submit {
        input: PathBuf,
        #[arg(long, default_value = "local")]
        owner: String,
    },
    /// Run an existing job again
    Run {
        id: String,
        /// Clear previous progress and artifacts first
        #[arg(long)]
        recreate: bool,
    },
    /// Print a job record as JSON
    Show { id: String },
    /// List the jobs of an owner, newest first
    List {
        owner: String,
        #[arg(long)]
        oldest_first: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> reelgen::Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    if cli.dry_run {
        config.services.mode = ServiceMode::Stub;
    }
    logging::init_logging(&config.logging)?;

    let runtime = Runtime::new().map_err(ReelgenError::Runtime)?;
    let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(open_database(&config)?));

    match cli.command {
        Command::Submit { input, owner } => {
            let input = read_input(&input)?;
            input.validate(&config.music.tracks)?;
            let job = runtime.block_on(store.save(&VideoJob::new(owner, input)))?;
            println!("Created job {}", job.id);
            run_job(&runtime, &config, store, job, false)
        }
        Command::Run { id, recreate } => {
            let job = runtime.block_on(store.load(&id))?;
            run_job(&runtime, &config, store, job, recreate)
        }
        Command::Show { id } => {
            let job = runtime.block_on(store.load(&id))?;
            let view = serde_json::json!({
                "job": job,
                "flags": job.flags(),
                "userError": job.user_facing_error(),
            });
            println!("{:#}", view);
            Ok(ExitCode::SUCCESS)
        }
        Command::List {
            owner,
            oldest_first,
        } => {
            let jobs = runtime.block_on(store.list_by_owner(&owner, !oldest_first))?;
            for job in &jobs {
                println!(
                    "{}  {:<22} {:>3}%  {}  {}",
                    job.id,
                    job.stage().to_string(),
                    job.progress(),
                    job.created_at.format("%Y-%m-%d %H:%M"),
                    job.input.topic
                );
            }
            if jobs.is_empty() {
                println!("No jobs for {}", owner);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn open_database(config: &Config) -> reelgen::Result<Database> {
    let path = match &config.database_path {
        Some(path) => PathBuf::from(path),
        None => default_database_path().ok_or_else(|| ConfigError::Validation {
            message: "database_path is not set and no home directory was found".to_string(),
        })?,
    };
    Ok(Database::open(&path)?)
}

fn read_input(path: &Path) -> reelgen::Result<VideoInput> {
    let content = std::fs::read_to_string(path).map_err(|e| StorageError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| ReelgenError::InputFile {
        path: path.to_path_buf(),
        source: e,
    })
}

fn run_job(
    runtime: &Runtime,
    config: &Config,
    store: Arc<dyn JobStore>,
    job: VideoJob,
    recreate: bool,
) -> reelgen::Result<ExitCode> {
    let pipeline = Arc::new(Pipeline::new(
        Arc::new(PipelineConfig::from_config(config)),
        build_collaborators(config)?,
        store,
    ));

    let broadcaster = JobProgressBroadcaster::default();
    let mut events = broadcaster.subscribe();
    runtime.spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("[{:>3}%] {}: {}", event.progress, event.phase, event.message),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let pool = WorkerPool::with_broadcaster(pipeline, runtime.handle().clone(), 1, Some(broadcaster));

    let cancel = pool.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("Cancelling...");
        cancel.cancel();
    }) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    pool.submit(job, recreate)?;
    let result = pool.recv_result();
    pool.shutdown();
    pool.wait();

    Ok(report(result))
}

fn report(result: Option<JobResult>) -> ExitCode {
    let Some(result) = result else {
        eprintln!("error: worker stopped without a result");
        return ExitCode::FAILURE;
    };

    for warning in &result.warnings {
        println!("warning: {}", warning);
    }
    if result.success {
        let url = result.job.artifacts.final_video_url.as_deref().unwrap_or("");
        info!(job_id = %result.job_id, "Job finished");
        println!("Video ready: {}", url);
        ExitCode::SUCCESS
    } else {
        eprintln!(
            "Job {} failed: {}",
            result.job_id,
            result.error.as_deref().unwrap_or("unknown error")
        );
        ExitCode::FAILURE
    }
}
