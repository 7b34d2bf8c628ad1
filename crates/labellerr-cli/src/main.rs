//! Labellerr CLI
//!
//! Thin command-line front end over `labellerr-sdk`. Results are printed to
//! stdout as pretty JSON; logs go to stderr and, optionally, a daily log file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use labellerr_sdk::{
    AnnotationSource, ClientConfig, ConfidenceBucket, DataType, DatasetQuery, DatasetScope,
    ExportConfig, ExportFormat, ExportStatus, JobHandle, LabellerrClient, UploadRequest,
};

#[derive(Debug, Parser)]
#[command(name = "labellerr", version, about = "CLI for the Labellerr annotation platform")]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to a daily-rotated file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a pre-annotation file and track its processing job
    Upload {
        #[arg(long)]
        project: String,
        #[arg(long)]
        client: String,
        /// json, coco_json (coco), csv or png
        #[arg(long)]
        format: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        confidence: Option<ConfidenceBucket>,
        /// Poll budget in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Return after submission and wait on the background handle instead
        #[arg(long)]
        background: bool,
        /// With --background: how long to wait for the outcome before giving up
        #[arg(long, default_value_t = 0)]
        wait_secs: u64,
    },
    /// Check or poll the status of a submitted job
    Status {
        #[arg(long)]
        project: String,
        #[arg(long)]
        client: String,
        #[arg(long)]
        job: String,
        /// Keep polling until the job reaches a terminal status
        #[arg(long)]
        follow: bool,
    },
    /// List projects for a client
    Projects {
        #[arg(long)]
        client: String,
    },
    /// List linked and unlinked datasets for a project
    Datasets {
        #[arg(long)]
        client: String,
        #[arg(long)]
        data_type: DataType,
        #[arg(long)]
        project: String,
        #[arg(long, default_value = "client")]
        scope: DatasetScope,
    },
    /// Request a local export of a project's annotations
    Export {
        #[arg(long)]
        project: String,
        #[arg(long)]
        client: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        format: ExportFormat,
        /// Annotation statuses to include (repeatable)
        #[arg(long = "status", required = true)]
        statuses: Vec<ExportStatus>,
    },
    /// Check the progress of exports, fetching download details for ready ones
    #[command(name = "export-status")]
    CheckExport {
        #[arg(long)]
        project: String,
        #[arg(long)]
        client: String,
        /// Export (report) id to check (repeatable)
        #[arg(long = "report", required = true)]
        reports: Vec<String>,
    },
    /// Fetch the download details of a finished export
    DownloadUrl {
        #[arg(long)]
        project: String,
        #[arg(long)]
        client: String,
        #[arg(long)]
        export: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose, cli.log_dir.as_deref())?;

    let config = load_config(cli.config.as_deref())?;
    let client = LabellerrClient::new(config).context("Failed to create Labellerr client")?;

    let outcome = run(&client, cli.command).await;
    client.close().await?;
    outcome
}

fn init_logging(verbose: u8, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::prelude::*;

    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let env_filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log dir {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "labellerr.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);

    Ok(guard)
}

fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => ClientConfig::default_path(),
    };

    let mut config = match path {
        Some(path) => ClientConfig::load(&path)?,
        None => ClientConfig::default(),
    };
    config.apply_env();
    config.normalize();
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(client: &LabellerrClient, command: Command) -> Result<()> {
    match command {
        Command::Upload {
            project,
            client: client_id,
            format,
            file,
            confidence,
            timeout_secs,
            background,
            wait_secs,
        } => {
            let mut request =
                UploadRequest::new(project, client_id, format, AnnotationSource::Path(file));
            if let Some(bucket) = confidence {
                request = request.with_confidence_bucket(bucket);
            }

            let mut options = client.default_poll_options();
            if let Some(secs) = timeout_secs {
                options = options.with_timeout(Duration::from_secs(secs));
            }

            if !background {
                let result = client.upload_sync(&request, options.timeout).await?;
                return print_json(&result);
            }

            let handle = client.upload_async_with(&request, options).await?;
            info!(job_id = %handle.job().job_id, "Upload submitted");
            if wait_secs == 0 {
                return print_json(handle.job());
            }

            let result = handle.result(Duration::from_secs(wait_secs)).await?;
            print_json(&result)
        }
        Command::Status {
            project,
            client: client_id,
            job,
            follow,
        } => {
            let job = JobHandle::new(job, project, client_id);
            if follow {
                let result = client.poll_job(&job, None).await?;
                print_json(&result)
            } else {
                let status = client.check_job_status(&job).await?;
                print_json(&json!({ "job_id": job.job_id, "status": status }))
            }
        }
        Command::Projects { client: client_id } => {
            let projects = client.list_projects(&client_id).await?;
            print_json(&projects)
        }
        Command::Datasets {
            client: client_id,
            data_type,
            project,
            scope,
        } => {
            let query = DatasetQuery::new(client_id, data_type, project).with_scope(scope);
            let listing = client.list_datasets(&query).await?;
            print_json(&listing)
        }
        Command::Export {
            project,
            client: client_id,
            name,
            description,
            format,
            statuses,
        } => {
            let export = ExportConfig {
                export_name: name,
                export_description: description,
                export_format: format,
                statuses,
            };
            let created = client
                .create_local_export(&project, &client_id, &export)
                .await?;
            print_json(&created)
        }
        Command::CheckExport {
            project,
            client: client_id,
            reports,
        } => {
            let report = client
                .check_export_status(&project, &reports, &client_id)
                .await?;
            print_json(&report)
        }
        Command::DownloadUrl {
            project,
            client: client_id,
            export,
        } => {
            let download = client
                .fetch_download_url(&project, &export, &client_id)
                .await?;
            print_json(&download)
        }
    }
}
