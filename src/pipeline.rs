use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;

use crate::app::model::RunState;
use crate::app::run_store::{LocalFsRunStore, RunStore};
use crate::app::runner::{PipelineRunner, PipelineStages, RetryPolicy};
use crate::cli::{RunArgs, RunsShowArgs, ScheduleArgs};
use crate::config::{ConnectionConfig, Settings};
use crate::fetch::CatalogueSource;
use crate::load::SqliteWarehouse;

/// Production stages: scrape over HTTP, CSV artifacts on disk, SQLite warehouse.
pub struct EtlStages {
    source: CatalogueSource,
    page_count: u32,
    raw_path: PathBuf,
    processed_path: PathBuf,
    connection: ConnectionConfig,
}

impl EtlStages {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        settings
            .ensure_pipeline_ready()
            .context("check pipeline settings")?;

        Ok(Self {
            source: CatalogueSource::new(&settings.catalogue.base_url)?,
            page_count: settings.catalogue.page_count,
            raw_path: settings.artifacts.raw_path()?.to_path_buf(),
            processed_path: settings.artifacts.processed_path()?.to_path_buf(),
            connection: settings.connection.resolve()?,
        })
    }
}

impl PipelineStages for EtlStages {
    fn extract(&self) -> anyhow::Result<PathBuf> {
        crate::fetch::extract_to(&self.raw_path, &self.source, self.page_count)
    }

    fn transform(&self, raw: &Path) -> anyhow::Result<PathBuf> {
        crate::transform::transform_file(raw, &self.processed_path)
    }

    fn load(&self, processed: &Path) -> anyhow::Result<usize> {
        let loaded = crate::load::load_file(processed, &self.connection, &SqliteWarehouse)?;
        Ok(loaded)
    }
}

fn build_runner(args: &RunArgs, settings: &Settings) -> anyhow::Result<PipelineRunner> {
    let stages = EtlStages::from_settings(settings)?;
    let retry = RetryPolicy {
        retries: args.retries.unwrap_or(settings.orchestrator.retries),
        delay: args
            .retry_delay_secs
            .map(std::time::Duration::from_secs)
            .unwrap_or_else(|| settings.orchestrator.retry_delay()),
    };
    let run_store = LocalFsRunStore::new(&settings.orchestrator.runs_dir);

    Ok(PipelineRunner::new(
        Arc::new(stages),
        Arc::new(run_store),
        retry,
    ))
}

pub async fn run(args: RunArgs, settings: &Settings) -> anyhow::Result<()> {
    let runner = build_runner(&args, settings)?;
    let run = runner.run().await?;

    println!("{}", run.run_id);
    if run.state != RunState::Done {
        let failed_step = run
            .steps
            .iter()
            .find(|step| step.error.is_some() && step.finished_at.is_some());
        match failed_step {
            Some(step) => anyhow::bail!(
                "run {} failed at {}: {}",
                run.run_id,
                step.name,
                step.error.as_deref().unwrap_or_default()
            ),
            None => anyhow::bail!("run {} failed", run.run_id),
        }
    }
    Ok(())
}

pub async fn schedule(args: ScheduleArgs, settings: &Settings) -> anyhow::Result<()> {
    let at = match args.at.as_deref() {
        Some(at) => crate::config::parse_daily_at(at)?,
        None => settings.orchestrator.daily_at()?,
    };
    let runner = build_runner(&args.run, settings)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(());
            }
            Err(err) => tracing::warn!(?err, "scheduler: cannot listen for ctrl-c"),
        }
    });
    let shutdown = async move {
        if shutdown_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    tracing::info!(at = %at, run_now = args.run_now, "scheduler: started");
    crate::app::scheduler::run_daily(&runner, at, args.run_now, shutdown).await;
    Ok(())
}

pub async fn show_run(args: RunsShowArgs, settings: &Settings) -> anyhow::Result<()> {
    let store = LocalFsRunStore::new(&settings.orchestrator.runs_dir);
    let run = store
        .get(&args.run_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("run not found: {}", args.run_id))?;

    let json = serde_json::to_string_pretty(&run).context("serialize run")?;
    println!("{json}");
    Ok(())
}
