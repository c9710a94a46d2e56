use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::Utc;

use crate::app::model::{Run, RunState, StepName, StepStatus};
use crate::app::run_store::RunStore;

/// The three blocking units of work a run threads together.
pub trait PipelineStages: Send + Sync {
    /// Scrapes the catalogue and returns the raw table location.
    fn extract(&self) -> anyhow::Result<PathBuf>;

    /// Cleans the raw table at `raw` and returns the processed table location.
    fn transform(&self, raw: &Path) -> anyhow::Result<PathBuf>;

    /// Loads the processed table at `processed` and returns the rows loaded.
    fn load(&self, processed: &Path) -> anyhow::Result<usize>;
}

/// A failed step is re-executed whole, up to `retries` more times, after `delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    fn max_attempts(self) -> u32 {
        self.retries.saturating_add(1)
    }
}

pub trait StepOutput: Send + 'static {
    fn hand_off(&self) -> String;
}

impl StepOutput for PathBuf {
    fn hand_off(&self) -> String {
        self.to_string_lossy().to_string()
    }
}

impl StepOutput for usize {
    fn hand_off(&self) -> String {
        self.to_string()
    }
}

pub struct PipelineRunner {
    stages: Arc<dyn PipelineStages>,
    run_store: Arc<dyn RunStore>,
    retry: RetryPolicy,
}

impl PipelineRunner {
    pub fn new(
        stages: Arc<dyn PipelineStages>,
        run_store: Arc<dyn RunStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            stages,
            run_store,
            retry,
        }
    }

    /// Executes one run to a terminal state and returns its final record.
    ///
    /// A failing step leaves the run `Failed`, which is reported through the
    /// returned record; `Err` is reserved for failures to persist the record.
    pub async fn run(&self) -> anyhow::Result<Run> {
        let mut run = Run::new();
        run.started_at = Some(Utc::now());
        self.run_store.put(&run).await.context("save run")?;
        tracing::info!(run_id = %run.run_id, pipeline = %run.pipeline, "run started");

        let outcome = self.execute(&mut run).await;

        run.finished_at = Some(Utc::now());
        match outcome {
            Ok(()) => {
                run.state = RunState::Done;
                tracing::info!(run_id = %run.run_id, "run done");
            }
            Err(err) => {
                run.state = RunState::Failed;
                tracing::error!(run_id = %run.run_id, ?err, "run failed");
            }
        }
        self.run_store.put(&run).await.context("save run")?;

        Ok(run)
    }

    async fn execute(&self, run: &mut Run) -> anyhow::Result<()> {
        let stages = Arc::clone(&self.stages);
        let raw_path = self
            .run_step(run, StepName::Extract, move || stages.extract())
            .await?;

        let stages = Arc::clone(&self.stages);
        let processed_path = self
            .run_step(run, StepName::Transform, move || stages.transform(&raw_path))
            .await?;

        let stages = Arc::clone(&self.stages);
        self.run_step(run, StepName::Load, move || stages.load(&processed_path))
            .await?;

        Ok(())
    }

    async fn run_step<T, F>(&self, run: &mut Run, name: StepName, step: F) -> anyhow::Result<T>
    where
        T: StepOutput,
        F: Fn() -> anyhow::Result<T> + Clone + Send + 'static,
    {
        run.state = name.state();
        {
            let record = run.step_mut(name);
            record.status = StepStatus::Running;
            record.started_at = Some(Utc::now());
        }

        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            run.step_mut(name).attempts = attempt;
            self.run_store.put(run).await.context("save run")?;
            tracing::info!(run_id = %run.run_id, step = %name, attempt, "step started");

            let result = tokio::task::spawn_blocking(step.clone())
                .await
                .with_context(|| format!("{name} step panicked"))
                .and_then(|result| result);

            match result {
                Ok(output) => {
                    let record = run.step_mut(name);
                    record.status = StepStatus::Succeeded;
                    record.output = Some(output.hand_off());
                    record.error = None;
                    record.finished_at = Some(Utc::now());
                    tracing::info!(
                        run_id = %run.run_id,
                        step = %name,
                        output = ?run.step(name).output,
                        "step succeeded"
                    );
                    self.run_store.put(run).await.context("save run")?;
                    return Ok(output);
                }
                Err(err) if attempt < max_attempts => {
                    tracing::warn!(
                        run_id = %run.run_id,
                        step = %name,
                        attempt,
                        retry_in_secs = self.retry.delay.as_secs(),
                        ?err,
                        "step failed; retrying"
                    );
                    run.step_mut(name).error = Some(format!("{err:#}"));
                    self.run_store.put(run).await.context("save run")?;
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(err) => {
                    let record = run.step_mut(name);
                    record.status = StepStatus::Failed;
                    record.error = Some(format!("{err:#}"));
                    record.finished_at = Some(Utc::now());
                    self.run_store.put(run).await.context("save run")?;
                    return Err(err.context(format!("{name} failed after {attempt} attempt(s)")));
                }
            }
        }
    }
}
