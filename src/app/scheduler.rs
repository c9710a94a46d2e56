use std::future::Future;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};

use crate::app::runner::PipelineRunner;

/// Next daily trigger strictly after `now`, at `at` UTC.
pub fn next_fire_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    }
}

/// Triggers one run per day at `at` (UTC) until `shutdown` completes.
///
/// Runs execute one after another on this task. Intervals missed while a run
/// was in progress are skipped, not back-filled. `shutdown` is only observed
/// between runs; a run in progress always finishes.
pub async fn run_daily<F>(runner: &PipelineRunner, at: NaiveTime, run_now: bool, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    if run_now {
        trigger(runner).await;
    }

    loop {
        let now = Utc::now();
        let next = next_fire_after(now, at);
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::info!(next_run = %next.to_rfc3339(), "scheduler: waiting for next run");

        tokio::select! {
            biased;
            () = &mut shutdown => {
                tracing::info!("scheduler: shutdown requested");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        trigger(runner).await;
    }
}

async fn trigger(runner: &PipelineRunner) {
    match runner.run().await {
        Ok(run) => {
            tracing::info!(run_id = %run.run_id, state = ?run.state, "scheduler: run finished");
        }
        Err(err) => {
            tracing::error!(?err, "scheduler: run could not be recorded");
        }
    }
}
