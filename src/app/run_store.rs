use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::fs;

use crate::app::model::Run;

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn get(&self, run_id: &str) -> anyhow::Result<Option<Run>>;
    async fn put(&self, run: &Run) -> anyhow::Result<()>;
}

/// Keeps one `run.json` per run under `<base_dir>/<run_id>/`.
#[derive(Debug, Clone)]
pub struct LocalFsRunStore {
    base_dir: PathBuf,
}

impl LocalFsRunStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.base_dir.join(run_id)
    }

    pub fn run_json_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("run.json")
    }
}

#[async_trait]
impl RunStore for LocalFsRunStore {
    async fn get(&self, run_id: &str) -> anyhow::Result<Option<Run>> {
        if run_id.is_empty() || run_id.contains(['/', '\\']) || run_id.contains("..") {
            anyhow::bail!("invalid run id: {run_id:?}");
        }
        let path = self.run_json_path(run_id);
        read_json(&path)
            .await
            .with_context(|| format!("read: {}", path.display()))
    }

    async fn put(&self, run: &Run) -> anyhow::Result<()> {
        write_json_atomic(&self.run_json_path(&run.run_id), run)
            .await
            .context("write run.json")?;
        Ok(())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let value = serde_json::from_slice(&bytes).context("parse json")?;
    Ok(Some(value))
}

async fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::model::{RunState, StepName, StepStatus};

    #[tokio::test]
    async fn missing_run_is_none() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let store = LocalFsRunStore::new(temp.path());
        assert!(store.get("does-not-exist").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn put_overwrites_previous_snapshot() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let store = LocalFsRunStore::new(temp.path().join("runs"));
        let mut run = Run::new();
        store.put(&run).await?;

        run.state = RunState::Done;
        run.step_mut(StepName::Extract).status = StepStatus::Succeeded;
        run.step_mut(StepName::Extract).output = Some("/data/raw/books_raw.csv".to_owned());
        store.put(&run).await?;

        let stored = store
            .get(&run.run_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("run not stored"))?;
        assert_eq!(stored.state, RunState::Done);
        assert_eq!(
            stored.step(StepName::Extract).output.as_deref(),
            Some("/data/raw/books_raw.csv")
        );

        let files = std::fs::read_dir(temp.path().join("runs").join(&run.run_id))?.count();
        assert_eq!(files, 1, "expected only run.json");
        Ok(())
    }

    #[tokio::test]
    async fn rejects_path_like_run_ids() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let store = LocalFsRunStore::new(temp.path());
        assert!(store.get("../etc").await.is_err());
        assert!(store.get("").await.is_err());
        Ok(())
    }
}
