use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PIPELINE_NAME: &str = "books_etl_pipeline";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Extract,
    Transform,
    Load,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Extract,
    Transform,
    Load,
}

impl StepName {
    pub const ALL: [StepName; 3] = [Self::Extract, Self::Transform, Self::Load];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Transform => "transform",
            Self::Load => "load",
        }
    }

    pub fn state(self) -> RunState {
        match self {
            Self::Extract => RunState::Extract,
            Self::Transform => RunState::Transform,
            Self::Load => RunState::Load,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Extract => 0,
            Self::Transform => 1,
            Self::Load => 2,
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: StepName,
    pub status: StepStatus,
    pub attempts: u32,
    /// Hand-off value: the artifact location for extract/transform, the row count for load.
    pub output: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    fn pending(name: StepName) -> Self {
        Self {
            name,
            status: StepStatus::Pending,
            attempts: 0,
            output: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub pipeline: String,
    pub state: RunState,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    pub steps: [StepRecord; 3],
}

impl Run {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            pipeline: PIPELINE_NAME.to_owned(),
            state: RunState::Extract,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            steps: StepName::ALL.map(StepRecord::pending),
        }
    }

    pub fn step(&self, name: StepName) -> &StepRecord {
        &self.steps[name.index()]
    }

    pub fn step_mut(&mut self, name: StepName) -> &mut StepRecord {
        &mut self.steps[name.index()]
    }
}

impl Default for Run {
    fn default() -> Self {
        Self::new()
    }
}
