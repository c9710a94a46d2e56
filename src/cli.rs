use clap::{Args, Parser, Subcommand};

/// Daily books catalogue ETL: extract -> transform -> load.
///
/// Settings come from `BOOKS_ETL_*` environment variables; flags override them.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scrape catalogue pages into the raw table; prints its location.
    Extract(ExtractArgs),
    /// Clean the raw table into the processed table; prints its location.
    Transform(TransformArgs),
    /// Insert the processed table into the warehouse; prints the rows loaded.
    Load(LoadArgs),
    /// Execute one end-to-end run with per-step retry.
    Run(RunArgs),
    /// Trigger one run per day until interrupted.
    Schedule(ScheduleArgs),
    Runs {
        #[command(subcommand)]
        command: RunsCommand,
    },
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Output path for the raw table (default: BOOKS_ETL_ARTIFACTS__RAW_PATH).
    #[arg(long)]
    pub out: Option<String>,

    /// Number of catalogue pages to fetch.
    #[arg(long)]
    pub pages: Option<u32>,

    /// Catalogue base URL; page N is `<base-url>page-N.html`.
    #[arg(long)]
    pub base_url: Option<String>,
}

#[derive(Debug, Args)]
pub struct TransformArgs {
    /// Raw table (created by `extract`).
    #[arg(long)]
    pub raw: Option<String>,

    /// Output path for the processed table (default: BOOKS_ETL_ARTIFACTS__PROCESSED_PATH).
    #[arg(long)]
    pub out: Option<String>,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Processed table (created by `transform`).
    #[arg(long)]
    pub processed: Option<String>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Retries per failed step.
    #[arg(long)]
    pub retries: Option<u32>,

    /// Delay before retrying a failed step.
    #[arg(long)]
    pub retry_delay_secs: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ScheduleArgs {
    /// Daily trigger time in UTC, `HH:MM`.
    #[arg(long)]
    pub at: Option<String>,

    /// Also run once immediately on start.
    #[arg(long)]
    pub run_now: bool,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Debug, Subcommand)]
pub enum RunsCommand {
    /// Print a recorded run as JSON.
    Show(RunsShowArgs),
}

#[derive(Debug, Args)]
pub struct RunsShowArgs {
    #[arg(long)]
    pub run_id: String,
}
