use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use books_etl::cli::{Cli, Command, RunsCommand};
use books_etl::config::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    books_etl::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(err) if err.not_found() => {}
        Err(err) => return Err(err).context("load .env"),
    }

    let settings = Settings::from_env().context("load settings")?;
    tracing::debug!(?settings, "loaded settings");

    match cli.command {
        Command::Extract(args) => {
            let raw_path = tokio::task::block_in_place(|| books_etl::fetch::run(args, &settings))
                .context("extract")?;
            println!("{}", raw_path.display());
        }
        Command::Transform(args) => {
            let processed_path =
                tokio::task::block_in_place(|| books_etl::transform::run(args, &settings))
                    .context("transform")?;
            println!("{}", processed_path.display());
        }
        Command::Load(args) => {
            let loaded = tokio::task::block_in_place(|| books_etl::load::run(args, &settings))
                .context("load")?;
            println!("{loaded}");
        }
        Command::Run(args) => {
            books_etl::pipeline::run(args, &settings)
                .await
                .context("run")?;
        }
        Command::Schedule(args) => {
            books_etl::pipeline::schedule(args, &settings)
                .await
                .context("schedule")?;
        }
        Command::Runs {
            command: RunsCommand::Show(args),
        } => {
            books_etl::pipeline::show_run(args, &settings)
                .await
                .context("runs show")?;
        }
    }

    Ok(())
}
