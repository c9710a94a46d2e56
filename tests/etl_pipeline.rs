mod catalogue_stub;

use std::fs;
use std::path::{Path, PathBuf};

use books_etl::app::model::{Run, RunState, StepName, StepStatus};
use catalogue_stub::{CatalogueStub, CatalogueStubConfig};
use predicates::prelude::*;

const CONNECTION_ENV: [(&str, &str); 5] = [
    ("BOOKS_ETL_CONNECTION__USER", "etl"),
    ("BOOKS_ETL_CONNECTION__PASSWORD", "not-a-real-password"),
    ("BOOKS_ETL_CONNECTION__ACCOUNT", "local"),
    ("BOOKS_ETL_CONNECTION__WAREHOUSE", "COMPUTE_WH"),
    ("BOOKS_ETL_CONNECTION__SCHEMA", "PUBLIC"),
];

fn books_etl() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("books-etl");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn with_connection(cmd: &mut assert_cmd::Command, database: &Path) {
    for (key, value) in CONNECTION_ENV {
        cmd.env(key, value);
    }
    cmd.env("BOOKS_ETL_CONNECTION__DATABASE", database);
}

fn stdout_line(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_owned()
}

fn warehouse_titles(database: &Path) -> anyhow::Result<Vec<String>> {
    let conn = rusqlite::Connection::open(database)?;
    let mut statement = conn.prepare("SELECT title FROM BOOK_FINAL ORDER BY rowid")?;
    let titles = statement
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(titles)
}

fn only_run(runs_dir: &Path) -> anyhow::Result<Run> {
    let run_dirs: Vec<PathBuf> = fs::read_dir(runs_dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    assert_eq!(run_dirs.len(), 1, "expected exactly one run, got {run_dirs:?}");
    let json = fs::read_to_string(run_dirs[0].join("run.json"))?;
    Ok(serde_json::from_str(&json)?)
}

#[test]
fn extract_skips_failing_page_and_keeps_page_order() -> anyhow::Result<()> {
    let stub = CatalogueStub::spawn(CatalogueStubConfig {
        failing_pages: vec![3],
        ..CatalogueStubConfig::default()
    });
    let temp = tempfile::TempDir::new()?;
    let raw_path = temp.path().join("raw").join("books_raw.csv");

    books_etl()
        .env("BOOKS_ETL_CATALOGUE__BASE_URL", stub.catalogue_url())
        .args(["extract", "--out", raw_path.to_str().unwrap(), "--pages", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("books_raw.csv"))
        .stderr(predicate::str::contains("skipping page"));

    let records = books_etl::raw_store::read_raw_table(&raw_path)?;
    let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Book 1.1", "Book 1.2", "Book 2.1", "Book 2.2", "Book 4.1", "Book 4.2", "Book 5.1",
            "Book 5.2",
        ]
    );

    let first = &records[0];
    assert_eq!(first.price_text, "11.50");
    assert_eq!(first.availability_text, "In stock (1 available)");
    assert_eq!(first.rating_label, "One");
    assert_eq!(
        first.detail_link,
        format!("{}book-1-1_11/index.html", stub.catalogue_url())
    );
    assert_eq!(records[1].rating_label, "None");
    Ok(())
}

#[test]
fn extract_skips_page_without_product_markup() -> anyhow::Result<()> {
    let stub = CatalogueStub::spawn(CatalogueStubConfig {
        malformed_pages: vec![2],
        ..CatalogueStubConfig::default()
    });
    let temp = tempfile::TempDir::new()?;
    let raw_path = temp.path().join("books_raw.csv");

    books_etl()
        .args([
            "extract",
            "--out",
            raw_path.to_str().unwrap(),
            "--pages",
            "3",
            "--base-url",
            &stub.catalogue_url(),
        ])
        .assert()
        .success();

    let records = books_etl::raw_store::read_raw_table(&raw_path)?;
    let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Book 1.1", "Book 1.2", "Book 3.1", "Book 3.2"]);
    Ok(())
}

#[test]
fn unparsable_price_drops_only_that_row() -> anyhow::Result<()> {
    let stub = CatalogueStub::spawn(CatalogueStubConfig {
        unpriced_pages: vec![2],
        ..CatalogueStubConfig::default()
    });
    let temp = tempfile::TempDir::new()?;
    let raw_path = temp.path().join("books_raw.csv");
    let processed_path = temp.path().join("books_final.csv");

    books_etl()
        .args([
            "extract",
            "--out",
            raw_path.to_str().unwrap(),
            "--pages",
            "2",
            "--base-url",
            &stub.catalogue_url(),
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("skipping page").not());

    let raw = books_etl::raw_store::read_raw_table(&raw_path)?;
    assert_eq!(raw.len(), 4);
    assert_eq!(raw[2].price_text, "Price on request");

    books_etl()
        .args([
            "transform",
            "--raw",
            raw_path.to_str().unwrap(),
            "--out",
            processed_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    let processed = books_etl::processed_store::read_processed_table(&processed_path)?;
    let titles: Vec<&str> = processed.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Book 1.1", "Book 2.2"]);
    Ok(())
}

#[test]
fn stage_commands_hand_off_through_artifact_locations() -> anyhow::Result<()> {
    let stub = CatalogueStub::spawn(CatalogueStubConfig::default());
    let temp = tempfile::TempDir::new()?;
    let raw_path = temp.path().join("raw").join("books_raw.csv");
    let processed_path = temp.path().join("processed").join("books_final.csv");
    let database = temp.path().join("warehouse.db");

    let output = books_etl()
        .env("BOOKS_ETL_ARTIFACTS__RAW_PATH", &raw_path)
        .env("BOOKS_ETL_CATALOGUE__BASE_URL", stub.catalogue_url())
        .env("BOOKS_ETL_CATALOGUE__PAGE_COUNT", "2")
        .arg("extract")
        .output()?;
    assert!(output.status.success(), "extract failed: {output:?}");
    let handed_off_raw = stdout_line(&output);
    assert_eq!(Path::new(&handed_off_raw), raw_path);

    let output = books_etl()
        .args([
            "transform",
            "--raw",
            &handed_off_raw,
            "--out",
            processed_path.to_str().unwrap(),
        ])
        .output()?;
    assert!(output.status.success(), "transform failed: {output:?}");
    let handed_off_processed = stdout_line(&output);

    let processed = books_etl::processed_store::read_processed_table(Path::new(
        &handed_off_processed,
    ))?;
    let titles: Vec<&str> = processed.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Book 1.1", "Book 2.1", "Book 2.2"]);
    assert_eq!(processed[0].price, 11.5);
    assert!(processed[0].in_stock);
    assert!(!processed[2].in_stock);
    assert_eq!(processed[2].rating_number, 2);

    let mut cmd = books_etl();
    with_connection(&mut cmd, &database);
    cmd.args(["load", "--processed", &handed_off_processed])
        .assert()
        .success()
        .stdout("3\n")
        .stderr(predicate::str::contains("dataset statistics"));

    assert_eq!(
        warehouse_titles(&database)?,
        vec!["Book 1.1", "Book 2.1", "Book 2.2"]
    );
    Ok(())
}

#[test]
fn run_command_records_every_step() -> anyhow::Result<()> {
    let stub = CatalogueStub::spawn(CatalogueStubConfig {
        failing_pages: vec![2],
        ..CatalogueStubConfig::default()
    });
    let temp = tempfile::TempDir::new()?;
    let raw_path = temp.path().join("raw").join("books_raw.csv");
    let processed_path = temp.path().join("processed").join("books_final.csv");
    let database = temp.path().join("warehouse.db");
    let runs_dir = temp.path().join("runs");

    let mut cmd = books_etl();
    with_connection(&mut cmd, &database);
    let output = cmd
        .env("BOOKS_ETL_CATALOGUE__BASE_URL", stub.catalogue_url())
        .env("BOOKS_ETL_CATALOGUE__PAGE_COUNT", "3")
        .env("BOOKS_ETL_ARTIFACTS__RAW_PATH", &raw_path)
        .env("BOOKS_ETL_ARTIFACTS__PROCESSED_PATH", &processed_path)
        .env("BOOKS_ETL_ORCHESTRATOR__RUNS_DIR", &runs_dir)
        .arg("run")
        .output()?;
    assert!(output.status.success(), "run failed: {output:?}");
    let run_id = stdout_line(&output);

    let run = only_run(&runs_dir)?;
    assert_eq!(run.run_id, run_id);
    assert_eq!(run.state, RunState::Done);
    assert_eq!(
        run.step(StepName::Extract).output.as_deref(),
        raw_path.to_str()
    );
    assert_eq!(
        run.step(StepName::Transform).output.as_deref(),
        processed_path.to_str()
    );
    assert_eq!(run.step(StepName::Load).output.as_deref(), Some("3"));
    for name in StepName::ALL {
        assert_eq!(run.step(name).status, StepStatus::Succeeded);
        assert_eq!(run.step(name).attempts, 1);
    }

    assert_eq!(
        warehouse_titles(&database)?,
        vec!["Book 1.1", "Book 3.1", "Book 3.2"]
    );

    books_etl()
        .env("BOOKS_ETL_ORCHESTRATOR__RUNS_DIR", &runs_dir)
        .args(["runs", "show", "--run-id", &run_id])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""state": "done""#))
        .stdout(predicate::str::contains(r#""pipeline": "books_etl_pipeline""#));
    Ok(())
}

#[test]
fn load_connection_failure_retries_load_once_then_fails_run() -> anyhow::Result<()> {
    let stub = CatalogueStub::spawn(CatalogueStubConfig::default());
    let temp = tempfile::TempDir::new()?;
    let raw_path = temp.path().join("raw").join("books_raw.csv");
    let processed_path = temp.path().join("processed").join("books_final.csv");
    let database = temp.path().join("no-such-dir").join("warehouse.db");
    let runs_dir = temp.path().join("runs");

    let mut cmd = books_etl();
    with_connection(&mut cmd, &database);
    cmd.env("BOOKS_ETL_CATALOGUE__BASE_URL", stub.catalogue_url())
        .env("BOOKS_ETL_CATALOGUE__PAGE_COUNT", "1")
        .env("BOOKS_ETL_ARTIFACTS__RAW_PATH", &raw_path)
        .env("BOOKS_ETL_ARTIFACTS__PROCESSED_PATH", &processed_path)
        .env("BOOKS_ETL_ORCHESTRATOR__RUNS_DIR", &runs_dir)
        .args(["run", "--retry-delay-secs", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed at load"))
        .stderr(predicate::str::contains("not-a-real-password").not());

    let run = only_run(&runs_dir)?;
    assert_eq!(run.state, RunState::Failed);
    assert_eq!(run.step(StepName::Extract).attempts, 1);
    assert_eq!(run.step(StepName::Transform).attempts, 1);

    let load = run.step(StepName::Load);
    assert_eq!(load.status, StepStatus::Failed);
    assert_eq!(load.attempts, 2);
    assert!(
        load.error
            .as_deref()
            .is_some_and(|err| err.contains("connect to warehouse"))
    );
    assert!(!database.exists());
    Ok(())
}
