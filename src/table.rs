use std::path::Path;

use anyhow::Context as _;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Writes `rows` as CSV to `path`, replacing any previous table there.
///
/// The table is written to a sibling temp file and renamed into place, so a
/// reader never observes a partially written artifact. `header` is written
/// explicitly when `rows` is empty.
pub fn write_table<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> anyhow::Result<()> {
    if let Some(parent_dir) = path.parent()
        && !parent_dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent_dir)
            .with_context(|| format!("create table parent dir: {}", parent_dir.display()))?;
    }

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    if let Err(err) = write_csv(&tmp_path, header, rows) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(err);
    }
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("rename tmp table to final: {}", path.display()))?;

    Ok(())
}

fn write_csv<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("create table: {}", path.display()))?;
    if rows.is_empty() {
        writer
            .write_record(header)
            .context("write table header")?;
    }
    for (idx, row) in rows.iter().enumerate() {
        writer
            .serialize(row)
            .with_context(|| format!("write table row {}", idx + 1))?;
    }
    writer
        .flush()
        .with_context(|| format!("flush table: {}", path.display()))?;
    Ok(())
}

pub fn read_table<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open table: {}", path.display()))?;

    let mut rows = Vec::new();
    for (idx, row) in reader.deserialize().enumerate() {
        let row = row.with_context(|| format!("parse row {} of {}", idx + 1, path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}
