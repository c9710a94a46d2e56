use std::path::{Path, PathBuf};

use crate::cli::TransformArgs;
use crate::config::Settings;
use crate::formats::{CleanedBookRecord, RawBookRecord};

const IN_STOCK_MARKER: &str = "In stock";

#[derive(Debug, Clone, PartialEq)]
pub struct TransformReport {
    pub records: Vec<CleanedBookRecord>,
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropReason {
    UnparsablePrice,
    UnmappedRating,
    MissingValue,
}

pub fn run(args: TransformArgs, settings: &Settings) -> anyhow::Result<PathBuf> {
    let raw_path = match args.raw {
        Some(raw) => PathBuf::from(raw),
        None => settings.artifacts.raw_path()?.to_path_buf(),
    };
    let out_path = match args.out {
        Some(out) => PathBuf::from(out),
        None => settings.artifacts.processed_path()?.to_path_buf(),
    };

    transform_file(&raw_path, &out_path)
}

/// Reads the raw table at `raw_path`, writes the processed table to
/// `out_path`, and returns the processed location.
pub fn transform_file(raw_path: &Path, out_path: &Path) -> anyhow::Result<PathBuf> {
    let raw = crate::raw_store::read_raw_table(raw_path)?;
    tracing::info!(rows = raw.len(), raw = %raw_path.display(), "transform: raw table loaded");

    let report = transform_report(&raw);
    crate::processed_store::write_processed_table(out_path, &report.records)?;

    tracing::info!(
        rows = report.records.len(),
        dropped = report.dropped,
        out = %out_path.display(),
        "transform: processed table written"
    );
    Ok(out_path.to_path_buf())
}

pub fn transform(raw: &[RawBookRecord]) -> Vec<CleanedBookRecord> {
    transform_report(raw).records
}

/// Cleans every raw record, keeping input order and counting the rows dropped.
pub fn transform_report(raw: &[RawBookRecord]) -> TransformReport {
    let mut records = Vec::with_capacity(raw.len());
    let mut dropped = 0;

    for record in raw {
        match clean_record(record) {
            Ok(cleaned) => records.push(cleaned),
            Err(reason) => {
                dropped += 1;
                tracing::debug!(
                    title = %record.title,
                    price = %record.price_text,
                    rating = %record.rating_label,
                    ?reason,
                    "transform: dropping row"
                );
            }
        }
    }

    TransformReport { records, dropped }
}

fn clean_record(raw: &RawBookRecord) -> Result<CleanedBookRecord, DropReason> {
    let price = normalize_price(&raw.price_text);
    let in_stock = is_in_stock(&raw.availability_text);
    let rating_number = rating_number(&raw.rating_label);

    // Every derived column is computed first; a row missing any value is then purged.
    if raw.title.is_empty() || raw.detail_link.is_empty() {
        return Err(DropReason::MissingValue);
    }
    let price = price.ok_or(DropReason::UnparsablePrice)?;
    let rating_number = rating_number.ok_or(DropReason::UnmappedRating)?;

    Ok(CleanedBookRecord {
        title: raw.title.clone(),
        price,
        in_stock,
        rating_number,
        detail_link: raw.detail_link.clone(),
    })
}

/// Keeps only ASCII digits and `.` and parses the rest; `None` when nothing
/// parseable (or nothing non-negative and finite) remains.
pub fn normalize_price(price_text: &str) -> Option<f64> {
    let digits: String = price_text
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '.')
        .collect();
    let price = digits.parse::<f64>().ok()?;
    (price.is_finite() && price >= 0.0).then_some(price)
}

pub fn is_in_stock(availability_text: &str) -> bool {
    availability_text.contains(IN_STOCK_MARKER)
}

pub fn rating_number(rating_label: &str) -> Option<u8> {
    match rating_label {
        "One" => Some(1),
        "Two" => Some(2),
        "Three" => Some(3),
        "Four" => Some(4),
        "Five" => Some(5),
        _ => None,
    }
}
