use std::path::Path;

use anyhow::Context as _;

use crate::formats::CleanedBookRecord;

pub const PROCESSED_TABLE_COLUMNS: [&str; 5] =
    ["title", "price", "in_stock", "rating_number", "link"];

pub fn write_processed_table(path: &Path, records: &[CleanedBookRecord]) -> anyhow::Result<()> {
    crate::table::write_table(path, &PROCESSED_TABLE_COLUMNS, records)
        .with_context(|| format!("write processed table: {}", path.display()))
}

pub fn read_processed_table(path: &Path) -> anyhow::Result<Vec<CleanedBookRecord>> {
    crate::table::read_table(path)
        .with_context(|| format!("read processed table: {}", path.display()))
}
