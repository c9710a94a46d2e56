use std::path::Path;

use anyhow::Context as _;

use crate::formats::RawBookRecord;

pub const RAW_TABLE_COLUMNS: [&str; 5] = ["title", "price", "availability", "rating", "link"];

pub fn write_raw_table(path: &Path, records: &[RawBookRecord]) -> anyhow::Result<()> {
    crate::table::write_table(path, &RAW_TABLE_COLUMNS, records)
        .with_context(|| format!("write raw table: {}", path.display()))
}

pub fn read_raw_table(path: &Path) -> anyhow::Result<Vec<RawBookRecord>> {
    crate::table::read_table(path).with_context(|| format!("read raw table: {}", path.display()))
}
