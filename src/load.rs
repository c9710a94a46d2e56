use std::path::{Path, PathBuf};

use crate::cli::LoadArgs;
use crate::config::{ConnectionConfig, Settings};
use crate::formats::{CleanedBookRecord, WarehouseRow};

pub const WAREHOUSE_TABLE: &str = "BOOK_FINAL";

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS BOOK_FINAL (
    title         TEXT NOT NULL,
    price         REAL NOT NULL,
    link          TEXT NOT NULL,
    in_stock      BOOLEAN NOT NULL,
    rating_number INTEGER NOT NULL
)";

const INSERT_SQL: &str = "INSERT INTO BOOK_FINAL (title, price, link, in_stock, rating_number)
VALUES (?1, ?2, ?3, ?4, ?5)";

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("read processed table {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("connect to warehouse {target}")]
    Connection {
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("insert row {row} into {table}")]
    Insert {
        row: usize,
        table: &'static str,
        #[source]
        source: BoxError,
    },
}

/// A destination the loader can open one connection to per run.
pub trait Warehouse {
    fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn WarehouseConnection>, LoadError>;
}

pub trait WarehouseConnection {
    /// Inserts and commits a single row.
    fn insert(&mut self, row: &WarehouseRow<'_>) -> Result<(), BoxError>;

    fn close(self: Box<Self>) -> Result<(), BoxError>;
}

/// Embedded SQLite warehouse; `database` names the database file.
///
/// SQLite has no accounts or compute warehouses, so the remaining connection
/// parameters are only used to describe the target in logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteWarehouse;

impl Warehouse for SqliteWarehouse {
    fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn WarehouseConnection>, LoadError> {
        let connection_error = |err: rusqlite::Error| LoadError::Connection {
            target: config.describe(),
            source: Box::new(err),
        };

        let conn = rusqlite::Connection::open(&config.database).map_err(connection_error)?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(connection_error)?;
        Ok(Box::new(SqliteConnection { conn }))
    }
}

struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl WarehouseConnection for SqliteConnection {
    fn insert(&mut self, row: &WarehouseRow<'_>) -> Result<(), BoxError> {
        let mut statement = self.conn.prepare_cached(INSERT_SQL)?;
        statement.execute(rusqlite::params![
            row.title,
            row.price,
            row.link,
            row.in_stock,
            row.rating_number,
        ])?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), BoxError> {
        self.conn.close().map_err(|(_, err)| Box::new(err) as BoxError)
    }
}

/// Run-level statistics over the processed table; averages are rounded to
/// two decimals and absent for an empty table.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStats {
    pub row_count: usize,
    pub mean_price: Option<f64>,
    pub mean_rating: Option<f64>,
}

impl SummaryStats {
    pub fn compute(records: &[CleanedBookRecord]) -> Self {
        let row_count = records.len();
        let mean = |total: f64| (row_count > 0).then(|| round2(total / row_count as f64));

        Self {
            row_count,
            mean_price: mean(records.iter().map(|r| r.price).sum()),
            mean_rating: mean(records.iter().map(|r| f64::from(r.rating_number)).sum()),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn run(args: LoadArgs, settings: &Settings) -> anyhow::Result<usize> {
    let config = settings.connection.resolve()?;
    let processed_path = match args.processed {
        Some(processed) => PathBuf::from(processed),
        None => settings.artifacts.processed_path()?.to_path_buf(),
    };

    let loaded = load_file(&processed_path, &config, &SqliteWarehouse)?;
    Ok(loaded)
}

pub fn load_file(
    processed_path: &Path,
    config: &ConnectionConfig,
    warehouse: &dyn Warehouse,
) -> Result<usize, LoadError> {
    let records = crate::processed_store::read_processed_table(processed_path).map_err(|err| {
        LoadError::Read {
            path: processed_path.to_path_buf(),
            source: err.into(),
        }
    })?;
    load(&records, config, warehouse)
}

/// Appends every record to the warehouse table, one autocommitted insert per
/// row, and returns the number of rows loaded.
///
/// A failed insert stops the load; rows inserted before it stay committed.
/// The connection is closed whether or not the inserts succeed.
pub fn load(
    records: &[CleanedBookRecord],
    config: &ConnectionConfig,
    warehouse: &dyn Warehouse,
) -> Result<usize, LoadError> {
    let stats = SummaryStats::compute(records);
    tracing::info!(
        rows = stats.row_count,
        mean_price = ?stats.mean_price,
        mean_rating = ?stats.mean_rating,
        "load: dataset statistics"
    );

    let mut connection = warehouse.connect(config)?;
    tracing::info!(warehouse = %config.describe(), table = WAREHOUSE_TABLE, "load: connected");

    let result = insert_all(connection.as_mut(), records);

    if let Err(err) = connection.close() {
        tracing::warn!(?err, "load: closing warehouse connection failed");
    }

    let loaded = result?;
    tracing::info!(rows = loaded, table = WAREHOUSE_TABLE, "load: rows inserted");
    Ok(loaded)
}

fn insert_all(
    connection: &mut dyn WarehouseConnection,
    records: &[CleanedBookRecord],
) -> Result<usize, LoadError> {
    for (idx, record) in records.iter().enumerate() {
        connection
            .insert(&WarehouseRow::from(record))
            .map_err(|source| LoadError::Insert {
                row: idx + 1,
                table: WAREHOUSE_TABLE,
                source,
            })?;
    }
    Ok(records.len())
}
