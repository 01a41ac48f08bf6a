/// PostgreSQL record store.
///
/// One row per `(station_id, timestamp)`; writing the same key again
/// replaces the row. The meteo block and the caption label are stored as
/// JSONB so the raw string values (and their nulls) survive unchanged.

use std::sync::Mutex;

use postgres::{Client, NoTls};
use tracing::info;

use super::RecordStore;
use crate::model::{ObservationRecord, StorageError};

/// Record store over a single blocking PostgreSQL connection.
pub struct PostgresRecordStore {
    client: Mutex<Client>,
    table: String,
}

impl PostgresRecordStore {
    /// Connects to `database_url` and targets `table`.
    pub fn connect(database_url: &str, table: &str) -> Result<Self, StorageError> {
        validate_table_name(table)?;
        let client = Client::connect(database_url, NoTls)?;
        Self::with_client(client, table)
    }

    pub fn with_client(client: Client, table: &str) -> Result<Self, StorageError> {
        validate_table_name(table)?;
        Ok(Self { client: Mutex::new(client), table: table.to_string() })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the record table if it does not exist yet.
    pub fn ensure_table(&self) -> Result<(), StorageError> {
        let mut client = self.lock()?;
        client.batch_execute(&create_table_sql(&self.table))?;
        info!(table = %self.table, "record table ready");
        Ok(())
    }

    /// Reads one record back by its key.
    pub fn get_record(&self, station_id: &str, timestamp: &str) -> Result<Option<ObservationRecord>, StorageError> {
        let mut client = self.lock()?;
        let query = format!(
            "SELECT station_id, timestamp, image_ref, created_at, meteo, meteo_timestamp, rekognition_data
             FROM {} WHERE station_id = $1 AND timestamp = $2",
            self.table
        );
        let row = match client.query_opt(query.as_str(), &[&station_id, &timestamp])? {
            Some(row) => row,
            None => return Ok(None),
        };

        let meteo: Option<serde_json::Value> = row.get(4);
        let label: Option<serde_json::Value> = row.get(6);
        Ok(Some(ObservationRecord {
            station_id: row.get(0),
            timestamp: row.get(1),
            image_ref: row.get(2),
            created_at: row.get(3),
            meteo: meteo.map(serde_json::from_value).transpose()?,
            meteo_timestamp: row.get(5),
            rekognition_data: label.map(serde_json::from_value).transpose()?,
        }))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Client>, StorageError> {
        self.client
            .lock()
            .map_err(|_| StorageError::Unavailable("database connection lock poisoned".to_string()))
    }
}

impl RecordStore for PostgresRecordStore {
    fn put_record(&self, record: &ObservationRecord) -> Result<(), StorageError> {
        let meteo = record.meteo.as_ref().map(serde_json::to_value).transpose()?;
        let label = record.rekognition_data.as_ref().map(serde_json::to_value).transpose()?;

        let mut client = self.lock()?;
        client.execute(
            upsert_sql(&self.table).as_str(),
            &[
                &record.station_id,
                &record.timestamp,
                &record.image_ref,
                &record.created_at,
                &meteo,
                &record.meteo_timestamp,
                &label,
            ],
        )?;
        Ok(())
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn validate_table_name(table: &str) -> Result<(), StorageError> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                && table.len() <= 63
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidTableName(table.to_string()))
    }
}

fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            station_id       TEXT NOT NULL,
            timestamp        TEXT NOT NULL,
            image_ref        TEXT NOT NULL,
            created_at       TEXT NOT NULL,
            meteo            JSONB,
            meteo_timestamp  TEXT,
            rekognition_data JSONB,
            PRIMARY KEY (station_id, timestamp)
        )"
    )
}

fn upsert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table}
            (station_id, timestamp, image_ref, created_at, meteo, meteo_timestamp, rekognition_data)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (station_id, timestamp) DO UPDATE SET
            image_ref = EXCLUDED.image_ref,
            created_at = EXCLUDED.created_at,
            meteo = EXCLUDED.meteo,
            meteo_timestamp = EXCLUDED.meteo_timestamp,
            rekognition_data = EXCLUDED.rekognition_data"
    )
}


// ---------------------------------------------------------------------------
// Database tests
// ---------------------------------------------------------------------------
//
// Need a reachable PostgreSQL in DATABASE_URL (read from .env).
//   cargo test -- --ignored record_store_db
