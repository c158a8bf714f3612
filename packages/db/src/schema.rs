//! Database schema definitions using SurrealQL.

use crate::{DbError, get_db};

/// Initialize the database schema.
///
/// This creates all necessary tables, fields, and indexes.
pub async fn init_schema() -> Result<(), DbError> {
    let db = get_db()?;

    tracing::info!("Initializing database schema...");

    // Job table
    db.query(JOB_SCHEMA).await?;

    // Report table
    db.query(REPORT_SCHEMA).await?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Job table schema.
///
/// Timestamps are stored as RFC3339 strings, matching the serde encoding
/// the driver writes.
const JOB_SCHEMA: &str = r#"
-- Job table mirroring the in-memory job snapshots
DEFINE TABLE IF NOT EXISTS job SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS input ON job FLEXIBLE TYPE object;
DEFINE FIELD IF NOT EXISTS state ON job TYPE string DEFAULT "pending";
DEFINE FIELD IF NOT EXISTS message ON job TYPE string;
DEFINE FIELD IF NOT EXISTS result ON job FLEXIBLE TYPE option<object>;
DEFINE FIELD IF NOT EXISTS note ON job TYPE option<string>;
DEFINE FIELD IF NOT EXISTS created_at ON job TYPE string;
DEFINE FIELD IF NOT EXISTS started_at ON job TYPE option<string>;
DEFINE FIELD IF NOT EXISTS finished_at ON job TYPE option<string>;

-- Indexes for status queries
DEFINE INDEX IF NOT EXISTS job_state ON job FIELDS state;
DEFINE INDEX IF NOT EXISTS job_created ON job FIELDS created_at;
"#;

/// Report table schema, one row per persisted report artifact.
const REPORT_SCHEMA: &str = r#"
-- Report rows linking a terminal job to its persisted artifact
DEFINE TABLE IF NOT EXISTS report SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS job_id ON report TYPE string;
DEFINE FIELD IF NOT EXISTS state ON report TYPE string;
DEFINE FIELD IF NOT EXISTS storage_key ON report TYPE option<string>;
DEFINE FIELD IF NOT EXISTS summary ON report TYPE option<string>;
DEFINE FIELD IF NOT EXISTS error ON report TYPE option<string>;
DEFINE FIELD IF NOT EXISTS best_effort ON report TYPE bool DEFAULT false;
DEFINE FIELD IF NOT EXISTS created_at ON report TYPE string;

-- Indexes for report lookups
DEFINE INDEX IF NOT EXISTS report_job ON report FIELDS job_id;
DEFINE INDEX IF NOT EXISTS report_created ON report FIELDS created_at;
"#;
