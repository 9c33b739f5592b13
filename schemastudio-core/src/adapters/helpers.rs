//! Helper utilities shared by the PostgreSQL components.
//!
//! Keeps row extraction and driver-error classification consistent across
//! introspection, DDL and ad hoc queries.

use crate::{Result, error::StudioError};
use sqlx::{Row, postgres::PgRow};

/// SQLSTATE raised when the role lacks a privilege.
const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Extension trait for extracting typed values from catalog rows
/// with consistent error handling.
///
/// # Example
/// ```rust,ignore
/// use schemastudio_core::adapters::helpers::RowExt;
///
/// let name: String = row.get_field("name", Some("public.lots"))?;
/// let estimate: Option<i64> = row.get_field("reltuples", None)?;
/// ```
pub trait RowExt {
    /// Extracts a typed field from the row with proper error context.
    ///
    /// # Arguments
    /// * `field_name` - Name of the column to extract
    /// * `relation` - Optional relation name for error messages
    fn get_field<'r, T>(&'r self, field_name: &str, relation: Option<&str>) -> Result<T>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>;
}

impl RowExt for PgRow {
    fn get_field<'r, T>(&'r self, field_name: &str, relation: Option<&str>) -> Result<T>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    {
        self.try_get(field_name)
            .map_err(|e| StudioError::parse_field(field_name, relation, e))
    }
}

/// True when the driver never got a usable session: pool exhaustion,
/// network, TLS or a closed pool.
pub fn is_connection_error(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed
    )
}

/// True when the server refused the statement for lack of a privilege.
pub fn is_insufficient_privilege(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(INSUFFICIENT_PRIVILEGE)
    )
}

/// Maps a failed catalog query to an introspection error, calling out
/// missing privileges explicitly.
pub fn catalog_error(resource: &str, error: sqlx::Error) -> StudioError {
    if is_connection_error(&error) {
        return StudioError::connection_failed(
            format!("Lost connection while querying {}", resource),
            error,
        );
    }
    if is_insufficient_privilege(&error) {
        return StudioError::introspection_failed(
            format!("Cannot access {} - insufficient privileges", resource),
            error,
        );
    }
    StudioError::introspection_failed(format!("Failed to query {}", resource), error)
}

/// Maps a failed caller-driven statement (DDL or ad hoc query) to a
/// query-execution error that keeps the database's message.
pub fn statement_error(context: &str, error: sqlx::Error) -> StudioError {
    if is_connection_error(&error) {
        StudioError::connection_failed(context, error)
    } else {
        StudioError::query_failed(context, error)
    }
}
