//! The studio facade and its PostgreSQL implementation.
//!
//! [`SchemaStudio`] bundles introspection, DDL and ad hoc queries behind
//! one object-safe trait so front-ends can hold a `Box<dyn SchemaStudio>`.
//!
//! # Module Structure
//! - `helpers`: row extraction and driver-error classification
//! - `postgres`: the PostgreSQL components and [`postgres::PostgresStudio`]

pub mod helpers;
pub mod postgres;

use crate::Result;
use crate::config::{ConnectionConfig, ResolvedConnection, TableListOptions};
use crate::models::{
    AddColumnRequest, AlterColumnRequest, ColumnInfo, CreateTableRequest, QueryPageResult,
    SchemaInfo, SelectQueryRequest, TableInfo,
};
use async_trait::async_trait;

/// Schema studio operations with an object-safe design.
///
/// # Security Guarantees
/// - Identifiers in DDL are validated and quoted before any SQL is built
/// - Query parameters are bound, never interpolated
/// - Credentials are never stored in returned data or logged
///
/// # Object Safety
/// This trait is object-safe, allowing for dynamic dispatch through
/// `Box<dyn SchemaStudio>` or `Arc<dyn SchemaStudio>`.
#[async_trait]
pub trait SchemaStudio: Send + Sync {
    /// Verifies that the database is reachable.
    ///
    /// # Errors
    /// Returns a connection error if no connection can be acquired.
    async fn test_connection(&self) -> Result<()>;

    /// Lists non-system schemas with relation counts.
    async fn list_schemas(&self) -> Result<Vec<SchemaInfo>>;

    /// Lists the relations of a schema with planner row estimates.
    ///
    /// An unknown schema yields an empty list.
    async fn list_tables(&self, schema: &str) -> Result<Vec<TableInfo>> {
        self.list_tables_with(schema, TableListOptions::default())
            .await
    }

    /// Lists the relations of a schema with explicit options.
    async fn list_tables_with(
        &self,
        schema: &str,
        options: TableListOptions,
    ) -> Result<Vec<TableInfo>>;

    /// Lists a table's columns in declaration order.
    ///
    /// An unknown schema or table yields an empty list.
    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Creates a table as one DDL statement.
    async fn create_table(&self, request: &CreateTableRequest) -> Result<()>;

    /// Adds one column to a table.
    async fn add_column(&self, request: &AddColumnRequest) -> Result<()>;

    /// Alters one column with a single statement.
    async fn alter_column(&self, request: &AlterColumnRequest) -> Result<()>;

    /// Runs one page of a parameterized read query.
    async fn run_select(&self, request: &SelectQueryRequest) -> Result<QueryPageResult>;

    /// Gets the connection configuration (credentials excluded).
    fn connection_config(&self) -> ConnectionConfig;
}

/// Creates a studio for a resolved connection string.
///
/// The pool connects lazily; call [`SchemaStudio::test_connection`] to
/// surface connection problems early.
///
/// # Errors
/// Returns a configuration error if the connection string is not a valid
/// PostgreSQL URL or carries invalid pool settings.
pub fn create_studio(resolved: &ResolvedConnection) -> Result<Box<dyn SchemaStudio>> {
    let studio = postgres::PostgresStudio::new(resolved.expose())?;
    tracing::debug!("Created studio for {}", resolved.redacted());
    Ok(Box::new(studio))
}
