//! PostgreSQL implementation of the studio.
//!
//! # Module Structure
//! - `connection`: pool creation and session settings
//! - `introspection`: schema, table and column listing
//! - `ddl`: CREATE TABLE / ADD COLUMN / ALTER COLUMN rendering and execution
//! - `query`: paginated ad hoc SELECT execution
//! - `value_mapping`: JSON parameter binding and row decoding
//!
//! # Security Guarantees
//! - Identifiers are validated and quoted before any DDL is built
//! - Query values are always bound, never interpolated
//! - Connection strings are zeroed on drop and redacted in errors

mod connection;
mod ddl;
mod introspection;
mod query;
mod value_mapping;

#[cfg(test)]
mod tests;

use super::SchemaStudio;
use crate::config::{BoundConnection, ConnectionConfig, QueryConfig, TableListOptions};
use crate::models::{
    AddColumnRequest, AlterColumnRequest, ColumnInfo, CreateTableRequest, QueryPageResult,
    SchemaInfo, SelectQueryRequest, TableInfo,
};
use crate::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use zeroize::Zeroizing;

pub use ddl::{
    DdlBuilder, render_add_column, render_alter_column, render_column_definition,
    render_create_table,
};
pub use introspection::SchemaIntrospector;
pub use query::{QueryExecutor, ordered_params, paginate_sql};
pub use value_mapping::{UntypedNull, bind_json, row_to_json};

/// The three studio components sharing one injected pool.
pub struct PostgresStudio {
    pool: PgPool,
    config: ConnectionConfig,
    connection_string: Option<Zeroizing<String>>,
    introspector: SchemaIntrospector,
    ddl: DdlBuilder,
    queries: QueryExecutor,
}

impl std::fmt::Debug for PostgresStudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStudio")
            .field("config", &self.config)
            .field("query_config", &self.queries.config())
            .field("pool_size", &self.pool.size())
            .field("pool_idle", &self.pool.num_idle())
            .finish()
    }
}

impl PostgresStudio {
    fn assemble(pool: PgPool, config: ConnectionConfig, query_config: QueryConfig) -> Self {
        Self {
            introspector: SchemaIntrospector::new(pool.clone()),
            ddl: DdlBuilder::new(pool.clone()),
            queries: QueryExecutor::new(pool.clone(), query_config),
            pool,
            config,
            connection_string: None,
        }
    }

    /// Builder method to replace the query limits.
    pub fn with_query_config(mut self, query_config: QueryConfig) -> Self {
        self.queries = QueryExecutor::new(self.pool.clone(), query_config);
        self
    }

    /// The injected pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn introspector(&self) -> &SchemaIntrospector {
        &self.introspector
    }

    pub fn ddl(&self) -> &DdlBuilder {
        &self.ddl
    }

    pub fn queries(&self) -> &QueryExecutor {
        &self.queries
    }
}

impl BoundConnection for PostgresStudio {
    fn connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref().map(String::as_str)
    }
}

#[async_trait]
impl SchemaStudio for PostgresStudio {
    async fn test_connection(&self) -> Result<()> {
        self.ping().await
    }

    async fn list_schemas(&self) -> Result<Vec<SchemaInfo>> {
        self.introspector.list_schemas().await
    }

    async fn list_tables_with(
        &self,
        schema: &str,
        options: TableListOptions,
    ) -> Result<Vec<TableInfo>> {
        self.introspector.list_tables_with(schema, options).await
    }

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        self.introspector.list_columns(schema, table).await
    }

    async fn create_table(&self, request: &CreateTableRequest) -> Result<()> {
        self.ddl.create_table(request).await
    }

    async fn add_column(&self, request: &AddColumnRequest) -> Result<()> {
        self.ddl.add_column(request).await
    }

    async fn alter_column(&self, request: &AlterColumnRequest) -> Result<()> {
        self.ddl.alter_column(request).await
    }

    async fn run_select(&self, request: &SelectQueryRequest) -> Result<QueryPageResult> {
        self.queries.run_select(request).await
    }

    fn connection_config(&self) -> ConnectionConfig {
        self.config.clone()
    }
}
