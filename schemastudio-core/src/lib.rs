//! Core library for SchemaStudio.
//!
//! Introspects a live PostgreSQL database, issues validated DDL and runs
//! parameterized, paginated read queries. SQL goes straight through the
//! driver; there is no ORM.
//!
//! # Security Guarantees
//! - Every identifier embedded in DDL passes one allow-list validator
//! - Query values are bound as parameters, never interpolated
//! - Connection strings are zeroed on drop and only logged redacted
//!
//! # Architecture
//! - `identifier`: the single validation and quoting point for SQL names
//! - `config`: connection-string resolution, pool and query settings
//! - `adapters`: the `SchemaStudio` facade and its PostgreSQL components,
//!   each built around an injected pool
//! - `models`: request and response shapes

pub mod adapters;
pub mod config;
pub mod error;
pub mod identifier;
pub mod logging;
pub mod models;

// Re-export commonly used types
pub use adapters::postgres::{DdlBuilder, PostgresStudio, QueryExecutor, SchemaIntrospector};
pub use adapters::{SchemaStudio, create_studio};
pub use config::{
    ConnectionConfig, ConnectionResolver, QueryConfig, ResolvedConnection, TableListOptions,
};
pub use error::{Result, StudioError};
pub use identifier::{IdentifierKind, qualified_name, quote_identifier, validate_identifier};
pub use models::{
    AddColumnRequest, AlterColumnRequest, ColumnInfo, ColumnSpec, CreateTableRequest,
    IdentityMode, QueryPageResult, SchemaInfo, SelectQueryRequest, TableInfo, TableKind,
};
