//! DDL rendering and execution.
//!
//! The `render_*` functions are pure: they validate the request, run every
//! identifier through [`crate::identifier`] and return one statement. The
//! [`DdlBuilder`] methods render and then execute that statement as-is.

use crate::Result;
use crate::adapters::helpers::statement_error;
use crate::identifier::{
    IdentifierKind, qualified_name, quote_validated, validate_default_expression,
    validate_type_name,
};
use crate::models::{AddColumnRequest, AlterColumnRequest, ColumnSpec, CreateTableRequest};
use sqlx::PgPool;

/// Renders one column definition:
/// `"name" <type> [GENERATED ... AS IDENTITY] NULL|NOT NULL [DEFAULT <expr>]`.
///
/// # Errors
/// Returns an identifier error for a bad name or type, or an
/// invalid-request error for a bad default or identity combination.
pub fn render_column_definition(column: &ColumnSpec) -> Result<String> {
    let name = quote_validated(&column.name, IdentifierKind::Column)?;
    let data_type = validate_type_name(&column.data_type)?;
    column.validate()?;

    let mut definition = format!("{} {}", name, data_type);
    if let Some(identity) = column.identity.sql_clause() {
        definition.push(' ');
        definition.push_str(identity);
    }
    definition.push_str(if column.is_not_null() {
        " NOT NULL"
    } else {
        " NULL"
    });
    if let Some(default) = &column.default {
        let expression = validate_default_expression(default)?;
        definition.push_str(" DEFAULT ");
        definition.push_str(expression);
    }
    Ok(definition)
}

/// Renders `CREATE TABLE "s"."t" (...)` with column definitions followed by
/// the primary key and unique constraints.
///
/// # Errors
/// Returns an error if any identifier is invalid or the request is
/// inconsistent (see [`CreateTableRequest::validate`]).
///
/// # Example
/// ```rust
/// use schemastudio_core::adapters::postgres::render_create_table;
/// use schemastudio_core::models::{ColumnSpec, CreateTableRequest};
///
/// let request = CreateTableRequest::new(
///     "public",
///     "lots",
///     vec![ColumnSpec::new("id", "bigint").with_nullable(false)],
/// )
/// .with_primary_key(["id"]);
///
/// assert_eq!(
///     render_create_table(&request).unwrap(),
///     r#"CREATE TABLE "public"."lots" ("id" bigint NOT NULL, PRIMARY KEY ("id"))"#
/// );
/// ```
pub fn render_create_table(request: &CreateTableRequest) -> Result<String> {
    let relation = qualified_name(&request.schema, &request.table)?;
    request.validate()?;

    let mut elements = Vec::with_capacity(request.columns.len() + 1);
    for column in &request.columns {
        elements.push(render_column_definition(column)?);
    }

    if let Some(primary_key) = &request.primary_key {
        elements.push(format!("PRIMARY KEY ({})", render_column_list(primary_key)?));
    }

    for group in request.uniques.iter().flatten() {
        elements.push(format!("UNIQUE ({})", render_column_list(group)?));
    }

    Ok(format!("CREATE TABLE {} ({})", relation, elements.join(", ")))
}

/// Renders `ALTER TABLE "s"."t" ADD COLUMN <definition>`.
///
/// # Errors
/// Returns an error if any identifier or the column definition is invalid.
pub fn render_add_column(request: &AddColumnRequest) -> Result<String> {
    let relation = qualified_name(&request.schema, &request.table)?;
    let definition = render_column_definition(&request.column)?;
    Ok(format!("ALTER TABLE {} ADD COLUMN {}", relation, definition))
}

/// Renders one `ALTER TABLE` statement with an `ALTER COLUMN` clause per
/// requested change, in the order type, nullability, default.
///
/// # Errors
/// Returns an invalid-request error for an empty or contradictory request,
/// or an identifier error for a bad name or type.
pub fn render_alter_column(request: &AlterColumnRequest) -> Result<String> {
    let relation = qualified_name(&request.schema, &request.table)?;
    let column = quote_validated(&request.column, IdentifierKind::Column)?;
    request.validate()?;

    let mut clauses = Vec::new();
    if let Some(new_type) = &request.new_type {
        clauses.push(format!("TYPE {}", validate_type_name(new_type)?));
    }
    if request.set_not_null {
        clauses.push("SET NOT NULL".to_string());
    }
    if request.drop_not_null {
        clauses.push("DROP NOT NULL".to_string());
    }
    if let Some(default) = &request.set_default {
        clauses.push(format!("SET DEFAULT {}", validate_default_expression(default)?));
    }
    if request.drop_default {
        clauses.push("DROP DEFAULT".to_string());
    }

    let actions: Vec<String> = clauses
        .into_iter()
        .map(|clause| format!("ALTER COLUMN {} {}", column, clause))
        .collect();
    Ok(format!("ALTER TABLE {} {}", relation, actions.join(", ")))
}

fn render_column_list(columns: &[String]) -> Result<String> {
    let quoted = columns
        .iter()
        .map(|column| quote_validated(column, IdentifierKind::Column))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

/// Executes rendered DDL over an injected pool, one statement per call.
#[derive(Debug, Clone)]
pub struct DdlBuilder {
    pool: PgPool,
}

impl DdlBuilder {
    /// Wraps a shared pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a table.
    ///
    /// # Errors
    /// Validation errors are returned before anything is sent; a rejected
    /// statement returns [`crate::error::StudioError::QueryExecution`].
    pub async fn create_table(&self, request: &CreateTableRequest) -> Result<()> {
        let sql = render_create_table(request)?;
        self.execute(&sql, &format!("Failed to create table {}.{}", request.schema, request.table))
            .await?;
        tracing::info!("Created table {}.{}", request.schema, request.table);
        Ok(())
    }

    /// Adds one column to an existing table.
    ///
    /// # Errors
    /// As [`DdlBuilder::create_table`].
    pub async fn add_column(&self, request: &AddColumnRequest) -> Result<()> {
        let sql = render_add_column(request)?;
        self.execute(
            &sql,
            &format!(
                "Failed to add column {} to {}.{}",
                request.column.name, request.schema, request.table
            ),
        )
        .await?;
        tracing::info!(
            "Added column {} to {}.{}",
            request.column.name,
            request.schema,
            request.table
        );
        Ok(())
    }

    /// Alters one existing column.
    ///
    /// # Errors
    /// As [`DdlBuilder::create_table`].
    pub async fn alter_column(&self, request: &AlterColumnRequest) -> Result<()> {
        let sql = render_alter_column(request)?;
        self.execute(
            &sql,
            &format!(
                "Failed to alter column {} of {}.{}",
                request.column, request.schema, request.table
            ),
        )
        .await?;
        tracing::info!(
            "Altered column {} of {}.{}",
            request.column,
            request.schema,
            request.table
        );
        Ok(())
    }

    async fn execute(&self, sql: &str, context: &str) -> Result<()> {
        tracing::debug!("Executing DDL: {}", sql);
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| statement_error(context, e))?;
        Ok(())
    }
}
