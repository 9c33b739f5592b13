//! Catalog introspection: schemas, tables and columns.
//!
//! All queries read `pg_catalog` directly and bind caller-supplied names as
//! parameters, so unknown schemas or tables simply yield empty lists.

use crate::Result;
use crate::adapters::helpers::{RowExt, catalog_error, is_insufficient_privilege};
use crate::config::TableListOptions;
use crate::identifier::qualified_name;
use crate::models::{ColumnInfo, IdentityMode, SchemaInfo, TableInfo, TableKind};
use sqlx::PgPool;

const LIST_SCHEMAS: &str = r"
    SELECT n.nspname AS name,
           count(c.oid) AS table_count
    FROM pg_catalog.pg_namespace n
    LEFT JOIN pg_catalog.pg_class c
           ON c.relnamespace = n.oid
          AND c.relkind IN ('r', 'p', 'v', 'm', 'f')
    WHERE n.nspname NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
      AND n.nspname NOT LIKE 'pg\_temp\_%'
      AND n.nspname NOT LIKE 'pg\_toast\_temp\_%'
    GROUP BY n.nspname
    ORDER BY n.nspname
";

const LIST_TABLES: &str = r"
    SELECT c.relname AS name,
           c.relkind::text AS relkind,
           c.reltuples::bigint AS reltuples
    FROM pg_catalog.pg_class c
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1
      AND c.relkind IN ('r', 'p', 'v', 'm', 'f')
    ORDER BY c.relname
";

const LIST_COLUMNS: &str = r"
    SELECT a.attname AS name,
           pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
           NOT a.attnotnull AS is_nullable,
           pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS column_default,
           a.attidentity::text AS identity,
           a.attnum::int4 AS ordinal_position,
           EXISTS (
               SELECT 1
               FROM pg_catalog.pg_index i
               WHERE i.indrelid = c.oid
                 AND i.indisprimary
                 AND a.attnum = ANY (i.indkey)
           ) AS is_primary_key
    FROM pg_catalog.pg_attribute a
    JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    LEFT JOIN pg_catalog.pg_attrdef d
           ON d.adrelid = a.attrelid
          AND d.adnum = a.attnum
    WHERE n.nspname = $1
      AND c.relname = $2
      AND c.relkind IN ('r', 'p', 'v', 'm', 'f')
      AND a.attnum > 0
      AND NOT a.attisdropped
    ORDER BY a.attnum
";

/// Read-only catalog queries over an injected pool.
#[derive(Debug, Clone)]
pub struct SchemaIntrospector {
    pool: PgPool,
}

impl SchemaIntrospector {
    /// Wraps a shared pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lists non-system schemas with the number of relations in each.
    ///
    /// # Errors
    /// Returns an introspection error if the catalog query fails.
    pub async fn list_schemas(&self) -> Result<Vec<SchemaInfo>> {
        tracing::debug!("Enumerating schemas");

        let rows = sqlx::query(LIST_SCHEMAS)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| catalog_error("pg_catalog.pg_namespace", e))?;

        let mut schemas = Vec::with_capacity(rows.len());
        for row in &rows {
            schemas.push(SchemaInfo {
                name: row.get_field("name", None)?,
                table_count: row.get_field("table_count", None)?,
            });
        }

        tracing::info!("Found {} schemas", schemas.len());
        Ok(schemas)
    }

    /// Lists the relations of `schema` with planner row estimates.
    ///
    /// # Errors
    /// Returns an introspection error if the catalog query fails.
    pub async fn list_tables(&self, schema: &str) -> Result<Vec<TableInfo>> {
        self.list_tables_with(schema, TableListOptions::default())
            .await
    }

    /// Lists the relations of `schema`, optionally replacing estimates
    /// with exact counts for tables.
    ///
    /// # Errors
    /// Returns an introspection error if a catalog or count query fails.
    pub async fn list_tables_with(
        &self,
        schema: &str,
        options: TableListOptions,
    ) -> Result<Vec<TableInfo>> {
        tracing::debug!("Enumerating relations in schema '{}'", schema);

        let rows = sqlx::query(LIST_TABLES)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| catalog_error("pg_catalog.pg_class", e))?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.get_field("name", Some(schema))?;
            let relkind: String = row.get_field("relkind", Some(name.as_str()))?;
            let reltuples: Option<i64> = row.get_field("reltuples", Some(name.as_str()))?;

            let Some(kind) = TableKind::from_relkind(&relkind) else {
                tracing::warn!("Skipping '{}.{}' with unexpected relkind '{}'", schema, name, relkind);
                continue;
            };

            tables.push(TableInfo {
                schema: schema.to_string(),
                name,
                kind,
                approx_row_count: row_estimate(kind, reltuples),
            });
        }

        if options.exact_row_counts {
            for table in tables.iter_mut().filter(|t| t.kind.holds_rows()) {
                if let Some(count) = self.exact_row_count(table).await? {
                    table.approx_row_count = Some(count);
                }
            }
        }

        tracing::info!("Found {} relations in schema '{}'", tables.len(), schema);
        Ok(tables)
    }

    /// Lists the columns of `schema.table` in declaration order.
    ///
    /// # Errors
    /// Returns an introspection error if the catalog query fails.
    pub async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        let relation = format!("{}.{}", schema, table);
        tracing::debug!("Enumerating columns of '{}'", relation);

        let rows = sqlx::query(LIST_COLUMNS)
            .bind(schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| catalog_error("pg_catalog.pg_attribute", e))?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let identity: String = row.get_field("identity", Some(relation.as_str()))?;
            columns.push(ColumnInfo {
                name: row.get_field("name", Some(relation.as_str()))?,
                data_type: row.get_field("data_type", Some(relation.as_str()))?,
                is_nullable: row.get_field("is_nullable", Some(relation.as_str()))?,
                default: row.get_field("column_default", Some(relation.as_str()))?,
                is_primary_key: row.get_field("is_primary_key", Some(relation.as_str()))?,
                identity: IdentityMode::from_attidentity(&identity),
                ordinal_position: row.get_field("ordinal_position", Some(relation.as_str()))?,
            });
        }

        tracing::debug!("Found {} columns in '{}'", columns.len(), relation);
        Ok(columns)
    }

    /// Runs `count(*)` for one table. Names outside the identifier grammar
    /// and tables the role cannot read keep their estimate.
    async fn exact_row_count(&self, table: &TableInfo) -> Result<Option<i64>> {
        let relation = match qualified_name(&table.schema, &table.name) {
            Ok(relation) => relation,
            Err(e) => {
                tracing::warn!(
                    "Keeping row estimate for '{}.{}': {}",
                    table.schema,
                    table.name,
                    e
                );
                return Ok(None);
            }
        };

        match sqlx::query_scalar::<_, i64>(&format!("SELECT count(*) FROM {}", relation))
            .fetch_one(&self.pool)
            .await
        {
            Ok(count) => Ok(Some(count)),
            Err(e) if is_insufficient_privilege(&e) => {
                tracing::warn!("Keeping row estimate for {}: insufficient privileges", relation);
                Ok(None)
            }
            Err(e) => Err(catalog_error(&relation, e)),
        }
    }
}

/// Planner estimates are meaningless for views and negative when a
/// relation has never been analyzed.
pub(crate) fn row_estimate(kind: TableKind, reltuples: Option<i64>) -> Option<i64> {
    match (kind, reltuples) {
        (TableKind::View, _) => None,
        (_, Some(estimate)) if estimate >= 0 => Some(estimate),
        _ => None,
    }
}
