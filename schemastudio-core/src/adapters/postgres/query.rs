//! Paginated ad hoc SELECT execution.
//!
//! The caller's SQL is sent verbatim as a prepared statement with a
//! `LIMIT`/`OFFSET` envelope appended. It is not parsed; gating who may run
//! raw SQL belongs to the caller's authorization layer.

use super::value_mapping::{bind_json, row_to_json};
use crate::Result;
use crate::adapters::helpers::statement_error;
use crate::config::QueryConfig;
use crate::error::StudioError;
use crate::models::{QueryPageResult, SelectQueryRequest};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use std::collections::BTreeMap;

/// Strips trailing whitespace and semicolons, then appends the page clause
/// on its own line so a trailing `--` comment cannot swallow it.
pub fn paginate_sql(sql: &str, limit: i64, offset: i64) -> String {
    let body = sql.trim_end_matches(|c: char| c.is_whitespace() || c == ';');
    format!("{}\nLIMIT {} OFFSET {}", body, limit, offset)
}

/// Orders named parameters by position.
///
/// Keys are `"N"` or `"$N"` with `N` written in ASCII digits; together they
/// must cover `1..=N` exactly once.
///
/// # Errors
/// Returns [`StudioError::QueryExecution`] naming the offending key before
/// anything reaches the database.
pub fn ordered_params(params: &BTreeMap<String, JsonValue>) -> Result<Vec<&JsonValue>> {
    let mut slots: Vec<Option<&JsonValue>> = vec![None; params.len()];

    for (key, value) in params {
        let digits = key.strip_prefix('$').unwrap_or(key.as_str());
        let position = Some(digits)
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<usize>().ok())
            .filter(|position| *position >= 1)
            .ok_or_else(|| {
                StudioError::query_rejected(format!(
                    "Unknown parameter name '{}'; parameters are positional (\"1\" or \"$1\")",
                    key
                ))
            })?;

        let slot = slots.get_mut(position - 1).ok_or_else(|| {
            StudioError::query_rejected(format!(
                "Parameter '{}' is out of range; {} parameter(s) supplied",
                key,
                params.len()
            ))
        })?;
        if slot.is_some() {
            return Err(StudioError::query_rejected(format!(
                "Parameter ${} is supplied more than once",
                position
            )));
        }
        *slot = Some(value);
    }

    // Every key filled a distinct slot in 1..=len, so no slot is empty.
    Ok(slots.into_iter().flatten().collect())
}

/// Runs paginated queries over an injected pool.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    pool: PgPool,
    config: QueryConfig,
}

impl QueryExecutor {
    /// Wraps a shared pool with the given limits.
    pub fn new(pool: PgPool, config: QueryConfig) -> Self {
        Self { pool, config }
    }

    /// The limits this executor enforces.
    pub fn config(&self) -> QueryConfig {
        self.config
    }

    /// Runs one page of a parameterized query.
    ///
    /// # Errors
    /// - [`StudioError::InvalidRequest`] for a bad page envelope
    /// - [`StudioError::QueryExecution`] for bad parameter names, a driver
    ///   rejection or an undecodable column
    pub async fn run_select(&self, request: &SelectQueryRequest) -> Result<QueryPageResult> {
        request.validate(self.config.max_limit)?;
        let params = ordered_params(&request.params)?;
        let sql = paginate_sql(&request.sql, request.limit, request.offset);

        // Parameter values are never logged.
        tracing::debug!("Running query with {} parameter(s): {}", params.len(), sql);

        let mut query = sqlx::query(&sql);
        for value in params {
            query = bind_json(query, value);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| statement_error("Query failed", e))?;

        let rows = rows.iter().map(row_to_json).collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            "Query returned {} row(s) (limit {}, offset {})",
            rows.len(),
            request.limit,
            request.offset
        );

        Ok(QueryPageResult {
            count: rows.len(),
            rows,
            limit: request.limit,
            offset: request.offset,
        })
    }
}
