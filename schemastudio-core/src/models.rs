//! Request and response shapes.
//!
//! Everything here is built per request and discarded once serialized.
//! Field names serialize in camelCase to match the payloads consumers
//! exchange with the studio.

use crate::{Result, error::StudioError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashSet};

/// Page size used when a query request does not specify one.
pub const DEFAULT_PAGE_LIMIT: i64 = 100;

/// One result row: column name to value, in the driver's column order.
pub type Row = serde_json::Map<String, JsonValue>;

/// One database schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaInfo {
    pub name: String,
    pub table_count: i64,
}

/// Relation kinds reported by table listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TableKind {
    Table,
    PartitionedTable,
    View,
    MaterializedView,
    ForeignTable,
}

impl TableKind {
    /// Maps a `pg_class.relkind` code.
    pub fn from_relkind(relkind: &str) -> Option<Self> {
        match relkind {
            "r" => Some(Self::Table),
            "p" => Some(Self::PartitionedTable),
            "v" => Some(Self::View),
            "m" => Some(Self::MaterializedView),
            "f" => Some(Self::ForeignTable),
            _ => None,
        }
    }

    /// Whether the relation stores rows that `count(*)` can scan cheaply
    /// enough to be worth an exact count.
    pub fn holds_rows(self) -> bool {
        matches!(self, Self::Table | Self::PartitionedTable)
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableKind::Table => write!(f, "table"),
            TableKind::PartitionedTable => write!(f, "partitioned table"),
            TableKind::View => write!(f, "view"),
            TableKind::MaterializedView => write!(f, "materialized view"),
            TableKind::ForeignTable => write!(f, "foreign table"),
        }
    }
}

/// One relation in a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    pub kind: TableKind,
    /// Planner estimate (or exact count on request); `None` when unknown
    pub approx_row_count: Option<i64>,
}

/// How a column's values are generated by the database
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentityMode {
    #[default]
    None,
    Always,
    ByDefault,
}

impl IdentityMode {
    /// Maps a `pg_attribute.attidentity` code.
    pub fn from_attidentity(code: &str) -> Self {
        match code {
            "a" => Self::Always,
            "d" => Self::ByDefault,
            _ => Self::None,
        }
    }

    /// The column constraint clause for this mode.
    pub fn sql_clause(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Always => Some("GENERATED ALWAYS AS IDENTITY"),
            Self::ByDefault => Some("GENERATED BY DEFAULT AS IDENTITY"),
        }
    }

    /// Whether an identity is configured.
    pub fn is_identity(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// One column of a table, as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub default: Option<String>,
    pub is_primary_key: bool,
    pub identity: IdentityMode,
    pub ordinal_position: i32,
}

/// One column definition inside a create or add request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    /// `None` leaves the database default (nullable, or NOT NULL for identity columns)
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub identity: IdentityMode,
}

impl ColumnSpec {
    /// Creates a plain column definition.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: None,
            default: None,
            identity: IdentityMode::None,
        }
    }

    /// Builder method to set nullability.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    /// Builder method to set a default expression.
    pub fn with_default(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(expression.into());
        self
    }

    /// Builder method to set the identity mode.
    pub fn with_identity(mut self, identity: IdentityMode) -> Self {
        self.identity = identity;
        self
    }

    /// Whether the rendered column is NOT NULL.
    pub fn is_not_null(&self) -> bool {
        match self.nullable {
            Some(nullable) => !nullable,
            None => self.identity.is_identity(),
        }
    }

    /// Checks the combinations the database would reject.
    ///
    /// # Errors
    /// Returns [`StudioError::InvalidRequest`] if an identity column also
    /// has a default or is explicitly nullable.
    pub fn validate(&self) -> Result<()> {
        if self.identity.is_identity() && self.default.is_some() {
            return Err(StudioError::invalid_request(format!(
                "Column '{}' cannot have both an identity and a default",
                self.name
            )));
        }
        if self.identity.is_identity() && self.nullable == Some(true) {
            return Err(StudioError::invalid_request(format!(
                "Identity column '{}' cannot be nullable",
                self.name
            )));
        }
        Ok(())
    }
}

/// Intent to create a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableRequest {
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub primary_key: Option<Vec<String>>,
    #[serde(default)]
    pub uniques: Option<Vec<Vec<String>>>,
}

impl CreateTableRequest {
    /// Creates a request with no constraints.
    pub fn new(schema: impl Into<String>, table: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            columns,
            primary_key: None,
            uniques: None,
        }
    }

    /// Builder method to set the primary key columns.
    pub fn with_primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Builder method to add a unique constraint over a column group.
    pub fn with_unique<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uniques
            .get_or_insert_with(Vec::new)
            .push(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Checks the request's internal consistency.
    ///
    /// Identifier grammar is checked separately while rendering.
    ///
    /// # Errors
    /// Returns [`StudioError::InvalidRequest`] for an empty column list,
    /// duplicate column names, empty or unknown key columns, or an invalid
    /// column definition.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(StudioError::invalid_request(format!(
                "Table '{}' must define at least one column",
                self.table
            )));
        }

        let mut names = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            if !names.insert(column.name.as_str()) {
                return Err(StudioError::invalid_request(format!(
                    "Column '{}' is defined more than once",
                    column.name
                )));
            }
            column.validate()?;
        }

        if let Some(primary_key) = &self.primary_key {
            check_key_columns("Primary key", primary_key, &names)?;
        }

        for group in self.uniques.iter().flatten() {
            check_key_columns("Unique constraint", group, &names)?;
        }

        Ok(())
    }
}

fn check_key_columns(what: &str, columns: &[String], defined: &HashSet<&str>) -> Result<()> {
    if columns.is_empty() {
        return Err(StudioError::invalid_request(format!(
            "{} must name at least one column",
            what
        )));
    }
    let mut seen = HashSet::with_capacity(columns.len());
    for column in columns {
        if !defined.contains(column.as_str()) {
            return Err(StudioError::invalid_request(format!(
                "{} column '{}' is not among the table's columns",
                what, column
            )));
        }
        if !seen.insert(column.as_str()) {
            return Err(StudioError::invalid_request(format!(
                "{} lists column '{}' more than once",
                what, column
            )));
        }
    }
    Ok(())
}

/// Intent to add one column to an existing table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddColumnRequest {
    pub schema: String,
    pub table: String,
    #[serde(flatten)]
    pub column: ColumnSpec,
}

impl AddColumnRequest {
    /// Creates an add-column request.
    pub fn new(schema: impl Into<String>, table: impl Into<String>, column: ColumnSpec) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            column,
        }
    }
}

/// Intent to change one existing column; unset fields mean "no change"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlterColumnRequest {
    pub schema: String,
    pub table: String,
    pub column: String,
    #[serde(default)]
    pub new_type: Option<String>,
    #[serde(default)]
    pub set_not_null: bool,
    #[serde(default)]
    pub drop_not_null: bool,
    #[serde(default)]
    pub set_default: Option<String>,
    #[serde(default)]
    pub drop_default: bool,
}

impl AlterColumnRequest {
    /// Creates a request with no changes yet.
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            column: column.into(),
            ..Default::default()
        }
    }

    /// Builder method to change the column type.
    pub fn with_new_type(mut self, data_type: impl Into<String>) -> Self {
        self.new_type = Some(data_type.into());
        self
    }

    /// Builder method to add a NOT NULL constraint.
    pub fn with_set_not_null(mut self) -> Self {
        self.set_not_null = true;
        self
    }

    /// Builder method to drop the NOT NULL constraint.
    pub fn with_drop_not_null(mut self) -> Self {
        self.drop_not_null = true;
        self
    }

    /// Builder method to set a new default expression.
    pub fn with_set_default(mut self, expression: impl Into<String>) -> Self {
        self.set_default = Some(expression.into());
        self
    }

    /// Builder method to drop the default.
    pub fn with_drop_default(mut self) -> Self {
        self.drop_default = true;
        self
    }

    /// Checks that the request changes something and does not contradict
    /// itself.
    ///
    /// # Errors
    /// Returns [`StudioError::InvalidRequest`] for a no-op request or for
    /// set/drop pairs requested together.
    pub fn validate(&self) -> Result<()> {
        if self.set_not_null && self.drop_not_null {
            return Err(StudioError::invalid_request(
                "setNotNull and dropNotNull cannot be combined",
            ));
        }
        if self.set_default.is_some() && self.drop_default {
            return Err(StudioError::invalid_request(
                "setDefault and dropDefault cannot be combined",
            ));
        }
        let changes_something = self.new_type.is_some()
            || self.set_not_null
            || self.drop_not_null
            || self.set_default.is_some()
            || self.drop_default;
        if !changes_something {
            return Err(StudioError::invalid_request(format!(
                "Alter request for column '{}' does not change anything",
                self.column
            )));
        }
        Ok(())
    }
}

/// A read-only ad hoc query with a page envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectQueryRequest {
    pub sql: String,
    /// Positional parameters keyed `"1"`/`"$1"`, `"2"`/`"$2"`, ...
    #[serde(default)]
    pub params: BTreeMap<String, JsonValue>,
    #[serde(default = "default_page_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_page_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

impl SelectQueryRequest {
    /// Creates a request for the first default-sized page.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: BTreeMap::new(),
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }

    /// Builder method to bind a parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Builder method to set the page size.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Builder method to set the page offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Checks the page envelope.
    ///
    /// # Errors
    /// Returns [`StudioError::InvalidRequest`] if `limit` is not in
    /// `1..=max_limit` or `offset` is negative.
    pub fn validate(&self, max_limit: i64) -> Result<()> {
        if self.sql.trim().is_empty() {
            return Err(StudioError::invalid_request("Query text cannot be empty"));
        }
        if self.limit <= 0 {
            return Err(StudioError::invalid_request(format!(
                "limit must be greater than 0, got {}",
                self.limit
            )));
        }
        if self.limit > max_limit {
            return Err(StudioError::invalid_request(format!(
                "limit must not exceed {}, got {}",
                max_limit, self.limit
            )));
        }
        if self.offset < 0 {
            return Err(StudioError::invalid_request(format!(
                "offset must not be negative, got {}",
                self.offset
            )));
        }
        Ok(())
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPageResult {
    pub rows: Vec<Row>,
    /// Rows in this page, not total matching rows
    pub count: usize,
    pub limit: i64,
    pub offset: i64,
}

/// Parses a JSON request payload; `origin` names where it came from in
/// the error.
///
/// # Errors
/// Returns [`StudioError::Serialization`] when the text is not valid JSON
/// for `T`.
pub fn parse_request<T: DeserializeOwned>(text: &str, origin: &str) -> Result<T> {
    serde_json::from_str(text)
        .map_err(|e| StudioError::serialization(format!("Invalid request JSON in {}", origin), e))
}

/// Renders a payload as pretty-printed JSON.
///
/// # Errors
/// Returns [`StudioError::Serialization`] if the value cannot be encoded.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| StudioError::serialization("Failed to serialize result", e))
}
