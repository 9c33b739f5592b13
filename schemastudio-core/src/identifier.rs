//! Identifier validation and quoting for generated SQL.
//!
//! PostgreSQL cannot bind identifiers as parameters, so schema, table,
//! column and constraint names are string-built into DDL. Every such
//! insertion point in this crate goes through [`quote_validated`] or
//! [`qualified_name`]; nothing else quotes identifiers.
//!
//! The accepted grammar is `^[A-Za-z_][A-Za-z0-9_]*$`, at most
//! [`MAX_IDENTIFIER_LENGTH`] bytes. Declared column types and default
//! expressions are interpolated as well and get their own checks here.

use crate::{Result, error::StudioError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// PostgreSQL truncates identifiers longer than `NAMEDATALEN - 1` bytes.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Quoting character for the PostgreSQL dialect.
const QUOTE: char = '"';

/// What an identifier names; carried in validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentifierKind {
    Schema,
    Table,
    Column,
    Constraint,
    DataType,
}

impl std::fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentifierKind::Schema => write!(f, "Schema"),
            IdentifierKind::Table => write!(f, "Table"),
            IdentifierKind::Column => write!(f, "Column"),
            IdentifierKind::Constraint => write!(f, "Constraint"),
            IdentifierKind::DataType => write!(f, "Data type"),
        }
    }
}

/// Pre-compiled patterns, initialized once.
struct IdentifierPatterns {
    identifier: Regex,
    type_name: Regex,
}

impl IdentifierPatterns {
    fn instance() -> &'static Self {
        static PATTERNS: OnceLock<IdentifierPatterns> = OnceLock::new();
        PATTERNS.get_or_init(Self::compile)
    }

    #[allow(clippy::expect_used)]
    fn compile() -> Self {
        let identifier =
            Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid identifier pattern");
        // word( word)* [(n[, n])] [word( word)*] [[]...], optionally schema-qualified:
        // covers "integer", "character varying(100)", "numeric(10, 2)",
        // "timestamp(3) with time zone", "text[]", "public.my_enum".
        let type_name = Regex::new(
            r"^(?:[A-Za-z_][A-Za-z0-9_]*\.)?[A-Za-z_][A-Za-z0-9_]*(?: [A-Za-z_][A-Za-z0-9_]*)*(?:\(\s*\d+(?:\s*,\s*\d+)?\s*\))?(?: [A-Za-z_][A-Za-z0-9_]*)*(?:\[\d*\])*$",
        )
        .expect("Invalid type name pattern");
        Self {
            identifier,
            type_name,
        }
    }
}

/// Validates an identifier against the allow-list grammar.
///
/// # Errors
/// Returns [`StudioError::InvalidIdentifier`] naming `kind` and the value.
///
/// # Example
/// ```rust
/// use schemastudio_core::identifier::{IdentifierKind, validate_identifier};
///
/// assert!(validate_identifier("farm_lots", IdentifierKind::Table).is_ok());
/// assert!(validate_identifier("x; DROP TABLE y", IdentifierKind::Table).is_err());
/// ```
pub fn validate_identifier(identifier: &str, kind: IdentifierKind) -> Result<()> {
    if identifier.len() > MAX_IDENTIFIER_LENGTH
        || !IdentifierPatterns::instance()
            .identifier
            .is_match(identifier)
    {
        return Err(StudioError::invalid_identifier(kind, identifier));
    }
    Ok(())
}

/// Wraps an identifier in double quotes, doubling any embedded quote.
///
/// Validation already forbids the quote character; the escaping keeps the
/// output well-formed for catalog-sourced names that skip validation.
pub fn quote_identifier(identifier: &str) -> String {
    let mut quoted = String::with_capacity(identifier.len() + 2);
    quoted.push(QUOTE);
    for c in identifier.chars() {
        if c == QUOTE {
            quoted.push(QUOTE);
        }
        quoted.push(c);
    }
    quoted.push(QUOTE);
    quoted
}

/// Validates then quotes an identifier.
pub fn quote_validated(identifier: &str, kind: IdentifierKind) -> Result<String> {
    validate_identifier(identifier, kind)?;
    Ok(quote_identifier(identifier))
}

/// Builds a validated `"schema"."table"` reference.
pub fn qualified_name(schema: &str, table: &str) -> Result<String> {
    Ok(format!(
        "{}.{}",
        quote_validated(schema, IdentifierKind::Schema)?,
        quote_validated(table, IdentifierKind::Table)?
    ))
}

/// Validates a declared column type such as `character varying(100)`.
///
/// Returns the trimmed type text to embed.
pub fn validate_type_name(type_name: &str) -> Result<&str> {
    let trimmed = type_name.trim();
    if trimmed.is_empty() || !IdentifierPatterns::instance().type_name.is_match(trimmed) {
        return Err(StudioError::invalid_identifier(
            IdentifierKind::DataType,
            type_name,
        ));
    }
    Ok(trimmed)
}

/// Checks a default expression before it is embedded in DDL.
///
/// Default expressions are operator-supplied SQL (`now()`, `'pending'`,
/// `0`) and are embedded as written. The check keeps the expression inside
/// its column definition: outside of quoted sections it may not contain a
/// statement terminator, a comment opener, a dollar sign, or a comma or
/// closing bracket that is not balanced by an opening one. Quoted sections
/// must be closed; `E'...'` literals honor backslash escapes.
///
/// Returns the trimmed expression.
pub fn validate_default_expression(expression: &str) -> Result<&str> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(StudioError::invalid_request(
            "Default expression cannot be empty",
        ));
    }

    let chars: Vec<char> = trimmed.chars().collect();
    let mut brackets: Vec<char> = Vec::new();
    let mut i = 0;
    while let Some(&c) = chars.get(i) {
        let next = chars.get(i + 1).copied();
        match c {
            '\'' | '"' => {
                let backslash_escapes = c == '\'' && starts_escape_string(&chars[..i]);
                i = closing_quote(&chars, i, backslash_escapes).ok_or_else(|| {
                    StudioError::invalid_request(
                        "Default expression has an unterminated quoted section",
                    )
                })?;
                continue;
            }
            '(' => brackets.push(')'),
            '[' => brackets.push(']'),
            ')' | ']' => {
                if brackets.pop() != Some(c) {
                    return Err(StudioError::invalid_request(format!(
                        "Default expression has an unbalanced '{}'",
                        c
                    )));
                }
            }
            ',' if brackets.is_empty() => {
                return Err(StudioError::invalid_request(
                    "Default expression may not contain ',' outside brackets or a literal",
                ));
            }
            ';' | '$' => {
                return Err(StudioError::invalid_request(format!(
                    "Default expression may not contain '{}' outside a literal",
                    c
                )));
            }
            '-' if next == Some('-') => {
                return Err(StudioError::invalid_request(
                    "Default expression may not contain a '--' comment",
                ));
            }
            '/' if next == Some('*') => {
                return Err(StudioError::invalid_request(
                    "Default expression may not contain a '/*' comment",
                ));
            }
            _ => {}
        }
        i += 1;
    }

    if !brackets.is_empty() {
        return Err(StudioError::invalid_request(
            "Default expression has an unclosed bracket",
        ));
    }
    Ok(trimmed)
}

/// True when the text before a `'` ends in a standalone `E` prefix.
fn starts_escape_string(before: &[char]) -> bool {
    match before {
        [.., prefix] if prefix.eq_ignore_ascii_case(&'e') => !matches!(
            before.len().checked_sub(2).and_then(|i| before.get(i)),
            Some(c) if c.is_ascii_alphanumeric() || *c == '_'
        ),
        _ => false,
    }
}

/// Index just past the quote that closes the section opened at `start`.
/// A doubled quote stays inside the section.
fn closing_quote(chars: &[char], start: usize, backslash_escapes: bool) -> Option<usize> {
    let quote = *chars.get(start)?;
    let mut i = start + 1;
    while let Some(&c) = chars.get(i) {
        if backslash_escapes && c == '\\' {
            i += 2;
        } else if c == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
            } else {
                return Some(i + 1);
            }
        } else {
            i += 1;
        }
    }
    None
}
