//! Connection string resolution from layered settings.
//!
//! Precedence, first match wins:
//! 1. the primary named setting (`SCHEMASTUDIO_DATABASE_URL` by default)
//! 2. the generic default setting (`DATABASE_URL` by default)
//! 3. the connection string bound to a live fallback handle
//!
//! Blank values count as unset. Failing to resolve is a fatal
//! configuration error.

use crate::{Result, error::StudioError, error::redact_database_url};
use std::collections::HashMap;
use zeroize::Zeroizing;

/// Default name of the primary connection-string setting.
pub const PRIMARY_SETTING: &str = "SCHEMASTUDIO_DATABASE_URL";

/// Default name of the generic fallback connection-string setting.
pub const DEFAULT_SETTING: &str = "DATABASE_URL";

/// A source of named string settings.
pub trait SettingsSource {
    /// Returns the raw value of `key`, if the source defines it.
    fn get(&self, key: &str) -> Option<String>;
}

/// Settings read from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSettings;

impl SettingsSource for EnvSettings {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl SettingsSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// An ordered stack of sources; the first source holding a non-blank
/// value for a key wins.
#[derive(Default)]
pub struct LayeredSettings {
    layers: Vec<Box<dyn SettingsSource + Send + Sync>>,
}

impl std::fmt::Debug for LayeredSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredSettings")
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl LayeredSettings {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a source below the existing ones.
    pub fn with_layer(mut self, source: impl SettingsSource + Send + Sync + 'static) -> Self {
        self.layers.push(Box::new(source));
        self
    }
}

impl SettingsSource for LayeredSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.layers
            .iter()
            .filter_map(|layer| layer.get(key))
            .find(|value| !value.trim().is_empty())
    }
}

/// A live connection handle that knows the connection string it was
/// opened with.
pub trait BoundConnection {
    /// The connection string bound to this handle.
    fn connection_string(&self) -> Option<&str>;
}

/// Where a resolved connection string came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedFrom {
    /// The primary named setting
    Primary(String),
    /// The generic default setting
    Default(String),
    /// The fallback connection handle
    Fallback,
}

/// A resolved connection string, zeroed on drop.
pub struct ResolvedConnection {
    connection_string: Zeroizing<String>,
    /// Which layer supplied the value
    pub source: ResolvedFrom,
}

impl std::fmt::Debug for ResolvedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConnection")
            .field("connection_string", &self.redacted())
            .field("source", &self.source)
            .finish()
    }
}

impl ResolvedConnection {
    /// The raw connection string. Never log this; use [`Self::redacted`].
    pub fn expose(&self) -> &str {
        &self.connection_string
    }

    /// The connection string with any password masked.
    pub fn redacted(&self) -> String {
        redact_database_url(&self.connection_string)
    }
}

/// Resolves the connection string from configuration.
#[derive(Debug, Clone)]
pub struct ConnectionResolver {
    primary_setting: String,
    default_setting: String,
}

impl Default for ConnectionResolver {
    fn default() -> Self {
        Self::new(PRIMARY_SETTING, DEFAULT_SETTING)
    }
}

impl ConnectionResolver {
    /// Creates a resolver with custom setting names.
    pub fn new(primary_setting: impl Into<String>, default_setting: impl Into<String>) -> Self {
        Self {
            primary_setting: primary_setting.into(),
            default_setting: default_setting.into(),
        }
    }

    /// Name of the primary setting.
    pub fn primary_setting(&self) -> &str {
        &self.primary_setting
    }

    /// Name of the generic default setting.
    pub fn default_setting(&self) -> &str {
        &self.default_setting
    }

    /// Resolves the live connection string.
    ///
    /// # Errors
    /// Returns [`StudioError::Configuration`] when no layer yields a value.
    ///
    /// # Example
    /// ```rust
    /// use schemastudio_core::config::{ConnectionResolver, ResolvedFrom};
    /// use std::collections::HashMap;
    ///
    /// let settings = HashMap::from([(
    ///     "DATABASE_URL".to_string(),
    ///     "postgres://localhost/farm".to_string(),
    /// )]);
    /// let resolved = ConnectionResolver::default().resolve(&settings, None).unwrap();
    /// assert_eq!(resolved.expose(), "postgres://localhost/farm");
    /// assert_eq!(resolved.source, ResolvedFrom::Default("DATABASE_URL".to_string()));
    /// ```
    pub fn resolve(
        &self,
        settings: &dyn SettingsSource,
        fallback: Option<&dyn BoundConnection>,
    ) -> Result<ResolvedConnection> {
        if let Some(value) = non_blank(settings.get(&self.primary_setting)) {
            return Ok(resolved(value, ResolvedFrom::Primary(self.primary_setting.clone())));
        }

        if let Some(value) = non_blank(settings.get(&self.default_setting)) {
            return Ok(resolved(value, ResolvedFrom::Default(self.default_setting.clone())));
        }

        if let Some(value) = fallback
            .and_then(|handle| handle.connection_string())
            .filter(|value| !value.trim().is_empty())
        {
            return Ok(resolved(value.to_string(), ResolvedFrom::Fallback));
        }

        Err(StudioError::configuration(format!(
            "No connection string configured: set {} or {}, or supply a live connection",
            self.primary_setting, self.default_setting
        )))
    }
}

fn resolved(value: String, source: ResolvedFrom) -> ResolvedConnection {
    let value = Zeroizing::new(value);
    let resolved = ResolvedConnection {
        connection_string: Zeroizing::new(value.trim().to_string()),
        source,
    };
    tracing::debug!(
        "Resolved connection string {} from {:?}",
        resolved.redacted(),
        resolved.source
    );
    resolved
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
