//! Configuration for Database
//!
//! Provides a builder pattern for configuring how a database is opened and
//! how caller-supplied column names are treated.

/// Path that selects a private, non-persistent database
pub const MEMORY_PATH: &str = ":memory:";

/// Configuration for a database handle
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// File path of the backing store, or `:memory:`
    pub path: String,
    /// Whether names outside the simple-identifier grammar are base32-encoded
    /// instead of rejected
    pub allow_b32_colnames: bool,
    /// Whether a missing database file is created on open
    pub create_if_missing: bool,
}

impl DatabaseConfig {
    /// Create a new configuration builder
    pub fn builder(path: impl Into<String>) -> DatabaseConfigBuilder {
        DatabaseConfigBuilder::new(path)
    }

    /// Configuration for an in-memory database with default settings
    pub fn in_memory() -> Self {
        Self::builder(MEMORY_PATH).build()
    }

    /// Whether this configuration points at a non-persistent store
    pub fn is_memory(&self) -> bool {
        self.path == MEMORY_PATH
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Builder for DatabaseConfig
#[derive(Debug)]
pub struct DatabaseConfigBuilder {
    path: String,
    allow_b32_colnames: bool,
    create_if_missing: bool,
}

impl DatabaseConfigBuilder {
    /// Create a new builder with the database path
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            allow_b32_colnames: false,
            create_if_missing: true,
        }
    }

    /// Enable or disable base32 encoding of non-conforming column names (default: false)
    pub fn allow_b32_colnames(mut self, enabled: bool) -> Self {
        self.allow_b32_colnames = enabled;
        self
    }

    /// Enable or disable creating the database file when missing (default: true)
    pub fn create_if_missing(mut self, enabled: bool) -> Self {
        self.create_if_missing = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> DatabaseConfig {
        DatabaseConfig {
            path: self.path,
            allow_b32_colnames: self.allow_b32_colnames,
            create_if_missing: self.create_if_missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = DatabaseConfig::builder("data.db").build();
        assert_eq!(config.path, "data.db");
        assert!(!config.allow_b32_colnames);
        assert!(config.create_if_missing);
        assert!(!config.is_memory());
    }

    #[test]
    fn test_builder_overrides() {
        let config = DatabaseConfig::builder("data.db")
            .allow_b32_colnames(true)
            .create_if_missing(false)
            .build();
        assert!(config.allow_b32_colnames);
        assert!(!config.create_if_missing);
    }

    #[test]
    fn test_in_memory() {
        let config = DatabaseConfig::in_memory();
        assert_eq!(config.path, ":memory:");
        assert!(config.is_memory());

        let config = DatabaseConfig::default();
        assert!(config.is_memory());
    }
}
