//! Configuration for the address book tool
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (address-book.toml)
//! - Environment variables (ADDRESS_BOOK__*)
//!
//! ## Example config file (address-book.toml):
//! ```toml
//! [schema]
//! path = "schemas/address_book.json"
//!
//! [output]
//! indent = 2
//!
//! [validation]
//! log_failures = true
//! remove_invalid_output = false
//!
//! [logging]
//! filter = "address_book=info"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::converter::ConvertOptions;
use crate::error::Result;
use crate::schema::AddressBookSchema;
use crate::validator::ValidationOptions;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Schema definition settings
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Output formatting
    #[serde(default)]
    pub output: OutputConfig,

    /// Validation behaviour
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Log filter used when RUST_LOG is unset
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Schema definition settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Schema definition file; the embedded schema is used when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Output formatting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Spaces per indentation level in both output forms
    #[serde(default = "default_indent")]
    pub indent: usize,
}

/// Validation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Log validation failures at warn level
    #[serde(default)]
    pub log_failures: bool,

    /// Delete markup output that fails validation after conversion
    #[serde(default)]
    pub remove_invalid_output: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_indent() -> usize {
    2
}

fn default_filter() -> String {
    "error".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            indent: default_indent(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl AppConfig {
    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "address-book.toml",
            ".address-book.toml",
            "config/address-book.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "address-book", "address-book") {
            let xdg_config = config_dir.config_dir().join("address-book.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // ADDRESS_BOOK__OUTPUT__INDENT=4 and friends
        builder = builder.add_source(
            Environment::with_prefix("ADDRESS_BOOK")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// The configured schema, or the embedded one
    pub fn load_schema(&self) -> Result<AddressBookSchema> {
        match &self.schema.path {
            Some(path) => AddressBookSchema::from_file(path),
            None => AddressBookSchema::embedded(),
        }
    }

    /// Converter options derived from this configuration
    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            indent: self.output.indent,
            validation: ValidationOptions {
                log_failures: self.validation.log_failures,
            },
            remove_invalid_output: self.validation.remove_invalid_output,
        }
    }
}
