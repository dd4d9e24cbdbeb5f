//! Configuration document persistence.
//!
//! The document lives at `~/.pdf_translator_config.toml` by default. Writes
//! never include the credential or any input file path.

pub mod document;
mod flat;

pub use document::{ConfigDocument, EngineSection, InterfaceSection};

use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigRecord, InterfaceOptions};
use crate::error::{Error, Result};

/// File name of the configuration document inside the home directory
pub const CONFIG_FILE_NAME: &str = ".pdf_translator_config.toml";

const HEADER: &str = "# PDF Desk configuration\n\
# The [babeldoc] table can be used directly: babeldoc --config <this file>\n\
# The credential is never stored here.\n\n";

/// What a successful load hands back to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub engine: EngineSection,
    pub interface: InterfaceOptions,
}

impl LoadedConfig {
    /// Record view, keeping `current_api_key` unless the document has one.
    pub fn record(&self, current_api_key: &str) -> ConfigRecord {
        self.engine.to_record(current_api_key)
    }
}

/// Reads and writes this process's configuration document
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.pdf_translator_config.toml`
    pub fn at_default_location() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn default_path() -> Result<PathBuf> {
        crate::util::home_dir()
            .map(|home| home.join(CONFIG_FILE_NAME))
            .ok_or(Error::NoHomeDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render the document text for the given state.
    pub fn render(record: &ConfigRecord, interface: &InterfaceOptions) -> Result<String> {
        let document = ConfigDocument::new(record, interface);
        let body = toml::to_string(&document)
            .map_err(|e| Error::ConfigSave(format!("Failed to serialize config: {e}")))?;
        Ok(format!("{HEADER}{body}"))
    }

    /// Write the document, reporting failures to the caller.
    pub fn write(&self, record: &ConfigRecord, interface: &InterfaceOptions) -> Result<()> {
        let content = Self::render(record, interface)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigSave(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        std::fs::write(&self.path, content).map_err(|e| {
            Error::ConfigSave(format!("Failed to write {}: {}", self.path.display(), e))
        })?;

        info!("Configuration saved to {}", self.path.display());
        Ok(())
    }

    /// Write the document; failures are logged and otherwise ignored.
    pub fn save(&self, record: &ConfigRecord, interface: &InterfaceOptions) {
        if let Err(e) = self.write(record, interface) {
            error!("{}", e);
        }
    }

    /// Read and parse the document.
    pub fn read(&self) -> Result<LoadedConfig> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::ConfigLoad(format!("Failed to read config file {}: {}", self.path.display(), e))
        })?;

        let document = parse_document(&content)?;
        Ok(LoadedConfig {
            interface: InterfaceOptions::from(&document.gui),
            engine: document.babeldoc,
        })
    }

    /// Load the document if present and readable; problems are logged.
    pub fn load(&self) -> Option<LoadedConfig> {
        if !self.path.exists() {
            debug!("No config file at {}", self.path.display());
            return None;
        }

        match self.read() {
            Ok(loaded) => {
                info!("Configuration loaded from {}", self.path.display());
                Some(loaded)
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    /// Delete the document. Missing files are not an error.
    pub fn reset(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Removed {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::ConfigSave(format!(
                "Failed to remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Save the current state, then copy the document to `dest`.
    pub fn export(
        &self,
        record: &ConfigRecord,
        interface: &InterfaceOptions,
        dest: impl AsRef<Path>,
    ) -> Result<()> {
        let dest = dest.as_ref();
        self.write(record, interface)?;
        std::fs::copy(&self.path, dest).map_err(|e| {
            Error::ConfigSave(format!("Failed to export to {}: {}", dest.display(), e))
        })?;
        info!("Configuration exported to {}", dest.display());
        Ok(())
    }
}

/// Parse document text, falling back to the line reader on TOML errors.
pub fn parse_document(content: &str) -> Result<ConfigDocument> {
    let table = match toml::from_str::<toml::Table>(content) {
        Ok(table) => table,
        Err(e) => {
            warn!("Config is not valid TOML ({}), using line parser", e.message());
            flat::parse(content)
        }
    };

    toml::Value::Table(table)
        .try_into::<ConfigDocument>()
        .map_err(|e| Error::ConfigParse(e.to_string()))
}
