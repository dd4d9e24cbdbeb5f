use thiserror::Error;

/// Unified error type for pdfdesk-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - Configuration document operations (reading, parsing, writing)
/// - Backend reachability and model listing
/// - Engine bridge failures
/// - File selection and run lifecycle
/// - General I/O operations
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to read the configuration document
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Failed to parse the configuration document
    #[error("failed to parse config: {0}")]
    ConfigParse(String),

    /// Failed to write the configuration document
    #[error("failed to save config: {0}")]
    ConfigSave(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    /// No home directory to place the configuration document in
    #[error("cannot locate the home directory")]
    NoHomeDir,

    // ==========================================================================
    // Backend Errors
    // ==========================================================================
    /// Backend did not answer the status probe
    #[error("backend unreachable: {0}")]
    BackendUnreachable(String),

    /// Backend answered with something that is not a model listing
    #[error("invalid backend response: {0}")]
    BackendInvalidResponse(String),

    // ==========================================================================
    // Engine Errors
    // ==========================================================================
    /// The engine process could not be started
    #[error("failed to start engine: {0}")]
    EngineSpawn(String),

    /// The engine emitted a line that is not a known event
    #[error("unexpected engine output: {0}")]
    EngineProtocol(String),

    /// The engine exited abnormally
    #[error("engine failed: {0}")]
    EngineFailed(String),

    /// The engine environment is missing required modules
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    // ==========================================================================
    // Run Errors
    // ==========================================================================
    /// A run was requested with nothing selected
    #[error("no PDF files selected")]
    NoFiles,

    /// Worker task ended without reporting
    #[error("translation worker failed: {0}")]
    Worker(String),

    /// Drops cannot be received on this surface
    #[error("drag and drop unavailable: {0}")]
    DropUnavailable(String),

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
