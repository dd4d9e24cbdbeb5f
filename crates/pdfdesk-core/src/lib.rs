//! PDF Desk Core Library
//!
//! Everything behind the PDF Desk front ends except rendering:
//! - Configuration record, form state and the on-disk document
//! - Ollama reachability check and model listing
//! - The BabelDOC engine seam and its subprocess bridge
//! - File selection and drag-and-drop intake
//! - The per-file translation orchestrator

pub mod backend;
pub mod config;
pub mod dnd;
pub mod engine;
pub mod error;
pub mod form;
pub mod orchestrator;
pub mod selection;
pub mod store;
pub mod util;

pub use backend::OllamaClient;
pub use config::{
    ConfigRecord, InterfaceOptions, Lang, LanguageOption, source_languages, target_languages,
    DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_QPS, DEFAULT_SOURCE_LANG, DEFAULT_TARGET_LANG,
};
pub use dnd::{DropBatch, DropCallback, DropTarget};
pub use engine::{
    BabeldocBridge, Engine, EngineEvent, EventStream, LayoutModel, TranslateResult,
    TranslationRequest,
};
pub use error::{Error, Result};
pub use form::FormState;
pub use orchestrator::{FileOutcome, Orchestrator, RunHandle, RunSummary, RunUpdate, StartOutcome};
pub use selection::{FileSelection, MergeChoice, SelectionChange};
pub use store::{ConfigStore, LoadedConfig};
