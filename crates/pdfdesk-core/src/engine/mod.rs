mod bridge;

pub use bridge::{BabeldocBridge, DEFAULT_PYTHON};

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::ConfigRecord;
use crate::error::Result;

/// Events emitted by the engine while translating one document.
///
/// Wire form is `{"type": "progress_update" | "finish" | "error", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    #[serde(rename = "progress_update")]
    Progress {
        #[serde(default)]
        stage: String,
        /// Percent complete for this document, 0-100
        #[serde(default)]
        overall_progress: f64,
    },
    Finish {
        #[serde(rename = "translate_result")]
        result: TranslateResult,
    },
    Error {
        #[serde(rename = "error")]
        message: String,
    },
}

impl EngineEvent {
    /// `Finish` and `Error` end a document.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish { .. } | Self::Error { .. })
    }
}

/// Files produced for one input document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateResult {
    #[serde(default)]
    pub mono_pdf_path: Option<PathBuf>,
    #[serde(default)]
    pub dual_pdf_path: Option<PathBuf>,
}

/// Which document layout model the engine should load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutModel {
    /// Whatever model ships with the engine installation
    #[default]
    Bundled,
    /// Layout detection served over RPC
    Rpc { host: String },
}

/// LLM client settings handed to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatorHandle {
    pub name: String,
    pub model: String,
    /// OpenAI-style base URL, including `/v1`
    pub base_url: String,
    pub api_key: String,
    pub lang_in: String,
    pub lang_out: String,
    pub ignore_cache: bool,
}

/// One call into the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub translator: TranslatorHandle,
    pub input_file: PathBuf,
    pub lang_in: String,
    pub lang_out: String,
    pub doc_layout_model: LayoutModel,
    pub output_dir: PathBuf,
    pub qps: u32,
    pub no_dual: bool,
    pub no_mono: bool,
    pub debug: bool,
    pub skip_clean: bool,
    pub watermark_output_mode: String,
}

impl TranslationRequest {
    pub fn new(record: &ConfigRecord, input_file: &Path, layout: &LayoutModel) -> Self {
        let output_dir = record
            .output_dir
            .clone()
            .unwrap_or_else(|| parent_dir(input_file));

        Self {
            translator: TranslatorHandle {
                name: "ollama".to_string(),
                model: record.model.clone(),
                base_url: record.openai_base_url(),
                api_key: record.api_key.clone(),
                lang_in: record.lang_in.to_string(),
                lang_out: record.lang_out.to_string(),
                ignore_cache: false,
            },
            input_file: input_file.to_path_buf(),
            lang_in: record.lang_in.to_string(),
            lang_out: record.lang_out.to_string(),
            doc_layout_model: layout.clone(),
            output_dir,
            qps: record.qps,
            no_dual: !record.dual_output,
            no_mono: !record.mono_output,
            debug: false,
            skip_clean: false,
            watermark_output_mode: "no_watermark".to_string(),
        }
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Stream of engine events for one document.
///
/// An `Err` item means the engine itself broke, not that the document failed.
pub type EventStream = BoxStream<'static, Result<EngineEvent>>;

/// Entry point of an external translation engine
#[async_trait]
pub trait Engine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &'static str;

    /// Start translating one document. Must be called inside a tokio runtime.
    fn translate(&self, request: TranslationRequest) -> EventStream;

    /// Verify the engine can run at all
    async fn check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let progress: EngineEvent = serde_json::from_str(
            r#"{"type":"progress_update","stage":"Parse PDF","overall_progress":12.5}"#,
        )
        .unwrap();
        assert_eq!(
            progress,
            EngineEvent::Progress {
                stage: "Parse PDF".to_string(),
                overall_progress: 12.5
            }
        );

        let finish: EngineEvent = serde_json::from_str(
            r#"{"type":"finish","translate_result":{"mono_pdf_path":"/o/a.zh.mono.pdf","dual_pdf_path":null}}"#,
        )
        .unwrap();
        assert!(finish.is_terminal());
        assert_eq!(
            finish,
            EngineEvent::Finish {
                result: TranslateResult {
                    mono_pdf_path: Some(PathBuf::from("/o/a.zh.mono.pdf")),
                    dual_pdf_path: None,
                }
            }
        );

        let error: EngineEvent =
            serde_json::from_str(r#"{"type":"error","error":"model not found"}"#).unwrap();
        assert_eq!(
            error,
            EngineEvent::Error {
                message: "model not found".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_event_type_rejected() {
        assert!(serde_json::from_str::<EngineEvent>(r#"{"type":"progress_start"}"#).is_err());
    }

    #[test]
    fn test_request_defaults_output_to_input_parent() {
        let record = ConfigRecord::default();
        let request = TranslationRequest::new(
            &record,
            Path::new("/papers/attention.pdf"),
            &LayoutModel::Bundled,
        );
        assert_eq!(request.output_dir, PathBuf::from("/papers"));
        assert_eq!(request.translator.base_url, "http://localhost:11434/v1");
        assert!(!request.no_dual);
        assert!(!request.no_mono);

        let bare = TranslationRequest::new(&record, Path::new("a.pdf"), &LayoutModel::Bundled);
        assert_eq!(bare.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_request_uses_configured_output_dir() {
        let record = ConfigRecord {
            output_dir: Some(PathBuf::from("/out")),
            mono_output: false,
            ..Default::default()
        };
        let request =
            TranslationRequest::new(&record, Path::new("/in/a.pdf"), &LayoutModel::Bundled);
        assert_eq!(request.output_dir, PathBuf::from("/out"));
        assert!(request.no_mono);
    }
}
