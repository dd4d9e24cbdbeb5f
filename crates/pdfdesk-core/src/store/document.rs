//! On-disk layout of the configuration document.
//!
//! The `[babeldoc]` table uses the engine's own option names so the file can
//! be handed to `babeldoc --config` unchanged. `[gui]` is ignored by the engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::{ConfigRecord, InterfaceOptions, Lang, strip_openai_suffix};

/// Whole document: one table per section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub babeldoc: EngineSection,
    #[serde(default)]
    pub gui: InterfaceSection,
}

/// Options forwarded to the engine.
///
/// Fields after `output` up to `openai` are fixed engine defaults that are
/// always written as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub debug: bool,
    #[serde(rename = "lang-in")]
    pub lang_in: String,
    #[serde(rename = "lang-out")]
    pub lang_out: String,
    pub qps: u32,
    pub output: String,

    #[serde(rename = "split-short-lines")]
    pub split_short_lines: bool,
    #[serde(rename = "short-line-split-factor")]
    pub short_line_split_factor: f64,
    #[serde(rename = "skip-clean")]
    pub skip_clean: bool,
    #[serde(rename = "dual-translate-first")]
    pub dual_translate_first: bool,
    #[serde(rename = "disable-rich-text-translate")]
    pub disable_rich_text_translate: bool,
    #[serde(rename = "use-alternating-pages-dual")]
    pub use_alternating_pages_dual: bool,
    #[serde(rename = "watermark-output-mode")]
    pub watermark_output_mode: String,
    #[serde(rename = "max-pages-per-part")]
    pub max_pages_per_part: u32,
    pub only_include_translated_page: bool,
    #[serde(rename = "skip-scanned-detection")]
    pub skip_scanned_detection: bool,
    pub auto_extract_glossary: bool,
    pub formular_font_pattern: String,
    pub formular_char_pattern: String,
    pub show_char_box: bool,
    pub ocr_workaround: bool,
    pub rpc_doclayout: String,
    pub working_dir: String,
    pub auto_enable_ocr_workaround: bool,

    pub openai: bool,
    #[serde(rename = "openai-model")]
    pub openai_model: String,
    #[serde(rename = "openai-base-url")]
    pub openai_base_url: String,
    /// Read if a user put it there by hand, never written
    #[serde(rename = "openai-api-key", skip_serializing)]
    pub openai_api_key: Option<String>,
    #[serde(rename = "pool-max-workers")]
    pub pool_max_workers: u32,

    #[serde(rename = "no-dual")]
    pub no_dual: bool,
    #[serde(rename = "no-mono")]
    pub no_mono: bool,
    #[serde(rename = "min-text-length")]
    pub min_text_length: u32,
    #[serde(rename = "report-interval")]
    pub report_interval: f64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self::from_record(&ConfigRecord::default())
    }
}

impl EngineSection {
    pub fn from_record(record: &ConfigRecord) -> Self {
        Self {
            debug: false,
            lang_in: record.lang_in.to_string(),
            lang_out: record.lang_out.to_string(),
            qps: record.qps,
            output: record
                .output_dir
                .as_ref()
                .map(|dir| dir.to_string_lossy().into_owned())
                .unwrap_or_default(),

            split_short_lines: false,
            short_line_split_factor: 0.8,
            skip_clean: false,
            dual_translate_first: false,
            disable_rich_text_translate: false,
            use_alternating_pages_dual: false,
            watermark_output_mode: "no_watermark".to_string(),
            max_pages_per_part: 50,
            only_include_translated_page: false,
            skip_scanned_detection: false,
            auto_extract_glossary: true,
            formular_font_pattern: String::new(),
            formular_char_pattern: String::new(),
            show_char_box: false,
            ocr_workaround: false,
            rpc_doclayout: String::new(),
            working_dir: String::new(),
            auto_enable_ocr_workaround: false,

            openai: true,
            openai_model: record.model.clone(),
            openai_base_url: record.openai_base_url(),
            openai_api_key: None,
            pool_max_workers: record.pool_max_workers(),

            no_dual: !record.dual_output,
            no_mono: !record.mono_output,
            min_text_length: 5,
            report_interval: 0.5,
        }
    }

    /// Fold the persisted values back into a record.
    ///
    /// The credential is left at `fallback_api_key` unless the file carries one.
    pub fn to_record(&self, fallback_api_key: &str) -> ConfigRecord {
        let output_dir = if self.output.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.output))
        };

        ConfigRecord {
            lang_in: Lang::new(&self.lang_in),
            lang_out: Lang::new(&self.lang_out),
            qps: self.qps,
            model: self.openai_model.clone(),
            base_url: strip_openai_suffix(&self.openai_base_url).to_string(),
            api_key: self
                .openai_api_key
                .clone()
                .unwrap_or_else(|| fallback_api_key.to_string()),
            dual_output: !self.no_dual,
            mono_output: !self.no_mono,
            output_dir,
        }
    }
}

/// Presentation-only options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceSection {
    pub window_geometry: String,
    pub show_api_key: bool,
}

impl From<&InterfaceOptions> for InterfaceSection {
    fn from(options: &InterfaceOptions) -> Self {
        Self {
            window_geometry: options.window_geometry.clone().unwrap_or_default(),
            show_api_key: options.show_api_key,
        }
    }
}

impl From<&InterfaceSection> for InterfaceOptions {
    fn from(section: &InterfaceSection) -> Self {
        Self {
            window_geometry: (!section.window_geometry.is_empty())
                .then(|| section.window_geometry.clone()),
            show_api_key: section.show_api_key,
        }
    }
}

impl ConfigDocument {
    pub fn new(record: &ConfigRecord, interface: &InterfaceOptions) -> Self {
        Self {
            babeldoc: EngineSection::from_record(record),
            gui: InterfaceSection::from(interface),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_section_inverts_output_flags() {
        let record = ConfigRecord {
            dual_output: false,
            mono_output: true,
            ..Default::default()
        };
        let section = EngineSection::from_record(&record);
        assert!(section.no_dual);
        assert!(!section.no_mono);

        let back = section.to_record("ollama");
        assert!(!back.dual_output);
        assert!(back.mono_output);
    }

    #[test]
    fn test_empty_output_means_unset() {
        let section = EngineSection::default();
        assert_eq!(section.output, "");
        assert_eq!(section.to_record("ollama").output_dir, None);
    }

    #[test]
    fn test_hand_written_credential_is_honored() {
        let section = EngineSection {
            openai_api_key: Some("sk-local".to_string()),
            ..Default::default()
        };
        assert_eq!(section.to_record("ollama").api_key, "sk-local");
    }

    #[test]
    fn test_blank_geometry_maps_to_none() {
        let options = InterfaceOptions::from(&InterfaceSection::default());
        assert_eq!(options.window_geometry, None);
    }
}
