//! Editable form state behind the presentation layer.
//!
//! Fields hold what the user typed; [`FormState::to_record`] validates them
//! into a [`ConfigRecord`].

use std::path::PathBuf;

use crate::config::{ConfigRecord, InterfaceOptions};
use crate::error::{Error, Result};
use crate::store::LoadedConfig;

/// Field names accepted by [`FormState::set`]
pub const FIELD_NAMES: &[&str] = &[
    "lang-in", "lang-out", "qps", "model", "url", "api-key", "dual", "mono", "output",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub source_lang: String,
    pub target_lang: String,
    /// Requests per second, as entered
    pub qps: String,
    pub model: String,
    pub ollama_url: String,
    pub api_key: String,
    pub dual_output: bool,
    pub mono_output: bool,
    pub output_dir: Option<PathBuf>,
    pub interface: InterfaceOptions,
}

impl Default for FormState {
    fn default() -> Self {
        Self::from_record(&ConfigRecord::default(), InterfaceOptions::default())
    }
}

impl FormState {
    pub fn from_record(record: &ConfigRecord, interface: InterfaceOptions) -> Self {
        Self {
            source_lang: record.lang_in.to_string(),
            target_lang: record.lang_out.to_string(),
            qps: record.qps.to_string(),
            model: record.model.clone(),
            ollama_url: record.base_url.clone(),
            api_key: record.api_key.clone(),
            dual_output: record.dual_output,
            mono_output: record.mono_output,
            output_dir: record.output_dir.clone(),
            interface,
        }
    }

    /// Overwrite fields from a loaded document. The credential is only
    /// replaced when the document carries one.
    pub fn apply_loaded(&mut self, loaded: &LoadedConfig) {
        let record = loaded.record(&self.api_key);
        *self = Self::from_record(&record, loaded.interface.clone());
    }

    /// Back to factory defaults.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Validate into a record.
    pub fn to_record(&self) -> Result<ConfigRecord> {
        let qps = self
            .qps
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|&q| q > 0)
            .ok_or_else(|| invalid("qps", format!("expected a positive integer, got '{}'", self.qps)))?;

        let base_url = self.ollama_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(invalid("url", "must not be empty"));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(invalid("url", format!("'{base_url}' is not an http(s) URL")));
        }

        let model = self.model.trim();
        if model.is_empty() {
            return Err(invalid("model", "must not be empty"));
        }

        Ok(ConfigRecord {
            lang_in: self.source_lang.trim().into(),
            lang_out: self.target_lang.trim().into(),
            qps,
            model: model.to_string(),
            base_url: base_url.to_string(),
            api_key: self.api_key.clone(),
            dual_output: self.dual_output,
            mono_output: self.mono_output,
            output_dir: self.output_dir.clone(),
        })
    }

    /// Set one field by name. Values are stored as typed; see [`FIELD_NAMES`].
    pub fn set(&mut self, field: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match field {
            "lang-in" => self.source_lang = value.to_string(),
            "lang-out" => self.target_lang = value.to_string(),
            "qps" => self.qps = value.to_string(),
            "model" => self.model = value.to_string(),
            "url" => self.ollama_url = value.to_string(),
            "api-key" => self.api_key = value.to_string(),
            "dual" => self.dual_output = parse_flag(field, value)?,
            "mono" => self.mono_output = parse_flag(field, value)?,
            "output" => {
                self.output_dir = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            _ => {
                return Err(invalid(
                    field,
                    format!("unknown field (expected one of {})", FIELD_NAMES.join(", ")),
                ));
            }
        }
        Ok(())
    }

    pub const fn toggle_api_key_visibility(&mut self) -> bool {
        self.interface.show_api_key = !self.interface.show_api_key;
        self.interface.show_api_key
    }

    /// Credential as it should be displayed
    pub fn displayed_api_key(&self) -> String {
        if self.interface.show_api_key {
            self.api_key.clone()
        } else {
            "*".repeat(self.api_key.chars().count())
        }
    }
}

fn parse_flag(field: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(field, format!("expected on/off, got '{value}'"))),
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> Error {
    Error::ConfigInvalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_form_matches_default_record() {
        let form = FormState::default();
        assert_eq!(form.qps, "2");
        assert_eq!(form.to_record().unwrap(), ConfigRecord::default());
    }

    #[test]
    fn test_qps_validation() {
        let mut form = FormState::default();
        form.qps = "fast".to_string();
        assert!(matches!(
            form.to_record(),
            Err(Error::ConfigInvalid { ref field, .. }) if field == "qps"
        ));
        form.qps = "0".to_string();
        assert!(form.to_record().is_err());
        form.qps = " 8 ".to_string();
        assert_eq!(form.to_record().unwrap().qps, 8);
    }

    #[test]
    fn test_url_is_normalized() {
        let mut form = FormState::default();
        form.ollama_url = "http://gpu:11434/".to_string();
        assert_eq!(form.to_record().unwrap().base_url, "http://gpu:11434");

        form.ollama_url = "gpu:11434".to_string();
        assert!(form.to_record().is_err());
    }

    #[test]
    fn test_set_fields() {
        let mut form = FormState::default();
        form.set("lang-out", "zh-TW").unwrap();
        form.set("dual", "off").unwrap();
        form.set("output", "/tmp/out").unwrap();
        assert_eq!(form.target_lang, "zh-TW");
        assert!(!form.dual_output);
        assert_eq!(form.output_dir, Some(PathBuf::from("/tmp/out")));

        form.set("output", "").unwrap();
        assert_eq!(form.output_dir, None);

        assert!(form.set("dual", "maybe").is_err());
        assert!(form.set("colour", "red").is_err());
    }

    #[test]
    fn test_api_key_masking() {
        let mut form = FormState::default();
        assert_eq!(form.displayed_api_key(), "******");
        assert!(form.toggle_api_key_visibility());
        assert_eq!(form.displayed_api_key(), "ollama");
    }
}
