use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Language codes as understood by the engine ("en", "zh-CN", ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lang(pub String);

impl Lang {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Lang {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Lang {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Default Ollama server address, without the OpenAI `/v1` suffix
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
/// Default model served by Ollama
pub const DEFAULT_MODEL: &str = "qwen2.5:14b";
/// Ollama accepts any bearer token; this is the conventional one
pub const DEFAULT_API_KEY: &str = "ollama";
/// Default source language code
pub const DEFAULT_SOURCE_LANG: &str = "en";
/// Default target language code
pub const DEFAULT_TARGET_LANG: &str = "zh";
/// Default requests per second sent to the backend
pub const DEFAULT_QPS: u32 = 2;

/// Suffix the engine expects on OpenAI-compatible base URLs
pub const OPENAI_PATH_SUFFIX: &str = "/v1";

/// Everything the engine needs to translate one document, minus the document.
///
/// Built from form state whenever the user saves or starts a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRecord {
    pub lang_in: Lang,
    pub lang_out: Lang,
    /// Throughput limit in requests per second
    pub qps: u32,
    pub model: String,
    /// Ollama base URL as the user typed it (no `/v1`)
    pub base_url: String,
    /// Credential sent to the backend; never written to disk
    pub api_key: String,
    /// Produce the bilingual (interleaved) PDF
    pub dual_output: bool,
    /// Produce the translation-only PDF
    pub mono_output: bool,
    /// Where outputs go; `None` means next to each input file
    pub output_dir: Option<PathBuf>,
}

impl ConfigRecord {
    /// Base URL in the form the engine's OpenAI client expects.
    pub fn openai_base_url(&self) -> String {
        format!("{}{OPENAI_PATH_SUFFIX}", self.base_url.trim_end_matches('/'))
    }

    /// Engine worker pool size derived from the throughput limit.
    pub const fn pool_max_workers(&self) -> u32 {
        self.qps.saturating_mul(2)
    }
}

impl Default for ConfigRecord {
    fn default() -> Self {
        Self {
            lang_in: Lang::new(DEFAULT_SOURCE_LANG),
            lang_out: Lang::new(DEFAULT_TARGET_LANG),
            qps: DEFAULT_QPS,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            dual_output: true,
            mono_output: true,
            output_dir: None,
        }
    }
}

/// Settings that only matter to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceOptions {
    /// Toolkit geometry string, e.g. "800x700+10+10"
    pub window_geometry: Option<String>,
    /// Whether the credential field is shown in clear text
    pub show_api_key: bool,
}

/// Strip one trailing `/v1` from a stored engine URL.
pub fn strip_openai_suffix(url: &str) -> &str {
    url.strip_suffix(OPENAI_PATH_SUFFIX).unwrap_or(url)
}

/// A language option for pickers
#[derive(Debug, Clone)]
pub struct LanguageOption {
    /// Language code as passed to the engine
    pub code: &'static str,
    /// Display name
    pub name: &'static str,
    /// Flag emoji
    pub flag: &'static str,
}

/// Languages offered as translation source.
pub fn source_languages() -> Vec<LanguageOption> {
    vec![
        LanguageOption { code: "en", name: "English", flag: "🇬🇧" },
        LanguageOption { code: "fr", name: "French", flag: "🇫🇷" },
        LanguageOption { code: "de", name: "German", flag: "🇩🇪" },
        LanguageOption { code: "es", name: "Spanish", flag: "🇪🇸" },
        LanguageOption { code: "ja", name: "Japanese", flag: "🇯🇵" },
        LanguageOption { code: "ko", name: "Korean", flag: "🇰🇷" },
    ]
}

/// Languages offered as translation target.
pub fn target_languages() -> Vec<LanguageOption> {
    vec![
        LanguageOption { code: "zh", name: "Chinese", flag: "🇨🇳" },
        LanguageOption { code: "zh-CN", name: "Simplified Chinese", flag: "🇨🇳" },
        LanguageOption { code: "zh-TW", name: "Traditional Chinese", flag: "🇹🇼" },
    ]
}
