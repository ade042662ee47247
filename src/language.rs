//! Language packs: UI strings and prompt templates per language code.
//!
//! Packs are loaded once from a JSON file keyed by language code. Required keys
//! must be present and non-empty for every language; optional keys fall back to
//! the English defaults in [`FALLBACKS`].

use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LanguageError {
    #[error("Language file not found: {0}")]
    NotFound(String),
    #[error("failed to read language file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Invalid JSON format in language file: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("language file defines no languages")]
    Empty,
    #[error("language '{lang}' is missing required key '{key}'")]
    MissingKey { lang: String, key: &'static str },
    #[error("unsupported language: {0}")]
    UnknownLanguage(String),
}

/// Keys every language must define.
pub const REQUIRED_KEYS: &[&str] = &[
    "title",
    "subtitle",
    "topic_prompt",
    "slide_count",
    "custom_slides",
    "custom_placeholder",
    "generate_btn",
    "no_topic_warning",
    "generating",
    "success",
    "download",
    "system_prompt_titles",
    "user_prompt_titles",
    "system_prompt_content",
    "user_prompt_content",
];

/// Optional keys and the text used when a language leaves them out.
pub const FALLBACKS: &[(&str, &str)] = &[
    (
        "system_prompt_analysis",
        "You are an expert presentation content analyzer. Analyze the provided content and return: \
         1. Key themes/topics (for slide titles) \
         2. Important points (for slide content) \
         3. Recommended structure \
         Format as JSON with keys: themes, points, recommendations",
    ),
    (
        "user_prompt_analysis",
        "Analyze this content for presentation about {topic}:\n\n{content}",
    ),
    ("content_analysis", "Content Analysis"),
    ("content_analysis_prompt", "Enter content to analyze (optional):"),
    (
        "content_analysis_placeholder",
        "Paste relevant content that AI should consider",
    ),
    ("analyze_button", "Analyze Content"),
    ("analyzing", "Analyzing content..."),
    ("analysis_complete", "Analysis complete!"),
    ("key_themes", "Key Themes"),
    ("recommendations", "Recommended Structure"),
    ("error", "Error"),
];

/// Fully resolved strings for one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texts {
    pub title: String,
    pub subtitle: String,
    pub topic_prompt: String,
    pub slide_count: String,
    pub custom_slides: String,
    pub custom_placeholder: String,
    pub generate_btn: String,
    pub no_topic_warning: String,
    pub generating: String,
    pub success: String,
    pub download: String,
    pub system_prompt_titles: String,
    pub user_prompt_titles: String,
    pub system_prompt_content: String,
    pub user_prompt_content: String,

    pub system_prompt_analysis: String,
    pub user_prompt_analysis: String,
    pub content_analysis: String,
    pub content_analysis_prompt: String,
    pub content_analysis_placeholder: String,
    pub analyze_button: String,
    pub analyzing: String,
    pub analysis_complete: String,
    pub key_themes: String,
    pub recommendations: String,
    pub error: String,
}

impl Texts {
    fn from_raw(lang: &str, mut raw: BTreeMap<String, String>) -> Result<Self, LanguageError> {
        let mut required = |key: &'static str| -> Result<String, LanguageError> {
            match raw.remove(key) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                _ => Err(LanguageError::MissingKey {
                    lang: lang.to_string(),
                    key,
                }),
            }
        };

        let title = required("title")?;
        let subtitle = required("subtitle")?;
        let topic_prompt = required("topic_prompt")?;
        let slide_count = required("slide_count")?;
        let custom_slides = required("custom_slides")?;
        let custom_placeholder = required("custom_placeholder")?;
        let generate_btn = required("generate_btn")?;
        let no_topic_warning = required("no_topic_warning")?;
        let generating = required("generating")?;
        let success = required("success")?;
        let download = required("download")?;
        let system_prompt_titles = required("system_prompt_titles")?;
        let user_prompt_titles = required("user_prompt_titles")?;
        let system_prompt_content = required("system_prompt_content")?;
        let user_prompt_content = required("user_prompt_content")?;

        let mut optional = |key: &str| -> String {
            raw.remove(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| fallback(key).to_string())
        };

        Ok(Self {
            title,
            subtitle,
            topic_prompt,
            slide_count,
            custom_slides,
            custom_placeholder,
            generate_btn,
            no_topic_warning,
            generating,
            success,
            download,
            system_prompt_titles,
            user_prompt_titles,
            system_prompt_content,
            user_prompt_content,
            system_prompt_analysis: optional("system_prompt_analysis"),
            user_prompt_analysis: optional("user_prompt_analysis"),
            content_analysis: optional("content_analysis"),
            content_analysis_prompt: optional("content_analysis_prompt"),
            content_analysis_placeholder: optional("content_analysis_placeholder"),
            analyze_button: optional("analyze_button"),
            analyzing: optional("analyzing"),
            analysis_complete: optional("analysis_complete"),
            key_themes: optional("key_themes"),
            recommendations: optional("recommendations"),
            error: optional("error"),
        })
    }
}

/// Look up the fallback for an optional key.
pub fn fallback(key: &str) -> &'static str {
    FALLBACKS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .unwrap_or("")
}

/// All loaded language packs, in file order of their codes (sorted).
#[derive(Debug, Clone)]
pub struct Languages {
    packs: BTreeMap<String, Texts>,
}

impl Languages {
    /// Load language packs from a JSON file
    pub fn load(path: &Path) -> Result<Self, LanguageError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LanguageError::NotFound(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let languages = Self::from_json(&content)?;
        tracing::info!(
            path = %path.display(),
            languages = ?languages.codes().collect::<Vec<_>>(),
            "loaded language packs"
        );
        Ok(languages)
    }

    /// Parse and validate language packs from JSON text
    pub fn from_json(content: &str) -> Result<Self, LanguageError> {
        let raw: BTreeMap<String, BTreeMap<String, String>> = serde_json::from_str(content)?;
        if raw.is_empty() {
            return Err(LanguageError::Empty);
        }

        let packs = raw
            .into_iter()
            .map(|(lang, strings)| {
                let texts = Texts::from_raw(&lang, strings)?;
                Ok((lang, texts))
            })
            .collect::<Result<BTreeMap<_, _>, LanguageError>>()?;

        Ok(Self { packs })
    }

    /// Get the texts for a language code
    pub fn get(&self, lang: &str) -> Result<&Texts, LanguageError> {
        self.packs
            .get(lang)
            .ok_or_else(|| LanguageError::UnknownLanguage(lang.to_string()))
    }

    /// Supported language codes
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.packs.keys().map(String::as_str)
    }

    /// The language selected when none is requested
    pub fn default_code(&self) -> &str {
        if self.packs.contains_key("English") {
            return "English";
        }
        self.codes().next().unwrap_or_default()
    }
}

/// Substitute `{name}` placeholders in a template.
///
/// Placeholders without a matching variable are left as written.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let value = after.find('}').and_then(|end| {
            let name = &after[..end];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, end))
        });

        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
