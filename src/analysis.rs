//! Analysis struct - the structured output of the content analyzer.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Structured analysis of user-supplied content.
///
/// Used to enrich the title and body prompts. The zero value means
/// "nothing usable came back".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Analysis {
    /// Key themes or topics, usable as slide titles
    #[serde(default)]
    pub themes: Vec<String>,
    /// Important points for slide content
    #[serde(default)]
    pub points: Vec<String>,
    /// Recommended structure for the presentation
    #[serde(default, deserialize_with = "text_or_json")]
    #[schemars(with = "String")]
    pub recommendations: String,
}

impl Analysis {
    /// Parse a model reply, yielding the empty analysis on any failure.
    pub fn from_reply(reply: &str) -> Self {
        let cleaned = strip_markdown_json(reply);
        match serde_json::from_str(&cleaned) {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(error = %e, "analysis reply was not valid JSON, ignoring it");
                Self::default()
            }
        }
    }

    /// Check if the analysis has any content
    pub fn is_empty(&self) -> bool {
        self.themes.is_empty() && self.points.is_empty() && self.recommendations.is_empty()
    }

    /// Whether any theme occurs in `title`, ignoring case
    pub fn matches_title(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.themes
            .iter()
            .any(|theme| title.contains(&theme.to_lowercase()))
    }

    /// JSON schema of the analysis, pretty-printed for prompts
    pub fn schema_json() -> String {
        serde_json::to_string_pretty(&schemars::schema_for!(Analysis)).unwrap_or_default()
    }
}

/// Models occasionally return the recommendation as a list or object.
fn text_or_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(text) => text,
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    })
}

/// Strip markdown code block wrappers from JSON response
fn strip_markdown_json(text: &str) -> String {
    let trimmed = text.trim();

    // Remove ```json ... ``` or ``` ... ```
    if let Some(rest) = trimmed.strip_prefix("```") {
        let without_prefix = rest.strip_prefix("json").unwrap_or(rest);

        if let Some(end_idx) = without_prefix.rfind("```") {
            return without_prefix[..end_idx].trim().to_string();
        }
    }

    trimmed.to_string()
}
