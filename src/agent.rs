//! LLM agent module: content analysis, slide titles and slide bodies.
//!
//! Each operation is a single templated prompt sent through a [`ChatModel`].

pub use crate::analysis::Analysis;

use crate::language::{render, Texts};
use crate::llm::{ChatMessage, ChatModel, LlmError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("{0}")]
    Llm(#[from] LlmError),
}

/// Analyze free-text content into themes, points and a recommended structure.
///
/// A reply that is not valid JSON yields the empty analysis; transport and API
/// errors still propagate.
pub async fn analyze_content(
    model: &dyn ChatModel,
    texts: &Texts,
    topic: &str,
    content: &str,
) -> Result<Analysis, AgentError> {
    let messages = analysis_messages(texts, topic, content);
    let reply = model.complete(messages, true).await?;
    let analysis = Analysis::from_reply(&reply);
    tracing::info!(
        themes = analysis.themes.len(),
        points = analysis.points.len(),
        "content analyzed"
    );
    Ok(analysis)
}

/// Ask the model for `count` slide titles, one per line.
///
/// The number of returned titles is whatever the model produced.
pub async fn generate_slide_titles(
    model: &dyn ChatModel,
    texts: &Texts,
    topic: &str,
    count: usize,
    analysis: Option<&Analysis>,
) -> Result<Vec<String>, AgentError> {
    let messages = vec![
        ChatMessage::system(texts.system_prompt_titles.as_str()),
        ChatMessage::user(titles_prompt(texts, topic, count, analysis)),
    ];
    let reply = model.complete(messages, false).await?;
    let titles = split_lines(&reply);
    if titles.len() != count {
        tracing::debug!(
            requested = count,
            returned = titles.len(),
            "model returned a different number of titles"
        );
    }
    Ok(titles)
}

/// Ask the model for the body text of one slide.
pub async fn generate_slide_content(
    model: &dyn ChatModel,
    texts: &Texts,
    slide_title: &str,
    analysis: Option<&Analysis>,
) -> Result<String, AgentError> {
    let messages = vec![
        ChatMessage::system(texts.system_prompt_content.as_str()),
        ChatMessage::user(content_prompt(texts, slide_title, analysis)),
    ];
    Ok(model.complete(messages, false).await?)
}

/// System and user messages for the analyzer
pub fn analysis_messages(texts: &Texts, topic: &str, content: &str) -> Vec<ChatMessage> {
    let system = format!(
        "{}\n\nRespond with a single JSON object matching this schema:\n{}",
        texts.system_prompt_analysis,
        Analysis::schema_json()
    );
    let user = render(
        &texts.user_prompt_analysis,
        &[("topic", topic), ("content", content)],
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// User prompt for title generation
pub fn titles_prompt(
    texts: &Texts,
    topic: &str,
    count: usize,
    analysis: Option<&Analysis>,
) -> String {
    let count = count.to_string();
    let base = render(
        &texts.user_prompt_titles,
        &[("topic", topic), ("count", count.as_str())],
    );

    match analysis {
        Some(analysis) => format!(
            "{base}\n\nAnalysis Results:\nKey Themes: {}\nRecommended Structure: {}\n\n\
             Please generate slide titles that incorporate these themes.",
            analysis.themes.join(", "),
            analysis.recommendations
        ),
        None => base,
    }
}

/// User prompt for one slide body.
///
/// With an analysis, every point is listed when any theme occurs in the title;
/// otherwise the points block is left empty.
pub fn content_prompt(texts: &Texts, slide_title: &str, analysis: Option<&Analysis>) -> String {
    let base = render(&texts.user_prompt_content, &[("slide_title", slide_title)]);

    match analysis {
        Some(analysis) => {
            let relevant_points = if analysis.matches_title(slide_title) {
                analysis
                    .points
                    .iter()
                    .map(|point| format!("- {point}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            } else {
                String::new()
            };
            format!(
                "{base}\n\nRelevant Points from Analysis:\n{relevant_points}\n\n\
                 Incorporate these points where appropriate."
            )
        }
        None => base,
    }
}

/// Split a reply into trimmed, non-blank lines
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedModel;
    use super::*;
    use crate::language::Languages;

    fn texts() -> Texts {
        Languages::from_json(include_str!("../language.json"))
            .unwrap()
            .get("English")
            .unwrap()
            .clone()
    }

    fn analysis() -> Analysis {
        Analysis {
            themes: vec!["Ownership".into(), "Async".into()],
            points: vec!["Moves transfer ownership".into(), "Futures are lazy".into()],
            recommendations: "Basics first".into(),
        }
    }

    #[test]
    fn titles_prompt_without_analysis_is_template() {
        let prompt = titles_prompt(&texts(), "Rust", 5, None);
        assert_eq!(
            prompt,
            "Generate 5 slide titles for a presentation about Rust."
        );
    }

    #[test]
    fn titles_prompt_appends_analysis_block() {
        let prompt = titles_prompt(&texts(), "Rust", 3, Some(&analysis()));
        assert!(prompt.ends_with(
            "\n\nAnalysis Results:\nKey Themes: Ownership, Async\n\
             Recommended Structure: Basics first\n\n\
             Please generate slide titles that incorporate these themes."
        ));
    }

    #[test]
    fn content_prompt_lists_points_when_a_theme_matches() {
        let prompt = content_prompt(&texts(), "Why ownership matters", Some(&analysis()));
        assert!(prompt.contains(
            "Relevant Points from Analysis:\n- Moves transfer ownership\n- Futures are lazy\n\n"
        ));
    }

    #[test]
    fn content_prompt_keeps_empty_block_without_match() {
        let prompt = content_prompt(&texts(), "Tooling", Some(&analysis()));
        assert!(prompt.ends_with(
            "\n\nRelevant Points from Analysis:\n\n\nIncorporate these points where appropriate."
        ));
    }

    #[test]
    fn content_prompt_without_analysis_is_template() {
        let prompt = content_prompt(&texts(), "Tooling", None);
        assert!(prompt.contains("\"Tooling\""));
        assert!(!prompt.contains("Relevant Points"));
    }

    #[test]
    fn split_lines_drops_blanks() {
        assert_eq!(
            split_lines("  Intro \n\n\r\nDeep dive\n   \nSummary"),
            vec!["Intro", "Deep dive", "Summary"]
        );
    }

    #[tokio::test]
    async fn analyze_content_uses_json_mode() {
        let model = ScriptedModel::default().reply(
            "Analyze this content",
            r#"{"themes": ["Ownership"], "points": ["p"], "recommendations": "r"}"#,
        );
        let result = analyze_content(&model, &texts(), "Rust", "Rust has ownership")
            .await
            .unwrap();
        assert_eq!(result.themes, vec!["Ownership".to_string()]);

        let calls = model.calls.lock();
        assert_eq!(calls.len(), 1);
        let (messages, json) = &calls[0];
        assert!(*json);
        assert!(messages[0].content.contains("themes, points, recommendations"));
        assert!(messages[1].content.ends_with("Rust has ownership"));
    }

    #[tokio::test]
    async fn analyze_content_soft_fails_on_prose() {
        let model = ScriptedModel::default().reply("Analyze", "I cannot produce JSON today.");
        let result = analyze_content(&model, &texts(), "Rust", "text").await.unwrap();
        assert_eq!(result, Analysis::default());
    }

    #[tokio::test]
    async fn analyze_content_propagates_api_errors() {
        let model = ScriptedModel::default().fail("Analyze", "quota exceeded");
        let err = analyze_content(&model, &texts(), "Rust", "text").await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn titles_are_not_truncated_to_count() {
        let model = ScriptedModel::default().reply("slide titles", "One\nTwo\nThree\nFour");
        let titles = generate_slide_titles(&model, &texts(), "Rust", 2, None)
            .await
            .unwrap();
        assert_eq!(titles, vec!["One", "Two", "Three", "Four"]);
        assert!(!model.calls.lock()[0].1);
    }

    #[tokio::test]
    async fn slide_content_is_returned_raw() {
        let model = ScriptedModel::default().reply("Intro", "  - point one\n- point two\n");
        let body = generate_slide_content(&model, &texts(), "Intro", None)
            .await
            .unwrap();
        assert_eq!(body, "  - point one\n- point two\n");
    }
}
