//! Presentation controller: inputs → analysis → titles → bodies → deck.
//!
//! Any failure after input validation aborts the whole run; nothing generated
//! so far is kept.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use thiserror::Error;

use crate::agent::{self, AgentError};
use crate::analysis::Analysis;
use crate::deck::{Deck, DeckError};
use crate::language::{LanguageError, Languages, Texts};
use crate::llm::ChatModel;
use crate::session::Session;

/// Smallest slide count the form accepts
pub const MIN_SLIDES: usize = 1;
/// Largest slide count the form accepts
pub const MAX_SLIDES: usize = 10;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    NoTopic(String),
    #[error("slide count must be between 1 and 10, got {0}")]
    SlideCount(usize),
    #[error(transparent)]
    Language(#[from] LanguageError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Deck(#[from] DeckError),
}

impl PipelineError {
    /// The topic was missing. Shown as a warning rather than an error.
    pub fn is_no_topic(&self) -> bool {
        matches!(self, PipelineError::NoTopic(_))
    }

    /// Message shown to the user, prefixed with the localized error label
    pub fn user_message(&self, texts: &Texts) -> String {
        match self {
            PipelineError::NoTopic(warning) => warning.clone(),
            other => format!("{}: {}", texts.error, other),
        }
    }
}

/// Controller states, used for logging transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Analyzing,
    ResolvingTitles,
    GeneratingBodies,
    Assembling,
    Done,
    Error,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Analyzing => "analyzing",
            Stage::ResolvingTitles => "resolving_titles",
            Stage::GeneratingBodies => "generating_bodies",
            Stage::Assembling => "assembling",
            Stage::Done => "done",
            Stage::Error => "error",
        };
        f.write_str(name)
    }
}

/// A deck that was generated and saved
#[derive(Debug, Clone)]
pub struct GeneratedDeck {
    pub path: PathBuf,
    pub deck: Deck,
}

/// Wires the model, language packs and output directory together.
#[derive(Clone)]
pub struct Pipeline {
    model: Arc<dyn ChatModel>,
    languages: Arc<Languages>,
    output_dir: PathBuf,
    max_concurrency: usize,
}

impl Pipeline {
    pub fn new(
        model: Arc<dyn ChatModel>,
        languages: Arc<Languages>,
        output_dir: PathBuf,
        max_concurrency: usize,
    ) -> Self {
        Self {
            model,
            languages,
            output_dir,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn languages(&self) -> &Languages {
        &self.languages
    }

    /// Texts for the session's language, falling back to the default language
    /// when none was chosen.
    pub fn texts_for(&self, session: &Session) -> Result<&Texts, LanguageError> {
        let lang = session.inputs.lang.trim();
        if lang.is_empty() {
            self.languages.get(self.languages.default_code())
        } else {
            self.languages.get(lang)
        }
    }

    /// Analyze the session's content and keep the result in the session.
    ///
    /// Does nothing when no content was supplied. Returns whether an analysis ran.
    pub async fn analyze(&self, session: &mut Session) -> Result<bool, PipelineError> {
        let content = session.inputs.analysis_content.trim();
        if content.is_empty() {
            return Ok(false);
        }

        transition(Stage::Idle, Stage::Analyzing);
        let texts = self.texts_for(session)?;
        let analysis = agent::analyze_content(
            self.model.as_ref(),
            texts,
            &session.inputs.topic,
            &session.inputs.analysis_content,
        )
        .await
        .inspect_err(|e| fail(Stage::Analyzing, e))?;

        session.analysis = Some(analysis);
        transition(Stage::Analyzing, Stage::Idle);
        Ok(true)
    }

    /// Run a full generation for the session and save the deck.
    pub async fn generate(&self, session: &Session) -> Result<GeneratedDeck, PipelineError> {
        let texts = self.texts_for(session)?;
        let inputs = &session.inputs;
        let topic = inputs.topic.trim();
        if topic.is_empty() {
            return Err(PipelineError::NoTopic(texts.no_topic_warning.clone()));
        }
        if !(MIN_SLIDES..=MAX_SLIDES).contains(&inputs.slide_count) {
            return Err(PipelineError::SlideCount(inputs.slide_count));
        }
        let analysis = session.analysis.as_ref();

        transition(Stage::Idle, Stage::ResolvingTitles);
        let titles = self
            .resolve_titles(texts, topic, inputs.slide_count, &inputs.custom_titles, analysis)
            .await
            .inspect_err(|e| fail(Stage::ResolvingTitles, e))?;

        transition(Stage::ResolvingTitles, Stage::GeneratingBodies);
        let bodies = self
            .generate_bodies(texts, &titles, analysis)
            .await
            .inspect_err(|e| fail(Stage::GeneratingBodies, e))?;

        transition(Stage::GeneratingBodies, Stage::Assembling);
        let deck = Deck::assemble(topic, titles, bodies)
            .map_err(PipelineError::from)
            .inspect_err(|e| fail(Stage::Assembling, e))?;
        let path = deck
            .save(&self.output_dir)
            .map_err(PipelineError::from)
            .inspect_err(|e| fail(Stage::Assembling, e))?;

        transition(Stage::Assembling, Stage::Done);
        Ok(GeneratedDeck { path, deck })
    }

    /// Resolve the final title list.
    ///
    /// Custom titles are cut to `count`; a shortfall is topped up from the
    /// model. Without custom titles the model supplies all of them. Model
    /// output is not truncated.
    pub async fn resolve_titles(
        &self,
        texts: &Texts,
        topic: &str,
        count: usize,
        custom_titles: &str,
        analysis: Option<&Analysis>,
    ) -> Result<Vec<String>, PipelineError> {
        let mut titles = parse_custom_titles(custom_titles);
        if titles.is_empty() {
            let generated =
                agent::generate_slide_titles(self.model.as_ref(), texts, topic, count, analysis)
                    .await?;
            return Ok(generated);
        }

        titles.truncate(count);
        if titles.len() < count {
            let remaining = count - titles.len();
            let generated = agent::generate_slide_titles(
                self.model.as_ref(),
                texts,
                topic,
                remaining,
                analysis,
            )
            .await?;
            titles.extend(generated);
        }
        Ok(titles)
    }

    /// Generate one body per title, keeping the title order.
    ///
    /// Up to `max_concurrency` requests run at once; the first failure aborts.
    pub async fn generate_bodies(
        &self,
        texts: &Texts,
        titles: &[String],
        analysis: Option<&Analysis>,
    ) -> Result<Vec<String>, PipelineError> {
        let model = self.model.as_ref();
        let bodies = stream::iter(titles.iter().cloned())
            .map(|title| async move {
                agent::generate_slide_content(model, texts, &title, analysis).await
            })
            .buffered(self.max_concurrency)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(bodies)
    }
}

/// Split the custom titles box into trimmed, non-blank titles
pub fn parse_custom_titles(raw: &str) -> Vec<String> {
    agent::split_lines(raw)
}

fn transition(from: Stage, to: Stage) {
    tracing::debug!(%from, %to, "pipeline transition");
}

fn fail(stage: Stage, error: &dyn fmt::Display) {
    tracing::error!(%stage, to = %Stage::Error, error = %error, "pipeline failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedModel;
    use crate::session::FormInputs;

    fn languages() -> Arc<Languages> {
        Arc::new(Languages::from_json(include_str!("../language.json")).unwrap())
    }

    fn pipeline(model: ScriptedModel, dir: &std::path::Path, concurrency: usize) -> Pipeline {
        Pipeline::new(Arc::new(model), languages(), dir.to_path_buf(), concurrency)
    }

    fn session(topic: &str, count: usize, custom: &str) -> Session {
        Session::new(FormInputs {
            lang: "English".into(),
            topic: topic.into(),
            slide_count: count,
            custom_titles: custom.into(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn short_custom_list_is_topped_up() {
        let dir = tempfile::tempdir().unwrap();
        let model = ScriptedModel::default().reply("Generate 2 slide titles", "Gen 1\nGen 2");
        let pipeline = pipeline(model, dir.path(), 1);
        let texts = pipeline.languages().get("English").unwrap().clone();

        let titles = pipeline
            .resolve_titles(&texts, "Rust", 5, "Mine 1\n\n  Mine 2 \nMine 3\n", None)
            .await
            .unwrap();
        assert_eq!(titles, vec!["Mine 1", "Mine 2", "Mine 3", "Gen 1", "Gen 2"]);
    }

    #[tokio::test]
    async fn long_custom_list_is_truncated_without_model_call() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::default());
        let pipeline = Pipeline::new(model.clone(), languages(), dir.path().to_path_buf(), 1);
        let texts = pipeline.languages().get("English").unwrap().clone();

        let titles = pipeline
            .resolve_titles(&texts, "Rust", 3, "A\nB\nC\nD\nE", None)
            .await
            .unwrap();
        assert_eq!(titles, vec!["A", "B", "C"]);
        assert!(model.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn bodies_keep_title_order_under_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let model = ScriptedModel::default()
            .reply("\"One\"", "body one")
            .reply("\"Two\"", "body two")
            .reply("\"Three\"", "body three");
        let pipeline = pipeline(model, dir.path(), 3);
        let texts = pipeline.languages().get("English").unwrap().clone();

        let titles = vec!["One".to_string(), "Two".to_string(), "Three".to_string()];
        let bodies = pipeline.generate_bodies(&texts, &titles, None).await.unwrap();
        assert_eq!(bodies, vec!["body one", "body two", "body three"]);
    }

    #[tokio::test]
    async fn generate_writes_deck() {
        let dir = tempfile::tempdir().unwrap();
        let model = ScriptedModel::default()
            .reply("slide titles", "Intro\nOutro")
            .reply("\"Intro\"", "hello")
            .reply("\"Outro\"", "bye");
        let pipeline = pipeline(model, dir.path(), 2);

        let generated = pipeline.generate(&session("Demo", 2, "")).await.unwrap();
        assert_eq!(generated.path, dir.path().join("Demo_presentation.pptx"));
        assert_eq!(generated.deck.slide_count(), 3);
        assert_eq!(generated.deck.slides[1].body, "bye");
        assert!(generated.path.exists());
    }

    #[tokio::test]
    async fn body_failure_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let model = ScriptedModel::default()
            .reply("\"Intro\"", "hello")
            .fail("\"Outro\"", "rate limited");
        let pipeline = pipeline(model, dir.path(), 1);
        let session = session("Demo", 2, "Intro\nOutro");

        let err = pipeline.generate(&session).await.unwrap_err();
        let texts = pipeline.texts_for(&session).unwrap();
        let message = err.user_message(texts);
        assert!(message.starts_with("Error: "));
        assert!(message.contains("rate limited"));
        assert!(!dir.path().join("Demo_presentation.pptx").exists());
    }

    #[tokio::test]
    async fn empty_topic_is_rejected_before_any_call() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::default());
        let pipeline = Pipeline::new(model.clone(), languages(), dir.path().to_path_buf(), 1);
        let session = session("   ", 3, "");

        let err = pipeline.generate(&session).await.unwrap_err();
        let texts = pipeline.texts_for(&session).unwrap();
        assert_eq!(err.user_message(texts), texts.no_topic_warning);
        assert!(model.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn slide_count_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(ScriptedModel::default(), dir.path(), 1);
        let err = pipeline.generate(&session("Rust", 11, "")).await.unwrap_err();
        assert!(matches!(err, PipelineError::SlideCount(11)));
    }

    #[tokio::test]
    async fn analysis_is_kept_in_session_and_enriches_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(
            ScriptedModel::default()
                .reply(
                    "Analyze this content",
                    r#"{"themes": ["Safety"], "points": ["No data races"], "recommendations": "Lead with safety"}"#,
                )
                .reply("slide titles", "Memory Safety")
                .reply("\"Memory Safety\"", "safe"),
        );
        let pipeline = Pipeline::new(model.clone(), languages(), dir.path().to_path_buf(), 1);

        let mut session = session("Rust", 1, "");
        assert!(!pipeline.analyze(&mut session).await.unwrap());
        assert!(session.analysis.is_none());

        session.inputs.analysis_content = "Rust guarantees memory safety.".into();
        assert!(pipeline.analyze(&mut session).await.unwrap());
        assert_eq!(
            session.analysis.as_ref().unwrap().themes,
            vec!["Safety".to_string()]
        );

        pipeline.generate(&session).await.unwrap();
        let calls = model.calls.lock();
        let title_prompt = &calls[1].0[1].content;
        assert!(title_prompt.contains("Key Themes: Safety"));
        let body_prompt = &calls[2].0[1].content;
        assert!(body_prompt.contains("- No data races"));
    }
}
