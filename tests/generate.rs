//! End-to-end generation against an in-process model.

use std::fs::File;
use std::sync::Arc;

use async_trait::async_trait;
use decksmith::llm::LlmError;
use decksmith::pptx;
use decksmith::{ChatMessage, ChatModel, FormInputs, Languages, Pipeline, Session};
use parking_lot::Mutex;

/// Answers title requests with `count` numbered titles, body requests with two
/// bullets and analysis requests with a fixed JSON object.
struct FakeModel {
    titles_system: Vec<String>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FakeModel {
    fn new(languages: &Languages) -> Self {
        let titles_system = languages
            .codes()
            .filter_map(|code| languages.get(code).ok())
            .map(|texts| texts.system_prompt_titles.clone())
            .collect();
        Self {
            titles_system,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatModel for FakeModel {
    async fn complete(&self, messages: Vec<ChatMessage>, json: bool) -> Result<String, LlmError> {
        let system = messages[0].content.clone();
        let user = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.calls.lock().push(messages);

        if json {
            return Ok(
                r#"```json
{"themes": ["Ownership"], "points": ["Borrowing is checked at compile time"], "recommendations": ["Start simple", "Then go deep"]}
```"#
                    .to_string(),
            );
        }
        if self.titles_system.contains(&system) {
            let count: usize = user
                .split(|c: char| !c.is_ascii_digit())
                .find(|s| !s.is_empty())
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
            return Ok((1..=count)
                .map(|i| format!("Generated {i}"))
                .collect::<Vec<_>>()
                .join("\n"));
        }
        Ok("- first point\n- second point".to_string())
    }
}

fn setup(dir: &std::path::Path, concurrency: usize) -> (Arc<FakeModel>, Pipeline) {
    let languages = Languages::from_json(include_str!("../language.json")).unwrap();
    let model = Arc::new(FakeModel::new(&languages));
    let pipeline = Pipeline::new(
        model.clone(),
        Arc::new(languages),
        dir.to_path_buf(),
        concurrency,
    );
    (model, pipeline)
}

#[tokio::test]
async fn generated_deck_reads_back_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let (_, pipeline) = setup(dir.path(), 4);
    let session = Session::new(FormInputs {
        lang: "English".into(),
        topic: "Rust".into(),
        slide_count: 4,
        ..Default::default()
    });

    let generated = pipeline.generate(&session).await.unwrap();
    let slides = pptx::read_slides(File::open(&generated.path).unwrap()).unwrap();

    assert_eq!(slides.len(), 5);
    assert_eq!(slides[0].title.as_deref(), Some("Rust"));
    let titles: Vec<_> = slides[1..]
        .iter()
        .map(|s| s.title.clone().unwrap_or_default())
        .collect();
    assert_eq!(
        titles,
        vec!["Generated 1", "Generated 2", "Generated 3", "Generated 4"]
    );
    assert_eq!(slides[4].paragraphs, vec!["- first point", "- second point"]);
}

#[tokio::test]
async fn custom_titles_are_topped_up_in_another_language() {
    let dir = tempfile::tempdir().unwrap();
    let (model, pipeline) = setup(dir.path(), 2);
    let session = Session::new(FormInputs {
        lang: "中文".into(),
        topic: "所有权".into(),
        slide_count: 3,
        custom_titles: "介绍\n\n总结\n".into(),
        ..Default::default()
    });

    let generated = pipeline.generate(&session).await.unwrap();
    assert_eq!(generated.path, dir.path().join("所有权_presentation.pptx"));
    let titles: Vec<_> = generated.deck.slides.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["介绍", "总结", "Generated 1"]);

    // one title request and one request per body
    let calls = model.calls.lock();
    assert_eq!(calls.len(), 4);
    assert!(calls[0][1].content.contains("生成 1 个幻灯片标题"));
}

#[tokio::test]
async fn analysis_enriches_title_and_body_prompts() {
    let dir = tempfile::tempdir().unwrap();
    let (model, pipeline) = setup(dir.path(), 1);
    let mut session = Session::new(FormInputs {
        lang: "English".into(),
        topic: "Rust".into(),
        slide_count: 1,
        analysis_content: "Rust checks borrowing at compile time.".into(),
        custom_titles: "Ownership basics".into(),
        ..Default::default()
    });

    assert!(pipeline.analyze(&mut session).await.unwrap());
    let analysis = session.analysis.clone().unwrap();
    assert_eq!(analysis.themes, vec!["Ownership"]);
    assert!(analysis.recommendations.contains("Start simple"));

    pipeline.generate(&session).await.unwrap();
    let calls = model.calls.lock();
    // analysis, then the body for the single custom title
    assert_eq!(calls.len(), 2);
    let body_prompt = &calls[1][1].content;
    assert!(body_prompt.contains("Ownership basics"));
    assert!(body_prompt.contains("- Borrowing is checked at compile time"));
}

#[tokio::test]
async fn thai_pack_falls_back_to_english_analysis_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let (model, pipeline) = setup(dir.path(), 1);
    let mut session = Session::new(FormInputs {
        lang: "ไทย".into(),
        topic: "Rust".into(),
        analysis_content: "notes".into(),
        ..Default::default()
    });

    pipeline.analyze(&mut session).await.unwrap();
    let calls = model.calls.lock();
    assert!(calls[0][1]
        .content
        .starts_with("Analyze this content for presentation about Rust:"));
}
