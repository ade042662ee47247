//! # Decksmith
//!
//! Draft PowerPoint decks from a topic using an LLM.
//!
//! ## Features
//!
//! - **Localized**: UI strings and prompt templates come from a language pack file
//! - **Content Analysis**: Optional themes/points/recommendations extracted from your notes enrich every prompt
//! - **Custom Titles**: Supply your own slide titles; missing ones are generated
//! - **Provider Agnostic**: Any OpenAI-compatible chat completions API (DeepSeek by default)

pub mod agent;
pub mod analysis;
pub mod config;
pub mod deck;
pub mod download;
pub mod language;
pub mod llm;
pub mod pipeline;
pub mod pptx;
pub mod session;
pub mod web;

pub use analysis::Analysis;
pub use config::Config;
pub use deck::{Deck, Slide};
pub use language::{Languages, Texts};
pub use llm::{ChatClient, ChatMessage, ChatModel};
pub use pipeline::{Pipeline, PipelineError};
pub use session::{FormInputs, Session, SessionStore};
