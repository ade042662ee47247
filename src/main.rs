//! Decksmith CLI - Draft presentations with an LLM
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments and handling top-level errors.

use std::fs::File;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use dialoguer::Input;
use tracing_subscriber::EnvFilter;

use decksmith::session::DEFAULT_SLIDE_COUNT;
use decksmith::web::{self, AppState};
use decksmith::{
    agent, pptx, ChatClient, Config, FormInputs, Languages, Pipeline, Session, SessionStore,
};

#[derive(Parser)]
#[command(name = "decksmith")]
#[command(author, version, about = "Draft PowerPoint decks from a topic with an LLM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the presentation form in the browser (default)
    Serve {
        /// Address to listen on, overrides [server].bind
        #[arg(long)]
        bind: Option<String>,
    },
    /// Generate a presentation from the command line
    Generate {
        /// Presentation topic, prompted for when omitted
        topic: Option<String>,
        /// Number of content slides (1-10)
        #[arg(short = 'n', long, default_value_t = DEFAULT_SLIDE_COUNT)]
        slides: usize,
        /// Language pack to use
        #[arg(short, long)]
        lang: Option<String>,
        /// File with one custom slide title per line
        #[arg(long, conflicts_with = "edit_titles")]
        titles: Option<PathBuf>,
        /// Write custom slide titles in $EDITOR
        #[arg(long)]
        edit_titles: bool,
        /// File with content to analyze before generating
        #[arg(long)]
        content: Option<PathBuf>,
        /// Directory to write the deck to, overrides [storage].output_dir
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Analyze content and print its themes, points and recommendations
    Analyze {
        /// File with the content to analyze
        file: PathBuf,
        /// Topic the content is about
        #[arg(short, long, default_value = "")]
        topic: String,
        /// Language pack to use
        #[arg(short, long)]
        lang: Option<String>,
        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the text of every slide in a .pptx file
    Inspect {
        /// Presentation to read
        path: PathBuf,
    },
    /// List the available language packs
    Languages,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { bind }) => serve(bind).await?,
        None => serve(None).await?,
        Some(Commands::Generate {
            topic,
            slides,
            lang,
            titles,
            edit_titles,
            content,
            output_dir,
        }) => {
            let mut config = Config::load()?;
            if let Some(dir) = output_dir {
                config.storage.output_dir = dir;
            }
            let pipeline = build_pipeline(&config)?;

            let mut session = Session::new(FormInputs {
                lang: lang.unwrap_or_default(),
                topic: topic.unwrap_or_default(),
                slide_count: slides,
                ..Default::default()
            });
            let texts = pipeline.texts_for(&session)?.clone();

            if session.inputs.topic.trim().is_empty() {
                session.inputs.topic = Input::<String>::new()
                    .with_prompt(&texts.topic_prompt)
                    .allow_empty(true)
                    .interact_text()?;
            }

            if let Some(path) = titles {
                session.inputs.custom_titles = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
            } else if edit_titles {
                session.inputs.custom_titles = edit::edit(&texts.custom_placeholder)?;
            }

            if let Some(path) = content {
                session.inputs.analysis_content = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                println!("{}", texts.analyzing);
                match pipeline.analyze(&mut session).await {
                    Ok(_) => {
                        if let Some(analysis) = &session.analysis {
                            println!("{}", texts.analysis_complete.green());
                            println!("  {}: {}", texts.key_themes, analysis.themes.join(", "));
                        }
                    }
                    Err(e) => anyhow::bail!(e.user_message(&texts)),
                }
            }

            println!("{}", texts.generating);
            match pipeline.generate(&session).await {
                Ok(generated) => {
                    println!("{}", texts.success.green().bold());
                    for (i, slide) in generated.deck.slides.iter().enumerate() {
                        println!("  {}. {}", i + 1, slide.title);
                    }
                    println!("\n{}", generated.path.display().to_string().cyan());
                }
                Err(e) if e.is_no_topic() => {
                    println!("{}", e.user_message(&texts).yellow());
                }
                Err(e) => anyhow::bail!(e.user_message(&texts)),
            }
        }
        Some(Commands::Analyze {
            file,
            topic,
            lang,
            json,
        }) => {
            let config = Config::load()?;
            let languages = Languages::load(&config.storage.language_file)?;
            let texts = languages.get(lang.as_deref().unwrap_or(languages.default_code()))?;
            let client = ChatClient::from_config(&config)?;

            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            println!("{}", texts.analyzing);
            let analysis = agent::analyze_content(&client, texts, &topic, &content).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else if analysis.is_empty() {
                println!("{}", "The model returned no usable analysis.".yellow());
            } else {
                println!("{}\n", texts.analysis_complete.green());
                println!("🏷️  {}:", texts.key_themes);
                println!("  {}\n", analysis.themes.join(", "));
                println!("📌 Key Points:");
                for point in &analysis.points {
                    println!("  • {}", point);
                }
                println!("\n💡 {}:", texts.recommendations);
                println!("  {}", analysis.recommendations);
            }
        }
        Some(Commands::Inspect { path }) => {
            let file = File::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let slides = pptx::read_slides(file)?;

            println!("{} ({} slides)\n", path.display(), slides.len());
            for (i, slide) in slides.iter().enumerate() {
                let title = slide.title.as_deref().unwrap_or("(untitled)");
                println!("{} {}", format!("{:>2}.", i + 1).dimmed(), title.bold());
                for paragraph in &slide.paragraphs {
                    println!("     {}", paragraph);
                }
            }
        }
        Some(Commands::Languages) => {
            let config = Config::load()?;
            let languages = Languages::load(&config.storage.language_file)?;
            let default = languages.default_code();
            for code in languages.codes() {
                if code == default {
                    println!("{} {}", code, "(default)".dimmed());
                } else {
                    println!("{}", code);
                }
            }
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "decksmith", &mut io::stdout());
        }
    }

    Ok(())
}

async fn serve(bind: Option<String>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address: {bind}"))?;

    let pipeline = build_pipeline(&config)?;
    let sessions = SessionStore::with_limits(
        Duration::from_secs(config.server.session_ttl_secs),
        config.server.max_sessions,
    );
    web::serve(addr, Arc::new(AppState::new(pipeline, sessions))).await?;
    Ok(())
}

/// Load the language packs and the model client; both are fatal when missing
fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let languages = Languages::load(&config.storage.language_file)?;
    let client = ChatClient::from_config(config)?;
    tracing::info!(
        model = client.model(),
        languages = languages.codes().count(),
        concurrency = config.generation.max_concurrency,
        "pipeline ready"
    );
    Ok(Pipeline::new(
        Arc::new(client),
        Arc::new(languages),
        config.storage.output_dir.clone(),
        config.generation.max_concurrency,
    ))
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("decksmith=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
