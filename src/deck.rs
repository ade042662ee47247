//! Deck assembly: pair titles with bodies and persist the `.pptx`.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pptx::{self, PptxError};

/// Font size of content slide titles, in points
pub const TITLE_FONT_SIZE_PT: u32 = 30;
/// Font size of content slide body text, in points
pub const BODY_FONT_SIZE_PT: u32 = 16;

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("got {titles} slide titles but {bodies} slide bodies")]
    LengthMismatch { titles: usize, bodies: usize },
    #[error("failed to build presentation: {0}")]
    Package(#[from] PptxError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One content slide
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    pub title: String,
    pub body: String,
}

/// A title slide for `topic` followed by the content slides, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub topic: String,
    pub slides: Vec<Slide>,
}

impl Deck {
    /// Pair titles with bodies. Both lists must have the same length.
    pub fn assemble(
        topic: &str,
        titles: Vec<String>,
        bodies: Vec<String>,
    ) -> Result<Self, DeckError> {
        if titles.len() != bodies.len() {
            return Err(DeckError::LengthMismatch {
                titles: titles.len(),
                bodies: bodies.len(),
            });
        }

        let slides = titles
            .into_iter()
            .zip(bodies)
            .map(|(title, body)| Slide { title, body })
            .collect();

        Ok(Self {
            topic: topic.to_string(),
            slides,
        })
    }

    /// Number of slides including the title slide
    pub fn slide_count(&self) -> usize {
        self.slides.len() + 1
    }

    /// Serialize the deck as `.pptx` bytes
    pub fn to_pptx(&self) -> Result<Vec<u8>, DeckError> {
        Ok(pptx::to_bytes(self, Utc::now())?)
    }

    /// Write the deck to `<output_dir>/<topic>_presentation.pptx`.
    ///
    /// The directory is created when missing. The topic is used verbatim, so a
    /// topic with characters the filesystem rejects fails with the OS error and
    /// an existing deck for the same topic is overwritten.
    pub fn save(&self, output_dir: &Path) -> Result<PathBuf, DeckError> {
        std::fs::create_dir_all(output_dir).map_err(|source| DeckError::Write {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let path = output_path(output_dir, &self.topic);
        let bytes = self.to_pptx()?;
        std::fs::write(&path, bytes).map_err(|source| DeckError::Write {
            path: path.clone(),
            source,
        })?;

        tracing::info!(
            path = %path.display(),
            slides = self.slide_count(),
            "presentation saved"
        );
        Ok(path)
    }
}

/// File name of the deck generated for `topic`
pub fn file_name(topic: &str) -> String {
    format!("{topic}_presentation.{}", pptx::EXTENSION)
}

/// Path of the deck generated for `topic` inside `output_dir`.
///
/// The file name is appended as text rather than joined, so a topic that looks
/// like an absolute path stays under `output_dir`.
pub fn output_path(output_dir: &Path, topic: &str) -> PathBuf {
    let mut path = output_dir.as_os_str().to_owned();
    path.push("/");
    path.push(file_name(topic));
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn demo() -> Deck {
        Deck::assemble(
            "Demo",
            vec!["A".into(), "B".into()],
            vec!["x".into(), "y".into()],
        )
        .unwrap()
    }

    #[test]
    fn assemble_pairs_in_order() {
        let deck = demo();
        assert_eq!(deck.slide_count(), 3);
        assert_eq!(deck.slides[1].title, "B");
        assert_eq!(deck.slides[1].body, "y");
    }

    #[test]
    fn assemble_rejects_mismatched_lengths() {
        let err = Deck::assemble("Demo", vec!["A".into()], vec![]).unwrap_err();
        assert!(matches!(
            err,
            DeckError::LengthMismatch {
                titles: 1,
                bodies: 0
            }
        ));
    }

    #[test]
    fn saved_deck_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = demo().save(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("Demo_presentation.pptx"));

        let slides = pptx::read_slides(File::open(&path).unwrap()).unwrap();
        assert_eq!(slides.len(), 3);
        assert_eq!(slides[0].title.as_deref(), Some("Demo"));
        assert_eq!(slides[2].title.as_deref(), Some("B"));
        assert_eq!(slides[2].paragraphs, vec!["y"]);
    }

    #[test]
    fn save_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("generated_ppt");
        let path = demo().save(&nested).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn same_topic_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        demo().save(dir.path()).unwrap();
        let second = Deck::assemble("Demo", vec!["Only".into()], vec!["z".into()]).unwrap();
        let path = second.save(dir.path()).unwrap();

        let slides = pptx::read_slides(File::open(&path).unwrap()).unwrap();
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[1].title.as_deref(), Some("Only"));
    }

    #[test]
    fn illegal_topic_fails_with_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let deck = Deck::assemble("no/such/dir", vec![], vec![]).unwrap();
        let err = deck.save(dir.path()).unwrap_err();
        assert!(matches!(err, DeckError::Write { .. }));
    }

    #[test]
    fn absolute_topic_stays_in_output_dir() {
        let out = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let topic = format!("{}/evil", other.path().display());

        let path = output_path(out.path(), &topic);
        assert!(path.starts_with(out.path()));

        let deck = Deck::assemble(&topic, vec![], vec![]).unwrap();
        let err = deck.save(out.path()).unwrap_err();
        assert!(matches!(err, DeckError::Write { .. }));
        assert!(!other.path().join("evil_presentation.pptx").exists());
    }

    #[test]
    fn root_topic_is_not_written_to_root() {
        let out = tempfile::tempdir().unwrap();
        let path = output_path(out.path(), "/tmp/x");
        assert!(path.starts_with(out.path()));
        assert_ne!(path, PathBuf::from("/tmp/x_presentation.pptx"));
    }

    #[test]
    fn file_name_uses_topic_verbatim() {
        assert_eq!(file_name("Rust 2024"), "Rust 2024_presentation.pptx");
    }
}
