//! The immutable transcript every stage analyzes.

use crate::errors::TranscriptError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Transcript text, read once and shared read-only.
#[derive(Debug, Clone)]
pub struct Transcript {
    source: Option<PathBuf>,
    text: Arc<str>,
}

impl Transcript {
    /// Loads a transcript from a file.
    ///
    /// # Errors
    ///
    /// Returns [`TranscriptError::NotFound`] if the file does not exist,
    /// [`TranscriptError::Read`] if it cannot be read as UTF-8, and
    /// [`TranscriptError::Empty`] if it holds only whitespace.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TranscriptError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                TranscriptError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                TranscriptError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let mut transcript = Self::from_text(text)?;
        transcript.source = Some(path.to_path_buf());
        Ok(transcript)
    }

    /// Wraps in-memory text.
    ///
    /// # Errors
    ///
    /// Returns [`TranscriptError::Empty`] if the text holds only whitespace.
    pub fn from_text(text: impl Into<String>) -> Result<Self, TranscriptError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(TranscriptError::Empty);
        }
        Ok(Self {
            source: None,
            text: Arc::from(text),
        })
    }

    /// Returns the transcript text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the file the transcript came from, if any.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Returns the length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Returns true if the transcript has no text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// SHA-256 of the text, hex encoded. Identifies the input in logs
    /// without echoing its content.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.text.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Client: I keep putting things off.").unwrap();

        let transcript = Transcript::load(file.path()).unwrap();
        assert!(transcript.text().contains("putting things off"));
        assert_eq!(transcript.source(), Some(file.path()));
        assert!(!transcript.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Transcript::load(dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, TranscriptError::NotFound { .. }));
    }

    #[test]
    fn test_empty_text_rejected() {
        assert!(matches!(Transcript::from_text("  \n\t"), Err(TranscriptError::Empty)));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = Transcript::from_text("abc").unwrap();
        let b = Transcript::from_text("abc").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(
            a.fingerprint(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(a.len(), 3);
    }
}
