//! File type detection
//!
//! Produces the two signals rules match on: a MIME type derived from file
//! content and a normalised extension derived from the file name. Detection
//! never fails; when sniffing is unavailable or inconclusive the MIME type is
//! guessed from the extension and finally falls back to [`UNKNOWN_MIME`].

pub mod magic;

pub use magic::MagicSniffer;

use std::io;
use std::path::Path;

/// MIME type used when nothing better is known
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// Content sniffing service
///
/// Implementations may only read a bounded prefix of the file. `Ok(None)`
/// means the content was read but not recognised.
pub trait ContentSniffer: Send + Sync {
    fn sniff(&self, path: &Path) -> io::Result<Option<String>>;
}

/// Where the detected MIME type came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeSource {
    Content,
    Extension,
    Unknown,
}

/// Detected signals for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub mime: String,
    /// Lowercase suffix including the dot, or empty
    pub ext: String,
    pub source: MimeSource,
}

/// Derives (mime, ext) for a file
pub struct TypeDetector {
    sniffer: Option<Box<dyn ContentSniffer>>,
}

impl Default for TypeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeDetector {
    /// Detector using the built-in [`MagicSniffer`]
    pub fn new() -> Self {
        Self::with_sniffer(MagicSniffer::new())
    }

    pub fn with_sniffer(sniffer: impl ContentSniffer + 'static) -> Self {
        Self {
            sniffer: Some(Box::new(sniffer)),
        }
    }

    /// Extension-only detection
    pub fn without_sniffer() -> Self {
        Self { sniffer: None }
    }

    pub fn has_sniffer(&self) -> bool {
        self.sniffer.is_some()
    }

    pub fn detect(&self, path: &Path) -> Detection {
        let ext = normalize_extension(path);

        if let Some(sniffer) = &self.sniffer {
            match sniffer.sniff(path) {
                Ok(Some(mime)) => {
                    return Detection {
                        mime: mime.to_ascii_lowercase(),
                        ext,
                        source: MimeSource::Content,
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!("Content sniffing failed for {}: {}", path.display(), e);
                }
            }
        }

        match mime_guess::from_path(path).first() {
            Some(guess) => Detection {
                mime: guess.essence_str().to_ascii_lowercase(),
                ext,
                source: MimeSource::Extension,
            },
            None => Detection {
                mime: UNKNOWN_MIME.to_string(),
                ext,
                source: MimeSource::Unknown,
            },
        }
    }
}

/// File name suffix, lowercased with its leading dot; empty when there is none.
///
/// Dotfiles such as `.bashrc` have no extension.
pub fn normalize_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}
