//! Best-effort metadata extraction
//!
//! Extraction is dispatched to the first registered extractor that declares
//! support for the detected MIME type. Failures never cross this module's
//! boundary as errors: they become [`MetadataOutcome::Unavailable`], which
//! serialises to an empty object in the audit.

pub mod image;

pub use self::image::ImageExtractor;

use std::collections::BTreeMap;
use std::path::Path;

/// Flat key/value metadata; ordered so audit output is stable
pub type Metadata = BTreeMap<String, String>;

/// Boxed error returned by extractors
pub type ExtractError = Box<dyn std::error::Error + Send + Sync>;

/// Metadata extraction service for a family of MIME types
pub trait MetadataExtractor: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn supports(&self, mime: &str) -> bool;

    fn extract(&self, path: &Path, mime: &str) -> Result<Metadata, ExtractError>;
}

/// Result of attempting extraction for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataOutcome {
    Extracted(Metadata),
    /// An extractor ran but produced nothing usable
    Unavailable { reason: String },
    /// No extractor supports this MIME type
    NotApplicable,
}

impl MetadataOutcome {
    /// Extracted mapping, or empty for every other outcome
    pub fn into_metadata(self) -> Metadata {
        match self {
            MetadataOutcome::Extracted(metadata) => metadata,
            MetadataOutcome::Unavailable { .. } | MetadataOutcome::NotApplicable => Metadata::new(),
        }
    }

    pub fn is_extracted(&self) -> bool {
        matches!(self, MetadataOutcome::Extracted(_))
    }
}

/// Ordered collection of extractors
pub struct MetadataRegistry {
    extractors: Vec<Box<dyn MetadataExtractor>>,
}

impl Default for MetadataRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl MetadataRegistry {
    /// Registry with no extractors; every outcome is `NotApplicable`
    pub fn empty() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Registry with the built-in image extractor
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(ImageExtractor::new());
        registry
    }

    pub fn register(&mut self, extractor: impl MetadataExtractor + 'static) {
        self.extractors.push(Box::new(extractor));
    }

    pub fn supports(&self, mime: &str) -> bool {
        self.extractors.iter().any(|e| e.supports(mime))
    }

    pub fn extract(&self, path: &Path, mime: &str) -> MetadataOutcome {
        let Some(extractor) = self.extractors.iter().find(|e| e.supports(mime)) else {
            return MetadataOutcome::NotApplicable;
        };

        match extractor.extract(path, mime) {
            Ok(metadata) => MetadataOutcome::Extracted(metadata),
            Err(e) => {
                tracing::debug!("{} extractor gave up on {}: {}", extractor.name(), path.display(), e);
                MetadataOutcome::Unavailable { reason: e.to_string() }
            }
        }
    }
}
