//! Entity and relationship extraction feeding the ingestion router.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod entity_extractor;
pub mod relationship_detector;

pub use entity_extractor::{EntityPattern, PatternExtractor, PatternExtractorConfig};
pub use relationship_detector::{RelationshipDetector, RelationshipDetectorConfig};

/// Represents an extracted entity with confidence score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    /// Surface form as it appears in the cleaned text
    pub name: String,
    /// Entity type, e.g. `Concept` or `Acronym`
    pub entity_type: String,
    /// Confidence score in [0, 1]
    pub confidence: f32,
    /// Byte offset of the first mention in the cleaned text
    pub start_pos: usize,
    /// Byte offset one past the first mention
    pub end_pos: usize,
}

/// Represents a detected relationship between two extracted entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRelationship {
    /// Name of the source entity
    pub source: String,
    /// Name of the target entity
    pub target: String,
    /// Relationship type, e.g. `USES`
    pub relationship_type: String,
    /// Edge weight in [0, 1]
    pub weight: f32,
}

/// Output of an extractor run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub cleaned_text: String,
    pub entities: Vec<ExtractedEntity>,
    pub relationships: Vec<ExtractedRelationship>,
}

impl Extraction {
    pub fn has_entities(&self) -> bool {
        !self.entities.is_empty()
    }
}

/// Turns raw text into cleaned text plus candidate entities and relationships.
/// Returning empty lists is a valid outcome.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Extraction>;
}

/// Extractor that never finds anything; every ingestion goes to the vector store
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExtractor;

#[async_trait]
impl EntityExtractor for NoopExtractor {
    async fn extract(&self, text: &str) -> Result<Extraction> {
        Ok(Extraction {
            cleaned_text: clean_text(text),
            ..Extraction::default()
        })
    }
}

/// Strip control characters and collapse runs of whitespace
pub fn clean_text(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  a\tb\n\n c\u{0007}d  "), "a b c d");
        assert_eq!(clean_text(""), "");
    }

    #[tokio::test]
    async fn test_noop_extractor_returns_no_entities() {
        let extraction = NoopExtractor.extract(" Plain   text ").await.unwrap();
        assert_eq!(extraction.cleaned_text, "Plain text");
        assert!(!extraction.has_entities());
        assert!(extraction.relationships.is_empty());
    }
}
