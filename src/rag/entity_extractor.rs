use std::collections::HashMap;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::{
    clean_text, EntityExtractor, ExtractedEntity, Extraction, RelationshipDetector,
    RelationshipDetectorConfig,
};

/// Capitalised words, optionally joined by spaces or hyphens: `Machine Learning`, `Rolls-Royce`
const PHRASE_PATTERN: &str = r"\b[A-Z][A-Za-z0-9]*(?:[ \-][A-Z][A-Za-z0-9]*)*\b";

/// Capitalised function words that never start an entity
const STOPWORDS: &[&str] = &[
    "A", "An", "And", "As", "At", "But", "By", "For", "From", "He", "However", "I", "If", "In",
    "It", "Its", "Of", "On", "Or", "Our", "She", "So", "That", "The", "These", "They", "This",
    "Those", "To", "We", "When", "While", "With",
];

/// Custom entity pattern for regex-based extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityPattern {
    /// Pattern name
    pub name: String,
    /// Entity type
    pub entity_type: String,
    /// Regex pattern
    pub pattern: String,
}

/// Configuration for entity extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternExtractorConfig {
    /// Entities scoring below this are discarded
    pub confidence_threshold: f32,
    /// Maximum number of distinct entities kept per text
    pub max_entities: usize,
    /// Custom patterns, matched before the capitalisation heuristics
    pub custom_patterns: Vec<EntityPattern>,
    pub relationships: RelationshipDetectorConfig,
}

impl Default for PatternExtractorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            max_entities: 50,
            custom_patterns: Vec::new(),
            relationships: RelationshipDetectorConfig::default(),
        }
    }
}

/// Entity extractor using custom regex patterns and capitalisation heuristics
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    config: PatternExtractorConfig,
    patterns: Vec<(String, Regex)>,
    phrase: Regex,
    detector: RelationshipDetector,
}

impl PatternExtractor {
    /// Create a new extractor; fails when a custom pattern does not compile
    pub fn new(config: PatternExtractorConfig) -> Result<Self> {
        let patterns = config
            .custom_patterns
            .iter()
            .map(|p| {
                Regex::new(&p.pattern)
                    .map(|re| (p.entity_type.clone(), re))
                    .map_err(|e| Error::Configuration(format!("invalid pattern {}: {}", p.name, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        let phrase = Regex::new(PHRASE_PATTERN)
            .map_err(|e| Error::Configuration(format!("invalid phrase pattern: {}", e)))?;
        let detector = RelationshipDetector::new(config.relationships.clone())?;

        Ok(Self {
            config,
            patterns,
            phrase,
            detector,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(PatternExtractorConfig::default())
    }

    /// Every entity mention in `text`, sorted by position and non-overlapping
    fn find_mentions(&self, text: &str) -> Vec<ExtractedEntity> {
        let mut mentions: Vec<ExtractedEntity> = Vec::new();

        for (entity_type, pattern) in &self.patterns {
            for m in pattern.find_iter(text) {
                if m.as_str().trim().is_empty() || overlaps(&mentions, m.start(), m.end()) {
                    continue;
                }
                mentions.push(ExtractedEntity {
                    name: m.as_str().to_string(),
                    entity_type: entity_type.clone(),
                    confidence: 1.0,
                    start_pos: m.start(),
                    end_pos: m.end(),
                });
            }
        }

        for m in self.phrase.find_iter(text) {
            let Some((start, phrase)) = strip_leading_stopwords(m.start(), m.as_str()) else {
                continue;
            };
            let end = start + phrase.len();
            if phrase.chars().count() < 2 || overlaps(&mentions, start, end) {
                continue;
            }
            let (entity_type, confidence) = classify(phrase);
            if confidence < self.config.confidence_threshold {
                continue;
            }
            mentions.push(ExtractedEntity {
                name: phrase.to_string(),
                entity_type: entity_type.to_string(),
                confidence,
                start_pos: start,
                end_pos: end,
            });
        }

        mentions.sort_by_key(|m| m.start_pos);
        mentions
    }

    /// Collapse mentions into distinct entities keyed case-insensitively.
    /// Mentions are renamed to the first surface form seen for their entity.
    fn deduplicate(&self, mentions: &mut Vec<ExtractedEntity>) -> Vec<ExtractedEntity> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut entities: Vec<ExtractedEntity> = Vec::new();

        mentions.retain_mut(|mention| {
            let key = mention.name.to_lowercase();
            match index.get(&key) {
                Some(&i) => {
                    let entity = &mut entities[i];
                    entity.confidence = entity.confidence.max(mention.confidence);
                    mention.name = entity.name.clone();
                    true
                }
                None if entities.len() < self.config.max_entities => {
                    index.insert(key, entities.len());
                    entities.push(mention.clone());
                    true
                }
                None => false,
            }
        });

        entities
    }
}

#[async_trait]
impl EntityExtractor for PatternExtractor {
    async fn extract(&self, text: &str) -> Result<Extraction> {
        let cleaned_text = clean_text(text);
        let mut mentions = self.find_mentions(&cleaned_text);
        let entities = self.deduplicate(&mut mentions);
        let relationships = self.detector.detect(&cleaned_text, &mentions);

        debug!(
            entities = entities.len(),
            relationships = relationships.len(),
            "Extracted entities"
        );

        Ok(Extraction {
            cleaned_text,
            entities,
            relationships,
        })
    }
}

fn overlaps(mentions: &[ExtractedEntity], start: usize, end: usize) -> bool {
    mentions.iter().any(|m| start < m.end_pos && m.start_pos < end)
}

fn strip_leading_stopwords(mut start: usize, mut phrase: &str) -> Option<(usize, &str)> {
    loop {
        let (word, rest) = match phrase.find([' ', '-']) {
            Some(i) => (&phrase[..i], Some(&phrase[i + 1..])),
            None => (phrase, None),
        };
        if !STOPWORDS.contains(&word) {
            return Some((start, phrase));
        }
        let rest = rest?;
        start += word.len() + 1;
        phrase = rest;
    }
}

fn classify(phrase: &str) -> (&'static str, f32) {
    if phrase.contains([' ', '-']) {
        ("Concept", 0.8)
    } else if phrase.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        ("Acronym", 0.75)
    } else {
        ("Concept", 0.6)
    }
}
