use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{ExtractedEntity, ExtractedRelationship};

/// Keyword rule mapping the text between two entities to a relationship type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRule {
    /// Any of these words or phrases (case-insensitive) triggers the rule
    pub keywords: Vec<String>,
    /// Relationship type
    pub relationship_type: String,
    /// Weight given to detected edges
    pub weight: f32,
}

impl RelationshipRule {
    fn new(keywords: &[&str], relationship_type: &str, weight: f32) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            relationship_type: relationship_type.to_string(),
            weight,
        }
    }
}

/// Configuration for relationship detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipDetectorConfig {
    /// Rules in priority order; the first matching rule wins
    pub rules: Vec<RelationshipRule>,
    /// Type used when two entities co-occur without a keyword between them
    pub default_type: String,
    pub default_weight: f32,
    /// Maximum distance in bytes between two entities
    pub max_gap: usize,
}

impl Default for RelationshipDetectorConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                RelationshipRule::new(&["uses", "use", "using", "utilizes", "relies on"], "USES", 0.8),
                RelationshipRule::new(&["mentions", "mentioned", "refers to"], "MENTIONS", 0.7),
                RelationshipRule::new(&["part of", "belongs to", "component of"], "PART_OF", 0.8),
                RelationshipRule::new(&["works at", "works for", "employed by"], "WORKS_FOR", 0.8),
                RelationshipRule::new(&["located in", "based in"], "LOCATED_IN", 0.8),
            ],
            default_type: "RELATED".to_string(),
            default_weight: 0.5,
            max_gap: 200,
        }
    }
}

/// Detects relationships between consecutive entity mentions of one sentence
#[derive(Debug, Clone)]
pub struct RelationshipDetector {
    config: RelationshipDetectorConfig,
    rules: Vec<(Regex, String, f32)>,
}

impl RelationshipDetector {
    pub fn new(config: RelationshipDetectorConfig) -> Result<Self> {
        let rules = config
            .rules
            .iter()
            .filter(|rule| !rule.keywords.is_empty())
            .map(|rule| {
                let alternatives = rule
                    .keywords
                    .iter()
                    .map(|k| regex::escape(k.trim()))
                    .collect::<Vec<_>>()
                    .join("|");
                Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives))
                    .map(|re| (re, rule.relationship_type.clone(), rule.weight.clamp(0.0, 1.0)))
                    .map_err(|e| {
                        Error::Configuration(format!(
                            "invalid keywords for {}: {}",
                            rule.relationship_type, e
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { config, rules })
    }

    /// `mentions` must be sorted by position and non-overlapping
    pub fn detect(&self, text: &str, mentions: &[ExtractedEntity]) -> Vec<ExtractedRelationship> {
        let mut seen = HashSet::new();
        let mut relationships = Vec::new();

        for pair in mentions.windows(2) {
            let (source, target) = (&pair[0], &pair[1]);
            if source.name == target.name || source.end_pos > target.start_pos {
                continue;
            }
            let Some(gap) = text.get(source.end_pos..target.start_pos) else {
                continue;
            };
            if gap.len() > self.config.max_gap || crosses_sentence(gap) {
                continue;
            }

            let (relationship_type, weight) = self
                .rules
                .iter()
                .find(|(re, _, _)| re.is_match(gap))
                .map(|(_, t, w)| (t.clone(), *w))
                .unwrap_or_else(|| (self.config.default_type.clone(), self.config.default_weight));

            if seen.insert((source.name.clone(), target.name.clone(), relationship_type.clone())) {
                relationships.push(ExtractedRelationship {
                    source: source.name.clone(),
                    target: target.name.clone(),
                    relationship_type,
                    weight,
                });
            }
        }

        relationships
    }
}

fn crosses_sentence(gap: &str) -> bool {
    gap.contains(['.', '!', '?', '\n'])
}
