use crate::models::normalize_tag;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("Failed to read vocabulary file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse vocabulary: {0}")]
    Parse(#[from] toml::de::Error),
}

/// One diet or health requirement and the phrases that reveal it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub label: String,
    pub phrases: Vec<String>,
    /// Venue tags (besides the label itself) that satisfy this requirement
    #[serde(default)]
    pub satisfied_by: Vec<String>,
}

impl KeywordRule {
    fn new(label: &str, phrases: &[&str], satisfied_by: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            phrases: phrases.iter().map(|p| p.to_string()).collect(),
            satisfied_by: satisfied_by.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Case-insensitive substring match against already-lowercased text
    pub fn matches(&self, lowered_text: &str) -> bool {
        self.phrases
            .iter()
            .any(|phrase| lowered_text.contains(&phrase.to_lowercase()))
    }
}

/// Matching table for constraint extraction and health-fit scoring.
///
/// Diet rules are ordered: the first rule that matches wins. Every matching
/// health rule contributes a flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    #[serde(default)]
    pub diets: Vec<KeywordRule>,
    #[serde(default)]
    pub health: Vec<KeywordRule>,
    /// Phrases introducing a landmark inside a location, e.g. "near X"
    #[serde(default)]
    pub hint_prefixes: Vec<String>,
    /// Words that make a whole location segment a landmark, e.g. "GitHub HQ"
    #[serde(default)]
    pub landmark_keywords: Vec<String>,
    /// Words that mark location text as a meeting description rather than a
    /// place, e.g. the "Lunch" in "Lunch near Union Square"
    #[serde(default)]
    pub meeting_words: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            diets: vec![
                KeywordRule::new("vegan", &["vegan", "plant-based", "plant based"], &["plant-based"]),
                KeywordRule::new("vegetarian", &["vegetarian", "veggie"], &["vegan"]),
                KeywordRule::new(
                    "gluten-free",
                    &["gluten-free", "gluten free", "celiac", "coeliac"],
                    &[],
                ),
                KeywordRule::new("keto", &["keto", "ketogenic"], &["low-carb"]),
                KeywordRule::new("paleo", &["paleo"], &[]),
                KeywordRule::new("pescatarian", &["pescatarian"], &["seafood", "vegetarian"]),
                KeywordRule::new("halal", &["halal"], &[]),
                KeywordRule::new("kosher", &["kosher"], &[]),
            ],
            health: vec![
                KeywordRule::new(
                    "low-glycemic",
                    &["diabetes", "diabetic", "blood sugar", "low glycemic", "low-glycemic"],
                    &["diabetic-friendly", "low-carb", "salad", "mediterranean"],
                ),
                KeywordRule::new("low-carb", &["low carb", "low-carb"], &["keto", "salad"]),
                KeywordRule::new(
                    "high-protein",
                    &["high protein", "high-protein", "protein"],
                    &["steakhouse", "poke", "grill"],
                ),
                KeywordRule::new(
                    "heart-healthy",
                    &["heart-healthy", "heart healthy", "cholesterol", "low sodium", "low-sodium"],
                    &["mediterranean", "salad"],
                ),
                KeywordRule::new(
                    "nut-free",
                    &["nut allergy", "nut-free", "peanut allergy", "tree nut"],
                    &[],
                ),
                KeywordRule::new(
                    "brain-fuel",
                    &["brain food", "brain fuel", "brain-fueling", "high-energy"],
                    &["mediterranean", "poke", "salad"],
                ),
            ],
            hint_prefixes: ["near", "next to", "close to", "outside", "at", "@", "by"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            landmark_keywords: [
                "hq",
                "headquarters",
                "office",
                "campus",
                "building",
                "tower",
                "station",
                "plaza",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
            meeting_words: [
                "lunch",
                "luncheon",
                "brunch",
                "meet",
                "meeting",
                "sync",
                "standup",
                "team",
                "conference",
                "room",
                "floor",
                "call",
            ]
            .iter()
            .map(|w| w.to_string())
            .collect(),
        }
    }
}

impl Vocabulary {
    pub fn from_toml_str(raw: &str) -> Result<Self, VocabularyError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, VocabularyError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Normalized venue tags that count as meeting `requirement`
    pub fn accepted_tags(&self, requirement: &str) -> Vec<String> {
        let wanted = normalize_tag(requirement);
        let mut tags = vec![wanted.clone()];
        if let Some(rule) = self
            .diets
            .iter()
            .chain(self.health.iter())
            .find(|rule| normalize_tag(&rule.label) == wanted)
        {
            tags.extend(rule.satisfied_by.iter().map(|t| normalize_tag(t)));
        }
        tags
    }
}
