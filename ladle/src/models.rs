//! Core data models for the recipe engine.
//!
//! `RecipeRecord` is the internal unit kept in memory for the lifetime of a
//! dataset; `Recipe` is the projection handed to callers, with the
//! search-only fields stripped and the NER token set re-exposed.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// PANTRY INPUT
// ─────────────────────────────────────────────────────────────────────────────

/// Freshness classification assigned to a tracked item outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    Safe,
    Caution,
    Risky,
    UseNow,
}

impl RiskLevel {
    /// Tiers that should drive "cook this now" recommendations.
    pub fn is_urgent(self) -> bool {
        matches!(self, RiskLevel::Risky | RiskLevel::UseNow)
    }
}

/// A tracked pantry item, as provided by the surrounding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PantryItem {
    pub name: String,
    pub risk: RiskLevel,
}

// ─────────────────────────────────────────────────────────────────────────────
// RECIPES
// ─────────────────────────────────────────────────────────────────────────────

/// One ingredient line of a recipe. The open dataset provides names only, so
/// qty/unit default to zero/empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(default)]
    pub qty: f64,
    #[serde(default)]
    pub unit: String,
}

impl Ingredient {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qty: 0.0,
            unit: String::new(),
        }
    }
}

/// Canonical in-memory recipe record. Immutable after load; the loaded
/// collection is rebuilt wholesale when the dataset signature changes.
#[derive(Debug, Clone)]
pub struct RecipeRecord {
    /// Stable identifier, `open-<n>` assigned sequentially at load.
    pub id: String,
    pub title: String,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Option<String>,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
    /// Preparation time in minutes; 0 when the dataset doesn't provide one.
    pub time_min: u32,
    /// Lowercased title + ingredient names + directions.
    /// Used only by the edit-distance search fallback.
    pub(crate) search_text: String,
    /// Deduplicated normalized token set derived from `search_text`.
    pub(crate) tokens: Vec<String>,
    /// Deduplicated normalized token set from the dataset's NER column.
    pub(crate) ner_tokens: Vec<String>,
}

impl RecipeRecord {
    /// The token set used for indexing and matching: NER tokens when the
    /// dataset provides them, naive `search_text` tokens otherwise.
    pub(crate) fn effective_tokens(&self) -> &[String] {
        if self.ner_tokens.is_empty() {
            &self.tokens
        } else {
            &self.ner_tokens
        }
    }

    /// Public projection: internal search fields stripped, NER tokens kept.
    pub fn to_recipe(&self) -> Recipe {
        Recipe {
            id: self.id.clone(),
            title: self.title.clone(),
            ingredients: self.ingredients.clone(),
            instructions: self.instructions.clone(),
            tags: self.tags.clone(),
            source_url: self.source_url.clone(),
            time_min: self.time_min,
            ner_tokens: self.ner_tokens.clone(),
        }
    }
}

/// Public recipe projection returned by every query operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    pub id: String,
    pub title: String,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Option<String>,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
    pub time_min: u32,
    /// Highest-quality ingredient token set, for downstream matching logic.
    pub ner_tokens: Vec<String>,
}

/// A recipe paired with the score that ranked it.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecipe {
    pub recipe: Recipe,
    pub score: f64,
}
