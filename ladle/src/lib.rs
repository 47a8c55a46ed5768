//! Recipe matching and search over a bulk open-recipe dataset.
//!
//! The crate loads recipes from a pre-built JSON cache or the raw bulk CSV,
//! holds them as an immutable in-memory sequence, and serves four query
//! operations through [`RecipeStore`]: random sampling, pantry-coverage
//! matching, use-now urgency recommendations, and typo-tolerant title
//! search. The title search runs on a Tantivy trigram index persisted next
//! to the dataset and validated against a size+mtime signature; everything
//! is rebuilt transparently when the dataset changes.
//!
//! All public operations degrade to empty results rather than surfacing
//! errors; the surrounding application treats a missing dataset as a normal
//! state.

pub mod dataset;
pub mod models;
pub mod normalize;
pub mod store;

mod title_index;
mod token_index;

pub use dataset::DatasetPaths;
pub use models::{Ingredient, PantryItem, Recipe, RiskLevel, ScoredRecipe};
pub use store::{RecipeStore, DEFAULT_SEARCH_LIMIT};
