//! RecipeStore — the recommendation and search surface.
//!
//! The store owns all memoized state: the loaded record sequence plus its
//! token index (one unit, the "corpus") and the lazily built title index,
//! each keyed by the dataset signature. Rebuilds are coalesced: the slots
//! sit behind async mutexes, so concurrent callers arriving during a build
//! await the same in-flight work instead of racing to parse the CSV twice.
//! There is no cancellation and no internal timeout; a build runs to
//! completion once started.
//!
//! Every operation degrades to an empty result — a missing or malformed
//! dataset is a normal state, and the surrounding application falls back to
//! its bundled recipe list.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio::sync::Mutex;

use crate::dataset::{self, DatasetPaths};
use crate::models::{PantryItem, Recipe, RecipeRecord, ScoredRecipe};
use crate::normalize::{normalize, token_set_of_all};
use crate::title_index::{fallback_search, TitleIndex};
use crate::token_index::TokenIndex;

/// Result cap used by callers that don't pass an explicit search limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// The loaded dataset and its token index, built and invalidated together.
/// Carries the dataset signature it was built under; derived structures (the
/// title index) must key off this signature, never a fresh stat of the
/// dataset, so a swap mid-operation can't tag an index built from old
/// records with the new signature.
#[derive(Default)]
struct Corpus {
    signature: Option<String>,
    records: Vec<RecipeRecord>,
    token_index: TokenIndex,
}

struct CachedTitleIndex {
    signature: Option<String>,
    index: Arc<TitleIndex>,
}

pub struct RecipeStore {
    paths: DatasetPaths,
    /// Where the title index persists between processes; `None` keeps it
    /// in RAM only.
    index_cache_dir: Option<PathBuf>,
    corpus: Mutex<Option<Arc<Corpus>>>,
    title_index: Mutex<Option<CachedTitleIndex>>,
}

impl RecipeStore {
    pub fn new(paths: DatasetPaths, index_cache_dir: Option<PathBuf>) -> Self {
        Self {
            paths,
            index_cache_dir,
            corpus: Mutex::new(None),
            title_index: Mutex::new(None),
        }
    }

    /// Store over the application's well-known dataset locations.
    pub fn with_default_locations() -> Self {
        Self::new(
            DatasetPaths::default_locations(),
            Some(PathBuf::from("data/title_index")),
        )
    }

    /// The memoized corpus, rebuilt when the dataset signature changes.
    /// A null signature (unreadable source) disables reuse for the run.
    async fn corpus(&self) -> Arc<Corpus> {
        let mut slot = self.corpus.lock().await;
        let signature = dataset::signature(&self.paths);
        if let (Some(cached), Some(current)) = (slot.as_ref(), signature.as_deref()) {
            if cached.signature.as_deref() == Some(current) {
                return Arc::clone(cached);
            }
        }

        tracing::debug!(signature = ?signature, "building recipe corpus");
        let paths = self.paths.clone();
        let built = tokio::task::spawn_blocking(move || {
            let records = dataset::load_records(&paths);
            let token_index = TokenIndex::build(&records);
            Corpus {
                signature,
                records,
                token_index,
            }
        })
        .await;

        match built {
            Ok(corpus) => {
                let corpus = Arc::new(corpus);
                *slot = Some(Arc::clone(&corpus));
                corpus
            }
            Err(err) => {
                tracing::warn!(error = %err, "corpus build task failed");
                Arc::new(Corpus::default())
            }
        }
    }

    /// The memoized title index, built lazily on the first search and keyed
    /// by the signature its corpus was built under, so the persisted tag
    /// always describes the records actually indexed.
    async fn title_index(&self, corpus: &Arc<Corpus>) -> Option<Arc<TitleIndex>> {
        let mut slot = self.title_index.lock().await;
        if let (Some(cached), Some(current)) = (slot.as_ref(), corpus.signature.as_deref()) {
            if cached.signature.as_deref() == Some(current) {
                return Some(Arc::clone(&cached.index));
            }
        }

        let signature = corpus.signature.clone();
        let cache_dir = self.index_cache_dir.clone();
        let corpus = Arc::clone(corpus);
        let built = tokio::task::spawn_blocking(move || match cache_dir {
            Some(dir) => {
                TitleIndex::open_or_build(&dir, corpus.signature.as_deref(), &corpus.records)
            }
            None => TitleIndex::build_in_ram(&corpus.records),
        })
        .await;

        match built {
            Ok(Ok(index)) => {
                let index = Arc::new(index);
                *slot = Some(CachedTitleIndex {
                    signature,
                    index: Arc::clone(&index),
                });
                Some(index)
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "title index build failed");
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, "title index build task failed");
                None
            }
        }
    }

    fn project(corpus: &Corpus, positions: impl IntoIterator<Item = usize>) -> Vec<Recipe> {
        positions
            .into_iter()
            .filter_map(|position| corpus.records.get(position))
            .map(RecipeRecord::to_recipe)
            .collect()
    }

    /// An unbiased random sample of `n` recipes, reshuffled on every call.
    pub async fn random_recipes(&self, n: usize) -> Vec<Recipe> {
        let corpus = self.corpus().await;
        let mut positions: Vec<usize> = (0..corpus.records.len()).collect();
        positions.shuffle(&mut rand::thread_rng());
        positions.truncate(n);
        Self::project(&corpus, positions)
    }

    /// Recipes ranked by pantry coverage: the fraction of each recipe's
    /// effective token set already present among the pantry item names.
    /// Only strictly positive scores are returned, sorted by score
    /// descending, then preparation time, then dataset order.
    pub async fn best_pantry_matches(
        &self,
        items: &[PantryItem],
        limit: usize,
    ) -> Vec<ScoredRecipe> {
        let pantry_tokens = token_set_of_all(items.iter().map(|item| item.name.as_str()));
        if pantry_tokens.is_empty() || limit == 0 {
            return Vec::new();
        }
        let corpus = self.corpus().await;
        let pantry: HashSet<&str> = pantry_tokens.iter().map(String::as_str).collect();
        let candidates = corpus
            .token_index
            .collect_candidates(pantry_tokens.iter().map(String::as_str));

        let mut scored: Vec<(f64, u32, usize)> = Vec::with_capacity(candidates.len());
        for position in candidates {
            let record = match corpus.records.get(position) {
                Some(record) => record,
                None => continue,
            };
            let effective = record.effective_tokens();
            let hits = effective
                .iter()
                .filter(|token| pantry.contains(token.as_str()))
                .count();
            if hits == 0 {
                continue;
            }
            let score = hits as f64 / effective.len() as f64;
            scored.push((score, record.time_min, position));
        }

        scored.sort_unstable_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
        scored.truncate(limit);
        scored
            .into_iter()
            .map(|(score, _, position)| ScoredRecipe {
                recipe: corpus.records[position].to_recipe(),
                score,
            })
            .collect()
    }

    /// Recipes ranked for urgency: only pantry items in the risky/use-now
    /// tiers contribute, and recipes are ranked by the absolute count of
    /// distinct shared tokens rather than coverage fraction — recipes with
    /// long ingredient lists are not penalized here.
    pub async fn use_now_recommendations(
        &self,
        items: &[PantryItem],
        limit: usize,
    ) -> Vec<ScoredRecipe> {
        let urgent_tokens = token_set_of_all(
            items
                .iter()
                .filter(|item| item.risk.is_urgent())
                .map(|item| item.name.as_str()),
        );
        if urgent_tokens.is_empty() || limit == 0 {
            return Vec::new();
        }
        let corpus = self.corpus().await;
        let hits = corpus
            .token_index
            .score_candidates(urgent_tokens.iter().map(String::as_str));

        let mut scored: Vec<(usize, u32, usize)> = hits
            .into_iter()
            .filter_map(|(position, count)| {
                corpus
                    .records
                    .get(position)
                    .map(|record| (count, record.time_min, position))
            })
            .collect();
        scored.sort_unstable_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
        scored.truncate(limit);
        scored
            .into_iter()
            .map(|(count, _, position)| ScoredRecipe {
                recipe: corpus.records[position].to_recipe(),
                score: count as f64,
            })
            .collect()
    }

    /// Typo-tolerant free-text search over titles. Falls back to a manual
    /// similarity scan when the index yields nothing (including when the
    /// dataset itself is empty).
    pub async fn search(&self, query: &str, limit: usize) -> Vec<Recipe> {
        let normalized = normalize(query);
        if normalized.is_empty() || limit == 0 {
            return Vec::new();
        }
        let corpus = self.corpus().await;

        if let Some(index) = self.title_index(&corpus).await {
            match index.query(&normalized, limit) {
                Ok(positions) if !positions.is_empty() => {
                    return Self::project(&corpus, positions);
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "title index query failed"),
            }
        }

        Self::project(&corpus, fallback_search(&corpus.records, &normalized, limit))
    }
}
