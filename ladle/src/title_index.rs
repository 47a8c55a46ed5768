//! Typo-tolerant title search (Tantivy trigram recall + fuzzy word clauses)
//! with a manual edit-distance fallback.
//!
//! The index covers recipe titles only and is built lazily on the first
//! search. On-disk instances live under a cache directory next to a
//! `meta.json` sidecar carrying the dataset signature they were built
//! against; a matching signature lets a fresh process reuse the index
//! without rebuilding, anything else triggers a wipe-and-rebuild. Cache
//! reads are defensive and cache writes are best-effort — neither path can
//! fail a search.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, FuzzyTermQuery, Occur, Query, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, FAST, INDEXED, STORED,
};
use tantivy::tokenizer::{NgramTokenizer, TextAnalyzer};
use tantivy::{Index, IndexReader, ReloadPolicy, TantivyDocument, Term};
use thiserror::Error;

use crate::models::RecipeRecord;
use crate::normalize::token_set;

const INDEX_DIR: &str = "tantivy";
const META_FILE: &str = "meta.json";
const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Fraction of a query word's length tolerated as edits. Tantivy's
/// Levenshtein DFA caps the absolute distance at 2.
const FUZZY_EDIT_RATIO: f64 = 0.35;

/// Fallback scorer: similarities at or below this don't count.
const FALLBACK_MIN_SIMILARITY: f64 = 0.4;
/// Fallback scorer: stop scanning a record's tokens once a near-exact match
/// is found.
const FALLBACK_SHORT_CIRCUIT: f64 = 0.95;
/// Flat bonus when the title contains the first query token verbatim.
const FALLBACK_TITLE_BONUS: f64 = 1.0;

#[derive(Error, Debug)]
pub enum TitleIndexError {
    #[error("tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),
    #[error("directory error: {0}")]
    Directory(#[from] tantivy::directory::error::OpenDirectoryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TitleIndexResult<T> = Result<T, TitleIndexError>;

/// Signature sidecar written next to the index directory.
#[derive(Serialize, Deserialize)]
struct IndexMeta {
    signature: String,
}

/// Tantivy-backed fuzzy search over recipe titles. Read-only after build.
pub struct TitleIndex {
    index: Index,
    reader: IndexReader,
    position_field: Field,
    title_field: Field,
    title_words_field: Field,
}

impl TitleIndex {
    /// Reuse a persisted index whose signature tag matches, otherwise
    /// rebuild from `records` and persist the new tag best-effort.
    pub fn open_or_build(
        cache_dir: &Path,
        signature: Option<&str>,
        records: &[RecipeRecord],
    ) -> TitleIndexResult<Self> {
        let index_dir = cache_dir.join(INDEX_DIR);
        if let Some(signature) = signature {
            if read_meta(cache_dir).as_deref() == Some(signature) {
                match Self::open_existing(&index_dir) {
                    Ok(index) => {
                        tracing::debug!(?cache_dir, "reusing persisted title index");
                        return Ok(index);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "unreadable title index cache, rebuilding");
                    }
                }
            }
        }

        // Drop any existing tag first so a failed meta write can't leave an
        // old signature validating the freshly built index.
        let _ = std::fs::remove_file(cache_dir.join(META_FILE));
        let index = Self::build_at(&index_dir, records)?;
        // No signature means caching is disabled for this run: the index
        // stays untagged and the next start rebuilds.
        if let Some(signature) = signature {
            if let Err(err) = write_meta(cache_dir, signature) {
                tracing::warn!(error = %err, "failed to persist title index signature");
            }
        }
        Ok(index)
    }

    /// Build an in-memory index (no cache directory configured, and tests).
    pub fn build_in_ram(records: &[RecipeRecord]) -> TitleIndexResult<Self> {
        let schema = Self::build_schema();
        let index = Index::create_in_ram(schema);
        Self::register_tokenizer(&index);
        Self::populate(Self::from_index(index)?, records)
    }

    fn build_at(index_dir: &Path, records: &[RecipeRecord]) -> TitleIndexResult<Self> {
        // Wipe whatever is there; a partial or mismatched index is useless.
        let _ = std::fs::remove_dir_all(index_dir);
        std::fs::create_dir_all(index_dir)?;
        let dir = MmapDirectory::open(index_dir)?;
        let index = Index::open_or_create(dir, Self::build_schema())?;
        Self::register_tokenizer(&index);
        Self::populate(Self::from_index(index)?, records)
    }

    fn open_existing(index_dir: &Path) -> TitleIndexResult<Self> {
        let dir = MmapDirectory::open(index_dir)?;
        let index = Index::open(dir)?;
        Self::register_tokenizer(&index);
        Self::from_index(index)
    }

    fn from_index(index: Index) -> TitleIndexResult<Self> {
        let schema = index.schema();
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(Self {
            position_field: schema.get_field("position")?,
            title_field: schema.get_field("title")?,
            title_words_field: schema.get_field("title_words")?,
            index,
            reader,
        })
    }

    fn populate(self, records: &[RecipeRecord]) -> TitleIndexResult<Self> {
        let mut writer = self.index.writer(WRITER_HEAP_BYTES)?;
        for (position, record) in records.iter().enumerate() {
            let mut doc = TantivyDocument::default();
            doc.add_i64(self.position_field, position as i64);
            doc.add_text(self.title_field, &record.title);
            doc.add_text(self.title_words_field, &record.title);
            writer.add_document(doc)?;
        }
        writer.commit()?;
        self.reader.reload()?;
        Ok(self)
    }

    fn build_schema() -> Schema {
        let mut builder = Schema::builder();
        builder.add_i64_field("position", STORED | FAST | INDEXED);

        // Trigram field: location-agnostic recall anywhere in the title.
        let trigram_indexing = TextFieldIndexing::default()
            .set_tokenizer("trigram")
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        builder.add_text_field(
            "title",
            TextOptions::default().set_indexing_options(trigram_indexing),
        );

        // Word field: FuzzyTermQuery catches substitutions with no trigram
        // overlap (e.g. "tast" vs "test").
        let word_indexing = TextFieldIndexing::default()
            .set_tokenizer("default")
            .set_index_option(IndexRecordOption::Basic);
        builder.add_text_field(
            "title_words",
            TextOptions::default().set_indexing_options(word_indexing),
        );

        builder.build()
    }

    fn register_tokenizer(index: &Index) {
        let tokenizer = TextAnalyzer::builder(NgramTokenizer::new(3, 3, false).unwrap())
            .filter(tantivy::tokenizer::LowerCaser)
            .build();
        index.tokenizers().register("trigram", tokenizer);
    }

    /// Trigram terms of `text` against the title field, deduplicated.
    fn trigram_terms(&self, text: &str) -> Vec<Term> {
        let mut tokenizer = self.index.tokenizers().get("trigram").unwrap();
        let mut stream = tokenizer.token_stream(text);
        let mut seen = HashSet::new();
        let mut terms = Vec::new();
        while let Some(token) = stream.next() {
            if seen.insert(token.text.clone()) {
                terms.push(Term::from_field_text(self.title_field, &token.text));
            }
        }
        terms
    }

    /// OR of trigram recall (with a min-should-match threshold) and per-word
    /// Levenshtein clauses.
    fn build_query(&self, query: &str) -> Box<dyn Query> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        let terms = self.trigram_terms(query);
        let num_terms = terms.len();
        if num_terms > 0 {
            let subqueries: Vec<(Occur, Box<dyn Query>)> = terms
                .into_iter()
                .map(|term| {
                    let q: Box<dyn Query> =
                        Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                    (Occur::Should, q)
                })
                .collect();
            let mut trigram_query = BooleanQuery::new(subqueries);
            if num_terms >= 3 {
                // Half the trigrams must land, so ~35% edit noise still
                // recalls while scattered coincidences don't.
                trigram_query.set_minimum_number_should_match((num_terms + 1) / 2);
            }
            clauses.push((Occur::Should, Box::new(trigram_query)));
        }

        for word in query.split_whitespace() {
            let distance = fuzzy_distance(word.chars().count());
            if distance == 0 {
                continue;
            }
            let term = Term::from_field_text(self.title_words_field, word);
            clauses.push((Occur::Should, Box::new(FuzzyTermQuery::new(term, distance, true))));
        }

        Box::new(BooleanQuery::new(clauses))
    }

    /// Up to `limit` record positions, best match first, ties broken by
    /// original dataset order. The query must already be normalized.
    pub fn query(&self, query: &str, limit: usize) -> TitleIndexResult<Vec<usize>> {
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let searcher = self.reader.searcher();
        let top_docs = searcher.search(
            self.build_query(query).as_ref(),
            &TopDocs::with_limit(limit).order_by_score(),
        )?;

        let mut scored = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let position = doc
                .get_first(self.position_field)
                .and_then(|value| value.as_i64())
                .unwrap_or(0) as usize;
            scored.push((score, position));
        }
        scored.sort_unstable_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        Ok(scored.into_iter().map(|(_, position)| position).collect())
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}

/// Maximum Levenshtein distance for a fuzzy word clause.
fn fuzzy_distance(word_len: usize) -> u8 {
    ((word_len as f64 * FUZZY_EDIT_RATIO) as u8).min(2)
}

fn meta_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(META_FILE)
}

/// Read the persisted signature tag. Any parse or shape mismatch reads as
/// "no tag", which triggers a rebuild.
fn read_meta(cache_dir: &Path) -> Option<String> {
    let bytes = std::fs::read(meta_path(cache_dir)).ok()?;
    let meta: IndexMeta = serde_json::from_slice(&bytes).ok()?;
    Some(meta.signature)
}

fn write_meta(cache_dir: &Path, signature: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(cache_dir)?;
    let meta = IndexMeta {
        signature: signature.to_string(),
    };
    std::fs::write(meta_path(cache_dir), serde_json::to_vec(&meta)?)
}

// ─────────────────────────────────────────────────────────────────────────────
// MANUAL FALLBACK
// ─────────────────────────────────────────────────────────────────────────────

/// Manual similarity scan used when the index yields nothing (including when
/// the dataset is empty). Scores each record by the sum over query tokens of
/// the best normalized Levenshtein similarity against the record's token
/// set, counting only similarities above the threshold, with a flat bonus
/// when the title contains the first query token verbatim. Returns positions
/// of strictly-positive scores, best first.
pub(crate) fn fallback_search(records: &[RecipeRecord], query: &str, limit: usize) -> Vec<usize> {
    let query_tokens = token_set(query);
    if query_tokens.is_empty() || limit == 0 {
        return Vec::new();
    }
    let first_token = query_tokens[0].as_str();

    let mut scored: Vec<(f64, usize)> = Vec::new();
    for (position, record) in records.iter().enumerate() {
        let mut score = 0.0;
        for query_token in &query_tokens {
            let mut best = 0.0f64;
            for token in &record.tokens {
                let similarity = token_similarity(query_token, token);
                if similarity > best {
                    best = similarity;
                }
                if best >= FALLBACK_SHORT_CIRCUIT {
                    break;
                }
            }
            if best > FALLBACK_MIN_SIMILARITY {
                score += best;
            }
        }
        if record.title.to_lowercase().contains(first_token) {
            score += FALLBACK_TITLE_BONUS;
        }
        if score > 0.0 {
            scored.push((score, position));
        }
    }

    scored.sort_unstable_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.truncate(limit);
    scored.into_iter().map(|(_, position)| position).collect()
}

/// Normalized Levenshtein similarity: `1 - dist / max(len)`.
fn token_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - strsim::levenshtein(a, b) as f64 / max_len as f64
}
