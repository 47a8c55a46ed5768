//! Recipe dataset loading.
//!
//! Two ingestion paths feed the engine: a pre-built JSON cache (preferred,
//! parses in one shot) and the raw bulk CSV (streamed row by row — the file
//! is too large to hold as text). Both normalize into the same `RawRecipe`
//! shape before record construction, so either parser can evolve on its own.
//!
//! A missing or malformed dataset is a normal empty state, never an error:
//! the surrounding application always has a bundled fallback list to show.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use url::Url;

use crate::models::{Ingredient, RecipeRecord};
use crate::normalize::{token_set, token_set_of_all};

/// Tag assigned when a record would otherwise end up with none.
const SENTINEL_TAG: &str = "untagged";

/// How many NER tokens contribute to a record's tag list.
const TAG_NER_TOKENS: usize = 3;

/// Well-known locations of the two dataset source files.
#[derive(Debug, Clone)]
pub struct DatasetPaths {
    pub json_cache: PathBuf,
    pub csv: PathBuf,
}

impl DatasetPaths {
    pub fn new(json_cache: impl Into<PathBuf>, csv: impl Into<PathBuf>) -> Self {
        Self {
            json_cache: json_cache.into(),
            csv: csv.into(),
        }
    }

    /// The default on-disk locations used by the application.
    pub fn default_locations() -> Self {
        Self::new("data/open_recipes.json", "data/open_recipes.csv")
    }

    /// The file the loader would actually read: the JSON cache when present,
    /// the CSV otherwise.
    fn active_source(&self) -> &Path {
        if self.json_cache.exists() {
            &self.json_cache
        } else {
            &self.csv
        }
    }
}

/// Cheap change fingerprint for the active dataset source: file size plus
/// modification time. `None` when the file can't be stat'd, which disables
/// memoization and index caching for that run.
pub fn signature(paths: &DatasetPaths) -> Option<String> {
    let meta = std::fs::metadata(paths.active_source()).ok()?;
    let mtime = meta.modified().ok()?.duration_since(UNIX_EPOCH).ok()?;
    Some(format!("{}-{}", meta.len(), mtime.as_millis()))
}

/// Source-shape-independent row produced by both ingestion paths.
struct RawRecipe {
    title: String,
    ingredients: Vec<String>,
    directions: Vec<String>,
    ner_entries: Vec<String>,
    link: Option<String>,
    source: Option<String>,
    time_min: u32,
}

/// Row shape of the pre-built JSON cache.
#[derive(Debug, Deserialize)]
struct CachedRecipe {
    #[serde(default)]
    title: String,
    #[serde(default)]
    ingredients: Vec<String>,
    #[serde(default)]
    directions: Vec<String>,
    #[serde(default)]
    ner_tokens: Vec<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    time_min: Option<u32>,
}

impl From<CachedRecipe> for RawRecipe {
    fn from(cached: CachedRecipe) -> Self {
        Self {
            title: cached.title,
            ingredients: cached.ingredients,
            directions: cached.directions,
            ner_entries: cached.ner_tokens,
            link: cached.link,
            source: cached.source,
            time_min: cached.time_min.unwrap_or(0),
        }
    }
}

/// Load the full record sequence from whichever source is available.
///
/// The JSON cache is used exclusively when it parses to a non-empty list;
/// otherwise the CSV is streamed. Absent or corrupt sources yield an empty
/// sequence.
pub fn load_records(paths: &DatasetPaths) -> Vec<RecipeRecord> {
    if let Some(rows) = load_json_cache(&paths.json_cache) {
        if !rows.is_empty() {
            return build_records(rows);
        }
        tracing::debug!("json cache parsed empty, falling back to csv");
    }
    build_records(load_csv(&paths.csv))
}

fn load_json_cache(path: &Path) -> Option<Vec<RawRecipe>> {
    let bytes = std::fs::read(path).ok()?;
    let rows: Vec<CachedRecipe> = serde_json::from_slice(&bytes).ok()?;
    Some(rows.into_iter().map(RawRecipe::from).collect())
}

/// Stream the bulk CSV one record at a time. Column positions: 1 title,
/// 2 ingredients (JSON array), 3 directions (JSON array), 4 link, 5 source,
/// 6 NER (JSON array). Malformed rows are dropped, not errors — bulk scraped
/// data is expected to contain them.
fn load_csv(path: &Path) -> Vec<RawRecipe> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return Vec::new(),
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(_) => continue,
        };
        if record.len() < 7 {
            continue;
        }
        let field = |i: usize| record.get(i).unwrap_or("").trim().to_string();
        rows.push(RawRecipe {
            title: field(1),
            ingredients: json_list(&field(2)),
            directions: json_list(&field(3)),
            ner_entries: json_list(&field(6)),
            link: Some(field(4)).filter(|s| !s.is_empty()),
            source: Some(field(5)).filter(|s| !s.is_empty()),
            time_min: 0,
        });
    }
    rows
}

/// Parse a JSON-array-encoded field; anything else becomes an empty list.
fn json_list(field: &str) -> Vec<String> {
    serde_json::from_str(field).unwrap_or_default()
}

fn build_records(rows: Vec<RawRecipe>) -> Vec<RecipeRecord> {
    rows.into_iter()
        .filter(|row| !row.title.trim().is_empty())
        .enumerate()
        .map(|(position, row)| build_record(position, row))
        .collect()
}

fn build_record(position: usize, row: RawRecipe) -> RecipeRecord {
    let title = row.title.trim().to_string();
    let ner_tokens = token_set_of_all(&row.ner_entries);

    let mut ingredients: Vec<Ingredient> = row
        .ingredients
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(Ingredient::named)
        .collect();
    if ingredients.is_empty() {
        ingredients = ner_tokens.iter().map(Ingredient::named).collect();
    }
    if ingredients.is_empty() {
        ingredients.push(Ingredient::named(title.clone()));
    }

    let mut tags: Vec<String> = Vec::new();
    if let Some(source) = row.source.as_deref() {
        let tag = source.trim().to_lowercase();
        if !tag.is_empty() {
            tags.push(tag);
        }
    }
    for token in ner_tokens.iter().take(TAG_NER_TOKENS) {
        if !tags.contains(token) {
            tags.push(token.clone());
        }
    }
    if tags.is_empty() {
        tags.push(SENTINEL_TAG.to_string());
    }

    let instructions = if row.directions.is_empty() {
        None
    } else {
        Some(row.directions.join("\n"))
    };

    let search_text = {
        let mut text = title.clone();
        for ingredient in &ingredients {
            text.push(' ');
            text.push_str(&ingredient.name);
        }
        if let Some(instructions) = &instructions {
            text.push(' ');
            text.push_str(instructions);
        }
        text.to_lowercase()
    };
    let tokens = token_set(&search_text);

    RecipeRecord {
        id: format!("open-{}", position),
        title,
        ingredients,
        instructions,
        tags,
        source_url: row.link.as_deref().and_then(normalize_link),
        time_min: row.time_min,
        search_text,
        tokens,
        ner_tokens,
    }
}

/// Normalize a source link into an absolute URL, prefixing `https://` when
/// the raw value lacks a scheme. Unparseable links become `None`.
fn normalize_link(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    Url::parse(&candidate).ok().map(String::from)
}

/// Quick sanity check that a record keeps its loader invariants.
#[cfg(test)]
fn assert_invariants(record: &RecipeRecord) {
    assert!(!record.title.is_empty());
    assert!(!record.ingredients.is_empty(), "record {} has no ingredients", record.id);
    assert!(!record.tags.is_empty(), "record {} has no tags", record.id);
}
