//! Inverted token index for candidate retrieval.
//!
//! Maps every normalized token to the positions of the records containing
//! it, so pantry and use-now matching touch O(vocabulary hits) records
//! instead of scanning the whole dataset. Built once per dataset signature
//! and never mutated afterwards.

use std::collections::{HashMap, HashSet};

use crate::models::RecipeRecord;

#[derive(Debug, Default)]
pub struct TokenIndex {
    postings: HashMap<String, Vec<usize>>,
}

impl TokenIndex {
    /// Index every record by its effective token set (NER tokens when
    /// present, naive tokens otherwise). Effective token sets are
    /// deduplicated at load time, so a record lands in each bucket at most
    /// once.
    pub fn build(records: &[RecipeRecord]) -> Self {
        let mut postings: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, record) in records.iter().enumerate() {
            for token in record.effective_tokens() {
                postings.entry(token.clone()).or_default().push(position);
            }
        }
        Self { postings }
    }

    /// Union of the posting lists of every query token: the set of record
    /// positions sharing any vocabulary with the query. No ranking.
    pub fn collect_candidates<'a, I>(&self, tokens: I) -> HashSet<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut candidates = HashSet::new();
        for token in tokens {
            if let Some(bucket) = self.postings.get(token) {
                candidates.extend(bucket.iter().copied());
            }
        }
        candidates
    }

    /// For each record touched by any query token, count how many distinct
    /// query tokens hit it. Callers pass a deduplicated token set.
    pub fn score_candidates<'a, I>(&self, tokens: I) -> HashMap<usize, usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut hits: HashMap<usize, usize> = HashMap::new();
        for token in tokens {
            if let Some(bucket) = self.postings.get(token) {
                for &position in bucket {
                    *hits.entry(position).or_insert(0) += 1;
                }
            }
        }
        hits
    }

    #[cfg(test)]
    pub(crate) fn postings(&self) -> &HashMap<String, Vec<usize>> {
        &self.postings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ingredient;

    fn record(title: &str, ner_tokens: &[&str]) -> RecipeRecord {
        let tokens = crate::normalize::token_set(title);
        RecipeRecord {
            id: String::new(),
            title: title.to_string(),
            ingredients: vec![Ingredient::named(title)],
            instructions: None,
            tags: vec!["untagged".into()],
            source_url: None,
            time_min: 0,
            search_text: title.to_lowercase(),
            tokens,
            ner_tokens: ner_tokens.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_build_indexes_effective_tokens() {
        let records = vec![
            record("tomato soup", &[]),
            record("tomato salad", &["tomato", "lettuce"]),
        ];
        let index = TokenIndex::build(&records);
        assert_eq!(index.postings()["tomato"], vec![0, 1]);
        assert_eq!(index.postings()["lettuce"], vec![1]);
        // Record 1 uses its NER set, so the title word "salad" is not indexed.
        assert!(!index.postings().contains_key("salad"));
        assert_eq!(index.postings()["soup"], vec![0]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let records = vec![
            record("tomato soup", &[]),
            record("lentil stew", &["lentils", "carrot"]),
            record("carrot cake", &[]),
        ];
        let first = TokenIndex::build(&records);
        let second = TokenIndex::build(&records);
        assert_eq!(first.postings(), second.postings());
    }

    #[test]
    fn test_collect_candidates_unions_buckets() {
        let records = vec![
            record("tomato soup", &[]),
            record("carrot soup", &[]),
            record("carrot cake", &[]),
        ];
        let index = TokenIndex::build(&records);

        let candidates = index.collect_candidates(["soup", "cake"].into_iter());
        assert_eq!(candidates, HashSet::from([0, 1, 2]));

        let candidates = index.collect_candidates(["cake"].into_iter());
        assert_eq!(candidates, HashSet::from([2]));

        assert!(index.collect_candidates(["quinoa"].into_iter()).is_empty());
    }

    #[test]
    fn test_score_candidates_counts_distinct_hits() {
        let records = vec![
            record("tomato soup", &[]),
            record("carrot soup", &[]),
            record("carrot tomato soup", &[]),
        ];
        let index = TokenIndex::build(&records);

        let hits = index.score_candidates(["carrot", "tomato", "soup"].into_iter());
        assert_eq!(hits[&0], 2);
        assert_eq!(hits[&1], 2);
        assert_eq!(hits[&2], 3);
    }

    #[test]
    fn test_empty_query_is_empty() {
        let index = TokenIndex::build(&[record("tomato soup", &[])]);
        assert!(index.collect_candidates(std::iter::empty()).is_empty());
        assert!(index.score_candidates(std::iter::empty()).is_empty());
    }
}
