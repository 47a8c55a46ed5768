//! End-to-end flows through the public store API: CSV ingestion, the four
//! query operations, and title index persistence across store instances.

use std::path::PathBuf;

use tempfile::TempDir;

use ladle::{DatasetPaths, PantryItem, RecipeStore, RiskLevel, DEFAULT_SEARCH_LIMIT};

const CSV_HEADER: &str = "index,title,ingredients,directions,link,source,NER\n";

fn csv_row(title: &str, ingredients: &str, directions: &str, ner: &str) -> String {
    let quote = |s: &str| format!("\"{}\"", s.replace('"', "\"\""));
    format!(
        "0,{},{},{},\"www.example.com/r\",\"Gathered\",{}\n",
        quote(title),
        quote(ingredients),
        quote(directions),
        quote(ner)
    )
}

fn write_fixture_csv(dir: &TempDir) -> PathBuf {
    let mut csv = String::from(CSV_HEADER);
    csv.push_str(&csv_row(
        "Spinach Frittata",
        r#"["2 eggs", "1 cup spinach"]"#,
        r#"["Beat eggs.", "Fold in spinach."]"#,
        r#"["eggs", "spinach"]"#,
    ));
    csv.push_str(&csv_row(
        "Carrot Ginger Soup",
        r#"["3 carrots", "ginger", "stock"]"#,
        r#"["Simmer until soft."]"#,
        r#"["carrots", "ginger", "stock"]"#,
    ));
    csv.push_str(&csv_row(
        "Bread Pudding",
        r#"["stale bread", "2 eggs", "milk"]"#,
        r#"["Soak.", "Bake."]"#,
        r#"["bread", "eggs", "milk"]"#,
    ));
    let path = dir.path().join("recipes.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn item(name: &str, risk: RiskLevel) -> PantryItem {
    PantryItem {
        name: name.to_string(),
        risk,
    }
}

fn fixture_store(dir: &TempDir) -> RecipeStore {
    let csv = write_fixture_csv(dir);
    RecipeStore::new(
        DatasetPaths::new(dir.path().join("recipes.json"), csv),
        Some(dir.path().join("index_cache")),
    )
}

#[tokio::test]
async fn csv_dataset_serves_all_four_operations() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);

    let random = store.random_recipes(2).await;
    assert_eq!(random.len(), 2);
    assert!(random.iter().all(|r| r.id.starts_with("open-")));

    let matches = store
        .best_pantry_matches(&[item("eggs", RiskLevel::Safe), item("milk", RiskLevel::Safe)], 10)
        .await;
    // Bread Pudding shares 2 of its 3 NER tokens, Spinach Frittata 1 of 2.
    assert_eq!(matches[0].recipe.title, "Bread Pudding");
    assert!((matches[0].score - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(matches[1].recipe.title, "Spinach Frittata");
    assert!((matches[1].score - 0.5).abs() < 1e-9);

    let urgent = store
        .use_now_recommendations(
            &[item("eggs", RiskLevel::UseNow), item("spinach", RiskLevel::Risky)],
            10,
        )
        .await;
    assert_eq!(urgent[0].recipe.title, "Spinach Frittata");
    assert_eq!(urgent[0].score, 2.0);
    assert_eq!(urgent[1].recipe.title, "Bread Pudding");
    assert_eq!(urgent[1].score, 1.0);

    let found = store.search("carot ginger", DEFAULT_SEARCH_LIMIT).await;
    assert_eq!(found.first().map(|r| r.title.as_str()), Some("Carrot Ginger Soup"));
}

#[tokio::test]
async fn search_results_carry_full_projection() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);

    let found = store.search("bread pudding", 5).await;
    let recipe = found.first().expect("bread pudding should be found");
    assert_eq!(recipe.ingredients.len(), 3);
    assert_eq!(recipe.instructions.as_deref(), Some("Soak.\nBake."));
    assert_eq!(recipe.source_url.as_deref(), Some("https://www.example.com/r"));
    assert!(recipe.tags.contains(&"gathered".to_string()));
    assert_eq!(recipe.ner_tokens, vec!["bread", "eggs", "milk"]);
}

#[tokio::test]
async fn search_falls_back_when_no_title_matches() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);

    // "stale milk" shares no trigrams or near-words with any title, so the
    // index comes back empty and the similarity scan over the full search
    // text takes over: only Bread Pudding carries both tokens.
    let found = store.search("stale milk", 5).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Bread Pudding");
}

#[tokio::test]
async fn use_now_ties_broken_by_prep_time() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("recipes.json"),
        r#"[
            {"title": "Slow Custard", "ingredients": ["eggs", "milk"],
             "ner_tokens": ["eggs", "milk"], "time_min": 90},
            {"title": "Fast Scramble", "ingredients": ["eggs", "butter"],
             "ner_tokens": ["eggs", "butter"], "time_min": 5}
        ]"#,
    )
    .unwrap();
    let store = RecipeStore::new(
        DatasetPaths::new(dir.path().join("recipes.json"), dir.path().join("recipes.csv")),
        None,
    );

    let recs = store
        .use_now_recommendations(&[item("eggs", RiskLevel::UseNow)], 10)
        .await;
    // One shared token each; the quicker recipe wins the tie even though it
    // comes later in the dataset.
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].score, recs[1].score);
    assert_eq!(recs[0].recipe.title, "Fast Scramble");
    assert_eq!(recs[1].recipe.title, "Slow Custard");
}

#[tokio::test]
async fn title_index_persists_across_store_instances() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);
    assert!(!store.search("frittata", 5).await.is_empty());

    // The first search tags the cache with the dataset signature.
    let meta = dir.path().join("index_cache").join("meta.json");
    assert!(meta.exists(), "expected signature sidecar at {:?}", meta);

    // A fresh store over the same files picks the index back up.
    drop(store);
    let reopened = fixture_store(&dir);
    let found = reopened.search("frittata", 5).await;
    assert_eq!(found.first().map(|r| r.title.as_str()), Some("Spinach Frittata"));
}

#[tokio::test]
async fn dataset_swap_is_picked_up_without_restart() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);
    assert_eq!(store.random_recipes(10).await.len(), 3);

    // Dropping a JSON cache next to the CSV switches the active source.
    std::fs::write(
        dir.path().join("recipes.json"),
        r#"[{"title": "Cache Only Stew", "ingredients": ["beans"], "time_min": 35}]"#,
    )
    .unwrap();

    let records = store.random_recipes(10).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Cache Only Stew");
    assert_eq!(records[0].time_min, 35);

    let found = store.search("cache only stew", 5).await;
    assert_eq!(found.first().map(|r| r.title.as_str()), Some("Cache Only Stew"));
}

#[tokio::test]
async fn queries_degrade_when_dataset_disappears() {
    let dir = TempDir::new().unwrap();
    let store = RecipeStore::new(
        DatasetPaths::new(dir.path().join("none.json"), dir.path().join("none.csv")),
        Some(dir.path().join("index_cache")),
    );
    assert!(store.random_recipes(5).await.is_empty());
    assert!(store.search("anything at all", 5).await.is_empty());
    assert!(store
        .best_pantry_matches(&[item("eggs", RiskLevel::Safe)], 5)
        .await
        .is_empty());
}
