//! End-to-end rebuild tests
//!
//! Drive the full reset → spill → sort → reduce → publish pipeline and query
//! the published file.

use derivex_core::{BuilderConfig, CounterMode, Document, DocumentError, LabeledDocument};
use derivex_durability::{InMemorySorter, Sorter};
use derivex_engine::{
    CategoryCounts, DirectoryCorpus, IndexBuilder, IndexReader, TokenCounter, WhoHas,
};
use std::collections::BTreeSet;
use std::path::Path;
use tempfile::TempDir;

type Corpus = Vec<Result<Document, DocumentError>>;

fn whitespace(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn url_corpus() -> Corpus {
    vec![
        Ok(Document::new(
            "url1",
            "in_url_1 in_url_1_and_2 in_url_1_and_2_and_3",
        )),
        Ok(Document::new(
            "url2",
            "in_url_2 in_url_1_and_2 in_url_1_and_2_and_3",
        )),
        Ok(Document::new("url3", "in_url_3 in_url_1_and_2_and_3")),
    ]
}

fn who_has(dir: &Path, sorter: impl Sorter + 'static) -> IndexBuilder<WhoHas> {
    IndexBuilder::new(
        BuilderConfig::new(dir, "who_has").with_chunk_records(2).with_fan_in(2),
        WhoHas::with_analyzer(whitespace, 1),
    )
    .unwrap()
    .with_sorter(sorter)
}

fn assert_url_scenario(builder: &IndexBuilder<WhoHas>) {
    assert_eq!(builder.lookup("in_url_1").unwrap(), Some(set(&["url1"])));
    assert_eq!(builder.lookup("in_url_2").unwrap(), Some(set(&["url2"])));
    assert_eq!(builder.lookup("in_url_3").unwrap(), Some(set(&["url3"])));
    assert_eq!(
        builder.lookup("in_url_1_and_2").unwrap(),
        Some(set(&["url1", "url2"]))
    );
    assert_eq!(
        builder.lookup("in_url_1_and_2_and_3").unwrap(),
        Some(set(&["url1", "url2", "url3"]))
    );
    assert_eq!(builder.lookup("nonexistent_token").unwrap(), None);
}

// ============================================================================
// WhoHas
// ============================================================================

#[test]
fn test_url_scenario_in_memory_sort() {
    let dir = TempDir::new().unwrap();
    let mut builder = who_has(dir.path(), InMemorySorter);

    let stats = builder.rebuild(url_corpus()).unwrap();
    assert_eq!(stats.documents, 3);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.observations, 8);
    assert_eq!(stats.keys, 5);
    assert_url_scenario(&builder);
}

#[test]
fn test_url_scenario_external_sort() {
    let dir = TempDir::new().unwrap();
    let config = BuilderConfig::new(dir.path(), "who_has")
        .with_chunk_records(2)
        .with_fan_in(2);
    let mut builder =
        IndexBuilder::new(config, WhoHas::with_analyzer(whitespace, 1)).unwrap();

    let stats = builder.rebuild(url_corpus()).unwrap();
    assert_eq!(stats.sort.runs, 4);
    assert!(stats.sort.merge_passes >= 1);
    assert_url_scenario(&builder);
}

#[test]
fn test_published_file_is_sorted_text() {
    let dir = TempDir::new().unwrap();
    let mut builder = who_has(dir.path(), InMemorySorter);
    builder.rebuild(url_corpus()).unwrap();

    let text = std::fs::read_to_string(builder.index_path()).unwrap();
    assert_eq!(
        text,
        "in_url_1\turl1\n\
         in_url_1_and_2\turl1,url2\n\
         in_url_1_and_2_and_3\turl1,url2,url3\n\
         in_url_2\turl2\n\
         in_url_3\turl3\n"
    );
}

#[test]
fn test_rebuild_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let mut builder = who_has(dir.path(), InMemorySorter);

    builder.rebuild(url_corpus()).unwrap();
    let first = std::fs::read(builder.index_path()).unwrap();
    for _ in 0..3 {
        builder.reset().unwrap();
        builder.rebuild(url_corpus()).unwrap();
        assert_eq!(std::fs::read(builder.index_path()).unwrap(), first);
        assert_url_scenario(&builder);
    }
}

#[test]
fn test_rebuild_replaces_not_appends() {
    let dir = TempDir::new().unwrap();
    let mut builder = who_has(dir.path(), InMemorySorter);
    builder.rebuild(url_corpus()).unwrap();

    builder
        .rebuild(vec![Ok(Document::new("url9", "fresh"))])
        .unwrap();
    assert_eq!(builder.lookup("fresh").unwrap(), Some(set(&["url9"])));
    assert_eq!(builder.lookup("in_url_1").unwrap(), None);
}

#[test]
fn test_empty_corpus() {
    let dir = TempDir::new().unwrap();
    let mut builder = who_has(dir.path(), InMemorySorter);

    let stats = builder.rebuild(Corpus::new()).unwrap();
    assert_eq!(stats.documents, 0);
    assert_eq!(stats.keys, 0);
    assert!(builder.is_built());
    assert_eq!(std::fs::metadata(builder.index_path()).unwrap().len(), 0);
    for key in ["", "a", "in_url_1", "nonexistent_token"] {
        assert_eq!(builder.lookup(key).unwrap(), None);
    }
    let reader = builder.reader().unwrap().unwrap();
    assert!(reader.is_empty());
}

#[test]
fn test_url_scenario_default_analyzer() {
    let dir = TempDir::new().unwrap();
    let mut builder =
        IndexBuilder::who_has(BuilderConfig::new(dir.path(), "who_has")).unwrap();
    builder.rebuild(url_corpus()).unwrap();
    assert_url_scenario(&builder);
}

#[test]
fn test_single_character_words_are_indexed() {
    let dir = TempDir::new().unwrap();
    let mut builder =
        IndexBuilder::who_has(BuilderConfig::new(dir.path(), "who_has")).unwrap();
    builder
        .rebuild(vec![Ok(Document::new("u", "vitamin C and 5 stars"))])
        .unwrap();
    assert_eq!(builder.lookup("c").unwrap(), Some(set(&["u"])));
    assert_eq!(builder.lookup("5").unwrap(), Some(set(&["u"])));
    assert_eq!(builder.lookup("and").unwrap(), None);
}

#[test]
fn test_empty_corpus_external_sort() {
    let dir = TempDir::new().unwrap();
    let mut builder =
        IndexBuilder::who_has(BuilderConfig::new(dir.path(), "who_has")).unwrap();
    let stats = builder.rebuild(Corpus::new()).unwrap();
    assert_eq!(stats.sort.records, 0);
    assert_eq!(builder.lookup("anything").unwrap(), None);
}

#[test]
fn test_never_built_is_distinguishable() {
    let dir = TempDir::new().unwrap();
    let builder = who_has(dir.path(), InMemorySorter);
    assert_eq!(builder.lookup("in_url_1").unwrap(), None);
    assert!(!builder.is_built());
    assert_eq!(builder.freshness().unwrap(), None);
}

#[test]
fn test_tuples_end_to_end() {
    let dir = TempDir::new().unwrap();
    let mut builder = IndexBuilder::new(
        BuilderConfig::new(dir.path(), "who_has").with_max_tuple(2),
        WhoHas::new(2),
    )
    .unwrap()
    .with_sorter(InMemorySorter);

    builder
        .rebuild(vec![
            Ok(Document::new("a", "New York pizza")),
            Ok(Document::new("b", "pizza in New York")),
        ])
        .unwrap();
    assert_eq!(builder.lookup("new_york").unwrap(), Some(set(&["a", "b"])));
    assert_eq!(builder.lookup("york_pizza").unwrap(), Some(set(&["a"])));
    assert_eq!(builder.lookup("pizza").unwrap(), Some(set(&["a", "b"])));
    // "in" is a stopword, so "pizza" and "new" become adjacent
    assert_eq!(builder.lookup("pizza_new").unwrap(), Some(set(&["b"])));
}

#[test]
fn test_directory_corpus_skips_bad_files() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    std::fs::create_dir(&docs).unwrap();
    std::fs::write(docs.join("a.txt"), "rust systems").unwrap();
    std::fs::write(docs.join("b.bin"), [0xffu8, 0xfe]).unwrap();
    std::fs::write(docs.join("c.txt"), "rust parsers").unwrap();

    let mut builder =
        IndexBuilder::who_has(BuilderConfig::new(dir.path().join("index"), "who_has")).unwrap();
    let stats = builder
        .rebuild(DirectoryCorpus::open(&docs).unwrap())
        .unwrap();

    assert_eq!(stats.documents, 2);
    assert_eq!(stats.skipped, 1);
    let rust = builder.lookup("rust").unwrap().unwrap();
    assert_eq!(rust.len(), 2);
    assert!(rust.iter().all(|id| id.starts_with("file://")));
}

#[test]
fn test_external_and_in_memory_sorters_agree() {
    let corpus: Vec<(String, String)> = (0..200)
        .map(|i| {
            let text = (0..(i % 9 + 1))
                .map(|j| format!("w{}", (i * 7 + j * 13) % 37))
                .collect::<Vec<_>>()
                .join(" ");
            (format!("https://example.com/{}", i), text)
        })
        .collect();
    let as_docs = || -> Corpus {
        corpus
            .iter()
            .map(|(id, text)| Ok(Document::new(id.as_str(), text.as_str())))
            .collect()
    };

    let external_dir = TempDir::new().unwrap();
    let mut external = IndexBuilder::new(
        BuilderConfig::new(external_dir.path(), "who_has")
            .with_max_tuple(3)
            .with_chunk_records(16)
            .with_fan_in(3),
        WhoHas::with_analyzer(whitespace, 3),
    )
    .unwrap();
    let stats = external.rebuild(as_docs()).unwrap();
    assert!(stats.sort.merge_passes > 1);

    let memory_dir = TempDir::new().unwrap();
    let mut memory = IndexBuilder::new(
        BuilderConfig::new(memory_dir.path(), "who_has").with_max_tuple(3),
        WhoHas::with_analyzer(whitespace, 3),
    )
    .unwrap()
    .with_sorter(InMemorySorter);
    memory.rebuild(as_docs()).unwrap();

    assert_eq!(
        std::fs::read(external.index_path()).unwrap(),
        std::fs::read(memory.index_path()).unwrap()
    );
}

// ============================================================================
// TokenCounter
// ============================================================================

fn labeled(id: &str, text: &str, in_category: bool) -> Result<LabeledDocument, DocumentError> {
    Ok(LabeledDocument::new(Document::new(id, text), in_category))
}

#[test]
fn test_token_counter_documents_mode() {
    let dir = TempDir::new().unwrap();
    let mut builder = IndexBuilder::new(
        BuilderConfig::new(dir.path(), "spam_counts"),
        TokenCounter::with_analyzer(whitespace, 1),
    )
    .unwrap()
    .with_sorter(InMemorySorter);

    builder
        .rebuild(vec![
            labeled("1", "cheap pills cheap", true),
            labeled("2", "cheap flights", false),
            labeled("3", "meeting notes", false),
        ])
        .unwrap();

    assert_eq!(
        builder.lookup("cheap").unwrap(),
        Some(CategoryCounts::new(1, 1))
    );
    assert_eq!(
        builder.lookup("pills").unwrap(),
        Some(CategoryCounts::new(1, 0))
    );
    assert_eq!(
        builder.lookup("notes").unwrap(),
        Some(CategoryCounts::new(0, 1))
    );
    assert_eq!(builder.lookup("absent").unwrap(), None);
}

#[test]
fn test_token_counter_occurrences_from_config() {
    let dir = TempDir::new().unwrap();
    let config = BuilderConfig::new(dir.path(), "spam_counts")
        .with_counter_mode(CounterMode::Occurrences);
    let mut builder = IndexBuilder::token_counter(config).unwrap();

    builder
        .rebuild(vec![
            labeled("1", "cheap pills cheap", true),
            labeled("2", "cheap flights", false),
        ])
        .unwrap();
    assert_eq!(
        builder.lookup("cheap").unwrap(),
        Some(CategoryCounts::new(2, 1))
    );
}

#[test]
fn test_token_counter_widens_beyond_i16() {
    let dir = TempDir::new().unwrap();
    let mut builder = IndexBuilder::new(
        BuilderConfig::new(dir.path(), "counts"),
        TokenCounter::with_analyzer(whitespace, 1).with_mode(CounterMode::Occurrences),
    )
    .unwrap()
    .with_sorter(InMemorySorter);

    // Each document clamps to i16::MAX; the aggregate keeps adding
    let heavy = vec!["w"; 40_000].join(" ");
    builder
        .rebuild((0..3).map(|i| labeled(&i.to_string(), &heavy, true)))
        .unwrap();
    assert_eq!(
        builder.lookup("w").unwrap(),
        Some(CategoryCounts::new(3 * i64::from(i16::MAX), 0))
    );
}

#[test]
fn test_labeled_directory_corpus() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("spam");
    std::fs::create_dir(&docs).unwrap();
    std::fs::write(docs.join("1.txt"), "cheap pills").unwrap();
    std::fs::write(docs.join("2.txt"), "cheap watches").unwrap();

    let mut builder =
        IndexBuilder::token_counter(BuilderConfig::new(dir.path().join("index"), "spam"))
            .unwrap();
    builder
        .rebuild(DirectoryCorpus::open(&docs).unwrap().labeled(true))
        .unwrap();
    assert_eq!(
        builder.lookup("cheap").unwrap(),
        Some(CategoryCounts::new(2, 0))
    );

    let reader = builder.reader().unwrap().unwrap();
    let keys: Vec<String> = reader
        .entries()
        .map(|entry| entry.unwrap().0)
        .collect();
    assert_eq!(keys, vec!["cheap", "pills", "watches"]);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_builder_from_config_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join(derivex_core::CONFIG_FILE_NAME);
    let data_dir = dir.path().join("data");
    std::fs::write(
        &config_path,
        format!(
            "data_dir = {:?}\nname = \"who_has\"\nmax_tuple = 2\n\n[sort]\nchunk_records = 3\n",
            data_dir.display().to_string()
        ),
    )
    .unwrap();

    let config = BuilderConfig::from_file(&config_path).unwrap();
    assert_eq!(config.max_tuple, 2);
    let mut builder = IndexBuilder::who_has(config).unwrap();
    builder
        .rebuild(vec![Ok(Document::new("u", "solar panel cost"))])
        .unwrap();

    assert_eq!(builder.lookup("solar_panel").unwrap(), Some(set(&["u"])));
    let reader = IndexReader::<WhoHas>::open(&data_dir.join("who_has.idx")).unwrap();
    assert_eq!(reader.lookup("panel_cost").unwrap(), Some(set(&["u"])));
}
