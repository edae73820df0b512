//! End-to-end analyzer scenarios over temporary repositories.

use std::sync::Arc;
use std::time::Duration;

use ctxpack_core::{ChunkType, ManualClock, RepoAnalyzer, SelectionOptions, search_ranked, select};
use ctxpack_test_utils::TestRepo;
use pretty_assertions::assert_eq;

fn analyzer(repo: &TestRepo) -> RepoAnalyzer {
    let config = repo.config();
    RepoAnalyzer::new(&config.analyzer, &config.cache).unwrap()
}

#[test_log::test(tokio::test)]
async fn test_imported_file_outranks_unreferenced_peer() {
    let repo = TestRepo::with_files(&[
        ("index.ts", "import { start } from './core/service';\nstart();\n"),
        ("core/service.ts", "export function start() {}\n"),
        ("utils/helper.ts", "export function help() {}\n"),
    ])
    .await;

    let map = analyzer(&repo).analyze(repo.path()).await.unwrap();
    let service = map.get("core/service.ts").unwrap();
    let helper = map.get("utils/helper.ts").unwrap();

    assert_eq!(map.dependents_of("core/service.ts"), vec!["index.ts"]);
    assert!(map.dependents_of("utils/helper.ts").is_empty());
    assert!(service.importance > helper.importance);
}

#[test_log::test(tokio::test)]
async fn test_connectivity_breaks_equal_base_scores() {
    let repo = TestRepo::with_files(&[
        ("main.ts", "import './src/service';\n"),
        ("src/service.ts", "export const service = 1;\n"),
        ("src/helper.ts", "export const helper = 1;\n"),
    ])
    .await;

    let map = analyzer(&repo).analyze(repo.path()).await.unwrap();
    let service = map.get("src/service.ts").unwrap();
    let helper = map.get("src/helper.ts").unwrap();

    assert_eq!(service.chunk_type, ChunkType::Other);
    assert_eq!(helper.chunk_type, ChunkType::Other);
    assert!((service.importance - helper.importance - 0.2).abs() < 1e-9);
    for chunk in map.chunks.values() {
        assert!((0.0..=1.0).contains(&chunk.importance), "{}", chunk.id);
    }
}

#[test_log::test(tokio::test)]
async fn test_cache_serves_snapshot_until_ttl() {
    let repo = TestRepo::with_files(&[("a.ts", "export const a = 1;\n")]).await;
    let config = repo.config_builder().cache_ttl_secs(30).build();
    let clock = ManualClock::new();
    let analyzer =
        RepoAnalyzer::with_clock(&config.analyzer, &config.cache, Arc::new(clock.clone())).unwrap();

    let first = analyzer.analyze(repo.path()).await.unwrap();
    repo.write("b.ts", "export const b = 2;\n").await;

    clock.advance(Duration::from_secs(29));
    let second = analyzer.analyze(repo.path()).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(second.get("b.ts").is_none());

    clock.advance(Duration::from_secs(1));
    let third = analyzer.analyze(repo.path()).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert!(third.get("b.ts").is_some());

    assert!(analyzer.invalidate(repo.path()).await);
    assert!(analyzer.cache().unwrap().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_failed_analysis_is_not_cached() {
    let repo = TestRepo::new();
    let analyzer = analyzer(&repo);
    let missing = repo.file("nope");

    assert!(analyzer.analyze(&missing).await.is_err());
    assert!(analyzer.cache().unwrap().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_forced_exclusion_on_real_files() {
    let a = "a".repeat(3600);
    let b = "b".repeat(800);
    let repo = TestRepo::with_files(&[("index.ts", a.as_str()), ("src/b.ts", b.as_str())]).await;

    let map = analyzer(&repo).analyze(repo.path()).await.unwrap();
    assert_eq!(map.get("index.ts").unwrap().token_count, 900);
    assert_eq!(map.get("src/b.ts").unwrap().token_count, 200);

    let both = select(&map, &SelectionOptions::default().with_max_tokens(1100));
    assert_eq!(both.chunks.len(), 2);
    assert!(both.excluded.is_empty());

    let one = select(&map, &SelectionOptions::default().with_max_tokens(1099));
    let ids: Vec<&str> = one.chunks.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["index.ts"]);
    assert_eq!(one.excluded, vec!["src/b.ts".to_string()]);
}

#[test_log::test(tokio::test)]
async fn test_selection_is_deterministic_across_analyses() {
    let files: Vec<(String, String)> = (0..30)
        .map(|i| {
            (
                format!("pkg{}/mod{i}.ts", i % 4),
                format!(
                    "import './mod{}';\nexport function f{i}() {{}}\n{}",
                    (i + 4) % 30,
                    "x".repeat(i * 13)
                ),
            )
        })
        .collect();
    let repo = TestRepo::new();
    for (path, content) in &files {
        repo.write(path, content).await;
    }
    let config = repo.config_builder().cache_enabled(false).build();
    let analyzer = RepoAnalyzer::new(&config.analyzer, &config.cache).unwrap();

    let first = analyzer.analyze(repo.path()).await.unwrap();
    let second = analyzer.analyze(repo.path()).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));

    let options = SelectionOptions::default()
        .with_max_tokens(400)
        .with_task("mod1 f2");
    let result = select(&first, &options);
    assert_eq!(result, select(&second, &options));
    assert!(result.total_tokens <= 400);
}

#[test_log::test(tokio::test)]
async fn test_ranked_search_prefers_exact_symbol() {
    let repo = TestRepo::with_files(&[
        ("src/login.ts", "export function authenticate() {}\n"),
        ("src/authenticate-flow.ts", "export const steps = [];\n"),
    ])
    .await;

    let map = analyzer(&repo).analyze(repo.path()).await.unwrap();
    let ranked = search_ranked(&map, "authenticate", &Default::default());

    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].chunk.id, "src/login.ts");
    assert!(ranked[0].score > ranked[1].score);
}

#[test_log::test(tokio::test)]
async fn test_configured_globs_and_limits() {
    let repo = TestRepo::with_files(&[
        ("app/main.py", "from .models import User\n\ndef main():\n    pass\n"),
        ("app/models.py", "class User:\n    pass\n"),
        ("app/generated/schema.py", "class Schema:\n    pass\n"),
        ("app/big.py", "x = 1\n".repeat(200).as_str()),
        ("web/index.ts", "export const ignored = true;\n"),
    ])
    .await;
    let config = repo
        .config_builder()
        .include(&["**/*.py"])
        .exclude(&["**/generated/**"])
        .max_file_size(512)
        .chars_per_token(2.0)
        .analyze_dependencies(false)
        .build();
    let analyzer = RepoAnalyzer::new(&config.analyzer, &config.cache).unwrap();

    let map = analyzer.analyze(repo.path()).await.unwrap();
    let ids: Vec<&str> = map.chunks.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["app/main.py", "app/models.py"]);

    let models = map.get("app/models.py").unwrap();
    assert_eq!(models.token_count, 11);
    assert_eq!(models.symbols, vec!["User"]);
    assert!(map.dependency_graph.is_empty());

    repo.remove("app/models.py").await;
    analyzer.clear_cache();
    let map = analyzer.analyze(repo.path()).await.unwrap();
    assert_eq!(map.len(), 1);
}
