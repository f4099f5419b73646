use std::fs::{create_dir_all, write};
use std::path::Path;

use decoder_core::aggregate::CorpusAggregator;
use decoder_core::filter::{FilterConfig, IgnoreList, PathFilter};
use tempfile::tempdir;

fn default_aggregator() -> CorpusAggregator {
    CorpusAggregator::new(PathFilter::new(FilterConfig::default()))
}

fn header(root: &Path, rel: &str) -> String {
    format!("File: {}\n", root.join(rel).display())
}

#[test]
fn test_aggregate_includes_sources_and_skips_logs_and_node_modules() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    write(root.join("a.ts"), "export const a = 1;").unwrap();
    write(root.join("a.log"), "noise").unwrap();
    create_dir_all(root.join("node_modules")).unwrap();
    write(root.join("node_modules/b.ts"), "export const b = 2;").unwrap();

    let out = default_aggregator().aggregate(root).expect("Should aggregate");

    let a_header = header(root, "a.ts");
    assert!(out.corpus.contains(&format!("{a_header}Content:\nexport const a = 1;\n\n")));
    assert!(!out.corpus.contains("a.log"));
    assert!(!out.corpus.contains("noise"));
    assert!(!out.corpus.contains("node_modules"));
    assert!(!out.corpus.contains("export const b"));
    assert_eq!(out.tree, a_header);
    assert_eq!(out.files, 1);
}

#[test]
fn test_aggregate_lists_every_included_file_exactly_once() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    create_dir_all(root.join("src/components")).unwrap();
    create_dir_all(root.join("docs")).unwrap();
    write(root.join("README.md"), "# readme").unwrap();
    write(root.join("src/index.ts"), "index").unwrap();
    write(root.join("src/components/button.tsx"), "button").unwrap();
    write(root.join("docs/guide.md"), "guide").unwrap();
    write(root.join("package-lock.json"), "{}").unwrap();

    let out = default_aggregator().aggregate(root).unwrap();

    for rel in ["README.md", "src/index.ts", "src/components/button.tsx", "docs/guide.md"] {
        let h = header(root, rel);
        assert_eq!(out.corpus.matches(&h).count(), 1, "{rel} should appear once");
        assert_eq!(out.tree.matches(&h).count(), 1, "{rel} should be listed once");
        let header_at = out.corpus.find(&h).unwrap();
        let content_at = out.corpus[header_at..].find("Content:\n").unwrap();
        assert_eq!(content_at, h.len(), "{rel}: content block follows its header");
    }
    assert!(!out.corpus.contains("package-lock.json"));
    assert_eq!(out.files, 4);
}

#[test]
fn test_aggregate_is_deterministic_on_unchanged_tree() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    for dir in ["z", "m/n", "a"] {
        create_dir_all(root.join(dir)).unwrap();
    }
    for (rel, body) in [
        ("z/last.py", "z"),
        ("m/n/mid.go", "m"),
        ("a/first.rb", "a"),
        ("top.yaml", "t"),
    ] {
        write(root.join(rel), body).unwrap();
    }

    let aggregator = default_aggregator();
    let first = aggregator.aggregate(root).unwrap();
    let second = aggregator.aggregate(root).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_excluded_directory_descendants_never_appear_even_when_nested() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    create_dir_all(root.join("packages/web/dist/assets")).unwrap();
    create_dir_all(root.join("packages/web/src")).unwrap();
    write(root.join("packages/web/dist/assets/bundle.js"), "minified").unwrap();
    write(root.join("packages/web/src/app.js"), "app").unwrap();

    let out = default_aggregator().aggregate(root).unwrap();
    assert!(!out.tree.contains("dist"));
    assert!(out.tree.contains("app.js"));
}

#[test]
fn test_gitignore_patterns_prune_matching_entries() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    write(root.join(".gitignore"), "# local\ncoverage/\nsecrets.json\n").unwrap();
    create_dir_all(root.join("coverage")).unwrap();
    write(root.join("coverage/lcov.json"), "{}").unwrap();
    write(root.join("secrets.json"), "{\"key\": 1}").unwrap();
    write(root.join("main.py"), "print(1)").unwrap();

    let config = FilterConfig {
        ignore: IgnoreList::load(root).expect("ignore file readable"),
        ..FilterConfig::default()
    };
    let out = CorpusAggregator::new(PathFilter::new(config))
        .aggregate(root)
        .unwrap();

    assert_eq!(out.tree, header(root, "main.py"));
    assert!(!out.corpus.contains(".gitignore"));
}

#[test]
fn test_gitignore_globs_and_negation_prune_matching_files() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    write(root.join(".gitignore"), "*.txt\n!keep.txt\nconfig/secret*.json\n").unwrap();
    create_dir_all(root.join("config")).unwrap();
    write(root.join("notes.txt"), "private notes").unwrap();
    write(root.join("keep.txt"), "kept").unwrap();
    write(root.join("config/secret-prod.json"), "{\"token\": 1}").unwrap();
    write(root.join("config/app.json"), "{}").unwrap();

    let config = FilterConfig {
        ignore: IgnoreList::load(root).expect("ignore file readable"),
        ..FilterConfig::default()
    };
    let out = CorpusAggregator::new(PathFilter::new(config))
        .aggregate(root)
        .unwrap();

    assert_eq!(
        out.tree,
        format!("{}{}", header(root, "config/app.json"), header(root, "keep.txt"))
    );
    assert!(!out.corpus.contains("private notes"));
    assert!(!out.corpus.contains("token"));
}
