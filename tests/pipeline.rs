use std::fs;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use kasane::task::{Clean, Task};
use kasane::{Config, Entry, Environment, KasaneError, Target, pipeline};

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>{{ target }}</title>
  <!-- inject:css -->
  <!-- endinject -->
</head>
<body>
  <a class="used" href="/about.html">About</a>
  <!-- inject:js -->
  <!-- endinject -->
</body>
</html>
"#;

fn project() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

    for sub in [
        "src/pages",
        "src/templates",
        "src/assets/css",
        "src/assets/js",
    ] {
        fs::create_dir_all(root.join(sub)).unwrap();
    }

    fs::write(root.join("src/pages/index.html"), PAGE).unwrap();
    fs::write(
        root.join("src/assets/css/main.scss"),
        ".btn { color: red; }\n.used {\n  color: blue;\n}\n",
    )
    .unwrap();
    fs::write(root.join("src/assets/js/a.js"), "console.log(1)\n").unwrap();
    fs::write(
        root.join("src/assets/js/b.js"),
        "function  greet ( name ) {\n  console.log( name );\n}\n",
    )
    .unwrap();

    (dir, root)
}

fn config(root: &Utf8Path) -> Config {
    let mut config = Config::default().with_root(root);
    config.options.port = 0;
    config
}

fn read(path: Utf8PathBuf) -> String {
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("{path}: {e}"))
}

#[test]
fn test_production_build() {
    let (_dir, root) = project();

    let diagnostics = pipeline::run(Arc::new(config(&root)), Entry::Build).unwrap();
    assert_eq!(diagnostics.failed(), 0);
    assert_eq!(diagnostics.written(), 3);

    let css = read(root.join("build/assets/css/style.css"));
    assert!(!css.contains(".btn"));
    assert!(css.contains(".used{"));
    assert!(!css.contains('\n'));

    let js = read(root.join("build/assets/js/scripts.js"));
    assert!(js.contains("console.log(1)"));
    assert!(js.contains("greet"));
    assert!(!js.contains("  "));
    assert!(!js.contains("( "));

    let html = read(root.join("build/index.html"));
    assert!(html.contains("assets/css/style.css"));
    assert!(html.contains("assets/js/scripts.js"));
    assert!(html.contains("build"));
    assert!(!html.contains("inject"));
    assert!(html.ends_with("</html>\n"));
}

#[test]
fn test_production_build_is_repeatable() {
    let (_dir, root) = project();
    let config = Arc::new(config(&root));
    let files = ["index.html", "assets/css/style.css", "assets/js/scripts.js"];

    pipeline::run(config.clone(), Entry::Build).unwrap();
    let first: Vec<_> = files.iter().map(|f| read(root.join("build").join(f))).collect();

    pipeline::run(config, Entry::Build).unwrap();
    let second: Vec<_> = files.iter().map(|f| read(root.join("build").join(f))).collect();

    assert_eq!(first, second);
}

#[test]
fn test_url_prefix_only_in_production() {
    let (_dir, root) = project();
    let mut config = config(&root);
    config.paths.docs.url_prefix = "/docs/".into();
    let config = Arc::new(config);

    pipeline::run(config.clone(), Entry::Docs).unwrap();
    let docs = read(root.join("docs/index.html"));
    assert!(docs.contains("/docs/about.html"));

    pipeline::run(config, Entry::Development).unwrap();
    let dev = read(root.join(".dev/index.html"));
    assert!(dev.contains("/about.html"));
    assert!(!dev.contains("/docs/"));
}

#[test]
fn test_development_keeps_selectors_and_markers() {
    let (_dir, root) = project();

    pipeline::run(Arc::new(config(&root)), Entry::Development).unwrap();

    let css = read(root.join(".dev/assets/css/style.css"));
    assert!(css.contains(".btn"));

    let html = read(root.join(".dev/index.html"));
    assert!(html.contains("<!-- inject:css -->"));
    assert!(html.contains("assets/css/style.css"));
}

#[test]
fn test_targets_do_not_touch_each_other() {
    let (_dir, root) = project();
    let config = Arc::new(config(&root));

    pipeline::run(config.clone(), Entry::Build).unwrap();
    pipeline::run(config, Entry::Docs).unwrap();

    assert!(root.join("build/index.html").is_file());
    assert!(root.join("docs/index.html").is_file());
    assert!(!root.join(".dev").exists());
}

#[test]
fn test_clean_twice() {
    let (_dir, root) = project();
    let config = Arc::new(config(&root));

    pipeline::run(config.clone(), Entry::Build).unwrap();

    let clean = Clean::new(&Environment::new(config, Target::Build));
    clean.run().unwrap();
    assert!(!root.join("build").exists());

    clean.run().unwrap();
    assert!(!root.join("build").exists());
    assert!(root.join("src/pages/index.html").is_file());
}

#[test]
fn test_missing_source_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

    match pipeline::run(Arc::new(config(&root)), Entry::Build) {
        Err(KasaneError::MissingSource(path)) => assert_eq!(path, root.join("src")),
        other => panic!("unexpected {other:?}"),
    }

    assert!(!root.join("build").exists());
}
