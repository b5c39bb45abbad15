use std::borrow::Cow;
use std::fs;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use minijinja::context;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::core::Environment;
use crate::error::TaskError;
use crate::html::{self, Assets, FormatError, IncludeError};
use crate::task::{Report, Task, list_files, write_output};
use crate::utils::{as_overhead, glob_in, relative_href};

/// Errors that can occur while turning one source page into its output.
/// Everything except [`PageError::Output`] only skips the page.
#[derive(Debug, Error)]
pub enum PageError {
    /// The template engine rejected the page.
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// An `@@include` directive could not be expanded.
    #[error(transparent)]
    Include(#[from] IncludeError),

    /// The rendered page is not well-formed enough to format.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Reading the page or writing its output failed. This one is fatal.
    #[error(transparent)]
    Output(#[from] TaskError),
}

/// Renders every source page into the target base.
///
/// A page passes through the template engine, asset injection, include
/// expansion, URL prefixing (production only), live reload script insertion
/// (development with a reload server only) and finally whitespace
/// minification followed by formatting.
pub struct RenderPages {
    target: &'static str,
    production: bool,
    pages: Utf8PathBuf,
    templates: Utf8PathBuf,
    output: Utf8PathBuf,
    css: Utf8PathBuf,
    js: Utf8PathBuf,
    url_prefix: String,
    refresh: Option<String>,
}

impl RenderPages {
    pub fn new(env: &Environment) -> Self {
        let config = &env.config;
        let src = &config.paths.src;
        let paths = env.paths();

        Self {
            target: env.target.name(),
            production: env.target.is_production(),
            pages: config.resolve(&src.pages),
            templates: config.resolve(&src.templates),
            output: env.output_root(),
            css: config.resolve(&paths.css),
            js: config.resolve(&paths.js),
            url_prefix: paths.url_prefix.clone(),
            refresh: env.get_refresh_script(),
        }
    }

    /// Built bundles, relative to the output root.
    fn bundles(&self) -> Result<(Vec<Utf8PathBuf>, Vec<Utf8PathBuf>), TaskError> {
        let strip = |files: Vec<Utf8PathBuf>| -> Vec<Utf8PathBuf> {
            files
                .into_iter()
                .map(|file| match file.strip_prefix(&self.output) {
                    Ok(rel) => rel.to_path_buf(),
                    Err(_) => file,
                })
                .collect()
        };

        let css = strip(list_files(&glob_in(&self.css, "**/*.css"))?);
        let js = strip(list_files(&glob_in(&self.js, "**/*.js"))?);

        Ok((css, js))
    }

    fn render(
        &self,
        engine: &minijinja::Environment<'_>,
        path: &Utf8Path,
        rel: &Utf8Path,
        assets: &Assets,
    ) -> Result<String, PageError> {
        let source = fs::read_to_string(path).map_err(TaskError::io(path))?;

        let html = engine.render_named_str(
            rel.as_str(),
            &source,
            context! {
                target => self.target,
                url_prefix => &self.url_prefix,
            },
        )?;

        let html = html::inject(&html, assets, self.production);
        let mut html = html::expand_includes(&html, &self.templates)?;

        if self.production {
            html = html::prefix_urls(&html, &self.url_prefix);
        }

        if let Some(script) = &self.refresh {
            html = html::insert_script(&html, script);
        }

        Ok(html::format(&html::minify(&html))?)
    }
}

impl Task for RenderPages {
    fn name(&self) -> Cow<'static, str> {
        format!("pages:{}", self.target).into()
    }

    fn run(&self) -> Result<Report, TaskError> {
        let s = Instant::now();
        let mut report = Report::default();

        let pages = list_files(&glob_in(&self.pages, "**/*.html"))?;
        if pages.is_empty() {
            warn!("no pages found in {}", self.pages);
            return Ok(report);
        }

        let mut engine = minijinja::Environment::new();
        engine.set_loader(minijinja::path_loader(&self.templates));

        let (css, js) = self.bundles()?;

        for path in &pages {
            // list_files only yields paths under the pages directory
            let Ok(rel) = path.strip_prefix(&self.pages) else {
                continue;
            };

            let assets = Assets {
                css: css.iter().map(|to| href(rel, to)).collect(),
                js: js.iter().map(|to| href(rel, to)).collect(),
            };

            match self.render(&engine, path, rel, &assets) {
                Ok(html) => {
                    let out = self.output.join(rel);
                    write_output(&out, html)?;
                    report.wrote(out);
                }
                Err(PageError::Output(e)) => return Err(e),
                Err(e) => {
                    error!(file = %path, "{e}");
                    report.fail();
                }
            }
        }

        info!(
            "rendered {} of {} pages {}",
            report.written.len(),
            pages.len(),
            as_overhead(s)
        );

        Ok(report)
    }
}

/// Bundles outside the output root keep their absolute path.
fn href(page: &Utf8Path, to: &Utf8Path) -> String {
    if to.is_absolute() {
        to.to_string()
    } else {
        relative_href(page, to)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{Config, Target};

    fn site() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        fs::create_dir_all(root.join("src/templates/partials")).unwrap();
        fs::create_dir_all(root.join("src/pages/pages")).unwrap();
        fs::write(
            root.join("src/templates/base.html"),
            "<html><head><!-- inject:css --><!-- endinject --></head><body>{% block body %}{% endblock %}</body></html>",
        )
        .unwrap();
        fs::write(root.join("src/templates/partials/nav.html"), "<nav>@@title</nav>").unwrap();
        fs::write(
            root.join("src/pages/index.html"),
            r#"{% extends "base.html" %}{% block body %}@@include('partials/nav.html', {"title": "Home"})<a href="/pages/about.html">{{ target }}</a>{% endblock %}"#,
        )
        .unwrap();
        fs::write(
            root.join("src/pages/pages/about.html"),
            r#"{% extends "base.html" %}{% block body %}<p>About</p>{% endblock %}"#,
        )
        .unwrap();

        (dir, root)
    }

    fn squash(html: &str) -> String {
        html.split_whitespace().collect()
    }

    fn render(env: Environment) -> Report {
        RenderPages::new(&env).run().unwrap()
    }

    #[test]
    fn test_render_mirrors_source_tree() {
        let (_dir, root) = site();
        let config = Arc::new(Config::default().with_root(&root));
        fs::create_dir_all(root.join(".dev/assets/css")).unwrap();
        fs::write(root.join(".dev/assets/css/style.css"), "p{}").unwrap();

        let report = render(Environment::new(config, Target::Development));
        assert_eq!(report.failed, 0);
        assert_eq!(
            report.written,
            vec![root.join(".dev/index.html"), root.join(".dev/pages/about.html")]
        );

        let index = fs::read_to_string(root.join(".dev/index.html")).unwrap();
        assert!(squash(&index).contains("<nav>Home</nav>"));
        assert!(index.contains("/pages/about.html"));
        assert!(index.contains(">dev</a>"));
        assert!(index.contains("<!-- inject:css -->"));
        assert!(index.contains("stylesheet"));
        assert!(index.contains("assets/css/style.css"));
        assert!(index.ends_with('\n'));

        let about = fs::read_to_string(root.join(".dev/pages/about.html")).unwrap();
        assert!(about.contains("../assets/css/style.css"));
    }

    #[test]
    fn test_production_prefixes_and_drops_markers() {
        let (_dir, root) = site();
        let mut config = Config::default().with_root(&root);
        config.paths.docs.url_prefix = "/docs/".into();

        let report = render(Environment::new(Arc::new(config), Target::Docs));
        assert_eq!(report.failed, 0);

        let index = fs::read_to_string(root.join("docs/index.html")).unwrap();
        assert!(index.contains("/docs/pages/about.html"));
        assert!(index.contains(">docs</a>"));
        assert!(!index.contains("inject"));
    }

    #[test]
    fn test_refresh_script_in_development() {
        let (_dir, root) = site();
        let config = Arc::new(Config::default().with_root(&root));

        render(Environment::new(config, Target::Development).with_port(4242));

        let index = fs::read_to_string(root.join(".dev/index.html")).unwrap();
        assert!(index.contains("ws://localhost:4242"));
    }

    #[test]
    fn test_broken_page_is_counted_and_skipped() {
        let (_dir, root) = site();
        fs::write(root.join("src/pages/broken.html"), "{% if %}").unwrap();
        let config = Arc::new(Config::default().with_root(&root));

        let report = render(Environment::new(config, Target::Build));
        assert_eq!(report.failed, 1);
        assert_eq!(report.written.len(), 2);
        assert!(!root.join("build/broken.html").exists());
    }
}
