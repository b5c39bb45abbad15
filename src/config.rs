//! The configuration store.
//!
//! A [`Config`] names every directory role the pipelines touch: one set of
//! source directories and one [`PathSet`] per [`Target`]. It is loaded once at
//! process start, validated, and then shared read-only as `Arc<Config>`.
//!
//! The defaults mirror the conventional project layout, so a project without a
//! `kasane.toml` builds out of the box:
//!
//! ```toml
//! [options]
//! tailwind = "./tailwind.config.js"
//! port = 5000
//!
//! [paths.src]
//! base = "./src"
//! css = "./src/assets/css"
//! js = "./src/assets/js"
//! pages = "./src/pages"
//! templates = "./src/templates"
//!
//! [paths.docs]
//! base = "./docs"
//! css = "./docs/assets/css"
//! js = "./docs/assets/js"
//! pages = "./docs/pages"
//! url_prefix = "/my-project/"
//! ```

use std::fmt::Display;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::utils::normalize_path;

/// Name of the config file picked up from the working directory.
pub const CONFIG_FILE: &str = "kasane.toml";

const DEV_BASE: &str = "./.dev";
const BUILD_BASE: &str = "./build";
const DOCS_BASE: &str = "./docs";

/// One of the closed set of build destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    /// `.dev`, served by the preview server.
    Development,
    /// `build`, the production export.
    Build,
    /// `docs`, a production export meant for project pages hosting.
    Docs,
}

impl Target {
    pub const ALL: [Target; 3] = [Target::Development, Target::Build, Target::Docs];

    pub fn name(self) -> &'static str {
        match self {
            Target::Development => "dev",
            Target::Build => "build",
            Target::Docs => "docs",
        }
    }

    /// Production targets purge and minify their output and rewrite URLs.
    pub fn is_production(self) -> bool {
        !matches!(self, Target::Development)
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory every relative path is resolved against.
    #[serde(skip)]
    pub root: Utf8PathBuf,
    pub options: Options,
    pub paths: Paths,
    pub purge: Purge,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// CSS framework config file, passed to the framework CLI.
    pub tailwind: Utf8PathBuf,
    /// Executable used for utility-class generation.
    pub tailwind_bin: String,
    /// Preview server port.
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(from = "PathsFile")]
pub struct Paths {
    pub src: SourcePaths,
    pub dev: PathSet,
    pub build: PathSet,
    pub docs: PathSet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcePaths {
    pub base: Utf8PathBuf,
    pub css: Utf8PathBuf,
    pub js: Utf8PathBuf,
    pub pages: Utf8PathBuf,
    pub templates: Utf8PathBuf,
}

/// The directories owned by a single target.
#[derive(Debug, Clone)]
pub struct PathSet {
    pub base: Utf8PathBuf,
    pub css: Utf8PathBuf,
    pub js: Utf8PathBuf,
    pub pages: Utf8PathBuf,
    pub url_prefix: String,
}

/// `[paths]` as written in the file. Any target key left out is derived
/// from that target's base.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PathsFile {
    src: SourcePaths,
    dev: PathSetFile,
    build: PathSetFile,
    docs: PathSetFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PathSetFile {
    base: Option<Utf8PathBuf>,
    css: Option<Utf8PathBuf>,
    js: Option<Utf8PathBuf>,
    pages: Option<Utf8PathBuf>,
    url_prefix: Option<String>,
}

impl PathSetFile {
    fn or_under(self, base: &str) -> PathSet {
        let base = self.base.unwrap_or_else(|| base.into());
        PathSet {
            css: self.css.unwrap_or_else(|| base.join("assets/css")),
            js: self.js.unwrap_or_else(|| base.join("assets/js")),
            pages: self.pages.unwrap_or_else(|| base.join("pages")),
            url_prefix: self.url_prefix.unwrap_or_else(default_url_prefix),
            base,
        }
    }
}

impl From<PathsFile> for Paths {
    fn from(file: PathsFile) -> Self {
        Self {
            src: file.src,
            dev: file.dev.or_under(DEV_BASE),
            build: file.build.or_under(BUILD_BASE),
            docs: file.docs.or_under(DOCS_BASE),
        }
    }
}

/// Content-scan globs used to decide which CSS selectors survive a
/// production build.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Purge {
    pub content: Vec<String>,
}

fn default_url_prefix() -> String {
    String::from("/")
}

impl Default for Options {
    fn default() -> Self {
        Self {
            tailwind: "./tailwind.config.js".into(),
            tailwind_bin: "tailwindcss".into(),
            port: 5000,
        }
    }
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            base: "./src".into(),
            css: "./src/assets/css".into(),
            js: "./src/assets/js".into(),
            pages: "./src/pages".into(),
            templates: "./src/templates".into(),
        }
    }
}

impl Default for Paths {
    fn default() -> Self {
        PathsFile::default().into()
    }
}

impl Default for Purge {
    fn default() -> Self {
        Self {
            content: vec![
                "./src/templates/**/*.html".into(),
                "./src/pages/**/*.html".into(),
                "./src/assets/**/*.js".into(),
            ],
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: Utf8PathBuf::from("."),
            options: Options::default(),
            paths: Paths::default(),
            purge: Purge::default(),
        }
    }
}

impl Config {
    /// Loads the config from `path`, or from [`CONFIG_FILE`] in the working
    /// directory when no path is given. A missing default file yields the
    /// defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Utf8Path::new(CONFIG_FILE);
                if path.is_file() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;

        let mut config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;

        config.root = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_owned(),
            _ => Utf8PathBuf::from("."),
        };

        Ok(config)
    }

    /// Parses TOML text. The root stays at the working directory.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn with_root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn target(&self, target: Target) -> &PathSet {
        match target {
            Target::Development => &self.paths.dev,
            Target::Build => &self.paths.build,
            Target::Docs => &self.paths.docs,
        }
    }

    /// Resolves a configured path against [`Config::root`].
    pub fn resolve(&self, path: impl AsRef<Utf8Path>) -> Utf8PathBuf {
        normalize_path(&self.root.join(path))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let src = &self.paths.src;
        let roles = [
            ("options.tailwind", self.options.tailwind.as_str()),
            ("options.tailwind_bin", self.options.tailwind_bin.as_str()),
            ("paths.src.base", src.base.as_str()),
            ("paths.src.css", src.css.as_str()),
            ("paths.src.js", src.js.as_str()),
            ("paths.src.pages", src.pages.as_str()),
            ("paths.src.templates", src.templates.as_str()),
        ];

        for (name, value) in roles {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyPath(name.to_string()));
            }
        }

        for target in Target::ALL {
            let set = self.target(target);
            for (role, value) in [
                ("base", &set.base),
                ("css", &set.css),
                ("js", &set.js),
                ("pages", &set.pages),
            ] {
                if value.as_str().trim().is_empty() {
                    return Err(ConfigError::EmptyPath(format!(
                        "paths.{}.{role}",
                        target.name()
                    )));
                }
            }
        }

        // Clean removes a whole base, so no base may contain another one or
        // the sources.
        let sources = self.resolve(&src.base);
        for target in Target::ALL {
            let base = self.resolve(&self.target(target).base);
            if sources.starts_with(&base) {
                return Err(ConfigError::OutputOverSource(target.name(), base));
            }
        }

        for (i, a) in Target::ALL.iter().enumerate() {
            let base = self.resolve(&self.target(*a).base);
            for b in &Target::ALL[i + 1..] {
                let other = self.resolve(&self.target(*b).base);
                if base.starts_with(&other) || other.starts_with(&base) {
                    return Err(ConfigError::SharedOutput(a.name(), b.name(), base));
                }
            }
        }

        Ok(())
    }
}
