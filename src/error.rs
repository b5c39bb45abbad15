use camino::Utf8PathBuf;
use thiserror::Error;

pub use anyhow::Error as RuntimeError;

#[derive(Debug, Error)]
pub enum KasaneError {
    #[error("Invalid configuration:\n{0}")]
    Config(#[from] ConfigError),

    #[error("Source directory '{0}' does not exist")]
    MissingSource(Utf8PathBuf),

    #[error("Error while running the '{0}' pipeline.\n{1}")]
    Pipeline(&'static str, BuildError),

    #[cfg(feature = "live")]
    #[error("Error while watching for file changes:\n{0}")]
    Watch(#[from] WatchError),

    #[error("Couldn't initialize logging.\n{0}")]
    Logging(RuntimeError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read config file '{path}'.\n{source}")]
    Read {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Couldn't parse config file '{path}'.\n{source}")]
    Parse {
        path: Utf8PathBuf,
        source: toml::de::Error,
    },

    #[error("Path '{0}' must not be empty")]
    EmptyPath(String),

    #[error("Targets '{0}' and '{1}' share the output directory '{2}'")]
    SharedOutput(&'static str, &'static str, Utf8PathBuf),

    #[error("Output directory '{1}' of target '{0}' contains the sources")]
    OutputOverSource(&'static str, Utf8PathBuf),
}

/// Fatal task failure. Stops the pipeline it happens in.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error("Task panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Other(#[from] RuntimeError),
}

impl TaskError {
    pub(crate) fn io(path: impl Into<Utf8PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| TaskError::Io { path, source }
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Cycle detected in task graph at '{0}'")]
    Cycle(String),

    #[error("Task '{0}':\n{1}")]
    Task(String, TaskError),
}

#[cfg(feature = "live")]
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),
}
