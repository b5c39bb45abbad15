//! Task primitives.
//!
//! Every primitive is built from an [`Environment`] and owns nothing but the
//! resolved paths it reads and writes. Running a task twice with unchanged
//! inputs rewrites identical bytes.

mod clean;
mod pages;
#[cfg(feature = "server")]
mod preview;
mod report;
mod scripts;
mod styles;

use std::borrow::Cow;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

pub use clean::Clean;
pub use pages::{PageError, RenderPages};
#[cfg(feature = "server")]
pub use preview::StartPreview;
pub use report::ReportCompletion;
pub use scripts::{BundleScripts, ScriptError};
pub use styles::{CompileStyles, StyleError};

use crate::error::TaskError;

/// A named, side-effecting operation over a target's paths.
///
/// Per-file problems (a broken stylesheet, a template that fails to render)
/// are logged and counted in the returned [`Report`]. An `Err` means the task
/// could not do its job at all and the pipeline must stop.
pub trait Task: Send + Sync {
    fn name(&self) -> Cow<'static, str>;

    fn run(&self) -> Result<Report, TaskError>;
}

/// What a finished task did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Files written by the task.
    pub written: Vec<Utf8PathBuf>,
    /// Number of inputs skipped because of a per-file error.
    pub failed: usize,
}

impl Report {
    pub(crate) fn wrote(&mut self, path: Utf8PathBuf) {
        self.written.push(path);
    }

    pub(crate) fn fail(&mut self) {
        self.failed += 1;
    }
}

/// Writes `data` to `path`, creating parent directories.
pub(crate) fn write_output(path: &Utf8Path, data: impl AsRef<[u8]>) -> Result<(), TaskError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(TaskError::io(dir))?;
    }

    fs::write(path, data).map_err(TaskError::io(path))
}

/// Lists files matching `pattern` in sorted order.
pub(crate) fn list_files(pattern: &str) -> Result<Vec<Utf8PathBuf>, TaskError> {
    let mut files = Vec::new();

    for entry in glob::glob(pattern)? {
        let path = Utf8PathBuf::try_from(entry?)?;
        if path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
