use std::borrow::Cow;
use std::fs;
use std::time::Instant;

use camino::Utf8PathBuf;
use minify_js::{Session, TopLevelMode};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::core::Environment;
use crate::error::TaskError;
use crate::task::{Report, Task, list_files, write_output};
use crate::utils::{as_overhead, glob_in};

/// Bundle written to the target js directory.
pub(crate) const OUTPUT: &str = "scripts.js";

/// Errors that can occur when minifying the bundle.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The bundle is not valid JavaScript.
    #[error("Minification failed: {0}")]
    Minify(String),

    /// The minifier produced bytes that are not UTF-8.
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Concatenates every source script into `scripts.js`, minified for
/// production targets.
pub struct BundleScripts {
    target: &'static str,
    production: bool,
    source: Utf8PathBuf,
    output: Utf8PathBuf,
}

impl BundleScripts {
    pub fn new(env: &Environment) -> Self {
        let config = &env.config;

        Self {
            target: env.target.name(),
            production: env.target.is_production(),
            source: config.resolve(&config.paths.src.js),
            output: config.resolve(env.paths().js.join(OUTPUT)),
        }
    }

    /// Source scripts in sorted listing order.
    fn sources(&self) -> Result<Vec<Utf8PathBuf>, TaskError> {
        list_files(&glob_in(&self.source, "**/*.js"))
    }
}

impl Task for BundleScripts {
    fn name(&self) -> Cow<'static, str> {
        format!("scripts:{}", self.target).into()
    }

    fn run(&self) -> Result<Report, TaskError> {
        let s = Instant::now();
        let mut report = Report::default();

        let sources = self.sources()?;
        if sources.is_empty() {
            warn!("no scripts found in {}", self.source);
            return Ok(report);
        }

        let mut parts = Vec::with_capacity(sources.len());
        for path in &sources {
            parts.push(fs::read_to_string(path).map_err(TaskError::io(path))?);
        }
        let bundle = parts.join("\n");

        let bundle = if self.production {
            match minify(&bundle) {
                Ok(minified) => minified,
                Err(e) => {
                    error!(file = %self.output, "{e}");
                    report.fail();
                    return Ok(report);
                }
            }
        } else {
            bundle
        };

        write_output(&self.output, bundle)?;
        info!(
            "bundled {} scripts into {} {}",
            sources.len(),
            self.output,
            as_overhead(s)
        );
        report.wrote(self.output.clone());

        Ok(report)
    }
}

/// Minifies the bundle as one classic script, so top-level names that other
/// scripts on the page may rely on are kept.
fn minify(code: &str) -> Result<String, ScriptError> {
    let session = Session::new();
    let mut out = Vec::new();

    minify_js::minify(&session, TopLevelMode::Global, code.as_bytes(), &mut out)
        .map_err(|e| ScriptError::Minify(format!("{e:?}")))?;

    Ok(String::from_utf8(out)?)
}
