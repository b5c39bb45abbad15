use std::borrow::Cow;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::core::Environment;
use crate::error::TaskError;
use crate::purge;
use crate::task::{Report, Task, write_output};
use crate::utils::as_overhead;

/// Entry stylesheet inside the source css directory.
const ENTRY: &str = "main.scss";
/// Bundle written to the target css directory.
pub(crate) const OUTPUT: &str = "style.css";

/// Errors that can occur when compiling the stylesheet. These are reported per
/// file and never stop the pipeline.
#[derive(Debug, Error)]
pub enum StyleError {
    /// The entry stylesheet does not exist.
    #[error("Entry stylesheet '{0}' not found")]
    MissingEntry(Utf8PathBuf),

    /// A Sass compilation error occurred.
    #[error("Sass compilation error: {0}")]
    Sass(#[from] Box<grass::Error>),

    /// The CSS framework CLI exited with an error.
    #[error("CSS framework failed: {0}")]
    Framework(String),

    /// The compiled CSS could not be parsed, purged or printed.
    #[error("CSS optimization failed: {0}")]
    Optimize(String),

    /// An I/O error occurred while running the framework CLI.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The compiled CSS could not be handed over to the framework CLI.
    #[error("Couldn't stage CSS for the framework: {0}")]
    Stage(std::io::Error),

    /// Reading content or staging output failed. This one is fatal.
    #[error(transparent)]
    Output(#[from] TaskError),
}

/// Compiles the entry stylesheet into `style.css` for a target.
///
/// SCSS goes through `grass` and utility classes are generated by the
/// framework CLI when both its config file and binary are present. Every
/// target gets vendor prefixes; production targets are also purged against
/// the content-scan globs and minified.
pub struct CompileStyles {
    target: &'static str,
    production: bool,
    entry: Utf8PathBuf,
    load_path: Utf8PathBuf,
    output: Utf8PathBuf,
    framework_bin: String,
    framework_config: Utf8PathBuf,
    content: Vec<String>,
}

impl CompileStyles {
    pub fn new(env: &Environment) -> Self {
        let config = &env.config;
        let src = &config.paths.src;

        Self {
            target: env.target.name(),
            production: env.target.is_production(),
            entry: config.resolve(src.css.join(ENTRY)),
            load_path: config.resolve(&src.css),
            output: config.resolve(env.paths().css.join(OUTPUT)),
            framework_bin: config.options.tailwind_bin.clone(),
            framework_config: config.resolve(&config.options.tailwind),
            content: config
                .purge
                .content
                .iter()
                .map(|glob| config.resolve(glob).into_string())
                .collect(),
        }
    }

    fn compile(&self) -> Result<String, StyleError> {
        if !self.entry.is_file() {
            return Err(StyleError::MissingEntry(self.entry.clone()));
        }

        let options = grass::Options::default().load_path(&self.load_path);
        let css = grass::from_path(&self.entry, &options)?;

        Ok(css)
    }

    /// Runs the framework CLI over the compiled CSS, staged in a temporary
    /// file that is gone once this returns.
    fn generate_utilities(&self, css: String) -> Result<String, StyleError> {
        if !self.framework_config.is_file() {
            return Ok(css);
        }

        let mut staged = tempfile::Builder::new()
            .prefix("kasane-")
            .suffix(".css")
            .tempfile()
            .map_err(StyleError::Stage)?;
        staged
            .write_all(css.as_bytes())
            .map_err(StyleError::Stage)?;

        match run_framework(&self.framework_bin, &self.framework_config, staged.path()) {
            Err(StyleError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    "'{}' not found, skipping utility generation",
                    self.framework_bin
                );
                Ok(css)
            }
            result => result,
        }
    }

    fn build(&self) -> Result<String, StyleError> {
        let css = self.compile()?;
        let css = self.generate_utilities(css)?;

        let candidates = if self.production {
            Some(purge::scan_content(&self.content)?)
        } else {
            None
        };

        purge::optimize(
            &css,
            Utf8Path::new(OUTPUT),
            candidates.as_ref(),
            self.production,
        )
        .map_err(StyleError::Optimize)
    }
}

impl Task for CompileStyles {
    fn name(&self) -> Cow<'static, str> {
        format!("styles:{}", self.target).into()
    }

    fn run(&self) -> Result<Report, TaskError> {
        let s = Instant::now();
        let mut report = Report::default();

        match self.build() {
            Ok(css) => {
                write_output(&self.output, css)?;
                info!("compiled {} {}", self.output, as_overhead(s));
                report.wrote(self.output.clone());
            }
            Err(StyleError::Output(e)) => return Err(e),
            Err(e) => {
                error!(file = %self.entry, "{e}");
                report.fail();
            }
        }

        Ok(report)
    }
}

fn run_framework(bin: &str, config: &Utf8Path, input: &Path) -> Result<String, StyleError> {
    let output = Command::new(bin)
        .arg("--config")
        .arg(config.as_str())
        .arg("--input")
        .arg(input)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if !output.status.success() {
        return Err(StyleError::Framework(
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }

    String::from_utf8(output.stdout).map_err(|e| StyleError::Framework(e.to_string()))
}
