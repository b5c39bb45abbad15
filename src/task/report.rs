use std::borrow::Cow;

use camino::Utf8PathBuf;
use console::style;
use tracing::info;

use crate::core::Environment;
use crate::error::TaskError;
use crate::task::{Report, Task};

/// Final step of a production pipeline.
pub struct ReportCompletion {
    target: &'static str,
    root: Utf8PathBuf,
}

impl ReportCompletion {
    pub fn new(env: &Environment) -> Self {
        Self {
            target: env.target.name(),
            root: env.output_root(),
        }
    }
}

impl Task for ReportCompletion {
    fn name(&self) -> Cow<'static, str> {
        format!("report:{}", self.target).into()
    }

    fn run(&self) -> Result<Report, TaskError> {
        info!(
            "Production {} is complete. Files are located at {}",
            self.target,
            style(&self.root).yellow()
        );
        Ok(Report::default())
    }
}
