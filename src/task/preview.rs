use std::borrow::Cow;
use std::net::{SocketAddr, TcpListener};

use anyhow::Context;
use camino::Utf8PathBuf;

use crate::core::Environment;
use crate::error::TaskError;
use crate::runner::http;
use crate::task::{Report, Task};

/// Serves the development output root over HTTP.
///
/// The port is bound while the task runs, so a taken port stops the pipeline.
/// The server itself lives on a detached thread for the rest of the process.
pub struct StartPreview {
    root: Utf8PathBuf,
    port: u16,
}

impl StartPreview {
    pub fn new(env: &Environment) -> Self {
        Self {
            root: env.output_root(),
            port: env.config.options.port,
        }
    }
}

impl Task for StartPreview {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("preview")
    }

    fn run(&self) -> Result<Report, TaskError> {
        let address = SocketAddr::from(([127, 0, 0, 1], self.port));
        let listener = TcpListener::bind(address)
            .with_context(|| format!("Couldn't bind the preview server to {address}"))?;

        let _ = http::start(listener, self.root.clone());
        Ok(Report::default())
    }
}
