use std::sync::Arc;

use camino::Utf8PathBuf;

use crate::config::{Config, PathSet, Target};

/// Immutable per-run state handed to every task constructor.
///
/// One `Environment` exists per pipeline run. It pins the [`Target`] the run
/// writes to, so a task built from it can only ever touch that target's
/// [`PathSet`].
#[derive(Debug, Clone)]
pub struct Environment {
    /// The name of the generator.
    pub generator: &'static str,
    /// The destination of this run.
    pub target: Target,
    /// Live reload WebSocket port, set for development runs with a reload
    /// server attached.
    pub port: Option<u16>,
    /// The configuration store.
    pub config: Arc<Config>,
}

impl Environment {
    pub fn new(config: Arc<Config>, target: Target) -> Self {
        Self {
            generator: "kasane",
            target,
            port: None,
            config,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn paths(&self) -> &PathSet {
        self.config.target(self.target)
    }

    /// Resolved output root of the active target.
    pub fn output_root(&self) -> Utf8PathBuf {
        self.config.resolve(&self.paths().base)
    }

    /// Returns a JavaScript snippet to enable live-reloading.
    ///
    /// The snippet connects to the reload WebSocket and refreshes the page on
    /// any message. `None` outside of development runs.
    pub fn get_refresh_script(&self) -> Option<String> {
        self.port.map(|port| {
            format!(
                r#"
const socket = new WebSocket("ws://localhost:{port}");
socket.addEventListener("message", event => {{
    window.location.reload();
}});
"#
            )
        })
    }
}
