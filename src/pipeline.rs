//! The named pipelines and their entry points.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::blueprint::{Pipeline, Step, parallel, series, task};
use crate::config::{Config, Target};
use crate::core::Environment;
use crate::error::KasaneError;
use crate::executor::{Diagnostics, run_pipeline};
use crate::task::{BundleScripts, Clean, CompileStyles, RenderPages, ReportCompletion};
use crate::utils::as_overhead;

/// A pipeline that can be invoked from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Development,
    Build,
    Docs,
}

impl Entry {
    pub fn target(self) -> Target {
        match self {
            Entry::Development => Target::Development,
            Entry::Build => Target::Build,
            Entry::Docs => Target::Docs,
        }
    }

    pub fn steps(self, env: &Environment) -> Step {
        match self {
            Entry::Development => development(env),
            Entry::Build | Entry::Docs => production(env),
        }
    }
}

/// Clean, then styles and scripts side by side, then pages, then the preview
/// server when it is compiled in.
pub fn development(env: &Environment) -> Step {
    #[allow(unused_mut)]
    let mut steps = vec![
        task(Clean::new(env)),
        parallel([
            task(CompileStyles::new(env)),
            task(BundleScripts::new(env)),
        ]),
        task(RenderPages::new(env)),
    ];

    #[cfg(feature = "server")]
    steps.push(task(crate::task::StartPreview::new(env)));

    series(steps)
}

/// Clean, then scripts and styles side by side, then pages, then the
/// completion report.
pub fn production(env: &Environment) -> Step {
    series([
        task(Clean::new(env)),
        parallel([
            task(BundleScripts::new(env)),
            task(CompileStyles::new(env)),
        ]),
        task(RenderPages::new(env)),
        task(ReportCompletion::new(env)),
    ])
}

/// Runs `entry` once to completion.
///
/// For [`Entry::Development`] this includes starting the preview server but
/// not watching; see [`serve`] for that.
pub fn run(config: Arc<Config>, entry: Entry) -> Result<Diagnostics, KasaneError> {
    let env = Environment::new(config, entry.target());
    execute(&env, entry.steps(&env))
}

fn execute(env: &Environment, step: Step) -> Result<Diagnostics, KasaneError> {
    preflight(&env.config)?;

    let name = env.target.name();
    let pipeline = Pipeline::compile(step);
    debug!("{name} pipeline:\n{pipeline}");

    let s = Instant::now();
    let diagnostics = run_pipeline(&pipeline).map_err(|e| KasaneError::Pipeline(name, e))?;
    debug!("{}", diagnostics.render_mermaid(&pipeline));

    info!(
        "{name} pipeline finished: {} files written, {} failed {}",
        diagnostics.written(),
        diagnostics.failed(),
        as_overhead(s)
    );

    Ok(diagnostics)
}

/// A missing source root is fatal before anything is touched.
fn preflight(config: &Config) -> Result<(), KasaneError> {
    let src = config.resolve(&config.paths.src.base);
    if !src.is_dir() {
        return Err(KasaneError::MissingSource(src));
    }
    Ok(())
}

/// Runs the development pipeline with live reload, then rebuilds on change
/// for the rest of the process lifetime.
#[cfg(feature = "live")]
pub fn serve(config: Arc<Config>) -> Result<(), KasaneError> {
    use crate::error::WatchError;
    use crate::runner::reload;
    use crate::runner::watch::{Dispatcher, Group, WatchGroups, watch};

    preflight(&config)?;

    let (tcp, port) = reload::reserve_port().map_err(WatchError::from)?;
    let env = Environment::new(config.clone(), Target::Development).with_port(port);
    let tx_reload = reload::start(tcp);

    info!("running initial build...");
    execute(&env, development(&env))?;

    let groups = WatchGroups::new(&config);
    let dispatcher = Dispatcher::new(tx_reload)
        .on(Group::Pages, Pipeline::compile(task(RenderPages::new(&env))))
        .on(
            Group::Styles,
            Pipeline::compile(task(CompileStyles::new(&env))),
        )
        .on(
            Group::Scripts,
            Pipeline::compile(task(BundleScripts::new(&env))),
        );

    watch(&groups, &dispatcher)?;
    Ok(())
}
