//! Watch mode is implemented as a three-part system:
//!
//! 1. **File watcher**: `notify` monitors the source roots recursively and
//!    the directories of single watched files shallowly, debounced so a
//!    burst of saves arrives as one batch.
//! 2. **Event queue**: batches land on a channel. A single dispatcher loop
//!    drains it, so a change that arrives while a rebuild is running waits
//!    for that rebuild and is coalesced with anything else queued meanwhile.
//! 3. **Dispatcher**: each changed path maps to a [`Group`]. Every changed
//!    group runs its own small pipeline, followed by one reload broadcast.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::mpsc::{Sender, channel};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use notify::RecursiveMode;
use notify_debouncer_full::new_debouncer;
use tracing::{error, info, warn};

use crate::blueprint::Pipeline;
use crate::config::Config;
use crate::error::WatchError;
use crate::executor::run_pipeline;
use crate::utils::{as_overhead, glob_in};

/// Independent sets of source files, each with its own rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Group {
    /// Pages and templates.
    Pages,
    /// Stylesheets and the CSS framework config.
    Styles,
    /// Scripts.
    Scripts,
}

/// Compiled watch globs and the minimal set of directories to observe.
#[derive(Debug)]
pub struct WatchGroups {
    patterns: Vec<(Group, Pattern)>,
    roots: Vec<(Utf8PathBuf, RecursiveMode)>,
}

impl WatchGroups {
    pub fn new(config: &Config) -> Self {
        let src = &config.paths.src;
        let pages = config.resolve(&src.pages);
        let templates = config.resolve(&src.templates);
        let css = config.resolve(&src.css);
        let js = config.resolve(&src.js);

        Self::from_globs([
            (Group::Pages, glob_in(&pages, "**/*.html")),
            (Group::Pages, glob_in(&templates, "**/*.html")),
            (Group::Pages, glob_in(&templates, "**/*.njk")),
            (Group::Styles, config.resolve(&config.options.tailwind).into_string()),
            (Group::Styles, glob_in(&css, "**/*")),
            (Group::Scripts, glob_in(&js, "**/*.js")),
        ])
    }

    /// Globs whose static root does not exist are skipped with a warning.
    pub fn from_globs(globs: impl IntoIterator<Item = (Group, String)>) -> Self {
        let mut patterns = Vec::new();
        let mut recursive = HashSet::new();
        let mut shallow = BTreeSet::new();

        for (group, glob) in globs {
            match resolve_watch_path(&glob) {
                Ok((root, RecursiveMode::Recursive, pattern)) => {
                    recursive.insert(root);
                    patterns.push((group, pattern));
                }
                Ok((root, _, pattern)) => {
                    shallow.insert(root);
                    patterns.push((group, pattern));
                }
                Err(e) => warn!("not watching {glob}: {e}"),
            }
        }

        let recursive = collapse_watch_paths(recursive);
        let shallow: Vec<_> = shallow
            .into_iter()
            .filter(|dir| !recursive.iter().any(|root| dir.starts_with(root)))
            .collect();

        let roots = recursive
            .into_iter()
            .map(|root| (root, RecursiveMode::Recursive))
            .chain(shallow.into_iter().map(|dir| (dir, RecursiveMode::NonRecursive)))
            .collect();

        Self { patterns, roots }
    }

    /// Directories to observe and whether their subdirectories are included.
    pub fn roots(&self) -> &[(Utf8PathBuf, RecursiveMode)] {
        &self.roots
    }

    /// Groups touched by any of `paths`.
    pub fn classify<P: AsRef<Path>>(&self, paths: &[P]) -> BTreeSet<Group> {
        let mut groups = BTreeSet::new();

        for path in paths {
            for (group, pattern) in &self.patterns {
                if pattern.matches_path(path.as_ref()) {
                    groups.insert(*group);
                }
            }
        }

        groups
    }
}

/// Runs the rebuild of each changed group and signals a reload after each.
pub struct Dispatcher {
    pipelines: BTreeMap<Group, Pipeline>,
    reload: Sender<()>,
}

impl Dispatcher {
    pub fn new(reload: Sender<()>) -> Self {
        Self {
            pipelines: BTreeMap::new(),
            reload,
        }
    }

    pub fn on(mut self, group: Group, pipeline: Pipeline) -> Self {
        self.pipelines.insert(group, pipeline);
        self
    }

    /// Runs the pipelines of `groups` one after another. Returns the number
    /// of runs that finished; a fatal error is logged and skips the reload
    /// for that run only.
    pub fn dispatch(&self, groups: &BTreeSet<Group>) -> usize {
        let mut finished = 0;

        for group in groups {
            let Some(pipeline) = self.pipelines.get(group) else {
                continue;
            };

            let s = std::time::Instant::now();
            info!("{group:?} changed, rebuilding...");

            match run_pipeline(pipeline) {
                Ok(diagnostics) => {
                    info!(
                        "rebuilt {} files, {} failed {}",
                        diagnostics.written(),
                        diagnostics.failed(),
                        as_overhead(s)
                    );
                    finished += 1;
                    if self.reload.send(()).is_err() {
                        warn!("reload server is gone");
                    }
                }
                Err(e) => error!("rebuild failed:\n{e}"),
            }
        }

        finished
    }
}

/// Observes `groups` and dispatches rebuilds until the watcher goes away.
pub fn watch(groups: &WatchGroups, dispatcher: &Dispatcher) -> Result<(), WatchError> {
    let (tx, rx) = channel();
    let mut debouncer = new_debouncer(Duration::from_millis(250), None, tx)?;

    for (path, mode) in groups.roots() {
        info!("watching {path}");
        debouncer.watch(path, *mode)?;
    }

    info!("now watching for changes...");

    while let Ok(first) = rx.recv() {
        let mut changed = BTreeSet::new();

        for result in std::iter::once(first).chain(rx.try_iter()) {
            match result {
                Ok(events) => {
                    for de in events {
                        changed.extend(groups.classify(&de.event.paths));
                    }
                }
                Err(errors) => {
                    for e in errors {
                        error!("watch error: {e:?}");
                    }
                }
            }
        }

        if !changed.is_empty() {
            dispatcher.dispatch(&changed);
            info!("watching for changes...");
        }
    }

    Ok(())
}

/// Splits a glob string into a canonicalized static root path with its
/// watch mode (for watching) and a compiled absolute Pattern (for matching).
pub fn resolve_watch_path(
    glob_str: impl AsRef<str>,
) -> Result<(Utf8PathBuf, RecursiveMode, Pattern), WatchError> {
    let path = Utf8Path::new(glob_str.as_ref());

    // Split path into static root and dynamic suffix (containing wildcards)
    let components: Vec<_> = path.components().collect();
    let split_idx = components
        .iter()
        .position(|c| c.as_str().contains(['*', '?', '[']))
        .unwrap_or(components.len());

    let root_part: Utf8PathBuf = components.iter().take(split_idx).collect();
    let suffix_part: Utf8PathBuf = components.iter().skip(split_idx).collect();

    // The static root must exist on disk
    let absolute_root = root_part.canonicalize_utf8()?;

    // A concrete file is matched exactly but its parent is watched, without
    // descending, so atomic writes are caught.
    let (watch_root, mode, match_pattern) =
        if suffix_part.as_str().is_empty() && absolute_root.is_file() {
            let parent = absolute_root
                .parent()
                .unwrap_or(&absolute_root)
                .to_path_buf();
            let pattern = Pattern::escape(absolute_root.as_str());
            (parent, RecursiveMode::NonRecursive, pattern)
        } else {
            let pattern = glob_in(&absolute_root, suffix_part.as_str());
            (absolute_root, RecursiveMode::Recursive, pattern)
        };

    let pattern = Pattern::new(match_pattern.trim_end_matches('/'))?;

    Ok((watch_root, mode, pattern))
}

/// Reduces a set of paths to the minimal set of watch roots.
///
/// If we watch `/a` and `/a/b`, we only need to watch `/a` because
/// the watcher is recursive. This function sorts the paths and filters
/// out any path that is a subdirectory of a previously accepted path.
fn collapse_watch_paths(paths: HashSet<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    let mut paths: Vec<_> = paths.into_iter().collect();
    paths.sort();

    let mut filtered = Vec::new();
    for path in paths {
        if let Some(last) = filtered.last()
            && path.starts_with(last)
        {
            continue;
        }
        filtered.push(path);
    }

    filtered
}
