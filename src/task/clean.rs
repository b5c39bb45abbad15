use std::borrow::Cow;
use std::fs;
use std::io::ErrorKind;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::core::Environment;
use crate::error::TaskError;
use crate::task::{Report, Task};
use crate::utils::as_overhead;

/// Recursively deletes the target's output root.
pub struct Clean {
    target: &'static str,
    root: Utf8PathBuf,
}

impl Clean {
    pub fn new(env: &Environment) -> Self {
        Self {
            target: env.target.name(),
            root: env.output_root(),
        }
    }
}

impl Task for Clean {
    fn name(&self) -> Cow<'static, str> {
        format!("clean:{}", self.target).into()
    }

    fn run(&self) -> Result<Report, TaskError> {
        let s = Instant::now();
        remove_tree(&self.root)?;
        info!("cleaned {} for a fresh start {}", self.root, as_overhead(s));
        Ok(Report::default())
    }
}

/// Removes `root` if it exists.
///
/// The tree is first renamed to a sibling tombstone so the live path goes
/// away in one step, then the tombstone is deleted. If the rename is not
/// possible the tree is deleted in place.
pub(crate) fn remove_tree(root: &Utf8Path) -> Result<(), TaskError> {
    match fs::symlink_metadata(root) {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(TaskError::io(root)(e)),
    }

    let tombstone = tombstone_for(root);
    let victim = match fs::rename(root, &tombstone) {
        Ok(()) => tombstone,
        Err(_) => root.to_path_buf(),
    };

    let result = if victim.is_dir() {
        fs::remove_dir_all(&victim)
    } else {
        fs::remove_file(&victim)
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TaskError::io(victim)(e)),
    }
}

fn tombstone_for(root: &Utf8Path) -> Utf8PathBuf {
    let name = root.file_name().unwrap_or("out");
    let name = format!(".{}.trash-{}", name.trim_start_matches('.'), std::process::id());

    match root.parent() {
        Some(parent) => parent.join(name),
        None => Utf8PathBuf::from(name),
    }
}
