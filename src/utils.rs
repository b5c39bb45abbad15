use std::fmt::Display;
use std::time::Instant;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use console::Style;
use indicatif::ProgressStyle;
use indicatif::style::TemplateError;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const ANSI_BLUE: Style = Style::new().blue();

/// Installs the global subscriber: `RUST_LOG`-style filtering (default
/// `info`) with log lines routed through the progress bars.
pub fn init_logging() -> anyhow::Result<()> {
    let indicatif = IndicatifLayer::new();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(indicatif.get_stderr_writer()),
        )
        .with(indicatif)
        .try_init()?;

    Ok(())
}

pub(crate) fn get_style_main() -> Result<ProgressStyle, TemplateError> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
        .progress_chars("=>-"))
}

pub(crate) fn get_style_task() -> Result<ProgressStyle, TemplateError> {
    ProgressStyle::default_spinner().template("{spinner:.blue} {msg}")
}

pub(crate) fn as_overhead(s: Instant) -> impl Display {
    let f = format!("(+{}ms)", s.elapsed().as_millis());
    ANSI_BLUE.apply_to(f)
}

/// Normalize a path, removing things like `.` and `..`.
///
/// CAUTION: This does not resolve symlinks (unlike [`std::fs::canonicalize`]).
///
/// Adapted from
/// <https://github.com/rust-lang/cargo/blob/f7acf448fc127df9a77c52cc2bba027790ac4931/crates/cargo-util/src/paths.rs#L76-L116>
pub(crate) fn normalize_path(path: &Utf8Path) -> Utf8PathBuf {
    let mut components = path.components().peekable();
    let mut ret = if let Some(c @ Utf8Component::Prefix(..)) = components.peek().cloned() {
        components.next();
        Utf8PathBuf::from(c.as_str())
    } else {
        Utf8PathBuf::new()
    };

    for component in components {
        match component {
            Utf8Component::Prefix(..) => unreachable!(),
            Utf8Component::RootDir => {
                ret.push(Utf8Component::RootDir);
            }
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                if ret.ends_with(Utf8Component::ParentDir) {
                    ret.push(Utf8Component::ParentDir);
                } else {
                    let popped = ret.pop();
                    if !popped && !ret.has_root() {
                        ret.push(Utf8Component::ParentDir);
                    }
                }
            }
            Utf8Component::Normal(c) => {
                ret.push(c);
            }
        }
    }

    if ret.as_str().is_empty() {
        ret.push(".");
    }

    ret
}

/// Relative href from the directory holding `from` to the file `to`. Both
/// paths must be relative to the same root.
pub(crate) fn relative_href(from: &Utf8Path, to: &Utf8Path) -> String {
    let from: Vec<_> = from
        .parent()
        .map(|dir| dir.components().collect())
        .unwrap_or_default();
    let to: Vec<_> = to.components().collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = vec![".."; from.len() - common];
    parts.extend(to[common..].iter().map(|c| c.as_str()));
    parts.join("/")
}

/// Escapes a directory so it can prefix a glob pattern.
pub(crate) fn glob_in(dir: &Utf8Path, pattern: &str) -> String {
    format!("{}/{}", glob::Pattern::escape(dir.as_str()), pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Utf8Path::new("./src/./a")), "src/a");
        assert_eq!(normalize_path(Utf8Path::new("/a/b/../c")), "/a/c");
        assert_eq!(normalize_path(Utf8Path::new("../a")), "../a");
        assert_eq!(normalize_path(Utf8Path::new("./.")), ".");
        assert_eq!(normalize_path(Utf8Path::new("././.dev")), ".dev");
    }

    #[test]
    fn test_relative_href() {
        let css = Utf8Path::new("assets/css/style.css");
        assert_eq!(
            relative_href(Utf8Path::new("index.html"), css),
            "assets/css/style.css"
        );
        assert_eq!(
            relative_href(Utf8Path::new("pages/about.html"), css),
            "../assets/css/style.css"
        );
        assert_eq!(
            relative_href(Utf8Path::new("a/b/c.html"), css),
            "../../assets/css/style.css"
        );
        assert_eq!(
            relative_href(Utf8Path::new("assets/index.html"), css),
            "css/style.css"
        );
    }

    #[test]
    fn test_glob_in_escapes() {
        assert_eq!(glob_in(Utf8Path::new("/tmp/[x]"), "*.js"), "/tmp/[[]x[]]/*.js");
    }
}
