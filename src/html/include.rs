//! `@@include('file', {"key": "value"})` directives.
//!
//! Paths resolve against the template directory. Inside the included file,
//! `@@key` is replaced with the matching value from the JSON object.
//! Includes nest up to [`MAX_DEPTH`] levels.

use std::fs;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

const MAX_DEPTH: usize = 16;

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)@@include\(\s*['"]([^'"]+)['"]\s*(?:,\s*(\{.*?\})\s*)?\)"#)
        .expect("valid include pattern")
});

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@@([A-Za-z_][\w.]*)").expect("valid variable pattern"));

#[derive(Debug, Error)]
pub enum IncludeError {
    #[error("Couldn't read include '{path}': {source}")]
    Read {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid parameters for include '{path}': {source}")]
    Params {
        path: Utf8PathBuf,
        source: serde_json::Error,
    },

    #[error("Includes nested deeper than {MAX_DEPTH} levels at '{0}'")]
    TooDeep(Utf8PathBuf),
}

/// Expands every include directive in `html`.
pub fn expand(html: &str, base: &Utf8Path) -> Result<String, IncludeError> {
    expand_at(html, base, 0)
}

fn expand_at(html: &str, base: &Utf8Path, depth: usize) -> Result<String, IncludeError> {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;

    for caps in DIRECTIVE.captures_iter(html) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let path = base.join(&caps[1]);

        if depth >= MAX_DEPTH {
            return Err(IncludeError::TooDeep(path));
        }

        let params = match caps.get(2) {
            Some(json) => serde_json::from_str::<Map<String, Value>>(json.as_str()).map_err(
                |source| IncludeError::Params {
                    path: path.clone(),
                    source,
                },
            )?,
            None => Map::new(),
        };

        let text = fs::read_to_string(&path).map_err(|source| IncludeError::Read {
            path: path.clone(),
            source,
        })?;

        let text = substitute(&text, &params);

        out.push_str(&html[last..whole.start]);
        out.push_str(&expand_at(&text, base, depth + 1)?);
        last = whole.end;
    }

    out.push_str(&html[last..]);
    Ok(out)
}

fn substitute(text: &str, params: &Map<String, Value>) -> String {
    VARIABLE
        .replace_all(text, |caps: &regex::Captures| {
            if &caps[1] == "include" {
                return caps[0].to_string();
            }

            match lookup(params, &caps[1]) {
                Some(Value::String(s)) => s.clone(),
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn lookup<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let mut value = params.get(parts.next()?)?;

    for part in parts {
        value = value.get(part)?;
    }

    Some(value)
}
