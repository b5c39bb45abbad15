//! Asset injection between `<!-- inject:<ext> -->` and `<!-- endinject -->`
//! markers.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)([ \t]*)<!--\s*inject:(css|js)\s*-->(.*?)<!--\s*endinject\s*-->")
        .expect("valid inject pattern")
});

/// Asset references to place into a page, already relative to it.
#[derive(Debug, Default, Clone)]
pub struct Assets {
    pub css: Vec<String>,
    pub js: Vec<String>,
}

impl Assets {
    fn tags(&self, ext: &str) -> Vec<String> {
        match ext {
            "css" => self
                .css
                .iter()
                .map(|href| format!(r#"<link rel="stylesheet" href="{href}">"#))
                .collect(),
            _ => self
                .js
                .iter()
                .map(|src| format!(r#"<script src="{src}"></script>"#))
                .collect(),
        }
    }
}

/// Replaces the content of every marker pair with tags for `assets`. With
/// `remove_markers` the comments themselves are dropped as well. Pages
/// without markers come back unchanged.
pub fn inject(html: &str, assets: &Assets, remove_markers: bool) -> String {
    MARKERS
        .replace_all(html, |caps: &Captures| {
            let indent = &caps[1];
            let ext = &caps[2];
            let tags = assets.tags(ext);

            let mut lines = Vec::with_capacity(tags.len() + 2);
            if !remove_markers {
                lines.push(format!("{indent}<!-- inject:{ext} -->"));
            }
            lines.extend(tags.into_iter().map(|tag| format!("{indent}{tag}")));
            if !remove_markers {
                lines.push(format!("{indent}<!-- endinject -->"));
            }

            lines.join("\n")
        })
        .into_owned()
}
