//! Whitespace minification and re-formatting of rendered pages.

use std::borrow::Cow;
use std::convert::Infallible;

use markup_fmt::config::FormatOptions;
use markup_fmt::{Language, format_text};
use thiserror::Error;

const INDENT_WIDTH: usize = 4;

/// The formatter could not parse the page.
#[derive(Debug, Error)]
#[error("Couldn't format page: {0}")]
pub struct FormatError(String);

/// Collapses whitespace runs in text. Comments, closing tags and the
/// `html`/`head` opening tags are kept, so injection markers and the page
/// skeleton survive; embedded CSS and JS are left alone.
pub fn minify(html: &str) -> String {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_comments = true;
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;

    let out = minify_html::minify(html.as_bytes(), &cfg);
    String::from_utf8_lossy(&out).into_owned()
}

/// Pretty-prints a page. The result always ends with a newline.
pub fn format(html: &str) -> Result<String, FormatError> {
    let mut options = FormatOptions::default();
    options.layout.indent_width = INDENT_WIDTH;

    // embedded code is printed as written
    let mut out = format_text(html, Language::Html, &options, |code, _| {
        Ok::<_, Infallible>(Cow::Borrowed(code))
    })
    .map_err(|e| FormatError(e.to_string()))?;

    if !out.ends_with('\n') {
        out.push('\n');
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify_collapses_whitespace() {
        let html = "<p>\n    Hello   <b>big</b>\n\n  world\n</p>";
        let out = minify(html);
        assert!(out.contains("Hello <b>big</b> world"), "{out}");
    }

    #[test]
    fn test_minify_keeps_comments_and_raw_text() {
        let html = "<!-- inject:css --><!-- endinject --><pre>  a\n   b</pre>";
        let out = minify(html);
        assert!(out.contains("<!-- inject:css -->"));
        assert!(out.contains("<pre>  a\n   b</pre>"));
    }

    #[test]
    fn test_adjacent_text_stays_adjacent() {
        let out = format(&minify("<p>Hello<!-- note -->world</p>")).unwrap();
        assert!(out.replace("<!-- note -->", "").contains("Helloworld"), "{out}");
    }

    #[test]
    fn test_format_indents_nested_blocks() {
        let html = "<html><head><title>T</title></head><body><main><p>x</p></main></body></html>";
        let out = format(html).unwrap();

        assert!(out.contains("\n    <body>"), "{out}");
        assert!(out.ends_with("</html>\n"));
    }
}
