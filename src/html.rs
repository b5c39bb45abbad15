//! Text transformations applied to rendered pages.

mod format;
mod include;
mod inject;
mod prefix;

pub use format::{FormatError, format, minify};
pub use include::{IncludeError, expand as expand_includes};
pub use inject::{Assets, inject};
pub use prefix::prefix_urls;

/// Inserts `<script>` with `code` right before the last `</body>`, or at the
/// end of the document when there is no body.
pub(crate) fn insert_script(html: &str, code: &str) -> String {
    let tag = format!("<script>{code}</script>");

    match html.to_ascii_lowercase().rfind("</body>") {
        Some(at) => format!("{}{tag}{}", &html[..at], &html[at..]),
        None => format!("{html}{tag}"),
    }
}
