use std::sync::LazyLock;

use regex::{Captures, Regex};

static URL_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\s(?:href|src|action|poster)\s*=\s*["'])(/[^"']*)"#)
        .expect("valid url attribute pattern")
});

/// Rewrites root-relative URLs in `href`, `src`, `action` and `poster`
/// attributes so they live under `prefix`. Protocol-relative URLs (`//host`)
/// are left alone, as is everything when the prefix is `/`.
pub fn prefix_urls(html: &str, prefix: &str) -> String {
    let prefix = normalize_prefix(prefix);
    if prefix == "/" {
        return html.to_string();
    }

    URL_ATTRIBUTE
        .replace_all(html, |caps: &Captures| {
            let url = &caps[2];
            if url.starts_with("//") {
                return caps[0].to_string();
            }

            format!("{}{}{}", &caps[1], prefix, &url[1..])
        })
        .into_owned()
}

/// Makes sure the prefix starts and ends with a slash.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::from("/")
    } else {
        format!("/{trimmed}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_root_relative() {
        let html = r#"<a href="/about.html">About</a><img src='/img/a.png'>"#;
        assert_eq!(
            prefix_urls(html, "/docs/"),
            r#"<a href="/docs/about.html">About</a><img src='/docs/img/a.png'>"#
        );
    }

    #[test]
    fn test_prefix_root() {
        let html = r#"<a href="/">Home</a>"#;
        assert_eq!(prefix_urls(html, "docs"), r#"<a href="/docs/">Home</a>"#);
    }

    #[test]
    fn test_prefix_skips_other_urls() {
        let html = concat!(
            r#"<a href="about.html">rel</a>"#,
            r#"<a href="https://example.com/x">abs</a>"#,
            r#"<script src="//cdn.example.com/a.js"></script>"#,
            r#"<a data-href="/x">data</a>"#,
        );
        assert_eq!(prefix_urls(html, "/docs/"), html);
    }

    #[test]
    fn test_slash_prefix_is_identity() {
        let html = r#"<a href="/about.html">About</a>"#;
        assert_eq!(prefix_urls(html, "/"), html);
        assert_eq!(prefix_urls(html, ""), html);
    }
}
