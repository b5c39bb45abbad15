//! Vendor prefixing, unused-rule elimination and CSS minification.
//!
//! Content files are scanned for candidate tokens the same way utility CSS
//! frameworks do it: every run of word characters, dashes, slashes, colons
//! and dots is a candidate, minus trailing colons. Classes and ids used in
//! the selectors of the parsed sheet that never show up as a candidate are
//! handed to `lightningcss` as unused symbols, which drops the rules that
//! need them.

use std::collections::HashSet;
use std::convert::Infallible;
use std::fs;
use std::sync::LazyLock;

use camino::Utf8Path;
use lightningcss::selector::{Component, Selector};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use lightningcss::visit_types;
use lightningcss::visitor::{Visit, VisitTypes, Visitor};
use regex::Regex;
use tracing::warn;

use crate::error::TaskError;
use crate::task::list_files;

static EXTRACTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w\-/:.]+").expect("valid extractor pattern"));

/// Oldest browsers the output still gets vendor prefixes for.
const BROWSERS: Browsers = Browsers {
    android: None,
    chrome: Some(90 << 16),
    edge: Some(90 << 16),
    firefox: Some(88 << 16),
    ie: None,
    ios_saf: Some(14 << 16),
    opera: Some(76 << 16),
    safari: Some(14 << 16),
    samsung: Some(14 << 16),
};

/// Candidate tokens found in a piece of content.
pub fn extract_candidates(content: &str, into: &mut HashSet<String>) {
    for m in EXTRACTOR.find_iter(content) {
        let token = m.as_str().trim_end_matches(':');
        if !token.is_empty() {
            into.insert(token.to_string());
        }
    }
}

/// Scans every file matched by the content globs.
pub fn scan_content(globs: &[String]) -> Result<HashSet<String>, TaskError> {
    let mut candidates = HashSet::new();

    for pattern in globs {
        for file in list_files(pattern)? {
            match fs::read_to_string(&file) {
                Ok(text) => extract_candidates(&text, &mut candidates),
                Err(e) => warn!(file = %file, "skipping unreadable content file: {e}"),
            }
        }
    }

    Ok(candidates)
}

/// Collects class and id names from every selector in a sheet, including
/// the ones nested in `:not()`, `:is()`, `:where()` and `:has()`.
#[derive(Default)]
struct Symbols(HashSet<String>);

impl Symbols {
    fn collect(&mut self, selector: &Selector<'_>) {
        for component in selector.iter_raw_match_order() {
            match component {
                Component::Class(name) | Component::ID(name) => {
                    self.0.insert(name.0.to_string());
                }
                Component::Negation(list)
                | Component::Is(list)
                | Component::Where(list)
                | Component::Has(list) => {
                    for nested in list.iter() {
                        self.collect(nested);
                    }
                }
                _ => {}
            }
        }
    }
}

impl<'i> Visitor<'i> for Symbols {
    type Error = Infallible;

    fn visit_types(&self) -> VisitTypes {
        visit_types!(SELECTORS)
    }

    fn visit_selector(&mut self, selector: &mut Selector<'i>) -> Result<(), Self::Error> {
        self.collect(selector);
        Ok(())
    }
}

fn declared_symbols(sheet: &mut StyleSheet<'_>) -> HashSet<String> {
    let mut symbols = Symbols::default();
    let Ok(()) = sheet.visit(&mut symbols);
    symbols.0
}

/// Prefixes `css` for the supported browsers and prints it, minified or
/// not. With `candidates`, rules whose classes or ids none of them mention
/// are dropped first.
pub fn optimize(
    css: &str,
    filename: &Utf8Path,
    candidates: Option<&HashSet<String>>,
    minify: bool,
) -> Result<String, String> {
    let options = ParserOptions {
        filename: filename.to_string(),
        ..ParserOptions::default()
    };

    let mut sheet = StyleSheet::parse(css, options).map_err(|e| e.to_string())?;

    let unused_symbols = match candidates {
        Some(candidates) => declared_symbols(&mut sheet)
            .into_iter()
            .filter(|symbol| !candidates.contains(symbol))
            .collect(),
        None => HashSet::new(),
    };

    let targets = Targets::from(BROWSERS);

    sheet
        .minify(MinifyOptions {
            targets,
            unused_symbols,
        })
        .map_err(|e| e.to_string())?;

    let printed = sheet
        .to_css(PrinterOptions {
            minify,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;

    Ok(printed.code)
}
