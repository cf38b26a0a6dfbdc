use std::{fmt::Display, sync::LazyLock};

use regex::Regex;

use crate::outbound::RawProduct;

static EXACT_TERM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]*)""#).expect("valid exact term pattern"));

/// A free-text search as typed by the user.
///
/// Substrings enclosed in double quotes are exact-match terms: every product
/// kept after [`filter_exact`] has each of them in its title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SearchQuery {
    text: String,
    exact_terms: Vec<String>,
}

impl SearchQuery {
    /// Returns `None` for blank input, which means no search is made.
    pub(crate) fn new(text: &str) -> Option<Self> {
        if text.trim().is_empty() {
            return None;
        }
        let exact_terms = EXACT_TERM
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect();
        Some(Self {
            text: text.to_string(),
            exact_terms,
        })
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.text
    }

    /// The query percent-encoded for use as the `q` URL parameter.
    pub(crate) fn encoded(&self) -> String {
        urlencoding::encode(&self.text).into_owned()
    }

    pub(crate) fn exact_terms(&self) -> &[String] {
        &self.exact_terms
    }
}

impl Display for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Keeps the products whose title contains every exact term of `query`,
/// ignoring case. Without exact terms the input is returned untouched.
pub(crate) fn filter_exact(products: Vec<RawProduct>, query: &SearchQuery) -> Vec<RawProduct> {
    if query.exact_terms().is_empty() {
        return products;
    }
    let terms: Vec<String> = query.exact_terms().iter().map(|t| t.to_lowercase()).collect();
    products
        .into_iter()
        .filter(|product| {
            let title = product.title.as_deref().unwrap_or_default().to_lowercase();
            terms.iter().all(|term| title.contains(term.as_str()))
        })
        .collect()
}
