//! Query string utilities for the cleaning path
//!
//! Parameter names are compared in their decoded form, but kept pairs are
//! copied back byte-for-byte so values are never re-encoded.

use std::borrow::Cow;

use ::url::form_urlencoded;
use ::url::Url;

// =============================================================================
// Parsing
// =============================================================================

/// Parse an absolute URL.
#[inline]
pub fn parse(url: &str) -> Result<Url, ::url::ParseError> {
    Url::parse(url)
}

// =============================================================================
// Query Pairs
// =============================================================================

/// One `name=value` segment of a raw query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPair<'a> {
    /// Decoded parameter name.
    pub name: Cow<'a, str>,
    /// The segment exactly as it appeared.
    pub raw: &'a str,
}

/// Decode a form-encoded parameter name (`+` is a space, `%XX` escapes).
pub fn decode_name(raw_name: &str) -> Cow<'_, str> {
    if !raw_name.contains(['%', '+']) {
        return Cow::Borrowed(raw_name);
    }
    form_urlencoded::parse(raw_name.as_bytes())
        .next()
        .map(|(name, _)| Cow::Owned(name.into_owned()))
        .unwrap_or(Cow::Borrowed(""))
}

/// Split a raw query string into pairs. Empty segments are skipped.
pub fn query_pairs(query: &str) -> impl Iterator<Item = QueryPair<'_>> {
    query.split('&').filter(|part| !part.is_empty()).map(|part| {
        let raw_name = match part.find('=') {
            Some(eq_pos) => &part[..eq_pos],
            None => part,
        };
        QueryPair {
            name: decode_name(raw_name),
            raw: part,
        }
    })
}

// =============================================================================
// Query Parameter Handling
// =============================================================================

/// Remove every parameter for which `keep` returns false.
///
/// Returns the number of pairs removed. The URL is only touched when that
/// number is non-zero; when nothing is left the `?` is dropped entirely.
pub fn retain_query_params<F>(url: &mut Url, mut keep: F) -> u32
where
    F: FnMut(&str) -> bool,
{
    let query = match url.query() {
        Some(q) if !q.is_empty() => q,
        _ => return 0,
    };

    let mut kept: Vec<&str> = Vec::new();
    let mut removed = 0u32;

    for pair in query_pairs(query) {
        if keep(&*pair.name) {
            kept.push(pair.raw);
        } else {
            removed += 1;
        }
    }

    if removed == 0 {
        return 0;
    }

    let new_query = kept.join("&");
    if new_query.is_empty() {
        url.set_query(None);
    } else {
        url.set_query(Some(&new_query));
    }
    removed
}

/// Count the parameters in a URL's query string.
pub fn count_query_params(url: &Url) -> usize {
    url.query().map(|q| query_pairs(q).count()).unwrap_or(0)
}
