//! URL detection and the canonical form used to dedupe website windows.

use crate::error::{BridgeError, Result};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)\bhttps?://[^\s<>"'`]+"#).expect("url pattern is valid")
    })
}

/// Pull every well-formed http(s) URL out of `text`, in order of first
/// appearance, without duplicates. Trailing sentence punctuation and
/// unbalanced closing brackets are not part of the URL.
pub fn detect_urls(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in url_pattern().find_iter(text) {
        let candidate = trim_trailing(m.as_str());
        let Ok(parsed) = Url::parse(candidate) else {
            continue;
        };
        if parsed.host_str().map_or(true, str::is_empty) {
            continue;
        }
        let candidate = candidate.to_string();
        if !found.contains(&candidate) {
            found.push(candidate);
        }
    }
    found
}

fn trim_trailing(mut s: &str) -> &str {
    loop {
        let Some(last) = s.chars().last() else {
            return s;
        };
        let strip = match last {
            '.' | ',' | ';' | ':' | '!' | '?' => true,
            ')' => s.matches('(').count() < s.matches(')').count(),
            ']' => s.matches('[').count() < s.matches(']').count(),
            '}' => s.matches('{').count() < s.matches('}').count(),
            _ => false,
        };
        if !strip {
            return s;
        }
        s = &s[..s.len() - last.len_utf8()];
    }
}

/// Canonical dedup key for a website window.
///
/// http/https only. Scheme and host are lowercased and default ports
/// dropped (by `Url` itself), the fragment is removed, a trailing `/` is
/// stripped from any path other than `/`, and query pairs are sorted.
pub fn canonicalize(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim()).map_err(|e| BridgeError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(BridgeError::InvalidUrl(format!(
                "{raw}: unsupported scheme {other}"
            )))
        }
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(BridgeError::InvalidUrl(format!("{raw}: missing host")));
    }

    url.set_fragment(None);

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }
    if url.path().is_empty() {
        url.set_path("/");
    }

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        pairs.sort();
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    Ok(url)
}
