//! URL comparison helpers for the autofill matcher.
//!
//! Candidate URLs arrive from content scripts and are frequently malformed
//! (bare hosts, missing schemes, fragments only). Extraction is therefore
//! lenient, and comparisons that cannot parse a host fall back to substring
//! containment instead of failing the match request.

use crate::models::credential::CredentialRecord;

/// Extract the lowercased host component of a URL-ish string.
/// Returns `None` when no plausible host is present.
pub fn hostname(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Strip scheme ("https://", "ftp://", ...) if present.
    let rest = match trimmed.find("://") {
        Some(idx) => &trimmed[idx + 3..],
        None => trimmed,
    };

    // Authority ends at the first path/query/fragment delimiter.
    let authority = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();

    // Drop userinfo and port.
    let host = authority.rsplit('@').next().unwrap_or(authority);
    let host = host.split(':').next().unwrap_or(host);

    if host.is_empty() || !host.chars().any(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

/// Strip one leading `www.` label.
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Anchored glob match where `*` matches any run of characters.
/// `*.example.com` matches `login.example.com` but not `example.org`.
pub fn glob_matches(pattern: &str, candidate: &str) -> bool {
    fn inner(pat: &[u8], text: &[u8]) -> bool {
        match pat.first() {
            None => text.is_empty(),
            Some(b'*') => {
                // Try every split point, including the empty one.
                (0..=text.len()).any(|i| inner(&pat[1..], &text[i..]))
            }
            Some(&c) => text.first() == Some(&c) && inner(&pat[1..], &text[1..]),
        }
    }
    inner(
        pattern.to_ascii_lowercase().as_bytes(),
        candidate.to_ascii_lowercase().as_bytes(),
    )
}

/// Whether `pattern` matches either the full candidate URL or its hostname.
fn pattern_hits(pattern: &str, test_url: &str, host: Option<&str>) -> bool {
    glob_matches(pattern, test_url) || host.map(|h| glob_matches(pattern, h)).unwrap_or(false)
}

/// Standalone predicate: does this record claim the candidate URL?
///
/// Domain-only records compare host components; everything else checks exact
/// URL equality, then the pattern set, then falls back to two-way substring
/// containment when no host can be extracted from the candidate.
pub fn matches_url(record: &CredentialRecord, test_url: &str) -> bool {
    let stored_url = record.url.as_deref().unwrap_or_default();
    let test_host = hostname(test_url);

    if record.domain_only {
        let stored_host = hostname(stored_url);
        return match (stored_host, test_host) {
            (Some(s), Some(t)) => s == t || strip_www(&s) == strip_www(&t),
            // Parse failure on either side: substring containment, both ways.
            _ => contains_either(stored_url, test_url),
        };
    }

    if !stored_url.is_empty() && stored_url == test_url {
        return true;
    }
    if record
        .url_patterns
        .iter()
        .any(|p| pattern_hits(p, test_url, test_host.as_deref()))
    {
        return true;
    }
    if test_host.is_none() {
        return contains_either(stored_url, test_url);
    }
    false
}

fn contains_either(stored: &str, test: &str) -> bool {
    if stored.is_empty() || test.is_empty() {
        return false;
    }
    stored.contains(test) || test.contains(stored)
}
