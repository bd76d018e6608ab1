//! Duplicate removal and URL canonicalization.
//!
//! Two passages are the same item when their [`PassageIdentity`] is equal:
//! `(document_id, sequence_order)` for internal passages, canonical URL for
//! external ones. Deduplication keeps the first occurrence and never reorders.

use std::collections::HashSet;
use tracing::debug;
use url::{form_urlencoded, Url};

use crate::types::passage::{Passage, PassageIdentity};

/// Query parameters that only carry click tracking.
const TRACKING_PARAMS: &[&str] = &[
    "gclid", "fbclid", "msclkid", "mc_cid", "mc_eid", "yclid", "igshid", "_ga", "ref",
];

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

fn is_tracking_segment(segment: &str) -> bool {
    form_urlencoded::parse(segment.as_bytes())
        .next()
        .is_some_and(|(key, _)| is_tracking_param(&key))
}

/// Normalize a URL for identity comparison.
///
/// Lowercases scheme and host, drops default ports, fragments, tracking
/// parameters and trailing slashes. Path case is preserved. Strings that do
/// not parse as URLs are only trimmed.
pub fn canonical_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    url.set_fragment(None);

    if let Some(query) = url.query() {
        // Kept segments stay byte-for-byte as written.
        let kept: Vec<&str> = query
            .split('&')
            .filter(|segment| !segment.is_empty())
            .filter(|segment| !is_tracking_segment(segment))
            .collect();
        let rebuilt = kept.join("&");
        if rebuilt.is_empty() {
            url.set_query(None);
        } else if rebuilt != query {
            url.set_query(Some(&rebuilt));
        }
    }

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let stripped = path.trim_end_matches('/').to_string();
        url.set_path(&stripped);
    }

    let mut out = String::from(url);
    if out.ends_with('/') {
        out.pop();
    }
    out
}

/// Drop later duplicates, keeping the first occurrence of each identity.
pub fn dedup(passages: Vec<Passage>) -> Vec<Passage> {
    let before = passages.len();
    let mut seen: HashSet<PassageIdentity> = HashSet::with_capacity(before);
    let unique: Vec<Passage> = passages
        .into_iter()
        .filter(|p| seen.insert(p.identity.clone()))
        .collect();

    if unique.len() < before {
        debug!(
            dropped = before - unique.len(),
            kept = unique.len(),
            "Removed duplicate passages"
        );
    }
    unique
}

/// Drop external passages whose canonical URL is in `exclude`.
pub fn without_urls(passages: Vec<Passage>, exclude: &[String]) -> Vec<Passage> {
    if exclude.is_empty() {
        return passages;
    }
    let blocked: HashSet<String> = exclude.iter().map(|u| canonical_url(u)).collect();
    passages
        .into_iter()
        .filter(|p| match &p.identity {
            PassageIdentity::External { url } => !blocked.contains(url),
            PassageIdentity::Internal { .. } => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_canonical_url_normalization() {
        assert_eq!(
            canonical_url("HTTPS://Example.COM/report/?utm_source=x"),
            "https://example.com/report"
        );
        assert_eq!(
            canonical_url("https://example.com:443/a#section"),
            "https://example.com/a"
        );
        assert_eq!(canonical_url("https://example.com/"), "https://example.com");
        assert_eq!(
            canonical_url("https://example.com/a?id=7&fbclid=abc"),
            "https://example.com/a?id=7"
        );
        assert_eq!(canonical_url("  not a url  "), "not a url");
    }

    #[test]
    fn test_stripping_tracking_keeps_other_params_verbatim() {
        assert_eq!(
            canonical_url("https://news.example.com/search?q=hbm%20outlook&utm_source=feed"),
            canonical_url("https://news.example.com/search?q=hbm%20outlook")
        );
        assert_eq!(
            canonical_url("https://news.example.com/search?q=hbm%20outlook&utm_source=feed"),
            "https://news.example.com/search?q=hbm%20outlook"
        );
        assert_eq!(
            canonical_url("https://example.com/a?amp&utm_source=feed"),
            canonical_url("https://example.com/a?amp")
        );
        assert_eq!(
            canonical_url("https://example.com/a?amp&utm_source=feed"),
            "https://example.com/a?amp"
        );
        assert_eq!(
            canonical_url("https://example.com/a?UTM_Campaign=x&id=1+2"),
            "https://example.com/a?id=1+2"
        );

        let unique = dedup(vec![
            Passage::external("https://news.example.com/search?q=a%20b&gclid=1", "first"),
            Passage::external("https://news.example.com/search?q=a%20b", "second"),
        ]);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].text, "first");
    }

    #[test]
    fn test_path_case_is_preserved() {
        assert_ne!(
            canonical_url("https://example.com/Report"),
            canonical_url("https://example.com/report")
        );
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let passages = vec![
            Passage::internal("D1", 4, "Acme Corp", "first"),
            Passage::external("https://a.example.com/x", "web"),
            Passage::internal("D1", 4, "Acme Corp", "second"),
            Passage::external("https://A.example.com/x/#frag", "web again"),
            Passage::internal("D1", 5, "Acme Corp", "other"),
        ];

        let unique = dedup(passages);
        let texts: Vec<_> = unique.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "web", "other"]);
    }

    #[test]
    fn test_without_urls_only_touches_external() {
        let passages = vec![
            Passage::internal("D1", 1, "Acme Corp", "kept"),
            Passage::external("https://seen.example.com/a?utm_medium=mail", "blocked"),
            Passage::external("https://new.example.com/b", "kept"),
        ];

        let kept = without_urls(passages, &["https://SEEN.example.com/a/".to_string()]);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|p| p.text == "kept"));
    }

    fn url_strategy() -> impl Strategy<Value = String> {
        "https?://[a-zA-Z]{1,8}\\.(com|org)(/[a-zA-Z0-9]{1,6}){0,3}/?(\\?(utm_source|id|gclid)=[a-z0-9]{1,4})?(#[a-z]{0,4})?"
    }

    proptest! {
        #[test]
        fn prop_canonical_url_is_idempotent(raw in url_strategy()) {
            let once = canonical_url(&raw);
            prop_assert_eq!(canonical_url(&once), once.clone());
            prop_assert!(!once.contains('#'));
            prop_assert!(!once.contains("utm_"));
            prop_assert!(!once.contains("gclid"));
        }

        #[test]
        fn prop_dedup_is_stable_and_unique(ids in proptest::collection::vec((0u8..4, 0i64..6), 0..40)) {
            let passages: Vec<Passage> = ids
                .iter()
                .enumerate()
                .map(|(i, (doc, seq))| Passage::internal(format!("D{}", doc), *seq, "Acme Corp", format!("t{}", i)))
                .collect();

            let unique = dedup(passages.clone());

            let identities: HashSet<_> = unique.iter().map(|p| p.identity.clone()).collect();
            prop_assert_eq!(identities.len(), unique.len());

            // Every survivor is the first passage carrying its identity.
            for p in &unique {
                let first = passages.iter().find(|q| q.identity == p.identity).unwrap();
                prop_assert_eq!(&first.text, &p.text);
            }

            // Survivors keep their relative order.
            let positions: Vec<usize> = unique
                .iter()
                .map(|p| passages.iter().position(|q| q.text == p.text).unwrap())
                .collect();
            prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
