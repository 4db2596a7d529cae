//! Cache key construction and glob matching.
//!
//! Response cache keys follow a fixed layout so invalidation patterns can be
//! written against it:
//!
//! ```text
//! {prefix}:{METHOD}:{path}[?k=v&k=v]:{user_id|anonymous}
//! ```
//!
//! Query parameters are sorted before joining, so two requests that differ
//! only in parameter order share one cache entry.

use uuid::Uuid;

/// Identity used for requests with no resolved user.
const ANONYMOUS: &str = "anonymous";

/// Build the cache key for a response.
///
/// `query` is the raw query string without the leading `?`; `None` and
/// `Some("")` are equivalent.
pub fn response_cache_key(
    prefix: &str,
    method: &str,
    path: &str,
    query: Option<&str>,
    user_id: Option<Uuid>,
) -> String {
    let identity = user_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| ANONYMOUS.to_string());
    match query.filter(|q| !q.is_empty()) {
        Some(q) => format!(
            "{prefix}:{method}:{path}?{}:{identity}",
            sorted_query(q)
        ),
        None => format!("{prefix}:{method}:{path}:{identity}"),
    }
}

/// Key under which a scope's throttle rate is memoized.
pub fn rate_limit_key(prefix: &str, scope: &str) -> String {
    format!("{prefix}:rate_limit:{scope}")
}

fn sorted_query(query: &str) -> String {
    let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    pairs.sort_unstable();
    pairs.join("&")
}

/// Match a key against a glob pattern where `*` matches any run of
/// characters (including none). All other characters match literally.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return pattern == key;
    }

    let mut rest = key;
    for (i, segment) in segments.iter().enumerate() {
        if i == 0 {
            match rest.strip_prefix(segment) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == segments.len() - 1 {
            return rest.ends_with(segment);
        } else if segment.is_empty() {
            continue;
        } else {
            match rest.find(segment) {
                Some(pos) => rest = &rest[pos + segment.len()..],
                None => return false,
            }
        }
    }
    // Unreachable for len > 1, the last segment returns above.
    true
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Reordering query pairs never changes the key.
        #[test]
        fn prop_query_order_does_not_matter(
            mut pairs in prop::collection::vec("[a-z]{1,8}=[a-z0-9]{0,8}", 1..6),
        ) {
            let forward = pairs.join("&");
            pairs.reverse();
            let backward = pairs.join("&");
            let a = response_cache_key("tw", "GET", "/p", Some(&forward), None);
            let b = response_cache_key("tw", "GET", "/p", Some(&backward), None);
            prop_assert_eq!(a, b);
        }

        /// A key always matches the prefix-star pattern built from its own
        /// method and path.
        #[test]
        fn prop_key_matches_own_prefix_pattern(path in "/[a-z/]{0,20}") {
            let key = response_cache_key("tw", "GET", &path, Some("a=1"), None);
            let pattern = format!("tw:GET:{path}*");
            prop_assert!(glob_match(&pattern, &key));
        }
    }
}
