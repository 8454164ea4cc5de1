//! Path glob matching for the `glob_match?` built-in
//!
//! Pattern syntax, applied per `/`-separated segment:
//! - `*` - exactly one segment
//! - `**` - zero or more segments
//! - `*` inside a segment (`*.txt`, `log-*-01`) - any run of characters
//!
//! Both sides are normalized first: repeated and trailing slashes are
//! dropped and `.`/`..` segments are resolved, so `/a/../b` is `/b`.
//! Matching runs in `O(pattern * path)` segments without backtracking.

/// Segment-wise glob matcher for resource paths
pub struct PatternMatcher;

impl PatternMatcher {
    /// Check if `path` matches `pattern`
    ///
    /// # Examples
    /// ```
    /// use enforcer_rs::core::pattern::PatternMatcher;
    ///
    /// assert!(PatternMatcher::matches("/users/*", "/users/alice"));
    /// assert!(PatternMatcher::matches("/admin/**", "/admin/users/bob"));
    /// assert!(!PatternMatcher::matches("/users/*", "/admin/alice"));
    /// ```
    pub fn matches(pattern: &str, path: &str) -> bool {
        let pattern = segments(pattern);
        let path = segments(path);

        // reachable[j]: pattern[..i] can consume exactly path[..j]
        let mut reachable = vec![false; path.len() + 1];
        reachable[0] = true;

        for pat in &pattern {
            let mut next = vec![false; path.len() + 1];
            if *pat == "**" {
                let mut seen = false;
                for j in 0..=path.len() {
                    seen |= reachable[j];
                    next[j] = seen;
                }
            } else {
                for j in 0..path.len() {
                    if reachable[j] && segment_matches(pat, path[j]) {
                        next[j + 1] = true;
                    }
                }
            }
            reachable = next;
        }

        reachable[path.len()]
    }
}

/// Split into segments, resolving `.` and `..`
fn segments(path: &str) -> Vec<&str> {
    let mut resolved = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                resolved.pop();
            }
            _ => resolved.push(part),
        }
    }
    resolved
}

/// Match one segment against a pattern segment where `*` spans any run
fn segment_matches(pattern: &str, segment: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == segment;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return true,
    };
    let Some(mut remaining) = segment.strip_prefix(first) else {
        return false;
    };

    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return remaining.is_empty(),
    };
    for part in middle {
        match remaining.find(part) {
            Some(at) => remaining = &remaining[at + part.len()..],
            None => return false,
        }
    }
    remaining.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(PatternMatcher::matches("/users/alice", "/users/alice"));
        assert!(!PatternMatcher::matches("/users/alice", "/users/bob"));
    }

    #[test]
    fn test_single_wildcard() {
        assert!(PatternMatcher::matches("/users/*", "/users/alice"));
        assert!(!PatternMatcher::matches("/users/*", "/users/alice/profile"));
        assert!(!PatternMatcher::matches("/users/*", "/users"));
    }

    #[test]
    fn test_recursive_wildcard() {
        assert!(PatternMatcher::matches("/admin/**", "/admin"));
        assert!(PatternMatcher::matches("/admin/**", "/admin/users/bob/profile"));
        assert!(PatternMatcher::matches("/users/**/settings", "/users/alice/settings"));
        assert!(PatternMatcher::matches("/users/**/settings", "/users/settings"));
        assert!(PatternMatcher::matches("/users/**/settings", "/users/a/b/settings"));
        assert!(!PatternMatcher::matches("/admin/**", "/users/admin"));
    }

    #[test]
    fn test_normalization() {
        assert!(PatternMatcher::matches("/users/alice", "users//alice/"));
        assert!(PatternMatcher::matches("/", ""));
        assert!(PatternMatcher::matches("/users/alice", "/users/./alice"));
    }

    #[test]
    fn test_traversal_is_resolved_before_matching() {
        assert!(PatternMatcher::matches("/private/**", "/public/../private/secret.txt"));
        assert!(!PatternMatcher::matches("/public/**", "/public/../private/file.txt"));
        assert!(!PatternMatcher::matches("/public/**", "/public/../../private/file.txt"));
    }

    #[test]
    fn test_in_segment_wildcards() {
        assert!(PatternMatcher::matches("/data/*.txt", "/data/file.txt"));
        assert!(!PatternMatcher::matches("/data/*.txt", "/data/file.json"));
        assert!(!PatternMatcher::matches("/data/*.txt", "/data/sub/file.txt"));
        assert!(PatternMatcher::matches("/logs/*-*-*.log", "/logs/app-prod-2024.log"));
        assert!(!PatternMatcher::matches("/logs/*-data", "/logs/data-test"));
        assert!(PatternMatcher::matches("/f/a*a", "/f/aa"));
        assert!(!PatternMatcher::matches("/f/a*a", "/f/a"));
    }

    #[test]
    fn test_many_recursive_wildcards_stay_linear() {
        let pattern = "/**/x".repeat(30);
        let path = "/a".repeat(200);
        assert!(!PatternMatcher::matches(&pattern, &path));
    }
}
