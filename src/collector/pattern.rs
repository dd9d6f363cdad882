//! Ignore-pattern matching: a plain pattern matches as a substring, a pattern
//! containing one `*` matches as a prefix/suffix glob.

pub fn matches_pattern(pattern: &str, candidate: &str) -> bool {
    match pattern.split_once('*') {
        None => candidate.contains(pattern),
        Some((prefix, suffix)) => {
            candidate.len() >= prefix.len() + suffix.len()
                && candidate.starts_with(prefix)
                && candidate.ends_with(suffix)
        }
    }
}

pub fn matches_any(patterns: &[String], candidate: &str) -> bool {
    patterns.iter().any(|p| matches_pattern(p, candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_patterns() {
        assert!(matches_pattern("analytics", "https://cdn.example.com/analytics.js"));
        assert!(!matches_pattern("analytics", "https://cdn.example.com/app.js"));
    }

    #[test]
    fn test_wildcard_patterns() {
        assert!(matches_pattern("https://cdn.*.js", "https://cdn.example.com/app.js"));
        assert!(!matches_pattern("https://cdn.*.js", "https://cdn.example.com/app.css"));
        assert!(matches_pattern("*.png", "logo.png"));
        // prefix and suffix must not overlap
        assert!(!matches_pattern("ab*ba", "aba"));
    }
}
