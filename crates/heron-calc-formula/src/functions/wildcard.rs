//! Wildcard pattern matching
//!
//! Excel wildcards use `*` for any run of characters and `?` for exactly
//! one character. Patterns are compiled to anchored, case-insensitive
//! regular expressions with every other regex metacharacter escaped, then
//! matched whole-string against candidates.

use regex::Regex;

/// A compiled Excel wildcard pattern
#[derive(Debug)]
pub struct WildcardPattern {
    regex: Regex,
}

impl WildcardPattern {
    /// Compile a wildcard pattern
    ///
    /// Returns `None` when the pattern contains no wildcard characters;
    /// callers fall back to plain equality in that case.
    pub fn new(pattern: &str) -> Option<Self> {
        if !contains_wildcard(pattern) {
            return None;
        }

        let mut re = String::with_capacity(pattern.len() + 8);
        re.push_str("(?i)^");
        for c in pattern.chars() {
            match c {
                '*' => re.push_str(".*"),
                '?' => re.push('.'),
                _ => re.push_str(&regex::escape(&c.to_string())),
            }
        }
        re.push('$');

        // The pattern is built from escaped literals and .*/. only, so
        // compilation cannot fail on user input.
        Regex::new(&re).ok().map(|regex| WildcardPattern { regex })
    }

    /// Test a candidate string against the pattern
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Check whether a string contains Excel wildcard characters
pub fn contains_wildcard(s: &str) -> bool {
    s.contains('*') || s.contains('?')
}
