//! Target string conventions.
//!
//! Targets address the object an intent owns. Two shapes are in use:
//!
//! - `#`-separated segments, e.g. `acme#vpn-7#42` (scope, sub-object,
//!   correlation id)
//! - embedded key fragments, e.g. `link[id='link-42']`

use super::IntentError;

/// A target split into its `#`-separated segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPath {
    segments: Vec<String>,
}

impl TargetPath {
    /// Split `target` on `#`.
    ///
    /// # Errors
    ///
    /// Returns `IntentError::Validation` for an empty target or an empty
    /// segment.
    pub fn parse(target: &str) -> Result<Self, IntentError> {
        if target.trim().is_empty() {
            return Err(IntentError::validation("target", "target is empty"));
        }

        let segments: Vec<String> = target.split('#').map(|s| s.trim().to_string()).collect();
        if let Some(pos) = segments.iter().position(|s| s.is_empty()) {
            return Err(IntentError::validation(
                "target",
                format!("segment {} of '{}' is empty", pos + 1, target),
            ));
        }

        Ok(Self { segments })
    }

    /// Parse and require exactly `count` segments.
    pub fn parse_exact(target: &str, count: usize) -> Result<Self, IntentError> {
        let path = Self::parse(target)?;
        if path.len() != count {
            return Err(IntentError::validation(
                "target",
                format!(
                    "expected {} '#'-separated segments in '{}', found {}",
                    count,
                    target,
                    path.len()
                ),
            ));
        }
        Ok(path)
    }

    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The first `count` segments joined back with `#`.
    pub fn prefix(&self, count: usize) -> String {
        self.segments[..count.min(self.segments.len())].join("#")
    }
}

/// Extract the value of a `key='value'` fragment.
///
/// The key must start at a word boundary, so looking up `id` does not match
/// `port-id='…'`.
///
/// ```
/// use netweave::intent::target::fragment;
///
/// assert_eq!(fragment("link[id='link-42']", "id"), Some("link-42"));
/// assert_eq!(fragment("port[port-id='1/1/1']", "id"), None);
/// ```
pub fn fragment<'a>(target: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("{}='", key);
    let mut from = 0;

    while let Some(pos) = target[from..].find(&pattern) {
        let start = from + pos;
        let value_start = start + pattern.len();
        let at_boundary = target[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '-' || c == '_'));

        if at_boundary {
            let rest = &target[value_start..];
            return rest.find('\'').map(|end| &rest[..end]);
        }
        from = value_start;
    }

    None
}

/// Like [`fragment`], but a missing or empty value is a validation error.
pub fn require_fragment<'a>(target: &'a str, key: &str) -> Result<&'a str, IntentError> {
    match fragment(target, key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(IntentError::validation(
            "target",
            format!("no {}='…' fragment in '{}'", key, target),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments() {
        let path = TargetPath::parse("acme#vpn-7#42").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.segment(0), Some("acme"));
        assert_eq!(path.segment(2), Some("42"));
        assert_eq!(path.segment(3), None);
        assert_eq!(path.prefix(2), "acme#vpn-7");
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        assert!(TargetPath::parse("").is_err());
        assert!(TargetPath::parse("acme##42").is_err());
        assert!(TargetPath::parse("acme#").is_err());
    }

    #[test]
    fn test_parse_exact_count() {
        assert!(TargetPath::parse_exact("a#b#c", 3).is_ok());
        let err = TargetPath::parse_exact("a#b", 3).unwrap_err();
        assert!(matches!(err, IntentError::Validation { ref field, .. } if field == "target"));
    }

    #[test]
    fn test_fragment_extraction() {
        let target = "/network/link[id='link-42']/endpoint[port-id='1/1/1']";
        assert_eq!(fragment(target, "id"), Some("link-42"));
        assert_eq!(fragment(target, "port-id"), Some("1/1/1"));
        assert_eq!(fragment(target, "name"), None);
    }

    #[test]
    fn test_fragment_requires_word_boundary() {
        assert_eq!(fragment("x[port-id='1/1/1']", "id"), None);
        assert_eq!(fragment("x[port-id='1/1/1'][id='a']", "id"), Some("a"));
    }

    #[test]
    fn test_fragment_unterminated() {
        assert_eq!(fragment("link[id='oops", "id"), None);
    }

    #[test]
    fn test_require_fragment_rejects_empty() {
        assert!(require_fragment("link[id='']", "id").is_err());
        assert_eq!(require_fragment("link[id='l1']", "id").unwrap(), "l1");
    }
}
