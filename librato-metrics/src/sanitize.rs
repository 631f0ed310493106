//! Normalization of names, sources and tags before they are sent to the backend.
//!
//! All functions here are pure. Characters the backend rejects are either replaced with `_` or
//! removed, and the result is truncated to the maximum length the backend accepts. Since every
//! retained character is ASCII, truncation never splits a character.

use crate::Tags;

/// Maximum length of metric names, sources, tag values and stream names.
pub const MAX_NAME_LENGTH: usize = 255;

/// Maximum length of tag names.
pub const MAX_TAG_NAME_LENGTH: usize = 64;

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')
}

fn is_tag_value_char(c: char) -> bool {
    is_name_char(c) || matches!(c, '?' | '\\' | '/' | ' ')
}

/// Replaces every invalid character with one `_` per UTF-16 code unit.
///
/// Characters outside the basic multilingual plane, such as emoji, become `__`. This keeps
/// sanitized names identical to those produced by other Librato clients.
fn replace_invalid(input: &str, max_length: usize, is_valid: impl Fn(char) -> bool) -> String {
    input
        .chars()
        .flat_map(|c| {
            if is_valid(c) {
                std::iter::repeat_n(c, 1)
            } else {
                std::iter::repeat_n('_', c.len_utf16())
            }
        })
        .take(max_length)
        .collect()
}

/// Sanitizes a metric name or source.
///
/// Characters outside of `[A-Za-z0-9_.:-]` are replaced with `_`, or `__` if they lie outside
/// the basic multilingual plane.
///
/// ```
/// use librato_metrics::sanitize::sanitize_name;
///
/// assert_eq!(sanitize_name("api/requests count"), "api_requests_count");
/// ```
pub fn sanitize_name(name: &str) -> String {
    replace_invalid(name, MAX_NAME_LENGTH, is_name_char)
}

/// Sanitizes the name of a tag.
///
/// Uses the same character set as [`sanitize_name`], but truncates to
/// [`MAX_TAG_NAME_LENGTH`].
pub fn sanitize_tag_name(name: &str) -> String {
    replace_invalid(name, MAX_TAG_NAME_LENGTH, is_name_char)
}

/// Sanitizes the value of a tag.
///
/// In addition to the characters allowed in names, tag values may contain `?`, `\`, `/` and
/// spaces. All other characters are dropped rather than replaced.
pub fn sanitize_tag_value(value: &str) -> String {
    value
        .chars()
        .filter(|&c| is_tag_value_char(c))
        .take(MAX_NAME_LENGTH)
        .collect()
}

/// Sanitizes both names and values of all tags, preserving their order.
///
/// If two tag names sanitize to the same string, the later tag wins.
pub fn sanitize_tags(tags: &Tags) -> Tags {
    tags.iter()
        .map(|(key, value)| (sanitize_tag_name(key), sanitize_tag_value(value)))
        .collect()
}

/// Derives an annotation stream name from arbitrary text.
///
/// The text is lowercased and everything outside of `[a-z0-9]` becomes `_`, with the same
/// treatment of astral characters as [`sanitize_name`].
pub fn sanitize_stream_name(name: &str) -> String {
    let lowercase = name.to_lowercase();
    replace_invalid(&lowercase, MAX_NAME_LENGTH, |c| {
        c.is_ascii_lowercase() || c.is_ascii_digit()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("foo.bar:baz-1_2"), "foo.bar:baz-1_2");
        assert_eq!(sanitize_name("foo bar/baz"), "foo_bar_baz");
        assert_eq!(sanitize_name("häppy"), "h_ppy");
        assert_eq!(sanitize_name("fire🔥"), "fire__");
        assert_eq!(sanitize_name(""), "");
    }

    #[test]
    fn test_sanitize_name_truncates() {
        let long = "a".repeat(300);
        assert_eq!(sanitize_name(&long).len(), MAX_NAME_LENGTH);
    }

    #[test]
    fn test_sanitize_tag_name() {
        assert_eq!(sanitize_tag_name("http.status code"), "http.status_code");
        assert_eq!(sanitize_tag_name(&"x".repeat(100)).len(), MAX_TAG_NAME_LENGTH);
    }

    #[test]
    fn test_sanitize_tag_value() {
        assert_eq!(sanitize_tag_value("GET /api/v1?x"), "GET /api/v1?x");
        assert_eq!(sanitize_tag_value("a\\b"), "a\\b");
        assert_eq!(sanitize_tag_value("<b>ü=1</b>"), "b1/b");
    }

    #[test]
    fn test_sanitize_tags_preserves_order() {
        let mut tags = Tags::new();
        tags.insert("route name".to_owned(), "/users/{id}".to_owned());
        tags.insert("env".to_owned(), "prod!".to_owned());

        insta::assert_debug_snapshot!(sanitize_tags(&tags), @r#"
        {
            "route_name": "/users/id",
            "env": "prod",
        }
        "#);
    }

    #[test]
    fn test_sanitize_stream_name() {
        assert_eq!(sanitize_stream_name("Deploy v1.2 (Prod)"), "deploy_v1_2__prod_");
        assert_eq!(sanitize_stream_name("ABC"), "abc");
        assert_eq!(sanitize_stream_name("Ship 🚀"), "ship___");
    }
}
