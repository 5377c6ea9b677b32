use regex::{Regex, RegexBuilder};

/// Case-insensitive literal matcher for the active search term.
pub fn build_highlight_regex(term: &str) -> Option<Regex> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Splits `text` into `(segment, is_match)` pieces, in order.
pub fn split_matches<'t>(text: &'t str, regex: Option<&Regex>) -> Vec<(&'t str, bool)> {
    let Some(regex) = regex else {
        return vec![(text, false)];
    };
    let mut segments = Vec::new();
    let mut last = 0;
    for found in regex.find_iter(text) {
        if found.start() > last {
            segments.push((&text[last..found.start()], false));
        }
        segments.push((found.as_str(), true));
        last = found.end();
    }
    if last < text.len() || segments.is_empty() {
        segments.push((&text[last..], false));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_every_occurrence_case_insensitively() {
        let regex = build_highlight_regex("ab").expect("regex");
        let segments = split_matches("xAbyab", Some(&regex));
        assert_eq!(
            segments,
            vec![("x", false), ("Ab", true), ("y", false), ("ab", true)]
        );
    }

    #[test]
    fn escapes_regex_metacharacters() {
        let regex = build_highlight_regex("a.b").expect("regex");
        assert_eq!(
            split_matches("axb a.b", Some(&regex)),
            vec![("axb ", false), ("a.b", true)]
        );
    }

    #[test]
    fn blank_term_builds_nothing() {
        assert!(build_highlight_regex("  ").is_none());
        assert_eq!(split_matches("plain", None), vec![("plain", false)]);
    }
}
