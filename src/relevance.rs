// src/relevance.rs
//! The keyword gate: a case-insensitive literal substring check, no
//! tokenization, no stemming. Text normalization happens upstream when
//! adapters build items, so this stays a pure function of
//! (text, keyword).

/// `true` when `keyword` occurs anywhere in `text`, ignoring case.
pub fn keyword_matches(text: &str, keyword: &str) -> bool {
    if keyword.is_empty() {
        return false;
    }
    text.to_lowercase().contains(&keyword.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_is_case_insensitive() {
        assert!(keyword_matches("DAGSTER rocks", "dagster"));
        assert!(keyword_matches("we love Dagster!", "DAGSTER"));
    }

    #[test]
    fn no_match_for_absent_keyword() {
        assert!(!keyword_matches("no match here", "xyz"));
    }

    #[test]
    fn substring_inside_words_counts() {
        // Literal substring semantics, by contract.
        assert!(keyword_matches("dagsterized pipelines", "dagster"));
    }

    #[test]
    fn empty_keyword_never_matches() {
        assert!(!keyword_matches("anything", ""));
    }
}
