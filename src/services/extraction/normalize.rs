use once_cell::sync::Lazy;
use regex::Regex;

use super::email::{EMAIL_CUE, PROVIDER_DOMAINS};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static SPOKEN_AT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\bat\s+the\s+rate(?:\s+of)?\b\s*").unwrap());

static SPOKEN_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\w)\s+dot\s+(\w)").unwrap());

static SPOKEN_UNDERSCORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\w)\s+underscore\s+(\w)").unwrap());

static LITERAL_AT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*@\s*").unwrap());

fn provider_alternation() -> String {
    PROVIDER_DOMAINS
        .iter()
        .map(|(provider, _)| regex::escape(provider))
        .collect::<Vec<_>>()
        .join("|")
}

// "john at gmail dot com": a bare "at" counts when a known provider and a
// domain continuation follow.
static AT_PROVIDER_DOMAIN: Lazy<Regex> = Lazy::new(|| {
    let providers = provider_alternation();
    Regex::new(&format!(r"(?i)(\w)\s+at\s+((?:{providers})(?:\s+dot\s+|\.)\w)")).unwrap()
});

// "my email is john at gmail": the provider alone is enough after an email cue.
static AT_PROVIDER: Lazy<Regex> = Lazy::new(|| {
    let providers = provider_alternation();
    Regex::new(&format!(r"(?i)(\w)\s+at\s+((?:{providers})\b)")).unwrap()
});

/// An utterance after speech-to-text cleanup.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Cleaned text with the speaker's casing, used for display values.
    pub text: String,
    /// Lower-cased copy, used for matching.
    pub lower: String,
}

/// Rewrites spoken punctuation into symbols and collapses whitespace.
/// Pure and infallible; text without any known idiom passes through.
pub fn normalize(raw: &str) -> Normalized {
    let text = WHITESPACE.replace_all(raw.trim(), " ");
    let text = SPOKEN_AT.replace_all(&text, "@");
    let text = AT_PROVIDER_DOMAIN.replace_all(&text, "${1}@${2}").into_owned();
    let text = if EMAIL_CUE.is_match(&text) {
        AT_PROVIDER.replace_all(&text, "${1}@${2}").into_owned()
    } else {
        text
    };
    // Applied twice so chains like "a dot b dot c" collapse fully; each pass
    // consumes the word character on both sides of a match.
    let text = SPOKEN_DOT.replace_all(&text, "${1}.${2}");
    let text = SPOKEN_DOT.replace_all(&text, "${1}.${2}");
    let text = SPOKEN_UNDERSCORE.replace_all(&text, "${1}_${2}");
    let text = LITERAL_AT.replace_all(&text, "@").into_owned();
    let lower = text.to_lowercase();
    Normalized { text, lower }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spoken_email_is_rewritten() {
        let n = normalize("john at the rate gmail dot com");
        assert_eq!(n.text, "john@gmail.com");
    }

    #[test]
    fn test_at_the_rate_of_variant() {
        let n = normalize("my email is priya at the rate of yahoo dot co dot in");
        assert_eq!(n.lower, "my email is priya@yahoo.co.in");
    }

    #[test]
    fn test_bare_at_before_provider() {
        let n = normalize("it's sam dot lee at Gmail dot com please");
        assert_eq!(n.text, "it's sam.lee@Gmail.com please");
    }

    #[test]
    fn test_bare_at_without_provider_untouched() {
        let n = normalize("see you at three");
        assert_eq!(n.text, "see you at three");
    }

    #[test]
    fn test_at_provider_in_ordinary_sentence_untouched() {
        let text = "I work at Yahoo so evenings are hard";
        assert_eq!(normalize(text).text, text);
        assert_eq!(normalize("john at gmail dot com").text, "john@gmail.com");
    }

    #[test]
    fn test_bare_provider_after_email_cue() {
        let n = normalize("my email is john at gmail");
        assert_eq!(n.text, "my email is john@gmail");
    }

    #[test]
    fn test_underscore_and_literal_at_spacing() {
        let n = normalize("mary underscore k @ outlook.com");
        assert_eq!(n.text, "mary_k@outlook.com");
    }

    #[test]
    fn test_whitespace_collapsed_and_case_kept() {
        let n = normalize("  My name   is   Ana\tGomez  ");
        assert_eq!(n.text, "My name is Ana Gomez");
        assert_eq!(n.lower, "my name is ana gomez");
    }

    #[test]
    fn test_plain_sentence_passes_through() {
        let text = "I'd like a haircut. Tomorrow works.";
        assert_eq!(normalize(text).text, text);
    }
}
