use once_cell::sync::Lazy;
use regex::Regex;

/// Mail providers whose domain customers routinely leave unfinished.
pub const PROVIDER_DOMAINS: &[(&str, &str)] = &[
    ("gmail", "gmail.com"),
    ("googlemail", "googlemail.com"),
    ("yahoo", "yahoo.com"),
    ("outlook", "outlook.com"),
    ("hotmail", "hotmail.com"),
    ("icloud", "icloud.com"),
    ("aol", "aol.com"),
    ("protonmail", "protonmail.com"),
    ("proton", "proton.me"),
];

/// "email is", "mail id:", "e-mail address is": what usually precedes a
/// dictated address. Matches through the trailing space.
pub static EMAIL_CUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:e-?mail|mail)(?:\s+(?:address|id))?(?:\s+(?:is|was|would\s+be|will\s+be))?:?\s+",
    )
    .unwrap()
});

static EMAIL_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9\-]+(?:\.[a-z0-9\-]+)*\.[a-z]{2,}$").unwrap()
});

/// Turns an email-like token into a valid address, completing bare provider
/// domains ("jane@yahoo" -> "jane@yahoo.com"). Returns `None` when the token
/// still is not `local@domain.tld` after repair.
pub fn repair(candidate: &str) -> Option<String> {
    let token: String = candidate
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let token = token.trim_matches(|c: char| {
        matches!(c, '.' | ',' | '!' | '?' | ';' | ':' | '"' | '\'' | '(' | ')' | '<' | '>')
    });

    let (local, domain) = token.rsplit_once('@')?;
    // Dictated addresses sometimes carry an extra "at": "shresth@4236@gmail".
    let local = local.replace('@', "");
    if local.is_empty() {
        return None;
    }

    let email = format!("{local}@{}", complete_domain(domain));
    EMAIL_SHAPE.is_match(&email).then_some(email)
}

fn complete_domain(domain: &str) -> String {
    let domain = domain.trim_matches('.');
    for (provider, canonical) in PROVIDER_DOMAINS {
        if domain == *provider {
            return canonical.to_string();
        }
        // "gmailcom": the spoken "dot" got lost
        if let Some(tld) = canonical.strip_prefix(provider).and_then(|s| s.strip_prefix('.')) {
            if domain.strip_prefix(provider) == Some(tld) {
                return canonical.to_string();
            }
        }
    }
    domain.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::extraction::normalize;

    #[test]
    fn test_spoken_address_after_normalization() {
        let n = normalize("john at the rate gmail dot com");
        assert_eq!(repair(&n.lower), Some("john@gmail.com".to_string()));
    }

    #[test]
    fn test_bare_provider_completed() {
        assert_eq!(repair("jane@yahoo"), Some("jane@yahoo.com".to_string()));
        assert_eq!(repair("sam@Outlook."), Some("sam@outlook.com".to_string()));
        assert_eq!(repair("lee@proton"), Some("lee@proton.me".to_string()));
    }

    #[test]
    fn test_not_an_email() {
        assert_eq!(repair("not-an-email"), None);
        assert_eq!(repair("@gmail.com"), None);
        assert_eq!(repair("bob@localhost"), None);
    }

    #[test]
    fn test_trailing_punctuation_stripped() {
        assert_eq!(
            repair("anna.k@example.org."),
            Some("anna.k@example.org".to_string())
        );
    }

    #[test]
    fn test_double_at_dictation_joined() {
        assert_eq!(
            repair("shresth@4236@gmail.com"),
            Some("shresth4236@gmail.com".to_string())
        );
    }

    #[test]
    fn test_missing_dot_repaired() {
        assert_eq!(repair("mo@gmailcom"), Some("mo@gmail.com".to_string()));
        assert_eq!(repair("mo@protonme"), Some("mo@proton.me".to_string()));
    }

    #[test]
    fn test_only_listed_providers_completed() {
        assert_eq!(
            repair("jane@googlemail"),
            Some("jane@googlemail.com".to_string())
        );
        // "live" is an ordinary word as often as a provider
        assert_eq!(repair("jane@live"), None);
    }

    #[test]
    fn test_unknown_domain_kept() {
        assert_eq!(
            repair("info@glossandglow.co.uk"),
            Some("info@glossandglow.co.uk".to_string())
        );
    }
}
