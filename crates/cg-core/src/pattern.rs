//! Anchored URL patterns for navigation rules
//!
//! Every pattern has the same shape: an `http`/`https` scheme, zero or more
//! subdomain labels each ending in a dot, the host part, then `/`, `:` or the
//! end of the URL. The terminator keeps `example.com` from matching
//! `example.com.evil.com` and the dotted prefix keeps it from matching
//! `notexample.com`.

const SCHEME_PREFIX: &str = "^https?://";
const SUBDOMAIN_LABELS: &str = r"([^/]+\.)*";
const HOST_TERMINATOR: &str = "([/:]|$)";

/// Pattern matching any http(s) URL. Used by the catch-all redirect.
pub const ANY_WEB_URL: &str = SCHEME_PREFIX;

/// Build a pattern matching `domain` and all of its subdomains.
pub fn to_match_pattern(domain: &str) -> String {
    format!(
        "{SCHEME_PREFIX}{SUBDOMAIN_LABELS}{}{HOST_TERMINATOR}",
        regex::escape(domain.trim())
    )
}

/// Build a pattern matching any host under one of `tlds`.
pub fn tld_pattern(tlds: &[&str]) -> String {
    let alternatives: Vec<String> = tlds.iter().map(|tld| regex::escape(tld)).collect();
    let tld = match alternatives.as_slice() {
        [single] => single.clone(),
        _ => format!("({})", alternatives.join("|")),
    };
    format!(r"{SCHEME_PREFIX}{SUBDOMAIN_LABELS}[^/:]+\.{tld}{HOST_TERMINATOR}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::is_valid;
    use proptest::prelude::*;
    use regex::{Regex, RegexBuilder};

    fn compile(pattern: &str) -> Regex {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .expect("pattern should compile")
    }

    #[test]
    fn test_pattern_shape() {
        assert_eq!(
            to_match_pattern("example.com"),
            r"^https?://([^/]+\.)*example\.com([/:]|$)"
        );
        assert_eq!(to_match_pattern("  example.com "), to_match_pattern("example.com"));
    }

    #[test]
    fn test_matches_domain_and_subdomains() {
        let re = compile(&to_match_pattern("example.com"));
        assert!(re.is_match("https://example.com"));
        assert!(re.is_match("http://example.com/"));
        assert!(re.is_match("https://www.example.com/x"));
        assert!(re.is_match("https://a.b.example.com:8443/path"));
        assert!(re.is_match("HTTPS://WWW.EXAMPLE.COM/"));
    }

    #[test]
    fn test_rejects_lookalikes() {
        let re = compile(&to_match_pattern("example.com"));
        assert!(!re.is_match("https://notexample.com"));
        assert!(!re.is_match("https://evil.com/"));
        assert!(!re.is_match("https://example.com.evil.com/"));
        assert!(!re.is_match("https://exampleXcom/"));
        assert!(!re.is_match("ftp://example.com/"));
        assert!(!re.is_match("https://evil.com/?next=https://example.com"));
    }

    #[test]
    fn test_escapes_metacharacters() {
        let pattern = to_match_pattern("a+b.com");
        assert!(pattern.contains(r"a\+b\.com"));
        let re = compile(&pattern);
        assert!(re.is_match("https://a+b.com/"));
        assert!(!re.is_match("https://aab.com/"));
    }

    #[test]
    fn test_tld_pattern() {
        assert_eq!(tld_pattern(&["com"]), r"^https?://([^/]+\.)*[^/:]+\.com([/:]|$)");

        let re = compile(&tld_pattern(&["org", "in"]));
        assert!(re.is_match("https://example.org"));
        assert!(re.is_match("https://www.gov.in/"));
        assert!(re.is_match("http://wikipedia.org:80/wiki"));
        assert!(!re.is_match("https://example.com/"));
        assert!(!re.is_match("https://example.org.xyz/"));
        assert!(!re.is_match("https://example.info/"));
        assert!(!re.is_match("https://org/"));
    }

    #[test]
    fn test_any_web_url() {
        let re = compile(ANY_WEB_URL);
        assert!(re.is_match("https://example.xyz"));
        assert!(re.is_match("http://10.0.0.1/"));
        assert!(!re.is_match("chrome://settings"));
    }

    fn label() -> impl Strategy<Value = String> {
        "[a-z0-9]([a-z0-9-]{0,10}[a-z0-9])?"
    }

    fn valid_domain() -> impl Strategy<Value = String> {
        prop::collection::vec(label(), 1..5).prop_map(|labels| labels.join("."))
    }

    proptest! {
        #[test]
        fn prop_pattern_matches_subdomain_urls(domain in valid_domain()) {
            prop_assert!(is_valid(&domain));
            let re = compile(&to_match_pattern(&domain));

            let subdomain_url = format!("https://www.{}/x", domain);
            let bare_url = format!("http://{}", domain);
            let prefixed_url = format!("https://not{}/x", domain);
            prop_assert!(re.is_match(&subdomain_url));
            prop_assert!(re.is_match(&bare_url));
            prop_assert!(!re.is_match(&prefixed_url));
        }

        #[test]
        fn prop_pattern_rejects_suffixed_hosts(domain in valid_domain()) {
            // A domain that itself ends in evil.com legitimately covers the suffixed host.
            prop_assume!(domain != "evil.com" && !domain.ends_with(".evil.com"));
            let re = compile(&to_match_pattern(&domain));

            let suffixed_url = format!("https://{}.evil.com/x", domain);
            prop_assert!(!re.is_match(&suffixed_url));
        }
    }
}
