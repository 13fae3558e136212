use url::Url;

/// Hostname of an absolute URL, or `None` when the URL does not parse or has no host.
pub fn extract_domain(raw_url: &str) -> Option<String> {
    Url::parse(raw_url.trim())
        .ok()
        .and_then(|url| url.host_str().map(ToOwned::to_owned))
        .filter(|host| !host.is_empty())
}

/// `scheme://hostname` for the URL. Unparsable input is returned unchanged.
pub fn root_url(raw_url: &str) -> String {
    Url::parse(raw_url.trim())
        .ok()
        .and_then(|url| {
            url.host_str()
                .filter(|host| !host.is_empty())
                .map(|host| format!("{}://{host}", url.scheme()))
        })
        .unwrap_or_else(|| raw_url.to_string())
}

pub fn normalize_to_hostname(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    let host = if lowered.contains("://") {
        Url::parse(&lowered)
            .ok()
            .and_then(|url| url.host_str().map(ToOwned::to_owned))
            .unwrap_or(lowered)
    } else {
        lowered
    };

    let bare = host.strip_prefix("www.").unwrap_or(&host);
    bare.split('/').next().unwrap_or_default().to_string()
}

pub fn is_ignored(domain: &str, ignored_domains: &[String]) -> bool {
    let bare = normalize_to_hostname(domain);

    ignored_domains
        .iter()
        .map(|rule| normalize_to_hostname(rule))
        .filter(|rule| !rule.is_empty())
        .any(|rule| bare == rule || bare.ends_with(&format!(".{rule}")))
}

#[cfg(test)]
mod tests {
    use super::{extract_domain, is_ignored, normalize_to_hostname, root_url};

    #[test]
    fn extracts_hostname_from_absolute_url() {
        assert_eq!(
            extract_domain("https://mail.google.com/mail/u/0/#inbox").as_deref(),
            Some("mail.google.com")
        );
        assert_eq!(extract_domain("http://A.com").as_deref(), Some("a.com"));
    }

    #[test]
    fn rejects_relative_and_hostless_urls() {
        assert!(extract_domain("not a url").is_none());
        assert!(extract_domain("/relative/path").is_none());
        assert!(extract_domain("mailto:someone@example.com").is_none());
        assert!(extract_domain("").is_none());
    }

    #[test]
    fn root_url_drops_path_query_and_fragment() {
        assert_eq!(root_url("http://a.com/path1?q=1#top"), "http://a.com");
        assert_eq!(
            root_url("https://news.ycombinator.com/item?id=1"),
            "https://news.ycombinator.com"
        );
    }

    #[test]
    fn root_url_falls_back_to_input() {
        assert_eq!(root_url("garbage"), "garbage");
    }

    #[test]
    fn normalizes_scheme_www_and_path() {
        assert_eq!(normalize_to_hostname("https://www.Example.com/foo"), "example.com");
        assert_eq!(normalize_to_hostname(" www.example.com/bar "), "example.com");
        assert_eq!(normalize_to_hostname("example.com"), "example.com");
    }

    #[test]
    fn ignores_exact_and_subdomain_matches() {
        let ignored = vec!["example.com".to_string()];

        assert!(is_ignored("example.com", &ignored));
        assert!(is_ignored("ads.example.com", &ignored));
        assert!(is_ignored("www.example.com", &ignored));
        assert!(!is_ignored("badexample.com", &ignored));
        assert!(!is_ignored("example.org", &ignored));
    }

    #[test]
    fn ignore_rules_accept_urls() {
        let ignored = vec!["https://www.localhost/".to_string()];
        assert!(is_ignored("localhost", &ignored));
        assert!(!is_ignored("anything.com", &[]));
    }
}
