use url::Url;

/// Labels this long or longer are prose, not an address.
const MAX_ADDRESS_LABEL_LEN: usize = 40;

/// Minimal hostname helpers for link analysis.
pub struct DomainUtils;

impl DomainUtils {
    /// Canonicalize hostname (lowercase, remove leading www.)
    pub fn canonicalize_domain(domain: &str) -> String {
        let domain_lower = domain.to_lowercase();
        if let Some(stripped) = domain_lower.strip_prefix("www.") {
            stripped.to_string()
        } else {
            domain_lower
        }
    }

    /// Does a visible link label read like a URL or bare domain?
    pub fn looks_like_address(label: &str) -> bool {
        label.contains('.') && label.chars().count() < MAX_ADDRESS_LABEL_LEN
    }

    /// Parse a link label as a URL, prefixing `http://` when it has no
    /// scheme. Returns the canonical hostname.
    pub fn label_host(label: &str) -> Result<String, url::ParseError> {
        let candidate = if label.to_ascii_lowercase().starts_with("http") {
            label.to_string()
        } else {
            format!("http://{label}")
        };
        let parsed = Url::parse(&candidate)?;
        parsed
            .host_str()
            .map(Self::canonicalize_domain)
            .ok_or(url::ParseError::EmptyHost)
    }

    /// Canonical hostname of an already-resolved URL, if it has one.
    pub fn url_host(url: &Url) -> Option<String> {
        url.host_str().map(Self::canonicalize_domain)
    }

    /// Resolve an `href` the way a browser would, against the page URL when
    /// one is known.
    pub fn resolve_href(href: &str, base: Option<&Url>) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        match base {
            Some(base) => base.join(href).ok(),
            None => Url::parse(href).ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_domain() {
        assert_eq!(
            DomainUtils::canonicalize_domain("www.example.com"),
            "example.com"
        );
        assert_eq!(
            DomainUtils::canonicalize_domain("Example.com"),
            "example.com"
        );
        // only the leading label is stripped
        assert_eq!(
            DomainUtils::canonicalize_domain("login.www.example.com"),
            "login.www.example.com"
        );
    }

    #[test]
    fn test_looks_like_address() {
        assert!(DomainUtils::looks_like_address("bank.com"));
        assert!(DomainUtils::looks_like_address("https://www.bank.com/login"));
        assert!(!DomainUtils::looks_like_address("Click here"));
        assert!(!DomainUtils::looks_like_address(
            "This sentence mentions bank.com but is far too long to be an address"
        ));
    }

    #[test]
    fn test_label_host() {
        assert_eq!(DomainUtils::label_host("bank.com").unwrap(), "bank.com");
        assert_eq!(
            DomainUtils::label_host("https://www.bank.com/login").unwrap(),
            "bank.com"
        );
        assert!(DomainUtils::label_host("pay now. really").is_err());
    }

    #[test]
    fn test_resolve_href() {
        let base = Url::parse("https://shop.example.com/cart/").unwrap();
        let resolved = DomainUtils::resolve_href("../login", Some(&base)).unwrap();
        assert_eq!(resolved.as_str(), "https://shop.example.com/login");
        assert!(DomainUtils::resolve_href("/relative", None).is_none());
        assert!(DomainUtils::resolve_href("   ", Some(&base)).is_none());
    }
}
