//! URL canonicalization for persisted entries.

/// Canonical form under which a URL is stored.
///
/// Every trailing `/` and `.` is stripped (in any interleaving, so the result
/// is a fixed point), then the host is lowercased. Path, query, scheme and
/// userinfo are left as given. URLs without a `scheme://` prefix have no
/// recognisable host and are only trimmed.
#[must_use]
pub fn canonical_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches(['/', '.']);

    let Some(scheme_end) = trimmed.find("://") else {
        return trimmed.to_string();
    };

    let authority_start = scheme_end + 3;
    let rest = &trimmed[authority_start..];
    let authority_len = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..authority_len];

    let (userinfo, host) = match authority.rfind('@') {
        Some(at) => authority.split_at(at + 1),
        None => ("", authority),
    };

    format!(
        "{}{userinfo}{}{}",
        &trimmed[..authority_start],
        host.to_lowercase(),
        &rest[authority_len..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_host() {
        assert_eq!(
            canonical_url("HTTP://WWW.Example.COM/Path/To"),
            "HTTP://www.example.com/Path/To"
        );
    }

    #[test]
    fn test_strip_trailing_slash_and_dot() {
        assert_eq!(canonical_url("http://example.com/"), "http://example.com");
        assert_eq!(canonical_url("http://example.com//"), "http://example.com");
        assert_eq!(canonical_url("http://example.com."), "http://example.com");
        assert_eq!(canonical_url("http://example.com/a./"), "http://example.com/a");
        assert_eq!(canonical_url("http://example.com/./"), "http://example.com");
    }

    #[test]
    fn test_host_only_lowercased() {
        assert_eq!(
            canonical_url("https://User:Pw@Example.COM:8080/A?Q=B#F"),
            "https://User:Pw@example.com:8080/A?Q=B#F"
        );
        assert_eq!(canonical_url("https://EXAMPLE.com?Q=1"), "https://example.com?Q=1");
    }

    #[test]
    fn test_schemeless_only_trimmed() {
        assert_eq!(canonical_url("Example.com/"), "Example.com");
    }

    #[test]
    fn test_idempotent() {
        for url in [
            "http://Example.com/a/",
            "https://x.org/.",
            "https://EXAMPLE.com?Q=1",
        ] {
            let once = canonical_url(url);
            assert_eq!(canonical_url(&once), once);
        }
    }
}
