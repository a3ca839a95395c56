//! IRI helpers for website-relative shortening and language localisation

use crate::error::{LinkError, Result};
use url::Url;

/// Normalise an IRI received in a bulk request
///
/// Strips the fragment and a single trailing slash.
pub fn normalize_request_iri(raw: &str) -> String {
    let without_fragment = match raw.find('#') {
        Some(pos) => &raw[..pos],
        None => raw,
    };
    without_fragment
        .strip_suffix('/')
        .unwrap_or(without_fragment)
        .to_string()
}

/// Parse an IRI, mapping failures onto `LinkError::InvalidIri`
pub fn parse(iri: &str) -> Result<Url> {
    Url::parse(iri).map_err(|e| LinkError::InvalidIri(format!("{}: {}", iri, e)))
}

/// Shorten an IRI to its path relative to the website's origin
///
/// Foreign or unparsable IRIs are returned unchanged.
pub fn shorten(iri: &str, website: &Url) -> String {
    match Url::parse(iri) {
        Ok(url) if url.origin() == website.origin() => {
            let mut short = url.path().to_string();
            if let Some(query) = url.query() {
                short.push('?');
                short.push_str(query);
            }
            if let Some(fragment) = url.fragment() {
                short.push('#');
                short.push_str(fragment);
            }
            short
        }
        _ => iri.to_string(),
    }
}

/// Resolve a possibly website-relative id against the website IRI
pub fn absolutize(id: &str, website: &Url) -> Result<Url> {
    website
        .join(id)
        .map_err(|e| LinkError::InvalidIri(format!("{}: {}", id, e)))
}

/// Path component of an IRI, used for backend routing
pub fn path_of(iri: &str) -> String {
    match Url::parse(iri) {
        Ok(url) => url.path().to_string(),
        Err(_) if iri.starts_with('/') => iri.to_string(),
        Err(_) => String::from("/"),
    }
}

/// Compute the language-specific IRI of a page
///
/// The page is absolutised against the website, its final path segment is
/// replaced by `slug` when one is given, and `lang` is inserted as a path
/// segment directly after the website's own path prefix.
///
/// # Example
/// ```
/// use link_cache::iri::localize;
/// use url::Url;
///
/// let website = Url::parse("https://example.com/info").unwrap();
/// let localized = localize("https://example.com/info/about", &website, "nl", Some("over")).unwrap();
/// assert_eq!(localized, "https://example.com/info/nl/over");
/// ```
pub fn localize(page: &str, website: &Url, lang: &str, slug: Option<&str>) -> Result<String> {
    let mut url = absolutize(page, website)?;
    let prefix = website.path().trim_end_matches('/');

    let full_path = url.path().to_string();
    let rest = match full_path.strip_prefix(prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => full_path.as_str(),
    };

    let mut segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    if let Some(slug) = slug.filter(|s| !s.is_empty()) {
        match segments.last_mut() {
            Some(last) => *last = slug,
            None => segments.push(slug),
        }
    }

    let path = if segments.is_empty() {
        format!("{}/{}", prefix, lang)
    } else {
        format!("{}/{}/{}", prefix, lang, segments.join("/"))
    };
    url.set_path(&path);

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn website(iri: &str) -> Url {
        Url::parse(iri).unwrap()
    }

    #[test]
    fn test_normalize_request_iri() {
        assert_eq!(normalize_request_iri("https://a.test/x/#top"), "https://a.test/x");
        assert_eq!(normalize_request_iri("https://a.test/x/"), "https://a.test/x");
        assert_eq!(normalize_request_iri("https://a.test/x"), "https://a.test/x");
    }

    #[test]
    fn test_shorten_same_origin() {
        let site = website("https://example.com/info");
        assert_eq!(shorten("https://example.com/info/about", &site), "/info/about");
        assert_eq!(shorten("https://example.com/q?page=2#x", &site), "/q?page=2#x");
    }

    #[test]
    fn test_shorten_foreign_is_unchanged() {
        let site = website("https://example.com/");
        assert_eq!(shorten("https://other.test/about", &site), "https://other.test/about");
        assert_eq!(shorten("_:b0", &site), "_:b0");
    }

    #[test]
    fn test_localize_root_website() {
        let site = website("https://example.com/");
        assert_eq!(
            localize("https://example.com/about", &site, "en", None).unwrap(),
            "https://example.com/en/about"
        );
    }

    #[test]
    fn test_localize_with_prefix_and_slug() {
        let site = website("https://example.com/info");
        assert_eq!(
            localize("https://example.com/info/about", &site, "nl", Some("over")).unwrap(),
            "https://example.com/info/nl/over"
        );
    }

    #[test]
    fn test_localize_relative_id() {
        let site = website("https://example.com/");
        assert_eq!(
            localize("/contact", &site, "de", Some("")).unwrap(),
            "https://example.com/de/contact"
        );
    }

    #[test]
    fn test_localize_website_home() {
        let site = website("https://example.com/info");
        assert_eq!(
            localize("https://example.com/info", &site, "en", None).unwrap(),
            "https://example.com/info/en"
        );
    }

    #[test]
    fn test_path_of() {
        assert_eq!(path_of("https://a.test/orgs/1"), "/orgs/1");
        assert_eq!(path_of("/orgs/1"), "/orgs/1");
    }
}
