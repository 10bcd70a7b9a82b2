//! Google Docs links referenced from an episode description.
use once_cell::sync::Lazy;
use regex::Regex;

static HREF_DOC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)href=["']([^"']*https://docs\.google\.com/document[^"']*)["']"#)
        .expect("valid href regex")
});
static BARE_DOC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)https://docs\.google\.com/document/[^\s<>"'()]+"#).expect("valid url regex")
});

/// Google Docs links in a description, href targets first, then bare URLs.
/// Each URL appears once, in order of first sighting.
pub fn extract_google_docs_urls(description: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    if description.trim().is_empty() {
        return urls;
    }

    let hrefs = HREF_DOC
        .captures_iter(description)
        .filter_map(|c| c.get(1).map(|m| m.as_str()));
    let bare = BARE_DOC.find_iter(description).map(|m| m.as_str());

    for url in hrefs.chain(bare) {
        if !url.is_empty() && !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn href_and_bare_urls_once_each() {
        let text = r#"<p><a href="https://docs.google.com/document/d/ABC">notas</a></p>
            Transcripción: https://docs.google.com/document/d/XYZ
            otra vez https://docs.google.com/document/d/XYZ y <a href='https://docs.google.com/document/d/ABC'>x</a>"#;
        assert_eq!(
            extract_google_docs_urls(text),
            vec![
                "https://docs.google.com/document/d/ABC".to_string(),
                "https://docs.google.com/document/d/XYZ".to_string(),
            ]
        );
    }

    #[test]
    fn ignores_other_hosts_and_doc_types() {
        let text = "https://docs.google.com/spreadsheets/d/S1 https://example.com/document/d/E";
        assert!(extract_google_docs_urls(text).is_empty());
    }

    #[test]
    fn bare_url_stops_at_markup() {
        let text = "(https://docs.google.com/document/d/Q1/edit)<br>";
        assert_eq!(
            extract_google_docs_urls(text),
            vec!["https://docs.google.com/document/d/Q1/edit".to_string()]
        );
    }

    #[test]
    fn empty_input() {
        assert!(extract_google_docs_urls("").is_empty());
        assert!(extract_google_docs_urls("   ").is_empty());
    }
}
