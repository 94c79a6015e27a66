//! Best-effort title, author and abstract extraction.
//!
//! Highwire `citation_*` meta tags win when present; otherwise the LaTeXML
//! markup arXiv's HTML renderer emits is used, then generic HTML.

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use super::builder::collapse_whitespace;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid static selector")
}

static CITATION_TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[name="citation_title"]"#));
static CITATION_AUTHOR: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[name="citation_author"]"#));
static CITATION_ABSTRACT: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[name="citation_abstract"]"#));
static DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[name="description"]"#));
static LTX_TITLE: LazyLock<Selector> = LazyLock::new(|| selector(".ltx_title_document"));
static LTX_AUTHOR: LazyLock<Selector> =
    LazyLock::new(|| selector(".ltx_authors .ltx_personname"));
static LTX_ABSTRACT: LazyLock<Selector> = LazyLock::new(|| selector(".ltx_abstract p"));
static H1: LazyLock<Selector> = LazyLock::new(|| selector("h1"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("title"));

/// Metadata recovered from a paper's HTML
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaperMetadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub abstract_text: Option<String>,
}

impl PaperMetadata {
    pub fn extract(document: &Html) -> Self {
        Self {
            title: extract_title(document),
            authors: extract_authors(document),
            abstract_text: extract_abstract(document),
        }
    }
}

fn meta_content(document: &Html, sel: &Selector) -> Option<String> {
    document
        .select(sel)
        .filter_map(|m| m.value().attr("content"))
        .map(clean)
        .find(|s| !s.is_empty())
}

fn element_text(el: ElementRef<'_>) -> String {
    clean(&el.text().collect::<String>())
}

fn first_text(document: &Html, sel: &Selector) -> Option<String> {
    document
        .select(sel)
        .map(element_text)
        .find(|s| !s.is_empty())
}

fn clean(text: &str) -> String {
    collapse_whitespace(text).trim().to_string()
}

fn extract_title(document: &Html) -> Option<String> {
    meta_content(document, &CITATION_TITLE)
        .or_else(|| first_text(document, &LTX_TITLE))
        .or_else(|| first_text(document, &H1))
        .or_else(|| first_text(document, &TITLE))
}

fn extract_authors(document: &Html) -> Vec<String> {
    let mut authors: Vec<String> = document
        .select(&CITATION_AUTHOR)
        .filter_map(|m| m.value().attr("content"))
        .map(clean)
        .filter(|s| !s.is_empty())
        .collect();

    if authors.is_empty() {
        authors = document
            .select(&LTX_AUTHOR)
            .map(element_text)
            .filter(|s| !s.is_empty())
            .collect();
    }

    let mut seen = std::collections::HashSet::new();
    authors.retain(|a| seen.insert(a.clone()));
    authors
}

fn extract_abstract(document: &Html) -> Option<String> {
    meta_content(document, &CITATION_ABSTRACT)
        .or_else(|| {
            let paragraphs: Vec<String> = document
                .select(&LTX_ABSTRACT)
                .map(element_text)
                .filter(|s| !s.is_empty())
                .collect();
            (!paragraphs.is_empty()).then(|| paragraphs.join("\n\n"))
        })
        .or_else(|| meta_content(document, &DESCRIPTION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_citation_meta_tags_win() {
        let html = r#"<html><head>
            <title>arXiv page</title>
            <meta name="citation_title" content="Deep  Learning">
            <meta name="citation_author" content="LeCun, Yann">
            <meta name="citation_author" content="Bengio, Yoshua">
            <meta name="citation_author" content="LeCun, Yann">
            <meta name="citation_abstract" content="A review.">
            </head><body><h1 class="ltx_title_document">Other</h1></body></html>"#;
        let meta = PaperMetadata::extract(&Html::parse_document(html));
        assert_eq!(meta.title.as_deref(), Some("Deep Learning"));
        assert_eq!(meta.authors, vec!["LeCun, Yann", "Bengio, Yoshua"]);
        assert_eq!(meta.abstract_text.as_deref(), Some("A review."));
    }

    #[test]
    fn test_latexml_markup_fallback() {
        let html = r#"<html><body>
            <h1 class="ltx_title ltx_title_document">Graph
               Networks</h1>
            <div class="ltx_authors">
              <span class="ltx_creator ltx_role_author"><span class="ltx_personname">Ada Lovelace</span></span>
              <span class="ltx_creator ltx_role_author"><span class="ltx_personname">Alan Turing</span></span>
            </div>
            <div class="ltx_abstract"><h6>Abstract</h6><p class="ltx_p">We study graphs.</p></div>
            </body></html>"#;
        let meta = PaperMetadata::extract(&Html::parse_document(html));
        assert_eq!(meta.title.as_deref(), Some("Graph Networks"));
        assert_eq!(meta.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(meta.abstract_text.as_deref(), Some("We study graphs."));
    }

    #[test]
    fn test_missing_metadata() {
        let meta = PaperMetadata::extract(&Html::parse_document("<p>just text</p>"));
        assert_eq!(meta, PaperMetadata::default());
    }

    #[test]
    fn test_title_element_fallback() {
        let meta = PaperMetadata::extract(&Html::parse_document(
            "<html><head><title> A Title </title></head><body><p>x</p></body></html>",
        ));
        assert_eq!(meta.title.as_deref(), Some("A Title"));
    }
}
