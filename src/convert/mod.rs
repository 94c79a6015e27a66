//! HTML to markdown conversion.
//!
//! [`convert`] parses a paper's HTML rendering, prunes page chrome, builds a
//! small block tree and renders it as markdown:
//!
//! - `h1`..`h6` become ATX headings
//! - tables become pipe tables whose first row is the header
//! - MathML becomes `$tex$` / `$$tex$$`
//! - images and other media are dropped and counted
//!
//! Conversion is pure and deterministic: the same input always yields
//! byte-identical output.
//!
//! Nested tables are flattened into the enclosing cell's text. Lists nested
//! deeper than [`MAX_LIST_DEPTH`] levels collapse into one `;`-joined
//! paragraph at the deepest allowed level.

mod builder;
mod metadata;
mod render;
mod tree;

pub use builder::MAX_LIST_DEPTH;
pub use metadata::PaperMetadata;
pub use render::MarkdownRenderer;
pub use tree::{Block, Inline, List, Table, Visitor};

use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;

use builder::TreeBuilder;

static MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?[a-z][a-z0-9-]*(\s[^<>]*)?/?>|<!doctype|<!--").expect("valid markup regex")
});

/// Errors produced by [`convert`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("Empty HTML payload")]
    Empty,

    #[error("Payload is not HTML: {0}")]
    NotHtml(String),

    #[error("HTML contains no convertible content")]
    NoContent,
}

/// Result of a successful conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedPaper {
    pub markdown: String,
    pub metadata: PaperMetadata,
    /// Images, figures and other media left out of the markdown
    pub images_dropped: usize,
}

/// Convert an HTML document to markdown
pub fn convert(html: &str) -> Result<ConvertedPaper, ConversionError> {
    if html.trim().is_empty() {
        return Err(ConversionError::Empty);
    }
    if html.contains('\0') {
        return Err(ConversionError::NotHtml(
            "payload contains NUL bytes".to_string(),
        ));
    }
    if !MARKUP.is_match(html) {
        return Err(ConversionError::NotHtml("no HTML markup found".to_string()));
    }

    let document = Html::parse_document(html);
    let metadata = PaperMetadata::extract(&document);

    let mut builder = TreeBuilder::new();
    let blocks = builder.build(document.root_element());
    let markdown = MarkdownRenderer::new().render(&blocks);

    if markdown.trim().is_empty() {
        return Err(ConversionError::NoContent);
    }

    tracing::debug!(
        blocks = blocks.len(),
        images_dropped = builder.images_dropped(),
        "Converted HTML to {} bytes of markdown",
        markdown.len()
    );

    Ok(ConvertedPaper {
        markdown,
        metadata,
        images_dropped: builder.images_dropped(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAPER: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <title>Sparse Attention</title>
  <meta name="citation_title" content="Sparse Attention">
  <meta name="citation_author" content="Ada Lovelace">
  <style>body { color: red; }</style>
</head>
<body>
  <nav class="ltx_page_navbar"><a href="/">Home</a></nav>
  <header class="desktop_header">arXiv HTML</header>
  <article class="ltx_document">
    <h1 class="ltx_title ltx_title_document">Sparse Attention</h1>
    <div class="ltx_abstract"><p class="ltx_p">We make attention <em>sparse</em>.</p></div>
    <section class="ltx_section">
      <h2 class="ltx_title ltx_title_section">1 Introduction</h2>
      <div class="ltx_para"><p class="ltx_p">Cost grows as
        <math alttext="O(n^{2})" display="inline"><mi>O</mi></math> in the
        <a href="https://example.org/len">length</a>.</p></div>
      <figure class="ltx_figure"><img src="x1.png" alt="plot"><figcaption>Figure 1: Cost.</figcaption></figure>
      <table class="ltx_equation ltx_eqn_table"><tr>
        <td><math alttext="a=b+c" display="block"><mi>a</mi></math></td><td>(1)</td>
      </tr></table>
      <ul><li>fast</li><li>small</li></ul>
    </section>
  </article>
  <footer class="ltx_page_footer">Generated by LaTeXML</footer>
  <script>track();</script>
</body>
</html>"#;

    #[test]
    fn test_convert_paper() {
        let converted = convert(PAPER).unwrap();
        let expected = "\
# Sparse Attention

We make attention *sparse*.

## 1 Introduction

Cost grows as $O(n^{2})$ in the [length](https://example.org/len).

Figure 1: Cost.

$$a=b+c$$

- fast
- small
";
        assert_eq!(converted.markdown, expected);
        assert_eq!(converted.images_dropped, 1);
        assert_eq!(converted.metadata.title.as_deref(), Some("Sparse Attention"));
        assert_eq!(converted.metadata.authors, vec!["Ada Lovelace"]);
        assert_eq!(
            converted.metadata.abstract_text.as_deref(),
            Some("We make attention sparse.")
        );
    }

    #[test]
    fn test_convert_is_deterministic() {
        let first = convert(PAPER).unwrap();
        let second = convert(PAPER).unwrap();
        assert_eq!(first.markdown.as_bytes(), second.markdown.as_bytes());
    }

    #[test]
    fn test_three_by_two_table() {
        let html = r#"<table>
            <tr><th>Model</th><th>BLEU</th></tr>
            <tr><td>Base</td><td>27.3</td></tr>
            <tr><td>Big</td><td>28.4</td></tr>
        </table>"#;
        let converted = convert(html).unwrap();
        assert_eq!(
            converted.markdown,
            "| Model | BLEU |\n| --- | --- |\n| Base | 27.3 |\n| Big | 28.4 |\n"
        );
    }

    #[test]
    fn test_plain_text_does_not_become_structure() {
        let converted = convert(
            "<p># of samples</p><p>1. is the first</p><p>- minus</p><p>&gt; quoted?</p>\
             <p>see [x](y) for $5</p>",
        )
        .unwrap();
        assert_eq!(
            converted.markdown,
            "\\# of samples\n\n1\\. is the first\n\n\\- minus\n\n\\> quoted?\n\n\
             see \\[x\\](y) for \\$5\n"
        );
    }

    #[test]
    fn test_multirow_cell_keeps_columns() {
        let html = r#"<table>
            <tr><th>Group</th><th>Model</th><th>Acc</th></tr>
            <tr><td rowspan="2">CNN</td><td>A</td><td>1</td></tr>
            <tr><td>B</td><td>2</td></tr>
        </table>"#;
        assert_eq!(
            convert(html).unwrap().markdown,
            "| Group | Model | Acc |\n| --- | --- | --- |\n| CNN | A | 1 |\n|  | B | 2 |\n"
        );
    }

    #[test]
    fn test_ordered_list_and_breaks() {
        let html = "<ol start=\"2\"><li>two<br>lines</li><li>three</li></ol><hr><blockquote><p>quoted</p></blockquote>";
        let converted = convert(html).unwrap();
        assert_eq!(
            converted.markdown,
            "2. two\\\n   lines\n3. three\n\n---\n\n> quoted\n"
        );
    }

    #[test]
    fn test_output_shape() {
        let converted = convert("<p>a</p>\n\n\n<p>b</p>").unwrap();
        assert_eq!(converted.markdown, "a\n\nb\n");
        assert!(!converted.markdown.contains("\n\n\n"));
    }

    #[test]
    fn test_rejects_bad_payloads() {
        assert_eq!(convert(""), Err(ConversionError::Empty));
        assert_eq!(convert("  \n\t"), Err(ConversionError::Empty));
        assert!(matches!(
            convert("<p>a\0b</p>"),
            Err(ConversionError::NotHtml(_))
        ));
        assert!(matches!(
            convert("just some plain text, 1 < 2"),
            Err(ConversionError::NotHtml(_))
        ));
        assert!(matches!(
            convert("{\"error\": \"not found\"}"),
            Err(ConversionError::NotHtml(_))
        ));
    }

    #[test]
    fn test_chrome_only_page_has_no_content() {
        let html = "<html><head><title>t</title></head><body><nav>menu</nav><script>x()</script><img src=a.png></body></html>";
        assert_eq!(convert(html), Err(ConversionError::NoContent));
    }
}
