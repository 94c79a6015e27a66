//! DOM walk producing the block tree.
//!
//! Boilerplate is pruned while walking. Formatting tags map to inline
//! variants, structural tags to blocks, and every other element is a
//! transparent container whose text is kept.

use scraper::node::Node;
use scraper::ElementRef;

use super::tree::{Block, Inline, List, Table};

/// Lists nested deeper than this are flattened into a `;`-joined paragraph
pub const MAX_LIST_DEPTH: usize = 6;

/// Caps on `colspan` and `rowspan`, so one malformed cell cannot blow up a table
const MAX_COLSPAN: usize = 64;
const MAX_ROWSPAN: usize = 64;

const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "footer", "header", "template", "iframe", "form",
    "button", "input", "select", "textarea", "head", "link", "meta",
];

const SKIP_CLASSES: &[&str] = &[
    "navbar",
    "ltx_page_header",
    "ltx_page_footer",
    "ltx_page_navbar",
    "ltx_page_logo",
    "ltx_toc",
    "ltx_role_navigation",
    "sidebar",
    "breadcrumb",
    "breadcrumbs",
    "skip-link",
    "cookie-banner",
];

const SKIP_ROLES: &[&str] = &["navigation", "banner", "contentinfo", "search"];

const MEDIA_TAGS: &[&str] = &[
    "img", "picture", "svg", "video", "audio", "canvas", "object", "embed",
];

/// Containers that start and end a paragraph
const BLOCK_CONTAINERS: &[&str] = &[
    "html", "body", "main", "article", "section", "div", "aside", "figure", "figcaption",
    "address", "details", "summary", "dl", "dt", "dd", "li", "center", "caption", "tr", "td",
    "th", "thead", "tbody", "tfoot", "colgroup",
];

const EQUATION_TABLE_CLASSES: &[&str] = &["ltx_equation", "ltx_equationgroup", "ltx_eqn_table"];

/// Whether an element is page chrome rather than paper content
pub(crate) fn is_skipped(el: ElementRef<'_>) -> bool {
    let element = el.value();
    if SKIP_TAGS.contains(&element.name()) {
        return true;
    }
    if element.attr("aria-hidden") == Some("true") || element.attr("hidden").is_some() {
        return true;
    }
    if let Some(role) = element.attr("role") {
        if SKIP_ROLES.contains(&role.trim().to_ascii_lowercase().as_str()) {
            return true;
        }
    }
    element.classes().any(|class| {
        SKIP_CLASSES
            .iter()
            .any(|skip| class.eq_ignore_ascii_case(skip))
    })
}

fn is_media(name: &str) -> bool {
    MEDIA_TAGS.contains(&name)
}

fn is_block_level(name: &str) -> bool {
    BLOCK_CONTAINERS.contains(&name)
        || matches!(
            name,
            "p" | "ul" | "ol" | "table" | "pre" | "blockquote" | "hr" | "h1" | "h2" | "h3" | "h4"
                | "h5" | "h6"
        )
}

/// Collapse every whitespace run (newlines included) to one space
pub(crate) fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// TeX source of a MathML element and whether it is display math
fn math_source(el: ElementRef<'_>) -> (String, bool) {
    let display = el.value().attr("display") == Some("block");

    if let Some(alt) = el.value().attr("alttext") {
        if !alt.trim().is_empty() {
            return (collapse_whitespace(alt).trim().to_string(), display);
        }
    }

    let annotation = el.descendants().filter_map(ElementRef::wrap).find(|e| {
        e.value().name() == "annotation"
            && e.value().attr("encoding") == Some("application/x-tex")
    });
    let tex = match annotation {
        Some(a) => a.text().collect::<String>(),
        None => el.text().collect::<String>(),
    };
    (collapse_whitespace(&tex).trim().to_string(), display)
}

fn code_language(el: ElementRef<'_>) -> Option<String> {
    let code_child = el
        .children()
        .filter_map(ElementRef::wrap)
        .find(|c| c.value().name() == "code");

    std::iter::once(el)
        .chain(code_child)
        .flat_map(|e| e.value().classes())
        .find_map(|class| {
            class
                .strip_prefix("language-")
                .or_else(|| class.strip_prefix("lang-"))
        })
        .filter(|lang| !lang.is_empty())
        .map(str::to_string)
}

/// Accumulates inline content until a block boundary
#[derive(Debug, Default)]
struct BlockBuffer {
    blocks: Vec<Block>,
    inline: Vec<Inline>,
}

impl BlockBuffer {
    fn push_inline(&mut self, inline: Inline) {
        self.inline.push(inline);
    }

    fn push_block(&mut self, block: Block) {
        self.flush();
        if !block.is_empty() {
            self.blocks.push(block);
        }
    }

    fn flush(&mut self) {
        if self.inline.is_empty() {
            return;
        }
        let content = std::mem::take(&mut self.inline);
        let paragraph = Block::Paragraph(content);
        if !paragraph.is_empty() {
            self.blocks.push(paragraph);
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }
}

/// Builds a block tree from a parsed document
#[derive(Debug, Default)]
pub(crate) struct TreeBuilder {
    images_dropped: usize,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Media elements dropped so far
    pub fn images_dropped(&self) -> usize {
        self.images_dropped
    }

    pub fn build(&mut self, root: ElementRef<'_>) -> Vec<Block> {
        let mut buf = BlockBuffer::default();
        self.walk_block(root, &mut buf, 0);
        buf.finish()
    }

    fn walk_children(&mut self, el: ElementRef<'_>, buf: &mut BlockBuffer, list_depth: usize) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => buf.push_inline(Inline::Text(collapse_whitespace(text))),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.walk_block(child, buf, list_depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn walk_block(&mut self, el: ElementRef<'_>, buf: &mut BlockBuffer, list_depth: usize) {
        if is_skipped(el) {
            return;
        }
        let name = el.value().name();
        if is_media(name) {
            self.images_dropped += 1;
            return;
        }

        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<u8>().unwrap_or(1);
                let content = self.inlines(el);
                buf.push_block(Block::Heading { level, content });
            }
            "p" => {
                let content = self.inlines(el);
                buf.push_block(Block::Paragraph(content));
            }
            "ul" | "ol" => {
                let list = self.list(el, list_depth + 1);
                buf.push_block(list);
            }
            "table" => {
                for block in self.table(el) {
                    buf.push_block(block);
                }
            }
            "pre" => {
                let code = el.text().collect::<String>();
                let code = code.trim_start_matches('\n').trim_end().to_string();
                buf.push_block(Block::CodeBlock {
                    language: code_language(el),
                    code,
                });
            }
            "blockquote" => {
                let mut inner = BlockBuffer::default();
                self.walk_children(el, &mut inner, list_depth);
                buf.push_block(Block::Quote(inner.finish()));
            }
            "hr" => buf.push_block(Block::Rule),
            "br" => buf.push_inline(Inline::LineBreak),
            "math" => {
                let (tex, display) = math_source(el);
                if display {
                    buf.push_block(Block::Math(tex));
                } else {
                    buf.push_inline(Inline::Math { tex, display });
                }
            }
            "strong" | "b" | "em" | "i" | "code" | "kbd" | "samp" | "tt" | "a" => {
                for inline in self.inline_element(el) {
                    buf.push_inline(inline);
                }
            }
            _ if BLOCK_CONTAINERS.contains(&name) => {
                buf.flush();
                self.walk_children(el, buf, list_depth);
                buf.flush();
            }
            _ => self.walk_children(el, buf, list_depth),
        }
    }

    fn inlines(&mut self, el: ElementRef<'_>) -> Vec<Inline> {
        let mut out = Vec::new();
        for child in el.children() {
            match child.value() {
                Node::Text(text) => out.push(Inline::Text(collapse_whitespace(text))),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        out.extend(self.inline_element(child));
                    }
                }
                _ => {}
            }
        }
        out
    }

    fn inline_element(&mut self, el: ElementRef<'_>) -> Vec<Inline> {
        if is_skipped(el) {
            return Vec::new();
        }
        let name = el.value().name();
        if is_media(name) {
            self.images_dropped += 1;
            return Vec::new();
        }

        match name {
            "strong" | "b" => vec![Inline::Strong(self.inlines(el))],
            "em" | "i" => vec![Inline::Emphasis(self.inlines(el))],
            "code" | "kbd" | "samp" | "tt" => {
                vec![Inline::Code(collapse_whitespace(&el.text().collect::<String>()))]
            }
            "a" => {
                let text = self.inlines(el);
                match el.value().attr("href").map(str::trim) {
                    Some(href) if !href.is_empty() => vec![Inline::Link {
                        text,
                        href: href.to_string(),
                    }],
                    _ => text,
                }
            }
            "math" => {
                let (tex, display) = math_source(el);
                vec![Inline::Math { tex, display }]
            }
            "br" => vec![Inline::LineBreak],
            _ if is_block_level(name) => {
                let mut out = vec![Inline::Text(" ".to_string())];
                out.extend(self.inlines(el));
                out.push(Inline::Text(" ".to_string()));
                out
            }
            _ => self.inlines(el),
        }
    }

    fn plain_text(&mut self, el: ElementRef<'_>) -> String {
        let inlines = self.inlines(el);
        Inline::plain_text(&inlines)
    }

    fn list(&mut self, el: ElementRef<'_>, depth: usize) -> Block {
        let entries: Vec<ElementRef<'_>> = el
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| !is_skipped(*child))
            .collect();

        if depth > MAX_LIST_DEPTH {
            let mut items = Vec::new();
            self.flatten_list(&entries, &mut items);
            return Block::Paragraph(vec![Inline::Text(items.join("; "))]);
        }

        let ordered = el.value().name() == "ol";
        let start = if ordered {
            el.value()
                .attr("start")
                .and_then(|s| s.trim().parse::<u32>().ok())
                .unwrap_or(1)
        } else {
            1
        };

        let mut items = Vec::new();
        for entry in entries {
            let mut buf = BlockBuffer::default();
            if entry.value().name() == "li" {
                self.walk_children(entry, &mut buf, depth);
            } else {
                self.walk_block(entry, &mut buf, depth);
            }
            let blocks = buf.finish();
            if !blocks.is_empty() {
                items.push(blocks);
            }
        }

        Block::List(List {
            ordered,
            start,
            items,
        })
    }

    /// Item texts of a list and all lists nested in it, in document order
    fn flatten_list(&mut self, entries: &[ElementRef<'_>], out: &mut Vec<String>) {
        for entry in entries {
            let mut inlines = Vec::new();
            let mut nested = Vec::new();
            for child in entry.children() {
                match child.value() {
                    Node::Text(text) => inlines.push(Inline::Text(collapse_whitespace(text))),
                    Node::Element(_) => {
                        let Some(child) = ElementRef::wrap(child) else {
                            continue;
                        };
                        if matches!(child.value().name(), "ul" | "ol") && !is_skipped(child) {
                            nested.push(child);
                        } else {
                            inlines.extend(self.inline_element(child));
                        }
                    }
                    _ => {}
                }
            }

            let text = Inline::plain_text(&inlines);
            if !text.is_empty() {
                out.push(text);
            }

            for list in nested {
                let children: Vec<ElementRef<'_>> = list
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|child| !is_skipped(*child))
                    .collect();
                self.flatten_list(&children, out);
            }
        }
    }

    fn table(&mut self, el: ElementRef<'_>) -> Vec<Block> {
        let is_equation = el.value().classes().any(|class| {
            EQUATION_TABLE_CLASSES
                .iter()
                .any(|eq| class.eq_ignore_ascii_case(eq))
        });
        if is_equation {
            let equations: Vec<Block> = el
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|e| e.value().name() == "math")
                .map(|m| Block::Math(math_source(m).0))
                .filter(|b| !b.is_empty())
                .collect();
            if !equations.is_empty() {
                return equations;
            }
        }

        let mut caption = None;
        let mut row_elements = Vec::new();
        for child in el.children().filter_map(ElementRef::wrap) {
            match child.value().name() {
                "caption" => {
                    let text = self.plain_text(child);
                    if !text.is_empty() {
                        caption = Some(text);
                    }
                }
                "tr" => row_elements.push(child),
                "thead" | "tbody" | "tfoot" => row_elements.extend(
                    child
                        .children()
                        .filter_map(ElementRef::wrap)
                        .filter(|r| r.value().name() == "tr"),
                ),
                _ => {}
            }
        }

        let mut rows = Vec::new();
        // Rows still covered by a `rowspan` from above, per column
        let mut covered: Vec<usize> = Vec::new();
        for row in row_elements {
            let mut cells = Vec::new();
            let mut col = 0;

            for cell in row.children().filter_map(ElementRef::wrap) {
                if !matches!(cell.value().name(), "td" | "th") {
                    continue;
                }
                fill_covered(&mut cells, &mut col, &mut covered);

                let colspan = span_attr(cell, "colspan", MAX_COLSPAN);
                let rowspan = span_attr(cell, "rowspan", MAX_ROWSPAN);
                cells.push(self.plain_text(cell));
                cells.extend(std::iter::repeat(String::new()).take(colspan - 1));

                if covered.len() < col + colspan {
                    covered.resize(col + colspan, 0);
                }
                for slot in &mut covered[col..col + colspan] {
                    *slot = rowspan - 1;
                }
                col += colspan;
            }

            if let Some(last) = covered.iter().rposition(|&n| n > 0) {
                while col <= last {
                    fill_covered(&mut cells, &mut col, &mut covered);
                    if col <= last {
                        cells.push(String::new());
                        col += 1;
                    }
                }
            }
            if !cells.is_empty() {
                rows.push(cells);
            }
        }

        if rows.is_empty() {
            return caption
                .map(|c| Block::Paragraph(vec![Inline::Emphasis(vec![Inline::Text(c)])]))
                .into_iter()
                .collect();
        }

        vec![Block::Table(Table { caption, rows })]
    }
}

/// Emit empty cells for columns still occupied by a cell from a row above
fn fill_covered(cells: &mut Vec<String>, col: &mut usize, covered: &mut [usize]) {
    while covered.get(*col).is_some_and(|&n| n > 0) {
        covered[*col] -= 1;
        cells.push(String::new());
        *col += 1;
    }
}

/// A `colspan`/`rowspan` value, 1 when absent or unusable
fn span_attr(cell: ElementRef<'_>, name: &str, max: usize) -> usize {
    cell.value()
        .attr(name)
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, max)
}
