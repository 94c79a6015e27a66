//! Intermediate document tree between the HTML DOM and markdown.

/// Inline content inside a paragraph, heading or list item
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Strong(Vec<Inline>),
    Emphasis(Vec<Inline>),
    Code(String),
    Link { text: Vec<Inline>, href: String },
    Math { tex: String, display: bool },
    LineBreak,
}

impl Inline {
    /// Flatten inline content to unformatted text
    ///
    /// Math keeps its `$` delimiters; line breaks become spaces.
    pub fn plain_text(inlines: &[Inline]) -> String {
        let mut out = String::new();
        for inline in inlines {
            inline.write_plain(&mut out);
        }
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn write_plain(&self, out: &mut String) {
        match self {
            Inline::Text(text) | Inline::Code(text) => out.push_str(text),
            Inline::Strong(children) | Inline::Emphasis(children) => {
                for child in children {
                    child.write_plain(out);
                }
            }
            Inline::Link { text, .. } => {
                for child in text {
                    child.write_plain(out);
                }
            }
            Inline::Math { tex, .. } => {
                out.push('$');
                out.push_str(tex);
                out.push('$');
            }
            Inline::LineBreak => out.push(' '),
        }
    }

    /// Whether this renders to nothing visible
    pub fn is_blank(&self) -> bool {
        match self {
            Inline::Text(text) | Inline::Code(text) => text.trim().is_empty(),
            Inline::Strong(children) | Inline::Emphasis(children) => {
                children.iter().all(Inline::is_blank)
            }
            Inline::Link { text, href } => text.iter().all(Inline::is_blank) && href.is_empty(),
            Inline::Math { tex, .. } => tex.trim().is_empty(),
            Inline::LineBreak => true,
        }
    }
}

/// A list; each item is a sequence of blocks
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub ordered: bool,
    pub start: u32,
    pub items: Vec<Vec<Block>>,
}

/// A table of plain-text cells; the first row is the header
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub caption: Option<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Widest row, which every rendered row is padded to
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, content: Vec<Inline> },
    Paragraph(Vec<Inline>),
    List(List),
    Table(Table),
    CodeBlock { language: Option<String>, code: String },
    Quote(Vec<Block>),
    Math(String),
    Rule,
}

impl Block {
    pub fn is_empty(&self) -> bool {
        match self {
            Block::Heading { content, .. } | Block::Paragraph(content) => {
                content.iter().all(Inline::is_blank)
            }
            Block::List(list) => list.items.is_empty(),
            Block::Table(table) => table.width() == 0,
            Block::CodeBlock { code, .. } => code.trim().is_empty(),
            Block::Quote(blocks) => blocks.iter().all(Block::is_empty),
            Block::Math(tex) => tex.trim().is_empty(),
            Block::Rule => false,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Block::List(_))
    }

    /// Dispatch to the matching visitor method
    pub fn accept<V: Visitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            Block::Heading { level, content } => visitor.visit_heading(*level, content),
            Block::Paragraph(content) => visitor.visit_paragraph(content),
            Block::List(list) => visitor.visit_list(list),
            Block::Table(table) => visitor.visit_table(table),
            Block::CodeBlock { language, code } => {
                visitor.visit_code_block(language.as_deref(), code)
            }
            Block::Quote(blocks) => visitor.visit_quote(blocks),
            Block::Math(tex) => visitor.visit_math(tex),
            Block::Rule => visitor.visit_rule(),
        }
    }
}

/// One method per block variant
pub trait Visitor {
    type Output;

    fn visit_heading(&mut self, level: u8, content: &[Inline]) -> Self::Output;
    fn visit_paragraph(&mut self, content: &[Inline]) -> Self::Output;
    fn visit_list(&mut self, list: &List) -> Self::Output;
    fn visit_table(&mut self, table: &Table) -> Self::Output;
    fn visit_code_block(&mut self, language: Option<&str>, code: &str) -> Self::Output;
    fn visit_quote(&mut self, blocks: &[Block]) -> Self::Output;
    fn visit_math(&mut self, tex: &str) -> Self::Output;
    fn visit_rule(&mut self) -> Self::Output;
}
