//! Markdown rendering of the block tree.

use super::tree::{Block, Inline, List, Table, Visitor};

/// Renders blocks to CommonMark with pipe tables and `$` math
#[derive(Debug, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render a document: blocks separated by one blank line, one trailing newline
    pub fn render(&mut self, blocks: &[Block]) -> String {
        let body = self.render_blocks(blocks);
        if body.is_empty() {
            body
        } else {
            format!("{}\n", body)
        }
    }

    fn render_blocks(&mut self, blocks: &[Block]) -> String {
        let chunks: Vec<String> = blocks
            .iter()
            .map(|block| block.accept(self))
            .filter(|chunk| !chunk.trim().is_empty())
            .collect();
        chunks.join("\n\n")
    }

    /// Blocks of one list item; a nested list hugs its neighbours
    fn render_item(&mut self, blocks: &[Block]) -> String {
        let mut out = String::new();
        let mut previous_is_list = false;
        for block in blocks {
            let chunk = block.accept(self);
            if chunk.trim().is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push_str(if block.is_list() || previous_is_list {
                    "\n"
                } else {
                    "\n\n"
                });
            }
            out.push_str(&chunk);
            previous_is_list = block.is_list();
        }
        out
    }
}

/// Escape characters that would otherwise open inline markup
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '`' | '[' | ']' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a line start that would parse as a heading, quote, list item
/// or setext underline
fn escape_line_start(line: &str) -> String {
    let Some(first) = line.chars().next() else {
        return String::new();
    };
    let rest = &line[first.len_utf8()..];
    let opens_block = |after: &str| after.is_empty() || after.starts_with(' ');

    match first {
        '#' | '>' => format!("\\{}", line),
        '-' | '+' | '=' if opens_block(rest) || rest.chars().all(|c| c == first) => {
            format!("\\{}", line)
        }
        c if c.is_ascii_digit() => {
            let digits = line.chars().take_while(char::is_ascii_digit).count();
            let after = &line[digits..];
            match after.chars().next() {
                Some('.' | ')') if digits <= 9 && opens_block(&after[1..]) => {
                    format!("{}\\{}", &line[..digits], after)
                }
                _ => line.to_string(),
            }
        }
        _ => line.to_string(),
    }
}

/// Wrap `inner` in `marker`, keeping surrounding whitespace outside it
fn wrap_marker(inner: String, marker: &str) -> String {
    let core = inner.trim();
    if core.is_empty() {
        return inner;
    }
    let leading = if inner.starts_with(char::is_whitespace) { " " } else { "" };
    let trailing = if inner.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{}{}{}{}{}", leading, marker, core, marker, trailing)
}

fn inline_code(code: &str) -> String {
    let code = code.trim();
    if code.is_empty() {
        return String::new();
    }
    let fence = "`".repeat(longest_backtick_run(code) + 1);
    if code.starts_with('`') || code.ends_with('`') {
        format!("{} {} {}", fence, code, fence)
    } else {
        format!("{}{}{}", fence, code, fence)
    }
}

fn longest_backtick_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn render_inlines(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        out.push_str(&render_inline(inline));
    }
    out
}

fn render_inline(inline: &Inline) -> String {
    match inline {
        Inline::Text(text) => escape_text(text),
        Inline::Strong(children) => wrap_marker(render_inlines(children), "**"),
        Inline::Emphasis(children) => wrap_marker(render_inlines(children), "*"),
        Inline::Code(code) => inline_code(code),
        Inline::Link { text, href } => {
            let label = render_inlines(text);
            let label = label.trim();
            if href.starts_with('#') || href.starts_with("javascript:") {
                label.to_string()
            } else if label.is_empty() || label == escape_text(href) {
                format!("<{}>", href)
            } else {
                format!("[{}]({})", label, href.replace(' ', "%20"))
            }
        }
        Inline::Math { tex, display } => {
            if tex.is_empty() {
                String::new()
            } else if *display {
                format!("$${}$$", tex)
            } else {
                format!("${}$", tex)
            }
        }
        Inline::LineBreak => "\\\n".to_string(),
    }
}

/// Collapse spaces, trim lines and drop empty or break-only lines
fn tidy(text: &str) -> String {
    let lines: Vec<String> = text
        .split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .map(|line| match line.strip_suffix(" \\") {
            Some(stripped) => format!("{}\\", stripped),
            None => line,
        })
        .filter(|line| !line.is_empty() && line != "\\")
        .collect();

    let mut joined = lines.join("\n");
    // An odd run of trailing backslashes ends in a hard break
    while joined.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1 {
        joined.pop();
        joined.truncate(joined.trim_end().len());
    }
    joined
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|")
}

impl Visitor for MarkdownRenderer {
    type Output = String;

    fn visit_heading(&mut self, level: u8, content: &[Inline]) -> String {
        let text = tidy(&render_inlines(content)).replace("\\\n", " ").replace('\n', " ");
        if text.is_empty() {
            return String::new();
        }
        format!("{} {}", "#".repeat(usize::from(level.clamp(1, 6))), text)
    }

    fn visit_paragraph(&mut self, content: &[Inline]) -> String {
        tidy(&render_inlines(content))
            .split('\n')
            .map(escape_line_start)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn visit_list(&mut self, list: &List) -> String {
        let mut items = Vec::with_capacity(list.items.len());
        for (index, item) in list.items.iter().enumerate() {
            let marker = if list.ordered {
                format!("{}. ", list.start.saturating_add(index as u32))
            } else {
                "- ".to_string()
            };
            let indent = " ".repeat(marker.len());
            let body = self.render_item(item);

            let mut out = String::new();
            for (line_no, line) in body.lines().enumerate() {
                if line_no == 0 {
                    out.push_str(&marker);
                    out.push_str(line);
                } else if line.is_empty() {
                    out.push('\n');
                } else {
                    out.push('\n');
                    out.push_str(&indent);
                    out.push_str(line);
                }
            }
            if out.is_empty() {
                out.push_str(marker.trim_end());
            }
            items.push(out);
        }
        items.join("\n")
    }

    fn visit_table(&mut self, table: &Table) -> String {
        let width = table.width();
        if width == 0 {
            return String::new();
        }

        let render_row = |row: &[String]| -> String {
            let cells: Vec<String> = (0..width)
                .map(|i| row.get(i).map(|c| escape_cell(c)).unwrap_or_default())
                .collect();
            format!("| {} |", cells.join(" | "))
        };

        let mut lines = Vec::with_capacity(table.rows.len() + 1);
        lines.push(render_row(&table.rows[0]));
        lines.push(format!("|{}", " --- |".repeat(width)));
        for row in &table.rows[1..] {
            lines.push(render_row(row));
        }
        let rendered = lines.join("\n");

        match table.caption.as_deref().map(str::trim) {
            Some(caption) if !caption.is_empty() => {
                format!("*{}*\n\n{}", escape_text(caption), rendered)
            }
            _ => rendered,
        }
    }

    fn visit_code_block(&mut self, language: Option<&str>, code: &str) -> String {
        let fence = "`".repeat(longest_backtick_run(code).max(2) + 1);
        format!("{}{}\n{}\n{}", fence, language.unwrap_or_default(), code, fence)
    }

    fn visit_quote(&mut self, blocks: &[Block]) -> String {
        self.render_blocks(blocks)
            .lines()
            .map(|line| {
                if line.is_empty() {
                    ">".to_string()
                } else {
                    format!("> {}", line)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn visit_math(&mut self, tex: &str) -> String {
        format!("$${}$$", tex.trim())
    }

    fn visit_rule(&mut self) -> String {
        "---".to_string()
    }
}
