use std::io::Write;

use tsdoc::document::{Block, BlockKind, LinkKind, Part, Text};

use crate::{Error, Page, Printer};

/// Prints pages back as Markdown.
#[derive(Debug, Default)]
pub struct MarkdownPrinter;

impl MarkdownPrinter {
    pub fn new() -> Self {
        MarkdownPrinter
    }
}

impl Printer for MarkdownPrinter {
    fn suffix(&self) -> &'static str {
        ".md"
    }

    fn print_page(&mut self, out: &mut dyn Write, page: &Page) -> Result<(), Error> {
        let mut s = String::new();
        for block in &page.blocks {
            print_block(&mut s, block);
        }
        out.write_all(s.as_bytes())?;
        Ok(())
    }
}

fn escape(s: &str) -> String {
    s.replace('_', "\\_").replace('*', "\\*")
}

fn print_block(out: &mut String, block: &Block) {
    match &block.kind {
        BlockKind::Paragraph => {
            out.push('\n');
            print_parts(out, block);
            out.push('\n');
        }
        BlockKind::Header { size } => {
            out.push('\n');
            out.push_str(&"#".repeat(*size));
            out.push(' ');
            let mut text = String::new();
            print_parts(&mut text, block);
            out.push_str(text.trim());
            out.push('\n');
        }
        BlockKind::Code { .. } | BlockKind::CodeListing { .. } => {
            let language = match &block.kind {
                BlockKind::Code {
                    language: Some(language),
                } => language.as_str(),
                _ => "",
            };
            out.push_str("\n```");
            out.push_str(language);
            out.push('\n');
            out.push_str(block.code().unwrap_or_default());
            out.push_str("\n```\n");
        }
        BlockKind::ListBlock => {
            for part in &block.parts {
                if let Part::Block(child) = part {
                    print_block(out, child);
                }
            }
        }
        BlockKind::ListEntry { level } => {
            out.push_str(&"  ".repeat(level.saturating_sub(1)));
            out.push_str("* ");
            for part in &block.parts {
                match part {
                    Part::Text(text) => print_text(out, text),
                    Part::Block(child) => {
                        if !out.ends_with('\n') {
                            out.push('\n');
                        }
                        print_block(out, child);
                    }
                }
            }
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
        BlockKind::Table => {
            out.push_str("\n---\n");
            for row in block.blocks() {
                let cells: Vec<String> = row
                    .blocks()
                    .map(|cell| {
                        let mut text = String::new();
                        if let BlockKind::TableCell { colspan, rowspan } = cell.kind {
                            if colspan != 1 || rowspan != 1 {
                                text.push_str(&format!("{},{} ", colspan, rowspan));
                            }
                        }
                        print_parts(&mut text, cell);
                        text
                    })
                    .collect();
                out.push_str(&cells.join(" | "));
                out.push('\n');
            }
            out.push_str("---\n");
        }
        BlockKind::BlockQuote => {
            let mut text = String::new();
            print_parts(&mut text, block);
            out.push('\n');
            for line in text.trim().lines() {
                out.push_str("> ");
                out.push_str(line);
                out.push('\n');
            }
        }
        BlockKind::Incut { style } => {
            out.push_str("\n!!! ");
            out.push_str(style);
            out.push('\n');
            print_parts(out, block);
            out.push_str("!!!\n");
        }
        BlockKind::Span { style } => {
            out.push_str("___");
            out.push_str(style);
            out.push(' ');
            print_parts(out, block);
            out.push_str("___");
        }
        BlockKind::TableRow | BlockKind::TableCell { .. } | BlockKind::FlowableIncut { .. } => {
            print_parts(out, block);
        }
        BlockKind::PageSpacer { .. } => {}
    }
}

fn print_parts(out: &mut String, block: &Block) {
    for part in &block.parts {
        match part {
            Part::Block(child) => print_block(out, child),
            Part::Text(text) => print_text(out, text),
        }
    }
}

fn print_text(out: &mut String, text: &Text) {
    match text {
        Text::Plain(s) => out.push_str(&escape(s)),
        Text::Italic(s) => out.push_str(&format!("_{}_", escape(s))),
        Text::Bold(s) => out.push_str(&format!("**{}**", escape(s))),
        Text::BoldItalic(s) => out.push_str(&format!("_**{}**_", escape(s))),
        Text::InlineCode(s) => out.push_str(&format!("`{}`", s)),
        Text::Label { text, .. } => out.push_str(&escape(text)),
        Text::Reference(reference) => out.push_str(&format!("[{}]", escape(&reference.name))),
        Text::Link(link) => match link.kind {
            LinkKind::Internal => {
                out.push_str(&format!("[{}][{}]", escape(&link.text), link.target))
            }
            LinkKind::External | LinkKind::Invalid => {
                out.push_str(&format!("[{}]({})", escape(&link.text), link.target))
            }
        },
        Text::Image(link) => out.push_str(&format!("![{}]({})", escape(&link.text), link.target)),
        Text::BreakLine => out.push_str("  \n"),
        Text::LineBreak => out.push('\n'),
    }
}
