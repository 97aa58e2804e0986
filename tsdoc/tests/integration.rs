use std::fs;
use std::sync::{Arc, Mutex};

use tsdoc::document::{Block, BlockKind, Directive, Link, LinkKind, Part, Reference, Text};
use tsdoc::parser::{Error, ErrorKind, Parser};
use tsdoc::Document;

fn parse(source: &str) -> Document {
    Parser::new(source.to_string(), 0)
        .with_name("test")
        .parse()
        .expect("parse failed")
}

fn blocks(source: &str) -> Vec<Block> {
    let doc = parse(source);
    assert!(doc.errors.is_empty(), "unexpected errors: {:?}", doc.errors);
    doc.blocks
}

fn texts(block: &Block) -> Vec<Text> {
    block.texts().cloned().collect()
}

fn plain(s: &str) -> Text {
    Text::Plain(s.to_string())
}

fn entry_levels(block: &Block, out: &mut Vec<usize>) {
    if let BlockKind::ListEntry { level } = block.kind {
        out.push(level);
    }
    for child in block.blocks() {
        entry_levels(child, out);
    }
}

#[test]
fn plain_text_is_one_paragraph() {
    let blocks = self::blocks("Hello world");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].kind, BlockKind::Paragraph);
    assert_eq!(texts(&blocks[0]), vec![plain("Hello world")]);
}

#[test]
fn empty_source_has_no_blocks() {
    assert!(blocks("").is_empty());
    assert!(blocks("\n\n   \n").is_empty());
}

#[test]
fn blank_lines_separate_paragraphs() {
    let blocks = self::blocks("first\nstill first\n\n  \nsecond");
    assert_eq!(blocks.len(), 2);
    assert_eq!(texts(&blocks[0]), vec![plain("first\nstill first")]);
    assert_eq!(texts(&blocks[1]), vec![plain("second")]);
}

#[test]
fn balanced_styling() {
    let blocks = self::blocks("say _text_ now");
    assert_eq!(
        texts(&blocks[0]),
        vec![plain("say "), Text::Italic("text".into()), plain(" now")]
    );

    let blocks = self::blocks("a **strong** and _*both*_ here");
    assert_eq!(
        texts(&blocks[0]),
        vec![
            plain("a "),
            Text::Bold("strong".into()),
            plain(" and "),
            Text::BoldItalic("both".into()),
            plain(" here"),
        ]
    );
}

#[test]
fn styling_needs_a_word_boundary() {
    let blocks = self::blocks("snake_case_name and 2 * 3 = 6");
    assert_eq!(
        texts(&blocks[0]),
        vec![plain("snake_case_name and 2 * 3 = 6")]
    );
}

#[test]
fn inline_frames_do_not_nest() {
    let blocks = self::blocks("_a `b` c_");
    assert_eq!(texts(&blocks[0]), vec![Text::Italic("a `b` c".into())]);
}

#[test]
fn escaped_marker_is_literal() {
    let blocks = self::blocks("a \\_b_ c");
    assert_eq!(texts(&blocks[0]), vec![plain("a _b_ c")]);

    let blocks = self::blocks("\\[not a link]");
    assert_eq!(texts(&blocks[0]), vec![plain("[not a link]")]);
}

#[test]
fn list_levels_follow_indentation() {
    let blocks = self::blocks("* a\n  * b\n  * c\n* d\n    * e\n");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].kind, BlockKind::ListBlock);
    let mut levels = Vec::new();
    entry_levels(&blocks[0], &mut levels);
    assert_eq!(levels, vec![1, 2, 2, 1, 2]);
}

#[test]
fn list_entries_keep_their_text() {
    let blocks = self::blocks("* one\n* two _it_\n");
    let entries: Vec<&Block> = blocks[0].blocks().collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(texts(entries[0]), vec![plain("one")]);
    assert_eq!(
        texts(entries[1]),
        vec![plain("two "), Text::Italic("it".into())]
    );
}

#[test]
fn separate_lists_restart_levels() {
    let blocks = self::blocks("* a\n  * b\n\n  * c\n");
    assert_eq!(blocks.len(), 2);
    let mut levels = Vec::new();
    entry_levels(&blocks[1], &mut levels);
    assert_eq!(levels, vec![1]);
}

#[test]
fn link_disambiguation() {
    let blocks = self::blocks("[Plain]");
    assert_eq!(
        texts(&blocks[0]),
        vec![Text::Reference(Reference::new("Plain"))]
    );

    let blocks = self::blocks("[Text][target]");
    assert_eq!(
        texts(&blocks[0]),
        vec![Text::Link(Link::new(LinkKind::Internal, "Text", "target"))]
    );

    let blocks = self::blocks("see [Text](http://example.com/a_b) now");
    assert_eq!(
        texts(&blocks[0]),
        vec![
            plain("see "),
            Text::Link(Link::new(
                LinkKind::External,
                "Text",
                "http://example.com/a_b"
            )),
            plain(" now"),
        ]
    );
}

#[test]
fn image_link() {
    let blocks = self::blocks("![logo](logo.png)");
    assert_eq!(
        texts(&blocks[0]),
        vec![Text::Image(Link::new(LinkKind::External, "logo", "logo.png"))]
    );
}

#[test]
fn table_shape() {
    let blocks = self::blocks("---\n1 | 2\n3 | 4\n---\n");
    assert_eq!(blocks.len(), 1);
    let table = &blocks[0];
    assert_eq!(table.kind, BlockKind::Table);
    let rows: Vec<&Block> = table.blocks().collect();
    assert_eq!(rows.len(), 2);
    for (row, expected) in rows.iter().zip([["1", "2"], ["3", "4"]]) {
        assert_eq!(row.kind, BlockKind::TableRow);
        let cells: Vec<String> = row.blocks().map(|cell| cell.plain_text()).collect();
        assert_eq!(cells, expected);
        for cell in row.blocks() {
            assert_eq!(
                cell.kind,
                BlockKind::TableCell {
                    colspan: 1,
                    rowspan: 1
                }
            );
        }
    }
}

#[test]
fn table_cell_spans() {
    let blocks = self::blocks("---\n2,1 wide |x\n---\n");
    let row = blocks[0].blocks().next().expect("row");
    let kinds: Vec<BlockKind> = row.blocks().map(|cell| cell.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            BlockKind::TableCell {
                colspan: 2,
                rowspan: 1
            },
            BlockKind::TableCell {
                colspan: 1,
                rowspan: 1
            },
        ]
    );
    assert_eq!(row.blocks().next().map(Block::plain_text).as_deref(), Some("wide"));
}

#[test]
fn fenced_code_is_inert() {
    let blocks = self::blocks("```c\nint *p = _x_; [a](b)\n```\n");
    assert_eq!(blocks.len(), 1);
    assert_eq!(
        blocks[0].kind,
        BlockKind::Code {
            language: Some("c".into())
        }
    );
    assert_eq!(blocks[0].code(), Some("int *p = _x_; [a](b)"));
}

#[test]
fn code_keeps_indentation() {
    let blocks = self::blocks("```\n\n    if (x)\n        y();\n```");
    assert_eq!(blocks[0].kind, BlockKind::Code { language: None });
    assert_eq!(blocks[0].code(), Some("    if (x)\n        y();"));
}

#[test]
fn blank_line_inside_code_keeps_one_block() {
    let blocks = self::blocks("```\na\n\nb _c_\n```");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].kind, BlockKind::Code { language: None });
    assert_eq!(blocks[0].code(), Some("a\n\nb _c_"));
}

#[test]
fn inline_code_is_inert() {
    let blocks = self::blocks("run `a_b * c` now");
    assert_eq!(
        texts(&blocks[0]),
        vec![
            plain("run "),
            Text::InlineCode("a_b * c".into()),
            plain(" now")
        ]
    );
}

#[test]
fn unterminated_construct_at_eof() {
    let doc = parse("plain _bold");
    assert_eq!(
        texts(&doc.blocks[0]),
        vec![plain("plain "), Text::Italic("bold".into())]
    );
    assert_eq!(doc.errors.len(), 1);
    let err = &doc.errors[0];
    assert_eq!(err.kind, ErrorKind::Unterminated);
    assert_eq!(err.document, "test");
    assert_eq!(err.line, 1);
    assert_eq!(err.offset(), 6);
    assert!(!err.notes.is_empty());
}

#[test]
fn unterminated_code_reports_its_line() {
    let doc = parse("text\n\n```\nnever closed\n");
    assert_eq!(doc.errors.len(), 1);
    assert_eq!(doc.errors[0].kind, ErrorKind::Unterminated);
    assert_eq!(doc.errors[0].line, 3);
    assert_eq!(doc.blocks[1].code(), Some("never closed"));
}

#[test]
fn header_carries_directives() {
    let blocks = self::blocks("# Title\n[__docspace__:kernel]\n\nBody text\n");
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].kind, BlockKind::Header { size: 1 });
    assert_eq!(blocks[0].plain_text().trim(), "Title");
    let directive = blocks[0].texts().find_map(|text| match text {
        Text::Reference(reference) => Some(reference.clone()),
        _ => None,
    });
    assert_eq!(
        directive.as_ref().and_then(Reference::directive),
        Some(Directive::DocSpace("kernel"))
    );
    assert_eq!(texts(&blocks[1]), vec![plain("Body text")]);
}

#[test]
fn header_size_follows_marker() {
    let blocks = self::blocks("### Deep\n\n# Top\n");
    assert_eq!(blocks[0].kind, BlockKind::Header { size: 3 });
    assert_eq!(blocks[1].kind, BlockKind::Header { size: 1 });
}

#[test]
fn incut_holds_paragraphs() {
    let blocks = self::blocks("!!! WARN\nBe careful.\n\nSecond.\n!!!\n");
    assert_eq!(blocks.len(), 1);
    assert_eq!(
        blocks[0].kind,
        BlockKind::Incut {
            style: "WARN".into()
        }
    );
    let paragraphs: Vec<String> = blocks[0].blocks().map(Block::plain_text).collect();
    assert_eq!(paragraphs, vec!["Be careful.", "Second."]);
}

#[test]
fn incut_without_style_is_literal() {
    let doc = parse("!!!\ntext");
    assert_eq!(doc.errors.len(), 1);
    assert_eq!(doc.errors[0].kind, ErrorKind::Construct);
    assert_eq!(texts(&doc.blocks[0]), vec![plain("!!!\ntext")]);
}

#[test]
fn span_and_break_line() {
    let blocks = self::blocks("___small tiny text___ rest >>> next");
    let parts = &blocks[0].parts;
    assert!(matches!(
        &parts[0],
        Part::Block(Block { kind: BlockKind::Span { style }, .. }) if style == "small"
    ));
    assert_eq!(parts[1], Part::Text(plain(" rest ")));
    assert_eq!(parts[2], Part::Text(Text::BreakLine));
    assert_eq!(parts[3], Part::Text(plain(" next")));
}

#[test]
fn block_quote_continues_over_lines() {
    let blocks = self::blocks("> quoted\n> more\n\nafter");
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].kind, BlockKind::BlockQuote);
    let text = blocks[0].plain_text();
    assert!(text.contains("quoted") && text.contains("more"));
    assert!(!text.contains('>'));
}

#[test]
fn code_listing_reads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("hello.c"), "int main() {}\n").expect("write listing");

    let doc = Parser::new("`````hello.c\n".to_string(), 0)
        .with_base_dir(dir.path())
        .parse()
        .expect("parse failed");
    assert_eq!(doc.blocks.len(), 1);
    assert_eq!(
        doc.blocks[0].kind,
        BlockKind::CodeListing {
            filename: "hello.c".into()
        }
    );
    assert_eq!(doc.blocks[0].code(), Some("int main() {}"));
}

#[test]
fn longer_listing_fence_reads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("a.c"), "x;\n").expect("write listing");

    let doc = Parser::new("``````a.c\n".to_string(), 0)
        .with_base_dir(dir.path())
        .parse()
        .expect("parse failed");
    assert!(doc.errors.is_empty(), "unexpected errors: {:?}", doc.errors);
    assert_eq!(doc.blocks.len(), 1);
    assert_eq!(
        doc.blocks[0].kind,
        BlockKind::CodeListing {
            filename: "a.c".into()
        }
    );
    assert_eq!(doc.blocks[0].code(), Some("x;"));
}

#[test]
fn missing_listing_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = Parser::new("intro\n\n`````missing.c\n".to_string(), 0)
        .with_name("chapter")
        .with_base_dir(dir.path())
        .parse();
    match result {
        Err(Error::Listing {
            document, line, ..
        }) => {
            assert_eq!(document, "chapter");
            assert_eq!(line, 3);
        }
        other => panic!("expected listing error, got {:?}", other),
    }
}

#[test]
fn trace_sink_sees_pushes_and_pops() {
    let events = Arc::new(Mutex::new(Vec::<String>::new()));
    Parser::new("a _b_".to_string(), 0)
        .with_trace(Box::new(events.clone()))
        .parse()
        .expect("parse failed");
    let events = events.lock().expect("lock");
    assert!(events.iter().any(|e| e.contains("push") && e.contains("Italic")));
    assert!(events.iter().any(|e| e.contains("pop") && e.contains("Italic")));
}

#[test]
fn reparse_is_deterministic() {
    let source = "# T\n\n* a\n  * b\n\n---\n1 | 2\n---\n\n[x][y] and _z_\n";
    assert_eq!(blocks(source), blocks(source));
}
