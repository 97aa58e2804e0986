use std::collections::BTreeMap;
use std::io::Write;

use html_escape::{encode_double_quoted_attribute, encode_text};
use tsdoc::document::{Block, BlockKind, Directive, LinkKind, Part, Text};

use crate::book::{NavLink, NavLinks};
use crate::tabs::fix_tab_stops;
use crate::{Error, Page, Printer};

const INDENT: usize = 4;

const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8" />
<meta name="generator" content="$GENERATOR" />
<title>$TITLE</title>
<link rel="stylesheet" href="$RELPATHcss/tsdoc.css" />
</head>
<body>
<div class="navbar">
$NAVBAR
</div>
<div class="container">
$BODY
</div>
</body>
</html>
"#;

#[derive(Debug, Clone)]
pub struct HtmlOptions {
    pub tab_stops: usize,
    /// Prepended to relative image targets.
    pub image_prefix: String,
    /// CSS classes of incut styles.
    pub incut_classes: BTreeMap<String, String>,
    /// Book title appended to page titles when not empty.
    pub title: String,
    /// Page template with `$TITLE`, `$BODY`, `$NAVBAR`, `$GENERATOR` and
    /// `$RELPATH` placeholders.
    pub template: String,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        let incut_classes = [
            ("DEF", "alert alert-success"),
            ("WARN", "alert"),
            ("INFO", "alert alert-info"),
            ("DANGER", "alert alert-error"),
        ]
        .into_iter()
        .map(|(style, class)| (style.to_string(), class.to_string()))
        .collect();
        HtmlOptions {
            tab_stops: 4,
            image_prefix: "../images/".to_string(),
            incut_classes,
            title: String::new(),
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct HtmlPrinter {
    options: HtmlOptions,
}

impl HtmlPrinter {
    pub fn new(options: HtmlOptions) -> Self {
        HtmlPrinter { options }
    }

    /// Render blocks without the page template.
    pub fn body(&self, blocks: &[Block]) -> String {
        let mut out = String::new();
        for block in blocks {
            self.block(&mut out, block, 0);
        }
        out
    }

    fn incut_class(&self, style: &str) -> String {
        match self.options.incut_classes.get(style) {
            Some(class) => class.clone(),
            None => {
                log::warn!("no class for incut style {}", style);
                format!("alert alert-{}", style.to_lowercase())
            }
        }
    }

    fn block(&self, out: &mut String, block: &Block, indent: usize) {
        let (tag, attrs) = match &block.kind {
            BlockKind::Paragraph => ("p", String::new()),
            BlockKind::Header { size } => {
                let mut text = String::new();
                self.parts(&mut text, block, indent);
                out.push_str(&" ".repeat(indent));
                out.push_str(&format!("<h{size}>{}</h{size}>\n", text.trim()));
                return;
            }
            BlockKind::Code { language } => {
                let attrs = language
                    .as_ref()
                    .map(|l| format!(" class=\"language-{}\"", encode_double_quoted_attribute(l)))
                    .unwrap_or_default();
                self.code(out, block, &attrs, indent);
                return;
            }
            BlockKind::CodeListing { filename } => {
                let attrs = format!(" title=\"{}\"", encode_double_quoted_attribute(filename));
                self.code(out, block, &attrs, indent);
                return;
            }
            BlockKind::ListBlock => ("ul", String::new()),
            BlockKind::ListEntry { .. } => ("li", String::new()),
            BlockKind::Table => ("table", " class=\"table\"".to_string()),
            BlockKind::TableRow => ("tr", String::new()),
            BlockKind::TableCell { colspan, rowspan } => {
                let mut attrs = String::new();
                if *colspan > 1 {
                    attrs.push_str(&format!(" colspan=\"{}\"", colspan));
                }
                if *rowspan > 1 {
                    attrs.push_str(&format!(" rowspan=\"{}\"", rowspan));
                }
                ("td", attrs)
            }
            BlockKind::BlockQuote => ("blockquote", String::new()),
            BlockKind::Incut { style } => (
                "div",
                format!(
                    " class=\"{}\"",
                    encode_double_quoted_attribute(&self.incut_class(style))
                ),
            ),
            BlockKind::Span { style } => {
                out.push_str(&format!(
                    "<span class=\"{}\">",
                    encode_double_quoted_attribute(style)
                ));
                self.parts(out, block, indent);
                out.push_str("</span>");
                return;
            }
            BlockKind::FlowableIncut { .. } => ("div", " class=\"flowable\"".to_string()),
            BlockKind::PageSpacer { is_break, .. } => {
                if *is_break {
                    out.push_str(&" ".repeat(indent));
                    out.push_str("<div class=\"page-break\"></div>\n");
                }
                return;
            }
        };

        out.push_str(&" ".repeat(indent));
        out.push_str(&format!("<{}{}>\n", tag, attrs));
        self.parts(out, block, indent);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&" ".repeat(indent));
        out.push_str(&format!("</{}>\n", tag));
    }

    fn code(&self, out: &mut String, block: &Block, attrs: &str, indent: usize) {
        let code = fix_tab_stops(block.code().unwrap_or_default(), self.options.tab_stops);
        out.push_str(&" ".repeat(indent));
        out.push_str(&format!("<pre{}>", attrs));
        out.push_str(&encode_text(&code));
        out.push_str("</pre>\n");
    }

    fn parts(&self, out: &mut String, block: &Block, indent: usize) {
        for part in &block.parts {
            match part {
                Part::Block(child) => self.block(out, child, indent + INDENT),
                Part::Text(text) => self.text(out, text),
            }
        }
    }

    fn text(&self, out: &mut String, text: &Text) {
        // Newlines outside code are hard breaks.
        let filter = |s: &str| encode_text(s).replace('\n', "<br />");
        match text {
            Text::Plain(s) => out.push_str(&filter(s)),
            Text::Italic(s) => out.push_str(&format!("<em>{}</em>", filter(s))),
            Text::Bold(s) => out.push_str(&format!("<strong>{}</strong>", filter(s))),
            Text::BoldItalic(s) => {
                out.push_str(&format!("<strong><em>{}</em></strong>", filter(s)))
            }
            Text::InlineCode(s) => out.push_str(&format!("<code>{}</code>", encode_text(s))),
            Text::Label { style, text } => out.push_str(&format!(
                "<span class=\"label label-{}\">{}</span>",
                encode_double_quoted_attribute(style),
                filter(text)
            )),
            Text::Reference(reference) => {
                let anchor = match reference.directive() {
                    None | Some(Directive::Index(_)) => true,
                    Some(_) => false,
                };
                if anchor {
                    out.push_str(&format!(
                        "<a name=\"{}\"></a>",
                        encode_double_quoted_attribute(&reference.name)
                    ));
                }
            }
            Text::Link(link) => {
                let style = if link.kind == LinkKind::Invalid {
                    " style=\"color: red\""
                } else {
                    ""
                };
                out.push_str(&format!(
                    "<a href=\"{}\"{}>{}</a>",
                    encode_double_quoted_attribute(&link.target),
                    style,
                    filter(&link.text)
                ));
            }
            Text::Image(link) => {
                let src = if link.target.contains("://") || link.target.starts_with('/') {
                    link.target.clone()
                } else {
                    format!("{}{}", self.options.image_prefix, link.target)
                };
                out.push_str(&format!(
                    "<img src=\"{}\" alt=\"{}\" />",
                    encode_double_quoted_attribute(&src),
                    encode_double_quoted_attribute(&link.text)
                ));
            }
            Text::BreakLine => out.push_str("<br />"),
            Text::LineBreak => out.push('\n'),
        }
    }

    fn navbar(&self, nav: &NavLinks) -> String {
        let mut out = String::new();
        if let Some(home) = &nav.home {
            out.push_str(&format!(
                "<a class=\"brand\" href=\"{}\">{}</a>\n",
                encode_double_quoted_attribute(&home.href),
                encode_text(&home.title)
            ));
        }
        let links: [(&Option<NavLink>, &str, &str); 4] = [
            (&nav.prev, "pull-left", "Prev"),
            (&nav.up, "pull-center", "Up"),
            (&nav.reference, "pull-center", "Reference"),
            (&nav.next, "pull-right", "Next"),
        ];
        for (link, class, label) in links {
            let Some(link) = link else {
                continue;
            };
            let mut text = format!("<strong>{}</strong>", label);
            if label != "Reference" {
                text.push_str(&format!("({})", encode_text(&link.title)));
            }
            out.push_str(&format!(
                "<ul class=\"nav {}\">\n<li><a href=\"{}\">{}</a></li>\n</ul>\n",
                class,
                encode_double_quoted_attribute(&link.href),
                text
            ));
        }
        out
    }
}

/// Replace `$NAME` placeholders in one pass. Unknown names are kept.
fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let len = after
            .bytes()
            .take_while(|b| b.is_ascii_uppercase() || *b == b'_')
            .count();
        // Longest known name that prefixes the identifier.
        let found = vars
            .iter()
            .filter(|(name, _)| after[..len].starts_with(name))
            .max_by_key(|(name, _)| name.len());
        match found {
            Some((name, value)) => {
                out.push_str(value);
                rest = &after[name.len()..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

impl Printer for HtmlPrinter {
    fn suffix(&self) -> &'static str {
        ".html"
    }

    fn print_page(&mut self, out: &mut dyn Write, page: &Page) -> Result<(), Error> {
        let body = self.body(&page.blocks);
        let navbar = self.navbar(&page.nav);
        let mut title = page.title();
        if !self.options.title.is_empty() {
            title = format!("{} | {}", title, self.options.title);
        }
        let title = encode_text(&title).into_owned();
        let relpath = if page.docspace.is_empty() { "" } else { "../" };
        let generator = concat!("tsdoc ", env!("CARGO_PKG_VERSION"));
        let html = substitute(
            &self.options.template,
            &[
                ("TITLE", title.as_str()),
                ("BODY", body.as_str()),
                ("NAVBAR", navbar.as_str()),
                ("GENERATOR", generator),
                ("RELPATH", relpath),
            ],
        );
        out.write_all(html.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(source: &str) -> String {
        let doc = tsdoc::parse(source, "test").expect("parse failed");
        HtmlPrinter::default().body(&doc.blocks)
    }

    #[test]
    fn paragraph_with_styles() {
        assert_eq!(
            body("a _b_ **c** `<d>`"),
            "<p>\na <em>b</em> <strong>c</strong> <code>&lt;d&gt;</code>\n</p>\n"
        );
    }

    #[test]
    fn newlines_become_breaks_outside_code() {
        assert_eq!(body("one\ntwo"), "<p>\none<br />two\n</p>\n");
    }

    #[test]
    fn code_expands_tabs_and_escapes() {
        assert_eq!(
            body("```\nif (a < b)\n\tx();\n```"),
            "<pre>if (a &lt; b)\n    x();</pre>\n"
        );
    }

    #[test]
    fn table_cells_carry_spans() {
        assert_eq!(
            body("---\n2,1 a\n---\n"),
            "<table class=\"table\">\n    <tr>\n        <td colspan=\"2\">\na\n        </td>\n    </tr>\n</table>\n"
        );
    }

    #[test]
    fn incut_uses_configured_class() {
        let html = body("!!! DEF\nterm\n!!!\n");
        assert!(html.starts_with("<div class=\"alert alert-success\">\n"));
        let html = body("!!! NOTE\nx\n!!!\n");
        assert!(html.starts_with("<div class=\"alert alert-note\">\n"));
    }

    #[test]
    fn invalid_links_are_red() {
        let html = body("[x][nowhere]");
        assert!(html.contains("<a href=\"nowhere\">x</a>"));
        let mut doc = tsdoc::parse("[x][nowhere]", "test").expect("parse failed");
        doc.blocks[0].for_each_text_mut(&mut |text| {
            if let Some(link) = text.as_link_mut() {
                link.kind = LinkKind::Invalid;
            }
        });
        let html = HtmlPrinter::default().body(&doc.blocks);
        assert!(html.contains("style=\"color: red\""));
    }

    #[test]
    fn images_get_prefix() {
        let html = body("![logo](logo.png)");
        assert!(html.contains("<img src=\"../images/logo.png\" alt=\"logo\" />"));
    }

    #[test]
    fn directives_are_not_anchors() {
        let html = body("[__docspace__:x] [intro] [__index__:mutex]");
        assert!(!html.contains("__docspace__"));
        assert!(html.contains("<a name=\"intro\"></a>"));
        assert!(html.contains("<a name=\"__index__:mutex\"></a>"));
    }

    #[test]
    fn book_title_joins_page_title() {
        let options = HtmlOptions {
            title: "Guide".to_string(),
            template: "$TITLE".to_string(),
            ..HtmlOptions::default()
        };
        let page = Page::new("", "intro", Vec::new());
        let html = HtmlPrinter::new(options).render(&page).expect("render failed");
        assert_eq!(html, "intro | Guide");
    }

    #[test]
    fn template_placeholders() {
        assert_eq!(
            substitute("$TITLE|$RELPATHcss|$UNKNOWN|$", &[("TITLE", "t"), ("RELPATH", "../")]),
            "t|../css|$UNKNOWN|$"
        );
    }
}
