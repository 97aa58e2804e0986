//! Cross-referencing of the pages of a book.
//!
//! A book is a set of pages grouped in docspaces (one directory per
//! docspace) plus an optional root index page. The index lists docspaces
//! under level-3 headers carrying `[__docspace__:name]` directives; the
//! internal links that follow such a header give the reading order of the
//! docspace's pages.
//!
//! Internal link targets have the form `docspace/page#anchor`, `page#anchor`
//! (same docspace) or `#anchor` (same page). Processing a book rewrites
//! every internal link into a relative external link, or into an invalid
//! link when the target page does not exist.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use tsdoc::document::{Block, BlockKind, Directive, Link, LinkKind, Part, Reference, Text};
use tsdoc::visit::{self, Visitor};

const DOCSPACE_HEADER_SIZE: usize = 3;
const PAGE_HEADER_SIZE: usize = 1;
const LETTER_HEADER_SIZE: usize = 2;

pub const REFERENCE_DOCSPACE: &str = "reference";
const REFERENCE_NAME: &str = "reference";
const REFERENCE_HEADER: &str = "Reference";
const INCOMPLETE_TEXT: &str = "This page is not yet written. Sorry. ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavLink {
    pub title: String,
    pub href: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavLinks {
    pub prev: Option<NavLink>,
    pub next: Option<NavLink>,
    pub up: Option<NavLink>,
    pub home: Option<NavLink>,
    pub reference: Option<NavLink>,
}

impl NavLinks {
    pub fn is_empty(&self) -> bool {
        self.prev.is_none()
            && self.next.is_none()
            && self.up.is_none()
            && self.home.is_none()
            && self.reference.is_none()
    }
}

/// One output document of the book.
#[derive(Debug, Clone)]
pub struct Page {
    /// Empty for the root index page.
    pub docspace: String,
    pub name: String,
    /// Title given by the index, if any.
    pub header: String,
    pub blocks: Vec<Block>,
    pub nav: NavLinks,
}

impl Page {
    pub fn new(docspace: impl Into<String>, name: impl Into<String>, blocks: Vec<Block>) -> Self {
        Page {
            docspace: docspace.into(),
            name: name.into(),
            header: String::new(),
            blocks,
            nav: NavLinks::default(),
        }
    }

    /// `docspace/name`, or just `name` for root pages.
    pub fn path(&self) -> String {
        if self.docspace.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.docspace, self.name)
        }
    }

    /// Output file relative to the output directory.
    pub fn file_path(&self, suffix: &str) -> PathBuf {
        let mut path = PathBuf::new();
        if !self.docspace.is_empty() {
            path.push(&self.docspace);
        }
        path.push(format!("{}{}", self.name, suffix));
        path
    }

    /// Header from the index, else the first header of the page, else
    /// the page name.
    pub fn title(&self) -> String {
        if !self.header.is_empty() {
            return self.header.clone();
        }
        self.blocks
            .iter()
            .find(|block| matches!(block.kind, BlockKind::Header { .. }))
            .map(|block| block.plain_text().trim().to_string())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| self.name.clone())
    }

    fn set_header(&mut self, header: &str) {
        if !self.header.is_empty() || header.is_empty() {
            return;
        }
        self.header = header.to_string();
        let has_header = matches!(
            self.blocks.first().map(|block| &block.kind),
            Some(BlockKind::Header { .. })
        );
        if !has_header {
            let block = Block::with_parts(
                BlockKind::Header {
                    size: PAGE_HEADER_SIZE,
                },
                vec![Text::Plain(self.header.clone()).into()],
            );
            self.blocks.insert(0, block);
        }
    }

    fn incomplete(docspace: &str, name: &str, index_href: Option<String>) -> Self {
        let mut paragraph = Block::new(BlockKind::Paragraph);
        paragraph.push(Text::Plain(INCOMPLETE_TEXT.to_string()));
        if let Some(href) = index_href {
            paragraph.push(Text::Link(Link::new(
                LinkKind::External,
                "Return to index.",
                href,
            )));
        }
        let incut = Block::with_parts(
            BlockKind::Incut {
                style: "WARN".to_string(),
            },
            vec![paragraph.into()],
        );
        Page::new(docspace, name, vec![incut])
    }
}

/// Relative link from a page in docspace `from` to page `name` in
/// docspace `to`.
pub fn relative_href(from: &str, to: &str, name: &str, suffix: &str) -> String {
    let file = format!("{}{}", name, suffix);
    match (from.is_empty(), to.is_empty()) {
        _ if from == to => file,
        (true, _) => format!("{}/{}", to, file),
        (false, true) => format!("../{}", file),
        (false, false) => format!("../{}/{}", to, file),
    }
}

/// Split an internal link target into docspace, page name and anchor
/// (`#` included). The page name is empty for same-page anchors.
fn split_target(target: &str, from: &str) -> (String, String, String) {
    let (path, anchor) = match target.find('#') {
        Some(i) => target.split_at(i),
        None => (target, ""),
    };
    let (docspace, name) = path.split_once('/').unwrap_or((from, path));
    (docspace.to_string(), name.to_string(), anchor.to_string())
}

/// A docspace section of the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocSpace {
    pub name: String,
    pub header: String,
    pub external: bool,
    /// Pages link to the generated reference page.
    pub reference: bool,
    /// Page names in reading order.
    pub order: Vec<String>,
}

/// An `[__index__:term]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub term: String,
    pub docspace: String,
    pub page: String,
    /// Anchor name the reference produces in its page.
    pub anchor: String,
}

#[derive(Default)]
struct Links(Vec<Link>);

impl Visitor for Links {
    fn visit_text(&mut self, text: &Text) {
        if let Text::Link(link) = text {
            if link.kind == LinkKind::Internal {
                self.0.push(link.clone());
            }
        }
    }
}

#[derive(Default)]
struct Terms(Vec<String>);

impl Visitor for Terms {
    fn visit_text(&mut self, text: &Text) {
        if let Text::Reference(reference) = text {
            if let Some(Directive::Index(term)) = reference.directive() {
                if !term.is_empty() {
                    self.0.push(reference.name.clone());
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Book {
    suffix: String,
    pages: Vec<Page>,
    index: Option<usize>,
    docspaces: Vec<DocSpace>,
    terms: Vec<IndexEntry>,
}

impl Book {
    /// `suffix` is the output file suffix, dot included.
    pub fn new(suffix: impl Into<String>) -> Self {
        Book {
            suffix: suffix.into(),
            ..Book::default()
        }
    }

    pub fn add_page(&mut self, page: Page) {
        log::debug!("adding page {}", page.path());
        self.pages.push(page);
    }

    /// Set the root index page. Its docspace is forced to the root.
    pub fn set_index(&mut self, mut page: Page) {
        page.docspace.clear();
        self.index = Some(self.pages.len());
        self.pages.push(page);
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, docspace: &str, name: &str) -> Option<&Page> {
        self.position(docspace, name).map(|i| &self.pages[i])
    }

    pub fn index(&self) -> Option<&Page> {
        self.index.map(|i| &self.pages[i])
    }

    pub fn docspaces(&self) -> &[DocSpace] {
        &self.docspaces
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    fn position(&self, docspace: &str, name: &str) -> Option<usize> {
        self.pages
            .iter()
            .position(|page| page.docspace == docspace && page.name == name)
    }

    /// Run every cross-referencing pass. Returns the number of links left
    /// invalid.
    pub fn process(&mut self) -> usize {
        self.collect();
        if let Some(reference) = self.reference_page() {
            self.add_page(reference);
        }
        let invalid = self.resolve_links();
        self.nav_links();
        invalid
    }

    /// Split the index into docspaces and gather index terms.
    pub fn collect(&mut self) {
        self.collect_docspaces();

        self.terms.clear();
        for page in &self.pages {
            let mut terms = Terms::default();
            visit::walk_blocks(&mut terms, &page.blocks);
            for anchor in terms.0 {
                let term = anchor
                    .split_once(':')
                    .map(|(_, term)| term.to_string())
                    .unwrap_or_default();
                self.terms.push(IndexEntry {
                    term,
                    docspace: page.docspace.clone(),
                    page: page.name.clone(),
                    anchor,
                });
            }
        }
        log::info!(
            "{} pages, {} docspaces, {} index terms",
            self.pages.len(),
            self.docspaces.len(),
            self.terms.len()
        );
    }

    fn collect_docspaces(&mut self) {
        self.docspaces.clear();
        let Some(index) = self.index else {
            return;
        };

        let mut docspaces = Vec::new();
        let mut headers = Vec::new();
        let mut current: Option<DocSpace> = None;
        for block in &self.pages[index].blocks {
            if block.kind == (BlockKind::Header { size: DOCSPACE_HEADER_SIZE }) {
                docspaces.extend(current.take());
                current = Some(docspace_from_header(block));
                continue;
            }
            let Some(docspace) = current.as_mut() else {
                continue;
            };
            let mut links = Links::default();
            visit::walk_block(&mut links, block);
            for link in links.0 {
                let (target_docspace, name, _) = split_target(&link.target, &docspace.name);
                if target_docspace != docspace.name || name.is_empty() {
                    continue;
                }
                if !docspace.order.contains(&name) {
                    docspace.order.push(name.clone());
                }
                headers.push((target_docspace, name, link.text.clone()));
            }
        }
        docspaces.extend(current);

        for docspace in docspaces {
            if docspace.name.is_empty() {
                log::warn!("no __docspace__ directive for \"{}\"", docspace.header);
                continue;
            }
            if !self.pages.iter().any(|page| page.docspace == docspace.name) {
                log::warn!("docspace \"{}\" has no pages", docspace.name);
            }
            self.docspaces.push(docspace);
        }

        for (docspace, name, text) in headers {
            if let Some(i) = self.position(&docspace, &name) {
                self.pages[i].set_header(&text);
            }
        }
    }

    /// Index terms grouped by the upper-cased first letter of the term.
    pub fn index_terms(&self) -> Vec<(char, Vec<&IndexEntry>)> {
        let mut groups: BTreeMap<char, Vec<&IndexEntry>> = BTreeMap::new();
        for entry in &self.terms {
            let Some(first) = entry.term.chars().next() else {
                continue;
            };
            let letter = first.to_uppercase().next().unwrap_or(first);
            groups.entry(letter).or_default().push(entry);
        }
        groups
            .into_iter()
            .map(|(letter, mut entries)| {
                entries.sort_by(|a, b| a.term.cmp(&b.term));
                (letter, entries)
            })
            .collect()
    }

    /// Build the alphabetical reference page, if the book has index terms.
    pub fn reference_page(&self) -> Option<Page> {
        let groups = self.index_terms();
        if groups.is_empty() {
            return None;
        }

        let mut blocks = Vec::new();
        let mut letters = Block::new(BlockKind::Paragraph);
        for (i, (letter, _)) in groups.iter().enumerate() {
            if i > 0 {
                letters.push(Text::Plain(" | ".to_string()));
            }
            letters.push(Text::Link(Link::new(
                LinkKind::Internal,
                letter.to_string(),
                format!("#{}", letter),
            )));
        }
        blocks.push(letters);

        for (letter, entries) in groups {
            blocks.push(Block::with_parts(
                BlockKind::Header {
                    size: LETTER_HEADER_SIZE,
                },
                vec![
                    Text::Plain(letter.to_string()).into(),
                    Text::Reference(Reference::new(letter.to_string())).into(),
                ],
            ));
            let mut paragraph = Block::new(BlockKind::Paragraph);
            for entry in entries {
                paragraph.push(Text::Link(Link::new(
                    LinkKind::Internal,
                    entry.term.clone(),
                    format!("{}/{}#{}", entry.docspace, entry.page, entry.anchor),
                )));
                paragraph.push(Text::BreakLine);
            }
            blocks.push(paragraph);
        }

        let mut page = Page::new(REFERENCE_DOCSPACE, REFERENCE_NAME, blocks);
        page.set_header(REFERENCE_HEADER);
        Some(page)
    }

    /// Rewrite internal links of every page. Targets naming an unknown
    /// page in a known docspace get a placeholder page. Returns the number
    /// of links made invalid.
    pub fn resolve_links(&mut self) -> usize {
        let known: HashSet<(String, String)> = self
            .pages
            .iter()
            .map(|page| (page.docspace.clone(), page.name.clone()))
            .collect();
        let docspaces: HashSet<String> = known.iter().map(|(ds, _)| ds.clone()).collect();
        let suffix = self.suffix.clone();

        let mut missing: Vec<(String, String)> = Vec::new();
        let mut invalid = 0;
        for page in &mut self.pages {
            let from = page.docspace.clone();
            let path = page.path();
            for block in &mut page.blocks {
                block.for_each_text_mut(&mut |text| {
                    let Some(link) = text.as_link_mut() else {
                        return;
                    };
                    if link.kind != LinkKind::Internal {
                        return;
                    }
                    let (docspace, name, anchor) = split_target(&link.target, &from);
                    if name.is_empty() {
                        link.kind = LinkKind::External;
                        link.target = anchor;
                        return;
                    }

                    let href = relative_href(&from, &docspace, &name, &suffix) + &anchor;
                    if known.contains(&(docspace.clone(), name.clone())) {
                        link.kind = LinkKind::External;
                    } else {
                        log::warn!("{}: no page for link \"{}\"", path, link.target);
                        link.kind = LinkKind::Invalid;
                        invalid += 1;
                        let key = (docspace, name);
                        if docspaces.contains(&key.0) && !missing.contains(&key) {
                            missing.push(key);
                        }
                    }
                    link.target = href;
                });
            }
        }

        let index = self
            .index()
            .map(|page| (page.docspace.clone(), page.name.clone()));
        for (docspace, name) in missing {
            let index_href = index
                .as_ref()
                .map(|(ds, index_name)| relative_href(&docspace, ds, index_name, &suffix));
            self.add_page(Page::incomplete(&docspace, &name, index_href));
        }
        invalid
    }

    /// Fill in prev/next/up/home/reference links of the pages listed in
    /// docspace reading orders.
    pub fn nav_links(&mut self) {
        let suffix = self.suffix.clone();
        let target = |pages: &[Page], i: usize, from: &str| NavLink {
            title: pages[i].title(),
            href: relative_href(from, &pages[i].docspace, &pages[i].name, &suffix),
        };
        let home = self.index;
        let reference = self.position(REFERENCE_DOCSPACE, REFERENCE_NAME);

        let mut updates: Vec<(usize, NavLinks)> = Vec::new();
        for docspace in &self.docspaces {
            let order: Vec<usize> = docspace
                .order
                .iter()
                .filter_map(|name| self.position(&docspace.name, name))
                .collect();
            for (i, &current) in order.iter().enumerate() {
                let from = docspace.name.as_str();
                let nav = NavLinks {
                    prev: i
                        .checked_sub(1)
                        .map(|j| target(&self.pages, order[j], from)),
                    next: order
                        .get(i + 1)
                        .map(|&j| target(&self.pages, j, from)),
                    up: home
                        .filter(|_| docspace.external)
                        .map(|j| target(&self.pages, j, from)),
                    home: home.map(|j| target(&self.pages, j, from)),
                    reference: reference
                        .filter(|_| docspace.reference)
                        .map(|j| target(&self.pages, j, from)),
                };
                updates.push((current, nav));
            }
        }
        if let (Some(j), Some(r)) = (home, reference) {
            let link = target(&self.pages, j, REFERENCE_DOCSPACE);
            updates.push((
                r,
                NavLinks {
                    up: Some(link.clone()),
                    home: Some(link),
                    ..NavLinks::default()
                },
            ));
        }

        for (i, nav) in updates {
            self.pages[i].nav = nav;
        }
    }
}

fn docspace_from_header(block: &Block) -> DocSpace {
    let mut docspace = DocSpace {
        header: block.plain_text().trim().to_string(),
        ..DocSpace::default()
    };
    for part in &block.parts {
        let Part::Text(Text::Reference(reference)) = part else {
            continue;
        };
        match reference.directive() {
            Some(Directive::DocSpace(name)) => docspace.name = name.to_string(),
            Some(Directive::Reference(_)) => docspace.reference = true,
            Some(Directive::ExternalIndex(_)) => docspace.external = true,
            _ => {}
        }
    }
    docspace
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hrefs_between_docspaces() {
        assert_eq!(relative_href("a", "a", "p", ".html"), "p.html");
        assert_eq!(relative_href("", "a", "p", ".html"), "a/p.html");
        assert_eq!(relative_href("a", "", "index", ".html"), "../index.html");
        assert_eq!(relative_href("a", "b", "p", ".html"), "../b/p.html");
    }

    #[test]
    fn targets_split_into_parts() {
        assert_eq!(
            split_target("kernel/mutex#lock", "x"),
            ("kernel".into(), "mutex".into(), "#lock".into())
        );
        assert_eq!(
            split_target("mutex", "kernel"),
            ("kernel".into(), "mutex".into(), String::new())
        );
        assert_eq!(
            split_target("#top", "kernel"),
            ("kernel".into(), String::new(), "#top".into())
        );
    }

    #[test]
    fn page_paths() {
        let page = Page::new("kernel", "mutex", Vec::new());
        assert_eq!(page.path(), "kernel/mutex");
        assert_eq!(page.file_path(".html"), PathBuf::from("kernel/mutex.html"));
        assert_eq!(page.title(), "mutex");
    }

    #[test]
    fn docspace_header_reads_directives() {
        let doc = tsdoc::parse(
            "### Kernel [__docspace__:kernel] [__refprefix__:k] [__reference__]",
            "index",
        )
        .expect("parse failed");
        let docspace = docspace_from_header(&doc.blocks[0]);
        assert_eq!(docspace.name, "kernel");
        assert_eq!(docspace.header, "Kernel");
        assert!(docspace.reference);
        assert!(!docspace.external);
    }
}
