//! `tsdoc build`: parse a source tree into a book and write its pages.
//!
//! `<dir>/index.md` is the book index. Every other `*.md` file belongs to
//! the docspace named by its first directory level below `<dir>`; files
//! directly in `<dir>` belong to the root docspace.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use printer::{Book, Page, Printer};

use crate::Session;

const INDEX_NAME: &str = "index";
const SOURCE_EXTENSION: &str = "md";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: printer::Error,
    },

    #[error("{0} document(s) failed to parse")]
    Fatal(usize),

    #[error("no documents found in {}", .0.display())]
    Empty(PathBuf),
}

/// A document found in the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub docspace: String,
    pub name: String,
    pub path: PathBuf,
}

impl Source {
    fn is_index(&self) -> bool {
        self.docspace.is_empty() && self.name == INDEX_NAME
    }
}

#[derive(Debug, Default)]
pub struct Summary {
    pub pages: usize,
    pub errors: usize,
    pub invalid_links: usize,
}

/// Find the documents below `root`, sorted by path.
pub fn discover(root: &Path) -> Result<Vec<Source>, BuildError> {
    let mut sources = Vec::new();
    collect(root, root, &mut sources)?;
    sources.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(sources)
}

fn collect(dir: &Path, root: &Path, out: &mut Vec<Source>) -> Result<(), BuildError> {
    let read_error = |source| BuildError::Read {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        if path.is_dir() {
            collect(&path, root, out)?;
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            log::warn!("skipping {}: file name is not UTF-8", path.display());
            continue;
        };
        let relative = path.strip_prefix(root).unwrap_or(&path);
        let docspace = if relative.components().count() > 1 {
            relative
                .components()
                .next()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            String::new()
        };
        out.push(Source {
            docspace,
            name: name.to_string(),
            path: path.clone(),
        });
    }
    Ok(())
}

/// Parse every document below `root`, cross-reference them and write the
/// pages below `out` with `printer`.
pub fn build(
    session: &mut Session,
    root: &Path,
    out: &Path,
    printer: &mut dyn Printer,
    suffix: &str,
) -> Result<Summary, BuildError> {
    let sources = discover(root)?;
    if sources.is_empty() {
        return Err(BuildError::Empty(root.to_path_buf()));
    }

    let mut book = Book::new(suffix);
    let mut summary = Summary::default();
    let mut fatal = 0;
    for source in sources {
        let document = session
            .parse_file(&source.path)
            .map_err(|e| BuildError::Read {
                path: source.path.clone(),
                source: e,
            })?;
        let Some(document) = document else {
            fatal += 1;
            continue;
        };
        summary.errors += document.errors.len();

        let is_index = source.is_index();
        let page = Page::new(source.docspace, source.name, document.blocks);
        if is_index {
            book.set_index(page);
        } else {
            book.add_page(page);
        }
    }
    if fatal > 0 {
        return Err(BuildError::Fatal(fatal));
    }

    summary.invalid_links = book.process();
    for page in book.pages() {
        let path = out.join(page.file_path(book.suffix()));
        write_page(&path, printer, page).map_err(|source| BuildError::Write {
            path: path.clone(),
            source,
        })?;
        summary.pages += 1;
    }
    log::info!("wrote {} pages to {}", summary.pages, out.display());
    Ok(summary)
}

fn write_page(path: &Path, printer: &mut dyn Printer, page: &Page) -> Result<(), printer::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = BufWriter::new(fs::File::create(path)?);
    printer.print_page(&mut file, page)?;
    file.flush()?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codespan_reporting::term::termcolor::ColorChoice;
    use printer::{HtmlPrinter, MarkdownPrinter};
    use tempfile::TempDir;

    fn write(root: &Path, path: &str, content: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn sample() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "index.md",
            "# Guide\n\n### Basics [__docspace__:basics]\n\n[Start][basics/start]\n[Next][basics/next]\n",
        );
        write(dir.path(), "basics/start.md", "Read [the next page][next].\n");
        write(dir.path(), "basics/next.md", "Back to [start][start#top].\n");
        dir
    }

    #[test]
    fn first_directory_is_docspace() {
        let dir = sample();
        write(dir.path(), "basics/deep/inner.md", "x\n");
        write(dir.path(), "notes.txt", "ignored\n");

        let sources = discover(dir.path()).unwrap();
        let found: Vec<(&str, &str)> = sources
            .iter()
            .map(|s| (s.docspace.as_str(), s.name.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("basics", "inner"),
                ("basics", "next"),
                ("basics", "start"),
                ("", "index"),
            ]
        );
        assert!(sources[3].is_index());
    }

    #[test]
    fn builds_linked_html_pages() {
        let dir = sample();
        let out = TempDir::new().unwrap();
        let mut session = Session::new(ColorChoice::Never, false);
        let mut printer = HtmlPrinter::default();

        let summary = build(&mut session, dir.path(), out.path(), &mut printer, ".html").unwrap();
        assert_eq!(summary.pages, 3);
        assert_eq!(summary.invalid_links, 0);

        let start = fs::read_to_string(out.path().join("basics/start.html")).unwrap();
        assert!(start.contains("<a href=\"next.html\">the next page</a>"));
        assert!(start.contains("<strong>Next</strong>(Next)"));
        let next = fs::read_to_string(out.path().join("basics/next.html")).unwrap();
        assert!(next.contains("<a href=\"start.html#top\">start</a>"));
        assert!(out.path().join("index.html").exists());
    }

    #[test]
    fn markdown_build_uses_suffix() {
        let dir = sample();
        let out = TempDir::new().unwrap();
        let mut session = Session::new(ColorChoice::Never, false);
        let mut printer = MarkdownPrinter::new();

        build(&mut session, dir.path(), out.path(), &mut printer, ".md").unwrap();
        let start = fs::read_to_string(out.path().join("basics/start.md")).unwrap();
        assert!(start.starts_with("\n# Start\n"));
        assert!(start.contains("[the next page](next.md)"));
    }

    #[test]
    fn fatal_parse_errors_stop_the_build() {
        let dir = sample();
        write(dir.path(), "basics/broken.md", "`````missing.c\n`````\n");
        let out = TempDir::new().unwrap();
        let mut session = Session::new(ColorChoice::Never, false);
        let mut printer = MarkdownPrinter::new();

        let err = build(&mut session, dir.path(), out.path(), &mut printer, ".md").unwrap_err();
        assert!(matches!(err, BuildError::Fatal(1)));
        assert!(!out.path().join("index.md").exists());
    }

    #[test]
    fn empty_tree_is_an_error() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let mut session = Session::new(ColorChoice::Never, false);
        let mut printer = MarkdownPrinter::new();
        let err = build(&mut session, dir.path(), out.path(), &mut printer, ".md").unwrap_err();
        assert!(matches!(err, BuildError::Empty(_)));
    }
}
