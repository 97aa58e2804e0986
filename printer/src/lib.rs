pub mod book;
pub mod error;
pub mod html;
pub mod markdown;
mod tabs;

pub use book::{Book, NavLink, NavLinks, Page};
pub use error::Error;
pub use html::{HtmlOptions, HtmlPrinter};
pub use markdown::MarkdownPrinter;

use std::io::Write;

/// An output backend for pages.
pub trait Printer {
    /// Suffix of the files this printer writes, dot included.
    fn suffix(&self) -> &'static str;

    fn print_page(&mut self, out: &mut dyn Write, page: &Page) -> Result<(), Error>;

    /// Print a page into a string.
    fn render(&mut self, page: &Page) -> Result<String, Error> {
        let mut out = Vec::new();
        self.print_page(&mut out, page)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}
