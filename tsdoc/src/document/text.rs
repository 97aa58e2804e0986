use std::fmt;

/// An inline leaf of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Text {
    Plain(String),
    Bold(String),
    Italic(String),
    BoldItalic(String),
    InlineCode(String),
    Label { style: String, text: String },
    Reference(Reference),
    Link(Link),
    Image(Link),
    /// Forced line break (`>>>` in source).
    BreakLine,
    /// Layout line break, produced only by paged backends.
    LineBreak,
}

/// A named anchor, or a directive when the name starts with `_`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Points into the book; resolved after all pages are parsed.
    Internal,
    External,
    /// An internal link whose target page does not exist.
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub kind: LinkKind,
    pub text: String,
    pub target: String,
}

/// Parsed form of a `[__tag__:value]` reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    DocSpace(&'a str),
    Reference(&'a str),
    RefPrefix(&'a str),
    ExternalIndex(&'a str),
    EndFrontPage,
    EndBackPage,
    Index(&'a str),
    Other { tag: &'a str, value: &'a str },
}

impl Reference {
    pub fn new(name: impl Into<String>) -> Self {
        Reference { name: name.into() }
    }

    pub fn is_directive(&self) -> bool {
        self.name.starts_with('_')
    }

    /// Split a directive reference into its tag and value.
    ///
    /// Returns `None` for plain anchors. The value is everything after the
    /// first `:`; a directive without one has an empty value.
    pub fn directive(&self) -> Option<Directive<'_>> {
        if !self.is_directive() {
            return None;
        }
        let (tag, value) = self.name.split_once(':').unwrap_or((&self.name, ""));
        let directive = match tag {
            "__docspace__" => Directive::DocSpace(value),
            "__reference__" => Directive::Reference(value),
            "__refprefix__" => Directive::RefPrefix(value),
            "__external_index__" => Directive::ExternalIndex(value),
            "__endfrontpage__" => Directive::EndFrontPage,
            "__endbackpage__" => Directive::EndBackPage,
            "__index__" => Directive::Index(value),
            _ => Directive::Other { tag, value },
        };
        Some(directive)
    }
}

impl Link {
    pub fn new(kind: LinkKind, text: impl Into<String>, target: impl Into<String>) -> Self {
        Link {
            kind,
            text: text.into(),
            target: target.into(),
        }
    }
}

impl Text {
    /// The visible characters of this leaf.
    pub fn plain_text(&self) -> &str {
        match self {
            Text::Plain(s)
            | Text::Bold(s)
            | Text::Italic(s)
            | Text::BoldItalic(s)
            | Text::InlineCode(s) => s,
            Text::Label { text, .. } => text,
            Text::Link(link) | Text::Image(link) => &link.text,
            Text::Reference(_) => "",
            Text::BreakLine | Text::LineBreak => "\n",
        }
    }

    pub fn as_link_mut(&mut self) -> Option<&mut Link> {
        match self {
            Text::Link(link) | Text::Image(link) => Some(link),
            _ => None,
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Internal => write!(f, "internal"),
            LinkKind::External => write!(f, "external"),
            LinkKind::Invalid => write!(f, "invalid"),
        }
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Text::Plain(s) => write!(f, "{}", s),
            Text::Bold(s) => write!(f, "**{}**", s),
            Text::Italic(s) => write!(f, "_{}_", s),
            Text::BoldItalic(s) => write!(f, "_*{}*_", s),
            Text::InlineCode(s) => write!(f, "`{}`", s),
            Text::Label { text, .. } => write!(f, "{}", text),
            Text::Reference(reference) => write!(f, "[{}]", reference.name),
            Text::Link(link) => match link.kind {
                LinkKind::External => write!(f, "[{}]({})", link.text, link.target),
                LinkKind::Internal | LinkKind::Invalid => {
                    write!(f, "[{}][{}]", link.text, link.target)
                }
            },
            Text::Image(link) => write!(f, "![{}]({})", link.text, link.target),
            Text::BreakLine => write!(f, ">>>"),
            Text::LineBreak => writeln!(f),
        }
    }
}
