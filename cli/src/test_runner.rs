//! Golden tests: `.test.md` files holding TOML frontmatter between `---`
//! lines followed by a tsdoc document.
//!
//! ```text
//! ---
//! description = "italic"
//! expect_markdown = "_x_"
//! ---
//! _x_
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use printer::{HtmlPrinter, MarkdownPrinter, Page, Printer};
use tsdoc::{Document, ParseError};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectedError {
    /// Substring of the error message.
    pub contains: String,

    /// 1-based line the error must be reported on.
    #[serde(default)]
    pub line: Option<usize>,

    /// `construct`, `unterminated` or `invariant`.
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestConfig {
    pub description: Option<String>,

    /// Markdown printer output (trimmed comparison).
    pub expect_markdown: Option<String>,

    /// HTML body without the page template (trimmed comparison).
    pub expect_html: Option<String>,

    /// Block tree as printed by `tsdoc ast` (trimmed comparison).
    pub expect_blocks: Option<String>,

    /// Recoverable errors. If present (even empty), the count is checked too.
    pub expect_errors: Option<Vec<ExpectedError>>,

    /// Substring of the fatal error the parse must fail with.
    pub expect_fatal: Option<String>,
}

/// Split a `.test.md` file into its TOML config and tsdoc source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');
    let rest = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let rest = rest
        .strip_prefix('\n')
        .or_else(|| rest.strip_prefix("\r\n"))
        .unwrap_or(rest);

    let (frontmatter, after) = match rest.strip_prefix("---") {
        Some(after) => ("", after),
        None => {
            let close = rest
                .find("\n---")
                .ok_or("missing closing --- frontmatter delimiter")?;
            (rest[..close].trim_end_matches('\r'), &rest[close + 4..])
        }
    };
    let source = after
        .strip_prefix("\r\n")
        .or_else(|| after.strip_prefix('\n'))
        .unwrap_or(after);

    let config = toml::from_str(frontmatter).map_err(|e| format!("TOML parse error: {}", e))?;
    Ok((config, source))
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    /// Failure reason, `None` on success.
    pub failure: Option<String>,
}

impl TestResult {
    fn label(&self) -> String {
        match &self.description {
            Some(description) => description.clone(),
            None => self
                .path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.trim_end_matches(".test.md").to_string())
                .unwrap_or_else(|| "?".to_string()),
        }
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let (description, failure) = match std::fs::read_to_string(path) {
        Ok(content) => match parse_test_file(&content) {
            Ok((config, source)) => (config.description.clone(), check(path, &config, source)),
            Err(e) => (None, Some(format!("frontmatter error: {}", e))),
        },
        Err(e) => (None, Some(format!("cannot read file: {}", e))),
    };
    TestResult {
        path: path.to_path_buf(),
        description,
        failure,
    }
}

/// Parse `source` and check every expectation of `config`. Returns the
/// first mismatch.
fn check(path: &Path, config: &TestConfig, source: &str) -> Option<String> {
    let mut parser =
        tsdoc::Parser::new(source.to_string(), 0).with_name(path.display().to_string());
    if let Some(dir) = path.parent() {
        parser = parser.with_base_dir(dir);
    }

    let document = match (parser.parse(), &config.expect_fatal) {
        (Err(e), Some(expected)) => {
            let message = e.to_string();
            return (!message.contains(expected.as_str())).then(|| {
                format!("expected fatal error containing \"{}\", got: {}", expected, message)
            });
        }
        (Err(e), None) => return Some(format!("unexpected fatal error: {}", e)),
        (Ok(_), Some(expected)) => {
            return Some(format!(
                "expected fatal error containing \"{}\", but parsing succeeded",
                expected
            ));
        }
        (Ok(document), None) => document,
    };

    if let Some(expected) = &config.expect_errors {
        if let Some(reason) = check_errors(&document.errors, expected) {
            return Some(reason);
        }
    }

    let outputs: [(&str, &Option<String>, fn(&Document) -> String); 3] = [
        ("blocks", &config.expect_blocks, |doc| tsdoc::pprint::pretty(&doc.blocks)),
        ("markdown", &config.expect_markdown, render_markdown),
        ("html", &config.expect_html, |doc| HtmlPrinter::default().body(&doc.blocks)),
    ];
    for (what, expected, render) in outputs {
        let Some(expected) = expected else {
            continue;
        };
        let actual = render(&document);
        if actual.trim() != expected.trim() {
            return Some(format!(
                "{} mismatch\n  expected:\n{}\n  actual:\n{}",
                what,
                indent(expected.trim()),
                indent(actual.trim())
            ));
        }
    }
    None
}

fn render_markdown(document: &Document) -> String {
    let page = Page::new("", document.name.clone(), document.blocks.clone());
    MarkdownPrinter::new()
        .render(&page)
        .unwrap_or_else(|e| format!("<render error: {}>", e))
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn check_errors(actual: &[ParseError], expected: &[ExpectedError]) -> Option<String> {
    if actual.len() != expected.len() {
        let listed: Vec<String> = actual.iter().map(|e| format!("  - {}", e)).collect();
        return Some(format!(
            "expected {} error(s), got {}\n  actual errors:\n{}",
            expected.len(),
            actual.len(),
            if listed.is_empty() {
                "    (none)".to_string()
            } else {
                listed.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in actual.iter().zip(expected).enumerate() {
        if !actual.message.contains(&expected.contains) {
            return Some(format!(
                "error[{}]: expected message containing \"{}\", got: {}",
                i, expected.contains, actual.message
            ));
        }
        if let Some(line) = expected.line {
            if actual.line != line {
                return Some(format!(
                    "error[{}]: expected on line {}, but reported on line {}",
                    i, line, actual.line
                ));
            }
        }
        if let Some(kind) = &expected.kind {
            if actual.kind.to_string() != *kind {
                return Some(format!(
                    "error[{}]: expected kind {}, got {}",
                    i, kind, actual.kind
                ));
            }
        }
    }
    None
}

/// `.test.md` files below `root` grouped by subfolder. Files directly in
/// `root` get the empty category. A file `root` is its own category.
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    if root.is_file() {
        categories.insert(String::new(), vec![root.to_path_buf()]);
        return categories;
    }
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        log::warn!("cannot read test directory {}", dir.display());
        return;
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            collect_tests(&path, root, out);
            continue;
        }
        let is_test = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(".test.md"));
        if is_test {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }
    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return;
    }
    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

/// Keep the categories named in `requested` (and their subcategories).
fn select<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a [PathBuf]> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();
    }
    let mut selected = BTreeMap::new();
    for request in requested {
        let request = request.trim_matches('/');
        let prefix = format!("{}/", request);
        let before = selected.len();
        for (category, files) in all {
            if category == request || category.starts_with(&prefix) {
                selected.insert(category.as_str(), files.as_slice());
            }
        }
        if selected.len() == before {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                request,
                available.join(", ")
            );
        }
    }
    selected
}

struct Style {
    color: bool,
}

impl Style {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    fn pass(&self) -> String {
        self.paint("32", "PASS")
    }

    fn fail(&self) -> String {
        self.paint("31", "FAIL")
    }
}

/// Run all `.test.md` files under `path` (or a single file). Returns the
/// process exit code: 0 when every test passed.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let style = Style { color: !no_color };
    let all = discover_categorized(path);
    if all.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return 1;
    }
    let selected = select(&all, categories);
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();
    for (category, files) in &selected {
        if selected.len() > 1 || !category.is_empty() {
            eprintln!();
            eprintln!("{}", style.paint("1", category_label(category)));
        }
        for file in *files {
            let result = run_single_test(file);
            if result.failure.is_none() {
                passed += 1;
                eprintln!("  {}  {}", style.pass(), result.label());
            } else {
                eprintln!("  {}  {}", style.fail(), result.label());
                failures.push(result);
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for result in &failures {
            eprintln!();
            eprintln!("  --- {} ---", result.path.display());
            for line in result.failure.iter().flat_map(|reason| reason.lines()) {
                eprintln!("  {}", line);
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {} passed, 0 failed", style.paint("32", "ok"), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            style.paint("31", "FAILED"),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_test(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn frontmatter_splits_from_source() {
        let (config, source) =
            parse_test_file("---\ndescription = \"d\"\nexpect_markdown = \"x\"\n---\nx\n").unwrap();
        assert_eq!(config.description.as_deref(), Some("d"));
        assert_eq!(config.expect_markdown.as_deref(), Some("x"));
        assert_eq!(source, "x\n");
    }

    #[test]
    fn missing_frontmatter_is_reported() {
        assert!(parse_test_file("x\n").is_err());
        assert!(parse_test_file("---\ndescription = \"d\"\n").is_err());
    }

    #[test]
    fn outputs_are_compared() {
        let dir = TempDir::new().unwrap();
        let path = write_test(
            dir.path(),
            "styles.test.md",
            "---\nexpect_markdown = \"a _b_\"\nexpect_html = \"<p>\\na <em>b</em>\\n</p>\"\nexpect_blocks = '''\nParagraph\n  Plain(\"a \")\n  Italic(\"b\")\n'''\n---\na _b_\n",
        );
        let result = run_single_test(&path);
        assert_eq!(result.failure, None);
        assert_eq!(result.label(), "styles");
    }

    #[test]
    fn errors_are_matched_by_line_and_kind() {
        let dir = TempDir::new().unwrap();
        let path = write_test(
            dir.path(),
            "open.test.md",
            "---\n[[expect_errors]]\ncontains = \"Code\"\nline = 3\nkind = \"unterminated\"\n---\ntext\n\n```\nnever closed\n",
        );
        assert_eq!(run_single_test(&path).failure, None);

        let path = write_test(
            dir.path(),
            "none.test.md",
            "---\nexpect_errors = []\n---\n_open\n",
        );
        let failure = run_single_test(&path).failure.unwrap();
        assert!(failure.starts_with("expected 0 error(s), got 1"), "{}", failure);
    }

    #[test]
    fn fatal_errors_are_expected_explicitly() {
        let dir = TempDir::new().unwrap();
        let path = write_test(
            dir.path(),
            "fatal.test.md",
            "---\nexpect_fatal = \"cannot read code listing\"\n---\n`````nope.c\n`````\n",
        );
        assert_eq!(run_single_test(&path).failure, None);

        let path = write_test(dir.path(), "ok.test.md", "---\nexpect_fatal = \"x\"\n---\nfine\n");
        assert!(run_single_test(&path).failure.unwrap().contains("parsing succeeded"));
    }

    #[test]
    fn categories_follow_folders() {
        let dir = TempDir::new().unwrap();
        write_test(dir.path(), "a.test.md", "---\n---\nx\n");
        write_test(dir.path(), "lists/b.test.md", "---\n---\n* x\n");
        write_test(dir.path(), "lists/nested/c.test.md", "---\n---\n* x\n");
        write_test(dir.path(), "lists/readme.md", "not a test\n");

        let all = discover_categorized(dir.path());
        let names: Vec<&str> = all.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["", "lists", "lists/nested"]);

        let selected = select(&all, &["lists".to_string()]);
        assert_eq!(selected.len(), 2);
        assert_eq!(run_tests(dir.path(), true, &[]), 0);
    }
}
