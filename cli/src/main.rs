mod build;
mod config;
mod test_runner;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};

use printer::{HtmlPrinter, MarkdownPrinter, Page, Printer};
use tsdoc::Document;
use tsdoc::trace::LogTrace;

use config::{Config, ConfigError, DEFAULT_CONFIG};

#[derive(Parser)]
#[command(name = "tsdoc", version, about = "tsdoc documentation processor")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log every parser step (target `tsdoc`, level trace)
    #[arg(long, global = true)]
    trace: bool,

    /// Log progress; repeat for debug output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (defaults to ./tsdoc.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a document and report its errors
    Check(FileArgs),

    /// Dump the block tree of a document
    Ast(FileArgs),

    /// Render one document
    Render(RenderArgs),

    /// Cross-reference and render a directory of documents
    Build(BuildArgs),

    /// Run .test.md test files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct FileArgs {
    /// Document to parse
    file: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Html,
    Markdown,
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Document to render
    file: PathBuf,

    #[arg(short, long, value_enum, default_value_t = Format::Html)]
    format: Format,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Source directory; its subdirectories are docspaces
    dir: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "out")]
    out: PathBuf,

    #[arg(short, long, value_enum, default_value_t = Format::Html)]
    format: Format,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: PathBuf,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

/// Source files and diagnostic output shared by the commands.
pub(crate) struct Session {
    files: SimpleFiles<String, String>,
    writer: StandardStream,
    config: term::Config,
    trace: bool,
}

impl Session {
    pub(crate) fn new(color: ColorChoice, trace: bool) -> Self {
        Session {
            files: SimpleFiles::new(),
            writer: StandardStream::stderr(color),
            config: term::Config::default(),
            trace,
        }
    }

    pub(crate) fn emit(&self, diagnostic: &Diagnostic<usize>) {
        let _ = term::emit_to_write_style(
            &mut self.writer.lock(),
            &self.config,
            &self.files,
            diagnostic,
        );
    }

    /// Parse `path`, reporting its errors. `Ok(None)` means the parse
    /// failed and the failure was already reported.
    pub(crate) fn parse_file(&mut self, path: &Path) -> io::Result<Option<Document>> {
        let source = fs::read_to_string(path)?;
        let name = path.display().to_string();
        let file_id = self.files.add(name.clone(), source.clone());

        let mut parser = tsdoc::Parser::new(source, file_id).with_name(name);
        if let Some(dir) = path.parent() {
            parser = parser.with_base_dir(dir);
        }
        if self.trace {
            parser = parser.with_trace(Box::new(LogTrace));
        }

        match parser.parse() {
            Ok(document) => {
                for error in &document.errors {
                    self.emit(&error.to_diagnostic());
                }
                Ok(Some(document))
            }
            Err(error) => {
                log::debug!("{}", error);
                self.emit(&error.to_diagnostic(file_id));
                Ok(None)
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let color = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let mut session = Session::new(color, cli.trace);
    let config = cli.config.as_deref();

    let code = match cli.command {
        Command::Check(args) => do_check(&mut session, &args.file),
        Command::Ast(args) => do_ast(&mut session, &args.file),
        Command::Render(args) => do_render(&mut session, config, args),
        Command::Build(args) => do_build(&mut session, config, args),
        Command::Test(args) => {
            if args.list_categories {
                test_runner::list_categories(&args.path);
                0
            } else {
                test_runner::run_tests(&args.path, cli.no_color, &args.category)
            }
        }
    };
    process::exit(code);
}

fn init_logging(cli: &Cli) {
    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if cli.trace {
        builder.filter_module("tsdoc", log::LevelFilter::Trace);
    }
    // RUST_LOG wins over the flags.
    builder.parse_default_env();
    builder.init();
}

fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or(Path::new(DEFAULT_CONFIG));
    Config::load_from_path(path)
}

/// Load the configuration and the printer it configures.
fn setup(
    config_path: Option<&Path>,
    format: Format,
) -> Result<(Config, Box<dyn Printer>), ConfigError> {
    let config = load_config(config_path)?;
    let backend: Box<dyn Printer> = match format {
        Format::Html => Box::new(HtmlPrinter::new(config.html_options()?)),
        Format::Markdown => Box::new(MarkdownPrinter::new()),
    };
    Ok((config, backend))
}

/// Parse a single file for check, ast and render. Errors are reported.
fn parse_or_report(session: &mut Session, path: &Path) -> Option<Document> {
    match session.parse_file(path) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", path.display(), e);
            None
        }
    }
}

fn do_check(session: &mut Session, path: &Path) -> i32 {
    let Some(document) = parse_or_report(session, path) else {
        return 1;
    };
    if document.has_errors() {
        eprintln!(
            "{}: {} error(s), {} top-level block(s)",
            path.display(),
            document.errors.len(),
            document.blocks.len()
        );
    } else {
        eprintln!("ok: {} parsed successfully", path.display());
    }
    0
}

fn do_ast(session: &mut Session, path: &Path) -> i32 {
    let Some(document) = parse_or_report(session, path) else {
        return 1;
    };
    print!("{}", tsdoc::pprint::pretty(&document.blocks));
    0
}

fn do_render(session: &mut Session, config_path: Option<&Path>, args: RenderArgs) -> i32 {
    let (_, mut backend) = match setup(config_path, args.format) {
        Ok(setup) => setup,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };
    let Some(document) = parse_or_report(session, &args.file) else {
        return 1;
    };
    let name = args
        .file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let page = Page::new("", name, document.blocks);

    let result = match &args.output {
        Some(path) => fs::File::create(path)
            .map_err(printer::Error::from)
            .and_then(|mut file| backend.print_page(&mut file, &page)),
        None => {
            let mut stdout = io::stdout().lock();
            backend
                .print_page(&mut stdout, &page)
                .and_then(|()| stdout.flush().map_err(printer::Error::from))
        }
    };
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {}", e);
            1
        }
    }
}

fn do_build(session: &mut Session, config_path: Option<&Path>, args: BuildArgs) -> i32 {
    let (config, mut backend) = match setup(config_path, args.format) {
        Ok(setup) => setup,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };
    let suffix = config
        .book
        .suffix
        .clone()
        .unwrap_or_else(|| backend.suffix().to_string());

    match build::build(session, &args.dir, &args.out, backend.as_mut(), &suffix) {
        Ok(summary) => {
            eprintln!(
                "built {} page(s) into {}: {} parse error(s), {} invalid link(s)",
                summary.pages,
                args.out.display(),
                summary.errors,
                summary.invalid_links
            );
            0
        }
        Err(e) => {
            eprintln!("error: {}", e);
            1
        }
    }
}
