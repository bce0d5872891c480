use std::fs;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use htmlpdf::store::{DirectoryStore, DocumentStore};
use htmlpdf::style::{Style, Value};
use htmlpdf::{Config, LayoutNode};

const LOCAL_CONFIG: &str = "htmlpdf.toml";

#[derive(Parser)]
#[command(name = "htmlpdf")]
#[command(about = "Convert HTML documents to paginated PDF")]
struct Cli {
    /// Input HTML file
    input: PathBuf,

    /// Output file (defaults to input name with .pdf extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Page size (LETTER, LEGAL, TABLOID, EXECUTIVE, A3, A4, A5)
    #[arg(short, long)]
    format: Option<String>,

    /// TOML config file (defaults to htmlpdf.toml next to the input, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// What to produce
    #[arg(long, value_enum, default_value_t = Emit::Pdf)]
    emit: Emit,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// PDF document
    Pdf,
    /// Intermediate Typst markup, printed to stdout
    Typst,
    /// Converted layout tree, printed to stdout
    Tree,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> htmlpdf::Result<()> {
    let html = fs::read_to_string(&cli.input)?;

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load(&cli.input.with_file_name(LOCAL_CONFIG)),
    };
    if let Some(format) = cli.format {
        config.page.format = format;
    }
    let options = config.options()?;

    match cli.emit {
        Emit::Typst => {
            print!("{}", htmlpdf::html_to_typst(&html, &options));
        }
        Emit::Tree => {
            let doc = htmlpdf::html_to_document(&html, &options);
            println!(
                "{} [{} {}x{}pt, margin {}pt] {}",
                doc.title,
                options.format,
                doc.page.width,
                doc.page.height,
                doc.page.margin,
                describe_style(&doc.base_style)
            );
            for node in &doc.content {
                print_tree(node, 1);
            }
        }
        Emit::Pdf => {
            let doc = htmlpdf::html_to_document(&html, &options);
            let pdf_bytes = htmlpdf::document_to_pdf(&doc, &config.fonts)?;

            let output = cli
                .output
                .unwrap_or_else(|| cli.input.with_extension("pdf"));
            let dir = match output.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            let name = output
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document.pdf".to_string());

            let url = DirectoryStore::new(dir).put(&name, &pdf_bytes, "application/pdf")?;
            println!("Created {}", url);
        }
    }

    Ok(())
}

fn print_tree(node: &LayoutNode, depth: usize) {
    let indent = "  ".repeat(depth);
    let style = node.style().map(describe_style).unwrap_or_default();
    match node {
        LayoutNode::Text(run) => println!("{indent}Text {:?} {style}", run.text),
        LayoutNode::Inline { .. } => println!("{indent}Inline {style}"),
        LayoutNode::Paragraph { .. } => println!("{indent}Paragraph {style}"),
        LayoutNode::Block { .. } => println!("{indent}Block {style}"),
        LayoutNode::Row { .. } => println!("{indent}Row {style}"),
        LayoutNode::Heading { level, .. } => println!("{indent}Heading h{level} {style}"),
        LayoutNode::List(list) => {
            let kind = if list.ordered { "ordered" } else { "bulleted" };
            println!("{indent}List {kind} {style}");
            for item in &list.items {
                println!("{indent}  Item {:?}", item.marker);
                for child in &item.children {
                    print_tree(child, depth + 2);
                }
            }
        }
        LayoutNode::Image(image) => println!(
            "{indent}Image {} ({} bytes, box {}x{}) {style}",
            image.mime,
            image.data.len(),
            image.max_width,
            image.max_height
        ),
        LayoutNode::LineBreak => println!("{indent}LineBreak"),
    }
    for child in node.children() {
        print_tree(child, depth + 1);
    }
}

fn describe_style(style: &Style) -> String {
    if style.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = style
        .iter()
        .map(|(prop, value)| {
            let value = match value {
                Value::Number(n) => n.to_string(),
                Value::Percent(s)
                | Value::Color(s)
                | Value::Keyword(s) => s.clone(),
                Value::Font(font) => font.name().to_string(),
            };
            format!("{}: {}", prop.key(), value)
        })
        .collect();
    format!("{{{}}}", parts.join(", "))
}
