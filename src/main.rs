//! folio - Inspect the structure of EPUB files

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use folio::{BookDocument, ParseOptions, TocMatch, parse_book_with};

#[derive(Parser)]
#[command(name = "folio")]
#[command(version, about = "Inspect the structure of EPUB files", long_about = None)]
#[command(after_help = "EXAMPLES:
    folio book.epub info               Show book metadata
    folio book.epub toc                List table of contents
    folio book.epub chapter 3 --raw    Print the markup of spine entry 3
    folio book.epub search whale       Find text across chapters
    folio book.epub json --pretty      Export everything as JSON")]
struct Cli {
    /// Input file (EPUB or KEPUB)
    #[arg(value_name = "INPUT")]
    input: String,

    #[command(subcommand)]
    command: Command,

    /// Accept any `<nav>` attribute equal to "toc", not just epub:type
    #[arg(long, global = true)]
    loose_toc: bool,

    /// Largest archive entry to read, in bytes
    #[arg(long, global = true, value_name = "BYTES")]
    max_entry_size: Option<u64>,

    /// Total chapter bytes to keep before skipping the rest
    #[arg(long, global = true, value_name = "BYTES")]
    max_total_size: Option<u64>,

    /// Show debug logs (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show book metadata
    Info,
    /// List table of contents entries
    Toc,
    /// List chapters with their titles and word counts
    Chapters,
    /// Print one chapter's text
    Chapter {
        /// Spine index of the chapter
        index: usize,
        /// Print the original markup instead of the text
        #[arg(long)]
        raw: bool,
    },
    /// Search chapter text, case-insensitively
    Search { query: String },
    /// Export the whole book as JSON
    Json {
        /// Include each chapter's original markup
        #[arg(long)]
        raw: bool,
        /// Pretty-print
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: &Cli) -> Result<(), String> {
    let mut options = ParseOptions::default();
    if cli.loose_toc {
        options = options.with_toc_match(TocMatch::AnyAttribute);
    }
    if let Some(bytes) = cli.max_entry_size {
        options = options.with_max_entry_size(bytes);
    }
    if let Some(bytes) = cli.max_total_size {
        options = options.with_max_total_size(bytes);
    }

    let book = parse_book_with(&cli.input, &options).map_err(|e| e.to_string())?;

    match &cli.command {
        Command::Info => show_info(&cli.input, &book),
        Command::Toc => {
            for entry in &book.toc {
                println!("{}\t{}", entry.title, entry.href);
            }
        }
        Command::Chapters => {
            for chapter in &book.chapters {
                println!(
                    "{:>4}{} {:<40}  {:>7} words  {}",
                    chapter.index,
                    if chapter.linear { " " } else { "*" },
                    chapter.title.as_deref().unwrap_or("-"),
                    chapter.word_count(),
                    chapter.file
                );
            }
        }
        Command::Chapter { index, raw } => {
            let chapter = book
                .get_chapter(*index)
                .ok_or_else(|| format!("no chapter with index {index}"))?;
            if *raw {
                println!("{}", chapter.raw_markup);
            } else {
                println!("{}", chapter.text);
            }
        }
        Command::Search { query } => {
            let hits = book.search(query);
            for hit in &hits {
                println!(
                    "[{}] {}: {}",
                    hit.chapter_index,
                    hit.chapter_title.as_deref().unwrap_or("-"),
                    hit.snippet
                );
            }
            eprintln!("{} match(es)", hits.len());
        }
        Command::Json { raw, pretty } => {
            let json = book.to_json(*raw, *pretty).map_err(|e| e.to_string())?;
            println!("{json}");
        }
    }

    Ok(())
}

fn show_info(path: &str, book: &BookDocument) {
    let meta = &book.metadata;
    println!("File: {path}");
    println!("Format: {}", book.format);
    println!("Title: {}", meta.title);
    println!("Author: {}", meta.author);
    if !meta.language.is_empty() {
        println!("Language: {}", meta.language);
    }
    if !meta.publisher.is_empty() {
        println!("Publisher: {}", meta.publisher);
    }
    if !meta.date.is_empty() {
        println!("Date: {}", meta.date);
    }
    if !meta.isbn.is_empty() {
        println!("ISBN: {}", meta.isbn);
    }
    if !meta.series.is_empty() {
        if meta.series_index.is_empty() {
            println!("Series: {}", meta.series);
        } else {
            println!("Series: {} #{}", meta.series, meta.series_index);
        }
    }
    if !meta.tags.is_empty() {
        println!("Tags: {}", meta.tags.join(", "));
    }
    let desc = meta.description.trim();
    if !desc.is_empty() {
        match desc.char_indices().nth(200) {
            Some((cut, _)) => println!("Description: {}...", &desc[..cut]),
            None => println!("Description: {desc}"),
        }
    }
    println!("Chapters: {}", book.chapters.len());
    println!("TOC entries: {}", book.toc.len());
    println!("Words: {}", book.word_count());
}
