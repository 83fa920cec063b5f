mod manifest;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use incremental_pdf::writer::{StagedFile, WriterOptions};
use incremental_pdf::{
    inspect_file, render_pages, ConversionReport, IncrementalPdfWriter, PipelineOptions,
};
use manifest::Manifest;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "incpdf",
    about = "Assemble scanned-page PDFs from pre-encoded JPEG and JBIG2 layers",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a PDF from a JSON manifest of page images
    Assemble {
        /// Manifest describing pages, outline and metadata
        #[arg(short, long)]
        manifest: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Number of worker threads (defaults to the CPU count, at most 8)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Fraction of pages that must succeed before the file is installed
        #[arg(long, default_value_t = 1.0)]
        min_completion: f64,

        /// Value written to /Producer
        #[arg(long)]
        producer: Option<String>,

        /// Stream pages to a staging file instead of buffering in memory
        #[arg(long)]
        stream: bool,

        /// Record the current time as /ModDate
        #[arg(long)]
        stamp_date: bool,

        /// Write a JSON conversion report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Check the structure of a PDF written by this tool
    Validate {
        /// Input PDF file
        input: PathBuf,
    },
}

#[derive(Serialize)]
struct PageFailureReport {
    page: usize,
    error: String,
}

#[derive(Serialize)]
struct ReportFile {
    pages: usize,
    written: Vec<usize>,
    failed: Vec<PageFailureReport>,
    skipped: Vec<usize>,
    completion: f64,
    installed: bool,
    elapsed_ms: u128,
    finished_at: DateTime<Utc>,
}

impl ReportFile {
    fn new(report: &ConversionReport, installed: bool) -> Self {
        Self {
            pages: report.page_count,
            written: report.written.clone(),
            failed: report
                .failed
                .iter()
                .map(|f| PageFailureReport {
                    page: f.index,
                    error: f.error.to_string(),
                })
                .collect(),
            skipped: report.skipped.clone(),
            completion: report.completion(),
            installed,
            elapsed_ms: report.duration.as_millis(),
            finished_at: Utc::now(),
        }
    }

    fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "incremental_pdf=warn,incpdf=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Render every page into `writer` and finalize if enough pages made it
fn convert<W: Write + Send>(
    writer: &IncrementalPdfWriter<W>,
    manifest: &Manifest,
    options: &PipelineOptions,
) -> Result<ConversionReport> {
    let globals = manifest.load_globals()?;
    writer.init(&manifest.layout())?;

    let report = render_pages(writer, manifest, options);
    for failure in &report.failed {
        warn!(page = failure.index, error = %failure.error, "page failed");
    }
    if writer.has_failed() {
        bail!(
            "Output write failed after {} of {} pages; nothing was installed",
            report.written.len(),
            report.page_count
        );
    }
    if report.meets(options.min_completion) {
        writer.finalize(&globals)?;
    }
    Ok(report)
}

fn assemble(
    manifest_path: &Path,
    output: &Path,
    workers: Option<usize>,
    min_completion: f64,
    writer_options: WriterOptions,
    stream: bool,
    report_path: Option<&Path>,
) -> Result<()> {
    let manifest = Manifest::load(manifest_path)?;

    let mut options = PipelineOptions::default().with_min_completion(min_completion);
    if let Some(workers) = workers {
        options = options.with_workers(workers);
    }

    info!(
        manifest = %manifest_path.display(),
        pages = manifest.pages.len(),
        workers = options.num_workers,
        "assembling PDF"
    );

    let (report, installed) = if stream {
        let staged = StagedFile::create(output)?;
        let writer = IncrementalPdfWriter::with_options(staged, writer_options);
        let report = convert(&writer, &manifest, &options)?;
        let installed = writer.is_finalized();
        if installed {
            writer.into_inner()?.commit()?;
        }
        // an unfinalized writer drops its staging file here
        (report, installed)
    } else {
        let writer = IncrementalPdfWriter::with_options(Vec::new(), writer_options);
        let report = convert(&writer, &manifest, &options)?;
        let installed = writer.is_finalized();
        if installed {
            writer.write_to_file(output)?;
        }
        (report, installed)
    };

    if let Some(path) = report_path {
        ReportFile::new(&report, installed).save(path)?;
    }

    if !installed {
        bail!(
            "Only {} of {} pages converted ({:.0}% < {:.0}% required); {} not written",
            report.written.len(),
            report.page_count,
            report.completion() * 100.0,
            min_completion * 100.0,
            output.display()
        );
    }

    println!(
        "✓ Wrote {} of {} pages to {}",
        report.written.len(),
        report.page_count,
        output.display()
    );
    for failure in &report.failed {
        println!("  page {} skipped: {}", failure.index + 1, failure.error);
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Assemble {
            manifest,
            output,
            workers,
            min_completion,
            producer,
            stream,
            stamp_date,
            report,
        } => {
            if !(0.0..=1.0).contains(&min_completion) {
                bail!("--min-completion must be between 0 and 1, got {min_completion}");
            }
            let mut writer_options = WriterOptions::default();
            if let Some(producer) = producer {
                writer_options = writer_options.with_producer(producer);
            }
            if stamp_date {
                writer_options = writer_options.stamped_now();
            }
            assemble(
                &manifest,
                &output,
                workers,
                min_completion,
                writer_options,
                stream,
                report.as_deref(),
            )?;
        }

        Commands::Validate { input } => match inspect_file(&input) {
            Ok(summary) => {
                println!("PDF Information for: {}", input.display());
                println!("==========================================");
                println!("PDF Version: {}", summary.version);
                println!("Pages: {}", summary.page_count);
                println!("Objects: {} (xref size {})", summary.object_count(), summary.size);
                println!("Root: {}", summary.root);
                if let Some(info) = summary.info {
                    println!("Info: {info}");
                }
                if summary.has_outline {
                    println!("Has Outlines (Bookmarks): Yes");
                }
                println!("\n✓ PDF structure is valid");
            }
            Err(e) => {
                eprintln!("Error: {} is not a valid PDF: {}", input.display(), e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
