//! Parallel page rendering into an [`IncrementalPdfWriter`]
//!
//! Decoding a DjVu page is the expensive part of a conversion. Workers pull
//! page indices from a shared counter, render them through a [`PageSource`]
//! and hand the result to the writer, which serializes the output.

mod tracker;

pub use tracker::{ConversionTracker, JobKey, JobRecord, JobState};

use crate::error::{PdfError, Result};
use crate::page::PageInfo;
use crate::writer::{IncrementalPdfWriter, PageStatus};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Produces the layers of each page
pub trait PageSource: Sync {
    fn page_count(&self) -> usize;

    /// Render page `index`. Called from several threads at once.
    fn render(&self, index: usize) -> Result<PageInfo>;
}

/// Options for [`render_pages`]
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Number of worker threads
    pub num_workers: usize,
    /// Fraction of pages that must be written for the result to be kept
    pub min_completion: f64,
    /// Set to stop handing out new pages
    pub cancelled: Arc<AtomicBool>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get().min(8),
            min_completion: 1.0,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl PipelineOptions {
    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers.max(1);
        self
    }

    pub fn with_min_completion(mut self, ratio: f64) -> Self {
        self.min_completion = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A page that could not be rendered or written
#[derive(Debug)]
pub struct PageFailure {
    pub index: usize,
    pub error: PdfError,
}

/// Outcome of a [`render_pages`] run
#[derive(Debug, Default)]
pub struct ConversionReport {
    pub page_count: usize,
    /// Pages present in the output, ascending
    pub written: Vec<usize>,
    pub failed: Vec<PageFailure>,
    /// Pages never attempted because the run was cancelled or the output failed
    pub skipped: Vec<usize>,
    pub duration: Duration,
}

impl ConversionReport {
    /// Fraction of pages written
    pub fn completion(&self) -> f64 {
        if self.page_count == 0 {
            return 0.0;
        }
        self.written.len() as f64 / self.page_count as f64
    }

    pub fn meets(&self, threshold: f64) -> bool {
        self.completion() >= threshold
    }

    pub fn is_complete(&self) -> bool {
        self.page_count > 0 && self.written.len() == self.page_count
    }
}

/// Render and write every page of `source`.
///
/// The writer must already be initialized. Per-page failures are collected
/// in the report rather than aborting the run; finalizing is left to the
/// caller so it can decide based on [`ConversionReport::meets`].
pub fn render_pages<W, S>(
    writer: &IncrementalPdfWriter<W>,
    source: &S,
    options: &PipelineOptions,
) -> ConversionReport
where
    W: Write + Send,
    S: PageSource + ?Sized,
{
    let start = Instant::now();
    let page_count = source.page_count();
    let next = AtomicUsize::new(0);
    let written = Mutex::new(Vec::with_capacity(page_count));
    let failed = Mutex::new(Vec::new());
    let num_workers = options.num_workers.clamp(1, page_count.max(1));

    info!(pages = page_count, workers = num_workers, "rendering pages");

    thread::scope(|scope| {
        for worker in 0..num_workers {
            let next = &next;
            let written = &written;
            let failed = &failed;
            scope.spawn(move || loop {
                if options.is_cancelled() || writer.has_failed() {
                    break;
                }
                let index = next.fetch_add(1, Ordering::SeqCst);
                if index >= page_count {
                    break;
                }

                let outcome = source
                    .render(index)
                    .and_then(|page| writer.write_page(index, &page));
                match outcome {
                    Ok(status) => {
                        if status == PageStatus::AlreadyWritten {
                            debug!(worker, page = index, "page was already written");
                        }
                        if let Ok(mut pages) = written.lock() {
                            pages.push(index);
                        }
                    }
                    Err(error) => {
                        warn!(worker, page = index, %error, "page skipped");
                        if let Ok(mut failures) = failed.lock() {
                            failures.push(PageFailure { index, error });
                        }
                    }
                }
            });
        }
    });

    let mut written = written.into_inner().unwrap_or_default();
    written.sort_unstable();
    let mut failed = failed.into_inner().unwrap_or_default();
    failed.sort_by_key(|f| f.index);

    let handed_out = next.load(Ordering::SeqCst).min(page_count);
    let skipped: Vec<usize> = (handed_out..page_count).collect();

    let report = ConversionReport {
        page_count,
        written,
        failed,
        skipped,
        duration: start.elapsed(),
    };
    info!(
        written = report.written.len(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        elapsed_ms = report.duration.as_millis() as u64,
        "rendering finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentLayout;
    use crate::graphics::{PageImage, Placement};

    struct Solid {
        pages: usize,
        broken: Option<usize>,
    }

    impl PageSource for Solid {
        fn page_count(&self) -> usize {
            self.pages
        }

        fn render(&self, index: usize) -> Result<PageInfo> {
            if Some(index) == self.broken {
                return Err(PdfError::InvalidImage(format!("page {index} is corrupt")));
            }
            let image = PageImage::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9], 8, 8, true)
                .placed(Placement::full_page(50.0, 50.0));
            Ok(PageInfo::new(50.0, 50.0).with_image(image))
        }
    }

    fn writer(pages: usize) -> IncrementalPdfWriter {
        let writer = IncrementalPdfWriter::new();
        writer.init(&DocumentLayout::new(pages)).unwrap();
        writer
    }

    #[test]
    fn test_default_options() {
        let options = PipelineOptions::default();
        assert!(options.num_workers >= 1 && options.num_workers <= 8);
        assert_eq!(options.min_completion, 1.0);
        assert!(!options.is_cancelled());
    }

    #[test]
    fn test_min_completion_is_clamped() {
        assert_eq!(PipelineOptions::default().with_min_completion(1.5).min_completion, 1.0);
        assert_eq!(PipelineOptions::default().with_min_completion(-1.0).min_completion, 0.0);
        assert_eq!(PipelineOptions::default().with_workers(0).num_workers, 1);
    }

    #[test]
    fn test_renders_every_page() {
        let writer = writer(12);
        let source = Solid { pages: 12, broken: None };
        let report = render_pages(&writer, &source, &PipelineOptions::default().with_workers(4));

        assert!(report.is_complete());
        assert_eq!(report.written, (0..12).collect::<Vec<_>>());
        assert!(writer.all_pages_written());
    }

    #[test]
    fn test_failed_page_is_reported() {
        let writer = writer(5);
        let source = Solid { pages: 5, broken: Some(3) };
        let report = render_pages(&writer, &source, &PipelineOptions::default().with_workers(2));

        assert_eq!(report.written, vec![0, 1, 2, 4]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 3);
        assert!((report.completion() - 0.8).abs() < 1e-9);
        assert!(report.meets(0.8));
        assert!(!report.meets(0.9));
    }

    #[test]
    fn test_cancelled_run_skips_everything() {
        let writer = writer(4);
        let source = Solid { pages: 4, broken: None };
        let options = PipelineOptions::default();
        options.cancel();
        let report = render_pages(&writer, &source, &options);

        assert!(report.written.is_empty());
        assert_eq!(report.skipped, vec![0, 1, 2, 3]);
        assert_eq!(report.completion(), 0.0);
    }

    /// Rejects everything after the file header
    struct FullDisk(usize);

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.0 + buf.len() > 15 {
                return Err(std::io::Error::other("no space left on device"));
            }
            self.0 += buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_output_failure_stops_the_run() {
        let writer = IncrementalPdfWriter::with_sink(FullDisk(0));
        writer.init(&DocumentLayout::new(4)).unwrap();
        let source = Solid { pages: 4, broken: None };
        let report = render_pages(&writer, &source, &PipelineOptions::default().with_workers(1));

        assert!(report.written.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].error, PdfError::Io(_)));
        assert_eq!(report.skipped, vec![1, 2, 3]);
        assert!(matches!(writer.finalize(&[]), Err(PdfError::OutputFailed)));
    }

    #[test]
    fn test_uninitialized_writer_fails_every_page() {
        let writer = IncrementalPdfWriter::new();
        let source = Solid { pages: 2, broken: None };
        let report = render_pages(&writer, &source, &PipelineOptions::default());
        assert_eq!(report.failed.len(), 2);
        assert!(report
            .failed
            .iter()
            .all(|f| matches!(f.error, PdfError::NotInitialized)));
    }
}
