use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid page count: {0}")]
    InvalidPageCount(usize),

    #[error("Writer has not been initialized")]
    NotInitialized,

    #[error("Writer is already initialized")]
    AlreadyInitialized,

    #[error("Document has already been finalized")]
    AlreadyFinalized,

    #[error("Document has not been finalized")]
    NotFinalized,

    #[error("Invalid page index: {index} (document has {count} pages)")]
    PageIndexOutOfRange { index: usize, count: usize },

    #[error("Page {page} references JBIG2 globals {index:?} which were never reserved")]
    MissingJbig2Globals { page: usize, index: Option<usize> },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Nothing to write: output buffer is empty")]
    EmptyOutput,

    #[error("Invalid PDF structure: {0}")]
    InvalidStructure(String),

    #[error("Writer lock poisoned by a panicking thread")]
    LockPoisoned,

    #[error("Output is unusable after an earlier write error")]
    OutputFailed,
}

pub type Result<T> = std::result::Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_pdf_error_display() {
        let error = PdfError::InvalidStructure("missing startxref".to_string());
        assert_eq!(error.to_string(), "Invalid PDF structure: missing startxref");
    }

    #[test]
    fn test_page_index_display() {
        let error = PdfError::PageIndexOutOfRange { index: 7, count: 3 };
        assert_eq!(
            error.to_string(),
            "Invalid page index: 7 (document has 3 pages)"
        );
    }

    #[test]
    fn test_missing_globals_debug() {
        let error = PdfError::MissingJbig2Globals {
            page: 4,
            index: Some(2),
        };
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("MissingJbig2Globals"));
        assert!(error.to_string().contains("Page 4"));
    }

    #[test]
    fn test_output_failed_display() {
        assert_eq!(
            PdfError::OutputFailed.to_string(),
            "Output is unusable after an earlier write error"
        );
    }

    #[test]
    fn test_pdf_error_from_io_error() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let pdf_error = PdfError::from(io_error);

        match pdf_error {
            PdfError::Io(ref err) => {
                assert_eq!(err.kind(), ErrorKind::NotFound);
            }
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_all_variants_display() {
        let errors = vec![
            PdfError::InvalidPageCount(0),
            PdfError::NotInitialized,
            PdfError::AlreadyInitialized,
            PdfError::AlreadyFinalized,
            PdfError::NotFinalized,
            PdfError::MissingJbig2Globals {
                page: 0,
                index: None,
            },
            PdfError::InvalidImage("bad marker".to_string()),
            PdfError::EmptyOutput,
            PdfError::LockPoisoned,
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }
}
