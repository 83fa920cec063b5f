//! PDF writing functionality
//!
//! [`IncrementalPdfWriter`] streams pages into the output as soon as they are
//! ready. The object numbering is fixed up front, so pages can be written in
//! any order and the cross-reference table is produced at the end.

mod allocator;
mod incremental;
mod info;
mod output;
mod serializer;

pub use allocator::{ObjectTable, PageObjects};
pub use incremental::{IncrementalPdfWriter, PageStatus};
pub use output::{persist_bytes, remove_partial, StagedFile};

use chrono::{DateTime, Utc};

/// Configuration for the writer
#[derive(Debug, Clone, PartialEq)]
pub struct WriterOptions {
    /// Value of `/Producer` in the information dictionary
    pub producer: String,
    /// Version written in the `%PDF-` header
    pub version: String,
    /// Optional `/ModDate`; left out by default so output is reproducible
    pub modification_date: Option<DateTime<Utc>>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            producer: format!("incremental-pdf {}", crate::VERSION),
            version: "1.7".to_string(),
            modification_date: None,
        }
    }
}

impl WriterOptions {
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_modification_date(mut self, date: DateTime<Utc>) -> Self {
        self.modification_date = Some(date);
        self
    }

    /// Stamp `/ModDate` with the current time
    pub fn stamped_now(self) -> Self {
        self.with_modification_date(Utc::now())
    }
}
