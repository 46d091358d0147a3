//! Sequential record stores
//!
//! Records are read one at a time through a [`RecordCursor`]. A
//! [`RecordSource`] opens fresh cursors, which is how extractors rewind.
//!
//! Two sources ship with the crate: [`RecordFile`], an append-only file of
//! checksummed frames, and [`MemorySource`], a shared in-memory list.

mod frame;
mod memory;
mod reader;
mod writer;

pub use frame::*;
pub use memory::*;
pub use reader::*;
pub use writer::*;

use crate::error::LoaderError;
use crate::types::ExposureResult;

/// How far a cursor has advanced through its store.
///
/// Units are source-specific (bytes for files, records in memory); only the
/// comparison between the two values is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub consumed: u64,
    pub total: u64,
}

impl Position {
    /// True once every record has been read
    pub fn is_exhausted(&self) -> bool {
        self.consumed == self.total
    }

    /// Fraction of the store consumed, in [0, 1]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.consumed as f64 / self.total as f64
        }
    }
}

/// Forward-only reader over a closed, fully written store
pub trait RecordCursor {
    /// Next record, or `None` at the end of the store
    fn read_next(&mut self) -> Result<Option<ExposureResult>, LoaderError>;

    fn position(&self) -> Position;
}

/// Something that can open cursors positioned at its first record
pub trait RecordSource {
    type Cursor: RecordCursor;

    fn open(&self) -> Result<Self::Cursor, LoaderError>;

    /// Human-readable name for logs
    fn describe(&self) -> String;
}
