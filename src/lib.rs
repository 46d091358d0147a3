//! Exposure Loader - Labeled training batches from simulated exposure records
//!
//! The loader reads an append-only store of exposure results (one per tested
//! individual) and shapes them into numeric batches for transmission-risk
//! models: window selection → exposure admission → feature derivation →
//! label encoding.
//!
//! ## Modules
//!
//! - **Extractor**: Stateful batch extraction over a record store
//! - **Store**: Framed record files and in-memory sources

pub mod config;
pub mod error;
pub mod extractor;
pub mod features;
pub mod store;
pub mod summary;
pub mod types;
pub mod window;

pub use config::ExtractorConfig;
pub use error::{InvalidRecordError, InvalidRecordKind, LoaderError, RecordLocation};
pub use extractor::{Batches, ExposureBatchExtractor, RecordRejection, SkipReason};
pub use store::{MemorySource, Position, RecordCursor, RecordFile, RecordSource, RecordWriter};
pub use summary::StoreSummary;
pub use types::{Batch, Exposure, ExposureFeature, ExposureResult, ExposureType, TestOutcome};

/// Loader version
pub const LOADER_VERSION: &str = env!("CARGO_PKG_VERSION");
