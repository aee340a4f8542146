pub mod decode;
pub mod document;
pub mod error;
pub mod merge;
pub mod parser;
mod scan;
pub mod sheet;
pub mod types;
pub mod xref;

#[cfg(feature = "wasm")]
mod wasm;

pub use decode::decode_stream;
pub use document::{Document, IndirectObject, ObjectBody, PageLeaf, Trailer};
pub use error::{DocLabel, PdfError, Result};
pub use merge::{merge, merge_files, MergeOptions, MergeOutput, MergeSummary, Merger, Stage};
pub use types::{Dict, ObjRef, PdfObject};
pub use xref::XrefTable;
