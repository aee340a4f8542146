//! Two-document merge: scan, renumber, rewrite, splice, build.

mod build;
mod renumber;
mod rewrite;
mod splice;

use std::fmt;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::document::Document;
use crate::error::{DocLabel, PdfError, Result};

pub use build::build;
pub use renumber::Renumbering;
pub use rewrite::{rewrite_body, rewrite_document};
pub use splice::{splice, Spliced};

/// 64 MiB per input
pub const DEFAULT_MAX_INPUT_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Inputs larger than this are rejected before scanning
    pub max_input_bytes: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

/// Pipeline position; only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Idle,
    Scanning(DocLabel),
    Renumbering,
    Rewriting,
    Splicing,
    Building,
    Done,
    /// Terminal; the error is handed back to the caller
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Idle => write!(f, "idle"),
            Stage::Scanning(doc) => write!(f, "scanning {}", doc),
            Stage::Renumbering => write!(f, "renumbering"),
            Stage::Rewriting => write!(f, "rewriting"),
            Stage::Splicing => write!(f, "splicing"),
            Stage::Building => write!(f, "building"),
            Stage::Done => write!(f, "done"),
            Stage::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub pages_a: usize,
    pub pages_b: usize,
    /// Objects in the output, the new page tree root included
    pub objects: usize,
    /// Identifiers given to B start right above this
    pub max_id_a: u32,
    /// B was empty and A was returned as-is
    pub passthrough: bool,
}

#[derive(Debug, Clone)]
pub struct MergeOutput {
    pub bytes: Vec<u8>,
    pub summary: MergeSummary,
}

/// Merges a call sheet (A) with a generated report (B).
///
/// Holds only configuration; concurrent calls share nothing.
#[derive(Debug, Clone, Default)]
pub struct Merger {
    options: MergeOptions,
}

impl Merger {
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Merge `a` followed by `b` into one document
    pub fn merge(&self, a: &[u8], b: &[u8]) -> Result<MergeOutput> {
        self.merge_staged(a, b).1
    }

    /// Merge and report the terminal stage: `Done` or `Failed`
    fn merge_staged(&self, a: &[u8], b: &[u8]) -> (Stage, Result<MergeOutput>) {
        let mut stage = Stage::Idle;
        let result = self.run(&mut stage, a, b);

        match &result {
            Ok(output) => info!(
                pages_a = output.summary.pages_a,
                pages_b = output.summary.pages_b,
                objects = output.summary.objects,
                bytes = output.bytes.len(),
                "merged documents"
            ),
            Err(e) => {
                warn!(stage = %stage, error = %e, "merge failed");
                advance(&mut stage, Stage::Failed);
            }
        }

        (stage, result)
    }

    fn run(&self, stage: &mut Stage, a: &[u8], b: &[u8]) -> Result<MergeOutput> {
        self.check_size(DocLabel::A, a)?;
        self.check_size(DocLabel::B, b)?;

        advance(stage, Stage::Scanning(DocLabel::A));
        let doc_a = Document::parse(a)?;

        if b.iter().all(|c| c.is_ascii_whitespace()) {
            return passthrough(stage, a, &doc_a);
        }

        advance(stage, Stage::Scanning(DocLabel::B));
        let doc_b = Document::parse_allow_empty(b)?;
        if doc_b.object_count() == 0 {
            return passthrough(stage, a, &doc_a);
        }

        advance(stage, Stage::Renumbering);
        let max_id_a = doc_a.max_id();
        let map = Renumbering::new(max_id_a, doc_b.objects().iter().map(|o| o.id))?;
        debug!(
            renumbered = map.len(),
            first = ?map.first_new(),
            last = ?map.last_new(),
            "renumbered document B"
        );

        advance(stage, Stage::Rewriting);
        let doc_b = rewrite_document(&doc_b, &map)?;

        advance(stage, Stage::Splicing);
        let spliced = splice(&doc_a, &doc_b)?;

        advance(stage, Stage::Building);
        let bytes = build(&spliced)?;

        advance(stage, Stage::Done);
        Ok(MergeOutput {
            bytes,
            summary: MergeSummary {
                pages_a: spliced.pages_a,
                pages_b: spliced.pages_b,
                objects: spliced.objects.len(),
                max_id_a,
                passthrough: false,
            },
        })
    }

    fn check_size(&self, document: DocLabel, data: &[u8]) -> Result<()> {
        let limit = self.options.max_input_bytes;
        if data.len() > limit {
            return Err(PdfError::InputTooLarge {
                document,
                len: data.len(),
                limit,
            });
        }
        Ok(())
    }
}

/// B has no objects: hand back A's bytes untouched
fn passthrough(stage: &mut Stage, a: &[u8], doc_a: &Document) -> Result<MergeOutput> {
    warn!("document B has no objects; returning document A unchanged");
    let summary = MergeSummary {
        pages_a: doc_a.page_count()?,
        pages_b: 0,
        objects: doc_a.object_count(),
        max_id_a: doc_a.max_id(),
        passthrough: true,
    };
    advance(stage, Stage::Done);

    Ok(MergeOutput {
        bytes: a.to_vec(),
        summary,
    })
}

fn advance(stage: &mut Stage, next: Stage) {
    debug_assert!(next > *stage, "merge stage moved from {} back to {}", stage, next);
    debug!(from = %stage, to = %next, "merge stage");
    *stage = next;
}

/// Merge with default options
pub fn merge(a: &[u8], b: &[u8]) -> Result<Vec<u8>> {
    Merger::default().merge(a, b).map(|output| output.bytes)
}

/// Read both inputs, merge them, and write the result to `output`
pub fn merge_files(
    a: &Path,
    b: &Path,
    output: &Path,
    options: MergeOptions,
) -> Result<MergeSummary> {
    let data_a = fs::read(a)?;
    let data_b = fs::read(b)?;

    let merged = Merger::new(options).merge(&data_a, &data_b)?;
    fs::write(output, &merged.bytes)?;

    Ok(merged.summary)
}
