use std::fmt;

use thiserror::Error;
use tracing::error;

/// Which of the two merge inputs an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocLabel {
    /// The supplied call sheet, placed first
    A,
    /// The generated report, appended after A
    B,
}

impl fmt::Display for DocLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocLabel::A => write!(f, "document A"),
            DocLabel::B => write!(f, "document B"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Malformed document at byte {position}: {message}")]
    MalformedDocument { position: usize, message: String },

    #[error("Dangling reference: object {referrer} points at missing object {target}")]
    DanglingReference { referrer: u32, target: u32 },

    #[error("{document} is {len} bytes, over the {limit} byte limit")]
    InputTooLarge {
        document: DocLabel,
        len: usize,
        limit: usize,
    },

    #[error("Unsupported structure: {0}")]
    UnsupportedStructure(String),

    #[error("Parse error at byte {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Decompression failed: {0}")]
    DecompressError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PdfError {
    pub(crate) fn malformed(position: usize, message: impl Into<String>) -> Self {
        PdfError::MalformedDocument {
            position,
            message: message.into(),
        }
    }

    /// Every dangling reference is logged where it is detected
    pub(crate) fn dangling(referrer: u32, target: u32) -> Self {
        error!(referrer, target, "reference to an object the document does not define");
        PdfError::DanglingReference { referrer, target }
    }

    /// Lift lexer/parser failures into the scanner's error taxonomy
    pub(crate) fn into_malformed(self) -> Self {
        match self {
            PdfError::Parse { position, message } => {
                PdfError::MalformedDocument { position, message }
            }
            PdfError::DecompressError(message) => PdfError::MalformedDocument {
                position: 0,
                message,
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, PdfError>;
