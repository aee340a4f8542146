mod object;
mod write;

pub use object::{Dict, ObjRef, PdfObject};
