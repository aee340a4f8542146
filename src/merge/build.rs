use std::collections::HashSet;

use tracing::debug;

use crate::error::{PdfError, Result};
use crate::merge::Spliced;
use crate::types::{Dict, PdfObject};
use crate::xref::XrefTable;

/// Marks the file as binary for transfer tools
const BINARY_COMMENT: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

/// Serialize the merged object set with a freshly computed xref table.
///
/// Fails with `DanglingReference` before writing anything if any object,
/// or the trailer, names an identifier that is not being emitted.
pub fn build(spliced: &Spliced) -> Result<Vec<u8>> {
    check_closure(spliced)?;

    let capacity = spliced
        .objects
        .iter()
        .map(|o| o.body.head().len() + 64)
        .sum::<usize>();
    let mut out = Vec::with_capacity(capacity);

    out.extend_from_slice(format!("%PDF-{}\n", spliced.version).as_bytes());
    out.extend_from_slice(BINARY_COMMENT);

    let mut xref = XrefTable::new();
    for object in &spliced.objects {
        xref.insert(object.id, out.len(), object.generation);
        out.extend_from_slice(format!("{} {} obj\n", object.id, object.generation).as_bytes());
        object.body.write_to(&mut out);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = out.len();
    xref.write_to(&mut out);

    let trailer = trailer_dict(spliced, xref.size());
    out.extend_from_slice(b"trailer\n");
    trailer.write_to(&mut out);
    out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());

    debug!(
        objects = xref.len(),
        size = xref.size(),
        bytes = out.len(),
        "built cross-reference table"
    );

    Ok(out)
}

fn trailer_dict(spliced: &Spliced, size: u32) -> PdfObject {
    let mut trailer = Dict::new();
    trailer.insert("Size".into(), PdfObject::Int(size as i64));
    trailer.insert("Root".into(), PdfObject::reference(spliced.catalog));
    if let Some(info) = spliced.info {
        trailer.insert("Info".into(), PdfObject::reference(info));
    }
    if let Some(id) = &spliced.id {
        trailer.insert("ID".into(), id.clone());
    }
    PdfObject::Dict(trailer)
}

/// Every identifier must be defined exactly once and every reference
/// must land on a defined identifier.
fn check_closure(spliced: &Spliced) -> Result<()> {
    let mut defined = HashSet::with_capacity(spliced.objects.len());
    for object in &spliced.objects {
        if !defined.insert(object.id) {
            return Err(PdfError::malformed(
                0,
                format!("object {} defined twice in merged output", object.id),
            ));
        }
    }

    let trailer_refs = std::iter::once(spliced.catalog).chain(spliced.info);
    let object_refs = spliced
        .objects
        .iter()
        .flat_map(|o| o.refs.iter().map(move |&target| (o.id, target)));

    for (referrer, target) in trailer_refs.map(|t| (0, t)).chain(object_refs) {
        if !defined.contains(&target) {
            return Err(PdfError::dangling(referrer, target));
        }
    }

    Ok(())
}
