use crate::document::{Document, IndirectObject, ObjectBody, Trailer};
use crate::error::{PdfError, Result};
use crate::merge::Renumbering;
use crate::parser::reference_spans;

/// Produce a renumbered copy of `doc`.
///
/// Every object header and every `N G R` in a dictionary, array, or
/// stream dictionary moves to its new identifier in one pass per object.
/// String and stream content is left untouched.
pub fn rewrite_document(doc: &Document, map: &Renumbering) -> Result<Document> {
    let mut objects = Vec::with_capacity(doc.object_count());

    for object in doc.objects() {
        let id = map
            .get(object.id)
            .ok_or_else(|| PdfError::dangling(0, object.id))?;
        let body = rewrite_body(object.id, &object.body, map)?;
        objects.push(IndirectObject::new(id, 0, body)?);
    }

    let source = doc.trailer();
    let trailer = Trailer {
        root: source.root.map(|r| map_trailer_ref(r, map)).transpose()?,
        // A stale Info entry is dropped rather than failing the merge
        info: source.info.and_then(|i| map.get(i)),
        id: source.id.clone(),
    };

    Ok(Document::from_parts(
        doc.version().to_string(),
        objects,
        trailer,
        Vec::new(),
    ))
}

fn map_trailer_ref(old: u32, map: &Renumbering) -> Result<u32> {
    map.get(old).ok_or_else(|| PdfError::dangling(0, old))
}

pub fn rewrite_body(referrer: u32, body: &ObjectBody, map: &Renumbering) -> Result<ObjectBody> {
    Ok(match body {
        ObjectBody::Value(bytes) => ObjectBody::Value(rewrite_bytes(referrer, bytes, map)?),
        ObjectBody::Stream { dict, data } => ObjectBody::Stream {
            dict: rewrite_bytes(referrer, dict, map)?,
            data: data.clone(),
        },
    })
}

/// Splice new identifiers into raw object syntax
fn rewrite_bytes(referrer: u32, bytes: &[u8], map: &Renumbering) -> Result<Vec<u8>> {
    let spans = reference_spans(bytes).map_err(PdfError::into_malformed)?;

    let mut out = Vec::with_capacity(bytes.len());
    let mut copied = 0;
    for r in spans {
        let new = map
            .get(r.target.obj_num)
            .ok_or_else(|| PdfError::dangling(referrer, r.target.obj_num))?;
        out.extend_from_slice(&bytes[copied..r.span.start]);
        out.extend_from_slice(format!("{} 0 R", new).as_bytes());
        copied = r.span.end;
    }
    out.extend_from_slice(&bytes[copied..]);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> Renumbering {
        Renumbering::new(3, [1, 2]).unwrap()
    }

    fn rewrite(bytes: &[u8]) -> Result<Vec<u8>> {
        rewrite_bytes(1, bytes, &map())
    }

    #[test]
    fn test_rewrites_references_only() {
        let out = rewrite(b"<< /Kids [2 0 R] /Count 1 /MediaBox [0 0 1 2] >>").unwrap();
        assert_eq!(out, b"<< /Kids [5 0 R] /Count 1 /MediaBox [0 0 1 2] >>".to_vec());
    }

    #[test]
    fn test_string_content_untouched() {
        let out = rewrite(b"<< /T (1 0 R) /P 1 0 R >>").unwrap();
        assert_eq!(out, b"<< /T (1 0 R) /P 4 0 R >>".to_vec());
    }

    #[test]
    fn test_single_pass_no_double_renumbering() {
        // 1 -> 4 and 2 -> 5; a second pass would not change 4/5 but a
        // substring search could turn "12 0 R" into "15 0 R"
        let map = Renumbering::new(3, [1, 2, 12]).unwrap();
        let out = rewrite_bytes(1, b"[1 0 R 2 0 R 12 0 R]", &map).unwrap();
        assert_eq!(out, b"[4 0 R 5 0 R 6 0 R]".to_vec());
    }

    #[test]
    fn test_generation_normalized() {
        let out = rewrite(b"[2 3 R]").unwrap();
        assert_eq!(out, b"[5 0 R]".to_vec());
    }

    #[test]
    fn test_unknown_target_is_dangling() {
        let err = rewrite(b"<< /P 9 0 R >>").unwrap_err();
        assert!(matches!(
            err,
            PdfError::DanglingReference {
                referrer: 1,
                target: 9
            }
        ));
    }

    #[test]
    fn test_stream_data_untouched() {
        let body = ObjectBody::Stream {
            dict: b"<< /Length 5 /Res 2 0 R >>".to_vec(),
            data: b"1 0 R".to_vec(),
        };
        let out = rewrite_body(1, &body, &map()).unwrap();
        assert_eq!(
            out,
            ObjectBody::Stream {
                dict: b"<< /Length 5 /Res 5 0 R >>".to_vec(),
                data: b"1 0 R".to_vec(),
            }
        );
    }

    #[test]
    fn test_rewrite_document_maps_headers_and_trailer() {
        let objects = vec![
            IndirectObject::new(1, 0, ObjectBody::Value(b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()))
                .unwrap(),
            IndirectObject::new(2, 0, ObjectBody::Value(b"<< /Type /Pages /Kids [] /Count 0 >>".to_vec()))
                .unwrap(),
        ];
        let trailer = Trailer {
            root: Some(1),
            info: Some(8),
            id: None,
        };
        let doc = Document::from_parts("1.4".into(), objects, trailer, Vec::new());

        let out = rewrite_document(&doc, &map()).unwrap();
        let ids: Vec<u32> = out.objects().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![4, 5]);
        assert_eq!(out.trailer().root, Some(4));
        assert_eq!(out.trailer().info, None);
        assert_eq!(out.get(4).unwrap().refs.iter().copied().collect::<Vec<_>>(), vec![5]);
    }
}
