//! Object scanner: finds `N G obj ... endobj` boundaries in a PDF byte
//! stream without trusting its cross-reference data.

use std::collections::HashMap;
use std::ops::Range;

use tracing::{debug, warn};

use crate::decode::decode_stream;
use crate::document::{Document, IndirectObject, ObjectBody, Trailer};
use crate::error::{PdfError, Result};
use crate::parser::{Parser, Token};
use crate::types::{Dict, PdfObject};

/// Readers accept the header anywhere in the first KiB
const HEADER_WINDOW: usize = 1024;

pub(crate) fn scan(data: &[u8]) -> Result<Document> {
    scan_with(data, false)
}

/// Like `scan`, but a clean header with no objects behind it is an empty
/// document rather than an error
pub(crate) fn scan_allow_empty(data: &[u8]) -> Result<Document> {
    scan_with(data, true)
}

fn scan_with(data: &[u8], allow_empty: bool) -> Result<Document> {
    let (header_pos, version) = find_header(data)?;

    let mut scanner = Scanner {
        data,
        parser: Parser::new(data),
        objects: Vec::new(),
        index: HashMap::new(),
        containers: Vec::new(),
        trailers: Vec::new(),
        discarded: Vec::new(),
        resyncs: 0,
    };

    // The header line is a comment, skipped like any other
    scanner.parser.seek(header_pos);
    scanner.run()?;
    scanner.finish(version, allow_empty)
}

/// Locate `%PDF-x.y` and return its offset and version
fn find_header(data: &[u8]) -> Result<(usize, String)> {
    let window = &data[..data.len().min(HEADER_WINDOW)];
    let pos = find(window, b"%PDF-")
        .ok_or_else(|| PdfError::malformed(0, "missing %PDF header"))?;

    let version: String = data[pos + 5..]
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b'.')
        .map(|&b| char::from(b))
        .collect();

    if version.is_empty() {
        return Err(PdfError::malformed(pos, "missing version in %PDF header"));
    }

    Ok((pos, version))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

struct Scanner<'a> {
    data: &'a [u8],
    parser: Parser<'a>,
    objects: Vec<IndirectObject>,
    /// Object number -> position in `objects`
    index: HashMap<u32, usize>,
    /// Object streams awaiting expansion, in file order
    containers: Vec<(u32, PdfObject)>,
    trailers: Vec<Dict>,
    discarded: Vec<Range<usize>>,
    resyncs: usize,
}

impl<'a> Scanner<'a> {
    fn run(&mut self) -> Result<()> {
        loop {
            // Empty literal: just skip whitespace and comments
            self.parser.at(b"");
            let pos = self.parser.position();
            if pos >= self.data.len() {
                return Ok(());
            }

            if self.parser.at(b"xref") {
                let offset = find(&self.data[pos..], b"trailer")
                    .ok_or_else(|| PdfError::malformed(pos, "xref section has no trailer"))?;
                self.read_trailer(pos, pos + offset)?;
            } else if self.parser.at(b"trailer") {
                self.read_trailer(pos, pos)?;
            } else if self.parser.at(b"startxref") {
                self.read_startxref(pos);
            } else if self.data[pos].is_ascii_digit() {
                match self.object_header(pos) {
                    Some((id, generation)) => self.read_object(pos, id, generation)?,
                    None => self.resync(pos),
                }
            } else {
                self.resync(pos);
            }
        }
    }

    /// Match `N G obj` at `pos`
    fn object_header(&mut self, pos: usize) -> Option<(u32, u16)> {
        self.parser.seek(pos);

        let Ok(Some(Token::Int(id))) = self.parser.next_token() else {
            return None;
        };
        let Ok(Some(Token::Int(generation))) = self.parser.next_token() else {
            return None;
        };
        let Ok(Some(Token::Obj)) = self.parser.next_token() else {
            return None;
        };

        Some((u32::try_from(id).ok()?, u16::try_from(generation).ok()?))
    }

    fn read_object(&mut self, pos: usize, id: u32, generation: u16) -> Result<()> {
        self.parser.at(b"");
        let body_start = self.parser.position();

        let value = self
            .parser
            .parse_object()
            .map_err(PdfError::into_malformed)?
            .ok_or_else(|| {
                PdfError::malformed(pos, format!("object {} {} obj is unterminated", id, generation))
            })?;

        // endobj is the last token lexed whether or not it was buffered
        match self.parser.next_token() {
            Ok(Some(Token::EndObj)) => {}
            _ => {
                return Err(PdfError::malformed(
                    pos,
                    format!("object {} {} obj is not closed by endobj", id, generation),
                ));
            }
        }
        let end = self.parser.position() - b"endobj".len();

        match value.type_name() {
            Some("XRef") => {
                // A cross-reference stream doubles as a trailer
                if let Some(dict) = value.as_dict() {
                    self.trailers.push(dict.clone());
                }
                self.discarded.push(pos..self.parser.position());
                return Ok(());
            }
            Some("ObjStm") if value.as_stream().is_some() => {
                self.containers.push((id, value));
                return Ok(());
            }
            _ => {}
        }

        let body = match &value {
            PdfObject::Stream { dict, data } => {
                let dict_end = self.parser.stream_dict_end().unwrap_or(end);
                match dict.get("Length") {
                    // Repair a direct Length that disagrees with the data found
                    Some(PdfObject::Int(n)) if usize::try_from(*n).ok() != Some(data.len()) => {
                        ObjectBody::from(&value)
                    }
                    _ => ObjectBody::Stream {
                        dict: self.data[body_start..dict_end].to_vec(),
                        data: data.clone(),
                    },
                }
            }
            _ => ObjectBody::Value(self.data[body_start..end].trim_ascii_end().to_vec()),
        };

        self.insert(IndirectObject::new(id, generation, body)?);
        Ok(())
    }

    /// Later definitions replace earlier ones in place
    fn insert(&mut self, object: IndirectObject) {
        match self.index.get(&object.id) {
            Some(&i) => {
                debug!(id = object.id, "object redefined by a later revision");
                self.objects[i] = object;
            }
            None => {
                self.index.insert(object.id, self.objects.len());
                self.objects.push(object);
            }
        }
    }

    fn read_trailer(&mut self, section_start: usize, trailer_pos: usize) -> Result<()> {
        self.parser.seek(trailer_pos + b"trailer".len());

        match self.parser.parse_object().map_err(PdfError::into_malformed)? {
            Some(PdfObject::Dict(dict)) => self.trailers.push(dict),
            _ => {
                return Err(PdfError::malformed(
                    trailer_pos,
                    "trailer must be a dictionary",
                ));
            }
        }

        self.discarded.push(section_start..self.parser.position());
        Ok(())
    }

    fn read_startxref(&mut self, pos: usize) {
        let after_keyword = pos + b"startxref".len();
        self.parser.seek(after_keyword);

        if !matches!(self.parser.next_token(), Ok(Some(Token::Int(_)))) {
            self.parser.seek(after_keyword);
        }
        self.discarded.push(pos..self.parser.position());
    }

    /// Skip to the next line after unrecognized bytes
    fn resync(&mut self, pos: usize) {
        self.resyncs += 1;
        let next = self.data[pos..]
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')
            .map(|p| pos + p + 1)
            .unwrap_or(self.data.len());
        debug!(from = pos, to = next, "resynchronizing scanner");
        self.parser.seek(next);
    }

    fn finish(mut self, version: String, allow_empty: bool) -> Result<Document> {
        for (container, value) in std::mem::take(&mut self.containers) {
            for object in expand_object_stream(container, &value)? {
                // Directly defined objects win over compressed copies
                if !self.index.contains_key(&object.id) {
                    self.insert(object);
                }
            }
        }

        // Junk lines with no objects around them are not a PDF body
        if self.objects.is_empty() && !(allow_empty && self.resyncs == 0) {
            return Err(PdfError::malformed(0, "no indirect objects found"));
        }

        let mut trailer = Trailer::default();
        for dict in &self.trailers {
            if dict.contains_key("Encrypt") {
                return Err(PdfError::UnsupportedStructure(
                    "encrypted documents are not supported".into(),
                ));
            }
            trailer.absorb(dict);
        }

        if self.resyncs > 0 {
            warn!(
                skipped = self.resyncs,
                "skipped unrecognized lines between objects"
            );
        }

        debug!(
            version = %version,
            objects = self.objects.len(),
            trailers = self.trailers.len(),
            "scanned document"
        );

        Ok(Document::from_parts(
            version,
            self.objects,
            trailer,
            self.discarded,
        ))
    }
}

/// Unpack a `/Type /ObjStm` container into ordinary objects
fn expand_object_stream(container: u32, value: &PdfObject) -> Result<Vec<IndirectObject>> {
    let malformed =
        |message: &str| PdfError::malformed(0, format!("object stream {}: {}", container, message));

    let Some((dict, data)) = value.as_stream() else {
        return Err(malformed("not a stream"));
    };

    let count = dict
        .get("N")
        .and_then(|n| n.as_int())
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| malformed("missing /N"))?;
    let first = dict
        .get("First")
        .and_then(|n| n.as_int())
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| malformed("missing /First"))?;

    let decoded = decode_stream(dict, data).map_err(PdfError::into_malformed)?;
    let header = decoded
        .get(..first)
        .ok_or_else(|| malformed("/First lies past the data"))?;

    // Header: `id offset` pairs, offsets relative to /First
    let mut parser = Parser::new(header);
    let mut entries = Vec::new();
    for _ in 0..count {
        let (Ok(Some(Token::Int(id))), Ok(Some(Token::Int(offset)))) =
            (parser.next_token(), parser.next_token())
        else {
            return Err(malformed("truncated header"));
        };
        let (Ok(id), Ok(offset)) = (u32::try_from(id), usize::try_from(offset)) else {
            return Err(malformed("negative header entry"));
        };
        entries.push((id, offset));
    }

    let mut offsets: Vec<usize> = entries.iter().map(|&(_, off)| off).collect();
    offsets.sort_unstable();

    let mut objects = Vec::with_capacity(entries.len());
    for (id, offset) in entries {
        let start = first + offset;
        let end = offsets
            .iter()
            .find(|&&o| o > offset)
            .map(|&o| first + o)
            .unwrap_or(decoded.len());

        let bytes = decoded
            .get(start..end)
            .ok_or_else(|| malformed("entry lies past the data"))?
            .trim_ascii();
        objects.push(IndirectObject::new(id, 0, ObjectBody::Value(bytes.to_vec()))?);
    }

    debug!(container, objects = objects.len(), "expanded object stream");
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &[u8] = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n\
3 0 obj\n<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>\nendobj\n\
4 0 obj\n<< /Length 8 >>\nstream\nBT (endobj) ET\nendstream\nendobj\n\
xref\n0 5\n0000000000 65535 f \n\
trailer\n<< /Size 5 /Root 1 0 R >>\nstartxref\n300\n%%EOF\n";

    #[test]
    fn test_scan_simple_document() {
        let doc = scan(SIMPLE).unwrap();

        let ids: Vec<u32> = doc.objects().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(doc.version(), "1.4");
        assert_eq!(doc.trailer().root, Some(1));
        assert_eq!(doc.discarded_spans().len(), 2);
        assert_eq!(doc.page_ids().unwrap(), vec![3]);
    }

    #[test]
    fn test_value_body_is_raw_bytes() {
        let doc = scan(SIMPLE).unwrap();
        assert_eq!(
            doc.get(2).unwrap().body,
            ObjectBody::Value(b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec())
        );
    }

    #[test]
    fn test_stream_length_repaired() {
        // Length 8 is wrong for "BT (endobj) ET"
        let doc = scan(SIMPLE).unwrap();
        let ObjectBody::Stream { dict, data } = &doc.get(4).unwrap().body else {
            panic!("Expected stream body");
        };
        assert_eq!(data, b"BT (endobj) ET");
        assert_eq!(dict, b"<</Length 14 >>");
    }

    #[test]
    fn test_missing_header() {
        let err = scan(b"1 0 obj\nnull\nendobj\n").unwrap_err();
        assert!(matches!(err, PdfError::MalformedDocument { .. }));
    }

    #[test]
    fn test_no_objects() {
        let err = scan(b"%PDF-1.7\n%%EOF\n").unwrap_err();
        assert!(matches!(err, PdfError::MalformedDocument { .. }));
    }

    #[test]
    fn test_header_only_allowed_when_asked() {
        let doc = scan_allow_empty(b"%PDF-1.4\n%%EOF\n").unwrap();
        assert_eq!(doc.object_count(), 0);
        assert_eq!(doc.version(), "1.4");

        let err = scan_allow_empty(b"%PDF-1.4\n@@ garbage\n").unwrap_err();
        assert!(matches!(err, PdfError::MalformedDocument { .. }));

        let err = scan_allow_empty(b"no header here").unwrap_err();
        assert!(matches!(err, PdfError::MalformedDocument { .. }));
    }

    #[test]
    fn test_unterminated_object() {
        let err = scan(b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog ").unwrap_err();
        assert!(matches!(err, PdfError::MalformedDocument { .. }));

        let err = scan(b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog >>\n").unwrap_err();
        assert!(matches!(err, PdfError::MalformedDocument { .. }));
    }

    #[test]
    fn test_incremental_update_last_definition_wins() {
        let data = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n\
trailer\n<< /Root 1 0 R >>\n%%EOF\n\
2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n\
3 0 obj\n<< /Type /Page /Parent 2 0 R >>\nendobj\n\
trailer\n<< /Root 1 0 R /Prev 9 >>\n%%EOF\n";

        let doc = scan(data).unwrap();
        let ids: Vec<u32> = doc.objects().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(doc.page_ids().unwrap(), vec![3]);
    }

    #[test]
    fn test_junk_between_objects_is_skipped() {
        let data = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
@@ garbage line\n\
2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n";

        let doc = scan(data).unwrap();
        assert_eq!(doc.object_count(), 2);
    }

    #[test]
    fn test_xref_stream_is_discarded() {
        let data = b"%PDF-1.5\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n\
3 0 obj\n<< /Type /XRef /Size 4 /W [1 2 1] /Root 1 0 R /Length 0 >>\nstream\n\nendstream\nendobj\n\
startxref\n90\n%%EOF\n";

        let doc = scan(data).unwrap();
        assert_eq!(doc.object_count(), 2);
        assert!(doc.get(3).is_none());
        assert_eq!(doc.trailer().root, Some(1));
    }

    #[test]
    fn test_object_stream_expanded() {
        let pages = "<< /Type /Pages /Kids [3 0 R] /Count 1 >>";
        let page = "<< /Type /Page /Parent 2 0 R >>";
        let header = format!("2 0 3 {} ", pages.len());
        let payload = format!("{}{}{}", header, pages, page).into_bytes();

        let mut data = b"%PDF-1.5\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n".to_vec();
        data.extend_from_slice(
            format!(
                "5 0 obj\n<< /Type /ObjStm /N 2 /First {} /Length {} >>\nstream\n",
                header.len(),
                payload.len()
            )
            .as_bytes(),
        );
        data.extend_from_slice(&payload);
        data.extend_from_slice(b"\nendstream\nendobj\ntrailer\n<< /Root 1 0 R >>\n");

        let doc = scan(&data).unwrap();
        let ids: Vec<u32> = doc.objects().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(doc.page_ids().unwrap(), vec![3]);
    }

    #[test]
    fn test_unsupported_object_stream_filter() {
        let data = b"%PDF-1.5\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
5 0 obj\n<< /Type /ObjStm /N 1 /First 4 /Filter /LZWDecode /Length 3 >>\nstream\nabc\nendstream\nendobj\n";

        let err = scan(data).unwrap_err();
        assert!(matches!(err, PdfError::UnsupportedStructure(_)));
    }

    #[test]
    fn test_encrypted_rejected() {
        let data = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
trailer\n<< /Root 1 0 R /Encrypt 9 0 R >>\n";

        let err = scan(data).unwrap_err();
        assert!(matches!(err, PdfError::UnsupportedStructure(_)));
    }
}
