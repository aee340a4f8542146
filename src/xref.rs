use std::collections::BTreeMap;

use crate::error::{PdfError, Result};
use crate::parser::Parser;
use crate::types::{Dict, PdfObject};

/// Entry in the cross-reference table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XRefEntry {
    pub offset: usize,
    pub generation: u16,
    pub in_use: bool,
}

/// Classic cross-reference table: object number -> in-use entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XrefTable {
    entries: BTreeMap<u32, XRefEntry>,
}

impl XrefTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u32, offset: usize, generation: u16) {
        self.entries.insert(
            id,
            XRefEntry {
                offset,
                generation,
                in_use: true,
            },
        );
    }

    pub fn get(&self, id: u32) -> Option<&XRefEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of in-use entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &XRefEntry)> + '_ {
        self.entries.iter().map(|(&id, entry)| (id, entry))
    }

    /// Trailer `/Size`: one past the highest object number
    pub fn size(&self) -> u32 {
        self.entries.keys().next_back().map_or(1, |&id| id + 1)
    }

    /// Emit `xref` with a single `0 Size` subsection.
    ///
    /// Unused numbers, 0 included, form the free list: each free entry
    /// names the next free number and the last one points back to 0.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        let size = self.size();
        let free: Vec<u32> = (1..size).filter(|id| !self.contains(*id)).collect();

        out.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
        out.extend_from_slice(free_line(free.first().copied().unwrap_or(0)).as_bytes());

        let mut next_free = free.iter().skip(1);
        for id in 1..size {
            match self.entries.get(&id) {
                Some(entry) => out.extend_from_slice(
                    format!("{:010} {:05} n\r\n", entry.offset, entry.generation).as_bytes(),
                ),
                None => out.extend_from_slice(
                    free_line(next_free.next().copied().unwrap_or(0)).as_bytes(),
                ),
            }
        }
    }

    /// Read the classic table that `startxref` points at, plus its trailer
    pub fn parse(data: &[u8]) -> Result<(Self, Dict)> {
        let offset = startxref_offset(data, find_startxref(data)?)?;

        if !data.get(offset..).is_some_and(|rest| rest.starts_with(b"xref")) {
            return Err(PdfError::UnsupportedStructure(
                "startxref does not point at a classic xref table".into(),
            ));
        }

        let mut table = XrefTable::new();
        let mut lines = Lines {
            data,
            pos: offset + b"xref".len(),
        };
        let trailer_pos = table.read_subsections(&mut lines)?;
        let trailer = read_trailer(data, trailer_pos)?;

        Ok((table, trailer))
    }

    /// Consume `first count` headers and their entries up to `trailer`
    fn read_subsections(&mut self, lines: &mut Lines<'_>) -> Result<usize> {
        loop {
            let Some((pos, line)) = lines.next() else {
                return Err(PdfError::malformed(lines.pos, "xref table has no trailer"));
            };
            if line.starts_with(b"trailer") {
                return Ok(pos);
            }

            let (first, count) = subsection_header(line).ok_or_else(|| invalid_xref(pos))?;
            for id in first..first.saturating_add(count) {
                let (pos, line) = lines.next().ok_or_else(|| invalid_xref(lines.pos))?;
                if let Some(entry) = entry_line(line).ok_or_else(|| invalid_xref(pos))? {
                    self.entries.insert(id, entry);
                }
            }
        }
    }
}

fn free_line(next: u32) -> String {
    format!("{:010} 65535 f\r\n", next)
}

fn invalid_xref(pos: usize) -> PdfError {
    PdfError::malformed(pos, "invalid xref table")
}

/// Non-blank lines with their start offsets, trailing whitespace trimmed
struct Lines<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Lines<'a> {
    type Item = (usize, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let data = self.data;
        let start = self.pos + data.get(self.pos..)?.iter().position(|b| !b.is_ascii_whitespace())?;
        let end = data[start..]
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')
            .map_or(data.len(), |p| start + p);

        self.pos = end;
        Some((start, data[start..end].trim_ascii_end()))
    }
}

fn fields(line: &[u8]) -> Option<std::str::SplitAsciiWhitespace<'_>> {
    std::str::from_utf8(line).ok().map(str::split_ascii_whitespace)
}

fn subsection_header(line: &[u8]) -> Option<(u32, u32)> {
    let mut fields = fields(line)?;
    let first = fields.next()?.parse().ok()?;
    let count = fields.next()?.parse().ok()?;
    fields.next().is_none().then_some((first, count))
}

/// `Some(None)` for a free entry, `None` when the line is not an entry
fn entry_line(line: &[u8]) -> Option<Option<XRefEntry>> {
    let mut fields = fields(line)?;
    let offset = fields.next()?.parse().ok()?;
    let generation = fields.next()?.parse().ok()?;

    match fields.next()? {
        "n" => Some(Some(XRefEntry {
            offset,
            generation,
            in_use: true,
        })),
        "f" => Some(None),
        _ => None,
    }
}

/// Last `startxref` in the final KiB
fn find_startxref(data: &[u8]) -> Result<usize> {
    const KEYWORD: &[u8] = b"startxref";
    let tail = data.len().saturating_sub(1024);

    data[tail..]
        .windows(KEYWORD.len())
        .rposition(|w| w == KEYWORD)
        .map(|p| tail + p)
        .ok_or_else(|| PdfError::malformed(data.len(), "missing startxref"))
}

fn startxref_offset(data: &[u8], pos: usize) -> Result<usize> {
    let mut parser = Parser::new(data);
    parser.seek(pos + b"startxref".len());

    match parser.parse_object() {
        Ok(Some(PdfObject::Int(offset))) => usize::try_from(offset)
            .map_err(|_| PdfError::malformed(pos, "negative startxref offset")),
        _ => Err(PdfError::malformed(pos, "startxref is not followed by an offset")),
    }
}

fn read_trailer(data: &[u8], pos: usize) -> Result<Dict> {
    let mut parser = Parser::new(data);
    parser.seek(pos + b"trailer".len());

    match parser.parse_object().map_err(PdfError::into_malformed)? {
        Some(PdfObject::Dict(dict)) => Ok(dict),
        _ => Err(PdfError::malformed(pos, "trailer is not a dictionary")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_startxref() {
        let data = b"%PDF-1.4\n%%EOF\nstartxref\n1234\n%%EOF";
        let pos = find_startxref(data).unwrap();
        assert!(data[pos..].starts_with(b"startxref"));
    }

    #[test]
    fn test_write_free_list() {
        let mut table = XrefTable::new();
        table.insert(1, 15, 0);
        table.insert(4, 99, 0);

        let mut out = Vec::new();
        table.write_to(&mut out);

        let expected = "xref\n0 5\n\
0000000002 65535 f\r\n\
0000000015 00000 n\r\n\
0000000003 65535 f\r\n\
0000000000 65535 f\r\n\
0000000099 00000 n\r\n";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn test_entries_are_twenty_bytes() {
        let mut table = XrefTable::new();
        table.insert(1, 1234567, 2);

        let mut out = Vec::new();
        table.write_to(&mut out);
        let body = &out[b"xref\n0 2\n".len()..];
        assert_eq!(body.len(), 40);
    }

    #[test]
    fn test_written_table_parses_back() {
        let mut table = XrefTable::new();
        table.insert(1, 9, 0);
        table.insert(3, 40, 1);

        let mut data = b"%PDF-1.4\n".to_vec();
        let offset = data.len();
        table.write_to(&mut data);
        data.extend_from_slice(
            format!("trailer\n<< /Size 4 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", offset)
                .as_bytes(),
        );

        let (parsed, trailer) = XrefTable::parse(&data).unwrap();
        assert_eq!(parsed, table);
        assert_eq!(trailer.get("Size"), Some(&PdfObject::Int(4)));
    }

    #[test]
    fn test_free_entries_and_subsections() {
        let data = b"%PDF-1.4\n\
xref\n0 2\n0000000000 65535 f \n0000000009 00000 n \n\
7 1\n0000000042 00003 n \n\
trailer\n<< /Size 8 >>\nstartxref\n9\n%%EOF\n";

        let (parsed, _) = XrefTable::parse(data).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get(1).map(|e| e.offset), Some(9));
        assert_eq!(parsed.get(7).map(|e| e.generation), Some(3));
        assert!(!parsed.contains(0));
    }

    #[test]
    fn test_truncated_table() {
        let data = b"%PDF-1.4\nxref\n0 3\n0000000000 65535 f \nstartxref\n9\n%%EOF\n";
        assert!(matches!(
            XrefTable::parse(data),
            Err(PdfError::MalformedDocument { .. })
        ));
    }

    #[test]
    fn test_xref_stream_pointer_rejected() {
        let data = b"%PDF-1.5\n1 0 obj\nnull\nendobj\nstartxref\n9\n%%EOF";
        assert!(matches!(
            XrefTable::parse(data),
            Err(PdfError::UnsupportedStructure(_))
        ));
    }
}
