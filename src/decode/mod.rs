//! Stream filters needed to open object streams.

mod flate;

use crate::error::{PdfError, Result};
use crate::types::{Dict, PdfObject};

pub use flate::{flate_decode, MAX_DECODED_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Flate,
    AsciiHex,
}

impl Filter {
    /// Full or abbreviated filter name
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "FlateDecode" | "Fl" => Ok(Filter::Flate),
            "ASCIIHexDecode" | "AHx" => Ok(Filter::AsciiHex),
            other => Err(PdfError::UnsupportedStructure(format!(
                "unsupported filter {}",
                other
            ))),
        }
    }

    pub fn apply(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Filter::Flate => flate_decode(data),
            Filter::AsciiHex => ascii_hex_decode(data),
        }
    }
}

/// Filter chain of a stream dictionary, in the order it is undone
pub fn filters(dict: &Dict) -> Result<Vec<Filter>> {
    let names: Vec<&PdfObject> = match dict.get("Filter") {
        None => return Ok(Vec::new()),
        Some(PdfObject::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    };

    names
        .into_iter()
        .map(|name| {
            name.as_name()
                .ok_or_else(|| PdfError::UnsupportedStructure("Filter must be a name".into()))
                .and_then(Filter::from_name)
        })
        .collect()
}

/// Undo every filter on `data`.
///
/// Predictors are not implemented; a stream declaring one is
/// `UnsupportedStructure` rather than silently mis-decoded.
pub fn decode_stream(dict: &Dict, data: &[u8]) -> Result<Vec<u8>> {
    let chain = filters(dict)?;
    if chain.is_empty() {
        return Ok(data.to_vec());
    }
    if has_predictor(dict) {
        return Err(PdfError::UnsupportedStructure(
            "stream declares a predictor".into(),
        ));
    }

    chain
        .into_iter()
        .try_fold(data.to_vec(), |bytes, filter| filter.apply(&bytes))
}

fn has_predictor(dict: &Dict) -> bool {
    let predictor = |parms: &PdfObject| {
        parms
            .get("Predictor")
            .and_then(PdfObject::as_int)
            .is_some_and(|p| p > 1)
    };

    match dict.get("DecodeParms") {
        Some(PdfObject::Array(items)) => items.iter().any(predictor),
        Some(parms) => predictor(parms),
        None => false,
    }
}

/// Hex digits up to `>`; whitespace skipped, an odd last digit padded with 0
fn ascii_hex_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;

    for &b in data {
        let nibble = match b {
            b'>' => break,
            b if b.is_ascii_whitespace() => continue,
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => {
                return Err(PdfError::DecompressError(format!(
                    "Invalid hex char: {}",
                    char::from(b)
                )));
            }
        };
        match high.take() {
            Some(h) => out.push(h << 4 | nibble),
            None => high = Some(nibble),
        }
    }

    if let Some(h) = high {
        out.push(h << 4);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(entries: &[(&str, PdfObject)]) -> Dict {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_no_filter() {
        assert_eq!(decode_stream(&Dict::new(), b"raw data").unwrap(), b"raw data");
    }

    #[test]
    fn test_ascii_hex_decode() {
        assert_eq!(ascii_hex_decode(b"48 65 6C\n6C 6F>").unwrap(), b"Hello");
        assert_eq!(ascii_hex_decode(b"7>").unwrap(), vec![0x70]);
        assert!(ascii_hex_decode(b"4G>").is_err());
    }

    #[test]
    fn test_filter_chain_order() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"chained").unwrap();
        let hex: String = encoder
            .finish()
            .unwrap()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();

        let d = dict(&[(
            "Filter",
            PdfObject::Array(vec![PdfObject::name("AHx"), PdfObject::name("FlateDecode")]),
        )]);
        assert_eq!(decode_stream(&d, hex.as_bytes()).unwrap(), b"chained");
    }

    #[test]
    fn test_unsupported_filter() {
        let d = dict(&[("Filter", PdfObject::name("LZWDecode"))]);
        let err = decode_stream(&d, b"").unwrap_err();
        assert!(matches!(err, PdfError::UnsupportedStructure(_)));
    }

    #[test]
    fn test_predictor_rejected() {
        let parms = dict(&[("Predictor", PdfObject::Int(12))]);
        let d = dict(&[
            ("Filter", PdfObject::name("FlateDecode")),
            ("DecodeParms", PdfObject::Dict(parms)),
        ]);
        let err = decode_stream(&d, b"").unwrap_err();
        assert!(matches!(err, PdfError::UnsupportedStructure(_)));
    }
}
