use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::error::{PdfError, Result};

/// Decoded streams larger than this are refused
pub const MAX_DECODED_LEN: u64 = 256 * 1024 * 1024;

/// Inflate zlib data, refusing output past `MAX_DECODED_LEN`
pub fn flate_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();

    ZlibDecoder::new(data)
        .take(MAX_DECODED_LEN + 1)
        .read_to_end(&mut out)
        .map_err(|e| PdfError::DecompressError(format!("FlateDecode failed: {}", e)))?;

    if out.len() as u64 > MAX_DECODED_LEN {
        return Err(PdfError::UnsupportedStructure(format!(
            "decoded stream exceeds {} bytes",
            MAX_DECODED_LEN
        )));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_inflate_object_stream_body() {
        let original = b"1 0 2 12 << /A 1 >> [3 0 R]";
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(original).unwrap();

        let decoded = flate_decode(&encoder.finish().unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_corrupt_data() {
        let err = flate_decode(b"definitely not zlib").unwrap_err();
        assert!(matches!(err, PdfError::DecompressError(_)));
    }
}
