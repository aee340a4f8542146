use super::object::PdfObject;

impl PdfObject {
    /// Serialize in canonical PDF syntax
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            PdfObject::Null => out.extend_from_slice(b"null"),
            PdfObject::Bool(true) => out.extend_from_slice(b"true"),
            PdfObject::Bool(false) => out.extend_from_slice(b"false"),
            PdfObject::Int(n) => out.extend_from_slice(n.to_string().as_bytes()),
            PdfObject::Real(f) => write_real(*f, out),
            PdfObject::String(s) => write_hex_string(s, out),
            PdfObject::Name(n) => write_name(n, out),
            PdfObject::Array(items) => {
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    item.write_to(out);
                }
                out.push(b']');
            }
            PdfObject::Dict(dict) => write_dict(dict.iter(), out),
            PdfObject::Stream { dict, data } => {
                // Length always reflects the bytes actually written
                let mut dict = dict.clone();
                dict.insert("Length".into(), PdfObject::Int(data.len() as i64));
                write_dict(dict.iter(), out);
                out.extend_from_slice(b"\nstream\n");
                out.extend_from_slice(data);
                out.extend_from_slice(b"\nendstream");
            }
            PdfObject::Ref(r) => {
                out.extend_from_slice(format!("{} {} R", r.obj_num, r.gen_num).as_bytes());
            }
        }
    }
}

fn write_dict<'a>(
    entries: impl Iterator<Item = (&'a String, &'a PdfObject)>,
    out: &mut Vec<u8>,
) {
    out.extend_from_slice(b"<<");
    for (key, value) in entries {
        write_name(key, out);
        out.push(b' ');
        value.write_to(out);
        out.push(b' ');
    }
    out.extend_from_slice(b">>");
}

fn write_real(f: f64, out: &mut Vec<u8>) {
    if !f.is_finite() {
        out.push(b'0');
        return;
    }
    // f64 Display never uses exponent notation
    out.extend_from_slice(f.to_string().as_bytes());
}

fn write_hex_string(s: &[u8], out: &mut Vec<u8>) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    out.push(b'<');
    for &b in s {
        out.push(HEX[(b >> 4) as usize]);
        out.push(HEX[(b & 0x0F) as usize]);
    }
    out.push(b'>');
}

fn write_name(name: &str, out: &mut Vec<u8>) {
    out.push(b'/');
    let mut utf8 = [0u8; 4];
    for c in name.chars() {
        let code = c as u32;
        let bytes: &[u8] = if code <= 0xFF {
            utf8[0] = code as u8;
            &utf8[..1]
        } else {
            c.encode_utf8(&mut utf8).as_bytes()
        };
        for &b in bytes {
            if is_regular_name_byte(b) {
                out.push(b);
            } else {
                out.extend_from_slice(format!("#{:02X}", b).as_bytes());
            }
        }
    }
}

fn is_regular_name_byte(b: u8) -> bool {
    matches!(b, 0x21..=0x7E)
        && !matches!(
            b,
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#'
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Dict, ObjRef};

    #[test]
    fn test_write_dict_sorted() {
        let mut dict = Dict::new();
        dict.insert("Type".into(), PdfObject::name("Pages"));
        dict.insert("Count".into(), PdfObject::Int(2));
        dict.insert(
            "Kids".into(),
            PdfObject::Array(vec![
                PdfObject::Ref(ObjRef::new(3, 0)),
                PdfObject::Ref(ObjRef::new(5, 0)),
            ]),
        );

        let bytes = PdfObject::Dict(dict).to_bytes();
        assert_eq!(bytes, b"<</Count 2 /Kids [3 0 R 5 0 R] /Type /Pages >>".to_vec());
    }

    #[test]
    fn test_write_name_escapes() {
        let bytes = PdfObject::name("Font Name#1").to_bytes();
        assert_eq!(bytes, b"/Font#20Name#231".to_vec());
    }

    #[test]
    fn test_write_latin1_name() {
        // 0xE9 decoded byte-per-char must come back as a single byte
        let bytes = PdfObject::Name("Caf\u{e9}".into()).to_bytes();
        assert_eq!(bytes, b"/Caf#E9".to_vec());
    }

    #[test]
    fn test_write_string_as_hex() {
        let bytes = PdfObject::String(b"(1 0 R)".to_vec()).to_bytes();
        assert_eq!(bytes, b"<2831203020522029>".to_vec());
    }

    #[test]
    fn test_write_reals() {
        assert_eq!(PdfObject::Real(612.0).to_bytes(), b"612".to_vec());
        assert_eq!(PdfObject::Real(0.5).to_bytes(), b"0.5".to_vec());
        assert_eq!(PdfObject::Real(f64::NAN).to_bytes(), b"0".to_vec());
    }

    #[test]
    fn test_write_stream_fixes_length() {
        let mut dict = Dict::new();
        dict.insert("Length".into(), PdfObject::Ref(ObjRef::new(9, 0)));
        let obj = PdfObject::Stream {
            dict,
            data: b"BT ET".to_vec(),
        };
        assert_eq!(
            obj.to_bytes(),
            b"<</Length 5 >>\nstream\nBT ET\nendstream".to_vec()
        );
    }
}
