use std::collections::BTreeMap;
use std::fmt;

/// Dictionary storage; ordered so serialization is deterministic
pub type Dict = BTreeMap<String, PdfObject>;

/// Target of an `N G R` reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef {
    pub obj_num: u32,
    pub gen_num: u16,
}

impl ObjRef {
    pub fn new(obj_num: u32, gen_num: u16) -> Self {
        Self { obj_num, gen_num }
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.obj_num, self.gen_num)
    }
}

/// A parsed PDF value
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    /// Literal and hex strings alike, as raw bytes
    String(Vec<u8>),
    /// Name without the leading '/', decoded byte-per-char
    Name(String),
    Array(Vec<PdfObject>),
    Dict(Dict),
    Stream {
        dict: Dict,
        data: Vec<u8>,
    },
    Ref(ObjRef),
}

impl PdfObject {
    pub fn name(name: &str) -> Self {
        PdfObject::Name(name.to_string())
    }

    /// `obj_num 0 R`
    pub fn reference(obj_num: u32) -> Self {
        PdfObject::Ref(ObjRef::new(obj_num, 0))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PdfObject::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            PdfObject::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PdfObject]> {
        match self {
            PdfObject::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The dictionary of a dictionary or of a stream
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            PdfObject::Dict(dict) | PdfObject::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dict> {
        match self {
            PdfObject::Dict(dict) | PdfObject::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<(&Dict, &[u8])> {
        match self {
            PdfObject::Stream { dict, data } => Some((dict, data)),
            _ => None,
        }
    }

    /// Object number of a reference
    pub fn ref_id(&self) -> Option<u32> {
        match self {
            PdfObject::Ref(r) => Some(r.obj_num),
            _ => None,
        }
    }

    /// Look up `key` in a dictionary or stream dictionary
    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        self.as_dict()?.get(key)
    }

    /// `/Type` of a dictionary or stream, if present
    pub fn type_name(&self) -> Option<&str> {
        self.get("Type")?.as_name()
    }
}
