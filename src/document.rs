use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::Range;

use crate::error::{PdfError, Result};
use crate::parser::{reference_spans, Parser};
use crate::scan;
use crate::types::{Dict, PdfObject};

/// Attributes a page inherits from its ancestors in the page tree
pub const INHERITABLE: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// Raw bytes of an indirect object, without the `N G obj` / `endobj` frame
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectBody {
    /// Any non-stream value: dictionary, array, number, ...
    Value(Vec<u8>),
    /// Stream dictionary syntax plus the undecoded stream bytes
    Stream { dict: Vec<u8>, data: Vec<u8> },
}

impl ObjectBody {
    /// The part of the body that may carry references
    pub fn head(&self) -> &[u8] {
        match self {
            ObjectBody::Value(bytes) => bytes,
            ObjectBody::Stream { dict, .. } => dict,
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            ObjectBody::Value(bytes) => out.extend_from_slice(bytes),
            ObjectBody::Stream { dict, data } => {
                out.extend_from_slice(dict);
                out.extend_from_slice(b"\nstream\n");
                out.extend_from_slice(data);
                out.extend_from_slice(b"\nendstream");
            }
        }
    }
}

impl From<&PdfObject> for ObjectBody {
    fn from(obj: &PdfObject) -> Self {
        match obj {
            PdfObject::Stream { dict, data } => {
                let mut dict = dict.clone();
                dict.insert("Length".into(), PdfObject::Int(data.len() as i64));
                ObjectBody::Stream {
                    dict: PdfObject::Dict(dict).to_bytes(),
                    data: data.clone(),
                }
            }
            other => ObjectBody::Value(other.to_bytes()),
        }
    }
}

/// One `N G obj ... endobj` definition
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    pub id: u32,
    pub generation: u16,
    pub body: ObjectBody,
    /// Identifiers referenced from the body
    pub refs: BTreeSet<u32>,
}

impl IndirectObject {
    pub fn new(id: u32, generation: u16, body: ObjectBody) -> Result<Self> {
        let refs = reference_spans(body.head())
            .map_err(PdfError::into_malformed)?
            .into_iter()
            .map(|r| r.target.obj_num)
            .collect();

        Ok(Self {
            id,
            generation,
            body,
            refs,
        })
    }

    /// Build from a value, serializing it canonically
    pub fn from_value(id: u32, generation: u16, value: &PdfObject) -> Result<Self> {
        Self::new(id, generation, ObjectBody::from(value))
    }

    /// Parse the body into a value tree
    pub fn parse(&self) -> Result<PdfObject> {
        let head = Parser::new(self.body.head())
            .parse_object()
            .map_err(PdfError::into_malformed)?;
        let Some(head) = head else {
            return Err(PdfError::malformed(0, format!("object {} is empty", self.id)));
        };

        match (&self.body, head) {
            (ObjectBody::Stream { data, .. }, PdfObject::Dict(dict)) => Ok(PdfObject::Stream {
                dict,
                data: data.clone(),
            }),
            (ObjectBody::Stream { .. }, _) => Err(PdfError::malformed(
                0,
                format!("stream object {} has no dictionary", self.id),
            )),
            (ObjectBody::Value(_), value) => Ok(value),
        }
    }
}

/// Trailer entries collected from every trailer dictionary and xref stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trailer {
    pub root: Option<u32>,
    pub info: Option<u32>,
    /// `/ID` array, carried verbatim
    pub id: Option<PdfObject>,
}

impl Trailer {
    /// Later trailers override earlier ones
    pub fn absorb(&mut self, dict: &Dict) {
        if let Some(root) = dict.get("Root").and_then(PdfObject::ref_id) {
            self.root = Some(root);
        }
        if let Some(info) = dict.get("Info").and_then(PdfObject::ref_id) {
            self.info = Some(info);
        }
        if let Some(id @ PdfObject::Array(_)) = dict.get("ID") {
            self.id = Some(id.clone());
        }
    }
}

/// A leaf of a page tree together with what it inherited
#[derive(Debug, Clone, PartialEq)]
pub struct PageLeaf {
    pub id: u32,
    pub inherited: Dict,
}

/// Scanned PDF document: objects in file order plus the trailer
#[derive(Debug, Clone)]
pub struct Document {
    version: String,
    objects: Vec<IndirectObject>,
    /// Object number -> position in `objects`
    index: HashMap<u32, usize>,
    trailer: Trailer,
    /// Byte ranges of xref/trailer sections in the source
    discarded: Vec<Range<usize>>,
}

impl Document {
    /// Scan a PDF document from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        scan::scan(data)
    }

    /// Like `parse`, but a header with no objects behind it yields an
    /// empty document
    pub fn parse_allow_empty(data: &[u8]) -> Result<Self> {
        scan::scan_allow_empty(data)
    }

    pub fn from_parts(
        version: String,
        objects: Vec<IndirectObject>,
        trailer: Trailer,
        discarded: Vec<Range<usize>>,
    ) -> Self {
        let index = objects
            .iter()
            .enumerate()
            .map(|(i, obj)| (obj.id, i))
            .collect();

        Document {
            version,
            objects,
            index,
            trailer,
            discarded,
        }
    }

    /// Header version, e.g. "1.7"
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn objects(&self) -> &[IndirectObject] {
        &self.objects
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn max_id(&self) -> u32 {
        self.objects.iter().map(|o| o.id).max().unwrap_or(0)
    }

    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    pub fn discarded_spans(&self) -> &[Range<usize>] {
        &self.discarded
    }

    pub fn get(&self, id: u32) -> Option<&IndirectObject> {
        self.index.get(&id).map(|&i| &self.objects[i])
    }

    /// Parse object `id`, failing when `referrer` points at nothing
    pub fn resolve(&self, referrer: u32, id: u32) -> Result<PdfObject> {
        self.get(id)
            .ok_or_else(|| PdfError::dangling(referrer, id))?
            .parse()
    }

    /// Document catalog identifier
    pub fn catalog_id(&self) -> Result<u32> {
        if let Some(root) = self.trailer.root.filter(|r| self.index.contains_key(r)) {
            return Ok(root);
        }

        // No usable trailer: fall back to the last object typed as a catalog
        self.objects
            .iter()
            .rev()
            .find(|obj| {
                obj.parse()
                    .is_ok_and(|value| value.type_name() == Some("Catalog"))
            })
            .map(|obj| obj.id)
            .ok_or_else(|| PdfError::malformed(0, "document has no catalog"))
    }

    /// Identifier of the page tree root named by the catalog
    pub fn pages_root_id(&self) -> Result<u32> {
        let catalog_id = self.catalog_id()?;
        let catalog = self.resolve(0, catalog_id)?;

        catalog
            .get("Pages")
            .and_then(PdfObject::ref_id)
            .ok_or_else(|| PdfError::malformed(0, "Missing Pages in catalog"))
    }

    /// Page leaves in display order, depth-first through `/Kids`
    pub fn page_leaves(&self) -> Result<Vec<PageLeaf>> {
        let root = self.pages_root_id()?;
        let mut leaves = Vec::new();
        let mut visited = HashSet::new();
        // (node, referrer, attributes inherited from ancestors)
        let mut stack = vec![(root, self.catalog_id()?, Dict::new())];

        while let Some((id, referrer, inherited)) = stack.pop() {
            if !visited.insert(id) {
                return Err(PdfError::malformed(
                    0,
                    format!("page tree revisits object {}", id),
                ));
            }

            let node = self.resolve(referrer, id)?;
            let dict = node.as_dict().ok_or_else(|| {
                PdfError::malformed(0, format!("page tree node {} is not a dictionary", id))
            })?;

            let kids = dict.get("Kids").and_then(|k| k.as_array());
            let is_leaf = node.type_name() == Some("Page") || kids.is_none();

            let Some(kids) = kids.filter(|_| !is_leaf) else {
                leaves.push(PageLeaf { id, inherited });
                continue;
            };

            let mut passed_down = inherited;
            for key in INHERITABLE {
                if let Some(value) = dict.get(key) {
                    passed_down.insert(key.to_string(), value.clone());
                }
            }

            for kid in kids.iter().rev() {
                let kid = kid.ref_id().ok_or_else(|| {
                    PdfError::malformed(0, format!("Kids of {} must be references", id))
                })?;
                stack.push((kid, id, passed_down.clone()));
            }
        }

        Ok(leaves)
    }

    pub fn page_ids(&self) -> Result<Vec<u32>> {
        Ok(self.page_leaves()?.into_iter().map(|p| p.id).collect())
    }

    pub fn page_count(&self) -> Result<usize> {
        Ok(self.page_leaves()?.len())
    }
}
