use std::collections::HashMap;

use tracing::debug;

use crate::document::{Document, IndirectObject, PageLeaf};
use crate::error::{PdfError, Result};
use crate::types::{Dict, PdfObject};

/// Union of both documents with a single merged page tree
#[derive(Debug, Clone)]
pub struct Spliced {
    pub version: String,
    /// A's objects in file order, B's by ascending id, then the new root
    pub objects: Vec<IndirectObject>,
    pub catalog: u32,
    pub pages_root: u32,
    pub info: Option<u32>,
    pub id: Option<PdfObject>,
    pub pages_a: usize,
    pub pages_b: usize,
}

/// Combine document A with the renumbered document B.
///
/// B's identifiers must already lie above A's.
pub fn splice(a: &Document, b: &Document) -> Result<Spliced> {
    let catalog = a.catalog_id()?;
    let leaves_a = a.page_leaves()?;
    let leaves_b = b.page_leaves()?;

    let pages_root = a
        .max_id()
        .max(b.max_id())
        .checked_add(1)
        .ok_or_else(|| PdfError::UnsupportedStructure("object identifiers exhausted".into()))?;

    // Objects whose bodies change: every leaf, plus A's catalog
    let mut replaced: HashMap<u32, IndirectObject> = HashMap::new();
    for (doc, leaves) in [(a, &leaves_a), (b, &leaves_b)] {
        for leaf in leaves {
            if let Some(object) = doc.get(leaf.id) {
                replaced.insert(leaf.id, reparent(object, leaf, pages_root)?);
            }
        }
    }
    if let Some(object) = a.get(catalog) {
        replaced.insert(catalog, redirect_catalog(object, pages_root)?);
    }

    // Superseded catalogs and page tree roots stay as ordinary objects;
    // only the trailer's /Root gives the catalog role
    let mut from_b: Vec<&IndirectObject> = b.objects().iter().collect();
    from_b.sort_by_key(|o| o.id);

    let mut objects = Vec::with_capacity(a.object_count() + b.object_count() + 1);
    for object in a.objects().iter().chain(from_b) {
        objects.push(replaced.remove(&object.id).unwrap_or_else(|| object.clone()));
    }

    let kids: Vec<PdfObject> = leaves_a
        .iter()
        .chain(&leaves_b)
        .map(|leaf| PdfObject::reference(leaf.id))
        .collect();

    let mut root = Dict::new();
    root.insert("Type".into(), PdfObject::name("Pages"));
    root.insert("Count".into(), PdfObject::Int(kids.len() as i64));
    root.insert("Kids".into(), PdfObject::Array(kids));
    objects.push(IndirectObject::from_value(pages_root, 0, &PdfObject::Dict(root))?);

    debug!(
        pages_a = leaves_a.len(),
        pages_b = leaves_b.len(),
        pages_root,
        objects = objects.len(),
        "spliced page trees"
    );

    Ok(Spliced {
        version: newer_version(a.version(), b.version()).to_string(),
        objects,
        catalog,
        pages_root,
        info: a.trailer().info.filter(|i| a.get(*i).is_some()),
        id: a.trailer().id.clone(),
        pages_a: leaves_a.len(),
        pages_b: leaves_b.len(),
    })
}

/// Hang a leaf directly under the merged root, keeping what it inherited
fn reparent(object: &IndirectObject, leaf: &PageLeaf, pages_root: u32) -> Result<IndirectObject> {
    let mut value = object.parse()?;
    let dict = value.as_dict_mut().ok_or_else(|| {
        PdfError::malformed(0, format!("page {} is not a dictionary", object.id))
    })?;

    for (key, inherited) in &leaf.inherited {
        dict.entry(key.clone()).or_insert_with(|| inherited.clone());
    }
    dict.insert("Parent".into(), PdfObject::reference(pages_root));

    IndirectObject::from_value(object.id, object.generation, &value)
}

fn redirect_catalog(object: &IndirectObject, pages_root: u32) -> Result<IndirectObject> {
    let mut value = object.parse()?;
    let dict = value.as_dict_mut().ok_or_else(|| {
        PdfError::malformed(0, format!("catalog {} is not a dictionary", object.id))
    })?;
    dict.insert("Pages".into(), PdfObject::reference(pages_root));

    IndirectObject::from_value(object.id, object.generation, &value)
}

/// Pick the higher of two `major.minor` header versions
fn newer_version<'v>(a: &'v str, b: &'v str) -> &'v str {
    let key = |v: &str| -> (u32, u32) {
        let mut parts = v.split('.').map(|p| p.parse().unwrap_or(0));
        (parts.next().unwrap_or(0), parts.next().unwrap_or(0))
    };
    if key(b) > key(a) { b } else { a }
}
