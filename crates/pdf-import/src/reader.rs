//! Source document access
//!
//! A reader owns one parsed source document and answers the questions the
//! importer and writer ask about it: how many pages, which boxes each page
//! defines, and what a page draws.

use crate::constants::{DEFAULT_PAGE_DIMENSIONS, STREAM_KEY_PREFIX};
use crate::types::*;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Page tree attributes a page inherits from its ancestors
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Longest chain of references or parents followed before giving up
const MAX_DEPTH: usize = 64;

/// Where a source document's bytes come from
#[derive(Debug, Clone)]
pub enum Source {
    File(PathBuf),
    Bytes(Vec<u8>),
}

impl Source {
    /// Stable registry key for in-memory sources, derived from their content
    pub fn stream_key(bytes: &[u8]) -> String {
        format!("{}{}", STREAM_KEY_PREFIX, ContentHash::of(bytes))
    }
}

/// Read-side capabilities the importer needs from a source document
pub trait SourceReader: Sized {
    fn open(source: &Source) -> std::result::Result<Self, SourceError>;

    fn page_count(&self) -> std::result::Result<usize, SourceError>;

    /// Every page's defined boxes, each coordinate divided by `scale`
    fn page_boxes(&self, scale: f32) -> std::result::Result<PageGeometry, SourceError>;
}

/// lopdf-backed source reader
#[derive(Debug, Clone)]
pub struct PdfReader {
    doc: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl PdfReader {
    pub fn from_document(doc: Document) -> Self {
        let pages = doc.get_pages();
        Self { doc, pages }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Object id of a 1-based page number
    pub fn page_id(&self, page: u32) -> std::result::Result<ObjectId, PageError> {
        self.pages
            .get(&page)
            .copied()
            .ok_or(PageError::OutOfRange {
                page,
                count: self.pages.len(),
            })
    }

    /// Follow references until a direct object is reached
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        let mut current = obj;
        for _ in 0..MAX_DEPTH {
            match current {
                Object::Reference(id) => current = self.doc.get_object(*id).ok()?,
                _ => return Some(current),
            }
        }
        None
    }

    /// Look up a page attribute, walking up the page tree for inheritable keys
    pub fn page_attribute(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut dict = self.doc.get_dictionary(page_id).ok()?;
        let inheritable = INHERITABLE_KEYS.contains(&key);

        for _ in 0..MAX_DEPTH {
            if let Ok(value) = dict.get(key) {
                return self.resolve(value);
            }
            if !inheritable {
                return None;
            }
            dict = self.parent_of(dict)?;
        }
        None
    }

    fn parent_of<'a>(&'a self, dict: &'a Dictionary) -> Option<&'a Dictionary> {
        let parent = dict.get(b"Parent").ok()?;
        self.resolve(parent)?.as_dict().ok()
    }

    /// Raw (unscaled) box of a page, if the page defines it
    pub fn page_box(&self, page_id: ObjectId, kind: PageBoxKind) -> Option<PageBox> {
        let array = self.page_attribute(page_id, kind.key())?.as_array().ok()?;
        if array.len() != 4 {
            return None;
        }

        let mut coords = [0.0f32; 4];
        for (slot, item) in coords.iter_mut().zip(array) {
            *slot = extract_number(self.resolve(item)?)?;
        }
        Some(PageBox::from_corners(
            coords[0], coords[1], coords[2], coords[3],
        ))
    }

    /// Media box, falling back to US Letter when the page tree has none
    pub fn media_box(&self, page_id: ObjectId) -> PageBox {
        self.page_box(page_id, PageBoxKind::MediaBox).unwrap_or_else(|| {
            PageBox::from_corners(
                0.0,
                0.0,
                DEFAULT_PAGE_DIMENSIONS.0,
                DEFAULT_PAGE_DIMENSIONS.1,
            )
        })
    }

    /// Page rotation in degrees, normalized to 0, 90, 180 or 270
    pub fn page_rotation(&self, page_id: ObjectId) -> i64 {
        self.page_attribute(page_id, b"Rotate")
            .and_then(|obj| obj.as_i64().ok())
            .map(|degrees| (degrees.rem_euclid(360) / 90) * 90)
            .unwrap_or(0)
    }

    /// Get the decoded content stream data of a page
    pub fn page_content(&self, page_id: ObjectId) -> std::result::Result<Vec<u8>, PageError> {
        let page_dict = self.doc.get_dictionary(page_id)?;
        let contents = match page_dict.get(b"Contents") {
            Ok(c) => c,
            Err(_) => return Ok(Vec::new()), // No content = blank page
        };

        match self.resolve(contents) {
            Some(Object::Stream(stream)) => decode_stream(stream),
            Some(Object::Array(arr)) => self.concatenated_content_streams(arr),
            Some(Object::Null) | None => Ok(Vec::new()),
            Some(_) => Err(PageError::Malformed(
                "/Contents is neither a stream nor an array".to_string(),
            )),
        }
    }

    /// Concatenate multiple content streams
    fn concatenated_content_streams(
        &self,
        refs: &[Object],
    ) -> std::result::Result<Vec<u8>, PageError> {
        let mut result = Vec::new();

        for obj in refs {
            if let Some(Object::Stream(stream)) = self.resolve(obj) {
                result.extend_from_slice(&decode_stream(stream)?);
                result.push(b'\n');
            }
        }

        Ok(result)
    }
}

impl SourceReader for PdfReader {
    fn open(source: &Source) -> std::result::Result<Self, SourceError> {
        let doc = match source {
            Source::File(path) => Document::load(path)?,
            Source::Bytes(bytes) => Document::load_mem(bytes)?,
        };
        Ok(Self::from_document(doc))
    }

    fn page_count(&self) -> std::result::Result<usize, SourceError> {
        Ok(self.pages.len())
    }

    fn page_boxes(&self, scale: f32) -> std::result::Result<PageGeometry, SourceError> {
        if !(scale > 0.0) {
            return Err(SourceError::Malformed(format!(
                "Scale must be positive, got {}",
                scale
            )));
        }

        let mut geometry = PageGeometry::new();
        for (&page, &page_id) in &self.pages {
            let mut boxes = BTreeMap::new();
            boxes.insert(PageBoxKind::MediaBox, self.media_box(page_id).scaled(scale));
            for kind in &PageBoxKind::ALL[1..] {
                if let Some(page_box) = self.page_box(page_id, *kind) {
                    boxes.insert(*kind, page_box.scaled(scale));
                }
            }
            geometry.insert(page, boxes);
        }
        Ok(geometry)
    }
}

/// Decode a content stream; unfiltered streams are returned as-is
fn decode_stream(stream: &lopdf::Stream) -> std::result::Result<Vec<u8>, PageError> {
    if stream.dict.has(b"Filter") {
        Ok(stream.decompressed_content()?)
    } else {
        Ok(stream.content.clone())
    }
}

/// Extract numeric value from a PDF object
pub(crate) fn extract_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}
