//! Form XObject construction and dependency copying
//!
//! Templates keep references into the source document's numbering. The
//! objects behind those references are copied into the writer's store once,
//! and renumbered only when the writer exports.

use super::FormTemplate;
use crate::reader::PdfReader;
use lopdf::{Dictionary, Object, ObjectId, Stream};
use std::collections::BTreeMap;

// =============================================================================
// Form XObject
// =============================================================================

/// Build the Form XObject stream for a template.
///
/// The bounding box is the page box in source coordinates; the matrix maps
/// it to the origin and applies the page rotation.
pub(crate) fn form_xobject(tpl: &FormTemplate) -> Object {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Form".to_vec()));
    dict.set("FormType", Object::Integer(1));
    dict.set(
        "BBox",
        Object::Array(vec![
            Object::Real(tpl.bbox.llx),
            Object::Real(tpl.bbox.lly),
            Object::Real(tpl.bbox.urx),
            Object::Real(tpl.bbox.ury),
        ]),
    );

    let matrix = form_matrix(tpl);
    if matrix != [1.0, 0.0, 0.0, 1.0, 0.0, 0.0] {
        dict.set(
            "Matrix",
            Object::Array(matrix.iter().map(|v| Object::Real(*v)).collect()),
        );
    }

    if let Some(resources) = &tpl.resources {
        dict.set("Resources", resources.clone());
    }
    if let Some(group) = &tpl.group {
        dict.set("Group", group.clone());
    }
    if tpl.compressed {
        dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    }

    Object::Stream(Stream {
        dict,
        content: tpl.content.clone(),
        allows_compression: false,
        start_position: None,
    })
}

/// Matrix `[a b c d e f]` moving the box corner to the origin, rotated clockwise
fn form_matrix(tpl: &FormTemplate) -> [f32; 6] {
    let b = &tpl.bbox;
    match tpl.rotation {
        90 => [0.0, -1.0, 1.0, 0.0, -b.lly, b.urx],
        180 => [-1.0, 0.0, 0.0, -1.0, b.urx, b.ury],
        270 => [0.0, 1.0, -1.0, 0.0, b.ury, -b.llx],
        _ => [1.0, 0.0, 0.0, 1.0, -b.llx, -b.lly],
    }
}

// =============================================================================
// Dependency Copy
// =============================================================================

/// Copy every object reachable from `root` into `store`, keyed by source id.
///
/// Objects already in the store are not copied again, so resources shared by
/// several pages of the same source are kept once. Dangling references are
/// skipped and end up as `null` on export.
pub(crate) fn copy_dependencies(
    reader: &PdfReader,
    root: &Object,
    store: &mut BTreeMap<ObjectId, Object>,
) {
    let mut pending = Vec::new();
    collect_references(root, &mut pending);

    while let Some(id) = pending.pop() {
        if store.contains_key(&id) {
            continue;
        }
        let Ok(obj) = reader.document().get_object(id) else {
            log::debug!("Skipping dangling reference {} {} R", id.0, id.1);
            continue;
        };

        let copied = without_backlinks(obj.clone());
        collect_references(&copied, &mut pending);
        store.insert(id, copied);
    }
}

/// References held by an object, in document order
pub(crate) fn collect_references(obj: &Object, out: &mut Vec<ObjectId>) {
    match obj {
        Object::Reference(id) => out.push(*id),
        Object::Array(arr) => {
            for item in arr {
                collect_references(item, out);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter() {
                collect_references(value, out);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter() {
                collect_references(value, out);
            }
        }
        _ => {}
    }
}

/// Drop `/Parent` links back into the source page tree, and stream
/// `/Length` entries (rewritten from the actual content on export).
pub(crate) fn without_backlinks(obj: Object) -> Object {
    match obj {
        Object::Dictionary(dict) => Object::Dictionary(strip_dictionary(dict)),
        Object::Array(arr) => Object::Array(arr.into_iter().map(without_backlinks).collect()),
        Object::Stream(mut stream) => {
            let mut dict = strip_dictionary(stream.dict);
            dict.remove(b"Length");
            stream.dict = dict;
            Object::Stream(stream)
        }
        other => other,
    }
}

fn strip_dictionary(dict: Dictionary) -> Dictionary {
    let mut new_dict = Dictionary::new();
    for (key, value) in dict.into_iter() {
        if key.as_slice() == b"Parent" {
            continue;
        }
        new_dict.set(key, without_backlinks(value));
    }
    new_dict
}
