//! Export of accumulated templates
//!
//! Both id modes walk the same plan: templates in import order, each one
//! followed depth-first by the dependencies not emitted yet. Only the id
//! handed to each entry differs, which keeps hash exports renumberable into
//! exactly the bytes of a sequential export.

use super::FormTemplate;
use super::serialize::serialize_object;
use super::xobject::{collect_references, form_xobject};
use crate::options::IdMode;
use crate::types::{ContentHash, ObjectId};
use lopdf::Object;
use std::collections::{BTreeMap, HashMap};

/// Objects produced by one writer, ready for embedding
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormExport {
    /// Template resource name -> form object id
    pub templates: BTreeMap<String, ObjectId>,
    /// Object id -> object body (without `obj`/`endobj`)
    pub objects: BTreeMap<ObjectId, Vec<u8>>,
    /// Object id -> byte offset -> referenced hash; empty in sequential mode
    pub hash_positions: BTreeMap<ObjectId, BTreeMap<usize, ObjectId>>,
    /// Emission order of `objects`
    pub order: Vec<ObjectId>,
}

impl FormExport {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Objects in emission order
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &[u8])> {
        self.order
            .iter()
            .filter_map(|id| self.objects.get(id).map(|bytes| (id, bytes.as_slice())))
    }

    /// Replace content hashes with numbers starting at `first_id`.
    ///
    /// Numbers follow emission order and every recorded placeholder is
    /// patched in place, which is the final pass a host runs after merging
    /// hash-identified objects. Sequential ids are kept as they are.
    pub fn into_sequential(self, first_id: u32) -> FormExport {
        let mut mapping: HashMap<ObjectId, ObjectId> = HashMap::new();
        let mut next = first_id;
        for id in &self.order {
            if let ObjectId::ContentHash(_) = id {
                mapping.insert(*id, ObjectId::Sequential(next));
                next += 1;
            }
        }
        let remap = |id: &ObjectId| mapping.get(id).copied().unwrap_or(*id);

        let mut objects = BTreeMap::new();
        for (id, bytes) in self.objects {
            let patched = match self.hash_positions.get(&id) {
                Some(positions) => patch_placeholders(&bytes, positions, &mapping),
                None => bytes,
            };
            objects.insert(remap(&id), patched);
        }

        FormExport {
            templates: self
                .templates
                .iter()
                .map(|(name, id)| (name.clone(), remap(id)))
                .collect(),
            objects,
            hash_positions: BTreeMap::new(),
            order: self.order.iter().map(remap).collect(),
        }
    }
}

/// Rewrite every placeholder at the recorded offsets with its new number
fn patch_placeholders(
    bytes: &[u8],
    positions: &BTreeMap<usize, ObjectId>,
    mapping: &HashMap<ObjectId, ObjectId>,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut cursor = 0;

    for (&offset, target) in positions {
        let end = offset + ContentHash::HEX_LEN;
        if offset < cursor || end > bytes.len() {
            continue;
        }
        out.extend_from_slice(&bytes[cursor..offset]);
        match mapping.get(target) {
            Some(ObjectId::Sequential(number)) => {
                out.extend_from_slice(number.to_string().as_bytes())
            }
            _ => out.extend_from_slice(&bytes[offset..end]),
        }
        cursor = end;
    }

    out.extend_from_slice(&bytes[cursor..]);
    out
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Template(usize),
    Source(lopdf::ObjectId),
}

/// Assign ids in plan order and serialize every entry
pub(crate) fn export_templates(
    key: &str,
    templates: &[FormTemplate],
    store: &BTreeMap<lopdf::ObjectId, Object>,
    mode: IdMode,
    first_id: u32,
) -> FormExport {
    let mut next = first_id;
    let mut assign = |entry: Entry| -> ObjectId {
        match mode {
            IdMode::Sequential => {
                let id = ObjectId::Sequential(next);
                next += 1;
                id
            }
            IdMode::ContentHash => ObjectId::ContentHash(identity_hash(key, templates, entry)),
        }
    };

    let mut plan: Vec<(Entry, ObjectId)> = Vec::new();
    let mut ids: HashMap<lopdf::ObjectId, ObjectId> = HashMap::new();

    for (index, tpl) in templates.iter().enumerate() {
        plan.push((Entry::Template(index), assign(Entry::Template(index))));

        let mut roots = Vec::new();
        if let Some(resources) = &tpl.resources {
            collect_references(resources, &mut roots);
        }
        if let Some(group) = &tpl.group {
            collect_references(group, &mut roots);
        }

        // Depth-first, left to right
        let mut stack: Vec<lopdf::ObjectId> = roots.into_iter().rev().collect();
        while let Some(source) = stack.pop() {
            if ids.contains_key(&source) {
                continue;
            }
            let Some(obj) = store.get(&source) else {
                continue;
            };

            let id = assign(Entry::Source(source));
            ids.insert(source, id);
            plan.push((Entry::Source(source), id));

            let mut refs = Vec::new();
            collect_references(obj, &mut refs);
            stack.extend(refs.into_iter().rev());
        }
    }

    let resolve = |source: lopdf::ObjectId| ids.get(&source).copied();
    let mut export = FormExport::default();

    for (entry, id) in plan {
        let serialized = match entry {
            Entry::Template(index) => {
                let tpl = &templates[index];
                export.templates.insert(tpl.name.clone(), id);
                serialize_object(&form_xobject(tpl), resolve)
            }
            Entry::Source(source) => match store.get(&source) {
                Some(obj) => serialize_object(obj, resolve),
                None => continue,
            },
        };

        if !serialized.hash_positions.is_empty() {
            export.hash_positions.insert(id, serialized.hash_positions);
        }
        export.objects.insert(id, serialized.bytes);
        export.order.push(id);
    }

    log::debug!(
        "Exported {} templates of '{}' as {} objects ({:?})",
        export.templates.len(),
        key,
        export.len(),
        mode
    );

    export
}

/// Fingerprint of an entry's identity: its source document and what it is there
fn identity_hash(key: &str, templates: &[FormTemplate], entry: Entry) -> ContentHash {
    match entry {
        Entry::Template(index) => {
            ContentHash::of(format!("{}\0template\0{}", key, templates[index].name))
        }
        Entry::Source((number, generation)) => {
            ContentHash::of(format!("{}\0object\0{} {}", key, number, generation))
        }
    }
}
