//! Output assembly
//!
//! A minimal host: merges the exports of any number of writers into one
//! PDF file and adds pages that draw the imported templates.

use crate::types::*;
use crate::writer::{FormExport, format_real};
use std::collections::BTreeMap;

const CATALOG_ID: u32 = 1;
const PAGES_ID: u32 = 2;

/// PDF file built from exported template objects
#[derive(Debug, Clone)]
pub struct OutputDocument {
    objects: BTreeMap<u32, Vec<u8>>,
    pages: Vec<u32>,
    next_id: u32,
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDocument {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            pages: Vec::new(),
            next_id: PAGES_ID + 1,
        }
    }

    /// First object number not yet used; reserve it with
    /// [`crate::Importer::set_next_object_id`] before a sequential export
    pub fn next_object_id(&self) -> u32 {
        self.next_id
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Merge a writer's export and return the object number of each template.
    ///
    /// Hash exports are renumbered from [`next_object_id`](Self::next_object_id);
    /// sequential exports must already use free numbers.
    pub fn add_export(&mut self, export: FormExport) -> Result<BTreeMap<String, u32>> {
        let export = if export.order.iter().any(|id| id.as_hash().is_some()) {
            export.into_sequential(self.next_id)
        } else {
            export
        };

        let mut numbered = Vec::with_capacity(export.len());
        for (id, bytes) in export.iter() {
            let number = id
                .as_sequential()
                .ok_or_else(|| ImportError::Config(format!("Object {} was not renumbered", id)))?;
            if number < self.next_id || self.objects.contains_key(&number) {
                return Err(ImportError::Config(format!(
                    "Object number {} is already in use",
                    number
                )));
            }
            numbered.push((number, bytes.to_vec()));
        }

        for (number, bytes) in numbered {
            self.next_id = self.next_id.max(number + 1);
            self.objects.insert(number, bytes);
        }

        export
            .templates
            .iter()
            .map(|(name, id)| {
                id.as_sequential()
                    .map(|number| (name.clone(), number))
                    .ok_or_else(|| ImportError::Config(format!("Template {} has no number", name)))
            })
            .collect()
    }

    /// Add a page drawing `content`, with `xobjects` (name -> object number) as resources
    pub fn add_page(
        &mut self,
        width: f32,
        height: f32,
        content: &str,
        xobjects: &BTreeMap<String, u32>,
    ) -> u32 {
        let content_id = self.allocate();
        let mut stream = format!("<</Length {}>>\nstream\n", content.len()).into_bytes();
        stream.extend_from_slice(content.as_bytes());
        stream.extend_from_slice(b"\nendstream");
        self.objects.insert(content_id, stream);

        let resources: Vec<String> = xobjects
            .iter()
            .map(|(name, number)| format!("/{} {} 0 R", name, number))
            .collect();
        let page_id = self.allocate();
        let page = format!(
            concat!(
                "<</Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] ",
                "/Resources <</XObject <<{}>>>> /Contents {} 0 R>>"
            ),
            PAGES_ID,
            format_real(width),
            format_real(height),
            resources.join(" "),
            content_id
        );
        self.objects.insert(page_id, page.into_bytes());
        self.pages.push(page_id);
        page_id
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Serialize the complete file
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut objects = self.objects.clone();
        objects.insert(
            CATALOG_ID,
            format!("<</Type /Catalog /Pages {} 0 R>>", PAGES_ID).into_bytes(),
        );
        let kids: Vec<String> = self.pages.iter().map(|id| format!("{} 0 R", id)).collect();
        objects.insert(
            PAGES_ID,
            format!(
                "<</Type /Pages /Kids [{}] /Count {}>>",
                kids.join(" "),
                self.pages.len()
            )
            .into_bytes(),
        );

        let mut out: Vec<u8> = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
        let mut offsets: BTreeMap<u32, usize> = BTreeMap::new();
        for (id, body) in &objects {
            offsets.insert(*id, out.len());
            out.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let size = objects.keys().next_back().map_or(1, |max| max + 1);
        let xref_offset = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for id in 1..size {
            match offsets.get(&id) {
                Some(offset) => {
                    out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes())
                }
                None => out.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }
        out.extend_from_slice(
            format!(
                "trailer\n<</Size {} /Root {} 0 R>>\nstartxref\n{}\n%%EOF\n",
                size, CATALOG_ID, xref_offset
            )
            .as_bytes(),
        );
        out
    }
}
