//! Template writer
//!
//! A writer turns pages of one source document into Form XObject templates
//! and serializes them, together with every object their resources depend
//! on, into object bodies the host can embed in its own output.

mod export;
mod serialize;
mod xobject;

pub use export::FormExport;
pub(crate) use serialize::format_real;

use crate::options::{IdMode, ImportOptions};
use crate::reader::PdfReader;
use crate::types::*;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::Object;
use std::collections::BTreeMap;
use std::io::Write;

/// Write-side capabilities the importer needs for one source document
pub trait TemplateWriter<R>: Sized {
    fn create(key: &str, options: &ImportOptions) -> Self;

    /// Number the next imported template `offset`, the one after `offset + 1`, ...
    fn set_template_id_offset(&mut self, offset: TemplateId);

    /// First object number used by sequential exports
    fn set_next_object_id(&mut self, id: u32);

    /// Turn a page into a template and return its writer-local id
    fn import_page(
        &mut self,
        reader: &R,
        page: u32,
        page_box: PageBoxKind,
    ) -> std::result::Result<usize, PageError>;

    fn template_count(&self) -> usize;

    fn export(&self, mode: IdMode) -> FormExport;

    /// Draw parameters for a template; `None` if `local_id` was never returned by `import_page`
    fn use_template(
        &self,
        local_id: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Option<Placement>;
}

/// A page captured as a form object
#[derive(Debug, Clone)]
pub(crate) struct FormTemplate {
    pub name: String,
    pub page: u32,
    pub page_box: PageBoxKind,
    pub bbox: PageBox,
    /// Clockwise page rotation: 0, 90, 180 or 270
    pub rotation: i64,
    /// Size as displayed, after rotation
    pub width: f32,
    pub height: f32,
    pub resources: Option<Object>,
    pub group: Option<Object>,
    pub content: Vec<u8>,
    pub compressed: bool,
}

/// lopdf-backed template writer
#[derive(Debug, Clone)]
pub struct PdfWriter {
    key: String,
    prefix: String,
    compress: bool,
    next_template_number: u32,
    next_object_id: u32,
    templates: Vec<FormTemplate>,
    /// Source objects reachable from template resources, keyed by source id
    objects: BTreeMap<lopdf::ObjectId, Object>,
}

impl PdfWriter {
    /// Registry key of the source document this writer imports from
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Resource name of a template
    pub fn template_name(&self, local_id: usize) -> Option<&str> {
        self.templates.get(local_id).map(|tpl| tpl.name.as_str())
    }

    /// Page number and box a template was cut from, after box fallback
    pub fn template_source(&self, local_id: usize) -> Option<(u32, PageBoxKind)> {
        self.templates
            .get(local_id)
            .map(|tpl| (tpl.page, tpl.page_box))
    }

    /// Number of source objects copied for template resources
    pub fn dependency_count(&self) -> usize {
        self.objects.len()
    }

    /// Find the requested box, falling back through crop box to media box
    fn resolve_box(
        reader: &PdfReader,
        page_id: lopdf::ObjectId,
        requested: PageBoxKind,
    ) -> (PageBoxKind, PageBox) {
        let mut kind = requested;
        loop {
            if let Some(page_box) = reader.page_box(page_id, kind) {
                return (kind, page_box);
            }
            match kind.fallback() {
                Some(next) => kind = next,
                None => return (PageBoxKind::MediaBox, reader.media_box(page_id)),
            }
        }
    }
}

impl TemplateWriter<PdfReader> for PdfWriter {
    fn create(key: &str, options: &ImportOptions) -> Self {
        Self {
            key: key.to_string(),
            prefix: options.template_prefix.clone(),
            compress: options.compress_templates,
            next_template_number: 0,
            next_object_id: crate::constants::DEFAULT_FIRST_OBJECT_ID,
            templates: Vec::new(),
            objects: BTreeMap::new(),
        }
    }

    fn set_template_id_offset(&mut self, offset: TemplateId) {
        self.next_template_number = offset.0;
    }

    fn set_next_object_id(&mut self, id: u32) {
        self.next_object_id = id;
    }

    fn import_page(
        &mut self,
        reader: &PdfReader,
        page: u32,
        page_box: PageBoxKind,
    ) -> std::result::Result<usize, PageError> {
        let page_id = reader.page_id(page)?;
        let (page_box, bbox) = Self::resolve_box(reader, page_id, page_box);
        if bbox.width <= 0.0 || bbox.height <= 0.0 {
            return Err(PageError::Malformed(format!(
                "{} of page {} is empty",
                page_box, page
            )));
        }

        let rotation = reader.page_rotation(page_id);
        let (width, height) = match rotation {
            90 | 270 => (bbox.height, bbox.width),
            _ => (bbox.width, bbox.height),
        };

        let content = reader.page_content(page_id)?;
        let (content, compressed) = if self.compress {
            (deflate(&content)?, true)
        } else {
            (content, false)
        };

        // Everything fallible is done; only now touch the object store
        let resources = reader
            .page_attribute(page_id, b"Resources")
            .map(|res| xobject::without_backlinks(res.clone()));
        let group = reader
            .page_attribute(page_id, b"Group")
            .map(|grp| xobject::without_backlinks(grp.clone()));
        for root in resources.iter().chain(group.iter()) {
            xobject::copy_dependencies(reader, root, &mut self.objects);
        }

        let local_id = self.templates.len();
        let name = format!("{}{}", self.prefix, self.next_template_number);
        self.next_template_number += 1;

        log::debug!(
            "Imported page {} ({}) of '{}' as {} [{}x{}, rotated {}]",
            page,
            page_box,
            self.key,
            name,
            width,
            height,
            rotation
        );

        self.templates.push(FormTemplate {
            name,
            page,
            page_box,
            bbox,
            rotation,
            width,
            height,
            resources,
            group,
            content,
            compressed,
        });

        Ok(local_id)
    }

    fn template_count(&self) -> usize {
        self.templates.len()
    }

    fn export(&self, mode: IdMode) -> FormExport {
        export::export_templates(
            &self.key,
            &self.templates,
            &self.objects,
            mode,
            self.next_object_id,
        )
    }

    fn use_template(
        &self,
        local_id: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Option<Placement> {
        let tpl = self.templates.get(local_id)?;
        let (width, height) = template_size(tpl.width, tpl.height, width, height);

        Some(Placement {
            name: tpl.name.clone(),
            scale_x: width / tpl.width,
            scale_y: height / tpl.height,
            tx: x,
            ty: -y - height,
            width,
            height,
        })
    }
}

/// Resolve a requested draw size against a template's natural size.
///
/// A zero dimension is derived from the other one, keeping the aspect ratio;
/// both zero means natural size.
pub fn template_size(natural_w: f32, natural_h: f32, width: f32, height: f32) -> (f32, f32) {
    match (width == 0.0, height == 0.0) {
        (true, true) => (natural_w, natural_h),
        (true, false) => (height * natural_w / natural_h, height),
        (false, true) => (width, width * natural_h / natural_w),
        (false, false) => (width, height),
    }
}

fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
