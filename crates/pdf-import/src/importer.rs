//! Template import coordinator
//!
//! The importer keeps one reader/writer pair per source document and hands
//! out template ids that stay unique across all of them. Importing the same
//! page twice returns the first id without touching the writer again.

use crate::options::{CachePolicy, IdMode, ImportOptions};
use crate::reader::{PdfReader, Source, SourceReader};
use crate::types::*;
use crate::writer::{FormExport, PdfWriter, TemplateWriter};
use std::collections::HashMap;
use std::path::Path;

/// Hands out template ids in strictly increasing order
#[derive(Debug, Clone, Default)]
pub struct TemplateIdAllocator {
    next: u32,
}

impl TemplateIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next call to [`allocate`](Self::allocate) returns
    pub fn peek(&self) -> TemplateId {
        TemplateId(self.next)
    }

    pub fn allocate(&mut self) -> TemplateId {
        let id = TemplateId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far
    pub fn allocated(&self) -> usize {
        self.next as usize
    }
}

/// Where a template came from
#[derive(Debug, Clone, PartialEq)]
pub struct TplInfo {
    pub document: DocumentIndex,
    pub source_key: String,
    /// Id returned by the document's writer; only meaningful to that writer
    pub local_id: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PageKey {
    document: DocumentIndex,
    page: u32,
    page_box: Option<PageBoxKind>,
}

#[derive(Debug)]
struct SourceDocument<R, W> {
    key: String,
    reader: R,
    writer: W,
}

/// Coordinates page imports across any number of source documents
#[derive(Debug)]
pub struct Importer<R = PdfReader, W = PdfWriter> {
    options: ImportOptions,
    documents: Vec<SourceDocument<R, W>>,
    index: HashMap<String, DocumentIndex>,
    active: Option<DocumentIndex>,
    allocator: TemplateIdAllocator,
    templates: HashMap<TemplateId, TplInfo>,
    imported_pages: HashMap<PageKey, TemplateId>,
}

impl Importer<PdfReader, PdfWriter> {
    pub fn new() -> Self {
        Self::with_options(ImportOptions::default())
    }
}

impl Default for Importer<PdfReader, PdfWriter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> Importer<R, W>
where
    R: SourceReader,
    W: TemplateWriter<R>,
{
    /// Create an importer; call [`ImportOptions::validate`] first for user-supplied options
    pub fn with_options(options: ImportOptions) -> Self {
        Self {
            options,
            documents: Vec::new(),
            index: HashMap::new(),
            active: None,
            allocator: TemplateIdAllocator::new(),
            templates: HashMap::new(),
            imported_pages: HashMap::new(),
        }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    // =========================================================================
    // Document Registry
    // =========================================================================

    /// Bind a source document under `key` and make it the active document.
    ///
    /// The reader and writer are created on first bind only; binding a known
    /// key again just re-selects it.
    pub fn bind_source(&mut self, key: impl Into<String>, source: Source) -> Result<()> {
        let key = key.into();
        if let Some(&index) = self.index.get(&key) {
            self.active = Some(index);
            return Ok(());
        }

        let reader = R::open(&source).map_err(|source| ImportError::SourceRead {
            key: key.clone(),
            source,
        })?;
        self.bind_reader(key, reader);
        Ok(())
    }

    /// Bind an already opened reader under `key` and make it the active document.
    ///
    /// If `key` is bound already the existing pair is kept and `reader` dropped.
    pub fn bind_reader(&mut self, key: impl Into<String>, reader: R) -> DocumentIndex {
        let key = key.into();
        if let Some(&index) = self.index.get(&key) {
            self.active = Some(index);
            return index;
        }

        let mut writer = W::create(&key, &self.options);
        writer.set_template_id_offset(self.allocator.peek());

        let index = DocumentIndex(self.documents.len());
        log::info!("Bound source '{}' as document {}", key, index.0);
        self.documents.push(SourceDocument {
            key: key.clone(),
            reader,
            writer,
        });
        self.index.insert(key, index);
        self.active = Some(index);
        index
    }

    /// Bind a file, keyed by its path
    pub fn set_source_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.bind_source(path.display().to_string(), Source::File(path.to_owned()))
    }

    /// Bind in-memory PDF bytes, keyed by a fingerprint of the bytes
    pub fn set_source_stream(&mut self, bytes: Vec<u8>) -> Result<String> {
        let key = Source::stream_key(&bytes);
        self.bind_source(key.clone(), Source::Bytes(bytes))?;
        Ok(key)
    }

    pub fn active_key(&self) -> Option<&str> {
        self.active.map(|index| self.documents[index.0].key.as_str())
    }

    pub fn document_keys(&self) -> impl Iterator<Item = &str> {
        self.documents.iter().map(|doc| doc.key.as_str())
    }

    pub fn reader(&self) -> Option<&R> {
        self.active.map(|index| &self.documents[index.0].reader)
    }

    pub fn writer(&self) -> Option<&W> {
        self.active.map(|index| &self.documents[index.0].writer)
    }

    pub fn reader_for(&self, key: &str) -> Option<&R> {
        self.index.get(key).map(|index| &self.documents[index.0].reader)
    }

    pub fn writer_for(&self, key: &str) -> Option<&W> {
        self.index.get(key).map(|index| &self.documents[index.0].writer)
    }

    fn document(&self, key: &str) -> Result<&SourceDocument<R, W>> {
        self.index
            .get(key)
            .map(|index| &self.documents[index.0])
            .ok_or_else(|| ImportError::DocumentNotBound(key.to_string()))
    }

    fn active_document_key(&self) -> Result<String> {
        self.active_key()
            .map(str::to_string)
            .ok_or(ImportError::NoActiveDocument)
    }

    // =========================================================================
    // Page Metadata
    // =========================================================================

    pub fn page_count(&self, key: &str) -> Result<usize> {
        self.document(key)?
            .reader
            .page_count()
            .map_err(|source| ImportError::SourceRead {
                key: key.to_string(),
                source,
            })
    }

    /// Every page's boxes at scale 1.0
    pub fn page_sizes(&self, key: &str) -> Result<PageGeometry> {
        self.document(key)?
            .reader
            .page_boxes(1.0)
            .map_err(|source| ImportError::SourceRead {
                key: key.to_string(),
                source,
            })
    }

    // =========================================================================
    // Page Import
    // =========================================================================

    /// Import a page as a template, or return the id of an earlier import.
    ///
    /// A failed import allocates nothing and caches nothing.
    pub fn import_page(
        &mut self,
        key: &str,
        page: u32,
        page_box: PageBoxKind,
    ) -> Result<TemplateId> {
        let index = *self
            .index
            .get(key)
            .ok_or_else(|| ImportError::DocumentNotBound(key.to_string()))?;

        let cache_key = PageKey {
            document: index,
            page,
            page_box: match self.options.cache_policy {
                CachePolicy::PageAndBox => Some(page_box),
                CachePolicy::PageOnly => None,
            },
        };
        if let Some(&id) = self.imported_pages.get(&cache_key) {
            log::debug!("Page {} of '{}' already imported as template {}", page, key, id);
            return Ok(id);
        }

        let next_id = self.allocator.peek();
        let document = &mut self.documents[index.0];
        // Keep template names in step with the global id, whatever order documents were bound in
        document.writer.set_template_id_offset(next_id);
        let local_id = document
            .writer
            .import_page(&document.reader, page, page_box)
            .map_err(|source| ImportError::PageImport {
                key: key.to_string(),
                page,
                source,
            })?;

        let id = self.allocator.allocate();
        self.templates.insert(
            id,
            TplInfo {
                document: index,
                source_key: key.to_string(),
                local_id,
            },
        );
        self.imported_pages.insert(cache_key, id);
        Ok(id)
    }

    /// Import a page of the active document
    pub fn import_active_page(&mut self, page: u32, page_box: PageBoxKind) -> Result<TemplateId> {
        let key = self.active_document_key()?;
        self.import_page(&key, page, page_box)
    }

    pub fn template_info(&self, id: TemplateId) -> Option<&TplInfo> {
        self.templates.get(&id)
    }

    /// Number of templates imported across all documents
    pub fn template_count(&self) -> usize {
        self.allocator.allocated()
    }

    // =========================================================================
    // Object Export
    // =========================================================================

    /// Start sequential object numbering of a document's writer at `id`
    pub fn set_next_object_id(&mut self, key: &str, id: u32) -> Result<()> {
        if id == 0 {
            return Err(ImportError::Config("Object ids start at 1".to_string()));
        }
        let index = *self
            .index
            .get(key)
            .ok_or_else(|| ImportError::DocumentNotBound(key.to_string()))?;
        self.documents[index.0].writer.set_next_object_id(id);
        Ok(())
    }

    /// Start sequential object numbering of the active document's writer at `id`
    pub fn set_active_next_object_id(&mut self, id: u32) -> Result<()> {
        let key = self.active_document_key()?;
        self.set_next_object_id(&key, id)
    }

    /// Export a document's templates with integer object ids
    pub fn export_sequential(&self, key: &str) -> Result<FormExport> {
        Ok(self.document(key)?.writer.export(IdMode::Sequential))
    }

    /// Export a document's templates with content hash object ids
    pub fn export_hashed(&self, key: &str) -> Result<FormExport> {
        Ok(self.document(key)?.writer.export(IdMode::ContentHash))
    }

    /// Export a document's templates in the configured id mode
    pub fn export(&self, key: &str) -> Result<FormExport> {
        Ok(self.document(key)?.writer.export(self.options.id_mode))
    }

    /// Export the active document's templates in the configured id mode
    pub fn export_active(&self) -> Result<FormExport> {
        let key = self.active_document_key()?;
        self.export(&key)
    }

    // =========================================================================
    // Template Placement
    // =========================================================================

    /// Draw parameters for placing a template at (`x`, `y`), top-left origin.
    ///
    /// A zero `width` or `height` is derived from the template's aspect ratio.
    pub fn use_template(
        &self,
        id: TemplateId,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<Placement> {
        let info = self
            .templates
            .get(&id)
            .ok_or(ImportError::UnknownTemplate(id))?;
        self.documents[info.document.0]
            .writer
            .use_template(info.local_id, x, y, width, height)
            .ok_or(ImportError::UnknownTemplate(id))
    }
}
