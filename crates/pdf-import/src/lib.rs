//! Reuse pages of existing PDF documents as Form XObject templates.
//!
//! An [`Importer`] binds any number of source documents, imports pages as
//! templates with ids that are unique across all of them, and exports the
//! resulting objects either with sequential numbers or with content hashes
//! that a host renumbers after merging.

mod constants;
mod importer;
mod io;
mod options;
mod output;
mod reader;
mod types;
pub mod writer;

pub use constants::*;
pub use importer::{Importer, TemplateIdAllocator, TplInfo};
pub use io::{load_reader, read_source, write_output};
pub use options::*;
pub use output::OutputDocument;
pub use reader::{PdfReader, Source, SourceReader};
pub use types::*;
pub use writer::{FormExport, PdfWriter, TemplateWriter, template_size};
