use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to read source '{key}': {source}")]
    SourceRead {
        key: String,
        #[source]
        source: SourceError,
    },
    #[error("Document '{0}' is not bound")]
    DocumentNotBound(String),
    #[error("No source document selected")]
    NoActiveDocument,
    #[error("Failed to import page {page} of '{key}': {source}")]
    PageImport {
        key: String,
        page: u32,
        #[source]
        source: PageError,
    },
    #[error("Unknown template id {0}")]
    UnknownTemplate(TemplateId),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ImportError>;

/// Errors raised while opening or querying a source document
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("Malformed document: {0}")]
    Malformed(String),
}

/// Errors raised while turning a single page into a template
#[derive(Error, Debug)]
pub enum PageError {
    #[error("Page {page} out of range (document has {count} pages)")]
    OutOfRange { page: u32, count: usize },
    #[error("Malformed page: {0}")]
    Malformed(String),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Template handle, unique across every document bound to one importer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TemplateId(pub u32);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Slot of a source document in the importer's registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentIndex(pub usize);

/// Named page rectangles
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PageBoxKind {
    #[default]
    MediaBox,
    CropBox,
    BleedBox,
    TrimBox,
    ArtBox,
}

impl PageBoxKind {
    pub const ALL: [PageBoxKind; 5] = [
        PageBoxKind::MediaBox,
        PageBoxKind::CropBox,
        PageBoxKind::BleedBox,
        PageBoxKind::TrimBox,
        PageBoxKind::ArtBox,
    ];

    /// Dictionary key without the leading slash
    pub fn key(self) -> &'static [u8] {
        match self {
            PageBoxKind::MediaBox => b"MediaBox",
            PageBoxKind::CropBox => b"CropBox",
            PageBoxKind::BleedBox => b"BleedBox",
            PageBoxKind::TrimBox => b"TrimBox",
            PageBoxKind::ArtBox => b"ArtBox",
        }
    }

    /// The box used when this one is not defined on a page.
    ///
    /// Bleed, trim and art boxes default to the crop box, which in turn
    /// defaults to the media box.
    pub fn fallback(self) -> Option<PageBoxKind> {
        match self {
            PageBoxKind::MediaBox => None,
            PageBoxKind::CropBox => Some(PageBoxKind::MediaBox),
            PageBoxKind::BleedBox | PageBoxKind::TrimBox | PageBoxKind::ArtBox => {
                Some(PageBoxKind::CropBox)
            }
        }
    }
}

impl fmt::Display for PageBoxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageBoxKind::MediaBox => "/MediaBox",
            PageBoxKind::CropBox => "/CropBox",
            PageBoxKind::BleedBox => "/BleedBox",
            PageBoxKind::TrimBox => "/TrimBox",
            PageBoxKind::ArtBox => "/ArtBox",
        };
        f.write_str(name)
    }
}

impl FromStr for PageBoxKind {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().trim_start_matches('/').to_ascii_lowercase();
        match name.as_str() {
            "mediabox" | "media" => Ok(PageBoxKind::MediaBox),
            "cropbox" | "crop" => Ok(PageBoxKind::CropBox),
            "bleedbox" | "bleed" => Ok(PageBoxKind::BleedBox),
            "trimbox" | "trim" => Ok(PageBoxKind::TrimBox),
            "artbox" | "art" => Ok(PageBoxKind::ArtBox),
            _ => Err(ImportError::Config(format!("Unknown page box '{}'", s))),
        }
    }
}

/// Page rectangle, normalized so that `llx <= urx` and `lly <= ury`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl PageBox {
    /// Build a box from two opposite corners in any order
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        let (llx, urx) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let (lly, ury) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        Self {
            x: llx,
            y: lly,
            width: urx - llx,
            height: ury - lly,
            llx,
            lly,
            urx,
            ury,
        }
    }

    /// Divide every coordinate by `k` (user units per point)
    pub fn scaled(self, k: f32) -> Self {
        Self::from_corners(self.llx / k, self.lly / k, self.urx / k, self.ury / k)
    }
}

/// Page number (1-based) -> box kind -> rectangle
pub type PageGeometry = BTreeMap<u32, BTreeMap<PageBoxKind, PageBox>>;

/// Parameters for drawing a template on a page
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Resource name of the form object, without the leading slash
    pub name: String,
    pub scale_x: f32,
    pub scale_y: f32,
    pub tx: f32,
    /// Vertical translation for a top-left origin; add the page height
    pub ty: f32,
    pub width: f32,
    pub height: f32,
}

impl Placement {
    /// Content stream operators that draw the template on a page of the given height
    pub fn content_op(&self, page_height: f32) -> String {
        format!(
            "q 0 J 1 w 0 j 0 G 0 g {:.4} 0 0 {:.4} {:.4} {:.4} cm /{} Do Q\n",
            self.scale_x,
            self.scale_y,
            self.tx,
            self.ty + page_height,
            self.name
        )
    }
}

/// SHA-1 fingerprint identifying an exported object independently of numbering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash(pub [u8; 20]);

impl ContentHash {
    /// Length of the hexadecimal form embedded in object bytes
    pub const HEX_LEN: usize = 40;

    pub fn of(data: impl AsRef<[u8]>) -> Self {
        use sha1::{Digest, Sha1};
        let digest = Sha1::digest(data.as_ref());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Identifier of an exported object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectId {
    Sequential(u32),
    ContentHash(ContentHash),
}

impl ObjectId {
    pub fn as_sequential(&self) -> Option<u32> {
        match self {
            ObjectId::Sequential(n) => Some(*n),
            ObjectId::ContentHash(_) => None,
        }
    }

    pub fn as_hash(&self) -> Option<&ContentHash> {
        match self {
            ObjectId::Sequential(_) => None,
            ObjectId::ContentHash(hash) => Some(hash),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Sequential(n) => write!(f, "{}", n),
            ObjectId::ContentHash(hash) => write!(f, "{}", hash),
        }
    }
}
