//! Shared constants for template import

// =============================================================================
// Default Page Dimensions
// =============================================================================

/// Default page width in points (US Letter: 8.5" × 11")
pub const DEFAULT_PAGE_WIDTH_PT: f32 = 612.0;

/// Default page height in points (US Letter)
pub const DEFAULT_PAGE_HEIGHT_PT: f32 = 792.0;

/// Default page dimensions as tuple (width, height)
pub const DEFAULT_PAGE_DIMENSIONS: (f32, f32) = (DEFAULT_PAGE_WIDTH_PT, DEFAULT_PAGE_HEIGHT_PT);

// =============================================================================
// Templates
// =============================================================================

/// Prefix of the resource names given to imported templates
pub const DEFAULT_TEMPLATE_PREFIX: &str = "TPL";

/// First object number handed out by a writer unless the host reserves a range
pub const DEFAULT_FIRST_OBJECT_ID: u32 = 1;

/// Key prefix for documents bound from in-memory bytes
pub const STREAM_KEY_PREFIX: &str = "stream:";
