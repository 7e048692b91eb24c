//! Font lifecycle: standard Type1 metrics, TrueType embedding/subsetting,
//! per-generation glyph-usage tracking, and ToUnicode CMap generation
//! (spec.md §4.2).
//!
//! Mirrors the teacher's font-embedding shape in `headers.rs`
//! (`embed_liberation_serif`, `create_liberation_serif_widths`) but
//! generalized: the teacher hardcoded one TTF via `include_bytes!`, this
//! registry holds N fonts (standard + custom), clones cheaply per
//! generation, and tracks which codepoints were actually drawn so the
//! subsetter only embeds used glyphs.

pub mod registry;
pub mod standard;
pub mod truetype;

pub use registry::{FontRegistry, SessionFontRegistry};
pub use standard::StandardFont;

/// Opaque handle into a `FontRegistry`. Cheap to copy, stable across the
/// registry's `clone_for_generation()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontHandle(pub u32);

/// The two font lifecycles the registry manages, per §4.2.
#[derive(Debug, Clone)]
pub enum FontKind {
    Standard(StandardFont),
    Custom(truetype::TrueTypeFont),
}

/// Resolve a props/legacy font name to a canonical registry key.
///
/// - The 14 well-known Type1 names resolve directly.
/// - `font1`/`font2` are legacy aliases for Helvetica/Times-Roman (§3).
/// - Anything else is looked up against registered custom fonts by the
///   caller; this function only normalizes the standard/legacy case.
pub fn normalize_font_name(name: &str) -> Option<StandardFont> {
    match name {
        "font1" => Some(StandardFont::Helvetica),
        "font2" => Some(StandardFont::TimesRoman),
        _ => StandardFont::from_base_name(name),
    }
}
