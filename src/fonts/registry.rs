//! Process-wide font registry plus its per-generation clone, per spec.md §4.2
//! and the shared-state split in §5 (standard metrics and decoded custom TTF
//! tables are process-wide immutable state; the glyph-usage map is
//! per-generation).

use std::collections::HashMap;
use std::sync::Arc;

use lopdf::{Dictionary, Object, ObjectId};

use crate::error::{Error, Result};
use crate::object_table::ObjectTable;
use crate::template::CustomFont;

use super::truetype::{Subset, TrueTypeFont};
use super::{normalize_font_name, FontHandle, FontKind, StandardFont};

/// Immutable, process-wide: the 14 standard fonts plus every custom font
/// registered from `PDFTemplate.config.customFonts`. Safe to share across
/// concurrently-running generations via `Arc`; building a `SessionFontRegistry`
/// from it is just bumping a refcount on the `TrueTypeFont` bytes.
#[derive(Debug, Clone)]
pub struct FontRegistry {
    fonts: Arc<HashMap<FontHandle, (String, FontKind)>>,
    by_name: Arc<HashMap<String, FontHandle>>,
}

impl FontRegistry {
    /// Build a registry with the 14 standard fonts pre-registered plus any
    /// custom fonts declared in the template's config.
    pub fn build(custom: &[CustomFont]) -> Result<Self> {
        let mut fonts = HashMap::new();
        let mut by_name = HashMap::new();
        let mut next = 0u32;

        for sf in StandardFont::ALL {
            let handle = FontHandle(next);
            next += 1;
            by_name.insert(sf.base_name().to_string(), handle);
            fonts.insert(handle, (sf.base_name().to_string(), FontKind::Standard(sf)));
        }
        // Legacy aliases resolve to the same handles as their canonical name.
        if let Some(&h) = by_name.get(StandardFont::Helvetica.base_name()) {
            by_name.insert("font1".to_string(), h);
        }
        if let Some(&h) = by_name.get(StandardFont::TimesRoman.base_name()) {
            by_name.insert("font2".to_string(), h);
        }

        for cf in custom {
            let bytes = decode_font_bytes(cf)?;
            let ttf = TrueTypeFont::load(&cf.name, bytes)?;
            let handle = FontHandle(next);
            next += 1;
            by_name.insert(cf.name.clone(), handle);
            fonts.insert(handle, (cf.name.clone(), FontKind::Custom(ttf)));
        }

        Ok(FontRegistry {
            fonts: Arc::new(fonts),
            by_name: Arc::new(by_name),
        })
    }

    /// Look up a font by the name used in a `Props` string or template field.
    /// Unknown standard-ish names that aren't registered custom fonts
    /// resolve through `normalize_font_name` as a last resort so a template
    /// referencing a bare `"Helvetica-Bold"` works even without going through
    /// `by_name` (kept for forward-compat with callers constructing handles
    /// before a registry exists, e.g. in isolated tests).
    pub fn resolve(&self, name: &str) -> Option<FontHandle> {
        self.by_name
            .get(name)
            .copied()
            .or_else(|| normalize_font_name(name).and_then(|sf| self.by_name.get(sf.base_name()).copied()))
    }

    pub fn kind(&self, handle: FontHandle) -> Option<&FontKind> {
        self.fonts.get(&handle).map(|(_, k)| k)
    }

    pub fn name(&self, handle: FontHandle) -> Option<&str> {
        self.fonts.get(&handle).map(|(n, _)| n.as_str())
    }

    /// Start a new generation: clone the `Arc`s (cheap) and give it an empty
    /// glyph-usage map.
    pub fn clone_for_generation(&self) -> SessionFontRegistry {
        SessionFontRegistry {
            base: self.clone(),
            subsets: HashMap::new(),
            standard_used: HashMap::new(),
        }
    }
}

fn decode_font_bytes(cf: &CustomFont) -> Result<Vec<u8>> {
    if let Some(b64) = &cf.data_base64 {
        use base64::Engine;
        return base64::engine::general_purpose::STANDARD
            .decode(b64.trim())
            .map_err(|e| Error::TemplateInvalid(format!("customFonts[{}].dataBase64 invalid: {e}", cf.name)));
    }
    if let Some(path) = &cf.path {
        return std::fs::read(path)
            .map_err(|e| Error::TemplateInvalid(format!("customFonts[{}].path {path:?} unreadable: {e}", cf.name)));
    }
    Err(Error::TemplateInvalid(format!(
        "customFonts[{}] has neither path nor dataBase64",
        cf.name
    )))
}

/// Per-generation wrapper: tracks which glyphs of which custom font were
/// drawn, and which codepoints of which standard font were drawn (standard
/// fonts don't need subsetting, but PDF/A mode still wants a precise
/// `/FirstChar`-`/LastChar` window).
pub struct SessionFontRegistry {
    base: FontRegistry,
    subsets: HashMap<FontHandle, Subset>,
    standard_used: HashMap<FontHandle, std::collections::BTreeSet<u32>>,
}

impl SessionFontRegistry {
    pub fn resolve(&self, name: &str) -> Option<FontHandle> {
        self.base.resolve(name)
    }

    /// Resolve `name` and, if it names a standard font family, swap in the
    /// bold/italic variant a props string's style bits request. Custom
    /// fonts ignore `bold`/`italic` (no synthetic styling of embedded TTFs).
    pub fn resolve_styled(&self, name: &str, bold: bool, italic: bool) -> Option<FontHandle> {
        let handle = self.resolve(name)?;
        match self.kind(handle)? {
            FontKind::Standard(sf) => self.resolve(sf.with_style(bold, italic).base_name()),
            FontKind::Custom(_) => Some(handle),
        }
    }

    pub fn kind(&self, handle: FontHandle) -> Option<&FontKind> {
        self.base.kind(handle)
    }

    /// Record that `c` was drawn with `handle`, returning the bytes to push
    /// into the content stream's text-showing operand: 1 byte for standard
    /// fonts (WinAnsiEncoding), 2 bytes (CID) for custom TrueType fonts.
    pub fn mark_used(&mut self, handle: FontHandle, c: char) -> Result<Vec<u8>> {
        match self.base.kind(handle) {
            Some(FontKind::Standard(_)) => {
                self.standard_used.entry(handle).or_default().insert(c as u32);
                let code = winansi_encode(c);
                Ok(vec![code])
            }
            Some(FontKind::Custom(ttf)) => {
                let ttf = ttf.clone();
                let subset = self.subsets.entry(handle).or_default();
                let bytes = subset.encode(&ttf, c);
                Ok(bytes.to_vec())
            }
            None => Err(Error::UnknownFont(format!("{handle:?}"))),
        }
    }

    pub fn width_of(&self, handle: FontHandle, c: char) -> Result<u16> {
        match self.base.kind(handle) {
            Some(FontKind::Standard(sf)) => Ok(sf.width(c as u32)),
            Some(FontKind::Custom(ttf)) => Ok(ttf.advance_width(c)),
            None => Err(Error::UnknownFont(format!("{handle:?}"))),
        }
    }

    /// Deterministic resource name for `handle`, derived from the handle's
    /// stable id rather than usage order, so content-stream emission (which
    /// runs before the full set of used fonts is known) and
    /// `emit_used_fonts`'s `/Font` resource dictionary always agree.
    pub fn resource_name(&self, handle: FontHandle) -> String {
        format!("F{}", handle.0)
    }

    /// Emit every font actually used this generation into `objects`,
    /// returning a `/Font` resource-dictionary-ready map from a stable
    /// resource name (`F0`, `F1`, ...) to object id, plus the per-handle
    /// resource name so content-stream emission can look it up.
    pub fn emit_used_fonts(
        &self,
        objects: &mut ObjectTable,
    ) -> Result<(Dictionary, HashMap<FontHandle, String>)> {
        let mut resources = Dictionary::new();
        let mut names = HashMap::new();

        let mut handles: Vec<FontHandle> = self
            .standard_used
            .keys()
            .chain(self.subsets.keys())
            .copied()
            .collect();
        handles.sort_by_key(|h| h.0);
        handles.dedup();

        for handle in handles {
            let resource_name = self.resource_name(handle);
            let id = match self.base.kind(handle) {
                Some(FontKind::Standard(sf)) => emit_standard_font(objects, *sf),
                Some(FontKind::Custom(ttf)) => {
                    let subset = self.subsets.get(&handle).expect("handle came from subsets map");
                    subset.finish(ttf, objects)?
                }
                None => return Err(Error::UnknownFont(format!("{handle:?}"))),
            };
            resources.set(resource_name.as_str(), Object::Reference(id));
            names.insert(handle, resource_name);
        }

        Ok((resources, names))
    }
}

fn emit_standard_font(objects: &mut ObjectTable, sf: StandardFont) -> ObjectId {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(sf.base_name().as_bytes().to_vec()));
    if !matches!(sf, StandardFont::Symbol | StandardFont::ZapfDingbats) {
        font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
        font.set("FirstChar", Object::Integer(32));
        font.set("LastChar", Object::Integer(255));
        let widths: Vec<Object> = (32u32..=255).map(|c| Object::Integer(sf.width(c) as i64)).collect();
        font.set("Widths", Object::Array(widths));
    }
    objects.add(Object::Dictionary(font))
}

/// Maps a Unicode scalar to its WinAnsiEncoding byte, falling back to `?`
/// (0x3F) for anything outside the encoding's repertoire. Standard fonts
/// outside Latin-1 should be routed through a custom TrueType font by the
/// caller instead; this is the last-resort path.
fn winansi_encode(c: char) -> u8 {
    let cp = c as u32;
    if cp < 128 {
        cp as u8
    } else if (0xA0..=0xFF).contains(&cp) {
        cp as u8
    } else {
        match cp {
            0x20AC => 0x80, // Euro sign
            0x2018 => 0x91,
            0x2019 => 0x92,
            0x201C => 0x93,
            0x201D => 0x94,
            0x2013 => 0x96, // en dash
            0x2014 => 0x97, // em dash
            _ => b'?',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_fonts_resolve_by_name() {
        let reg = FontRegistry::build(&[]).unwrap();
        assert!(reg.resolve("Helvetica").is_some());
        assert!(reg.resolve("Times-BoldItalic").is_some());
    }

    #[test]
    fn test_legacy_aliases_resolve() {
        let reg = FontRegistry::build(&[]).unwrap();
        let font1 = reg.resolve("font1").unwrap();
        let helvetica = reg.resolve("Helvetica").unwrap();
        assert_eq!(font1, helvetica);
    }

    #[test]
    fn test_unknown_font_is_none() {
        let reg = FontRegistry::build(&[]).unwrap();
        assert!(reg.resolve("NotARealFont").is_none());
    }

    #[test]
    fn test_winansi_encode_ascii() {
        assert_eq!(winansi_encode('A'), b'A');
        assert_eq!(winansi_encode(' '), b' ');
    }

    #[test]
    fn test_winansi_encode_fallback() {
        assert_eq!(winansi_encode('\u{4e2d}'), b'?');
    }

    #[test]
    fn test_resolve_styled_picks_bold_variant() {
        let reg = FontRegistry::build(&[]).unwrap();
        let session = reg.clone_for_generation();
        let bold = session.resolve_styled("Helvetica", true, false).unwrap();
        let expected = session.resolve("Helvetica-Bold").unwrap();
        assert_eq!(bold, expected);
    }

    #[test]
    fn test_mark_used_standard_font_returns_one_byte() {
        let reg = FontRegistry::build(&[]).unwrap();
        let mut session = reg.clone_for_generation();
        let handle = session.resolve("Helvetica").unwrap();
        let bytes = session.mark_used(handle, 'A').unwrap();
        assert_eq!(bytes, vec![b'A']);
    }
}
