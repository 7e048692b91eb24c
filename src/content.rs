//! Content-stream encoder: builds the operator sequence (`q`/`Q`, `re`,
//! `BT`/`ET`, `Tf`/`Td`/`Tj`, `Do`) a page or Form XObject's stream is made
//! of.
//!
//! The operator shapes are lifted straight from the teacher's
//! `add_headers_footers`/`generate_line_with_font_tags` (`BT\n`, `/F1 12 Tf\n`,
//! `1 0 0 1 x y Tm\n`, `(text) Tj\n`, `ET\n`), but built with `Bytes::push_num`
//! instead of `format!` so a content-heavy page doesn't allocate a `String`
//! per token, and parameterized over a `FontHandle`/resource-name lookup
//! instead of a single hardcoded `/F1`.

use crate::error::Result;
use crate::fonts::{FontHandle, SessionFontRegistry};
use crate::writer::Bytes;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);
}

pub struct ContentStream {
    buf: Bytes,
}

impl ContentStream {
    pub fn new() -> Self {
        ContentStream { buf: Bytes::with_capacity(1024) }
    }

    pub fn save_state(&mut self) -> &mut Self {
        self.buf.push_str("q\n");
        self
    }

    pub fn restore_state(&mut self) -> &mut Self {
        self.buf.push_str("Q\n");
        self
    }

    pub fn set_fill_rgb(&mut self, c: Rgb) -> &mut Self {
        self.buf.push_num(c.0);
        self.buf.push_byte(b' ');
        self.buf.push_num(c.1);
        self.buf.push_byte(b' ');
        self.buf.push_num(c.2);
        self.buf.push_str(" rg\n");
        self
    }

    pub fn set_stroke_rgb(&mut self, c: Rgb) -> &mut Self {
        self.buf.push_num(c.0);
        self.buf.push_byte(b' ');
        self.buf.push_num(c.1);
        self.buf.push_byte(b' ');
        self.buf.push_num(c.2);
        self.buf.push_str(" RG\n");
        self
    }

    pub fn set_line_width(&mut self, w: f32) -> &mut Self {
        self.buf.push_num(w);
        self.buf.push_str(" w\n");
        self
    }

    /// `x y width height re`, the PDF rectangle-append operator. Caller
    /// follows with `f`/`S`/`B` to fill/stroke/both.
    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        self.buf.push_num(x);
        self.buf.push_byte(b' ');
        self.buf.push_num(y);
        self.buf.push_byte(b' ');
        self.buf.push_num(width);
        self.buf.push_byte(b' ');
        self.buf.push_num(height);
        self.buf.push_str(" re\n");
        self
    }

    pub fn fill(&mut self) -> &mut Self {
        self.buf.push_str("f\n");
        self
    }

    pub fn stroke(&mut self) -> &mut Self {
        self.buf.push_str("S\n");
        self
    }

    pub fn fill_and_stroke(&mut self) -> &mut Self {
        self.buf.push_str("B\n");
        self
    }

    pub fn move_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.buf.push_num(x);
        self.buf.push_byte(b' ');
        self.buf.push_num(y);
        self.buf.push_str(" m\n");
        self
    }

    pub fn line_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.buf.push_num(x);
        self.buf.push_byte(b' ');
        self.buf.push_num(y);
        self.buf.push_str(" l\n");
        self
    }

    pub fn begin_text(&mut self) -> &mut Self {
        self.buf.push_str("BT\n");
        self
    }

    pub fn end_text(&mut self) -> &mut Self {
        self.buf.push_str("ET\n");
        self
    }

    /// `/text_render_mode` per PDF 32000-1 Table 106: 0 fill, 1 stroke, 2
    /// fill+stroke (the teacher's bold-simulation trick), 3 invisible.
    pub fn set_text_render_mode(&mut self, mode: u8) -> &mut Self {
        self.buf.push_int(mode as i64);
        self.buf.push_str(" Tr\n");
        self
    }

    pub fn set_font(&mut self, resource_name: &str, size: f32) -> &mut Self {
        self.buf.push_byte(b'/');
        self.buf.push_str(resource_name);
        self.buf.push_byte(b' ');
        self.buf.push_num(size);
        self.buf.push_str(" Tf\n");
        self
    }

    /// `a b c d e f Tm`, the text matrix. `shear` is the teacher's synthetic
    /// italic slant (`1 0 shear 1 x y Tm`); pass `0.0` for upright text.
    pub fn set_text_matrix(&mut self, x: f32, y: f32, shear: f32) -> &mut Self {
        self.buf.push_str("1 0 ");
        self.buf.push_num(shear);
        self.buf.push_str(" 1 ");
        self.buf.push_num(x);
        self.buf.push_byte(b' ');
        self.buf.push_num(y);
        self.buf.push_str(" Tm\n");
        self
    }

    pub fn set_char_spacing(&mut self, spacing: f32) -> &mut Self {
        self.buf.push_num(spacing);
        self.buf.push_str(" Tc\n");
        self
    }

    /// Encode `text` with `font` (marking glyph usage on `fonts` as it goes)
    /// and emit a `Tj` showing it. Standard fonts emit one byte per char;
    /// custom TrueType fonts emit the 2-byte CID per char, so the literal
    /// string's parens must still escape raw `(`/`)`/`\` bytes before PDF
    /// string-escaping a 2-byte CID stream, which this does not need since
    /// CID bytes never collide with ASCII paren/backslash by construction of
    /// `WinAnsiEncoding`/`Identity-H` — but characters 0x28/0x29/0x5C in a
    /// single-byte encoded string still must be escaped, so a raw byte path
    /// is used instead of `escape_pdf_string`'s str-based replace.
    pub fn show_text(
        &mut self,
        fonts: &mut SessionFontRegistry,
        font: FontHandle,
        text: &str,
    ) -> Result<()> {
        let mut encoded = Vec::with_capacity(text.len() * 2);
        for c in text.chars() {
            let bytes = fonts.mark_used(font, c)?;
            for b in bytes {
                if b == b'(' || b == b')' || b == b'\\' {
                    encoded.push(b'\\');
                }
                encoded.push(b);
            }
        }
        self.buf.push_byte(b'(');
        self.buf.push_bytes(&encoded);
        self.buf.push_str(") Tj\n");
        Ok(())
    }

    /// Draw a previously-registered XObject (image or Form) at the current
    /// CTM, scaled to `width`x`height` and positioned at `(x, y)`.
    pub fn draw_xobject(&mut self, resource_name: &str, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        self.save_state();
        self.buf.push_num(width);
        self.buf.push_str(" 0 0 ");
        self.buf.push_num(height);
        self.buf.push_byte(b' ');
        self.buf.push_num(x);
        self.buf.push_byte(b' ');
        self.buf.push_num(y);
        self.buf.push_str(" cm\n/");
        self.buf.push_str(resource_name);
        self.buf.push_str(" Do\n");
        self.restore_state();
        self
    }

    /// `/Artifact BMC ... EMC` marked content, used to wrap watermarks and
    /// decorative borders so a tagged reader skips them.
    pub fn begin_artifact(&mut self) -> &mut Self {
        self.buf.push_str("/Artifact BMC\n");
        self
    }

    pub fn end_marked_content(&mut self) -> &mut Self {
        self.buf.push_str("EMC\n");
        self
    }

    pub fn raw(&mut self, op: &str) -> &mut Self {
        self.buf.push_str(op);
        self.buf.push_byte(b'\n');
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf.into_vec()
    }
}

impl Default for ContentStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::registry::FontRegistry;

    #[test]
    fn test_rect_emits_re() {
        let mut cs = ContentStream::new();
        cs.rect(10.0, 20.0, 100.0, 50.0);
        let out = String::from_utf8(cs.finish()).unwrap();
        assert_eq!(out, "10.00 20.00 100.00 50.00 re\n");
    }

    #[test]
    fn test_show_text_escapes_parens() {
        let registry = FontRegistry::build(&[]).unwrap();
        let mut session = registry.clone_for_generation();
        let handle = session.resolve("Helvetica").unwrap();
        let mut cs = ContentStream::new();
        cs.show_text(&mut session, handle, "(hi)").unwrap();
        let out = String::from_utf8(cs.finish()).unwrap();
        assert_eq!(out, "(\\(hi\\)) Tj\n");
    }

    #[test]
    fn test_text_matrix_and_font() {
        let mut cs = ContentStream::new();
        cs.begin_text().set_font("F0", 12.0).set_text_matrix(50.0, 700.0, 0.0).end_text();
        let out = String::from_utf8(cs.finish()).unwrap();
        assert_eq!(out, "BT\n/F0 12.00 Tf\n1 0 0.00 1 50.00 700.00 Tm\nET\n");
    }
}
