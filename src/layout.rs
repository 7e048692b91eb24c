//! Page layout: page geometry, column-width distribution, text wrapping and
//! row-height resolution (spec.md §4.4).
//!
//! Text measurement replaces the teacher's flat `estimate_text_width`
//! (`text.len() * font_size * 0.48`, a single hardcoded average for
//! Liberation Serif) with a real per-glyph sum against whichever font a cell
//! actually uses, now that the font registry exposes real metrics.

use crate::fonts::{FontHandle, SessionFontRegistry};

pub const BASE_ROW_HEIGHT: f32 = 25.0;
const CELL_PADDING: f32 = 2.0;
const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Explicit hard line breaks a cell's text may contain, beyond plain
/// word-wrapping. Mirrors the teacher's `parse_multiline_text` token list.
const HARD_BREAKS: &[&str] = &["\n", "[br]", "[BR]", "<br>", "<BR>", "<br/>", "<BR/>", "<br />", "<BR />"];

pub fn split_hard_breaks(text: &str) -> Vec<String> {
    let mut parts = vec![text.to_string()];
    for token in HARD_BREAKS {
        parts = parts
            .into_iter()
            .flat_map(|p| p.split(token).map(str::to_string).collect::<Vec<_>>())
            .collect();
    }
    parts
}

/// Mutable per-page cursor and fixed geometry. `cursor_y` descends from
/// `height - top_margin` as content is emitted.
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub left_margin: f32,
    pub right_margin: f32,
    pub top_margin: f32,
    pub bottom_margin: f32,
    pub cursor_y: f32,
}

impl PageGeometry {
    pub fn new(width: f32, height: f32, left: f32, right: f32, top: f32, bottom: f32) -> Self {
        PageGeometry {
            width,
            height,
            left_margin: left,
            right_margin: right,
            top_margin: top,
            bottom_margin: bottom,
            cursor_y: height - top,
        }
    }

    pub fn usable_width(&self, page_border_left: f32, page_border_right: f32) -> f32 {
        self.width - self.left_margin - self.right_margin - page_border_left - page_border_right
    }

    pub fn reset_cursor(&mut self) {
        self.cursor_y = self.height - self.top_margin;
    }

    /// Whether a block of `needed_height` fits before `bottom_margin +
    /// footer_reserve`.
    pub fn fits(&self, needed_height: f32, footer_reserve: f32) -> bool {
        self.cursor_y - needed_height >= self.bottom_margin + footer_reserve
    }

    pub fn available_height(&self, footer_reserve: f32) -> f32 {
        (self.cursor_y - self.bottom_margin - footer_reserve).max(0.0)
    }

    pub fn advance(&mut self, height: f32) {
        self.cursor_y -= height;
    }
}

/// Distribute `usable_width` across `n` columns. If `explicit` is given (and
/// its length matches `n`), its values are normalized to sum to
/// `usable_width`; otherwise columns are split evenly.
pub fn distribute_column_widths(usable_width: f32, explicit: Option<&[f32]>, n: usize) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }
    match explicit {
        Some(widths) if widths.len() == n => {
            let total: f32 = widths.iter().sum();
            if total <= 0.0 {
                vec![usable_width / n as f32; n]
            } else {
                widths.iter().map(|w| w / total * usable_width).collect()
            }
        }
        _ => vec![usable_width / n as f32; n],
    }
}

/// Word-wrap `text` to fit within `max_width` points, measuring against
/// `font` at `size` through the session registry. Falls back to
/// character-splitting any single token wider than the column.
pub fn wrap_text(
    fonts: &SessionFontRegistry,
    font: FontHandle,
    size: f32,
    text: &str,
    max_width: f32,
) -> Vec<String> {
    let avail = (max_width - 2.0 * CELL_PADDING).max(1.0);
    let mut lines = Vec::new();

    for hard_line in split_hard_breaks(text) {
        if hard_line.is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        let mut current_width = 0.0f32;

        for word in hard_line.split(' ') {
            let word_width = measure(fonts, font, size, word);
            if word_width > avail {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0.0;
                }
                for piece in char_split(fonts, font, size, word, avail) {
                    lines.push(piece);
                }
                continue;
            }
            let space_width = if current.is_empty() { 0.0 } else { measure(fonts, font, size, " ") };
            if current_width + space_width + word_width > avail && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0.0;
            }
            if !current.is_empty() {
                current.push(' ');
                current_width += space_width;
            }
            current.push_str(word);
            current_width += word_width;
        }
        lines.push(current);
    }
    lines
}

fn char_split(fonts: &SessionFontRegistry, font: FontHandle, size: f32, word: &str, avail: f32) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut width = 0.0f32;
    for c in word.chars() {
        let w = fonts.width_of(font, c).unwrap_or(500) as f32 / 1000.0 * size;
        if width + w > avail && !current.is_empty() {
            out.push(std::mem::take(&mut current));
            width = 0.0;
        }
        current.push(c);
        width += w;
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

pub fn measure(fonts: &SessionFontRegistry, font: FontHandle, size: f32, text: &str) -> f32 {
    text.chars()
        .map(|c| fonts.width_of(font, c).unwrap_or(500) as f32 / 1000.0 * size)
        .sum()
}

pub fn line_height(font_size: f32) -> f32 {
    font_size * LINE_HEIGHT_FACTOR
}

/// Required height for a wrapped text block: `lines * line_height + 2 *
/// padding`, per spec.md §4.4 step 2.
pub fn wrapped_block_height(line_count: usize, font_size: f32) -> f32 {
    line_count as f32 * line_height(font_size) + 2.0 * CELL_PADDING
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::registry::FontRegistry;

    fn session() -> (FontRegistry, FontHandle) {
        let reg = FontRegistry::build(&[]).unwrap();
        let handle = reg.resolve("Helvetica").unwrap();
        (reg, handle)
    }

    #[test]
    fn test_distribute_even() {
        let widths = distribute_column_widths(300.0, None, 3);
        assert_eq!(widths, vec![100.0, 100.0, 100.0]);
    }

    #[test]
    fn test_distribute_explicit_normalizes() {
        let widths = distribute_column_widths(300.0, Some(&[1.0, 2.0]), 2);
        assert!((widths[0] - 100.0).abs() < 0.01);
        assert!((widths[1] - 200.0).abs() < 0.01);
    }

    #[test]
    fn test_page_geometry_fits() {
        let geo = PageGeometry::new(595.0, 842.0, 36.0, 36.0, 36.0, 36.0);
        assert!(geo.fits(20.0, 0.0));
        assert!(!geo.fits(10000.0, 0.0));
    }

    #[test]
    fn test_wrap_text_splits_on_width() {
        let (reg, handle) = session();
        let session = reg.clone_for_generation();
        let lines = wrap_text(&session, handle, 12.0, "the quick brown fox jumps", 60.0);
        assert!(lines.len() > 1);
    }

    #[test]
    fn test_wrap_text_respects_hard_breaks() {
        let (reg, handle) = session();
        let session = reg.clone_for_generation();
        let lines = wrap_text(&session, handle, 12.0, "line one\nline two", 500.0);
        assert_eq!(lines, vec!["line one".to_string(), "line two".to_string()]);
    }

    #[test]
    fn test_wrapped_block_height() {
        assert_eq!(wrapped_block_height(3, 10.0), 3.0 * 12.0 + 4.0);
    }
}
