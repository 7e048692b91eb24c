//! Math Sub-engine: a small Typst-style lexer/parser/layout/draw pipeline
//! for `$ ... $`-delimited cell text (spec.md §4.10).
//!
//! Mirrors the rest of the engine's stage shape (tokens → tree → measured
//! tree → content-stream ops) rather than reaching for a full TeX engine;
//! the supported node set is the one spec.md §4.10 names, nothing more.

pub mod draw;
pub mod layout;
pub mod lexer;
pub mod parser;

pub use draw::draw_math;
pub use layout::{layout_node, LaidOut};
pub use lexer::{lex, Token};
pub use parser::{parse, Node};

/// Render `source` (without the surrounding `$ $`) into the content stream
/// at `(origin_x, origin_y)` using `font_size`, returning the advanced
/// width so the caller can continue laying out text after the math block.
pub fn render_inline(
    cs: &mut crate::content::ContentStream,
    fonts: &mut crate::fonts::SessionFontRegistry,
    font: crate::fonts::FontHandle,
    source: &str,
    origin_x: f32,
    origin_y: f32,
    font_size: f32,
) -> crate::error::Result<f32> {
    let tokens = lex(source);
    let ast = parse(&tokens)?;
    let laid = layout_node(&ast, fonts, font, font_size)?;
    draw_math(cs, fonts, font, &laid, origin_x, origin_y)?;
    Ok(laid.width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::registry::FontRegistry;

    #[test]
    fn test_render_inline_simple() {
        let registry = FontRegistry::build(&[]).unwrap();
        let mut session = registry.clone_for_generation();
        let handle = session.resolve("Helvetica").unwrap();
        let mut cs = crate::content::ContentStream::new();
        let width = render_inline(&mut cs, &mut session, handle, "A = pi r^2", 0.0, 0.0, 12.0).unwrap();
        assert!(width > 0.0);
        let bytes = cs.finish();
        assert!(!bytes.is_empty());
    }
}
