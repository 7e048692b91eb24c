//! Renders a laid-out math tree into the enclosing cell's content stream
//! (spec.md §4.10), offsetting every glyph/line by the block's origin.

use crate::content::ContentStream;
use crate::error::Result;
use crate::fonts::{FontHandle, SessionFontRegistry};
use crate::math::layout::LaidOut;

pub fn draw_math(
    cs: &mut ContentStream,
    fonts: &mut SessionFontRegistry,
    font: FontHandle,
    laid: &LaidOut,
    origin_x: f32,
    origin_y: f32,
) -> Result<()> {
    let resource_name = fonts.resource_name(font);

    cs.save_state();
    cs.begin_text();
    for glyph in &laid.glyphs {
        if glyph.text.trim().is_empty() && glyph.text != " " {
            continue;
        }
        cs.set_font(&resource_name, glyph.size);
        cs.set_text_matrix(origin_x + glyph.x, origin_y + glyph.y, 0.0);
        cs.show_text(fonts, font, &glyph.text)?;
    }
    cs.end_text();

    for line in &laid.lines {
        cs.set_line_width(line.width);
        cs.move_to(origin_x + line.x1, origin_y + line.y1);
        cs.line_to(origin_x + line.x2, origin_y + line.y2);
        cs.stroke();
    }
    cs.restore_state();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::registry::FontRegistry;
    use crate::math::layout::{layout_node, PositionedGlyph, PositionedLine};
    use crate::math::lexer::lex;
    use crate::math::parser::parse;

    #[test]
    fn test_draw_math_emits_tj_and_stroke() {
        let registry = FontRegistry::build(&[]).unwrap();
        let mut session = registry.clone_for_generation();
        let font = session.resolve("Helvetica").unwrap();
        let ast = parse(&lex("a/b")).unwrap();
        let laid = layout_node(&ast, &mut session, font, 12.0).unwrap();
        let mut cs = ContentStream::new();
        draw_math(&mut cs, &mut session, font, &laid, 10.0, 20.0).unwrap();
        let out = String::from_utf8(cs.finish()).unwrap();
        assert!(out.contains("Tj"));
        assert!(out.contains(" S\n"));
    }

    #[test]
    fn test_draw_math_empty_layout_produces_no_ops_besides_wrap() {
        let registry = FontRegistry::build(&[]).unwrap();
        let mut session = registry.clone_for_generation();
        let font = session.resolve("Helvetica").unwrap();
        let laid = LaidOut { width: 0.0, height: 0.0, depth: 0.0, glyphs: Vec::<PositionedGlyph>::new(), lines: Vec::<PositionedLine>::new() };
        let mut cs = ContentStream::new();
        draw_math(&mut cs, &mut session, font, &laid, 0.0, 0.0).unwrap();
        let out = String::from_utf8(cs.finish()).unwrap();
        assert_eq!(out, "q\nBT\nET\nQ\n");
    }
}
