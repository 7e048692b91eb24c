//! Layout engine: walks the math AST computing `{width, height, depth}`
//! per node and produces a flat list of positioned glyphs/lines relative
//! to the block's origin (spec.md §4.10).

use crate::error::Result;
use crate::fonts::{FontHandle, SessionFontRegistry};
use crate::math::parser::Node;

const SUPERSCRIPT_RAISE: f32 = 0.4;
const SUPERSCRIPT_SCALE: f32 = 0.65;
const SUBSCRIPT_DROP: f32 = 0.25;
const SUBSCRIPT_SCALE: f32 = 0.65;
const FRACTION_BAR_HEIGHT: f32 = 0.35;
const FRACTION_SCALE: f32 = 0.85;
const FRACTION_BAR_THICKNESS: f32 = 0.5;
const SQRT_SCALE: f32 = 1.1;

/// A glyph ready to draw: a unicode string in one font/size at an
/// (x, y) offset from the block origin.
#[derive(Debug, Clone)]
pub struct PositionedGlyph {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

/// A line segment (bar, bracket stroke, radical overline) drawn instead
/// of a glyph, per §4.10's "brackets drawn as thin line segments" rule.
#[derive(Debug, Clone)]
pub struct PositionedLine {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub width: f32,
}

#[derive(Debug, Clone)]
pub struct LaidOut {
    pub width: f32,
    pub height: f32, // extent above the baseline
    pub depth: f32,  // extent below the baseline
    pub glyphs: Vec<PositionedGlyph>,
    pub lines: Vec<PositionedLine>,
}

impl LaidOut {
    fn empty() -> Self {
        LaidOut { width: 0.0, height: 0.0, depth: 0.0, glyphs: Vec::new(), lines: Vec::new() }
    }

    /// Shift every glyph/line by `(dx, dy)`, leaving width/height/depth
    /// untouched (those are relative to the node's own baseline).
    fn translate(mut self, dx: f32, dy: f32) -> Self {
        for g in &mut self.glyphs {
            g.x += dx;
            g.y += dy;
        }
        for l in &mut self.lines {
            l.x1 += dx;
            l.y1 += dy;
            l.x2 += dx;
            l.y2 += dy;
        }
        self
    }
}

fn symbol_glyph(name: &str) -> &str {
    match name {
        "pi" => "\u{03C0}",
        "alpha" => "\u{03B1}",
        "beta" => "\u{03B2}",
        "gamma" => "\u{03B3}",
        "delta" => "\u{03B4}",
        "theta" => "\u{03B8}",
        "lambda" => "\u{03BB}",
        "mu" => "\u{03BC}",
        "sigma" => "\u{03C3}",
        "phi" => "\u{03C6}",
        "omega" => "\u{03C9}",
        "Delta" => "\u{0394}",
        "Sigma" => "\u{03A3}",
        "Omega" => "\u{03A9}",
        "infinity" => "\u{221E}",
        "sum" => "\u{2211}",
        "prod" => "\u{220F}",
        "int" => "\u{222B}",
        "union" => "\u{222A}",
        "sect" => "\u{2229}",
        "arrow.r" => "\u{2192}",
        "arrow.l" => "\u{2190}",
        "arrow.l.r" => "\u{2194}",
        "NN" => "\u{2115}",
        "RR" => "\u{211D}",
        "ZZ" => "\u{2124}",
        "QQ" => "\u{211A}",
        "CC" => "\u{2102}",
        "times" => "\u{00D7}",
        "dot" => "\u{22C5}",
        "approx" => "\u{2248}",
        "neq" => "\u{2260}",
        "leq" => "\u{2264}",
        "geq" => "\u{2265}",
        "in" => "\u{2208}",
        other => other, // unknown symbol: render literally (§4.10 edge case)
    }
}

fn measure_str(text: &str, fonts: &SessionFontRegistry, font: FontHandle, size: f32) -> f32 {
    text.chars()
        .map(|c| fonts.width_of(font, c).unwrap_or(500) as f32 / 1000.0 * size)
        .sum()
}

fn layout_glyph_run(
    text: &str,
    fonts: &SessionFontRegistry,
    font: FontHandle,
    size: f32,
) -> LaidOut {
    let width = measure_str(text, fonts, font, size);
    LaidOut {
        width,
        height: size * 0.7,
        depth: size * 0.2,
        glyphs: vec![PositionedGlyph { text: text.to_string(), x: 0.0, y: 0.0, size }],
        lines: Vec::new(),
    }
}

pub fn layout_node(
    node: &Node,
    fonts: &mut SessionFontRegistry,
    font: FontHandle,
    size: f32,
) -> Result<LaidOut> {
    Ok(match node {
        Node::Literal(s) | Node::QuotedText(s) => layout_glyph_run(s, fonts, font, size),
        Node::Symbol(name) => layout_glyph_run(symbol_glyph(name), fonts, font, size),
        Node::Operator(op) => {
            let padded = format!(" {op} ");
            layout_glyph_run(&padded, fonts, font, size)
        }
        Node::Op(name) => layout_glyph_run(symbol_glyph(name), fonts, font, size * 1.2),

        Node::Sequence(items) => {
            let mut out = LaidOut::empty();
            let mut cursor_x = 0.0f32;
            for item in items {
                let laid = layout_node(item, fonts, font, size)?.translate(cursor_x, 0.0);
                out.height = out.height.max(laid.height);
                out.depth = out.depth.max(laid.depth);
                cursor_x += laid.width;
                out.glyphs.extend(laid.glyphs);
                out.lines.extend(laid.lines);
            }
            out.width = cursor_x;
            out
        }

        Node::Group(inner) | Node::Style(_, inner) | Node::Variant(_, inner) | Node::Class(_, inner) => {
            layout_node(inner, fonts, font, size)?
        }

        Node::Size(factor, inner) => {
            let scale: f32 = factor.parse().unwrap_or(1.0);
            layout_node(inner, fonts, font, size * scale)?
        }

        Node::Stretch(inner) => layout_node(inner, fonts, font, size)?,

        Node::Superscript(base, exp) => {
            let base_laid = layout_node(base, fonts, font, size)?;
            let exp_laid = layout_node(exp, fonts, font, size * SUPERSCRIPT_SCALE)?
                .translate(base_laid.width, size * SUPERSCRIPT_RAISE);
            let mut out = LaidOut::empty();
            out.width = base_laid.width + exp_laid.width;
            out.height = base_laid.height.max(size * SUPERSCRIPT_RAISE + exp_laid.height);
            out.depth = base_laid.depth.max(exp_laid.depth);
            out.glyphs.extend(base_laid.glyphs);
            out.glyphs.extend(exp_laid.glyphs);
            out.lines.extend(base_laid.lines);
            out.lines.extend(exp_laid.lines);
            out
        }

        Node::Subscript(base, sub) => {
            let base_laid = layout_node(base, fonts, font, size)?;
            let sub_laid = layout_node(sub, fonts, font, size * SUBSCRIPT_SCALE)?
                .translate(base_laid.width, -(size * SUBSCRIPT_DROP));
            let mut out = LaidOut::empty();
            out.width = base_laid.width + sub_laid.width;
            out.height = base_laid.height;
            out.depth = base_laid.depth.max(size * SUBSCRIPT_DROP + sub_laid.depth);
            out.glyphs.extend(base_laid.glyphs);
            out.glyphs.extend(sub_laid.glyphs);
            out.lines.extend(base_laid.lines);
            out.lines.extend(sub_laid.lines);
            out
        }

        Node::UnderOver(base, under, over) => {
            let base_laid = layout_node(base, fonts, font, size)?;
            let mut out = base_laid.clone();
            if let Some(over) = over {
                let over_laid = layout_node(over, fonts, font, size * SUPERSCRIPT_SCALE)?;
                let dx = (out.width - over_laid.width) / 2.0;
                let over_laid = over_laid.translate(dx, out.height + size * 0.1);
                out.height += size * 0.1 + over_laid.height;
                out.width = out.width.max(over_laid.width);
                out.glyphs.extend(over_laid.glyphs);
                out.lines.extend(over_laid.lines);
            }
            if let Some(under) = under {
                let under_laid = layout_node(under, fonts, font, size * SUPERSCRIPT_SCALE)?;
                let dx = (out.width - under_laid.width) / 2.0;
                let shift = -(out.depth + size * 0.1 + under_laid.height);
                let under_laid = under_laid.translate(dx, shift);
                out.depth += size * 0.1 + under_laid.height + under_laid.depth;
                out.width = out.width.max(under_laid.width);
                out.glyphs.extend(under_laid.glyphs);
                out.lines.extend(under_laid.lines);
            }
            out
        }

        Node::Fraction(num, den) => {
            let num_laid = layout_node(num, fonts, font, size * FRACTION_SCALE)?;
            let den_laid = layout_node(den, fonts, font, size * FRACTION_SCALE)?;
            let width = num_laid.width.max(den_laid.width) + size * 0.2;
            let bar_y = size * FRACTION_BAR_HEIGHT;
            let num_dx = (width - num_laid.width) / 2.0;
            let den_dx = (width - den_laid.width) / 2.0;
            let num_laid = num_laid.translate(num_dx, bar_y + size * 0.1);
            let den_laid = den_laid.translate(den_dx, -(bar_y + size * 0.1));
            let mut out = LaidOut::empty();
            out.width = width;
            out.height = bar_y + size * 0.1 + num_laid.height;
            out.depth = bar_y + size * 0.1 + den_laid.depth.abs() + den_laid.height.max(0.0);
            out.glyphs.extend(num_laid.glyphs);
            out.glyphs.extend(den_laid.glyphs);
            out.lines.extend(num_laid.lines);
            out.lines.extend(den_laid.lines);
            out.lines.push(PositionedLine { x1: 0.0, y1: bar_y, x2: width, y2: bar_y, width: FRACTION_BAR_THICKNESS });
            out
        }

        Node::Binom(top, bottom) => {
            let inner = Node::Fraction(top.clone(), bottom.clone());
            let mut laid = layout_node(&inner, fonts, font, size)?;
            laid.lines.clear(); // binomial coefficients have no bar
            layout_paren_wrap(laid, size)
        }

        Node::Sqrt(radicand) => {
            let inner = layout_node(radicand, fonts, font, size)?;
            let pad = size * 0.3;
            let radical = layout_glyph_run("\u{221A}", fonts, font, size * SQRT_SCALE);
            let inner = inner.translate(radical.width, 0.0);
            let mut out = LaidOut::empty();
            out.width = radical.width + inner.width + pad * 0.2;
            out.height = inner.height.max(radical.height) + size * 0.15;
            out.depth = inner.depth;
            out.glyphs.extend(radical.glyphs);
            out.glyphs.extend(inner.glyphs);
            out.lines.extend(inner.lines);
            out.lines.push(PositionedLine {
                x1: radical.width,
                y1: out.height,
                x2: out.width,
                y2: out.height,
                width: 0.5,
            });
            out
        }

        Node::Root(index, radicand) => {
            let sqrt_laid = layout_node(&Node::Sqrt(radicand.clone()), fonts, font, size)?;
            let index_laid = layout_node(index, fonts, font, size * SUBSCRIPT_SCALE)?
                .translate(0.0, sqrt_laid.height * 0.3);
            let mut out = sqrt_laid.translate(index_laid.width * 0.7, 0.0);
            out.width += index_laid.width * 0.7;
            out.glyphs.extend(index_laid.glyphs);
            out
        }

        Node::Accent(base, kind) => {
            let base_laid = layout_node(base, fonts, font, size)?;
            let glyph = match kind.as_str() {
                "hat" => "\u{0302}",
                "tilde" => "\u{0303}",
                "bar" | "overline" => "\u{0304}",
                "dot" => "\u{0307}",
                "ddot" => "\u{0308}",
                "vec" => "\u{20D7}",
                _ => "",
            };
            let mut out = base_laid.clone();
            if !glyph.is_empty() {
                let accent_laid = layout_glyph_run(glyph, fonts, font, size * 0.8)
                    .translate((out.width - size * 0.4) / 2.0, out.height * 0.15);
                out.height += size * 0.15;
                out.glyphs.extend(accent_laid.glyphs);
            }
            out
        }

        Node::Cancel(inner) => {
            let laid = layout_node(inner, fonts, font, size)?;
            let mut out = laid.clone();
            out.lines.push(PositionedLine { x1: 0.0, y1: -laid.depth, x2: laid.width, y2: laid.height, width: 0.5 });
            out
        }

        Node::Func(name, arg) => {
            let name_laid = layout_glyph_run(name, fonts, font, size);
            let arg_laid = layout_node(arg, fonts, font, size)?.translate(name_laid.width + size * 0.1, 0.0);
            let mut out = LaidOut::empty();
            out.width = name_laid.width + size * 0.1 + arg_laid.width;
            out.height = name_laid.height.max(arg_laid.height);
            out.depth = name_laid.depth.max(arg_laid.depth);
            out.glyphs.extend(name_laid.glyphs);
            out.glyphs.extend(arg_laid.glyphs);
            out.lines.extend(arg_laid.lines);
            out
        }

        Node::Prime(base, count) => {
            let base_laid = layout_node(base, fonts, font, size)?;
            let marks = "\u{2032}".repeat(*count as usize);
            let prime_laid = layout_glyph_run(&marks, fonts, font, size * SUPERSCRIPT_SCALE)
                .translate(base_laid.width, size * SUPERSCRIPT_RAISE);
            let mut out = base_laid.clone();
            out.width += prime_laid.width;
            out.height = out.height.max(prime_laid.height + size * SUPERSCRIPT_RAISE);
            out.glyphs.extend(prime_laid.glyphs);
            out
        }

        Node::LR(open, close, inner) => {
            let inner_laid = layout_node(inner, fonts, font, size)?;
            layout_bracket_wrap(inner_laid, *open, *close, size)
        }

        Node::Vector(items) => {
            let laid_items: Result<Vec<LaidOut>> =
                items.iter().map(|n| layout_node(n, fonts, font, size)).collect();
            layout_column(laid_items?, size)
        }

        Node::Matrix(rows) => {
            let mut laid_rows = Vec::with_capacity(rows.len());
            for row in rows {
                let laid: Result<Vec<LaidOut>> =
                    row.iter().map(|n| layout_node(n, fonts, font, size)).collect();
                laid_rows.push(laid?);
            }
            layout_grid(laid_rows, size)
        }

        Node::Cases(items) => {
            let laid_items: Result<Vec<LaidOut>> =
                items.iter().map(|n| layout_node(n, fonts, font, size)).collect();
            let col = layout_column(laid_items?, size);
            layout_brace_wrap(col, size)
        }

        Node::LineBreak | Node::Align => LaidOut::empty(),
    })
}

fn layout_paren_wrap(inner: LaidOut, size: f32) -> LaidOut {
    layout_bracket_wrap(inner, '(', ')', size)
}

/// Brackets are drawn as line segments sized to the content, per §4.10,
/// rather than scaled parenthesis glyphs.
fn layout_bracket_wrap(inner: LaidOut, _open: char, _close: char, size: f32) -> LaidOut {
    let pad = size * 0.3;
    let total_height = inner.height + inner.depth;
    let inner = inner.translate(pad, 0.0);
    let mut out = LaidOut::empty();
    out.width = inner.width + pad * 2.0;
    out.height = inner.height;
    out.depth = inner.depth;
    out.glyphs.extend(inner.glyphs);
    out.lines.extend(inner.lines);
    // Left bracket: vertical stroke plus short serifs top/bottom.
    out.lines.push(PositionedLine { x1: pad * 0.4, y1: -inner.depth, x2: pad * 0.4, y2: total_height - inner.depth, width: 0.8 });
    out.lines.push(PositionedLine { x1: out.width - pad * 0.4, y1: -inner.depth, x2: out.width - pad * 0.4, y2: total_height - inner.depth, width: 0.8 });
    out
}

fn layout_brace_wrap(inner: LaidOut, size: f32) -> LaidOut {
    let pad = size * 0.3;
    let inner = inner.translate(pad, 0.0);
    let mut out = LaidOut::empty();
    out.width = inner.width + pad;
    out.height = inner.height;
    out.depth = inner.depth;
    out.glyphs.extend(inner.glyphs);
    out.lines.extend(inner.lines);
    out.lines.push(PositionedLine { x1: pad * 0.3, y1: -inner.depth, x2: pad * 0.3, y2: inner.height, width: 0.8 });
    out
}

/// Stack laid-out items vertically, centered, each separated by one line
/// of vertical whitespace (used for `vec(...)`/`cases(...)`).
fn layout_column(items: Vec<LaidOut>, size: f32) -> LaidOut {
    let gap = size * 0.3;
    let max_width = items.iter().map(|i| i.width).fold(0.0f32, f32::max);
    let mut out = LaidOut::empty();
    let total_rows = items.len();
    let mut y = 0.0f32;
    for (i, rows) in items.into_iter().enumerate().rev() {
        let dx = (max_width - rows.width) / 2.0;
        let shifted = rows.translate(dx, y);
        out.glyphs.extend(shifted.glyphs);
        out.lines.extend(shifted.lines);
        if i == total_rows - 1 {
            out.depth = shifted.depth - y;
        }
        y += shifted.height + shifted.depth + gap;
    }
    out.width = max_width;
    out.height = y - gap + out.depth;
    out
}

/// Lay out a matrix as an aligned grid, uniform column widths, centered
/// per §4.10's "cells inferred to a square grid when possible" rule.
fn layout_grid(rows: Vec<Vec<LaidOut>>, size: f32) -> LaidOut {
    let col_count = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut col_widths = vec![0.0f32; col_count];
    for row in &rows {
        for (c, cell) in row.iter().enumerate() {
            col_widths[c] = col_widths[c].max(cell.width);
        }
    }
    let col_gap = size * 0.6;
    let row_gap = size * 0.5;
    let total_width: f32 = col_widths.iter().sum::<f32>() + col_gap * (col_count.max(1) - 1) as f32;

    let mut out = LaidOut::empty();
    let row_count = rows.len();
    let mut y = 0.0f32;
    for (ri, row) in rows.into_iter().enumerate().rev() {
        let mut x = 0.0f32;
        let mut row_height = 0.0f32;
        let mut row_depth = 0.0f32;
        for (c, cell) in row.into_iter().enumerate() {
            let dx = x + (col_widths[c] - cell.width) / 2.0;
            let shifted = cell.translate(dx, y);
            row_height = row_height.max(shifted.height);
            row_depth = row_depth.max(shifted.depth);
            out.glyphs.extend(shifted.glyphs);
            out.lines.extend(shifted.lines);
            x += col_widths[c] + col_gap;
        }
        if ri == row_count - 1 {
            out.depth = row_depth;
        }
        y += row_height + row_depth + row_gap;
    }
    out.width = total_width;
    out.height = (y - row_gap + out.depth).max(0.0);
    layout_bracket_wrap(out, '[', ']', size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::registry::FontRegistry;
    use crate::math::lexer::lex;
    use crate::math::parser::parse;

    fn session() -> (crate::fonts::SessionFontRegistry, FontHandle) {
        let registry = FontRegistry::build(&[]).unwrap();
        let mut session = registry.clone_for_generation();
        let handle = session.resolve("Helvetica").unwrap();
        (session, handle)
    }

    #[test]
    fn test_layout_literal_has_positive_width() {
        let (mut fonts, font) = session();
        let ast = parse(&lex("abc")).unwrap();
        let laid = layout_node(&ast, &mut fonts, font, 12.0).unwrap();
        assert!(laid.width > 0.0);
    }

    #[test]
    fn test_superscript_raises_and_scales() {
        let (mut fonts, font) = session();
        let ast = parse(&lex("r^2")).unwrap();
        let laid = layout_node(&ast, &mut fonts, font, 12.0).unwrap();
        let exp_glyph = laid.glyphs.iter().find(|g| g.text == "2").unwrap();
        assert!((exp_glyph.y - 12.0 * SUPERSCRIPT_RAISE).abs() < 0.01);
        assert!((exp_glyph.size - 12.0 * SUPERSCRIPT_SCALE).abs() < 0.01);
    }

    #[test]
    fn test_fraction_emits_bar_line() {
        let (mut fonts, font) = session();
        let ast = parse(&lex("a/b")).unwrap();
        let laid = layout_node(&ast, &mut fonts, font, 12.0).unwrap();
        assert_eq!(laid.lines.len(), 1);
        assert_eq!(laid.lines[0].y1, laid.lines[0].y2);
    }

    #[test]
    fn test_unknown_symbol_renders_as_literal_name() {
        let (mut fonts, font) = session();
        let ast = parse(&lex("zeta")).unwrap();
        let laid = layout_node(&ast, &mut fonts, font, 12.0).unwrap();
        assert_eq!(laid.glyphs[0].text, "zeta");
    }
}
