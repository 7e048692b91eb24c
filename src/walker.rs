//! Template Walker: traverses a parsed `PDFTemplate`'s title/elements/footer
//! top-to-bottom, laying out rows and cells against `PageGeometry` and
//! emitting content-stream operators page by page (spec.md §4.4-§4.8,
//! §4.10).
//!
//! Mirrors the teacher's single top-to-bottom fill loop in
//! `add_headers_footers`, generalized from a fixed header/footer shape to
//! arbitrary tables/spacers/images with pagination, form widgets, links,
//! bookmarked destinations and inline math.
//!
//! Widgets and links name a page object id that doesn't exist yet (page
//! count isn't known until every element has been walked), so this module
//! only queues them as `PendingField`/`PendingLink` and lets the driver
//! resolve them once page ids are reserved.

use std::collections::HashMap;

use lopdf::ObjectId;

use crate::content::{ContentStream, Rgb};
use crate::error::{Error, Result};
use crate::fonts::{FontHandle, SessionFontRegistry};
use crate::images::ImageCache;
use crate::layout::{self, PageGeometry};
use crate::math;
use crate::object_table::ObjectTable;
use crate::outline::DestinationTable;
use crate::page_manager::{PageManager, PAGE_MARKER};
use crate::props::{Align, Props};
use crate::template::{Cell, Config, Element, FormField, ImageRef, Orientation, PDFTemplate, Row, Table, Title};

/// Where a queued link points, before the destination table is known to be
/// complete. `Dest` is resolved against `DestinationTable` by the driver;
/// a name with no matching destination is dropped rather than erroring,
/// since `PDFTemplate::known_dests` only tells us a name was *declared*,
/// not that the element that defines it already walked.
pub enum PendingTarget {
    Uri(String),
    Dest(String),
}

pub struct PendingLink {
    pub page_index: usize,
    pub rect: [f32; 4],
    pub target: PendingTarget,
}

pub struct PendingField {
    pub page_index: usize,
    pub rect: [f32; 4],
    pub field: FormField,
}

/// Everything the walk produced that the driver still has to turn into
/// objects: queued widgets/links, and the image XObjects actually drawn
/// (named the same way `SessionFontRegistry::resource_name` names fonts, so
/// a document-wide `/XObject` resource dict can be built once).
pub struct WalkOutput {
    pub pending_fields: Vec<PendingField>,
    pub pending_links: Vec<PendingLink>,
    pub image_resources: Vec<(String, ObjectId)>,
}

fn hex_to_rgb(s: &str) -> Option<Rgb> {
    let s = s.trim().trim_start_matches('#');
    if s.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&s[0..2], 16).ok()? as f32 / 255.0;
    let g = u8::from_str_radix(&s[2..4], 16).ok()? as f32 / 255.0;
    let b = u8::from_str_radix(&s[4..6], 16).ok()? as f32 / 255.0;
    Some(Rgb(r, g, b))
}

/// `$...$`-delimited (or `cell.math`-forced) text, with the delimiters
/// stripped. The whole cell is one math expression; inline mixing of prose
/// and math within a single cell isn't supported, matching the node set
/// `math::parser::Node` covers.
fn math_source(cell: &Cell) -> Option<&str> {
    let text = cell.text.as_deref()?;
    let t = text.trim();
    if cell.math {
        return Some(strip_dollars(t));
    }
    if t.len() >= 2 && t.starts_with('$') && t.ends_with('$') {
        return Some(&t[1..t.len() - 1]);
    }
    None
}

fn strip_dollars(t: &str) -> &str {
    if t.len() >= 2 && t.starts_with('$') && t.ends_with('$') {
        &t[1..t.len() - 1]
    } else {
        t
    }
}

/// Footer's `font` string is a shorter `font:size:style3:align` prefix (no
/// border fields, unlike `Props`), so it gets its own lenient split instead
/// of going through `Props::parse`'s strict 8-field check.
fn parse_footer_font(s: &str) -> Result<(String, u8, bool, bool, bool, Align)> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() < 4 {
        return Err(Error::TemplateInvalid(format!(
            "footer font {s:?} must have at least font:size:style3:align"
        )));
    }
    let font = parts[0].to_string();
    let size: u8 = parts[1]
        .parse()
        .map_err(|_| Error::TemplateInvalid(format!("invalid footer font size in {s:?}")))?;
    let style3 = parts[2].as_bytes();
    let bold = style3.first() == Some(&b'1');
    let italic = style3.get(1) == Some(&b'1');
    let underline = style3.get(2) == Some(&b'1');
    let align = match parts[3] {
        "left" => Align::Left,
        "right" => Align::Right,
        _ => Align::Center,
    };
    Ok((font, size, bold, italic, underline, align))
}

pub struct Walker<'a> {
    objects: &'a mut ObjectTable,
    fonts: &'a mut SessionFontRegistry,
    images: &'a mut ImageCache,
    pages: &'a mut PageManager,
    dests: &'a mut DestinationTable,
    config: &'a Config,
    geo: PageGeometry,
    footer: Option<crate::template::Footer>,
    footer_reserve: f32,
    image_names: HashMap<ObjectId, String>,
    pending_fields: Vec<PendingField>,
    pending_links: Vec<PendingLink>,
}

impl<'a> Walker<'a> {
    pub fn new(
        objects: &'a mut ObjectTable,
        fonts: &'a mut SessionFontRegistry,
        images: &'a mut ImageCache,
        pages: &'a mut PageManager,
        dests: &'a mut DestinationTable,
        config: &'a Config,
    ) -> Self {
        let (raw_w, raw_h) = config.page.dimensions();
        let (width, height) = match config.orientation {
            Orientation::Portrait => (raw_w, raw_h),
            Orientation::Landscape => (raw_h, raw_w),
        };
        let geo = PageGeometry::new(
            width,
            height,
            config.margins.left,
            config.margins.right,
            config.margins.top,
            config.margins.bottom,
        );
        Walker {
            objects,
            fonts,
            images,
            pages,
            dests,
            config,
            geo,
            footer: None,
            footer_reserve: 0.0,
            image_names: HashMap::new(),
            pending_fields: Vec::new(),
            pending_links: Vec::new(),
        }
    }

    pub fn walk(&mut self, tmpl: &PDFTemplate) -> Result<WalkOutput> {
        self.footer = tmpl.footer.clone();
        self.footer_reserve = self.compute_footer_reserve()?;

        self.start_page()?;
        if let Some(title) = &tmpl.title {
            self.walk_title(title)?;
            self.geo.advance(10.0);
        }
        for el in tmpl.elements.iter().flatten() {
            self.walk_element(el)?;
        }
        self.emit_footers()?;
        self.emit_page_numbers()?;

        Ok(WalkOutput {
            pending_fields: std::mem::take(&mut self.pending_fields),
            pending_links: std::mem::take(&mut self.pending_links),
            image_resources: self.image_names.iter().map(|(id, name)| (name.clone(), *id)).collect(),
        })
    }

    fn usable_width(&self) -> f32 {
        self.geo.usable_width(self.config.page_border.left, self.config.page_border.right)
    }

    fn content_x(&self) -> f32 {
        self.geo.left_margin + self.config.page_border.left
    }

    fn resolve_font(&self, props: &Props) -> Result<FontHandle> {
        self.fonts
            .resolve_styled(&props.font, props.bold, props.italic)
            .ok_or_else(|| Error::UnknownFont(props.font.clone()))
    }

    fn compute_footer_reserve(&self) -> Result<f32> {
        match &self.footer {
            Some(f) if !f.text.is_empty() || f.link.is_some() => {
                let (_, size, ..) = parse_footer_font(f.font.as_deref().unwrap_or("font1:9:000:center"))?;
                Ok(layout::wrapped_block_height(1, size as f32) + 6.0)
            }
            _ => Ok(0.0),
        }
    }

    fn ensure_space(&mut self, needed: f32) -> Result<()> {
        if self.geo.fits(needed, self.footer_reserve) {
            return Ok(());
        }
        self.start_page()?;
        if !self.geo.fits(needed, self.footer_reserve) {
            return Err(Error::Overflow);
        }
        Ok(())
    }

    fn start_page(&mut self) -> Result<usize> {
        let idx = self.pages.new_page();
        self.geo.reset_cursor();
        self.draw_watermark(idx)?;
        self.draw_page_border(idx);
        Ok(idx)
    }

    fn draw_page_border(&mut self, idx: usize) {
        let pb = &self.config.page_border;
        if pb.left <= 0.0 && pb.right <= 0.0 && pb.top <= 0.0 && pb.bottom <= 0.0 {
            return;
        }
        let m = &self.config.margins;
        let (x0, x1) = (m.left, self.geo.width - m.right);
        let (y0, y1) = (m.bottom, self.geo.height - m.top);
        let mut cs = ContentStream::new();
        if self.config.tagged {
            cs.begin_artifact();
        }
        cs.save_state();
        cs.set_stroke_rgb(Rgb::BLACK);
        if pb.left > 0.0 {
            cs.set_line_width(pb.left);
            cs.move_to(x0, y0);
            cs.line_to(x0, y1);
            cs.stroke();
        }
        if pb.right > 0.0 {
            cs.set_line_width(pb.right);
            cs.move_to(x1, y0);
            cs.line_to(x1, y1);
            cs.stroke();
        }
        if pb.top > 0.0 {
            cs.set_line_width(pb.top);
            cs.move_to(x0, y1);
            cs.line_to(x1, y1);
            cs.stroke();
        }
        if pb.bottom > 0.0 {
            cs.set_line_width(pb.bottom);
            cs.move_to(x0, y0);
            cs.line_to(x1, y0);
            cs.stroke();
        }
        cs.restore_state();
        if self.config.tagged {
            cs.end_marked_content();
        }
        self.pages.stream_at(idx).push_bytes(&cs.finish());
    }

    fn draw_watermark(&mut self, idx: usize) -> Result<()> {
        let Some(wm) = self.config.watermark.clone() else { return Ok(()) };
        let Some(font) = self.fonts.resolve("Helvetica") else { return Ok(()) };
        let gray = 1.0 - wm.opacity.clamp(0.0, 1.0);
        let width = layout::measure(self.fonts, font, wm.size, &wm.text);
        let cx = self.geo.width / 2.0;
        let cy = self.geo.height / 2.0;
        let rad = wm.rotation.to_radians();
        let (cos, sin) = (rad.cos(), rad.sin());
        let ox = -width / 2.0;

        let mut cs = ContentStream::new();
        if self.config.tagged {
            cs.begin_artifact();
        }
        cs.save_state();
        cs.set_fill_rgb(Rgb(gray, gray, gray));
        cs.begin_text();
        cs.set_font(&self.fonts.resource_name(font), wm.size);
        cs.raw(&format!(
            "{:.4} {:.4} {:.4} {:.4} {:.2} {:.2} Tm",
            cos,
            sin,
            -sin,
            cos,
            cx + ox * cos,
            cy + ox * sin
        ));
        cs.show_text(self.fonts, font, &wm.text)?;
        cs.end_text();
        cs.restore_state();
        if self.config.tagged {
            cs.end_marked_content();
        }
        self.pages.stream_at(idx).push_bytes(&cs.finish());
        Ok(())
    }

    fn walk_title(&mut self, title: &Title) -> Result<()> {
        match title {
            Title::Table(table) => self.walk_table(table),
            Title::Text(tb) => {
                let props = Props::parse(&tb.props)?;
                let font = self.resolve_font(&props)?;
                let width = self.usable_width();
                let lines = layout::wrap_text(self.fonts, font, props.size as f32, &tb.text, width);
                let height = layout::wrapped_block_height(lines.len().max(1), props.size as f32);
                self.ensure_space(height)?;
                let top_y = self.geo.cursor_y;
                let x = self.content_x();
                self.draw_wrapped_text(&lines, font, &props, x, top_y, width, None)?;
                self.geo.advance(height);
                Ok(())
            }
        }
    }

    fn walk_element(&mut self, el: &Element) -> Result<()> {
        match el {
            Element::Table { table } => self.walk_table(table),
            Element::Spacer { spacer } => {
                self.ensure_space(spacer.height)?;
                self.geo.advance(spacer.height);
                Ok(())
            }
            Element::Image { image } => {
                self.ensure_space(image.height)?;
                let top_y = self.geo.cursor_y;
                let x = self.content_x();
                self.draw_image(image, x, top_y - image.height, image.width, image.height)?;
                self.geo.advance(image.height);
                Ok(())
            }
        }
    }

    fn walk_table(&mut self, table: &Table) -> Result<()> {
        let widths = layout::distribute_column_widths(self.usable_width(), table.columnwidths.as_deref(), table.maxcolumns);
        for row in &table.rows {
            self.walk_row(row, &widths)?;
        }
        Ok(())
    }

    fn walk_row(&mut self, row: &Row, widths: &[f32]) -> Result<()> {
        if let Some(h) = row.height {
            self.ensure_space(h)?;
            let page_index = self.pages.current_index();
            let top_y = self.geo.cursor_y;
            let mut x = self.content_x();
            for (cell, &w) in row.row.iter().zip(widths.iter()) {
                self.draw_cell(cell, x, top_y, w, h, page_index, true, true)?;
                x += w;
            }
            self.geo.advance(h);
            return Ok(());
        }

        let full_page_avail = self.geo.height - self.config.margins.top - self.config.margins.bottom - self.footer_reserve;
        let mut max_h = layout::BASE_ROW_HEIGHT;
        let mut split_idx = None;
        for (i, (cell, &w)) in row.row.iter().zip(widths.iter()).enumerate() {
            let h = self.cell_content_height(cell, w)?;
            if cell.wrap && h > full_page_avail {
                split_idx = Some(i);
            }
            max_h = max_h.max(h);
        }

        if let Some(idx) = split_idx {
            return self.walk_split_row(row, widths, idx);
        }

        self.ensure_space(max_h)?;
        let page_index = self.pages.current_index();
        let top_y = self.geo.cursor_y;
        let mut x = self.content_x();
        for (cell, &w) in row.row.iter().zip(widths.iter()) {
            self.draw_cell(cell, x, top_y, w, max_h, page_index, true, true)?;
            x += w;
        }
        self.geo.advance(max_h);
        Ok(())
    }

    /// Splits the one oversized `wrap=true` cell across as many pages as its
    /// wrapped lines need, per spec.md §4.4: the row's bottom border is
    /// suppressed on every page but the last ("continued"), its top border
    /// on every page but the first. Other cells in the row draw their full
    /// content on the first page only and contribute borders-only rectangles
    /// on continuation pages, to preserve the row's rectangle.
    fn walk_split_row(&mut self, row: &Row, widths: &[f32], split_idx: usize) -> Result<()> {
        let cell = &row.row[split_idx];
        let props = Props::parse(&cell.props)?;
        let font = self.resolve_font(&props)?;
        let width = widths[split_idx];
        let text = cell.text.as_deref().unwrap_or("");
        let size = props.size as f32;
        let lines = layout::wrap_text(self.fonts, font, size, text, width);
        let lh = layout::line_height(size);

        let mut offset = 0usize;
        let mut first_chunk = true;
        loop {
            self.start_page()?;
            let avail = self.geo.available_height(self.footer_reserve);
            let max_lines = ((avail - 4.0) / lh).floor().max(1.0) as usize;
            let take = (lines.len() - offset).min(max_lines);
            let chunk = &lines[offset..offset + take];
            offset += take;
            let is_last = offset >= lines.len();
            let chunk_height = (chunk.len().max(1) as f32) * lh + 4.0;

            let page_index = self.pages.current_index();
            let top_y = self.geo.cursor_y;
            let mut x = self.content_x();
            for (i, (c, &w)) in row.row.iter().zip(widths.iter()).enumerate() {
                if i == split_idx {
                    self.draw_cell_text_chunk(c, &props, font, chunk, x, top_y, w, chunk_height, first_chunk, is_last);
                } else if first_chunk {
                    self.draw_cell(c, x, top_y, w, chunk_height, page_index, first_chunk, is_last)?;
                } else {
                    self.draw_cell_borders(&Props::parse(&c.props)?, x, top_y - chunk_height, w, chunk_height, first_chunk, is_last);
                }
                x += w;
            }
            self.geo.advance(chunk_height);
            first_chunk = false;
            if is_last {
                break;
            }
        }
        Ok(())
    }

    /// Draws one page's worth of a split cell's pre-wrapped lines plus its
    /// borders, with top/bottom suppressed per `draw_top`/`draw_bottom`.
    fn draw_cell_text_chunk(
        &mut self,
        cell: &Cell,
        props: &Props,
        font: FontHandle,
        chunk: &[String],
        x: f32,
        top_y: f32,
        width: f32,
        height: f32,
        draw_top: bool,
        draw_bottom: bool,
    ) {
        let bottom_y = top_y - height;
        if let Some(rgb) = cell.bgcolor.as_deref().and_then(hex_to_rgb) {
            let mut cs = ContentStream::new();
            cs.save_state();
            cs.set_fill_rgb(rgb);
            cs.rect(x, bottom_y, width, height);
            cs.fill();
            cs.restore_state();
            self.pages.current_stream().push_bytes(&cs.finish());
        }
        self.draw_cell_borders(props, x, bottom_y, width, height, draw_top, draw_bottom);
        let color = cell.textcolor.as_deref().and_then(hex_to_rgb);
        if !chunk.is_empty() {
            let _ = self.draw_wrapped_text(chunk, font, props, x + 2.0, top_y - 2.0, (width - 4.0).max(1.0), color);
        }
    }

    fn cell_content_height(&mut self, cell: &Cell, width: f32) -> Result<f32> {
        if let Some(img) = &cell.image {
            return Ok(img.height);
        }
        let props = Props::parse(&cell.props)?;
        let font = self.resolve_font(&props)?;
        if let Some(src) = math_source(cell) {
            let tokens = math::lex(src);
            let ast = math::parse(&tokens)?;
            let laid = math::layout_node(&ast, self.fonts, font, props.size as f32)?;
            return Ok(laid.height + laid.depth + 4.0);
        }
        if let Some(text) = &cell.text {
            let lines = layout::wrap_text(self.fonts, font, props.size as f32, text, width);
            return Ok(layout::wrapped_block_height(lines.len().max(1), props.size as f32));
        }
        Ok(0.0)
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_cell(
        &mut self,
        cell: &Cell,
        x: f32,
        top_y: f32,
        width: f32,
        height: f32,
        page_index: usize,
        draw_top: bool,
        draw_bottom: bool,
    ) -> Result<()> {
        let props = Props::parse(&cell.props)?;
        let font = self.resolve_font(&props)?;
        let bottom_y = top_y - height;

        if let Some(rgb) = cell.bgcolor.as_deref().and_then(hex_to_rgb) {
            let mut cs = ContentStream::new();
            cs.save_state();
            cs.set_fill_rgb(rgb);
            cs.rect(x, bottom_y, width, height);
            cs.fill();
            cs.restore_state();
            self.pages.current_stream().push_bytes(&cs.finish());
        }

        self.draw_cell_borders(&props, x, bottom_y, width, height, draw_top, draw_bottom);

        if let Some(img) = &cell.image {
            self.draw_image(img, x, bottom_y, width, height)?;
        } else if let Some(src) = math_source(cell) {
            let size = props.size as f32;
            let origin_x = x + 2.0;
            let origin_y = bottom_y + height / 2.0 - size * 0.3;
            let mut cs = ContentStream::new();
            math::render_inline(&mut cs, self.fonts, font, src, origin_x, origin_y, size)?;
            self.pages.current_stream().push_bytes(&cs.finish());
        } else if let Some(text) = &cell.text {
            let color = cell.textcolor.as_deref().and_then(hex_to_rgb);
            let lines = layout::wrap_text(self.fonts, font, props.size as f32, text, width);
            self.draw_wrapped_text(&lines, font, &props, x + 2.0, top_y - 2.0, (width - 4.0).max(1.0), color)?;
        }

        if let Some(checked) = cell.chequebox {
            self.draw_checkbox_mark(x, bottom_y, width, height, checked);
        }

        if let Some(field) = &cell.form_field {
            self.pending_fields.push(PendingField {
                page_index,
                rect: [x, bottom_y, x + width, top_y],
                field: field.clone(),
            });
        }

        if let Some(dest) = &cell.dest {
            self.dests.record(dest.clone(), page_index, top_y);
        }

        if let Some(link) = &cell.link {
            let target = match link.strip_prefix('#') {
                Some(name) => PendingTarget::Dest(name.to_string()),
                None => PendingTarget::Uri(link.clone()),
            };
            self.pending_links.push(PendingLink {
                page_index,
                rect: [x, bottom_y, x + width, top_y],
                target,
            });
        }

        Ok(())
    }

    fn draw_cell_borders(&mut self, props: &Props, x: f32, bottom_y: f32, width: f32, height: f32, draw_top: bool, draw_bottom: bool) {
        if props.borders == [0, 0, 0, 0] {
            return;
        }
        let top_y = bottom_y + height;
        let mut cs = ContentStream::new();
        cs.save_state();
        cs.set_stroke_rgb(Rgb::BLACK);
        if props.left_border() > 0 {
            cs.set_line_width(props.left_border() as f32);
            cs.move_to(x, bottom_y);
            cs.line_to(x, top_y);
            cs.stroke();
        }
        if props.right_border() > 0 {
            cs.set_line_width(props.right_border() as f32);
            cs.move_to(x + width, bottom_y);
            cs.line_to(x + width, top_y);
            cs.stroke();
        }
        if draw_top && props.top_border() > 0 {
            cs.set_line_width(props.top_border() as f32);
            cs.move_to(x, top_y);
            cs.line_to(x + width, top_y);
            cs.stroke();
        }
        if draw_bottom && props.bottom_border() > 0 {
            cs.set_line_width(props.bottom_border() as f32);
            cs.move_to(x, bottom_y);
            cs.line_to(x + width, bottom_y);
            cs.stroke();
        }
        cs.restore_state();
        self.pages.current_stream().push_bytes(&cs.finish());
    }

    fn draw_checkbox_mark(&mut self, x: f32, bottom_y: f32, width: f32, height: f32, checked: bool) {
        let size = height.min(width).min(12.0);
        if size <= 0.0 {
            return;
        }
        let bx = x + 2.0;
        let by = bottom_y + (height - size) / 2.0;
        let mut cs = ContentStream::new();
        cs.save_state();
        cs.set_stroke_rgb(Rgb::BLACK);
        cs.set_line_width(0.75);
        cs.rect(bx, by, size, size);
        cs.stroke();
        if checked {
            cs.move_to(bx + 1.0, by + 1.0);
            cs.line_to(bx + size - 1.0, by + size - 1.0);
            cs.stroke();
            cs.move_to(bx + size - 1.0, by + 1.0);
            cs.line_to(bx + 1.0, by + size - 1.0);
            cs.stroke();
        }
        cs.restore_state();
        self.pages.current_stream().push_bytes(&cs.finish());
    }

    fn draw_image(&mut self, img: &ImageRef, x: f32, bottom_y: f32, width: f32, height: f32) -> Result<()> {
        let bytes = load_image_bytes(img)?;
        let (id, _w, _h) = self.images.intern(&bytes, self.objects)?;
        let name = self.image_names.entry(id).or_insert_with(|| format!("Im{}", id.0)).clone();
        let mut cs = ContentStream::new();
        cs.draw_xobject(&name, x, bottom_y, width, height);
        self.pages.current_stream().push_bytes(&cs.finish());
        Ok(())
    }

    /// Draws `lines` left/center/right-aligned inside a box starting at
    /// `(x, top_y)` with the given `width`, descending one `line_height`
    /// per line. `color` overrides the default black fill.
    fn draw_wrapped_text(
        &mut self,
        lines: &[String],
        font: FontHandle,
        props: &Props,
        x: f32,
        top_y: f32,
        width: f32,
        color: Option<Rgb>,
    ) -> Result<()> {
        let size = props.size as f32;
        let resource_name = self.fonts.resource_name(font);
        let mut cs = ContentStream::new();
        cs.save_state();
        if let Some(c) = color {
            cs.set_fill_rgb(c);
        }
        cs.begin_text();
        cs.set_font(&resource_name, size);
        let mut underline_segments = Vec::new();
        let mut y = top_y - size;
        for line in lines {
            let line_width = layout::measure(self.fonts, font, size, line);
            let tx = match props.align {
                Align::Left => x,
                Align::Center => x + ((width - line_width) / 2.0).max(0.0),
                Align::Right => x + (width - line_width).max(0.0),
            };
            cs.set_text_matrix(tx, y, 0.0);
            cs.show_text(self.fonts, font, line)?;
            if props.underline {
                underline_segments.push((tx, y - 1.5, tx + line_width));
            }
            y -= layout::line_height(size);
        }
        cs.end_text();
        for (x1, uy, x2) in underline_segments {
            cs.set_line_width(0.5);
            cs.move_to(x1, uy);
            cs.line_to(x2, uy);
            cs.stroke();
        }
        cs.restore_state();
        self.pages.current_stream().push_bytes(&cs.finish());
        Ok(())
    }

    /// Draws the footer text (with `{page}` replaced by the backpatch
    /// marker) and its optional link on every page, including ones created
    /// after this is called would be impossible — this runs last, once
    /// pagination is final.
    fn emit_footers(&mut self) -> Result<()> {
        let Some(footer) = self.footer.clone() else { return Ok(()) };
        if footer.text.is_empty() && footer.link.is_none() {
            return Ok(());
        }
        let (font_name, size, bold, italic, underline, align) =
            parse_footer_font(footer.font.as_deref().unwrap_or("font1:9:000:center"))?;
        let font = self
            .fonts
            .resolve_styled(&font_name, bold, italic)
            .ok_or_else(|| Error::UnknownFont(font_name))?;
        let size = size as f32;
        let text = if footer.text.contains("{page}") {
            footer.text.replace("{page}", PAGE_MARKER)
        } else {
            footer.text.clone()
        };
        let page_count = self.pages.page_count();
        let width = self.usable_width();
        let x = self.content_x();
        let y = (self.config.margins.bottom - size * 1.2).max(4.0);

        for page_index in 0..page_count {
            if !text.is_empty() {
                let line_width = layout::measure(self.fonts, font, size, &text);
                let tx = match align {
                    Align::Left => x,
                    Align::Center => x + ((width - line_width) / 2.0).max(0.0),
                    Align::Right => x + (width - line_width).max(0.0),
                };
                let resource_name = self.fonts.resource_name(font);
                let mut cs = ContentStream::new();
                cs.save_state();
                cs.begin_text();
                cs.set_font(&resource_name, size);
                cs.set_text_matrix(tx, y, 0.0);
                cs.show_text(self.fonts, font, &text)?;
                cs.end_text();
                if underline {
                    cs.set_line_width(0.5);
                    cs.move_to(tx, y - 1.5);
                    cs.line_to(tx + line_width, y - 1.5);
                    cs.stroke();
                }
                cs.restore_state();
                self.pages.stream_at(page_index).push_bytes(&cs.finish());
            }

            if let Some(link) = &footer.link {
                let link_width = layout::measure(self.fonts, font, size, &link.text);
                let lx = x + ((width - link_width) / 2.0).max(0.0);
                let ly = y + size * 1.3;
                let resource_name = self.fonts.resource_name(font);
                let mut cs = ContentStream::new();
                cs.save_state();
                cs.begin_text();
                cs.set_font(&resource_name, size);
                cs.set_text_matrix(lx, ly, 0.0);
                cs.show_text(self.fonts, font, &link.text)?;
                cs.end_text();
                cs.restore_state();
                self.pages.stream_at(page_index).push_bytes(&cs.finish());

                self.pending_links.push(PendingLink {
                    page_index,
                    rect: [lx, ly - 2.0, lx + link_width, ly + size],
                    target: PendingTarget::Uri(link.href.clone()),
                });
            }
        }
        Ok(())
    }

    /// "Page numbers appended to bottom-right automatically" (spec.md §3):
    /// unlike the footer text/link above, this runs unconditionally on every
    /// page regardless of whether a footer is configured or whether its text
    /// opts into `{page}` substitution.
    fn emit_page_numbers(&mut self) -> Result<()> {
        let size = 8.0f32;
        let font = self
            .fonts
            .resolve_styled("Helvetica", false, false)
            .ok_or_else(|| Error::UnknownFont("Helvetica".to_string()))?;
        let resource_name = self.fonts.resource_name(font);
        let page_count = self.pages.page_count();
        let right = self.content_x() + self.usable_width();
        let y = (self.config.margins.bottom - size * 1.2).max(4.0);
        let marker_width = layout::measure(self.fonts, font, size, PAGE_MARKER);
        let tx = (right - marker_width).max(self.content_x());

        for page_index in 0..page_count {
            let mut cs = ContentStream::new();
            cs.save_state();
            cs.begin_text();
            cs.set_font(&resource_name, size);
            cs.set_text_matrix(tx, y, 0.0);
            cs.show_text(self.fonts, font, PAGE_MARKER)?;
            cs.end_text();
            cs.restore_state();
            self.pages.stream_at(page_index).push_bytes(&cs.finish());
        }
        Ok(())
    }
}

fn load_image_bytes(img: &ImageRef) -> Result<Vec<u8>> {
    if let Some(b64) = &img.data_base64 {
        use base64::Engine;
        return base64::engine::general_purpose::STANDARD
            .decode(b64.trim())
            .map_err(|e| Error::ImageDecode(format!("invalid base64: {e}")));
    }
    if let Some(path) = &img.path {
        return std::fs::read(path).map_err(|e| Error::ImageDecode(format!("{path}: {e}")));
    }
    Err(Error::TemplateInvalid("image has neither path nor dataBase64".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontRegistry;

    fn one_pixel_png_base64() -> String {
        use base64::Engine;
        let img = image::RgbImage::from_pixel(1, 1, image::Rgb([10, 20, 30]));
        let mut buf = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buf);
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, image::ImageFormat::Png)
            .unwrap();
        base64::engine::general_purpose::STANDARD.encode(buf)
    }

    fn walk(json: &str) -> (WalkOutput, PageManager) {
        let tmpl = PDFTemplate::parse(json).unwrap();
        let mut objects = ObjectTable::new();
        let registry = FontRegistry::build(&tmpl.config.custom_fonts).unwrap();
        let mut fonts = registry.clone_for_generation();
        let mut images = ImageCache::new();
        let mut pages = PageManager::new();
        let mut dests = DestinationTable::new();
        let output = {
            let mut walker = Walker::new(&mut objects, &mut fonts, &mut images, &mut pages, &mut dests, &tmpl.config);
            walker.walk(&tmpl).unwrap()
        };
        (output, pages)
    }

    #[test]
    fn test_minimal_template_produces_one_page() {
        let json = r#"{
            "config": {"page": "A4"},
            "title": {"props": "font1:18:100:center:0:0:0:0", "text": "Hello"},
            "elements": []
        }"#;
        let (_out, pages) = walk(json);
        assert_eq!(pages.page_count(), 1);
        assert!(!pages.pages()[0].content.is_empty());
    }

    #[test]
    fn test_table_cell_emits_show_text() {
        let json = r#"{
            "elements": [{"type": "table", "table": {
                "maxcolumns": 1,
                "rows": [{"row": [{"props": "font1:12:000:left:0:0:0:0", "text": "cell text"}]}]
            }}]
        }"#;
        let (_out, pages) = walk(json);
        let text = String::from_utf8_lossy(pages.pages()[0].content.as_slice()).into_owned();
        assert!(text.contains("Tj"));
    }

    #[test]
    fn test_spacer_advances_cursor_without_content() {
        let json = r#"{"elements": [{"type": "spacer", "spacer": {"height": 50}}]}"#;
        let (_out, _pages) = walk(json);
    }

    #[test]
    fn test_large_spacer_forces_new_page() {
        let json = r#"{"elements": [
            {"type": "spacer", "spacer": {"height": 10}},
            {"type": "spacer", "spacer": {"height": 900}},
            {"type": "table", "table": {"maxcolumns": 1, "rows": [
                {"row": [{"props": "font1:12:000:left:0:0:0:0", "text": "after overflow"}]}
            ]}}
        ]}"#;
        let (_out, pages) = walk(json);
        assert!(pages.page_count() >= 2);
    }

    #[test]
    fn test_math_cell_renders_without_error() {
        let json = r#"{
            "elements": [{"type": "table", "table": {
                "maxcolumns": 1,
                "rows": [{"row": [{"props": "font1:14:000:center:0:0:0:0", "text": "$A = pi r^2$"}]}]
            }}]
        }"#;
        let (_out, pages) = walk(json);
        let text = String::from_utf8_lossy(pages.pages()[0].content.as_slice()).into_owned();
        assert!(text.contains("Tj"));
    }

    #[test]
    fn test_form_field_is_queued_pending() {
        let json = r#"{
            "elements": [{"type": "table", "table": {
                "maxcolumns": 1,
                "rows": [{"row": [{
                    "props": "font1:12:000:left:0:0:0:0",
                    "formField": {"name": "signer", "kind": "text"}
                }]}]
            }}]
        }"#;
        let (out, _pages) = walk(json);
        assert_eq!(out.pending_fields.len(), 1);
        assert_eq!(out.pending_fields[0].field.name, "signer");
    }

    #[test]
    fn test_internal_link_is_queued_as_pending_dest() {
        let json = r#"{
            "elements": [{"type": "table", "table": {
                "maxcolumns": 1,
                "rows": [{"row": [{
                    "props": "font1:12:000:left:0:0:0:0",
                    "text": "jump",
                    "link": "#intro"
                }]}]
            }}]
        }"#;
        let (out, _pages) = walk(json);
        assert_eq!(out.pending_links.len(), 1);
        assert!(matches!(&out.pending_links[0].target, PendingTarget::Dest(name) if name == "intro"));
    }

    #[test]
    fn test_dest_cell_registers_destination() {
        let json = r#"{
            "elements": [{"type": "table", "table": {
                "maxcolumns": 1,
                "rows": [{"row": [{
                    "props": "font1:12:000:left:0:0:0:0",
                    "text": "anchor",
                    "dest": "intro"
                }]}]
            }}]
        }"#;
        let tmpl = PDFTemplate::parse(json).unwrap();
        let mut objects = ObjectTable::new();
        let registry = FontRegistry::build(&[]).unwrap();
        let mut fonts = registry.clone_for_generation();
        let mut images = ImageCache::new();
        let mut pages = PageManager::new();
        let mut dests = DestinationTable::new();
        {
            let mut walker = Walker::new(&mut objects, &mut fonts, &mut images, &mut pages, &mut dests, &tmpl.config);
            walker.walk(&tmpl).unwrap();
        }
        assert!(dests.get("intro").is_some());
    }

    #[test]
    fn test_image_element_registers_resource_name() {
        let b64 = one_pixel_png_base64();
        let json = format!(
            r#"{{"elements": [{{"type": "image", "image": {{"dataBase64": "{b64}", "width": 20, "height": 20}}}}]}}"#
        );
        let (out, _pages) = walk(&json);
        assert_eq!(out.image_resources.len(), 1);
        assert!(out.image_resources[0].0.starts_with("Im"));
    }

    #[test]
    fn test_checkbox_cell_draws_without_panicking() {
        let json = r#"{
            "elements": [{"type": "table", "table": {
                "maxcolumns": 1,
                "rows": [{"row": [{"props": "font1:12:000:left:0:0:0:0", "chequebox": true}]}]
            }}]
        }"#;
        let (_out, pages) = walk(json);
        let text = String::from_utf8_lossy(pages.pages()[0].content.as_slice()).into_owned();
        assert!(text.contains(" m\n"));
    }
}
