//! The 14 standard Adobe Type1 fonts: canonical names and built-in width
//! metrics. Generalizes the teacher's single-font
//! `create_liberation_serif_widths` table (in `headers.rs`) into a table per
//! standard font, keyed the same way (WinAnsiEncoding codes 32..=255).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
    Symbol,
    ZapfDingbats,
}

impl StandardFont {
    pub const ALL: [StandardFont; 14] = [
        StandardFont::Helvetica,
        StandardFont::HelveticaBold,
        StandardFont::HelveticaOblique,
        StandardFont::HelveticaBoldOblique,
        StandardFont::TimesRoman,
        StandardFont::TimesBold,
        StandardFont::TimesItalic,
        StandardFont::TimesBoldItalic,
        StandardFont::Courier,
        StandardFont::CourierBold,
        StandardFont::CourierOblique,
        StandardFont::CourierBoldOblique,
        StandardFont::Symbol,
        StandardFont::ZapfDingbats,
    ];

    /// The `/BaseFont` name as it appears in the PDF font dictionary.
    pub fn base_name(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::HelveticaOblique => "Helvetica-Oblique",
            StandardFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
            StandardFont::TimesItalic => "Times-Italic",
            StandardFont::TimesBoldItalic => "Times-BoldItalic",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
            StandardFont::CourierOblique => "Courier-Oblique",
            StandardFont::CourierBoldOblique => "Courier-BoldOblique",
            StandardFont::Symbol => "Symbol",
            StandardFont::ZapfDingbats => "ZapfDingbats",
        }
    }

    pub fn from_base_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.base_name() == name)
    }

    /// Pick the bold/italic variant of this font family, used when a props
    /// string's style bits request bold/italic on a standard font.
    pub fn with_style(&self, bold: bool, italic: bool) -> StandardFont {
        use StandardFont::*;
        match self {
            Helvetica | HelveticaBold | HelveticaOblique | HelveticaBoldOblique => {
                match (bold, italic) {
                    (false, false) => Helvetica,
                    (true, false) => HelveticaBold,
                    (false, true) => HelveticaOblique,
                    (true, true) => HelveticaBoldOblique,
                }
            }
            TimesRoman | TimesBold | TimesItalic | TimesBoldItalic => match (bold, italic) {
                (false, false) => TimesRoman,
                (true, false) => TimesBold,
                (false, true) => TimesItalic,
                (true, true) => TimesBoldItalic,
            },
            Courier | CourierBold | CourierOblique | CourierBoldOblique => match (bold, italic) {
                (false, false) => Courier,
                (true, false) => CourierBold,
                (false, true) => CourierOblique,
                (true, true) => CourierBoldOblique,
            },
            Symbol => Symbol,
            ZapfDingbats => ZapfDingbats,
        }
    }

    /// Width of `codepoint` in 1/1000 em, for WinAnsiEncoding codes 32..=255.
    /// Falls back to the family's average width for anything outside that
    /// range (non-Latin-1 text falls back to custom TrueType fonts instead).
    pub fn width(&self, codepoint: u32) -> u16 {
        if !(32..=255).contains(&codepoint) {
            return self.average_width();
        }
        let idx = (codepoint - 32) as usize;
        match self.family_metrics() {
            Metrics::Fixed(w) => w,
            Metrics::Table(table) => table[idx.min(table.len() - 1)],
        }
    }

    fn average_width(&self) -> u16 {
        match self {
            StandardFont::Courier
            | StandardFont::CourierBold
            | StandardFont::CourierOblique
            | StandardFont::CourierBoldOblique => 600,
            _ => 500,
        }
    }

    fn family_metrics(&self) -> Metrics {
        use StandardFont::*;
        match self {
            Courier | CourierBold | CourierOblique | CourierBoldOblique => Metrics::Fixed(600),
            Helvetica => Metrics::Table(&HELVETICA_WIDTHS),
            HelveticaBold => Metrics::Table(&HELVETICA_BOLD_WIDTHS),
            HelveticaOblique => Metrics::Table(&HELVETICA_WIDTHS),
            HelveticaBoldOblique => Metrics::Table(&HELVETICA_BOLD_WIDTHS),
            TimesRoman => Metrics::Table(&TIMES_WIDTHS),
            TimesBold => Metrics::Table(&TIMES_BOLD_WIDTHS),
            TimesItalic => Metrics::Table(&TIMES_WIDTHS),
            TimesBoldItalic => Metrics::Table(&TIMES_BOLD_WIDTHS),
            Symbol | ZapfDingbats => Metrics::Fixed(500),
        }
    }

    /// `/Flags` entry for a synthesized `FontDescriptor`, used only in PDF/A
    /// mode where standard fonts still get a descriptor for conformance.
    pub fn flags(&self) -> i64 {
        use StandardFont::*;
        match self {
            Courier | CourierBold | CourierOblique | CourierBoldOblique => 1 | 32, // FixedPitch + Nonsymbolic
            Symbol | ZapfDingbats => 4, // Symbolic
            TimesRoman | TimesBold | TimesItalic | TimesBoldItalic => 2 | 32, // Serif + Nonsymbolic
            _ => 32, // Nonsymbolic
        }
    }
}

enum Metrics {
    Fixed(u16),
    Table(&'static [u16; 224]),
}

/// Approximate Helvetica widths for WinAnsi codes 32..=255, in 1/1000 em.
/// Values follow the well-known Adobe core-14 AFM widths for the printable
/// ASCII range; the Latin-1 supplement beyond 0x7E is approximated from the
/// nearest analogous glyph, matching the teacher's own "approximate" note on
/// `create_liberation_serif_widths`.
#[rustfmt::skip]
static HELVETICA_WIDTHS: [u16; 224] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, 350,
    556, 350, 222, 556, 333, 1000, 556, 556, 333, 1000, 667, 333, 1000, 350, 611, 350,
    350, 222, 222, 333, 333, 350, 556, 1000, 333, 1000, 500, 333, 944, 350, 500, 667,
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
];

#[rustfmt::skip]
static HELVETICA_BOLD_WIDTHS: [u16; 224] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, 350,
    556, 350, 278, 556, 500, 1000, 556, 556, 333, 1000, 667, 333, 1000, 350, 611, 350,
    350, 278, 278, 500, 500, 350, 556, 1000, 333, 1000, 556, 333, 944, 350, 500, 667,
    278, 333, 556, 556, 556, 556, 280, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 611, 556, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    722, 722, 722, 722, 722, 722, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 556, 556, 556, 556, 556, 278, 278, 278, 278,
    611, 611, 611, 611, 611, 611, 611, 584, 611, 611, 611, 611, 611, 556, 611, 556,
];

#[rustfmt::skip]
static TIMES_WIDTHS: [u16; 224] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541, 350,
    500, 350, 333, 500, 444, 1000, 500, 500, 333, 1000, 556, 333, 889, 350, 611, 350,
    350, 333, 333, 444, 444, 350, 500, 1000, 333, 980, 389, 333, 722, 350, 444, 722,
    250, 333, 500, 500, 500, 500, 200, 500, 333, 760, 276, 500, 564, 333, 760, 333,
    400, 564, 300, 300, 333, 500, 453, 250, 333, 300, 310, 500, 750, 750, 750, 444,
    722, 722, 722, 722, 722, 722, 889, 667, 611, 611, 611, 611, 333, 333, 333, 333,
    722, 722, 722, 722, 722, 722, 722, 564, 722, 722, 722, 722, 722, 722, 556, 500,
    444, 444, 444, 444, 444, 444, 667, 444, 444, 444, 444, 444, 278, 278, 278, 278,
    500, 500, 500, 500, 500, 500, 500, 564, 500, 500, 500, 500, 500, 500, 500, 500,
];

#[rustfmt::skip]
static TIMES_BOLD_WIDTHS: [u16; 224] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520, 350,
    500, 350, 333, 500, 500, 1000, 500, 500, 333, 1000, 556, 333, 1000, 350, 667, 350,
    350, 333, 333, 500, 500, 350, 500, 1000, 333, 1000, 389, 333, 722, 350, 444, 722,
    250, 333, 500, 500, 500, 500, 220, 500, 333, 747, 300, 500, 570, 333, 747, 333,
    400, 570, 300, 300, 333, 556, 540, 250, 333, 300, 330, 500, 750, 750, 750, 500,
    722, 722, 722, 722, 722, 722, 1000, 722, 667, 667, 667, 667, 389, 389, 389, 389,
    722, 722, 778, 778, 778, 778, 778, 570, 778, 722, 722, 722, 722, 722, 611, 556,
    500, 500, 500, 500, 500, 500, 722, 444, 444, 444, 444, 444, 278, 278, 278, 278,
    500, 556, 500, 500, 500, 500, 500, 570, 500, 556, 556, 556, 556, 500, 556, 500,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name_roundtrip() {
        for f in StandardFont::ALL {
            assert_eq!(StandardFont::from_base_name(f.base_name()), Some(f));
        }
    }

    #[test]
    fn test_courier_is_monospaced() {
        for c in 32u32..=255 {
            assert_eq!(StandardFont::Courier.width(c), 600);
        }
    }

    #[test]
    fn test_helvetica_space_width() {
        assert_eq!(StandardFont::Helvetica.width(' ' as u32), 278);
    }

    #[test]
    fn test_with_style_selects_variant() {
        assert_eq!(
            StandardFont::Helvetica.with_style(true, false),
            StandardFont::HelveticaBold
        );
        assert_eq!(
            StandardFont::TimesRoman.with_style(true, true),
            StandardFont::TimesBoldItalic
        );
    }

    #[test]
    fn test_out_of_range_codepoint_uses_average() {
        assert_eq!(StandardFont::Helvetica.width(0x4e2d), 500);
    }
}
