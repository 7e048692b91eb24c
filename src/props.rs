//! Strongly-typed `Props` descriptor, parsed once from the packed string
//! format and reused, per the "String-keyed dynamic field props" design note
//! in `SPEC_FULL.md`. Mirrors the teacher's `FontSpec::parse` in shape (a
//! single pass over whitespace/colon-delimited tokens, no parser-combinator
//! crate) but for the colon-delimited format spec.md §3/§6 defines:
//!
//! `font_id:size:style3:align:lb:rb:tb:bb`

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

impl Align {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "left" => Ok(Align::Left),
            "center" => Ok(Align::Center),
            "right" => Ok(Align::Right),
            other => Err(Error::TemplateInvalid(format!(
                "invalid align {other:?}, expected left|center|right"
            ))),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
        }
    }
}

/// Parsed, strongly-typed form of the packed props string.
///
/// `font` is kept as the raw name token here; `walker.rs` resolves it to a
/// `FontHandle` against the session's `FontRegistry` (the registry isn't
/// reachable from this module, which has no knowledge of what fonts exist).
#[derive(Debug, Clone, PartialEq)]
pub struct Props {
    pub font: String,
    pub size: u8,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub align: Align,
    /// left, right, top, bottom border widths in points (0..=10)
    pub borders: [u8; 4],
}

impl Props {
    /// Parse `"font:size:style3:align:lb:rb:tb:bb"`.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 8 {
            return Err(Error::TemplateInvalid(format!(
                "props string {s:?} must have 8 colon-separated fields, got {}",
                parts.len()
            )));
        }
        let font = parts[0].to_string();
        let size: u8 = parts[1]
            .parse()
            .map_err(|_| Error::TemplateInvalid(format!("invalid size in props {s:?}")))?;
        let style3 = parts[2];
        if style3.len() != 3 || !style3.bytes().all(|b| b == b'0' || b == b'1') {
            return Err(Error::TemplateInvalid(format!(
                "style3 in props {s:?} must match /^[01]{{3}}$/"
            )));
        }
        let bold = &style3[0..1] == "1";
        let italic = &style3[1..2] == "1";
        let underline = &style3[2..3] == "1";
        let align = Align::parse(parts[3])?;

        let mut borders = [0u8; 4];
        for (i, field) in parts[4..8].iter().enumerate() {
            let v: u8 = field
                .parse()
                .map_err(|_| Error::TemplateInvalid(format!("invalid border in props {s:?}")))?;
            if v > 10 {
                return Err(Error::TemplateInvalid(format!(
                    "border widths must be <= 10, got {v} in props {s:?}"
                )));
            }
            borders[i] = v;
        }

        Ok(Props {
            font,
            size,
            bold,
            italic,
            underline,
            align,
            borders,
        })
    }

    /// Re-serialize into the canonical packed form. `format(parse(s)) == s`
    /// for every well-formed `s`, per the round-trip property in spec.md §8.
    pub fn format(&self) -> String {
        let style3 = format!(
            "{}{}{}",
            self.bold as u8, self.italic as u8, self.underline as u8
        );
        format!(
            "{}:{}:{}:{}:{}:{}:{}:{}",
            self.font,
            self.size,
            style3,
            self.align.as_str(),
            self.borders[0],
            self.borders[1],
            self.borders[2],
            self.borders[3]
        )
    }

    pub fn left_border(&self) -> u8 {
        self.borders[0]
    }
    pub fn right_border(&self) -> u8 {
        self.borders[1]
    }
    pub fn top_border(&self) -> u8 {
        self.borders[2]
    }
    pub fn bottom_border(&self) -> u8 {
        self.borders[3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let p = Props::parse("font1:12:000:left:1:1:1:1").unwrap();
        assert_eq!(p.font, "font1");
        assert_eq!(p.size, 12);
        assert!(!p.bold && !p.italic && !p.underline);
        assert_eq!(p.align, Align::Left);
        assert_eq!(p.borders, [1, 1, 1, 1]);
    }

    #[test]
    fn test_parse_bold_italic() {
        let p = Props::parse("font1:18:110:center:0:0:0:0").unwrap();
        assert!(p.bold);
        assert!(p.italic);
        assert!(!p.underline);
        assert_eq!(p.align, Align::Center);
    }

    #[test]
    fn test_roundtrip() {
        for s in [
            "font1:18:100:center:0:0:0:0",
            "Helvetica-Bold:10:000:right:2:2:0:1",
            "font2:9:011:left:0:0:0:0",
        ] {
            let p = Props::parse(s).unwrap();
            assert_eq!(p.format(), s);
        }
    }

    #[test]
    fn test_invalid_style3() {
        assert!(Props::parse("font1:12:0A0:left:0:0:0:0").is_err());
        assert!(Props::parse("font1:12:01:left:0:0:0:0").is_err());
    }

    #[test]
    fn test_invalid_align() {
        assert!(Props::parse("font1:12:000:middle:0:0:0:0").is_err());
    }

    #[test]
    fn test_border_too_wide() {
        assert!(Props::parse("font1:12:000:left:11:0:0:0").is_err());
    }

    #[test]
    fn test_wrong_field_count() {
        assert!(Props::parse("font1:12:000:left:0:0:0").is_err());
    }
}
