//! `PDFTemplate` data model (spec.md §3), deserialized once per request and
//! never mutated afterward ("Template parsed at request time; consumed once;
//! not mutated" — §3 Lifecycles).

use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PageSize {
    A3,
    A4,
    A5,
    Letter,
    Legal,
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::A4
    }
}

impl PageSize {
    /// Dimensions in points, per spec.md §6.
    pub fn dimensions(&self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.0, 842.0),
            PageSize::A3 => (842.0, 1191.0),
            PageSize::A5 => (420.0, 595.0),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageBorder {
    #[serde(default)]
    pub left: f32,
    #[serde(default)]
    pub right: f32,
    #[serde(default)]
    pub top: f32,
    #[serde(default)]
    pub bottom: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Margins {
    #[serde(default = "default_margin")]
    pub top: f32,
    #[serde(default = "default_margin")]
    pub bottom: f32,
    #[serde(default = "default_margin")]
    pub left: f32,
    #[serde(default = "default_margin")]
    pub right: f32,
}

fn default_margin() -> f32 {
    36.0
}

impl Default for Margins {
    fn default() -> Self {
        Margins {
            top: default_margin(),
            bottom: default_margin(),
            left: default_margin(),
            right: default_margin(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Watermark {
    pub text: String,
    #[serde(default = "default_watermark_size")]
    pub size: f32,
    #[serde(default = "default_watermark_opacity")]
    pub opacity: f32,
    #[serde(default = "default_watermark_rotation")]
    pub rotation: f32,
}

fn default_watermark_size() -> f32 {
    48.0
}
fn default_watermark_opacity() -> f32 {
    0.15
}
fn default_watermark_rotation() -> f32 {
    45.0
}

/// A registered custom font entry in `config.customFonts`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFont {
    /// Name used to reference this font from a props string.
    pub name: String,
    /// Path to a TTF file. Mutually exclusive with `data_base64` in
    /// practice; the driver reads whichever is present.
    #[serde(default)]
    pub path: Option<String>,
    /// Inline base64-encoded TTF bytes, for templates that embed fonts
    /// without filesystem access.
    #[serde(default)]
    pub data_base64: Option<String>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecurityVersion {
    V1,
    V2,
    V4,
    V5,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub version: Option<SecurityVersion>,
    #[serde(default)]
    pub owner_password: String,
    #[serde(default)]
    pub user_password: String,
    /// Permission bits per PDF 1.7 Table 22 (encoded as the raw signed i32
    /// the `/P` entry expects).
    #[serde(default = "default_permissions")]
    pub permissions: i32,
}

fn default_permissions() -> i32 {
    -4 // print + copy + modify-annotations allowed, nothing else revoked beyond the reserved bits
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            enabled: false,
            version: None,
            owner_password: String::new(),
            user_password: String::new(),
            permissions: default_permissions(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureConfig {
    #[serde(default)]
    pub enabled: bool,
    /// PEM-encoded RSA private key.
    #[serde(default)]
    pub private_key_pem: Option<String>,
    /// PEM-encoded X.509 certificate.
    #[serde(default)]
    pub certificate_pem: Option<String>,
    /// Additional PEM-encoded certificates forming the chain, root-last.
    #[serde(default)]
    pub chain_pem: Vec<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        SignatureConfig {
            enabled: false,
            private_key_pem: None,
            certificate_pem: None,
            chain_pem: Vec::new(),
            reason: None,
            location: None,
            name: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub page: PageSize,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub margins: Margins,
    #[serde(default)]
    pub page_border: PageBorder,
    #[serde(default)]
    pub watermark: Option<Watermark>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub pdf_a: bool,
    #[serde(default = "default_true")]
    pub embed_fonts: bool,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub signature: SignatureConfig,
    #[serde(default)]
    pub custom_fonts: Vec<CustomFont>,
    /// Enables `/Artifact BDC ... EMC` wrapping for non-content ops
    /// (borders, page numbers, watermarks), per §4.3.
    #[serde(default)]
    pub tagged: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct TitleBlock {
    pub props: String,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Title {
    /// A 1-row embedded table (logo+title); wins over `Text` when both are
    /// present in the source JSON (Open Question #2 in SPEC_FULL.md).
    Table(Table),
    Text(TitleBlock),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub props: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub chequebox: Option<bool>,
    #[serde(default)]
    pub image: Option<ImageRef>,
    #[serde(default)]
    pub form_field: Option<FormField>,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub bgcolor: Option<String>,
    #[serde(default)]
    pub textcolor: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub dest: Option<String>,
    #[serde(default)]
    pub wrap: bool,
    /// `$ ... $`-delimited math content is detected at walk time; this flag
    /// lets a template force math mode on a cell whose text has no delimiters.
    #[serde(default)]
    pub math: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    /// Base64-encoded PNG/JPEG bytes, or a filesystem path (mutually
    /// exclusive; the driver checks `data_base64` first).
    #[serde(default)]
    pub data_base64: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Checkbox,
    Radio,
    PushButton,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub export_value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Row {
    pub row: Vec<Cell>,
    #[serde(default)]
    pub height: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Table {
    pub maxcolumns: usize,
    #[serde(default)]
    pub columnwidths: Option<Vec<f32>>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Spacer {
    pub height: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Table { table: Table },
    Spacer { spacer: Spacer },
    Image { image: ImageRef },
}

#[derive(Debug, Clone, Deserialize)]
pub struct FooterLink {
    pub text: String,
    pub href: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Footer {
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub link: Option<FooterLink>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub title: String,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub dest: Option<String>,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub children: Vec<Bookmark>,
    #[serde(default = "default_true")]
    pub open: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PDFTemplate {
    #[serde(default)]
    pub config: Config,
    #[serde(default)]
    pub title: Option<Title>,
    #[serde(default)]
    pub elements: Option<Vec<Element>>,
    // Legacy slices, concatenated in order when `elements` is absent.
    #[serde(default)]
    pub table: Vec<Table>,
    #[serde(default)]
    pub spacer: Vec<Spacer>,
    #[serde(default)]
    pub image: Vec<ImageRef>,
    #[serde(default)]
    pub footer: Option<Footer>,
    #[serde(default)]
    pub bookmarks: Vec<Bookmark>,
}

impl PDFTemplate {
    pub fn parse(json: &str) -> Result<Self> {
        let mut tmpl: PDFTemplate = serde_json::from_str(json)
            .map_err(|e| Error::TemplateInvalid(format!("JSON parse error: {e}")))?;
        tmpl.normalize_and_validate()?;
        Ok(tmpl)
    }

    /// Resolve the `elements` vs legacy-slice ambiguity and check the data
    /// model invariants from spec.md §3.
    fn normalize_and_validate(&mut self) -> Result<()> {
        if self.elements.is_none() {
            let mut elements = Vec::new();
            for t in self.table.drain(..) {
                elements.push(Element::Table { table: t });
            }
            for s in self.spacer.drain(..) {
                elements.push(Element::Spacer { spacer: s });
            }
            for i in self.image.drain(..) {
                elements.push(Element::Image { image: i });
            }
            self.elements = Some(elements);
        }

        // Every table row must have exactly `maxcolumns` cells, and
        // `columnwidths` (when present) must match length and be positive.
        let mut dest_ids: HashMap<String, ()> = HashMap::new();
        for el in self.elements.as_ref().unwrap() {
            if let Element::Table { table } = el {
                if let Some(widths) = &table.columnwidths {
                    if widths.len() != table.maxcolumns {
                        return Err(Error::TemplateInvalid(format!(
                            "columnwidths length {} != maxcolumns {}",
                            widths.len(),
                            table.maxcolumns
                        )));
                    }
                    if widths.iter().any(|w| *w <= 0.0) {
                        return Err(Error::TemplateInvalid(
                            "columnwidths entries must all be > 0".into(),
                        ));
                    }
                }
                for row in &table.rows {
                    if row.row.len() != table.maxcolumns {
                        return Err(Error::TemplateInvalid(format!(
                            "row has {} cells, expected maxcolumns {}",
                            row.row.len(),
                            table.maxcolumns
                        )));
                    }
                    for cell in &row.row {
                        if let Some(dest) = &cell.dest {
                            dest_ids.insert(dest.clone(), ());
                        }
                    }
                }
            }
        }
        for bm in &self.bookmarks {
            collect_bookmark_dests(bm, &mut dest_ids);
        }

        if self.config.security.enabled && self.config.pdf_a {
            return Err(Error::EncryptionConfigInvalid(
                "encryption and PDF/A conformance cannot both be enabled".into(),
            ));
        }
        if self.config.security.enabled && self.config.signature.enabled {
            // Both are legal together in PDF proper, but §9 Non-goals excludes
            // LTV timestamps; keep the combination but rely on Security to
            // run first so the signature digest covers the encrypted bytes.
        }

        Ok(())
    }

    /// All destination ids reachable from cells or bookmarks, used by the
    /// outline/link resolver to drop dangling `#dest` links per §3.
    pub fn known_dests(&self) -> HashMap<String, ()> {
        let mut dests = HashMap::new();
        if let Some(elements) = &self.elements {
            for el in elements {
                if let Element::Table { table } = el {
                    for row in &table.rows {
                        for cell in &row.row {
                            if let Some(dest) = &cell.dest {
                                dests.insert(dest.clone(), ());
                            }
                        }
                    }
                }
            }
        }
        for bm in &self.bookmarks {
            collect_bookmark_dests(bm, &mut dests);
        }
        dests
    }
}

fn collect_bookmark_dests(bm: &Bookmark, dests: &mut HashMap<String, ()>) {
    if let Some(dest) = &bm.dest {
        dests.insert(dest.clone(), ());
    }
    for child in &bm.children {
        collect_bookmark_dests(child, dests);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_dimensions() {
        assert_eq!(PageSize::A4.dimensions(), (595.0, 842.0));
        assert_eq!(PageSize::Letter.dimensions(), (612.0, 792.0));
        assert_eq!(PageSize::Legal.dimensions(), (612.0, 1008.0));
        assert_eq!(PageSize::A3.dimensions(), (842.0, 1191.0));
        assert_eq!(PageSize::A5.dimensions(), (420.0, 595.0));
    }

    #[test]
    fn test_minimal_hello_parses() {
        let json = r#"{
            "config": {"page": "A4"},
            "title": {"props": "font1:18:100:center:0:0:0:0", "text": "Hello"},
            "elements": [],
            "footer": {"font": "font1:10:000:center", "text": ""}
        }"#;
        let tmpl = PDFTemplate::parse(json).unwrap();
        assert_eq!(tmpl.config.page, PageSize::A4);
        assert!(matches!(tmpl.title, Some(Title::Text(_))));
        assert_eq!(tmpl.elements.as_ref().unwrap().len(), 0);
    }

    #[test]
    fn test_legacy_lists_concatenate_into_elements() {
        let json = r#"{
            "config": {"page": "A4"},
            "table": [{"maxcolumns": 1, "rows": []}],
            "spacer": [{"height": 10}],
            "image": [{"path": "x.png", "width": 10, "height": 10}]
        }"#;
        let tmpl = PDFTemplate::parse(json).unwrap();
        let els = tmpl.elements.unwrap();
        assert_eq!(els.len(), 3);
        assert!(matches!(els[0], Element::Table { .. }));
        assert!(matches!(els[1], Element::Spacer { .. }));
        assert!(matches!(els[2], Element::Image { .. }));
    }

    #[test]
    fn test_row_column_count_mismatch_rejected() {
        let json = r#"{
            "elements": [{"type": "table", "table": {
                "maxcolumns": 2,
                "rows": [{"row": [{"props": "font1:12:000:left:0:0:0:0", "text": "a"}]}]
            }}]
        }"#;
        assert!(PDFTemplate::parse(json).is_err());
    }

    #[test]
    fn test_columnwidths_length_mismatch_rejected() {
        let json = r#"{
            "elements": [{"type": "table", "table": {
                "maxcolumns": 2,
                "columnwidths": [1.0],
                "rows": []
            }}]
        }"#;
        assert!(PDFTemplate::parse(json).is_err());
    }

    #[test]
    fn test_encryption_and_pdfa_conflict_rejected() {
        let json = r#"{
            "config": {
                "pdfA": true,
                "security": {"enabled": true, "ownerPassword": "o", "userPassword": "u"}
            }
        }"#;
        assert!(PDFTemplate::parse(json).is_err());
    }
}
