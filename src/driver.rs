//! Driver: orchestrates every module through the ten-step generation
//! sequence and the `Init -> TemplateParsed -> ContentEmitted ->
//! ResourcesEmitted -> PagesEmitted -> Encrypted? -> Signed? -> Finalized`
//! state machine (spec.md §4.12).
//!
//! Mirrors the teacher's `add_headers_footers` top-level function: parse
//! input, walk/mutate an in-memory document, save. The difference here is
//! the document is built from scratch rather than loaded, so object ids
//! have to be reserved in the right order: pages need ids before form
//! fields/links/outline entries can reference them, and every resource
//! (fonts, images, widgets) needs to exist before the page dictionaries
//! that point at it are written.

use lopdf::{Dictionary, Object, Stream};
use rand::RngCore;

use crate::error::{Error, Result, Stage};
use crate::fonts::FontRegistry;
use crate::forms::FormsBuilder;
use crate::images::ImageCache;
use crate::object_table::ObjectTable;
use crate::outline::{self, DestinationTable, LinkTarget};
use crate::page_manager::PageManager;
use crate::security::Security;
use crate::signature::{self, SignaturePlaceholder};
use crate::template::{Config, Orientation, PDFTemplate};
use crate::walker::{PendingTarget, WalkOutput, Walker};

fn log_stage(stage: Stage) {
    log::debug!("driver: entering stage {stage}");
}

fn page_dimensions(config: &Config) -> (f32, f32) {
    let (raw_w, raw_h) = config.page.dimensions();
    match config.orientation {
        Orientation::Portrait => (raw_w, raw_h),
        Orientation::Landscape => (raw_h, raw_w),
    }
}

fn pdf_date_now() -> String {
    chrono::Utc::now().format("D:%Y%m%d%H%M%S+00'00'").to_string()
}

fn fresh_id_bytes() -> Vec<u8> {
    let mut id = vec![0u8; 16];
    rand::thread_rng().fill_bytes(&mut id);
    id
}

/// Build the `/Metadata` XMP stream PDF/A mode needs (spec.md line 231):
/// header is already 1.7 (`ObjectTable::new` always starts a 1.7 document),
/// so the only thing left to add is the metadata stream itself, declaring
/// `pdfaid:part` 4 under an `rdf:RDF` root.
fn build_pdfa_metadata_xml(title: Option<&str>) -> String {
    let title_node = title
        .map(|t| format!("<dc:title><rdf:Alt><rdf:li xml:lang=\"x-default\">{}</rdf:li></rdf:Alt></dc:title>", xml_escape(t)))
        .unwrap_or_default();
    format!(
        r#"<?xpacket begin="\u{{feff}}" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
<rdf:Description rdf:about="" xmlns:pdfaid="http://www.aiim.org/pdfa/ns/id/">
<pdfaid:part>4</pdfaid:part>
</rdf:Description>
<rdf:Description rdf:about="" xmlns:dc="http://purl.org/dc/elements/1.1/">
{title_node}
</rdf:Description>
</rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#
    )
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Parse, walk, and serialize a `PDFTemplate` JSON document into finished
/// PDF bytes, per the public `generate(template) -> Result<Bytes, Error>`
/// wire operation (spec.md §6).
pub fn generate(template_json: &str) -> Result<Vec<u8>> {
    log_stage(Stage::Init);

    let tmpl = PDFTemplate::parse(template_json)?;
    log_stage(Stage::TemplateParsed);

    let mut objects = ObjectTable::new();
    let catalog_id = objects.reserve();
    let pages_root_id = objects.reserve();
    let info_id = objects.reserve();

    let registry = FontRegistry::build(&tmpl.config.custom_fonts)?;
    let mut fonts = registry.clone_for_generation();
    let mut images = ImageCache::new();
    let mut pages = PageManager::new();
    let mut dests = DestinationTable::new();

    let walk_output: WalkOutput = {
        let mut walker = Walker::new(&mut objects, &mut fonts, &mut images, &mut pages, &mut dests, &tmpl.config);
        walker.walk(&tmpl)?
    };
    pages.backpatch_page_numbers()?;
    log_stage(Stage::ContentEmitted);

    let page_ids: Vec<lopdf::ObjectId> = (0..pages.page_count()).map(|_| objects.reserve()).collect();

    let (font_dict, _font_names) = fonts.emit_used_fonts(&mut objects)?;
    let mut xobject_dict = Dictionary::new();
    for (name, id) in &walk_output.image_resources {
        xobject_dict.set(name.as_str(), Object::Reference(*id));
    }

    let mut forms_builder = FormsBuilder::new();
    for pf in &walk_output.pending_fields {
        let Some(&page_id) = page_ids.get(pf.page_index) else { continue };
        let widget_id = forms_builder.add_field(&mut objects, &pf.field, pf.rect, page_id);
        pages.add_annot(pf.page_index, widget_id);
    }
    for pl in &walk_output.pending_links {
        let target = match &pl.target {
            PendingTarget::Uri(uri) => Some(LinkTarget::Uri(uri.clone())),
            PendingTarget::Dest(name) => dests.get(name).map(|d| LinkTarget::Internal { page_index: d.page_index, y: d.y }),
        };
        let Some(target) = target else { continue };
        let dict = outline::emit_link_annotation(&target, pl.rect, &page_ids);
        let id = objects.add_dict(dict);
        pages.add_annot(pl.page_index, id);
    }

    let mut acroform_id = forms_builder.finish(&mut objects);

    if tmpl.config.signature.enabled {
        if page_ids.is_empty() {
            return Err(Error::TemplateInvalid("signature.enabled is true but the document has no pages".into()));
        }
        let placeholder = SignaturePlaceholder::from_config(&tmpl.config.signature);
        let sig_id = objects.add_dict(signature::placeholder_sig_dict(&placeholder));

        let mut widget = Dictionary::new();
        widget.set("Type", Object::Name(b"Annot".to_vec()));
        widget.set("Subtype", Object::Name(b"Widget".to_vec()));
        widget.set("FT", Object::Name(b"Sig".to_vec()));
        widget.set("Rect", Object::Array(vec![Object::Integer(0); 4]));
        widget.set("V", Object::Reference(sig_id));
        widget.set("F", Object::Integer(132)); // Print | Locked, invisible-appearance widget
        widget.set("P", Object::Reference(page_ids[0]));
        let widget_id = objects.add_dict(widget);
        pages.add_annot(0, widget_id);

        match acroform_id {
            Some(af_id) => {
                if let Some(Object::Dictionary(af)) = objects.get_mut(af_id) {
                    if let Ok(Object::Array(fields)) = af.get_mut(b"Fields") {
                        fields.push(Object::Reference(sig_id));
                    }
                    af.set("SigFlags", Object::Integer(3));
                }
            }
            None => {
                let mut af = Dictionary::new();
                af.set("Fields", Object::Array(vec![Object::Reference(sig_id)]));
                af.set("SigFlags", Object::Integer(3));
                af.set("NeedAppearances", Object::Boolean(true));
                acroform_id = Some(objects.add_dict(af));
            }
        }
    }

    let outline_id = outline::emit_outline_tree(&tmpl.bookmarks, &dests, &page_ids, &mut objects);
    log_stage(Stage::ResourcesEmitted);

    let (page_w, page_h) = page_dimensions(&tmpl.config);
    for (i, &page_id) in page_ids.iter().enumerate() {
        let page = &pages.pages()[i];
        let content_id = objects.add(Object::Stream(Stream {
            dict: Dictionary::new(),
            content: page.content.as_slice().to_vec(),
            allows_compression: true,
            start_position: None,
        }));

        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(font_dict.clone()));
        resources.set("XObject", Object::Dictionary(xobject_dict.clone()));

        let mut page_dict = Dictionary::new();
        page_dict.set("Type", Object::Name(b"Page".to_vec()));
        page_dict.set("Parent", Object::Reference(pages_root_id));
        page_dict.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page_w),
                Object::Real(page_h),
            ]),
        );
        page_dict.set("Contents", Object::Reference(content_id));
        page_dict.set("Resources", Object::Dictionary(resources));
        if !page.annots.is_empty() {
            page_dict.set("Annots", Object::Array(page.annots.iter().map(|id| Object::Reference(*id)).collect()));
        }
        objects.write(page_id, Object::Dictionary(page_dict))?;
    }

    let mut pages_root = Dictionary::new();
    pages_root.set("Type", Object::Name(b"Pages".to_vec()));
    pages_root.set("Kids", Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()));
    pages_root.set("Count", Object::Integer(page_ids.len() as i64));
    objects.write(pages_root_id, Object::Dictionary(pages_root))?;

    let metadata_id = if tmpl.config.pdf_a {
        let xml = build_pdfa_metadata_xml(tmpl.config.title.as_deref());
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"Metadata".to_vec()));
        dict.set("Subtype", Object::Name(b"XML".to_vec()));
        Some(objects.add(Object::Stream(Stream {
            dict,
            content: xml.into_bytes(),
            allows_compression: false,
            start_position: None,
        })))
    } else {
        None
    };

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_root_id));
    if let Some(af_id) = acroform_id {
        catalog.set("AcroForm", Object::Reference(af_id));
    }
    if let Some(outline_id) = outline_id {
        catalog.set("Outlines", Object::Reference(outline_id));
        catalog.set("PageMode", Object::Name(b"UseOutlines".to_vec()));
    }
    if let Some(metadata_id) = metadata_id {
        catalog.set("Metadata", Object::Reference(metadata_id));
    }
    objects.write(catalog_id, Object::Dictionary(catalog))?;
    objects.set_root(catalog_id);

    let mut info = Dictionary::new();
    if let Some(title) = &tmpl.config.title {
        info.set("Title", Object::String(title.as_bytes().to_vec(), lopdf::StringFormat::Literal));
    }
    info.set("Producer", Object::String(b"pdfgen".to_vec(), lopdf::StringFormat::Literal));
    info.set("CreationDate", Object::String(pdf_date_now().into_bytes(), lopdf::StringFormat::Literal));
    objects.write(info_id, Object::Dictionary(info))?;
    objects.set_info(info_id);
    objects.compress();
    log_stage(Stage::PagesEmitted);

    if tmpl.config.security.enabled {
        let sec = Security::setup(&tmpl.config.security)?;
        sec.encrypt_all(&mut objects)?;
        let id0 = sec.id0().to_vec();
        objects.trailer_set(
            "ID",
            Object::Array(vec![
                Object::String(id0.clone(), lopdf::StringFormat::Hexadecimal),
                Object::String(id0, lopdf::StringFormat::Hexadecimal),
            ]),
        );
        let enc_id = objects.add_dict(sec.encrypt_dict());
        objects.trailer_set("Encrypt", Object::Reference(enc_id));
        log_stage(Stage::Encrypted);
    } else {
        let id = fresh_id_bytes();
        objects.trailer_set(
            "ID",
            Object::Array(vec![
                Object::String(id.clone(), lopdf::StringFormat::Hexadecimal),
                Object::String(id, lopdf::StringFormat::Hexadecimal),
            ]),
        );
    }

    let mut bytes = objects.finalize()?;

    if tmpl.config.signature.enabled {
        signature::sign_in_place(&mut bytes, signature::BYTE_RANGE_MARKER, &tmpl.config.signature)?;
        log_stage(Stage::Signed);
    }

    log_stage(Stage::Finalized);
    Ok(bytes)
}

/// Merge complete in-memory PDFs into one, per spec.md §6's
/// `merge(list<Bytes>) → Result<Bytes, Error>`. Same renumber-and-relink
/// approach as `pdf::merge_pdfs`, adapted to operate on already-loaded
/// bytes instead of file paths so it composes with `generate`/`fill`
/// output without touching disk.
pub fn merge(pdfs: Vec<Vec<u8>>) -> Result<Vec<u8>> {
    use std::collections::BTreeMap;
    use lopdf::{Document, ObjectId};

    if pdfs.is_empty() {
        return Err(Error::General("no input PDFs provided".to_string()));
    }

    let mut documents = Vec::with_capacity(pdfs.len());
    for bytes in &pdfs {
        let doc = Document::load_mem(bytes)?;
        if doc.get_pages().is_empty() {
            return Err(Error::General("one of the input PDFs has no pages".to_string()));
        }
        documents.push(doc);
    }

    let mut max_id = 1u32;
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut doc in documents {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;
        let mut pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
        pages.sort_by_key(|(page_num, _)| *page_num);
        page_ids.extend(pages.into_iter().map(|(_, id)| id));
        objects.extend(doc.objects);
    }

    let mut merged = Document::with_version("1.7");
    merged.objects.extend(objects);
    merged.max_id = max_id - 1;

    let pages_id = merged.new_object_id();
    let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();
    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", Object::Integer(page_ids.len() as i64));
    pages_dict.set("Kids", Object::Array(kids));

    let catalog_id = merged.new_object_id();
    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));

    merged.objects.insert(catalog_id, Object::Dictionary(catalog));
    merged.objects.insert(pages_id, Object::Dictionary(pages_dict));
    merged.trailer.set("Root", Object::Reference(catalog_id));

    for &page_id in &page_ids {
        if let Ok(Object::Dictionary(dict)) = merged.get_object_mut(page_id) {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }

    merged.compress();
    let mut bytes = Vec::new();
    merged.save_to(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_minimal_template_produces_valid_pdf_bytes() {
        let json = r#"{
            "config": {"page": "A4"},
            "title": {"props": "font1:18:100:center:0:0:0:0", "text": "Hello"},
            "elements": [{"type": "table", "table": {
                "maxcolumns": 1,
                "rows": [{"row": [{"props": "font1:12:000:left:0:0:0:0", "text": "body"}]}]
            }}]
        }"#;
        let bytes = generate(json).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));
        assert!(lopdf::Document::load_mem(&bytes).is_ok());
    }

    #[test]
    fn test_generate_with_form_field_and_link() {
        let json = r#"{
            "elements": [{"type": "table", "table": {
                "maxcolumns": 1,
                "rows": [
                    {"row": [{"props": "font1:12:000:left:0:0:0:0", "text": "anchor", "dest": "top"}]},
                    {"row": [{"props": "font1:12:000:left:0:0:0:0", "text": "jump", "link": "#top"}]},
                    {"row": [{"props": "font1:12:000:left:0:0:0:0", "formField": {"name": "signer", "kind": "text"}}]}
                ]
            }}]
        }"#;
        let bytes = generate(json).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        let catalog = doc.catalog().unwrap();
        assert!(catalog.get(b"AcroForm").is_ok());
    }

    #[test]
    fn test_generate_with_bookmarks_sets_outlines() {
        let json = r#"{
            "elements": [{"type": "table", "table": {
                "maxcolumns": 1,
                "rows": [{"row": [{"props": "font1:12:000:left:0:0:0:0", "text": "anchor", "dest": "intro"}]}]
            }}],
            "bookmarks": [{"title": "Intro", "dest": "intro"}]
        }"#;
        let bytes = generate(json).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        let catalog = doc.catalog().unwrap();
        assert!(catalog.get(b"Outlines").is_ok());
    }

    #[test]
    fn test_generate_pdf_a_adds_metadata_stream() {
        let json = r#"{
            "config": {"pdfA": true, "title": "Report"},
            "elements": []
        }"#;
        let bytes = generate(json).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        let catalog = doc.catalog().unwrap();
        assert!(catalog.get(b"Metadata").is_ok());
    }

    #[test]
    fn test_generate_encrypted_sets_encrypt_dict() {
        let json = r#"{
            "config": {"security": {"enabled": true, "version": "V2", "ownerPassword": "o", "userPassword": "u"}},
            "elements": [{"type": "table", "table": {
                "maxcolumns": 1,
                "rows": [{"row": [{"props": "font1:12:000:left:0:0:0:0", "text": "secret"}]}]
            }}]
        }"#;
        let bytes = generate(json).unwrap();
        assert!(bytes.windows(b"/Encrypt".len()).any(|w| w == b"/Encrypt"));
    }

    #[test]
    fn test_generate_rejects_invalid_json() {
        assert!(generate("{not json").is_err());
    }

    fn one_page_doc() -> Vec<u8> {
        let json = r#"{
            "elements": [{"type": "table", "table": {
                "maxcolumns": 1,
                "rows": [{"row": [{"props": "font1:12:000:left:0:0:0:0", "text": "a page"}]}]
            }}]
        }"#;
        generate(json).unwrap()
    }

    #[test]
    fn test_merge_combines_page_counts() {
        let a = one_page_doc();
        let b = one_page_doc();
        let merged_bytes = merge(vec![a, b]).unwrap();
        let doc = lopdf::Document::load_mem(&merged_bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_merge_empty_list_errors() {
        assert!(merge(vec![]).is_err());
    }
}
