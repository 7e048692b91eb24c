//! Forms Module: synthesizes AcroForm widget annotations for
//! `Cell.form_field` entries and assembles the `/AcroForm` root dictionary
//! (spec.md §4.6).

use std::collections::HashMap;

use lopdf::{Dictionary, Object, ObjectId};

use crate::object_table::ObjectTable;
use crate::template::{FieldKind, FormField};

const FF_RADIO: i64 = 1 << 15; // bit 16
const FF_PUSHBUTTON: i64 = 1 << 16; // bit 17

/// Appearance-stream-free checkbox/radio `/AP` dictionary: an "on" state
/// named after the export value and an "Off" state, both empty Form
/// XObjects. `/NeedAppearances true` on the AcroForm root tells the viewer
/// to regenerate the visible glyph, so these only need to exist, not draw
/// anything themselves.
fn empty_appearance_stream(objects: &mut ObjectTable, rect_w: f32, rect_h: f32) -> ObjectId {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Form".to_vec()));
    dict.set(
        "BBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(rect_w as i64),
            Object::Integer(rect_h as i64),
        ]),
    );
    objects.add(Object::Stream(lopdf::Stream {
        dict,
        content: Vec::new(),
        allows_compression: false,
        start_position: None,
    }))
}

pub struct FormsBuilder {
    field_ids: Vec<ObjectId>,
    radio_groups: HashMap<String, ObjectId>,
}

impl FormsBuilder {
    pub fn new() -> Self {
        FormsBuilder { field_ids: Vec::new(), radio_groups: HashMap::new() }
    }

    /// Emit the widget annotation for one `form_field`, returning its object
    /// id so the caller can append it to the page's `/Annots` array.
    pub fn add_field(
        &mut self,
        objects: &mut ObjectTable,
        field: &FormField,
        rect: [f32; 4],
        page_id: ObjectId,
    ) -> ObjectId {
        match field.kind {
            FieldKind::Text => self.add_text_field(objects, field, rect, page_id),
            FieldKind::Checkbox => self.add_checkbox(objects, field, rect, page_id),
            FieldKind::Radio => self.add_radio(objects, field, rect, page_id),
            FieldKind::PushButton => self.add_push_button(objects, field, rect, page_id),
        }
    }

    fn add_text_field(
        &mut self,
        objects: &mut ObjectTable,
        field: &FormField,
        rect: [f32; 4],
        page_id: ObjectId,
    ) -> ObjectId {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"Annot".to_vec()));
        dict.set("Subtype", Object::Name(b"Widget".to_vec()));
        dict.set("Rect", rect_array(rect));
        dict.set("T", Object::String(field.name.as_bytes().to_vec(), lopdf::StringFormat::Literal));
        dict.set("FT", Object::Name(b"Tx".to_vec()));
        dict.set("F", Object::Integer(4)); // Print
        dict.set("P", Object::Reference(page_id));
        let id = objects.add(Object::Dictionary(dict));
        self.field_ids.push(id);
        id
    }

    fn add_checkbox(
        &mut self,
        objects: &mut ObjectTable,
        field: &FormField,
        rect: [f32; 4],
        page_id: ObjectId,
    ) -> ObjectId {
        let export = field.export_value.clone().unwrap_or_else(|| "Yes".to_string());
        let state: &str = if field.checked { &export } else { "Off" };
        let w = rect[2] - rect[0];
        let h = rect[3] - rect[1];
        let on_ap = empty_appearance_stream(objects, w, h);
        let off_ap = empty_appearance_stream(objects, w, h);

        let mut ap_n = Dictionary::new();
        ap_n.set(export.as_str(), Object::Reference(on_ap));
        ap_n.set("Off", Object::Reference(off_ap));
        let mut ap = Dictionary::new();
        ap.set("N", Object::Dictionary(ap_n));

        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"Annot".to_vec()));
        dict.set("Subtype", Object::Name(b"Widget".to_vec()));
        dict.set("Rect", rect_array(rect));
        dict.set("T", Object::String(field.name.as_bytes().to_vec(), lopdf::StringFormat::Literal));
        dict.set("FT", Object::Name(b"Btn".to_vec()));
        dict.set("F", Object::Integer(4));
        dict.set("P", Object::Reference(page_id));
        dict.set("AS", Object::Name(state.as_bytes().to_vec()));
        dict.set("V", Object::Name(state.as_bytes().to_vec()));
        dict.set("AP", Object::Dictionary(ap));
        let id = objects.add(Object::Dictionary(dict));
        self.field_ids.push(id);
        id
    }

    /// Radio buttons in the same `group_name` share a parent field object
    /// (created lazily on first sight) that holds `/FT /Btn /Ff <radio
    /// flag>`; each widget is a kid carrying its own export-value appearance
    /// states, per spec.md §4.6.
    fn add_radio(
        &mut self,
        objects: &mut ObjectTable,
        field: &FormField,
        rect: [f32; 4],
        page_id: ObjectId,
    ) -> ObjectId {
        let group = field.group_name.clone().unwrap_or_else(|| field.name.clone());
        let export = field.export_value.clone().unwrap_or_else(|| "Yes".to_string());
        let w = rect[2] - rect[0];
        let h = rect[3] - rect[1];
        let on_ap = empty_appearance_stream(objects, w, h);
        let off_ap = empty_appearance_stream(objects, w, h);

        let mut ap_n = Dictionary::new();
        ap_n.set(export.as_str(), Object::Reference(on_ap));
        ap_n.set("Off", Object::Reference(off_ap));
        let mut ap = Dictionary::new();
        ap.set("N", Object::Dictionary(ap_n));

        let parent_id = *self.radio_groups.entry(group.clone()).or_insert_with(|| {
            let mut parent = Dictionary::new();
            parent.set("FT", Object::Name(b"Btn".to_vec()));
            parent.set("T", Object::String(group.as_bytes().to_vec(), lopdf::StringFormat::Literal));
            parent.set("Ff", Object::Integer(FF_RADIO));
            parent.set("Kids", Object::Array(Vec::new()));
            let id = objects.add(Object::Dictionary(parent));
            self.field_ids.push(id);
            id
        });

        let state: &str = if field.checked { &export } else { "Off" };
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"Annot".to_vec()));
        dict.set("Subtype", Object::Name(b"Widget".to_vec()));
        dict.set("Rect", rect_array(rect));
        dict.set("Parent", Object::Reference(parent_id));
        dict.set("F", Object::Integer(4));
        dict.set("P", Object::Reference(page_id));
        dict.set("AS", Object::Name(state.as_bytes().to_vec()));
        dict.set("AP", Object::Dictionary(ap));
        let widget_id = objects.add(Object::Dictionary(dict));

        if field.checked {
            if let Some(Object::Dictionary(parent)) = objects.get_mut(parent_id) {
                parent.set("V", Object::Name(export.as_bytes().to_vec()));
            }
        }
        if let Some(Object::Dictionary(parent)) = objects.get_mut(parent_id) {
            if let Ok(Object::Array(kids)) = parent.get_mut(b"Kids") {
                kids.push(Object::Reference(widget_id));
            }
        }
        widget_id
    }

    /// Push buttons are momentary (`/Ff` bit 17): no `/AS`/`/V` state to
    /// track, just a single `/AP /N` appearance and an `/MK /CA` caption
    /// taken from `export_value`, falling back to the field name.
    fn add_push_button(
        &mut self,
        objects: &mut ObjectTable,
        field: &FormField,
        rect: [f32; 4],
        page_id: ObjectId,
    ) -> ObjectId {
        let caption = field.export_value.clone().unwrap_or_else(|| field.name.clone());
        let w = rect[2] - rect[0];
        let h = rect[3] - rect[1];
        let ap_n = empty_appearance_stream(objects, w, h);

        let mut ap = Dictionary::new();
        ap.set("N", Object::Reference(ap_n));

        let mut mk = Dictionary::new();
        mk.set("CA", Object::String(caption.into_bytes(), lopdf::StringFormat::Literal));

        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"Annot".to_vec()));
        dict.set("Subtype", Object::Name(b"Widget".to_vec()));
        dict.set("Rect", rect_array(rect));
        dict.set("T", Object::String(field.name.as_bytes().to_vec(), lopdf::StringFormat::Literal));
        dict.set("FT", Object::Name(b"Btn".to_vec()));
        dict.set("Ff", Object::Integer(FF_PUSHBUTTON));
        dict.set("F", Object::Integer(4));
        dict.set("P", Object::Reference(page_id));
        dict.set("MK", Object::Dictionary(mk));
        dict.set("AP", Object::Dictionary(ap));
        let id = objects.add(Object::Dictionary(dict));
        self.field_ids.push(id);
        id
    }

    /// Emit the `/AcroForm` root dictionary. Returns `None` if no fields
    /// were ever added, so the driver can skip setting `/AcroForm` entirely.
    pub fn finish(self, objects: &mut ObjectTable) -> Option<ObjectId> {
        if self.field_ids.is_empty() {
            return None;
        }
        let mut acroform = Dictionary::new();
        acroform.set(
            "Fields",
            Object::Array(self.field_ids.into_iter().map(Object::Reference).collect()),
        );
        acroform.set("NeedAppearances", Object::Boolean(true));
        acroform.set("DA", Object::String(b"/Helv 0 Tf 0 g".to_vec(), lopdf::StringFormat::Literal));
        Some(objects.add(Object::Dictionary(acroform)))
    }
}

impl Default for FormsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn rect_array(rect: [f32; 4]) -> Object {
    Object::Array(rect.iter().map(|v| Object::Real(*v)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::FieldKind;

    #[test]
    fn test_text_field_widget() {
        let mut objects = ObjectTable::new();
        let page_id = objects.reserve();
        let mut forms = FormsBuilder::new();
        let field = FormField {
            name: "first_name".to_string(),
            kind: FieldKind::Text,
            group_name: None,
            checked: false,
            export_value: None,
        };
        let id = forms.add_field(&mut objects, &field, [10.0, 10.0, 100.0, 30.0], page_id);
        assert!(objects.get(id).is_some());
        let acro = forms.finish(&mut objects).unwrap();
        assert!(objects.get(acro).is_some());
    }

    #[test]
    fn test_radio_group_shares_parent() {
        let mut objects = ObjectTable::new();
        let page_id = objects.reserve();
        let mut forms = FormsBuilder::new();
        let a = FormField {
            name: "opt_a".to_string(),
            kind: FieldKind::Radio,
            group_name: Some("choice".to_string()),
            checked: true,
            export_value: Some("A".to_string()),
        };
        let b = FormField {
            name: "opt_b".to_string(),
            kind: FieldKind::Radio,
            group_name: Some("choice".to_string()),
            checked: false,
            export_value: Some("B".to_string()),
        };
        forms.add_field(&mut objects, &a, [0.0, 0.0, 10.0, 10.0], page_id);
        forms.add_field(&mut objects, &b, [20.0, 0.0, 30.0, 10.0], page_id);
        assert_eq!(forms.radio_groups.len(), 1);
    }

    #[test]
    fn test_push_button_sets_ff_bit() {
        let mut objects = ObjectTable::new();
        let page_id = objects.reserve();
        let mut forms = FormsBuilder::new();
        let field = FormField {
            name: "submit".to_string(),
            kind: FieldKind::PushButton,
            group_name: None,
            checked: false,
            export_value: Some("Submit".to_string()),
        };
        let id = forms.add_field(&mut objects, &field, [0.0, 0.0, 80.0, 20.0], page_id);
        let Some(Object::Dictionary(dict)) = objects.get(id) else { panic!("widget missing") };
        assert_eq!(dict.get(b"Ff").unwrap().as_i64().unwrap(), FF_PUSHBUTTON);
        assert_eq!(dict.get(b"FT").unwrap().as_name().unwrap(), b"Btn");
    }

    #[test]
    fn test_no_fields_yields_no_acroform() {
        let mut objects = ObjectTable::new();
        let forms = FormsBuilder::new();
        assert!(forms.finish(&mut objects).is_none());
    }
}
