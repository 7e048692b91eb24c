//! Object Table: assigns dense, monotonically increasing object ids and
//! tracks which ones have been written, per spec.md §4.1.
//!
//! This wraps an `lopdf::Document` rather than hand-rolling xref/trailer
//! bytes from scratch (the teacher's `merge.rs`/`headers.rs` already lean on
//! `lopdf` for exactly this: `new_object_id`, `objects.insert`,
//! `trailer.set`). `lopdf::Document::save_to` performs the xref/trailer
//! emission described in §4.1 as long as every id we hand out is densely
//! used, which `reserve`/`write` enforce.

use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result, Stage};

/// Tracks indirect objects by id, matching the generation number convention
/// (`gen = 0`) the rest of the engine assumes.
pub struct ObjectTable {
    doc: Document,
    next_id: u32,
    written: HashSet<u32>,
}

impl ObjectTable {
    pub fn new() -> Self {
        ObjectTable {
            doc: Document::with_version("1.7"),
            next_id: 1,
            written: HashSet::new(),
        }
    }

    /// Allocate an id with no bytes emitted yet. Ids start at 1 and are
    /// never reused, per the §3 invariant.
    pub fn reserve(&mut self) -> ObjectId {
        let id = (self.next_id, 0);
        self.next_id += 1;
        id
    }

    /// Record the object body at `id`. Fails with `Error::ObjectOverlap`-class
    /// `InternalInvariant` if `id` was already written.
    pub fn write(&mut self, id: ObjectId, body: Object) -> Result<()> {
        if !self.written.insert(id.0) {
            return Err(Error::internal(
                Stage::ContentEmitted,
                format!("object {} written twice", id.0),
            ));
        }
        self.doc.objects.insert(id, body);
        Ok(())
    }

    /// Reserve and immediately write in one call, for the common case where
    /// the caller doesn't need the id before constructing the body.
    pub fn add(&mut self, body: Object) -> ObjectId {
        let id = self.reserve();
        self.written.insert(id.0);
        self.doc.objects.insert(id, body);
        id
    }

    pub fn add_dict(&mut self, dict: Dictionary) -> ObjectId {
        self.add(Object::Dictionary(dict))
    }

    /// Pad every id between 1 and the highest allocated id that was
    /// reserved but never written with `<< /Type /Null >>`, keeping the
    /// xref dense as required by §4.1.
    fn pad_unwritten(&mut self) {
        for id in 1..self.next_id {
            if !self.written.contains(&id) {
                self.doc.objects.insert((id, 0), Object::Dictionary(Dictionary::new()));
                self.written.insert(id);
            }
        }
    }

    pub fn max_id(&self) -> u32 {
        self.next_id.saturating_sub(1)
    }

    pub fn set_root(&mut self, catalog_id: ObjectId) {
        self.doc.trailer.set("Root", Object::Reference(catalog_id));
    }

    pub fn set_info(&mut self, info_id: ObjectId) {
        self.doc.trailer.set("Info", Object::Reference(info_id));
    }

    pub fn trailer_set(&mut self, key: &str, value: Object) {
        self.doc.trailer.set(key, value);
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.doc.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.doc.objects.get_mut(&id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ObjectId, &mut Object)> {
        self.doc.objects.iter_mut()
    }

    /// Borrow the underlying `lopdf::Document`. Exposed for the driver's
    /// final `save_to` call and for the Security module, which needs to
    /// mutate every string/stream object in place before the xref is built.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Flate-compress remaining uncompressed streams (page content, any
    /// XObjects without their own filter; font/image streams already carry
    /// a manual Flate filter from their own encoders and are left alone by
    /// `lopdf::Document::compress`, which skips streams that already name a
    /// filter). Mirrors the `.compress()` call `merge`/`split.rs` make
    /// before their own `save_to`. Must run before `Security::encrypt_all`,
    /// never after: compressing ciphertext would corrupt it.
    pub fn compress(&mut self) {
        self.doc.compress();
    }

    /// Finalize: pad any gaps, then serialize header/body/xref/trailer.
    pub fn finalize(mut self) -> Result<Vec<u8>> {
        self.pad_unwritten();
        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| Error::internal(Stage::PagesEmitted, format!("save_to failed: {e}")))?;
        Ok(buf)
    }
}

impl Default for ObjectTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_dense_and_monotonic() {
        let mut ot = ObjectTable::new();
        let a = ot.reserve();
        let b = ot.reserve();
        let c = ot.reserve();
        assert_eq!(a.0, 1);
        assert_eq!(b.0, 2);
        assert_eq!(c.0, 3);
    }

    #[test]
    fn test_double_write_is_error() {
        let mut ot = ObjectTable::new();
        let id = ot.reserve();
        ot.write(id, Object::Dictionary(Dictionary::new())).unwrap();
        let err = ot.write(id, Object::Dictionary(Dictionary::new()));
        assert!(err.is_err());
    }

    #[test]
    fn test_pad_unwritten_fills_gaps() {
        let mut ot = ObjectTable::new();
        let _a = ot.reserve();
        let _b = ot.reserve(); // never written
        let _c = ot.add(Object::Dictionary(Dictionary::new()));
        ot.pad_unwritten();
        assert!(ot.document().objects.contains_key(&(1, 0)));
        assert!(ot.document().objects.contains_key(&(2, 0)));
        assert!(ot.document().objects.contains_key(&(3, 0)));
    }
}
