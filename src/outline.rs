//! Bookmark/Outline + Links: two-phase destination resolution (collect then
//! emit) and the `/Outlines` tree (spec.md §4.7).

use std::collections::HashMap;

use lopdf::{Dictionary, Object, ObjectId};

use crate::template::Bookmark;

/// Where a named destination points: a page index (0-based) and the y
/// coordinate to scroll to, captured at the moment the walker emitted the
/// element that declared the `dest`.
#[derive(Debug, Clone, Copy)]
pub struct Destination {
    pub page_index: usize,
    pub y: f32,
}

/// Collected during the walk; consumed when links/outlines are finally
/// emitted once every page's content exists.
#[derive(Default)]
pub struct DestinationTable {
    dests: HashMap<String, Destination>,
}

impl DestinationTable {
    pub fn new() -> Self {
        DestinationTable::default()
    }

    pub fn record(&mut self, name: impl Into<String>, page_index: usize, y: f32) {
        self.dests.insert(name.into(), Destination { page_index, y });
    }

    pub fn get(&self, name: &str) -> Option<Destination> {
        self.dests.get(name).copied()
    }
}

/// A resolved external or internal link, ready to become a `/Link`
/// annotation once the enclosing page's object id is known.
pub enum LinkTarget {
    Uri(String),
    Internal { page_index: usize, y: f32 },
}

pub fn emit_link_annotation(
    target: &LinkTarget,
    rect: [f32; 4],
    page_ids: &[ObjectId],
) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"Annot".to_vec()));
    dict.set("Subtype", Object::Name(b"Link".to_vec()));
    dict.set("Rect", Object::Array(rect.iter().map(|v| Object::Real(*v)).collect()));
    dict.set("Border", Object::Array(vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)]));
    match target {
        LinkTarget::Uri(uri) => {
            let mut action = Dictionary::new();
            action.set("S", Object::Name(b"URI".to_vec()));
            action.set("URI", Object::String(uri.as_bytes().to_vec(), lopdf::StringFormat::Literal));
            dict.set("A", Object::Dictionary(action));
        }
        LinkTarget::Internal { page_index, y } => {
            if let Some(&page_id) = page_ids.get(*page_index) {
                dict.set(
                    "Dest",
                    Object::Array(vec![
                        Object::Reference(page_id),
                        Object::Name(b"XYZ".to_vec()),
                        Object::Null,
                        Object::Real(*y),
                        Object::Null,
                    ]),
                );
            }
        }
    }
    dict
}

/// Emit the `/Outlines` tree for `bookmarks`, returning the outline
/// dictionary's object id and the total open-item count (for the
/// catalog's `/PageMode /UseOutlines` heuristic), or `None` if there are
/// no bookmarks.
pub fn emit_outline_tree(
    bookmarks: &[Bookmark],
    dests: &DestinationTable,
    page_ids: &[ObjectId],
    objects: &mut crate::object_table::ObjectTable,
) -> Option<ObjectId> {
    if bookmarks.is_empty() {
        return None;
    }
    let root_id = objects.reserve();
    let (first, last, count) = emit_siblings(bookmarks, root_id, dests, page_ids, objects);

    let mut root = Dictionary::new();
    root.set("Type", Object::Name(b"Outlines".to_vec()));
    if let Some(first) = first {
        root.set("First", Object::Reference(first));
    }
    if let Some(last) = last {
        root.set("Last", Object::Reference(last));
    }
    root.set("Count", Object::Integer(count));
    objects.write(root_id, Object::Dictionary(root)).ok()?;
    Some(root_id)
}

/// Recursively emit a run of sibling bookmark items, returning
/// `(first_id, last_id, total_visible_descendant_count)`.
fn emit_siblings(
    items: &[Bookmark],
    parent_id: ObjectId,
    dests: &DestinationTable,
    page_ids: &[ObjectId],
    objects: &mut crate::object_table::ObjectTable,
) -> (Option<ObjectId>, Option<ObjectId>, i64) {
    let ids: Vec<ObjectId> = items.iter().map(|_| objects.reserve()).collect();
    let mut total_count = 0i64;

    for (i, (item, &id)) in items.iter().zip(ids.iter()).enumerate() {
        let (child_first, child_last, child_count) =
            emit_siblings(&item.children, id, dests, page_ids, objects);

        let mut dict = Dictionary::new();
        dict.set("Title", Object::String(item.title.as_bytes().to_vec(), lopdf::StringFormat::Literal));
        dict.set("Parent", Object::Reference(parent_id));
        if i > 0 {
            dict.set("Prev", Object::Reference(ids[i - 1]));
        }
        if i + 1 < ids.len() {
            dict.set("Next", Object::Reference(ids[i + 1]));
        }
        if let Some(first) = child_first {
            dict.set("First", Object::Reference(first));
        }
        if let Some(last) = child_last {
            dict.set("Last", Object::Reference(last));
        }
        if !item.children.is_empty() {
            // Negative count = closed by default unless the item says
            // otherwise; positive = expanded, per PDF 32000-1 §12.3.3.
            dict.set("Count", Object::Integer(if item.open { child_count } else { -child_count }));
        }

        let dest = item
            .dest
            .as_deref()
            .and_then(|d| dests.get(d))
            .or(item.page.map(|p| Destination { page_index: p, y: item.y.unwrap_or(0.0) }));
        if let Some(dest) = dest {
            if let Some(&page_id) = page_ids.get(dest.page_index) {
                dict.set(
                    "Dest",
                    Object::Array(vec![
                        Object::Reference(page_id),
                        Object::Name(b"XYZ".to_vec()),
                        Object::Null,
                        Object::Real(dest.y),
                        Object::Null,
                    ]),
                );
            }
        }

        objects.write(id, Object::Dictionary(dict)).expect("id was freshly reserved");
        total_count += 1 + child_count.unsigned_abs() as i64;
    }

    (ids.first().copied(), ids.last().copied(), total_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_table_roundtrip() {
        let mut table = DestinationTable::new();
        table.record("intro", 2, 700.0);
        let dest = table.get("intro").unwrap();
        assert_eq!(dest.page_index, 2);
        assert_eq!(dest.y, 700.0);
    }

    #[test]
    fn test_emit_outline_tree_empty_is_none() {
        let mut objects = crate::object_table::ObjectTable::new();
        let dests = DestinationTable::new();
        assert!(emit_outline_tree(&[], &dests, &[], &mut objects).is_none());
    }

    #[test]
    fn test_emit_outline_tree_single_item() {
        let mut objects = crate::object_table::ObjectTable::new();
        let page_id = objects.add(Object::Dictionary(Dictionary::new()));
        let dests = DestinationTable::new();
        let bookmarks = vec![Bookmark {
            title: "Chapter 1".to_string(),
            page: Some(0),
            dest: None,
            y: Some(800.0),
            children: Vec::new(),
            open: true,
        }];
        let id = emit_outline_tree(&bookmarks, &dests, &[page_id], &mut objects);
        assert!(id.is_some());
    }
}
