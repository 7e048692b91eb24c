//! Split: extract page ranges from a PDF into independent documents, the
//! mirror image of `pdf::merge_pdfs` (spec.md §6's `split(pdf, spec) →
//! Result<Vec<Bytes>, Error>`).
//!
//! Each output group gets its own renumbered object graph built the same
//! way `merge_pdfs` builds its combined one: collect the objects the
//! group's pages transitively reference, renumber, and wire up a fresh
//! `/Catalog`/`/Pages`.

use std::collections::{BTreeMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};

/// A comma-separated list of 1-based page numbers and inclusive ranges,
/// e.g. `"1-3,5,8-9"`. Each comma-separated group becomes one output
/// document; `"1-3,5,8-9"` produces two PDFs (pages 1-3 and pages 5,8-9)
/// when `one_per_group` is used via `split`, or every page its own
/// document when the spec is just `"all"`.
fn parse_spec(spec: &str, page_count: usize) -> Result<Vec<Vec<usize>>> {
    let spec = spec.trim();
    if spec.eq_ignore_ascii_case("all") {
        return Ok((1..=page_count).map(|p| vec![p]).collect());
    }

    let mut groups = Vec::new();
    for group in spec.split(',') {
        let group = group.trim();
        if group.is_empty() {
            continue;
        }
        let pages = if let Some((start, end)) = group.split_once('-') {
            let start: usize = start.trim().parse().map_err(|_| invalid_spec(spec))?;
            let end: usize = end.trim().parse().map_err(|_| invalid_spec(spec))?;
            if start == 0 || end < start {
                return Err(invalid_spec(spec));
            }
            (start..=end).collect()
        } else {
            let page: usize = group.parse().map_err(|_| invalid_spec(spec))?;
            if page == 0 {
                return Err(invalid_spec(spec));
            }
            vec![page]
        };
        for &p in &pages {
            if p > page_count {
                return Err(Error::TemplateInvalid(format!(
                    "split spec references page {p} but the document only has {page_count} pages"
                )));
            }
        }
        groups.push(pages);
    }
    if groups.is_empty() {
        return Err(invalid_spec(spec));
    }
    Ok(groups)
}

fn invalid_spec(spec: &str) -> Error {
    Error::TemplateInvalid(format!("invalid split spec {spec:?}, expected e.g. \"1-3,5,8-9\" or \"all\""))
}

/// Extract the page ids for `doc` in document order (the teacher's
/// `merge_pdfs` uses `Document::get_pages()` for the same purpose).
fn ordered_page_ids(doc: &Document) -> Vec<ObjectId> {
    let pages = doc.get_pages();
    let mut ids: Vec<(u32, ObjectId)> = pages.into_iter().collect();
    ids.sort_by_key(|(page_num, _)| *page_num);
    ids.into_iter().map(|(_, id)| id).collect()
}

/// Walk every object a page dictionary reaches (directly and through
/// nested dictionaries/arrays/streams), so embedded fonts, images and
/// annotations travel with their page into the new document.
fn collect_referenced(doc: &Document, start: ObjectId, seen: &mut HashSet<ObjectId>) {
    if !seen.insert(start) {
        return;
    }
    let Ok(obj) = doc.get_object(start) else { return };
    collect_from_object(doc, obj, seen);
}

fn collect_from_object(doc: &Document, obj: &Object, seen: &mut HashSet<ObjectId>) {
    match obj {
        Object::Reference(id) => collect_referenced(doc, *id, seen),
        Object::Dictionary(dict) => {
            for (_, v) in dict.iter() {
                collect_from_object(doc, v, seen);
            }
        }
        Object::Array(arr) => {
            for v in arr {
                collect_from_object(doc, v, seen);
            }
        }
        Object::Stream(stream) => {
            for (_, v) in stream.dict.iter() {
                collect_from_object(doc, v, seen);
            }
        }
        _ => {}
    }
}

/// Build one standalone PDF from the given (already-loaded) page ids.
fn build_subset(doc: &Document, page_ids: &[ObjectId]) -> Result<Vec<u8>> {
    let mut seen = HashSet::new();
    for &id in page_ids {
        collect_referenced(doc, id, &mut seen);
    }

    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    for id in &seen {
        if let Ok(obj) = doc.get_object(*id) {
            let mut obj = obj.clone();
            if let Object::Dictionary(ref mut dict) = obj {
                // Parent is rewritten once the new Pages id is known below;
                // strip it here so a stale reference into the source
                // document's object space never survives into the subset.
                let _ = dict.remove(b"Parent");
            }
            objects.insert(*id, obj);
        }
    }

    let mut out = Document::with_version(doc.version.clone());
    out.objects.extend(objects);
    out.max_id = page_ids.iter().chain(seen.iter()).map(|id| id.0).max().unwrap_or(0);

    let pages_id = out.new_object_id();
    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", Object::Integer(page_ids.len() as i64));
    pages_dict.set("Kids", Object::Array(kids));
    out.objects.insert(pages_id, Object::Dictionary(pages_dict));

    for &page_id in page_ids {
        if let Some(Object::Dictionary(dict)) = out.objects.get_mut(&page_id) {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }

    let catalog_id = out.new_object_id();
    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    out.objects.insert(catalog_id, Object::Dictionary(catalog));
    out.trailer.set("Root", Object::Reference(catalog_id));

    out.compress();
    let mut bytes = Vec::new();
    out.save_to(&mut bytes)?;
    Ok(bytes)
}

/// Split `pdf_bytes` into one document per comma-separated group in
/// `spec` (1-based page numbers/ranges), or one document per page when
/// `spec` is `"all"`.
pub fn split(pdf_bytes: &[u8], spec: &str) -> Result<Vec<Vec<u8>>> {
    let doc = Document::load_mem(pdf_bytes)?;
    let all_pages = ordered_page_ids(&doc);
    if all_pages.is_empty() {
        return Err(Error::General("PDF has no pages".to_string()));
    }

    let groups = parse_spec(spec, all_pages.len())?;
    groups
        .into_iter()
        .map(|group| {
            let ids: Vec<ObjectId> = group.iter().map(|&p| all_pages[p - 1]).collect();
            build_subset(&doc, &ids)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_pdf(page_count: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for _ in 0..page_count {
            let content_id = doc.add_object(Object::Stream(lopdf::Stream::new(Dictionary::new(), b"".to_vec())));
            let mut page = Dictionary::new();
            page.set("Type", Object::Name(b"Page".to_vec()));
            page.set("Parent", Object::Reference(pages_id));
            page.set("Contents", Object::Reference(content_id));
            page.set("MediaBox", Object::Array(vec![Object::Integer(0); 4]));
            let page_id = doc.add_object(Object::Dictionary(page));
            kids.push(Object::Reference(page_id));
        }
        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(page_count as i64));
        pages.set("Kids", Object::Array(kids));
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(Object::Dictionary({
            let mut c = Dictionary::new();
            c.set("Type", Object::Name(b"Catalog".to_vec()));
            c.set("Pages", Object::Reference(pages_id));
            c
        }));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_split_all_produces_one_doc_per_page() {
        let pdf = tiny_pdf(3);
        let parts = split(&pdf, "all").unwrap();
        assert_eq!(parts.len(), 3);
        for part in &parts {
            let doc = Document::load_mem(part).unwrap();
            assert_eq!(doc.get_pages().len(), 1);
        }
    }

    #[test]
    fn test_split_ranges_group_pages() {
        let pdf = tiny_pdf(5);
        let parts = split(&pdf, "1-2,3-5").unwrap();
        assert_eq!(parts.len(), 2);
        let doc0 = Document::load_mem(&parts[0]).unwrap();
        let doc1 = Document::load_mem(&parts[1]).unwrap();
        assert_eq!(doc0.get_pages().len(), 2);
        assert_eq!(doc1.get_pages().len(), 3);
    }

    #[test]
    fn test_split_out_of_range_page_errors() {
        let pdf = tiny_pdf(2);
        assert!(split(&pdf, "1-5").is_err());
    }

    #[test]
    fn test_split_invalid_spec_errors() {
        let pdf = tiny_pdf(2);
        assert!(split(&pdf, "not-a-spec!!").is_err());
    }
}
