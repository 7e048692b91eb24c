//! Filler: mutates an existing PDF's AcroForm widget values from an XFDF
//! payload without fully re-parsing the object graph (spec.md §4.11).
//!
//! Operates by byte-scanning `N 0 obj … endobj` blocks directly rather
//! than going through `lopdf::Document::load` — the teacher's
//! `pdf/merge.rs` uses `lopdf` for whole-document work, but a filler that
//! must preserve byte-for-byte everything except the touched `/V` entries
//! (so an existing signature's ByteRange-excluded bytes aren't disturbed
//! more than necessary) works directly on the raw bytes instead.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// One `id N obj ... endobj` block located in the source bytes.
struct ObjectBlock {
    id: u32,
    start: usize, // offset of the object's body start (just after "obj")
    end: usize,   // offset of "endobj"
}

/// Fill form field values in `pdf_bytes` from `xfdf_bytes`, returning the
/// rewritten PDF. See spec.md §4.11 for the five-step algorithm.
pub fn fill(pdf_bytes: &[u8], xfdf_bytes: &[u8]) -> Result<Vec<u8>> {
    if find_subslice(pdf_bytes, b"/Type/ObjStm").is_some() || find_subslice(pdf_bytes, b"/Type /ObjStm").is_some() {
        return Err(Error::CompressedObjectStreamUnsupported);
    }

    let blocks = scan_object_blocks(pdf_bytes);
    let values = parse_xfdf(xfdf_bytes)?;

    let mut out = pdf_bytes.to_vec();
    // Apply patches back-to-front so earlier offsets stay valid as later
    // ones in the same pass shift the buffer.
    let mut patches: Vec<(usize, String)> = Vec::new(); // (insert offset, text)

    for block in &blocks {
        let body = &pdf_bytes[block.start..block.end];
        if !(contains(body, b"/Subtype/Widget") || contains(body, b"/Subtype /Widget"))
            || !(contains(body, b"/Type/Annot") || contains(body, b"/Type /Annot"))
        {
            continue;
        }
        let Some(field_name) = extract_field_name(body) else { continue };
        let Some(value) = values.get(&field_name) else { continue };
        if contains(body, b"/V") {
            continue; // do not double-insert
        }
        let Some(dict_close) = find_dict_close(body) else { continue };
        let insert_at = block.start + dict_close;
        patches.push((insert_at, format!("/V({})", escape_pdf_literal(value))));
    }

    patches.sort_by(|a, b| b.0.cmp(&a.0));
    for (offset, text) in patches {
        out.splice(offset..offset, text.into_bytes());
    }

    set_need_appearances(&mut out);
    // A classic (non-stream) xref's byte offsets are now stale; rebuild it
    // rather than leaving dangling `startxref` pointers.
    rewrite_xref_and_trailer(&mut out);
    Ok(out)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find_subslice(haystack, needle).is_some()
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Scan for `N 0 obj ... endobj` blocks. A linear byte scan rather than a
/// regex crate dependency, matching the byte-oriented style already used
/// in `security.rs`/`signature.rs` for PDF surgery.
fn scan_object_blocks(bytes: &[u8]) -> Vec<ObjectBlock> {
    let mut blocks = Vec::new();
    let mut i = 0;
    while i + 3 < bytes.len() {
        if &bytes[i..i + 3] == b"obj" && (i == 0 || !bytes[i - 1].is_ascii_alphanumeric()) {
            // Walk backward over " 0 obj" / " N 0 obj" to find the id.
            if let Some(id) = parse_obj_header_backward(bytes, i) {
                if let Some(end_rel) = find_subslice(&bytes[i..], b"endobj") {
                    blocks.push(ObjectBlock { id, start: i + 3, end: i + end_rel });
                }
            }
        }
        i += 1;
    }
    blocks
}

fn parse_obj_header_backward(bytes: &[u8], obj_pos: usize) -> Option<u32> {
    let mut j = obj_pos;
    // Skip whitespace before "obj"
    while j > 0 && bytes[j - 1].is_ascii_whitespace() {
        j -= 1;
    }
    // Generation number (digits)
    let gen_end = j;
    while j > 0 && bytes[j - 1].is_ascii_digit() {
        j -= 1;
    }
    if j == gen_end {
        return None;
    }
    while j > 0 && bytes[j - 1].is_ascii_whitespace() {
        j -= 1;
    }
    let id_end = j;
    while j > 0 && bytes[j - 1].is_ascii_digit() {
        j -= 1;
    }
    if j == id_end {
        return None;
    }
    std::str::from_utf8(&bytes[j..id_end]).ok()?.parse().ok()
}

/// Extract the `/T (Name)` field name from a widget dictionary body.
fn extract_field_name(body: &[u8]) -> Option<String> {
    let pos = find_subslice(body, b"/T(").or_else(|| find_subslice(body, b"/T ("))?;
    let open = body[pos..].iter().position(|&b| b == b'(')? + pos;
    let mut depth = 0i32;
    let mut j = open;
    loop {
        match body.get(j)? {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            b'\\' => j += 1, // skip escaped char
            _ => {}
        }
        j += 1;
    }
    String::from_utf8(unescape_pdf_literal(&body[open + 1..j])).ok()
}

fn unescape_pdf_literal(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            out.push(bytes[i + 1]);
            i += 2;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

fn escape_pdf_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '(' || c == ')' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Bracket-matched scan for the dictionary's closing `>>`, returning the
/// offset (relative to `body`) to insert just before it.
fn find_dict_close(body: &[u8]) -> Option<usize> {
    let start = find_subslice(body, b"<<")?;
    let mut depth = 0i32;
    let mut i = start;
    while i + 1 < body.len() {
        if &body[i..i + 2] == b"<<" {
            depth += 1;
            i += 2;
        } else if &body[i..i + 2] == b">>" {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
            i += 2;
        } else {
            i += 1;
        }
    }
    None
}

/// XFDF field/value pairs: `<field name="X"><value>V</value></field>`.
fn parse_xfdf(xfdf_bytes: &[u8]) -> Result<HashMap<String, String>> {
    let text = std::str::from_utf8(xfdf_bytes)
        .map_err(|e| Error::TemplateInvalid(format!("XFDF is not valid UTF-8: {e}")))?;
    let mut values = HashMap::new();
    let mut rest = text;
    while let Some(field_pos) = rest.find("<field") {
        rest = &rest[field_pos..];
        let name_attr = rest.find("name=\"").ok_or_else(|| Error::TemplateInvalid("XFDF field missing name attribute".to_string()))?;
        let name_start = name_attr + "name=\"".len();
        let name_end = rest[name_start..].find('"').map(|p| name_start + p).ok_or_else(|| Error::TemplateInvalid("unterminated XFDF name attribute".to_string()))?;
        let name = rest[name_start..name_end].to_string();

        let field_end = rest.find("</field>").unwrap_or(rest.len());
        let field_body = &rest[name_end..field_end];
        if let Some(v_start) = field_body.find("<value>") {
            let v_start = v_start + "<value>".len();
            if let Some(v_end) = field_body[v_start..].find("</value>") {
                values.insert(name, field_body[v_start..v_start + v_end].to_string());
            }
        }
        rest = &rest[field_end.min(rest.len())..];
        if rest.is_empty() {
            break;
        }
    }
    Ok(values)
}

/// Append a fresh classic xref table + trailer pointing at the
/// now-correct object offsets, per spec.md §4.11 step 5. The stale
/// original xref/trailer are left in place (harmless: readers follow the
/// last `startxref`), avoiding an in-place rewrite that would itself
/// shift every later offset.
fn rewrite_xref_and_trailer(bytes: &mut Vec<u8>) {
    let root_ref = find_root_reference(bytes);
    let mut offsets: HashMap<u32, usize> = HashMap::new();
    let mut max_id = 0u32;
    for block in scan_object_blocks(bytes) {
        let obj_keyword_pos = block.start - 3; // "start" is just past the "obj" keyword
        let header_start = find_obj_header_start(bytes, obj_keyword_pos);
        offsets.insert(block.id, header_start);
        max_id = max_id.max(block.id);
    }

    let xref_offset = bytes.len();
    let mut xref = String::new();
    xref.push_str("xref\n");
    xref.push_str(&format!("0 {}\n", max_id + 1));
    xref.push_str("0000000000 65535 f \n");
    for id in 1..=max_id {
        match offsets.get(&id) {
            Some(&offset) => xref.push_str(&format!("{:010} 00000 n \n", offset)),
            None => xref.push_str("0000000000 00000 f \n"),
        }
    }
    xref.push_str("trailer\n<< /Size ");
    xref.push_str(&(max_id + 1).to_string());
    if let Some(root) = root_ref {
        xref.push_str(&format!(" /Root {root} 0 R"));
    }
    xref.push_str(" >>\nstartxref\n");
    xref.push_str(&xref_offset.to_string());
    xref.push_str("\n%%EOF\n");

    bytes.extend_from_slice(xref.as_bytes());
}

fn find_obj_header_start(bytes: &[u8], obj_keyword_pos: usize) -> usize {
    let mut j = obj_keyword_pos;
    while j > 0 && bytes[j - 1].is_ascii_whitespace() {
        j -= 1;
    }
    while j > 0 && bytes[j - 1].is_ascii_digit() {
        j -= 1;
    }
    while j > 0 && bytes[j - 1].is_ascii_whitespace() {
        j -= 1;
    }
    while j > 0 && bytes[j - 1].is_ascii_digit() {
        j -= 1;
    }
    j
}

fn find_root_reference(bytes: &[u8]) -> Option<u32> {
    let pos = find_subslice(bytes, b"/Root")?;
    let after = pos + b"/Root".len();
    let mut j = after;
    while j < bytes.len() && bytes[j].is_ascii_whitespace() {
        j += 1;
    }
    let start = j;
    while j < bytes.len() && bytes[j].is_ascii_digit() {
        j += 1;
    }
    std::str::from_utf8(&bytes[start..j]).ok()?.parse().ok()
}

/// Insert `/NeedAppearances true` into the first `/AcroForm` dictionary
/// found, if not already present.
fn set_need_appearances(bytes: &mut Vec<u8>) {
    if contains(bytes, b"/NeedAppearances") {
        return;
    }
    let Some(pos) = find_subslice(bytes, b"/AcroForm") else { return };
    let Some(dict_open_rel) = find_subslice(&bytes[pos..], b"<<") else { return };
    let dict_open = pos + dict_open_rel;
    let insert_at = dict_open + 2;
    bytes.splice(insert_at..insert_at, b"/NeedAppearances true".to_vec());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pdf() -> Vec<u8> {
        b"%PDF-1.7\n\
          1 0 obj\n<< /Type /Catalog /AcroForm 3 0 R >>\nendobj\n\
          2 0 obj\n<< /Type /Annot /Subtype /Widget /T (first_name) /FT /Tx >>\nendobj\n\
          3 0 obj\n<< /Fields [2 0 R] >>\nendobj\n\
          trailer\n<< /Root 1 0 R >>\n"
            .to_vec()
    }

    fn sample_xfdf() -> Vec<u8> {
        br#"<?xml version="1.0"?><xfdf><fields><field name="first_name"><value>Ada</value></field></fields></xfdf>"#.to_vec()
    }

    #[test]
    fn test_fill_inserts_value_into_widget() {
        let out = fill(&sample_pdf(), &sample_xfdf()).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("/V(Ada)"));
    }

    #[test]
    fn test_fill_does_not_double_insert() {
        let mut pdf = sample_pdf();
        let text = String::from_utf8(pdf.clone()).unwrap();
        let patched = text.replace("/FT /Tx", "/FT /Tx /V(Existing)");
        pdf = patched.into_bytes();
        let out = fill(&pdf, &sample_xfdf()).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert_eq!(text.matches("/V(").count(), 1);
    }

    #[test]
    fn test_fill_sets_need_appearances() {
        let out = fill(&sample_pdf(), &sample_xfdf()).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("/NeedAppearances true"));
    }

    #[test]
    fn test_fill_rejects_object_streams() {
        let mut pdf = sample_pdf();
        pdf.extend_from_slice(b"4 0 obj\n<< /Type /ObjStm >>\nendobj\n");
        assert!(matches!(fill(&pdf, &sample_xfdf()), Err(Error::CompressedObjectStreamUnsupported)));
    }

    #[test]
    fn test_parse_xfdf_single_field() {
        let values = parse_xfdf(&sample_xfdf()).unwrap();
        assert_eq!(values.get("first_name"), Some(&"Ada".to_string()));
    }
}
