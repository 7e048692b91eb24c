//! Page Manager: owns per-page content-stream buffers and annotation ids,
//! and the two-pass page-number back-patch (spec.md §4.5).

use lopdf::ObjectId;

use crate::error::{Error, Result, Stage};
use crate::writer::Bytes;

/// Widest page count the marker budgets for without a backpatch error.
/// `"Page 999999 of 999999"` comfortably covers any document this engine
/// would ever paginate; sized per spec.md §9's `ceil(log10(total_pages))`
/// guidance rather than the page count of any one document, since the
/// marker has to be written to the content stream before the final count
/// is known.
const MAX_PAGE_DIGITS: usize = 6;

/// A unique byte marker the walker writes in place of a page-number string
/// it can't know yet (total page count isn't known until every element has
/// been walked). Guarded by NUL/SOH bytes vanishingly unlikely to appear in
/// literal template text, and padded wide enough that `backpatch_page_numbers`
/// never has to truncate a real page count into it.
pub const PAGE_MARKER: &str = "\u{0}\u{1}PAGE 999999 OF 999999\u{1}\u{0}";

pub struct Page {
    pub content: Bytes,
    pub annots: Vec<ObjectId>,
}

impl Page {
    fn new() -> Self {
        Page { content: Bytes::new(), annots: Vec::new() }
    }
}

#[derive(Default)]
pub struct PageManager {
    pages: Vec<Page>,
}

impl PageManager {
    pub fn new() -> Self {
        PageManager::default()
    }

    pub fn new_page(&mut self) -> usize {
        self.pages.push(Page::new());
        self.pages.len() - 1
    }

    pub fn current_index(&self) -> usize {
        self.pages.len().saturating_sub(1)
    }

    pub fn current_stream(&mut self) -> &mut Bytes {
        &mut self.pages.last_mut().expect("new_page called before first use").content
    }

    pub fn stream_at(&mut self, index: usize) -> &mut Bytes {
        &mut self.pages[index].content
    }

    pub fn add_annot(&mut self, page_index: usize, id: ObjectId) {
        self.pages[page_index].annots.push(id);
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Replace every occurrence of `PAGE_MARKER` across every page's buffer
    /// with `Page K of N`, right-padded with spaces so the marker's byte
    /// width (and therefore every later content offset within that page
    /// buffer) is unchanged. Errors rather than truncating if `N` somehow
    /// overflows the marker's reserved width.
    pub fn backpatch_page_numbers(&mut self) -> Result<()> {
        let total = self.pages.len();
        let marker_bytes = PAGE_MARKER.as_bytes();
        if digit_count(total) > MAX_PAGE_DIGITS {
            return Err(Error::internal(
                Stage::PagesEmitted,
                format!("page count {total} exceeds the {MAX_PAGE_DIGITS}-digit page-number marker budget"),
            ));
        }
        for (i, page) in self.pages.iter_mut().enumerate() {
            let replacement = format!("Page {} of {}", i + 1, total);
            let mut padded = replacement.into_bytes();
            if padded.len() > marker_bytes.len() {
                return Err(Error::internal(
                    Stage::PagesEmitted,
                    format!("page-number text {:?} does not fit the marker width", String::from_utf8_lossy(&padded)),
                ));
            }
            padded.resize(marker_bytes.len(), b' ');
            replace_all(&mut page.content, marker_bytes, &padded);
        }
        Ok(())
    }
}

fn digit_count(n: usize) -> usize {
    if n == 0 {
        1
    } else {
        n.ilog10() as usize + 1
    }
}

fn replace_all(buf: &mut Bytes, needle: &[u8], replacement: &[u8]) {
    debug_assert_eq!(needle.len(), replacement.len());
    let mut bytes = buf.as_slice().to_vec();
    let mut i = 0;
    while i + needle.len() <= bytes.len() {
        if &bytes[i..i + needle.len()] == needle {
            bytes[i..i + needle.len()].copy_from_slice(replacement);
            i += needle.len();
        } else {
            i += 1;
        }
    }
    *buf = Bytes::from_vec(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_page_indices_increment() {
        let mut pm = PageManager::new();
        assert_eq!(pm.new_page(), 0);
        assert_eq!(pm.new_page(), 1);
        assert_eq!(pm.page_count(), 2);
    }

    #[test]
    fn test_backpatch_preserves_length() {
        let mut pm = PageManager::new();
        pm.new_page();
        pm.current_stream().push_str(&format!("({}) Tj\n", PAGE_MARKER));
        let before_len = pm.pages()[0].content.len();
        pm.backpatch_page_numbers().unwrap();
        let after_len = pm.pages()[0].content.len();
        assert_eq!(before_len, after_len);
        let text = String::from_utf8_lossy(pm.pages()[0].content.as_slice()).into_owned();
        assert!(text.contains("Page 1 of 1"));
    }

    #[test]
    fn test_backpatch_handles_double_digit_pages() {
        let mut pm = PageManager::new();
        for _ in 0..10 {
            pm.new_page();
            pm.current_stream().push_str(&format!("({}) Tj\n", PAGE_MARKER));
        }
        let before_len = pm.pages()[9].content.len();
        pm.backpatch_page_numbers().unwrap();
        assert_eq!(before_len, pm.pages()[9].content.len());
        let text = String::from_utf8_lossy(pm.pages()[9].content.as_slice()).into_owned();
        assert!(text.contains("Page 10 of 10"));
        let text0 = String::from_utf8_lossy(pm.pages()[0].content.as_slice()).into_owned();
        assert!(text0.contains("Page 1 of 10"));
    }
}
