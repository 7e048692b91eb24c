//! Native PDF generation engine.
//!
//! Turns a declarative JSON template into fully-formed PDF bytes: table
//! layout and pagination, font embedding/subsetting, images, AcroForm
//! fields, bookmarks/links, inline math, PDF/A metadata, Standard
//! Security Handler encryption and detached CMS signatures.
//!
//! The four public operations are [`generate`], [`fill`], [`merge`] and
//! [`split`]. Everything else is internal plumbing reachable through the
//! module tree for testing and advanced use.
//!
//! # Example
//!
//! ```no_run
//! let template = r#"{
//!     "elements": [{"type": "table", "table": {
//!         "maxcolumns": 1,
//!         "rows": [{"row": [{"props": "font1:12:000:left:0:0:0:0", "text": "Hello"}]}]
//!     }}]
//! }"#;
//! let pdf_bytes = pdfgen::generate(template).expect("generation failed");
//! ```

pub mod content;
pub mod driver;
pub mod error;
pub mod filler;
pub mod fonts;
pub mod forms;
pub mod images;
pub mod math;
pub mod object_table;
pub mod outline;
pub mod page_manager;
pub mod props;
pub mod security;
pub mod signature;
pub mod split;
pub mod template;
pub mod walker;
pub mod writer;

// Kept from the original handouts tool: date-expression parsing, page
// layout math and the file-path based merge/metadata helpers. headers.rs
// and create.rs are superseded by driver.rs/walker.rs and no longer wired
// in here.
pub mod date;
pub mod layout;
pub mod pdf;

pub use driver::{generate, merge};
pub use error::{Error, Result};
pub use filler::fill;
pub use split::split;
