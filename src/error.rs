//! Error types for the PDF generation engine

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Driver stage at the time of an internal failure, per the state machine in
/// `driver.rs` (`Init -> TemplateParsed -> ContentEmitted -> ResourcesEmitted
/// -> PagesEmitted -> Encrypted? -> Signed? -> Finalized`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    TemplateParsed,
    ContentEmitted,
    ResourcesEmitted,
    PagesEmitted,
    Encrypted,
    Signed,
    Finalized,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Init => "Init",
            Stage::TemplateParsed => "TemplateParsed",
            Stage::ContentEmitted => "ContentEmitted",
            Stage::ResourcesEmitted => "ResourcesEmitted",
            Stage::PagesEmitted => "PagesEmitted",
            Stage::Encrypted => "Encrypted",
            Stage::Signed => "Signed",
            Stage::Finalized => "Finalized",
        };
        f.write_str(name)
    }
}

/// Main error type for the PDF generation engine
#[derive(Error, Debug)]
pub enum Error {
    /// PDF object-graph error surfaced by lopdf
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON template failed to parse, or violated a data-model invariant
    #[error("template invalid: {0}")]
    TemplateInvalid(String),

    /// A props string or custom-font reference named a font that isn't a
    /// standard Type1 name, a legacy alias, or registered in `config.customFonts`
    #[error("unknown font: {0}")]
    UnknownFont(String),

    /// PNG/JPEG bytes could not be decoded
    #[error("image decode failed: {0}")]
    ImageDecode(String),

    /// A single cell could not fit on a whole page even when alone
    #[error("cell content overflows a full page")]
    Overflow,

    /// A crypto operation (digest, sign, DER-encode) failed
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// Conflicting flags, e.g. encryption requested together with PDF/A
    #[error("encryption config invalid: {0}")]
    EncryptionConfigInvalid(String),

    /// The filler detected `/Type /ObjStm` (compressed object streams),
    /// which the byte-scan widget locator cannot see into
    #[error("filler does not support PDFs using compressed object streams")]
    CompressedObjectStreamUnsupported,

    /// Unexpected state in the object table, page manager, or driver state
    /// machine; always carries the stage it was detected in
    #[error("internal invariant violated at stage {stage}: {detail}")]
    InternalInvariant { stage: Stage, detail: String },

    /// Date parsing error (kept from the teacher's date module)
    #[error("Invalid date expression: {0}")]
    InvalidDateExpression(String),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Invalid glob pattern
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(String),

    /// No files matched pattern
    #[error("No PDF files found matching pattern: {0}")]
    NoFilesMatched(String),

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {}", .0.display())]
    EmptyPdf(PathBuf),

    /// Font error (legacy path used by the merge/metadata modules)
    #[error("Font error: {0}")]
    Font(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Wrap an ad-hoc message as an `InternalInvariant` tagged with the stage
    /// it was detected in, per §7's "abort, bug report" recovery policy.
    pub fn internal(stage: Stage, detail: impl Into<String>) -> Self {
        Error::InternalInvariant {
            stage,
            detail: detail.into(),
        }
    }
}
