//! Error types for the edgequake-pdf2md-gateway library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2MdError`] — **Fatal** for the call that returned it: the upload is
//!   not a PDF, the engine could not be initialised, the remote worker is
//!   unreachable. Returned as `Err(Pdf2MdError)` from split, `convert_one`
//!   and every dispatcher call.
//!
//! * [`PageError`] — **Non-fatal**: one entry of a batch failed while its
//!   siblings converted fine. Stored inside
//!   [`crate::output::PageOutcome::Failed`] at the failing entry's index so
//!   the batch output stays aligned with its input.
//!
//! [`ErrorKind`] groups the fatal variants into the coarse taxonomy the HTTP
//! layers map onto status codes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`Pdf2MdError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The bytes are not a readable PDF.
    Parse,
    /// The conversion engine could not process a readable document.
    Conversion,
    /// The remote worker is unreachable or failed unexpectedly.
    Transport,
    /// The caller supplied an unusable request (missing upload, bad path…).
    Input,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable name used in JSON error bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse_error",
            ErrorKind::Conversion => "conversion_error",
            ErrorKind::Transport => "transport_error",
            ErrorKind::Input => "invalid_request",
            ErrorKind::Internal => "internal_error",
        }
    }

    /// Inverse of [`ErrorKind::as_str`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "parse_error" => Some(ErrorKind::Parse),
            "conversion_error" => Some(ErrorKind::Conversion),
            "transport_error" => Some(ErrorKind::Transport),
            "invalid_request" => Some(ErrorKind::Input),
            "internal_error" => Some(ErrorKind::Internal),
            _ => None,
        }
    }
}

/// All fatal errors returned by the edgequake-pdf2md-gateway library.
///
/// Batch entry failures use [`PageError`] and are stored in
/// [`crate::output::PageOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Pdf2MdError {
    // ── Parse errors ──────────────────────────────────────────────────────
    /// The bytes do not start with the `%PDF` magic.
    #[error("Input is not a PDF document (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { detail: String },

    /// PDF is encrypted with a non-empty user password.
    #[error("PDF requires a password to open.\nDecrypt it first, e.g. qpdf --password=... --decrypt input.pdf output.pdf")]
    PasswordRequired,

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The engine rejected or failed on a readable document.
    #[error("Conversion failed: {detail}")]
    Conversion { detail: String },

    /// The engine did not finish within the configured per-document timeout.
    #[error("Conversion timed out after {secs}s")]
    ConversionTimeout { secs: u64 },

    /// The engine could not be constructed during worker start-up.
    #[error("Failed to initialise conversion engine '{engine}': {detail}")]
    EngineInit { engine: String, detail: String },

    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
The worker image must ship libpdfium. Either:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium, or\n\
  • Install it next to the binary or in a system library directory.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Transport errors ──────────────────────────────────────────────────
    /// The remote worker could not be reached or dropped the connection.
    #[error("Worker at '{endpoint}' is unreachable: {reason}")]
    Transport { endpoint: String, reason: String },

    /// The remote worker did not answer within the dispatch timeout.
    #[error("Worker at '{endpoint}' did not answer within {secs}s")]
    TransportTimeout { endpoint: String, secs: u64 },

    /// The remote worker answered with an unexpected status.
    #[error("Worker returned HTTP {status}: {message}")]
    RemoteStatus { status: u16, message: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// The multipart upload is missing or unreadable.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// The upload exceeds the gateway's body limit.
    #[error("Upload exceeds the {limit_bytes} byte limit")]
    UploadTooLarge { limit_bytes: usize },

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2MdError {
    /// Classify this error for status-code mapping and per-item reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Pdf2MdError::NotAPdf { .. }
            | Pdf2MdError::CorruptPdf { .. }
            | Pdf2MdError::PasswordRequired => ErrorKind::Parse,

            Pdf2MdError::Conversion { .. }
            | Pdf2MdError::ConversionTimeout { .. }
            | Pdf2MdError::EngineInit { .. }
            | Pdf2MdError::ProviderNotConfigured { .. }
            | Pdf2MdError::PdfiumBindingFailed(_) => ErrorKind::Conversion,

            Pdf2MdError::Transport { .. }
            | Pdf2MdError::TransportTimeout { .. }
            | Pdf2MdError::RemoteStatus { .. } => ErrorKind::Transport,

            Pdf2MdError::InvalidUpload(_)
            | Pdf2MdError::UploadTooLarge { .. }
            | Pdf2MdError::FileNotFound { .. }
            | Pdf2MdError::PermissionDenied { .. }
            | Pdf2MdError::InvalidConfig(_) => ErrorKind::Input,

            Pdf2MdError::OutputWriteFailed { .. } | Pdf2MdError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Rebuild an error reported by a remote worker from its JSON error body.
    ///
    /// Only the kinds a caller can act on are restored to typed variants;
    /// everything else is kept as [`Pdf2MdError::RemoteStatus`].
    pub fn from_remote(status: u16, kind: Option<ErrorKind>, message: String) -> Self {
        match kind {
            Some(ErrorKind::Parse) => Pdf2MdError::CorruptPdf { detail: message },
            Some(ErrorKind::Conversion) => Pdf2MdError::Conversion { detail: message },
            _ => Pdf2MdError::RemoteStatus { status, message },
        }
    }
}

/// A non-fatal error for a single batch entry.
///
/// `index` is the 0-based position of the entry in the batch, which for the
/// gateway equals the 0-based page index of the uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageError {
    /// The entry is not a readable PDF.
    #[error("Entry {index}: not a readable PDF: {detail}")]
    Parse { index: usize, detail: String },

    /// The engine failed on the entry.
    #[error("Entry {index}: conversion failed: {detail}")]
    Conversion { index: usize, detail: String },

    /// The engine did not finish the entry in time.
    #[error("Entry {index}: conversion timed out after {secs}s")]
    Timeout { index: usize, secs: u64 },
}

impl PageError {
    /// Wrap a fatal error raised while converting entry `index`.
    pub fn from_error(index: usize, err: &Pdf2MdError) -> Self {
        match err {
            Pdf2MdError::ConversionTimeout { secs } => PageError::Timeout {
                index,
                secs: *secs,
            },
            e if e.kind() == ErrorKind::Parse => PageError::Parse {
                index,
                detail: e.to_string(),
            },
            e => PageError::Conversion {
                index,
                detail: e.to_string(),
            },
        }
    }

    /// What went wrong, without the entry position.
    pub fn reason(&self) -> String {
        match self {
            PageError::Parse { detail, .. } => format!("not a readable PDF: {}", detail),
            PageError::Conversion { detail, .. } => format!("conversion failed: {}", detail),
            PageError::Timeout { secs, .. } => format!("conversion timed out after {}s", secs),
        }
    }

    /// 0-based position of the failed entry.
    pub fn index(&self) -> usize {
        match self {
            PageError::Parse { index, .. }
            | PageError::Conversion { index, .. }
            | PageError::Timeout { index, .. } => *index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_pdf_is_parse_kind() {
        let e = Pdf2MdError::NotAPdf {
            magic: b"PK\x03\x04".to_vec(),
        };
        assert_eq!(e.kind(), ErrorKind::Parse);
        assert!(e.to_string().contains("not a PDF"), "got: {e}");
    }

    #[test]
    fn transport_display_names_endpoint() {
        let e = Pdf2MdError::Transport {
            endpoint: "http://worker:9000".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Transport);
        assert!(e.to_string().contains("http://worker:9000"));
        assert!(e.to_string().contains("connection refused"));
    }

    #[test]
    fn timeout_display() {
        let e = Pdf2MdError::TransportTimeout {
            endpoint: "w".into(),
            secs: 600,
        };
        assert!(e.to_string().contains("600s"));
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in [
            ErrorKind::Parse,
            ErrorKind::Conversion,
            ErrorKind::Transport,
            ErrorKind::Input,
            ErrorKind::Internal,
        ] {
            assert_eq!(ErrorKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(ErrorKind::from_name("teapot"), None);
    }

    #[test]
    fn remote_parse_error_restored() {
        let e = Pdf2MdError::from_remote(422, Some(ErrorKind::Parse), "bad xref".into());
        assert!(matches!(e, Pdf2MdError::CorruptPdf { .. }));

        let e = Pdf2MdError::from_remote(500, None, "boom".into());
        assert!(matches!(e, Pdf2MdError::RemoteStatus { status: 500, .. }));
    }

    #[test]
    fn page_error_from_fatal() {
        let parse = PageError::from_error(2, &Pdf2MdError::PasswordRequired);
        assert!(matches!(parse, PageError::Parse { index: 2, .. }));

        let timeout = PageError::from_error(0, &Pdf2MdError::ConversionTimeout { secs: 5 });
        assert_eq!(timeout, PageError::Timeout { index: 0, secs: 5 });

        let conv = PageError::from_error(
            7,
            &Pdf2MdError::Conversion {
                detail: "model crashed".into(),
            },
        );
        assert_eq!(conv.index(), 7);
        assert!(conv.to_string().contains("model crashed"));
    }

    #[test]
    fn page_error_serialises_with_kind_tag() {
        let e = PageError::Timeout { index: 1, secs: 3 };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "timeout");
        assert_eq!(json["index"], 1);
    }
}
