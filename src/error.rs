//! Error taxonomy shared by the code generator and the document factory.
//!
//! Every variant is terminal for the call that produced it; nothing in this
//! crate retries, and nothing is logged on the way out.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A named resource (logo, template file, …) is not in the store.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// The store holds the resource but its bytes are unusable.
    #[error("resource {name} is not usable: {reason}")]
    InvalidResource { name: String, reason: String },

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// The template source failed to parse or to bind against the data model.
    #[error("failed to resolve template {name}: {reason}")]
    Template { name: String, reason: String },

    /// The identifier or base URI cannot be turned into a QR symbol.
    #[error("cannot encode scannable code: {0}")]
    Encoding(String),

    #[error("malformed markup at {line}:{column}: {reason}")]
    MalformedMarkup {
        line: usize,
        column: usize,
        reason: String,
    },

    /// The document engine could not lay out or paginate the markup.
    #[error("layout failed: {0}")]
    Layout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn layout(reason: impl Into<String>) -> Self {
        Error::Layout(reason.into())
    }

    /// Malformed-markup error located at byte `offset` of `input`.
    pub(crate) fn malformed(input: &[u8], offset: usize, reason: impl Into<String>) -> Self {
        let (line, column) = position_of(input, offset);
        Error::MalformedMarkup {
            line,
            column,
            reason: reason.into(),
        }
    }
}

/// 1-based line and column of byte `offset` in `input`.
fn position_of(input: &[u8], offset: usize) -> (usize, usize) {
    let before = &input[..offset.min(input.len())];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = before
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|p| p + 1)
        .unwrap_or(0);
    let column = String::from_utf8_lossy(&before[line_start..]).chars().count() + 1;
    (line, column)
}

pub type Result<T> = std::result::Result<T, Error>;
