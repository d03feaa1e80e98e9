//! Error types for tree construction from markup.

use core::fmt;

/// Markup could not be turned into a content tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkupError {
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: Box<str>,
    /// Byte offset into the input where the tokenizer stopped, when known.
    pub offset: Option<usize>,
}

impl MarkupError {
    pub(crate) fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into().into_boxed_str(),
            offset: None,
        }
    }

    pub(crate) fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl fmt::Display for MarkupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(offset) = self.offset {
            write!(f, " [offset={}]", offset)?;
        }
        Ok(())
    }
}

impl std::error::Error for MarkupError {}
