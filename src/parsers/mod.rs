pub mod comments;
pub mod html;
pub mod text;

#[cfg(test)]
mod tests;

pub use comments::{Extraction, extract};

/// Result of parsing a message body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    /// Extracted text content
    pub content: String,
    /// Extracted links, unresolved
    pub links: Vec<String>,
}

impl ParseResult {
    /// Creates a new parse result with the given content and links
    pub fn new(content: String, links: Vec<String>) -> Self {
        Self { content, links }
    }
}
