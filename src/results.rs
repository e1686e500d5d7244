use serde::{Deserialize, Serialize};

/// A comment pulled from a thread page before filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentCandidate {
    /// Element id of the comment container
    pub id: String,

    pub author: String,

    /// Human-readable title if present, machine timestamp otherwise
    pub timestamp: String,

    /// Raw markup of the message body, if the comment has one
    pub body_html: Option<String>,
}

/// A comment that passed the filter and is ready for notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub timestamp: String,

    /// Plain text body with paragraph breaks kept
    pub body: String,

    /// Links found in the body, in document order
    pub extracted_links: Vec<String>,

    pub source_page: u32,

    /// `<page-url>#<comment-id>`
    pub canonical_link: String,
}

impl Comment {
    /// Body followed by the link list, when there are links
    pub fn rendered_body(&self) -> String {
        if self.extracted_links.is_empty() {
            return self.body.clone();
        }

        let links = self
            .extracted_links
            .iter()
            .map(|link| format!("- {}", link))
            .collect::<Vec<_>>()
            .join("\n");
        format!("{}\n\nLinks:\n{}", self.body, links)
    }
}

/// Why a page was given up on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonCause {
    /// Too many anti-bot challenges on this page
    Challenge,
    /// Attempt budget exhausted on transient failures
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Ok,
    /// The page does not exist yet
    NotYetCreated,
    /// The page was reachable but never verifiably rendered
    Abandoned(AbandonCause),
}

/// Outcome of acquiring one thread page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    /// Comments that passed the filter
    pub comments: Vec<Comment>,

    /// Count of all comment containers on the page, regardless of author
    pub total_on_page: usize,

    pub status: PageStatus,
}

impl PageResult {
    pub fn ok(comments: Vec<Comment>, total_on_page: usize) -> Self {
        Self {
            comments,
            total_on_page,
            status: PageStatus::Ok,
        }
    }

    pub fn not_yet_created() -> Self {
        Self {
            comments: Vec::new(),
            total_on_page: 0,
            status: PageStatus::NotYetCreated,
        }
    }

    pub fn abandoned(cause: AbandonCause) -> Self {
        Self {
            comments: Vec::new(),
            total_on_page: 0,
            status: PageStatus::Abandoned(cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(links: Vec<&str>) -> Comment {
        Comment {
            id: "Comment_1".to_string(),
            author: "alice".to_string(),
            timestamp: "November 28".to_string(),
            body: "Deal is live".to_string(),
            extracted_links: links.into_iter().map(String::from).collect(),
            source_page: 3,
            canonical_link: "https://example.com/p3#Comment_1".to_string(),
        }
    }

    #[test]
    fn test_rendered_body_without_links() {
        assert_eq!(comment(vec![]).rendered_body(), "Deal is live");
    }

    #[test]
    fn test_rendered_body_appends_links() {
        let rendered = comment(vec!["https://a.example", "https://b.example"]).rendered_body();
        assert_eq!(
            rendered,
            "Deal is live\n\nLinks:\n- https://a.example\n- https://b.example"
        );
    }
}
