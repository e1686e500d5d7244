use crate::parsers::html::BodyFragment;
use crate::results::{Comment, CommentCandidate};
use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for comment filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentFilterConfig {
    /// Exact, case-sensitive author name to keep
    pub target_author: String,

    /// Image source a comment body must embed
    pub required_marker: String,

    /// Reject comments that contain a blockquote
    #[serde(default = "default_exclude_quoted")]
    pub exclude_quoted: bool,
}

fn default_exclude_quoted() -> bool {
    true
}

/// Reason a candidate was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    OtherAuthor,
    MissingMarker,
    Quoted,
}

/// Narrows extracted candidates to the comments worth notifying about
#[derive(Debug, Clone)]
pub struct CommentFilter {
    config: CommentFilterConfig,
}

impl CommentFilter {
    pub fn new(config: CommentFilterConfig) -> Self {
        Self { config }
    }

    /// Applies the rules in order and returns the first one that fails
    pub fn check(&self, candidate: &CommentCandidate) -> Result<(), Rejection> {
        self.evaluate(candidate).map(|_| ())
    }

    /// Filters candidates, in order, into full comment records
    pub fn filter(
        &self,
        candidates: &[CommentCandidate],
        page: u32,
        page_url: &str,
    ) -> Vec<Comment> {
        let base = Url::parse(page_url).ok();

        candidates
            .iter()
            .filter_map(|candidate| match self.evaluate(candidate) {
                Ok(body) => {
                    ::log::info!("Comment {} passed the filter", candidate.id);
                    Some(materialize(candidate, &body, page, page_url, base.as_ref()))
                }
                Err(Rejection::OtherAuthor) => None,
                Err(reason) => {
                    ::log::debug!("Skipping comment {}: {:?}", candidate.id, reason);
                    None
                }
            })
            .collect()
    }

    /// Runs the rules and hands back the parsed body of an accepted comment
    fn evaluate(&self, candidate: &CommentCandidate) -> Result<BodyFragment, Rejection> {
        if candidate.author != self.config.target_author {
            return Err(Rejection::OtherAuthor);
        }

        let body = candidate
            .body_html
            .as_deref()
            .map(BodyFragment::parse)
            .ok_or(Rejection::MissingMarker)?;
        if !body.contains_image(&self.config.required_marker) {
            return Err(Rejection::MissingMarker);
        }

        if self.config.exclude_quoted && body.contains_quote() {
            return Err(Rejection::Quoted);
        }

        Ok(body)
    }
}

fn materialize(
    candidate: &CommentCandidate,
    body: &BodyFragment,
    page: u32,
    page_url: &str,
    base: Option<&Url>,
) -> Comment {
    let parsed = body.to_parse_result();
    let extracted_links = parsed
        .links
        .iter()
        .filter_map(|href| resolve_link(href, base))
        .collect();

    Comment {
        id: candidate.id.clone(),
        author: candidate.author.clone(),
        timestamp: candidate.timestamp.clone(),
        body: parsed.content,
        extracted_links,
        source_page: page,
        canonical_link: format!("{}#{}", page_url, candidate.id),
    }
}

/// Resolves a body link against the page it was found on.
///
/// In-page anchors, `javascript:` links and hrefs that do not form a valid
/// URL yield `None`.
pub fn resolve_link(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    if href.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }

    let resolved = match base {
        Some(base) => base.join(href),
        None => Url::parse(href),
    };
    match resolved {
        Ok(url) => Some(url.to_string()),
        Err(e) => {
            ::log::debug!("Dropping link {}: {}", href, e);
            None
        }
    }
}
