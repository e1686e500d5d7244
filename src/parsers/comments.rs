use crate::results::CommentCandidate;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static NOT_FOUND_HEADING: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static MESSAGE_BOX: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div#Message").unwrap());
static COMMENT_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"li[class*="ItemComment"]"#).unwrap());
static AUTHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a.Username").unwrap());
static TIME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("time").unwrap());
static MESSAGE_BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.Message.userContent").unwrap());

/// Substring present in the source of any page that lists comments
pub const COMMENT_MARKER: &str = "ItemComment";

const NOT_FOUND_TITLE: &str = "Page not found.";
const NOT_FOUND_MESSAGE: &str = "could not be found";

/// What a thread page contained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The forum rendered its "page not found" view
    NotFound,
    Page {
        candidates: Vec<CommentCandidate>,
        /// Number of comment containers, including skipped ones
        total_on_page: usize,
    },
}

/// Returns true if the markup is the forum's "page not found" view
pub fn is_not_found_page(doc: &Html) -> bool {
    let heading = doc
        .select(&NOT_FOUND_HEADING)
        .any(|h| h.text().collect::<String>().trim() == NOT_FOUND_TITLE);
    if heading {
        return true;
    }

    doc.select(&MESSAGE_BOX)
        .any(|m| m.text().collect::<String>().contains(NOT_FOUND_MESSAGE))
}

/// Parses markup and checks it for the "page not found" view
pub fn page_not_found(html: &str) -> bool {
    is_not_found_page(&Html::parse_document(html))
}

/// Extracts comment candidates from a thread page
pub fn extract(html: &str) -> Extraction {
    let doc = Html::parse_document(html);

    if is_not_found_page(&doc) {
        ::log::debug!("Page carries the not-found marker");
        return Extraction::NotFound;
    }

    let items = doc.select(&COMMENT_ITEM).collect::<Vec<_>>();
    let total_on_page = items.len();
    ::log::info!("Found {} comments on page", total_on_page);

    let candidates = items
        .into_iter()
        .filter_map(|item| match extract_candidate(item) {
            Ok(candidate) => Some(candidate),
            Err(reason) => {
                ::log::debug!("Skipping comment container: {}", reason);
                None
            }
        })
        .collect();

    Extraction::Page {
        candidates,
        total_on_page,
    }
}

fn extract_candidate(item: ElementRef<'_>) -> Result<CommentCandidate, &'static str> {
    let author = item
        .select(&AUTHOR)
        .next()
        .map(|a| a.text().collect::<String>().trim().to_string())
        .filter(|a| !a.is_empty())
        .ok_or("no author element")?;

    let id = item
        .value()
        .attr("id")
        .filter(|id| !id.is_empty())
        .ok_or("no comment id")?
        .to_string();

    let timestamp = item
        .select(&TIME)
        .next()
        .map(|t| {
            let title = t.value().attr("title").unwrap_or_default();
            if title.is_empty() {
                t.value().attr("datetime").unwrap_or_default()
            } else {
                title
            }
            .to_string()
        })
        .unwrap_or_default();

    let body_html = item.select(&MESSAGE_BODY).next().map(|m| m.inner_html());

    Ok(CommentCandidate {
        id,
        author,
        timestamp,
        body_html,
    })
}
