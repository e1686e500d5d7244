use crate::acquire::tests::thread_page;
use crate::parsers::comments::{self, Extraction};

fn page(items: &str) -> String {
    format!(r#"<html><body><ul class="MessageList">{items}</ul></body></html>"#)
}

fn unwrap_page(extraction: Extraction) -> (Vec<crate::results::CommentCandidate>, usize) {
    match extraction {
        Extraction::Page {
            candidates,
            total_on_page,
        } => (candidates, total_on_page),
        Extraction::NotFound => panic!("expected a thread page"),
    }
}

#[cfg(test)]
mod not_found_tests {
    use super::*;

    #[test]
    fn test_not_found_heading() {
        let html = "<html><body><h1>Page not found.</h1></body></html>";
        assert_eq!(comments::extract(html), Extraction::NotFound);
        assert!(comments::page_not_found(html));
    }

    #[test]
    fn test_not_found_message_box() {
        let html = r#"<html><body><div id="Message">The page you requested could not be found.</div></body></html>"#;
        assert_eq!(comments::extract(html), Extraction::NotFound);
    }

    #[test]
    fn test_empty_page_is_not_not_found() {
        let (candidates, total) = unwrap_page(comments::extract(&page("")));
        assert!(candidates.is_empty());
        assert_eq!(total, 0);
        assert!(!comments::page_not_found(&page("")));
    }

    #[test]
    fn test_other_headings_ignored() {
        let html = "<html><body><h1>Black Friday offers</h1></body></html>";
        assert!(!comments::page_not_found(html));
    }
}

#[cfg(test)]
mod candidate_tests {
    use super::*;

    #[test]
    fn test_full_page_counts_every_container() {
        let (candidates, total) = unwrap_page(comments::extract(&thread_page(32)));

        assert_eq!(total, 32);
        assert_eq!(candidates.len(), 32);
        assert_eq!(candidates[0].id, "Comment_1");
        assert_eq!(candidates[0].author, "FAT32");
        assert_eq!(candidates[0].timestamp, "November 28, 2025 3:00PM");
        assert!(candidates[0].body_html.as_deref().unwrap().contains("marker.png"));
    }

    #[test]
    fn test_container_without_author_is_skipped_but_counted() {
        let items = r#"
            <li class="Item ItemComment" id="Comment_1">
              <div class="Message userContent">system notice</div>
            </li>
            <li class="Item ItemComment" id="Comment_2">
              <a class="Username" href="/profile/alice">alice</a>
              <div class="Message userContent">hello</div>
            </li>"#;

        let (candidates, total) = unwrap_page(comments::extract(&page(items)));

        assert_eq!(total, 2);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "Comment_2");
    }

    #[test]
    fn test_timestamp_falls_back_to_datetime() {
        let items = r#"
            <li class="Item ItemComment" id="Comment_7">
              <a class="Username" href="/profile/alice">alice</a>
              <time datetime="2025-11-28T15:00:00+00:00">Nov 28</time>
            </li>"#;

        let (candidates, _) = unwrap_page(comments::extract(&page(items)));

        assert_eq!(candidates[0].timestamp, "2025-11-28T15:00:00+00:00");
        assert_eq!(candidates[0].body_html, None);
    }

    #[test]
    fn test_missing_time_leaves_timestamp_empty() {
        let items = r#"
            <li class="Item ItemComment" id="Comment_8">
              <a class="Username" href="/profile/alice">alice</a>
              <div class="Message userContent"><p>hi</p></div>
            </li>"#;

        let (candidates, _) = unwrap_page(comments::extract(&page(items)));

        assert_eq!(candidates[0].timestamp, "");
        assert_eq!(candidates[0].body_html.as_deref(), Some("<p>hi</p>"));
    }

    #[test]
    fn test_non_comment_items_ignored() {
        let items = r#"
            <li class="Item ItemDiscussion" id="Discussion_1">
              <a class="Username" href="/profile/op">op</a>
            </li>
            <li class="Item ItemComment" id="Comment_3">
              <a class="Username" href="/profile/alice">alice</a>
            </li>"#;

        let (candidates, total) = unwrap_page(comments::extract(&page(items)));

        assert_eq!(total, 1);
        assert_eq!(candidates[0].id, "Comment_3");
    }
}
