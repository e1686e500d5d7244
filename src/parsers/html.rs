use crate::parsers::ParseResult;
use crate::parsers::text;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static IMG_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img[src]").unwrap());
static QUOTE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("blockquote").unwrap());

/// Elements that start a new paragraph in the flattened text
const BLOCK_ELEMENTS: &[&str] = &[
    "p",
    "div",
    "blockquote",
    "ul",
    "ol",
    "li",
    "pre",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "table",
    "tr",
    "hr",
];

/// A message body parsed once and queried several times
pub struct BodyFragment {
    doc: Html,
}

impl BodyFragment {
    pub fn parse(fragment: &str) -> Self {
        Self {
            doc: Html::parse_fragment(fragment),
        }
    }

    /// True if the body embeds an image whose source is exactly `src`
    pub fn contains_image(&self, src: &str) -> bool {
        self.doc
            .select(&IMG_SELECTOR)
            .filter_map(|e| e.value().attr("src"))
            .any(|s| s == src)
    }

    /// True if the body quotes another message
    pub fn contains_quote(&self) -> bool {
        self.doc.select(&QUOTE_SELECTOR).next().is_some()
    }

    /// Plain text and raw link targets, in document order
    pub fn to_parse_result(&self) -> ParseResult {
        let root = self.doc.root_element();

        let mut raw = String::new();
        flatten_into(root, &mut raw);
        let content = text::normalize_body(&raw);

        let links = root
            .select(&LINK_SELECTOR)
            .filter_map(|e| e.value().attr("href"))
            .map(|s| s.to_string())
            .collect::<Vec<String>>();

        ::log::trace!("Body parser found {} links", links.len());

        ParseResult::new(content, links)
    }
}

fn flatten_into(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(t) => out.push_str(&t.text),
            Node::Element(e) => {
                let name = e.name();
                if name == "script" || name == "style" {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }

                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push_str("\n\n");
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    flatten_into(child_el, out);
                }
                if block {
                    out.push_str("\n\n");
                }
            }
            _ => {}
        }
    }
}
