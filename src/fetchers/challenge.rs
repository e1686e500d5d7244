use crate::parsers::comments::COMMENT_MARKER;
use regex::Regex;
use std::sync::LazyLock;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

const TITLE_KEYWORDS: &[&str] = &[
    "just a moment",
    "cloudflare",
    "attention required",
    "请稍候",
    "稍等片刻",
    "正在检查",
];

/// Markup and text of the interstitial itself, never of a rendered thread
const CONTENT_KEYWORDS: &[&str] = &[
    "checking your browser",
    "cf-browser-verification",
    "cf-challenge-running",
    "id=\"challenge-form\"",
    "_cf_chl_opt",
    "正在验证您是否是真人",
    "正在检查您的浏览器",
    "这可能需要几秒钟",
    "验证您的浏览器",
    "人机验证",
];

/// Recognizes anti-automation interstitial pages by keyword
#[derive(Debug, Clone)]
pub struct ChallengeDetector {
    title_keywords: Vec<String>,
    content_keywords: Vec<String>,
}

impl Default for ChallengeDetector {
    fn default() -> Self {
        Self::new(TITLE_KEYWORDS, CONTENT_KEYWORDS)
    }
}

impl ChallengeDetector {
    /// Create a detector from title and body keywords (matched case-insensitively)
    pub fn new<S: AsRef<str>>(title_keywords: &[S], content_keywords: &[S]) -> Self {
        let lower = |words: &[S]| {
            words
                .iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect::<Vec<_>>()
        };

        Self {
            title_keywords: lower(title_keywords),
            content_keywords: lower(content_keywords),
        }
    }

    /// True if the title or body looks like a challenge page.
    ///
    /// A body that lists comments is a rendered thread page, whatever its
    /// comments or injected scripts say.
    pub fn is_challenge(&self, title: &str, body: &str) -> bool {
        if body.contains(COMMENT_MARKER) {
            return false;
        }

        let title = title.to_lowercase();
        if self.title_keywords.iter().any(|k| title.contains(k)) {
            return true;
        }

        let body = body.to_lowercase();
        self.content_keywords.iter().any(|k| body.contains(k))
    }

    /// Classify raw markup, reading the title from the document itself
    pub fn is_challenge_page(&self, html: &str) -> bool {
        self.is_challenge(&extract_title(html).unwrap_or_default(), html)
    }
}

/// Text of the first `<title>` element, if any
pub fn extract_title(html: &str) -> Option<String> {
    TITLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}
