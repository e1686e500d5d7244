use crate::error::NotifyError;
use crate::results::Comment;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

/// Outbound messaging channel
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one rendered message; `Ok` only on confirmed success
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

/// Telegram Bot API client
pub struct TelegramNotifier {
    client: reqwest::Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(
        api_base: &str,
        bot_token: &str,
        chat_id: &str,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                bot_token
            ),
            chat_id: chat_id.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: message,
            disable_web_page_preview: true,
        };

        let response = self.client.post(&self.endpoint).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

/// Shape of the rendered notification
#[derive(Debug, Clone)]
pub struct MessageFormat {
    pub target_user: String,
    pub max_body_chars: usize,
    pub max_links_shown: usize,
}

impl MessageFormat {
    pub fn render(&self, comment: &Comment) -> String {
        let mut message = format!("🔔 New comment by {}\n\n", self.target_user);

        message.push_str(&truncate_chars(&comment.body, self.max_body_chars));
        message.push_str("\n\n");
        message.push_str(&format!("⏰ {}\n", comment.timestamp));
        message.push_str(&format!("🔗 {}\n", comment.canonical_link));
        message.push_str(&format!("📄 Page {}\n", comment.source_page));

        if !comment.extracted_links.is_empty() {
            message.push_str("\nLinks:\n");
            for (i, link) in comment
                .extracted_links
                .iter()
                .take(self.max_links_shown)
                .enumerate()
            {
                message.push_str(&format!("{}. {}\n", i + 1, link));
            }
            let hidden = comment
                .extracted_links
                .len()
                .saturating_sub(self.max_links_shown);
            if hidden > 0 {
                message.push_str(&format!("… +{} more\n", hidden));
            }
        }

        message
    }
}

/// Marker appended to a capped body
pub const TRUNCATION_MARKER: &str = "…(truncated)";

/// Caps text at `max` characters, appending the truncation marker when capped
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Counts from one dispatch round
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Deduplicating notification dispatcher
pub struct Dispatcher {
    notifier: Box<dyn Notifier>,
    format: MessageFormat,
}

impl Dispatcher {
    pub fn new(notifier: Box<dyn Notifier>, format: MessageFormat) -> Self {
        Self { notifier, format }
    }

    /// Sends every comment not yet in `seen`, in order.
    ///
    /// An id joins `seen` only after a confirmed delivery, so failed
    /// deliveries come back on the next extraction of the same page.
    pub async fn notify(&self, comments: &[Comment], seen: &mut HashSet<String>) -> DispatchReport {
        let mut report = DispatchReport::default();

        for comment in comments {
            if seen.contains(&comment.id) {
                report.skipped += 1;
                continue;
            }

            let message = self.format.render(comment);
            match self.notifier.send(&message).await {
                Ok(()) => {
                    seen.insert(comment.id.clone());
                    report.sent += 1;
                    ::log::info!("Sent notification for comment {}", comment.id);
                }
                Err(e) => {
                    report.failed += 1;
                    ::log::error!(
                        "Notification for comment {} failed, will retry next poll: {}",
                        comment.id,
                        e
                    );
                }
            }
        }

        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records messages; fails the first `fail_first` sends
    #[derive(Clone, Default)]
    pub(crate) struct RecordingNotifier {
        pub sent: Arc<Mutex<Vec<String>>>,
        pub fail_first: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, message: &str) -> Result<(), NotifyError> {
            let mut fail = self.fail_first.lock().unwrap();
            if *fail > 0 {
                *fail -= 1;
                return Err(NotifyError::Rejected(500));
            }
            self.sent.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    pub(crate) fn format() -> MessageFormat {
        MessageFormat {
            target_user: "FAT32".to_string(),
            max_body_chars: 20,
            max_links_shown: 2,
        }
    }

    fn comment(id: &str) -> Comment {
        Comment {
            id: id.to_string(),
            author: "FAT32".to_string(),
            timestamp: "November 28, 2025 3:00PM".to_string(),
            body: "Black Friday VPS offer".to_string(),
            extracted_links: vec![
                "https://a.example".to_string(),
                "https://b.example".to_string(),
                "https://c.example".to_string(),
            ],
            source_page: 241,
            canonical_link: format!("https://forum.example/p241#{}", id),
        }
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("exactly10!", 10), "exactly10!");
        assert_eq!(truncate_chars("数据中心优惠", 2), format!("数据{}", TRUNCATION_MARKER));
    }

    #[test]
    fn test_render_message() {
        let message = format().render(&comment("Comment_1"));

        assert!(message.starts_with("🔔 New comment by FAT32"));
        assert!(message.contains(&format!("Black Friday VPS off{}", TRUNCATION_MARKER)));
        assert!(message.contains("November 28, 2025 3:00PM"));
        assert!(message.contains("https://forum.example/p241#Comment_1"));
        assert!(message.contains("Page 241"));
        assert!(message.contains("1. https://a.example"));
        assert!(message.contains("2. https://b.example"));
        assert!(!message.contains("https://c.example"));
        assert!(message.contains("+1 more"));
    }

    #[tokio::test]
    async fn test_repeated_batches_notify_once() {
        let notifier = RecordingNotifier::default();
        let dispatcher = Dispatcher::new(Box::new(notifier.clone()), format());
        let mut seen = HashSet::new();
        let batch = vec![comment("Comment_1"), comment("Comment_2")];

        for _ in 0..3 {
            dispatcher.notify(&batch, &mut seen).await;
        }

        assert_eq!(notifier.sent.lock().unwrap().len(), 2);
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_delivery_retried_next_round() {
        let notifier = RecordingNotifier::default();
        *notifier.fail_first.lock().unwrap() = 1;
        let dispatcher = Dispatcher::new(Box::new(notifier.clone()), format());
        let mut seen = HashSet::new();
        let batch = vec![comment("Comment_1")];

        let first = dispatcher.notify(&batch, &mut seen).await;
        assert_eq!(first, DispatchReport { sent: 0, skipped: 0, failed: 1 });
        assert!(seen.is_empty());

        let second = dispatcher.notify(&batch, &mut seen).await;
        assert_eq!(second, DispatchReport { sent: 1, skipped: 0, failed: 0 });
        assert!(seen.contains("Comment_1"));
    }

    #[tokio::test]
    async fn test_telegram_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:abc/sendMessage")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "chat_id": "42",
                "text": "hello",
                "disable_web_page_preview": true
            })))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let notifier =
            TelegramNotifier::new(&server.url(), "123:abc", "42", Duration::from_secs(5)).unwrap();
        assert!(notifier.send("hello").await.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_telegram_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bot123:abc/sendMessage")
            .with_status(400)
            .with_body(r#"{"ok":false}"#)
            .create_async()
            .await;

        let notifier =
            TelegramNotifier::new(&server.url(), "123:abc", "42", Duration::from_secs(5)).unwrap();
        assert!(matches!(
            notifier.send("hello").await,
            Err(NotifyError::Rejected(400))
        ));
    }
}
