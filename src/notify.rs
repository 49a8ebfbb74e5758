//! Notification seam + Telegram implementation.
//!
//! The relay posts a rendered copy of the message to a chat channel.
//! [`TelegramNotifier`] talks to the Bot API, splitting long messages at
//! Telegram's 4096-char limit and retrying without Markdown when the
//! formatted send is refused.

use async_trait::async_trait;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::parser::ParsedMail;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Delivers a rendered copy of a parsed message to a chat channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, mail: &ParsedMail, config: &RelayConfig) -> Result<(), RelayError>;
}

/// Telegram Bot API notifier.
pub struct TelegramNotifier {
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn api_url(token: &str, method: &str) -> String {
        format!("https://api.telegram.org/bot{token}/{method}")
    }

    /// Send a single chunk (≤4096 chars), Markdown-first with plain fallback.
    async fn send_chunk(
        &self,
        config: &RelayConfig,
        text: &str,
    ) -> Result<(), RelayError> {
        let url = Self::api_url(&config.telegram_bot_token, "sendMessage");

        let markdown_body = serde_json::json!({
            "chat_id": config.telegram_chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        let markdown_resp = self
            .client
            .post(&url)
            .json(&markdown_body)
            .send()
            .await
            .map_err(|e| RelayError::Http(e.to_string()))?;

        if markdown_resp.status().is_success() {
            return Ok(());
        }

        let markdown_status = markdown_resp.status();
        tracing::warn!(
            status = ?markdown_status,
            "Telegram sendMessage with Markdown failed; retrying without parse_mode"
        );

        let plain_body = serde_json::json!({
            "chat_id": config.telegram_chat_id,
            "text": text,
        });
        let plain_resp = self
            .client
            .post(&url)
            .json(&plain_body)
            .send()
            .await
            .map_err(|e| RelayError::Http(e.to_string()))?;

        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(RelayError::NotifyFailed {
                reason: format!(
                    "sendMessage failed (markdown: {markdown_status}, plain: {plain_err})"
                ),
            });
        }

        Ok(())
    }
}

impl Default for TelegramNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, mail: &ParsedMail, config: &RelayConfig) -> Result<(), RelayError> {
        if config.telegram_bot_token.is_empty() || config.telegram_chat_id.is_empty() {
            return Err(RelayError::NotifyFailed {
                reason: "Telegram bot token or chat id not configured".into(),
            });
        }

        let rendered = render(mail);
        for chunk in split_message(&rendered, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_chunk(config, &chunk).await?;
        }

        tracing::info!(message_id = %mail.message_id, "Notification sent");
        Ok(())
    }
}

/// Render a parsed message for the chat channel.
pub fn render(mail: &ParsedMail) -> String {
    let body = mail
        .text
        .as_deref()
        .or(mail.html.as_deref())
        .unwrap_or("(no content)");
    format!(
        "From: {}\nTo: {}\nSubject: {}\n\n{}",
        mail.from, mail.to, mail.subject, body
    )
}

/// Split text into chunks of at most `max_len`, preferring newline and
/// space boundaries.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let chunk = &remaining[..max_len];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(max_len);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { max_len } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(text: Option<&str>, html: Option<&str>) -> ParsedMail {
        ParsedMail {
            id: "tok".into(),
            message_id: "mid".into(),
            from: "alice@example.com".into(),
            to: "relay@example.com".into(),
            subject: "Hello".into(),
            text: text.map(str::to_string),
            html: html.map(str::to_string),
        }
    }

    #[test]
    fn render_prefers_text_over_html() {
        let out = render(&parsed(Some("plain"), Some("<p>html</p>")));
        assert!(out.ends_with("\n\nplain"));
        assert!(out.starts_with("From: alice@example.com\n"));
    }

    #[test]
    fn render_falls_back_to_html_then_placeholder() {
        let out = render(&parsed(None, Some("<p>html</p>")));
        assert!(out.ends_with("<p>html</p>"));

        let out = render(&parsed(None, None));
        assert!(out.ends_with("(no content)"));
    }

    #[test]
    fn split_message_short() {
        assert_eq!(split_message("Hello", 4096), vec!["Hello"]);
    }

    #[test]
    fn split_message_exact_limit() {
        let msg = "a".repeat(4096);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 4096);
    }

    #[test]
    fn split_message_over_limit_prefers_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 2000);
    }

    #[test]
    fn split_message_no_boundary_hard_splits() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }

    #[tokio::test]
    async fn unconfigured_notifier_fails_cleanly() {
        let notifier = TelegramNotifier::new();
        let config = RelayConfig::default();
        let err = notifier
            .send(&parsed(Some("hi"), None), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NotifyFailed { .. }));
    }
}
