//! Mail parser: converts a raw byte stream into a normalized text/HTML
//! pair, honoring the configured size policy and falling back between
//! decoding strategies. Parsing never fails at this boundary; every
//! failure degrades into diagnostic text.

mod strategy;

pub use strategy::{BaselineParser, MailBody, ParserStrategy, run_strategies, strip_html};

use rand::Rng;
use rand::distributions::Alphanumeric;
use tokio::io::AsyncReadExt;

use crate::config::SizePolicy;
use crate::error::ParseError;
use crate::message::{Inbound, RawStream};

/// Length of the random correlation token on each [`ParsedMail`].
const ID_LEN: usize = 16;

/// Normalized parse result. At least one of `text`/`html` is populated;
/// when every strategy fails, both carry a diagnostic string instead.
#[derive(Debug, Clone)]
pub struct ParsedMail {
    /// Random correlation token, independent of message content.
    pub id: String,
    pub message_id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
}

/// Parse an inbound message.
///
/// The size policy is evaluated once against the declared raw size:
/// oversize + `Unhandled` short-circuits without touching the stream,
/// oversize + `Truncate` caps the read at `max_size` bytes, anything else
/// reads the stream through.
pub async fn parse(
    msg: &mut Inbound,
    max_size: usize,
    policy: SizePolicy,
    alternate: Option<&dyn ParserStrategy>,
) -> ParsedMail {
    let raw_size = msg.raw_size;
    let oversize = raw_size > max_size;

    if oversize && policy == SizePolicy::Unhandled {
        let note = oversize_note(raw_size, max_size);
        return with_body(
            msg,
            MailBody {
                text: Some(note.clone()),
                html: Some(note),
            },
        );
    }

    let truncated = oversize && policy == SizePolicy::Truncate;
    let target = if truncated { max_size } else { raw_size };

    let raw = match msg.take_raw() {
        Some(stream) => match read_capped(stream, target).await {
            Ok(raw) => raw,
            Err(e) => return with_body(msg, failure_body(&e.into())),
        },
        None => {
            return with_body(
                msg,
                failure_body(&ParseError::Strategy {
                    name: "intake".into(),
                    reason: "raw stream already consumed".into(),
                }),
            );
        }
    };

    let mut body = match decode(&raw, alternate) {
        Ok(body) => body,
        Err(e) => return with_body(msg, failure_body(&e)),
    };

    // Derive plain text from HTML when the message carried no text part.
    if body.text.is_none()
        && let Some(html) = &body.html
    {
        body.text = Some(strip_html(html));
    }

    if truncated && let Some(text) = &mut body.text {
        text.push_str(&truncation_note(raw_size, max_size));
    }

    with_body(msg, body)
}

/// Run the strategy chain: the alternate decoder first when supplied, the
/// baseline `mail-parser` decoder last and always.
fn decode(raw: &[u8], alternate: Option<&dyn ParserStrategy>) -> Result<MailBody, ParseError> {
    let baseline = BaselineParser;
    match alternate {
        Some(alt) => run_strategies(raw, &[alt, &baseline]),
        None => run_strategies(raw, &[&baseline]),
    }
}

/// Read at most `target` bytes from the stream, suspending until that many
/// bytes arrive or the source is exhausted. The underlying stream is never
/// polled past the target count.
async fn read_capped(stream: RawStream, target: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(target);
    let mut capped = stream.take(target as u64);
    capped.read_to_end(&mut buf).await?;
    Ok(buf)
}

fn with_body(msg: &Inbound, body: MailBody) -> ParsedMail {
    ParsedMail {
        id: random_token(),
        message_id: msg.message_id.clone(),
        from: msg.from.clone(),
        to: msg.to.clone(),
        subject: msg.subject.clone(),
        text: body.text,
        html: body.html,
    }
}

fn failure_body(error: &ParseError) -> MailBody {
    let note = format!("Failed to parse message: {error}");
    MailBody {
        text: Some(note.clone()),
        html: Some(note),
    }
}

fn oversize_note(raw_size: usize, max_size: usize) -> String {
    format!("Message of {raw_size} bytes exceeds the {max_size} byte limit and was not parsed.")
}

fn truncation_note(raw_size: usize, max_size: usize) -> String {
    format!("\n\n[message truncated: {raw_size} bytes received, first {max_size} bytes kept]")
}

/// Fresh random token over the 62-character alphanumeric alphabet.
pub fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::task::{Context, Poll};

    use tokio::io::{AsyncRead, ReadBuf};

    /// Stream that records whether and how much it was read.
    struct CountingStream {
        data: Cursor<Vec<u8>>,
        polled: Arc<AtomicBool>,
        served: Arc<AtomicUsize>,
    }

    impl AsyncRead for CountingStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            self.polled.store(true, Ordering::SeqCst);
            let before = buf.filled().len();
            let result = Pin::new(&mut self.data).poll_read(cx, buf);
            let read = buf.filled().len() - before;
            self.served.fetch_add(read, Ordering::SeqCst);
            result
        }
    }

    fn counting_inbound(
        raw: Vec<u8>,
        declared_size: usize,
    ) -> (Inbound, Arc<AtomicBool>, Arc<AtomicUsize>) {
        let polled = Arc::new(AtomicBool::new(false));
        let served = Arc::new(AtomicUsize::new(0));
        let stream = CountingStream {
            data: Cursor::new(raw),
            polled: Arc::clone(&polled),
            served: Arc::clone(&served),
        };
        let msg = Inbound::new(
            "mid-1",
            "alice@example.com",
            "relay@example.com",
            "Test",
            declared_size,
            Box::new(stream),
        );
        (msg, polled, served)
    }

    struct FailingStrategy;
    impl ParserStrategy for FailingStrategy {
        fn name(&self) -> &str {
            "failing-alt"
        }
        fn parse(&self, _raw: &[u8]) -> Result<MailBody, ParseError> {
            Err(ParseError::Strategy {
                name: "failing-alt".into(),
                reason: "loader failure".into(),
            })
        }
    }

    struct HtmlOnlyStrategy;
    impl ParserStrategy for HtmlOnlyStrategy {
        fn name(&self) -> &str {
            "html-only"
        }
        fn parse(&self, _raw: &[u8]) -> Result<MailBody, ParseError> {
            Ok(MailBody {
                text: None,
                html: Some("<p>Hello <b>world</b></p>".to_string()),
            })
        }
    }

    fn simple_mail(body_len: usize) -> Vec<u8> {
        let mut raw = b"From: alice@example.com\r\nSubject: Test\r\n\r\n".to_vec();
        raw.extend(std::iter::repeat_n(b'x', body_len));
        raw
    }

    #[tokio::test]
    async fn oversize_unhandled_short_circuits_without_reading() {
        let (mut msg, polled, served) = counting_inbound(simple_mail(600), 500);
        let parsed = parse(&mut msg, 100, SizePolicy::Unhandled, None).await;

        let note = oversize_note(500, 100);
        assert_eq!(parsed.text.as_deref(), Some(note.as_str()));
        assert_eq!(parsed.html.as_deref(), Some(note.as_str()));
        assert!(!polled.load(Ordering::SeqCst), "stream must not be read");
        assert_eq!(served.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn truncate_reads_exactly_max_size_bytes() {
        let raw = simple_mail(458); // 42-byte header + 458 = 500 raw bytes
        assert_eq!(raw.len(), 500);
        let (mut msg, _, served) = counting_inbound(raw, 500);

        let parsed = parse(&mut msg, 100, SizePolicy::Truncate, None).await;

        assert_eq!(served.load(Ordering::SeqCst), 100);
        let text = parsed.text.expect("truncated mail still has text");
        assert!(text.ends_with(&truncation_note(500, 100)));
    }

    #[tokio::test]
    async fn oversize_unknown_policy_reads_through() {
        let raw = simple_mail(458);
        let (mut msg, _, served) = counting_inbound(raw, 500);

        let parsed = parse(&mut msg, 100, SizePolicy::ReadThrough, None).await;

        assert_eq!(served.load(Ordering::SeqCst), 500);
        let text = parsed.text.expect("read-through mail has text");
        assert!(!text.contains("truncated"));
        assert_eq!(text.trim().len(), 458);
    }

    #[tokio::test]
    async fn within_limit_reads_full_stream() {
        let raw = simple_mail(20);
        let size = raw.len();
        let (mut msg, _, served) = counting_inbound(raw, size);

        let parsed = parse(&mut msg, 4096, SizePolicy::Truncate, None).await;

        assert_eq!(served.load(Ordering::SeqCst), size);
        assert_eq!(parsed.text.as_deref().map(str::trim), Some("x".repeat(20).as_str()));
    }

    #[tokio::test]
    async fn alternate_failure_falls_back_to_baseline() {
        let raw = simple_mail(10);
        let size = raw.len();
        let (mut msg, _, _) = counting_inbound(raw, size);

        let parsed = parse(&mut msg, 4096, SizePolicy::Truncate, Some(&FailingStrategy)).await;

        assert_eq!(parsed.text.as_deref().map(str::trim), Some("xxxxxxxxxx"));
    }

    #[tokio::test]
    async fn alternate_success_is_used() {
        let raw = simple_mail(10);
        let size = raw.len();
        let (mut msg, _, _) = counting_inbound(raw, size);

        let parsed = parse(&mut msg, 4096, SizePolicy::Truncate, Some(&HtmlOnlyStrategy)).await;

        assert_eq!(parsed.html.as_deref(), Some("<p>Hello <b>world</b></p>"));
        // Text derived from HTML by stripping markup.
        assert_eq!(parsed.text.as_deref(), Some("Hello world"));
    }

    #[tokio::test]
    async fn all_strategies_failing_yields_diagnostic() {
        // Empty input defeats the baseline parser too.
        let (mut msg, _, _) = counting_inbound(Vec::new(), 0);

        let parsed = parse(&mut msg, 4096, SizePolicy::Truncate, Some(&FailingStrategy)).await;

        let text = parsed.text.expect("diagnostic text present");
        let html = parsed.html.expect("diagnostic html present");
        assert!(text.starts_with("Failed to parse message:"));
        assert_eq!(text, html);
    }

    #[tokio::test]
    async fn truncation_note_applies_to_html_derived_text() {
        let raw = simple_mail(458);
        let (mut msg, _, _) = counting_inbound(raw, 500);

        let parsed = parse(&mut msg, 100, SizePolicy::Truncate, Some(&HtmlOnlyStrategy)).await;

        let text = parsed.text.expect("derived text present");
        assert!(text.starts_with("Hello world"));
        assert!(text.ends_with(&truncation_note(500, 100)));
    }

    #[test]
    fn tokens_are_random_and_alphanumeric() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), ID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn parsed_mail_carries_envelope_headers() {
        let raw = simple_mail(5);
        let size = raw.len();
        let (mut msg, _, _) = counting_inbound(raw, size);

        let parsed = parse(&mut msg, 4096, SizePolicy::Truncate, None).await;

        assert_eq!(parsed.message_id, "mid-1");
        assert_eq!(parsed.from, "alice@example.com");
        assert_eq!(parsed.to, "relay@example.com");
        assert_eq!(parsed.subject, "Test");
    }
}
