//! Parser strategies: a common seam over MIME decoders so a faster
//! alternate decoder can be tried before the baseline one.

use mail_parser::MessageParser;

use crate::error::ParseError;

/// Decoded message body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailBody {
    pub text: Option<String>,
    pub html: Option<String>,
}

/// A single decoding strategy over captured raw bytes.
pub trait ParserStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Decode `raw` into a body. An `Err` here means "try the next
    /// strategy", never a caller-visible failure.
    fn parse(&self, raw: &[u8]) -> Result<MailBody, ParseError>;
}

/// Baseline strategy over the `mail-parser` crate. Authoritative: it is
/// always the last entry in the strategy chain and is never skipped.
pub struct BaselineParser;

impl ParserStrategy for BaselineParser {
    fn name(&self) -> &str {
        "mail-parser"
    }

    fn parse(&self, raw: &[u8]) -> Result<MailBody, ParseError> {
        let parsed = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| ParseError::Strategy {
                name: "mail-parser".into(),
                reason: "unparseable message".into(),
            })?;

        let body = MailBody {
            text: parsed.body_text(0).map(|t| t.to_string()),
            html: parsed.body_html(0).map(|h| h.to_string()),
        };

        if body.text.is_none() && body.html.is_none() {
            return Err(ParseError::Strategy {
                name: "mail-parser".into(),
                reason: "no text or HTML part".into(),
            });
        }

        Ok(body)
    }
}

/// Run strategies in order until one succeeds.
pub fn run_strategies(
    raw: &[u8],
    strategies: &[&dyn ParserStrategy],
) -> Result<MailBody, ParseError> {
    let mut last_err = ParseError::Strategy {
        name: "none".into(),
        reason: "no parser strategy available".into(),
    };
    for strategy in strategies {
        match strategy.parse(raw) {
            Ok(body) => return Ok(body),
            Err(e) => {
                tracing::warn!(parser = strategy.name(), error = %e, "Parser strategy failed");
                last_err = e;
            }
        }
    }
    Err(last_err)
}

/// Strip HTML tags from content (basic), normalizing whitespace.
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}
