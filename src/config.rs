//! Relay configuration, built once from environment variables and passed
//! immutably into the orchestrator. No process globals.

use std::time::Duration;

/// Retention window for persisted delivery-status records.
pub const STATUS_TTL: Duration = Duration::from_secs(3600); // 1 hour

/// Default cap on raw message bytes fed to the parser.
const DEFAULT_MAX_SIZE: usize = 512 * 1024;

/// Actions suppressed (or, for `Reject`, triggered) when a message is blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAction {
    /// Reject the message outright at the transport.
    Reject,
    /// Suppress forwarding to downstream recipients.
    Forward,
    /// Suppress the Telegram notification.
    Telegram,
}

impl BlockAction {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "reject" => Some(Self::Reject),
            "forward" => Some(Self::Forward),
            "telegram" => Some(Self::Telegram),
            _ => None,
        }
    }

    /// Parse a comma-separated policy list. Unknown tokens are skipped with
    /// a warning rather than failing the whole config.
    pub fn parse_set(s: &str) -> Vec<Self> {
        split_list(s)
            .iter()
            .filter_map(|token| {
                let action = Self::parse(token);
                if action.is_none() {
                    tracing::warn!("Ignoring unknown block-policy action: {token}");
                }
                action
            })
            .collect()
    }
}

/// What to do when a message's declared raw size exceeds the configured cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizePolicy {
    /// Skip parsing entirely; the stream is never read.
    Unhandled,
    /// Read only the first `max_size` bytes.
    #[default]
    Truncate,
    /// Read the whole stream anyway (the fallback for unrecognized values).
    ReadThrough,
}

impl SizePolicy {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "unhandled" => Self::Unhandled,
            "truncate" => Self::Truncate,
            _ => Self::ReadThrough,
        }
    }
}

/// SMTP settings for the forwarding transport.
#[derive(Debug, Clone, Default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Downstream forward recipients.
    pub forward_to: Vec<String>,
    /// Actions taken for blocked messages. Defaults to `telegram` when unset.
    pub block_policy: Vec<BlockAction>,
    /// Guardian mode: when true, delivery status is persisted so retried
    /// deliveries do not repeat side effects.
    pub guardian: bool,
    /// Cap on raw message bytes fed to the parser.
    pub max_size: usize,
    /// Behavior for messages whose raw size exceeds `max_size`.
    pub size_policy: SizePolicy,
    /// Sender rules consulted by the default block evaluator.
    pub blocked_senders: Vec<String>,
    /// Telegram Bot API token.
    pub telegram_bot_token: String,
    /// Telegram chat the notifier posts to.
    pub telegram_chat_id: String,
    /// Forwarding transport settings.
    pub smtp: SmtpConfig,
}

impl RelayConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Self {
        let forward_to = split_list(&std::env::var("MAILGATE_FORWARD_TO").unwrap_or_default());

        let block_policy = BlockAction::parse_set(
            &std::env::var("MAILGATE_BLOCK_POLICY").unwrap_or_else(|_| "telegram".to_string()),
        );

        let guardian = parse_flag(&std::env::var("MAILGATE_GUARDIAN").unwrap_or_default());

        let max_size: usize = std::env::var("MAILGATE_MAX_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_SIZE);

        let size_policy = std::env::var("MAILGATE_SIZE_POLICY")
            .map(|s| SizePolicy::parse(&s))
            .unwrap_or_default();

        let blocked_senders =
            split_list(&std::env::var("MAILGATE_BLOCKED_SENDERS").unwrap_or_default());

        let telegram_bot_token = std::env::var("MAILGATE_TG_BOT_TOKEN").unwrap_or_default();
        let telegram_chat_id = std::env::var("MAILGATE_TG_CHAT_ID").unwrap_or_default();

        let smtp_host = std::env::var("MAILGATE_SMTP_HOST").unwrap_or_default();
        let smtp_port: u16 = std::env::var("MAILGATE_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);
        let username = std::env::var("MAILGATE_SMTP_USERNAME").unwrap_or_default();
        let password = std::env::var("MAILGATE_SMTP_PASSWORD").unwrap_or_default();
        let from_address =
            std::env::var("MAILGATE_SMTP_FROM").unwrap_or_else(|_| username.clone());

        Self {
            forward_to,
            block_policy,
            guardian,
            max_size,
            size_policy,
            blocked_senders,
            telegram_bot_token,
            telegram_chat_id,
            smtp: SmtpConfig {
                host: smtp_host,
                port: smtp_port,
                username,
                password,
                from_address,
            },
        }
    }

    /// Whether the block policy contains `action`.
    pub fn blocks(&self, action: BlockAction) -> bool {
        self.block_policy.contains(&action)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            forward_to: Vec::new(),
            block_policy: vec![BlockAction::Telegram],
            guardian: false,
            max_size: DEFAULT_MAX_SIZE,
            size_policy: SizePolicy::default(),
            blocked_senders: Vec::new(),
            telegram_bot_token: String::new(),
            telegram_chat_id: String::new(),
            smtp: SmtpConfig::default(),
        }
    }
}

/// Split a comma-separated list, trimming entries and dropping empties.
pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Boolean-as-string flag parsing ("true", "1", "yes").
fn parse_flag(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}
