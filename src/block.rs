//! Block evaluation at the intake boundary.
//!
//! The real classifier (spam scoring, virus checks) lives outside this
//! core; [`BlockEvaluator`] is its interface. [`SenderRules`] is the
//! deployment default: a config-driven match on the sender address.

use async_trait::async_trait;

use crate::config::RelayConfig;
use crate::message::Inbound;

/// Yes/no block verdict for an inbound message.
#[async_trait]
pub trait BlockEvaluator: Send + Sync {
    async fn evaluate(&self, msg: &Inbound, config: &RelayConfig) -> bool;
}

/// Blocks messages whose sender matches any configured rule.
pub struct SenderRules;

#[async_trait]
impl BlockEvaluator for SenderRules {
    async fn evaluate(&self, msg: &Inbound, config: &RelayConfig) -> bool {
        matches_rule(&config.blocked_senders, &msg.from)
    }
}

/// Match a sender address against a rule list.
///
/// - `*` → match all
/// - `@domain.com` or `domain.com` → domain match
/// - `user@domain.com` → exact address match
pub fn matches_rule(rules: &[String], email: &str) -> bool {
    if rules.iter().any(|r| r == "*") {
        return true;
    }
    let email_lower = email.to_lowercase();
    rules.iter().any(|r| {
        if r.starts_with('@') {
            email_lower.ends_with(&r.to_lowercase())
        } else if r.contains('@') {
            r.eq_ignore_ascii_case(email)
        } else {
            email_lower.ends_with(&format!("@{}", r.to_lowercase()))
        }
    })
}
