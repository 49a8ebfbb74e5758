//! Intake orchestrator.
//!
//! One invocation per inbound message: evaluate the block verdict, then
//! reject, forward, and notify according to policy, tracking per-message
//! delivery status so retried deliveries repeat no side effect. The
//! forward and notification steps are each isolated behind their own
//! catch boundary; a failure in one never aborts the other, and no
//! failure here is fatal to the process.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::block::BlockEvaluator;
use crate::config::{BlockAction, RelayConfig, STATUS_TTL};
use crate::error::Result;
use crate::forward::Forwarder;
use crate::message::Inbound;
use crate::notify::Notifier;
use crate::parser::{self, ParserStrategy};
use crate::store::{DeliveryStatus, StatusStore};

/// The intake pipeline with its injected collaborators.
pub struct Intake {
    store: Arc<dyn StatusStore>,
    evaluator: Arc<dyn BlockEvaluator>,
    forwarder: Arc<dyn Forwarder>,
    notifier: Arc<dyn Notifier>,
    /// Optional alternate decoding strategy tried before the baseline
    /// parser on the notification path.
    alternate: Option<Box<dyn ParserStrategy>>,
}

impl Intake {
    pub fn new(
        store: Arc<dyn StatusStore>,
        evaluator: Arc<dyn BlockEvaluator>,
        forwarder: Arc<dyn Forwarder>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            evaluator,
            forwarder,
            notifier,
            alternate: None,
        }
    }

    pub fn with_alternate_parser(mut self, alternate: Box<dyn ParserStrategy>) -> Self {
        self.alternate = Some(alternate);
        self
    }

    /// Process one inbound message. Never returns a value; rejection is
    /// signaled through the message itself and every other failure is
    /// contained and logged at its step boundary.
    pub async fn process(&self, msg: &mut Inbound, config: &RelayConfig) {
        let key = msg.message_id.clone();
        let blocked = self.evaluator.evaluate(msg, config).await;
        debug!(message_id = %key, blocked, guardian = config.guardian, "Processing inbound message");

        let mut status = match self.store.load(&key, config.guardian).await {
            Ok(status) => status,
            Err(e) => {
                warn!(message_id = %key, error = %e, "Status load failed; starting from empty record");
                DeliveryStatus::default()
            }
        };

        if blocked && config.blocks(BlockAction::Reject) {
            info!(message_id = %key, from = %msg.from, "Message rejected by block policy");
            msg.reject("message rejected by block policy");
            return;
        }

        if let Err(e) = self.forward_step(msg, config, blocked, &mut status).await {
            error!(message_id = %key, error = %e, "Forward step failed");
        }

        if let Err(e) = self.notify_step(msg, config, blocked, &mut status).await {
            error!(message_id = %key, error = %e, "Notification step failed");
        }
    }

    /// Forward to every configured recipient not already recorded in the
    /// status. Per-recipient failures are logged and skipped; under
    /// guardian mode the status is persisted after each success so a crash
    /// mid-loop loses at most the in-flight recipient.
    async fn forward_step(
        &self,
        msg: &Inbound,
        config: &RelayConfig,
        blocked: bool,
        status: &mut DeliveryStatus,
    ) -> Result<()> {
        let recipients: &[String] = if blocked && config.blocks(BlockAction::Forward) {
            info!(message_id = %msg.message_id, "Forwarding suppressed by block policy");
            &[]
        } else {
            &config.forward_to
        };

        for recipient in recipients {
            if status.has_forwarded(recipient) {
                debug!(message_id = %msg.message_id, %recipient, "Already forwarded; skipping");
                continue;
            }
            match self.forwarder.forward(msg, recipient).await {
                Ok(()) => {
                    if config.guardian {
                        status.record_forwarded(recipient);
                        self.store.save(&msg.message_id, status, STATUS_TTL).await?;
                    }
                }
                Err(e) => {
                    warn!(message_id = %msg.message_id, %recipient, error = %e, "Forward failed");
                }
            }
        }
        Ok(())
    }

    /// Send at most one notification per message. The status advances to
    /// `notified` regardless of the send outcome: a failed send is never
    /// retried on a later delivery attempt, trading possible notification
    /// loss for guaranteed non-duplication.
    async fn notify_step(
        &self,
        msg: &mut Inbound,
        config: &RelayConfig,
        blocked: bool,
        status: &mut DeliveryStatus,
    ) -> Result<()> {
        if status.notified {
            debug!(message_id = %msg.message_id, "Already notified; skipping");
            return Ok(());
        }
        if blocked && config.blocks(BlockAction::Telegram) {
            info!(message_id = %msg.message_id, "Notification suppressed by block policy");
            return Ok(());
        }

        let parsed = parser::parse(
            msg,
            config.max_size,
            config.size_policy,
            self.alternate.as_deref(),
        )
        .await;

        if let Err(e) = self.notifier.send(&parsed, config).await {
            warn!(message_id = %msg.message_id, error = %e, "Notification send failed; will not retry");
        }

        if config.guardian {
            status.notified = true;
            self.store.save(&msg.message_id, status, STATUS_TTL).await?;
        }
        Ok(())
    }
}
