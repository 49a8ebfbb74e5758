//! Forwarding transport seam.
//!
//! Actual mail delivery is out of scope for the relay core; [`Forwarder`]
//! is its interface. [`SmtpForwarder`] is the shipped implementation: it
//! resubmits the raw message over SMTP with a rewritten envelope.

use async_trait::async_trait;
use lettre::address::Envelope;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, SmtpTransport, Transport};

use crate::config::SmtpConfig;
use crate::error::RelayError;
use crate::message::Inbound;

/// Delivers one message to one downstream recipient.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, msg: &Inbound, recipient: &str) -> Result<(), RelayError>;
}

/// SMTP forwarding over lettre.
pub struct SmtpForwarder {
    config: SmtpConfig,
}

impl SmtpForwarder {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<SmtpTransport, RelayError> {
        let creds = Credentials::new(self.config.username.clone(), self.config.password.clone());
        Ok(SmtpTransport::relay(&self.config.host)
            .map_err(|e| RelayError::ForwardFailed {
                recipient: String::new(),
                reason: format!("SMTP relay error: {e}"),
            })?
            .port(self.config.port)
            .credentials(creds)
            .build())
    }
}

#[async_trait]
impl Forwarder for SmtpForwarder {
    async fn forward(&self, msg: &Inbound, recipient: &str) -> Result<(), RelayError> {
        let raw = msg
            .raw_copy()
            .ok_or_else(|| RelayError::RawUnavailable(msg.message_id.clone()))?;

        let failed = |reason: String| RelayError::ForwardFailed {
            recipient: recipient.to_string(),
            reason,
        };

        let from: Address = self
            .config
            .from_address
            .parse()
            .map_err(|e| failed(format!("Invalid from address: {e}")))?;
        let to: Address = recipient
            .parse()
            .map_err(|e| failed(format!("Invalid recipient address: {e}")))?;
        let envelope = Envelope::new(Some(from), vec![to])
            .map_err(|e| failed(format!("Invalid envelope: {e}")))?;

        self.transport()?
            .send_raw(&envelope, raw)
            .map_err(|e| failed(format!("SMTP send failed: {e}")))?;

        tracing::info!(recipient, message_id = %msg.message_id, "Message forwarded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forward_without_raw_content_fails() {
        let forwarder = SmtpForwarder::new(SmtpConfig::default());
        let mut msg = Inbound::buffered("mid", "a@x", "b@x", "s", b"raw".to_vec());
        // Drain the raw copy the way the parser would.
        let _ = msg.take_raw();

        let err = forwarder.forward(&msg, "c@x").await.unwrap_err();
        assert!(matches!(err, RelayError::RawUnavailable(_)));
    }
}
