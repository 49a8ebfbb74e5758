//! Inbound message model at the transport boundary.
//!
//! An [`Inbound`] carries the header view the orchestrator needs, the
//! declared raw size, and a one-shot byte stream for the parser. Rejection
//! is signaled back to the upstream transport by marking the message; the
//! orchestrator itself returns nothing.

use std::io::Cursor;

use tokio::io::AsyncRead;

/// One-shot raw byte stream of the message.
pub type RawStream = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// An inbound email message as handed over by the hosting transport.
pub struct Inbound {
    /// Message identifier extracted from headers; the delivery-status key.
    pub message_id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    /// Declared size of the raw message in bytes.
    pub raw_size: usize,
    raw: Option<RawStream>,
    raw_copy: Option<Vec<u8>>,
    rejection: Option<String>,
}

impl Inbound {
    /// Build from a transport that exposes the raw message as a stream.
    /// The stream can be taken exactly once.
    pub fn new(
        message_id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        raw_size: usize,
        raw: RawStream,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            raw_size,
            raw: Some(raw),
            raw_copy: None,
            rejection: None,
        }
    }

    /// Build from a transport that already buffered the full raw message.
    /// Keeps a copy available to the forwarding transport in addition to
    /// the parser's stream.
    pub fn buffered(
        message_id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        raw: Vec<u8>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            raw_size: raw.len(),
            raw: None,
            raw_copy: Some(raw),
            rejection: None,
        }
    }

    /// Take the raw stream. Returns `None` on the second call (the stream
    /// is one-shot) or when no raw content was attached at all.
    pub fn take_raw(&mut self) -> Option<RawStream> {
        if let Some(stream) = self.raw.take() {
            return Some(stream);
        }
        // Buffered messages hand out their bytes as a cursor, once as well.
        self.raw_copy
            .take()
            .map(|bytes| Box::new(Cursor::new(bytes)) as RawStream)
    }

    /// Raw message bytes, when the transport buffered them.
    pub fn raw_copy(&self) -> Option<&[u8]> {
        self.raw_copy.as_deref()
    }

    /// Signal rejection to the upstream transport.
    pub fn reject(&mut self, reason: impl Into<String>) {
        self.rejection = Some(reason.into());
    }

    /// The rejection reason, if the orchestrator rejected this message.
    pub fn rejection(&self) -> Option<&str> {
        self.rejection.as_deref()
    }
}

impl std::fmt::Debug for Inbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inbound")
            .field("message_id", &self.message_id)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("subject", &self.subject)
            .field("raw_size", &self.raw_size)
            .field("rejection", &self.rejection)
            .finish_non_exhaustive()
    }
}
