//! HTTP surface: the message ingestion endpoint (the hosting transport's
//! per-message invocation of the orchestrator) plus a small web-facing
//! router that is independent of the mail pipeline. Any unhandled handler
//! error is converted into a server-error response carrying the error's
//! message text.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mail_parser::MessageParser;

use crate::config::RelayConfig;
use crate::error::WebError;
use crate::intake::Intake;
use crate::message::Inbound;

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<Intake>,
    pub config: Arc<RelayConfig>,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/ingest", post(ingest))
        .route("/healthz", get(healthz))
        .route("/version", get(version))
        .with_state(state)
}

/// Accept one raw email message and run it through the intake pipeline.
/// Responds 403 when the orchestrator rejected the message, 204 otherwise.
async fn ingest(State(state): State<AppState>, body: Bytes) -> Result<Response, WebError> {
    if body.is_empty() {
        return Err(WebError::BadRequest("empty message body".into()));
    }

    let mut msg = inbound_from_raw(body.to_vec());
    state.intake.process(&mut msg, &state.config).await;

    if let Some(reason) = msg.rejection() {
        return Ok((StatusCode::FORBIDDEN, reason.to_string()).into_response());
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build an [`Inbound`] from raw message bytes, pulling the header view
/// out without invoking the body parser. A missing Message-ID gets a
/// generated one so the status key is always present.
pub fn inbound_from_raw(raw: Vec<u8>) -> Inbound {
    let (message_id, from, to, subject) = {
        let headers = MessageParser::default().parse_headers(&raw);
        let message_id = headers
            .as_ref()
            .and_then(|m| m.message_id())
            .map(str::to_string)
            .unwrap_or_else(|| format!("gen-{}", crate::parser::random_token()));
        let from = headers
            .as_ref()
            .and_then(|m| m.from())
            .and_then(|a| a.first())
            .and_then(|a| a.address())
            .map(str::to_string)
            .unwrap_or_default();
        let to = headers
            .as_ref()
            .and_then(|m| m.to())
            .and_then(|a| a.first())
            .and_then(|a| a.address())
            .map(str::to_string)
            .unwrap_or_default();
        let subject = headers
            .as_ref()
            .and_then(|m| m.subject())
            .map(str::to_string)
            .unwrap_or_default();
        (message_id, from, to, subject)
    };

    Inbound::buffered(message_id, from, to, subject, raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::block::SenderRules;
    use crate::config::BlockAction;
    use crate::forward::SmtpForwarder;
    use crate::notify::TelegramNotifier;
    use crate::store::MemoryStatusStore;

    const RAW: &[u8] = b"Message-ID: <m1@example.com>\r\n\
From: alice@example.com\r\n\
To: relay@example.com\r\n\
Subject: Hello\r\n\r\nHi!";

    fn state(config: RelayConfig) -> AppState {
        let intake = Intake::new(
            Arc::new(MemoryStatusStore::new()),
            Arc::new(SenderRules),
            Arc::new(SmtpForwarder::new(config.smtp.clone())),
            Arc::new(TelegramNotifier::new()),
        );
        AppState {
            intake: Arc::new(intake),
            config: Arc::new(config),
        }
    }

    #[test]
    fn inbound_from_raw_extracts_headers() {
        let msg = inbound_from_raw(RAW.to_vec());
        assert_eq!(msg.message_id, "m1@example.com");
        assert_eq!(msg.from, "alice@example.com");
        assert_eq!(msg.to, "relay@example.com");
        assert_eq!(msg.subject, "Hello");
        assert_eq!(msg.raw_size, RAW.len());
    }

    #[test]
    fn inbound_from_raw_generates_missing_message_id() {
        let msg = inbound_from_raw(b"Subject: no id\r\n\r\nbody".to_vec());
        assert!(msg.message_id.starts_with("gen-"));
    }

    #[test]
    fn web_error_maps_to_status_codes() {
        let resp = WebError::BadRequest("nope".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = WebError::Internal("boom".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn ingest_rejects_empty_body() {
        let err = ingest(State(state(RelayConfig::default())), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WebError::BadRequest(_)));
    }

    #[tokio::test]
    async fn ingest_accepts_a_clean_message() {
        let resp = ingest(
            State(state(RelayConfig::default())),
            Bytes::from_static(RAW),
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn ingest_surfaces_rejection() {
        let config = RelayConfig {
            blocked_senders: vec!["alice@example.com".to_string()],
            block_policy: vec![BlockAction::Reject],
            ..RelayConfig::default()
        };
        let resp = ingest(State(state(config)), Bytes::from_static(RAW))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
